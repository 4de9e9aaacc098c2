#![deny(clippy::all, clippy::pedantic, warnings)]

mod acceptor;
mod collector;
mod config;
mod fault;
mod member;
mod net;
mod proposer;
mod protocol;
mod state;

use {
    clap::{value_parser, Arg, Command},
    env_logger::Builder,
    log::{error, info, LevelFilter},
    member::Member,
    std::{
        env,
        io::{self, Write},
        path::Path,
        process::exit,
        str::FromStr,
        time::Duration,
    },
    tokio::net::TcpListener,
};

// The program version
const VERSION: &str = env!("CARGO_PKG_VERSION");

// Defaults
const CONFIG_FILE_DEFAULT_PATH: &str = "config.yml";
const DEFAULT_LOG_LEVEL: LevelFilter = LevelFilter::Info;

// Command-line option names
const CONFIG_FILE_OPTION: &str = "config-file";
const MEMBER_OPTION: &str = "member";
const PROPOSE_OPTION: &str = "propose";
const PROPOSE_DELAY_OPTION: &str = "propose-delay";

// This struct represents a summary of the command-line options
struct Settings {
    member_id: String,
    config: config::Config,
    proposal: Option<String>,
    propose_delay: Duration,
}

// Set up the logger.
fn set_up_logging() {
    Builder::new()
        .filter_module(
            module_path!(),
            LevelFilter::from_str(
                &env::var("LOG_LEVEL").unwrap_or_else(|_| DEFAULT_LOG_LEVEL.to_string()),
            )
            .unwrap_or(DEFAULT_LOG_LEVEL),
        )
        .format(|buf, record| {
            let style = buf.default_level_style(record.level()).bold();
            let indent_size = record.level().to_string().len() + 3;
            let indent = " ".repeat(indent_size);
            let options = textwrap::Options::with_termwidth()
                .initial_indent(&indent)
                .subsequent_indent(&indent);
            writeln!(
                buf,
                "{style}[{}]{style:#} {}",
                record.level(),
                &textwrap::fill(&record.args().to_string(), options)[indent_size..],
            )
        })
        .init();
}

// Parse the command-line options.
async fn settings() -> io::Result<Settings> {
    // Set up the command-line interface.
    let matches = Command::new("Council Paxos")
        .version(VERSION)
        .about("A council-election simulator built on single-decree Paxos.")
        .arg(
            Arg::new(MEMBER_OPTION)
                .value_name("ID")
                .short('m')
                .long(MEMBER_OPTION)
                .help("Sets the id of the member corresponding to this instance")
                .required(true), // [tag:member_required]
        )
        .arg(
            Arg::new(PROPOSE_OPTION)
                .value_name("VALUE")
                .short('v')
                .long(PROPOSE_OPTION)
                .help("Proposes a value to the council"),
        )
        .arg(
            Arg::new(PROPOSE_DELAY_OPTION)
                .value_name("MILLISECONDS")
                .long(PROPOSE_DELAY_OPTION)
                .value_parser(value_parser!(u64))
                .help("Delays the proposal by the given number of milliseconds"),
        )
        .arg(
            Arg::new(CONFIG_FILE_OPTION)
                .value_name("PATH")
                .short('c')
                .long(CONFIG_FILE_OPTION)
                .help(format!(
                    "Sets the path of the config file (default: {CONFIG_FILE_DEFAULT_PATH})",
                )),
        )
        .get_matches();

    // Parse the config file.
    let config_file_path = matches
        .get_one::<String>(CONFIG_FILE_OPTION)
        .map_or(CONFIG_FILE_DEFAULT_PATH, String::as_str);
    let config = config::read(Path::new(config_file_path)).await?;

    // Parse the member id. The `unwrap` is safe due to [ref:member_required].
    let member_id = matches.get_one::<String>(MEMBER_OPTION).unwrap().clone();
    if config.member(&member_id).is_none() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("There is no member with id `{member_id}`."),
        ));
    }

    // Parse the scripted proposal, if any.
    let proposal = matches.get_one::<String>(PROPOSE_OPTION).cloned();
    let propose_delay = Duration::from_millis(
        matches
            .get_one::<u64>(PROPOSE_DELAY_OPTION)
            .copied()
            .unwrap_or(0),
    );

    // Return the settings.
    Ok(Settings {
        member_id,
        config,
        proposal,
        propose_delay,
    })
}

// Let the fun begin!
#[tokio::main]
async fn main() {
    // Set up the logger.
    set_up_logging();

    // Parse the command-line arguments.
    let settings = match settings().await {
        Ok(settings) => settings,
        Err(error) => {
            error!("{error}");
            exit(1);
        }
    };

    // The `unwrap` is safe since `settings` validated the member id.
    let member_config = settings.config.member(&settings.member_id).unwrap();
    let address = member_config.address;
    let profile = member_config.profile;

    // Construct the member.
    let member = match Member::new(
        &settings.member_id,
        settings.config.peers(),
        profile,
        settings.config.phase_timeout(),
    ) {
        Ok(member) => member,
        Err(error) => {
            error!("{error}");
            exit(1);
        }
    };

    // Failing to bind the inbox endpoint is fatal.
    let listener = match TcpListener::bind(address).await {
        Ok(listener) => listener,
        Err(error) => {
            error!("Unable to bind to `{address}`. Reason: {error}");
            exit(1);
        }
    };
    info!("{} listening on {address}.", member.id());

    // Run the scripted proposal, if any, alongside the inbox server.
    if let Some(value) = settings.proposal {
        let member = member.clone();
        let delay = settings.propose_delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Err(error) = proposer::propose(&member, &value).await {
                error!("{error}");
            }
        });
    }

    // Serve forever.
    net::serve(listener, member).await;
}
