use crate::fault::Profile;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::io::{self, Error, ErrorKind::InvalidData};
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;
use tokio::fs;

// The reference phase timeout.
const PHASE_TIMEOUT_DEFAULT_MS: u64 = 15_000;

#[derive(Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    pub members: Vec<Member>,
    #[serde(default = "phase_timeout_default")]
    pub phase_timeout_ms: u64,
}

// One roster entry.
#[derive(Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Member {
    pub id: String,
    pub address: SocketAddr,
    #[serde(default)]
    pub profile: Profile,
}

fn phase_timeout_default() -> u64 {
    PHASE_TIMEOUT_DEFAULT_MS
}

impl Config {
    pub fn phase_timeout(&self) -> Duration {
        Duration::from_millis(self.phase_timeout_ms)
    }

    // The full roster as a peer table.
    pub fn peers(&self) -> HashMap<String, SocketAddr> {
        self.members
            .iter()
            .map(|member| (member.id.clone(), member.address))
            .collect()
    }

    pub fn member(&self, id: &str) -> Option<&Member> {
        self.members.iter().find(|member| member.id == id)
    }
}

// The numeric suffix of a member id, e.g. 7 for "M7". The suffix doubles as
// the tiebreaker inside proposal numbers.
pub fn id_number(id: &str) -> io::Result<u64> {
    let digits = id.trim_start_matches(|c: char| !c.is_ascii_digit());
    if digits.is_empty() || !digits.bytes().all(|byte| byte.is_ascii_digit()) {
        return Err(Error::new(
            InvalidData,
            format!("`{id}` has no usable numeric suffix."),
        ));
    }
    digits
        .parse()
        .map_err(|error| Error::new(InvalidData, format!("`{id}` is not a valid id. Reason: {error}")))
}

// Parse and validate config data.
pub fn parse(config: &str) -> io::Result<Config> {
    let config: Config =
        serde_yaml::from_str(config).map_err(|error| Error::new(InvalidData, format!("{error}")))?;
    validate(&config)?;
    Ok(config)
}

// Read the config from a file.
pub async fn read(path: &Path) -> io::Result<Config> {
    let data = fs::read_to_string(path).await?;
    parse(&data)
}

fn validate(config: &Config) -> io::Result<()> {
    if config.members.is_empty() {
        return Err(Error::new(InvalidData, "The roster has no members."));
    }
    let mut ids = HashSet::new();
    let mut suffixes = HashSet::new();
    for member in &config.members {
        if !ids.insert(member.id.as_str()) {
            return Err(Error::new(
                InvalidData,
                format!("Duplicate member id `{}`.", member.id),
            ));
        }
        // The proposal number encoding reserves one decimal digit for the member.
        let suffix = id_number(&member.id)?;
        if suffix > 9 || !suffixes.insert(suffix) {
            return Err(Error::new(
                InvalidData,
                format!(
                    "Member id `{}` does not have a distinct single-digit suffix.",
                    member.id,
                ),
            ));
        }
    }
    Ok(())
}
