use rand::{Rng, RngExt};
use serde::{Deserialize, Serialize};
use std::time::Duration;

// Delay constants
const FLAKY_DELAY: Duration = Duration::from_secs(5);
const VARIABLE_DELAY_MAX_MS: u64 = 3_000;

// The fate of one inbound PREPARE_REQUEST or ACCEPT_REQUEST.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Action {
    Process,
    Delay(Duration),
    Drop,
}

// A member's responsiveness profile. Profiles are assigned by configuration
// and consulted on every inbound request to the acceptor; they model
// heterogeneous members, not the protocol itself.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Profile {
    #[default]
    Responsive,
    FlakySlow,
    Lossy,
    Variable,
    Offline,
}

impl Profile {
    // Decide what to do with one inbound request.
    pub fn decide(self, rng: &mut impl Rng) -> Action {
        match self {
            Profile::Responsive => Action::Process,
            Profile::FlakySlow => {
                // 50% long delay, 25% drop, 25% immediate.
                let draw: u8 = rng.random_range(0..4);
                match draw {
                    0 | 1 => Action::Delay(FLAKY_DELAY),
                    2 => Action::Drop,
                    _ => Action::Process,
                }
            }
            Profile::Lossy => {
                if rng.random_bool(0.3) {
                    Action::Drop
                } else {
                    Action::Process
                }
            }
            Profile::Variable => Action::Delay(Duration::from_millis(
                rng.random_range(0..=VARIABLE_DELAY_MAX_MS),
            )),
            Profile::Offline => Action::Drop,
        }
    }
}
