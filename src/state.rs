// The acceptor side of a member: the highest proposal number promised and the
// highest-numbered accepted pair. Every update is monotone, and the accepted
// pair only ever changes together.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct State {
    pub highest_seen: u64,
    pub highest_accepted: u64,
    pub accepted_value: Option<String>,
}

// Return the state in which an acceptor starts.
pub fn initial() -> State {
    State {
        highest_seen: 0,
        highest_accepted: 0,
        accepted_value: None,
    }
}

impl State {
    // Phase 1 transition. A PREPARE with a strictly higher number raises
    // `highest_seen` and is answered with the last accepted pair. Anything
    // else, including an equal number, leaves the state untouched.
    pub fn prepare(&mut self, proposal_number: u64) -> Option<(u64, Option<String>)> {
        if proposal_number > self.highest_seen {
            self.highest_seen = proposal_number;
            Some((self.highest_accepted, self.accepted_value.clone()))
        } else {
            None
        }
    }

    // Phase 2 transition. The bound is non-strict so the number promised in
    // phase 1 can still be accepted, even when the requests were reordered.
    pub fn accept(&mut self, proposal_number: u64, value: &str) -> bool {
        if proposal_number >= self.highest_seen {
            self.highest_seen = proposal_number;
            self.highest_accepted = proposal_number;
            self.accepted_value = Some(value.to_string());
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::state::{initial, State};

    #[test]
    fn prepare_promises_strictly_higher_numbers() {
        let mut state = initial();
        assert_eq!(state.prepare(11), Some((0, None)));
        assert_eq!(state.highest_seen, 11);
        assert_eq!(state.prepare(11), None);
        assert_eq!(state.prepare(5), None);
        assert_eq!(state.highest_seen, 11);
    }

    #[test]
    fn prepare_reports_the_last_accepted_pair() {
        let mut state = initial();
        assert!(state.accept(11, "alpha"));
        assert_eq!(state.prepare(23), Some((11, Some("alpha".to_string()))));
    }

    #[test]
    fn accept_allows_the_promised_number() {
        let mut state = initial();
        assert_eq!(state.prepare(11), Some((0, None)));
        assert!(state.accept(11, "alpha"));
        assert_eq!(state.highest_accepted, 11);
        assert_eq!(state.accepted_value, Some("alpha".to_string()));
    }

    #[test]
    fn accept_refuses_stale_numbers() {
        let mut state = initial();
        assert_eq!(state.prepare(23), Some((0, None)));
        assert!(!state.accept(11, "alpha"));
        assert_eq!(state.highest_accepted, 0);
        assert_eq!(state.accepted_value, None);
    }

    #[test]
    fn accept_sets_the_pair_atomically() {
        let mut state = initial();
        assert!(state.accept(12, "beta"));
        assert_eq!(
            state,
            State {
                highest_seen: 12,
                highest_accepted: 12,
                accepted_value: Some("beta".to_string()),
            },
        );
    }

    #[test]
    fn state_is_monotone_under_any_request_sequence() {
        let requests = [
            (false, 11),
            (true, 11),
            (false, 5),
            (true, 3),
            (false, 23),
            (true, 23),
            (false, 14),
            (true, 9),
            (false, 31),
        ];

        let mut state = initial();
        let mut seen = 0;
        let mut accepted = 0;
        for (is_accept, number) in requests {
            if is_accept {
                state.accept(number, "gamma");
            } else {
                state.prepare(number);
            }
            assert!(state.highest_seen >= seen);
            assert!(state.highest_accepted >= accepted);
            assert!(state.highest_accepted <= state.highest_seen);
            if state.accepted_value.is_some() {
                assert!(state.highest_accepted > 0);
            }
            seen = state.highest_seen;
            accepted = state.highest_accepted;
        }
    }
}
