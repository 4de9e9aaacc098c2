use crate::protocol::Payload;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tokio::time::sleep;

// Bound on the pause between quorum checks.
const POLL_INTERVAL: Duration = Duration::from_millis(25);

// In-flight responses for one proposal round, keyed by acceptor id. Keying by
// id makes a duplicate response overwrite its predecessor instead of
// inflating the quorum count.
#[derive(Default)]
pub struct Collector {
    promises: Mutex<HashMap<String, Payload>>,
    accepteds: Mutex<HashMap<String, Payload>>,
}

impl Collector {
    pub fn record_promise(&self, acceptor_id: &str, promise: Payload) {
        // The `unwrap` is safe since it can only fail if a panic already happened.
        self.promises
            .lock()
            .unwrap()
            .insert(acceptor_id.to_string(), promise);
    }

    pub fn record_accepted(&self, acceptor_id: &str, accepted: Payload) {
        // The `unwrap` is safe since it can only fail if a panic already happened.
        self.accepteds
            .lock()
            .unwrap()
            .insert(acceptor_id.to_string(), accepted);
    }

    // Wait until a quorum of distinct acceptors have promised, or until the
    // timeout passes.
    pub async fn await_promises(&self, quorum: usize, timeout: Duration) -> Option<Vec<Payload>> {
        await_quorum(&self.promises, quorum, timeout).await
    }

    // Same discipline for the second phase.
    pub async fn await_accepteds(&self, quorum: usize, timeout: Duration) -> Option<Vec<Payload>> {
        await_quorum(&self.accepteds, quorum, timeout).await
    }

    #[cfg(test)]
    pub fn promise_count(&self) -> usize {
        self.promises.lock().unwrap().len()
    }
}

async fn await_quorum(
    responses: &Mutex<HashMap<String, Payload>>,
    quorum: usize,
    timeout: Duration,
) -> Option<Vec<Payload>> {
    let deadline = Instant::now() + timeout;
    loop {
        {
            // The `unwrap` is safe since it can only fail if a panic already happened.
            let responses = responses.lock().unwrap();
            if responses.len() >= quorum {
                return Some(responses.values().cloned().collect());
            }
        }
        let now = Instant::now();
        if now >= deadline {
            return None;
        }
        sleep(POLL_INTERVAL.min(deadline - now)).await;
    }
}
