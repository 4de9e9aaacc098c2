use crate::acceptor;
use crate::collector::Collector;
use crate::config;
use crate::fault::Profile;
use crate::net::Outbound;
use crate::protocol::{majority, Message, Payload};
use crate::state::{self, State};
use log::{debug, info};
use std::collections::HashMap;
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

// One council member: a single node running the proposer, acceptor, and
// learner roles over a shared peer roster.
pub struct Member {
    id: String,
    id_number: u64,
    peers: Arc<HashMap<String, SocketAddr>>,
    profile: Profile,
    phase_timeout: Duration,
    round: AtomicU64,
    acceptor: RwLock<State>,
    rounds: Mutex<HashMap<u64, Arc<Collector>>>,
    learned: RwLock<Option<String>>,
    outbound: Outbound,
}

impl Member {
    pub fn new(
        id: &str,
        peers: HashMap<String, SocketAddr>,
        profile: Profile,
        phase_timeout: Duration,
    ) -> io::Result<Arc<Member>> {
        if !peers.contains_key(id) {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("`{id}` is not in the peer roster."),
            ));
        }
        let id_number = config::id_number(id)?;
        let peers = Arc::new(peers);
        let outbound = Outbound::new(id.to_string(), peers.clone());
        // A dark member neither answers nor originates traffic.
        if profile == Profile::Offline {
            outbound.silence();
        }
        Ok(Arc::new(Member {
            id: id.to_string(),
            id_number,
            peers,
            profile,
            phase_timeout,
            round: AtomicU64::new(0),
            acceptor: RwLock::new(state::initial()),
            rounds: Mutex::new(HashMap::new()),
            learned: RwLock::new(None),
            outbound,
        }))
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn id_number(&self) -> u64 {
        self.id_number
    }

    pub fn profile(&self) -> Profile {
        self.profile
    }

    pub fn phase_timeout(&self) -> Duration {
        self.phase_timeout
    }

    pub fn outbound(&self) -> &Outbound {
        &self.outbound
    }

    pub fn acceptor(&self) -> &RwLock<State> {
        &self.acceptor
    }

    // The strict-majority threshold over the full roster, self included.
    pub fn quorum(&self) -> usize {
        majority(self.peers.len())
    }

    pub fn peer_ids(&self) -> impl Iterator<Item = &str> {
        self.peers.keys().map(String::as_str)
    }

    // Rounds are numbered from 1. The counter is atomic so concurrent rounds
    // on the same member cannot share a proposal number.
    pub fn next_round(&self) -> u64 {
        self.round.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn register_round(&self, proposal_number: u64) -> Arc<Collector> {
        let collector = Arc::new(Collector::default());
        // The `unwrap` is safe since it can only fail if a panic already happened.
        self.rounds
            .lock()
            .unwrap()
            .insert(proposal_number, collector.clone());
        collector
    }

    pub fn finish_round(&self, proposal_number: u64) {
        // The `unwrap` is safe since it can only fail if a panic already happened.
        self.rounds.lock().unwrap().remove(&proposal_number);
    }

    pub fn collector_for(&self, proposal_number: u64) -> Option<Arc<Collector>> {
        // The `unwrap` is safe since it can only fail if a panic already happened.
        self.rounds.lock().unwrap().get(&proposal_number).cloned()
    }

    // Record this member's learned decision.
    pub fn learn(&self, value: &str) {
        // The `unwrap` is safe since it can only fail if a panic already happened.
        *self.learned.write().unwrap() = Some(value.to_string());
    }

    #[cfg(test)]
    pub fn learned(&self) -> Option<String> {
        // The `unwrap` is safe since it can only fail if a panic already happened.
        self.learned.read().unwrap().clone()
    }

    #[cfg(test)]
    pub fn acceptor_snapshot(&self) -> State {
        // The `unwrap` is safe since it can only fail if a panic already happened.
        self.acceptor.read().unwrap().clone()
    }

    // Route one inbound message to its role handler. PROMISE and ACCEPTED
    // responses land in the collector of the round they name; responses for
    // rounds that already ended are dropped.
    pub async fn dispatch(&self, message: Message) {
        match &message.payload {
            Payload::PrepareRequest {
                proposal_number,
                proposer_id,
            } => {
                acceptor::handle_prepare(self, &message.sender_id, *proposal_number, proposer_id)
                    .await;
            }
            Payload::AcceptRequest {
                proposal_number,
                proposer_id,
                value,
            } => {
                acceptor::handle_accept(
                    self,
                    &message.sender_id,
                    *proposal_number,
                    proposer_id,
                    value,
                )
                .await;
            }
            Payload::Promise {
                proposal_number, ..
            } => {
                if let Some(collector) = self.collector_for(*proposal_number) {
                    info!(
                        "Phase 2 : Proposer {} received PROMISE from {}",
                        self.id, message.sender_id,
                    );
                    collector.record_promise(&message.sender_id, message.payload.clone());
                } else {
                    debug!(
                        "{} dropped a PROMISE for inactive proposal {proposal_number}.",
                        self.id,
                    );
                }
            }
            Payload::Accepted {
                proposal_number, ..
            } => {
                if let Some(collector) = self.collector_for(*proposal_number) {
                    info!(
                        "Phase 4 : Proposer {} received ACCEPTED from {}",
                        self.id, message.sender_id,
                    );
                    collector.record_accepted(&message.sender_id, message.payload.clone());
                } else {
                    debug!(
                        "{} dropped an ACCEPTED for inactive proposal {proposal_number}.",
                        self.id,
                    );
                }
            }
        }
    }
}
