use crate::collector::Collector;
use crate::member::Member;
use crate::protocol::Payload;
use futures::future::join_all;
use log::{info, warn};
use std::io;
use std::sync::Arc;

// Compute the wire proposal number for a round originated by a member. The
// round takes precedence; the member's numeric suffix breaks ties between
// members that start the same round.
pub fn proposal_number(round: u64, id_number: u64) -> u64 {
    round * 10 + id_number
}

// One in-flight proposal round. Dropping the round retires its collector, so
// responses that straggle in afterwards stop matching anything.
pub struct Round {
    member: Arc<Member>,
    number: u64,
    collector: Arc<Collector>,
}

impl Round {
    pub fn begin(member: &Arc<Member>) -> Round {
        let number = proposal_number(member.next_round(), member.id_number());
        let collector = member.register_round(number);
        Round {
            member: member.clone(),
            number,
            collector,
        }
    }

    pub fn number(&self) -> u64 {
        self.number
    }

    // Phase 1: broadcast the PREPARE_REQUEST and wait for a strict majority
    // of PROMISEs.
    pub async fn phase1(&self) -> io::Result<Vec<Payload>> {
        let member = &self.member;
        self.broadcast(Payload::PrepareRequest {
            proposal_number: self.number,
            proposer_id: member.id().to_string(),
        })
        .await;

        match self
            .collector
            .await_promises(member.quorum(), member.phase_timeout())
            .await
        {
            Some(promises) => {
                info!("Phase 2 : {} received PROMISES from majority.", member.id());
                Ok(promises)
            }
            None => {
                warn!(
                    "Phase 2 : {} did not receive PROMISES from a majority before the timeout. \
                     Abandoning proposal {}.",
                    member.id(),
                    self.number,
                );
                Err(io::Error::new(
                    io::ErrorKind::TimedOut,
                    format!("proposal {} received no PROMISE majority", self.number),
                ))
            }
        }
    }

    // Phase 2: broadcast the ACCEPT_REQUEST and wait for a strict majority
    // of ACCEPTEDs.
    pub async fn phase2(&self, value: &str) -> io::Result<()> {
        let member = &self.member;
        self.broadcast(Payload::AcceptRequest {
            proposal_number: self.number,
            proposer_id: member.id().to_string(),
            value: value.to_string(),
        })
        .await;

        match self
            .collector
            .await_accepteds(member.quorum(), member.phase_timeout())
            .await
        {
            Some(_) => Ok(()),
            None => {
                warn!(
                    "Phase 4 : {} did not receive ACCEPTEDs from a majority before the timeout. \
                     Abandoning proposal {}.",
                    member.id(),
                    self.number,
                );
                Err(io::Error::new(
                    io::ErrorKind::TimedOut,
                    format!("proposal {} received no ACCEPTED majority", self.number),
                ))
            }
        }
    }

    // Unicast to every peer except ourselves.
    async fn broadcast(&self, payload: Payload) {
        let member = &self.member;
        join_all(
            member
                .peer_ids()
                .filter(|id| *id != member.id())
                .map(|id| member.outbound().send(id, payload.clone())),
        )
        .await;
    }
}

impl Drop for Round {
    fn drop(&mut self) {
        self.member.finish_round(self.number);
    }
}

// The value-safety rule. If any acceptor in the quorum already accepted a
// value, the round must carry the value of the highest-numbered accept it
// heard about, not the proposer's own. Returns the value to propose and the
// proposal number it was adopted from, if any.
pub fn choose_value(original: &str, promises: &[Payload]) -> (String, Option<u64>) {
    let prior = promises
        .iter()
        .filter_map(|promise| match promise {
            Payload::Promise {
                last_accepted_proposal_number,
                last_accepted_value: Some(value),
                ..
            } if *last_accepted_proposal_number > 0 => {
                Some((*last_accepted_proposal_number, value.clone()))
            }
            _ => None,
        })
        .max_by_key(|(number, _)| *number);

    match prior {
        Some((number, value)) => (value, Some(number)),
        None => (original.to_string(), None),
    }
}

// Drive one full proposal round on behalf of a member: prepare, adopt any
// previously accepted value, then request acceptance. Returns the chosen
// value, or the timeout that ended the round.
pub async fn propose(member: &Arc<Member>, value: &str) -> io::Result<String> {
    let round = Round::begin(member);
    info!(
        "{} proposes value '{value}' with proposal number {}",
        member.id(),
        round.number(),
    );

    let promises = round.phase1().await?;
    let (chosen, adopted_from) = choose_value(value, &promises);
    if let Some(number) = adopted_from {
        info!(
            "Phase 2 : {} learns about previously accepted value '{chosen}' with proposal \
             number {number}",
            member.id(),
        );
    }

    round.phase2(&chosen).await?;
    member.learn(&chosen);
    info!("Final value accepted is {chosen} by proposer {}", member.id());
    Ok(chosen)
}
