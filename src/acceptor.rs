use crate::fault::Action;
use crate::member::Member;
use crate::protocol::Payload;
use log::{debug, info};
use tokio::time::sleep;

// Apply the member's fault policy to one inbound request. Returns false when
// the request is to be dropped. A delay sleeps only this handler's task.
async fn admit(member: &Member, kind: &str, proposer_id: &str) -> bool {
    let action = member.profile().decide(&mut rand::rng());
    match action {
        Action::Process => true,
        Action::Delay(delay) => {
            debug!(
                "{} delays a {kind} from {proposer_id} by {delay:?}.",
                member.id(),
            );
            sleep(delay).await;
            true
        }
        Action::Drop => {
            debug!("{} drops a {kind} from {proposer_id}.", member.id());
            false
        }
    }
}

// Phase 1: promise a strictly higher proposal number, reporting any
// previously accepted pair back to the proposer.
pub async fn handle_prepare(
    member: &Member,
    sender_id: &str,
    proposal_number: u64,
    proposer_id: &str,
) {
    if !admit(member, "PREPARE", proposer_id).await {
        return;
    }
    info!(
        "Phase 1 : Acceptor {} received PREPARE from {proposer_id} with proposal number \
         {proposal_number}",
        member.id(),
    );

    let reply = {
        // The `unwrap` is safe since it can only fail if a panic already happened.
        let mut state = member.acceptor().write().unwrap();
        state.prepare(proposal_number).map(
            |(last_accepted_proposal_number, last_accepted_value)| Payload::Promise {
                proposal_number,
                proposer_id: proposer_id.to_string(),
                last_accepted_proposal_number,
                last_accepted_value,
            },
        )
    };

    if let Some(promise) = reply {
        info!(
            "Phase 1 : Acceptor {} sends PROMISE to {proposer_id}",
            member.id(),
        );
        member.outbound().send(sender_id, promise).await;
    } else {
        debug!(
            "{} ignored a stale PREPARE from {proposer_id} with proposal number \
             {proposal_number}.",
            member.id(),
        );
    }
}

// Phase 2: accept any proposal numbered at least as high as the highest
// promise, recording the pair and echoing it back.
pub async fn handle_accept(
    member: &Member,
    sender_id: &str,
    proposal_number: u64,
    proposer_id: &str,
    value: &str,
) {
    if !admit(member, "ACCEPT_REQUEST", proposer_id).await {
        return;
    }

    let accepted = {
        // The `unwrap` is safe since it can only fail if a panic already happened.
        let mut state = member.acceptor().write().unwrap();
        state.accept(proposal_number, value)
    };

    if accepted {
        info!(
            "Phase 3 : Acceptor {} accepts value '{value}' from proposer {proposer_id}",
            member.id(),
        );
        info!(
            "Phase 3 : Acceptor {} sends ACCEPTED to {proposer_id}",
            member.id(),
        );
        member
            .outbound()
            .send(
                sender_id,
                Payload::Accepted {
                    proposal_number,
                    proposer_id: proposer_id.to_string(),
                    value: value.to_string(),
                },
            )
            .await;
    } else {
        debug!(
            "{} ignored a stale ACCEPT_REQUEST from {proposer_id} with proposal number \
             {proposal_number}.",
            member.id(),
        );
    }
}

#[cfg(test)]
mod tests {
    use crate::acceptor::{handle_accept, handle_prepare};
    use crate::fault::Profile;
    use crate::member::Member;
    use crate::state::{initial, State};
    use std::collections::HashMap;
    use std::sync::Arc;
    use std::time::Duration;

    // A member whose peers are endpoints nothing listens on, so every reply
    // it emits is simply lost.
    fn lone_member(profile: Profile) -> Arc<Member> {
        let mut peers = HashMap::new();
        peers.insert("M1".to_string(), "127.0.0.1:9".parse().unwrap());
        peers.insert("M2".to_string(), "127.0.0.1:9".parse().unwrap());
        Member::new("M1", peers, profile, Duration::from_millis(100)).unwrap()
    }

    #[tokio::test]
    async fn prepare_bumps_and_promises() {
        let member = lone_member(Profile::Responsive);
        handle_prepare(&member, "M2", 12, "M2").await;

        let state = member.acceptor_snapshot();
        assert_eq!(state.highest_seen, 12);
        assert_eq!(state.highest_accepted, 0);
        assert_eq!(state.accepted_value, None);
    }

    #[tokio::test]
    async fn accept_records_the_pair() {
        let member = lone_member(Profile::Responsive);
        handle_prepare(&member, "M2", 12, "M2").await;
        handle_accept(&member, "M2", 12, "M2", "M2").await;

        assert_eq!(
            member.acceptor_snapshot(),
            State {
                highest_seen: 12,
                highest_accepted: 12,
                accepted_value: Some("M2".to_string()),
            },
        );
    }

    #[tokio::test]
    async fn an_offline_member_ignores_everything() {
        let member = lone_member(Profile::Offline);
        handle_prepare(&member, "M2", 12, "M2").await;
        handle_accept(&member, "M2", 12, "M2", "M2").await;

        assert_eq!(member.acceptor_snapshot(), initial());
    }

    #[tokio::test]
    async fn reordered_requests_resolve_via_the_asymmetry() {
        // An ACCEPT_REQUEST that outruns its own PREPARE still lands, and the
        // late PREPARE for the same number is then refused.
        let member = lone_member(Profile::Responsive);
        handle_accept(&member, "M2", 12, "M2", "M2").await;
        assert_eq!(
            member.acceptor_snapshot().accepted_value,
            Some("M2".to_string()),
        );

        handle_prepare(&member, "M2", 12, "M2").await;
        let state = member.acceptor_snapshot();
        assert_eq!(state.highest_seen, 12);
        assert_eq!(state.accepted_value, Some("M2".to_string()));
    }
}
