use serde::{Deserialize, Serialize};

// The number of distinct acceptors that constitutes a strict majority.
pub fn majority(membership: usize) -> usize {
    membership / 2 + 1
}

// One wire message. The transport stamps the sender and receiver when the
// message is sent; everything else comes from the role that produced it.
// Unknown fields are tolerated on read so rosters of mixed versions can talk.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub sender_id: String,
    pub receiver_id: String,
    #[serde(flatten)]
    pub payload: Payload,
}

// The protocol-level content of a message, tagged by type on the wire.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(
    tag = "type",
    rename_all = "SCREAMING_SNAKE_CASE",
    rename_all_fields = "camelCase"
)]
pub enum Payload {
    PrepareRequest {
        proposal_number: u64,
        proposer_id: String,
    },
    Promise {
        proposal_number: u64,
        proposer_id: String,
        // 0 means the acceptor has never accepted anything.
        last_accepted_proposal_number: u64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        last_accepted_value: Option<String>,
    },
    AcceptRequest {
        proposal_number: u64,
        proposer_id: String,
        value: String,
    },
    Accepted {
        proposal_number: u64,
        proposer_id: String,
        value: String,
    },
}

#[cfg(test)]
mod tests {
    use crate::protocol::{majority, Message, Payload};
    use serde_json::json;

    #[test]
    fn majority_is_strict() {
        assert_eq!(majority(9), 5);
        assert_eq!(majority(8), 5);
        assert_eq!(majority(3), 2);
        assert_eq!(majority(1), 1);
    }

    #[test]
    fn wire_field_names() {
        let message = Message {
            sender_id: "M1".to_string(),
            receiver_id: "M2".to_string(),
            payload: Payload::PrepareRequest {
                proposal_number: 11,
                proposer_id: "M1".to_string(),
            },
        };

        let encoded = serde_json::to_value(&message).unwrap();
        assert_eq!(encoded["type"], "PREPARE_REQUEST");
        assert_eq!(encoded["senderId"], "M1");
        assert_eq!(encoded["receiverId"], "M2");
        assert_eq!(encoded["proposalNumber"], 11_u64);
        assert_eq!(encoded["proposerId"], "M1");
    }

    #[test]
    fn promise_omits_an_absent_value() {
        let message = Message {
            sender_id: "M3".to_string(),
            receiver_id: "M1".to_string(),
            payload: Payload::Promise {
                proposal_number: 11,
                proposer_id: "M1".to_string(),
                last_accepted_proposal_number: 0,
                last_accepted_value: None,
            },
        };

        let encoded = serde_json::to_value(&message).unwrap();
        assert!(encoded.get("lastAcceptedValue").is_none());

        let decoded: Message = serde_json::from_value(encoded).unwrap();
        assert_eq!(decoded.payload, message.payload);
    }

    #[test]
    fn promise_carries_a_prior_accept() {
        let encoded = json!({
            "type": "PROMISE",
            "proposalNumber": 23_u64,
            "proposerId": "M3",
            "lastAcceptedProposalNumber": 11_u64,
            "lastAcceptedValue": "M1",
            "senderId": "M4",
            "receiverId": "M3",
        });

        let decoded: Message = serde_json::from_value(encoded).unwrap();
        assert_eq!(
            decoded.payload,
            Payload::Promise {
                proposal_number: 23,
                proposer_id: "M3".to_string(),
                last_accepted_proposal_number: 11,
                last_accepted_value: Some("M1".to_string()),
            },
        );
    }

    #[test]
    fn extra_fields_are_tolerated() {
        let encoded = json!({
            "type": "ACCEPTED",
            "proposalNumber": 12_u64,
            "proposerId": "M2",
            "value": "M2",
            "senderId": "M5",
            "receiverId": "M2",
            "hopCount": 3_u64,
        });

        let decoded: Message = serde_json::from_value(encoded).unwrap();
        assert_eq!(
            decoded.payload,
            Payload::Accepted {
                proposal_number: 12,
                proposer_id: "M2".to_string(),
                value: "M2".to_string(),
            },
        );
    }

    #[test]
    fn unknown_types_are_rejected() {
        let encoded = json!({
            "type": "VETO",
            "proposalNumber": 11_u64,
            "senderId": "M1",
            "receiverId": "M2",
        });

        assert!(serde_json::from_value::<Message>(encoded).is_err());
    }
}
