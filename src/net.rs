use crate::member::Member;
use crate::protocol::{Message, Payload};
use log::{debug, warn};
use std::collections::HashMap;
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

// Upper bound on one wire message; anything larger is malformed.
const MAX_MESSAGE_BYTES: u64 = 64 * 1024;

// Accept inbound connections forever. Each connection carries exactly one
// message and is handled on its own task, so a delayed or slow handler never
// blocks the listener.
pub async fn serve(listener: TcpListener, member: Arc<Member>) {
    loop {
        match listener.accept().await {
            Ok((stream, _)) => {
                let member = member.clone();
                tokio::spawn(async move {
                    match read_message(stream).await {
                        Ok(message) => member.dispatch(message).await,
                        Err(error) => {
                            warn!(
                                "{} dropped an unreadable message. Reason: {error}",
                                member.id(),
                            );
                        }
                    }
                });
            }
            Err(error) => {
                warn!(
                    "{} failed to accept a connection. Reason: {error}",
                    member.id(),
                );
            }
        }
    }
}

// Read one message: everything until the peer closes its write side.
async fn read_message(stream: TcpStream) -> io::Result<Message> {
    let mut payload = Vec::new();
    stream
        .take(MAX_MESSAGE_BYTES)
        .read_to_end(&mut payload)
        .await?;
    serde_json::from_slice(&payload)
        .map_err(|error| io::Error::new(io::ErrorKind::InvalidData, error))
}

// The outbound half of a member. Every message gets a fresh connection;
// failure to connect or write is treated as loss, with no retry and no error
// to the caller.
pub struct Outbound {
    sender_id: String,
    peers: Arc<HashMap<String, SocketAddr>>,
    enabled: AtomicBool,
}

impl Outbound {
    pub fn new(sender_id: String, peers: Arc<HashMap<String, SocketAddr>>) -> Self {
        Outbound {
            sender_id,
            peers,
            enabled: AtomicBool::new(true),
        }
    }

    // Cut the send path. Subsequent sends vanish, as for a member that has
    // gone dark mid-round.
    pub fn silence(&self) {
        self.enabled.store(false, Ordering::SeqCst);
    }

    // Stamp the transport fields and unicast one message to the named peer.
    pub async fn send(&self, receiver_id: &str, payload: Payload) {
        if !self.enabled.load(Ordering::SeqCst) {
            return;
        }
        let Some(&address) = self.peers.get(receiver_id) else {
            warn!("{} has no endpoint for peer {receiver_id}.", self.sender_id);
            return;
        };

        let message = Message {
            sender_id: self.sender_id.clone(),
            receiver_id: receiver_id.to_string(),
            payload,
        };
        // The `unwrap` is safe because serialization should never fail.
        let encoded = serde_json::to_vec(&message).unwrap();

        match TcpStream::connect(address).await {
            Ok(mut stream) => {
                if stream.write_all(&encoded).await.is_ok() {
                    let _ = stream.shutdown().await;
                } else {
                    debug!(
                        "{} lost a message to {receiver_id} mid-write.",
                        self.sender_id,
                    );
                }
            }
            Err(error) => {
                debug!(
                    "{} could not reach {receiver_id}. Reason: {error}",
                    self.sender_id,
                );
            }
        }
    }
}
