//! # Hub
//!
//! The authority clients send their steps to. The hub keeps a linear
//! version count: a batch made against the current version is applied,
//! logged and pushed to every other connected client; a batch made against
//! an older version is rejected so its author rebases first.

use crate::channel::Channel;
use crate::errors::{CollabError, TransportError};
use crate::ids::ClientId;
use crate::wire::{decode_steps, Broadcast, SendRequest, SendResponse};
use async_trait::async_trait;
use quire_model::Node;
use quire_transform::{StepRegistry, Transform};
use std::sync::Arc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, RwLock};

const CHANNEL_CAPACITY: usize = 256;

/// Client connection to the hub.
#[derive(Clone)]
struct ConnectedClient {
    client_id: ClientId,
    sender: mpsc::Sender<Broadcast>,
}

struct HubState {
    registry: Arc<StepRegistry>,
    doc: Node,
    version: u64,
    log: Vec<Broadcast>,
    clients: Vec<ConnectedClient>,
}

impl HubState {
    /// Push a batch to all clients except the origin. Never waits: a client
    /// whose queue is full or closed is dropped and has to reconnect.
    fn broadcast(&mut self, msg: &Broadcast, exclude_client: Option<ClientId>) {
        self.clients.retain(|client| {
            if Some(client.client_id) == exclude_client {
                return true;
            }
            match client.sender.try_send(msg.clone()) {
                Ok(()) => true,
                Err(TrySendError::Full(_)) => {
                    tracing::warn!(
                        "[Hub] Dropping {}: {} batches behind",
                        client.client_id,
                        CHANNEL_CAPACITY
                    );
                    false
                }
                Err(TrySendError::Closed(_)) => {
                    tracing::debug!("[Hub] Dropping {}: receiver closed", client.client_id);
                    false
                }
            }
        });
    }
}

/// What a client starts from when it joins.
#[derive(Debug)]
pub struct Connection {
    pub version: u64,
    pub doc: Node,
    pub receiver: mpsc::Receiver<Broadcast>,
}

#[derive(Clone)]
pub struct Hub {
    state: Arc<RwLock<HubState>>,
}

impl Hub {
    pub fn new(registry: Arc<StepRegistry>, doc: Node) -> Self {
        Self {
            state: Arc::new(RwLock::new(HubState {
                registry,
                doc,
                version: 0,
                log: Vec::new(),
                clients: Vec::new(),
            })),
        }
    }

    /// Join, replacing any earlier connection with the same id.
    pub async fn connect(&self, client_id: ClientId) -> Connection {
        let (sender, receiver) = mpsc::channel(CHANNEL_CAPACITY);
        let mut state = self.state.write().await;
        state.clients.retain(|c| c.client_id != client_id);
        state.clients.push(ConnectedClient { client_id, sender });
        tracing::info!("[Hub] {} connected at version {}", client_id, state.version);
        Connection {
            version: state.version,
            doc: state.doc.clone(),
            receiver,
        }
    }

    pub async fn disconnect(&self, client_id: ClientId) {
        let mut state = self.state.write().await;
        state.clients.retain(|c| c.client_id != client_id);
        tracing::info!("[Hub] {} disconnected", client_id);
    }

    pub async fn version(&self) -> u64 {
        self.state.read().await.version
    }

    pub async fn doc(&self) -> Node {
        self.state.read().await.doc.clone()
    }

    pub async fn client_count(&self) -> usize {
        self.state.read().await.clients.len()
    }

    /// Apply a batch if it was made against the current version.
    pub async fn submit(&self, request: SendRequest) -> Result<SendResponse, CollabError> {
        let mut state = self.state.write().await;
        if request.version != state.version {
            tracing::debug!(
                "[Hub] Rejecting {} step(s) from {}: made at {}, hub at {}",
                request.steps.len(),
                request.client_id,
                request.version,
                state.version
            );
            return Ok(SendResponse {
                accepted: false,
                version: state.version,
            });
        }
        if request.steps.is_empty() {
            return Ok(SendResponse {
                accepted: true,
                version: state.version,
            });
        }

        let steps = decode_steps(&state.registry, &request.steps)?;
        let transform = Transform::from_steps(state.registry.clone(), state.doc.clone(), steps)
            .map_err(|error| {
                tracing::warn!("[Hub] Steps from {} do not apply: {}", request.client_id, error);
                error
            })?;

        let broadcast = Broadcast {
            version: state.version,
            client_id: request.client_id,
            steps: request.steps,
        };
        state.doc = transform.doc().clone();
        state.version = broadcast.end();
        state.log.push(broadcast.clone());
        tracing::info!(
            "[Hub] Accepted {} step(s) from {}, now at version {}",
            transform.len(),
            broadcast.client_id,
            state.version
        );
        state.broadcast(&broadcast, Some(broadcast.client_id));

        Ok(SendResponse {
            accepted: true,
            version: state.version,
        })
    }

    /// Every logged batch that ends after `version`.
    pub async fn steps_since(&self, version: u64) -> Vec<Broadcast> {
        let state = self.state.read().await;
        state
            .log
            .iter()
            .filter(|batch| batch.end() > version)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl Channel for Hub {
    async fn send(&self, request: SendRequest) -> Result<SendResponse, TransportError> {
        self.submit(request)
            .await
            .map_err(|error| TransportError::Remote(error.to_string()))
    }

    async fn steps_since(&self, version: u64) -> Result<Vec<Broadcast>, TransportError> {
        Ok(Hub::steps_since(self, version).await)
    }
}
