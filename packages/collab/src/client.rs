//! # Collab client
//!
//! Per-replica synchronization state, kept free of IO: the caller moves
//! requests and responses between [`CollabClient`] and a hub (see
//! [`crate::flush`] for an async driver).
//!
//! ## Design
//!
//! - Local steps queue up in `unconfirmed` until the hub accepts them
//! - At most one request is in flight
//! - A rejected request means another client got there first; the client
//!   waits for their steps, rebases its queue over them and tries again
//! - Broadcasts that start past the client's version are held until the
//!   gap is filled
//! - Transport failures retry with backoff, then disconnect

use crate::config::CollabConfig;
use crate::errors::{CollabError, TransportError};
use crate::ids::ClientId;
use crate::wire::{decode_steps, encode_steps, Broadcast, SendRequest, SendResponse};
use quire_editor::{EditorState, Selection};
use quire_model::Node;
use quire_transform::{map_transform, MapEntry, MapKey, Remapping, Transform};
use std::collections::BTreeMap;
use std::time::Duration;

const REMOTE_ORIGIN: u128 = 1;
const LOCAL_ORIGIN: u128 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connected,
    /// The last `attempt` exchanges failed in transport.
    Retrying { attempt: u32 },
    /// Retries ran out. Nothing is sent until [`CollabClient::reconnect`].
    Disconnected,
}

/// What the caller should do after a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    Confirmed { version: u64 },
    /// Send again after the delay.
    Retry { after: Duration },
    /// The hub has steps the client hasn't seen; sending resumes once they
    /// are received.
    OutOfSync,
    Disconnected,
}

#[derive(Debug, Clone, Copy)]
struct InFlight {
    version: u64,
    count: usize,
}

#[derive(Debug)]
pub struct CollabClient {
    client_id: ClientId,
    config: CollabConfig,
    editor: EditorState,
    version: u64,
    /// Local steps the hub hasn't confirmed, starting at the document of
    /// `version`.
    unconfirmed: Transform,
    out_of_sync: bool,
    in_flight: Option<InFlight>,
    connection: ConnectionState,
    held: BTreeMap<u64, Broadcast>,
}

impl CollabClient {
    /// Attach to `editor`, whose document is hub version `version`.
    pub fn new(client_id: ClientId, mut editor: EditorState, version: u64, config: CollabConfig) -> Self {
        editor.history_mut().set_allow_collapsing(false);
        let unconfirmed = Transform::new(editor.registry().clone(), editor.doc().clone());
        Self {
            client_id,
            config,
            editor,
            version,
            unconfirmed,
            out_of_sync: false,
            in_flight: None,
            connection: ConnectionState::Connected,
            held: BTreeMap::new(),
        }
    }

    pub fn client_id(&self) -> ClientId {
        self.client_id
    }

    pub fn config(&self) -> &CollabConfig {
        &self.config
    }

    pub fn editor(&self) -> &EditorState {
        &self.editor
    }

    pub fn doc(&self) -> &Node {
        self.editor.doc()
    }

    pub fn selection(&self) -> &Selection {
        self.editor.selection()
    }

    pub fn set_selection(&mut self, selection: Selection) -> Result<(), CollabError> {
        Ok(self.editor.set_selection(selection)?)
    }

    /// Last hub version this client has fully seen.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// The document at [`CollabClient::version`].
    pub fn version_doc(&self) -> &Node {
        self.unconfirmed.before()
    }

    pub fn unconfirmed(&self) -> &Transform {
        &self.unconfirmed
    }

    pub fn is_out_of_sync(&self) -> bool {
        self.out_of_sync
    }

    pub fn is_sending(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn connection(&self) -> ConnectionState {
        self.connection
    }

    /// An empty transform on the current document.
    pub fn transform(&self) -> Transform {
        self.editor.transform()
    }

    /// Apply a local transform and queue its steps.
    pub fn apply_local(&mut self, transform: &Transform) -> Result<(), CollabError> {
        let limit = self.config.max_unconfirmed;
        if self.unconfirmed.len() + transform.len() > limit {
            tracing::warn!(
                "[Collab] {} refusing edit: {} step(s) already unconfirmed",
                self.client_id,
                self.unconfirmed.len()
            );
            return Err(CollabError::UnconfirmedOverflow { limit });
        }
        self.editor.apply(transform)?;
        self.queue(transform);
        Ok(())
    }

    /// Undo the newest local event. Refused when the queue is already full.
    pub fn undo(&mut self) -> Result<bool, CollabError> {
        self.check_capacity()?;
        match self.editor.undo() {
            Some(transform) => {
                self.queue(&transform);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn redo(&mut self) -> Result<bool, CollabError> {
        self.check_capacity()?;
        match self.editor.redo() {
            Some(transform) => {
                self.queue(&transform);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn check_capacity(&self) -> Result<(), CollabError> {
        let limit = self.config.max_unconfirmed;
        if self.unconfirmed.len() >= limit {
            return Err(CollabError::UnconfirmedOverflow { limit });
        }
        Ok(())
    }

    fn queue(&mut self, transform: &Transform) {
        for ((step, doc), map) in transform
            .steps()
            .iter()
            .zip(transform.docs())
            .zip(transform.maps())
        {
            self.unconfirmed
                .push_applied(step.clone(), doc.clone(), map.clone());
        }
    }

    /// The request to send now, if any. Nothing is sent while out of sync,
    /// disconnected, already waiting for a response, or with nothing queued.
    pub fn send(&mut self) -> Result<Option<SendRequest>, CollabError> {
        if self.out_of_sync
            || self.in_flight.is_some()
            || self.unconfirmed.is_empty()
            || self.connection == ConnectionState::Disconnected
        {
            return Ok(None);
        }
        let steps = encode_steps(self.unconfirmed.steps())?;
        self.in_flight = Some(InFlight {
            version: self.version,
            count: steps.len(),
        });
        tracing::debug!(
            "[Collab] {} sending {} step(s) at version {}",
            self.client_id,
            steps.len(),
            self.version
        );
        Ok(Some(SendRequest {
            client_id: self.client_id,
            version: self.version,
            steps,
        }))
    }

    /// Take in the result of the request returned by the last
    /// [`CollabClient::send`].
    pub fn handle_response(
        &mut self,
        response: Result<SendResponse, TransportError>,
    ) -> Result<SendOutcome, CollabError> {
        let in_flight = self.in_flight.take().ok_or(CollabError::NoRequestInFlight)?;
        match response {
            Ok(response) if response.accepted => {
                self.connection = ConnectionState::Connected;
                if self.version == in_flight.version {
                    self.confirm(in_flight.count);
                }
                self.drain_held()?;
                Ok(SendOutcome::Confirmed {
                    version: self.version,
                })
            }
            Ok(response) => {
                self.connection = ConnectionState::Connected;
                if self.version != in_flight.version {
                    return Ok(SendOutcome::Retry {
                        after: Duration::ZERO,
                    });
                }
                tracing::debug!(
                    "[Collab] {} out of sync: hub at {}, client at {}",
                    self.client_id,
                    response.version,
                    self.version
                );
                self.out_of_sync = true;
                Ok(SendOutcome::OutOfSync)
            }
            Err(error) => {
                let attempt = match self.connection {
                    ConnectionState::Retrying { attempt } => attempt + 1,
                    _ => 1,
                };
                if attempt >= self.config.retry.max_attempts {
                    tracing::error!(
                        "[Collab] {} disconnected after {} failed attempt(s): {}",
                        self.client_id,
                        attempt,
                        error
                    );
                    self.connection = ConnectionState::Disconnected;
                    return Ok(SendOutcome::Disconnected);
                }
                let after = self.config.retry.delay(attempt);
                tracing::warn!(
                    "[Collab] {} send failed ({}), retry {} in {:?}",
                    self.client_id,
                    error,
                    attempt,
                    after
                );
                self.connection = ConnectionState::Retrying { attempt };
                Ok(SendOutcome::Retry { after })
            }
        }
    }

    /// Forget the request in flight without counting it as a failure.
    pub fn abandon_request(&mut self) {
        self.in_flight = None;
    }

    /// Leave the disconnected state and start sending again. A client that
    /// was out of sync stays so until it receives the steps it missed.
    pub fn reconnect(&mut self) {
        tracing::info!("[Collab] {} reconnecting at version {}", self.client_id, self.version);
        self.connection = ConnectionState::Connected;
        self.in_flight = None;
    }

    /// Take in steps accepted by the hub. Returns how many steps were
    /// applied, counting any held broadcasts this one unblocked.
    pub fn receive(&mut self, broadcast: Broadcast) -> Result<usize, CollabError> {
        if broadcast.version > self.version {
            tracing::debug!(
                "[Collab] {} holding steps from version {} (at {})",
                self.client_id,
                broadcast.version,
                self.version
            );
            self.held.insert(broadcast.version, broadcast);
            return Ok(0);
        }
        let applied = self.apply_broadcast(broadcast)?;
        Ok(applied + self.drain_held()?)
    }

    fn drain_held(&mut self) -> Result<usize, CollabError> {
        let mut applied = 0;
        while let Some(entry) = self.held.first_entry() {
            if *entry.key() > self.version {
                break;
            }
            let broadcast = entry.remove();
            applied += self.apply_broadcast(broadcast)?;
        }
        Ok(applied)
    }

    fn confirm(&mut self, count: usize) {
        let count = count.min(self.unconfirmed.len());
        self.unconfirmed = self.unconfirmed.drop_front(count);
        self.version += count as u64;
        tracing::info!(
            "[Collab] {} confirmed {} step(s), now at version {}",
            self.client_id,
            count,
            self.version
        );
    }

    fn apply_broadcast(&mut self, broadcast: Broadcast) -> Result<usize, CollabError> {
        if broadcast.end() <= self.version {
            return Ok(0);
        }
        let skip = (self.version - broadcast.version) as usize;

        if broadcast.client_id == self.client_id {
            // our own steps, accepted by a request whose response was lost
            let count = broadcast.steps.len() - skip;
            if matches!(self.in_flight, Some(in_flight) if in_flight.version == self.version) {
                self.in_flight = None;
            }
            self.confirm(count);
            self.out_of_sync = false;
            return Ok(count);
        }

        let registry = self.editor.registry().clone();
        let steps = decode_steps(&registry, &broadcast.steps[skip..])?;
        let remote = Transform::from_steps(registry, self.version_doc().clone(), steps)?;

        let mut remapping = Remapping::new();
        for (index, map) in remote.maps().iter().enumerate() {
            remapping.add_to_back(MapEntry::new(map.clone(), MapKey::new(REMOTE_ORIGIN, index)));
        }
        let rebased = map_transform(remote.doc(), &remapping, &self.unconfirmed, LOCAL_ORIGIN);
        let dropped = rebased.positions.iter().filter(|p| p.is_none()).count();

        self.editor.rebase(remote.maps(), &rebased);
        self.unconfirmed = rebased.transform;
        self.version += remote.len() as u64;
        tracing::debug!(
            "[Collab] {} received {} step(s) from {}, rebased {} local step(s), dropped {}",
            self.client_id,
            remote.len(),
            broadcast.client_id,
            self.unconfirmed.len(),
            dropped
        );
        self.out_of_sync = false;
        Ok(remote.len())
    }
}
