//! # Channel
//!
//! The async side of collaboration. A [`Channel`] carries requests to a hub;
//! [`flush`] drives a [`CollabClient`] over one until everything local is
//! confirmed, applying timeouts, backoff and cancellation along the way.

use crate::client::{CollabClient, ConnectionState, SendOutcome};
use crate::errors::{CollabError, TransportError};
use crate::wire::{Broadcast, SendRequest, SendResponse};
use async_trait::async_trait;
use std::time::Duration;
use tokio::sync::watch;

/// Transport to a hub.
#[async_trait]
pub trait Channel: Send + Sync {
    async fn send(&self, request: SendRequest) -> Result<SendResponse, TransportError>;

    /// Every accepted batch that ends after `version`, in order.
    async fn steps_since(&self, version: u64) -> Result<Vec<Broadcast>, TransportError>;
}

/// Cancels every [`CancelToken`] made alongside it.
#[derive(Debug)]
pub struct CancelHandle {
    sender: watch::Sender<bool>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        let _ = self.sender.send(true);
    }
}

#[derive(Debug, Clone)]
pub struct CancelToken {
    receiver: watch::Receiver<bool>,
}

pub fn cancel_pair() -> (CancelHandle, CancelToken) {
    let (sender, receiver) = watch::channel(false);
    (CancelHandle { sender }, CancelToken { receiver })
}

impl CancelToken {
    /// A token that is never cancelled.
    pub fn never() -> Self {
        cancel_pair().1
    }

    pub fn is_cancelled(&self) -> bool {
        *self.receiver.borrow()
    }

    /// Resolves once cancelled. Pends forever if the handle is dropped
    /// first.
    pub async fn cancelled(&self) {
        let mut receiver = self.receiver.clone();
        loop {
            if *receiver.borrow_and_update() {
                return;
            }
            if receiver.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushOutcome {
    /// Nothing left to send.
    Flushed,
    /// The hub rejected the steps but had nothing newer to hand out.
    OutOfSync,
    Disconnected,
    Cancelled,
}

/// Send local steps until the hub has confirmed all of them, catching up
/// on remote steps whenever a request is rejected.
pub async fn flush<C: Channel + ?Sized>(
    client: &mut CollabClient,
    channel: &C,
    cancel: &CancelToken,
) -> Result<FlushOutcome, CollabError> {
    let timeout = client.config().request_timeout();
    loop {
        if cancel.is_cancelled() {
            return Ok(FlushOutcome::Cancelled);
        }
        if client.is_out_of_sync() && !catch_up(client, channel, cancel).await? {
            return Ok(if cancel.is_cancelled() {
                FlushOutcome::Cancelled
            } else {
                FlushOutcome::OutOfSync
            });
        }

        let Some(request) = client.send()? else {
            return Ok(match client.connection() {
                ConnectionState::Disconnected => FlushOutcome::Disconnected,
                _ => FlushOutcome::Flushed,
            });
        };

        let response = tokio::select! {
            _ = cancel.cancelled() => {
                client.abandon_request();
                tracing::debug!("[Collab] {} flush cancelled", client.client_id());
                return Ok(FlushOutcome::Cancelled);
            }
            response = tokio::time::timeout(timeout, channel.send(request)) => {
                response.unwrap_or(Err(TransportError::Timeout))
            }
        };

        match client.handle_response(response)? {
            SendOutcome::Confirmed { .. } | SendOutcome::OutOfSync => {}
            SendOutcome::Retry { after } => {
                if !after.is_zero() && !pause(after, cancel).await {
                    return Ok(FlushOutcome::Cancelled);
                }
            }
            SendOutcome::Disconnected => return Ok(FlushOutcome::Disconnected),
        }
    }
}

/// Fetch and apply the steps the client is missing. `false` when the
/// client is still out of sync afterwards.
async fn catch_up<C: Channel + ?Sized>(
    client: &mut CollabClient,
    channel: &C,
    cancel: &CancelToken,
) -> Result<bool, CollabError> {
    let timeout = client.config().request_timeout();
    let retry = client.config().retry.clone();
    let mut attempt = 0;
    let batches = loop {
        attempt += 1;
        let fetched = tokio::select! {
            _ = cancel.cancelled() => return Ok(false),
            fetched = tokio::time::timeout(timeout, channel.steps_since(client.version())) => {
                fetched.unwrap_or(Err(TransportError::Timeout))
            }
        };
        match fetched {
            Ok(batches) => break batches,
            Err(error) if attempt < retry.max_attempts => {
                let after = retry.delay(attempt);
                tracing::warn!(
                    "[Collab] {} catch-up failed ({}), retry {} in {:?}",
                    client.client_id(),
                    error,
                    attempt,
                    after
                );
                if !pause(after, cancel).await {
                    return Ok(false);
                }
            }
            Err(error) => return Err(error.into()),
        }
    };

    let mut applied = 0;
    for batch in batches {
        applied += client.receive(batch)?;
    }
    tracing::debug!(
        "[Collab] {} caught up with {} step(s), now at version {}",
        client.client_id(),
        applied,
        client.version()
    );
    Ok(!client.is_out_of_sync())
}

/// Sleep unless cancelled first. `false` on cancellation.
async fn pause(after: Duration, cancel: &CancelToken) -> bool {
    tokio::select! {
        _ = cancel.cancelled() => false,
        _ = tokio::time::sleep(after) => true,
    }
}
