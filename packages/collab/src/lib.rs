//! # Quire Collab
//!
//! Keeps several editors on one document.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────┐   SendRequest    ┌──────────────────────┐
//! │ CollabClient         │ ───────────────→ │ Hub                  │
//! │  - unconfirmed steps │ ←─────────────── │  - version counter   │
//! │  - held broadcasts   │   SendResponse   │  - step log          │
//! │  - retry state       │                  │  - connected clients │
//! └──────────────────────┘ ←─────────────── └──────────────────────┘
//!            ↑                 Broadcast
//!            │ flush (timeouts, backoff, cancellation)
//!      Channel trait
//!
//! ┌─────────────────────────────────────────────┐
//! │ VersionStore + rebase_changes               │
//! │  - versions named by XOR of transition ids  │
//! │  - concurrent transitions merged by client  │
//! │    and replayed in one order everywhere     │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! ## Core Principles
//!
//! 1. **Sans-IO client**: [`CollabClient`] only changes state; moving
//!    messages is the caller's job, or [`flush`]'s
//! 2. **Rebase, don't merge**: a client whose steps lost the race maps them
//!    over the winner's and tries again
//! 3. **Order-free version ids**: replicas applying the same transitions
//!    agree on the id whatever order the transitions arrived in
//!
//! ## Usage
//!
//! ```rust,ignore
//! use quire_collab::{flush, CancelToken, ClientId, CollabClient, CollabConfig, Hub};
//!
//! let hub = Hub::new(registry.clone(), doc);
//! let connection = hub.connect(ClientId(1)).await;
//! let editor = EditorState::new(registry, connection.doc);
//! let mut client = CollabClient::new(ClientId(1), editor, connection.version, CollabConfig::default());
//!
//! client.apply_local(&tr)?;
//! flush(&mut client, &hub, &CancelToken::never()).await?;
//! ```

mod channel;
mod client;
mod config;
mod errors;
mod hub;
mod ids;
mod rebase;
mod versions;
mod wire;

pub use channel::{cancel_pair, flush, CancelHandle, CancelToken, Channel, FlushOutcome};
pub use client::{CollabClient, ConnectionState, SendOutcome};
pub use config::{CollabConfig, RetryPolicy};
pub use errors::{CollabError, TransportError};
pub use hub::{Connection, Hub};
pub use ids::{ClientId, VersionId};
pub use rebase::{map_position, merge_change_sets, rebase_changes, Authored, RebaseResult};
pub use versions::{Transition, VersionStore};
pub use wire::{decode_steps, encode_steps, Broadcast, SendRequest, SendResponse};
