//! Clients talking to a hub: convergence, rejected sends, retries,
//! timeouts and cancellation.

use anyhow::Result;
use async_trait::async_trait;
use quire_collab::{
    cancel_pair, flush, Broadcast, CancelToken, Channel, ClientId, CollabClient, CollabConfig, ConnectionState,
    FlushOutcome, Hub, RetryPolicy, SendRequest, SendResponse, TransportError,
};
use quire_editor::EditorState;
use quire_model::{doc, p, Node, Pos};
use quire_transform::StepRegistry;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn registry() -> Arc<StepRegistry> {
    Arc::new(StepRegistry::standard())
}

fn quick_config() -> CollabConfig {
    CollabConfig {
        request_timeout_ms: 200,
        retry: RetryPolicy {
            max_attempts: 3,
            base_delay_ms: 1,
            max_delay_ms: 5,
        },
        ..CollabConfig::default()
    }
}

async fn join(hub: &Hub, id: u64, config: CollabConfig) -> (CollabClient, mpsc::Receiver<Broadcast>) {
    let connection = hub.connect(ClientId(id)).await;
    let editor = EditorState::new(registry(), connection.doc);
    let client = CollabClient::new(ClientId(id), editor, connection.version, config);
    (client, connection.receiver)
}

fn type_text(client: &mut CollabClient, offset: usize, text: &str) -> Result<()> {
    let mut tr = client.transform();
    tr.insert_text(&Pos::new(vec![0], offset), text);
    client.apply_local(&tr)?;
    Ok(())
}

fn end_of_first(client: &CollabClient) -> usize {
    client.doc().child(0).map(Node::size).unwrap_or(0)
}

fn deliver(client: &mut CollabClient, receiver: &mut mpsc::Receiver<Broadcast>) -> Result<usize> {
    let mut applied = 0;
    while let Ok(batch) = receiver.try_recv() {
        applied += client.receive(batch)?;
    }
    Ok(applied)
}

/// Hub access that fails the next `failures` requests.
struct FlakyChannel {
    hub: Hub,
    failures: AtomicU32,
}

impl FlakyChannel {
    fn new(hub: Hub, failures: u32) -> Self {
        Self {
            hub,
            failures: AtomicU32::new(failures),
        }
    }

    fn fail(&self) -> bool {
        self.failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl Channel for FlakyChannel {
    async fn send(&self, request: SendRequest) -> Result<SendResponse, TransportError> {
        if self.fail() {
            return Err(TransportError::Closed);
        }
        Channel::send(&self.hub, request).await
    }

    async fn steps_since(&self, version: u64) -> Result<Vec<Broadcast>, TransportError> {
        Channel::steps_since(&self.hub, version).await
    }
}

/// Hub access that answers after `delay`.
struct SlowChannel {
    hub: Hub,
    delay: Duration,
}

#[async_trait]
impl Channel for SlowChannel {
    async fn send(&self, request: SendRequest) -> Result<SendResponse, TransportError> {
        tokio::time::sleep(self.delay).await;
        Channel::send(&self.hub, request).await
    }

    async fn steps_since(&self, version: u64) -> Result<Vec<Broadcast>, TransportError> {
        Channel::steps_since(&self.hub, version).await
    }
}

#[tokio::test]
async fn test_two_clients_converge() -> Result<()> {
    init_tracing();
    let hub = Hub::new(registry(), doc![p!["hello"]].node);
    let (mut a, mut a_rx) = join(&hub, 1, quick_config()).await;
    let (mut b, mut b_rx) = join(&hub, 2, quick_config()).await;
    let never = CancelToken::never();

    type_text(&mut a, 0, "A")?;
    type_text(&mut b, 5, "B")?;

    assert_eq!(flush(&mut a, &hub, &never).await?, FlushOutcome::Flushed);
    // b's first send is rejected; it catches up, rebases and resends
    assert_eq!(flush(&mut b, &hub, &never).await?, FlushOutcome::Flushed);
    assert_eq!(b.doc(), &doc![p!["AhelloB"]].node);

    assert_eq!(deliver(&mut a, &mut a_rx)?, 1);
    assert_eq!(deliver(&mut b, &mut b_rx)?, 0);

    let expected = doc![p!["AhelloB"]].node;
    assert_eq!(a.doc(), &expected);
    assert_eq!(hub.doc().await, expected);
    assert_eq!(a.version(), 2);
    assert_eq!(b.version(), 2);
    assert!(a.unconfirmed().is_empty());
    assert!(b.unconfirmed().is_empty());
    Ok(())
}

#[tokio::test]
async fn test_three_clients_interleaved() -> Result<()> {
    init_tracing();
    let hub = Hub::new(registry(), doc![p!["ab"]].node);
    let mut clients = Vec::new();
    for id in 1..=3 {
        clients.push(join(&hub, id, quick_config()).await);
    }
    let never = CancelToken::never();

    for round in 0..3 {
        for (index, (client, _)) in clients.iter_mut().enumerate() {
            let offset = if index % 2 == 0 { 0 } else { end_of_first(client) };
            type_text(client, offset, &format!("{}{}", index, round))?;
        }
        // deliver only what has arrived so far, so later clients lag behind
        for (client, receiver) in clients.iter_mut() {
            assert_eq!(flush(client, &hub, &never).await?, FlushOutcome::Flushed);
            deliver(client, receiver)?;
        }
    }
    for (client, receiver) in clients.iter_mut() {
        deliver(client, receiver)?;
    }

    let final_doc = hub.doc().await;
    let final_version = hub.version().await;
    assert_eq!(final_version, 9);
    assert_eq!(final_doc.text_content().len(), 2 + 9 * 2);
    for (client, _) in &clients {
        assert_eq!(client.doc(), &final_doc);
        assert_eq!(client.version(), final_version);
    }
    Ok(())
}

#[tokio::test]
async fn test_undo_after_remote_edit() -> Result<()> {
    init_tracing();
    let hub = Hub::new(registry(), doc![p!["hello"]].node);
    let (mut a, mut a_rx) = join(&hub, 1, quick_config()).await;
    let (mut b, mut b_rx) = join(&hub, 2, quick_config()).await;
    let never = CancelToken::never();

    type_text(&mut a, 5, "X")?;
    flush(&mut a, &hub, &never).await?;
    deliver(&mut b, &mut b_rx)?;

    type_text(&mut b, 0, "Y")?;
    flush(&mut b, &hub, &never).await?;
    deliver(&mut a, &mut a_rx)?;
    assert_eq!(a.doc(), &doc![p!["YhelloX"]].node);

    assert!(a.undo()?);
    assert_eq!(a.doc(), &doc![p!["Yhello"]].node);
    flush(&mut a, &hub, &never).await?;
    deliver(&mut b, &mut b_rx)?;

    assert_eq!(b.doc(), &doc![p!["Yhello"]].node);
    assert_eq!(hub.doc().await, doc![p!["Yhello"]].node);
    Ok(())
}

#[tokio::test]
async fn test_transport_failures_are_retried() -> Result<()> {
    init_tracing();
    let hub = Hub::new(registry(), doc![p!["hello"]].node);
    let (mut a, _a_rx) = join(&hub, 1, quick_config()).await;
    let channel = FlakyChannel::new(hub.clone(), 2);

    type_text(&mut a, 0, "A")?;
    let outcome = flush(&mut a, &channel, &CancelToken::never()).await?;
    assert_eq!(outcome, FlushOutcome::Flushed);
    assert_eq!(a.connection(), ConnectionState::Connected);
    assert_eq!(hub.doc().await, doc![p!["Ahello"]].node);
    Ok(())
}

#[tokio::test]
async fn test_disconnect_after_retries_run_out() -> Result<()> {
    init_tracing();
    let hub = Hub::new(registry(), doc![p!["hello"]].node);
    let (mut a, _a_rx) = join(&hub, 1, quick_config()).await;
    let channel = FlakyChannel::new(hub.clone(), 10);
    let never = CancelToken::never();

    type_text(&mut a, 0, "A")?;
    assert_eq!(flush(&mut a, &channel, &never).await?, FlushOutcome::Disconnected);
    assert_eq!(a.connection(), ConnectionState::Disconnected);
    assert_eq!(hub.version().await, 0);

    // editing continues offline
    type_text(&mut a, 1, "B")?;
    assert_eq!(a.unconfirmed().len(), 2);

    channel.failures.store(0, Ordering::SeqCst);
    a.reconnect();
    assert_eq!(flush(&mut a, &channel, &never).await?, FlushOutcome::Flushed);
    assert_eq!(hub.doc().await, doc![p!["ABhello"]].node);
    Ok(())
}

#[tokio::test]
async fn test_slow_hub_times_out() -> Result<()> {
    init_tracing();
    let hub = Hub::new(registry(), doc![p!["hello"]].node);
    let config = CollabConfig {
        request_timeout_ms: 10,
        retry: RetryPolicy {
            max_attempts: 1,
            ..RetryPolicy::default()
        },
        ..CollabConfig::default()
    };
    let (mut a, _a_rx) = join(&hub, 1, config).await;
    let channel = SlowChannel {
        hub: hub.clone(),
        delay: Duration::from_secs(5),
    };

    type_text(&mut a, 0, "A")?;
    let outcome = flush(&mut a, &channel, &CancelToken::never()).await?;
    assert_eq!(outcome, FlushOutcome::Disconnected);
    assert_eq!(hub.version().await, 0);
    Ok(())
}

#[tokio::test]
async fn test_flush_can_be_cancelled() -> Result<()> {
    init_tracing();
    let hub = Hub::new(registry(), doc![p!["hello"]].node);
    let (mut a, _a_rx) = join(&hub, 1, quick_config()).await;
    let channel = SlowChannel {
        hub: hub.clone(),
        delay: Duration::from_secs(5),
    };
    let (handle, token) = cancel_pair();

    type_text(&mut a, 0, "A")?;
    let (outcome, ()) = tokio::join!(flush(&mut a, &channel, &token), async {
        tokio::time::sleep(Duration::from_millis(10)).await;
        handle.cancel();
    });
    assert_eq!(outcome?, FlushOutcome::Cancelled);
    assert!(!a.is_sending());
    assert_eq!(a.unconfirmed().len(), 1);
    assert_eq!(a.connection(), ConnectionState::Connected);
    Ok(())
}

#[tokio::test]
async fn test_late_joiner_starts_from_hub_state() -> Result<()> {
    init_tracing();
    let hub = Hub::new(registry(), doc![p!["hello"]].node);
    let (mut a, _a_rx) = join(&hub, 1, quick_config()).await;
    type_text(&mut a, 5, "!")?;
    flush(&mut a, &hub, &CancelToken::never()).await?;

    let (c, _c_rx) = join(&hub, 3, quick_config()).await;
    assert_eq!(c.version(), 1);
    assert_eq!(c.doc(), &doc![p!["hello!"]].node);
    assert_eq!(hub.client_count().await, 2);
    Ok(())
}
