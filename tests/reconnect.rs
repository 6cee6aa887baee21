//! Reconnection behavior against a scripted connector: retry budget,
//! cooldown-throttled attempts, exhaustion, idempotent initialize, and
//! disposal.

mod support;

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use lantern_client::{Client, ConnectionState, StaticCredentials};

use support::{fast_config, wait_for, Recorder, ScriptedConnector};

fn client_with(
    refusals: usize,
) -> (
    Client,
    Arc<ScriptedConnector>,
    Arc<Recorder>,
    tokio::sync::mpsc::UnboundedReceiver<support::ServerEnd>,
) {
    let (connector, accepted) = ScriptedConnector::new(refusals);
    let handler = Recorder::new();
    let client = Client::with_connector(
        fast_config(),
        Arc::new(StaticCredentials::new("token")),
        handler.clone(),
        connector.clone(),
    );
    (client, connector, handler, accepted)
}

#[tokio::test]
async fn reconnects_until_success() {
    // Three refused attempts, then the fourth opens. maxRetries = 3
    // covers exactly that, with the budget reset afterwards.
    let (client, connector, handler, mut accepted) = client_with(3);
    client.initialize();

    let server = accepted.recv().await.expect("no connection accepted");
    assert_eq!(connector.attempts(), 4);
    wait_for(|| client.state() == ConnectionState::Open).await;
    assert_eq!(handler.connects.load(Ordering::SeqCst), 1);
    assert_eq!(handler.exhausted_count(), 0);

    // The successful open reset the budget: a close must produce a
    // fresh attempt instead of exhaustion.
    server.close(1006).await;
    let _server = accepted.recv().await.expect("no reconnect after close");
    assert_eq!(connector.attempts(), 5);
    assert_eq!(handler.exhausted_count(), 0);
}

#[tokio::test]
async fn exhaustion_fires_exactly_once() {
    let (client, connector, handler, _accepted) = client_with(usize::MAX);
    client.initialize();

    wait_for(|| handler.exhausted_count() == 1).await;
    wait_for(|| client.state() == ConnectionState::Disconnected).await;

    // Initial attempt plus three retries, then nothing more.
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(connector.attempts(), 4);
    assert_eq!(handler.exhausted_count(), 1);
    assert!(client.is_disconnected());
}

#[tokio::test]
async fn initialize_restores_the_budget_after_exhaustion() {
    let (client, connector, handler, _accepted) = client_with(usize::MAX);
    client.initialize();
    wait_for(|| handler.exhausted_count() == 1).await;
    assert_eq!(connector.attempts(), 4);

    client.initialize();
    wait_for(|| connector.attempts() == 8).await;
    wait_for(|| handler.exhausted_count() == 2).await;
}

#[tokio::test]
async fn initialize_is_idempotent_while_open() {
    let (client, connector, handler, mut accepted) = client_with(0);
    client.initialize();
    let _server = accepted.recv().await.expect("no connection accepted");
    wait_for(|| client.state() == ConnectionState::Open).await;

    client.initialize();
    client.initialize();
    tokio::time::sleep(Duration::from_millis(50)).await;

    // Still exactly one transport.
    assert_eq!(connector.attempts(), 1);
    assert_eq!(handler.connects.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn dispose_stops_reconnection() {
    let (client, connector, handler, mut accepted) = client_with(0);
    client.initialize();
    let _server = accepted.recv().await.expect("no connection accepted");
    wait_for(|| client.state() == ConnectionState::Open).await;

    client.dispose();
    wait_for(|| client.state() == ConnectionState::Disposed).await;
    assert!(client.is_disconnected());

    // The close was absorbed: no reconnect, no exhaustion.
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(connector.attempts(), 1);
    assert_eq!(handler.disconnects.load(Ordering::SeqCst), 1);
    assert_eq!(handler.exhausted_count(), 0);
}

#[tokio::test]
async fn initialize_revives_a_disposed_client() {
    let (client, connector, _handler, mut accepted) = client_with(0);
    client.initialize();
    let _server = accepted.recv().await.expect("no connection accepted");
    wait_for(|| client.state() == ConnectionState::Open).await;

    client.dispose();
    wait_for(|| client.state() == ConnectionState::Disposed).await;

    client.initialize();
    let _server = accepted.recv().await.expect("no connection after revival");
    wait_for(|| client.state() == ConnectionState::Open).await;
    assert_eq!(connector.attempts(), 2);
}

#[tokio::test]
async fn credentials_are_fetched_for_every_connection() {
    let (client, _connector, _handler, mut accepted) = client_with(0);
    client.initialize();

    let mut server = accepted.recv().await.expect("no connection accepted");
    let envelope = server.recv_envelope().await;
    assert_eq!(envelope.bearer_token.as_deref(), Some("token"));

    // Reconnect: authentication is repeated on the new channel.
    server.close(1001).await;
    let mut server = accepted.recv().await.expect("no reconnect after close");
    let envelope = server.recv_envelope().await;
    assert_eq!(envelope.bearer_token.as_deref(), Some("token"));
}
