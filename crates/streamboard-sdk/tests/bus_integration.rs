//! Bus integration tests.
//!
//! Two buses connected by an in-memory channel pair, each running its own
//! dispatch loop, exchanging events and calls.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use serde_json::{Value, json};
use tokio::sync::mpsc;

use streamboard_sdk::types::{Envelope, Inbound};
use streamboard_sdk::{Bus, ChannelTransport, SdkError};

fn connected() -> (Bus, Bus) {
    let (left, right) = ChannelTransport::pair_with_identities(Some("plugin"), Some("host"));
    let plugin = Bus::new(left.transport);
    plugin.listen(left.inbound);
    let host = Bus::new(right.transport);
    host.listen(right.inbound);
    (plugin, host)
}

/// Test 1: concurrent calls on one channel each get their own answer.
#[tokio::test]
async fn test_concurrent_invokes_do_not_cross_talk() {
    let (plugin, host) = connected();
    host.handle("echo", |args| async move {
        let n = args.first().and_then(Value::as_u64).unwrap_or(0);
        // Later requests answer first.
        tokio::time::sleep(Duration::from_millis(60 - n * 20)).await;
        json!(n * 10)
    })
    .unwrap();

    let (a, b, c) = tokio::join!(
        plugin.invoke("echo", vec![json!(0)]),
        plugin.invoke("echo", vec![json!(1)]),
        plugin.invoke("echo", vec![json!(2)]),
    );
    assert_eq!(a.unwrap(), json!(0));
    assert_eq!(b.unwrap(), json!(10));
    assert_eq!(c.unwrap(), json!(20));
    assert_eq!(plugin.pending_calls(), 0);
}

/// Test 2: a handler may itself call back across the channel.
#[tokio::test]
async fn test_handler_can_invoke_peer() {
    let (plugin, host) = connected();
    plugin
        .handle("name", |_| async { json!("counter") })
        .unwrap();
    let host_clone = host.clone();
    host.handle("greet", move |_| {
        let host = host_clone.clone();
        async move {
            let name = host.invoke("name", vec![]).await.unwrap_or(Value::Null);
            json!(format!("hello {}", name.as_str().unwrap_or("?")))
        }
    })
    .unwrap();

    let reply = plugin.invoke("greet", vec![]).await.unwrap();
    assert_eq!(reply, json!("hello counter"));
}

/// Test 3: prefixed views talk on qualified names and tear down only their
/// own registrations.
#[tokio::test]
async fn test_prefixed_views_are_isolated() {
    let (plugin, host) = connected();
    let (tx, mut rx) = mpsc::unbounded_channel();

    let u1 = plugin.prefix("u1");
    let u2 = plugin.prefix("u2");
    let tx1 = tx.clone();
    u1.on("pressDown", move |_| {
        let _ = tx1.send("u1");
    });
    u2.on("pressDown", move |_| {
        let _ = tx.send("u2");
    });
    u1.handle("stop", |_| async { json!(true) }).unwrap();

    host.send("u2/pressDown", vec![]).unwrap();
    assert_eq!(rx.recv().await, Some("u2"));

    u1.remove_all_listeners(None);
    u1.remove_handler(None);
    assert_eq!(plugin.listener_count("u1/pressDown"), 0);
    assert_eq!(plugin.listener_count("u2/pressDown"), 1);
    assert!(u1.handler_names().is_empty());

    host.send("u1/pressDown", vec![]).unwrap();
    host.send("u2/pressDown", vec![]).unwrap();
    assert_eq!(rx.recv().await, Some("u2"));
}

/// Test 4: an unanswered call with a timeout fails and leaves nothing
/// pending.
#[tokio::test]
async fn test_unanswered_call_times_out() {
    let (plugin, _host) = connected();
    let err = plugin
        .invoke_timeout("nobody", vec![], Duration::from_millis(50))
        .await
        .unwrap_err();
    assert!(matches!(err, SdkError::NoResponse { ref channel, .. } if channel == "nobody"));
    assert_eq!(plugin.pending_calls(), 0);
}

/// Test 5: outstanding calls fail once the channel closes.
#[tokio::test]
async fn test_closed_channel_fails_pending_calls() {
    let (left, right) = ChannelTransport::pair();
    let plugin = Bus::new(left.transport);
    plugin.listen(left.inbound);

    let bus = plugin.clone();
    let call = tokio::spawn(async move { bus.invoke("ready", vec![]).await });
    while plugin.pending_calls() == 0 {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    drop(right);

    let err = call.await.unwrap().unwrap_err();
    assert!(matches!(err, SdkError::ChannelClosed));
}

/// Test 6: frames from an unexpected sender are dropped once an endpoint
/// is bound.
#[tokio::test]
async fn test_foreign_sender_is_dropped() {
    let (left, _right) = ChannelTransport::pair();
    let bus = Bus::new(left.transport);
    let seen = Arc::new(AtomicUsize::new(0));
    let s = Arc::clone(&seen);
    bus.on("settings", move |_| {
        s.fetch_add(1, Ordering::SeqCst);
    });

    let frame = |sender: &str| Inbound::from_sender(sender, Envelope::event("settings", vec![]));

    bus.dispatch(frame("intruder"));
    assert_eq!(seen.load(Ordering::SeqCst), 1, "unbound bus accepts everyone");

    bus.bind_endpoint("host");
    bus.dispatch(frame("intruder"));
    assert_eq!(seen.load(Ordering::SeqCst), 1);
    bus.dispatch(frame("host"));
    bus.dispatch(Inbound::anonymous(Envelope::event("settings", vec![])));
    assert_eq!(seen.load(Ordering::SeqCst), 3);
}
