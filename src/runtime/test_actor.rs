use super::{
    test_util::{next_event, text, TestPayload, TestProcessor},
    ActorError, Address, Body, Message, Registry,
};
use crate::config::RuntimeConfig;
use std::time::{Duration, Instant};

fn registry_with_capacity(mailbox_capacity: usize) -> Registry<TestPayload> {
    let mut config = RuntimeConfig::default();
    config.runtime.mailbox_capacity = mailbox_capacity;
    Registry::new(config)
}

fn address() -> Address {
    Address::new("test", "actor")
}

#[tokio::test]
async fn test_fifo_processing() {
    let registry: Registry<TestPayload> = Registry::default();
    let (processor, mut events) = TestProcessor::new();
    let actor = registry.register(address(), processor).await.unwrap();
    for i in 0..50 {
        actor
            .send(Message::new(address(), None, text(&i.to_string())))
            .await
            .unwrap();
    }
    for i in 0..50 {
        assert_eq!(
            next_event(&mut events).await,
            Body::Payload(text(&i.to_string()))
        );
    }
    assert_eq!(actor.get_state().await.unwrap().len(), 50);
}

#[tokio::test]
async fn test_deactivate_and_reactivate() {
    let registry: Registry<TestPayload> = Registry::default();
    let (processor, mut events) = TestProcessor::new();
    let actor = registry.register(address(), processor).await.unwrap();
    assert!(!actor.is_closed());

    actor.deactivate();
    actor.deactivate();
    assert!(actor.is_closed());
    let error = actor
        .send(Message::new(address(), None, text("rejected")))
        .await
        .expect_err("Deactivated actor accepted a message");
    assert!(matches!(error, ActorError::InboxClosed(_)));

    actor.activate();
    actor.activate();
    assert!(!actor.is_closed());
    actor
        .send(Message::new(address(), None, text("accepted")))
        .await
        .unwrap();
    assert_eq!(next_event(&mut events).await, Body::Payload(text("accepted")));
    // A second consumer would have raced the first one for this message
    actor
        .send(Message::new(address(), None, text("again")))
        .await
        .unwrap();
    assert_eq!(next_event(&mut events).await, Body::Payload(text("again")));
    assert_eq!(actor.get_state().await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_request_response() {
    let registry: Registry<TestPayload> = Registry::default();
    let (processor, _events) = TestProcessor::new();
    let actor = registry.register(address(), processor).await.unwrap();
    let envelope = actor
        .send_and_await_response(Message::with_response(
            address(),
            Some(Address::new("test", "caller")),
            TestPayload::Echo("ping".to_owned()),
        ))
        .await
        .unwrap();
    assert_eq!(
        envelope.body,
        Some(TestPayload::Echoed("returned: ping".to_owned()))
    );
    assert_eq!(envelope.from, Some(address()));
    assert_eq!(envelope.to, Some(Address::new("test", "caller")));
}

#[tokio::test]
async fn test_response_timeout_and_late_reply() {
    let registry: Registry<TestPayload> = Registry::default();
    let (processor, mut events) = TestProcessor::new();
    let actor = registry.register(address(), processor).await.unwrap();

    let mut request = Message::with_response(address(), None, TestPayload::Hold);
    request.set_timeout(Duration::from_millis(10));
    let start = Instant::now();
    let error = actor
        .send_and_await_response(request)
        .await
        .expect_err("Held request was answered");
    assert!(start.elapsed() < Duration::from_millis(500));
    assert!(matches!(error, ActorError::ResponseTimeout { .. }));
    assert_eq!(next_event(&mut events).await, Body::Payload(TestPayload::Hold));

    // The late reply goes nowhere without blocking the processor
    actor
        .send(Message::new(address(), None, TestPayload::Release))
        .await
        .unwrap();
    assert_eq!(next_event(&mut events).await, Body::Payload(TestPayload::Release));
    let envelope = actor
        .send_and_await_response(Message::with_response(
            address(),
            None,
            TestPayload::Echo("still alive".to_owned()),
        ))
        .await
        .unwrap();
    assert_eq!(
        envelope.body,
        Some(TestPayload::Echoed("returned: still alive".to_owned()))
    );
}

#[tokio::test]
async fn test_unanswered_request() {
    let registry: Registry<TestPayload> = Registry::default();
    let (processor, _events) = TestProcessor::new();
    let actor = registry.register(address(), processor).await.unwrap();
    let start = Instant::now();
    let error = actor
        .send_and_await_response(Message::with_response(address(), None, text("ignored")))
        .await
        .expect_err("Ignored request was answered");
    assert!(matches!(error, ActorError::ResponseTimeout { .. }));
    // The processor dropped the request, no need to wait for the deadline
    assert!(start.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn test_backpressure() {
    let registry = registry_with_capacity(1);
    let (processor, mut events) = TestProcessor::new();
    let actor = registry.register(address(), processor).await.unwrap();
    actor
        .send(Message::new(
            address(),
            None,
            TestPayload::Sleep(Duration::from_millis(300)),
        ))
        .await
        .unwrap();
    next_event(&mut events).await;
    actor
        .send(Message::new(address(), None, text("queued")))
        .await
        .unwrap();
    let blocked = tokio::time::timeout(
        Duration::from_millis(50),
        actor.send(Message::new(address(), None, text("blocked"))),
    )
    .await;
    assert!(blocked.is_err(), "Send to a full mailbox didn't wait");

    actor
        .send(Message::new(address(), None, text("after")))
        .await
        .unwrap();
    assert_eq!(next_event(&mut events).await, Body::Payload(text("queued")));
    assert_eq!(next_event(&mut events).await, Body::Payload(text("after")));
}

#[tokio::test]
async fn test_terminate() {
    let registry: Registry<TestPayload> = Registry::default();
    let (processor, mut events) = TestProcessor::new();
    let (processor, mut shutdown) = processor.notify_shutdown();
    let actor = registry.register(address(), processor).await.unwrap();
    actor
        .send(Message::new(address(), None, text("one")))
        .await
        .unwrap();
    next_event(&mut events).await;

    actor.terminate().await;
    assert_eq!(shutdown.recv().await, Some(1));
    assert!(actor.is_closed());
    assert!(actor.get_state().await.is_none());
    assert!(!registry.contains(&address()).await);
    assert_eq!(registry.num_actors().await, 0);
    let error = actor
        .send(Message::new(address(), None, text("two")))
        .await
        .expect_err("Terminated actor accepted a message");
    assert!(matches!(error, ActorError::InboxClosed(_)));

    actor.terminate().await;
    actor.activate();
    assert!(actor.is_closed());
    assert_eq!(shutdown.recv().await, None);
}

#[tokio::test]
async fn test_terminate_waits_for_consumer() {
    let registry: Registry<TestPayload> = Registry::default();
    let (processor, mut events) = TestProcessor::new();
    let (processor, mut shutdown) = processor.notify_shutdown();
    let actor = registry.register(address(), processor).await.unwrap();
    actor
        .send(Message::new(
            address(),
            None,
            TestPayload::Sleep(Duration::from_millis(100)),
        ))
        .await
        .unwrap();
    for i in 0..5 {
        actor
            .send(Message::new(address(), None, text(&i.to_string())))
            .await
            .unwrap();
    }
    next_event(&mut events).await;

    let start = Instant::now();
    actor.terminate().await;
    // The sleeping message finished, the queued ones were discarded
    assert!(start.elapsed() >= Duration::from_millis(50));
    assert_eq!(shutdown.recv().await, Some(1));
}

#[tokio::test]
async fn test_terminate_leaves_new_registration_alone() {
    let registry: Registry<TestPayload> = Registry::default();
    let (processor, _events) = TestProcessor::new();
    let old = registry.register(address(), processor).await.unwrap();
    registry.unregister(&address()).await;
    let (processor, _new_events) = TestProcessor::new();
    let _new = registry.register(address(), processor).await.unwrap();

    old.terminate().await;
    assert!(registry.contains(&address()).await);
}
