use super::{Body, Message, Registry, StateProcessor};
use crate::subscriber::Subscriptions;
use async_trait::async_trait;
use std::time::Duration;
use tokio::sync::mpsc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TestPayload {
    Text(String),
    Echo(String),
    Echoed(String),
    Count(usize),
    // Replied to with an error
    Fail,
    // Kept unanswered until Release
    Hold,
    Release,
    Sleep(Duration),
    Notify(String),
}

#[derive(Debug, PartialEq, Eq)]
pub struct Echoed(pub String);

impl TryFrom<TestPayload> for Echoed {
    type Error = TestPayload;

    fn try_from(payload: TestPayload) -> Result<Self, Self::Error> {
        match payload {
            TestPayload::Echoed(text) => Ok(Echoed(text)),
            other => Err(other),
        }
    }
}

pub struct TestProcessor {
    received: Vec<Body<TestPayload>>,
    held: Vec<Message<TestPayload>>,
    subscriptions: Subscriptions,
    registry: Option<Registry<TestPayload>>,
    events: mpsc::UnboundedSender<Body<TestPayload>>,
    shutdown_notifier: Option<mpsc::UnboundedSender<usize>>,
    shutdown_delay: Option<Duration>,
}

impl TestProcessor {
    pub fn new() -> (TestProcessor, mpsc::UnboundedReceiver<Body<TestPayload>>) {
        let (events, receiver) = mpsc::unbounded_channel();
        (
            TestProcessor {
                received: vec![],
                held: vec![],
                subscriptions: Subscriptions::new(),
                registry: None,
                events,
                shutdown_notifier: None,
                shutdown_delay: None,
            },
            receiver,
        )
    }

    /// A processor able to notify its subscribers through `registry`.
    pub fn with_registry(
        registry: &Registry<TestPayload>,
    ) -> (TestProcessor, mpsc::UnboundedReceiver<Body<TestPayload>>) {
        let (mut processor, receiver) = TestProcessor::new();
        processor.registry = Some(registry.clone());
        (processor, receiver)
    }

    /// Reports the number of processed messages once shut down.
    pub fn notify_shutdown(mut self) -> (TestProcessor, mpsc::UnboundedReceiver<usize>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        self.shutdown_notifier = Some(sender);
        (self, receiver)
    }

    /// Makes shutdown take `delay` before reporting.
    pub fn slow_shutdown(mut self, delay: Duration) -> TestProcessor {
        self.shutdown_delay = Some(delay);
        self
    }
}

#[async_trait]
impl StateProcessor<TestPayload> for TestProcessor {
    type State = Vec<Body<TestPayload>>;

    async fn process(&mut self, message: Message<TestPayload>) {
        self.received.push(message.body.clone());
        let _ = self.events.send(message.body.clone());
        if self.subscriptions.handle_control(&message) {
            return;
        }
        match message.payload() {
            Some(TestPayload::Echo(text)) => {
                message.reply(TestPayload::Echoed(format!("returned: {}", text)));
            }
            Some(TestPayload::Count(_)) => {
                message.reply(TestPayload::Count(self.subscriptions.num_subscribers()));
            }
            Some(TestPayload::Fail) => {
                message.reply_error(anyhow::anyhow!("Forced failure"));
            }
            Some(TestPayload::Hold) => self.held.push(message),
            Some(TestPayload::Release) => {
                for held in self.held.drain(..) {
                    held.reply(TestPayload::Text("late".to_owned()));
                }
            }
            Some(TestPayload::Sleep(duration)) => tokio::time::sleep(*duration).await,
            Some(TestPayload::Notify(text)) => {
                if let (Some(registry), Some(me)) = (&self.registry, message.to.clone()) {
                    let template = Message::subscribers(me, TestPayload::Text(text.clone()));
                    self.subscriptions
                        .notify_subscribers(registry, template)
                        .await;
                }
            }
            _ => {}
        }
    }

    async fn shutdown(&mut self) {
        if let Some(delay) = self.shutdown_delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(notifier) = self.shutdown_notifier.take() {
            let _ = notifier.send(self.received.len());
        }
        self.received.clear();
    }

    fn get_state(&self) -> Self::State {
        self.received.clone()
    }
}

pub fn text(value: &str) -> TestPayload {
    TestPayload::Text(value.to_owned())
}

pub async fn next_event(
    events: &mut mpsc::UnboundedReceiver<Body<TestPayload>>,
) -> Body<TestPayload> {
    tokio::time::timeout(Duration::from_secs(5), events.recv())
        .await
        .expect("Timed out waiting for the processor")
        .expect("Processor went away")
}
