//! Messages exchanged between actors and the reply slots attached to them.

use super::{
    address::{display_address, Address},
    lock,
};
use std::{
    fmt,
    sync::{Arc, Mutex},
    time::Duration,
};
use tokio::sync::oneshot;

/// How long a requester waits for a reply unless [Message::set_timeout] says otherwise.
pub const DEFAULT_RESPONSE_TIMEOUT: Duration = Duration::from_secs(60);

/// The body of a [Message].
///
/// Application payloads travel as [Body::Payload]. The subscription control
/// bodies are routed like any other message and interpreted by processors
/// which keep [Subscriptions](crate::subscriber::Subscriptions).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Body<P> {
    /// An application message.
    Payload(P),
    /// The sender wants to be notified by the recipient.
    AddSubscription,
    /// The sender no longer wants to be notified by the recipient.
    RemoveSubscription,
}

/// A reply to a [Message], addressed from the original recipient back to the
/// original sender.
#[derive(Debug)]
pub struct ReturnEnvelope<P> {
    /// The responder.
    pub from: Option<Address>,
    /// The requester.
    pub to: Option<Address>,
    /// The reply, None when the responder failed.
    pub body: Option<P>,
    /// Set when the responder failed to handle the request.
    pub error: Option<anyhow::Error>,
}

impl<P> ReturnEnvelope<P> {
    /// A reply to `original`, with its sender and recipient swapped.
    pub fn new(
        body: Option<P>,
        original: &Message<P>,
        error: Option<anyhow::Error>,
    ) -> ReturnEnvelope<P> {
        ReturnEnvelope {
            from: original.to.clone(),
            to: original.from.clone(),
            body,
            error,
        }
    }
}

pub(crate) type ResponseReceiver<P> = oneshot::Receiver<ReturnEnvelope<P>>;

/// A single-use reply slot.
///
/// Every clone of a message shares the same slot, so the first reply wins and
/// any later one is discarded. Sending on a [oneshot] never blocks, which
/// means a responder answering after the requester gave up just gets its
/// reply dropped.
struct ResponseSlot<P>(Arc<Mutex<Option<oneshot::Sender<ReturnEnvelope<P>>>>>);

impl<P> ResponseSlot<P> {
    fn new() -> (ResponseSlot<P>, ResponseReceiver<P>) {
        let (sender, receiver) = oneshot::channel();
        (ResponseSlot(Arc::new(Mutex::new(Some(sender)))), receiver)
    }

    fn take(&self) -> Option<oneshot::Sender<ReturnEnvelope<P>>> {
        lock(&self.0).take()
    }
}

impl<P> Clone for ResponseSlot<P> {
    fn clone(&self) -> Self {
        ResponseSlot(self.0.clone())
    }
}

/// The unit of communication between actors.
pub struct Message<P> {
    /// The sender, if it has an address at all.
    pub from: Option<Address>,
    /// The recipient. Only subscriber templates leave it empty.
    pub to: Option<Address>,
    /// What the message carries.
    pub body: Body<P>,
    response: Option<ResponseSlot<P>>,
    response_receiver: Option<ResponseReceiver<P>>,
    timeout: Duration,
}

impl<P> Message<P> {
    fn build(from: Option<Address>, to: Option<Address>, body: Body<P>) -> Message<P> {
        Message {
            from,
            to,
            body,
            response: None,
            response_receiver: None,
            timeout: DEFAULT_RESPONSE_TIMEOUT,
        }
    }

    /// A fire-and-forget message.
    pub fn new(to: Address, from: Option<Address>, payload: P) -> Message<P> {
        Message::build(from, Some(to), Body::Payload(payload))
    }

    /// A message whose sender will wait for a reply.
    ///
    /// A reply slot is allocated right away and the timeout is set to
    /// [DEFAULT_RESPONSE_TIMEOUT].
    pub fn with_response(to: Address, from: Option<Address>, payload: P) -> Message<P> {
        let mut message = Message::new(to, from, payload);
        let (slot, receiver) = ResponseSlot::new();
        message.response = Some(slot);
        message.response_receiver = Some(receiver);
        message
    }

    /// Asks the `notifier` to add `subscriber` to its subscriptions.
    pub fn add_subscription(subscriber: Address, notifier: Address) -> Message<P> {
        Message::build(Some(subscriber), Some(notifier), Body::AddSubscription)
    }

    /// Asks the `notifier` to remove `subscriber` from its subscriptions.
    pub fn remove_subscription(subscriber: Address, notifier: Address) -> Message<P> {
        Message::build(Some(subscriber), Some(notifier), Body::RemoveSubscription)
    }

    /// A template for notifying subscribers, without a destination yet.
    pub fn subscribers(from: Address, payload: P) -> Message<P> {
        Message::build(Some(from), None, Body::Payload(payload))
    }

    /// The application payload, None for subscription control messages.
    pub fn payload(&self) -> Option<&P> {
        match &self.body {
            Body::Payload(payload) => Some(payload),
            _ => None,
        }
    }

    /// Whether the sender is (or was) waiting for a reply.
    pub fn expects_response(&self) -> bool {
        self.response.is_some()
    }

    /// How long the sender waits for the reply.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Overrides [DEFAULT_RESPONSE_TIMEOUT] for this message.
    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }

    /// Publishes a reply for the sender of this message.
    ///
    /// Returns false when the reply went nowhere: the message did not expect
    /// a response, it has already been answered or the requester is no longer
    /// waiting.
    pub fn respond(&self, envelope: ReturnEnvelope<P>) -> bool {
        let recipient = display_address(self.to.as_ref());
        let sender = match &self.response {
            Some(slot) => slot.take(),
            None => {
                log::warn!("{} replied to a message which does not expect a response", recipient);
                return false;
            }
        };
        match sender {
            Some(sender) => {
                if sender.send(envelope).is_err() {
                    log::warn!(
                        "{} reply discarded (requester went away?)",
                        recipient
                    );
                    return false;
                }
                true
            }
            None => {
                log::warn!("{} reply discarded, message already answered", recipient);
                false
            }
        }
    }

    /// Replies with a body. See [Message::respond].
    pub fn reply(&self, body: P) -> bool {
        self.respond(ReturnEnvelope::new(Some(body), self, None))
    }

    /// Replies with an error instead of a body. See [Message::respond].
    pub fn reply_error(&self, error: anyhow::Error) -> bool {
        self.respond(ReturnEnvelope::new(None, self, Some(error)))
    }

    /// Hands the receiving side of the reply slot to the requester.
    ///
    /// Messages built without a response (or whose receiver was already
    /// handed out) get a fresh slot.
    pub(crate) fn prepare_response(&mut self) -> ResponseReceiver<P> {
        if let Some(receiver) = self.response_receiver.take() {
            return receiver;
        }
        let (slot, receiver) = ResponseSlot::new();
        self.response = Some(slot);
        receiver
    }

    /// Drops the receiving side so that replies to fire-and-forget sends are
    /// reported as unanswered instead of vanishing into the message itself.
    pub(crate) fn detach_response(&mut self) {
        self.response_receiver = None;
    }
}

impl<P: Clone> Message<P> {
    /// A copy of this message addressed to `to`, sharing the reply slot.
    pub fn with_destination(&self, to: Address) -> Message<P> {
        let mut copy = self.clone();
        copy.to = Some(to);
        copy
    }
}

// The reply receiver is owned by the requester and never cloned.
impl<P: Clone> Clone for Message<P> {
    fn clone(&self) -> Self {
        Message {
            from: self.from.clone(),
            to: self.to.clone(),
            body: self.body.clone(),
            response: self.response.clone(),
            response_receiver: None,
            timeout: self.timeout,
        }
    }
}

impl<P: fmt::Debug> fmt::Debug for Message<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Message")
            .field("from", &self.from)
            .field("to", &self.to)
            .field("body", &self.body)
            .field("expects_response", &self.expects_response())
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl<P: fmt::Debug> fmt::Display for Message<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "from: {} to: {} with body: {:?}",
            display_address(self.from.as_ref()),
            display_address(self.to.as_ref()),
            self.body
        )
    }
}
