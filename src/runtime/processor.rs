use super::Message;
use async_trait::async_trait;

/// The business logic bound to an actor.
///
/// A processor owns the actor's state. [process](StateProcessor::process) is
/// only ever called from the actor's single consumer task, one message at a
/// time and in the order the messages were enqueued, so the state needs no
/// locking of its own.
///
/// # Examples
///
/// ```rust
/// use async_trait::async_trait;
/// use mailroom::runtime::{Message, StateProcessor};
///
/// struct Counter(u64);
///
/// #[async_trait]
/// impl StateProcessor<u64> for Counter {
///     type State = u64;
///
///     async fn process(&mut self, message: Message<u64>) {
///         if let Some(increment) = message.payload() {
///             self.0 += increment;
///         }
///         if message.expects_response() {
///             message.reply(self.0);
///         }
///     }
///
///     fn get_state(&self) -> u64 {
///         self.0
///     }
/// }
/// ```
#[async_trait]
pub trait StateProcessor<P>: Send + 'static {
    /// Diagnostic snapshot type returned by [get_state](StateProcessor::get_state).
    type State: Send;

    /// Handles a single message. If the message
    /// [expects a response](Message::expects_response), the processor should
    /// publish one with [Message::reply] or [Message::respond].
    async fn process(&mut self, message: Message<P>);

    /// Releases owned resources once the actor is terminated. The consumer
    /// task has stopped by the time this is called.
    async fn shutdown(&mut self) {}

    /// A snapshot of the state, for inspection from outside the actor.
    fn get_state(&self) -> Self::State;
}
