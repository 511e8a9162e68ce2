use std::time::Duration;
use thiserror::Error;

/// An error occuring while registering actors or exchanging messages with them.
#[derive(Debug, Error)]
pub enum ActorError {
    /// An address part is empty.
    #[error("actor address is invalid: {0:?}")]
    AddressInvalid(String),

    /// Another actor holds the address.
    #[error("actor address already registered: {0}")]
    AlreadyRegistered(String),

    /// Nothing is registered under the destination.
    #[error("actor not found: {0}")]
    ActorNotFound(String),

    /// The recipient is deactivated or terminated.
    #[error("actor {0} has its inbox closed")]
    InboxClosed(String),

    /// No reply arrived in time, or the request was dropped unanswered.
    #[error("message to {address} has not been answered within {timeout:?}")]
    ResponseTimeout {
        /// The recipient of the request.
        address: String,
        /// How long the requester waited.
        timeout: Duration,
    },

    /// The reply has no body, or one of another type.
    #[error("response body is not a {expected}")]
    ResponseTypeMismatch {
        /// Name of the requested response type.
        expected: &'static str,
    },

    /// The responder reported a failure.
    #[error("actor replied with an error: {0}")]
    Replied(anyhow::Error),
}
