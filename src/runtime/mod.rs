//! An in-process actor runtime on top of Tokio tasks.
//!
//! Actors are addressed by an [Address] and registered in a [Registry], which
//! routes [Message]s to their mailboxes. Each actor has exactly one task
//! consuming its mailbox, which hands the messages to the actor's
//! [StateProcessor] in arrival order.

mod actor;
mod address;
mod error;
mod message;
mod processor;
mod registry;

#[doc(inline)]
pub use actor::Actor;
pub use address::{display_address, Address, NIL_ADDRESS};
pub use error::ActorError;
pub use message::{Body, Message, ReturnEnvelope, DEFAULT_RESPONSE_TIMEOUT};
pub use processor::StateProcessor;
pub use registry::{Registry, ShutdownSignal};

use std::sync::{Mutex, MutexGuard};

/// Locks a [Mutex] guarding plain bookkeeping data, ignoring poisoning.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

#[cfg(test)]
mod test_util;


#[cfg(test)]
mod test_actor;
