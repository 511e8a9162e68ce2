//! Mailroom is an in-process actor runtime.
//!
//! Actors own a bounded mailbox drained by a single task, which hands every
//! message to the actor's [StateProcessor](runtime::StateProcessor). The
//! [Registry](runtime::Registry) maps [Address](runtime::Address)es to actors
//! and routes messages between them, fire-and-forget or as a request awaiting
//! a reply. On top of that, [subscriber] lets actors notify interested
//! parties and [batch] groups bursts of messages.

#![warn(missing_docs)]

pub mod batch;
pub mod config;
pub mod logging;
pub mod runtime;
pub mod subscriber;
