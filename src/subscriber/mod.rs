//! Publish / subscribe on top of the [runtime](crate::runtime).
//!
//! A notifying actor keeps a [Subscriptions] list in its state, updates it
//! when it receives [Body::AddSubscription](crate::runtime::Body) and
//! [Body::RemoveSubscription](crate::runtime::Body) messages and re-broadcasts
//! notifications to everyone on the list.

mod subscriptions;

pub use subscriptions::Subscriptions;
