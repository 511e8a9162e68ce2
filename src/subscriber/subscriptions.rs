use crate::runtime::{Address, Body, Message, Registry};
use std::fmt::Debug;

/// The subscribers of a notifying actor, in subscription order.
///
/// Subscriptions form a set: subscribing twice has the same effect as
/// subscribing once, so a subscriber is notified once per notification and a
/// single removal unsubscribes it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Subscriptions {
    subscribers: Vec<Address>,
}

impl Subscriptions {
    /// An empty subscriber list.
    pub fn new() -> Subscriptions {
        Subscriptions::default()
    }

    /// Adds `subscriber` to the list.
    ///
    /// Returns false if the address was already subscribed.
    pub fn add_subscription(&mut self, subscriber: Address) -> bool {
        if self.subscribers.contains(&subscriber) {
            log::debug!("{} is already subscribed", subscriber);
            return false;
        }
        self.subscribers.push(subscriber);
        true
    }

    /// Removes `subscriber` from the list.
    ///
    /// Returns false if the address wasn't subscribed.
    pub fn remove_subscription(&mut self, subscriber: &Address) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|s| s != subscriber);
        before != self.subscribers.len()
    }

    /// Number of subscribers.
    pub fn num_subscribers(&self) -> usize {
        self.subscribers.len()
    }

    /// The subscribers, in subscription order.
    pub fn subscribers(&self) -> &[Address] {
        &self.subscribers
    }

    /// Applies a subscription control message.
    ///
    /// Returns true if the message was a subscription request (whether or not
    /// it changed anything), false if it's something for the caller to handle.
    pub fn handle_control<P>(&mut self, message: &Message<P>) -> bool {
        let subscriber = match (&message.body, &message.from) {
            (Body::Payload(_), _) => return false,
            (_, Some(subscriber)) => subscriber.clone(),
            (_, None) => {
                log::warn!("Ignoring subscription request without a sender");
                return true;
            }
        };
        match message.body {
            Body::AddSubscription => {
                if self.add_subscription(subscriber.clone()) {
                    log::info!("{} subscribed", subscriber);
                }
            }
            Body::RemoveSubscription => {
                if self.remove_subscription(&subscriber) {
                    log::info!("{} unsubscribed", subscriber);
                }
            }
            Body::Payload(_) => {}
        }
        true
    }

    /// Sends a copy of `template` to every subscriber.
    ///
    /// Delivery failures are logged and don't stop the fan-out, which is not
    /// atomic: subscribers before a failing one have already been notified.
    /// Returns the number of successful deliveries.
    pub async fn notify_subscribers<P>(&self, registry: &Registry<P>, template: Message<P>) -> usize
    where
        P: Clone + Debug + Send + 'static,
    {
        let mut delivered = 0;
        for subscriber in self.subscribers.iter() {
            let message = template.with_destination(subscriber.clone());
            log::debug!("Sending {} to subscriber {}", message, subscriber);
            match registry.send(message).await {
                Ok(()) => delivered += 1,
                Err(e) => log::warn!("Error sending message to subscriber {}: {}", subscriber, e),
            }
        }
        delivered
    }
}
