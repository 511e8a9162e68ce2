//! The address directory and message router.

use super::{
    actor::Mailbox, Actor, ActorError, Address, Message, ReturnEnvelope, StateProcessor,
};
use crate::config::RuntimeConfig;
use std::{
    any::type_name,
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc,
    },
};
use tokio::sync::{watch, Mutex as AsyncMutex, RwLock};

/// Address key to actor mapping, shared between a [Registry] and its actors
/// so that terminating actors can unregister themselves.
pub(crate) struct Directory<P> {
    actors: RwLock<HashMap<String, Arc<dyn Mailbox<P>>>>,
}

impl<P: Send + 'static> Directory<P> {
    fn new() -> Directory<P> {
        Directory {
            actors: RwLock::new(HashMap::new()),
        }
    }

    async fn find(&self, address: &Address) -> Option<Arc<dyn Mailbox<P>>> {
        self.actors.read().await.get(&address.key()).cloned()
    }

    /// Removes the entry for `address`. With an `incarnation`, only removes it
    /// if it still belongs to that actor and not to a later registration under
    /// the same address.
    pub(crate) async fn remove(&self, address: &Address, incarnation: Option<u64>) {
        let mut actors = self.actors.write().await;
        let key = address.key();
        let matches = match (actors.get(&key), incarnation) {
            (Some(actor), Some(incarnation)) => actor.incarnation() == incarnation,
            (Some(_), None) => true,
            (None, _) => false,
        };
        if matches {
            actors.remove(&key);
            log::debug!("{} unregistered", address);
        }
    }
}

/// A signal which fires once the registry has been shut down.
#[derive(Debug, Clone)]
pub struct ShutdownSignal(watch::Receiver<bool>);

impl ShutdownSignal {
    /// Whether the shutdown has already happened, without waiting.
    pub fn is_shutdown(&self) -> bool {
        *self.0.borrow()
    }

    /// Waits until the registry is shut down.
    ///
    /// Returns immediately if that already happened.
    pub async fn wait(&mut self) {
        while !*self.0.borrow_and_update() {
            if self.0.changed().await.is_err() {
                // Registry dropped without a shutdown, nothing will ever fire.
                std::future::pending::<()>().await;
            }
        }
    }
}

/// The directory and router of actors exchanging payloads of type `P`.
///
/// A Registry is cheap to clone, all clones share the same actors. It's meant
/// to be constructed once at process entry and handed to whoever needs to
/// send messages, including the [StateProcessor]s themselves.
///
/// Lookups and mutations of the address mapping are serialized by a single
/// [RwLock]. The lock is never held while waiting on a mailbox, so a full
/// mailbox only blocks the sender writing to it.
pub struct Registry<P> {
    directory: Arc<Directory<P>>,
    config: RuntimeConfig,
    next_incarnation: Arc<AtomicU64>,
    shutdown_sender: Arc<watch::Sender<bool>>,
    shutdown_receiver: watch::Receiver<bool>,
    // Held for a whole shutdown_all, so overlapping calls queue up behind it.
    shutdown_lock: Arc<AsyncMutex<()>>,
    signal_handler_installed: Arc<AtomicBool>,
}

impl<P> Clone for Registry<P> {
    fn clone(&self) -> Self {
        Registry {
            directory: self.directory.clone(),
            config: self.config.clone(),
            next_incarnation: self.next_incarnation.clone(),
            shutdown_sender: self.shutdown_sender.clone(),
            shutdown_receiver: self.shutdown_receiver.clone(),
            shutdown_lock: self.shutdown_lock.clone(),
            signal_handler_installed: self.signal_handler_installed.clone(),
        }
    }
}

impl<P: Send + 'static> Default for Registry<P> {
    fn default() -> Self {
        Registry::new(RuntimeConfig::default())
    }
}

impl<P: Send + 'static> Registry<P> {
    /// Creates an empty registry. Actors registered in it get mailboxes of
    /// the configured capacity.
    pub fn new(config: RuntimeConfig) -> Registry<P> {
        let (shutdown_sender, shutdown_receiver) = watch::channel(false);
        log::debug!(
            "Registry created, mailbox capacity {}",
            config.runtime.mailbox_capacity
        );
        Registry {
            directory: Arc::new(Directory::new()),
            config,
            next_incarnation: Arc::new(AtomicU64::new(0)),
            shutdown_sender: Arc::new(shutdown_sender),
            shutdown_receiver,
            shutdown_lock: Arc::new(AsyncMutex::new(())),
            signal_handler_installed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// The configuration the registry was created with.
    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Makes SIGINT or SIGTERM run [Registry::shutdown_all].
    ///
    /// The handler task is installed at most once per registry, no matter how
    /// many clones call this concurrently. Returns whether this call
    /// installed it. Must be called from within a Tokio runtime.
    pub fn install_signal_handler(&self) -> bool {
        if self.signal_handler_installed.swap(true, Ordering::AcqRel) {
            return false;
        }
        let registry = self.clone();
        tokio::spawn(async move {
            wait_for_termination_signal().await;
            log::info!("Termination signal received, shutting down all actors");
            registry.shutdown_all().await;
        });
        log::debug!("Signal handler installed");
        true
    }

    /// A signal observers can poll or await to learn about system teardown.
    pub fn shutdown_signal(&self) -> ShutdownSignal {
        ShutdownSignal(self.shutdown_receiver.clone())
    }

    /// Registers a new actor under `address` and activates it.
    ///
    /// Fails with [ActorError::AddressInvalid] if either part of the address
    /// is empty and with [ActorError::AlreadyRegistered] if the address is
    /// taken. The check and the insertion happen under the same lock.
    pub async fn register<S>(
        &self,
        address: Address,
        processor: S,
    ) -> Result<Arc<Actor<P, S>>, ActorError>
    where
        S: StateProcessor<P>,
    {
        if !address.is_valid() {
            log::error!("Refusing to register invalid address {:?}", address);
            return Err(ActorError::AddressInvalid(address.key()));
        }
        let key = address.key();
        let actor = {
            let mut actors = self.directory.actors.write().await;
            if actors.contains_key(&key) {
                log::error!("{} is already registered", key);
                return Err(ActorError::AlreadyRegistered(key));
            }
            let actor = Arc::new(Actor::new(
                address,
                processor,
                self.config.runtime.mailbox_capacity,
                self.next_incarnation.fetch_add(1, Ordering::Relaxed),
                Arc::downgrade(&self.directory),
            ));
            // Open before publishing, a lookup must never find a closed newcomer.
            actor.activate();
            actors.insert(key.clone(), actor.clone());
            actor
        };
        log::info!("{} registered", key);
        Ok(actor)
    }

    /// Removes the mapping for `address`, if there is any. The actor itself
    /// keeps running until it is terminated.
    pub async fn unregister(&self, address: &Address) {
        self.directory.remove(address, None).await;
    }

    /// Whether an actor is currently registered under `address`.
    pub async fn contains(&self, address: &Address) -> bool {
        self.directory.find(address).await.is_some()
    }

    /// Number of registered actors.
    pub async fn num_actors(&self) -> usize {
        self.directory.actors.read().await.len()
    }

    /// Addresses of all registered actors, sorted.
    pub async fn addresses(&self) -> Vec<Address> {
        let mut addresses: Vec<Address> = self
            .directory
            .actors
            .read()
            .await
            .values()
            .map(|a| a.address().clone())
            .collect();
        addresses.sort();
        addresses
    }

    async fn resolve(&self, to: Option<&Address>) -> Result<Arc<dyn Mailbox<P>>, ActorError> {
        let actor = match to {
            Some(address) => self.directory.find(address).await,
            None => None,
        };
        actor.ok_or_else(|| {
            let address = super::display_address(to);
            log::error!("Actor {} not found", address);
            ActorError::ActorNotFound(address)
        })
    }

    /// Delivers a message to its recipient without waiting for processing.
    pub async fn send(&self, message: Message<P>) -> Result<(), ActorError> {
        let actor = self.resolve(message.to.as_ref()).await?;
        log::trace!("{} found, sending message", actor.address());
        actor.send(message).await.map_err(|e| {
            log::error!("{} inbox returned error: {}", actor.address(), e);
            e
        })
    }

    /// Routes a subscription control message to the notifier.
    pub async fn subscribe(&self, message: Message<P>) -> Result<(), ActorError> {
        self.send(message).await
    }

    /// Delivers a message and waits for the reply, converting its body to `T`.
    ///
    /// A reply carrying an error becomes [ActorError::Replied]. A reply
    /// without a body, or with one that doesn't convert to `T`, is an
    /// [ActorError::ResponseTypeMismatch].
    pub async fn send_and_await_response<T>(&self, message: Message<P>) -> Result<T, ActorError>
    where
        T: TryFrom<P>,
    {
        let envelope = self.send_and_await_envelope(message).await?;
        if let Some(error) = envelope.error {
            return Err(ActorError::Replied(error));
        }
        envelope
            .body
            .and_then(|body| T::try_from(body).ok())
            .ok_or_else(|| {
                log::error!("Response body is not a {}", type_name::<T>());
                ActorError::ResponseTypeMismatch {
                    expected: type_name::<T>(),
                }
            })
    }

    /// Delivers a message and waits for the raw reply envelope.
    pub async fn send_and_await_envelope(
        &self,
        message: Message<P>,
    ) -> Result<ReturnEnvelope<P>, ActorError> {
        let actor = self.resolve(message.to.as_ref()).await?;
        actor.send_and_await_response(message).await.map_err(|e| {
            log::error!("{} inbox with response returned error: {}", actor.address(), e);
            e
        })
    }

    /// Delivers a copy of `message` to every registered actor except its
    /// sender, optionally only to actors in `area`.
    ///
    /// Failures are logged and don't stop the fan-out. Returns the number of
    /// actors the message was addressed to.
    pub async fn broadcast(&self, message: Message<P>, area: Option<&str>) -> usize
    where
        P: Clone,
    {
        let recipients: Vec<Arc<dyn Mailbox<P>>> = self
            .directory
            .actors
            .read()
            .await
            .values()
            .filter(|a| Some(a.address()) != message.from.as_ref())
            .filter(|a| area.map_or(true, |area| a.address().is_same_area(area)))
            .cloned()
            .collect();
        for recipient in recipients.iter() {
            let copy = message.with_destination(recipient.address().clone());
            if let Err(e) = recipient.send(copy).await {
                log::warn!(
                    "{} inbox error on broadcasting message: {}",
                    recipient.address(),
                    e
                );
            }
        }
        recipients.len()
    }

    /// Terminates every registered actor and fires the shutdown signal.
    ///
    /// Calling this again only terminates actors registered since. A call
    /// overlapping a shutdown in progress waits for it to finish, so the
    /// signal never fires while an actor is still being torn down.
    pub async fn shutdown_all(&self) {
        let _shutting_down = self.shutdown_lock.lock().await;
        let actors: Vec<Arc<dyn Mailbox<P>>> = {
            let mut actors = self.directory.actors.write().await;
            actors.drain().map(|(_, actor)| actor).collect()
        };
        log::info!("Shutting down {} actors", actors.len());
        for actor in actors {
            actor.terminate().await;
        }
        let fired = self.shutdown_sender.send_if_modified(|shut_down| {
            let changed = !*shut_down;
            *shut_down = true;
            changed
        });
        if fired {
            log::info!("Shutdown signal fired");
        }
    }
}

#[cfg(unix)]
async fn wait_for_termination_signal() {
    use tokio::signal::unix::{signal, SignalKind};
    let mut terminate = match signal(SignalKind::terminate()) {
        Ok(terminate) => terminate,
        Err(e) => {
            log::error!("Couldn't listen for SIGTERM, only handling Ctrl-C: {}", e);
            if let Err(e) = tokio::signal::ctrl_c().await {
                log::error!("Couldn't listen for Ctrl-C: {}", e);
                std::future::pending::<()>().await;
            }
            return;
        }
    };
    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                log::error!("Couldn't listen for Ctrl-C: {}", e);
                terminate.recv().await;
            }
        }
        _ = terminate.recv() => {}
    }
}

#[cfg(not(unix))]
async fn wait_for_termination_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::error!("Couldn't listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
}
