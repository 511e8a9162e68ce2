//! Actors: a mailbox, a lifecycle and the single task consuming the mailbox.

use super::{
    lock,
    registry::Directory,
    ActorError, Address, Message, ReturnEnvelope, StateProcessor,
};
use async_trait::async_trait;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex, Weak,
};
use tokio::{
    select,
    sync::{mpsc, watch, Mutex as AsyncMutex},
    task::JoinHandle,
};

/// A registered actor.
///
/// The actor owns a bounded mailbox with many producers and exactly one
/// consumer: a [tokio::task] started by [Actor::activate] which hands the
/// messages to the [StateProcessor] one by one, in arrival order.
///
/// Actors are created by [Registry::register](super::Registry::register),
/// which returns them wrapped in an [Arc] so that the handle can be kept by
/// the caller while the registry routes messages to the same actor.
pub struct Actor<P, S> {
    address: Address,
    incarnation: u64,
    mailbox: mpsc::Sender<Message<P>>,
    // Taken by the first activation and moved into the consumer task.
    mailbox_receiver: Mutex<Option<mpsc::Receiver<Message<P>>>>,
    closed: AtomicBool,
    terminated: AtomicBool,
    processor: Arc<AsyncMutex<Option<S>>>,
    consumer: Mutex<Option<JoinHandle<()>>>,
    stop: watch::Sender<bool>,
    directory: Weak<Directory<P>>,
}

impl<P, S> Actor<P, S>
where
    P: Send + 'static,
    S: StateProcessor<P>,
{
    pub(crate) fn new(
        address: Address,
        processor: S,
        mailbox_capacity: usize,
        incarnation: u64,
        directory: Weak<Directory<P>>,
    ) -> Actor<P, S> {
        let (mailbox, mailbox_receiver) = mpsc::channel(mailbox_capacity.max(1));
        let (stop, _) = watch::channel(false);
        Actor {
            address,
            incarnation,
            mailbox,
            mailbox_receiver: Mutex::new(Some(mailbox_receiver)),
            closed: AtomicBool::new(true),
            terminated: AtomicBool::new(false),
            processor: Arc::new(AsyncMutex::new(Some(processor))),
            consumer: Mutex::new(None),
            stop,
            directory,
        }
    }

    /// The address the actor was registered under.
    pub fn address(&self) -> &Address {
        &self.address
    }

    pub(crate) fn incarnation(&self) -> u64 {
        self.incarnation
    }

    /// Whether the inbox currently refuses messages.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Opens the inbox and, the first time, starts the consumer task.
    ///
    /// Calling this on an active actor does nothing. A terminated actor can't
    /// be activated again.
    pub fn activate(&self) {
        if self.terminated.load(Ordering::Acquire) {
            log::warn!("{} is terminated and can't be activated", self.address);
            return;
        }
        {
            let mut consumer = lock(&self.consumer);
            if consumer.is_none() {
                if let Some(receiver) = lock(&self.mailbox_receiver).take() {
                    *consumer = Some(tokio::spawn(consume(
                        self.address.clone(),
                        receiver,
                        self.processor.clone(),
                        self.stop.subscribe(),
                    )));
                }
            }
        }
        if self.closed.swap(false, Ordering::AcqRel) {
            log::info!("{} activated", self.address);
        }
    }

    /// Closes the inbox. Messages already queued are still processed.
    pub fn deactivate(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            log::info!("{} deactivated", self.address);
        }
    }

    /// Enqueues a message, waiting for space if the mailbox is full.
    pub async fn send(&self, mut message: Message<P>) -> Result<(), ActorError> {
        if self.is_closed() {
            return Err(ActorError::InboxClosed(self.address.key()));
        }
        message.detach_response();
        self.enqueue(message).await
    }

    /// Enqueues a message and waits for its reply.
    ///
    /// The whole exchange is bounded by the message's
    /// [timeout](Message::timeout). A reply slot dropped without an answer
    /// (the processor ignored the request, or the actor was terminated
    /// before getting to it) is reported as a timeout as well, since no reply
    /// can arrive anymore.
    pub async fn send_and_await_response(
        &self,
        mut message: Message<P>,
    ) -> Result<ReturnEnvelope<P>, ActorError> {
        if self.is_closed() {
            return Err(ActorError::InboxClosed(self.address.key()));
        }
        let timeout = message.timeout();
        let timeout_error = || ActorError::ResponseTimeout {
            address: self.address.key(),
            timeout,
        };
        let receiver = message.prepare_response();
        let exchange = async move {
            self.enqueue(message).await?;
            receiver.await.map_err(|_| {
                log::debug!("{} dropped a request without replying", self.address);
                timeout_error()
            })
        };
        match tokio::time::timeout(timeout, exchange).await {
            Ok(result) => result,
            Err(_) => {
                log::debug!("{} did not reply within {:?}", self.address, timeout);
                Err(timeout_error())
            }
        }
    }

    async fn enqueue(&self, message: Message<P>) -> Result<(), ActorError> {
        self.mailbox
            .send(message)
            .await
            .map_err(|_| ActorError::InboxClosed(self.address.key()))
    }

    /// Snapshot of the processor's state, None once the actor is terminated.
    pub async fn get_state(&self) -> Option<S::State> {
        self.processor.lock().await.as_ref().map(|p| p.get_state())
    }

    /// Terminates the actor.
    ///
    /// The inbox is closed, the consumer task is stopped and awaited (a
    /// message being processed is allowed to finish, queued ones are
    /// discarded), then the processor's [shutdown](StateProcessor::shutdown)
    /// runs, the processor is released and the address is unregistered.
    /// Terminating twice is a no-op.
    ///
    /// Must not be awaited from the actor's own processor, which would wait
    /// for itself to finish.
    pub async fn terminate(&self) {
        if self.terminated.swap(true, Ordering::AcqRel) {
            return;
        }
        self.deactivate();
        self.stop.send_replace(true);
        let consumer = lock(&self.consumer).take();
        if let Some(consumer) = consumer {
            if let Err(e) = consumer.await {
                log::error!("{} consumer task failed: {}", self.address, e);
            }
        }
        lock(&self.mailbox_receiver).take();
        let processor = self.processor.lock().await.take();
        if let Some(mut processor) = processor {
            processor.shutdown().await;
        }
        if let Some(directory) = self.directory.upgrade() {
            directory.remove(&self.address, Some(self.incarnation)).await;
        }
        log::info!("{} dropped", self.address);
    }
}

async fn consume<P, S>(
    address: Address,
    mut mailbox: mpsc::Receiver<Message<P>>,
    processor: Arc<AsyncMutex<Option<S>>>,
    mut stop: watch::Receiver<bool>,
) where
    P: Send + 'static,
    S: StateProcessor<P>,
{
    log::debug!("{} consumer started", address);
    loop {
        let message = select! {
            biased;
            _ = stop.changed() => break,
            message = mailbox.recv() => match message {
                Some(message) => message,
                None => break,
            },
        };
        let mut processor = processor.lock().await;
        match processor.as_mut() {
            Some(processor) => processor.process(message).await,
            None => break,
        }
    }
    mailbox.close();
    let mut discarded = 0;
    while mailbox.try_recv().is_ok() {
        discarded += 1;
    }
    if discarded > 0 {
        log::warn!("{} discarded {} queued messages", address, discarded);
    }
    log::debug!("{} consumer stopped", address);
}

/// The type-erased side of an actor the registry routes through.
#[async_trait]
pub(crate) trait Mailbox<P>: Send + Sync {
    fn address(&self) -> &Address;

    fn incarnation(&self) -> u64;

    async fn send(&self, message: Message<P>) -> Result<(), ActorError>;

    async fn send_and_await_response(
        &self,
        message: Message<P>,
    ) -> Result<ReturnEnvelope<P>, ActorError>;

    async fn terminate(&self);
}

#[async_trait]
impl<P, S> Mailbox<P> for Actor<P, S>
where
    P: Send + 'static,
    S: StateProcessor<P>,
{
    fn address(&self) -> &Address {
        Actor::address(self)
    }

    fn incarnation(&self) -> u64 {
        Actor::incarnation(self)
    }

    async fn send(&self, message: Message<P>) -> Result<(), ActorError> {
        Actor::send(self, message).await
    }

    async fn send_and_await_response(
        &self,
        message: Message<P>,
    ) -> Result<ReturnEnvelope<P>, ActorError> {
        Actor::send_and_await_response(self, message).await
    }

    async fn terminate(&self) {
        Actor::terminate(self).await
    }
}
