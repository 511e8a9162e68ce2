use crate::{
    config::BatchSection,
    runtime::{lock, Message},
};
use std::{
    sync::{Arc, Mutex, Weak},
    time::Duration,
};
use tokio::{runtime::Handle, task::JoinHandle};

/// Receives every message of a flushed batch, in arrival order.
pub type BatchHandler<P> = Box<dyn FnMut(Message<P>) + Send>;

#[derive(Debug, Clone, Copy)]
enum Trigger {
    Size,
    Timer,
}

/// The accumulation window shared by [Batcher::add] callers and the timer.
struct Window<P> {
    pending: Vec<Message<P>>,
    // Bumped by every flush or stop, so a timer armed for an earlier window
    // can tell that its window is gone.
    generation: u64,
    timer: Option<JoinHandle<()>>,
    handler: BatchHandler<P>,
}

impl<P> Window<P> {
    fn flush(&mut self, trigger: Trigger) {
        let messages = std::mem::take(&mut self.pending);
        log::debug!(
            "Flushing batch of {} messages ({:?} trigger)",
            messages.len(),
            trigger
        );
        // Closed before the handler runs: a panicking handler must not leave
        // this window's timer armed.
        self.reset();
        for message in messages {
            (self.handler)(message);
        }
    }

    fn reset(&mut self) {
        self.generation = self.generation.wrapping_add(1);
        self.pending.clear();
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }
}

/// Accumulates messages from any number of producers and hands them to a
/// handler once either `max_count` messages are pending or `flush_interval`
/// has passed since the first message of the current window, whichever comes
/// first.
///
/// Each window is flushed exactly once. Flushes run under the same lock
/// [add](Batcher::add) takes, so the handler is never called concurrently
/// and batches are delivered in order. For the same reason, the handler must
/// not call back into the batcher.
///
/// The timer runs as a [tokio::task] on the runtime the batcher was created
/// in. A batcher created outside of a Tokio runtime has no timer and only
/// flushes by size.
///
/// A panicking handler propagates the panic to the caller of
/// [add](Batcher::add) (or kills the timer task). The rest of that batch is
/// lost, while later windows are batched normally.
pub struct Batcher<P> {
    window: Arc<Mutex<Window<P>>>,
    runtime: Option<Handle>,
    flush_interval: Duration,
    max_count: usize,
}

impl<P: Send + 'static> Batcher<P> {
    /// Creates a batcher handing flushed messages to `handler`.
    pub fn new(
        flush_interval_ms: u64,
        max_count: usize,
        handler: impl FnMut(Message<P>) + Send + 'static,
    ) -> Batcher<P> {
        log::info!(
            "Batcher created, flush interval {}ms, max messages {}",
            flush_interval_ms,
            max_count
        );
        let runtime = Handle::try_current().ok();
        if runtime.is_none() {
            log::warn!("Batcher created outside of a Tokio runtime, it will only flush by size");
        }
        Batcher {
            window: Arc::new(Mutex::new(Window {
                pending: Vec::new(),
                generation: 0,
                timer: None,
                handler: Box::new(handler),
            })),
            runtime,
            flush_interval: Duration::from_millis(flush_interval_ms),
            max_count,
        }
    }

    /// Creates a batcher with the thresholds of a `[batch]` section.
    pub fn from_config(
        config: &BatchSection,
        handler: impl FnMut(Message<P>) + Send + 'static,
    ) -> Batcher<P> {
        Batcher::new(config.flush_interval_ms, config.max_count, handler)
    }

    /// Adds a message to the current window, opening one if needed.
    ///
    /// Flushes right away, on the calling thread, once `max_count` messages
    /// are pending.
    pub fn add(&self, message: Message<P>) {
        let mut window = lock(&self.window);
        if window.pending.is_empty() {
            if let Some(runtime) = &self.runtime {
                log::debug!("Batch timer started, flushing in {:?}", self.flush_interval);
                window.timer = Some(runtime.spawn(flush_after(
                    self.flush_interval,
                    Arc::downgrade(&self.window),
                    window.generation,
                )));
            }
        }
        window.pending.push(message);
        log::trace!(
            "Batched message, {} of {} pending",
            window.pending.len(),
            self.max_count
        );
        if window.pending.len() >= self.max_count {
            window.flush(Trigger::Size);
        }
    }

    /// Discards the pending messages without handing them to the handler.
    pub fn stop(&self) {
        let mut window = lock(&self.window);
        if !window.pending.is_empty() {
            log::debug!("Batcher stopped, dropping {} messages", window.pending.len());
        }
        window.reset();
    }

    /// Number of messages waiting in the current window.
    pub fn pending(&self) -> usize {
        lock(&self.window).pending.len()
    }
}

impl<P> Drop for Batcher<P> {
    fn drop(&mut self) {
        if let Some(timer) = lock(&self.window).timer.take() {
            timer.abort();
        }
    }
}

async fn flush_after<P>(delay: Duration, window: Weak<Mutex<Window<P>>>, generation: u64) {
    tokio::time::sleep(delay).await;
    if let Some(window) = window.upgrade() {
        let mut window = lock(&window);
        if window.generation == generation {
            // Don't let the flush abort the task it runs in.
            window.timer.take();
            window.flush(Trigger::Timer);
        }
    }
}
