//! Marshaling worker-side events onto the primary execution context.
//!
//! The primary context is whichever task awaits a session's `generate` or an
//! agent's `prompt`. Worker tasks never call user callbacks directly; they
//! post events through an [`EventPoster`], and the primary context handles
//! them in order inside [`CallbackScheduler::run_until`].

use std::future::Future;

use tokio::sync::mpsc;

/// Cloneable sender handed to worker tasks.
#[derive(Debug)]
pub struct EventPoster<E> {
    tx: mpsc::UnboundedSender<E>,
}

impl<E> Clone for EventPoster<E> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl<E> EventPoster<E> {
    /// Queue an event for the primary context.
    ///
    /// Returns `false` once the primary side has stopped listening.
    pub fn post(&self, event: E) -> bool {
        self.tx.send(event).is_ok()
    }
}

/// Single-consumer event queue drained on the primary context.
#[derive(Debug)]
pub struct CallbackScheduler<E> {
    tx: mpsc::UnboundedSender<E>,
    rx: mpsc::UnboundedReceiver<E>,
}

impl<E> Default for CallbackScheduler<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> CallbackScheduler<E> {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self { tx, rx }
    }

    pub fn poster(&self) -> EventPoster<E> {
        EventPoster {
            tx: self.tx.clone(),
        }
    }

    /// Drive `work` to completion while handling posted events on the
    /// calling task.
    ///
    /// Events are handled in posting order. Events already queued when
    /// `work` finishes are still handled before this returns.
    pub async fn run_until<T, W, H>(self, work: W, mut handle: H) -> T
    where
        W: Future<Output = T>,
        H: FnMut(E),
    {
        let Self { tx, mut rx } = self;
        drop(tx);
        tokio::pin!(work);

        let output = loop {
            tokio::select! {
                biased;
                Some(event) = rx.recv() => handle(event),
                output = &mut work => break output,
            }
        };
        while let Ok(event) = rx.try_recv() {
            handle(event);
        }
        output
    }
}
