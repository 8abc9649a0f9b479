//! Per-session fan-out of presenter commands to spectators.
//!
//! A backend accepts commands from presenter connections and delivers
//! them, in publish order, to every spectator currently subscribed to
//! the same session. Delivery never blocks the publisher: each spectator
//! owns a bounded queue and is evicted when it cannot keep up. A `close`
//! command is terminal for the session.

pub mod clock;
pub mod local;

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch, Notify};

use crate::models::command::Command;

pub use clock::SessionClock;
pub use local::LocalBus;

pub type SubscriberId = u64;

/// Outcome of a single publish.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Delivery {
    pub delivered: usize,
    pub evicted: usize,
}

/// Why a subscription's stream ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndReason {
    /// The session was closed; `close` was the last command delivered.
    Closed,
    /// The spectator fell behind its buffer bound and was dropped.
    Overrun,
}

pub trait SessionBus: Send + Sync {
    fn publish(&self, session_id: i64, command: Command) -> Delivery;
    fn subscribe(&self, session_id: i64) -> Subscription;
    fn unsubscribe(&self, session_id: i64, subscriber: SubscriberId);
    fn attach_presenter(&self, session_id: i64) -> PresenterLease;
    /// Tears down channels with no presenter, no spectators and no traffic
    /// for at least `idle`. Returns how many were removed.
    fn reap_idle(&self, idle: Duration) -> usize;
    fn subscriber_count(&self, session_id: i64) -> usize;
    fn session_count(&self) -> usize;
}

/// Shared marker the backend sets when it ends a subscriber's stream.
#[derive(Debug, Default)]
pub struct EndSignal {
    state: AtomicU8,
    changed: Notify,
}

impl EndSignal {
    const OPEN: u8 = 0;
    const CLOSED: u8 = 1;
    const OVERRUN: u8 = 2;

    pub fn set(&self, reason: EndReason) {
        let value = match reason {
            EndReason::Closed => Self::CLOSED,
            EndReason::Overrun => Self::OVERRUN,
        };
        if self
            .state
            .compare_exchange(Self::OPEN, value, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            self.changed.notify_waiters();
        }
    }

    pub fn get(&self) -> Option<EndReason> {
        match self.state.load(Ordering::Acquire) {
            Self::CLOSED => Some(EndReason::Closed),
            Self::OVERRUN => Some(EndReason::Overrun),
            _ => None,
        }
    }

    /// Resolves once the stream ends by eviction. Never resolves if it
    /// ends by close instead.
    pub async fn overrun(&self) {
        loop {
            let notified = self.changed.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            match self.get() {
                Some(EndReason::Overrun) => return,
                Some(EndReason::Closed) => std::future::pending::<()>().await,
                None => notified.await,
            }
        }
    }
}

type Detach = Box<dyn FnOnce() + Send + Sync>;

/// A spectator's registration on the bus. Dropping it unsubscribes.
pub struct Subscription {
    session_id: i64,
    id: SubscriberId,
    rx: mpsc::Receiver<Arc<Command>>,
    end: Arc<EndSignal>,
    detach: Option<Detach>,
}

impl Subscription {
    pub fn new(
        session_id: i64,
        id: SubscriberId,
        rx: mpsc::Receiver<Arc<Command>>,
        end: Arc<EndSignal>,
        detach: Detach,
    ) -> Self {
        Self {
            session_id,
            id,
            rx,
            end,
            detach: Some(detach),
        }
    }

    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Next command in publish order, or `None` once the stream has ended.
    pub async fn recv(&mut self) -> Option<Arc<Command>> {
        self.rx.recv().await
    }

    pub fn end_reason(&self) -> Option<EndReason> {
        self.end.get()
    }

    pub fn is_overrun(&self) -> bool {
        self.end.get() == Some(EndReason::Overrun)
    }

    /// Resolves as soon as the backend evicts this subscriber, even while
    /// commands are still queued.
    pub async fn evicted(&self) {
        self.end.overrun().await
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(detach) = self.detach.take() {
            detach();
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("session_id", &self.session_id)
            .field("id", &self.id)
            .field("end", &self.end.get())
            .finish()
    }
}

/// A live presenter's hold on a session channel. Keeps the channel from
/// being reaped, shares the session's clock and reports when the session
/// is closed.
pub struct PresenterLease {
    shutdown: watch::Receiver<bool>,
    clock: Arc<SessionClock>,
    detach: Option<Detach>,
}

impl PresenterLease {
    pub fn new(shutdown: watch::Receiver<bool>, clock: Arc<SessionClock>, detach: Detach) -> Self {
        Self {
            shutdown,
            clock,
            detach: Some(detach),
        }
    }

    /// The clock every presenter of this session stamps with.
    pub fn clock(&self) -> Arc<SessionClock> {
        Arc::clone(&self.clock)
    }

    /// Resolves once the session has been closed on the bus.
    pub async fn closed(&mut self) {
        loop {
            if *self.shutdown.borrow_and_update() {
                return;
            }
            // A dropped sender means the channel was torn down, which only
            // happens on close while a presenter is attached.
            if self.shutdown.changed().await.is_err() {
                return;
            }
        }
    }

    pub fn is_closed(&self) -> bool {
        *self.shutdown.borrow() || self.shutdown.has_changed().is_err()
    }
}

impl Drop for PresenterLease {
    fn drop(&mut self) {
        if let Some(detach) = self.detach.take() {
            detach();
        }
    }
}
