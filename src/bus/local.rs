use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;

use super::{
    Delivery, EndReason, EndSignal, PresenterLease, SessionBus, SessionClock, SubscriberId,
    Subscription,
};
use crate::models::command::Command;

struct Subscriber {
    tx: mpsc::Sender<Arc<Command>>,
    end: Arc<EndSignal>,
}

struct SessionChannel {
    subscribers: HashMap<SubscriberId, Subscriber>,
    presenters: usize,
    last_active: Instant,
    shutdown: watch::Sender<bool>,
    clock: Arc<SessionClock>,
}

impl SessionChannel {
    fn new() -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            subscribers: HashMap::new(),
            presenters: 0,
            last_active: Instant::now(),
            shutdown,
            clock: Arc::new(SessionClock::default()),
        }
    }

    fn is_idle(&self, idle: Duration) -> bool {
        self.subscribers.is_empty() && self.presenters == 0 && self.last_active.elapsed() >= idle
    }

    /// Pushes one command to every subscriber. Each queue keeps its last
    /// slot free for `close`; a regular command that would take it evicts
    /// the subscriber instead.
    fn deliver(&mut self, session_id: i64, command: &Arc<Command>) -> Delivery {
        let terminal = command.is_close();
        let mut delivery = Delivery::default();

        self.subscribers.retain(|id, sub| {
            if sub.tx.is_closed() {
                return false;
            }
            if !terminal && sub.tx.capacity() <= 1 {
                tracing::warn!(session_id, subscriber = id, "spectator overrun, disconnecting");
                sub.end.set(EndReason::Overrun);
                delivery.evicted += 1;
                return false;
            }
            match sub.tx.try_send(Arc::clone(command)) {
                Ok(()) => {
                    delivery.delivered += 1;
                    if terminal {
                        sub.end.set(EndReason::Closed);
                    }
                    !terminal
                }
                Err(TrySendError::Full(_)) => {
                    tracing::warn!(session_id, subscriber = id, "spectator queue full, disconnecting");
                    sub.end.set(EndReason::Overrun);
                    delivery.evicted += 1;
                    false
                }
                Err(TrySendError::Closed(_)) => false,
            }
        });

        delivery
    }
}

/// In-process session bus for single-instance deployments.
///
/// Channel state lives in a `DashMap` keyed by session id, so traffic on
/// one session only contends with sessions that hash to the same shard,
/// and publishing never awaits.
#[derive(Clone)]
pub struct LocalBus {
    channels: Arc<DashMap<i64, SessionChannel>>,
    next_id: Arc<AtomicU64>,
    capacity: usize,
}

impl LocalBus {
    pub const DEFAULT_CAPACITY: usize = 256;

    /// `capacity` is the number of regular commands a spectator may have
    /// queued before it is disconnected.
    pub fn new(capacity: usize) -> Self {
        Self {
            channels: Arc::new(DashMap::new()),
            next_id: Arc::new(AtomicU64::new(1)),
            capacity: capacity.max(1),
        }
    }
}

impl Default for LocalBus {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CAPACITY)
    }
}

fn remove_subscriber(
    channels: &DashMap<i64, SessionChannel>,
    session_id: i64,
    subscriber: SubscriberId,
) {
    if let Some(mut channel) = channels.get_mut(&session_id) {
        if channel.subscribers.remove(&subscriber).is_some() {
            channel.last_active = Instant::now();
        }
    }
}

impl SessionBus for LocalBus {
    fn publish(&self, session_id: i64, command: Command) -> Delivery {
        let command = Arc::new(command);

        match self.channels.entry(session_id) {
            Entry::Occupied(mut occupied) => {
                let channel = occupied.get_mut();
                channel.last_active = Instant::now();
                let delivery = channel.deliver(session_id, &command);

                if command.is_close() {
                    channel.subscribers.clear();
                    channel.shutdown.send_replace(true);
                    occupied.remove();
                    tracing::info!(
                        session_id,
                        "session closed, {} spectator(s) released",
                        delivery.delivered
                    );
                }
                delivery
            }
            Entry::Vacant(vacant) => {
                if !command.is_close() {
                    vacant.insert(SessionChannel::new());
                }
                Delivery::default()
            }
        }
    }

    fn subscribe(&self, session_id: i64) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(self.capacity + 1);
        let end = Arc::new(EndSignal::default());

        {
            let mut channel = self
                .channels
                .entry(session_id)
                .or_insert_with(SessionChannel::new);
            channel.subscribers.insert(
                id,
                Subscriber {
                    tx,
                    end: Arc::clone(&end),
                },
            );
            channel.last_active = Instant::now();
        }
        tracing::debug!(session_id, subscriber = id, "spectator subscribed");

        let channels = Arc::clone(&self.channels);
        Subscription::new(
            session_id,
            id,
            rx,
            end,
            Box::new(move || remove_subscriber(&channels, session_id, id)),
        )
    }

    fn unsubscribe(&self, session_id: i64, subscriber: SubscriberId) {
        remove_subscriber(&self.channels, session_id, subscriber);
    }

    fn attach_presenter(&self, session_id: i64) -> PresenterLease {
        let (shutdown, clock) = {
            let mut channel = self
                .channels
                .entry(session_id)
                .or_insert_with(SessionChannel::new);
            channel.presenters += 1;
            channel.last_active = Instant::now();
            (channel.shutdown.subscribe(), Arc::clone(&channel.clock))
        };

        let channels = Arc::clone(&self.channels);
        PresenterLease::new(
            shutdown,
            clock,
            Box::new(move || {
                if let Some(mut channel) = channels.get_mut(&session_id) {
                    channel.presenters = channel.presenters.saturating_sub(1);
                    channel.last_active = Instant::now();
                }
            }),
        )
    }

    fn reap_idle(&self, idle: Duration) -> usize {
        let mut reaped = 0;
        self.channels.retain(|_, channel| {
            let keep = !channel.is_idle(idle);
            if !keep {
                reaped += 1;
            }
            keep
        });
        reaped
    }

    fn subscriber_count(&self, session_id: i64) -> usize {
        self.channels
            .get(&session_id)
            .map(|channel| channel.subscribers.len())
            .unwrap_or(0)
    }

    fn session_count(&self) -> usize {
        self.channels.len()
    }
}
