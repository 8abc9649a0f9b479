use chrono::{DateTime, SubsecRound, Utc};
use tokio::sync::{Mutex, MutexGuard};

/// Last timestamp handed out in a session, shared by every presenter
/// connection attached to it.
///
/// Stamps have millisecond precision and strictly increase for the whole
/// session, across reconnects and concurrent presenter tabs, so the log's
/// `(timestamp, id)` order is the order commands were published in.
#[derive(Debug, Default)]
pub struct SessionClock {
    last: Mutex<Option<DateTime<Utc>>>,
}

impl SessionClock {
    /// Locks the clock. Holding the guard while a command is persisted and
    /// published keeps log order and delivery order the same.
    pub async fn lock(&self) -> ClockGuard<'_> {
        ClockGuard {
            last: self.last.lock().await,
        }
    }
}

pub struct ClockGuard<'a> {
    last: MutexGuard<'a, Option<DateTime<Utc>>>,
}

impl ClockGuard<'_> {
    /// Moves the clock up to `ts` if it is behind, e.g. to the newest
    /// timestamp already in the log.
    pub fn observe(&mut self, ts: DateTime<Utc>) {
        match *self.last {
            Some(last) if ts <= last => {}
            _ => *self.last = Some(ts),
        }
    }

    pub fn stamp(&mut self) -> DateTime<Utc> {
        self.stamp_at(Utc::now())
    }

    pub(crate) fn stamp_at(&mut self, now: DateTime<Utc>) -> DateTime<Utc> {
        let now = now.trunc_subsecs(3);
        let ts = match *self.last {
            Some(last) if now <= last => last + chrono::Duration::milliseconds(1),
            _ => now,
        };
        *self.last = Some(ts);
        ts
    }
}
