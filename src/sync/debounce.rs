//! Collapse-to-latest write scheduling.
//!
//! [`Debouncer`] is pure bookkeeping over instants it is handed; the timers
//! live behind the [`Clock`] port so tests can drive virtual time.

use async_trait::async_trait;
use std::time::Duration;
use tokio::time::Instant;

/// Time source and timer used by the sync store
#[async_trait]
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
    async fn sleep_until(&self, deadline: Instant);
}

/// Tokio's clock; honours `tokio::time::pause` in tests
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioClock;

#[async_trait]
impl Clock for TokioClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    async fn sleep_until(&self, deadline: Instant) {
        tokio::time::sleep_until(deadline).await;
    }
}

/// Merge two successive pending values for the same key
pub trait Collapse {
    fn collapse(self, newer: Self) -> Self;
}

struct Pending<K, V> {
    key: K,
    value: V,
    deadline: Instant,
}

/// Pending values keyed by field group, each with a quiet-window deadline
pub struct Debouncer<K, V> {
    window: Duration,
    pending: Vec<Pending<K, V>>,
}

impl<K: PartialEq, V: Collapse> Debouncer<K, V> {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            pending: Vec::new(),
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Record a value, collapsing into any pending one and restarting its
    /// quiet window. Returns the new deadline.
    pub fn push(&mut self, key: K, value: V, now: Instant) -> Instant {
        let deadline = now + self.window;
        match self.pending.iter().position(|p| p.key == key) {
            Some(i) => {
                let entry = self.pending.remove(i);
                self.pending.push(Pending {
                    key,
                    value: entry.value.collapse(value),
                    deadline,
                });
            }
            None => self.pending.push(Pending {
                key,
                value,
                deadline,
            }),
        }
        deadline
    }

    /// Remove and return every entry whose window has elapsed, oldest first
    pub fn take_due(&mut self, now: Instant) -> Vec<(K, V)> {
        self.take_where(|p| p.deadline <= now)
    }

    pub fn take(&mut self, key: &K) -> Option<V> {
        let i = self.pending.iter().position(|p| &p.key == key)?;
        Some(self.pending.remove(i).value)
    }

    /// Remove every entry whose key matches, regardless of deadline
    pub fn take_matching(&mut self, pred: impl Fn(&K) -> bool) -> Vec<(K, V)> {
        self.take_where(|p| pred(&p.key))
    }

    pub fn peek_matching<'a>(
        &'a self,
        pred: impl Fn(&K) -> bool + 'a,
    ) -> impl Iterator<Item = &'a V> + 'a {
        self.pending
            .iter()
            .filter(move |p| pred(&p.key))
            .map(|p| &p.value)
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.iter().map(|p| p.deadline).min()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    fn take_where(&mut self, pred: impl Fn(&Pending<K, V>) -> bool) -> Vec<(K, V)> {
        let (taken, kept): (Vec<_>, Vec<_>) = self.pending.drain(..).partition(|p| pred(p));
        self.pending = kept;
        taken.into_iter().map(|p| (p.key, p.value)).collect()
    }
}
