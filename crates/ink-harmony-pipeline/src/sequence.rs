//! Recency tracking for overlapping runs.
//!
//! Realtime previews are triggered faster than they complete, and
//! completions can arrive out of order. Every trigger takes a [`Ticket`]
//! from a [`Sequencer`]; a completion is only displayed if no newer
//! trigger has already been displayed. Last write wins by order of
//! trigger, not order of completion.

use std::sync::atomic::{AtomicU64, Ordering};

/// Position of one trigger in issue order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Ticket(u64);

impl Ticket {
    /// Raw sequence number.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

/// Issues monotonically increasing [`Ticket`]s.
///
/// Shareable across threads; issuing is a single atomic increment.
#[derive(Debug, Default)]
pub struct Sequencer {
    latest: AtomicU64,
}

impl Sequencer {
    /// A sequencer that has issued nothing.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            latest: AtomicU64::new(0),
        }
    }

    /// Issue the next ticket. The first ticket is 1.
    pub fn issue(&self) -> Ticket {
        Ticket(self.latest.fetch_add(1, Ordering::AcqRel) + 1)
    }

    /// The most recently issued ticket, if any.
    #[must_use]
    pub fn latest(&self) -> Option<Ticket> {
        match self.latest.load(Ordering::Acquire) {
            0 => None,
            n => Some(Ticket(n)),
        }
    }

    /// Whether `ticket` is still the most recent one issued.
    #[must_use]
    pub fn is_current(&self, ticket: Ticket) -> bool {
        self.latest.load(Ordering::Acquire) == ticket.0
    }
}

/// Holds the newest accepted completion.
#[derive(Debug)]
pub struct LatestSlot<T> {
    shown: Option<(Ticket, T)>,
}

impl<T> Default for LatestSlot<T> {
    fn default() -> Self {
        Self { shown: None }
    }
}

impl<T> LatestSlot<T> {
    /// An empty slot.
    #[must_use]
    pub const fn new() -> Self {
        Self { shown: None }
    }

    /// Offer a completion. It is accepted only if `ticket` is the latest
    /// issued by `sequencer` and newer than what the slot already holds.
    ///
    /// Returns whether the value was accepted.
    pub fn offer(&mut self, sequencer: &Sequencer, ticket: Ticket, value: T) -> bool {
        let newer = self.shown.as_ref().is_none_or(|(held, _)| ticket > *held);
        if newer && sequencer.is_current(ticket) {
            self.shown = Some((ticket, value));
            true
        } else {
            tracing::trace!(ticket = ticket.get(), "discarding stale completion");
            false
        }
    }

    /// Offer a completion from a producer that finishes in trigger order.
    ///
    /// Accepted whenever `ticket` is newer than what the slot holds, even
    /// if newer tickets have been issued since. A single sequential
    /// renderer uses this to keep showing progress while triggers keep
    /// arriving; an older completion still never replaces a newer one.
    pub fn advance(&mut self, ticket: Ticket, value: T) -> bool {
        if self.shown.as_ref().is_none_or(|(held, _)| ticket > *held) {
            self.shown = Some((ticket, value));
            true
        } else {
            tracing::trace!(ticket = ticket.get(), "discarding stale completion");
            false
        }
    }

    /// The accepted value, if any.
    #[must_use]
    pub fn get(&self) -> Option<&T> {
        self.shown.as_ref().map(|(_, value)| value)
    }

    /// Ticket of the accepted value, if any.
    #[must_use]
    pub fn ticket(&self) -> Option<Ticket> {
        self.shown.as_ref().map(|(ticket, _)| *ticket)
    }

    /// Take the accepted value out, emptying the slot.
    pub fn take(&mut self) -> Option<T> {
        self.shown.take().map(|(_, value)| value)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn tickets_increase() {
        let seq = Sequencer::new();
        assert_eq!(seq.latest(), None);
        let a = seq.issue();
        let b = seq.issue();
        assert!(b > a);
        assert_eq!(seq.latest(), Some(b));
        assert!(!seq.is_current(a));
        assert!(seq.is_current(b));
    }

    #[test]
    fn out_of_order_completion_is_discarded() {
        let seq = Sequencer::new();
        let mut slot = LatestSlot::new();
        let t1 = seq.issue();
        let t2 = seq.issue();

        // t2 finishes first and is shown.
        assert!(slot.offer(&seq, t2, "second"));
        // t1 finishes late and must not overwrite it.
        assert!(!slot.offer(&seq, t1, "first"));
        assert_eq!(slot.get(), Some(&"second"));
        assert_eq!(slot.ticket(), Some(t2));
    }

    #[test]
    fn superseded_completion_is_discarded_even_if_slot_empty() {
        let seq = Sequencer::new();
        let mut slot = LatestSlot::new();
        let t1 = seq.issue();
        let _t2 = seq.issue();
        assert!(!slot.offer(&seq, t1, 1));
        assert!(slot.get().is_none());
    }

    #[test]
    fn same_ticket_is_not_accepted_twice() {
        let seq = Sequencer::new();
        let mut slot = LatestSlot::new();
        let t = seq.issue();
        assert!(slot.offer(&seq, t, 1));
        assert!(!slot.offer(&seq, t, 2));
        assert_eq!(slot.take(), Some(1));
        assert!(slot.get().is_none());
    }

    #[test]
    fn advance_accepts_superseded_but_newer_completion() {
        let seq = Sequencer::new();
        let mut slot = LatestSlot::new();
        let t1 = seq.issue();
        let t2 = seq.issue();
        let _t3 = seq.issue();

        // Neither is current, but each is newer than what is shown.
        assert!(slot.advance(t1, 1));
        assert!(slot.advance(t2, 2));
        assert!(!slot.advance(t1, 3));
        assert_eq!(slot.get(), Some(&2));
        assert!(!slot.offer(&seq, t2, 4));
    }

    #[test]
    fn concurrent_issue_yields_unique_tickets() {
        let seq = std::sync::Arc::new(Sequencer::new());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let seq = std::sync::Arc::clone(&seq);
                std::thread::spawn(move || (0..100).map(|_| seq.issue().get()).collect::<Vec<_>>())
            })
            .collect();
        let mut all: Vec<u64> = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();
        all.sort_unstable();
        all.dedup();
        assert_eq!(all.len(), 400);
        assert_eq!(seq.latest().unwrap().get(), 400);
    }
}
