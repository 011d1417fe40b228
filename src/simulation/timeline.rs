// src/simulation/timeline.rs

//! The discrete-event kernel: a monotonically advancing clock and the set of
//! pending events, dispatched one at a time in `(time, insertion order)`.
//!
//! Events live in a slot arena with a free list; the binary heap only orders
//! small copyable keys. Cancelling an event empties its slot and bumps the
//! slot generation, so the heap key left behind is recognised as stale and
//! skipped when it reaches the top.

use crate::core::{NodeId, SimError, SimTime};
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use tracing::trace;

/// Gives every event payload a short kind tag, used in logs and errors.
pub trait EventKind {
    /// Static name of the event kind.
    fn kind(&self) -> &'static str;
}

impl EventKind for () {
    fn kind(&self) -> &'static str {
        "unit"
    }
}

/// Handle to a scheduled event, valid until the event is dispatched or cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EventId {
    slot: u32,
    generation: u32,
}

/// An event popped from the timeline.
#[derive(Debug, Clone)]
pub struct Event<P> {
    /// Handle the event was scheduled under.
    pub id: EventId,
    /// Dispatch time.
    pub time: SimTime,
    /// Node the event is addressed to.
    pub target: NodeId,
    /// Event data.
    pub payload: P,
}

impl<P: EventKind> Event<P> {
    /// Kind tag of the payload.
    pub fn kind(&self) -> &'static str {
        self.payload.kind()
    }
}

/// Receives events from [`Timeline::run`].
///
/// The handler gets the timeline back so it can schedule or cancel follow-up
/// events; anything it schedules is visible to the very next pop.
pub trait EventHandler<P> {
    /// Processes one event. An error aborts the run.
    fn handle(&mut self, event: Event<P>, timeline: &mut Timeline<P>) -> Result<(), SimError>;
}

impl<P, F> EventHandler<P> for F
where
    F: FnMut(Event<P>, &mut Timeline<P>) -> Result<(), SimError>,
{
    fn handle(&mut self, event: Event<P>, timeline: &mut Timeline<P>) -> Result<(), SimError> {
        self(event, timeline)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct QueueKey {
    time: SimTime,
    seq: u64,
    slot: u32,
    generation: u32,
}

// Reversed so that `BinaryHeap` pops the earliest time, then the lowest sequence.
impl Ord for QueueKey {
    fn cmp(&self, other: &Self) -> Ordering {
        other.time.cmp(&self.time).then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for QueueKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[derive(Debug)]
struct Slot<P> {
    generation: u32,
    entry: Option<(NodeId, P)>,
}

/// Global simulated clock plus every pending event.
#[derive(Debug)]
pub struct Timeline<P> {
    now: SimTime,
    next_seq: u64,
    queue: BinaryHeap<QueueKey>,
    slots: Vec<Slot<P>>,
    free: Vec<u32>,
    live: usize,
    dispatched: u64,
}

impl<P> Default for Timeline<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P> Timeline<P> {
    /// Creates an empty timeline at time 0.
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Creates an empty timeline with room for `capacity` pending events.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            now: 0,
            next_seq: 0,
            queue: BinaryHeap::with_capacity(capacity),
            slots: Vec::with_capacity(capacity),
            free: Vec::new(),
            live: 0,
            dispatched: 0,
        }
    }

    /// Current simulated time.
    pub fn now(&self) -> SimTime {
        self.now
    }

    /// Number of events still waiting to be dispatched.
    pub fn pending(&self) -> usize {
        self.live
    }

    /// `true` when nothing is pending.
    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Total number of events dispatched since creation or the last reset.
    pub fn dispatched(&self) -> u64 {
        self.dispatched
    }

    /// Removes a pending event. Returns `false` if it was already dispatched
    /// or cancelled.
    pub fn cancel(&mut self, id: EventId) -> bool {
        let Some(slot) = self.slots.get_mut(id.slot as usize) else {
            return false;
        };
        if slot.generation != id.generation || slot.entry.is_none() {
            return false;
        }
        slot.entry = None;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.slot);
        self.live -= 1;
        true
    }

    /// Time of the next event to dispatch, if any.
    pub fn peek_time(&mut self) -> Option<SimTime> {
        self.discard_stale();
        self.queue.peek().map(|key| key.time)
    }

    /// Pops the earliest event and moves the clock to its time.
    pub fn pop_next(&mut self) -> Option<Event<P>> {
        while let Some(key) = self.queue.pop() {
            let slot = &mut self.slots[key.slot as usize];
            if slot.generation != key.generation {
                continue;
            }
            let Some((target, payload)) = slot.entry.take() else {
                continue;
            };
            slot.generation = slot.generation.wrapping_add(1);
            self.free.push(key.slot);
            self.live -= 1;
            self.now = key.time;
            self.dispatched += 1;
            return Some(Event {
                id: EventId { slot: key.slot, generation: key.generation },
                time: key.time,
                target,
                payload,
            });
        }
        None
    }

    /// Drops every pending event and rewinds the clock to 0.
    pub fn reset(&mut self) {
        self.now = 0;
        self.next_seq = 0;
        self.queue.clear();
        self.slots.clear();
        self.free.clear();
        self.live = 0;
        self.dispatched = 0;
    }

    fn discard_stale(&mut self) {
        while let Some(key) = self.queue.peek() {
            let slot = &self.slots[key.slot as usize];
            if slot.generation == key.generation && slot.entry.is_some() {
                break;
            }
            self.queue.pop();
        }
    }

    fn insert(&mut self, time: SimTime, target: NodeId, payload: P) -> EventId {
        let slot = match self.free.pop() {
            Some(slot) => {
                self.slots[slot as usize].entry = Some((target, payload));
                slot
            }
            None => {
                self.slots.push(Slot { generation: 0, entry: Some((target, payload)) });
                (self.slots.len() - 1) as u32
            }
        };
        let generation = self.slots[slot as usize].generation;
        self.queue.push(QueueKey { time, seq: self.next_seq, slot, generation });
        self.next_seq += 1;
        self.live += 1;
        EventId { slot, generation }
    }
}

impl<P: EventKind> Timeline<P> {
    /// Schedules `payload` for `target` at absolute time `time`.
    ///
    /// Fails with [`SimError::CausalityViolation`] if `time` is before `now()`.
    /// Events sharing a time are dispatched in the order they were scheduled.
    pub fn schedule(&mut self, time: SimTime, target: NodeId, payload: P) -> Result<EventId, SimError> {
        if time < self.now {
            return Err(SimError::CausalityViolation { time, now: self.now, kind: payload.kind() });
        }
        trace!(time, %target, kind = payload.kind(), "schedule");
        Ok(self.insert(time, target, payload))
    }

    /// Schedules `payload` for `target` at `now() + delay`.
    pub fn schedule_in(&mut self, delay: SimTime, target: NodeId, payload: P) -> Result<EventId, SimError> {
        let time = self.now.saturating_add(delay);
        self.schedule(time, target, payload)
    }

    /// Moves the clock forward while idle. Fails if `time` is in the past or
    /// would jump over a pending event.
    pub fn advance_to(&mut self, time: SimTime) -> Result<(), SimError> {
        if time < self.now {
            return Err(SimError::CausalityViolation { time, now: self.now, kind: "advance" });
        }
        if let Some(next) = self.peek_time() {
            if next < time {
                return Err(SimError::CausalityViolation { time: next, now: time, kind: "advance" });
            }
        }
        self.now = time;
        Ok(())
    }

    /// Dispatches events until none remain. Returns the number dispatched.
    ///
    /// A handler error stops the run and comes back wrapped in
    /// [`SimError::Dispatch`] with the failing event's time and kind.
    pub fn run<H: EventHandler<P>>(&mut self, handler: &mut H) -> Result<u64, SimError> {
        self.run_until(SimTime::MAX, handler)
    }

    /// Dispatches events with `time <= limit`, then moves the clock to
    /// `limit` if it is still behind (unless `limit` is `SimTime::MAX`).
    pub fn run_until<H: EventHandler<P>>(&mut self, limit: SimTime, handler: &mut H) -> Result<u64, SimError> {
        let mut count = 0;
        while let Some(next) = self.peek_time() {
            if next > limit {
                break;
            }
            let Some(event) = self.pop_next() else {
                break;
            };
            let (time, kind) = (event.time, event.kind());
            handler
                .handle(event, self)
                .map_err(|source| SimError::Dispatch { time, kind, source: Box::new(source) })?;
            count += 1;
        }
        if limit != SimTime::MAX && self.now < limit {
            self.now = limit;
        }
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    struct Tag(u32);

    impl EventKind for Tag {
        fn kind(&self) -> &'static str {
            "tag"
        }
    }

    const NODE: NodeId = NodeId(0);

    #[test]
    fn test_dispatch_order_is_time_then_insertion() -> Result<(), SimError> {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let mut timeline = Timeline::new();
        for i in 0..2_000u32 {
            // Few distinct times so that ties are common.
            let time = rng.gen_range(0..50u64);
            timeline.schedule(time, NODE, Tag(i))?;
        }

        let mut seen: Vec<(SimTime, u32)> = Vec::new();
        timeline.run(&mut |event: Event<Tag>, _: &mut Timeline<Tag>| {
            seen.push((event.time, event.payload.0));
            Ok(())
        })?;

        assert_eq!(seen.len(), 2_000);
        for pair in seen.windows(2) {
            let ((t0, i0), (t1, i1)) = (pair[0], pair[1]);
            assert!(t0 <= t1, "time went backwards: {} then {}", t0, t1);
            if t0 == t1 {
                assert!(i0 < i1, "equal-time events out of insertion order: {} then {}", i0, i1);
            }
        }
        Ok(())
    }

    #[test]
    fn test_scheduling_in_the_past_fails() -> Result<(), SimError> {
        let mut timeline = Timeline::new();
        timeline.schedule(10, NODE, Tag(0))?;
        timeline.run(&mut |_: Event<Tag>, _: &mut Timeline<Tag>| Ok(()))?;
        assert_eq!(timeline.now(), 10);

        let err = timeline.schedule(9, NODE, Tag(1)).unwrap_err();
        assert_eq!(err, SimError::CausalityViolation { time: 9, now: 10, kind: "tag" });
        // Scheduling exactly at `now` is allowed.
        assert!(timeline.schedule(10, NODE, Tag(2)).is_ok());
        Ok(())
    }

    #[test]
    fn test_handler_scheduled_events_run_in_same_call() -> Result<(), SimError> {
        let mut timeline = Timeline::new();
        timeline.schedule(0, NODE, Tag(3))?;

        let mut order = Vec::new();
        let dispatched = timeline.run(&mut |event: Event<Tag>, tl: &mut Timeline<Tag>| {
            order.push((event.time, event.payload.0));
            if event.payload.0 > 0 {
                // Same-time follow-up goes after anything already queued at that time.
                tl.schedule(event.time, NODE, Tag(0))?;
                tl.schedule_in(5, NODE, Tag(event.payload.0 - 1))?;
            }
            Ok(())
        })?;

        assert_eq!(dispatched, 7);
        assert_eq!(order, vec![(0, 3), (0, 0), (5, 2), (5, 0), (10, 1), (10, 0), (15, 0)]);
        Ok(())
    }

    #[test]
    fn test_cancel_pending_and_dispatched() -> Result<(), SimError> {
        let mut timeline = Timeline::new();
        let a = timeline.schedule(1, NODE, Tag(1))?;
        let b = timeline.schedule(2, NODE, Tag(2))?;
        assert_eq!(timeline.pending(), 2);

        assert!(timeline.cancel(b));
        assert!(!timeline.cancel(b), "double cancel is a no-op");
        assert_eq!(timeline.pending(), 1);

        let first = timeline.pop_next().map(|e| e.payload);
        assert_eq!(first, Some(Tag(1)));
        assert!(!timeline.cancel(a), "cancel after dispatch is a no-op");
        assert!(timeline.pop_next().is_none());
        assert!(timeline.is_empty());
        Ok(())
    }

    #[test]
    fn test_slot_reuse_does_not_revive_cancelled_key() -> Result<(), SimError> {
        let mut timeline = Timeline::new();
        let stale = timeline.schedule(5, NODE, Tag(1))?;
        timeline.cancel(stale);
        // Reuses the freed slot with a new generation.
        let fresh = timeline.schedule(7, NODE, Tag(2))?;
        assert_ne!(stale, fresh);
        assert!(!timeline.cancel(stale));

        let event = timeline.pop_next().map(|e| (e.time, e.payload));
        assert_eq!(event, Some((7, Tag(2))));
        assert!(timeline.pop_next().is_none());
        Ok(())
    }

    #[test]
    fn test_run_until_stops_and_advances_clock() -> Result<(), SimError> {
        let mut timeline = Timeline::new();
        for t in [1, 4, 9] {
            timeline.schedule(t, NODE, Tag(t as u32))?;
        }
        let n = timeline.run_until(5, &mut |_: Event<Tag>, _: &mut Timeline<Tag>| Ok(()))?;
        assert_eq!(n, 2);
        assert_eq!(timeline.now(), 5);
        assert_eq!(timeline.peek_time(), Some(9));
        Ok(())
    }

    #[test]
    fn test_advance_to_respects_pending_events() -> Result<(), SimError> {
        let mut timeline: Timeline<Tag> = Timeline::new();
        timeline.advance_to(100)?;
        assert_eq!(timeline.now(), 100);
        assert!(timeline.advance_to(50).is_err());

        timeline.schedule(150, NODE, Tag(0))?;
        assert!(timeline.advance_to(200).is_err());
        timeline.advance_to(150)?;
        Ok(())
    }

    #[test]
    fn test_handler_error_carries_event_context() -> Result<(), SimError> {
        let mut timeline = Timeline::new();
        timeline.schedule(42, NODE, Tag(0))?;
        let err = timeline
            .run(&mut |_: Event<Tag>, _: &mut Timeline<Tag>| Err(SimError::NotPaired { node: "a".into() }))
            .unwrap_err();
        match err {
            SimError::Dispatch { time, kind, source } => {
                assert_eq!(time, 42);
                assert_eq!(kind, "tag");
                assert_eq!(*source, SimError::NotPaired { node: "a".into() });
            }
            other => panic!("unexpected error {other}"),
        }
        Ok(())
    }

    #[test]
    fn test_reset_clears_everything() -> Result<(), SimError> {
        let mut timeline = Timeline::new();
        timeline.schedule(3, NODE, Tag(0))?;
        timeline.pop_next();
        timeline.schedule(8, NODE, Tag(1))?;
        timeline.reset();
        assert_eq!(timeline.now(), 0);
        assert!(timeline.is_empty());
        assert_eq!(timeline.dispatched(), 0);
        assert!(timeline.pop_next().is_none());
        Ok(())
    }
}
