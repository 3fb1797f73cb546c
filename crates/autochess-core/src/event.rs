//! Typed event system with pre-allocated ring buffers.
//!
//! The engine emits events while it runs a tick and delivers them in one
//! batch at the end of that tick. Each event kind has its own
//! [`EventBuffer`] with a configurable capacity.
//!
//! Listeners are read-only: they observe what happened (for health bars,
//! floating text, audio) and cannot change the simulation.
//!
//! # Suppression
//!
//! Event kinds can be suppressed via [`EventBus::suppress`], which prevents
//! any allocation or recording for that kind.

use serde::{Deserialize, Serialize};

use crate::combat::DamageReport;
use crate::id::{AgentId, NodeIndex, Team, TileRef};

// ---------------------------------------------------------------------------
// Event types
// ---------------------------------------------------------------------------

/// A simulation event. All events carry the tick at which they occurred.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    // -- Rounds --
    RoundStarted {
        round: u32,
        tick: u64,
    },
    RoundEnded {
        round: u32,
        winner: Option<Team>,
        tick: u64,
    },

    // -- Placement & movement --
    AgentPlaced {
        agent: AgentId,
        team: Team,
        tile: TileRef,
        tick: u64,
    },
    /// Moved by an external command (drag and drop).
    AgentRelocated {
        agent: AgentId,
        from: TileRef,
        to: TileRef,
        tick: u64,
    },
    /// A battle node was claimed as the agent's next step.
    TileReserved {
        agent: AgentId,
        node: NodeIndex,
        tick: u64,
    },
    /// The agent arrived on a battle node and released the previous one.
    AgentMoved {
        agent: AgentId,
        from: NodeIndex,
        to: NodeIndex,
        tick: u64,
    },

    // -- Combat --
    TargetAcquired {
        agent: AgentId,
        target: AgentId,
        tick: u64,
    },
    AttackPerformed {
        attacker: AgentId,
        target: AgentId,
        is_critical: bool,
        tick: u64,
    },
    DamageTaken {
        agent: AgentId,
        attacker: AgentId,
        report: DamageReport,
        tick: u64,
    },
    AbilityCast {
        agent: AgentId,
        target: AgentId,
        tick: u64,
    },
    AgentDied {
        agent: AgentId,
        team: Team,
        killer: Option<AgentId>,
        tick: u64,
    },
}

/// Discriminant tag for event types, used for suppression and filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    RoundStarted,
    RoundEnded,
    AgentPlaced,
    AgentRelocated,
    TileReserved,
    AgentMoved,
    TargetAcquired,
    AttackPerformed,
    DamageTaken,
    AbilityCast,
    AgentDied,
}

/// Total number of event kinds.
const EVENT_KIND_COUNT: usize = 11;

impl Event {
    /// Get the discriminant kind for this event.
    pub fn kind(&self) -> EventKind {
        match self {
            Event::RoundStarted { .. } => EventKind::RoundStarted,
            Event::RoundEnded { .. } => EventKind::RoundEnded,
            Event::AgentPlaced { .. } => EventKind::AgentPlaced,
            Event::AgentRelocated { .. } => EventKind::AgentRelocated,
            Event::TileReserved { .. } => EventKind::TileReserved,
            Event::AgentMoved { .. } => EventKind::AgentMoved,
            Event::TargetAcquired { .. } => EventKind::TargetAcquired,
            Event::AttackPerformed { .. } => EventKind::AttackPerformed,
            Event::DamageTaken { .. } => EventKind::DamageTaken,
            Event::AbilityCast { .. } => EventKind::AbilityCast,
            Event::AgentDied { .. } => EventKind::AgentDied,
        }
    }

    pub fn tick(&self) -> u64 {
        match self {
            Event::RoundStarted { tick, .. }
            | Event::RoundEnded { tick, .. }
            | Event::AgentPlaced { tick, .. }
            | Event::AgentRelocated { tick, .. }
            | Event::TileReserved { tick, .. }
            | Event::AgentMoved { tick, .. }
            | Event::TargetAcquired { tick, .. }
            | Event::AttackPerformed { tick, .. }
            | Event::DamageTaken { tick, .. }
            | Event::AbilityCast { tick, .. }
            | Event::AgentDied { tick, .. } => *tick,
        }
    }
}

impl EventKind {
    pub const ALL: [EventKind; EVENT_KIND_COUNT] = [
        EventKind::RoundStarted,
        EventKind::RoundEnded,
        EventKind::AgentPlaced,
        EventKind::AgentRelocated,
        EventKind::TileReserved,
        EventKind::AgentMoved,
        EventKind::TargetAcquired,
        EventKind::AttackPerformed,
        EventKind::DamageTaken,
        EventKind::AbilityCast,
        EventKind::AgentDied,
    ];

    fn index(self) -> usize {
        self as usize
    }
}

// ---------------------------------------------------------------------------
// EventBuffer: pre-allocated ring buffer
// ---------------------------------------------------------------------------

/// A pre-allocated ring buffer for events. Fixed capacity; when full, the
/// oldest events are dropped.
#[derive(Debug)]
pub struct EventBuffer {
    events: Vec<Option<Event>>,
    /// Write position (wraps around).
    head: usize,
    len: usize,
    /// Total events ever written (including dropped).
    total_written: u64,
}

impl EventBuffer {
    /// A capacity of 0 is clamped to 1.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            events: (0..capacity).map(|_| None).collect(),
            head: 0,
            len: 0,
            total_written: 0,
        }
    }

    /// Push an event. If full, the oldest event is dropped.
    pub fn push(&mut self, event: Event) {
        self.events[self.head] = Some(event);
        self.head = (self.head + 1) % self.capacity();
        if self.len < self.capacity() {
            self.len += 1;
        }
        self.total_written += 1;
    }

    pub fn capacity(&self) -> usize {
        self.events.len()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn total_written(&self) -> u64 {
        self.total_written
    }

    /// Iterate over events from oldest to newest.
    pub fn iter(&self) -> EventBufferIter<'_> {
        // Once full, head points at the oldest entry.
        let start = if self.len < self.capacity() { 0 } else { self.head };
        EventBufferIter {
            buffer: self,
            index: start,
            remaining: self.len,
        }
    }

    pub fn clear(&mut self) {
        for slot in &mut self.events {
            *slot = None;
        }
        self.head = 0;
        self.len = 0;
    }
}

/// Iterator over events in an [`EventBuffer`], from oldest to newest.
pub struct EventBufferIter<'a> {
    buffer: &'a EventBuffer,
    index: usize,
    remaining: usize,
}

impl<'a> Iterator for EventBufferIter<'a> {
    type Item = &'a Event;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let event = self.buffer.events[self.index].as_ref();
        self.index = (self.index + 1) % self.buffer.capacity();
        self.remaining -= 1;
        event
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl ExactSizeIterator for EventBufferIter<'_> {}

// ---------------------------------------------------------------------------
// Listeners
// ---------------------------------------------------------------------------

/// A passive listener receives events read-only.
pub type PassiveListener = Box<dyn FnMut(&Event)>;

/// Optional predicate that filters events for a listener.
pub type EventFilter = Box<dyn Fn(&Event) -> bool>;

/// Priority level for listeners. Lower priorities run first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SubscriberPriority {
    Pre = 0,
    Normal = 1,
    Post = 2,
}

struct SubscriberEntry {
    listener: PassiveListener,
    priority: SubscriberPriority,
    filter: Option<EventFilter>,
    insertion_order: u64,
}

impl std::fmt::Debug for SubscriberEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriberEntry")
            .field("priority", &self.priority)
            .field("filtered", &self.filter.is_some())
            .field("insertion_order", &self.insertion_order)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// One ring buffer per event kind, listener lists, and suppression flags.
pub struct EventBus {
    buffers: [Option<EventBuffer>; EVENT_KIND_COUNT],
    suppressed: [bool; EVENT_KIND_COUNT],
    subscribers: [Vec<SubscriberEntry>; EVENT_KIND_COUNT],
    default_capacity: usize,
    /// Monotonic counter for stable listener ordering.
    next_insertion_order: u64,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("buffers", &self.buffers)
            .field("suppressed", &self.suppressed)
            .field("default_capacity", &self.default_capacity)
            .finish_non_exhaustive()
    }
}

impl EventBus {
    pub fn new(default_capacity: usize) -> Self {
        Self {
            buffers: Default::default(),
            suppressed: [false; EVENT_KIND_COUNT],
            subscribers: Default::default(),
            default_capacity,
            next_insertion_order: 0,
        }
    }

    /// Suppressed kinds are never allocated or buffered.
    pub fn suppress(&mut self, kind: EventKind) {
        self.suppressed[kind.index()] = true;
        self.buffers[kind.index()] = None;
    }

    pub fn is_suppressed(&self, kind: EventKind) -> bool {
        self.suppressed[kind.index()]
    }

    /// Buffer an event for delivery. No-op for suppressed kinds.
    pub fn emit(&mut self, event: Event) {
        let idx = event.kind().index();
        if self.suppressed[idx] {
            return;
        }

        let capacity = self.default_capacity;
        self.buffers[idx]
            .get_or_insert_with(|| EventBuffer::new(capacity))
            .push(event);
    }

    /// Register a listener with Normal priority and no filter.
    pub fn on_passive(&mut self, kind: EventKind, listener: PassiveListener) {
        self.on_passive_filtered(kind, SubscriberPriority::Normal, None, listener);
    }

    pub fn on_passive_filtered(
        &mut self,
        kind: EventKind,
        priority: SubscriberPriority,
        filter: Option<EventFilter>,
        listener: PassiveListener,
    ) {
        let order = self.next_insertion_order;
        self.next_insertion_order += 1;
        let list = &mut self.subscribers[kind.index()];
        list.push(SubscriberEntry {
            listener,
            priority,
            filter,
            insertion_order: order,
        });
        list.sort_by_key(|entry| (entry.priority, entry.insertion_order));
    }

    /// Deliver every buffered event to its listeners, kind by kind, then
    /// clear the buffers.
    pub fn deliver(&mut self) {
        for idx in 0..EVENT_KIND_COUNT {
            let Some(buffer) = self.buffers[idx].as_mut() else {
                continue;
            };
            if buffer.is_empty() {
                continue;
            }

            let events: Vec<Event> = buffer.iter().cloned().collect();
            buffer.clear();

            for entry in &mut self.subscribers[idx] {
                for event in &events {
                    if let Some(ref filter) = entry.filter
                        && !filter(event)
                    {
                        continue;
                    }
                    (entry.listener)(event);
                }
            }
        }
    }

    pub fn buffer(&self, kind: EventKind) -> Option<&EventBuffer> {
        self.buffers[kind.index()].as_ref()
    }

    pub fn buffered_count(&self, kind: EventKind) -> usize {
        self.buffers[kind.index()]
            .as_ref()
            .map_or(0, EventBuffer::len)
    }

    /// Events ever emitted for a kind, including dropped ones.
    pub fn total_emitted(&self, kind: EventKind) -> u64 {
        self.buffers[kind.index()]
            .as_ref()
            .map_or(0, EventBuffer::total_written)
    }

    /// Clear all buffers. Listeners and suppression settings stay.
    pub fn clear_all(&mut self) {
        for buffer in self.buffers.iter_mut().flatten() {
            buffer.clear();
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1024)
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use slotmap::SlotMap;
    use std::cell::RefCell;
    use std::rc::Rc;

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    fn make_agent_ids(count: usize) -> Vec<AgentId> {
        let mut sm = SlotMap::<AgentId, ()>::with_key();
        (0..count).map(|_| sm.insert(())).collect()
    }

    fn moved(agent: AgentId, tick: u64) -> Event {
        Event::AgentMoved {
            agent,
            from: NodeIndex(0),
            to: NodeIndex(1),
            tick,
        }
    }

    // -----------------------------------------------------------------------
    // Test 1: Ring buffer wraps and drops oldest
    // -----------------------------------------------------------------------
    #[test]
    fn event_buffer_ring_wraps_and_drops_oldest() {
        let agent = make_agent_ids(1)[0];
        let mut buf = EventBuffer::new(3);
        for tick in 0..5 {
            buf.push(moved(agent, tick));
        }

        assert_eq!(buf.len(), 3);
        assert_eq!(buf.total_written(), 5);
        let ticks: Vec<u64> = buf.iter().map(Event::tick).collect();
        assert_eq!(ticks, vec![2, 3, 4]);

        buf.clear();
        assert!(buf.is_empty());
        assert_eq!(buf.iter().count(), 0);
    }

    // -----------------------------------------------------------------------
    // Test 2: Zero capacity is clamped
    // -----------------------------------------------------------------------
    #[test]
    fn zero_capacity_clamped_to_one() {
        let buf = EventBuffer::new(0);
        assert_eq!(buf.capacity(), 1);
    }

    // -----------------------------------------------------------------------
    // Test 3: Suppressed kinds never buffer
    // -----------------------------------------------------------------------
    #[test]
    fn suppressed_events_are_dropped() {
        let agent = make_agent_ids(1)[0];
        let mut bus = EventBus::new(8);
        bus.suppress(EventKind::AgentMoved);
        bus.emit(moved(agent, 1));

        assert!(bus.is_suppressed(EventKind::AgentMoved));
        assert_eq!(bus.buffered_count(EventKind::AgentMoved), 0);
        assert!(bus.buffer(EventKind::AgentMoved).is_none());
    }

    // -----------------------------------------------------------------------
    // Test 4: Listeners run by priority, then registration order
    // -----------------------------------------------------------------------
    #[test]
    fn listeners_ordered_by_priority() {
        let agent = make_agent_ids(1)[0];
        let mut bus = EventBus::new(8);
        let log = Rc::new(RefCell::new(Vec::new()));

        for (label, priority) in [
            ("normal-a", SubscriberPriority::Normal),
            ("post", SubscriberPriority::Post),
            ("pre", SubscriberPriority::Pre),
            ("normal-b", SubscriberPriority::Normal),
        ] {
            let log = Rc::clone(&log);
            bus.on_passive_filtered(
                EventKind::AgentMoved,
                priority,
                None,
                Box::new(move |_| log.borrow_mut().push(label)),
            );
        }

        bus.emit(moved(agent, 1));
        bus.deliver();
        assert_eq!(*log.borrow(), vec!["pre", "normal-a", "normal-b", "post"]);
    }

    // -----------------------------------------------------------------------
    // Test 5: Filters skip events
    // -----------------------------------------------------------------------
    #[test]
    fn filter_skips_other_agents() {
        let ids = make_agent_ids(2);
        let watched = ids[0];
        let mut bus = EventBus::new(8);
        let seen = Rc::new(RefCell::new(0));

        let counter = Rc::clone(&seen);
        bus.on_passive_filtered(
            EventKind::AgentMoved,
            SubscriberPriority::Normal,
            Some(Box::new(move |e| {
                matches!(e, Event::AgentMoved { agent, .. } if *agent == watched)
            })),
            Box::new(move |_| *counter.borrow_mut() += 1),
        );

        bus.emit(moved(ids[0], 1));
        bus.emit(moved(ids[1], 1));
        bus.emit(moved(ids[0], 2));
        bus.deliver();
        assert_eq!(*seen.borrow(), 2);
    }

    // -----------------------------------------------------------------------
    // Test 6: Delivery clears buffers but keeps totals
    // -----------------------------------------------------------------------
    #[test]
    fn delivery_clears_buffers() {
        let agent = make_agent_ids(1)[0];
        let mut bus = EventBus::new(8);
        bus.emit(moved(agent, 1));
        bus.emit(Event::RoundStarted { round: 1, tick: 1 });
        assert_eq!(bus.buffered_count(EventKind::AgentMoved), 1);

        bus.deliver();
        assert_eq!(bus.buffered_count(EventKind::AgentMoved), 0);
        assert_eq!(bus.buffered_count(EventKind::RoundStarted), 0);
        assert_eq!(bus.total_emitted(EventKind::AgentMoved), 1);
    }

    // -----------------------------------------------------------------------
    // Test 7: Kinds don't interfere
    // -----------------------------------------------------------------------
    #[test]
    fn listener_only_sees_its_kind() {
        let ids = make_agent_ids(2);
        let mut bus = EventBus::default();
        let deaths = Rc::new(RefCell::new(Vec::new()));

        let sink = Rc::clone(&deaths);
        bus.on_passive(
            EventKind::AgentDied,
            Box::new(move |e| sink.borrow_mut().push(e.clone())),
        );

        bus.emit(moved(ids[0], 3));
        bus.emit(Event::AgentDied {
            agent: ids[1],
            team: Team::Enemy,
            killer: Some(ids[0]),
            tick: 3,
        });
        bus.deliver();

        let deaths = deaths.borrow();
        assert_eq!(deaths.len(), 1);
        assert_eq!(deaths[0].kind(), EventKind::AgentDied);
        assert_eq!(deaths[0].tick(), 3);
    }

    // -----------------------------------------------------------------------
    // Test 8: clear_all drops pending events
    // -----------------------------------------------------------------------
    #[test]
    fn clear_all_drops_pending() {
        let agent = make_agent_ids(1)[0];
        let mut bus = EventBus::new(4);
        let hits = Rc::new(RefCell::new(0));
        let counter = Rc::clone(&hits);
        bus.on_passive(EventKind::AgentMoved, Box::new(move |_| *counter.borrow_mut() += 1));

        bus.emit(moved(agent, 1));
        bus.clear_all();
        bus.deliver();
        assert_eq!(*hits.borrow(), 0);
    }

    #[test]
    fn kind_indices_are_dense() {
        for (i, kind) in EventKind::ALL.iter().enumerate() {
            assert_eq!(kind.index(), i);
        }
    }
}
