//! Typed event bus connecting the thermal simulator, the procedure
//! controller, and outside subscribers.
//!
//! Events are emitted during the pre-tick, thermal, mixture, and procedure
//! phases and delivered in batch during post-tick. Each event kind has its
//! own fixed-capacity ring buffer; when a buffer fills, the oldest events
//! are dropped and the drop is counted.
//!
//! # Subscriber types
//!
//! - **Passive listeners**: read-only; display layers, audio cues, logging.
//! - **Reactive handlers**: return [`LabMutation`]s that the engine applies
//!   at the next pre-tick, keeping all mutation on tick boundaries.
//!
//! Event kinds can be suppressed; suppressed events are never buffered.

use crate::color::Color;
use crate::id::{EquipmentId, EquipmentTypeId, ReagentId, RuleId, StepId};
use crate::registry::ThermalMode;
use crate::units::Ticks;

// ---------------------------------------------------------------------------
// Event types
// ---------------------------------------------------------------------------

/// A simulation event. All events carry the tick at which they occurred.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LabEvent {
    // -- Workbench --
    EquipmentPlaced {
        equipment: EquipmentId,
        equipment_type: EquipmentTypeId,
        x: i32,
        y: i32,
        tick: Ticks,
    },
    EquipmentMoved {
        equipment: EquipmentId,
        x: i32,
        y: i32,
        tick: Ticks,
    },
    EquipmentDocked {
        equipment: EquipmentId,
        target: EquipmentId,
        x: i32,
        y: i32,
        tick: Ticks,
    },
    EquipmentRemoved {
        equipment: EquipmentId,
        equipment_type: EquipmentTypeId,
        tick: Ticks,
    },
    ChemicalDispensed {
        equipment: EquipmentId,
        reagent: ReagentId,
        volume: u32,
        tick: Ticks,
    },

    // -- Chemistry --
    ReactionDetected {
        equipment: EquipmentId,
        rule: RuleId,
        tick: Ticks,
    },
    MixtureChanged {
        equipment: EquipmentId,
        color: Color,
        tick: Ticks,
    },

    // -- Thermal --
    PhaseStarted {
        container: EquipmentId,
        mode: ThermalMode,
        tick: Ticks,
    },
    PhaseAborted {
        container: EquipmentId,
        mode: ThermalMode,
        tick: Ticks,
    },
    PhaseCompleted {
        container: EquipmentId,
        mode: ThermalMode,
        tick: Ticks,
    },

    // -- Procedure --
    StepAdvanced {
        step: StepId,
        tick: Ticks,
    },
    ExperimentCompleted {
        tick: Ticks,
    },
}

/// Discriminant tag for event types, used for suppression and subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    EquipmentPlaced,
    EquipmentMoved,
    EquipmentDocked,
    EquipmentRemoved,
    ChemicalDispensed,
    ReactionDetected,
    MixtureChanged,
    PhaseStarted,
    PhaseAborted,
    PhaseCompleted,
    StepAdvanced,
    ExperimentCompleted,
}

/// Total number of event kinds.
const EVENT_KIND_COUNT: usize = 12;

impl LabEvent {
    /// Get the discriminant kind for this event.
    pub fn kind(&self) -> EventKind {
        match self {
            LabEvent::EquipmentPlaced { .. } => EventKind::EquipmentPlaced,
            LabEvent::EquipmentMoved { .. } => EventKind::EquipmentMoved,
            LabEvent::EquipmentDocked { .. } => EventKind::EquipmentDocked,
            LabEvent::EquipmentRemoved { .. } => EventKind::EquipmentRemoved,
            LabEvent::ChemicalDispensed { .. } => EventKind::ChemicalDispensed,
            LabEvent::ReactionDetected { .. } => EventKind::ReactionDetected,
            LabEvent::MixtureChanged { .. } => EventKind::MixtureChanged,
            LabEvent::PhaseStarted { .. } => EventKind::PhaseStarted,
            LabEvent::PhaseAborted { .. } => EventKind::PhaseAborted,
            LabEvent::PhaseCompleted { .. } => EventKind::PhaseCompleted,
            LabEvent::StepAdvanced { .. } => EventKind::StepAdvanced,
            LabEvent::ExperimentCompleted { .. } => EventKind::ExperimentCompleted,
        }
    }

    /// The tick the event occurred on.
    pub fn tick(&self) -> Ticks {
        match self {
            LabEvent::EquipmentPlaced { tick, .. }
            | LabEvent::EquipmentMoved { tick, .. }
            | LabEvent::EquipmentDocked { tick, .. }
            | LabEvent::EquipmentRemoved { tick, .. }
            | LabEvent::ChemicalDispensed { tick, .. }
            | LabEvent::ReactionDetected { tick, .. }
            | LabEvent::MixtureChanged { tick, .. }
            | LabEvent::PhaseStarted { tick, .. }
            | LabEvent::PhaseAborted { tick, .. }
            | LabEvent::PhaseCompleted { tick, .. }
            | LabEvent::StepAdvanced { tick, .. }
            | LabEvent::ExperimentCompleted { tick } => *tick,
        }
    }
}

impl EventKind {
    fn index(self) -> usize {
        self as usize
    }
}

// ---------------------------------------------------------------------------
// Mutations (returned by reactive handlers)
// ---------------------------------------------------------------------------

/// A mutation a reactive handler wants applied at the next pre-tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LabMutation {
    PlaceEquipment {
        equipment_type: EquipmentTypeId,
        x: i32,
        y: i32,
    },
    RemoveEquipment {
        equipment: EquipmentId,
    },
    Dispense {
        reagent: ReagentId,
        equipment: EquipmentId,
        amount: i64,
    },
}

// ---------------------------------------------------------------------------
// EventBuffer -- fixed-capacity ring
// ---------------------------------------------------------------------------

/// A fixed-capacity ring buffer of events. When full, the oldest events are
/// dropped.
#[derive(Debug)]
pub struct EventBuffer {
    events: Vec<Option<LabEvent>>,
    /// Next write position (wraps around).
    head: usize,
    len: usize,
    /// Total events ever written, including dropped ones.
    total_written: u64,
}

impl EventBuffer {
    /// Capacity 0 is clamped to 1.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            events: (0..capacity).map(|_| None).collect(),
            head: 0,
            len: 0,
            total_written: 0,
        }
    }

    pub fn push(&mut self, event: LabEvent) {
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

    /// Events dropped because the buffer was full.
    pub fn dropped_count(&self) -> u64 {
        self.total_written.saturating_sub(self.capacity() as u64)
    }

    /// Iterate oldest-to-newest.
    pub fn iter(&self) -> impl Iterator<Item = &LabEvent> {
        let start = if self.len < self.capacity() {
            0
        } else {
            // head is the next write position, i.e. the oldest entry
            self.head
        };
        (0..self.len).filter_map(move |i| self.events[(start + i) % self.capacity()].as_ref())
    }

    pub fn clear(&mut self) {
        for slot in &mut self.events {
            *slot = None;
        }
        self.head = 0;
        self.len = 0;
    }
}

// ---------------------------------------------------------------------------
// Subscribers
// ---------------------------------------------------------------------------

/// A passive listener receives events read-only.
pub type PassiveListener = Box<dyn FnMut(&LabEvent)>;

/// A reactive handler receives an event and returns zero or more mutations
/// to apply at the next pre-tick.
pub type ReactiveHandler = Box<dyn FnMut(&LabEvent) -> Vec<LabMutation>>;

enum Subscriber {
    Passive(PassiveListener),
    Reactive(ReactiveHandler),
}

impl std::fmt::Debug for Subscriber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Subscriber::Passive(_) => write!(f, "Passive(<fn>)"),
            Subscriber::Reactive(_) => write!(f, "Reactive(<fn>)"),
        }
    }
}

/// Priority level for event subscribers. Lower priorities run first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SubscriberPriority {
    Pre = 0,
    Normal = 1,
    Post = 2,
}

/// Optional predicate that filters events for a subscriber.
pub type EventFilter = Box<dyn Fn(&LabEvent) -> bool>;

struct SubscriberEntry {
    subscriber: Subscriber,
    priority: SubscriberPriority,
    filter: Option<EventFilter>,
    insertion_order: u64,
}

impl std::fmt::Debug for SubscriberEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriberEntry")
            .field("subscriber", &self.subscriber)
            .field("priority", &self.priority)
            .field("has_filter", &self.filter.is_some())
            .field("insertion_order", &self.insertion_order)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// The central event bus: one ring buffer per event kind, subscriber lists,
/// and suppression flags.
pub struct EventBus {
    buffers: [Option<EventBuffer>; EVENT_KIND_COUNT],
    suppressed: [bool; EVENT_KIND_COUNT],
    subscribers: [Vec<SubscriberEntry>; EVENT_KIND_COUNT],
    /// Mutations collected from reactive handlers during delivery, drained
    /// by the engine at the next pre-tick.
    pending_mutations: Vec<LabMutation>,
    default_capacity: usize,
    next_insertion_order: u64,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("suppressed", &self.suppressed)
            .field("pending_mutations", &self.pending_mutations)
            .field("default_capacity", &self.default_capacity)
            .finish_non_exhaustive()
    }
}

impl EventBus {
    /// Create a new event bus with the given default buffer capacity per kind.
    pub fn new(default_capacity: usize) -> Self {
        Self {
            buffers: Default::default(),
            suppressed: [false; EVENT_KIND_COUNT],
            subscribers: std::array::from_fn(|_| Vec::new()),
            pending_mutations: Vec::new(),
            default_capacity,
            next_insertion_order: 0,
        }
    }

    /// Suppress an event kind. Suppressed events are never buffered.
    pub fn suppress(&mut self, kind: EventKind) {
        self.suppressed[kind.index()] = true;
        self.buffers[kind.index()] = None;
    }

    pub fn is_suppressed(&self, kind: EventKind) -> bool {
        self.suppressed[kind.index()]
    }

    /// Emit an event into its ring buffer. No-op for suppressed kinds.
    pub fn emit(&mut self, event: LabEvent) {
        let idx = event.kind().index();
        if self.suppressed[idx] {
            return;
        }
        let buffer = self.buffers[idx]
            .get_or_insert_with(|| EventBuffer::new(self.default_capacity));
        buffer.push(event);
    }

    /// Register a passive listener with Normal priority and no filter.
    pub fn on_passive(&mut self, kind: EventKind, listener: PassiveListener) {
        self.on_passive_filtered(kind, SubscriberPriority::Normal, None, listener);
    }

    /// Register a reactive handler with Normal priority and no filter.
    pub fn on_reactive(&mut self, kind: EventKind, handler: ReactiveHandler) {
        self.on_reactive_filtered(kind, SubscriberPriority::Normal, None, handler);
    }

    /// Register a passive listener with explicit priority and optional filter.
    pub fn on_passive_filtered(
        &mut self,
        kind: EventKind,
        priority: SubscriberPriority,
        filter: Option<EventFilter>,
        listener: PassiveListener,
    ) {
        let order = self.next_insertion_order;
        self.next_insertion_order += 1;
        self.subscribers[kind.index()].push(SubscriberEntry {
            subscriber: Subscriber::Passive(listener),
            priority,
            filter,
            insertion_order: order,
        });
    }

    /// Register a reactive handler with explicit priority and optional filter.
    pub fn on_reactive_filtered(
        &mut self,
        kind: EventKind,
        priority: SubscriberPriority,
        filter: Option<EventFilter>,
        handler: ReactiveHandler,
    ) {
        let order = self.next_insertion_order;
        self.next_insertion_order += 1;
        self.subscribers[kind.index()].push(SubscriberEntry {
            subscriber: Subscriber::Reactive(handler),
            priority,
            filter,
            insertion_order: order,
        });
    }

    /// Deliver all buffered events to subscribers, in `(priority,
    /// registration)` order per kind, oldest event first. Mutations from
    /// reactive handlers accumulate until [`drain_mutations`](Self::drain_mutations).
    /// Buffers are cleared after delivery.
    pub fn deliver(&mut self) {
        for idx in 0..EVENT_KIND_COUNT {
            if self.suppressed[idx] {
                continue;
            }
            let Some(buffer) = self.buffers[idx].as_ref() else {
                continue;
            };
            if buffer.is_empty() {
                continue;
            }

            // Clone events out so subscribers can't alias the buffer.
            let events: Vec<LabEvent> = buffer.iter().cloned().collect();

            self.subscribers[idx]
                .sort_by_key(|entry| (entry.priority as u8, entry.insertion_order));

            for entry in &mut self.subscribers[idx] {
                for event in &events {
                    if let Some(filter) = &entry.filter
                        && !filter(event)
                    {
                        continue;
                    }
                    match &mut entry.subscriber {
                        Subscriber::Passive(listener) => listener(event),
                        Subscriber::Reactive(handler) => {
                            self.pending_mutations.extend(handler(event));
                        }
                    }
                }
            }

            if let Some(buffer) = self.buffers[idx].as_mut() {
                buffer.clear();
            }
        }
    }

    /// Take all mutations collected from reactive handlers.
    pub fn drain_mutations(&mut self) -> Vec<LabMutation> {
        std::mem::take(&mut self.pending_mutations)
    }

    pub fn buffer(&self, kind: EventKind) -> Option<&EventBuffer> {
        self.buffers[kind.index()].as_ref()
    }

    pub fn buffered_count(&self, kind: EventKind) -> usize {
        self.buffers[kind.index()]
            .as_ref()
            .map(|b| b.len())
            .unwrap_or(0)
    }

    /// Total events ever emitted for a kind, including dropped ones.
    pub fn total_emitted(&self, kind: EventKind) -> u64 {
        self.buffers[kind.index()]
            .as_ref()
            .map(|b| b.total_written())
            .unwrap_or(0)
    }

    /// Clear all buffers and pending mutations. Subscribers and suppression
    /// settings survive.
    pub fn clear_all(&mut self) {
        for buffer in self.buffers.iter_mut().flatten() {
            buffer.clear();
        }
        self.pending_mutations.clear();
    }

    pub fn pending_mutation_count(&self) -> usize {
        self.pending_mutations.len()
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
    use std::cell::RefCell;
    use std::rc::Rc;

    fn make_equipment_id() -> EquipmentId {
        use slotmap::SlotMap;
        let mut sm = SlotMap::<EquipmentId, ()>::with_key();
        sm.insert(())
    }

    fn dispensed(volume: u32, tick: Ticks) -> LabEvent {
        LabEvent::ChemicalDispensed {
            equipment: make_equipment_id(),
            reagent: ReagentId(0),
            volume,
            tick,
        }
    }

    #[test]
    fn buffer_push_and_iterate_oldest_first() {
        let mut buf = EventBuffer::new(8);
        buf.push(dispensed(5, 1));
        buf.push(dispensed(3, 2));
        assert_eq!(buf.len(), 2);
        let ticks: Vec<Ticks> = buf.iter().map(|e| e.tick()).collect();
        assert_eq!(ticks, vec![1, 2]);
    }

    #[test]
    fn buffer_wraps_and_drops_oldest() {
        let mut buf = EventBuffer::new(3);
        for i in 0..5 {
            buf.push(dispensed(i as u32, i));
        }
        assert_eq!(buf.len(), 3);
        assert_eq!(buf.total_written(), 5);
        assert_eq!(buf.dropped_count(), 2);
        let ticks: Vec<Ticks> = buf.iter().map(|e| e.tick()).collect();
        assert_eq!(ticks, vec![2, 3, 4]);
    }

    #[test]
    fn buffer_clear_keeps_lifetime_counter() {
        let mut buf = EventBuffer::new(4);
        buf.push(dispensed(1, 0));
        buf.clear();
        assert!(buf.is_empty());
        assert_eq!(buf.total_written(), 1);
    }

    #[test]
    fn zero_capacity_clamps_to_one() {
        let buf = EventBuffer::new(0);
        assert_eq!(buf.capacity(), 1);
    }

    #[test]
    fn emit_and_count() {
        let mut bus = EventBus::new(16);
        bus.emit(dispensed(5, 0));
        bus.emit(dispensed(3, 1));
        assert_eq!(bus.buffered_count(EventKind::ChemicalDispensed), 2);
        assert_eq!(bus.buffered_count(EventKind::StepAdvanced), 0);
    }

    #[test]
    fn suppressed_events_are_never_buffered() {
        let mut bus = EventBus::new(16);
        bus.suppress(EventKind::ChemicalDispensed);
        assert!(bus.is_suppressed(EventKind::ChemicalDispensed));
        bus.emit(dispensed(5, 0));
        assert_eq!(bus.buffered_count(EventKind::ChemicalDispensed), 0);
        assert_eq!(bus.total_emitted(EventKind::ChemicalDispensed), 0);
    }

    #[test]
    fn passive_listener_sees_delivered_events() {
        let mut bus = EventBus::new(16);
        let seen = Rc::new(RefCell::new(Vec::new()));
        let seen_clone = Rc::clone(&seen);
        bus.on_passive(
            EventKind::ChemicalDispensed,
            Box::new(move |event| {
                seen_clone.borrow_mut().push(event.tick());
            }),
        );
        bus.emit(dispensed(5, 1));
        bus.emit(dispensed(3, 2));
        bus.deliver();
        assert_eq!(*seen.borrow(), vec![1, 2]);
        // Buffer is cleared after delivery.
        assert_eq!(bus.buffered_count(EventKind::ChemicalDispensed), 0);
    }

    #[test]
    fn reactive_handler_mutations_accumulate() {
        let mut bus = EventBus::new(16);
        let equipment = make_equipment_id();
        bus.on_reactive(
            EventKind::PhaseCompleted,
            Box::new(move |_| vec![LabMutation::RemoveEquipment { equipment }]),
        );
        bus.emit(LabEvent::PhaseCompleted {
            container: make_equipment_id(),
            mode: ThermalMode::Heating,
            tick: 0,
        });
        bus.deliver();
        assert_eq!(bus.pending_mutation_count(), 1);
        let mutations = bus.drain_mutations();
        assert_eq!(mutations, vec![LabMutation::RemoveEquipment { equipment }]);
        assert_eq!(bus.pending_mutation_count(), 0);
    }

    #[test]
    fn priorities_order_delivery() {
        let mut bus = EventBus::new(16);
        let order = Rc::new(RefCell::new(Vec::new()));

        let o = Rc::clone(&order);
        bus.on_passive_filtered(
            EventKind::StepAdvanced,
            SubscriberPriority::Post,
            None,
            Box::new(move |_| o.borrow_mut().push("post")),
        );
        let o = Rc::clone(&order);
        bus.on_passive_filtered(
            EventKind::StepAdvanced,
            SubscriberPriority::Pre,
            None,
            Box::new(move |_| o.borrow_mut().push("pre")),
        );
        let o = Rc::clone(&order);
        bus.on_passive(
            EventKind::StepAdvanced,
            Box::new(move |_| o.borrow_mut().push("normal")),
        );

        bus.emit(LabEvent::StepAdvanced {
            step: StepId(0),
            tick: 0,
        });
        bus.deliver();
        assert_eq!(*order.borrow(), vec!["pre", "normal", "post"]);
    }

    #[test]
    fn filters_skip_non_matching_events() {
        let mut bus = EventBus::new(16);
        let seen = Rc::new(RefCell::new(Vec::new()));
        let s = Rc::clone(&seen);
        bus.on_passive_filtered(
            EventKind::ChemicalDispensed,
            SubscriberPriority::Normal,
            Some(Box::new(|event| {
                matches!(event, LabEvent::ChemicalDispensed { volume, .. } if *volume >= 50)
            })),
            Box::new(move |event| s.borrow_mut().push(event.tick())),
        );
        bus.emit(dispensed(10, 1));
        bus.emit(dispensed(80, 2));
        bus.deliver();
        assert_eq!(*seen.borrow(), vec![2]);
    }

    #[test]
    fn clear_all_keeps_subscribers() {
        let mut bus = EventBus::new(16);
        let count = Rc::new(RefCell::new(0));
        let c = Rc::clone(&count);
        bus.on_passive(
            EventKind::ChemicalDispensed,
            Box::new(move |_| *c.borrow_mut() += 1),
        );
        bus.emit(dispensed(5, 0));
        bus.clear_all();
        bus.deliver();
        assert_eq!(*count.borrow(), 0);
        // The subscriber still fires for later events.
        bus.emit(dispensed(5, 1));
        bus.deliver();
        assert_eq!(*count.borrow(), 1);
    }
}
