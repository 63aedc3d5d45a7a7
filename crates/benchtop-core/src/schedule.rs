//! Deadline scheduling with explicit cancellation tokens.
//!
//! Every timed side effect in the engine goes through the scheduler: a phase
//! that needs a completion deadline schedules a task and keeps the returned
//! [`TaskId`] token. Whoever owns the token is responsible for cancelling it
//! when the phase exits early; a full reset cancels everything at once.
//! A fired task is removed before its action runs, so a stale token can
//! never fire twice.

use crate::id::{EquipmentId, TaskId};
use crate::units::Ticks;
use slotmap::SlotMap;

/// What to do when a scheduled deadline is reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduledAction {
    /// A thermal phase ran for its full configured duration.
    CompleteThermalPhase { container: EquipmentId },
}

#[derive(Debug, Clone, Copy)]
struct Task {
    due: Ticks,
    action: ScheduledAction,
}

/// Pending deadlines, keyed by cancellation token.
#[derive(Debug, Default)]
pub struct TickScheduler {
    tasks: SlotMap<TaskId, Task>,
}

impl TickScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule an action to fire once the tick counter reaches `due`.
    /// Returns the cancellation token.
    pub fn schedule_at(&mut self, due: Ticks, action: ScheduledAction) -> TaskId {
        self.tasks.insert(Task { due, action })
    }

    /// Schedule an action `delay` ticks from `now`.
    pub fn schedule_in(&mut self, now: Ticks, delay: Ticks, action: ScheduledAction) -> TaskId {
        self.schedule_at(now.saturating_add(delay), action)
    }

    /// Cancel a pending task. Returns `false` if the token was already fired
    /// or cancelled.
    pub fn cancel(&mut self, token: TaskId) -> bool {
        self.tasks.remove(token).is_some()
    }

    pub fn is_pending(&self, token: TaskId) -> bool {
        self.tasks.contains_key(token)
    }

    pub fn pending_count(&self) -> usize {
        self.tasks.len()
    }

    /// Remove and return every task due at or before `now`, ordered by due
    /// tick (ties broken by token for a stable order).
    pub fn fire_due(&mut self, now: Ticks) -> Vec<(TaskId, ScheduledAction)> {
        let mut due: Vec<(TaskId, Task)> = self
            .tasks
            .iter()
            .filter(|(_, task)| task.due <= now)
            .map(|(token, task)| (token, *task))
            .collect();
        due.sort_by_key(|&(token, task)| (task.due, token));
        let mut fired = Vec::with_capacity(due.len());
        for (token, task) in due {
            self.tasks.remove(token);
            fired.push((token, task.action));
        }
        fired
    }

    /// Cancel every pending task. Used by reset and teardown.
    pub fn clear(&mut self) {
        self.tasks.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotmap::SlotMap;

    fn make_container() -> EquipmentId {
        let mut sm = SlotMap::<EquipmentId, ()>::with_key();
        sm.insert(())
    }

    fn complete(container: EquipmentId) -> ScheduledAction {
        ScheduledAction::CompleteThermalPhase { container }
    }

    #[test]
    fn fires_at_due_tick_not_before() {
        let mut sched = TickScheduler::new();
        let c = make_container();
        sched.schedule_at(10, complete(c));
        assert!(sched.fire_due(9).is_empty());
        let fired = sched.fire_due(10);
        assert_eq!(fired.len(), 1);
        assert_eq!(fired[0].1, complete(c));
    }

    #[test]
    fn fired_task_is_gone() {
        let mut sched = TickScheduler::new();
        let c = make_container();
        let token = sched.schedule_at(5, complete(c));
        assert_eq!(sched.fire_due(5).len(), 1);
        assert!(!sched.is_pending(token));
        assert!(sched.fire_due(100).is_empty());
    }

    #[test]
    fn cancelled_task_never_fires() {
        let mut sched = TickScheduler::new();
        let c = make_container();
        let token = sched.schedule_at(5, complete(c));
        assert!(sched.cancel(token));
        assert!(sched.fire_due(100).is_empty());
        // Double cancel reports false.
        assert!(!sched.cancel(token));
    }

    #[test]
    fn schedule_in_offsets_from_now() {
        let mut sched = TickScheduler::new();
        let c = make_container();
        sched.schedule_in(100, 900, complete(c));
        assert!(sched.fire_due(999).is_empty());
        assert_eq!(sched.fire_due(1000).len(), 1);
    }

    #[test]
    fn fire_due_orders_by_due_tick() {
        let mut sched = TickScheduler::new();
        let a = make_container();
        let b = make_container();
        sched.schedule_at(20, complete(a));
        sched.schedule_at(10, complete(b));
        let fired = sched.fire_due(50);
        assert_eq!(fired[0].1, complete(b));
        assert_eq!(fired[1].1, complete(a));
    }

    #[test]
    fn clear_cancels_everything() {
        let mut sched = TickScheduler::new();
        let c = make_container();
        sched.schedule_at(5, complete(c));
        sched.schedule_at(7, complete(c));
        assert_eq!(sched.pending_count(), 2);
        sched.clear();
        assert_eq!(sched.pending_count(), 0);
        assert!(sched.fire_due(100).is_empty());
    }
}
