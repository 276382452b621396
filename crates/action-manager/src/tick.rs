//! The per-tick update loop.
//!
//! # Walk
//!
//! Records are visited in creation order. The walk position is advanced
//! before any action on the current record runs, and a deleted record only
//! vacates its slot until the tick ends, so records may be created or deleted
//! from inside a `step` without the walk skipping or revisiting anything. A record created
//! mid-tick is visited in the same tick; an action appended to a record the
//! walk already left waits for the next tick.
//!
//! Inside a record the queue is walked by index, re-reading its live length
//! each iteration. An action removed while its own `step` runs is kept alive
//! by the record's salvage hold until that `step` returns, and a record
//! emptied while it is being walked is only deleted once the walk leaves it.

use std::cell::RefCell;
use std::rc::Rc;

use tracing::trace;

use crate::action::{ActionHandle, StepContext};
use crate::error::{Result, SchedulerError};
use crate::manager::{ActionManager, Registry};
use crate::record::Released;
use crate::target::TargetId;

/// Something the host frame loop advances once per frame.
pub trait Updatable {
    fn update(&self, dt: f32);
}

impl<T: ?Sized> Updatable for ActionManager<T> {
    fn update(&self, dt: f32) {
        ActionManager::update(self, dt);
    }
}

impl<T: ?Sized> Registry<T> {
    /// Moves the walk onto the next record. Returns its id and pause state.
    fn enter_next_record(&mut self) -> Option<(TargetId, bool)> {
        let id = loop {
            let slot = *self.order.get(self.walk_next)?;
            self.walk_next += 1;
            if let Some(id) = slot {
                break id;
            }
        };
        self.current = Some(id);
        self.current_salvaged = false;

        let record = self.records.get_mut(&id)?;
        record.next_index = 0;
        Some((id, record.paused))
    }

    /// Deletes the record the walk is leaving if it emptied during the walk
    /// and nothing was scheduled on it afterwards.
    fn leave_record(&mut self, id: TargetId) -> Released<T> {
        let mut released = Released::default();
        let emptied = self
            .records
            .get(&id)
            .is_some_and(|record| record.actions.is_empty());

        if self.current_salvaged
            && emptied
            && let Some(record) = self.delete_record(id)
        {
            released.records.push(record);
        }
        self.current = None;
        self.current_salvaged = false;
        released
    }

    /// Reads the next queued action into `current_action`.
    fn begin_step(&mut self, id: TargetId) -> Option<(ActionHandle<T>, Rc<T>)> {
        let record = self.records.get_mut(&id)?;
        let action = record.actions.get(record.next_index)?.clone();
        record.next_index += 1;
        record.current_action = Some(action.clone());
        record.salvaged = None;
        Some((action, Rc::clone(&record.target)))
    }

    fn take_salvaged(&mut self, id: TargetId) -> Option<ActionHandle<T>> {
        self.records.get_mut(&id)?.salvaged.take()
    }

    fn clear_current_action(&mut self, id: TargetId) -> Released<T> {
        let mut released = Released::default();
        if let Some(record) = self.records.get_mut(&id) {
            released.actions.extend(record.current_action.take());
            released.actions.extend(record.salvaged.take());
        }
        released
    }
}

/// Marks a tick as running; clears the walk state when the tick ends, also
/// when a `step` panics. A record whose deletion was deferred by the walk is
/// deleted here if the tick unwound before leaving it.
struct TickGuard<'a, T: ?Sized> {
    registry: &'a RefCell<Registry<T>>,
}

impl<'a, T: ?Sized> TickGuard<'a, T> {
    fn begin(registry: &'a RefCell<Registry<T>>) -> Result<Self> {
        let mut state = registry.borrow_mut();
        if state.ticking {
            return Err(SchedulerError::ReentrantUpdate);
        }
        state.ticking = true;
        state.walk_next = 0;
        state.current = None;
        state.current_salvaged = false;
        drop(state);

        Ok(Self { registry })
    }
}

impl<T: ?Sized> Drop for TickGuard<'_, T> {
    fn drop(&mut self) {
        let mut released = Released::default();
        if let Ok(mut state) = self.registry.try_borrow_mut() {
            if let Some(id) = state.current.take() {
                released = state.clear_current_action(id);
                let emptied = state
                    .records
                    .get(&id)
                    .is_some_and(|record| record.actions.is_empty());
                if state.current_salvaged
                    && emptied
                    && let Some(record) = state.delete_record(id)
                {
                    released.records.push(record);
                }
            }
            state.ticking = false;
            state.current_salvaged = false;
            state.walk_next = 0;
            state.compact();
        }
        drop(released);
    }
}

impl<T: ?Sized> ActionManager<T> {
    /// Steps every action of every unpaused target once.
    ///
    /// # Panics
    ///
    /// Panics if called from inside an action's `step`.
    pub fn update(&self, dt: f32) {
        if let Err(err) = self.try_update(dt) {
            panic!("update: {err}");
        }
    }

    /// Fallible form of [`update`](Self::update).
    pub fn try_update(&self, dt: f32) -> Result<()> {
        debug_assert!(dt >= 0.0, "update: negative delta {dt}");
        let _tick = TickGuard::begin(&self.inner)?;

        let mut visited = 0_usize;
        let mut stepped = 0_usize;
        loop {
            let next = self.inner.borrow_mut().enter_next_record();
            let Some((id, paused)) = next else { break };
            visited += 1;

            if !paused {
                stepped += self.walk_record(id, dt);
            }

            let released = self.inner.borrow_mut().leave_record(id);
            drop(released);
        }

        trace!(
            target: "action_manager",
            dt,
            targets = visited,
            steps = stepped,
            "tick complete"
        );
        Ok(())
    }

    /// Steps the queue of one record. Returns the number of `step` calls.
    fn walk_record(&self, id: TargetId, dt: f32) -> usize {
        let mut steps = 0;
        loop {
            let next = self.inner.borrow_mut().begin_step(id);
            let Some((action, target)) = next else { break };

            action.step(dt, &StepContext::new(self, &action, &target));
            steps += 1;

            let salvaged = self.inner.borrow_mut().take_salvaged(id);
            if salvaged.is_some() {
                // Removed during its own step; the hold ends here.
                drop(salvaged);
            } else if action.is_done() {
                action.stop();
                // Cleared first so the removal below does not salvage it.
                let current = self.inner.borrow_mut().clear_current_action(id);
                drop(current);
                self.remove_action(&action);
            }

            let current = self.inner.borrow_mut().clear_current_action(id);
            drop(current);
        }
        steps
    }
}
