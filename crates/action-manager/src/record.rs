//! Per-target bookkeeping.
//!
//! A [`TargetRecord`] owns one strong reference to its target and the ordered
//! queue of actions scheduled on it. The cursor and salvage fields are only
//! meaningful while the update loop is walking this record.

use std::rc::Rc;

use crate::action::ActionHandle;
use crate::error::{Result, SchedulerError};
use crate::target::TargetId;

pub(crate) struct TargetRecord<T: ?Sized> {
    pub(crate) target: Rc<T>,
    /// Position of this record in the registry's walk order.
    pub(crate) slot: usize,
    /// Insertion order is execution order.
    pub(crate) actions: Vec<ActionHandle<T>>,
    pub(crate) paused: bool,
    /// Index of the next action the walk will visit. Removing an action below
    /// it shifts it down so nothing is skipped or visited twice.
    pub(crate) next_index: usize,
    /// Action whose `step` is on the stack, if any.
    pub(crate) current_action: Option<ActionHandle<T>>,
    /// Hold taken on `current_action` when it is removed mid-step; dropped
    /// once that step returns.
    pub(crate) salvaged: Option<ActionHandle<T>>,
}

impl<T: ?Sized> TargetRecord<T> {
    pub(crate) fn new(target: Rc<T>, slot: usize, paused: bool, capacity: usize) -> Self {
        Self {
            target,
            slot,
            actions: Vec::with_capacity(capacity),
            paused,
            next_index: 0,
            current_action: None,
            salvaged: None,
        }
    }

    #[inline]
    pub(crate) fn target_id(&self) -> TargetId {
        TargetId::of(&self.target)
    }

    #[inline]
    pub(crate) fn contains(&self, action: &ActionHandle<T>) -> bool {
        self.position(action).is_some()
    }

    pub(crate) fn position(&self, action: &ActionHandle<T>) -> Option<usize> {
        self.actions.iter().position(|queued| queued.ptr_eq(action))
    }

    /// First action carrying `tag` that was started on `origin`.
    pub(crate) fn position_by_tag(&self, tag: i32, origin: TargetId) -> Option<usize> {
        self.actions
            .iter()
            .position(|queued| queued.tag() == tag && queued.original_target() == Some(origin))
    }

    pub(crate) fn find_by_tag(&self, tag: i32) -> Option<&ActionHandle<T>> {
        self.actions.iter().find(|queued| queued.tag() == tag)
    }

    /// Appends an action, doubling the queue when it is full.
    pub(crate) fn push(&mut self, action: ActionHandle<T>) -> Result<()> {
        if self.contains(&action) {
            return Err(SchedulerError::DuplicateAction { tag: action.tag() });
        }

        if self.actions.len() == self.actions.capacity() {
            let grow_by = self.actions.capacity().max(1);
            self.actions.reserve_exact(grow_by);
        }
        self.actions.push(action);
        Ok(())
    }

    /// Takes a hold on the stepping action before it leaves the queue.
    fn salvage_if_current(&mut self, action: &ActionHandle<T>) {
        if self.salvaged.is_none()
            && self
                .current_action
                .as_ref()
                .is_some_and(|current| current.ptr_eq(action))
        {
            self.salvaged = Some(action.clone());
        }
    }

    /// Structurally removes the action at `index`, returning it.
    pub(crate) fn remove_at(&mut self, index: usize) -> ActionHandle<T> {
        let action = self.actions[index].clone();
        self.salvage_if_current(&action);
        self.actions.remove(index);

        if index < self.next_index {
            self.next_index -= 1;
        }
        action
    }

    /// Empties the queue at once, returning the removed actions.
    ///
    /// The cursor is parked past any reachable index, so actions scheduled
    /// on this target later in the same walk wait for the next tick, even
    /// ones that already ran before the wipe.
    pub(crate) fn clear(&mut self) -> Vec<ActionHandle<T>> {
        if let Some(current) = self.current_action.clone()
            && self.contains(&current)
        {
            self.salvage_if_current(&current);
        }
        self.next_index = usize::MAX;
        std::mem::take(&mut self.actions)
    }
}

/// Handles and records detached while the registry was borrowed.
///
/// Dropping an action or target may run arbitrary user code, which may call
/// back into the scheduler, so they are released only after the borrow ends.
pub(crate) struct Released<T: ?Sized> {
    pub(crate) actions: Vec<ActionHandle<T>>,
    pub(crate) records: Vec<TargetRecord<T>>,
}

impl<T: ?Sized> Default for Released<T> {
    fn default() -> Self {
        Self {
            actions: Vec::new(),
            records: Vec::new(),
        }
    }
}
