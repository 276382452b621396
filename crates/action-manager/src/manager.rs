//! Target registry and the mutation operations.
//!
//! [`ActionManager`] is a cheap, cloneable handle over the registry. Every
//! operation borrows the registry only for its own bookkeeping and never
//! across a call into action code (`start`, `step`, `stop`) or across the
//! drop of a detached action or target, so actions may call back into the
//! manager from inside their own `step`.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use tracing::debug;

use crate::action::{ActionHandle, INVALID_TAG};
use crate::config::ActionManagerConfig;
use crate::error::{Result, SchedulerError};
use crate::record::{Released, TargetRecord};
use crate::target::TargetId;

pub(crate) struct Registry<T: ?Sized> {
    pub(crate) config: ActionManagerConfig,
    pub(crate) records: HashMap<TargetId, TargetRecord<T>>,
    /// Record creation order; the update loop walks it front to back.
    /// Deleted records leave a `None` behind until the next compaction.
    pub(crate) order: Vec<Option<TargetId>>,
    /// Number of `None` entries in `order`.
    pub(crate) vacant: usize,
    /// Position in `order` of the next record the walk will visit.
    pub(crate) walk_next: usize,
    /// Record being walked by an in-progress tick.
    pub(crate) current: Option<TargetId>,
    /// The current record emptied mid-walk; delete it once the walk leaves it.
    pub(crate) current_salvaged: bool,
    pub(crate) ticking: bool,
}

impl<T: ?Sized> Registry<T> {
    fn new(config: ActionManagerConfig) -> Self {
        Self {
            config,
            records: HashMap::new(),
            order: Vec::new(),
            vacant: 0,
            walk_next: 0,
            current: None,
            current_salvaged: false,
            ticking: false,
        }
    }

    /// Ids of the live records in walk order.
    pub(crate) fn live_targets(&self) -> Vec<TargetId> {
        self.order.iter().flatten().copied().collect()
    }

    fn insert_record(&mut self, target: &Rc<T>, paused: bool) {
        let id = TargetId::of(target);
        let slot = self.order.len();
        let capacity = self.config.initial_capacity;
        self.records.insert(
            id,
            TargetRecord::new(Rc::clone(target), slot, paused, capacity),
        );
        self.order.push(Some(id));
        debug!(
            target: "action_manager",
            target_id = %id,
            paused,
            "target record created"
        );
    }

    /// Drops the record from the registry and hands it back for release.
    ///
    /// The record's slot in `order` is vacated rather than removed, so walk
    /// positions stay valid while a tick is running.
    pub(crate) fn delete_record(&mut self, id: TargetId) -> Option<TargetRecord<T>> {
        let record = self.records.remove(&id)?;
        if let Some(entry) = self.order.get_mut(record.slot) {
            *entry = None;
            self.vacant += 1;
        }
        if !self.ticking {
            self.compact();
        }

        debug!(
            target: "action_manager",
            target_id = %record.target_id(),
            "target record deleted"
        );
        Some(record)
    }

    /// Squeezes vacated slots out of `order` once they make up half of it.
    pub(crate) fn compact(&mut self) {
        if self.vacant == 0 || self.vacant * 2 < self.order.len() {
            return;
        }

        self.order.retain(Option::is_some);
        self.vacant = 0;
        for (slot, id) in self.order.iter().flatten().enumerate() {
            if let Some(record) = self.records.get_mut(id) {
                record.slot = slot;
            }
        }
    }

    /// Deletes an emptied record, or defers it if the walk is inside it.
    fn emptied(&mut self, id: TargetId, released: &mut Released<T>) {
        if self.current == Some(id) {
            self.current_salvaged = true;
            debug!(
                target: "action_manager",
                target_id = %id,
                "target record emptied mid-walk, deletion deferred"
            );
        } else if let Some(record) = self.delete_record(id) {
            released.records.push(record);
        }
    }

    fn remove_at(&mut self, id: TargetId, index: usize, released: &mut Released<T>) {
        let emptied = match self.records.get_mut(&id) {
            Some(record) => {
                released.actions.push(record.remove_at(index));
                record.actions.is_empty()
            }
            None => return,
        };
        if emptied {
            self.emptied(id, released);
        }
    }

    fn remove_all_from(&mut self, id: TargetId) -> Released<T> {
        let mut released = Released::default();
        match self.records.get_mut(&id) {
            Some(record) => released.actions = record.clear(),
            None => {
                debug!(
                    target: "action_manager",
                    target_id = %id,
                    "remove_all_actions_from_target: target not found"
                );
                return released;
            }
        }
        self.emptied(id, &mut released);
        released
    }
}

/// Schedules actions on targets and steps them once per tick.
///
/// Clones share the same registry. Hand a clone to whatever needs to schedule
/// actions; the host frame loop owns one and calls [`update`](Self::update).
pub struct ActionManager<T: ?Sized> {
    pub(crate) inner: Rc<RefCell<Registry<T>>>,
}

impl<T: ?Sized> Clone for ActionManager<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: ?Sized> Default for ActionManager<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ?Sized> ActionManager<T> {
    pub fn new() -> Self {
        Self::with_config(ActionManagerConfig::default())
    }

    pub fn with_config(config: ActionManagerConfig) -> Self {
        Self {
            inner: Rc::new(RefCell::new(Registry::new(config))),
        }
    }

    /// Settings this manager was built with.
    pub fn config(&self) -> ActionManagerConfig {
        self.inner.borrow().config.clone()
    }

    /// Schedules `action` on `target` and starts it.
    ///
    /// A record created by this call starts paused when `paused` is set; an
    /// existing record keeps its pause state.
    ///
    /// # Panics
    ///
    /// Panics if the action is already scheduled, or if it is scheduled from
    /// inside one of its own hooks.
    pub fn add_action(&self, action: &ActionHandle<T>, target: &Rc<T>, paused: bool) {
        if let Err(err) = self.try_add_action(action, target, paused) {
            panic!("add_action: {err}");
        }
    }

    /// Fallible form of [`add_action`](Self::add_action).
    pub fn try_add_action(
        &self,
        action: &ActionHandle<T>,
        target: &Rc<T>,
        paused: bool,
    ) -> Result<()> {
        // Its own `step` is on the stack, so `start` could not run.
        if action.is_running() {
            return Err(SchedulerError::ActionBusy { tag: action.tag() });
        }

        let id = TargetId::of(target);
        {
            let mut registry = self.inner.borrow_mut();

            // A queued action always sits in its original target's record.
            if let Some(origin) = action.original_target()
                && registry
                    .records
                    .get(&origin)
                    .is_some_and(|record| record.contains(action))
            {
                return Err(SchedulerError::DuplicateAction { tag: action.tag() });
            }

            if !registry.records.contains_key(&id) {
                registry.insert_record(target, paused);
            }

            if let Some(record) = registry.records.get_mut(&id) {
                record.push(action.clone())?;
            }
        }

        action.start(target);
        Ok(())
    }

    /// Removes the action from the queue of the target it was started on.
    pub fn remove_action(&self, action: &ActionHandle<T>) {
        let released = self.detach(action);
        drop(released);
    }

    fn detach(&self, action: &ActionHandle<T>) -> Released<T> {
        let mut released = Released::default();
        let Some(origin) = action.original_target() else {
            debug!(
                target: "action_manager",
                tag = action.tag(),
                "remove_action: action was never started"
            );
            return released;
        };

        let mut registry = self.inner.borrow_mut();
        let index = match registry.records.get(&origin) {
            Some(record) => record.position(action),
            None => {
                debug!(
                    target: "action_manager",
                    target_id = %origin,
                    "remove_action: target not found"
                );
                return released;
            }
        };
        if let Some(index) = index {
            registry.remove_at(origin, index, &mut released);
        }
        released
    }

    /// Removes the first action on `target` carrying `tag`.
    ///
    /// # Panics
    ///
    /// Panics if `tag` is [`INVALID_TAG`].
    pub fn remove_action_by_tag(&self, tag: i32, target: &Rc<T>) {
        assert_valid_tag(tag);
        let id = TargetId::of(target);

        let mut released = Released::default();
        {
            let mut registry = self.inner.borrow_mut();
            let index = registry
                .records
                .get(&id)
                .and_then(|record| record.position_by_tag(tag, id));
            if let Some(index) = index {
                registry.remove_at(id, index, &mut released);
            }
        }
        drop(released);
    }

    /// Removes every action on `target` carrying `tag`.
    ///
    /// # Panics
    ///
    /// Panics if `tag` is [`INVALID_TAG`].
    pub fn remove_all_actions_by_tag(&self, tag: i32, target: &Rc<T>) {
        assert_valid_tag(tag);
        let id = TargetId::of(target);

        let mut released = Released::default();
        {
            let mut registry = self.inner.borrow_mut();
            loop {
                let index = registry
                    .records
                    .get(&id)
                    .and_then(|record| record.position_by_tag(tag, id));
                let Some(index) = index else { break };
                registry.remove_at(id, index, &mut released);
            }
        }
        drop(released);
    }

    /// Removes every action scheduled on `target`.
    pub fn remove_all_actions_from_target(&self, target: &Rc<T>) {
        self.remove_all_from(TargetId::of(target));
    }

    fn remove_all_from(&self, id: TargetId) {
        let released = self.inner.borrow_mut().remove_all_from(id);
        drop(released);
    }

    /// Removes every action from every target.
    pub fn remove_all_actions(&self) {
        let targets = self.inner.borrow().live_targets();
        for id in targets {
            self.remove_all_from(id);
        }
    }

    pub fn pause_target(&self, target: &Rc<T>) {
        self.set_paused(target, true);
    }

    pub fn resume_target(&self, target: &Rc<T>) {
        self.set_paused(target, false);
    }

    fn set_paused(&self, target: &Rc<T>, paused: bool) {
        if let Some(record) = self.inner.borrow_mut().records.get_mut(&TargetId::of(target)) {
            record.paused = paused;
        }
    }

    /// Returns `false` for targets without a record.
    pub fn is_target_paused(&self, target: &Rc<T>) -> bool {
        self.inner
            .borrow()
            .records
            .get(&TargetId::of(target))
            .is_some_and(|record| record.paused)
    }

    /// Pauses every running target and returns the ones it paused.
    pub fn pause_all_running_actions(&self) -> Vec<Rc<T>> {
        let mut registry = self.inner.borrow_mut();
        let Registry { records, order, .. } = &mut *registry;

        let mut paused = Vec::new();
        for id in order.iter().flatten() {
            if let Some(record) = records.get_mut(id)
                && !record.paused
            {
                record.paused = true;
                paused.push(Rc::clone(&record.target));
            }
        }
        paused
    }

    pub fn resume_targets(&self, targets: &[Rc<T>]) {
        for target in targets {
            self.resume_target(target);
        }
    }

    /// First action on `target` carrying `tag`.
    ///
    /// # Panics
    ///
    /// Panics if `tag` is [`INVALID_TAG`].
    pub fn get_action_by_tag(&self, tag: i32, target: &Rc<T>) -> Option<ActionHandle<T>> {
        assert_valid_tag(tag);
        let id = TargetId::of(target);

        let registry = self.inner.borrow();
        let Some(record) = registry.records.get(&id) else {
            debug!(
                target: "action_manager",
                target_id = %id,
                tag,
                "get_action_by_tag: target not found"
            );
            return None;
        };

        let found = record.find_by_tag(tag).cloned();
        if found.is_none() {
            debug!(
                target: "action_manager",
                target_id = %id,
                tag,
                "get_action_by_tag: action not found"
            );
        }
        found
    }

    /// Queue length for `target`, 0 when it has no record.
    pub fn number_of_running_actions_in_target(&self, target: &Rc<T>) -> usize {
        self.inner
            .borrow()
            .records
            .get(&TargetId::of(target))
            .map_or(0, |record| record.actions.len())
    }

    /// Number of live target records.
    pub fn target_count(&self) -> usize {
        self.inner.borrow().records.len()
    }

    /// Returns `true` while [`update`](Self::update) is running.
    pub fn is_updating(&self) -> bool {
        self.inner.borrow().ticking
    }
}

fn assert_valid_tag(tag: i32) {
    if tag == INVALID_TAG {
        panic!("{}", SchedulerError::InvalidTag);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::{Action, StepContext};
    use std::cell::Cell;

    #[derive(Default)]
    struct Starts(Rc<Cell<u32>>);
    impl Action<String> for Starts {
        fn start(&mut self, _target: &Rc<String>) {
            self.0.set(self.0.get() + 1);
        }
        fn step(&mut self, _dt: f32, _ctx: &StepContext<'_, String>) {}
        fn is_done(&self) -> bool {
            false
        }
    }

    fn target(name: &str) -> Rc<String> {
        Rc::new(name.to_owned())
    }

    #[test]
    fn add_action_creates_record_and_starts() {
        let manager = ActionManager::new();
        let hero = target("hero");
        let starts = Rc::new(Cell::new(0));
        let action = ActionHandle::new(Starts(Rc::clone(&starts)));

        manager.add_action(&action, &hero, false);

        assert_eq!(starts.get(), 1);
        assert_eq!(manager.target_count(), 1);
        assert_eq!(manager.number_of_running_actions_in_target(&hero), 1);
        assert_eq!(action.original_target(), Some(TargetId::of(&hero)));
    }

    #[test]
    fn record_holds_one_reference_to_target() {
        let manager = ActionManager::new();
        let hero = target("hero");

        manager.add_action(&ActionHandle::new(Starts::default()), &hero, false);
        manager.add_action(&ActionHandle::new(Starts::default()), &hero, false);
        assert_eq!(Rc::strong_count(&hero), 2);

        manager.remove_all_actions_from_target(&hero);
        assert_eq!(Rc::strong_count(&hero), 1);
        assert_eq!(manager.target_count(), 0);
    }

    #[test]
    fn duplicate_add_is_rejected() {
        let manager = ActionManager::new();
        let hero = target("hero");
        let action = ActionHandle::new(Starts::default()).with_tag(5);

        manager.add_action(&action, &hero, false);
        assert_eq!(
            manager.try_add_action(&action, &hero, false),
            Err(SchedulerError::DuplicateAction { tag: 5 })
        );
        assert_eq!(manager.number_of_running_actions_in_target(&hero), 1);
    }

    #[test]
    fn scheduling_on_second_target_is_rejected() {
        let manager = ActionManager::new();
        let hero = target("hero");
        let villain = target("villain");
        let action = ActionHandle::new(Starts::default());

        manager.add_action(&action, &hero, false);
        assert!(manager.try_add_action(&action, &villain, false).is_err());
        assert_eq!(manager.target_count(), 1);
    }

    #[test]
    #[should_panic(expected = "already scheduled")]
    fn add_action_panics_on_duplicate() {
        let manager = ActionManager::new();
        let hero = target("hero");
        let action = ActionHandle::new(Starts::default());

        manager.add_action(&action, &hero, false);
        manager.add_action(&action, &hero, false);
    }

    #[test]
    fn readding_after_removal_is_allowed() {
        let manager = ActionManager::new();
        let hero = target("hero");
        let action = ActionHandle::new(Starts::default());

        manager.add_action(&action, &hero, false);
        manager.remove_action(&action);
        manager.add_action(&action, &hero, false);
        assert_eq!(manager.number_of_running_actions_in_target(&hero), 1);
    }

    #[test]
    fn remove_unknown_action_is_noop() {
        let manager = ActionManager::new();
        let hero = target("hero");
        manager.add_action(&ActionHandle::new(Starts::default()), &hero, false);

        manager.remove_action(&ActionHandle::new(Starts::default()));
        assert_eq!(manager.number_of_running_actions_in_target(&hero), 1);
    }

    #[test]
    fn remove_by_tag_removes_first_match_only() {
        let manager = ActionManager::new();
        let hero = target("hero");
        let first = ActionHandle::new(Starts::default()).with_tag(7);
        let second = ActionHandle::new(Starts::default()).with_tag(7);
        manager.add_action(&first, &hero, false);
        manager.add_action(&second, &hero, false);

        manager.remove_action_by_tag(7, &hero);

        assert_eq!(manager.number_of_running_actions_in_target(&hero), 1);
        assert_eq!(manager.get_action_by_tag(7, &hero), Some(second));
    }

    #[test]
    fn remove_all_by_tag_keeps_other_tags() {
        let manager = ActionManager::new();
        let hero = target("hero");
        for tag in [1, 2, 1, 1] {
            manager.add_action(&ActionHandle::new(Starts::default()).with_tag(tag), &hero, false);
        }

        manager.remove_all_actions_by_tag(1, &hero);

        assert_eq!(manager.number_of_running_actions_in_target(&hero), 1);
        assert!(manager.get_action_by_tag(2, &hero).is_some());
    }

    #[test]
    #[should_panic(expected = "invalid tag")]
    fn invalid_tag_lookup_panics() {
        let manager: ActionManager<String> = ActionManager::new();
        manager.get_action_by_tag(INVALID_TAG, &target("hero"));
    }

    #[test]
    fn lookups_on_unknown_target_are_empty() {
        let manager: ActionManager<String> = ActionManager::new();
        let ghost = target("ghost");

        assert_eq!(manager.get_action_by_tag(1, &ghost), None);
        assert_eq!(manager.number_of_running_actions_in_target(&ghost), 0);
        assert!(!manager.is_target_paused(&ghost));
        manager.pause_target(&ghost);
        manager.remove_all_actions_from_target(&ghost);
        assert_eq!(manager.target_count(), 0);
    }

    #[test]
    fn start_paused_applies_to_new_record_only() {
        let manager = ActionManager::new();
        let hero = target("hero");

        manager.add_action(&ActionHandle::new(Starts::default()), &hero, true);
        assert!(manager.is_target_paused(&hero));

        manager.resume_target(&hero);
        manager.add_action(&ActionHandle::new(Starts::default()), &hero, true);
        assert!(!manager.is_target_paused(&hero));
    }

    #[test]
    fn pause_all_returns_only_running_targets() {
        let manager = ActionManager::new();
        let running = target("running");
        let paused = target("paused");
        manager.add_action(&ActionHandle::new(Starts::default()), &running, false);
        manager.add_action(&ActionHandle::new(Starts::default()), &paused, true);

        let newly_paused = manager.pause_all_running_actions();
        assert_eq!(newly_paused.len(), 1);
        assert!(Rc::ptr_eq(&newly_paused[0], &running));

        manager.resume_targets(&newly_paused);
        assert!(!manager.is_target_paused(&running));
        assert!(manager.is_target_paused(&paused));
    }

    #[test]
    fn config_is_kept() {
        let config = ActionManagerConfig::new(16);
        let manager: ActionManager<String> = ActionManager::with_config(config.clone());
        assert_eq!(manager.config(), config);

        let hero = target("hero");
        manager.add_action(&ActionHandle::new(Starts::default()), &hero, false);
        let registry = manager.inner.borrow();
        let record = &registry.records[&TargetId::of(&hero)];
        assert!(record.actions.capacity() >= 16);
    }

    #[test]
    fn deleted_records_are_compacted_out_of_order() {
        let manager = ActionManager::new();
        let targets: Vec<_> = (0..4).map(|i| target(&format!("t{i}"))).collect();
        for t in &targets {
            manager.add_action(&ActionHandle::new(Starts::default()), t, false);
        }

        manager.remove_all_actions_from_target(&targets[0]);
        assert_eq!(manager.inner.borrow().order.len(), 4);
        assert_eq!(manager.inner.borrow().vacant, 1);

        manager.remove_all_actions_from_target(&targets[2]);
        {
            let registry = manager.inner.borrow();
            assert_eq!(registry.vacant, 0);
            assert_eq!(
                registry.order,
                vec![Some(TargetId::of(&targets[1])), Some(TargetId::of(&targets[3]))]
            );
            assert_eq!(registry.records[&TargetId::of(&targets[3])].slot, 1);
        }

        // Slots stay valid after compaction.
        manager.remove_all_actions_from_target(&targets[3]);
        assert_eq!(
            manager.inner.borrow().order,
            vec![Some(TargetId::of(&targets[1]))]
        );
        assert_eq!(manager.target_count(), 1);
    }

    #[test]
    fn remove_all_actions_clears_registry() {
        let manager = ActionManager::new();
        let targets: Vec<_> = (0..4).map(|i| target(&format!("t{i}"))).collect();
        for t in &targets {
            manager.add_action(&ActionHandle::new(Starts::default()), t, false);
        }

        manager.remove_all_actions();

        assert_eq!(manager.target_count(), 0);
        assert!(manager.inner.borrow().order.is_empty());
        assert!(targets.iter().all(|t| Rc::strong_count(t) == 1));
    }
}
