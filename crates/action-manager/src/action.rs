//! Action trait and the handle the scheduler queues.
//!
//! This module defines the [`Action`] trait, the narrow capability set the
//! scheduler drives every tick, and [`ActionHandle`], the shared,
//! identity-compared wrapper that is stored in a target's queue.
//!
//! The handle keeps the tag and target ids outside the action's own
//! `RefCell`, so the scheduler can look an action up (for example when it
//! removes itself) while that action's `step` is still on the stack.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use crate::manager::ActionManager;
use crate::target::TargetId;

/// Reserved tag value. Every handle starts with it, and it is rejected as a
/// lookup key.
pub const INVALID_TAG: i32 = -1;

/// A steppable behavior bound to a target of type `T`.
pub trait Action<T: ?Sized> {
    /// Binds the action to its target before the first step.
    fn start(&mut self, target: &Rc<T>);

    /// Advances the action by `dt` seconds.
    ///
    /// The context exposes the scheduler, so the action may remove itself,
    /// remove siblings, wipe its own target, or schedule new actions.
    fn step(&mut self, dt: f32, ctx: &StepContext<'_, T>);

    /// Returns `true` once the action has finished.
    fn is_done(&self) -> bool;

    /// Teardown hook, called once when the scheduler discovers the action is
    /// done, before it is removed.
    fn stop(&mut self) {}
}

/// Everything a stepping action may reach.
pub struct StepContext<'a, T: ?Sized> {
    manager: &'a ActionManager<T>,
    action: &'a ActionHandle<T>,
    target: &'a Rc<T>,
}

impl<'a, T: ?Sized> StepContext<'a, T> {
    pub(crate) fn new(
        manager: &'a ActionManager<T>,
        action: &'a ActionHandle<T>,
        target: &'a Rc<T>,
    ) -> Self {
        Self {
            manager,
            action,
            target,
        }
    }

    /// The scheduler driving this step.
    #[inline]
    pub fn manager(&self) -> &'a ActionManager<T> {
        self.manager
    }

    /// Handle of the action being stepped.
    #[inline]
    pub fn action(&self) -> &'a ActionHandle<T> {
        self.action
    }

    /// Target whose queue is being walked.
    #[inline]
    pub fn target(&self) -> &'a Rc<T> {
        self.target
    }
}

struct ActionSlot<T: ?Sized> {
    tag: Cell<i32>,
    original_target: Cell<Option<TargetId>>,
    target: Cell<Option<TargetId>>,
    action: RefCell<Box<dyn Action<T>>>,
}

/// Shared handle to a scheduled action.
///
/// Clones refer to the same action; equality is identity.
pub struct ActionHandle<T: ?Sized> {
    inner: Rc<ActionSlot<T>>,
}

impl<T: ?Sized> ActionHandle<T> {
    /// Wraps an action with the invalid tag and no target.
    pub fn new(action: impl Action<T> + 'static) -> Self {
        Self {
            inner: Rc::new(ActionSlot {
                tag: Cell::new(INVALID_TAG),
                original_target: Cell::new(None),
                target: Cell::new(None),
                action: RefCell::new(Box::new(action)),
            }),
        }
    }

    /// Sets the tag (builder pattern).
    #[must_use]
    pub fn with_tag(self, tag: i32) -> Self {
        self.set_tag(tag);
        self
    }

    #[inline]
    pub fn tag(&self) -> i32 {
        self.inner.tag.get()
    }

    #[inline]
    pub fn set_tag(&self, tag: i32) {
        self.inner.tag.set(tag);
    }

    /// Target the action was started with. Removal looks the action up
    /// through this id even after [`set_target`](Self::set_target).
    #[inline]
    pub fn original_target(&self) -> Option<TargetId> {
        self.inner.original_target.get()
    }

    /// Target the action currently mutates; cleared by `stop`.
    #[inline]
    pub fn target(&self) -> Option<TargetId> {
        self.inner.target.get()
    }

    /// Reassigns the current target without touching the original one.
    pub fn set_target(&self, target: &Rc<T>) {
        self.inner.target.set(Some(TargetId::of(target)));
    }

    /// Returns `true` if the action reports completion.
    ///
    /// # Panics
    ///
    /// Panics if called from inside this action's own `step`.
    pub fn is_done(&self) -> bool {
        self.inner.action.borrow().is_done()
    }

    /// Returns `true` if both handles refer to the same action.
    #[inline]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Returns `true` while one of the action's own hooks is on the stack.
    pub(crate) fn is_running(&self) -> bool {
        self.inner.action.try_borrow_mut().is_err()
    }

    pub(crate) fn start(&self, target: &Rc<T>) {
        let id = TargetId::of(target);
        self.inner.original_target.set(Some(id));
        self.inner.target.set(Some(id));
        self.inner.action.borrow_mut().start(target);
    }

    pub(crate) fn step(&self, dt: f32, ctx: &StepContext<'_, T>) {
        self.inner.action.borrow_mut().step(dt, ctx);
    }

    pub(crate) fn stop(&self) {
        self.inner.action.borrow_mut().stop();
        self.inner.target.set(None);
    }
}

impl<T: ?Sized> Clone for ActionHandle<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: ?Sized> PartialEq for ActionHandle<T> {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl<T: ?Sized> Eq for ActionHandle<T> {}

impl<T: ?Sized> fmt::Debug for ActionHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionHandle")
            .field("tag", &self.tag())
            .field("original_target", &self.original_target())
            .field("target", &self.target())
            .finish()
    }
}
