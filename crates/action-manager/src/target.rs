//! Target identity.
//!
//! Targets are shared objects (`Rc<T>`) that actions mutate. The scheduler
//! keys its registry by the address of the `Rc` allocation, which is stable
//! for as long as any strong reference exists. A Target Record keeps one
//! strong reference alive, so a registered target's id can never be reused.

use std::fmt;
use std::rc::Rc;

/// Stable identity of a target, usable as a map key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TargetId(usize);

impl TargetId {
    /// Returns the identity of the given target.
    #[inline]
    pub fn of<T: ?Sized>(target: &Rc<T>) -> Self {
        Self(Rc::as_ptr(target).cast::<()>() as usize)
    }
}

impl fmt::Display for TargetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "target#{:x}", self.0)
    }
}
