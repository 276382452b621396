//! Host-side per-frame dispatcher.
//!
//! Stands in for the engine's top-level scheduler: listeners register with a
//! priority (lower runs first) and are advanced once per frame.

use std::rc::Rc;

use action_manager::Updatable;
use tracing::{debug, trace};

/// Identifies a registration so it can be removed again.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ListenerId(u64);

struct Listener {
    id: ListenerId,
    priority: i32,
    updatable: Rc<dyn Updatable>,
}

#[derive(Default)]
pub struct FrameLoop {
    listeners: Vec<Listener>,
    next_id: u64,
    frame: u64,
    elapsed: f32,
}

impl FrameLoop {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `updatable` to run every frame.
    pub fn register(&mut self, updatable: Rc<dyn Updatable>, priority: i32) -> ListenerId {
        let id = ListenerId(self.next_id);
        self.next_id += 1;

        let slot = self
            .listeners
            .partition_point(|listener| listener.priority <= priority);
        self.listeners.insert(
            slot,
            Listener {
                id,
                priority,
                updatable,
            },
        );
        debug!(?id, priority, "listener registered");
        id
    }

    /// Returns `false` if the listener was not registered.
    pub fn unregister(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|listener| listener.id != id);
        let removed = self.listeners.len() != before;
        if removed {
            debug!(?id, "listener unregistered");
        }
        removed
    }

    /// Advances every listener by `dt` seconds.
    pub fn advance(&mut self, dt: f32) {
        self.frame += 1;
        self.elapsed += dt;
        trace!(frame = self.frame, elapsed = self.elapsed, "frame");

        for listener in &self.listeners {
            listener.updatable.update(dt);
        }
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }

    pub fn elapsed(&self) -> f32 {
        self.elapsed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    struct Recorder {
        name: &'static str,
        calls: Rc<RefCell<Vec<&'static str>>>,
    }

    impl Updatable for Recorder {
        fn update(&self, _dt: f32) {
            self.calls.borrow_mut().push(self.name);
        }
    }

    #[test]
    fn listeners_run_in_priority_order() {
        let calls = Rc::new(RefCell::new(Vec::new()));
        let mut frames = FrameLoop::new();
        for (name, priority) in [("late", 10), ("early", -5), ("default", 0)] {
            let recorder = Recorder {
                name,
                calls: Rc::clone(&calls),
            };
            frames.register(Rc::new(recorder), priority);
        }

        frames.advance(0.016);
        assert_eq!(*calls.borrow(), ["early", "default", "late"]);
        assert_eq!(frames.frame(), 1);
    }

    #[test]
    fn unregistered_listener_stops_running() {
        let calls = Rc::new(RefCell::new(Vec::new()));
        let mut frames = FrameLoop::new();
        let id = frames.register(
            Rc::new(Recorder {
                name: "a",
                calls: Rc::clone(&calls),
            }),
            0,
        );

        assert!(frames.unregister(id));
        assert!(!frames.unregister(id));
        frames.advance(0.016);
        assert!(calls.borrow().is_empty());
    }
}
