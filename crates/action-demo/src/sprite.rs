//! Minimal target type for the demo.

use std::cell::Cell;

/// A named point that actions move around and toggle.
#[derive(Debug)]
pub struct Sprite {
    pub name: String,
    position: Cell<(f32, f32)>,
    visible: Cell<bool>,
}

impl Sprite {
    pub fn new(name: impl Into<String>, position: (f32, f32)) -> Self {
        Self {
            name: name.into(),
            position: Cell::new(position),
            visible: Cell::new(true),
        }
    }

    pub fn position(&self) -> (f32, f32) {
        self.position.get()
    }

    pub fn set_position(&self, position: (f32, f32)) {
        self.position.set(position);
    }

    pub fn is_visible(&self) -> bool {
        self.visible.get()
    }

    pub fn set_visible(&self, visible: bool) {
        self.visible.set(visible);
    }
}
