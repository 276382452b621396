//! Concrete actions scheduled by the demo.

use std::rc::Rc;

use action_manager::{Action, StepContext};
use tracing::info;

use crate::sprite::Sprite;

pub const TAG_MOVE: i32 = 1;
pub const TAG_BLINK: i32 = 2;
pub const TAG_DESPAWN: i32 = 3;

/// Linear move by a fixed offset over `duration` seconds.
pub struct MoveBy {
    delta: (f32, f32),
    duration: f32,
    elapsed: f32,
    origin: (f32, f32),
}

impl MoveBy {
    pub fn new(delta: (f32, f32), duration: f32) -> Self {
        Self {
            delta,
            duration: duration.max(f32::EPSILON),
            elapsed: 0.0,
            origin: (0.0, 0.0),
        }
    }
}

impl Action<Sprite> for MoveBy {
    fn start(&mut self, target: &Rc<Sprite>) {
        self.origin = target.position();
        self.elapsed = 0.0;
    }

    fn step(&mut self, dt: f32, ctx: &StepContext<'_, Sprite>) {
        self.elapsed += dt;
        let t = (self.elapsed / self.duration).min(1.0);
        ctx.target().set_position((
            self.origin.0 + self.delta.0 * t,
            self.origin.1 + self.delta.1 * t,
        ));
    }

    fn is_done(&self) -> bool {
        self.elapsed >= self.duration
    }
}

/// Toggles visibility every `interval` seconds, `times` times.
pub struct Blink {
    interval: f32,
    remaining: u32,
    since_toggle: f32,
    target: Option<Rc<Sprite>>,
}

impl Blink {
    pub fn new(interval: f32, times: u32) -> Self {
        Self {
            interval: interval.max(f32::EPSILON),
            remaining: times,
            since_toggle: 0.0,
            target: None,
        }
    }
}

impl Action<Sprite> for Blink {
    fn start(&mut self, target: &Rc<Sprite>) {
        self.target = Some(Rc::clone(target));
    }

    fn step(&mut self, dt: f32, ctx: &StepContext<'_, Sprite>) {
        self.since_toggle += dt;
        while self.since_toggle >= self.interval && self.remaining > 0 {
            self.since_toggle -= self.interval;
            self.remaining -= 1;
            let sprite = ctx.target();
            sprite.set_visible(!sprite.is_visible());
        }
    }

    fn is_done(&self) -> bool {
        self.remaining == 0
    }

    fn stop(&mut self) {
        if let Some(sprite) = self.target.take() {
            sprite.set_visible(true);
        }
    }
}

/// Clears every action on its own target once `delay` seconds have passed.
pub struct Despawn {
    delay: f32,
    elapsed: f32,
}

impl Despawn {
    pub fn after(delay: f32) -> Self {
        Self {
            delay,
            elapsed: 0.0,
        }
    }
}

impl Action<Sprite> for Despawn {
    fn start(&mut self, _target: &Rc<Sprite>) {
        self.elapsed = 0.0;
    }

    fn step(&mut self, dt: f32, ctx: &StepContext<'_, Sprite>) {
        self.elapsed += dt;
        if self.elapsed >= self.delay {
            info!(sprite = %ctx.target().name, "despawning");
            ctx.manager().remove_all_actions_from_target(ctx.target());
        }
    }

    fn is_done(&self) -> bool {
        self.elapsed >= self.delay
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use action_manager::{ActionHandle, ActionManager};

    const FRAME: f32 = 0.25;

    #[test]
    fn move_by_reaches_destination() {
        let manager = ActionManager::new();
        let sprite = Rc::new(Sprite::new("s", (1.0, 1.0)));
        manager.add_action(&ActionHandle::new(MoveBy::new((4.0, -2.0), 1.0)), &sprite, false);

        for _ in 0..4 {
            manager.update(FRAME);
        }

        assert_eq!(sprite.position(), (5.0, -1.0));
        assert_eq!(manager.number_of_running_actions_in_target(&sprite), 0);
    }

    #[test]
    fn blink_restores_visibility_on_stop() {
        let manager = ActionManager::new();
        let sprite = Rc::new(Sprite::new("s", (0.0, 0.0)));
        manager.add_action(&ActionHandle::new(Blink::new(FRAME, 3)), &sprite, false);

        manager.update(FRAME);
        assert!(!sprite.is_visible());

        manager.update(FRAME);
        manager.update(FRAME);
        assert!(sprite.is_visible());
        assert_eq!(manager.target_count(), 0);
        assert_eq!(Rc::strong_count(&sprite), 1);
    }

    #[test]
    fn despawn_clears_its_target() {
        let manager = ActionManager::new();
        let sprite = Rc::new(Sprite::new("s", (0.0, 0.0)));
        manager.add_action(&ActionHandle::new(MoveBy::new((10.0, 0.0), 10.0)), &sprite, false);
        manager.add_action(&ActionHandle::new(Despawn::after(0.5)), &sprite, false);

        manager.update(FRAME);
        assert_eq!(manager.number_of_running_actions_in_target(&sprite), 2);

        manager.update(FRAME);
        assert_eq!(manager.target_count(), 0);
        assert_eq!(Rc::strong_count(&sprite), 1);
    }
}
