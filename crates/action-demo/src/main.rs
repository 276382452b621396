//! Demo host for the action scheduler.
//!
//! Registers an [`ActionManager`] with a simulated frame loop, schedules a few
//! moves, blinks and despawns on sprites, and runs a fixed number of frames.

mod actions;
mod frame_loop;
mod sprite;

use std::rc::Rc;

use action_manager::{ActionHandle, ActionManager, ActionManagerConfig, Updatable};
use anyhow::{Result, ensure};
use clap::Parser;
use tracing::info;

use actions::{Blink, Despawn, MoveBy, TAG_BLINK, TAG_DESPAWN, TAG_MOVE};
use frame_loop::FrameLoop;
use sprite::Sprite;

/// Drive the action scheduler with a simulated frame loop
#[derive(Parser)]
#[command(name = "action-demo")]
#[command(about = "Runs scheduled actions on a handful of sprites", long_about = None)]
#[command(version)]
struct Cli {
    /// Number of frames to simulate
    #[arg(long, default_value_t = 120)]
    ticks: u32,

    /// Simulated frames per second
    #[arg(long, default_value_t = 60)]
    fps: u32,

    /// Number of sprites to animate
    #[arg(long, default_value_t = 3)]
    sprites: usize,
}

fn main() -> Result<()> {
    // Load .env file if it exists (for ACTION_MANAGER_* and RUST_LOG)
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    ensure!(cli.fps > 0, "--fps must be positive");
    let dt = 1.0 / cli.fps as f32;

    let manager: ActionManager<Sprite> = ActionManager::with_config(ActionManagerConfig::from_env());
    let mut frames = FrameLoop::new();
    let listener = frames.register(Rc::new(manager.clone()) as Rc<dyn Updatable>, 0);

    let sprites: Vec<Rc<Sprite>> = (0..cli.sprites)
        .map(|i| Rc::new(Sprite::new(format!("sprite-{i}"), (0.0, i as f32 * 10.0))))
        .collect();
    for (i, sprite) in sprites.iter().enumerate() {
        schedule(&manager, sprite, i);
    }
    info!(
        sprites = sprites.len(),
        ticks = cli.ticks,
        fps = cli.fps,
        initial_capacity = manager.config().initial_capacity,
        "starting"
    );

    for _ in 0..cli.ticks {
        frames.advance(dt);
    }

    // Stop any still-running move on the first sprite mid-flight.
    if let Some(first) = sprites.first()
        && manager.get_action_by_tag(TAG_MOVE, first).is_some()
    {
        manager.remove_action_by_tag(TAG_MOVE, first);
    }

    for sprite in &sprites {
        let (x, y) = sprite.position();
        info!(
            sprite = %sprite.name,
            x,
            y,
            visible = sprite.is_visible(),
            running = manager.number_of_running_actions_in_target(sprite),
            "final state"
        );
    }

    frames.unregister(listener);
    manager.remove_all_actions();
    info!(
        frames = frames.frame(),
        elapsed = frames.elapsed(),
        "done"
    );
    Ok(())
}

/// Every sprite moves and blinks; every third one despawns early.
fn schedule(manager: &ActionManager<Sprite>, sprite: &Rc<Sprite>, index: usize) {
    let duration = 1.0 + index as f32 * 0.5;
    let travel = ActionHandle::new(MoveBy::new((100.0, 0.0), duration)).with_tag(TAG_MOVE);
    manager.add_action(&travel, sprite, false);

    let blink = ActionHandle::new(Blink::new(0.25, 4)).with_tag(TAG_BLINK);
    manager.add_action(&blink, sprite, false);

    if index % 3 == 2 {
        let despawn = ActionHandle::new(Despawn::after(duration * 0.5)).with_tag(TAG_DESPAWN);
        manager.add_action(&despawn, sprite, false);
    }
}
