use std::cell::RefCell;
use std::rc::Rc;
use std::time::{Duration, Instant};

use crate::clock::FrameClock;
use crate::system::{System, Tick};
use crate::world::{Disposition, World};

/// Engine loop limits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineConfig {
    /// Stop after this many frames. `None` runs until killed.
    pub max_frames: Option<u64>,
    /// Sleep off the remainder of each frame to hold this rate.
    pub target_fps: Option<u32>,
}

/// Outcome of [`Engine::run`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub frames: u64,
    pub errors: u64,
    pub killed: bool,
    pub last_error: Option<String>,
}

/// Drives a [`World`] from a [`FrameClock`].
///
/// The default error handler logs the error, keeps it as the last error and
/// requests a kill.
#[derive(Debug)]
pub struct Engine {
    world: World,
    clock: FrameClock,
    config: EngineConfig,
    last_error: Rc<RefCell<Option<String>>>,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Self {
        let last_error = Rc::new(RefCell::new(None));
        let seen = last_error.clone();
        let world = World::new(Box::new(move |e| {
            tracing::error!(system = %e.system, error = %e.source, "system failed, stopping");
            *seen.borrow_mut() = Some(e.to_string());
            Disposition::Kill
        }));
        Self {
            world,
            clock: FrameClock::default(),
            config,
            last_error,
        }
    }

    /// Replace the default handler with a custom error policy.
    pub fn with_world(config: EngineConfig, world: World) -> Self {
        Self {
            world,
            clock: FrameClock::default(),
            config,
            last_error: Rc::new(RefCell::new(None)),
        }
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    pub fn add_system(&mut self, system: Box<dyn System>) {
        self.world.add(system);
    }

    pub fn kill(&mut self) {
        self.world.request_kill();
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Run a single frame.
    pub fn step(&mut self) -> Tick {
        let tick = self.clock.tick();
        self.world.update(&tick);
        tick
    }

    /// Run frames until a kill is requested or `max_frames` is reached.
    pub fn run(&mut self) -> RunSummary {
        let _span = tracing::info_span!("engine_run", max_frames = ?self.config.max_frames).entered();
        let budget = self
            .config
            .target_fps
            .filter(|fps| *fps > 0)
            .map(|fps| Duration::from_secs(1) / fps);
        let errors_before = self.world.error_count();
        let mut frames = 0;

        while !self.world.kill_requested() {
            if self.config.max_frames.is_some_and(|max| frames >= max) {
                break;
            }
            let started = Instant::now();
            self.step();
            frames += 1;
            if let Some(budget) = budget {
                let spent = started.elapsed();
                if spent < budget {
                    std::thread::sleep(budget - spent);
                }
            }
        }

        let summary = RunSummary {
            frames,
            errors: self.world.error_count() - errors_before,
            killed: self.world.kill_requested(),
            last_error: self.last_error.borrow().clone(),
        };
        tracing::info!(
            frames = summary.frames,
            errors = summary.errors,
            killed = summary.killed,
            fps = self.clock.fps(),
            "engine stopped"
        );
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::system::SystemError;
    use arbor_common::EntityId;

    struct Counter {
        runs: Rc<RefCell<u64>>,
        fail_on: Option<u64>,
    }

    impl System for Counter {
        fn name(&self) -> &str {
            "counter"
        }

        fn priority(&self) -> i32 {
            0
        }

        fn update(&mut self, tick: &Tick) -> Result<(), SystemError> {
            *self.runs.borrow_mut() += 1;
            if self.fail_on == Some(tick.index) {
                return Err(SystemError::new("counter", "tick rejected"));
            }
            Ok(())
        }

        fn remove(&mut self, _entity: EntityId) {}
    }

    #[test]
    fn runs_until_frame_limit() {
        let runs = Rc::new(RefCell::new(0));
        let mut e = Engine::new(EngineConfig {
            max_frames: Some(5),
            ..EngineConfig::default()
        });
        e.add_system(Box::new(Counter {
            runs: runs.clone(),
            fail_on: None,
        }));
        let s = e.run();
        assert_eq!(s.frames, 5);
        assert!(!s.killed);
        assert_eq!(*runs.borrow(), 5);
    }

    #[test]
    fn default_handler_kills_and_keeps_error() {
        let runs = Rc::new(RefCell::new(0));
        let mut e = Engine::new(EngineConfig {
            max_frames: Some(10),
            ..EngineConfig::default()
        });
        e.add_system(Box::new(Counter {
            runs: runs.clone(),
            fail_on: Some(3),
        }));
        let s = e.run();
        assert_eq!(s.frames, 3);
        assert!(s.killed);
        assert_eq!(s.errors, 1);
        assert!(s.last_error.unwrap().contains("tick rejected"));
    }

    #[test]
    fn custom_world_can_ignore_errors() {
        let runs = Rc::new(RefCell::new(0));
        let world = World::new(Box::new(|_| Disposition::Continue));
        let mut e = Engine::with_world(
            EngineConfig {
                max_frames: Some(4),
                ..EngineConfig::default()
            },
            world,
        );
        e.add_system(Box::new(Counter {
            runs: runs.clone(),
            fail_on: Some(2),
        }));
        let s = e.run();
        assert_eq!(s.frames, 4);
        assert_eq!(s.errors, 1);
        assert!(s.last_error.is_none());
    }

    #[test]
    fn killed_engine_runs_nothing() {
        let mut e = Engine::new(EngineConfig::default());
        e.kill();
        assert_eq!(e.run().frames, 0);
    }
}
