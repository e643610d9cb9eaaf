use arbor_common::EntityId;
use arbor_device::GraphicsDevice;
use arbor_kernel::{System, SystemError, Tick};

use crate::scene::Scene;
use crate::traversal::FrameReport;

/// A pass finished with node failures.
#[derive(Debug, thiserror::Error)]
#[error("frame {frame}: {failed} node visit(s) failed; first: {first}")]
pub struct FrameFailed {
    pub frame: u64,
    pub failed: usize,
    pub first: String,
}

pub type FrameObserver<D> = Box<dyn FnMut(&FrameReport, &Scene<D>)>;

/// Renders its scene once per tick.
pub struct SceneSystem<D: GraphicsDevice> {
    scene: Scene<D>,
    priority: i32,
    observer: Option<FrameObserver<D>>,
    frames: u64,
}

impl<D: GraphicsDevice> SceneSystem<D> {
    pub const NAME: &'static str = "scene-render";

    pub fn new(scene: Scene<D>) -> Self {
        Self {
            scene,
            priority: 0,
            observer: None,
            frames: 0,
        }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Called after every pass with its report.
    pub fn with_observer(mut self, observer: FrameObserver<D>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn scene(&self) -> &Scene<D> {
        &self.scene
    }

    pub fn scene_mut(&mut self) -> &mut Scene<D> {
        &mut self.scene
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }
}

impl<D: GraphicsDevice> System for SceneSystem<D> {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    fn update(&mut self, tick: &Tick) -> Result<(), SystemError> {
        let report = self.scene.render();
        self.frames += 1;
        tracing::trace!(tick = tick.index, frame = report.frame, "scene rendered");
        if let Some(observer) = self.observer.as_mut() {
            observer(&report, &self.scene);
        }
        match report.errors.first() {
            None => Ok(()),
            Some(first) => Err(SystemError::new(
                Self::NAME,
                FrameFailed {
                    frame: report.frame,
                    failed: report.errors.len(),
                    first: first.to_string(),
                },
            )),
        }
    }

    fn remove(&mut self, entity: EntityId) {
        match self.scene.destroy_entity(entity) {
            Ok(true) => tracing::debug!(%entity, "entity node destroyed"),
            Ok(false) => {}
            Err(e) => tracing::warn!(%entity, error = %e, "failed to destroy entity node"),
        }
    }
}
