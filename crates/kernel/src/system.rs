use std::time::Duration;

use arbor_common::EntityId;

/// One logical frame step handed to every system.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tick {
    /// Frame number, starting at 1.
    pub index: u64,
    /// Time since the previous tick.
    pub delta: Duration,
    /// Time since the clock started.
    pub elapsed: Duration,
}

impl Tick {
    pub fn first() -> Self {
        Self {
            index: 1,
            delta: Duration::ZERO,
            elapsed: Duration::ZERO,
        }
    }
}

/// A failed system update.
#[derive(Debug, thiserror::Error)]
#[error("system {system:?} failed: {source}")]
pub struct SystemError {
    pub system: String,
    #[source]
    pub source: Box<dyn std::error::Error + Send + Sync + 'static>,
}

impl SystemError {
    pub fn new(
        system: impl Into<String>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync + 'static>>,
    ) -> Self {
        Self {
            system: system.into(),
            source: source.into(),
        }
    }
}

/// A priority-scheduled unit of per-frame work.
///
/// Higher priorities run first.
pub trait System {
    fn name(&self) -> &str;
    fn priority(&self) -> i32;
    fn update(&mut self, tick: &Tick) -> Result<(), SystemError>;
    /// Drop any per-entity state held for `entity`.
    fn remove(&mut self, entity: EntityId);
}
