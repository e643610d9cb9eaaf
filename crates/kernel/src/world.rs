use arbor_common::EntityId;

use crate::system::{System, SystemError, Tick};

/// What the scheduler does after a system error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Continue,
    Kill,
}

/// The single place system errors are judged.
pub type ErrorHandler = Box<dyn FnMut(&SystemError) -> Disposition>;

/// Priority-ordered system scheduler.
///
/// Every tick runs every system, highest priority first. A failing system
/// never stops the systems after it; its error goes to the handler, which
/// alone decides whether the run should end.
pub struct World {
    systems: Vec<Box<dyn System>>,
    handler: ErrorHandler,
    kill_requested: bool,
    ticks: u64,
    errors: u64,
}

impl Default for World {
    fn default() -> Self {
        Self::new(Box::new(|e| {
            tracing::warn!(error = %e, "system error ignored");
            Disposition::Continue
        }))
    }
}

impl std::fmt::Debug for World {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("World")
            .field("systems", &self.system_names())
            .field("kill_requested", &self.kill_requested)
            .field("ticks", &self.ticks)
            .field("errors", &self.errors)
            .finish()
    }
}

impl World {
    pub fn new(handler: ErrorHandler) -> Self {
        Self {
            systems: Vec::new(),
            handler,
            kill_requested: false,
            ticks: 0,
            errors: 0,
        }
    }

    pub fn set_handler(&mut self, handler: ErrorHandler) {
        self.handler = handler;
    }

    /// Add a system and restore descending priority order. Equal priorities
    /// keep insertion order.
    pub fn add(&mut self, system: Box<dyn System>) {
        tracing::debug!(name = system.name(), priority = system.priority(), "system added");
        self.systems.push(system);
        self.systems
            .sort_by_key(|s| std::cmp::Reverse(s.priority()));
    }

    pub fn remove_system(&mut self, name: &str) -> Option<Box<dyn System>> {
        let idx = self.systems.iter().position(|s| s.name() == name)?;
        Some(self.systems.remove(idx))
    }

    /// Run every system once. Returns the number that failed.
    pub fn update(&mut self, tick: &Tick) -> usize {
        let _span = tracing::trace_span!("world_update", tick = tick.index).entered();
        self.ticks += 1;
        let mut failed = 0;
        for system in &mut self.systems {
            if let Err(e) = system.update(tick) {
                failed += 1;
                self.errors += 1;
                if (self.handler)(&e) == Disposition::Kill {
                    self.kill_requested = true;
                }
            }
        }
        failed
    }

    /// Tell every system that `entity` is gone.
    pub fn remove_entity(&mut self, entity: EntityId) {
        for system in &mut self.systems {
            system.remove(entity);
        }
    }

    pub fn system_names(&self) -> Vec<&str> {
        self.systems.iter().map(|s| s.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.systems.len()
    }

    pub fn is_empty(&self) -> bool {
        self.systems.is_empty()
    }

    pub fn kill_requested(&self) -> bool {
        self.kill_requested
    }

    pub fn request_kill(&mut self) {
        self.kill_requested = true;
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Errors seen over the world's lifetime.
    pub fn error_count(&self) -> u64 {
        self.errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    type Log = Rc<RefCell<Vec<String>>>;

    struct Probe {
        name: String,
        priority: i32,
        fail: bool,
        log: Log,
    }

    impl Probe {
        fn boxed(name: &str, priority: i32, fail: bool, log: &Log) -> Box<dyn System> {
            Box::new(Self {
                name: name.to_string(),
                priority,
                fail,
                log: log.clone(),
            })
        }
    }

    impl System for Probe {
        fn name(&self) -> &str {
            &self.name
        }

        fn priority(&self) -> i32 {
            self.priority
        }

        fn update(&mut self, _tick: &Tick) -> Result<(), SystemError> {
            self.log.borrow_mut().push(self.name.clone());
            if self.fail {
                return Err(SystemError::new(self.name.clone(), "probe failure"));
            }
            Ok(())
        }

        fn remove(&mut self, entity: EntityId) {
            self.log.borrow_mut().push(format!("{}-{}", self.name, entity.0));
        }
    }

    #[test]
    fn world_starts_empty() {
        let w = World::default();
        assert!(w.is_empty());
        assert!(!w.kill_requested());
    }

    #[test]
    fn runs_in_descending_priority() {
        let log = Log::default();
        let mut w = World::default();
        w.add(Probe::boxed("p1", 1, false, &log));
        w.add(Probe::boxed("p5", 5, false, &log));
        w.add(Probe::boxed("p3", 3, false, &log));
        assert_eq!(w.update(&Tick::first()), 0);
        assert_eq!(*log.borrow(), vec!["p5", "p3", "p1"]);
    }

    #[test]
    fn failing_system_does_not_block_others() {
        let log = Log::default();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let seen_in = seen.clone();
        let mut w = World::new(Box::new(move |e| {
            seen_in.borrow_mut().push(e.system.clone());
            Disposition::Continue
        }));
        w.add(Probe::boxed("p1", 1, false, &log));
        w.add(Probe::boxed("p5", 5, true, &log));
        w.add(Probe::boxed("p3", 3, false, &log));
        assert_eq!(w.update(&Tick::first()), 1);
        assert_eq!(*log.borrow(), vec!["p5", "p3", "p1"]);
        assert_eq!(*seen.borrow(), vec!["p5"]);
        assert!(!w.kill_requested());
    }

    #[test]
    fn handler_can_request_kill() {
        let log = Log::default();
        let mut w = World::new(Box::new(|_| Disposition::Kill));
        w.add(Probe::boxed("bad", 0, true, &log));
        w.update(&Tick::first());
        assert!(w.kill_requested());
        assert_eq!(w.error_count(), 1);
    }

    #[test]
    fn equal_priorities_keep_insertion_order() {
        let log = Log::default();
        let mut w = World::default();
        w.add(Probe::boxed("a", 2, false, &log));
        w.add(Probe::boxed("b", 2, false, &log));
        w.add(Probe::boxed("c", 9, false, &log));
        assert_eq!(w.system_names(), vec!["c", "a", "b"]);
    }

    #[test]
    fn remove_entity_fans_out() {
        let log = Log::default();
        let mut w = World::default();
        w.add(Probe::boxed("a", 1, false, &log));
        w.add(Probe::boxed("b", 2, false, &log));
        w.remove_entity(EntityId(7));
        assert_eq!(*log.borrow(), vec!["b-7", "a-7"]);
    }

    #[test]
    fn remove_system_by_name() {
        let log = Log::default();
        let mut w = World::default();
        w.add(Probe::boxed("a", 1, false, &log));
        assert!(w.remove_system("a").is_some());
        assert!(w.remove_system("a").is_none());
        assert!(w.is_empty());
    }
}
