// crates/engine_core/src/subsystem.rs

use std::any::{type_name, Any};

use crate::error::{EngineError, Result};

/// A process-wide service with an explicit lifecycle.
///
/// `start` only sees the subsystems declared before it, so every dependency
/// edge points backwards in the start order.
pub trait Subsystem: Any + Send {
    fn name(&self) -> &'static str;

    fn start(&mut self, live: &LiveSubsystems<'_>) -> Result<()>;

    fn stop(&mut self);

    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Read-only view of the live prefix, handed to a subsystem while it starts.
pub struct LiveSubsystems<'a> {
    entries: &'a [Box<dyn Subsystem>],
}

impl<'a> LiveSubsystems<'a> {
    pub fn get<T: Subsystem>(&self) -> Result<&'a T> {
        find::<T>(self.entries).ok_or(EngineError::SubsystemNotLive(type_name::<T>()))
    }
}

/// Hand-ordered list of subsystems.
///
/// Invariant: the live subsystems are always exactly `entries[..live]`.
/// Starting grows the prefix by one, stopping shrinks it from the back.
#[derive(Default)]
pub struct SubsystemRegistry {
    entries: Vec<Box<dyn Subsystem>>,
    live: usize,
}

impl SubsystemRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares the next subsystem in the start order.
    pub fn with<S: Subsystem>(mut self, subsystem: S) -> Self {
        debug_assert!(
            self.position::<S>().is_none(),
            "{} declared twice",
            subsystem.name()
        );
        self.entries.push(Box::new(subsystem));
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn live_count(&self) -> usize {
        self.live
    }

    pub fn all_live(&self) -> bool {
        self.live == self.entries.len()
    }

    /// Starts the first subsystem that is not live yet.
    /// Returns its name, or `None` when everything is already live.
    pub fn start_next(&mut self) -> Result<Option<&'static str>> {
        if self.all_live() {
            return Ok(None);
        }

        let (live, rest) = self.entries.split_at_mut(self.live);
        let next = &mut rest[0];
        let name = next.name();

        tracing::debug!(subsystem = name, "starting");
        next.start(&LiveSubsystems { entries: live })?;
        self.live += 1;

        Ok(Some(name))
    }

    /// Starts everything up to and including `T`.
    pub fn start_until<T: Subsystem>(&mut self) -> Result<()> {
        let target = self
            .position::<T>()
            .ok_or(EngineError::UnknownSubsystem(type_name::<T>()))?;

        while self.live <= target {
            self.start_next()?;
        }
        Ok(())
    }

    pub fn start_all(&mut self) -> Result<()> {
        while self.start_next()?.is_some() {}
        Ok(())
    }

    /// Stops every live subsystem, last started first.
    pub fn stop_all(&mut self) {
        while self.live > 0 {
            self.live -= 1;
            let entry = &mut self.entries[self.live];
            tracing::debug!(subsystem = entry.name(), "stopping");
            entry.stop();
        }
    }

    pub fn get<T: Subsystem>(&self) -> Result<&T> {
        find::<T>(&self.entries[..self.live]).ok_or(EngineError::SubsystemNotLive(type_name::<T>()))
    }

    pub fn get_mut<T: Subsystem>(&mut self) -> Result<&mut T> {
        self.entries[..self.live]
            .iter_mut()
            .find_map(|entry| entry.as_any_mut().downcast_mut::<T>())
            .ok_or(EngineError::SubsystemNotLive(type_name::<T>()))
    }

    pub fn is_live<T: Subsystem>(&self) -> bool {
        self.position::<T>().is_some_and(|index| index < self.live)
    }

    pub fn live_names(&self) -> Vec<&'static str> {
        self.entries[..self.live].iter().map(|e| e.name()).collect()
    }

    pub fn declared_names(&self) -> Vec<&'static str> {
        self.entries.iter().map(|e| e.name()).collect()
    }

    fn position<T: Subsystem>(&self) -> Option<usize> {
        self.entries.iter().position(|e| e.as_any().is::<T>())
    }
}

fn find<T: Subsystem>(entries: &[Box<dyn Subsystem>]) -> Option<&T> {
    entries.iter().find_map(|entry| entry.as_any().downcast_ref::<T>())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::marker::PhantomData;
    use std::sync::{Arc, Mutex};

    pub(crate) type EventLog = Arc<Mutex<Vec<String>>>;

    /// Records start/stop into a shared log. `N` only makes the types distinct.
    pub(crate) struct Recorder<const N: usize> {
        log: EventLog,
        fail_start: bool,
        _tag: PhantomData<[(); N]>,
    }

    impl<const N: usize> Recorder<N> {
        pub(crate) fn new(log: &EventLog) -> Self {
            Self {
                log: Arc::clone(log),
                fail_start: false,
                _tag: PhantomData,
            }
        }

        fn failing(log: &EventLog) -> Self {
            Self {
                fail_start: true,
                ..Self::new(log)
            }
        }
    }

    impl<const N: usize> Subsystem for Recorder<N> {
        fn name(&self) -> &'static str {
            ["S0", "S1", "S2", "S3", "S4"][N]
        }

        fn start(&mut self, live: &LiveSubsystems<'_>) -> Result<()> {
            if self.fail_start {
                return Err(EngineError::startup(self.name(), "refused"));
            }
            // Everything declared earlier must already be visible.
            if N > 0 {
                live.get::<Recorder<0>>()?;
            }
            self.log.lock().unwrap().push(format!("start {}", self.name()));
            Ok(())
        }

        fn stop(&mut self) {
            self.log.lock().unwrap().push(format!("stop {}", self.name()));
        }

        fn as_any(&self) -> &dyn Any {
            self
        }

        fn as_any_mut(&mut self) -> &mut dyn Any {
            self
        }
    }

    fn five(log: &EventLog) -> SubsystemRegistry {
        SubsystemRegistry::new()
            .with(Recorder::<0>::new(log))
            .with(Recorder::<1>::new(log))
            .with(Recorder::<2>::new(log))
            .with(Recorder::<3>::new(log))
            .with(Recorder::<4>::new(log))
    }

    #[test]
    fn stops_in_exact_reverse_of_start() {
        let log = EventLog::default();
        let mut registry = five(&log);

        registry.start_all().unwrap();
        assert!(registry.all_live());
        registry.stop_all();
        assert_eq!(registry.live_count(), 0);

        let events = log.lock().unwrap().clone();
        assert_eq!(
            events,
            vec![
                "start S0", "start S1", "start S2", "start S3", "start S4",
                "stop S4", "stop S3", "stop S2", "stop S1", "stop S0",
            ]
        );
    }

    #[test]
    fn start_until_leaves_a_prefix_live() {
        let log = EventLog::default();
        let mut registry = five(&log);

        registry.start_until::<Recorder<2>>().unwrap();

        assert_eq!(registry.live_names(), vec!["S0", "S1", "S2"]);
        assert!(registry.is_live::<Recorder<2>>());
        assert!(!registry.is_live::<Recorder<3>>());
        assert!(registry.get::<Recorder<3>>().is_err());

        // Asking for something already live starts nothing new.
        registry.start_until::<Recorder<1>>().unwrap();
        assert_eq!(registry.live_count(), 3);
    }

    #[test]
    fn start_sees_only_earlier_subsystems() {
        let log = EventLog::default();
        // S1 asks for S0 while starting; with S0 declared after it, that fails.
        let mut registry = SubsystemRegistry::new()
            .with(Recorder::<1>::new(&log))
            .with(Recorder::<0>::new(&log));

        let err = registry.start_all().unwrap_err();
        assert!(matches!(err, EngineError::SubsystemNotLive(_)));
        assert_eq!(registry.live_count(), 0);
    }

    #[test]
    fn failed_start_keeps_prefix_and_shutdown_stops_only_it() {
        let log = EventLog::default();
        let mut registry = SubsystemRegistry::new()
            .with(Recorder::<0>::new(&log))
            .with(Recorder::<1>::new(&log))
            .with(Recorder::<2>::failing(&log))
            .with(Recorder::<3>::new(&log));

        let err = registry.start_all().unwrap_err();
        assert!(matches!(err, EngineError::StartupFailure { subsystem: "S2", .. }));
        assert_eq!(registry.live_names(), vec!["S0", "S1"]);

        registry.stop_all();
        registry.stop_all();

        let events = log.lock().unwrap().clone();
        assert_eq!(events, vec!["start S0", "start S1", "stop S1", "stop S0"]);
    }

    #[test]
    fn unknown_subsystem_is_reported() {
        let log = EventLog::default();
        let mut registry = SubsystemRegistry::new().with(Recorder::<0>::new(&log));
        assert!(matches!(
            registry.start_until::<Recorder<4>>(),
            Err(EngineError::UnknownSubsystem(_))
        ));
    }
}
