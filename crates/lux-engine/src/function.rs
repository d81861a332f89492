//! Function contract and registry
//!
//! A function is a schedulable unit of timed output: a lighting scene, a
//! chase, an effect. The scheduler drives every running function once per
//! tick through [`Function::write`]; the concrete crossfade math lives in
//! the implementations, not here.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use lux_core::Ticks;
use lux_output::UniverseLease;

use crate::bus::{BUS_FADE, Bus, BusId};

/// Stable function identifier, assigned by the registry
pub type FunctionId = u32;

/// Function type tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FunctionKind {
    Scene,
    Chaser,
    Efx,
    Collection,
}

/// Per-tick call context handed to running functions
pub struct TickContext<'a> {
    /// Ticks elapsed since this function was started
    pub elapsed: Ticks,
    /// Shared timing values for fade/hold curves
    pub bus: &'a Bus,
}

/// Schedulable unit with a per-tick write contract
///
/// `write` is invoked only by the scheduler thread, in stable insertion
/// order within a tick. Returning `false` self-terminates the function;
/// the scheduler removes it and emits the stopped notification.
pub trait Function: Send {
    fn name(&self) -> &str;

    fn kind(&self) -> FunctionKind;

    /// Bus this function times itself against
    fn bus(&self) -> BusId {
        BUS_FADE
    }

    /// Apply this function's contribution to the per-tick buffers
    ///
    /// Returns `true` to keep running, `false` to stop after this tick.
    fn write(&mut self, universes: &mut UniverseLease<'_>, ctx: &TickContext<'_>) -> bool;
}

/// Lifecycle notifications emitted by the scheduler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionEvent {
    Started(FunctionId),
    Stopped(FunctionId),
}

/// Arena of owned functions addressed by stable ids
///
/// Functions are added and removed from any thread; the scheduler borrows
/// them one at a time for the duration of a single `write` call.
pub struct FunctionRegistry {
    functions: Mutex<HashMap<FunctionId, Box<dyn Function>>>,
    next_id: AtomicU32,
}

impl FunctionRegistry {
    pub fn new() -> Self {
        Self {
            functions: Mutex::new(HashMap::new()),
            next_id: AtomicU32::new(1),
        }
    }

    /// Take ownership of a function and return its id
    pub fn add(&self, function: Box<dyn Function>) -> FunctionId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        log::debug!("function {id} registered: {}", function.name());
        self.functions.lock().insert(id, function);
        id
    }

    /// Remove a function, returning it if the id was known
    ///
    /// Callers must stop the function first; see
    /// `LightingEngine::remove_function`.
    pub fn remove(&self, id: FunctionId) -> Option<Box<dyn Function>> {
        self.functions.lock().remove(&id)
    }

    pub fn contains(&self, id: FunctionId) -> bool {
        self.functions.lock().contains_key(&id)
    }

    pub fn name(&self, id: FunctionId) -> Option<String> {
        self.functions
            .lock()
            .get(&id)
            .map(|f| f.name().to_string())
    }

    pub fn kind(&self, id: FunctionId) -> Option<FunctionKind> {
        self.functions.lock().get(&id).map(|f| f.kind())
    }

    /// Borrow one function mutably for the duration of `op`
    pub fn with_function<R>(
        &self,
        id: FunctionId,
        op: impl FnOnce(&mut dyn Function) -> R,
    ) -> Option<R> {
        self.functions.lock().get_mut(&id).map(|f| op(f.as_mut()))
    }

    pub fn len(&self) -> usize {
        self.functions.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.lock().is_empty()
    }
}

impl Default for FunctionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Noop;

    impl Function for Noop {
        fn name(&self) -> &str {
            "noop"
        }

        fn kind(&self) -> FunctionKind {
            FunctionKind::Scene
        }

        fn write(&mut self, _universes: &mut UniverseLease<'_>, _ctx: &TickContext<'_>) -> bool {
            true
        }
    }

    #[test]
    fn test_ids_are_stable_across_removals() {
        let registry = FunctionRegistry::new();
        let a = registry.add(Box::new(Noop));
        let b = registry.add(Box::new(Noop));

        assert_ne!(a, b);
        assert!(registry.remove(a).is_some());
        assert!(!registry.contains(a));
        assert!(registry.contains(b));

        let c = registry.add(Box::new(Noop));
        assert_ne!(c, b);
    }

    #[test]
    fn test_metadata_lookup() {
        let registry = FunctionRegistry::new();
        let id = registry.add(Box::new(Noop));

        assert_eq!(registry.name(id).unwrap(), "noop");
        assert_eq!(registry.kind(id).unwrap(), FunctionKind::Scene);
        assert!(registry.name(id + 1).is_none());
    }
}
