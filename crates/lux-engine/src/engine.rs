//! Engine context
//!
//! Constructs the bus, output map, function registry and master timer
//! once, and hands shared references to the components that need them.
//! There are no process-wide singletons; everything reachable from the
//! outside goes through this context.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use lux_output::OutputMap;

use crate::bus::Bus;
use crate::error::EngineResult;
use crate::function::{Function, FunctionId, FunctionRegistry};
use crate::timer::{MasterTimer, TimerConfig};

/// Engine configuration
///
/// Serialized and persisted by the surrounding application; the engine
/// itself never touches disk.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Number of 512-channel universes
    pub universes: usize,
    pub timer: TimerConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            universes: 4,
            timer: TimerConfig::default(),
        }
    }
}

/// Top-level lighting engine context
pub struct LightingEngine {
    bus: Arc<Bus>,
    output: Arc<OutputMap>,
    functions: Arc<FunctionRegistry>,
    timer: MasterTimer,
}

impl LightingEngine {
    pub fn new(config: EngineConfig) -> Self {
        let bus = Arc::new(Bus::new());
        let output = Arc::new(OutputMap::new(config.universes));
        let functions = Arc::new(FunctionRegistry::new());
        let timer = MasterTimer::new(
            config.timer,
            Arc::clone(&functions),
            Arc::clone(&output),
            Arc::clone(&bus),
        );

        log::info!(
            "engine created: {} universes, {} Hz",
            config.universes,
            config.timer.frequency.as_u32()
        );

        Self {
            bus,
            output,
            functions,
            timer,
        }
    }

    /// Launch the scheduler thread
    pub fn start(&self) -> EngineResult<()> {
        self.timer.start()
    }

    /// Stop every running function and terminate the scheduler thread
    pub fn stop(&self) {
        self.timer.stop();
    }

    pub fn bus(&self) -> &Arc<Bus> {
        &self.bus
    }

    pub fn output(&self) -> &Arc<OutputMap> {
        &self.output
    }

    pub fn functions(&self) -> &Arc<FunctionRegistry> {
        &self.functions
    }

    pub fn timer(&self) -> &MasterTimer {
        &self.timer
    }

    /// Register a function with the engine
    pub fn add_function(&self, function: Box<dyn Function>) -> FunctionId {
        self.functions.add(function)
    }

    /// Stop and unregister a function
    pub fn remove_function(&self, id: FunctionId) -> Option<Box<dyn Function>> {
        self.timer.stop_function(id);
        self.functions.remove(id)
    }
}

impl Drop for LightingEngine {
    fn drop(&mut self) {
        if self.timer.is_running() {
            self.timer.stop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.universes, 4);
        assert_eq!(config.timer.frequency.as_u32(), 64);
    }

    #[test]
    fn test_engine_construction() {
        let engine = LightingEngine::new(EngineConfig::default());

        assert!(!engine.timer().is_running());
        assert_eq!(engine.output().universe_count(), 4);
        assert!(engine.functions().is_empty());
    }
}
