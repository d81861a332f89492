//! Owned plugin registry
//!
//! Plugins are owned by the registry and addressed by stable handles, so
//! patches can refer to them across threads without shared pointers. The
//! arena is append-only; handles stay valid for the registry's lifetime.

use crate::plugin::OutputPlugin;

/// Stable index of a registered plugin
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PluginHandle(usize);

/// Arena of owned output plugins
pub struct PluginRegistry {
    plugins: Vec<Box<dyn OutputPlugin>>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self {
            plugins: Vec::new(),
        }
    }

    /// Register a plugin and return its stable handle
    ///
    /// Names are expected to be unique; on a clash the earlier
    /// registration keeps winning name lookups.
    pub fn register(&mut self, plugin: Box<dyn OutputPlugin>) -> PluginHandle {
        if self.find_by_name(plugin.name()).is_some() {
            log::warn!(
                "output plugin name already registered: {}",
                plugin.name()
            );
        }
        self.plugins.push(plugin);
        PluginHandle(self.plugins.len() - 1)
    }

    pub fn get(&self, handle: PluginHandle) -> Option<&dyn OutputPlugin> {
        self.plugins.get(handle.0).map(|p| p.as_ref())
    }

    pub fn get_mut(&mut self, handle: PluginHandle) -> Option<&mut Box<dyn OutputPlugin>> {
        self.plugins.get_mut(handle.0)
    }

    /// Handle of the first plugin with the given name
    pub fn find_by_name(&self, name: &str) -> Option<PluginHandle> {
        self.plugins
            .iter()
            .position(|p| p.name() == name)
            .map(PluginHandle)
    }

    pub fn names(&self) -> Vec<String> {
        self.plugins.iter().map(|p| p.name().to_string()).collect()
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }
}

impl Default for PluginRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dummy::{DUMMY_PLUGIN_NAME, DummyPlugin};

    #[test]
    fn test_register_and_lookup() {
        let mut registry = PluginRegistry::new();
        assert!(registry.is_empty());

        let handle = registry.register(Box::new(DummyPlugin::new(1)));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.find_by_name(DUMMY_PLUGIN_NAME), Some(handle));
        assert!(registry.find_by_name("ArtNet").is_none());
        assert_eq!(registry.get(handle).unwrap().name(), DUMMY_PLUGIN_NAME);
    }

    #[test]
    fn test_handles_stay_stable() {
        let mut registry = PluginRegistry::new();
        let first = registry.register(Box::new(DummyPlugin::new(1)));
        let second = registry.register(Box::new(DummyPlugin::new(2)));

        assert_ne!(first, second);
        assert_eq!(registry.get(second).unwrap().outputs().len(), 2);
        assert_eq!(registry.get(first).unwrap().outputs().len(), 1);
    }
}
