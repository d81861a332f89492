//! Universe multiplexer
//!
//! Routes the flat channel address space onto per-universe buffers and
//! bound output plugins, and implements the global blackout override.
//!
//! ## Thread Safety Design
//!
//! `OutputMap` is shared by the scheduler thread and arbitrarily many
//! caller threads. Lock order is blackout → buffers → patches → plugins;
//! the blackout guard is held across plugin access so a toggle can never
//! interleave with a per-channel read or write.

use parking_lot::{Mutex, MutexGuard, RwLock};

use lux_core::{Address, UNIVERSE_CHANNELS, UniverseBuffer};

use crate::dummy::DummyPlugin;
use crate::error::{OutputError, OutputResult};
use crate::plugin::OutputPlugin;
use crate::registry::{PluginHandle, PluginRegistry};

// ═══════════════════════════════════════════════════════════════════════════════
// PATCH + BLACKOUT STORE
// ═══════════════════════════════════════════════════════════════════════════════

/// Binding of one universe to a plugin output line
///
/// Every universe carries exactly one patch at all times; the loop-back
/// dummy plugin is the default.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputPatch {
    pub plugin: PluginHandle,
    pub line: usize,
}

/// Real channel values parked while blackout is active
struct BlackoutStore {
    values: Vec<UniverseBuffer>,
}

impl BlackoutStore {
    fn new(universe_count: usize) -> Self {
        Self {
            values: vec![UniverseBuffer::new(); universe_count],
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// PER-TICK LEASE
// ═══════════════════════════════════════════════════════════════════════════════

/// Exclusive per-tick write lease on all universe buffers
///
/// Held by the scheduler for one whole function pass; dropping the lease
/// releases the buffers. Running functions write their contribution here,
/// never to the plugins directly.
pub struct UniverseLease<'a> {
    buffers: MutexGuard<'a, Vec<UniverseBuffer>>,
}

impl UniverseLease<'_> {
    pub fn universe_count(&self) -> usize {
        self.buffers.len()
    }

    /// Current staged value at `addr`, 0 for an out-of-range address
    pub fn get(&self, addr: Address) -> u8 {
        match self.buffers.get(addr.universe()) {
            Some(buffer) => buffer.get(addr.channel()),
            None => 0,
        }
    }

    /// Stage a single channel value; out-of-range addresses are ignored
    pub fn set(&mut self, addr: Address, value: u8) {
        debug_assert!(addr.universe() < self.buffers.len());
        if let Some(buffer) = self.buffers.get_mut(addr.universe()) {
            buffer.set(addr.channel(), value);
        }
    }

    /// Stage a contiguous run of values within one universe
    pub fn set_range(&mut self, addr: Address, values: &[u8]) {
        debug_assert!(addr.channel() + values.len() <= UNIVERSE_CHANNELS);
        if let Some(buffer) = self.buffers.get_mut(addr.universe()) {
            buffer.set_range(addr.channel(), values);
        }
    }

    /// Direct access to one universe's staging buffer
    pub fn universe_mut(&mut self, universe: usize) -> Option<&mut UniverseBuffer> {
        self.buffers.get_mut(universe)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// OUTPUT MAP
// ═══════════════════════════════════════════════════════════════════════════════

/// Universe/plugin output multiplexer with blackout override
pub struct OutputMap {
    universe_count: usize,
    /// Owned plugin instances, handle-addressed
    plugins: Mutex<PluginRegistry>,
    /// One patch per universe, never absent
    patches: RwLock<Vec<OutputPatch>>,
    /// Per-tick staging buffers, leased to the scheduler
    buffers: Mutex<Vec<UniverseBuffer>>,
    /// `Some` while blackout is active
    blackout: Mutex<Option<BlackoutStore>>,
}

impl OutputMap {
    /// Create a map with every universe patched to the loop-back plugin
    pub fn new(universe_count: usize) -> Self {
        let mut plugins = PluginRegistry::new();
        let dummy = plugins.register(Box::new(DummyPlugin::new(universe_count)));

        let patches = (0..universe_count)
            .map(|universe| OutputPatch {
                plugin: dummy,
                line: universe,
            })
            .collect();

        Self {
            universe_count,
            plugins: Mutex::new(plugins),
            patches: RwLock::new(patches),
            buffers: Mutex::new(vec![UniverseBuffer::new(); universe_count]),
            blackout: Mutex::new(None),
        }
    }

    pub fn universe_count(&self) -> usize {
        self.universe_count
    }

    // ═══════════════════════════════════════════════════════════════════════
    // PLUGIN MANAGEMENT
    // ═══════════════════════════════════════════════════════════════════════

    /// Register an output plugin, returning its stable handle
    pub fn register_plugin(&self, plugin: Box<dyn OutputPlugin>) -> PluginHandle {
        let name = plugin.name().to_string();
        let handle = self.plugins.lock().register(plugin);
        log::info!("output plugin registered: {name}");
        handle
    }

    /// Names of all registered plugins
    pub fn plugin_names(&self) -> Vec<String> {
        self.plugins.lock().names()
    }

    /// Current patch of a universe, if the index is valid
    pub fn patch(&self, universe: usize) -> Option<OutputPatch> {
        self.patches.read().get(universe).copied()
    }

    /// (Re)bind a universe to a plugin output line
    ///
    /// Fails without touching the previous patch on an invalid universe
    /// index, an unknown plugin name, or a line the plugin does not have.
    pub fn set_patch(&self, universe: usize, plugin_name: &str, line: usize) -> OutputResult<()> {
        if universe >= self.universe_count {
            log::warn!("patch rejected: invalid universe {universe}");
            return Err(OutputError::InvalidUniverse(universe));
        }

        let handle = {
            let plugins = self.plugins.lock();
            let handle = plugins.find_by_name(plugin_name).ok_or_else(|| {
                log::warn!("patch rejected: unknown plugin {plugin_name}");
                OutputError::UnknownPlugin(plugin_name.to_string())
            })?;
            let plugin = plugins.get(handle).ok_or_else(|| {
                OutputError::UnknownPlugin(plugin_name.to_string())
            })?;
            if line >= plugin.outputs().len() {
                log::warn!("patch rejected: {plugin_name} has no line {line}");
                return Err(OutputError::InvalidLine {
                    plugin: plugin_name.to_string(),
                    line,
                });
            }
            handle
        };

        self.patches.write()[universe] = OutputPatch {
            plugin: handle,
            line,
        };
        log::info!("universe {universe} patched to {plugin_name} line {line}");
        Ok(())
    }

    // ═══════════════════════════════════════════════════════════════════════
    // SINGLE-CHANNEL ACCESS
    // ═══════════════════════════════════════════════════════════════════════

    /// Read one channel's live value
    ///
    /// Reads the blackout store while blackout is active, the patched
    /// plugin otherwise. Out-of-range addresses log a warning and read 0.
    pub fn value(&self, addr: Address) -> u8 {
        let addr = match addr.checked(self.universe_count) {
            Ok(addr) => addr,
            Err(e) => {
                log::warn!("channel read ignored: {e}");
                return 0;
            }
        };

        let blackout = self.blackout.lock();
        if let Some(store) = blackout.as_ref() {
            return store.values[addr.universe()].get(addr.channel());
        }

        let patches = self.patches.read();
        let patch = patches[addr.universe()];
        let plugins = self.plugins.lock();
        match plugins.get(patch.plugin) {
            Some(plugin) => plugin.read_channel(patch.line, addr.channel()).unwrap_or(0),
            None => 0,
        }
    }

    /// Write one channel's live value
    ///
    /// Writes the blackout store while blackout is active, the patched
    /// plugin otherwise. Out-of-range addresses log a warning and are a
    /// no-op.
    pub fn set_value(&self, addr: Address, value: u8) {
        let addr = match addr.checked(self.universe_count) {
            Ok(addr) => addr,
            Err(e) => {
                log::warn!("channel write ignored: {e}");
                return;
            }
        };

        let mut blackout = self.blackout.lock();
        if let Some(store) = blackout.as_mut() {
            store.values[addr.universe()].set(addr.channel(), value);
            return;
        }

        let patches = self.patches.read();
        let patch = patches[addr.universe()];
        let mut plugins = self.plugins.lock();
        if let Some(plugin) = plugins.get_mut(patch.plugin) {
            if let Err(e) = plugin.write_channel(patch.line, addr.channel(), value) {
                log::warn!("channel write failed: {e}");
            }
        }
    }

    // ═══════════════════════════════════════════════════════════════════════
    // RANGE ACCESS
    // ═══════════════════════════════════════════════════════════════════════

    /// Bulk read starting at `addr`; must not span a universe boundary
    ///
    /// Invalid ranges log a warning and fill `out` with zeros.
    pub fn value_range(&self, addr: Address, out: &mut [u8]) {
        let addr = match addr.checked_range(out.len(), self.universe_count) {
            Ok(addr) => addr,
            Err(e) => {
                debug_assert!(false, "invalid range read: {e}");
                log::warn!("range read ignored: {e}");
                out.fill(0);
                return;
            }
        };

        let blackout = self.blackout.lock();
        if let Some(store) = blackout.as_ref() {
            let buffer = store.values[addr.universe()].as_slice();
            out.copy_from_slice(&buffer[addr.channel()..addr.channel() + out.len()]);
            return;
        }

        let patches = self.patches.read();
        let patch = patches[addr.universe()];
        let plugins = self.plugins.lock();
        if let Some(plugin) = plugins.get(patch.plugin) {
            if let Err(e) = plugin.read_range(patch.line, addr.channel(), out) {
                log::warn!("range read failed: {e}");
                out.fill(0);
            }
        } else {
            out.fill(0);
        }
    }

    /// Bulk write starting at `addr`; must not span a universe boundary
    ///
    /// Invalid ranges log a warning and are a no-op.
    pub fn set_value_range(&self, addr: Address, values: &[u8]) {
        let addr = match addr.checked_range(values.len(), self.universe_count) {
            Ok(addr) => addr,
            Err(e) => {
                debug_assert!(false, "invalid range write: {e}");
                log::warn!("range write ignored: {e}");
                return;
            }
        };

        let mut blackout = self.blackout.lock();
        if let Some(store) = blackout.as_mut() {
            store.values[addr.universe()].set_range(addr.channel(), values);
            return;
        }

        let patches = self.patches.read();
        let patch = patches[addr.universe()];
        let mut plugins = self.plugins.lock();
        if let Some(plugin) = plugins.get_mut(patch.plugin) {
            if let Err(e) = plugin.write_range(patch.line, addr.channel(), values) {
                log::warn!("range write failed: {e}");
            }
        }
    }

    // ═══════════════════════════════════════════════════════════════════════
    // PER-TICK LEASE + FLUSH
    // ═══════════════════════════════════════════════════════════════════════

    /// Claim the exclusive per-tick write lease on all universe buffers
    ///
    /// Exactly one writer (the scheduler) holds the lease for one tick's
    /// whole function pass; dropping it releases the buffers.
    pub fn claim_universes(&self) -> UniverseLease<'_> {
        UniverseLease {
            buffers: self.buffers.lock(),
        }
    }

    /// Flush every universe buffer to its bound plugin
    ///
    /// Called once per tick, also for silent all-zero ticks. While
    /// blackout is active the flush is suppressed: plugin outputs were
    /// zeroed at blackout-on and stay zero until blackout-off.
    pub fn dump_universes(&self) {
        let blackout = self.blackout.lock();
        if blackout.is_some() {
            return;
        }

        let buffers = self.buffers.lock();
        let patches = self.patches.read();
        let mut plugins = self.plugins.lock();

        for (universe, buffer) in buffers.iter().enumerate() {
            let patch = patches[universe];
            if let Some(plugin) = plugins.get_mut(patch.plugin) {
                if let Err(e) = plugin.write_range(patch.line, 0, buffer.as_slice()) {
                    log::warn!("universe {universe} flush failed: {e}");
                }
            }
        }
    }

    // ═══════════════════════════════════════════════════════════════════════
    // BLACKOUT
    // ═══════════════════════════════════════════════════════════════════════

    /// Whether blackout is currently active
    pub fn blackout(&self) -> bool {
        self.blackout.lock().is_some()
    }

    /// Toggle the global blackout override
    ///
    /// Enabling snapshots all live values and zeroes every plugin output;
    /// disabling writes the stored values back. Toggling to the current
    /// state is a no-op, so repeated calls are idempotent.
    pub fn set_blackout(&self, active: bool) {
        let mut blackout = self.blackout.lock();
        if active == blackout.is_some() {
            return;
        }

        let patches = self.patches.read();
        let mut plugins = self.plugins.lock();

        if active {
            let mut store = BlackoutStore::new(self.universe_count);
            let zeros = [0u8; UNIVERSE_CHANNELS];

            for universe in 0..self.universe_count {
                let patch = patches[universe];
                if let Some(plugin) = plugins.get_mut(patch.plugin) {
                    let snapshot = store.values[universe].as_mut_slice();
                    if let Err(e) = plugin.read_range(patch.line, 0, snapshot) {
                        log::warn!("blackout snapshot failed for universe {universe}: {e}");
                    }
                    if let Err(e) = plugin.write_range(patch.line, 0, &zeros) {
                        log::warn!("blackout zeroing failed for universe {universe}: {e}");
                    }
                }
            }

            *blackout = Some(store);
            log::info!("blackout enabled");
        } else if let Some(store) = blackout.take() {
            for universe in 0..self.universe_count {
                let patch = patches[universe];
                if let Some(plugin) = plugins.get_mut(patch.plugin) {
                    let restored = store.values[universe].as_slice();
                    if let Err(e) = plugin.write_range(patch.line, 0, restored) {
                        log::warn!("blackout restore failed for universe {universe}: {e}");
                    }
                }
            }

            log::info!("blackout disabled");
        }
    }
}
