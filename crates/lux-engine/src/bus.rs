//! Shared timing-value registry
//!
//! Process-wide set of named scalar time bases, in ticks. Running
//! functions consult these for fade and hold curves; UI and tap-tempo
//! actions mutate them. Values are atomics so the scheduler thread reads
//! them mid-tick without taking a lock.

use std::sync::atomic::{AtomicU32, Ordering};

use crossbeam_channel::{Receiver, Sender, unbounded};
use parking_lot::{Mutex, RwLock};

/// Number of bus entries, fixed for the process lifetime
pub const BUS_COUNT: usize = 32;

/// Bus identifier
pub type BusId = usize;

/// Default fade-time bus
pub const BUS_FADE: BusId = 0;
/// Default hold-time bus
pub const BUS_HOLD: BusId = 1;

/// Bus change notifications
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BusEvent {
    ValueChanged { id: BusId, value: u32 },
    NameChanged { id: BusId, name: String },
    Tapped { id: BusId },
}

struct BusEntry {
    value: AtomicU32,
    name: RwLock<String>,
}

/// Registry of named timing values
pub struct Bus {
    entries: Vec<BusEntry>,
    subscribers: Mutex<Vec<Sender<BusEvent>>>,
}

impl Bus {
    pub fn new() -> Self {
        let entries = (0..BUS_COUNT)
            .map(|id| {
                let name = match id {
                    BUS_FADE => "Fade".to_string(),
                    BUS_HOLD => "Hold".to_string(),
                    _ => format!("Bus {}", id + 1),
                };
                BusEntry {
                    value: AtomicU32::new(0),
                    name: RwLock::new(name),
                }
            })
            .collect();

        Self {
            entries,
            subscribers: Mutex::new(Vec::new()),
        }
    }

    /// Current value of a bus, 0 for an invalid id
    #[inline]
    pub fn value(&self, id: BusId) -> u32 {
        self.entries
            .get(id)
            .map(|entry| entry.value.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    /// Set a bus value; broadcasts the change, false for an invalid id
    pub fn set_value(&self, id: BusId, value: u32) -> bool {
        let Some(entry) = self.entries.get(id) else {
            log::warn!("bus write ignored: invalid id {id}");
            return false;
        };
        entry.value.store(value, Ordering::Relaxed);
        self.broadcast(BusEvent::ValueChanged { id, value });
        true
    }

    /// Current name of a bus
    pub fn name(&self, id: BusId) -> Option<String> {
        self.entries.get(id).map(|entry| entry.name.read().clone())
    }

    /// Rename a bus; broadcasts the change, false for an invalid id
    pub fn set_name(&self, id: BusId, name: impl Into<String>) -> bool {
        let Some(entry) = self.entries.get(id) else {
            log::warn!("bus rename ignored: invalid id {id}");
            return false;
        };
        let name = name.into();
        *entry.name.write() = name.clone();
        self.broadcast(BusEvent::NameChanged { id, name });
        true
    }

    /// Fire a tempo-tap notification; false only for an invalid id
    pub fn tap(&self, id: BusId) -> bool {
        if id >= self.entries.len() {
            log::warn!("bus tap ignored: invalid id {id}");
            return false;
        }
        self.broadcast(BusEvent::Tapped { id });
        true
    }

    /// Subscribe to bus change notifications
    pub fn subscribe(&self) -> Receiver<BusEvent> {
        let (tx, rx) = unbounded();
        self.subscribers.lock().push(tx);
        rx
    }

    fn broadcast(&self, event: BusEvent) {
        self.subscribers
            .lock()
            .retain(|tx| tx.send(event.clone()).is_ok());
    }
}

impl Default for Bus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_names() {
        let bus = Bus::new();
        assert_eq!(bus.name(BUS_FADE).unwrap(), "Fade");
        assert_eq!(bus.name(BUS_HOLD).unwrap(), "Hold");
        assert_eq!(bus.name(2).unwrap(), "Bus 3");
        assert!(bus.name(BUS_COUNT).is_none());
    }

    #[test]
    fn test_value_round_trip() {
        let bus = Bus::new();
        assert_eq!(bus.value(BUS_FADE), 0);

        assert!(bus.set_value(BUS_FADE, 64));
        assert_eq!(bus.value(BUS_FADE), 64);
    }

    #[test]
    fn test_invalid_ids_rejected() {
        let bus = Bus::new();
        assert!(!bus.set_value(BUS_COUNT, 1));
        assert!(!bus.set_name(BUS_COUNT, "nope"));
        assert!(!bus.tap(BUS_COUNT));
        assert_eq!(bus.value(BUS_COUNT), 0);
    }

    #[test]
    fn test_change_notifications() {
        let bus = Bus::new();
        let rx = bus.subscribe();

        bus.set_value(3, 10);
        bus.tap(BUS_FADE);
        bus.set_name(3, "Chase");

        assert_eq!(
            rx.try_recv().unwrap(),
            BusEvent::ValueChanged { id: 3, value: 10 }
        );
        assert_eq!(rx.try_recv().unwrap(), BusEvent::Tapped { id: BUS_FADE });
        assert_eq!(
            rx.try_recv().unwrap(),
            BusEvent::NameChanged {
                id: 3,
                name: "Chase".to_string()
            }
        );
    }

    #[test]
    fn test_dropped_subscriber_is_pruned() {
        let bus = Bus::new();
        drop(bus.subscribe());

        // broadcast after the receiver is gone must not error or leak
        assert!(bus.set_value(0, 1));
        assert!(bus.tap(0));
    }
}
