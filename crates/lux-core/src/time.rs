//! Scheduler time base

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Elapsed scheduler cycles
pub type Ticks = u64;

/// Supported scheduler tick rates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u32)]
pub enum TickFrequency {
    Hz32 = 32,
    Hz50 = 50,
    Hz64 = 64,
    Hz100 = 100,
    Hz128 = 128,
}

impl TickFrequency {
    #[inline]
    pub fn as_u32(self) -> u32 {
        self as u32
    }

    #[inline]
    pub fn as_f64(self) -> f64 {
        self as u32 as f64
    }

    /// Duration of one tick
    #[inline]
    pub fn interval(self) -> Duration {
        Duration::from_secs_f64(1.0 / self.as_f64())
    }

    /// Ticks covering the given wall-clock duration, rounded down
    #[inline]
    pub fn ticks_in(self, duration: Duration) -> Ticks {
        (duration.as_secs_f64() * self.as_f64()) as Ticks
    }
}

impl Default for TickFrequency {
    fn default() -> Self {
        Self::Hz64
    }
}
