//! Pressure model
//!
//! A scalar in [0, 1] combining memory and cache utilisation. Each
//! component is zero until its high-water fraction, then scales linearly
//! to 1.0 at full utilisation. The combined score weights memory 0.6 and
//! cache 0.4; reduction starts at 0.5 and stops below 0.3.

use std::sync::atomic::{AtomicU64, Ordering};

/// Host-fed heap gauge. The engine updates it from whatever memory
/// accounting the host has; tests set it directly.
#[derive(Debug, Default)]
pub struct MemorySignal {
    heap_used: AtomicU64,
    heap_total: AtomicU64,
}

impl MemorySignal {
    /// Zeroed signal.
    pub fn new() -> Self {
        Self::default()
    }

    /// Update the gauge.
    pub fn set(&self, used: u64, total: u64) {
        self.heap_used.store(used, Ordering::Relaxed);
        self.heap_total.store(total, Ordering::Relaxed);
    }

    /// heap_used / heap_total, zero when the total is unknown.
    pub fn fraction(&self) -> f64 {
        let total = self.heap_total.load(Ordering::Relaxed);
        if total == 0 {
            return 0.0;
        }
        self.heap_used.load(Ordering::Relaxed) as f64 / total as f64
    }
}

/// One pressure measurement.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PressureSample {
    pub memory: f64,
    pub cache: f64,
    pub combined: f64,
}

impl PressureSample {
    /// Which component drove this sample, for the reduction event.
    pub fn trigger(&self) -> String {
        if self.memory > 0.0 && self.cache > 0.0 {
            "combined".to_string()
        } else if self.memory > 0.0 {
            "memory_pressure".to_string()
        } else {
            "cache_pressure".to_string()
        }
    }
}

/// Scale a raw fraction against its high-water mark onto [0, 1].
fn scale(fraction: f64, high_water: f64) -> f64 {
    if fraction <= high_water {
        return 0.0;
    }
    if high_water >= 1.0 {
        return 1.0;
    }
    ((fraction - high_water) / (1.0 - high_water)).clamp(0.0, 1.0)
}

/// Combine the two scaled components.
pub fn combined_pressure(
    mem_fraction: f64,
    cache_fraction: f64,
    memory_high_water: f64,
    cache_high_water: f64,
) -> PressureSample {
    let memory = scale(mem_fraction, memory_high_water);
    let cache = scale(cache_fraction, cache_high_water);
    PressureSample {
        memory,
        cache,
        combined: 0.6 * memory + 0.4 * cache,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn below_high_water_is_zero() {
        let sample = combined_pressure(0.5, 0.5, 0.7, 0.6);
        assert_eq!(sample.combined, 0.0);
    }

    #[test]
    fn full_utilisation_saturates() {
        let sample = combined_pressure(1.0, 1.0, 0.7, 0.6);
        assert!((sample.memory - 1.0).abs() < 1e-9);
        assert!((sample.cache - 1.0).abs() < 1e-9);
        assert!((sample.combined - 1.0).abs() < 1e-9);
    }

    #[test]
    fn weights_are_point_six_point_four() {
        let sample = combined_pressure(1.0, 0.0, 0.7, 0.6);
        assert!((sample.combined - 0.6).abs() < 1e-9);
        let sample = combined_pressure(0.0, 1.0, 0.7, 0.6);
        assert!((sample.combined - 0.4).abs() < 1e-9);
    }

    #[test]
    fn trigger_names_the_dominant_component() {
        assert_eq!(
            combined_pressure(0.9, 0.0, 0.7, 0.6).trigger(),
            "memory_pressure"
        );
        assert_eq!(
            combined_pressure(0.0, 0.9, 0.7, 0.6).trigger(),
            "cache_pressure"
        );
        assert_eq!(combined_pressure(0.9, 0.9, 0.7, 0.6).trigger(), "combined");
    }

    #[test]
    fn unknown_total_reads_as_zero() {
        let signal = MemorySignal::new();
        assert_eq!(signal.fraction(), 0.0);
        signal.set(50, 100);
        assert!((signal.fraction() - 0.5).abs() < 1e-9);
    }
}
