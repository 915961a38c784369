//! CPU clock speed and the elapsed-cycle bookkeeping built on it.

use crate::{Cpu, Cycles};

/// CPU clock rate in whole MHz (the "speed" setting).
///
/// Devices with their own native time base (raster dots, SPI bits, audio
/// samples, seconds) use this to translate CPU cycles into their units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Speed {
    mhz: u8,
}

impl Speed {
    /// Stock 8 MHz.
    pub const DEFAULT: Self = Self { mhz: 8 };

    /// A zero rate is raised to 1 MHz; every consumer divides by it.
    #[must_use]
    pub const fn from_mhz(mhz: u8) -> Self {
        Self {
            mhz: if mhz == 0 { 1 } else { mhz },
        }
    }

    #[must_use]
    pub const fn mhz(self) -> u8 {
        self.mhz
    }

    /// CPU cycles per simulated second.
    #[must_use]
    pub const fn cycles_per_second(self) -> u64 {
        self.mhz as u64 * 1_000_000
    }
}

impl Default for Speed {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Tracks how many cycles the CPU retired since the previous iteration.
///
/// Holds nothing but a bookmark: the last counter value it saw. The delta it
/// hands out is the one unit of time every device receives in an iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockDomain {
    previous: Cycles,
    last_delta: Cycles,
}

impl ClockDomain {
    /// Start counting from the given counter reading.
    #[must_use]
    pub const fn new(now: Cycles) -> Self {
        Self {
            previous: now,
            last_delta: Cycles::ZERO,
        }
    }

    /// Cycles elapsed since the previous call, given the counter now.
    pub fn advance(&mut self, now: Cycles) -> Cycles {
        let delta = now.since(self.previous);
        self.previous = now;
        self.last_delta = delta;
        delta
    }

    /// Read the CPU's cumulative counter and return the elapsed delta.
    pub fn elapsed_cycles<C: Cpu + ?Sized>(&mut self, cpu: &C) -> Cycles {
        self.advance(cpu.cycles())
    }

    /// Counter value recorded at the end of the last iteration.
    #[must_use]
    pub const fn previous(&self) -> Cycles {
        self.previous
    }

    /// Delta returned by the most recent `advance`.
    #[must_use]
    pub const fn last_delta(&self) -> Cycles {
        self.last_delta
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_mhz_is_clamped() {
        assert_eq!(Speed::from_mhz(0).mhz(), 1);
        assert_eq!(Speed::from_mhz(8).cycles_per_second(), 8_000_000);
    }

    #[test]
    fn deltas_sum_to_total_elapsed() {
        let costs = [2u32, 7, 3, 4, 6, 2, 5];
        let mut counter = Cycles(u32::MAX - 10);
        let mut clock = ClockDomain::new(counter);
        let mut total = 0u64;
        for cost in costs {
            counter += Cycles(cost);
            total += u64::from(clock.advance(counter).get());
        }
        assert_eq!(total, costs.iter().map(|&c| u64::from(c)).sum::<u64>());
        assert_eq!(clock.previous(), counter);
        assert_eq!(clock.last_delta(), Cycles(5));
    }

    #[test]
    fn advance_without_progress_is_zero() {
        let mut clock = ClockDomain::new(Cycles(42));
        assert_eq!(clock.advance(Cycles(42)), Cycles::ZERO);
    }
}
