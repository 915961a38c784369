//! The fundamental unit of time.

/// A count of CPU cycles.
///
/// Serves both as the CPU's cumulative counter and as the delta between two
/// readings of it. The counter is 32 bits wide and wraps; arithmetic wraps
/// with it, so a delta taken across a rollover is still exact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Cycles(pub u32);

impl Cycles {
    pub const ZERO: Self = Self(0);

    #[must_use]
    pub const fn new(count: u32) -> Self {
        Self(count)
    }

    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }

    /// Cycles elapsed between an earlier reading and this one, modulo 2^32.
    #[must_use]
    pub const fn since(self, earlier: Self) -> Self {
        Self(self.0.wrapping_sub(earlier.0))
    }
}

impl From<u32> for Cycles {
    fn from(count: u32) -> Self {
        Self(count)
    }
}

impl core::ops::Add for Cycles {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self(self.0.wrapping_add(rhs.0))
    }
}

impl core::ops::AddAssign for Cycles {
    fn add_assign(&mut self, rhs: Self) {
        self.0 = self.0.wrapping_add(rhs.0);
    }
}

impl core::ops::Sub for Cycles {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        self.since(rhs)
    }
}
