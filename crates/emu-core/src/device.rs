//! Peripheral collaborator traits.

use crate::{Cycles, Speed};

/// What a device reports after being stepped.
#[must_use]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Step {
    /// Nothing the scheduler needs to act on.
    #[default]
    Idle,
    /// A complete displayable frame was produced during this step.
    FrameBoundary,
}

impl Step {
    #[must_use]
    pub const fn is_frame_boundary(self) -> bool {
        matches!(self, Self::FrameBoundary)
    }
}

/// A peripheral advanced by a delta of elapsed CPU cycles.
///
/// Every device in an iteration receives the same delta. A step must not
/// depend on any other device having been stepped first in that iteration,
/// and must absorb its own anomalies (clamp, saturate, drop) rather than
/// fail.
pub trait Device {
    /// Advance by `delta` CPU cycles at the given CPU clock rate.
    fn step(&mut self, speed: Speed, delta: Cycles) -> Step;

    /// Return internal state to its documented post-reset values.
    fn reset(&mut self);

    /// Level of this device's interrupt request line.
    ///
    /// The line must already encode "requesting"; callers only combine.
    fn irq_asserted(&self) -> bool {
        false
    }
}

/// A peripheral that must observe every single cycle.
///
/// Bus-protocol controllers sample their lines on each clock edge, so
/// stepping them in bulk would skip transitions.
pub trait EdgeDevice {
    /// Advance by exactly one CPU cycle.
    fn step_one_cycle(&mut self);

    /// Return internal state to its documented post-reset values.
    fn reset(&mut self);
}

/// A mutable handle to either kind of device.
///
/// Lets a machine keep one ordered list of devices while still stepping
/// each at its native granularity.
pub enum DeviceMut<'a> {
    Batch(&'a mut dyn Device),
    Edge(&'a mut dyn EdgeDevice),
}

impl DeviceMut<'_> {
    /// Advance the device by `delta` cycles.
    ///
    /// Edge devices are stepped `delta` times, one cycle at a time. This is
    /// never folded into a single call.
    pub fn advance(self, speed: Speed, delta: Cycles) -> Step {
        match self {
            Self::Batch(device) => device.step(speed, delta),
            Self::Edge(device) => {
                for _ in 0..delta.get() {
                    device.step_one_cycle();
                }
                Step::Idle
            }
        }
    }

    pub fn reset(self) {
        match self {
            Self::Batch(device) => device.reset(),
            Self::Edge(device) => device.reset(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Counter {
        batches: u32,
        total: u64,
    }

    impl Device for Counter {
        fn step(&mut self, _speed: Speed, delta: Cycles) -> Step {
            self.batches += 1;
            self.total += u64::from(delta.get());
            Step::Idle
        }

        fn reset(&mut self) {
            *self = Self::default();
        }
    }

    #[derive(Default)]
    struct EdgeCounter {
        edges: u64,
    }

    impl EdgeDevice for EdgeCounter {
        fn step_one_cycle(&mut self) {
            self.edges += 1;
        }

        fn reset(&mut self) {
            self.edges = 0;
        }
    }

    #[test]
    fn batch_device_gets_one_call() {
        let mut device = Counter::default();
        let _ = DeviceMut::Batch(&mut device).advance(Speed::DEFAULT, Cycles(9));
        assert_eq!(device.batches, 1);
        assert_eq!(device.total, 9);
    }

    #[test]
    fn edge_device_gets_every_cycle() {
        let mut device = EdgeCounter::default();
        let step = DeviceMut::Edge(&mut device).advance(Speed::DEFAULT, Cycles(9));
        assert_eq!(step, Step::Idle);
        assert_eq!(device.edges, 9);
        DeviceMut::Edge(&mut device).reset();
        assert_eq!(device.edges, 0);
    }

    #[test]
    fn default_irq_line_is_clear() {
        assert!(!Counter::default().irq_asserted());
    }
}
