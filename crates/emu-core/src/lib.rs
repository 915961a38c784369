//! Core traits and types for cycle-driven co-simulation.
//!
//! The CPU is the only clock. Every other component learns how much time
//! has passed from the cycles the CPU retired, and nothing keeps a clock
//! of its own that could drift.

mod bus;
mod clock;
mod cpu;
mod cycles;
mod device;
mod observable;

pub use bus::Bus;
pub use clock::{ClockDomain, Speed};
pub use cpu::Cpu;
pub use cycles::Cycles;
pub use device::{Device, DeviceMut, EdgeDevice, Step};
pub use observable::{Observable, Value, parse_address};
