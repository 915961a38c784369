//! Commander X16 co-simulation.
//!
//! The CPU's cumulative cycle counter is the machine's only clock. Each
//! scheduler iteration runs one instruction, measures the cycles it took,
//! and steps every peripheral by exactly that many cycles in a fixed
//! order. At 8 MHz a frame is 133,333⅓ cycles (25.2 MHz dot clock over an
//! 800×525 raster), accumulated exactly so 60 frames take 8,000,000
//! cycles.

pub mod audio;
mod bus;
pub mod capture;
mod config;
mod devices;
mod error;
mod frontend;
pub mod i2c;
mod interrupt;
pub mod midi;
pub mod rtc;
mod scheduler;
pub mod smc;
mod snapshot;
pub mod spi;
pub mod video;
mod workload;

pub use audio::{AudioMixer, AudioSink};
pub use bus::{ROM_SIZE, X16Bus};
pub use config::X16Config;
pub use devices::{Devices, I2C_SCL, I2C_SDA, RESET_ORDER, STEP_ORDER, Slot};
pub use error::{X16Error, X16Result};
pub use frontend::{AvInfo, Frontend, Host, Input, PixelFormat, SystemInfo};
pub use i2c::{I2cBus, I2cTarget};
pub use interrupt::{InterruptAggregator, any_asserted};
pub use midi::MidiUart;
pub use rtc::Rtc;
pub use scheduler::{RunStatus, Scheduler};
pub use smc::Smc;
pub use snapshot::{SNAPSHOT_SIZE, SessionState};
pub use spi::{SpiController, SpiTarget};
pub use mos_via_6522::Via;
pub use video::{Frame, Video, VideoSink};
pub use workload::{Flow, Instruction, WorkloadCpu};
