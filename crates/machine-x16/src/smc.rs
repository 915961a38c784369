//! System management controller: power, reset and NMI requests.
//!
//! Sits on the I2C bus at `$42`. Requests are latched here and consumed by
//! the scheduler at the top of its next iteration.

use crate::i2c::I2cTarget;

pub const REG_POWER: u8 = 0x01;
pub const REG_NMI: u8 = 0x02;
pub const REG_ACTIVITY_LED: u8 = 0x05;

const POWER_OFF: u8 = 0x00;
const POWER_RESET: u8 = 0x01;
const NMI_TRIGGER: u8 = 0x00;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Smc {
    reset_requested: bool,
    nmi_requested: bool,
    power_off_requested: bool,
    activity_led: u8,
}

impl Smc {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The reset button.
    pub fn request_reset(&mut self) {
        self.reset_requested = true;
    }

    /// The NMI button.
    pub fn request_nmi(&mut self) {
        self.nmi_requested = true;
    }

    /// Consume a pending reset request.
    pub fn take_reset_request(&mut self) -> bool {
        std::mem::take(&mut self.reset_requested)
    }

    /// Consume a pending NMI request.
    pub fn take_nmi_request(&mut self) -> bool {
        std::mem::take(&mut self.nmi_requested)
    }

    #[must_use]
    pub fn reset_pending(&self) -> bool {
        self.reset_requested
    }

    #[must_use]
    pub fn power_off_requested(&self) -> bool {
        self.power_off_requested
    }

    #[must_use]
    pub fn activity_led(&self) -> u8 {
        self.activity_led
    }

    /// Clears pending NMI and power-off requests and the LED. A reset
    /// request raised after the reset began is kept.
    pub fn reset(&mut self) {
        self.nmi_requested = false;
        self.power_off_requested = false;
        self.activity_led = 0;
    }
}

impl I2cTarget for Smc {
    fn read_register(&mut self, reg: u8) -> u8 {
        match reg {
            REG_ACTIVITY_LED => self.activity_led,
            _ => 0,
        }
    }

    fn write_register(&mut self, reg: u8, value: u8) {
        match (reg, value) {
            (REG_POWER, POWER_OFF) => self.power_off_requested = true,
            (REG_POWER, POWER_RESET) => self.reset_requested = true,
            (REG_NMI, NMI_TRIGGER) => self.nmi_requested = true,
            (REG_ACTIVITY_LED, led) => self.activity_led = led,
            // Unknown commands are ignored.
            _ => {}
        }
    }
}
