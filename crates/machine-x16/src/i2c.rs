//! I2C bus between VIA1 (controller) and the SMC and RTC (targets).
//!
//! The bus is a protocol state machine driven by line edges: START and STOP
//! are SDA transitions while SCL is high, data bits are sampled on SCL
//! rising edges and the target changes SDA only while SCL is low. Because
//! every edge matters, the bus is an `EdgeDevice` and is stepped once per
//! CPU cycle rather than in bulk.

use emu_core::EdgeDevice;

use crate::rtc::Rtc;
use crate::smc::Smc;

pub const SMC_ADDRESS: u8 = 0x42;
pub const RTC_ADDRESS: u8 = 0x6F;

/// A register-addressed device on the I2C bus.
pub trait I2cTarget {
    fn read_register(&mut self, reg: u8) -> u8;
    fn write_register(&mut self, reg: u8, value: u8);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Waiting for START.
    Idle,
    /// Shifting in a byte from the controller.
    Receive,
    /// Byte complete; the answer goes on SDA at the next falling edge.
    Ack { ack: bool },
    /// Answer held through the ninth clock.
    AckHeld { ack: bool },
    /// Shifting out a byte to the controller.
    Transmit,
    /// Byte sent; the controller answers on the ninth clock.
    AwaitAck,
    /// Controller acknowledged; the next byte starts at the falling edge.
    NextByte,
}

pub struct I2cBus {
    scl: bool,
    /// SDA as driven by the controller (true = released).
    sda_controller: bool,
    /// SDA as driven by the addressed target (true = released).
    sda_target: bool,
    prev_scl: bool,
    prev_sda: bool,

    state: State,
    shift: u8,
    bits: u8,
    target: Option<u8>,
    reading: bool,
    /// Register pointer; survives a repeated START, cleared by STOP.
    register: Option<u8>,

    pub smc: Smc,
    pub rtc: Rtc,

    cycles: u64,
}

impl Default for I2cBus {
    fn default() -> Self {
        Self::new()
    }
}

impl I2cBus {
    #[must_use]
    pub fn new() -> Self {
        Self {
            scl: true,
            sda_controller: true,
            sda_target: true,
            prev_scl: true,
            prev_sda: true,
            state: State::Idle,
            shift: 0,
            bits: 0,
            target: None,
            reading: false,
            register: None,
            smc: Smc::new(),
            rtc: Rtc::new(),
            cycles: 0,
        }
    }

    /// Set the levels the controller drives. Sampled on the next cycle.
    pub fn set_lines(&mut self, sda: bool, scl: bool) {
        self.sda_controller = sda;
        self.scl = scl;
    }

    /// Wired-AND SDA level.
    #[must_use]
    pub fn sda(&self) -> bool {
        self.sda_controller && self.sda_target
    }

    #[must_use]
    pub fn scl(&self) -> bool {
        self.scl
    }

    /// A transaction is in progress.
    #[must_use]
    pub fn busy(&self) -> bool {
        self.state != State::Idle
    }

    /// Cycles observed since power-on.
    #[must_use]
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    fn start(&mut self) {
        self.state = State::Receive;
        self.shift = 0;
        self.bits = 0;
        self.target = None;
        self.reading = false;
        self.sda_target = true;
    }

    fn stop(&mut self) {
        self.state = State::Idle;
        self.target = None;
        self.register = None;
        self.sda_target = true;
    }

    fn target_mut(&mut self, address: u8) -> &mut dyn I2cTarget {
        if address == SMC_ADDRESS {
            &mut self.smc
        } else {
            &mut self.rtc
        }
    }

    /// Handle a complete byte from the controller; returns ACK.
    fn byte_received(&mut self, byte: u8) -> bool {
        let Some(address) = self.target else {
            let address = byte >> 1;
            if address != SMC_ADDRESS && address != RTC_ADDRESS {
                return false;
            }
            self.target = Some(address);
            self.reading = byte & 0x01 != 0;
            return true;
        };

        match self.register {
            None => self.register = Some(byte),
            Some(reg) => {
                self.target_mut(address).write_register(reg, byte);
                self.register = Some(reg.wrapping_add(1));
            }
        }
        true
    }

    /// Fetch the next byte for the controller and put its first bit on SDA.
    fn load_next_byte(&mut self) {
        let reg = self.register.unwrap_or(0);
        let byte = match self.target {
            Some(address) => self.target_mut(address).read_register(reg),
            None => 0xFF,
        };
        self.register = Some(reg.wrapping_add(1));
        self.shift = byte;
        self.bits = 0;
        self.sda_target = byte & 0x80 != 0;
        self.state = State::Transmit;
    }

    fn clock_rise(&mut self, sda: bool) {
        match self.state {
            State::Receive => {
                self.shift = (self.shift << 1) | u8::from(sda);
                self.bits += 1;
                if self.bits == 8 {
                    let ack = self.byte_received(self.shift);
                    self.state = State::Ack { ack };
                }
            }
            State::Transmit => self.bits += 1,
            State::AwaitAck => {
                self.state = if sda { State::Idle } else { State::NextByte };
            }
            _ => {}
        }
    }

    fn clock_fall(&mut self) {
        match self.state {
            State::Ack { ack } => {
                self.sda_target = !ack;
                self.state = State::AckHeld { ack };
            }
            State::AckHeld { ack } => {
                self.sda_target = true;
                if !ack {
                    self.state = State::Idle;
                } else if self.reading {
                    self.load_next_byte();
                } else {
                    self.state = State::Receive;
                    self.shift = 0;
                    self.bits = 0;
                }
            }
            State::Transmit => {
                if self.bits == 8 {
                    self.sda_target = true;
                    self.state = State::AwaitAck;
                } else {
                    self.sda_target = self.shift & (0x80 >> self.bits) != 0;
                }
            }
            State::NextByte => self.load_next_byte(),
            _ => {}
        }
    }
}

impl EdgeDevice for I2cBus {
    fn step_one_cycle(&mut self) {
        self.cycles += 1;
        let scl = self.scl;
        let sda = self.sda();

        if scl && self.prev_scl {
            if self.prev_sda && !sda {
                self.start();
            } else if !self.prev_sda && sda {
                self.stop();
            }
        } else if scl {
            self.clock_rise(sda);
        } else if self.prev_scl {
            self.clock_fall();
        }

        self.prev_scl = scl;
        self.prev_sda = self.sda();
    }

    /// Abandons any transaction, releases both lines and resets the SMC.
    /// The RTC is battery-backed and keeps running.
    fn reset(&mut self) {
        self.scl = true;
        self.sda_controller = true;
        self.sda_target = true;
        self.prev_scl = true;
        self.prev_sda = true;
        self.state = State::Idle;
        self.shift = 0;
        self.bits = 0;
        self.target = None;
        self.reading = false;
        self.register = None;
        self.smc.reset();
    }
}
