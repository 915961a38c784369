//! Real-time clock with battery-backed NVRAM (I2C address `$6F`).
//!
//! Time advances with simulated CPU cycles, not host time, so runs stay
//! deterministic. Registers follow the MCP7940N layout for the fields
//! modelled: BCD seconds (bit 7 = oscillator running), minutes and hours
//! (24-hour), weekday, and 64 bytes of SRAM at `$20-$5F`.

use emu_core::{Cycles, Device, Speed, Step};

use crate::i2c::I2cTarget;

pub const REG_SECONDS: u8 = 0x00;
pub const REG_MINUTES: u8 = 0x01;
pub const REG_HOURS: u8 = 0x02;
pub const REG_WEEKDAY: u8 = 0x03;
pub const NVRAM_START: u8 = 0x20;
pub const NVRAM_LEN: usize = 64;

const OSCILLATOR_RUN: u8 = 0x80;
const SECONDS_PER_DAY: u64 = 86_400;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rtc {
    running: bool,
    /// Cycles into the current second.
    sub_second: u64,
    /// Seconds since midnight.
    time_of_day: u64,
    /// Day of week, 1-7.
    weekday: u8,
    nvram: [u8; NVRAM_LEN],
}

impl Default for Rtc {
    fn default() -> Self {
        Self::new()
    }
}

impl Rtc {
    /// A running clock at 00:00:00 on day 1.
    #[must_use]
    pub fn new() -> Self {
        Self {
            running: true,
            sub_second: 0,
            time_of_day: 0,
            weekday: 1,
            nvram: [0; NVRAM_LEN],
        }
    }

    /// Set the time of day. Out-of-range fields wrap.
    pub fn set_time(&mut self, hours: u8, minutes: u8, seconds: u8) {
        self.time_of_day = (u64::from(hours) * 3600 + u64::from(minutes) * 60 + u64::from(seconds))
            % SECONDS_PER_DAY;
        self.sub_second = 0;
    }

    #[must_use]
    pub fn hours(&self) -> u8 {
        (self.time_of_day / 3600) as u8
    }

    #[must_use]
    pub fn minutes(&self) -> u8 {
        (self.time_of_day / 60 % 60) as u8
    }

    #[must_use]
    pub fn seconds(&self) -> u8 {
        (self.time_of_day % 60) as u8
    }

    #[must_use]
    pub fn weekday(&self) -> u8 {
        self.weekday
    }

    #[must_use]
    pub fn running(&self) -> bool {
        self.running
    }

    fn advance_seconds(&mut self, seconds: u64) {
        let total = self.time_of_day + seconds;
        let days = total / SECONDS_PER_DAY;
        self.time_of_day = total % SECONDS_PER_DAY;
        self.weekday = ((u64::from(self.weekday) - 1 + days) % 7 + 1) as u8;
    }

    fn set_field(&mut self, unit: u64, modulus: u64, value: u64) {
        let current = self.time_of_day / unit % modulus;
        self.time_of_day = self.time_of_day - current * unit + (value % modulus) * unit;
    }
}

fn to_bcd(value: u8) -> u8 {
    ((value / 10) << 4) | (value % 10)
}

fn from_bcd(value: u8) -> u8 {
    (value >> 4) * 10 + (value & 0x0F)
}

impl Device for Rtc {
    fn step(&mut self, speed: Speed, delta: Cycles) -> Step {
        if self.running {
            let cycles_per_second = speed.cycles_per_second();
            self.sub_second += u64::from(delta.get());
            let seconds = self.sub_second / cycles_per_second;
            if seconds > 0 {
                self.sub_second %= cycles_per_second;
                self.advance_seconds(seconds);
            }
        }
        Step::Idle
    }

    /// Battery-backed: time and NVRAM survive a machine reset.
    fn reset(&mut self) {}
}

impl I2cTarget for Rtc {
    fn read_register(&mut self, reg: u8) -> u8 {
        match reg {
            REG_SECONDS => {
                let run = if self.running { OSCILLATOR_RUN } else { 0 };
                to_bcd(self.seconds()) | run
            }
            REG_MINUTES => to_bcd(self.minutes()),
            REG_HOURS => to_bcd(self.hours()),
            REG_WEEKDAY => self.weekday,
            r if (NVRAM_START..NVRAM_START + NVRAM_LEN as u8).contains(&r) => {
                self.nvram[usize::from(r - NVRAM_START)]
            }
            _ => 0,
        }
    }

    fn write_register(&mut self, reg: u8, value: u8) {
        match reg {
            REG_SECONDS => {
                self.running = value & OSCILLATOR_RUN != 0;
                self.set_field(1, 60, u64::from(from_bcd(value & 0x7F)));
                self.sub_second = 0;
            }
            REG_MINUTES => self.set_field(60, 60, u64::from(from_bcd(value & 0x7F))),
            REG_HOURS => self.set_field(3600, 24, u64::from(from_bcd(value & 0x3F))),
            REG_WEEKDAY => self.weekday = (value & 0x07).clamp(1, 7),
            r if (NVRAM_START..NVRAM_START + NVRAM_LEN as u8).contains(&r) => {
                self.nvram[usize::from(r - NVRAM_START)] = value;
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ticks_once_per_simulated_second() {
        let mut rtc = Rtc::new();
        let speed = Speed::from_mhz(8);
        let _ = rtc.step(speed, Cycles(7_999_999));
        assert_eq!(rtc.seconds(), 0);
        let _ = rtc.step(speed, Cycles(1));
        assert_eq!(rtc.seconds(), 1);
    }

    #[test]
    fn rolls_over_midnight_into_next_weekday() {
        let mut rtc = Rtc::new();
        rtc.set_time(23, 59, 59);
        let _ = rtc.step(Speed::from_mhz(1), Cycles(1_000_000));
        assert_eq!((rtc.hours(), rtc.minutes(), rtc.seconds()), (0, 0, 0));
        assert_eq!(rtc.weekday(), 2);
    }

    #[test]
    fn bcd_registers() {
        let mut rtc = Rtc::new();
        rtc.set_time(13, 45, 27);
        assert_eq!(rtc.read_register(REG_SECONDS), 0x80 | 0x27);
        assert_eq!(rtc.read_register(REG_MINUTES), 0x45);
        assert_eq!(rtc.read_register(REG_HOURS), 0x13);
        rtc.write_register(REG_MINUTES, 0x09);
        assert_eq!((rtc.hours(), rtc.minutes(), rtc.seconds()), (13, 9, 27));
    }

    #[test]
    fn stopped_oscillator_holds_time() {
        let mut rtc = Rtc::new();
        rtc.write_register(REG_SECONDS, 0x30);
        assert!(!rtc.running());
        let _ = rtc.step(Speed::from_mhz(1), Cycles(5_000_000));
        assert_eq!(rtc.seconds(), 30);
    }

    #[test]
    fn nvram_and_reset() {
        let mut rtc = Rtc::new();
        rtc.write_register(0x20, 0xAB);
        rtc.write_register(0x5F, 0xCD);
        rtc.set_time(1, 2, 3);
        rtc.reset();
        assert_eq!(rtc.read_register(0x20), 0xAB);
        assert_eq!(rtc.read_register(0x5F), 0xCD);
        assert_eq!(rtc.read_register(0x60), 0);
        assert_eq!(rtc.seconds(), 3);
    }
}
