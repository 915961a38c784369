//! MOS 6522 Versatile Interface Adapter (VIA).
//!
//! Two 8-bit ports, two 16-bit timers, a shift register and an interrupt
//! controller. The chip is stepped in bulk: a timer advanced by N cycles
//! ends in exactly the state N single-cycle decrements would leave it in.
//!
//! | Reg | Read                          | Write                         |
//! |-----|-------------------------------|-------------------------------|
//! | $0  | port B (clears CB1/CB2)       | ORB                           |
//! | $1  | port A (clears CA1/CA2)       | ORA (clears CA1/CA2)          |
//! | $2  | DDRB                          | DDRB                          |
//! | $3  | DDRA                          | DDRA                          |
//! | $4  | T1 counter low (clears T1)    | T1 latch low                  |
//! | $5  | T1 counter high               | T1 latch high, load, start    |
//! | $6  | T1 latch low                  | T1 latch low                  |
//! | $7  | T1 latch high                 | T1 latch high (clears T1)     |
//! | $8  | T2 counter low (clears T2)    | T2 latch low                  |
//! | $9  | T2 counter high               | T2 counter high, load, start  |
//! | $A  | SR                            | SR                            |
//! | $B  | ACR                           | ACR                           |
//! | $C  | PCR                           | PCR                           |
//! | $D  | IFR (bit 7 = any enabled)     | IFR, write 1 to clear         |
//! | $E  | IER (bit 7 reads as 1)        | IER, bit 7 selects set/clear  |
//! | $F  | port A, no handshake          | ORA, no handshake             |

use emu_core::{Cycles, Device, Speed, Step};

pub const IFR_CA2: u8 = 0x01;
pub const IFR_CA1: u8 = 0x02;
pub const IFR_SR: u8 = 0x04;
pub const IFR_CB2: u8 = 0x08;
pub const IFR_CB1: u8 = 0x10;
pub const IFR_T2: u8 = 0x20;
pub const IFR_T1: u8 = 0x40;

/// ACR bit 6: T1 free-run (reload from latch on underflow).
const ACR_T1_FREE_RUN: u8 = 0x40;
/// ACR bit 5: T2 counts PB6 pulses instead of clock cycles.
const ACR_T2_PULSE_COUNT: u8 = 0x20;

/// One 6522.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Via {
    port_a: u8,
    port_b: u8,
    ddr_a: u8,
    ddr_b: u8,
    /// Levels driven onto port A by the outside world.
    pub external_a: u8,
    /// Levels driven onto port B by the outside world.
    pub external_b: u8,

    t1_counter: u16,
    t1_latch: u16,
    /// T1 will raise its flag on the next underflow.
    t1_armed: bool,

    t2_counter: u16,
    t2_latch_lo: u8,
    t2_armed: bool,

    sr: u8,
    acr: u8,
    pcr: u8,
    ifr: u8,
    ier: u8,
}

impl Default for Via {
    fn default() -> Self {
        Self::new()
    }
}

impl Via {
    #[must_use]
    pub fn new() -> Self {
        Self {
            port_a: 0,
            port_b: 0,
            ddr_a: 0,
            ddr_b: 0,
            external_a: 0xFF,
            external_b: 0xFF,
            t1_counter: 0xFFFF,
            t1_latch: 0xFFFF,
            t1_armed: false,
            t2_counter: 0xFFFF,
            t2_latch_lo: 0xFF,
            t2_armed: false,
            sr: 0,
            acr: 0,
            pcr: 0,
            ifr: 0,
            ier: 0,
        }
    }

    pub fn read(&mut self, reg: u8) -> u8 {
        match reg & 0x0F {
            0x00 => {
                self.ifr &= !(IFR_CB1 | IFR_CB2);
                self.read_port_b()
            }
            0x01 => {
                self.ifr &= !(IFR_CA1 | IFR_CA2);
                self.read_port_a()
            }
            0x02 => self.ddr_b,
            0x03 => self.ddr_a,
            0x04 => {
                self.ifr &= !IFR_T1;
                self.t1_counter as u8
            }
            0x05 => (self.t1_counter >> 8) as u8,
            0x06 => self.t1_latch as u8,
            0x07 => (self.t1_latch >> 8) as u8,
            0x08 => {
                self.ifr &= !IFR_T2;
                self.t2_counter as u8
            }
            0x09 => (self.t2_counter >> 8) as u8,
            0x0A => self.sr,
            0x0B => self.acr,
            0x0C => self.pcr,
            0x0D => {
                let any = if self.irq_asserted() { 0x80 } else { 0 };
                self.ifr | any
            }
            0x0E => self.ier | 0x80,
            _ => self.read_port_a(),
        }
    }

    pub fn write(&mut self, reg: u8, value: u8) {
        match reg & 0x0F {
            0x00 => self.port_b = value,
            0x01 => {
                self.ifr &= !(IFR_CA1 | IFR_CA2);
                self.port_a = value;
            }
            0x02 => self.ddr_b = value,
            0x03 => self.ddr_a = value,
            0x04 | 0x06 => self.t1_latch = (self.t1_latch & 0xFF00) | u16::from(value),
            0x05 => {
                self.t1_latch = (self.t1_latch & 0x00FF) | (u16::from(value) << 8);
                self.t1_counter = self.t1_latch;
                self.ifr &= !IFR_T1;
                self.t1_armed = true;
            }
            0x07 => {
                self.t1_latch = (self.t1_latch & 0x00FF) | (u16::from(value) << 8);
                self.ifr &= !IFR_T1;
            }
            0x08 => self.t2_latch_lo = value,
            0x09 => {
                self.t2_counter = (u16::from(value) << 8) | u16::from(self.t2_latch_lo);
                self.ifr &= !IFR_T2;
                self.t2_armed = true;
            }
            0x0A => self.sr = value,
            0x0B => self.acr = value,
            0x0C => self.pcr = value,
            0x0D => self.ifr &= !(value & 0x7F),
            0x0E => {
                if value & 0x80 != 0 {
                    self.ier |= value & 0x7F;
                } else {
                    self.ier &= !(value & 0x7F);
                }
            }
            _ => self.port_a = value,
        }
    }

    /// Raise interrupt flags from an external source (CA/CB lines, SR).
    pub fn raise(&mut self, flags: u8) {
        self.ifr |= flags & 0x7F;
    }

    /// Port A output register, before DDR masking.
    #[must_use]
    pub fn port_a(&self) -> u8 {
        self.port_a
    }

    #[must_use]
    pub fn ddr_a(&self) -> u8 {
        self.ddr_a
    }

    #[must_use]
    pub fn ifr(&self) -> u8 {
        self.ifr
    }

    #[must_use]
    pub fn ier(&self) -> u8 {
        self.ier
    }

    #[must_use]
    pub fn t1_counter(&self) -> u16 {
        self.t1_counter
    }

    #[must_use]
    pub fn t2_counter(&self) -> u16 {
        self.t2_counter
    }

    fn read_port_a(&self) -> u8 {
        (self.port_a & self.ddr_a) | (self.external_a & !self.ddr_a)
    }

    fn read_port_b(&self) -> u8 {
        (self.port_b & self.ddr_b) | (self.external_b & !self.ddr_b)
    }

    /// T1 decrements once per cycle. Decrementing from zero is an
    /// underflow: free-run reloads the latch, one-shot wraps to $FFFF.
    fn advance_t1(&mut self, delta: u32) {
        let counter = u64::from(self.t1_counter);
        let delta = u64::from(delta);
        if delta <= counter {
            self.t1_counter = (counter - delta) as u16;
            return;
        }

        if self.t1_armed {
            self.ifr |= IFR_T1;
        }

        if self.acr & ACR_T1_FREE_RUN != 0 {
            let period = u64::from(self.t1_latch) + 1;
            let after_first = delta - (counter + 1);
            self.t1_counter = (u64::from(self.t1_latch) - after_first % period) as u16;
        } else {
            self.t1_armed = false;
            self.t1_counter = self.t1_counter.wrapping_sub(delta as u16);
        }
    }

    /// T2 is always one-shot; in pulse-count mode the clock does not move it.
    fn advance_t2(&mut self, delta: u32) {
        if self.acr & ACR_T2_PULSE_COUNT != 0 {
            return;
        }
        if self.t2_armed && delta > u32::from(self.t2_counter) {
            self.t2_armed = false;
            self.ifr |= IFR_T2;
        }
        self.t2_counter = self.t2_counter.wrapping_sub(delta as u16);
    }
}

impl Device for Via {
    fn step(&mut self, _speed: Speed, delta: Cycles) -> Step {
        self.advance_t1(delta.get());
        self.advance_t2(delta.get());
        Step::Idle
    }

    /// Registers, ports and interrupt state clear; timers stop raising
    /// flags but keep their counts. External input levels are untouched.
    fn reset(&mut self) {
        self.port_a = 0;
        self.port_b = 0;
        self.ddr_a = 0;
        self.ddr_b = 0;
        self.t1_armed = false;
        self.t2_armed = false;
        self.sr = 0;
        self.acr = 0;
        self.pcr = 0;
        self.ifr = 0;
        self.ier = 0;
    }

    fn irq_asserted(&self) -> bool {
        self.ifr & self.ier & 0x7F != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step(via: &mut Via, cycles: u32) {
        let _ = via.step(Speed::DEFAULT, Cycles(cycles));
    }

    #[test]
    fn t1_one_shot_underflow() {
        let mut via = Via::new();
        via.write(0x04, 0x05);
        via.write(0x05, 0x00);
        step(&mut via, 5);
        assert_eq!(via.t1_counter(), 0);
        assert_eq!(via.ifr() & IFR_T1, 0);
        step(&mut via, 1);
        assert_ne!(via.ifr() & IFR_T1, 0);
        assert_eq!(via.t1_counter(), 0xFFFF);
    }

    #[test]
    fn t1_one_shot_fires_once() {
        let mut via = Via::new();
        via.write(0x04, 0x02);
        via.write(0x05, 0x00);
        step(&mut via, 3);
        via.write(0x0D, IFR_T1);
        step(&mut via, 0x2_0000);
        assert_eq!(via.ifr() & IFR_T1, 0);
    }

    #[test]
    fn t1_free_run_reloads() {
        let mut via = Via::new();
        via.write(0x0B, ACR_T1_FREE_RUN);
        via.write(0x04, 0x09);
        via.write(0x05, 0x00);
        // 10 cycles to the first underflow, then a 10-cycle period.
        step(&mut via, 10);
        assert_ne!(via.ifr() & IFR_T1, 0);
        assert_eq!(via.t1_counter(), 9);
        via.write(0x0D, IFR_T1);
        step(&mut via, 25);
        assert_ne!(via.ifr() & IFR_T1, 0);
        assert_eq!(via.t1_counter(), 4);
    }

    #[test]
    fn bulk_step_matches_single_cycles() {
        for acr in [0, ACR_T1_FREE_RUN] {
            let mut bulk = Via::new();
            bulk.write(0x0B, acr);
            bulk.write(0x04, 0x30);
            bulk.write(0x05, 0x01);
            bulk.write(0x08, 0x80);
            bulk.write(0x09, 0x00);
            let mut single = bulk.clone();

            for delta in [3u32, 700, 1, 129, 4_000, 65_536, 17] {
                step(&mut bulk, delta);
                for _ in 0..delta {
                    step(&mut single, 1);
                }
                assert_eq!(bulk, single, "diverged after delta {delta} (acr {acr:#04x})");
            }
        }
    }

    #[test]
    fn t2_one_shot_and_read_clears() {
        let mut via = Via::new();
        via.write(0x08, 0x03);
        via.write(0x09, 0x00);
        step(&mut via, 4);
        assert_ne!(via.ifr() & IFR_T2, 0);
        let _ = via.read(0x08);
        assert_eq!(via.ifr() & IFR_T2, 0);
    }

    #[test]
    fn t2_pulse_count_ignores_clock() {
        let mut via = Via::new();
        via.write(0x0B, ACR_T2_PULSE_COUNT);
        via.write(0x08, 0x03);
        via.write(0x09, 0x00);
        step(&mut via, 100);
        assert_eq!(via.t2_counter(), 3);
    }

    #[test]
    fn irq_requires_flag_and_enable() {
        let mut via = Via::new();
        via.raise(IFR_CA1);
        assert!(!via.irq_asserted());
        via.write(0x0E, 0x80 | IFR_CA1);
        assert!(via.irq_asserted());
        assert_eq!(via.read(0x0D), 0x80 | IFR_CA1);
        via.write(0x0E, IFR_CA1);
        assert!(!via.irq_asserted());
        assert_eq!(via.read(0x0E), 0x80);
    }

    #[test]
    fn ifr_write_clears_flags() {
        let mut via = Via::new();
        via.raise(IFR_T1 | IFR_T2);
        via.write(0x0D, IFR_T1);
        assert_eq!(via.ifr(), IFR_T2);
    }

    #[test]
    fn port_reads_merge_external_inputs() {
        let mut via = Via::new();
        via.write(0x03, 0xF0);
        via.write(0x01, 0xA5);
        via.external_a = 0x0C;
        assert_eq!(via.read(0x0F), 0xAC);
    }

    #[test]
    fn reset_clears_registers_but_not_counters() {
        let mut via = Via::new();
        via.write(0x03, 0xFF);
        via.write(0x0E, 0xFF);
        via.write(0x04, 0x10);
        via.write(0x05, 0x00);
        step(&mut via, 4);
        via.reset();
        assert_eq!(via.ddr_a(), 0);
        assert_eq!(via.ier(), 0);
        assert_eq!(via.ifr(), 0);
        assert_eq!(via.t1_counter(), 0x0C);
        step(&mut via, 0x100);
        assert_eq!(via.ifr(), 0);
    }
}
