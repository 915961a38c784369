//! MIDI card UART (16550 subset) at `$9F60`.
//!
//! Registers mirror every eight bytes. The baud generator divides a
//! 16 MHz crystal by 16 and the divisor latch; the default divisor gives
//! the MIDI rate of 31 250 baud. Transmit timing is modelled (one byte per
//! ten bit times) so software polling LSR sees realistic busy periods.
//! Received bytes come from the host and land in the FIFO immediately.

use std::collections::VecDeque;

use emu_core::{Cycles, Device, Speed, Step};

pub const REG_DATA: u8 = 0x00;
pub const REG_IER: u8 = 0x01;
pub const REG_IIR: u8 = 0x02;
pub const REG_LCR: u8 = 0x03;
pub const REG_MCR: u8 = 0x04;
pub const REG_LSR: u8 = 0x05;
pub const REG_MSR: u8 = 0x06;
pub const REG_SCR: u8 = 0x07;

pub const IER_RX_DATA: u8 = 0x01;
pub const IER_THR_EMPTY: u8 = 0x02;

pub const IIR_NONE: u8 = 0x01;
pub const IIR_THR_EMPTY: u8 = 0x02;
pub const IIR_RX_DATA: u8 = 0x04;

pub const LCR_DLAB: u8 = 0x80;

pub const LSR_DATA_READY: u8 = 0x01;
pub const LSR_OVERRUN: u8 = 0x02;
pub const LSR_THR_EMPTY: u8 = 0x20;
pub const LSR_IDLE: u8 = 0x40;

pub const CRYSTAL_HZ: u64 = 16_000_000;
pub const DEFAULT_DIVISOR: u16 = 32;
pub const FIFO_DEPTH: usize = 16;

/// Sent bytes held for the host before the oldest are dropped.
pub const MAX_PENDING_TX: usize = 4_096;

/// Start bit, eight data bits, stop bit.
const BITS_PER_BYTE: u64 = 10;
const SAMPLES_PER_BIT: u64 = 16;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MidiUart {
    ier: u8,
    lcr: u8,
    mcr: u8,
    scratch: u8,
    divisor: u16,
    overrun: bool,
    rx: VecDeque<u8>,

    /// Byte written by the CPU, waiting for the shifter.
    holding: Option<u8>,
    /// Byte on the wire and the whole crystal ticks it has been shifting.
    shifting: Option<(u8, u64)>,
    /// Crystal ticks not yet whole, in units of 1/cpu_hz.
    phase: u64,
    thr_interrupt: bool,

    /// Bytes that have left the wire, for the host to collect.
    transmitted: VecDeque<u8>,
    dropped_tx: u64,
}

impl Default for MidiUart {
    fn default() -> Self {
        Self::new()
    }
}

impl MidiUart {
    #[must_use]
    pub fn new() -> Self {
        Self {
            ier: 0,
            lcr: 0,
            mcr: 0,
            scratch: 0,
            divisor: DEFAULT_DIVISOR,
            overrun: false,
            rx: VecDeque::with_capacity(FIFO_DEPTH),
            holding: None,
            shifting: None,
            phase: 0,
            thr_interrupt: false,
            transmitted: VecDeque::new(),
            dropped_tx: 0,
        }
    }

    /// Effective baud rate.
    #[must_use]
    pub fn baud(&self) -> u64 {
        CRYSTAL_HZ / (SAMPLES_PER_BIT * u64::from(self.divisor.max(1)))
    }

    /// Deliver a byte from the outside world. A full FIFO drops it and
    /// flags an overrun.
    pub fn receive(&mut self, byte: u8) {
        if self.rx.len() == FIFO_DEPTH {
            self.overrun = true;
        } else {
            self.rx.push_back(byte);
        }
    }

    /// Drain the bytes sent since the last call.
    pub fn take_transmitted(&mut self) -> Vec<u8> {
        self.transmitted.drain(..).collect()
    }

    /// Sent bytes discarded because nobody collected them.
    #[must_use]
    pub fn dropped_tx(&self) -> u64 {
        self.dropped_tx
    }

    fn byte_sent(&mut self, byte: u8) {
        if self.transmitted.len() == MAX_PENDING_TX {
            self.transmitted.pop_front();
            self.dropped_tx += 1;
        }
        self.transmitted.push_back(byte);
    }

    pub fn read(&mut self, reg: u8) -> u8 {
        let dlab = self.lcr & LCR_DLAB != 0;
        match reg & 0x07 {
            REG_DATA if dlab => self.divisor as u8,
            REG_DATA => self.rx.pop_front().unwrap_or(0),
            REG_IER if dlab => (self.divisor >> 8) as u8,
            REG_IER => self.ier,
            REG_IIR => {
                let iir = self.iir();
                if iir == IIR_THR_EMPTY {
                    self.thr_interrupt = false;
                }
                iir
            }
            REG_LCR => self.lcr,
            REG_MCR => self.mcr,
            REG_LSR => {
                let lsr = self.lsr();
                self.overrun = false;
                lsr
            }
            // No modem lines.
            REG_MSR => 0,
            _ => self.scratch,
        }
    }

    pub fn write(&mut self, reg: u8, value: u8) {
        let dlab = self.lcr & LCR_DLAB != 0;
        match reg & 0x07 {
            REG_DATA if dlab => self.divisor = (self.divisor & 0xFF00) | u16::from(value),
            REG_DATA => self.transmit(value),
            REG_IER if dlab => {
                self.divisor = (self.divisor & 0x00FF) | (u16::from(value) << 8);
            }
            REG_IER => {
                let enabling_thr = value & IER_THR_EMPTY != 0 && self.ier & IER_THR_EMPTY == 0;
                self.ier = value & 0x0F;
                if enabling_thr && self.holding.is_none() {
                    self.thr_interrupt = true;
                }
            }
            // FIFO control: the FIFO is always on.
            REG_IIR => {}
            REG_LCR => self.lcr = value,
            REG_MCR => self.mcr = value & 0x1F,
            REG_LSR | REG_MSR => {}
            _ => self.scratch = value,
        }
    }

    fn transmit(&mut self, value: u8) {
        self.thr_interrupt = false;
        if self.shifting.is_none() {
            self.shifting = Some((value, 0));
        } else {
            // Overwrites an unsent byte, as the chip does.
            self.holding = Some(value);
        }
    }

    fn iir(&self) -> u8 {
        if self.ier & IER_RX_DATA != 0 && !self.rx.is_empty() {
            IIR_RX_DATA
        } else if self.ier & IER_THR_EMPTY != 0 && self.thr_interrupt {
            IIR_THR_EMPTY
        } else {
            IIR_NONE
        }
    }

    fn lsr(&self) -> u8 {
        let mut lsr = 0;
        if !self.rx.is_empty() {
            lsr |= LSR_DATA_READY;
        }
        if self.overrun {
            lsr |= LSR_OVERRUN;
        }
        if self.holding.is_none() {
            lsr |= LSR_THR_EMPTY;
            if self.shifting.is_none() {
                lsr |= LSR_IDLE;
            }
        }
        lsr
    }
}

impl Device for MidiUart {
    fn step(&mut self, speed: Speed, delta: Cycles) -> Step {
        let cpu_hz = speed.cycles_per_second();
        self.phase += u64::from(delta.get()) * CRYSTAL_HZ;
        let mut budget = self.phase / cpu_hz;
        self.phase %= cpu_hz;

        // Ticks are independent of the CPU clock, so progress survives a
        // speed change. A smaller divisor can leave a byte overdue: it
        // finishes at once.
        let byte_time = BITS_PER_BYTE * SAMPLES_PER_BIT * u64::from(self.divisor.max(1));
        while let Some((byte, progress)) = self.shifting {
            let needed = byte_time.saturating_sub(progress);
            if budget < needed {
                self.shifting = Some((byte, progress + budget));
                break;
            }
            budget -= needed;
            self.byte_sent(byte);
            self.shifting = self.holding.take().map(|next| (next, 0));
            if self.shifting.is_some() {
                // Holding register just emptied.
                self.thr_interrupt = true;
            }
        }
        Step::Idle
    }

    /// Registers return to power-on values and both FIFOs empty. Bytes
    /// already sent stay available to the host.
    fn reset(&mut self) {
        self.ier = 0;
        self.lcr = 0;
        self.mcr = 0;
        self.scratch = 0;
        self.divisor = DEFAULT_DIVISOR;
        self.overrun = false;
        self.rx.clear();
        self.holding = None;
        self.shifting = None;
        self.phase = 0;
        self.thr_interrupt = false;
    }

    fn irq_asserted(&self) -> bool {
        self.iir() != IIR_NONE
    }
}
