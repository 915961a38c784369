//! SPI controller for the SD card slot (`$9F3E` data, `$9F3F` control).
//!
//! Writing the data register starts an 8-bit exchange. The exchange takes
//! eight SPI bit times, measured against the CPU clock, and the controller
//! reports busy until it completes.

use emu_core::{Cycles, Device, Speed, Step};

pub const REG_DATA: u8 = 0x00;
pub const REG_CTRL: u8 = 0x01;

pub const CTRL_SELECT: u8 = 0x01;
pub const CTRL_SLOW_CLOCK: u8 = 0x02;
pub const CTRL_BUSY: u8 = 0x80;

/// SPI bit clock in normal mode.
pub const FAST_CLOCK_HZ: u64 = 12_500_000;
/// SPI bit clock in slow mode, used during card initialisation.
pub const SLOW_CLOCK_HZ: u64 = 390_625;

const BITS_PER_EXCHANGE: u64 = 8;

/// Something on the far end of the SPI bus, typically an SD card.
pub trait SpiTarget {
    /// Chip select changed.
    fn select(&mut self, selected: bool);

    /// Exchange one byte: returns the byte clocked in while `out` was
    /// clocked out.
    fn exchange(&mut self, out: u8) -> u8;
}

/// The SPI controller.
pub struct SpiController {
    ctrl: u8,
    outgoing: u8,
    received: u8,
    /// Progress of the running exchange, in units of 1 / `cpu_hz` bit.
    progress: Option<u64>,
    target: Option<Box<dyn SpiTarget>>,
    exchanges: u64,
}

impl Default for SpiController {
    fn default() -> Self {
        Self::new()
    }
}

impl SpiController {
    #[must_use]
    pub fn new() -> Self {
        Self {
            ctrl: 0,
            outgoing: 0,
            received: 0xFF,
            progress: None,
            target: None,
            exchanges: 0,
        }
    }

    /// Insert a card. Replaces any card already present.
    pub fn attach(&mut self, target: Box<dyn SpiTarget>) {
        self.target = Some(target);
    }

    /// Remove the card, returning it.
    pub fn detach(&mut self) -> Option<Box<dyn SpiTarget>> {
        self.target.take()
    }

    #[must_use]
    pub fn busy(&self) -> bool {
        self.progress.is_some()
    }

    #[must_use]
    pub fn selected(&self) -> bool {
        self.ctrl & CTRL_SELECT != 0
    }

    /// Completed byte exchanges since power-on.
    #[must_use]
    pub fn exchanges(&self) -> u64 {
        self.exchanges
    }

    pub fn read(&mut self, reg: u8) -> u8 {
        match reg & 0x01 {
            REG_DATA => self.received,
            _ => {
                let busy = if self.busy() { CTRL_BUSY } else { 0 };
                (self.ctrl & (CTRL_SELECT | CTRL_SLOW_CLOCK)) | busy
            }
        }
    }

    pub fn write(&mut self, reg: u8, value: u8) {
        match reg & 0x01 {
            REG_DATA => {
                // A write while busy is lost, as on the real part.
                if !self.busy() {
                    self.outgoing = value;
                    self.progress = Some(0);
                }
            }
            _ => {
                let was_selected = self.selected();
                self.ctrl = value & (CTRL_SELECT | CTRL_SLOW_CLOCK);
                if self.selected() != was_selected {
                    let selected = self.selected();
                    if let Some(target) = self.target.as_mut() {
                        target.select(selected);
                    }
                }
            }
        }
    }

    fn bit_clock_hz(&self) -> u64 {
        if self.ctrl & CTRL_SLOW_CLOCK != 0 {
            SLOW_CLOCK_HZ
        } else {
            FAST_CLOCK_HZ
        }
    }

    fn complete(&mut self) {
        let selected = self.selected();
        self.received = match self.target.as_mut() {
            Some(target) if selected => target.exchange(self.outgoing),
            _ => 0xFF,
        };
        self.exchanges += 1;
    }
}

impl Device for SpiController {
    fn step(&mut self, speed: Speed, delta: Cycles) -> Step {
        if let Some(progress) = self.progress {
            let progress = progress + u64::from(delta.get()) * self.bit_clock_hz();
            if progress >= BITS_PER_EXCHANGE * speed.cycles_per_second() {
                self.progress = None;
                self.complete();
            } else {
                self.progress = Some(progress);
            }
        }
        Step::Idle
    }

    /// Deselects the card and abandons any exchange in flight. The card
    /// itself stays inserted.
    fn reset(&mut self) {
        if self.selected() {
            if let Some(target) = self.target.as_mut() {
                target.select(false);
            }
        }
        self.ctrl = 0;
        self.outgoing = 0;
        self.received = 0xFF;
        self.progress = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Default)]
    struct Log {
        selects: Vec<bool>,
        bytes: Vec<u8>,
    }

    struct EchoCard(Rc<RefCell<Log>>);

    impl SpiTarget for EchoCard {
        fn select(&mut self, selected: bool) {
            self.0.borrow_mut().selects.push(selected);
        }

        fn exchange(&mut self, out: u8) -> u8 {
            self.0.borrow_mut().bytes.push(out);
            !out
        }
    }

    fn step(spi: &mut SpiController, cycles: u32) {
        let _ = spi.step(Speed::from_mhz(8), Cycles(cycles));
    }

    #[test]
    fn fast_exchange_takes_eight_bit_times() {
        let log = Rc::new(RefCell::new(Log::default()));
        let mut spi = SpiController::new();
        spi.attach(Box::new(EchoCard(Rc::clone(&log))));
        spi.write(REG_CTRL, CTRL_SELECT);
        spi.write(REG_DATA, 0x40);

        // 8 bits at 12.5 MHz = 5.12 CPU cycles at 8 MHz.
        step(&mut spi, 5);
        assert_eq!(spi.read(REG_CTRL) & CTRL_BUSY, CTRL_BUSY);
        step(&mut spi, 1);
        assert_eq!(spi.read(REG_CTRL) & CTRL_BUSY, 0);
        assert_eq!(spi.read(REG_DATA), 0xBF);
        assert_eq!(log.borrow().bytes, vec![0x40]);
        assert_eq!(log.borrow().selects, vec![true]);
    }

    #[test]
    fn slow_clock_is_slower() {
        let mut spi = SpiController::new();
        spi.write(REG_CTRL, CTRL_SLOW_CLOCK);
        spi.write(REG_DATA, 0x00);
        // 8 bits at 390.625 kHz = 163.84 CPU cycles at 8 MHz.
        step(&mut spi, 163);
        assert!(spi.busy());
        step(&mut spi, 1);
        assert!(!spi.busy());
    }

    #[test]
    fn no_card_reads_ff() {
        let mut spi = SpiController::new();
        spi.write(REG_CTRL, CTRL_SELECT);
        spi.write(REG_DATA, 0x12);
        step(&mut spi, 100);
        assert_eq!(spi.read(REG_DATA), 0xFF);
        assert_eq!(spi.exchanges(), 1);
    }

    #[test]
    fn write_while_busy_is_dropped() {
        let log = Rc::new(RefCell::new(Log::default()));
        let mut spi = SpiController::new();
        spi.attach(Box::new(EchoCard(Rc::clone(&log))));
        spi.write(REG_CTRL, CTRL_SELECT);
        spi.write(REG_DATA, 0x01);
        spi.write(REG_DATA, 0x02);
        step(&mut spi, 10);
        assert_eq!(log.borrow().bytes, vec![0x01]);
    }

    #[test]
    fn reset_deselects_and_idles() {
        let log = Rc::new(RefCell::new(Log::default()));
        let mut spi = SpiController::new();
        spi.attach(Box::new(EchoCard(Rc::clone(&log))));
        spi.write(REG_CTRL, CTRL_SELECT);
        spi.write(REG_DATA, 0x01);
        spi.reset();
        assert!(!spi.busy());
        assert!(!spi.selected());
        assert_eq!(spi.read(REG_DATA), 0xFF);
        assert_eq!(log.borrow().selects, vec![true, false]);
        assert!(spi.detach().is_some());
    }
}
