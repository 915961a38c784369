//! Video chip: raster timing, frame boundaries and the framebuffer.
//!
//! Only the timing side is modelled in detail. The raster runs off a
//! 25.2 MHz dot clock over an 800x525 dot frame, which is exactly 60 frames
//! per simulated second whatever the CPU speed. CPU cycles are converted to
//! dots with an integer phase accumulator, so no fraction of a dot is ever
//! dropped.
//!
//! Registers live at `$9F20-$9F3D`. The interrupt block follows the VERA
//! layout: IEN at `$06` (bit 7 is IRQLINE bit 8), ISR at `$07`
//! (write 1 to clear) and IRQLINE low at `$08`.

use emu_core::{Cycles, Device, Speed, Step};

pub const SCREEN_WIDTH: u32 = 640;
pub const SCREEN_HEIGHT: u32 = 480;

pub const DOT_CLOCK_HZ: u64 = 25_200_000;
pub const DOTS_PER_LINE: u64 = 800;
pub const LINES_PER_FRAME: u64 = 525;
pub const DOTS_PER_FRAME: u64 = DOTS_PER_LINE * LINES_PER_FRAME;

/// Frames per simulated second.
pub const FRAME_RATE: f64 = DOT_CLOCK_HZ as f64 / DOTS_PER_FRAME as f64;

pub const REG_COUNT: usize = 0x1E;
pub const REG_IEN: u8 = 0x06;
pub const REG_ISR: u8 = 0x07;
pub const REG_IRQLINE_L: u8 = 0x08;
pub const REG_DC_BORDER: u8 = 0x0C;

pub const IRQ_VSYNC: u8 = 0x01;
pub const IRQ_LINE: u8 = 0x02;
pub const IRQ_SPRCOL: u8 = 0x04;
pub const IRQ_AFLOW: u8 = 0x08;
const IRQ_SOURCES: u8 = IRQ_VSYNC | IRQ_LINE | IRQ_SPRCOL | IRQ_AFLOW;

/// Power-on palette entries 0-15, 12-bit RGB.
const DEFAULT_PALETTE: [u16; 16] = [
    0x000, 0xFFF, 0x800, 0xAFE, 0xC4C, 0x0C5, 0x00A, 0xEE7, 0xD85, 0x640, 0xF77, 0x333, 0x777,
    0xAF6, 0x08F, 0xBBB,
];

/// A finished frame lent to the host.
#[derive(Debug, Clone, Copy)]
pub struct Frame<'a> {
    /// XRGB8888 pixels, row-major.
    pub pixels: &'a [u32],
    pub width: u32,
    pub height: u32,
    /// Bytes per row.
    pub pitch: usize,
}

/// Receives finished frames. Returns `false` to reject a frame.
pub trait VideoSink {
    fn present_frame(&mut self, frame: Frame<'_>) -> bool;
}

/// The video chip.
pub struct Video {
    registers: [u8; REG_COUNT],
    /// Pending interrupt sources.
    isr: u8,
    /// Dot position within the current frame.
    dot: u64,
    /// Fractional dots, in units of 1 / `cpu_hz` dot.
    phase: u64,
    frame_count: u64,
    framebuffer: Vec<u32>,
}

impl Default for Video {
    fn default() -> Self {
        Self::new()
    }
}

impl Video {
    #[must_use]
    pub fn new() -> Self {
        Self {
            registers: [0; REG_COUNT],
            isr: 0,
            dot: 0,
            phase: 0,
            frame_count: 0,
            framebuffer: vec![0; (SCREEN_WIDTH * SCREEN_HEIGHT) as usize],
        }
    }

    pub fn read(&mut self, reg: u8) -> u8 {
        match reg {
            REG_ISR => self.isr,
            REG_IRQLINE_L => self.irq_line() as u8,
            r if usize::from(r) < REG_COUNT => self.registers[usize::from(r)],
            _ => 0,
        }
    }

    pub fn write(&mut self, reg: u8, value: u8) {
        match reg {
            REG_ISR => self.isr &= !(value & IRQ_SOURCES),
            r if usize::from(r) < REG_COUNT => self.registers[usize::from(r)] = value,
            _ => {}
        }
    }

    /// Raise interrupt sources not driven by the raster (sprite collision,
    /// audio FIFO).
    pub fn raise(&mut self, sources: u8) {
        self.isr |= sources & IRQ_SOURCES;
    }

    /// Scanline the LINE interrupt fires on (9 bits).
    #[must_use]
    pub fn irq_line(&self) -> u16 {
        let hi = u16::from(self.registers[usize::from(REG_IEN)] >> 7);
        (hi << 8) | u16::from(self.registers[usize::from(REG_IRQLINE_L)])
    }

    #[must_use]
    pub fn isr(&self) -> u8 {
        self.isr
    }

    #[must_use]
    pub fn scanline(&self) -> u16 {
        (self.dot / DOTS_PER_LINE) as u16
    }

    /// Dot within the current scanline.
    #[must_use]
    pub fn column(&self) -> u16 {
        (self.dot % DOTS_PER_LINE) as u16
    }

    /// Frames completed since reset.
    #[must_use]
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    #[must_use]
    pub fn framebuffer(&self) -> &[u32] {
        &self.framebuffer
    }

    /// Compose the frame that just ended into the framebuffer.
    ///
    /// Layer rendering is not modelled; the visible area shows the border
    /// colour.
    pub fn render_frame(&mut self) {
        let index = self.registers[usize::from(REG_DC_BORDER)] & 0x0F;
        self.framebuffer.fill(xrgb(DEFAULT_PALETTE[usize::from(index)]));
    }

    #[must_use]
    pub fn frame(&self) -> Frame<'_> {
        Frame {
            pixels: &self.framebuffer,
            width: SCREEN_WIDTH,
            height: SCREEN_HEIGHT,
            pitch: SCREEN_WIDTH as usize * 4,
        }
    }

    fn ien(&self) -> u8 {
        self.registers[usize::from(REG_IEN)] & IRQ_SOURCES
    }

    /// Did the raster enter `line` while moving from `from` to `to`
    /// (absolute dot positions, `to` may run past the end of the frame)?
    fn entered_line(from: u64, to: u64, line: u64) -> bool {
        if line >= LINES_PER_FRAME {
            return false;
        }
        let first = from / DOTS_PER_LINE + 1;
        let last = to / DOTS_PER_LINE;
        if first > last {
            return false;
        }
        let offset = (line + LINES_PER_FRAME - first % LINES_PER_FRAME) % LINES_PER_FRAME;
        first + offset <= last
    }
}

/// Expand 12-bit RGB to XRGB8888.
fn xrgb(rgb: u16) -> u32 {
    let r = u32::from((rgb >> 8) & 0xF) * 0x11;
    let g = u32::from((rgb >> 4) & 0xF) * 0x11;
    let b = u32::from(rgb & 0xF) * 0x11;
    (r << 16) | (g << 8) | b
}

impl Device for Video {
    fn step(&mut self, speed: Speed, delta: Cycles) -> Step {
        let cpu_hz = speed.cycles_per_second();
        self.phase += u64::from(delta.get()) * DOT_CLOCK_HZ;
        let dots = self.phase / cpu_hz;
        self.phase %= cpu_hz;

        let from = self.dot;
        let to = from + dots;
        if Self::entered_line(from, to, u64::from(self.irq_line())) {
            self.isr |= IRQ_LINE;
        }

        if to < DOTS_PER_FRAME {
            self.dot = to;
            return Step::Idle;
        }

        self.frame_count += to / DOTS_PER_FRAME;
        self.dot = to % DOTS_PER_FRAME;
        self.isr |= IRQ_VSYNC;
        Step::FrameBoundary
    }

    /// Registers and pending interrupts clear and the raster restarts at
    /// the top of the frame. The framebuffer keeps its last contents.
    fn reset(&mut self) {
        self.registers = [0; REG_COUNT];
        self.isr = 0;
        self.dot = 0;
        self.phase = 0;
        self.frame_count = 0;
    }

    fn irq_asserted(&self) -> bool {
        self.isr & self.ien() != 0
    }
}
