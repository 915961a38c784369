//! CPU collaborator trait.

use crate::{Bus, Cycles};

/// A CPU core, driven one instruction at a time.
///
/// Instruction semantics belong to the implementation. The machine only
/// relies on what is observable after each instruction: the cumulative
/// cycle counter and the program counter.
pub trait Cpu {
    /// Execute exactly one instruction (or interrupt entry sequence).
    ///
    /// The bus is lent, not owned, so the machine can step its devices
    /// between instructions.
    fn execute_instruction<B: Bus>(&mut self, bus: &mut B);

    /// Cumulative cycles retired. Wraps at 2^32.
    fn cycles(&self) -> Cycles;

    /// Current program counter.
    ///
    /// Returns `u32` so 16-bit and wider address spaces share the trait;
    /// narrower CPUs zero-extend.
    fn pc(&self) -> u32;

    /// Assert the maskable interrupt request for the next instruction fetch.
    fn interrupt(&mut self);

    /// Request a non-maskable interrupt.
    fn nmi(&mut self);

    /// Reset registers and reload the reset vector.
    ///
    /// Must leave the cumulative cycle counter alone: the machine's clock
    /// keeps running across a reset.
    fn reset<B: Bus>(&mut self, bus: &mut B);
}
