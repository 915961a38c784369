//! A stand-in CPU that retires a scripted instruction stream.
//!
//! Decoding 65C02 opcodes is not this crate's job. `WorkloadCpu` gives the
//! scheduler something that behaves like a CPU from the outside: it
//! consumes cycles, moves its program counter, performs the occasional
//! store, and takes IRQ, NMI and reset the way a 6502 does.

use emu_core::{Bus, Cpu, Cycles};

pub const NMI_VECTOR: u16 = 0xFFFA;
pub const RESET_VECTOR: u16 = 0xFFFC;
pub const IRQ_VECTOR: u16 = 0xFFFE;

/// Cycles spent pushing state and fetching a vector.
pub const INTERRUPT_ENTRY_CYCLES: u32 = 7;

/// What an instruction does to the program counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Branch to self.
    Stay,
    /// Step past an instruction of this many bytes.
    Advance(u16),
    Jump(u16),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Instruction {
    pub cycles: u32,
    pub flow: Flow,
    /// Memory write performed by the instruction.
    pub store: Option<(u16, u8)>,
}

impl Instruction {
    /// A one-byte instruction with no side effects.
    #[must_use]
    pub const fn nop(cycles: u32) -> Self {
        Self {
            cycles,
            flow: Flow::Advance(1),
            store: None,
        }
    }

    #[must_use]
    pub const fn jump(cycles: u32, target: u16) -> Self {
        Self {
            cycles,
            flow: Flow::Jump(target),
            store: None,
        }
    }

    /// A three-byte absolute store.
    #[must_use]
    pub const fn store(cycles: u32, addr: u16, value: u8) -> Self {
        Self {
            cycles,
            flow: Flow::Advance(3),
            store: Some((addr, value)),
        }
    }
}

/// Retires `program` in a loop, one entry per `execute_instruction`.
#[derive(Debug, Clone)]
pub struct WorkloadCpu {
    program: Vec<Instruction>,
    next: usize,
    pc: u16,
    cycles: Cycles,
    irq_pending: bool,
    nmi_pending: bool,
    pub interrupts_taken: u64,
    pub nmis_taken: u64,
    pub retired: u64,
}

impl WorkloadCpu {
    /// An empty program idles with 1-cycle no-ops.
    #[must_use]
    pub fn new(program: Vec<Instruction>) -> Self {
        let program = if program.is_empty() {
            vec![Instruction::nop(1)]
        } else {
            program
        };
        Self {
            program,
            next: 0,
            pc: 0,
            cycles: Cycles::ZERO,
            irq_pending: false,
            nmi_pending: false,
            interrupts_taken: 0,
            nmis_taken: 0,
            retired: 0,
        }
    }

    /// A tight loop of `cycles`-cycle instructions that never moves PC.
    #[must_use]
    pub fn uniform(cycles: u32) -> Self {
        Self::new(vec![Instruction {
            cycles,
            flow: Flow::Stay,
            store: None,
        }])
    }

    /// Start the cumulative counter somewhere other than zero.
    #[must_use]
    pub fn with_cycles(mut self, cycles: Cycles) -> Self {
        self.cycles = cycles;
        self
    }

    fn enter<B: Bus>(&mut self, bus: &mut B, vector: u16) {
        self.pc = bus.read_word(vector);
        self.cycles += Cycles(INTERRUPT_ENTRY_CYCLES);
    }
}

impl Cpu for WorkloadCpu {
    fn execute_instruction<B: Bus>(&mut self, bus: &mut B) {
        if std::mem::take(&mut self.nmi_pending) {
            self.nmis_taken += 1;
            self.enter(bus, NMI_VECTOR);
            return;
        }
        if std::mem::take(&mut self.irq_pending) {
            self.interrupts_taken += 1;
            self.enter(bus, IRQ_VECTOR);
            return;
        }

        let instruction = self.program[self.next];
        self.next = (self.next + 1) % self.program.len();
        if let Some((addr, value)) = instruction.store {
            bus.write(addr, value);
        }
        self.pc = match instruction.flow {
            Flow::Stay => self.pc,
            Flow::Advance(len) => self.pc.wrapping_add(len),
            Flow::Jump(target) => target,
        };
        self.cycles += Cycles(instruction.cycles);
        self.retired += 1;
    }

    fn cycles(&self) -> Cycles {
        self.cycles
    }

    fn pc(&self) -> u32 {
        u32::from(self.pc)
    }

    fn interrupt(&mut self) {
        self.irq_pending = true;
    }

    fn nmi(&mut self) {
        self.nmi_pending = true;
    }

    /// Restarts the program from the reset vector. The cycle counter keeps
    /// running.
    fn reset<B: Bus>(&mut self, bus: &mut B) {
        self.pc = bus.read_word(RESET_VECTOR);
        self.next = 0;
        self.irq_pending = false;
        self.nmi_pending = false;
    }
}
