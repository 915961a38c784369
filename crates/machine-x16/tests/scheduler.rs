//! Scheduler behaviour observed from outside the machine.

use emu_core::{Bus, Cpu, Cycles, EdgeDevice, Observable, Value};
use machine_x16::i2c::SMC_ADDRESS;
use machine_x16::smc::{REG_ACTIVITY_LED, REG_NMI};
use machine_x16::spi::{CTRL_SELECT, CTRL_SLOW_CLOCK};
use machine_x16::video::REG_DC_BORDER;
use machine_x16::{
    Frame, I2C_SCL, I2C_SDA, I2cTarget, Instruction, RunStatus, Scheduler, Slot, VideoSink, WorkloadCpu,
    X16Config, X16Error,
};

/// Accepts every frame.
#[derive(Default)]
struct Screen {
    frames: u32,
}

impl VideoSink for Screen {
    fn present_frame(&mut self, frame: Frame<'_>) -> bool {
        assert_eq!((frame.width, frame.height), (640, 480));
        self.frames += 1;
        true
    }
}

/// Refuses every frame.
struct Unplugged;

impl VideoSink for Unplugged {
    fn present_frame(&mut self, _frame: Frame<'_>) -> bool {
        false
    }
}

fn machine(cpu: WorkloadCpu, mhz: u8) -> Scheduler<WorkloadCpu> {
    let config = X16Config {
        mhz,
        ..X16Config::default()
    };
    Scheduler::new(cpu, &config).unwrap()
}

#[test]
fn deltas_sum_to_retired_cycles_across_wraparound() {
    let lengths = [3u32, 5, 7, 11, 2];
    let program = lengths.iter().map(|&c| Instruction::nop(c)).collect();
    let start = Cycles(u32::MAX - 50_000);
    let mut m = machine(WorkloadCpu::new(program).with_cycles(start), 8);

    assert_eq!(m.run_slice(&mut Screen::default()), Ok(RunStatus::FrameReady));

    let retired = m.cpu().retired as usize;
    let expected: u64 = lengths.iter().cycle().take(retired).map(|&c| u64::from(c)).sum();
    assert!(m.cpu().cycles() < start, "counter should have wrapped");
    assert_eq!(m.slice_cycles(), expected);
    assert_eq!(u64::from(m.cpu().cycles().since(start).get()), expected);
    // The I2C bus is stepped once per cycle: it saw every one of them.
    assert_eq!(m.bus().devices.i2c.cycles(), expected);
}

#[test]
fn sixty_frames_per_simulated_second() {
    let mut m = machine(WorkloadCpu::uniform(4), 8);
    let mut screen = Screen::default();
    let mut total = 0;
    for _ in 0..60 {
        assert_eq!(m.run_slice(&mut screen), Ok(RunStatus::FrameReady));
        total += m.slice_cycles();
    }
    assert_eq!(total, 8_000_000);
    assert_eq!(m.cpu().cycles(), Cycles(8_000_000));
    assert_eq!(screen.frames, 60);
    assert_eq!(m.query("video.frame_count"), Some(Value::U64(60)));
}

#[test]
fn one_frame_of_100k_cycles_at_6_mhz() {
    let mut m = machine(WorkloadCpu::uniform(100_000), 6);
    assert_eq!(m.run_slice(&mut Screen::default()), Ok(RunStatus::FrameReady));
    assert_eq!(m.slice_cycles(), 100_000);
    assert_eq!(m.last_delta(), Cycles(100_000));
    assert!(!m.irq_requested());
    assert_eq!(m.cpu().interrupts_taken, 0);
    assert_eq!(m.frames_delivered(), 1);
}

#[test]
fn halt_is_sticky_until_reset() {
    let mut program = vec![Instruction::nop(4); 10];
    program.push(Instruction::jump(4, 0xFFFF));
    let mut m = machine(WorkloadCpu::new(program), 8);
    let mut screen = Screen::default();

    assert_eq!(m.run_slice(&mut screen), Ok(RunStatus::Halted));
    assert!(m.is_halted());
    let retired = m.cpu().retired;
    let cycles = m.cpu().cycles();
    assert_eq!(retired, 11);

    for _ in 0..3 {
        assert_eq!(m.run_slice(&mut screen), Ok(RunStatus::Halted));
    }
    assert_eq!(m.cpu().retired, retired);
    assert_eq!(m.cpu().cycles(), cycles);
    assert_eq!(screen.frames, 0);

    m.reset();
    assert!(!m.is_halted());
    assert_eq!(m.run_slice(&mut screen), Ok(RunStatus::Halted));
    assert_eq!(m.cpu().retired, 22);
}

#[test]
fn halt_detection_can_be_disabled() {
    let config = X16Config {
        halt_sentinel: None,
        ..X16Config::default()
    };
    let cpu = WorkloadCpu::new(vec![Instruction::jump(4, 0xFFFF)]);
    let mut m = Scheduler::new(cpu, &config).unwrap();
    assert_eq!(m.run_slice(&mut Screen::default()), Ok(RunStatus::FrameReady));
}

#[test]
fn reset_leaves_the_clock_alone() {
    let mut m = machine(WorkloadCpu::uniform(4), 8);
    m.run_slice(&mut Screen::default()).unwrap();
    m.bus_mut().write(0x9F20 + u16::from(REG_DC_BORDER), 0x06);
    m.bus_mut().devices.i2c.rtc.set_time(12, 34, 56);
    let cycles = m.cpu().cycles();

    m.reset();

    assert_eq!(m.cpu().cycles(), cycles);
    assert_eq!(m.bus_mut().read(0x9F20 + u16::from(REG_DC_BORDER)), 0);
    assert_eq!(m.bus().devices.video.frame_count(), 0);
    // Battery-backed.
    assert_eq!(m.bus().devices.i2c.rtc.hours(), 12);

    // The next delta only counts cycles retired after the reset.
    m.run_slice(&mut Screen::default()).unwrap();
    assert_eq!(m.cpu().cycles().since(cycles).get() as u64, m.slice_cycles());
}

#[test]
fn reset_returns_every_device_to_power_on() {
    let config = X16Config {
        has_via2: true,
        midi_card: true,
        ..X16Config::default()
    };
    let mut m = Scheduler::new(WorkloadCpu::uniform(4), &config).unwrap();
    m.run_slice(&mut Screen::default()).unwrap();
    {
        let bus = m.bus_mut();
        bus.write(0x0000, 5);
        bus.write(0x0001, 3);
        bus.write(0x9F0E, 0xC0);
        // SDA low with SCL high is a START; then hold SCL low too.
        bus.write(0x9F03, I2C_SDA);
        bus.devices.i2c.step_one_cycle();
        bus.write(0x9F03, I2C_SDA | I2C_SCL);
        bus.devices.i2c.step_one_cycle();
        bus.write(0x9F1B, 0x40);
        bus.write(0x9F3F, CTRL_SELECT | CTRL_SLOW_CLOCK);
        bus.write(0x9F3E, 0x55);
        bus.write(0x9F61, 0x01);
        bus.write(0x9F63, 0x03);
        bus.write(0x9F67, 0x5A);
        bus.devices.i2c.smc.write_register(REG_ACTIVITY_LED, 0x7F);
        bus.devices.i2c.smc.request_nmi();
    }
    assert!(m.bus().devices.i2c.busy());
    assert!(m.bus().devices.spi.busy());

    m.reset();

    let bus = m.bus_mut();
    assert_eq!((bus.ram_bank(), bus.rom_bank()), (0, 0));
    assert_eq!(bus.read(0x9F0E), 0x80);
    assert_eq!(bus.read(0x9F03), 0x00);
    assert_eq!(bus.read(0x9F1B), 0x00);
    assert_eq!(bus.read(0x9F3F), 0x00);
    assert!(!bus.devices.spi.busy());
    assert!(!bus.devices.i2c.busy());
    assert!(bus.devices.i2c.sda() && bus.devices.i2c.scl());
    assert_eq!(bus.devices.i2c.smc.activity_led(), 0);
    assert!(!bus.devices.i2c.smc.take_nmi_request());
    assert_eq!(bus.read(0x9F61), 0x00);
    assert_eq!(bus.read(0x9F63), 0x00);
    assert_eq!(bus.read(0x9F67), 0x00);
}

#[test]
fn slowing_down_mid_midi_byte_keeps_sending() {
    let config = X16Config {
        midi_card: true,
        halt_sentinel: None,
        ..X16Config::default()
    };
    let mut program = vec![Instruction::store(4, 0x9F60, 0x90)];
    program.extend(std::iter::repeat_n(Instruction::nop(4), 499));
    let mut m = Scheduler::new(WorkloadCpu::new(program), &config).unwrap();
    let mut screen = Screen::default();

    m.run_slice(&mut screen).unwrap();
    let uart = m.bus_mut().devices.midi.as_mut().unwrap();
    assert!(!uart.take_transmitted().is_empty());

    m.set_speed(1).unwrap();
    for _ in 0..3 {
        assert_eq!(m.run_slice(&mut screen), Ok(RunStatus::FrameReady));
    }
    let uart = m.bus_mut().devices.midi.as_mut().unwrap();
    assert!(!uart.take_transmitted().is_empty());
}

#[test]
fn delivery_failure_ends_the_slice() {
    let mut m = machine(WorkloadCpu::uniform(4), 8);
    assert_eq!(
        m.run_slice(&mut Unplugged),
        Err(X16Error::Delivery("video frame"))
    );
    let cycles = m.cpu().cycles();
    assert_eq!(m.frames_delivered(), 0);
    assert_eq!(m.bus().devices.video.frame_count(), 1);
    assert!(!m.is_halted());

    // A retry carries on from where the failed slice stopped.
    assert_eq!(m.run_slice(&mut Screen::default()), Ok(RunStatus::FrameReady));
    assert!(m.cpu().cycles() > cycles);
    assert_eq!(m.bus().devices.video.frame_count(), 2);
}

#[test]
fn smc_reset_request_is_consumed_before_next_instruction() {
    let mut m = machine(WorkloadCpu::uniform(4), 8);
    m.run_slice(&mut Screen::default()).unwrap();
    m.bus_mut().write(0x9F20 + u16::from(REG_DC_BORDER), 0x06);
    m.bus_mut().devices.i2c.smc.request_reset();
    let cycles = m.cpu().cycles();

    m.run_slice(&mut Screen::default()).unwrap();

    assert!(!m.bus().devices.i2c.smc.reset_pending());
    assert_eq!(m.bus_mut().read(0x9F20 + u16::from(REG_DC_BORDER)), 0);
    // Video restarted at the top of the frame, so this slice was a full one.
    assert_eq!(m.bus().devices.video.frame_count(), 1);
    assert!(m.cpu().cycles() > cycles);
}

#[test]
fn smc_power_off_halts() {
    let mut m = machine(WorkloadCpu::uniform(4), 8);
    m.bus_mut().devices.i2c.smc.write_register(1, 0x00);
    assert_eq!(m.run_slice(&mut Screen::default()), Ok(RunStatus::Halted));
    m.reset();
    assert_eq!(m.run_slice(&mut Screen::default()), Ok(RunStatus::FrameReady));
}

/// The CPU bit-bangs an NMI command to the SMC through VIA1 port A.
#[test]
fn nmi_command_over_i2c_reaches_the_cpu() {
    fn level(program: &mut Vec<Instruction>, sda: bool, scl: bool) {
        let mut ddr = 0;
        if !sda {
            ddr |= I2C_SDA;
        }
        if !scl {
            ddr |= I2C_SCL;
        }
        program.push(Instruction::store(4, 0x9F03, ddr));
    }

    fn byte(program: &mut Vec<Instruction>, value: u8) {
        for i in (0..8).rev() {
            let bit = (value >> i) & 1 != 0;
            level(program, bit, false);
            level(program, bit, true);
            level(program, bit, false);
        }
        // Release SDA for the target's ACK.
        level(program, true, false);
        level(program, true, true);
        level(program, true, false);
    }

    let mut program = Vec::new();
    level(&mut program, true, true);
    level(&mut program, false, true);
    level(&mut program, false, false);
    byte(&mut program, SMC_ADDRESS << 1);
    byte(&mut program, REG_NMI);
    byte(&mut program, 0x00);
    level(&mut program, false, false);
    level(&mut program, false, true);
    level(&mut program, true, true);

    let mut m = machine(WorkloadCpu::new(program), 8);
    m.run_slice(&mut Screen::default()).unwrap();
    assert!(m.cpu().nmis_taken > 0);
}

#[test]
fn via_timer_interrupt_reaches_the_cpu() {
    let mut m = machine(WorkloadCpu::uniform(4), 8);
    {
        let bus = m.bus_mut();
        bus.write(0x9F0B, 0x40); // T1 free-run
        bus.write(0x9F0E, 0xC0); // enable T1
        bus.write(0x9F04, 0x00);
        bus.write(0x9F05, 0x10);
    }
    m.run_slice(&mut Screen::default()).unwrap();
    assert!(m.cpu().interrupts_taken > 0);
    assert_eq!(
        m.query("irq.sources"),
        Some(Value::List(vec![Value::String("via1".into())]))
    );
}

#[test]
fn step_order_is_fixed_and_observable() {
    let config = X16Config {
        has_via2: true,
        midi_card: true,
        ..X16Config::default()
    };
    let m = Scheduler::new(WorkloadCpu::uniform(4), &config).unwrap();
    assert_eq!(
        m.step_order(),
        &[
            Slot::Via1,
            Slot::Spi,
            Slot::Video,
            Slot::Via2,
            Slot::I2c,
            Slot::Rtc,
            Slot::Audio,
            Slot::Midi
        ]
    );
    assert_eq!(
        m.interrupts().sources(),
        &[Slot::Video, Slot::Via1, Slot::Via2, Slot::Midi]
    );
}

#[test]
fn identical_runs_are_identical() {
    let run = || {
        let program = vec![
            Instruction::nop(2),
            Instruction::store(4, 0x9F61, 0x01),
            Instruction::nop(6),
        ];
        let config = X16Config {
            midi_card: true,
            ..X16Config::default()
        };
        let mut m = Scheduler::new(WorkloadCpu::new(program), &config).unwrap();
        for _ in 0..5 {
            m.run_slice(&mut Screen::default()).unwrap();
        }
        m.query_paths()
            .iter()
            .filter(|path| !path.contains('<'))
            .map(|path| m.query(path))
            .collect::<Vec<_>>()
    };
    assert_eq!(run(), run());
}
