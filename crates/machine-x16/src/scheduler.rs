//! The co-simulation loop.
//!
//! One call to [`Scheduler::run_slice`] runs the machine until the video
//! chip finishes a frame (the normal per-refresh yield), the CPU reaches
//! the halt sentinel, or the host rejects a frame. Each iteration:
//!
//! 1. consume pending SMC reset and NMI requests,
//! 2. execute one instruction,
//! 3. measure the elapsed cycles (`delta`),
//! 4. step every fitted device by `delta` in [`STEP_ORDER`],
//! 5. on a frame boundary, render and deliver the frame and yield,
//! 6. otherwise OR the interrupt lines into the CPU and check for halt.
//!
//! Devices never keep their own notion of time: the CPU's cumulative cycle
//! counter is the only clock, and every device sees the same `delta`.

use emu_core::{ClockDomain, Cpu, Cycles, Observable, Speed, Value, parse_address};
use tracing::{debug, info, trace, warn};

use crate::bus::X16Bus;
use crate::config::X16Config;
use crate::devices::{RESET_ORDER, STEP_ORDER, Slot};
use crate::error::{X16Error, X16Result};
use crate::interrupt::InterruptAggregator;
use crate::video::VideoSink;

/// Why `run_slice` returned control to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    /// A frame was delivered. Call again for the next one.
    FrameReady,
    /// The CPU reached the halt sentinel or the SMC powered off. Every
    /// further call returns this until the machine is reset.
    Halted,
}

pub struct Scheduler<C: Cpu> {
    cpu: C,
    bus: X16Bus,
    clock: ClockDomain,
    speed: Speed,
    step_order: Vec<Slot>,
    interrupts: InterruptAggregator,
    halt_sentinel: Option<u16>,
    halted: bool,
    /// Cycles run by the current (or last) slice.
    slice_cycles: u64,
    /// Aggregated IRQ level from the last iteration that checked it.
    irq_requested: bool,
    frames_delivered: u64,
}

impl<C: Cpu> Scheduler<C> {
    /// Build the machine around `cpu` and perform the power-on reset.
    ///
    /// # Errors
    ///
    /// Returns `X16Error::Configuration` if `config` fails validation.
    pub fn new(cpu: C, config: &X16Config) -> X16Result<Self> {
        config.validate()?;
        let bus = X16Bus::new(config);
        let step_order = STEP_ORDER
            .into_iter()
            .filter(|&slot| bus.devices.present(slot))
            .collect();
        let mut scheduler = Self {
            clock: ClockDomain::new(cpu.cycles()),
            cpu,
            bus,
            speed: config.speed(),
            step_order,
            interrupts: InterruptAggregator::for_config(config),
            halt_sentinel: config.halt_sentinel,
            halted: false,
            slice_cycles: 0,
            irq_requested: false,
            frames_delivered: 0,
        };
        debug!(
            mhz = scheduler.speed.mhz(),
            order = ?scheduler.step_order,
            "scheduler created"
        );
        scheduler.reset();
        Ok(scheduler)
    }

    /// Full machine reset: every device in [`RESET_ORDER`], the bank
    /// registers, then the CPU. The cycle counter and clock bookmark are
    /// left alone, and a halted machine becomes runnable again.
    pub fn reset(&mut self) {
        for slot in RESET_ORDER {
            if let Some(device) = self.bus.devices.get_mut(slot) {
                device.reset();
            }
        }
        self.bus.devices.sync_i2c_lines();
        self.bus.reset_banks();
        self.cpu.reset(&mut self.bus);
        self.halted = false;
        self.irq_requested = false;
        info!(
            cycles = self.cpu.cycles().get(),
            pc = format_args!("${:04X}", self.cpu.pc()),
            "machine reset"
        );
    }

    /// Run until the next yield point.
    ///
    /// # Errors
    ///
    /// Returns `X16Error::Delivery` if `sink` rejects the frame. The frame
    /// stays rendered and no device is stepped further, so the host may
    /// retry with the next call.
    pub fn run_slice<S: VideoSink + ?Sized>(&mut self, sink: &mut S) -> X16Result<RunStatus> {
        if self.halted {
            return Ok(RunStatus::Halted);
        }
        self.slice_cycles = 0;
        self.irq_requested = false;

        loop {
            if self.bus.devices.i2c.smc.take_reset_request() {
                info!("reset requested by SMC");
                self.reset();
            }
            if self.bus.devices.i2c.smc.take_nmi_request() {
                debug!("NMI requested by SMC");
                self.cpu.nmi();
            }

            self.cpu.execute_instruction(&mut self.bus);
            let delta = self.clock.elapsed_cycles(&self.cpu);
            self.slice_cycles += u64::from(delta.get());

            if self.step_devices(delta) {
                return self.deliver_frame(sink);
            }

            self.irq_requested = self.interrupts.any_irq_asserted(&self.bus.devices);
            if self.irq_requested {
                self.cpu.interrupt();
            }

            if self.halt_reached() {
                self.halted = true;
                info!(
                    pc = format_args!("${:04X}", self.cpu.pc()),
                    cycles = self.cpu.cycles().get(),
                    "machine halted"
                );
                return Ok(RunStatus::Halted);
            }
        }
    }

    /// Step every fitted device by `delta`. Returns true if the video chip
    /// crossed a frame boundary.
    fn step_devices(&mut self, delta: Cycles) -> bool {
        let mut frame_ready = false;
        for &slot in &self.step_order {
            if let Some(device) = self.bus.devices.get_mut(slot) {
                frame_ready |= device.advance(self.speed, delta).is_frame_boundary();
            }
        }
        frame_ready
    }

    fn deliver_frame<S: VideoSink + ?Sized>(&mut self, sink: &mut S) -> X16Result<RunStatus> {
        let video = &mut self.bus.devices.video;
        video.render_frame();
        if !sink.present_frame(video.frame()) {
            warn!(frame = video.frame_count(), "host rejected video frame");
            return Err(X16Error::Delivery("video frame"));
        }
        self.frames_delivered += 1;
        trace!(
            frame = video.frame_count(),
            cycles = self.slice_cycles,
            "frame ready"
        );
        Ok(RunStatus::FrameReady)
    }

    fn halt_reached(&self) -> bool {
        let at_sentinel = self
            .halt_sentinel
            .is_some_and(|pc| self.cpu.pc() == u32::from(pc));
        at_sentinel || self.bus.devices.i2c.smc.power_off_requested()
    }

    /// Change the CPU clock. Devices pick the new rate up on their next
    /// step; fractional phase carried from the old rate is kept.
    ///
    /// # Errors
    ///
    /// Returns `X16Error::Configuration` for 0 or more than 40 MHz.
    pub fn set_speed(&mut self, mhz: u8) -> X16Result<()> {
        if mhz == 0 || mhz > crate::config::MAX_MHZ {
            return Err(X16Error::Configuration(format!(
                "mhz must be 1..={}, got {mhz}",
                crate::config::MAX_MHZ
            )));
        }
        self.speed = Speed::from_mhz(mhz);
        debug!(mhz, "speed changed");
        Ok(())
    }

    #[must_use]
    pub fn speed(&self) -> Speed {
        self.speed
    }

    /// Cycles consumed by the current or most recent slice.
    #[must_use]
    pub fn slice_cycles(&self) -> u64 {
        self.slice_cycles
    }

    /// The delta fed to devices in the most recent iteration.
    #[must_use]
    pub fn last_delta(&self) -> Cycles {
        self.clock.last_delta()
    }

    /// Whether the last iteration that aggregated interrupts found one.
    #[must_use]
    pub fn irq_requested(&self) -> bool {
        self.irq_requested
    }

    #[must_use]
    pub fn is_halted(&self) -> bool {
        self.halted
    }

    #[must_use]
    pub fn frames_delivered(&self) -> u64 {
        self.frames_delivered
    }

    /// Fitted devices in the order they are stepped.
    #[must_use]
    pub fn step_order(&self) -> &[Slot] {
        &self.step_order
    }

    #[must_use]
    pub fn interrupts(&self) -> &InterruptAggregator {
        &self.interrupts
    }

    #[must_use]
    pub fn cpu(&self) -> &C {
        &self.cpu
    }

    pub fn cpu_mut(&mut self) -> &mut C {
        &mut self.cpu
    }

    #[must_use]
    pub fn bus(&self) -> &X16Bus {
        &self.bus
    }

    pub fn bus_mut(&mut self) -> &mut X16Bus {
        &mut self.bus
    }
}

impl<C: Cpu> Observable for Scheduler<C> {
    fn query(&self, path: &str) -> Option<Value> {
        let devices = &self.bus.devices;
        if let Some(rest) = path.strip_prefix("memory.") {
            return parse_address(rest).map(|addr| Value::U8(self.bus.peek(addr)));
        }
        match path {
            "cpu.pc" => Some(self.cpu.pc().into()),
            "cpu.cycles" | "clock.cycles" => Some(self.cpu.cycles().get().into()),
            "clock.delta" => Some(self.last_delta().get().into()),
            "clock.mhz" => Some(self.speed.mhz().into()),
            "slice.cycles" => Some(self.slice_cycles.into()),
            "video.frame_count" => Some(devices.video.frame_count().into()),
            "video.scanline" => Some(devices.video.scanline().into()),
            "video.isr" => Some(devices.video.isr().into()),
            "via1.ifr" => Some(devices.via1.ifr().into()),
            "via1.ier" => Some(devices.via1.ier().into()),
            "via2.ifr" => devices.via2.as_ref().map(|via| via.ifr().into()),
            "rtc.seconds" => Some(devices.i2c.rtc.seconds().into()),
            "audio.pending" => Some((devices.audio.frames_pending() as u64).into()),
            "irq" => Some(self.irq_requested.into()),
            "irq.sources" => Some(Value::List(
                self.interrupts
                    .asserted_sources(devices)
                    .into_iter()
                    .map(|slot| slot.name().into())
                    .collect(),
            )),
            "halted" => Some(self.halted.into()),
            "step_order" => Some(Value::List(
                self.step_order.iter().map(|slot| slot.name().into()).collect(),
            )),
            _ => None,
        }
    }

    fn query_paths(&self) -> &'static [&'static str] {
        &[
            "cpu.pc",
            "cpu.cycles",
            "clock.cycles",
            "clock.delta",
            "clock.mhz",
            "slice.cycles",
            "video.frame_count",
            "video.scanline",
            "video.isr",
            "via1.ifr",
            "via1.ier",
            "via2.ifr",
            "rtc.seconds",
            "audio.pending",
            "irq",
            "irq.sources",
            "halted",
            "step_order",
            "memory.<address>",
        ]
    }
}
