//! Host-facing lifecycle: negotiate, run once per refresh, snapshot.
//!
//! A host (a libretro-style frontend, a test harness, the headless binary)
//! implements [`Host`] and drives a [`Frontend`]: `load` once, then `run`
//! once per display refresh. Everything else is optional.

use emu_core::Cpu;
use tracing::{debug, warn};

use crate::audio::AudioSink;
use crate::config::X16Config;
use crate::error::{X16Error, X16Result};
use crate::scheduler::{RunStatus, Scheduler};
use crate::snapshot::{SNAPSHOT_SIZE, SessionState};
use crate::video::{FRAME_RATE, SCREEN_HEIGHT, SCREEN_WIDTH, VideoSink};

pub const SYSTEM_NAME: &str = "x16-emulator";

/// Framebuffer formats a host may offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    Rgb565,
    Xrgb8888,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemInfo {
    pub name: &'static str,
    pub version: &'static str,
    pub need_fullpath: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AvInfo {
    pub fps: f64,
    pub sample_rate: f64,
    pub base_width: u32,
    pub base_height: u32,
    pub max_width: u32,
    pub max_height: u32,
    pub aspect_ratio: f32,
}

/// Directional input for one refresh, each axis -1, 0 or 1.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Input {
    pub dx: i8,
    pub dy: i8,
}

/// Everything the machine needs from the outside world.
pub trait Host: VideoSink + AudioSink {
    /// Ask for a framebuffer format. Returns false if unsupported.
    fn set_pixel_format(&mut self, format: PixelFormat) -> bool;

    /// Sample input for the coming refresh.
    fn poll_input(&mut self) -> Input {
        Input::default()
    }

    /// Bytes the MIDI card sent during the last refresh.
    fn send_midi(&mut self, _bytes: &[u8]) {}
}

pub struct Frontend<C: Cpu> {
    scheduler: Scheduler<C>,
    session: SessionState,
    loaded: bool,
}

impl<C: Cpu> Frontend<C> {
    /// # Errors
    ///
    /// Returns `X16Error::Configuration` if `config` fails validation.
    pub fn new(cpu: C, config: &X16Config) -> X16Result<Self> {
        Ok(Self {
            scheduler: Scheduler::new(cpu, config)?,
            session: SessionState::default(),
            loaded: false,
        })
    }

    #[must_use]
    pub fn system_info() -> SystemInfo {
        SystemInfo {
            name: SYSTEM_NAME,
            version: env!("CARGO_PKG_VERSION"),
            need_fullpath: false,
        }
    }

    #[must_use]
    pub fn av_info(&self) -> AvInfo {
        AvInfo {
            fps: FRAME_RATE,
            sample_rate: f64::from(self.scheduler.bus().devices.audio.sample_rate()),
            base_width: SCREEN_WIDTH,
            base_height: SCREEN_HEIGHT,
            max_width: SCREEN_WIDTH,
            max_height: SCREEN_HEIGHT,
            aspect_ratio: 4.0 / 3.0,
        }
    }

    /// Agree on XRGB8888 with the host and reset the machine.
    ///
    /// # Errors
    ///
    /// Returns `X16Error::Configuration` if the host refuses the format.
    /// Nothing has run at that point.
    pub fn load<H: Host + ?Sized>(&mut self, host: &mut H) -> X16Result<()> {
        if !host.set_pixel_format(PixelFormat::Xrgb8888) {
            warn!("host refused XRGB8888");
            return Err(X16Error::Configuration(
                "host does not support XRGB8888".to_owned(),
            ));
        }
        debug!("pixel format XRGB8888 accepted");
        self.loaded = true;
        self.reset();
        Ok(())
    }

    /// One refresh: poll input, run a slice, then hand the MIDI output and
    /// audio produced during it to the host.
    ///
    /// # Errors
    ///
    /// `X16Error::Configuration` before a successful `load`;
    /// `X16Error::Delivery` if the host rejects the frame or the audio.
    /// Rejected audio stays queued and goes out with the next batch.
    pub fn run<H: Host + ?Sized>(&mut self, host: &mut H) -> X16Result<RunStatus> {
        if !self.loaded {
            return Err(X16Error::Configuration("run before load".to_owned()));
        }
        let input = host.poll_input();
        self.session.nudge(input.dx, input.dy);

        let status = self.scheduler.run_slice(host)?;

        let devices = &mut self.scheduler.bus_mut().devices;
        if let Some(uart) = devices.midi.as_mut() {
            let bytes = uart.take_transmitted();
            if !bytes.is_empty() {
                host.send_midi(&bytes);
            }
        }

        let audio = &mut devices.audio;
        let samples = audio.pending_samples();
        if !samples.is_empty() {
            if !host.play_batch(samples) {
                warn!(samples = samples.len(), "host rejected audio batch");
                return Err(X16Error::Delivery("audio batch"));
            }
            audio.clear_samples();
        }
        Ok(status)
    }

    /// Clear the session and reset the machine.
    pub fn reset(&mut self) {
        self.session.reset();
        self.scheduler.reset();
    }

    #[must_use]
    pub fn serialize_size(&self) -> usize {
        SNAPSHOT_SIZE
    }

    /// # Errors
    ///
    /// Returns `X16Error::Size` if `buf` is shorter than `serialize_size()`.
    pub fn serialize(&self, buf: &mut [u8]) -> X16Result<()> {
        self.session.serialize(buf)
    }

    /// # Errors
    ///
    /// Returns `X16Error::Size` unless `buf` is exactly `serialize_size()`
    /// bytes; the session is then unchanged.
    pub fn deserialize(&mut self, buf: &[u8]) -> X16Result<()> {
        self.session.deserialize(buf)
    }

    #[must_use]
    pub fn session(&self) -> SessionState {
        self.session
    }

    #[must_use]
    pub fn scheduler(&self) -> &Scheduler<C> {
        &self.scheduler
    }

    pub fn scheduler_mut(&mut self) -> &mut Scheduler<C> {
        &mut self.scheduler
    }
}
