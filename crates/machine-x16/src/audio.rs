//! Audio mixer: sample timing only.
//!
//! The mixer turns elapsed CPU cycles into a count of stereo output frames
//! at the configured sample rate and queues them for the host. Waveform
//! synthesis is not modelled, so every frame is silence; what matters is
//! that the sample count stays locked to the CPU clock.

use emu_core::{Cycles, Device, Speed, Step};

/// Samples per frame (interleaved left/right).
pub const CHANNELS: usize = 2;

/// Frames held before the oldest output is dropped. A quarter second at
/// 48 kHz.
pub const MAX_PENDING_FRAMES: usize = 12_000;

/// Receives interleaved stereo sample batches.
pub trait AudioSink {
    /// Returns false if the host rejected the batch.
    fn play_batch(&mut self, samples: &[i16]) -> bool;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioMixer {
    sample_rate: u32,
    /// Remainder of `cycles * sample_rate` not yet worth a whole frame,
    /// in units of 1/cpu_hz.
    phase: u64,
    buffer: Vec<i16>,
    dropped_frames: u64,
}

impl AudioMixer {
    #[must_use]
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            phase: 0,
            buffer: Vec::new(),
            dropped_frames: 0,
        }
    }

    #[must_use]
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Stereo frames waiting for the host.
    #[must_use]
    pub fn frames_pending(&self) -> usize {
        self.buffer.len() / CHANNELS
    }

    /// Frames discarded because the host stopped draining.
    #[must_use]
    pub fn dropped_frames(&self) -> u64 {
        self.dropped_frames
    }

    /// Queued interleaved samples, oldest first.
    #[must_use]
    pub fn pending_samples(&self) -> &[i16] {
        &self.buffer
    }

    /// Forget the queued samples once the host has them.
    pub fn clear_samples(&mut self) {
        self.buffer.clear();
    }

    fn push_silence(&mut self, frames: u64) {
        let room = (MAX_PENDING_FRAMES - self.frames_pending()) as u64;
        let kept = frames.min(room);
        self.dropped_frames += frames - kept;
        let samples = kept as usize * CHANNELS;
        self.buffer.resize(self.buffer.len() + samples, 0);
    }
}

impl Device for AudioMixer {
    fn step(&mut self, speed: Speed, delta: Cycles) -> Step {
        let cpu_hz = speed.cycles_per_second();
        self.phase += u64::from(delta.get()) * u64::from(self.sample_rate);
        let frames = self.phase / cpu_hz;
        self.phase %= cpu_hz;
        if frames > 0 {
            self.push_silence(frames);
        }
        Step::Idle
    }

    /// Free-running: queued output belongs to the host and survives a
    /// machine reset.
    fn reset(&mut self) {}
}
