//! Machine configuration.
//!
//! Loaded from JSON; every field is optional and falls back to the stock
//! machine.

use std::fs;
use std::path::Path;

use emu_core::Speed;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{X16Error, X16Result};

/// Fastest supported CPU clock in MHz.
pub const MAX_MHZ: u8 = 40;

/// Most 8 KiB RAM banks the bank register can select.
pub const MAX_RAM_BANKS: u16 = 256;

/// Halt sentinel used by the stock boot ROM.
pub const DEFAULT_HALT_SENTINEL: u16 = 0xFFFF;

/// Machine configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct X16Config {
    /// CPU clock in MHz (the speed multiplier). 1..=40.
    pub mhz: u8,
    /// Second VIA fitted.
    pub has_via2: bool,
    /// MIDI UART card fitted and wired to the IRQ line.
    pub midi_card: bool,
    /// Number of 8 KiB banked RAM pages. 1..=256.
    pub ram_banks: u16,
    /// Program counter value that ends a run. `null` disables the check.
    pub halt_sentinel: Option<u16>,
    /// Audio mixer output rate in Hz.
    pub audio_sample_rate: u32,
}

impl Default for X16Config {
    fn default() -> Self {
        Self {
            mhz: 8,
            has_via2: false,
            midi_card: false,
            ram_banks: 64,
            halt_sentinel: Some(DEFAULT_HALT_SENTINEL),
            audio_sample_rate: 48_000,
        }
    }
}

impl X16Config {
    /// Parse and validate a JSON configuration.
    pub fn from_json_str(text: &str) -> X16Result<Self> {
        let config: Self = serde_json::from_str(text)
            .map_err(|e| X16Error::Configuration(format!("invalid config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON configuration file.
    pub fn load(path: &Path) -> X16Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| {
            X16Error::Configuration(format!("cannot read {}: {e}", path.display()))
        })?;
        let config = Self::from_json_str(&text)?;
        debug!(path = %path.display(), ?config, "loaded configuration");
        Ok(config)
    }

    /// Reject values the machine cannot run with.
    pub fn validate(&self) -> X16Result<()> {
        if self.mhz == 0 || self.mhz > MAX_MHZ {
            return Err(X16Error::Configuration(format!(
                "mhz must be 1..={MAX_MHZ}, got {}",
                self.mhz
            )));
        }
        if self.ram_banks == 0 || self.ram_banks > MAX_RAM_BANKS {
            return Err(X16Error::Configuration(format!(
                "ram_banks must be 1..={MAX_RAM_BANKS}, got {}",
                self.ram_banks
            )));
        }
        let cpu_hz = self.speed().cycles_per_second();
        if self.audio_sample_rate == 0 || u64::from(self.audio_sample_rate) > cpu_hz {
            return Err(X16Error::Configuration(format!(
                "audio_sample_rate must be 1..={cpu_hz}, got {}",
                self.audio_sample_rate
            )));
        }
        Ok(())
    }

    #[must_use]
    pub fn speed(&self) -> Speed {
        Speed::from_mhz(self.mhz)
    }
}
