//! The machine's peripherals and their fixed step order.

use emu_core::{Device, DeviceMut};

use crate::audio::AudioMixer;
use crate::config::X16Config;
use crate::i2c::I2cBus;
use crate::midi::MidiUart;
use crate::spi::SpiController;
use mos_via_6522::Via;
use crate::video::Video;

/// VIA1 port A bit driving SDA (open drain).
pub const I2C_SDA: u8 = 0x01;
/// VIA1 port A bit driving SCL (open drain).
pub const I2C_SCL: u8 = 0x02;

/// Names a peripheral position. The scheduler iterates lists of these
/// rather than hard-coding calls, so the order is data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slot {
    Via1,
    Spi,
    Video,
    Via2,
    I2c,
    Rtc,
    Audio,
    Midi,
}

impl Slot {
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Via1 => "via1",
            Self::Spi => "spi",
            Self::Video => "video",
            Self::Via2 => "via2",
            Self::I2c => "i2c",
            Self::Rtc => "rtc",
            Self::Audio => "audio",
            Self::Midi => "midi",
        }
    }
}

/// Step order: batch devices, then the edge-sampled I2C bus, then the
/// fixed-interval devices.
pub const STEP_ORDER: [Slot; 8] = [
    Slot::Via1,
    Slot::Spi,
    Slot::Video,
    Slot::Via2,
    Slot::I2c,
    Slot::Rtc,
    Slot::Audio,
    Slot::Midi,
];

/// Reset order: bus controllers first, the CPU-facing VIAs last. RTC and
/// audio are free-running and their resets keep state.
pub const RESET_ORDER: [Slot; 8] = [
    Slot::I2c,
    Slot::Midi,
    Slot::Spi,
    Slot::Video,
    Slot::Via1,
    Slot::Via2,
    Slot::Rtc,
    Slot::Audio,
];

pub struct Devices {
    pub via1: Via,
    pub via2: Option<Via>,
    pub video: Video,
    pub spi: SpiController,
    /// Owns the SMC and the RTC.
    pub i2c: I2cBus,
    pub audio: AudioMixer,
    pub midi: Option<MidiUart>,
}

impl Devices {
    #[must_use]
    pub fn new(config: &X16Config) -> Self {
        Self {
            via1: Via::new(),
            via2: config.has_via2.then(Via::new),
            video: Video::new(),
            spi: SpiController::new(),
            i2c: I2cBus::new(),
            audio: AudioMixer::new(config.audio_sample_rate),
            midi: config.midi_card.then(MidiUart::new),
        }
    }

    /// Is the peripheral in `slot` fitted?
    #[must_use]
    pub fn present(&self, slot: Slot) -> bool {
        match slot {
            Slot::Via2 => self.via2.is_some(),
            Slot::Midi => self.midi.is_some(),
            _ => true,
        }
    }

    /// Mutable handle for stepping or resetting; `None` if not fitted.
    pub fn get_mut(&mut self, slot: Slot) -> Option<DeviceMut<'_>> {
        Some(match slot {
            Slot::Via1 => DeviceMut::Batch(&mut self.via1),
            Slot::Spi => DeviceMut::Batch(&mut self.spi),
            Slot::Video => DeviceMut::Batch(&mut self.video),
            Slot::Via2 => DeviceMut::Batch(self.via2.as_mut()?),
            Slot::I2c => DeviceMut::Edge(&mut self.i2c),
            Slot::Rtc => DeviceMut::Batch(&mut self.i2c.rtc),
            Slot::Audio => DeviceMut::Batch(&mut self.audio),
            Slot::Midi => DeviceMut::Batch(self.midi.as_mut()?),
        })
    }

    /// Batch device in `slot`. The I2C bus has no interrupt line and
    /// yields `None`.
    #[must_use]
    pub fn get(&self, slot: Slot) -> Option<&dyn Device> {
        match slot {
            Slot::Via1 => Some(&self.via1),
            Slot::Spi => Some(&self.spi),
            Slot::Video => Some(&self.video),
            Slot::Via2 => self.via2.as_ref().map(|via| via as &dyn Device),
            Slot::I2c => None,
            Slot::Rtc => Some(&self.i2c.rtc),
            Slot::Audio => Some(&self.audio),
            Slot::Midi => self.midi.as_ref().map(|uart| uart as &dyn Device),
        }
    }

    /// Level of the interrupt line in `slot`. Absent devices do not assert.
    #[must_use]
    pub fn irq_line(&self, slot: Slot) -> bool {
        self.get(slot).is_some_and(|device| device.irq_asserted())
    }

    pub fn read_via1(&mut self, reg: u8) -> u8 {
        if matches!(reg & 0x0F, 0x01 | 0x0F) {
            let mut lines = 0;
            if self.i2c.sda() {
                lines |= I2C_SDA;
            }
            if self.i2c.scl() {
                lines |= I2C_SCL;
            }
            self.via1.external_a = (self.via1.external_a & !(I2C_SDA | I2C_SCL)) | lines;
        }
        self.via1.read(reg)
    }

    pub fn write_via1(&mut self, reg: u8, value: u8) {
        self.via1.write(reg, value);
        if matches!(reg & 0x0F, 0x01 | 0x03 | 0x0F) {
            self.sync_i2c_lines();
        }
    }

    /// Drive the I2C lines from VIA1 port A. A line is pulled low only
    /// when its bit is an output holding 0.
    pub fn sync_i2c_lines(&mut self) {
        let pulled_low = self.via1.ddr_a() & !self.via1.port_a();
        self.i2c
            .set_lines(pulled_low & I2C_SDA == 0, pulled_low & I2C_SCL == 0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn optional_devices_follow_config() {
        let config = X16Config {
            has_via2: true,
            ..X16Config::default()
        };
        let mut devices = Devices::new(&config);
        assert!(devices.present(Slot::Via2));
        assert!(!devices.present(Slot::Midi));
        assert!(devices.get_mut(Slot::Midi).is_none());
        assert!(devices.get_mut(Slot::Via2).is_some());
        assert!(!devices.irq_line(Slot::Midi));
    }

    #[test]
    fn every_slot_appears_once_in_each_order() {
        for order in [STEP_ORDER, RESET_ORDER] {
            for slot in STEP_ORDER {
                assert_eq!(order.iter().filter(|s| **s == slot).count(), 1);
            }
        }
    }

    #[test]
    fn via1_port_a_drives_i2c_open_drain() {
        let mut devices = Devices::new(&X16Config::default());
        assert!(devices.i2c.sda() && devices.i2c.scl());

        // Output register holds 0; making SCL an output pulls it low.
        devices.write_via1(0x01, 0x00);
        devices.write_via1(0x03, I2C_SCL);
        assert!(devices.i2c.sda());
        assert!(!devices.i2c.scl());
        assert_eq!(devices.read_via1(0x0F) & (I2C_SDA | I2C_SCL), I2C_SDA);

        devices.write_via1(0x03, 0x00);
        assert!(devices.i2c.scl());
    }

    #[test]
    fn irq_line_reflects_device() {
        let mut devices = Devices::new(&X16Config::default());
        assert!(!devices.irq_line(Slot::Via1));
        devices.via1.write(0x0E, 0x80 | mos_via_6522::IFR_T1);
        devices.via1.raise(mos_via_6522::IFR_T1);
        assert!(devices.irq_line(Slot::Via1));
        assert!(!devices.irq_line(Slot::I2c));
    }
}
