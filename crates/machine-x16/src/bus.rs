//! X16 bus: memory banking and I/O routing.
//!
//! | Range         | Contents                                   |
//! |---------------|--------------------------------------------|
//! | `$0000`       | RAM bank register                          |
//! | `$0001`       | ROM bank register                          |
//! | `$0002-$9EFF` | fixed RAM                                  |
//! | `$9F00-$9FFF` | I/O page                                   |
//! | `$A000-$BFFF` | banked RAM, 8 KiB window                   |
//! | `$C000-$FFFF` | banked ROM, 16 KiB window                  |
//!
//! I/O page: VIA1 `$9F00`, VIA2 `$9F10`, video `$9F20-$9F3D`, SPI
//! `$9F3E-$9F3F`, MIDI UART `$9F60`. Anything unfitted reads as open bus.

use emu_core::Bus;

use crate::config::X16Config;
use crate::devices::Devices;
use crate::error::{X16Error, X16Result};

pub const RAM_BANK_SIZE: usize = 0x2000;
pub const ROM_BANK_SIZE: usize = 0x4000;
pub const ROM_BANKS: usize = 32;
pub const ROM_SIZE: usize = ROM_BANK_SIZE * ROM_BANKS;

const FIXED_RAM_END: u16 = 0x9EFF;
const OPEN_BUS: u8 = 0xFF;

pub struct X16Bus {
    fixed_ram: Vec<u8>,
    banked_ram: Vec<u8>,
    rom: Vec<u8>,
    ram_banks: usize,
    ram_bank: u8,
    rom_bank: u8,
    pub devices: Devices,
}

impl X16Bus {
    #[must_use]
    pub fn new(config: &X16Config) -> Self {
        let ram_banks = usize::from(config.ram_banks.max(1));
        Self {
            fixed_ram: vec![0; usize::from(FIXED_RAM_END) + 1],
            banked_ram: vec![0; ram_banks * RAM_BANK_SIZE],
            rom: vec![0; ROM_SIZE],
            ram_banks,
            ram_bank: 0,
            rom_bank: 0,
            devices: Devices::new(config),
        }
    }

    /// Copy a ROM image into the ROM banks, starting at bank 0.
    ///
    /// # Errors
    ///
    /// Returns `X16Error::Configuration` if the image exceeds 512 KiB.
    pub fn load_rom(&mut self, image: &[u8]) -> X16Result<()> {
        if image.len() > ROM_SIZE {
            return Err(X16Error::Configuration(format!(
                "ROM image is {} bytes, at most {ROM_SIZE} fit",
                image.len()
            )));
        }
        self.rom[..image.len()].copy_from_slice(image);
        Ok(())
    }

    /// Bank registers back to 0. RAM and ROM contents survive.
    pub fn reset_banks(&mut self) {
        self.ram_bank = 0;
        self.rom_bank = 0;
    }

    #[must_use]
    pub fn ram_bank(&self) -> u8 {
        self.ram_bank
    }

    #[must_use]
    pub fn rom_bank(&self) -> u8 {
        self.rom_bank
    }

    /// Read memory without side effects. The I/O page reads as open bus.
    #[must_use]
    pub fn peek(&self, addr: u16) -> u8 {
        match addr {
            0x0000 => self.ram_bank,
            0x0001 => self.rom_bank,
            0x0002..=FIXED_RAM_END => self.fixed_ram[usize::from(addr)],
            0x9F00..=0x9FFF => OPEN_BUS,
            0xA000..=0xBFFF => self.banked_ram[self.banked_ram_index(addr)],
            0xC000..=0xFFFF => self.rom[self.rom_index(addr)],
        }
    }

    fn banked_ram_index(&self, addr: u16) -> usize {
        let bank = usize::from(self.ram_bank) % self.ram_banks;
        bank * RAM_BANK_SIZE + usize::from(addr - 0xA000)
    }

    fn rom_index(&self, addr: u16) -> usize {
        let bank = usize::from(self.rom_bank) % ROM_BANKS;
        bank * ROM_BANK_SIZE + usize::from(addr - 0xC000)
    }

    fn io_read(&mut self, addr: u16) -> u8 {
        let devices = &mut self.devices;
        match addr {
            0x9F00..=0x9F0F => devices.read_via1((addr & 0x0F) as u8),
            0x9F10..=0x9F1F => devices
                .via2
                .as_mut()
                .map_or(OPEN_BUS, |via| via.read((addr & 0x0F) as u8)),
            0x9F20..=0x9F3D => devices.video.read((addr - 0x9F20) as u8),
            0x9F3E..=0x9F3F => devices.spi.read((addr - 0x9F3E) as u8),
            0x9F60..=0x9F6F => devices
                .midi
                .as_mut()
                .map_or(OPEN_BUS, |uart| uart.read((addr & 0x0F) as u8)),
            _ => OPEN_BUS,
        }
    }

    fn io_write(&mut self, addr: u16, value: u8) {
        let devices = &mut self.devices;
        match addr {
            0x9F00..=0x9F0F => devices.write_via1((addr & 0x0F) as u8, value),
            0x9F10..=0x9F1F => {
                if let Some(via) = devices.via2.as_mut() {
                    via.write((addr & 0x0F) as u8, value);
                }
            }
            0x9F20..=0x9F3D => devices.video.write((addr - 0x9F20) as u8, value),
            0x9F3E..=0x9F3F => devices.spi.write((addr - 0x9F3E) as u8, value),
            0x9F60..=0x9F6F => {
                if let Some(uart) = devices.midi.as_mut() {
                    uart.write((addr & 0x0F) as u8, value);
                }
            }
            _ => {}
        }
    }
}

impl Bus for X16Bus {
    fn read(&mut self, addr: u16) -> u8 {
        match addr {
            0x9F00..=0x9FFF => self.io_read(addr),
            _ => self.peek(addr),
        }
    }

    fn write(&mut self, addr: u16, value: u8) {
        match addr {
            0x0000 => self.ram_bank = value,
            0x0001 => self.rom_bank = value & 0x1F,
            0x0002..=FIXED_RAM_END => self.fixed_ram[usize::from(addr)] = value,
            0x9F00..=0x9FFF => self.io_write(addr, value),
            0xA000..=0xBFFF => {
                let index = self.banked_ram_index(addr);
                self.banked_ram[index] = value;
            }
            // ROM
            0xC000..=0xFFFF => {}
        }
    }
}
