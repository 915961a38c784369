//! Interrupt aggregation.
//!
//! Lines are levels: each device decides for itself whether it is
//! requesting. The aggregator only ORs them, fresh every iteration, with no
//! latching or edge detection of its own.

use crate::config::X16Config;
use crate::devices::{Devices, Slot};

/// Logical OR of a set of interrupt lines.
pub fn any_asserted(lines: impl IntoIterator<Item = bool>) -> bool {
    lines.into_iter().any(|line| line)
}

/// The interrupt-capable slots wired to the CPU's IRQ input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterruptAggregator {
    sources: Vec<Slot>,
}

impl InterruptAggregator {
    /// Video and VIA1 always; VIA2 and the MIDI UART when fitted.
    #[must_use]
    pub fn for_config(config: &X16Config) -> Self {
        let mut sources = vec![Slot::Video, Slot::Via1];
        if config.has_via2 {
            sources.push(Slot::Via2);
        }
        if config.midi_card {
            sources.push(Slot::Midi);
        }
        Self { sources }
    }

    #[must_use]
    pub fn sources(&self) -> &[Slot] {
        &self.sources
    }

    #[must_use]
    pub fn any_irq_asserted(&self, devices: &Devices) -> bool {
        any_asserted(self.sources.iter().map(|&slot| devices.irq_line(slot)))
    }

    /// The sources currently asserting, in wiring order.
    #[must_use]
    pub fn asserted_sources(&self, devices: &Devices) -> Vec<Slot> {
        self.sources
            .iter()
            .copied()
            .filter(|&slot| devices.irq_line(slot))
            .collect()
    }
}
