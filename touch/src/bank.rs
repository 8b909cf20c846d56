//! Acquisition bank topology and the acquisition engine interface.
//!
//! The TSC measures at most one channel per analog group in a single acquisition, so
//! sensors sharing a group have to be spread over several banks. A bank is one
//! hardware pass: the set of (group, channel) pairs acquired together, plus the slot
//! in the shared result storage each group's count lands in.
//!
//! Bank tables are meant to be built in a `static` with the `const fn` builders, so a
//! malformed table is rejected at compile time:
//!
//! ```
//! use touch::bank::{Bank, Channel};
//!
//! static BANKS: [Bank; 2] = [
//!     Bank::new()
//!         .sample(Channel::G1Ch2).channel(Channel::G1Ch1, 0)
//!         .sample(Channel::G2Ch3).channel(Channel::G2Ch1, 1),
//!     Bank::new()
//!         .sample(Channel::G2Ch3).channel(Channel::G2Ch2, 2),
//! ];
//! assert_eq!(touch::bank::slots_required(&BANKS), 3);
//! ```

use core::convert::Infallible;

use crate::Error;

/// Number of analog IO groups on the TSC
pub const GROUPS: usize = 8;

/// Marker for an analog group with no measured channel in a bank
const NO_SLOT: u8 = 0xff;

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Channel {
    G1Ch1 = (1<<4) + 1,
    G1Ch2 = (1<<4) + 2,
    G1Ch3 = (1<<4) + 3,
    G1Ch4 = (1<<4) + 4,
    G2Ch1 = (2<<4) + 1,
    G2Ch2 = (2<<4) + 2,
    G2Ch3 = (2<<4) + 3,
    G2Ch4 = (2<<4) + 4,
    G3Ch1 = (3<<4) + 1,
    G3Ch2 = (3<<4) + 2,
    G3Ch3 = (3<<4) + 3,
    G3Ch4 = (3<<4) + 4,
    G4Ch1 = (4<<4) + 1,
    G4Ch2 = (4<<4) + 2,
    G4Ch3 = (4<<4) + 3,
    G4Ch4 = (4<<4) + 4,
    G5Ch1 = (5<<4) + 1,
    G5Ch2 = (5<<4) + 2,
    G5Ch3 = (5<<4) + 3,
    G5Ch4 = (5<<4) + 4,
    G6Ch1 = (6<<4) + 1,
    G6Ch2 = (6<<4) + 2,
    G6Ch3 = (6<<4) + 3,
    G6Ch4 = (6<<4) + 4,
    G7Ch1 = (7<<4) + 1,
    G7Ch2 = (7<<4) + 2,
    G7Ch3 = (7<<4) + 3,
    G7Ch4 = (7<<4) + 4,
    G8Ch1 = (8<<4) + 1,
    G8Ch2 = (8<<4) + 2,
    G8Ch3 = (8<<4) + 3,
    G8Ch4 = (8<<4) + 4,
}

impl Channel {
    /// Analog group, starting at 1
    pub const fn group(self) -> usize {
        ((self as u8) >> 4) as usize
    }

    /// IO within the group, starting at 1
    pub const fn io(self) -> u8 {
        (self as u8) & 0xf
    }
}

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SampleConfig {
    // Each group is a u8 where bit 7 indicates it is enabled, bits 6:4 hold the IO used
    // as the sample cap (1-4), and bits 3:0 are the mask of IOs enabled for measurement.
    pub groups: [u8; GROUPS],
}

impl SampleConfig {

    /// Create a new sample group with no groups enabled
    pub const fn new() -> Self {
        Self {
            groups: [0; GROUPS],
        }
    }

    pub const fn sample(mut self, sample: Channel) -> Self {
        let group = sample.group();
        assert!(group > 0 && group <= GROUPS);
        assert!(self.groups[group - 1] == 0, "sampling cap already set for this group");
        self.groups[group - 1] = 0x80 | (sample.io() << 4);
        self
    }

    pub const fn channel(mut self, channel: Channel) -> Self {
        let group = channel.group();
        assert!(group > 0 && group <= GROUPS);
        assert!(self.groups[group - 1] != 0, "group has no sampling cap");
        assert!(self.sample_io(group) != channel.io(), "channel is the sampling cap");

        self.groups[group - 1] |= 1 << (channel.io() - 1);
        self
    }

    pub const fn enabled(&self, group: usize) -> bool {
        self.groups[group - 1] & 0x80 != 0
    }

    /// IO used as the sampling capacitor for `group`, starting at 1
    pub const fn sample_io(&self, group: usize) -> u8 {
        (self.groups[group - 1] >> 4) & 0x7
    }

    /// Mask of the IOs measured in `group`
    pub const fn channel_mask(&self, group: usize) -> u8 {
        self.groups[group - 1] & 0xf
    }
}

/// One hardware acquisition pass
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, Debug)]
pub struct Bank {
    pub sampling: SampleConfig,
    slots: [u8; GROUPS],
}

impl Bank {
    pub const fn new() -> Self {
        Self {
            sampling: SampleConfig::new(),
            slots: [NO_SLOT; GROUPS],
        }
    }

    /// Use `sample` as the sampling capacitor of its group
    pub const fn sample(mut self, sample: Channel) -> Self {
        self.sampling = self.sampling.sample(sample);
        self
    }

    /// Measure `channel` in this bank and store its count in result slot `slot`
    pub const fn channel(mut self, channel: Channel, slot: u8) -> Self {
        let group = channel.group();
        assert!(slot != NO_SLOT);
        assert!(self.slots[group - 1] == NO_SLOT, "one measured channel per group and bank");
        self.sampling = self.sampling.channel(channel);
        self.slots[group - 1] = slot;
        self
    }

    /// Result slot for `group` (starting at 1), if the group is measured in this bank
    pub fn slot(&self, group: usize) -> Option<usize> {
        match self.slots[group - 1] {
            NO_SLOT => None,
            slot => Some(slot as usize),
        }
    }

    /// Iterate over the measured groups as `(group, slot)` pairs
    pub fn measured(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        (1..=GROUPS).filter_map(move |group| self.slot(group).map(|slot| (group, slot)))
    }
}

/// Number of result slots needed to hold every channel of `banks`
pub fn slots_required(banks: &[Bank]) -> usize {
    banks
        .iter()
        .flat_map(|bank| bank.measured())
        .map(|(_, slot)| slot + 1)
        .max()
        .unwrap_or(0)
}

/// Check that `banks` only enable analog groups 1 to `available`
pub fn check_groups(banks: &[Bank], available: usize) -> Result<(), Error> {
    let highest = banks
        .iter()
        .flat_map(|bank| (1..=GROUPS).filter(move |group| bank.sampling.enabled(*group)))
        .max()
        .unwrap_or(0);

    if highest > available {
        Err(Error::UnsupportedGroup { group: highest, available })
    } else {
        Ok(())
    }
}

/// Interface to the hardware that measures one bank at a time.
///
/// The engine is given its bank table when it is created; the sequencer only ever
/// refers to banks by index.
pub trait Acquisition {
    /// Number of banks in the topology. Must be at least 1.
    fn banks(&self) -> usize;

    /// Number of result slots `collect` may write
    fn slots(&self) -> usize;

    /// Route the channels of `bank` to the converter
    fn configure(&mut self, bank: usize);

    /// Begin an acquisition of the configured bank
    fn start(&mut self);

    /// Check once for end of acquisition. `WouldBlock` while it is still running.
    fn poll(&mut self) -> nb::Result<(), Infallible>;

    /// Copy the counts of the last acquisition of `bank` into their result slots
    fn collect(&mut self, bank: usize, results: &mut [u16]);
}

impl<A: Acquisition + ?Sized> Acquisition for &mut A {
    fn banks(&self) -> usize {
        (**self).banks()
    }

    fn slots(&self) -> usize {
        (**self).slots()
    }

    fn configure(&mut self, bank: usize) {
        (**self).configure(bank)
    }

    fn start(&mut self) {
        (**self).start()
    }

    fn poll(&mut self) -> nb::Result<(), Infallible> {
        (**self).poll()
    }

    fn collect(&mut self, bank: usize, results: &mut [u16]) {
        (**self).collect(bank, results)
    }
}
