//! Acquisition engine for the STM32 Touch Sensing Controller.
//!
//! This controller is the same across several STM32 families, and this driver
//! endeavors to support them all -- though it may not have a complete list now
//! it can readily be extended.
//!
//! When you create a Tsc object, it accesses the TSC registers directly. This
//! goes somewhat against the pattern of singleton peripherals, obtained from
//! one `take()` call, but it seems to be necessary. If the crate accepts a TSC
//! RegisterBlock from the user, we will run into versioning problems because there
//! doesn't appear to be any way to ensure that the `touch` crate uses the same
//! version of the PAC crate as the top-level or HAL crate. Don't touch the TSC
//! registers anywhere else in the application.
//!
//! The driver never waits for the peripheral. It is stepped through a bank table by
//! the [`crate::sequencer::BankSequencer`] via the [`Acquisition`] trait.

use core::convert::Infallible;

use crate::bank::{check_groups, slots_required, Acquisition, Bank, GROUPS};
use crate::Error;

#[cfg(feature="stm32f0x1")]
use stm32f0::stm32f0x1 as pac;
#[cfg(feature="stm32f303")]
use stm32f3::stm32f303 as pac;

/// Analog groups present on the selected chip
#[cfg(feature="stm32f0x1")]
pub const CHIP_GROUPS: usize = 6;
#[cfg(feature="stm32f303")]
pub const CHIP_GROUPS: usize = 8;

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, Debug)]
pub struct Config {
    pub clock_prescale: Option<ClockPrescaler>,
    pub max_count: Option<MaxCount>,
    pub charge_transfer_high: Option<ChargeDischargeTime>,
    pub charge_transfer_low: Option<ChargeDischargeTime>,
    /// Spread spectrum deviation, in TSC clock periods. None disables spread spectrum.
    pub spread_spectrum: Option<u8>,
}

impl Config {
    pub const fn default() -> Self {
        Self {
            clock_prescale: None,
            max_count: None,
            charge_transfer_high: None,
            charge_transfer_low: None,
            spread_spectrum: Some(DEFAULT_SSD),
        }
    }
}

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, Debug)]
pub enum ClockPrescaler {
    Hclk = 0b000,
    HclkDiv2 = 0b001,
    HclkDiv4 = 0b010,
    HclkDiv8 = 0b011,
    HclkDiv16 = 0b100,
    HclkDiv32 = 0b101,
    HclkDiv64 = 0b110,
    HclkDiv128 = 0b111,
}

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, Debug)]
/// How many tsc cycles are spent charging / discharging
pub enum ChargeDischargeTime {
    C1 = 0b0000,
    C2 = 0b0001,
    C3 = 0b0010,
    C4 = 0b0011,
    C5 = 0b0100,
    C6 = 0b0101,
    C7 = 0b0110,
    C8 = 0b0111,
    C9 = 0b1000,
    C10 = 0b1001,
    C11 = 0b1010,
    C12 = 0b1011,
    C13 = 0b1100,
    C14 = 0b1101,
    C15 = 0b1110,
    C16 = 0b1111,
}

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, Debug)]
pub enum MaxCount {
    /// 000: 255
    U255 = 0b000,
    /// 001: 511
    U511 = 0b001,
    /// 010: 1023
    U1023 = 0b010,
    /// 011: 2047
    U2047 = 0b011,
    /// 100: 4095
    U4095 = 0b100,
    /// 101: 8191
    U8191 = 0b101,
    /// 110: 16383
    U16383 = 0b110,
}

impl MaxCount {
    pub const fn to_count(&self) -> u16 {
        match self {
            Self::U255 => 255,
            Self::U511 => 511,
            Self::U1023 => 1023,
            Self::U2047 => 2047,
            Self::U4095 => 4095,
            Self::U8191 => 8191,
            Self::U16383 => 16383,
        }
    }
}

/// Default value for charge tranfer high time if not provided
const DEFAULT_CTPH: ChargeDischargeTime = ChargeDischargeTime::C2;
/// Default value for charge tranfer low time if not provided
const DEFAULT_CTPL: ChargeDischargeTime = ChargeDischargeTime::C2;
/// Default input clock divider if not provided
const DEFAULT_PRESCALE: ClockPrescaler = ClockPrescaler::HclkDiv16;
/// Default max count setting if not provided
const DEFAULT_MAX_COUNT: MaxCount = MaxCount::U8191;

/// Default spread spectrum deviation
const DEFAULT_SSD: u8 = 16;

pub struct Tsc<'a> {
    tsc: &'static pac::tsc::RegisterBlock,
    banks: &'a [Bank],
    slots: usize,
    max_count: u16,
}

impl<'a> Tsc<'a> {
    /// Enable and configure the peripheral for acquiring `banks`
    ///
    /// Fails without touching the peripheral if `banks` uses an analog group the
    /// chip lacks.
    pub fn new(config: Option<Config>, banks: &'a [Bank]) -> Result<Self, Error> {
        check_groups(banks, CHIP_GROUPS)?;

        // Enable the TSC periph clock
        let rcc = unsafe { &*pac::RCC::ptr() };
        rcc.ahbenr.modify(|_, w| w.tscen().set_bit());
        rcc.ahbrstr.modify(|_, w| w.tscrst().set_bit());
        rcc.ahbrstr.modify(|_, w| w.tscrst().clear_bit());

        let config = config.unwrap_or(Config::default());

        let max_count = config.max_count.unwrap_or(DEFAULT_MAX_COUNT);
        let tsc = unsafe { &*pac::TSC::ptr() };

        tsc.cr.write(|w| unsafe {
            w.ctph().bits(config.charge_transfer_high.unwrap_or(DEFAULT_CTPH) as u8)
            .ctpl().bits(config.charge_transfer_low.unwrap_or(DEFAULT_CTPL) as u8)
            .sse().bit(config.spread_spectrum.is_some())
            .ssd().bits(config.spread_spectrum.unwrap_or(0) & 0x7f)
            .pgpsc().bits(config.clock_prescale.unwrap_or(DEFAULT_PRESCALE) as u8)
            .mcv().bits(max_count as u8)
            .tsce().set_bit()
        });

        Ok(Self {
            tsc,
            banks,
            slots: slots_required(banks),
            max_count: max_count.to_count(),
        })
    }

    /// Poll flags to see if acquisition has completed
    ///
    /// Returns true if the acquisition is done
    pub fn is_finished(&self) -> bool {
        let isr = self.tsc.isr.read();
        isr.eoaf().bit_is_set() || isr.mcef().bit_is_set()
    }

    /// Read the acquired value for a single group from the last acquisition
    ///
    /// If the capacitance is too low, the MaxCount value may be reached before the
    /// charge threshold. In the case, the peripheral stops acquisition and sets a
    /// flag indication the MaxCountError. Any group which reaches max count will
    /// return a value of MAX_COUNT + 1.
    ///
    /// group: The group number to read, starting at 1
    pub fn read_group(&self, group: usize) -> u16 {
        // Status bits indicate if the group completed successfully. Any group not completed
        // when MAX COUNT is reached will not be set.
        let group_status = self.tsc.iogcsr.read().bits() >> 16;

        if group_status & (1 << (group - 1)) == 0 {
            self.max_count + 1
        } else {
            match group {
                1 => self.tsc.iog1cr.read().cnt().bits(),
                2 => self.tsc.iog2cr.read().cnt().bits(),
                3 => self.tsc.iog3cr.read().cnt().bits(),
                4 => self.tsc.iog4cr.read().cnt().bits(),
                5 => self.tsc.iog5cr.read().cnt().bits(),
                6 => self.tsc.iog6cr.read().cnt().bits(),
                #[cfg(feature="stm32f303")]
                7 => self.tsc.iog7cr.read().cnt().bits(),
                #[cfg(feature="stm32f303")]
                8 => self.tsc.iog8cr.read().cnt().bits(),
                // Rejected by `Tsc::new`
                _ => 0,
            }
        }
    }

    /// Clear interrupt flags
    pub fn clear_flags(&mut self) {
        self.tsc.icr.write(|w| {
            w.eoaic().set_bit() // end-of-acquisition
            .mceic().set_bit() // max-count-error
        });
    }
}

impl Acquisition for Tsc<'_> {
    fn banks(&self) -> usize {
        self.banks.len()
    }

    fn slots(&self) -> usize {
        self.slots
    }

    fn configure(&mut self, bank: usize) {
        let sampling = &self.banks[bank].sampling;
        let mut iogcsr: u32 = 0;
        let mut ioscr: u32 = 0;
        let mut ioccr: u32 = 0;

        for group in 1..=GROUPS {
            if sampling.enabled(group) {
                let shift = (group - 1) * 4;
                // Enable the group
                iogcsr |= 1 << (group - 1);
                // Set the sample cap input
                ioscr |= 1 << (shift + sampling.sample_io(group) as usize - 1);
                // Enable the inputs
                ioccr |= (sampling.channel_mask(group) as u32) << shift;
            }
        }

        self.tsc.iogcsr.write(|w| unsafe { w.bits(iogcsr) });
        self.tsc.ioscr.write(|w| unsafe { w.bits(ioscr) });
        self.tsc.ioccr.write(|w| unsafe { w.bits(ioccr) });
        // Schmitt triggers stay enabled only on IOs not used by this bank
        self.tsc.iohcr.write(|w| unsafe { w.bits(!(ioscr | ioccr)) });
    }

    fn start(&mut self) {
        self.clear_flags();
        self.tsc.cr.modify(|_, w| w.iodef().clear_bit());
        self.tsc.cr.modify(|_, w| w.start().set_bit());
    }

    fn poll(&mut self) -> nb::Result<(), Infallible> {
        if self.is_finished() {
            Ok(())
        } else {
            Err(nb::Error::WouldBlock)
        }
    }

    fn collect(&mut self, bank: usize, results: &mut [u16]) {
        for (group, slot) in self.banks[bank].measured() {
            results[slot] = self.read_group(group);
        }
        self.clear_flags();
    }
}
