//! Walks the acquisition engine through its banks, one bit of progress per call.

use crate::bank::Acquisition;
use crate::handshake::SharedResults;
use crate::Error;

/// Outcome of a single [`BankSequencer::step`]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Step {
    /// The current bank is still being acquired
    Pending,
    /// The given bank was acquired and its counts stored
    Collected(usize),
}

pub struct BankSequencer<'r, A, const N: usize> {
    engine: A,
    results: &'r SharedResults<N>,
    banks: usize,
    bank: usize,
    configured: bool,
}

impl<'r, A: Acquisition, const N: usize> BankSequencer<'r, A, N> {
    /// Check the engine's topology against the result storage and arm for bank 0.
    pub fn new(engine: A, results: &'r SharedResults<N>) -> Result<Self, Error> {
        let banks = engine.banks();
        if banks == 0 {
            return Err(Error::NoBanks);
        }
        if engine.slots() > N {
            return Err(Error::ResultStorage { needed: engine.slots(), available: N });
        }

        Ok(Self {
            engine,
            results,
            banks,
            bank: 0,
            configured: false,
        })
    }

    /// Make one unit of progress on the current bank.
    ///
    /// Configures and starts the bank if that has not happened yet, then checks once for
    /// the end of acquisition. Never waits.
    pub fn step(&mut self) -> Step {
        let bank = self.bank;

        if !self.configured {
            self.engine.configure(bank);
            self.engine.start();
            self.configured = true;
        }

        match self.engine.poll() {
            Err(nb::Error::WouldBlock) => Step::Pending,
            Err(nb::Error::Other(never)) => match never {},
            Ok(()) => {
                let engine = &mut self.engine;
                self.results.update(|counts| engine.collect(bank, counts));
                self.bank += 1;
                self.configured = false;
                Step::Collected(bank)
            }
        }
    }

    /// True once the last bank of the cycle has been collected
    pub fn cycle_complete(&self) -> bool {
        self.bank >= self.banks
    }

    /// Start the next cycle from the first bank
    pub fn rearm(&mut self) {
        self.bank = 0;
        self.configured = false;
    }

    pub fn bank(&self) -> usize {
        self.bank
    }

    pub fn banks(&self) -> usize {
        self.banks
    }

    pub fn configured(&self) -> bool {
        self.configured
    }

    pub fn results(&self) -> &'r SharedResults<N> {
        self.results
    }

    pub fn engine(&self) -> &A {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut A {
        &mut self.engine
    }
}
