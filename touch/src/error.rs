//! Initialization errors.
//!
//! Only the setup path can fail. Once a coordinator exists, everything it reports goes
//! through [`crate::Status`].

use core::fmt;

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Error {
    /// The acquisition engine was given an empty bank table
    NoBanks,
    /// The bank table writes to more result slots than the storage holds
    ResultStorage { needed: usize, available: usize },
    /// The bank table measures an analog group the chip does not have
    UnsupportedGroup { group: usize, available: usize },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::NoBanks => write!(f, "no acquisition banks configured"),
            Error::ResultStorage { needed, available } => write!(
                f,
                "bank table needs {} result slots but storage holds {}",
                needed, available
            ),
            Error::UnsupportedGroup { group, available } => write!(
                f,
                "bank table uses analog group {} but the chip has {}",
                group, available
            ),
        }
    }
}
