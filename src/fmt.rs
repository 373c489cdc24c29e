//! This file ensures that defmt and log are optional, the macros below turn
//! into nothing when neither of them is enabled

#![macro_use]
#![allow(unused_macros)]

#[cfg(feature = "defmt")]
pub use defmt::bitflags;

#[cfg(not(feature = "defmt"))]
pub use bitflags::bitflags;

macro_rules! trace {
    ($($args:tt)*) => {
        #[cfg(feature = "defmt")]
        defmt::trace!($($args)*);
        #[cfg(feature = "log")]
        log::trace!($($args)*);
    };
}

macro_rules! debug {
    ($($args:tt)*) => {
        #[cfg(feature = "defmt")]
        defmt::debug!($($args)*);
        #[cfg(feature = "log")]
        log::debug!($($args)*);
    };
}

macro_rules! info {
    ($($args:tt)*) => {
        #[cfg(feature = "defmt")]
        defmt::info!($($args)*);
        #[cfg(feature = "log")]
        log::info!($($args)*);
    };
}

macro_rules! warn {
    ($($args:tt)*) => {
        #[cfg(feature = "defmt")]
        defmt::warn!($($args)*);
        #[cfg(feature = "log")]
        log::warn!($($args)*);
    };
}
