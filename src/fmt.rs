//! Logging shims.
//!
//! The crate logs through `log` or `esp-println` depending on enabled
//! features. Without either feature the macros compile to nothing but still
//! borrow their arguments, so call sites never trigger unused warnings.
#![macro_use]
#![allow(unused_macros)]

macro_rules! trace {
    ($s:literal $(, $x:expr)* $(,)?) => {
        {
            #[cfg(feature = "log")]
            ::log::trace!($s $(, $x)*);
            #[cfg(not(feature = "log"))]
            let _ = ($( & $x ),*);
        }
    };
}

macro_rules! debug {
    ($s:literal $(, $x:expr)* $(,)?) => {
        {
            #[cfg(feature = "log")]
            ::log::debug!($s $(, $x)*);
            #[cfg(not(feature = "log"))]
            let _ = ($( & $x ),*);
        }
    };
}

macro_rules! info {
    ($s:literal $(, $x:expr)* $(,)?) => {
        {
            #[cfg(feature = "log")]
            ::log::info!($s $(, $x)*);
            #[cfg(all(feature = "esp32-log", not(feature = "log")))]
            ::esp_println::println!($s $(, $x)*);
            #[cfg(not(any(feature = "log", feature = "esp32-log")))]
            let _ = ($( & $x ),*);
        }
    };
}

macro_rules! warn {
    ($s:literal $(, $x:expr)* $(,)?) => {
        {
            #[cfg(feature = "log")]
            ::log::warn!($s $(, $x)*);
            #[cfg(all(feature = "esp32-log", not(feature = "log")))]
            ::esp_println::println!($s $(, $x)*);
            #[cfg(not(any(feature = "log", feature = "esp32-log")))]
            let _ = ($( & $x ),*);
        }
    };
}

macro_rules! error {
    ($s:literal $(, $x:expr)* $(,)?) => {
        {
            #[cfg(feature = "log")]
            ::log::error!($s $(, $x)*);
            #[cfg(all(feature = "esp32-log", not(feature = "log")))]
            ::esp_println::println!($s $(, $x)*);
            #[cfg(not(any(feature = "log", feature = "esp32-log")))]
            let _ = ($( & $x ),*);
        }
    };
}
