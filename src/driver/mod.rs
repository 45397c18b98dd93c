//! Periodic drivers for the peripherals a typical Homie controller carries.
//!
//! Drivers own their hardware behind `embedded-hal` traits (or small sensor
//! traits for peripherals without one) and talk to the device only through
//! `PropertySink`. Drive them with `Device::drive`:
//!
//! ```ignore
//! device.drive(now, &mut [&mut environment, &mut button_a, &mut analog]).await?;
//! ```

use core::fmt::{Arguments, Write};

use heapless::String;

pub mod analog;
pub mod color;
pub mod dimmer;
pub mod environment;
pub mod onewire;
pub mod retry;

pub use analog::{AnalogInput, AnalogSensor, Attenuation};
pub use color::{ColorCycler, ColorMixer};
pub use dimmer::{DimmerButton, DimmerOutput};
pub use environment::{EnvReading, EnvironmentSensor, Sensor};
pub use onewire::{ConvertingSensor, OneWireSensor};
pub use retry::{ReadOutcome, RetryPolicy, RetrySchedule};

/// Render a reading into a property value. `None` if it does not fit.
pub(crate) fn format_value(args: Arguments<'_>) -> Option<String<16>> {
    let mut buf = String::new();
    buf.write_fmt(args).ok()?;
    Some(buf)
}

#[cfg(test)]
mod tests {
    use super::format_value;

    #[test]
    fn format_value_bounds_length() {
        assert_eq!(format_value(format_args!("{:.1}", 21.04)).unwrap().as_str(), "21.0");
        assert!(format_value(format_args!("{}", "seventeen chars!!")).is_none());
    }
}
