//! Periodically sampled analog input, published in volts.

use core::fmt::Debug;

use embassy_time::{Duration, Instant};

use crate::error::ConfigError;
use crate::homie::{Datatype, Property, PropertyRef};
use crate::runtime::{PeriodicDriver, PropertySink};

use super::format_value;

/// ADC input attenuation. Selects the full-scale voltage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Attenuation {
    /// 0 dB, 1 V full scale
    #[default]
    Db0,
    /// 2.5 dB, 1.34 V full scale
    Db2_5,
    /// 6 dB, 2 V full scale
    Db6,
    /// 11 dB, 3.6 V full scale
    Db11,
}

impl Attenuation {
    pub const fn full_scale(&self) -> f32 {
        match self {
            Attenuation::Db0 => 1.0,
            Attenuation::Db2_5 => 1.34,
            Attenuation::Db6 => 2.0,
            Attenuation::Db11 => 3.6,
        }
    }

    /// `$format` of a property carrying this input.
    pub const fn format(&self) -> &'static str {
        match self {
            Attenuation::Db0 => "0:1",
            Attenuation::Db2_5 => "0:1.34",
            Attenuation::Db6 => "0:2",
            Attenuation::Db11 => "0:3.6",
        }
    }
}

pub trait AnalogInput {
    type Error: Debug;

    /// Raw conversion result, right-aligned.
    fn read_raw(&mut self) -> Result<u16, Self::Error>;
}

/// Float property for an analog input, ranged by its attenuation.
pub fn analog_property<'a>(
    id: &'a str,
    name: &'a str,
    attenuation: Attenuation,
) -> Result<Property<'a>, ConfigError> {
    Property::new(id, name, Datatype::Float)
        .with_format(attenuation.format())
        .with_value("0")
}

pub struct AnalogSensor<A> {
    input: A,
    property: PropertyRef,
    period: Duration,
    resolution_bits: u8,
    attenuation: Attenuation,
    next_sample: Option<Instant>,
}

impl<A: AnalogInput> AnalogSensor<A> {
    /// Sample every `period` at 10-bit resolution without attenuation.
    pub fn new(input: A, property: PropertyRef, period: Duration) -> Self {
        Self {
            input,
            property,
            period,
            resolution_bits: 10,
            attenuation: Attenuation::Db0,
            next_sample: None,
        }
    }

    /// Set resolution, clamped to 1..=16 bits
    #[must_use]
    pub fn with_resolution(mut self, bits: u8) -> Self {
        self.resolution_bits = bits.clamp(1, 16);
        self
    }

    #[must_use]
    pub fn with_attenuation(mut self, attenuation: Attenuation) -> Self {
        self.attenuation = attenuation;
        self
    }

    /// Convert a raw reading to volts.
    pub fn volts(&self, raw: u16) -> f32 {
        let range = ((1u32 << self.resolution_bits) - 1) as f32;
        self.attenuation.full_scale() * f32::from(raw) / range
    }
}

impl<A: AnalogInput> PeriodicDriver for AnalogSensor<A> {
    fn periodic(&mut self, now: Instant, sink: &mut dyn PropertySink) {
        if self.next_sample.is_some_and(|due| now < due) {
            return;
        }
        self.next_sample = Some(now + self.period);

        match self.input.read_raw() {
            Ok(raw) => {
                trace!("analog: raw {}", raw);
                if let Some(value) = format_value(format_args!("{:.3}", self.volts(raw))) {
                    sink.send_value(self.property, &value);
                }
            }
            Err(e) => warn!("analog: read failed ({:?})", e),
        }
    }
}
