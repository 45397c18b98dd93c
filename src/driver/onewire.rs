//! Temperature sensors that need a conversion before they can be read,
//! such as DS18x20 probes on a 1-Wire bus.

use core::fmt::Debug;

use embassy_time::{Duration, Instant};

use crate::homie::PropertyRef;
use crate::runtime::{PeriodicDriver, PropertySink};

use super::format_value;

/// Time between starting a conversion and reading the result.
pub const CONVERSION_TIME: Duration = Duration::from_secs(1);

pub trait ConvertingSensor {
    type Error: Debug;

    /// Start a temperature conversion. On a shared bus this usually
    /// addresses every probe at once.
    fn start_conversion(&mut self) -> Result<(), Self::Error>;

    /// Read the last converted temperature in °C.
    fn read_temperature(&mut self) -> Result<f32, Self::Error>;
}

/// Two-phase convert-then-read driver.
///
/// Probes sharing a bus convert together, so only the bus leader starts the
/// conversion; every probe reads its own result `CONVERSION_TIME` later.
/// Followers must be driven with the same cadence as their leader.
pub struct OneWireSensor<S> {
    sensor: S,
    temperature: PropertyRef,
    leader: bool,
    period: Duration,
    next_conversion: Option<Instant>,
    read_at: Option<Instant>,
    alerted: bool,
}

impl<S: ConvertingSensor> OneWireSensor<S> {
    pub fn new(sensor: S, temperature: PropertyRef, leader: bool) -> Self {
        Self {
            sensor,
            temperature,
            leader,
            period: Duration::from_secs(60),
            next_conversion: None,
            read_at: None,
            alerted: false,
        }
    }

    #[must_use]
    pub fn with_period(mut self, period: Duration) -> Self {
        self.period = period;
        self
    }

    pub fn is_leader(&self) -> bool {
        self.leader
    }

    fn fail(&mut self, sink: &mut dyn PropertySink) {
        if !self.alerted {
            self.alerted = true;
            sink.alert(self.temperature);
        }
    }
}

impl<S: ConvertingSensor> PeriodicDriver for OneWireSensor<S> {
    fn periodic(&mut self, now: Instant, sink: &mut dyn PropertySink) {
        if let Some(read_at) = self.read_at {
            if now < read_at {
                return;
            }
            self.read_at = None;
            match self.sensor.read_temperature() {
                Ok(temperature) => {
                    debug!("onewire: {} °C", temperature);
                    if let Some(value) = format_value(format_args!("{:.1}", temperature)) {
                        sink.send_value(self.temperature, &value);
                    }
                    if self.alerted {
                        self.alerted = false;
                        sink.ready(self.temperature);
                    }
                }
                Err(e) => {
                    warn!("onewire: read failed ({:?})", e);
                    self.fail(sink);
                }
            }
            return;
        }

        if self.next_conversion.is_some_and(|due| now < due) {
            return;
        }
        self.next_conversion = Some(now + self.period);

        if self.leader {
            if let Err(e) = self.sensor.start_conversion() {
                warn!("onewire: conversion failed ({:?})", e);
                self.fail(sink);
                return;
            }
        }
        self.read_at = Some(now + CONVERSION_TIME);
    }
}

#[cfg(test)]
mod tests {
    use heapless::{String, Vec};

    use super::*;

    #[derive(Default)]
    struct Probe {
        conversions: usize,
        fail_reads: bool,
    }

    impl ConvertingSensor for Probe {
        type Error = &'static str;

        fn start_conversion(&mut self) -> Result<(), Self::Error> {
            self.conversions += 1;
            Ok(())
        }

        fn read_temperature(&mut self) -> Result<f32, Self::Error> {
            if self.fail_reads { Err("crc") } else { Ok(19.94) }
        }
    }

    #[derive(Default)]
    struct Recorder {
        values: Vec<String<16>, 8>,
        alerts: usize,
        readies: usize,
    }

    impl PropertySink for Recorder {
        fn send_value(&mut self, _: PropertyRef, value: &str) {
            self.values.push(String::try_from(value).unwrap()).unwrap();
        }

        fn alert(&mut self, _: PropertyRef) {
            self.alerts += 1;
        }

        fn ready(&mut self, _: PropertyRef) {
            self.readies += 1;
        }
    }

    const T: PropertyRef = PropertyRef { node: 0, property: 0 };

    #[test]
    fn leader_converts_then_reads_next_second() {
        let mut driver = OneWireSensor::new(Probe::default(), T, true);
        let mut sink = Recorder::default();

        driver.periodic(Instant::from_secs(0), &mut sink);
        assert_eq!(driver.sensor.conversions, 1);
        assert!(sink.values.is_empty());

        driver.periodic(Instant::from_secs(1), &mut sink);
        assert_eq!(sink.values[0].as_str(), "19.9");

        driver.periodic(Instant::from_secs(30), &mut sink);
        assert_eq!(driver.sensor.conversions, 1);
        driver.periodic(Instant::from_secs(60), &mut sink);
        assert_eq!(driver.sensor.conversions, 2);
    }

    #[test]
    fn follower_only_reads() {
        let mut driver = OneWireSensor::new(Probe::default(), T, false);
        let mut sink = Recorder::default();

        driver.periodic(Instant::from_secs(0), &mut sink);
        driver.periodic(Instant::from_secs(1), &mut sink);
        assert_eq!(driver.sensor.conversions, 0);
        assert_eq!(sink.values.len(), 1);
    }

    #[test]
    fn read_failure_alerts_once() {
        let probe = Probe {
            fail_reads: true,
            ..Probe::default()
        };
        let mut driver = OneWireSensor::new(probe, T, true);
        let mut sink = Recorder::default();

        for t in [0, 1, 60, 61] {
            driver.periodic(Instant::from_secs(t), &mut sink);
        }
        assert_eq!(sink.alerts, 1);

        driver.sensor.fail_reads = false;
        driver.periodic(Instant::from_secs(120), &mut sink);
        driver.periodic(Instant::from_secs(121), &mut sink);
        assert_eq!(sink.readies, 1);
        assert_eq!(sink.values.len(), 1);
    }
}
