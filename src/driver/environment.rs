//! Polled environment sensors (temperature, humidity, pressure).

use core::fmt::{Debug, Write};

use embassy_time::{Duration, Instant};
use heapless::String;

use crate::error::ConfigError;
use crate::homie::{Datatype, Device, Node, Property, PropertyRef};
use crate::runtime::{PeriodicDriver, PropertySink};
use crate::transport::HomieTransport;

use super::format_value;
use super::retry::{ReadOutcome, RetryPolicy, RetrySchedule};

pub const TEMPERATURE: &str = "temperature";
pub const HUMIDITY: &str = "humidity";
pub const PRESSURE: &str = "pressure";

/// Base id of environment nodes. Further nodes get a numeric suffix.
pub const NODE_ID: &str = "environment";
pub const NODE_NAME: &str = "Environment Measures";

/// Default interval between humidity publishes.
pub const HUMIDITY_PERIOD: Duration = Duration::from_secs(10 * 60);

/// One measurement. Temperature in °C, humidity in %, pressure in mBar.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct EnvReading {
    pub temperature: f32,
    pub humidity: Option<f32>,
    pub pressure: Option<f32>,
}

/// A sensor that produces a full reading on demand.
pub trait Sensor {
    type Error: Debug;

    fn read(&mut self) -> Result<EnvReading, Self::Error>;
}

/// Id of the `index`-th environment node: `environment`, `environment1`, ...
pub fn node_id(index: usize) -> Result<String<16>, ConfigError> {
    let mut id = String::new();
    id.push_str(NODE_ID).map_err(|_| ConfigError::TopicTooLong)?;
    if index > 0 {
        write!(id, "{}", index).map_err(|_| ConfigError::TopicTooLong)?;
    }
    Ok(id)
}

pub fn temperature_property<'a>() -> Result<Property<'a>, ConfigError> {
    Property::new(TEMPERATURE, "Temperature", Datatype::Float)
        .with_unit("°C")
        .with_value("0")
}

pub fn humidity_property<'a>() -> Result<Property<'a>, ConfigError> {
    Property::new(HUMIDITY, "Humidity", Datatype::Float)
        .with_unit("%")
        .with_format("0:100")
        .with_value("0")
}

pub fn pressure_property<'a>() -> Result<Property<'a>, ConfigError> {
    Property::new(PRESSURE, "Atmospheric pressure", Datatype::Float)
        .with_unit("mBar")
        .with_value("0")
}

/// Build an environment node: temperature, then pressure and humidity if the
/// sensor has them.
pub fn environment_node<'a>(
    id: &'a str,
    humidity: bool,
    pressure: bool,
) -> Result<Node<'a>, ConfigError> {
    let mut node = Node::new(id, NODE_NAME).with_property(temperature_property()?)?;
    if pressure {
        node.add_property(pressure_property()?)?;
    }
    if humidity {
        node.add_property(humidity_property()?)?;
    }
    Ok(node)
}

/// Reads a `Sensor` on a `RetrySchedule` and publishes the values.
///
/// Temperature and pressure are published on every successful read,
/// humidity at most once per `humidity_period`. When the retry budget runs
/// out the device is put into `alert`; the first good read afterwards puts it
/// back to `ready`. Values are never cleared on failure.
pub struct EnvironmentSensor<S> {
    sensor: S,
    schedule: RetrySchedule,
    temperature: PropertyRef,
    humidity: Option<PropertyRef>,
    pressure: Option<PropertyRef>,
    humidity_period: Duration,
    next_humidity: Option<Instant>,
}

impl<S: Sensor> EnvironmentSensor<S> {
    pub fn new(sensor: S, policy: RetryPolicy, temperature: PropertyRef) -> Self {
        Self {
            sensor,
            schedule: RetrySchedule::new(policy),
            temperature,
            humidity: None,
            pressure: None,
            humidity_period: HUMIDITY_PERIOD,
            next_humidity: None,
        }
    }

    /// Resolve the properties of node `node` by their standard ids.
    pub fn attach<T: HomieTransport>(
        device: &Device<'_, T>,
        node: &str,
        sensor: S,
        policy: RetryPolicy,
    ) -> Result<Self, ConfigError> {
        let temperature = device
            .property_ref(node, TEMPERATURE)
            .ok_or(ConfigError::UnknownProperty)?;
        let mut driver = Self::new(sensor, policy, temperature);
        driver.humidity = device.property_ref(node, HUMIDITY);
        driver.pressure = device.property_ref(node, PRESSURE);
        Ok(driver)
    }

    #[must_use]
    pub fn with_humidity(mut self, humidity: PropertyRef) -> Self {
        self.humidity = Some(humidity);
        self
    }

    #[must_use]
    pub fn with_pressure(mut self, pressure: PropertyRef) -> Self {
        self.pressure = Some(pressure);
        self
    }

    #[must_use]
    pub fn with_humidity_period(mut self, period: Duration) -> Self {
        self.humidity_period = period;
        self
    }

    pub fn sensor(&self) -> &S {
        &self.sensor
    }

    pub fn sensor_mut(&mut self) -> &mut S {
        &mut self.sensor
    }

    fn publish(&mut self, now: Instant, reading: &EnvReading, sink: &mut dyn PropertySink) {
        if let Some(value) = format_value(format_args!("{:.1}", reading.temperature)) {
            sink.send_value(self.temperature, &value);
        }
        if let (Some(property), Some(pressure)) = (self.pressure, reading.pressure) {
            if let Some(value) = format_value(format_args!("{:.2}", pressure)) {
                sink.send_value(property, &value);
            }
        }
        if let (Some(property), Some(humidity)) = (self.humidity, reading.humidity) {
            if self.next_humidity.is_none_or(|due| now >= due) {
                if let Some(value) = format_value(format_args!("{:.0}", humidity)) {
                    sink.send_value(property, &value);
                }
                self.next_humidity = Some(now + self.humidity_period);
            }
        }
    }
}

impl<S: Sensor> PeriodicDriver for EnvironmentSensor<S> {
    fn periodic(&mut self, now: Instant, sink: &mut dyn PropertySink) {
        match self.schedule.poll(now, || self.sensor.read()) {
            ReadOutcome::Ok { value, recovered } => {
                debug!(
                    "environment: {} °C, {:?} %, {:?} mBar",
                    value.temperature, value.humidity, value.pressure
                );
                self.publish(now, &value, sink);
                if recovered {
                    sink.ready(self.temperature);
                }
            }
            ReadOutcome::Exhausted => sink.alert(self.temperature),
            ReadOutcome::Retrying { .. } | ReadOutcome::Idle => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use heapless::Vec;

    use super::*;

    #[derive(Default)]
    struct Recorder {
        values: Vec<(PropertyRef, String<16>), 16>,
        alerts: usize,
        readies: usize,
    }

    impl PropertySink for Recorder {
        fn send_value(&mut self, property: PropertyRef, value: &str) {
            self.values
                .push((property, String::try_from(value).unwrap()))
                .unwrap();
        }

        fn alert(&mut self, _: PropertyRef) {
            self.alerts += 1;
        }

        fn ready(&mut self, _: PropertyRef) {
            self.readies += 1;
        }
    }

    struct Scripted {
        readings: [Result<EnvReading, ()>; 3],
        next: usize,
    }

    impl Sensor for Scripted {
        type Error = ();

        fn read(&mut self) -> Result<EnvReading, ()> {
            let r = self.readings[self.next.min(2)];
            self.next += 1;
            r
        }
    }

    const T: PropertyRef = PropertyRef { node: 0, property: 0 };
    const P: PropertyRef = PropertyRef { node: 0, property: 1 };
    const H: PropertyRef = PropertyRef { node: 0, property: 2 };

    const GOOD: EnvReading = EnvReading {
        temperature: 21.37,
        humidity: Some(48.6),
        pressure: Some(1013.256),
    };

    #[test]
    fn node_ids() {
        assert_eq!(node_id(0).unwrap().as_str(), "environment");
        assert_eq!(node_id(2).unwrap().as_str(), "environment2");
    }

    #[test]
    fn node_layout_follows_sensor_capabilities() {
        let node = environment_node("environment", true, true).unwrap();
        let ids: Vec<&str, 3> = node.properties().iter().map(|p| p.id()).collect();
        assert_eq!(ids.as_slice(), &[TEMPERATURE, PRESSURE, HUMIDITY]);

        let node = environment_node("environment", true, false).unwrap();
        assert_eq!(node.properties().len(), 2);
        assert_eq!(node.properties()[1].unit(), Some("%"));
    }

    #[test]
    fn publishes_formatted_values() {
        let sensor = Scripted {
            readings: [Ok(GOOD); 3],
            next: 0,
        };
        let mut driver = EnvironmentSensor::new(sensor, RetryPolicy::new(), T)
            .with_pressure(P)
            .with_humidity(H);
        let mut sink = Recorder::default();

        driver.periodic(Instant::from_secs(0), &mut sink);
        {
            let values: Vec<(PropertyRef, &str), 3> =
                sink.values.iter().map(|(r, v)| (*r, v.as_str())).collect();
            assert_eq!(values.as_slice(), &[(T, "21.4"), (P, "1013.26"), (H, "49")]);
        }

        // humidity waits for its own period
        driver.periodic(Instant::from_secs(60), &mut sink);
        assert_eq!(sink.values.len(), 5);
    }

    #[test]
    fn exhausted_alerts_and_recovery_reports_ready() {
        let sensor = Scripted {
            readings: [Err(()), Err(()), Ok(GOOD)],
            next: 0,
        };
        let mut driver = EnvironmentSensor::new(sensor, RetryPolicy::single(), T);
        let mut sink = Recorder::default();

        driver.periodic(Instant::from_secs(0), &mut sink);
        assert_eq!(sink.alerts, 1);
        driver.periodic(Instant::from_secs(60), &mut sink);
        assert_eq!(sink.alerts, 1);
        assert!(sink.values.is_empty());

        driver.periodic(Instant::from_secs(120), &mut sink);
        assert_eq!(sink.readies, 1);
        assert_eq!(sink.values[0].1.as_str(), "21.4");
    }
}
