//! RGB colour on three dimmer channels, with an optional colour cycle.

use core::cell::Cell;
use core::f32::consts::{PI, TAU};

use embassy_time::Instant;
use embedded_hal::pwm::SetDutyCycle;

use crate::error::ConfigError;
use crate::homie::{Datatype, Property, SetCommand};
use crate::runtime::{PeriodicDriver, PropertySink, Settable};

use super::dimmer::DimmerOutput;

pub const COLOR: &str = "color";
pub const CYCLER: &str = "cycler";

/// Phase advance per cycle step and unit of speed, per channel.
const PHASE_STEP: [f32; 3] = [PI / 180.0, PI / 260.0, PI / 225.0];

/// Speed of the colour cycle. Zero means stopped.
///
/// Settable through the `cycler` property.
#[derive(Debug, Default)]
pub struct CycleSpeed(Cell<u16>);

impl CycleSpeed {
    pub fn get(&self) -> u16 {
        self.0.get()
    }

    pub fn set(&self, speed: u16) {
        self.0.set(speed);
    }
}

impl Settable for CycleSpeed {
    fn handle(&self, cmd: &SetCommand<'_>) -> bool {
        match cmd.value().trim().parse::<u16>() {
            Ok(speed) => {
                self.set(speed);
                true
            }
            Err(_) => {
                debug!("cycler: ignoring {}", cmd.value());
                false
            }
        }
    }
}

/// Drives three channels from an `r,g,b` colour value (0–255 each).
///
/// While the cycle speed is non-zero, every `step` moves each channel along
/// its own cosine wave, so the mix drifts slowly through the colour space.
pub struct ColorMixer<'d, P> {
    channels: [&'d DimmerOutput<P>; 3],
    speed: CycleSpeed,
    phases: Cell<[f32; 3]>,
}

impl<'d, P: SetDutyCycle> ColorMixer<'d, P> {
    pub fn new(
        red: &'d DimmerOutput<P>,
        green: &'d DimmerOutput<P>,
        blue: &'d DimmerOutput<P>,
    ) -> Self {
        Self {
            channels: [red, green, blue],
            speed: CycleSpeed::default(),
            phases: Cell::new([PI; 3]),
        }
    }

    /// Apply an `r,g,b` value. Returns `false` if it does not parse.
    pub fn set_color(&self, value: &str) -> bool {
        let Some(levels) = parse_rgb(value) else {
            debug!("color: ignoring {}", value);
            return false;
        };
        for (channel, level) in self.channels.iter().zip(levels) {
            if let Err(e) = channel.set_level(level) {
                warn!("color: pwm error {:?}", e);
                return false;
            }
        }
        true
    }

    pub fn speed(&self) -> &CycleSpeed {
        &self.speed
    }

    pub fn is_cycling(&self) -> bool {
        self.speed.get() != 0
    }

    /// Stop the cycle. Returns `true` if it was running.
    pub fn stop_cycling(&self) -> bool {
        if !self.is_cycling() {
            return false;
        }
        info!("color: cycle stopped");
        self.speed.set(0);
        true
    }

    /// Advance the cycle by one step. Does nothing while stopped.
    pub fn step(&self) {
        if !self.is_cycling() {
            return;
        }
        let speed = f32::from(self.speed.get());

        let mut phases = self.phases.get();
        let waves = self.channels.iter().zip(phases.iter_mut()).zip(PHASE_STEP);
        for ((channel, phase), inc) in waves {
            let half = f32::from(channel.max_duty() / 2);
            let duty = half * libm::cosf(*phase) + half;
            if let Err(e) = channel.set_duty(duty.max(0.0) as u16) {
                warn!("color: pwm error {:?}", e);
            }
            *phase = (*phase + inc * speed) % TAU;
        }
        self.phases.set(phases);
    }
}

impl<P: SetDutyCycle> Settable for ColorMixer<'_, P> {
    fn handle(&self, cmd: &SetCommand<'_>) -> bool {
        self.set_color(cmd.value())
    }
}

/// Steps a `ColorMixer` cycle on every main loop iteration.
pub struct ColorCycler<'m, 'd, P> {
    mixer: &'m ColorMixer<'d, P>,
}

impl<'m, 'd, P: SetDutyCycle> ColorCycler<'m, 'd, P> {
    pub fn new(mixer: &'m ColorMixer<'d, P>) -> Self {
        Self { mixer }
    }
}

impl<P: SetDutyCycle> PeriodicDriver for ColorCycler<'_, '_, P> {
    fn periodic(&mut self, _now: Instant, _sink: &mut dyn PropertySink) {
        self.mixer.step();
    }
}

/// Settable `color` property (`rgb` format) driving `mixer`.
pub fn color_property<'a, P>(mixer: &'a ColorMixer<'_, P>) -> Result<Property<'a>, ConfigError>
where
    P: SetDutyCycle + 'a,
{
    Property::new(COLOR, "desired color RGB", Datatype::Color)
        .with_format("rgb")
        .with_setter(mixer)
        .with_value("0,0,0")
}

/// Settable integer `cycler` property controlling the cycle speed of `mixer`.
pub fn cycler_property<'a, P>(mixer: &'a ColorMixer<'_, P>) -> Result<Property<'a>, ConfigError> {
    Property::new(CYCLER, "cycler mode", Datatype::Integer)
        .with_setter(&mixer.speed)
        .with_value("0")
}

/// Parse `r,g,b`. Components may carry whitespace or a fraction and are
/// clamped to 0–255.
fn parse_rgb(value: &str) -> Option<[u8; 3]> {
    let mut levels = [0u8; 3];
    let mut parts = value.split(',');
    for level in levels.iter_mut() {
        let component: f32 = parts.next()?.trim().parse().ok()?;
        if !component.is_finite() {
            return None;
        }
        *level = component.clamp(0.0, 255.0) as u8;
    }
    if parts.next().is_some() {
        return None;
    }
    Some(levels)
}

#[cfg(test)]
mod tests {
    use core::convert::Infallible;

    use super::*;
    use crate::topic::TopicPath;

    struct Pwm;

    impl embedded_hal::pwm::ErrorType for Pwm {
        type Error = Infallible;
    }

    impl SetDutyCycle for Pwm {
        fn max_duty_cycle(&self) -> u16 {
            1023
        }

        fn set_duty_cycle(&mut self, _duty: u16) -> Result<(), Infallible> {
            Ok(())
        }
    }

    #[test]
    fn parses_components() {
        assert_eq!(parse_rgb("255,0,128"), Some([255, 0, 128]));
        assert_eq!(parse_rgb(" 10 , 20.5 ,300"), Some([10, 20, 255]));
        assert_eq!(parse_rgb("1,2"), None);
        assert_eq!(parse_rgb("1,2,3,4"), None);
        assert_eq!(parse_rgb("red,0,0"), None);
    }

    #[test]
    fn drives_all_three_channels() {
        let (r, g, b) = (
            DimmerOutput::new(Pwm).unwrap(),
            DimmerOutput::new(Pwm).unwrap(),
            DimmerOutput::new(Pwm).unwrap(),
        );
        let mixer = ColorMixer::new(&r, &g, &b);

        assert!(mixer.set_color("255,0,51"));
        assert_eq!((r.duty(), g.duty(), b.duty()), (1023, 0, 204));

        assert!(!mixer.set_color("garbage"));
        assert_eq!(r.duty(), 1023);
    }

    #[test]
    fn cycle_moves_channels_until_stopped() {
        let (r, g, b) = (
            DimmerOutput::new(Pwm).unwrap(),
            DimmerOutput::new(Pwm).unwrap(),
            DimmerOutput::new(Pwm).unwrap(),
        );
        let mixer = ColorMixer::new(&r, &g, &b);

        mixer.step();
        assert_eq!((r.duty(), g.duty(), b.duty()), (0, 0, 0));

        let path = TopicPath::parse("homie/dev/color/cycler/set").unwrap();
        assert!(!mixer.speed().handle(&SetCommand::new(&path, "fast")));
        assert!(mixer.speed().handle(&SetCommand::new(&path, "90")));
        assert!(mixer.is_cycling());

        // every channel starts at the bottom of its wave
        mixer.step();
        assert_eq!((r.duty(), g.duty(), b.duty()), (0, 0, 0));

        // red is a quarter turn further, the others lag behind
        mixer.step();
        assert!((510..=512).contains(&r.duty()));
        assert!(g.duty() > 0 && g.duty() < r.duty());
        assert!(b.duty() > g.duty() && b.duty() < r.duty());

        assert!(mixer.stop_cycling());
        assert!(!mixer.stop_cycling());
        let frozen = (r.duty(), g.duty(), b.duty());
        mixer.step();
        assert_eq!((r.duty(), g.duty(), b.duty()), frozen);
    }

    #[test]
    fn property_is_settable_color() {
        let r = DimmerOutput::new(Pwm).unwrap();
        let mixer = ColorMixer::new(&r, &r, &r);
        let prop = color_property(&mixer).unwrap();
        assert_eq!(prop.datatype(), Datatype::Color);
        assert!(prop.is_settable());

        let cycler = cycler_property(&mixer).unwrap();
        assert_eq!(cycler.datatype(), Datatype::Integer);
        assert_eq!(cycler.value(), "0");
        assert!(cycler.is_settable());
    }
}
