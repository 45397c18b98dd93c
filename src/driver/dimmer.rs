//! PWM dimmer channels and their push buttons.

use core::cell::{Cell, RefCell};

use embassy_time::Instant;
use embedded_hal::digital::InputPin;
use embedded_hal::pwm::SetDutyCycle;

use crate::error::ConfigError;
use crate::homie::{Datatype, Property, PropertyRef, SetCommand};
use crate::runtime::{PeriodicDriver, PropertySink, Settable};

use super::color::ColorMixer;
use super::format_value;

/// Presses up to this many calls are clicks, longer ones ramp.
pub const LONG_PRESS_CALLS: u16 = 10;

/// Calls the ramp rests at full brightness before turning down.
pub const TOP_PAUSE_CALLS: u8 = 15;

/// Ramp steps from off to full brightness.
pub const RAMP_STEPS: u16 = 40;

/// One PWM channel.
///
/// Shared between the property (as its `Settable`) and a `DimmerButton`, so
/// all methods take `&self`.
pub struct DimmerOutput<P> {
    pwm: RefCell<P>,
    duty: Cell<u16>,
    max: u16,
}

impl<P: SetDutyCycle> DimmerOutput<P> {
    /// Take over a PWM channel and switch it off.
    pub fn new(mut pwm: P) -> Result<Self, P::Error> {
        pwm.set_duty_cycle_fully_off()?;
        let max = pwm.max_duty_cycle();
        Ok(Self {
            pwm: RefCell::new(pwm),
            duty: Cell::new(0),
            max,
        })
    }

    pub fn duty(&self) -> u16 {
        self.duty.get()
    }

    pub fn max_duty(&self) -> u16 {
        self.max
    }

    /// Set the raw duty cycle, clamped to the channel maximum.
    pub fn set_duty(&self, duty: u16) -> Result<(), P::Error> {
        let duty = duty.min(self.max);
        self.pwm.borrow_mut().set_duty_cycle(duty)?;
        self.duty.set(duty);
        Ok(())
    }

    /// Current brightness in whole percent, rounded down.
    pub fn percent(&self) -> u8 {
        if self.max == 0 {
            return 0;
        }
        (u32::from(self.duty.get()) * 100 / u32::from(self.max)) as u8
    }

    /// Set brightness from a 0–100 percentage.
    pub fn set_percent(&self, percent: f32) -> Result<(), P::Error> {
        let percent = percent.clamp(0.0, 100.0);
        self.set_duty((percent * f32::from(self.max) / 100.0) as u16)
    }

    /// Set brightness from an 8-bit colour component.
    pub fn set_level(&self, level: u8) -> Result<(), P::Error> {
        self.set_duty((u32::from(level) * u32::from(self.max) / 255) as u16)
    }
}

impl<P: SetDutyCycle> Settable for DimmerOutput<P> {
    fn handle(&self, cmd: &SetCommand<'_>) -> bool {
        let percent = match cmd.value().trim().parse::<f32>() {
            Ok(p) if p.is_finite() => p,
            _ => {
                debug!("dimmer: ignoring {}", cmd.value());
                return false;
            }
        };
        match self.set_percent(percent) {
            Ok(()) => true,
            Err(e) => {
                warn!("dimmer: pwm error {:?}", e);
                false
            }
        }
    }
}

/// Settable 0–100 % float property driving `output`.
pub fn dimmer_property<'a, P>(
    id: &'a str,
    name: &'a str,
    output: &'a DimmerOutput<P>,
) -> Result<Property<'a>, ConfigError>
where
    P: SetDutyCycle + 'a,
{
    Property::new(id, name, Datatype::Float)
        .with_unit("%")
        .with_format("0:100")
        .with_setter(output)
        .with_value("0")
}

/// Push button controlling one dimmer channel.
///
/// Poll it on every main loop iteration; press lengths are measured in
/// calls. A click toggles the channel, restoring the level it had before it
/// was switched off. Holding the button ramps the level by one step every
/// other call, bouncing between off and full brightness with a pause at the
/// top. The button is active low.
///
/// With a colour cycle attached, pressing the button while the cycle runs
/// only stops it on release and publishes `0` on the cycler property.
pub struct DimmerButton<'d, B, P> {
    button: B,
    output: &'d DimmerOutput<P>,
    property: PropertyRef,
    cycler: Option<(&'d ColorMixer<'d, P>, PropertyRef)>,
    calls: u16,
    last_duty: u16,
    step: i32,
    top_pause: u8,
    stopping_cycle: bool,
}

impl<'d, B: InputPin, P: SetDutyCycle> DimmerButton<'d, B, P> {
    pub fn new(button: B, output: &'d DimmerOutput<P>, property: PropertyRef) -> Self {
        let step = i32::from(output.max_duty() / RAMP_STEPS).max(1);
        Self {
            button,
            output,
            property,
            cycler: None,
            calls: 0,
            last_duty: 0,
            step,
            top_pause: 0,
            stopping_cycle: false,
        }
    }

    /// Let the button stop the colour cycle of `mixer`, whose speed is
    /// published on `cycler`.
    #[must_use]
    pub fn with_cycler(mut self, mixer: &'d ColorMixer<'d, P>, cycler: PropertyRef) -> Self {
        self.cycler = Some((mixer, cycler));
        self
    }

    fn cycle_running(&self) -> bool {
        self.cycler.is_some_and(|(mixer, _)| mixer.is_cycling())
    }

    fn stop_cycle(&mut self, sink: &mut dyn PropertySink) {
        if let Some((mixer, cycler)) = self.cycler {
            if mixer.stop_cycling() {
                sink.send_value(cycler, "0");
            }
        }
    }

    fn apply(&self, duty: u16, sink: &mut dyn PropertySink) {
        if let Err(e) = self.output.set_duty(duty) {
            warn!("dimmer: pwm error {:?}", e);
            return;
        }
        if let Some(value) = format_value(format_args!("{}", self.output.percent())) {
            sink.send_value(self.property, &value);
        }
    }

    fn ramp(&mut self, sink: &mut dyn PropertySink) {
        let max = i32::from(self.output.max_duty());
        let next = (i32::from(self.output.duty()) + self.step).clamp(0, max);
        if next == 0 {
            self.step = self.step.abs();
        } else if next == max {
            self.step = -self.step.abs();
            self.top_pause = TOP_PAUSE_CALLS;
        }
        self.apply(next as u16, sink);
    }

    fn toggle(&mut self, sink: &mut dyn PropertySink) {
        let duty = self.output.duty();
        if duty == 0 {
            self.apply(self.last_duty, sink);
        } else {
            self.last_duty = duty;
            self.apply(0, sink);
        }
    }
}

impl<B: InputPin, P: SetDutyCycle> PeriodicDriver for DimmerButton<'_, B, P> {
    fn periodic(&mut self, _now: Instant, sink: &mut dyn PropertySink) {
        let pressed = match self.button.is_low() {
            Ok(pressed) => pressed,
            Err(e) => {
                warn!("dimmer: button error {:?}", e);
                return;
            }
        };

        if pressed {
            if self.stopping_cycle || self.cycle_running() {
                self.stopping_cycle = true;
                self.calls = 0;
                return;
            }
            let ramping =
                self.calls > LONG_PRESS_CALLS && self.calls % 2 == 0 && self.top_pause == 0;
            self.calls = self.calls.saturating_add(1);
            if ramping {
                self.ramp(sink);
            } else {
                self.top_pause = self.top_pause.saturating_sub(1);
            }
        } else {
            if self.stopping_cycle {
                self.stopping_cycle = false;
                self.stop_cycle(sink);
            } else if (1..=LONG_PRESS_CALLS).contains(&self.calls) {
                self.top_pause = 0;
                self.toggle(sink);
            }
            self.calls = 0;
        }
    }
}

#[cfg(test)]
mod tests {
    use core::convert::Infallible;

    use heapless::{String, Vec};

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

    struct Button<'c>(&'c Cell<bool>);

    impl embedded_hal::digital::ErrorType for Button<'_> {
        type Error = Infallible;
    }

    impl InputPin for Button<'_> {
        fn is_high(&mut self) -> Result<bool, Infallible> {
            Ok(!self.0.get())
        }

        fn is_low(&mut self) -> Result<bool, Infallible> {
            Ok(self.0.get())
        }
    }

    #[derive(Default)]
    struct Recorder {
        values: Vec<String<8>, 64>,
    }

    impl PropertySink for Recorder {
        fn send_value(&mut self, _: PropertyRef, value: &str) {
            self.values.push(String::try_from(value).unwrap()).unwrap();
        }

        fn alert(&mut self, _: PropertyRef) {}

        fn ready(&mut self, _: PropertyRef) {}
    }

    const CHAN: PropertyRef = PropertyRef { node: 0, property: 0 };

    fn press(
        button: &mut DimmerButton<'_, Button<'_>, Pwm>,
        pin: &Cell<bool>,
        calls: usize,
        sink: &mut Recorder,
    ) {
        pin.set(true);
        for _ in 0..calls {
            button.periodic(Instant::from_secs(0), sink);
        }
        pin.set(false);
        button.periodic(Instant::from_secs(0), sink);
    }

    #[test]
    fn set_command_drives_pwm() {
        let output = DimmerOutput::new(Pwm).unwrap();
        let path = TopicPath::parse("homie/dev/dimmer/chan_a/set").unwrap();

        assert!(output.handle(&SetCommand::new(&path, "42")));
        assert_eq!(output.duty(), 429);
        assert_eq!(output.percent(), 41);

        assert!(!output.handle(&SetCommand::new(&path, "bright")));
        assert_eq!(output.duty(), 429);

        assert!(output.handle(&SetCommand::new(&path, "150")));
        assert_eq!(output.duty(), 1023);
    }

    #[test]
    fn click_toggles_and_restores() {
        let pin = Cell::new(false);
        let output = DimmerOutput::new(Pwm).unwrap();
        output.set_percent(50.0).unwrap();
        let mut button = DimmerButton::new(Button(&pin), &output, CHAN);
        let mut sink = Recorder::default();

        press(&mut button, &pin, 3, &mut sink);
        assert_eq!(output.duty(), 0);
        press(&mut button, &pin, 3, &mut sink);
        assert_eq!(output.duty(), 511);
        assert_eq!(sink.values.len(), 2);
        assert_eq!(sink.values[0].as_str(), "0");
        assert_eq!(sink.values[1].as_str(), "49");
    }

    #[test]
    fn long_press_ramps_and_bounces() {
        let pin = Cell::new(false);
        let output = DimmerOutput::new(Pwm).unwrap();
        let mut button = DimmerButton::new(Button(&pin), &output, CHAN);
        let mut sink = Recorder::default();

        // 11 calls to become a long press, then one step every other call
        press(&mut button, &pin, 11 + 2 * 5, &mut sink);
        assert_eq!(output.duty(), 5 * 25);
        assert_eq!(sink.values.len(), 5);

        // releasing after a long press does not toggle
        assert_eq!(output.duty(), 125);

        // hold long enough to reach the top and turn around
        press(&mut button, &pin, 11 + 2 * 41 + TOP_PAUSE_CALLS as usize + 2 * 2, &mut sink);
        assert!(output.duty() < 1023);
        assert!(sink.values.iter().any(|v| v.as_str() == "100"));
    }

    #[test]
    fn press_during_cycle_stops_it_on_release() {
        let pin = Cell::new(false);
        let (r, g, b) = (
            DimmerOutput::new(Pwm).unwrap(),
            DimmerOutput::new(Pwm).unwrap(),
            DimmerOutput::new(Pwm).unwrap(),
        );
        r.set_percent(100.0).unwrap();
        let mixer = ColorMixer::new(&r, &g, &b);
        mixer.speed().set(5);
        let cycler = PropertyRef { node: 1, property: 1 };
        let mut button = DimmerButton::new(Button(&pin), &r, CHAN).with_cycler(&mixer, cycler);
        let mut sink = Recorder::default();

        pin.set(true);
        for _ in 0..3 {
            button.periodic(Instant::from_secs(0), &mut sink);
        }
        assert!(mixer.is_cycling());
        pin.set(false);
        button.periodic(Instant::from_secs(0), &mut sink);

        assert!(!mixer.is_cycling());
        assert_eq!(r.duty(), 1023);
        assert_eq!(sink.values.len(), 1);
        assert_eq!(sink.values[0].as_str(), "0");

        // the next click toggles the channel again
        press(&mut button, &pin, 3, &mut sink);
        assert_eq!(r.duty(), 0);
        assert_eq!(sink.values.len(), 2);
    }
}
