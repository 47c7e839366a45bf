//! Activity and alert LEDs (active-low on the DK).

use embedded_hal::digital::{OutputPin, PinState};
use sigmon::supervisor::ModeSupervisor;

pub struct Leds<A, B> {
    activity: A,
    alert: B,
}

impl<A: OutputPin, B: OutputPin> Leds<A, B> {
    pub fn new(activity: A, alert: B) -> Self {
        let mut leds = Self { activity, alert };
        leds.set(false, false);
        leds
    }

    /// Mirror the supervisor: activity only while outputs are enabled,
    /// alert while a fault is latched.
    pub fn update(&mut self, supervisor: &ModeSupervisor, connected: bool) {
        self.set(supervisor.outputs_enabled() && connected, supervisor.alert_active());
    }

    fn set(&mut self, activity: bool, alert: bool) {
        let _ = self.activity.set_state(PinState::from(!activity));
        let _ = self.alert.set_state(PinState::from(!alert));
    }
}
