//! Buttons and indicator LEDs.

pub mod buttons;
pub mod leds;

use sigmon::supervisor::{ControlEvent, ModeEvent};

/// The four front-panel buttons.
#[derive(Clone, Copy, Debug, PartialEq, Eq, defmt::Format)]
pub enum Button {
    /// Toggle Sleep / Normal.
    Sleep,
    /// Clear a fault and restore the default cadence.
    Reset,
    /// Publish a snapshot now.
    Publish,
    /// Persist the current snapshot.
    Save,
}

impl Button {
    pub fn event(self) -> ControlEvent {
        match self {
            Button::Sleep => ModeEvent::SleepToggle.into(),
            Button::Reset => ModeEvent::Reset.into(),
            Button::Publish => ControlEvent::PublishNow,
            Button::Save => ControlEvent::SaveSnapshot,
        }
    }
}
