//! GPIO button input with async debouncing.
//!
//! Buttons are active-low with internal pull-up. Each one is handled by an
//! async task that waits for a GPIO edge, debounces it, and sends the
//! button's `ControlEvent` to the monitor loop.

use crate::ui::Button;
use crate::CONTROL_EVENTS;
use defmt::{info, warn};
use embassy_time::{Duration, Timer};
use embedded_hal::digital::InputPin;
use embedded_hal_async::digital::Wait;

/// Run a single button loop.
///
/// Waits for the pin to go low (pressed), debounces, sends the event,
/// then waits for release before repeating.
pub async fn run<P>(mut pin: P, button: Button, debounce_ms: u64) -> !
where
    P: Wait + InputPin,
{
    loop {
        if pin.wait_for_falling_edge().await.is_err() {
            warn!("Button {}: edge wait failed", button);
            Timer::after(Duration::from_millis(debounce_ms)).await;
            continue;
        }

        // Debounce: wait and re-check.
        Timer::after(Duration::from_millis(debounce_ms)).await;

        if pin.is_low().unwrap_or(false) {
            info!("Button: {}", button);
            CONTROL_EVENTS.send(button.event()).await;

            // Wait for release to avoid repeat triggers.
            let _ = pin.wait_for_rising_edge().await;
            Timer::after(Duration::from_millis(debounce_ms)).await;
        }
    }
}
