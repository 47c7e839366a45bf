//! External power detection.
//!
//! The SoftDevice owns the POWER peripheral, so USB VBUS changes arrive as
//! SoC events on the SoftDevice task. They are mapped to
//! `ModeEvent::ExternalPower` and queued for the monitor loop.

use crate::CONTROL_EVENTS;
use defmt::{info, warn};
use nrf_softdevice::{raw, SocEvent, Softdevice};
use sigmon::supervisor::ModeEvent;

/// Ask the SoftDevice to report VBUS detected / removed.
pub fn enable_usb_detection(_sd: &Softdevice) {
    // SAFETY: plain SoftDevice SVCs; the stack is enabled (we hold `sd`).
    let ret = unsafe {
        raw::sd_power_usbdetected_enable(1) | raw::sd_power_usbremoved_enable(1)
    };
    if ret != raw::NRF_SUCCESS {
        warn!("Power: USB detection unavailable ({})", ret);
    }
}

/// Translate a SoC event into a mode event, if it is one we care about.
pub fn on_soc_event(event: SocEvent) {
    let present = match event {
        SocEvent::PowerUsbDetected => true,
        SocEvent::PowerUsbRemoved => false,
        _ => return,
    };
    info!("Power: external supply {}", if present { "detected" } else { "removed" });
    if CONTROL_EVENTS
        .try_send(ModeEvent::ExternalPower(present).into())
        .is_err()
    {
        warn!("Power: control queue full, event dropped");
    }
}

/// Whether VBUS is already present, for the state at boot.
pub fn usb_present() -> bool {
    let mut status: u32 = 0;
    // SAFETY: `status` outlives the call.
    let ret = unsafe { raw::sd_power_usbregstatus_get(&mut status) };
    // bit 0: VBUSDETECT
    ret == raw::NRF_SUCCESS && status & 1 != 0
}
