//! Battery level derivation for the standard Battery Service.

use crate::config::{BATTERY_HYSTERESIS_PERCENT, BATTERY_LOW_PERCENT};

/// Percentage of nominal for a divided battery reading, truncated and
/// clamped to `0..=100`.
///
/// `raw_mv` is what the ADC pin sees; the battery voltage is
/// `raw_mv / divider_factor`.
pub fn battery_percent(raw_mv: i32, nominal_mv: i32, divider_factor: f32) -> u8 {
    let full_scale = nominal_mv as f32 * divider_factor;
    if !(full_scale > 0.0) {
        return 0;
    }
    let percent = raw_mv as f32 * 100.0 / full_scale;
    percent.clamp(0.0, 100.0) as u8
}

/// One battery check result.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BatteryReading {
    pub percent: u8,
    /// Set on the check that first drops to or below the low threshold.
    pub low_crossed: bool,
}

/// Tracks the battery level and latches the low-battery alert.
pub struct BatteryMonitor {
    nominal_mv: i32,
    divider_factor: f32,
    low_latched: bool,
    last: Option<u8>,
}

impl BatteryMonitor {
    pub const fn new(nominal_mv: i32, divider_factor: f32) -> Self {
        Self {
            nominal_mv,
            divider_factor,
            low_latched: false,
            last: None,
        }
    }

    /// Convert a reading and report a low-battery crossing at most once
    /// until the level recovers above threshold plus hysteresis.
    pub fn update(&mut self, raw_mv: i32) -> BatteryReading {
        let percent = battery_percent(raw_mv, self.nominal_mv, self.divider_factor);
        debug!("Battery: {} mV -> {}%", raw_mv, percent);

        let mut low_crossed = false;
        if percent <= BATTERY_LOW_PERCENT {
            if !self.low_latched {
                warn!("Battery low: {}%", percent);
                self.low_latched = true;
                low_crossed = true;
            }
        } else if percent > BATTERY_LOW_PERCENT.saturating_add(BATTERY_HYSTERESIS_PERCENT) {
            self.low_latched = false;
        }

        self.last = Some(percent);
        BatteryReading {
            percent,
            low_crossed,
        }
    }

    /// Most recent percentage, if any check ran yet.
    pub fn last_percent(&self) -> Option<u8> {
        self.last
    }
}
