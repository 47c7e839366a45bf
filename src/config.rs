//! Application-wide constants and compile-time configuration.
//!
//! All sampling geometry, timing parameters, and protocol constants live
//! here so they can be tuned in one place.

// Sampling

/// Interval between two ADC samples of the same channel (ms).
pub const SAMPLE_PERIOD_MS: u64 = 50;

/// Time span covered by the RMS window (ms).
pub const WINDOW_MS: u64 = 5000;

/// Window length `W` in samples per channel.
pub const WINDOW_LEN: usize = (WINDOW_MS / SAMPLE_PERIOD_MS) as usize;

/// Number of equal sub-windows `S` the window is split into (one per second).
pub const SUB_WINDOWS: usize = 5;

/// Number of analog signal channels `C`.
pub const CHANNELS: usize = 2;

/// Number of RMS magnitudes published per snapshot (`S * C`).
pub const RMS_VECTOR_LEN: usize = SUB_WINDOWS * CHANNELS;

/// Size of the serialized RMS payload (u16 little-endian per magnitude).
pub const RMS_PAYLOAD_LEN: usize = RMS_VECTOR_LEN * 2;

const _: () = assert!(WINDOW_LEN % SUB_WINDOWS == 0, "sub-windows must tile the window");

// Publish cadence

/// Publish period after boot and after a reset (ms).
pub const PUBLISH_PERIOD_DEFAULT_MS: u64 = 1000;

/// Amount one cadence step changes the publish period by (ms).
pub const PUBLISH_PERIOD_STEP_MS: u64 = 100;

/// Shortest allowed publish period (ms). Going below is a fault.
pub const PUBLISH_PERIOD_MIN_MS: u64 = 100;

/// Longest allowed publish period (ms). Going above is a fault.
pub const PUBLISH_PERIOD_MAX_MS: u64 = 2000;

// Battery

/// Battery voltage considered 100 % (mV).
pub const BATTERY_NOMINAL_MV: i32 = 3700;

/// Ratio of the resistor divider in front of the battery ADC pin.
pub const BATTERY_DIVIDER_FACTOR: f32 = 0.486486;

/// Interval between battery level checks (ms).
pub const BATTERY_CHECK_PERIOD_MS: u64 = 10_000;

/// Percentage at or below which the device goes to sleep.
pub const BATTERY_LOW_PERCENT: u8 = 10;

/// Percentage above the low threshold needed to re-arm the low-battery alert.
pub const BATTERY_HYSTERESIS_PERCENT: u8 = 5;

// ADC (nRF52840 SAADC)

/// Resolution of a SAADC conversion.
pub const ADC_RESOLUTION_BITS: u8 = 12;

/// Full-scale input voltage: 0.6 V internal reference with gain 1/6 (mV).
pub const ADC_FULL_SCALE_MV: i32 = 3600;

// BLE

/// Complete local name placed in the advertisement.
pub const DEVICE_NAME: &str = "SigMon";

/// 128-bit service UUID `8fcc2160-4abd-0000-090e-8e22d2fc7eb9` in
/// little-endian (over-the-air) byte order.
pub const SERVICE_UUID_LE: [u8; 16] = [
    0xb9, 0x7e, 0xfc, 0xd2, 0x22, 0x8e, 0x0e, 0x09, 0x00, 0x00, 0xbd, 0x4a, 0x60, 0x21, 0xcc,
    0x8f,
];

/// Advertising interval (in 0.625 ms units). 160 = 100 ms.
pub const BLE_ADV_INTERVAL: u32 = 160;

/// Largest payload accepted on the write-without-response characteristic.
pub const MAX_INBOUND_LEN: usize = 20;

/// Largest write the BLE stack lets through to the application. Writes
/// between `MAX_INBOUND_LEN` and this are delivered and treated as
/// malformed; longer ones are refused by the SoftDevice with an ATT error.
pub const MAX_STACK_WRITE_LEN: usize = 64;

const _: () = assert!(MAX_STACK_WRITE_LEN > MAX_INBOUND_LEN);

/// ATT MTU negotiated with the central (data length extension sized).
pub const BLE_ATT_MTU: u16 = 247;

/// Largest notification payload (ATT MTU minus 3 header bytes).
pub const MAX_NOTIFY_LEN: usize = BLE_ATT_MTU as usize - 3;

// GPIO pin assignments (nRF52840-DK defaults)
//
// These are logical names; actual `embassy_nrf::peripherals::*` types are
// selected in `main.rs`.  Adjust for your custom PCB.
//
//   Button SLEEP    → P0.11
//   Button RESET    → P0.12
//   Button PUBLISH  → P0.24
//   Button SAVE     → P0.25
//   Signal 1 (AIN0) → P0.02
//   Signal 2 (AIN1) → P0.03
//   Battery  (AIN5) → P0.29
//   Activity LED    → P0.13
//   Alert LED       → P0.14

/// Button debounce time (ms).
pub const BUTTON_DEBOUNCE_MS: u64 = 50;

// Snapshot storage

/// Flash page index where snapshot storage starts (4 KB per page on nRF52840).
pub const STORAGE_FLASH_PAGE_START: u32 = 240;

/// Number of flash pages reserved for snapshot storage.
pub const STORAGE_FLASH_PAGE_COUNT: u32 = 4;

/// End of the application image; `FLASH` in `memory.x` stops here.
pub const APP_FLASH_END: u32 = 0x0002_7000 + 804 * 1024;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_pages_lie_past_the_application_image() {
        let storage_start = STORAGE_FLASH_PAGE_START * 4096;
        assert_eq!(APP_FLASH_END, 0x000F_0000);
        assert!(storage_start >= APP_FLASH_END);
        // 1 MB part
        assert!((STORAGE_FLASH_PAGE_START + STORAGE_FLASH_PAGE_COUNT) * 4096 <= 0x0010_0000);
    }
}
