//! GATT server: Battery Service plus the RMS monitor service.
//!
//! The monitor service exposes one read/notify characteristic carrying
//! the serialized RMS vector and one write-without-response
//! characteristic for peer messages.

use defmt::{error, warn};
use nrf_softdevice::ble::gatt_server::{self, NotifyValueError};
use nrf_softdevice::ble::Connection;
use nrf_softdevice::Softdevice;
use sigmon::config::{MAX_STACK_WRITE_LEN, RMS_PAYLOAD_LEN};
use sigmon::error::TransportError;
use sigmon::telemetry::TelemetrySink;

/// Largest write the SoftDevice accepts on the message characteristic.
/// Longer writes are refused by the stack and never reach the application.
pub const MESSAGE_CAPACITY: usize = MAX_STACK_WRITE_LEN;

#[nrf_softdevice::gatt_service(uuid = "180f")]
pub struct BatteryService {
    #[characteristic(uuid = "2a19", read, notify)]
    pub battery_level: u8,
}

#[nrf_softdevice::gatt_service(uuid = "8fcc2160-4abd-0000-090e-8e22d2fc7eb9")]
pub struct MonitorService {
    #[characteristic(uuid = "8fcc2161-4abd-0000-090e-8e22d2fc7eb9", read, notify)]
    pub rms: [u8; RMS_PAYLOAD_LEN],

    #[characteristic(uuid = "8fcc2162-4abd-0000-090e-8e22d2fc7eb9", write_without_response)]
    pub message: heapless::Vec<u8, MESSAGE_CAPACITY>,
}

#[nrf_softdevice::gatt_server]
pub struct Server {
    pub bas: BatteryService,
    pub monitor: MonitorService,
}

/// [`TelemetrySink`] backed by the RMS characteristic.
pub struct GattSink {
    sd: &'static Softdevice,
    server: &'static Server,
}

impl GattSink {
    pub fn new(sd: &'static Softdevice, server: &'static Server) -> Self {
        Self { sd, server }
    }

    /// Update the battery level and notify it if a peer is connected.
    /// A peer without the CCCD set simply does not get the notification.
    pub fn battery_level(&self, conn: Option<&Connection>, percent: u8) {
        if let Err(e) = self.server.bas.battery_level_set(&percent) {
            warn!("GATT: battery level set failed: {:?}", e);
        }
        if let Some(conn) = conn {
            let _ = self.server.bas.battery_level_notify(conn, &percent);
        }
    }
}

impl TelemetrySink<Connection> for GattSink {
    fn store(&mut self, payload: &[u8]) {
        let handle = self.server.monitor.rms_value_handle;
        if let Err(e) = gatt_server::set_value(self.sd, handle, payload) {
            error!("GATT: RMS value set failed: {:?}", e);
        }
    }

    fn notify(&mut self, conn: &Connection, payload: &[u8]) -> Result<(), TransportError> {
        let handle = self.server.monitor.rms_value_handle;
        gatt_server::notify_value(conn, handle, payload).map_err(|e| match e {
            NotifyValueError::Disconnected => TransportError::Disconnected,
            NotifyValueError::Raw(raw) => TransportError::Raw(raw as u32),
        })
    }
}
