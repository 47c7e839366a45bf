//! Advertising and connection loop (Peripheral role, one link at a time).
//!
//! GATT callbacks run inside the SoftDevice event dispatch, so nothing
//! here touches telemetry state. Connection changes and peer writes become
//! [`LinkEvent`]s on the link channel; the subscription level is signalled
//! on `NOTIFY_LEVEL` so a full queue can never lose it.

use crate::ble::server::{MonitorServiceEvent, Server, ServerEvent};
use crate::{LINK_EVENTS, NOTIFY_LEVEL};
use defmt::{info, warn};
use nrf_softdevice::ble::{gatt_server, peripheral, Connection};
use nrf_softdevice::Softdevice;
use sigmon::ble::adv_data::{build_advertisement, build_scan_response};
use sigmon::config::{BLE_ADV_INTERVAL, DEVICE_NAME, SERVICE_UUID_LE};
use sigmon::telemetry::{InboundMessage, LinkEvent};

fn post(event: LinkEvent<Connection>) {
    if LINK_EVENTS.try_send(event).is_err() {
        warn!("BLE: link event queue full, peer write dropped");
    }
}

/// Advertise, serve one connection until it drops, repeat.
pub async fn run(sd: &'static Softdevice, server: &'static Server) -> ! {
    let adv_data = build_advertisement(DEVICE_NAME);
    let scan_data = build_scan_response(&SERVICE_UUID_LE);
    let config = peripheral::Config {
        interval: BLE_ADV_INTERVAL,
        ..Default::default()
    };

    loop {
        let adv = peripheral::ConnectableAdvertisement::ScannableUndirected {
            adv_data: &adv_data,
            scan_data: &scan_data,
        };

        let conn = match peripheral::advertise_connectable(sd, adv, &config).await {
            Ok(conn) => conn,
            Err(e) => {
                warn!("BLE: advertising failed: {:?}", e);
                continue;
            }
        };

        info!("BLE: peer connected");
        // A level left over from the previous link must not apply to this one.
        NOTIFY_LEVEL.reset();
        // The connected event must be queued before any GATT event of
        // this link, so this one waits for room instead of dropping.
        LINK_EVENTS.send(LinkEvent::Connected(conn.clone())).await;

        let reason = gatt_server::run(&conn, server, |e| match e {
            ServerEvent::Bas(_) => {}
            ServerEvent::Monitor(e) => match e {
                MonitorServiceEvent::RmsCccdWrite { notifications } => {
                    NOTIFY_LEVEL.signal(notifications);
                }
                MonitorServiceEvent::MessageWrite(data) => {
                    post(LinkEvent::DataRx(InboundMessage::from_bytes(&data)));
                }
            },
        })
        .await;

        info!("BLE: peer disconnected: {:?}", reason);
        LINK_EVENTS.send(LinkEvent::Disconnected).await;
    }
}
