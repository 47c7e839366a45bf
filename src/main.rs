//! sigmon - Two-channel RMS signal monitor for nRF52840.
//!
//! Samples two analog inputs every 50 ms, keeps a 5 s window per channel
//! split into five 1 s sub-windows, and streams the ten sub-window RMS
//! magnitudes to a connected BLE central as notifications.
//!
//! ## Architecture
//!
//! ```text
//!  ┌────────────┐  LinkEvent   ┌──────────────────────────────────┐
//!  │ BLE task   │─────────────▶│ monitor loop (main)              │
//!  │ (GATT)     │              │  supervisor → sampler → RMS      │
//!  └────────────┘              │  telemetry  → GATT notify/read   │
//!  ┌────────────┐ ControlEvent │  battery    → Battery Service    │
//!  │ buttons    │─────────────▶│  storage    → flash snapshot     │
//!  │ SoC events │              └──────────────────────────────────┘
//!  └────────────┘
//! ```
//!
//! The monitor loop is the only owner of the aggregator, the telemetry
//! state and the supervisor. Every other task talks to it through the
//! two channels and the subscription signal below.

#![no_std]
#![no_main]

mod adc;
mod ble;
mod power;
mod storage;
mod ui;

use defmt::{debug, error, info, unwrap, warn};
use embassy_executor::Spawner;
use embassy_futures::select::{select4, Either4};
use embassy_nrf::gpio::{Input, Level, Output, OutputDrive, Pin, Pull};
use embassy_nrf::interrupt::{self, InterruptExt, Priority};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use embassy_sync::signal::Signal;
use embassy_time::{Duration, Instant, Timer};
use nrf_softdevice::ble::Connection;
use nrf_softdevice::{raw, Flash, Softdevice};
use static_cell::StaticCell;
use {defmt_rtt as _, panic_probe as _};

use ble::{GattSink, Server};
use sigmon::battery::BatteryMonitor;
use sigmon::cadence::PeriodicTimer;
use sigmon::config::*;
use sigmon::error::{Error, PublishError};
use sigmon::rms::MonitorAggregator;
use sigmon::sampler::Sampler;
use sigmon::supervisor::{ControlEvent, ModeEvent, ModeSupervisor};
use sigmon::telemetry::{
    sync_link, InboundCommand, InboundHandler, LinkEvent, Telemetry, TelemetrySink,
};
use storage::SnapshotStore;
use ui::leds::Leds;
use ui::Button;

/// Connection and inbound events from the BLE task.
pub static LINK_EVENTS: Channel<CriticalSectionRawMutex, LinkEvent<Connection>, 8> =
    Channel::new();

/// Latest notification subscription level written by the peer.
pub static NOTIFY_LEVEL: Signal<CriticalSectionRawMutex, bool> = Signal::new();

/// Buttons, external power and peer commands.
pub static CONTROL_EVENTS: Channel<CriticalSectionRawMutex, ControlEvent, 8> = Channel::new();

static SERVER: StaticCell<Server> = StaticCell::new();

// ═══════════════════════════════════════════════════════════════════════════
// Tasks
// ═══════════════════════════════════════════════════════════════════════════

#[embassy_executor::task]
async fn softdevice_task(sd: &'static Softdevice) -> ! {
    sd.run_with_callback(power::on_soc_event).await
}

#[embassy_executor::task]
async fn ble_task(sd: &'static Softdevice, server: &'static Server) -> ! {
    ble::peripheral::run(sd, server).await
}

#[embassy_executor::task(pool_size = 4)]
async fn button_task(pin: Input<'static>, button: Button) -> ! {
    ui::buttons::run(pin, button, BUTTON_DEBOUNCE_MS).await
}

// ═══════════════════════════════════════════════════════════════════════════
// Entry point
// ═══════════════════════════════════════════════════════════════════════════

#[embassy_executor::main]
async fn main(spawner: Spawner) {
    info!("sigmon v{} starting", env!("CARGO_PKG_VERSION"));

    // Application interrupts must not use the priorities the SoftDevice reserves.
    let mut config = embassy_nrf::config::Config::default();
    config.gpiote_interrupt_priority = Priority::P2;
    config.time_interrupt_priority = Priority::P2;
    let p = embassy_nrf::init(config);
    interrupt::SAADC.set_priority(Priority::P3);

    let sd = Softdevice::enable(&softdevice_config());
    let server: &'static Server = match Server::new(sd) {
        Ok(server) => SERVER.init(server),
        Err(e) => {
            error!("GATT server registration failed: {:?}", e);
            halt(Error::HardwareUnready).await
        }
    };
    let sd: &'static Softdevice = sd;

    power::enable_usb_detection(sd);
    unwrap!(spawner.spawn(softdevice_task(sd)));
    unwrap!(spawner.spawn(ble_task(sd, server)));

    for (pin, button) in [
        (p.P0_11.degrade(), Button::Sleep),
        (p.P0_12.degrade(), Button::Reset),
        (p.P0_24.degrade(), Button::Publish),
        (p.P0_25.degrade(), Button::Save),
    ] {
        unwrap!(spawner.spawn(button_task(Input::new(pin, Pull::Up), button)));
    }

    let mut leds = Leds::new(
        Output::new(p.P0_13, Level::High, OutputDrive::Standard),
        Output::new(p.P0_14, Level::High, OutputDrive::Standard),
    );
    let mut adc = adc::Adc::new(p.SAADC, p.P0_02, p.P0_03, p.P0_29).await;
    let mut sink = GattSink::new(sd, server);

    let mut store = SnapshotStore::new(Flash::take(sd));
    if let Some(record) = store.load().await {
        sink.store(&record.payload);
    }

    if power::usb_present() {
        CONTROL_EVENTS.send(ModeEvent::ExternalPower(true).into()).await;
    }

    let mut monitor = Monitor {
        supervisor: ModeSupervisor::new(now_ms()),
        aggregator: MonitorAggregator::new(),
        sampler: Sampler::new(),
        battery: BatteryMonitor::new(BATTERY_NOMINAL_MV, BATTERY_DIVIDER_FACTOR),
        battery_timer: PeriodicTimer::new(BATTERY_CHECK_PERIOD_MS),
        telemetry: Telemetry::new(on_inbound),
    };

    // First battery reading right away so a peer never reads a stale 0 %.
    let frame = adc.frame().await;
    monitor.check_battery(&frame, &sink, now_ms());
    monitor.battery_timer.start(now_ms());

    info!("Monitor running");

    loop {
        let wake = monitor
            .next_deadline_ms()
            .map(Instant::from_millis)
            .unwrap_or(Instant::MAX);

        match select4(
            Timer::at(wake),
            LINK_EVENTS.receive(),
            NOTIFY_LEVEL.wait(),
            CONTROL_EVENTS.receive(),
        )
        .await
        {
            Either4::First(()) => {}
            Either4::Second(event) => event.dispatch(&mut monitor.telemetry),
            Either4::Third(enabled) => sync_link(
                &mut monitor.telemetry,
                core::iter::from_fn(|| LINK_EVENTS.try_receive().ok()),
                Some(enabled),
            ),
            Either4::Fourth(ControlEvent::Mode(event)) => {
                monitor.supervisor.handle(event, now_ms());
            }
            Either4::Fourth(ControlEvent::PublishNow) => {
                if monitor.supervisor.pipeline_enabled() {
                    monitor.publish(&mut sink);
                }
            }
            Either4::Fourth(ControlEvent::SaveSnapshot) => {
                if monitor.supervisor.pipeline_enabled() {
                    // failure already logged; the previous record stays valid
                    let _ = store.save(&monitor.aggregator.snapshot()).await;
                }
            }
        }

        let now = now_ms();
        let battery_due = monitor.battery_timer.poll(now);
        let due = monitor.supervisor.poll(now);

        if battery_due || due.sample {
            let mut frame = adc.frame().await;
            if battery_due {
                monitor.check_battery(&frame, &sink, now);
            }
            if due.sample {
                monitor.sampler.sample(&mut frame, &mut monitor.aggregator);
            }
        }
        if due.publish {
            monitor.publish(&mut sink);
        }

        leds.update(&monitor.supervisor, monitor.telemetry.connection().is_some());
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Monitor state
// ═══════════════════════════════════════════════════════════════════════════

struct Monitor<H> {
    supervisor: ModeSupervisor,
    aggregator: MonitorAggregator,
    sampler: Sampler<CHANNELS>,
    battery: BatteryMonitor,
    battery_timer: PeriodicTimer,
    telemetry: Telemetry<Connection, H>,
}

impl<H: InboundHandler> Monitor<H> {
    fn next_deadline_ms(&self) -> Option<u64> {
        [
            self.supervisor.next_deadline_ms(),
            self.battery_timer.deadline_ms(),
        ]
        .into_iter()
        .flatten()
        .min()
    }

    fn check_battery(&mut self, frame: &adc::Frame, sink: &GattSink, now_ms: u64) {
        let raw_mv = match frame.battery_mv() {
            Ok(mv) => mv,
            Err(e) => {
                warn!("Battery: conversion failed: {:?}", e);
                return;
            }
        };
        let reading = self.battery.update(raw_mv);
        sink.battery_level(self.telemetry.connection(), reading.percent);
        if reading.low_crossed {
            self.supervisor.handle(ModeEvent::LowBattery, now_ms);
        }
    }

    fn publish(&self, sink: &mut GattSink) {
        let snapshot = self.aggregator.snapshot();
        if let Err(e) = self.telemetry.stage(&snapshot, sink) {
            error!("Telemetry: stage failed: {:?}", e);
            return;
        }
        match self.telemetry.publish(&snapshot, sink) {
            Ok(()) => debug!("Telemetry: published"),
            Err(PublishError::NotDeliverable) => {}
            Err(e) => warn!("Telemetry: {:?}, dropped", e),
        }
    }
}

/// Peer messages: single-byte cadence commands, everything else is logged.
fn on_inbound(data: &[u8]) {
    match InboundCommand::parse(data) {
        Some(cmd) => {
            info!("Inbound command: {:?}", cmd);
            if CONTROL_EVENTS.try_send(cmd.mode_event().into()).is_err() {
                warn!("Inbound: control queue full, command dropped");
            }
        }
        None => info!("Inbound: {=[u8]:x}", data),
    }
}

fn now_ms() -> u64 {
    Instant::now().as_millis()
}

async fn halt(reason: Error) -> ! {
    error!("Fatal: {:?}, monitor not started", reason);
    loop {
        Timer::after(Duration::from_secs(60)).await;
    }
}

fn softdevice_config() -> nrf_softdevice::Config {
    nrf_softdevice::Config {
        clock: Some(raw::nrf_clock_lf_cfg_t {
            source: raw::NRF_CLOCK_LF_SRC_RC as u8,
            rc_ctiv: 16,
            rc_temp_ctiv: 2,
            accuracy: raw::NRF_CLOCK_LF_ACCURACY_500_PPM as u8,
        }),
        conn_gap: Some(raw::ble_gap_conn_cfg_t {
            conn_count: 1,
            event_length: 24,
        }),
        conn_gatt: Some(raw::ble_gatt_conn_cfg_t {
            att_mtu: BLE_ATT_MTU,
        }),
        gatts_attr_tab_size: Some(raw::ble_gatts_cfg_attr_tab_size_t {
            attr_tab_size: raw::BLE_GATTS_ATTR_TAB_SIZE_DEFAULT,
        }),
        gap_role_count: Some(raw::ble_gap_cfg_role_count_t {
            adv_set_count: 1,
            periph_role_count: 1,
            central_role_count: 0,
            central_sec_count: 0,
            _bitfield_1: raw::ble_gap_cfg_role_count_t::new_bitfield_1(0),
        }),
        gap_device_name: Some(raw::ble_gap_cfg_device_name_t {
            p_value: DEVICE_NAME.as_ptr() as _,
            current_len: DEVICE_NAME.len() as u16,
            max_len: DEVICE_NAME.len() as u16,
            // SAFETY: all-zero is "no access", a valid security mode.
            write_perm: unsafe { core::mem::zeroed() },
            _bitfield_1: raw::ble_gap_cfg_device_name_t::new_bitfield_1(
                raw::BLE_GATTS_VLOC_STACK as u8,
            ),
        }),
        ..Default::default()
    }
}
