//! Host-testable core of the sigmon firmware.
//!
//! Everything here is pure logic: the windowed RMS estimator, the telemetry
//! link state machine, the mode supervisor, and the small helpers around
//! them. None of it touches hardware, so it builds and tests on the host.
//!
//! Usage: `cargo test --lib` (or `cargo test` for the integration suite too)
//!
//! Note: The embedded binary (main.rs, feature `embedded`) links against
//! this crate and adds the SoftDevice, SAADC, GPIO and flash glue.

#![cfg_attr(not(test), no_std)]

#[macro_use]
mod fmt;

pub mod battery;
pub mod cadence;
pub mod config;
pub mod error;
pub mod rms;
pub mod sampler;
pub mod snapshot;
pub mod supervisor;
pub mod telemetry;

// Pure half of the BLE module; the GATT glue lives in the binary.
#[path = "ble/adv_data.rs"]
mod ble_adv_data_impl;

pub mod ble {
    pub mod adv_data {
        pub use crate::ble_adv_data_impl::*;
    }
}

pub use error::Error;

// ═══════════════════════════════════════════════════════════════════════════
// Cross-module tests
// ═══════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::config::*;
    use super::error::{PublishError, SampleError};
    use super::rms::{MonitorAggregator, MonitorVector};
    use super::sampler::{AnalogSource, Sampler};
    use super::supervisor::{ControlEvent, Mode, ModeEvent, ModeSupervisor};
    use super::telemetry::{InboundCommand, LinkCallbacks, LinkEvent, Telemetry, TelemetrySink};

    struct Constant([i32; CHANNELS]);

    impl AnalogSource for Constant {
        fn read_channel(&mut self, channel: usize) -> Result<i32, SampleError> {
            self.0.get(channel).copied().ok_or(SampleError::Read)
        }
    }

    #[derive(Default)]
    struct CountingSink {
        stores: usize,
        notifies: usize,
        last: [u8; RMS_PAYLOAD_LEN],
    }

    impl TelemetrySink<u8> for CountingSink {
        fn store(&mut self, payload: &[u8]) {
            self.stores += 1;
            self.last.copy_from_slice(payload);
        }

        fn notify(&mut self, _conn: &u8, payload: &[u8]) -> Result<(), super::error::TransportError> {
            self.notifies += 1;
            self.last.copy_from_slice(payload);
            Ok(())
        }
    }

    // ════════════════════════════════════════════════════════════════════════
    // Sampling → RMS
    // ════════════════════════════════════════════════════════════════════════

    #[test]
    fn constant_signal_converges_to_its_level() {
        let mut agg = MonitorAggregator::new();
        let mut sampler: Sampler<CHANNELS> = Sampler::new();
        let mut source = Constant([1200, 300]);

        for _ in 0..WINDOW_LEN {
            sampler.sample(&mut source, &mut agg);
        }

        let snap = agg.snapshot();
        assert_eq!(snap.channel(0), Some(&[1200; SUB_WINDOWS]));
        assert_eq!(snap.channel(1), Some(&[300; SUB_WINDOWS]));
    }

    #[test]
    fn partially_filled_window_only_reports_recent_sub_windows() {
        let mut agg = MonitorAggregator::new();
        let mut sampler: Sampler<CHANNELS> = Sampler::new();
        let mut source = Constant([1000, 0]);

        let sub_len = WINDOW_LEN / SUB_WINDOWS;
        for _ in 0..sub_len {
            sampler.sample(&mut source, &mut agg);
        }

        let ch0 = agg.snapshot().channel(0).copied().unwrap();
        assert_eq!(ch0[SUB_WINDOWS - 1], 1000);
        assert!(ch0[..SUB_WINDOWS - 1].iter().all(|&v| v == 0));
    }

    // ════════════════════════════════════════════════════════════════════════
    // Supervisor gating telemetry
    // ════════════════════════════════════════════════════════════════════════

    #[test]
    fn one_second_of_normal_operation_publishes_once() {
        let mut supervisor = ModeSupervisor::new(0);
        let mut agg = MonitorAggregator::new();
        let mut sampler: Sampler<CHANNELS> = Sampler::new();
        let mut source = Constant([500, 500]);
        let mut telemetry: Telemetry<u8, _> = Telemetry::new(|_: &[u8]| {});
        let mut sink = CountingSink::default();

        LinkEvent::Connected(1).dispatch(&mut telemetry);
        LinkEvent::NotifyChanged(true).dispatch(&mut telemetry);

        let mut samples = 0;
        for now in (0..=PUBLISH_PERIOD_DEFAULT_MS).step_by(10) {
            let due = supervisor.poll(now);
            if due.sample {
                sampler.sample(&mut source, &mut agg);
                samples += 1;
            }
            if due.publish {
                let snap = agg.snapshot();
                telemetry.stage(&snap, &mut sink).unwrap();
                telemetry.publish(&snap, &mut sink).unwrap();
            }
        }

        assert_eq!(samples, (PUBLISH_PERIOD_DEFAULT_MS / SAMPLE_PERIOD_MS) as usize);
        assert_eq!(sink.notifies, 1);
        assert_eq!(sink.stores, 1);
    }

    #[test]
    fn fault_silences_pipeline_until_reset() {
        let mut supervisor = ModeSupervisor::new(0);
        supervisor.handle(ModeEvent::ExternalPower(true), 0);
        assert!(matches!(supervisor.mode(), Mode::Fault(_)));

        let due = supervisor.poll(10 * PUBLISH_PERIOD_DEFAULT_MS);
        assert!(!due.sample && !due.publish);

        supervisor.handle(ModeEvent::Reset, 20_000);
        assert!(supervisor.poll(20_000 + SAMPLE_PERIOD_MS).sample);
    }

    #[test]
    fn inbound_commands_reach_the_supervisor() {
        let mut pending: heapless::Vec<ControlEvent, 4> = heapless::Vec::new();
        {
            let mut telemetry: Telemetry<u8, _> = Telemetry::new(|data: &[u8]| {
                if let Some(cmd) = InboundCommand::parse(data) {
                    let _ = pending.push(cmd.mode_event().into());
                }
            });
            telemetry.on_connected(4);
            telemetry.on_data_rx(b"-");
            telemetry.on_data_rx(b"noise");
            telemetry.on_data_rx(b"-");
        }

        let mut supervisor = ModeSupervisor::new(0);
        for event in pending {
            if let ControlEvent::Mode(e) = event {
                supervisor.handle(e, 0);
            }
        }
        assert_eq!(
            supervisor.publish_period_ms(),
            PUBLISH_PERIOD_DEFAULT_MS + 2 * PUBLISH_PERIOD_STEP_MS
        );
    }

    #[test]
    fn publish_without_subscriber_is_dropped_but_staged() {
        let telemetry: Telemetry<u8, fn(&[u8])> = Telemetry::new(ignore as fn(&[u8]));
        let mut sink = CountingSink::default();
        let snap = MonitorVector::from_channels([[7; SUB_WINDOWS]; CHANNELS]);

        telemetry.stage(&snap, &mut sink).unwrap();
        assert_eq!(
            telemetry.publish(&snap, &mut sink),
            Err(PublishError::NotDeliverable)
        );
        assert_eq!(sink.stores, 1);
        assert_eq!(sink.notifies, 0);
        assert_eq!(sink.last, snap.to_payload());
    }

    fn ignore(_: &[u8]) {}
}
