//! Operating mode supervisor - gates sampling and publishing.
//!
//! Modes:
//! - Normal: sampling and publish timers run, outputs enabled
//! - Fault:  external power detected or cadence pushed out of range;
//!           timers stopped, outputs off, alert raised until reset
//! - Sleep:  low battery or user request; timers stopped until wake
//!
//! The supervisor owns the sample and publish timers so that every mode
//! change stops or restarts them in one place. Leaving Sleep or Fault
//! restarts both from "now"; nothing missed in between is replayed.

use crate::cadence::PeriodicTimer;
use crate::config::{
    PUBLISH_PERIOD_DEFAULT_MS, PUBLISH_PERIOD_MAX_MS, PUBLISH_PERIOD_MIN_MS,
    PUBLISH_PERIOD_STEP_MS, SAMPLE_PERIOD_MS,
};

/// Why the device is in `Mode::Fault`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FaultCause {
    /// Charger / USB power present while measuring.
    ExternalPower,
    /// Publish cadence stepped outside its allowed range.
    CadenceLimit,
}

/// Coarse operating mode.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Mode {
    Normal,
    Fault(FaultCause),
    Sleep,
}

/// External inputs that can change the mode or cadence.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ModeEvent {
    /// USB/charger power appeared (`true`) or went away (`false`).
    ExternalPower(bool),
    LowBattery,
    /// Sleep button: sleeps when Normal, wakes when asleep.
    SleepToggle,
    Wake,
    /// Clears a fault and restores the default cadence.
    Reset,
    /// Publish more often by one step.
    CadenceUp,
    /// Publish less often by one step.
    CadenceDown,
}

/// Everything the monitor loop accepts from buttons, the power
/// subsystem and the peer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ControlEvent {
    Mode(ModeEvent),
    /// Take a snapshot and publish it right away.
    PublishNow,
    /// Persist the current snapshot to flash.
    SaveSnapshot,
}

impl From<ModeEvent> for ControlEvent {
    fn from(e: ModeEvent) -> Self {
        ControlEvent::Mode(e)
    }
}

/// A mode transition that actually happened.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ModeChange {
    pub from: Mode,
    pub to: Mode,
}

/// Which periodic jobs are due after a `poll`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Due {
    pub sample: bool,
    pub publish: bool,
}

/// Mode state machine plus the timers it gates.
pub struct ModeSupervisor {
    mode: Mode,
    sample_timer: PeriodicTimer,
    publish_timer: PeriodicTimer,
}

impl ModeSupervisor {
    /// Start in Normal with both timers running from `now_ms`.
    pub fn new(now_ms: u64) -> Self {
        let mut supervisor = Self {
            mode: Mode::Normal,
            sample_timer: PeriodicTimer::new(SAMPLE_PERIOD_MS),
            publish_timer: PeriodicTimer::new(PUBLISH_PERIOD_DEFAULT_MS),
        };
        supervisor.start_timers(now_ms);
        supervisor
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Sampler and telemetry may only run in Normal.
    pub fn pipeline_enabled(&self) -> bool {
        self.mode == Mode::Normal
    }

    /// LEDs and other outputs are driven only in Normal.
    pub fn outputs_enabled(&self) -> bool {
        self.mode == Mode::Normal
    }

    /// Alert indicator state.
    pub fn alert_active(&self) -> bool {
        matches!(self.mode, Mode::Fault(_))
    }

    pub fn publish_period_ms(&self) -> u64 {
        self.publish_timer.period_ms()
    }

    /// Earliest pending timer deadline, `None` when nothing is scheduled.
    pub fn next_deadline_ms(&self) -> Option<u64> {
        match (
            self.sample_timer.deadline_ms(),
            self.publish_timer.deadline_ms(),
        ) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    /// Report which jobs are due. Always empty outside Normal.
    pub fn poll(&mut self, now_ms: u64) -> Due {
        Due {
            sample: self.sample_timer.poll(now_ms),
            publish: self.publish_timer.poll(now_ms),
        }
    }

    /// Apply an external event. Returns the transition if the mode changed.
    pub fn handle(&mut self, event: ModeEvent, now_ms: u64) -> Option<ModeChange> {
        let from = self.mode;
        match (from, event) {
            (Mode::Fault(_), ModeEvent::ExternalPower(true)) => {}
            (_, ModeEvent::ExternalPower(true)) => {
                self.enter(Mode::Fault(FaultCause::ExternalPower), now_ms);
            }
            (_, ModeEvent::ExternalPower(false)) => {
                info!("Mode: external power removed");
            }

            (Mode::Normal, ModeEvent::LowBattery) | (Mode::Normal, ModeEvent::SleepToggle) => {
                self.enter(Mode::Sleep, now_ms);
            }
            (Mode::Sleep, ModeEvent::SleepToggle) | (Mode::Sleep, ModeEvent::Wake) => {
                self.enter(Mode::Normal, now_ms);
            }

            (_, ModeEvent::Reset) => {
                info!(
                    "Mode: reset, publish period back to {} ms",
                    PUBLISH_PERIOD_DEFAULT_MS
                );
                self.publish_timer.stop();
                self.publish_timer = PeriodicTimer::new(PUBLISH_PERIOD_DEFAULT_MS);
                match from {
                    Mode::Fault(_) => self.enter(Mode::Normal, now_ms),
                    Mode::Normal => self.publish_timer.start(now_ms),
                    Mode::Sleep => info!("Mode: staying asleep"),
                }
            }

            (Mode::Normal, ModeEvent::CadenceUp) => self.step_cadence(false, now_ms),
            (Mode::Normal, ModeEvent::CadenceDown) => self.step_cadence(true, now_ms),

            (mode, event) => {
                debug!("Mode: {:?} ignored in {:?}", event, mode);
            }
        }

        (self.mode != from).then_some(ModeChange {
            from,
            to: self.mode,
        })
    }

    fn step_cadence(&mut self, slower: bool, now_ms: u64) {
        let current = self.publish_timer.period_ms();
        let next = if slower {
            current.checked_add(PUBLISH_PERIOD_STEP_MS)
        } else {
            current.checked_sub(PUBLISH_PERIOD_STEP_MS)
        };

        match next {
            Some(period) if (PUBLISH_PERIOD_MIN_MS..=PUBLISH_PERIOD_MAX_MS).contains(&period) => {
                info!("Mode: publish period {} -> {} ms", current, period);
                self.publish_timer.restart(now_ms, period);
            }
            _ => {
                error!(
                    "Mode: publish period limit reached at {} ms, reset required",
                    current
                );
                self.enter(Mode::Fault(FaultCause::CadenceLimit), now_ms);
            }
        }
    }

    fn enter(&mut self, to: Mode, now_ms: u64) {
        if to == self.mode {
            return;
        }
        info!("Mode: {:?} -> {:?}", self.mode, to);
        self.mode = to;

        match to {
            Mode::Normal => self.start_timers(now_ms),
            Mode::Sleep => self.stop_timers(),
            Mode::Fault(cause) => {
                self.stop_timers();
                error!("Fault: {:?} - outputs disabled until reset", cause);
            }
        }
    }

    fn start_timers(&mut self, now_ms: u64) {
        self.sample_timer.start(now_ms);
        self.publish_timer.start(now_ms);
    }

    fn stop_timers(&mut self) {
        self.sample_timer.stop();
        self.publish_timer.stop();
    }
}
