//! Periodic channel regeneration.
//!
//! Each tick measures the real time since the previous one and advances
//! trigger countdowns and LFO phases by that amount, so late ticks catch up
//! instead of drifting.

use std::sync::Arc;
use std::time::{Duration, Instant};

use ports_types::{Channel, ChannelIndex, ChannelMode};

use crate::config::{ChannelSettings, TimerSettings};
use crate::device::OutputDevice;
use crate::store::ChannelStore;
use crate::telemetry::TickTelemetry;
use crate::waveform;

/// Timing of a single tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickMeasurement {
    pub previous: Instant,
    pub now: Instant,
    pub elapsed: Duration,
}

impl TickMeasurement {
    pub fn between(previous: Instant, now: Instant) -> Self {
        Self {
            previous,
            now,
            elapsed: now.saturating_duration_since(previous),
        }
    }
}

pub struct TickScheduler {
    store: Arc<ChannelStore>,
    device: Arc<dyn OutputDevice>,
    settings: ChannelSettings,
    timer: TimerSettings,
    last_tick: Instant,
    telemetry: TickTelemetry,
    last_telemetry_emit: Instant,
}

impl TickScheduler {
    pub fn new(
        store: Arc<ChannelStore>,
        device: Arc<dyn OutputDevice>,
        settings: ChannelSettings,
        timer: TimerSettings,
    ) -> Self {
        let now = Instant::now();
        Self {
            store,
            device,
            settings,
            timer,
            last_tick: now,
            telemetry: TickTelemetry::new(),
            last_telemetry_emit: now,
        }
    }

    pub fn timer(&self) -> TimerSettings {
        self.timer
    }

    /// Ticks that arrived later than the configured tolerance.
    pub fn overrun_count(&self) -> u64 {
        self.telemetry.overrun_count()
    }

    /// Measure the next interval from `now`, e.g. when the timer source starts.
    pub fn reset_clock(&mut self, now: Instant) {
        self.last_tick = now;
        self.last_telemetry_emit = now;
    }

    pub fn tick(&mut self) -> TickMeasurement {
        self.tick_at(Instant::now())
    }

    /// Run one tick as if the timer fired at `now`.
    pub fn tick_at(&mut self, now: Instant) -> TickMeasurement {
        let measurement = TickMeasurement::between(self.last_tick, now);
        self.last_tick = now;

        if self
            .telemetry
            .record(measurement.elapsed, self.timer.overrun_threshold())
        {
            log::warn!(
                target: "tick",
                "timer overrun. last tick: {:.3} ms ago",
                measurement.elapsed.as_secs_f64() * 1000.0
            );
        }

        self.advance(measurement.elapsed);

        if now.saturating_duration_since(self.last_telemetry_emit) >= self.timer.telemetry_interval {
            self.last_telemetry_emit = now;
            log::debug!(target: "tick", "{}", self.telemetry.take_summary());
        }

        measurement
    }

    /// Advance every channel by `elapsed` and flush the device once.
    pub fn advance(&mut self, elapsed: Duration) {
        let elapsed_us = elapsed.as_secs_f64() * 1_000_000.0;

        let settings = self.settings;
        let device = &self.device;

        for index in ChannelIndex::all() {
            // Pushed under the lock so a concurrent command always lands last.
            self.store.with_channel(index, |ch| {
                if let Some(level) = advance_channel(ch, elapsed_us) {
                    let is_bipolar = settings.resolve_bipolar(ch.mode);
                    device.set_channel_value(index, level, false, is_bipolar);
                }
            });
        }

        self.device.update();
    }
}

/// Advance one channel's time-dependent state. Returns the level to push to
/// the device, or `None` for modes the tick leaves alone.
pub fn advance_channel(ch: &mut Channel, elapsed_us: f64) -> Option<f32> {
    match ch.mode? {
        ChannelMode::Trig => {
            if ch.trig_cycles_remaining > 0 {
                ch.trig_cycles_remaining -= 1;
            } else {
                ch.value = 0.0;
            }
            Some(ch.output_level())
        }
        mode => {
            let shape = mode.lfo_shape()?;
            let period_us = 1_000_000.0 / ch.lfo_frequency as f64;
            ch.lfo_phase += elapsed_us / period_us;
            if ch.lfo_phase >= 1.0 {
                ch.lfo_phase -= 1.0;
                // More than a full period late.
                if ch.lfo_phase >= 1.0 {
                    ch.lfo_phase = ch.lfo_phase.fract();
                }
            }
            ch.value = waveform::sample(shape, ch.lfo_phase, ch.lfo_pwm_duty);
            Some(ch.output_level())
        }
    }
}
