//! Control message dispatch: path + float argument in, channel mutations out.
//!
//! Malformed commands are reported and dropped; nothing here fails or panics
//! on bad input, so a stray packet can never stop the tick loop.

use std::sync::Arc;

use ports_types::{ChannelIndex, ChannelMode, OutputParam, ParsedCommand};
use ports_types::channel::{LFO_MAX_FREQUENCY, LFO_MIN_FREQUENCY};

use crate::config::{ChannelSettings, Preset};
use crate::device::OutputDevice;
use crate::midi::MidiSink;
use crate::parser;
use crate::store::ChannelStore;

/// Why a command was dropped without touching the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// Channel number missing, malformed or outside `1..=20`.
    InvalidChannel,
    /// Mode token is not a known output mode.
    UnknownMode,
    /// `/pwm` sent with a non-LFO mode token.
    PwmRequiresLfo,
    /// Input mode given where only output modes apply.
    InputMode,
}

/// What a single dispatch did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Channel state was written. `force` is set when the mode changed.
    Applied {
        channel: ChannelIndex,
        mode: ChannelMode,
        force: bool,
    },
    /// Handed to the MIDI sink.
    Forwarded,
    /// Accepted namespace with nothing to do (`/in/`, unknown prefixes).
    Ignored,
    Rejected(RejectReason),
}

pub struct Dispatcher {
    store: Arc<ChannelStore>,
    device: Arc<dyn OutputDevice>,
    midi: Arc<dyn MidiSink>,
    settings: ChannelSettings,
}

impl Dispatcher {
    pub fn new(
        store: Arc<ChannelStore>,
        device: Arc<dyn OutputDevice>,
        midi: Arc<dyn MidiSink>,
        settings: ChannelSettings,
    ) -> Self {
        Self {
            store,
            device,
            midi,
            settings,
        }
    }

    pub fn dispatch(&self, path: &str, value: f32) -> DispatchOutcome {
        let parsed = parser::parse(path);
        log::trace!(target: "dispatch", "{} command {} {}", parsed.namespace(), path, value);
        match parsed {
            ParsedCommand::Output {
                channel,
                mode: Some(mode),
                param,
                ..
            } => {
                if param == OutputParam::PwmDuty && !mode.is_lfo() {
                    log::warn!(target: "dispatch", "pwm needs an LFO mode: {}", path);
                    return DispatchOutcome::Rejected(RejectReason::PwmRequiresLfo);
                }
                log::debug!(target: "dispatch", "OSC -> {} : {}", path, value);
                self.apply_output(channel, mode, param, value)
            }
            ParsedCommand::Output {
                channel,
                mode: None,
                token,
                ..
            } => {
                log::warn!(target: "dispatch", "unknown mode '{}' for channel {}: {}", token, channel, path);
                DispatchOutcome::Rejected(RejectReason::UnknownMode)
            }
            ParsedCommand::InvalidChannel { .. } => {
                log::warn!(target: "dispatch", "invalid channel : {}", path);
                DispatchOutcome::Rejected(RejectReason::InvalidChannel)
            }
            ParsedCommand::Midi { offset, .. } => {
                log::debug!(target: "dispatch", "OSC -> {} : {}", path, value);
                self.midi.message(path, offset, value);
                DispatchOutcome::Forwarded
            }
            ParsedCommand::Input { channel, mode } => {
                log::debug!(
                    target: "dispatch",
                    "input channels not supported, ignoring {} (channel {:?}, mode {:?})",
                    path, channel.map(|c| c.wire()), mode.map(|m| m.name())
                );
                DispatchOutcome::Ignored
            }
            ParsedCommand::Unrecognized => {
                log::debug!(target: "dispatch", "unrecognized path {}", path);
                DispatchOutcome::Ignored
            }
        }
    }

    /// Apply a configured startup preset as if it arrived on the wire.
    pub fn apply_preset(&self, preset: &Preset) -> DispatchOutcome {
        if preset.mode.is_input() {
            log::warn!(
                target: "dispatch",
                "preset for channel {} uses input mode '{}', skipping",
                preset.channel, preset.mode.key()
            );
            return DispatchOutcome::Rejected(RejectReason::InputMode);
        }
        log::info!(
            target: "dispatch",
            "preset: channel {} -> {} ({})",
            preset.channel, preset.mode, preset.value
        );
        self.apply_output(preset.channel, preset.mode, OutputParam::Level, preset.value)
    }

    fn apply_output(
        &self,
        channel: ChannelIndex,
        mode: ChannelMode,
        param: OutputParam,
        value: f32,
    ) -> DispatchOutcome {
        let settings = self.settings;
        let device = &self.device;

        // State and device writes share the channel lock, so a tick cannot
        // push a stale level after this command.
        let force = self.store.with_channel(channel, |ch| {
            let force = ch.mode != Some(mode);
            ch.mode = Some(mode);
            let is_bipolar = settings.resolve_bipolar(ch.mode);

            let level = if param == OutputParam::PwmDuty {
                ch.lfo_pwm_duty = clamp_unit(value);
                None
            } else if mode.is_lfo() {
                // The tick scheduler produces LFO levels.
                ch.lfo_frequency = clamp_frequency(value);
                None
            } else {
                let level = clamp_unit(value);
                ch.value = level;
                if mode == ChannelMode::Trig {
                    ch.trig_cycles_remaining = settings.trigger_cycles;
                }
                Some(level)
            };

            device.set_channel_mode(channel, false, is_bipolar, force);
            if let Some(level) = level {
                device.set_channel_value(channel, level, false, is_bipolar);
            }
            force
        });

        DispatchOutcome::Applied {
            channel,
            mode,
            force,
        }
    }
}

fn clamp_unit(value: f32) -> f32 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

fn clamp_frequency(value: f32) -> f32 {
    if value.is_nan() {
        LFO_MIN_FREQUENCY
    } else {
        value.clamp(LFO_MIN_FREQUENCY, LFO_MAX_FREQUENCY)
    }
}
