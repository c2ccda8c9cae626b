use std::fmt;

use serde::{Deserialize, Serialize};

/// Number of physical channels on the device.
pub const CHANNEL_COUNT: usize = 20;

/// Lowest LFO frequency accepted from the wire, in Hz.
pub const LFO_MIN_FREQUENCY: f32 = 0.01;
/// Highest LFO frequency accepted from the wire, in Hz.
pub const LFO_MAX_FREQUENCY: f32 = 1000.0;
/// Frequency a channel starts with before any LFO command sets one.
pub const DEFAULT_LFO_FREQUENCY: f32 = 1.0;

/// Zero-based channel index, always in `0..CHANNEL_COUNT`.
///
/// On the wire and in config files channels are numbered from 1, so the
/// serde representation and `Display` use the 1-based number.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(try_from = "u8", into = "u8")]
pub struct ChannelIndex(u8);

impl ChannelIndex {
    /// Build from a zero-based index.
    pub fn new(index: usize) -> Option<Self> {
        if index < CHANNEL_COUNT {
            Some(Self(index as u8))
        } else {
            None
        }
    }

    /// Build from a 1-based wire number. Anything outside `1..=20` is rejected.
    pub fn from_wire(number: i64) -> Option<Self> {
        if (1..=CHANNEL_COUNT as i64).contains(&number) {
            Some(Self((number - 1) as u8))
        } else {
            None
        }
    }

    pub fn get(self) -> usize {
        self.0 as usize
    }

    pub fn wire(self) -> u8 {
        self.0 + 1
    }

    /// All channels in ascending order.
    pub fn all() -> impl Iterator<Item = ChannelIndex> {
        (0..CHANNEL_COUNT as u8).map(ChannelIndex)
    }
}

impl fmt::Display for ChannelIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.wire())
    }
}

impl TryFrom<u8> for ChannelIndex {
    type Error = String;

    fn try_from(number: u8) -> Result<Self, Self::Error> {
        Self::from_wire(number as i64)
            .ok_or_else(|| format!("channel {} out of range 1..={}", number, CHANNEL_COUNT))
    }
}

impl From<ChannelIndex> for u8 {
    fn from(index: ChannelIndex) -> u8 {
        index.wire()
    }
}

/// Behavioral interpretation of a channel's value.
///
/// Serialized through [`ChannelMode::key`]: the path token for outputs, the
/// path token plus `in` for inputs, since both share one enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ChannelMode {
    // Outputs
    Gate,
    Trig,
    FlipFlop,
    CvUnipolar,
    CvBipolar,
    SampleHold,
    LfoSine,
    LfoSaw,
    LfoRamp,
    LfoTriangle,
    LfoSquare,
    // Inputs
    GateIn,
    TrigIn,
    CvUnipolarIn,
    CvBipolarIn,
}

/// LFO waveform families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LfoShape {
    Sine,
    Saw,
    Ramp,
    Triangle,
    Square,
}

impl TryFrom<String> for ChannelMode {
    type Error = String;

    fn try_from(key: String) -> Result<Self, Self::Error> {
        Self::from_key(&key).ok_or_else(|| format!("unknown channel mode '{}'", key))
    }
}

impl From<ChannelMode> for String {
    fn from(mode: ChannelMode) -> String {
        mode.key().to_string()
    }
}

impl ChannelMode {
    pub const OUTPUT_MODES: [ChannelMode; 11] = [
        ChannelMode::Gate,
        ChannelMode::Trig,
        ChannelMode::FlipFlop,
        ChannelMode::CvUnipolar,
        ChannelMode::CvBipolar,
        ChannelMode::SampleHold,
        ChannelMode::LfoSine,
        ChannelMode::LfoSaw,
        ChannelMode::LfoRamp,
        ChannelMode::LfoTriangle,
        ChannelMode::LfoSquare,
    ];

    pub const INPUT_MODES: [ChannelMode; 4] = [
        ChannelMode::GateIn,
        ChannelMode::TrigIn,
        ChannelMode::CvUnipolarIn,
        ChannelMode::CvBipolarIn,
    ];

    /// Look up an output mode from the token used in `/out/<n>/<token>` paths.
    pub fn from_output_token(token: &str) -> Option<Self> {
        match token {
            "gate" => Some(ChannelMode::Gate),
            "trig" => Some(ChannelMode::Trig),
            "flipflop" => Some(ChannelMode::FlipFlop),
            "cv" | "cvuni" => Some(ChannelMode::CvUnipolar),
            "cvbi" => Some(ChannelMode::CvBipolar),
            "sh" => Some(ChannelMode::SampleHold),
            "lfosine" => Some(ChannelMode::LfoSine),
            "lfosaw" => Some(ChannelMode::LfoSaw),
            "lforamp" => Some(ChannelMode::LfoRamp),
            "lfotri" => Some(ChannelMode::LfoTriangle),
            "lfosquare" => Some(ChannelMode::LfoSquare),
            _ => None,
        }
    }

    /// Look up an input mode from the token used in `/in/<n>/<token>` paths.
    pub fn from_input_token(token: &str) -> Option<Self> {
        match token {
            "gate" => Some(ChannelMode::GateIn),
            "trig" => Some(ChannelMode::TrigIn),
            "cv" | "cvuni" => Some(ChannelMode::CvUnipolarIn),
            "cvbi" => Some(ChannelMode::CvBipolarIn),
            _ => None,
        }
    }

    /// Unique name across all modes, used in config files.
    pub fn key(&self) -> &'static str {
        match self {
            ChannelMode::GateIn => "gatein",
            ChannelMode::TrigIn => "trigin",
            ChannelMode::CvUnipolarIn => "cvuniin",
            ChannelMode::CvBipolarIn => "cvbiin",
            output => output.token(),
        }
    }

    /// Inverse of [`ChannelMode::key`]. Accepts the same aliases as the path
    /// tokens (`cv`, `cvin`).
    pub fn from_key(key: &str) -> Option<Self> {
        Self::from_output_token(key).or_else(|| {
            key.strip_suffix("in")
                .and_then(Self::from_input_token)
        })
    }

    /// Path token inside its namespace. Input modes share tokens with their
    /// output twins; use [`ChannelMode::key`] where both kinds mix.
    pub fn token(&self) -> &'static str {
        match self {
            ChannelMode::Gate | ChannelMode::GateIn => "gate",
            ChannelMode::Trig | ChannelMode::TrigIn => "trig",
            ChannelMode::FlipFlop => "flipflop",
            ChannelMode::CvUnipolar | ChannelMode::CvUnipolarIn => "cvuni",
            ChannelMode::CvBipolar | ChannelMode::CvBipolarIn => "cvbi",
            ChannelMode::SampleHold => "sh",
            ChannelMode::LfoSine => "lfosine",
            ChannelMode::LfoSaw => "lfosaw",
            ChannelMode::LfoRamp => "lforamp",
            ChannelMode::LfoTriangle => "lfotri",
            ChannelMode::LfoSquare => "lfosquare",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ChannelMode::Gate => "Gate",
            ChannelMode::Trig => "Trigger",
            ChannelMode::FlipFlop => "Flip-Flop",
            ChannelMode::CvUnipolar => "CV Unipolar",
            ChannelMode::CvBipolar => "CV Bipolar",
            ChannelMode::SampleHold => "Sample & Hold",
            ChannelMode::LfoSine => "LFO Sine",
            ChannelMode::LfoSaw => "LFO Saw",
            ChannelMode::LfoRamp => "LFO Ramp",
            ChannelMode::LfoTriangle => "LFO Triangle",
            ChannelMode::LfoSquare => "LFO Square",
            ChannelMode::GateIn => "Gate In",
            ChannelMode::TrigIn => "Trigger In",
            ChannelMode::CvUnipolarIn => "CV Unipolar In",
            ChannelMode::CvBipolarIn => "CV Bipolar In",
        }
    }

    pub fn is_input(&self) -> bool {
        matches!(
            self,
            ChannelMode::GateIn
                | ChannelMode::TrigIn
                | ChannelMode::CvUnipolarIn
                | ChannelMode::CvBipolarIn
        )
    }

    pub fn is_lfo(&self) -> bool {
        self.lfo_shape().is_some()
    }

    pub fn lfo_shape(&self) -> Option<LfoShape> {
        match self {
            ChannelMode::LfoSine => Some(LfoShape::Sine),
            ChannelMode::LfoSaw => Some(LfoShape::Saw),
            ChannelMode::LfoRamp => Some(LfoShape::Ramp),
            ChannelMode::LfoTriangle => Some(LfoShape::Triangle),
            ChannelMode::LfoSquare => Some(LfoShape::Square),
            _ => None,
        }
    }

    /// Whether the mode is electrically bipolar. Whether the device is
    /// actually told so is a policy decision made in ports-core.
    pub fn is_bipolar(&self) -> bool {
        matches!(self, ChannelMode::CvBipolar | ChannelMode::CvBipolarIn)
    }
}

impl fmt::Display for ChannelMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Per-channel output state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Channel {
    /// `None` until a valid mode command arrives.
    pub mode: Option<ChannelMode>,
    pub value: f32,
    pub lfo_frequency: f32,
    /// Fraction of one LFO period, in `[0, 1)`.
    pub lfo_phase: f64,
    pub lfo_pwm_duty: f32,
    pub trig_cycles_remaining: u32,
}

impl Channel {
    pub fn new(pwm_duty: f32) -> Self {
        Self {
            mode: None,
            value: 0.0,
            lfo_frequency: DEFAULT_LFO_FREQUENCY,
            lfo_phase: 0.0,
            lfo_pwm_duty: pwm_duty,
            trig_cycles_remaining: 0,
        }
    }

    pub fn is_lfo(&self) -> bool {
        self.mode.is_some_and(|m| m.is_lfo())
    }

    /// Value as it should reach the device: unipolar levels in `[0, 1]`.
    pub fn output_level(&self) -> f32 {
        if self.value.is_nan() {
            0.0
        } else {
            self.value.clamp(0.0, 1.0)
        }
    }
}

impl Default for Channel {
    fn default() -> Self {
        Self::new(0.5)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_index_wire_bounds() {
        assert!(ChannelIndex::from_wire(0).is_none());
        assert!(ChannelIndex::from_wire(21).is_none());
        assert!(ChannelIndex::from_wire(-3).is_none());
        assert_eq!(ChannelIndex::from_wire(1).map(ChannelIndex::get), Some(0));
        assert_eq!(ChannelIndex::from_wire(20).map(ChannelIndex::get), Some(19));
    }

    #[test]
    fn test_channel_index_display_is_one_based() {
        let idx = ChannelIndex::new(2).unwrap();
        assert_eq!(idx.to_string(), "3");
        assert_eq!(ChannelIndex::all().count(), CHANNEL_COUNT);
    }

    #[test]
    fn test_output_tokens_resolve() {
        for mode in ChannelMode::OUTPUT_MODES {
            assert_eq!(ChannelMode::from_output_token(mode.token()), Some(mode));
            assert!(!mode.is_input());
        }
        assert_eq!(ChannelMode::from_output_token("cv"), Some(ChannelMode::CvUnipolar));
        assert_eq!(ChannelMode::from_output_token("cvbi"), Some(ChannelMode::CvBipolar));
        assert_eq!(ChannelMode::from_output_token("gatex"), None);
        assert_eq!(ChannelMode::from_output_token(""), None);
    }

    #[test]
    fn test_input_tokens_resolve() {
        for mode in ChannelMode::INPUT_MODES {
            assert_eq!(ChannelMode::from_input_token(mode.token()), Some(mode));
            assert!(mode.is_input());
        }
        assert_eq!(ChannelMode::from_input_token("lfosine"), None);
    }

    #[test]
    fn test_keys_round_trip_for_every_mode() {
        for mode in ChannelMode::OUTPUT_MODES.iter().chain(&ChannelMode::INPUT_MODES) {
            assert_eq!(ChannelMode::from_key(mode.key()), Some(*mode), "{}", mode.key());
        }
        for mode in ChannelMode::INPUT_MODES {
            assert_eq!(mode.key(), format!("{}in", mode.token()));
        }
        assert_eq!(ChannelMode::from_key("cvin"), Some(ChannelMode::CvUnipolarIn));
        assert_eq!(ChannelMode::from_key("lfosinein"), None);
        assert_eq!(ChannelMode::from_key("in"), None);
    }

    #[derive(Serialize, Deserialize)]
    struct ModeEntry {
        mode: ChannelMode,
    }

    #[test]
    fn test_serde_uses_keys() {
        for mode in ChannelMode::OUTPUT_MODES.iter().chain(&ChannelMode::INPUT_MODES) {
            let text = toml::to_string(&ModeEntry { mode: *mode }).unwrap();
            assert_eq!(text.trim(), format!("mode = \"{}\"", mode.key()));
            let back: ModeEntry = toml::from_str(&text).unwrap();
            assert_eq!(back.mode, *mode);
        }
        assert!(toml::from_str::<ModeEntry>("mode = \"wobble\"").is_err());
    }

    #[test]
    fn test_lfo_classification() {
        let lfos: Vec<_> = ChannelMode::OUTPUT_MODES
            .iter()
            .filter(|m| m.is_lfo())
            .collect();
        assert_eq!(lfos.len(), 5);
        assert_eq!(ChannelMode::LfoSquare.lfo_shape(), Some(LfoShape::Square));
        assert_eq!(ChannelMode::Gate.lfo_shape(), None);
    }

    #[test]
    fn test_new_channel_is_unset() {
        let ch = Channel::default();
        assert!(ch.mode.is_none());
        assert!(!ch.is_lfo());
        assert_eq!(ch.trig_cycles_remaining, 0);
        assert_eq!(ch.lfo_phase, 0.0);
    }

    #[test]
    fn test_output_level_clamps() {
        let mut ch = Channel::default();
        ch.value = 1.5;
        assert_eq!(ch.output_level(), 1.0);
        ch.value = -0.2;
        assert_eq!(ch.output_level(), 0.0);
        ch.value = f32::NAN;
        assert_eq!(ch.output_level(), 0.0);
    }

    #[derive(Deserialize)]
    struct Preset {
        channel: ChannelIndex,
        mode: ChannelMode,
    }

    #[test]
    fn test_preset_deserializes_wire_numbering() {
        let preset: Preset = toml::from_str("channel = 3\nmode = \"cv\"").unwrap();
        assert_eq!(preset.channel.get(), 2);
        assert_eq!(preset.mode, ChannelMode::CvUnipolar);

        let bad: Result<Preset, _> = toml::from_str("channel = 0\nmode = \"gate\"");
        assert!(bad.is_err());
    }
}
