use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use ports_types::{ChannelIndex, ChannelMode};

const DEFAULT_CONFIG: &str = include_str!("../config.toml");

const PERIOD_US_RANGE: (u64, u64) = (100, 1_000_000);
const MAX_TOLERANCE: f64 = 10.0;

#[derive(Deserialize, Default)]
struct ConfigFile {
    #[serde(default)]
    osc: OscConfig,
    #[serde(default)]
    midi: MidiConfig,
    #[serde(default)]
    timer: TimerConfig,
    #[serde(default)]
    channels: ChannelsConfig,
    #[serde(default)]
    daemon: DaemonConfig,
    #[serde(default)]
    preset: Vec<Preset>,
}

#[derive(Deserialize, Default)]
struct DaemonConfig {
    pid_file: Option<String>,
}

#[derive(Deserialize, Default)]
struct OscConfig {
    bind: Option<String>,
    port: Option<u16>,
}

#[derive(Deserialize, Default)]
struct MidiConfig {
    device: Option<String>,
}

#[derive(Deserialize, Default)]
struct TimerConfig {
    period_us: Option<u64>,
    tolerance: Option<f64>,
    telemetry_interval_secs: Option<u64>,
}

#[derive(Deserialize, Default)]
struct ChannelsConfig {
    trigger_cycles: Option<u32>,
    pwm_duty: Option<f32>,
    bipolar_outputs: Option<bool>,
}

/// A channel command applied once at startup.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct Preset {
    pub channel: ChannelIndex,
    pub mode: ChannelMode,
    #[serde(default = "default_preset_value")]
    pub value: f32,
}

fn default_preset_value() -> f32 {
    1.0
}

/// Channel policy shared by the dispatcher and the tick scheduler.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChannelSettings {
    /// Ticks a TRIG output stays at its level after being set.
    pub trigger_cycles: u32,
    /// Duty cycle a channel starts with for the square LFO.
    pub pwm_duty: f32,
    /// When false every channel is reported to the device as unipolar,
    /// whatever its mode.
    pub bipolar_outputs: bool,
}

impl Default for ChannelSettings {
    fn default() -> Self {
        Self {
            trigger_cycles: 10,
            pwm_duty: 0.5,
            bipolar_outputs: false,
        }
    }
}

impl ChannelSettings {
    pub fn resolve_bipolar(&self, mode: Option<ChannelMode>) -> bool {
        self.bipolar_outputs && mode.is_some_and(|m| m.is_bipolar())
    }
}

/// Tick scheduling parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimerSettings {
    pub period: Duration,
    /// Fraction of `period` a tick may arrive late before it counts as an overrun.
    pub tolerance: f64,
    pub telemetry_interval: Duration,
}

impl Default for TimerSettings {
    fn default() -> Self {
        Self {
            period: Duration::from_micros(1000),
            tolerance: 0.2,
            telemetry_interval: Duration::from_secs(10),
        }
    }
}

impl TimerSettings {
    /// Longest interval between ticks that is not reported as an overrun.
    pub fn overrun_threshold(&self) -> Duration {
        self.period.mul_f64(1.0 + self.tolerance)
    }
}

/// Error loading an explicitly requested config file.
#[derive(Debug)]
pub enum ConfigError {
    Io(PathBuf, std::io::Error),
    Toml(toml::de::Error),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(path, e) => write!(f, "cannot read {}: {}", path.display(), e),
            Self::Toml(e) => write!(f, "invalid config: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<toml::de::Error> for ConfigError {
    fn from(e: toml::de::Error) -> Self {
        Self::Toml(e)
    }
}

pub struct Config {
    file: ConfigFile,
}

impl Config {
    /// Embedded defaults overlaid with the user's config file, if any.
    /// A malformed user file is logged and ignored.
    pub fn load() -> Self {
        let mut base = embedded();

        if let Some(path) = user_config_path() {
            if path.exists() {
                match std::fs::read_to_string(&path) {
                    Ok(contents) => match toml::from_str::<ConfigFile>(&contents) {
                        Ok(user) => merge(&mut base, user),
                        Err(e) => {
                            log::warn!(target: "config", "ignoring malformed config {}: {}", path.display(), e)
                        }
                    },
                    Err(e) => {
                        log::warn!(target: "config", "could not read config {}: {}", path.display(), e)
                    }
                }
            }
        }

        Config { file: base }
    }

    /// Embedded defaults overlaid with an explicit file. Errors are returned,
    /// since the caller asked for this file by name.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        let config = Self::from_toml_str(&contents)?;
        log::info!(target: "config", "loaded {}", path.display());
        Ok(config)
    }

    /// Embedded defaults overlaid with TOML text.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let mut base = embedded();
        let user: ConfigFile = toml::from_str(contents)?;
        merge(&mut base, user);
        Ok(Config { file: base })
    }

    pub fn osc_bind(&self) -> &str {
        self.file.osc.bind.as_deref().unwrap_or("0.0.0.0")
    }

    pub fn osc_port(&self) -> u16 {
        self.file.osc.port.unwrap_or(5000)
    }

    pub fn set_osc_port(&mut self, port: u16) {
        self.file.osc.port = Some(port);
    }

    /// `bind:port` for the OSC listener.
    pub fn osc_addr(&self) -> String {
        format!("{}:{}", self.osc_bind(), self.osc_port())
    }

    /// MIDI output port name filter; `None` when MIDI forwarding is disabled.
    pub fn midi_device(&self) -> Option<&str> {
        self.file
            .midi
            .device
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    pub fn timer(&self) -> TimerSettings {
        let fallback = TimerSettings::default();
        let timer = &self.file.timer;

        let period_us = timer
            .period_us
            .map(|us| clamp_logged("timer.period_us", us, PERIOD_US_RANGE.0, PERIOD_US_RANGE.1))
            .unwrap_or(fallback.period.as_micros() as u64);

        let tolerance = match timer.tolerance {
            Some(t) if t.is_finite() => clamp_logged("timer.tolerance", t, 0.0, MAX_TOLERANCE),
            Some(t) => {
                log::warn!(target: "config", "timer.tolerance {} is not finite, using default", t);
                fallback.tolerance
            }
            None => fallback.tolerance,
        };

        TimerSettings {
            period: Duration::from_micros(period_us),
            tolerance,
            telemetry_interval: timer
                .telemetry_interval_secs
                .map(|s| Duration::from_secs(s.max(1)))
                .unwrap_or(fallback.telemetry_interval),
        }
    }

    pub fn channels(&self) -> ChannelSettings {
        let fallback = ChannelSettings::default();
        let ch = &self.file.channels;
        ChannelSettings {
            trigger_cycles: ch
                .trigger_cycles
                .map(|c| clamp_logged("channels.trigger_cycles", c, 1, u32::MAX))
                .unwrap_or(fallback.trigger_cycles),
            pwm_duty: match ch.pwm_duty {
                Some(d) if d.is_finite() => clamp_logged("channels.pwm_duty", d, 0.0, 1.0),
                Some(_) | None => fallback.pwm_duty,
            },
            bipolar_outputs: ch.bipolar_outputs.unwrap_or(fallback.bipolar_outputs),
        }
    }

    pub fn presets(&self) -> &[Preset] {
        &self.file.preset
    }

    /// Lock file guarding against a second `portsd`. A blank setting picks
    /// the user runtime dir, then the config dir, then `/tmp`.
    pub fn pid_file(&self) -> PathBuf {
        match self.file.daemon.pid_file.as_deref().map(str::trim) {
            Some(path) if !path.is_empty() => PathBuf::from(path),
            _ => dirs::runtime_dir()
                .or_else(|| dirs::config_dir().map(|d| d.join("ports")))
                .unwrap_or_else(|| PathBuf::from("/tmp"))
                .join("portsd.pid"),
        }
    }

    pub fn set_pid_file(&mut self, path: &Path) {
        self.file.daemon.pid_file = Some(path.to_string_lossy().into_owned());
    }
}

fn embedded() -> ConfigFile {
    toml::from_str(DEFAULT_CONFIG).expect("Failed to parse embedded config.toml")
}

fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("ports").join("config.toml"))
}

fn clamp_logged<T: PartialOrd + Copy + fmt::Display>(key: &str, value: T, lo: T, hi: T) -> T {
    if value < lo {
        log::warn!(target: "config", "{} = {} below minimum, using {}", key, value, lo);
        lo
    } else if value > hi {
        log::warn!(target: "config", "{} = {} above maximum, using {}", key, value, hi);
        hi
    } else {
        value
    }
}

fn merge(base: &mut ConfigFile, user: ConfigFile) {
    if user.osc.bind.is_some() {
        base.osc.bind = user.osc.bind;
    }
    if user.osc.port.is_some() {
        base.osc.port = user.osc.port;
    }
    if user.midi.device.is_some() {
        base.midi.device = user.midi.device;
    }
    if user.timer.period_us.is_some() {
        base.timer.period_us = user.timer.period_us;
    }
    if user.timer.tolerance.is_some() {
        base.timer.tolerance = user.timer.tolerance;
    }
    if user.timer.telemetry_interval_secs.is_some() {
        base.timer.telemetry_interval_secs = user.timer.telemetry_interval_secs;
    }
    if user.channels.trigger_cycles.is_some() {
        base.channels.trigger_cycles = user.channels.trigger_cycles;
    }
    if user.channels.pwm_duty.is_some() {
        base.channels.pwm_duty = user.channels.pwm_duty;
    }
    if user.channels.bipolar_outputs.is_some() {
        base.channels.bipolar_outputs = user.channels.bipolar_outputs;
    }
    if user.daemon.pid_file.is_some() {
        base.daemon.pid_file = user.daemon.pid_file;
    }
    if !user.preset.is_empty() {
        base.preset = user.preset;
    }
}
