use crate::channel::{ChannelIndex, ChannelMode};

/// Which channel field an `/out/` command's argument targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputParam {
    /// Level for static modes, frequency for LFO modes.
    Level,
    /// Square-wave duty cycle (`/out/<n>/<lfo>/pwm`).
    PwmDuty,
}

/// Structured result of classifying a control path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParsedCommand<'a> {
    /// `/out/<n>/<token>[/pwm]` with a channel in range.
    /// `mode` is `None` when the token is not a known output mode.
    Output {
        channel: ChannelIndex,
        mode: Option<ChannelMode>,
        token: &'a str,
        param: OutputParam,
    },
    /// `/out/` path whose channel number is missing, malformed or out of range.
    InvalidChannel { segment: &'a str },
    /// `/in/...`, reserved for input channels.
    Input {
        channel: Option<ChannelIndex>,
        mode: Option<ChannelMode>,
    },
    /// `/midi/<suffix>`; `offset` is where `suffix` starts in the full path.
    Midi { suffix: &'a str, offset: usize },
    Unrecognized,
}

impl ParsedCommand<'_> {
    /// Short namespace tag for diagnostics.
    pub fn namespace(&self) -> &'static str {
        match self {
            ParsedCommand::Output { .. } | ParsedCommand::InvalidChannel { .. } => "output",
            ParsedCommand::Input { .. } => "input",
            ParsedCommand::Midi { .. } => "midi",
            ParsedCommand::Unrecognized => "unrecognized",
        }
    }
}
