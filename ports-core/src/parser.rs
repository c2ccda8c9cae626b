//! Control path classification.
//!
//! Paths look like `/<namespace>/<segment>/...`. Parsing never fails: every
//! input maps to some [`ParsedCommand`], and ill-formed paths become
//! `InvalidChannel` or `Unrecognized` for the dispatcher to report.

use ports_types::{ChannelIndex, ChannelMode, OutputParam, ParsedCommand};

const OUT_PREFIX: &str = "/out/";
const IN_PREFIX: &str = "/in/";
const MIDI_PREFIX: &str = "/midi/";

/// Trailing segment selecting the square-wave duty cycle.
const PWM_SEGMENT: &str = "pwm";

pub fn parse(path: &str) -> ParsedCommand<'_> {
    if let Some(rest) = path.strip_prefix(OUT_PREFIX) {
        parse_output(rest)
    } else if let Some(rest) = path.strip_prefix(IN_PREFIX) {
        parse_input(rest)
    } else if let Some(suffix) = path.strip_prefix(MIDI_PREFIX) {
        ParsedCommand::Midi {
            suffix,
            offset: MIDI_PREFIX.len(),
        }
    } else {
        ParsedCommand::Unrecognized
    }
}

fn parse_output(rest: &str) -> ParsedCommand<'_> {
    let mut segments = rest.split('/');
    let number = segments.next().unwrap_or_default();

    let Some(channel) = parse_int(number).and_then(ChannelIndex::from_wire) else {
        return ParsedCommand::InvalidChannel { segment: number };
    };

    let token = segments.next().unwrap_or_default();
    let param = match segments.next() {
        Some(PWM_SEGMENT) => OutputParam::PwmDuty,
        _ => OutputParam::Level,
    };

    ParsedCommand::Output {
        channel,
        mode: ChannelMode::from_output_token(token),
        token,
        param,
    }
}

fn parse_input(rest: &str) -> ParsedCommand<'_> {
    let mut segments = rest.split('/');
    let channel = segments
        .next()
        .and_then(parse_int)
        .and_then(ChannelIndex::from_wire);
    let mode = segments.next().and_then(ChannelMode::from_input_token);
    ParsedCommand::Input { channel, mode }
}

/// Parse an optionally signed decimal integer occupying the whole segment.
/// Empty, non-digit and overflowing input yields `None`.
pub fn parse_int(segment: &str) -> Option<i64> {
    let (negative, digits) = match segment.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, segment),
    };
    if digits.is_empty() {
        return None;
    }

    let mut n: i64 = 0;
    for b in digits.bytes() {
        if !b.is_ascii_digit() {
            return None;
        }
        n = n.checked_mul(10)?.checked_add((b - b'0') as i64)?;
    }
    Some(if negative { -n } else { n })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn output(path: &str) -> (usize, Option<ChannelMode>, OutputParam) {
        match parse(path) {
            ParsedCommand::Output {
                channel,
                mode,
                param,
                ..
            } => (channel.get(), mode, param),
            other => panic!("Expected Output for {}, got {:?}", path, other),
        }
    }

    #[test]
    fn test_parse_int() {
        assert_eq!(parse_int("7"), Some(7));
        assert_eq!(parse_int("20"), Some(20));
        assert_eq!(parse_int("-3"), Some(-3));
        assert_eq!(parse_int("007"), Some(7));
        assert_eq!(parse_int(""), None);
        assert_eq!(parse_int("-"), None);
        assert_eq!(parse_int("abc"), None);
        assert_eq!(parse_int("1a"), None);
        assert_eq!(parse_int("99999999999999999999999"), None);
    }

    #[test]
    fn test_parse_output_paths() {
        assert_eq!(output("/out/1/gate"), (0, Some(ChannelMode::Gate), OutputParam::Level));
        assert_eq!(output("/out/20/lfosine"), (19, Some(ChannelMode::LfoSine), OutputParam::Level));
        assert_eq!(output("/out/3/cv"), (2, Some(ChannelMode::CvUnipolar), OutputParam::Level));
        assert_eq!(output("/out/3/cvbi"), (2, Some(ChannelMode::CvBipolar), OutputParam::Level));
        assert_eq!(
            output("/out/5/lfosquare/pwm"),
            (4, Some(ChannelMode::LfoSquare), OutputParam::PwmDuty)
        );
    }

    #[test]
    fn test_unknown_mode_token_propagates_as_none() {
        match parse("/out/4/wobble") {
            ParsedCommand::Output { channel, mode, token, .. } => {
                assert_eq!(channel.get(), 3);
                assert_eq!(mode, None);
                assert_eq!(token, "wobble");
            }
            other => panic!("Expected Output, got {:?}", other),
        }
        assert_eq!(output("/out/4").1, None);
    }

    #[test]
    fn test_invalid_channels() {
        for path in ["/out/0/gate", "/out/21/gate", "/out/-1/gate", "/out/abc/gate", "/out//gate", "/out/"] {
            assert!(
                matches!(parse(path), ParsedCommand::InvalidChannel { .. }),
                "{} should be an invalid channel",
                path
            );
        }
    }

    #[test]
    fn test_midi_suffix_and_offset() {
        let path = "/midi/1/cc/7";
        match parse(path) {
            ParsedCommand::Midi { suffix, offset } => {
                assert_eq!(suffix, "1/cc/7");
                assert_eq!(&path[offset..], suffix);
            }
            other => panic!("Expected Midi, got {:?}", other),
        }
    }

    #[test]
    fn test_input_namespace() {
        assert_eq!(
            parse("/in/2/cvbi"),
            ParsedCommand::Input {
                channel: ChannelIndex::new(1),
                mode: Some(ChannelMode::CvBipolarIn),
            }
        );
        assert_eq!(
            parse("/in/"),
            ParsedCommand::Input { channel: None, mode: None }
        );
    }

    #[test]
    fn test_prefixes_are_exact() {
        assert_eq!(parse("/inx/1/gate"), ParsedCommand::Unrecognized);
        assert_eq!(parse("/output/1/gate"), ParsedCommand::Unrecognized);
        assert_eq!(parse("/out"), ParsedCommand::Unrecognized);
        assert_eq!(parse(""), ParsedCommand::Unrecognized);
        assert_eq!(parse("out/1/gate"), ParsedCommand::Unrecognized);
    }
}
