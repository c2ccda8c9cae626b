use std::sync::{Mutex, PoisonError};

use midir::{MidiOutput, MidiOutputConnection};

use crate::parser::parse_int;

/// Receiver of `/midi/...` commands.
pub trait MidiSink: Send + Sync {
    /// Forward a raw control path. The MIDI-specific part starts at `offset`.
    fn message(&self, path: &str, offset: usize, value: f32);
}

/// Sink that drops everything. Used when no MIDI device is configured.
pub struct NullMidi;

impl MidiSink for NullMidi {
    fn message(&self, path: &str, _offset: usize, _value: f32) {
        log::debug!(target: "midi", "no MIDI output, dropping {}", path);
    }
}

/// Information about an available MIDI output port
#[derive(Debug, Clone)]
pub struct MidiPortInfo {
    pub index: usize,
    pub name: String,
}

/// List available MIDI output ports
pub fn list_output_ports() -> Vec<MidiPortInfo> {
    let Ok(midi_out) = MidiOutput::new("portsd") else {
        return Vec::new();
    };
    midi_out
        .ports()
        .iter()
        .enumerate()
        .filter_map(|(index, port)| {
            midi_out
                .port_name(port)
                .ok()
                .map(|name| MidiPortInfo { index, name })
        })
        .collect()
}

/// MIDI output manager
pub struct MidiOutputManager {
    connection: Mutex<Option<MidiOutputConnection>>,
}

impl MidiOutputManager {
    pub fn new() -> Self {
        Self {
            connection: Mutex::new(None),
        }
    }

    /// Connect to the first output port whose name contains `name_filter`.
    pub fn open_device(&mut self, name_filter: &str) -> Result<(), String> {
        self.disconnect();

        let midi_out = MidiOutput::new("portsd").map_err(|e| e.to_string())?;
        let ports = midi_out.ports();
        let (port, port_name) = ports
            .iter()
            .find_map(|p| {
                midi_out
                    .port_name(p)
                    .ok()
                    .filter(|name| name.contains(name_filter))
                    .map(|name| (p.clone(), name))
            })
            .ok_or_else(|| format!("MIDI output '{}' not found", name_filter))?;

        let connection = midi_out
            .connect(&port, "portsd-output")
            .map_err(|e| e.to_string())?;

        *self.connection.lock().unwrap_or_else(PoisonError::into_inner) = Some(connection);
        log::info!(target: "midi", "connected to {}", port_name);
        Ok(())
    }

    /// Disconnect from the current MIDI output port
    pub fn disconnect(&mut self) {
        if let Some(conn) = self
            .connection
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            conn.close();
        }
    }
}

impl Default for MidiOutputManager {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for MidiOutputManager {
    fn drop(&mut self) {
        self.disconnect();
    }
}

impl MidiSink for MidiOutputManager {
    fn message(&self, path: &str, offset: usize, value: f32) {
        let suffix = path.get(offset..).unwrap_or_default();
        let Some(bytes) = encode_midi_message(suffix, value) else {
            log::warn!(target: "midi", "unsupported MIDI command: {}", path);
            return;
        };
        let mut guard = self.connection.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(conn) = guard.as_mut() {
            if let Err(e) = conn.send(&bytes) {
                log::warn!(target: "midi", "send failed for {}: {}", path, e);
            }
        }
    }
}

/// Encode a `/midi/` suffix and its float argument into raw MIDI bytes.
///
/// Supported suffixes (channel is 1-based, 1..=16):
/// - `<ch>/note/<n>`: note on with velocity `value * 127`, note off when `value <= 0`
/// - `<ch>/cc/<n>`: control change, `value` in `[0, 1]`
/// - `<ch>/program`: program change, `value` is the program number
/// - `<ch>/pressure`: channel aftertouch, `value` in `[0, 1]`
/// - `<ch>/bend`: pitch bend, `value` in `[-1, 1]`, 0 = center
fn encode_midi_message(suffix: &str, value: f32) -> Option<Vec<u8>> {
    let mut segments = suffix.split('/');
    let channel = parse_int(segments.next()?)?;
    if !(1..=16).contains(&channel) {
        return None;
    }
    let channel = (channel - 1) as u8;
    let kind = segments.next()?;
    let number = segments.next().map(parse_int);

    match (kind, number) {
        ("note", Some(Some(note))) => {
            let note = data_byte(note)?;
            if value > 0.0 {
                Some(vec![0x90 | channel, note, to_7bit(value).max(1)])
            } else {
                Some(vec![0x80 | channel, note, 0])
            }
        }
        ("cc", Some(Some(controller))) => {
            Some(vec![0xB0 | channel, data_byte(controller)?, to_7bit(value)])
        }
        ("program", None) => {
            let program = if value.is_finite() { value.round() as i64 } else { 0 };
            Some(vec![0xC0 | channel, data_byte(program)?])
        }
        ("pressure", None) => Some(vec![0xD0 | channel, to_7bit(value)]),
        ("bend", None) => {
            let v = if value.is_nan() { 0.0 } else { value.clamp(-1.0, 1.0) };
            let bend = (((v + 1.0) * 0.5 * 16383.0).round() as u16).min(16383);
            Some(vec![0xE0 | channel, (bend & 0x7F) as u8, (bend >> 7) as u8])
        }
        _ => None,
    }
}

fn data_byte(n: i64) -> Option<u8> {
    u8::try_from(n).ok().filter(|b| *b < 0x80)
}

fn to_7bit(value: f32) -> u8 {
    if value.is_nan() {
        return 0;
    }
    (value.clamp(0.0, 1.0) * 127.0).round() as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_note_on() {
        let data = encode_midi_message("1/note/60", 1.0).unwrap();
        assert_eq!(data, vec![0x90, 60, 127]);
    }

    #[test]
    fn test_encode_note_off_on_zero() {
        let data = encode_midi_message("2/note/60", 0.0).unwrap();
        assert_eq!(data, vec![0x81, 60, 0]);
    }

    #[test]
    fn test_encode_small_velocity_is_not_note_off() {
        let data = encode_midi_message("1/note/60", 0.001).unwrap();
        assert_eq!(data[0], 0x90);
        assert_eq!(data[2], 1);
    }

    #[test]
    fn test_encode_control_change() {
        let data = encode_midi_message("16/cc/1", 0.5).unwrap();
        assert_eq!(data, vec![0xBF, 1, 64]);
    }

    #[test]
    fn test_encode_pitch_bend() {
        assert_eq!(encode_midi_message("1/bend", 0.0).unwrap(), vec![0xE0, 0x00, 0x40]);
        assert_eq!(encode_midi_message("1/bend", 1.0).unwrap(), vec![0xE0, 0x7F, 0x7F]);
        assert_eq!(encode_midi_message("1/bend", -1.0).unwrap(), vec![0xE0, 0x00, 0x00]);
    }

    #[test]
    fn test_encode_program_and_pressure() {
        assert_eq!(encode_midi_message("3/program", 12.0).unwrap(), vec![0xC2, 12]);
        assert_eq!(encode_midi_message("1/pressure", 1.0).unwrap(), vec![0xD0, 127]);
    }

    #[test]
    fn test_encode_rejects_malformed() {
        assert!(encode_midi_message("", 1.0).is_none());
        assert!(encode_midi_message("0/note/60", 1.0).is_none());
        assert!(encode_midi_message("17/note/60", 1.0).is_none());
        assert!(encode_midi_message("1/note/128", 1.0).is_none());
        assert!(encode_midi_message("1/note", 1.0).is_none());
        assert!(encode_midi_message("1/cc/x", 1.0).is_none());
        assert!(encode_midi_message("1/sysex", 1.0).is_none());
        assert!(encode_midi_message("1/program", 300.0).is_none());
    }
}
