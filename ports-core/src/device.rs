//! Output device abstraction.
//!
//! `OutputDevice` captures what the bridge asks of the hardware (configure a
//! channel, write a level, flush) independently of how a driver does it.
//! Calls arrive from both the tick thread and the OSC receive thread, so
//! implementations synchronize internally. Channel writes are made while
//! that channel's store lock is held: implementations must return promptly
//! and must not call back into the store.

use ports_types::ChannelIndex;

pub trait OutputDevice: Send + Sync {
    /// One-time hardware setup before the first tick.
    fn configure(&self);

    /// Set a channel's electrical mode. `force` re-applies it even if the
    /// driver believes it is already set.
    fn set_channel_mode(&self, channel: ChannelIndex, is_input: bool, is_bipolar: bool, force: bool);

    /// Stage a level for a channel; takes effect on the next `update`.
    fn set_channel_value(&self, channel: ChannelIndex, value: f32, is_input: bool, is_bipolar: bool);

    /// Flush staged values to the hardware.
    fn update(&self);
}

/// Device that only logs. Used when no hardware driver is linked in.
#[derive(Default)]
pub struct LogDevice;

impl LogDevice {
    pub fn new() -> Self {
        LogDevice
    }
}

impl OutputDevice for LogDevice {
    fn configure(&self) {
        log::info!(target: "device", "log device configured (no hardware attached)");
    }

    fn set_channel_mode(&self, channel: ChannelIndex, is_input: bool, is_bipolar: bool, force: bool) {
        log::debug!(
            target: "device",
            "channel {} mode: input={} bipolar={} force={}",
            channel, is_input, is_bipolar, force
        );
    }

    fn set_channel_value(&self, channel: ChannelIndex, value: f32, _is_input: bool, _is_bipolar: bool) {
        log::trace!(target: "device", "channel {} = {:.4}", channel, value);
    }

    fn update(&self) {}
}
