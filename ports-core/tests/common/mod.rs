#![allow(dead_code)]
//! Test harness utilities for ports-core integration tests.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use ports_core::config::{ChannelSettings, TimerSettings};
use ports_core::device::OutputDevice;
use ports_core::dispatch::Dispatcher;
use ports_core::midi::MidiSink;
use ports_core::scheduler::TickScheduler;
use ports_core::store::ChannelStore;
use ports_types::ChannelIndex;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DeviceCall {
    Configure,
    Mode {
        channel: usize,
        is_input: bool,
        is_bipolar: bool,
        force: bool,
    },
    Value {
        channel: usize,
        value: f32,
        is_bipolar: bool,
    },
    Update,
}

/// Device that records every call in order.
#[derive(Default)]
pub struct RecordingDevice {
    calls: Mutex<Vec<DeviceCall>>,
}

impl RecordingDevice {
    pub fn calls(&self) -> Vec<DeviceCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.calls.lock().unwrap().clear();
    }

    pub fn mode_calls(&self, channel: usize) -> Vec<DeviceCall> {
        self.calls()
            .into_iter()
            .filter(|c| matches!(c, DeviceCall::Mode { channel: ch, .. } if *ch == channel))
            .collect()
    }

    pub fn values_for(&self, channel: usize) -> Vec<f32> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                DeviceCall::Value { channel: ch, value, .. } if ch == channel => Some(value),
                _ => None,
            })
            .collect()
    }

    pub fn update_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, DeviceCall::Update))
            .count()
    }

    fn push(&self, call: DeviceCall) {
        self.calls.lock().unwrap().push(call);
    }
}

impl OutputDevice for RecordingDevice {
    fn configure(&self) {
        self.push(DeviceCall::Configure);
    }

    fn set_channel_mode(&self, channel: ChannelIndex, is_input: bool, is_bipolar: bool, force: bool) {
        self.push(DeviceCall::Mode {
            channel: channel.get(),
            is_input,
            is_bipolar,
            force,
        });
    }

    fn set_channel_value(&self, channel: ChannelIndex, value: f32, _is_input: bool, is_bipolar: bool) {
        self.push(DeviceCall::Value {
            channel: channel.get(),
            value,
            is_bipolar,
        });
    }

    fn update(&self) {
        self.push(DeviceCall::Update);
    }
}

/// MIDI sink that records forwarded messages.
#[derive(Default)]
pub struct RecordingMidi {
    messages: Mutex<Vec<(String, usize, f32)>>,
}

impl RecordingMidi {
    pub fn messages(&self) -> Vec<(String, usize, f32)> {
        self.messages.lock().unwrap().clone()
    }
}

impl MidiSink for RecordingMidi {
    fn message(&self, path: &str, offset: usize, value: f32) {
        self.messages
            .lock()
            .unwrap()
            .push((path.to_string(), offset, value));
    }
}

pub struct Harness {
    pub store: Arc<ChannelStore>,
    pub device: Arc<RecordingDevice>,
    pub midi: Arc<RecordingMidi>,
    pub dispatcher: Arc<Dispatcher>,
    pub settings: ChannelSettings,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_settings(ChannelSettings::default())
    }

    pub fn with_settings(settings: ChannelSettings) -> Self {
        let store = Arc::new(ChannelStore::new(settings.pwm_duty));
        let device = Arc::new(RecordingDevice::default());
        let midi = Arc::new(RecordingMidi::default());
        let dispatcher = Arc::new(Dispatcher::new(
            Arc::clone(&store),
            device.clone(),
            midi.clone(),
            settings,
        ));
        Self {
            store,
            device,
            midi,
            dispatcher,
            settings,
        }
    }

    pub fn scheduler(&self, timer: TimerSettings) -> TickScheduler {
        TickScheduler::new(Arc::clone(&self.store), self.device.clone(), self.settings, timer)
    }

    pub fn channel(&self, wire: i64) -> ports_types::Channel {
        self.store.snapshot(ChannelIndex::from_wire(wire).unwrap())
    }
}

/// Poll `cond` until it holds or `timeout` passes.
pub fn wait_until(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let start = Instant::now();
    while start.elapsed() < timeout {
        if cond() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    cond()
}
