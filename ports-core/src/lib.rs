//! # ports-core
//!
//! Control bridge between OSC messages and a multi-channel CV/gate output
//! device. Keeps per-channel output state and regenerates it on a fixed
//! timer tick (triggers, LFOs), independent of any particular hardware driver.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use ports_core::bridge::Bridge;
//! use ports_core::config::Config;
//! use ports_core::device::LogDevice;
//! use ports_core::midi::NullMidi;
//!
//! let config = Config::load();
//! let bridge = Bridge::start(&config, Arc::new(LogDevice::new()), Arc::new(NullMidi))?;
//! println!("listening on {}", bridge.osc_addr());
//! // ... until shutdown is requested
//! bridge.shutdown();
//! ```
//!
//! ## Module Overview
//!
//! - [`store`]: `ChannelStore`, the per-channel locked state table
//! - [`parser`]: control path classification into `ParsedCommand`
//! - [`dispatch`]: `Dispatcher`: validation, clamping, mode transitions
//! - [`waveform`]: LFO shapes
//! - [`scheduler`]: `TickScheduler`: trigger countdowns, LFO phase, device flush
//! - [`tick_thread`]: thread driving the scheduler at its period
//! - [`telemetry`]: tick interval statistics and overrun counting
//! - [`device`]: `OutputDevice` trait and the logging device
//! - [`midi`]: `MidiSink` trait and midir-backed output
//! - [`osc_server`]: UDP/OSC receive thread
//! - [`config`]: TOML configuration (embedded defaults + user override)
//! - [`bridge`]: starts and stops the store, tick thread and OSC listener together
//! - [`instance`]: PID file lock keeping a single daemon per host

pub mod bridge;
pub mod config;
pub mod device;
pub mod dispatch;
pub mod instance;
pub mod midi;
pub mod osc_server;
pub mod parser;
pub mod scheduler;
pub mod store;
pub mod telemetry;
pub mod tick_thread;
pub mod waveform;
