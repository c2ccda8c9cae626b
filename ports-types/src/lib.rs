//! # ports-types
//!
//! Shared type definitions for the ports control bridge.
//! Plain data only: channel identities, modes, per-channel state and the
//! structured result of parsing a control path. Behavior lives in ports-core.

pub mod channel;
pub mod command;

pub use channel::{Channel, ChannelIndex, ChannelMode, LfoShape, CHANNEL_COUNT};
pub use command::{OutputParam, ParsedCommand};
