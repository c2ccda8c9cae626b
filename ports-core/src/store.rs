//! Process-wide channel table shared by the dispatcher and the tick scheduler.
//!
//! Each channel sits behind its own mutex. Callers hold a lock only for one
//! channel's read-modify-write plus the matching device write, never across a
//! whole tick or dispatch, and never around network or MIDI I/O.

use std::sync::{Mutex, MutexGuard, PoisonError};

use ports_types::{Channel, ChannelIndex, CHANNEL_COUNT};

pub struct ChannelStore {
    channels: [Mutex<Channel>; CHANNEL_COUNT],
}

impl ChannelStore {
    /// All channels unset, square LFOs starting at `pwm_duty`.
    pub fn new(pwm_duty: f32) -> Self {
        Self {
            channels: std::array::from_fn(|_| Mutex::new(Channel::new(pwm_duty))),
        }
    }

    /// Run `f` with exclusive access to one channel.
    pub fn with_channel<R>(&self, index: ChannelIndex, f: impl FnOnce(&mut Channel) -> R) -> R {
        let mut guard = self.lock(index);
        f(&mut guard)
    }

    /// Copy of one channel's current state.
    pub fn snapshot(&self, index: ChannelIndex) -> Channel {
        *self.lock(index)
    }

    /// Copy of every channel, taken one lock at a time.
    pub fn snapshot_all(&self) -> [Channel; CHANNEL_COUNT] {
        std::array::from_fn(|i| *self.channels[i].lock().unwrap_or_else(PoisonError::into_inner))
    }

    fn lock(&self, index: ChannelIndex) -> MutexGuard<'_, Channel> {
        // Channel is plain Copy data, so a poisoned lock still holds a usable value.
        self.channels[index.get()]
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for ChannelStore {
    fn default() -> Self {
        Self::new(Channel::default().lfo_pwm_duty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ports_types::ChannelMode;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_new_store_is_unset() {
        let store = ChannelStore::new(0.25);
        for ch in store.snapshot_all() {
            assert!(ch.mode.is_none());
            assert_eq!(ch.lfo_pwm_duty, 0.25);
        }
    }

    #[test]
    fn test_with_channel_mutates_only_target() {
        let store = ChannelStore::default();
        let idx = ChannelIndex::new(4).unwrap();
        store.with_channel(idx, |ch| {
            ch.mode = Some(ChannelMode::Gate);
            ch.value = 1.0;
        });
        let all = store.snapshot_all();
        assert_eq!(all[4].mode, Some(ChannelMode::Gate));
        assert_eq!(all[4].value, 1.0);
        assert!(all.iter().enumerate().all(|(i, ch)| i == 4 || ch.mode.is_none()));
    }

    #[test]
    fn test_poisoned_channel_still_readable() {
        let store = Arc::new(ChannelStore::default());
        let idx = ChannelIndex::new(0).unwrap();
        let poisoner = Arc::clone(&store);
        let _ = thread::spawn(move || {
            poisoner.with_channel(idx, |ch| {
                ch.value = 0.75;
                panic!("poison the lock");
            })
        })
        .join();
        assert_eq!(store.snapshot(idx).value, 0.75);
        store.with_channel(idx, |ch| ch.value = 0.25);
        assert_eq!(store.snapshot(idx).value, 0.25);
    }

    #[test]
    fn test_concurrent_writers_do_not_tear() {
        let store = Arc::new(ChannelStore::default());
        let idx = ChannelIndex::new(7).unwrap();
        let handles: Vec<_> = (0..4)
            .map(|n| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    for _ in 0..1000 {
                        store.with_channel(idx, |ch| {
                            ch.value = n as f32;
                            ch.trig_cycles_remaining = n;
                        });
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        let ch = store.snapshot(idx);
        assert_eq!(ch.value, ch.trig_cycles_remaining as f32);
    }
}
