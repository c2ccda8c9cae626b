use std::thread::{self, JoinHandle};
use std::time::Instant;

use crossbeam_channel::{Receiver, Sender};

use crate::scheduler::TickScheduler;

/// Dedicated thread firing the tick scheduler at its nominal period.
///
/// The thread only shares the channel store (through the scheduler) with the
/// rest of the process. It stops when `stop` is called or the handle drops.
pub struct TickThread {
    shutdown_tx: Option<Sender<()>>,
    handle: Option<JoinHandle<TickScheduler>>,
}

impl TickThread {
    pub fn spawn(scheduler: TickScheduler) -> std::io::Result<Self> {
        let (shutdown_tx, shutdown_rx) = crossbeam_channel::bounded(1);
        let handle = thread::Builder::new()
            .name("ports-tick".into())
            .spawn(move || run(scheduler, shutdown_rx))?;
        Ok(Self {
            shutdown_tx: Some(shutdown_tx),
            handle: Some(handle),
        })
    }

    /// Stop ticking and hand the scheduler back.
    pub fn stop(mut self) -> Option<TickScheduler> {
        self.shutdown()
    }

    /// Block until the tick thread exits. For the daemon this is forever.
    pub fn join(mut self) -> Option<TickScheduler> {
        self.handle.take()?.join().ok()
    }

    fn shutdown(&mut self) -> Option<TickScheduler> {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        self.handle.take()?.join().ok()
    }
}

impl Drop for TickThread {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run(mut scheduler: TickScheduler, shutdown_rx: Receiver<()>) -> TickScheduler {
    let period = scheduler.timer().period;
    log::info!(target: "tick", "tick thread started, period {:?}", period);

    let started = Instant::now();
    scheduler.reset_clock(started);
    let mut next = started + period;
    loop {
        let remaining = next.saturating_duration_since(Instant::now());

        crossbeam_channel::select! {
            // Explicit stop or sender dropped
            recv(shutdown_rx) -> _ => break,
            default(remaining) => {}
        }

        scheduler.tick();

        next += period;
        let now = Instant::now();
        // After a long stall, restart the cadence instead of bursting ticks.
        if now > next + period {
            next = now + period;
        }
    }

    log::info!(target: "tick", "tick thread stopped");
    scheduler
}

