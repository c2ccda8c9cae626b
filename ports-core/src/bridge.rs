//! Runtime assembly: the channel store, dispatcher, tick thread and OSC
//! listener started together and stopped in order.

use std::net::SocketAddr;
use std::sync::Arc;

use crate::config::Config;
use crate::device::OutputDevice;
use crate::dispatch::Dispatcher;
use crate::midi::MidiSink;
use crate::osc_server::OscServer;
use crate::scheduler::TickScheduler;
use crate::store::ChannelStore;
use crate::tick_thread::TickThread;

pub struct Bridge {
    store: Arc<ChannelStore>,
    osc: OscServer,
    ticks: TickThread,
}

impl Bridge {
    /// Configure the device, apply presets, then start ticking and listening.
    pub fn start(
        config: &Config,
        device: Arc<dyn OutputDevice>,
        midi: Arc<dyn MidiSink>,
    ) -> std::io::Result<Self> {
        let settings = config.channels();
        let store = Arc::new(ChannelStore::new(settings.pwm_duty));
        device.configure();

        let dispatcher = Arc::new(Dispatcher::new(
            Arc::clone(&store),
            Arc::clone(&device),
            midi,
            settings,
        ));
        for preset in config.presets() {
            dispatcher.apply_preset(preset);
        }

        let ticks = TickThread::spawn(TickScheduler::new(
            Arc::clone(&store),
            device,
            settings,
            config.timer(),
        ))?;
        // On error `ticks` drops here, which stops the thread.
        let osc = OscServer::bind(&config.osc_addr(), dispatcher)?;

        Ok(Self { store, osc, ticks })
    }

    pub fn store(&self) -> &Arc<ChannelStore> {
        &self.store
    }

    pub fn osc_addr(&self) -> SocketAddr {
        self.osc.local_addr()
    }

    /// Stop taking commands, then stop the tick thread. Returns the final
    /// scheduler, or `None` if the tick thread panicked.
    pub fn shutdown(self) -> Option<TickScheduler> {
        let Bridge { mut osc, ticks, .. } = self;
        osc.stop();
        let scheduler = ticks.stop();
        match &scheduler {
            Some(s) => log::info!(target: "bridge", "stopped after {} overruns", s.overrun_count()),
            None => log::error!(target: "bridge", "tick thread panicked"),
        }
        scheduler
    }
}
