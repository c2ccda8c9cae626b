use std::net::{SocketAddr, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use rosc::{OscPacket, OscType};

use crate::dispatch::Dispatcher;

/// Receive-side OSC transport: decodes UDP packets and hands each message
/// to the dispatcher on its own thread.
pub struct OscServer {
    local_addr: SocketAddr,
    running: Arc<AtomicBool>,
    recv_thread: Option<JoinHandle<()>>,
}

impl OscServer {
    pub fn bind(addr: &str, dispatcher: Arc<Dispatcher>) -> std::io::Result<Self> {
        let socket = UdpSocket::bind(addr)?;
        // Bounded read so the thread notices `stop`.
        socket.set_read_timeout(Some(Duration::from_millis(50)))?;
        let local_addr = socket.local_addr()?;
        let running = Arc::new(AtomicBool::new(true));

        let thread_running = Arc::clone(&running);
        let handle = thread::Builder::new()
            .name("ports-osc".into())
            .spawn(move || {
                let mut buf = [0u8; 4096];
                while thread_running.load(Ordering::Relaxed) {
                    match socket.recv(&mut buf) {
                        Ok(n) => match rosc::decoder::decode_udp(&buf[..n]) {
                            Ok((_, packet)) => handle_osc_packet(&packet, &dispatcher),
                            Err(e) => log::warn!(target: "osc", "undecodable packet ({} bytes): {:?}", n, e),
                        },
                        Err(ref e)
                            if e.kind() == std::io::ErrorKind::WouldBlock
                                || e.kind() == std::io::ErrorKind::TimedOut =>
                        {
                            continue
                        }
                        Err(e) => {
                            log::error!(target: "osc", "receive failed, stopping OSC server: {}", e);
                            break;
                        }
                    }
                }
            })?;

        log::info!(target: "osc", "listening on {}", local_addr);
        Ok(Self {
            local_addr,
            running,
            recv_thread: Some(handle),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn stop(&mut self) {
        self.running.store(false, Ordering::Relaxed);
        if let Some(handle) = self.recv_thread.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for OscServer {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Recursively process an OSC packet (handles bundles wrapping messages)
fn handle_osc_packet(packet: &OscPacket, dispatcher: &Dispatcher) {
    match packet {
        OscPacket::Message(msg) => {
            dispatcher.dispatch(&msg.addr, message_value(&msg.args));
        }
        OscPacket::Bundle(bundle) => {
            for p in &bundle.content {
                handle_osc_packet(p, dispatcher);
            }
        }
    }
}

/// The command value: a lone numeric argument, otherwise 1.0.
pub fn message_value(args: &[OscType]) -> f32 {
    match args {
        [OscType::Float(v)] => *v,
        [OscType::Double(v)] => *v as f32,
        [OscType::Int(v)] => *v as f32,
        [OscType::Long(v)] => *v as f32,
        _ => 1.0,
    }
}
