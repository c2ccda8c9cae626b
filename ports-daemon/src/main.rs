use std::fs::File;
use std::path::PathBuf;
use std::sync::Arc;

use crossbeam_channel::Receiver;
use ports_core::bridge::Bridge;
use ports_core::config::Config;
use ports_core::device::LogDevice;
use ports_core::instance::InstanceLock;
use ports_core::midi::{self, MidiOutputManager, MidiSink, NullMidi};

const USAGE: &str =
    "usage: portsd [--config <path>] [--port <n>] [--pid-file <path>] [--list-midi] [-v|--verbose]";

struct Args {
    verbose: bool,
    list_midi: bool,
    config_path: Option<PathBuf>,
    pid_file: Option<PathBuf>,
    port: Option<u16>,
}

fn parse_args() -> Result<Args, String> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let value_after = |flag: &str| -> Result<Option<String>, String> {
        match args.iter().position(|a| a == flag) {
            Some(i) => args
                .get(i + 1)
                .cloned()
                .map(Some)
                .ok_or_else(|| format!("{} needs a value", flag)),
            None => Ok(None),
        }
    };

    let port = match value_after("--port")? {
        Some(p) => Some(p.parse().map_err(|_| format!("invalid port: {}", p))?),
        None => None,
    };

    Ok(Args {
        verbose: args.iter().any(|a| a == "--verbose" || a == "-v"),
        list_midi: args.iter().any(|a| a == "--list-midi"),
        config_path: value_after("--config")?.map(PathBuf::from),
        pid_file: value_after("--pid-file")?.map(PathBuf::from),
        port,
    })
}

fn init_logging(verbose: bool) {
    use simplelog::*;

    let log_level = if verbose { LevelFilter::Debug } else { LevelFilter::Info };

    let mut loggers: Vec<Box<dyn SharedLogger>> = vec![TermLogger::new(
        log_level,
        Config::default(),
        TerminalMode::Stderr,
        ColorChoice::Auto,
    )];

    let log_path = dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("ports")
        .join("portsd.log");

    if let Some(parent) = log_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }

    match File::create(&log_path).or_else(|_| File::create("/tmp/portsd.log")) {
        Ok(log_file) => loggers.push(WriteLogger::new(log_level, Config::default(), log_file)),
        Err(e) => eprintln!("portsd: no log file ({}), logging to stderr only", e),
    }

    if CombinedLogger::init(loggers).is_err() {
        eprintln!("portsd: logger already initialized");
    }

    log::info!("portsd starting (log level: {:?})", log_level);
}

fn open_midi(config: &Config) -> Arc<dyn MidiSink> {
    let Some(name) = config.midi_device() else {
        log::info!(target: "midi", "no MIDI device configured");
        return Arc::new(NullMidi);
    };

    let mut output = MidiOutputManager::new();
    match output.open_device(name) {
        Ok(()) => Arc::new(output),
        Err(e) => {
            log::warn!(target: "midi", "MIDI disabled: {}", e);
            Arc::new(NullMidi)
        }
    }
}

/// SIGINT and SIGTERM both arrive here as one message.
fn shutdown_signal() -> std::io::Result<Receiver<()>> {
    let (tx, rx) = crossbeam_channel::bounded(1);
    ctrlc::set_handler(move || {
        let _ = tx.try_send(());
    })
    .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))?;
    Ok(rx)
}

fn main() -> std::io::Result<()> {
    let args = match parse_args() {
        Ok(args) => args,
        Err(e) => {
            eprintln!("portsd: {}\n{}", e, USAGE);
            std::process::exit(2);
        }
    };
    init_logging(args.verbose);

    if args.list_midi {
        let ports = midi::list_output_ports();
        if ports.is_empty() {
            println!("no MIDI output ports");
        }
        for port in ports {
            println!("{}: {}", port.index, port.name);
        }
        return Ok(());
    }

    let mut config = match &args.config_path {
        Some(path) => Config::load_from(path).map_err(|e| {
            log::error!(target: "config", "{}", e);
            std::io::Error::new(std::io::ErrorKind::InvalidInput, e.to_string())
        })?,
        None => Config::load(),
    };
    if let Some(port) = args.port {
        config.set_osc_port(port);
    }
    if let Some(path) = &args.pid_file {
        config.set_pid_file(path);
    }

    let _instance = match InstanceLock::acquire(&config.pid_file()) {
        Ok(lock) => lock,
        Err(e) => {
            log::error!("{}, exiting", e);
            std::process::exit(1);
        }
    };
    let shutdown = shutdown_signal()?;

    let bridge = Bridge::start(&config, Arc::new(LogDevice::new()), open_midi(&config))?;
    log::info!("portsd running, OSC on {}", bridge.osc_addr());

    let _ = shutdown.recv();
    log::info!("shutdown requested");
    bridge.shutdown();
    log::info!("portsd terminated");
    Ok(())
}
