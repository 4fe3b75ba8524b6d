// Copyright 2025 Amiable
// SPDX-License-Identifier: MIT

//! `midirouter` host binary (C13): wires the `midir`/`enigo`/`uinput`
//! adapters to the routing core, loads a profile, and hot-reloads it on
//! file change. A thin process shell; it holds no business logic of its
//! own — see `midirouter-core` for the engine.

mod adapters;
mod error;

use clap::Parser;
use midirouter_core::logging::{init_logging, LoggingConfig};
use midirouter_core::{
    DeviceConfigManager, Dispatcher, MidiAdapter, ProfileController, Services, StateStore,
};
use notify::RecursiveMode;
use notify_debouncer_full::{new_debouncer, Debouncer, RecommendedCache};
use std::path::PathBuf;
use std::sync::mpsc;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::adapters::gamepad::UinputGameController;
use crate::adapters::input_sim::EnigoInputSimulator;
use crate::adapters::midi::MidirAdapter;
use crate::error::{DaemonError, Result};

/// MIDI-to-input router daemon.
#[derive(Parser, Debug)]
#[command(name = "midirouter", version, about = "MIDI-to-input router")]
struct Args {
    /// Path to the profile JSON file to load and watch for changes.
    #[arg(long)]
    profile: Option<PathBuf>,

    /// Log level: trace, debug, info, warn, error.
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Log format: text or json.
    #[arg(long, default_value = "text")]
    log_format: String,

    /// List available MIDI input ports and exit.
    #[arg(long)]
    list_devices: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let mut logging = LoggingConfig::default().with_level(&args.log_level);
    if args.log_format == "json" {
        logging = logging.with_json_format();
    }
    init_logging(&logging).map_err(|e| DaemonError::Logging(e.to_string()))?;

    if args.list_devices {
        return list_devices();
    }

    let profile_path = args.profile.ok_or_else(|| {
        DaemonError::Logging("--profile is required unless --list-devices is given".to_string())
    })?;

    run(profile_path)
}

fn list_devices() -> Result<()> {
    let midi = MidirAdapter::new().map_err(DaemonError::MidiAdapter)?;
    for (index, name) in midi.list_input_ports().map_err(DaemonError::MidiAdapter)? {
        println!("{index}: {name}");
    }
    Ok(())
}

fn run(profile_path: PathBuf) -> Result<()> {
    let rt = tokio::runtime::Runtime::new()?;
    let handle = rt.handle().clone();

    let midi = Arc::new(MidirAdapter::new().map_err(DaemonError::MidiAdapter)?);
    let input = Arc::new(EnigoInputSimulator::new().map_err(DaemonError::InputSimulator)?);
    let controller_facade = Arc::new(UinputGameController::new());

    let devices = Arc::new(DeviceConfigManager::new(Services {
        state: Arc::new(StateStore::new()),
        input,
        midi: Arc::clone(&midi) as Arc<dyn MidiAdapter>,
        controller: controller_facade,
    }));

    let allowed_dirs = vec![profile_path
        .parent()
        .map(|p| p.to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."))];
    let profile_controller = ProfileController::new(Arc::clone(&devices), allowed_dirs);
    profile_controller.load_and_activate(&profile_path)?;

    let dispatcher = Arc::new(Dispatcher::new(Arc::clone(&devices)));
    let connections = connect_configured_devices(&devices, &midi, &dispatcher, &handle)?;

    let watcher = watch_profile(profile_path.clone(), profile_controller)?;

    info!(profile = %profile_path.display(), "midirouter running, press Ctrl-C to stop");
    let (tx, rx) = mpsc::channel();
    ctrlc::set_handler(move || {
        let _ = tx.send(());
    })
    .map_err(|e| DaemonError::Logging(e.to_string()))?;
    let _ = rx.recv();
    info!("shutting down");

    drop(watcher);
    drop(connections);
    Ok(())
}

/// Open a MIDI input port for every distinct device name the active
/// profile references, matching by substring since ALSA/CoreMIDI port
/// names often carry a client-id suffix the profile doesn't know about.
fn connect_configured_devices(
    devices: &Arc<DeviceConfigManager>,
    midi: &Arc<MidirAdapter>,
    dispatcher: &Arc<Dispatcher>,
    handle: &tokio::runtime::Handle,
) -> Result<Vec<midir::MidiInputConnection<()>>> {
    let profile = devices
        .active_profile()
        .expect("load_and_activate just succeeded");
    let ports = midi.list_input_ports().map_err(DaemonError::MidiAdapter)?;

    let mut connections = Vec::new();
    for device in &profile.devices {
        let wanted = &device.device_name;
        let Some((port_index, port_name)) = ports
            .iter()
            .find(|(_, name)| wanted == "*" || name.contains(wanted.as_str()))
            .cloned()
        else {
            warn!(device = wanted, "no matching MIDI input port found, skipping");
            continue;
        };

        let device_id = format!("{port_index}:{port_name}");
        match midi.connect_input(
            port_index,
            device_id,
            wanted.clone(),
            Arc::clone(devices),
            Arc::clone(dispatcher),
            handle.clone(),
        ) {
            Ok(conn) => connections.push(conn),
            Err(e) => error!(device = wanted, error = %e, "failed to open MIDI input port"),
        }
    }

    if connections.is_empty() && !profile.devices.is_empty() {
        let wanted: Vec<&str> = profile.devices.iter().map(|d| d.device_name.as_str()).collect();
        return Err(DaemonError::DeviceNotFound(wanted.join(", ")));
    }
    Ok(connections)
}

/// Debounced file-watch hot reload, grounded in the teacher's
/// `notify`/`notify-debouncer-full` config-watcher but trimmed of IPC
/// notification plumbing — the only observable effect of a reload here is
/// the registry swap `controller.reload` performs.
fn watch_profile(
    path: PathBuf,
    controller: ProfileController,
) -> Result<Debouncer<notify::RecommendedWatcher, RecommendedCache>> {
    let watch_path = path.clone();
    let mut debouncer = new_debouncer(Duration::from_millis(500), None, move |result| match result {
        Ok(_events) => match controller.reload(&watch_path) {
            Ok(()) => info!(path = %watch_path.display(), "profile reloaded"),
            Err(e) => error!(path = %watch_path.display(), error = %e, "profile reload failed, previous profile remains active"),
        },
        Err(errors) => {
            for e in errors {
                error!(error = %e, "profile file watch error");
            }
        }
    })?;
    debouncer.watch(&path, RecursiveMode::NonRecursive)?;
    Ok(debouncer)
}
