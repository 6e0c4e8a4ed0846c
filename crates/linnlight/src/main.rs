use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, bail};
use clap::Parser;
use linnlight_core::{
    ConfigManager, HostClock, MidiModule, ModuleEvent, ModuleId, ModuleManager, ModuleMessage,
    ScaleKind, Settings, SharedScale,
};
use linnlight_linnstrument::LinnstrumentModule;
use midir::MidiOutput;
use parking_lot::RwLock;

mod host;

use host::HostInput;

/// Lights a LinnStrument grid from the notes a host is playing.
#[derive(Parser, Debug)]
#[command(name = "linnlight")]
#[command(about = "LinnStrument grid lighting")]
struct Args {
    /// Device output port name to look for (default: LinnStrument)
    #[arg(long)]
    device: Option<String>,

    /// Host MIDI input port carrying the notes to light
    #[arg(short, long)]
    input: Option<String>,

    /// How long released notes take to fade back to the scale colors
    #[arg(long)]
    decay_ms: Option<f32>,

    /// Start with every cell blacked out
    #[arg(long)]
    blackout: bool,

    /// Scale root pitch class (0 = C, 11 = B)
    #[arg(long, value_parser = clap::value_parser!(u8).range(0..12))]
    root: Option<u8>,

    /// Scale kind (major, minor, dorian, mixolydian, chromatic)
    #[arg(long)]
    scale: Option<ScaleKind>,

    /// Config file (default: <config dir>/linnlight/config.json)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Print MIDI ports and exit
    #[arg(long)]
    list_devices: bool,
}

impl Args {
    fn apply_to(&self, settings: &mut Settings) {
        if let Some(device) = &self.device {
            // A different device makes the saved port index meaningless
            if *device != settings.device_name {
                settings.device_index = None;
            }
            settings.device_name = device.clone();
        }
        if let Some(input) = &self.input {
            settings.input_port = Some(input.clone());
        }
        if let Some(decay_ms) = self.decay_ms {
            settings.decay_ms = decay_ms;
        }
        if self.blackout {
            settings.blackout = true;
        }
        if let Some(root) = self.root {
            settings.scale_root = root;
        }
        if let Some(kind) = self.scale {
            settings.scale_kind = kind;
        }
    }
}

fn list_devices() -> anyhow::Result<()> {
    let midi_out = MidiOutput::new("linnlight_list")?;
    println!("MIDI outputs (devices):");
    for (index, port) in midi_out.ports().iter().enumerate() {
        println!("  {}: {}", index, midi_out.port_name(port)?);
    }

    println!("MIDI inputs (host):");
    let inputs = MidiModule::input_port_names().map_err(|e| anyhow!("{}", e))?;
    for name in inputs {
        println!("  {}", name);
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    if args.list_devices {
        return list_devices();
    }

    let mut config = ConfigManager::new(args.config.clone());
    let mut settings = config.load()?;
    args.apply_to(&mut settings);
    if let Err(errors) = ConfigManager::validate_settings(&settings) {
        bail!("Invalid settings: {}", errors.join(", "));
    }

    log::info!(
        "Scale {} {}, decay {} ms, octave {}",
        settings.scale_root,
        settings.scale_kind,
        settings.decay_ms,
        settings.octave
    );

    let scale: SharedScale = Arc::new(RwLock::new(settings.scale()));
    let clock = HostClock::new();
    let host_input = HostInput::new(clock, settings.bend_range_semitones);

    let mut manager = ModuleManager::new();
    manager.register_module(Box::new(LinnstrumentModule::new(&settings, scale, clock)));
    match &settings.input_port {
        Some(port) => manager.register_module(Box::new(MidiModule::new(port.clone()))),
        None => log::warn!("No host input port configured; the grid shows the scale only"),
    }

    manager.initialize().await?;
    manager.start()?;

    let mut messages = manager
        .take_message_receiver()
        .ok_or_else(|| anyhow!("Module message receiver already taken"))?;

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                log::info!("Interrupted, shutting down");
                break;
            }

            message = messages.recv() => match message {
                Some(ModuleMessage::Event(ModuleEvent::MidiInput(midi))) => {
                    if let Some(command) = host_input.route(midi) {
                        let event = ModuleEvent::Lighting(command);
                        if let Err(e) = manager.try_send_to_module(ModuleId::Lighting, event) {
                            log::warn!("Dropped note event: {}", e);
                        }
                    }
                }
                Some(ModuleMessage::Event(ModuleEvent::LightingStateChanged(state))) => {
                    settings.update_from(&state);
                }
                Some(ModuleMessage::Event(_)) => {}
                Some(ModuleMessage::Status(status)) => log::info!("{}", status),
                Some(ModuleMessage::Error(error)) => log::error!("{}", error),
                None => break,
            }
        }
    }

    manager.shutdown().await;

    // Pick up anything reported while the modules were stopping
    while let Ok(message) = messages.try_recv() {
        if let ModuleMessage::Event(ModuleEvent::LightingStateChanged(state)) = message {
            settings.update_from(&state);
        }
    }

    config.update_settings(settings)?;
    log::info!("Saved settings to {}", config.config_path().display());
    Ok(())
}
