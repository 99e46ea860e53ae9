// Copyright (C) 2026 Brian Johnson
//
// This program is free software; you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation; either version 2 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along
// with this program; if not, write to the Free Software Foundation, Inc.,
// 51 Franklin Street, Fifth Floor, Boston, MA 02110-1301 USA.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;
use luxlink::config::Config;
use luxlink::{Projector, Raster, TransferMode, TransferPlan, UdpTransport};

#[derive(Parser)]
#[command(name = "luxlink")]
#[command(about = "Load images and sequencer programs into a Lux4600 projector over UDP", long_about = None)]
#[command(disable_help_subcommand = true)]
struct Cli {
    /// Configuration file
    #[arg(short, long, default_value = "luxlink.toml")]
    config: PathBuf,

    /// Projector address
    #[arg(long)]
    host: Option<String>,

    /// Command channel UDP port
    #[arg(long, value_name = "PORT")]
    command_port: Option<u16>,

    /// Data channel UDP port
    #[arg(long, value_name = "PORT")]
    data_port: Option<u16>,

    /// Reply timeout in milliseconds
    #[arg(long, value_name = "MS")]
    timeout: Option<u64>,

    /// Enable debug output
    #[arg(long)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Query slot size and image type to confirm the projector answers
    Check,
    /// Show sequencer, mask, internal image and LED state
    Status {
        /// LED driver to query
        #[arg(long, default_value = "1")]
        led: u16,
    },
    /// Load a packed 1-bit raster into an image slot
    LoadImage {
        /// Raster file, rows packed MSB first with no header
        file: PathBuf,
        /// Image slot
        #[arg(short, long, default_value = "0")]
        inum: u32,
        /// Pixels per row
        #[arg(short, long, default_value = "1920")]
        width: usize,
        /// Wire encoding
        #[arg(short, long, value_enum, default_value = "raw")]
        mode: Mode,
        /// Lines per raw packet (defaults to the config value)
        #[arg(long)]
        lines_per_packet: Option<usize>,
    },
    /// Upload a sequencer program
    LoadSequence {
        /// Program file
        file: PathBuf,
        /// Bytes per chunk, a multiple of 8 (defaults to the config value)
        #[arg(long)]
        chunk_size: Option<usize>,
    },
    /// Control the sequencer
    Sequencer {
        #[arg(value_enum)]
        action: SequencerAction,
    },
    /// Set an LED driver amplitude (0-4095)
    LedAmplitude {
        led: u16,
        amplitude: u16,
    },
    /// Drive the software sync line
    Sync {
        #[arg(value_enum)]
        level: Level,
    },
    /// Switch the flatness correction mask
    FlatnessMask {
        #[arg(value_enum)]
        state: Switch,
    },
    /// Display a built-in test image
    InternalImage {
        image: u8,
    },
    /// Print the default configuration
    GenConfig,
}

#[derive(Clone, Copy, ValueEnum)]
enum Mode {
    Raw,
    Rle,
}

impl From<Mode> for TransferMode {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Raw => TransferMode::Raw,
            Mode::Rle => TransferMode::Rle,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum Level {
    High,
    Low,
}

#[derive(Clone, Copy, ValueEnum)]
enum Switch {
    On,
    Off,
}

#[derive(Clone, Copy, ValueEnum)]
enum SequencerAction {
    Start,
    Stop,
    Reset,
}

fn main() {
    let cli = Cli::parse();

    let mut config = Config::load(&cli.config);
    if let Some(host) = cli.host {
        config.transport.host = host;
    }
    if let Some(port) = cli.command_port {
        config.transport.command_port = port;
    }
    if let Some(port) = cli.data_port {
        config.transport.data_port = port;
    }
    if let Some(ms) = cli.timeout {
        config.transport.timeout_ms = ms;
    }

    let level = if cli.debug { "debug" } else { config.logging.level.as_str() };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();

    if let Err(e) = run(cli.command, &config) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(command: Commands, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    if let Commands::GenConfig = command {
        print!("{}", Config::default().to_toml()?);
        return Ok(());
    }

    let transport = UdpTransport::open(&config.transport)?;
    let mut projector = Projector::new(Box::new(transport));

    match command {
        Commands::Check => {
            let info = projector.check_connection()?;
            println!("Connection successful: inum size {}, image type {}", info.inum_size, info.image_type);
        }
        Commands::Status { led } => {
            println!("{}", projector.status(led)?);
        }
        Commands::LoadImage { file, inum, width, mode, lines_per_packet } => {
            let mode = TransferMode::from(mode);
            let lines_per_packet = match mode {
                TransferMode::Raw => lines_per_packet.unwrap_or(config.session.lines_per_packet),
                TransferMode::Rle => 1,
            };
            let bytes = read_input(&file)?;
            let plan = TransferPlan::image(inum, lines_per_packet, Raster::new(width, &bytes), mode)?;

            println!("Loading {} into inum {} ({} packets)", file.display(), inum, plan.packet_count());
            let report = projector.transfer(plan, config.session.max_repairs)?;
            println!("Image loaded: {} datagrams sent, {} repairs", report.datagrams_sent, report.repairs);
        }
        Commands::LoadSequence { file, chunk_size } => {
            let program = read_input(&file)?;
            let plan = TransferPlan::sequence(&program, chunk_size.unwrap_or(config.session.chunk_size))?;

            println!("Uploading {} ({} chunks)", file.display(), plan.packet_count());
            projector.transfer(plan, config.session.max_repairs)?;
            println!("Sequencer program loaded");
        }
        Commands::Sequencer { action } => match action {
            SequencerAction::Start => projector.start_sequencer()?,
            SequencerAction::Stop => projector.stop_sequencer()?,
            SequencerAction::Reset => projector.reset_sequencer()?,
        },
        Commands::LedAmplitude { led, amplitude } => {
            projector.set_led_amplitude(led, amplitude)?;
        }
        Commands::Sync { level } => {
            projector.set_software_sync(matches!(level, Level::High))?;
        }
        Commands::FlatnessMask { state } => {
            projector.set_flatness_mask(matches!(state, Switch::On))?;
        }
        Commands::InternalImage { image } => {
            projector.load_internal_image(image)?;
        }
        Commands::GenConfig => {}
    }
    Ok(())
}

fn read_input(file: &Path) -> Result<Vec<u8>, std::io::Error> {
    std::fs::read(file).map_err(|e| {
        std::io::Error::new(e.kind(), format!("{}: {}", file.display(), e))
    })
}
