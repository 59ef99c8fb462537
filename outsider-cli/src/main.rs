//! Outsider: Blackstar ID Amplifier Control
//!
//! Command line front end for the protocol, transport and simulation crates.
//! Packet commands (`controls`, `encode`, `decode`, `preset`) work offline;
//! device commands (`watch`, `set`, `presets`) talk to the amplifier over USB
//! HID or, with `--simulate`, to an in-process virtual amplifier.

mod display;
mod settings;

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use outsider_link::{
    open_device, open_first_amp, run_watcher, AmpConnection, HidTransport, Transport,
    WatcherCommand, USB_PRODUCT_ID, USB_VENDOR_ID,
};
use outsider_protocol::packet::parse_hex;
use outsider_protocol::{
    decode_packet, encode_control_by_name, Control, Note, Preset, TunerReading, PACKET_LEN,
};
use outsider_sim::{run_virtual_amp_task, VirtualAmp, VirtualAmpCommand};
use tokio::io::DuplexStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use settings::Settings;

/// Default log filter covering every crate in the workspace
const DEFAULT_LOG_FILTER: &str =
    "outsider=info,outsider_protocol=info,outsider_link=info,outsider_sim=info";

#[derive(Parser, Debug)]
#[command(name = "outsider")]
#[command(version)]
#[command(
    about = "Control and monitor Blackstar ID series guitar amplifiers over USB.",
    long_about = None,
    after_help = "Examples:\n  outsider encode gain 100\n  outsider decode 03 02 00 01 64 --pad\n  outsider watch --simulate\n  outsider set delay_time 450 --device /dev/hidraw1"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug, Clone)]
struct DeviceArgs {
    /// HID device path, e.g. /dev/hidraw1 (defaults to the settings file
    /// value, then to the first amplifier found by USB ID)
    #[arg(long)]
    device: Option<PathBuf>,

    /// Talk to a virtual amplifier instead of hardware
    #[arg(long, conflicts_with = "device")]
    simulate: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List every control with its wire ID, range and value names
    Controls,

    /// Print the packet that sets a control
    Encode {
        /// Control name, e.g. gain or delay_time
        control: String,
        /// New value
        #[arg(allow_negative_numbers = true)]
        value: i32,
    },

    /// Decode a packet given as hex bytes
    Decode {
        /// Hex bytes, e.g. 03 02 00 01 40
        #[arg(required = true, num_args = 1..)]
        bytes: Vec<String>,
        /// Zero-fill short input to a full packet
        #[arg(long)]
        pad: bool,
    },

    /// Parse an exported preset file and print it as JSON
    Preset {
        /// Path to the exported preset
        file: PathBuf,
    },

    /// Print amplifier updates until interrupted
    Watch {
        #[command(flatten)]
        target: DeviceArgs,
    },

    /// Set a control on the amplifier
    Set {
        /// Control name, e.g. gain or delay_time
        control: String,
        /// New value
        #[arg(allow_negative_numbers = true)]
        value: i32,
        #[command(flatten)]
        target: DeviceArgs,
    },

    /// List the names of every stored preset
    Presets {
        #[command(flatten)]
        target: DeviceArgs,
    },

    /// Show or change saved settings
    Config {
        /// Default HID device path
        #[arg(long)]
        device: Option<PathBuf>,
        /// Read timeout in milliseconds
        #[arg(long)]
        read_timeout_ms: Option<u64>,
        /// Log filter used when RUST_LOG is not set
        #[arg(long)]
        log_filter: Option<String>,
    },
}

/// Where device commands send their packets
enum Target {
    Device(Option<PathBuf>),
    Simulated,
}

impl Target {
    fn resolve(args: &DeviceArgs, settings: &Settings) -> Self {
        if args.simulate {
            Target::Simulated
        } else {
            Target::Device(args.device.clone().or_else(|| settings.device.clone()))
        }
    }
}

/// Virtual amplifier running in the background
struct Simulator {
    tx: mpsc::Sender<VirtualAmpCommand>,
    task: JoinHandle<std::io::Result<VirtualAmp>>,
}

impl Simulator {
    fn spawn(read_timeout: Duration) -> (AmpConnection<DuplexStream>, Self) {
        let (host, device) = tokio::io::duplex(PACKET_LEN * 256);
        let (tx, rx) = mpsc::channel(16);
        let task = tokio::spawn(run_virtual_amp_task(device, VirtualAmp::new(), rx));
        info!("Virtual amplifier started");
        (
            AmpConnection::with_read_timeout(host, read_timeout),
            Self { tx, task },
        )
    }

    async fn shutdown(self) -> Result<VirtualAmp> {
        // The task may already have stopped if the host side closed
        let _ = self.tx.send(VirtualAmpCommand::Shutdown).await;
        let amp = self
            .task
            .await
            .context("Virtual amplifier task panicked")?
            .context("Virtual amplifier stream failed")?;
        Ok(amp)
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let settings = Settings::load();
    init_logging(&settings);

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(err) => {
            eprintln!("error: failed to start async runtime: {}", err);
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(cli.command, settings)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {:#}", err);
            ExitCode::from(2)
        }
    }
}

fn init_logging(settings: &Settings) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        settings
            .log_filter
            .as_deref()
            .unwrap_or(DEFAULT_LOG_FILTER)
            .into()
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

async fn run(command: Commands, settings: Settings) -> Result<()> {
    match command {
        Commands::Controls => {
            print!("{}", display::format_control_table());
            Ok(())
        }
        Commands::Encode { control, value } => cmd_encode(&control, value),
        Commands::Decode { bytes, pad } => cmd_decode(&bytes.join(" "), pad),
        Commands::Preset { file } => cmd_preset(file),
        Commands::Config {
            device,
            read_timeout_ms,
            log_filter,
        } => cmd_config(settings, device, read_timeout_ms, log_filter),
        Commands::Watch { target } => match Target::resolve(&target, &settings) {
            Target::Device(path) => {
                let connection = connect(path.as_deref(), &settings).await?;
                cmd_watch(connection, None).await
            }
            Target::Simulated => {
                let (connection, simulator) = Simulator::spawn(settings.read_timeout());
                cmd_watch(connection, Some(simulator)).await
            }
        },
        Commands::Set {
            control,
            value,
            target,
        } => match Target::resolve(&target, &settings) {
            Target::Device(path) => {
                let connection = connect(path.as_deref(), &settings).await?;
                cmd_set(&connection, &control, value).await
            }
            Target::Simulated => {
                let (connection, simulator) = Simulator::spawn(settings.read_timeout());
                cmd_set(&connection, &control, value).await?;
                // Let the virtual amp process the write before reading its state
                connection.drain().await?;
                let amp = simulator.shutdown().await?;
                let spec = outsider_protocol::ControlRegistry::global().lookup_by_name(&control)?;
                if let Some(value) = amp.value(spec.control) {
                    println!(
                        "Virtual amplifier now has {}",
                        display::format_value(spec.control, value)
                    );
                }
                Ok(())
            }
        },
        Commands::Presets { target } => match Target::resolve(&target, &settings) {
            Target::Device(path) => {
                let connection = connect(path.as_deref(), &settings).await?;
                cmd_presets(&connection).await
            }
            Target::Simulated => {
                let (connection, simulator) = Simulator::spawn(settings.read_timeout());
                cmd_presets(&connection).await?;
                simulator.shutdown().await?;
                Ok(())
            }
        },
    }
}

async fn connect(path: Option<&Path>, settings: &Settings) -> Result<AmpConnection<HidTransport>> {
    match path {
        Some(path) => open_device(path, settings.read_timeout())
            .await
            .with_context(|| format!("Failed to open {}", path.display())),
        None => open_first_amp(settings.read_timeout())
            .await
            .with_context(|| {
                format!(
                    "No amplifier found (looking for USB device {:04x}:{:04x})",
                    USB_VENDOR_ID, USB_PRODUCT_ID
                )
            }),
    }
}

fn cmd_encode(control: &str, value: i32) -> Result<()> {
    let packet = encode_control_by_name(control, value)?;
    println!("{}", packet.hex_dump());
    Ok(())
}

fn cmd_decode(text: &str, pad: bool) -> Result<()> {
    let mut bytes = parse_hex(text).map_err(anyhow::Error::msg)?;
    if pad {
        if bytes.len() > PACKET_LEN {
            bail!("{} bytes given, a packet holds {}", bytes.len(), PACKET_LEN);
        }
        bytes.resize(PACKET_LEN, 0);
    }

    let event = decode_packet(&bytes)?;
    println!("{:#?}", event);
    if let Some(settings) = event.settings() {
        println!("{}", display::format_settings(&settings));
    }
    Ok(())
}

fn cmd_preset(file: PathBuf) -> Result<()> {
    let xml = std::fs::read_to_string(&file)
        .with_context(|| format!("Failed to read preset file {}", file.display()))?;
    let preset = Preset::from_exported_file(&xml)
        .with_context(|| format!("Failed to parse preset file {}", file.display()))?;
    let json = serde_json::to_string_pretty(&preset).context("Failed to serialize preset")?;
    println!("{}", json);
    Ok(())
}

fn cmd_config(
    mut settings: Settings,
    device: Option<PathBuf>,
    read_timeout_ms: Option<u64>,
    log_filter: Option<String>,
) -> Result<()> {
    let changed = device.is_some() || read_timeout_ms.is_some() || log_filter.is_some();
    if let Some(device) = device {
        settings.device = Some(device);
    }
    if let Some(ms) = read_timeout_ms {
        settings.read_timeout_ms = ms;
    }
    if let Some(filter) = log_filter {
        settings.log_filter = Some(filter);
    }

    if changed {
        let path = settings.save()?;
        info!("Settings saved to {}", path.display());
    } else if let Some(path) = Settings::settings_path() {
        println!("# {}", path.display());
    }
    println!(
        "{}",
        serde_json::to_string_pretty(&settings).context("Failed to serialize settings")?
    );
    Ok(())
}

async fn cmd_set<T: Transport>(
    connection: &AmpConnection<T>,
    control: &str,
    value: i32,
) -> Result<()> {
    connection
        .set_control_by_name(control, value)
        .await
        .with_context(|| format!("Failed to set {} to {}", control, value))?;
    println!("{} set to {}", control, value);
    Ok(())
}

async fn cmd_presets<T: Transport>(connection: &AmpConnection<T>) -> Result<()> {
    let drained = connection.drain().await?;
    debug!("Drained {} packets before querying presets", drained);
    for (number, name) in connection.query_preset_names().await? {
        println!("{:>3}  {}", number, name);
    }
    Ok(())
}

async fn cmd_watch<T: Transport>(
    connection: AmpConnection<T>,
    simulator: Option<Simulator>,
) -> Result<()> {
    let (cmd_tx, cmd_rx) = mpsc::channel(1);
    let (update_tx, mut update_rx) = mpsc::channel(64);

    let drained = connection.drain().await?;
    debug!("Drained {} stale packets", drained);

    let watcher = tokio::spawn(run_watcher(connection.clone(), cmd_rx, update_tx));
    connection.startup().await.context("Failed to send startup request")?;

    if let Some(simulator) = &simulator {
        tokio::spawn(demo_front_panel(simulator.tx.clone()));
    }

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            update = update_rx.recv() => match update {
                Some(update) => println!("{}", display::format_update(&update)),
                None => break,
            },
            _ = &mut ctrl_c => {
                info!("Interrupted, stopping watcher");
                let _ = cmd_tx.send(WatcherCommand::Shutdown).await;
                break;
            }
        }
    }

    // The watcher may be waiting on a full channel
    drop(update_rx);
    let exit = watcher.await.context("Watcher task panicked")??;
    info!("Watcher stopped: {:?}", exit);

    if let Some(simulator) = simulator {
        simulator.shutdown().await?;
    }
    Ok(())
}

/// Play a few front panel actions on the virtual amplifier
async fn demo_front_panel(tx: mpsc::Sender<VirtualAmpCommand>) {
    let script = [
        VirtualAmpCommand::TurnKnob {
            control: Control::Gain,
            value: 90,
        },
        VirtualAmpCommand::TurnKnob {
            control: Control::Voice,
            value: 4,
        },
        VirtualAmpCommand::TurnKnob {
            control: Control::DelayType,
            value: 2,
        },
        VirtualAmpCommand::TurnDelayTimeSplit(1500),
        VirtualAmpCommand::SelectPreset(7),
        VirtualAmpCommand::SetTunerMode(true),
        VirtualAmpCommand::Tuner(TunerReading::new(Note::A, -3)),
        VirtualAmpCommand::Tuner(TunerReading::new(Note::A, 0)),
        VirtualAmpCommand::SetTunerMode(false),
    ];

    for cmd in script {
        tokio::time::sleep(Duration::from_millis(500)).await;
        if tx.send(cmd).await.is_err() {
            warn!("Virtual amplifier stopped during demo");
            return;
        }
    }
}
