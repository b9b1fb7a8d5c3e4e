use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use ezo_core::{
    Address, CancelToken, EzoSession, LinkConfig, Outcome, PollConfig, SessionConfig, list_ports,
    poll,
};
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(author, version, about = "Atlas Scientific EZO sensor tool", long_about = None)]
struct Args {
    /// Load session settings from a TOML file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// I2C bus number (/dev/i2c-N)
    #[arg(long, global = true)]
    bus: Option<u8>,

    /// I2C device address
    #[arg(long, global = true)]
    address: Option<u8>,

    /// Use a serial port (e.g. /dev/ttyAMA0) instead of I2C
    #[arg(long, global = true, conflicts_with = "ftdi")]
    serial: Option<String>,

    /// Use the FTDI bridge with this USB serial number
    #[arg(long, global = true)]
    ftdi: Option<String>,

    /// Serial baud rate
    #[arg(long, global = true)]
    baud: Option<u32>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Send one command and print the response
    Query {
        /// Command text, e.g. R, I, Cal,mid,7.00
        text: String,
    },
    /// List the addresses answering on the I2C bus
    Scan,
    /// Print the device type and firmware version
    Info,
    /// Take readings repeatedly
    Poll {
        /// Seconds between readings
        #[arg(long, default_value_t = 1.5)]
        interval: f64,
        /// Stop after this many readings
        #[arg(long)]
        count: Option<usize>,
        /// Command to send each round
        #[arg(long, default_value = "R")]
        command: String,
    },
    /// List serial ports
    Ports,
    /// Write the effective configuration to a TOML file
    InitConfig { path: PathBuf },
}

fn main() {
    let args = Args::parse();

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::builder()
                .with_default_directive(if args.verbose {
                    tracing::Level::DEBUG.into()
                } else {
                    tracing::Level::INFO.into()
                })
                .from_env_lossy(),
        )
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    if let Err(e) = run(args) {
        error!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run(args: Args) -> Result<()> {
    let config = build_config(&args)?;

    match args.command {
        Commands::Ports => {
            for port in list_ports()? {
                let usb = match (port.vendor_id, port.product_id) {
                    (Some(vid), Some(pid)) => format!(" [{vid:04X}:{pid:04X}]"),
                    _ => String::new(),
                };
                let sn = port
                    .serial_number
                    .map(|s| format!(" serial={s}"))
                    .unwrap_or_default();
                println!("{}{}{}", port.name, usb, sn);
            }
            Ok(())
        }
        Commands::InitConfig { path } => {
            config.save_to_file(&path)?;
            println!("Wrote {}", path.display());
            Ok(())
        }
        command => run_session(&config, command),
    }
}

fn run_session(config: &SessionConfig, command: Commands) -> Result<()> {
    let mut session = EzoSession::open(config).context("failed to open sensor link")?;
    let label = session.device_label();
    info!(device = %label, "Session open");

    let cancel = CancelToken::new();
    let c = cancel.clone();
    ctrlc::set_handler(move || {
        info!("Interrupt received, stopping...");
        c.cancel();
    })
    .context("failed to install Ctrl-C handler")?;

    match command {
        Commands::Query { text } => print_outcome(&label, &session.query(&text)?),
        Commands::Scan => {
            for address in session.scan_with_cancel(&cancel)? {
                println!("{address}");
            }
        }
        Commands::Info => println!("{}", session.device_info()?),
        Commands::Poll {
            interval,
            count,
            command,
        } => {
            let poll_config = PollConfig {
                command,
                interval: Duration::try_from_secs_f64(interval)
                    .context("interval must be a non-negative number of seconds")?,
                max_readings: count,
            };
            match session.device_info() {
                Ok(device) => info!(
                    "Polling {} sensor every {:.2} seconds, press ctrl-c to stop",
                    device.device_type, interval
                ),
                Err(e) => warn!(error = %e, "Could not read device info"),
            }
            poll(&mut session, &poll_config, &cancel, |outcome| {
                print_outcome(&label, outcome)
            })?;
        }
        Commands::Ports | Commands::InitConfig { .. } => {}
    }

    session.close()?;
    Ok(())
}

/// Config file (or defaults), then command-line overrides.
fn build_config(args: &Args) -> Result<SessionConfig> {
    let mut config = match &args.config {
        Some(path) => SessionConfig::load_from_file(path)
            .with_context(|| format!("failed to load {}", path.display()))?,
        None => SessionConfig::default(),
    };

    if let Some(port) = &args.serial {
        config.link = LinkConfig::Serial {
            port: port.clone(),
            baud_rate: ezo_core::protocol::DEFAULT_BAUD_RATE,
        };
    } else if let Some(serial_number) = &args.ftdi {
        config.link = LinkConfig::Ftdi {
            serial_number: serial_number.clone(),
            baud_rate: ezo_core::protocol::DEFAULT_BAUD_RATE,
        };
    }

    match &mut config.link {
        LinkConfig::I2c { bus, address } => {
            if let Some(b) = args.bus {
                *bus = b;
            }
            if let Some(a) = args.address {
                *address = Address::new(a)?.get();
            }
        }
        LinkConfig::Serial { baud_rate, .. } | LinkConfig::Ftdi { baud_rate, .. } => {
            if let Some(b) = args.baud {
                *baud_rate = b;
            }
        }
    }

    Ok(config)
}

fn print_outcome(label: &str, outcome: &Outcome) {
    match outcome {
        Outcome::Success(payload) => println!("Success {label}: {payload}"),
        Outcome::Sleeping => println!("Sleep mode {label}"),
        Outcome::Error(Some(code)) => println!("Error {label}: {code}"),
        Outcome::Error(None) => println!("Error {label}: empty response"),
    }
}
