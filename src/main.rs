use clap::{Parser, Subcommand, ValueEnum};
use laser_remote::config::{Config, ConfigLoader, LogFormat, LoggingConfig};
use laser_remote::models::SHUTTER;
use laser_remote::{
    AllowedValuesRegistry, CommandDispatcher, Laser, LaserModel, ShutterPersistence,
    SimulatedLaser, SyncSerialPort,
};
use serde_json::json;
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "laser-ctl",
    version,
    about = "Read and set properties of a serial-controlled laser, including its emulated shutter."
)]
struct Args {
    /// Configuration file (defaults to the standard search path)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Serial port or alias, overriding the configuration
    #[arg(short, long)]
    port: Option<String>,

    /// Laser model, overriding the configuration
    #[arg(short, long)]
    model: Option<LaserModel>,

    /// Where the shutter keeps its restore point, overriding the configuration
    #[arg(long)]
    persistence: Option<ShutterPersistence>,

    /// Talk to an in-process simulated laser instead of a serial port
    #[arg(long)]
    simulate: bool,

    /// Print results as JSON
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print every property with its current value
    List,
    /// Print one property
    Get { name: String },
    /// Set one property
    Set { name: String, value: String },
    /// Open, close or query the shutter
    Shutter {
        #[arg(value_enum)]
        action: ShutterAction,
    },
    /// Print the legal values and ranges of every property
    Describe,
    /// Write the effective configuration to a file and exit
    WriteDefaultConfig { path: Option<PathBuf> },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum ShutterAction {
    Open,
    Close,
    Status,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let loader = match &args.config {
        Some(path) => ConfigLoader::load_from(path)?,
        None => ConfigLoader::load()?,
    };
    init_tracing(&loader.config().logging);

    if let Command::WriteDefaultConfig { path } = &args.command {
        let path = path
            .clone()
            .or_else(laser_remote::config::get_default_config_path)
            .ok_or("no config directory on this platform; pass a path")?;
        loader.save_to(&path)?;
        println!("wrote {}", path.display());
        return Ok(());
    }

    let config = loader.into_config();
    let mut laser = connect(&args, &config)?;

    match &args.command {
        Command::List => {
            let names: Vec<String> = laser.property_names().map(str::to_string).collect();
            let mut rows = Vec::with_capacity(names.len());
            for name in names {
                let value = laser.get(&name).map_err(|e| e.to_string());
                rows.push((name, value));
            }
            if args.json {
                let map: serde_json::Map<String, serde_json::Value> = rows
                    .into_iter()
                    .map(|(name, value)| {
                        let value = match value {
                            Ok(v) => json!(v),
                            Err(e) => json!({ "error": e }),
                        };
                        (name, value)
                    })
                    .collect();
                println!("{}", serde_json::to_string_pretty(&map)?);
            } else {
                for (name, value) in rows {
                    match value {
                        Ok(v) => println!("{name:<24} {v}"),
                        Err(e) => println!("{name:<24} <{e}>"),
                    }
                }
            }
        }
        Command::Get { name } => {
            let value = laser.get(name)?;
            print_value(args.json, name, &value);
        }
        Command::Set { name, value } => {
            laser.set(name, value)?;
            let current = laser.get(name)?;
            print_value(args.json, name, &current);
        }
        Command::Shutter { action } => {
            match action {
                ShutterAction::Open => laser.set(SHUTTER, "open")?,
                ShutterAction::Close => laser.set(SHUTTER, "closed")?,
                ShutterAction::Status => {}
            }
            let state = laser.get(SHUTTER)?;
            print_value(args.json, SHUTTER, &state);
        }
        Command::Describe => {
            let mut gui = AllowedValuesRegistry::new();
            laser.describe_to(&mut gui);
            let mut described = serde_json::Map::new();
            for name in laser.property_names() {
                let entry = if let Some(values) = gui.allowed_values(name) {
                    json!({ "values": values })
                } else if let Some((min, max)) = gui.allowed_range(name) {
                    json!({ "min": min, "max": max })
                } else {
                    continue;
                };
                described.insert(name.to_string(), entry);
            }
            if args.json {
                println!("{}", serde_json::to_string_pretty(&described)?);
            } else {
                for (name, entry) in &described {
                    println!("{name:<24} {entry}");
                }
            }
        }
        // Handled before connecting.
        Command::WriteDefaultConfig { .. } => {}
    }

    info!(commands = laser.dispatcher().commands_sent(), "done");
    Ok(())
}

fn connect(args: &Args, config: &Config) -> Result<Laser, Box<dyn std::error::Error>> {
    let model = args.model.unwrap_or(config.laser.model);
    let persistence = args.persistence.unwrap_or(config.laser.shutter_persistence);

    let port: Box<dyn laser_remote::SerialPortAdapter> = if args.simulate {
        Box::new(SimulatedLaser::new().port("SIMULATED"))
    } else {
        let name = args
            .port
            .as_deref()
            .or(config.serial.port.as_deref())
            .ok_or("no serial port given; use --port, the config file or --simulate")?;
        let name = config.serial.resolve_port(name);
        Box::new(SyncSerialPort::open(name, config.serial.port_configuration())?)
    };

    let dispatcher = CommandDispatcher::new(port)
        .with_terminators(
            config.serial.send_terminator.as_str(),
            config.serial.receive_terminator.as_str(),
        )
        .with_reply_timeout(config.serial.timeout());

    Laser::incarnate(model, dispatcher, persistence).map_err(|e| {
        error!(error = %e, "laser incarnation failed");
        e.into()
    })
}

fn print_value(json: bool, name: &str, value: &str) {
    if json {
        let mut object = serde_json::Map::new();
        object.insert(name.to_string(), json!(value));
        println!("{}", serde_json::Value::Object(object));
    } else {
        println!("{value}");
    }
}

fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&logging.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    match logging.format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Pretty => builder.pretty().init(),
        LogFormat::Compact => builder.compact().init(),
    }
}
