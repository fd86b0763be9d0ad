//! Govee op-code tool.
//!
//! Validates catalogue files, decodes captured frames against a device
//! type, and builds command frames from JSON values.

use clap::{Parser, Subcommand};
use govee_catalogue::{Catalogue, CatalogueError};
use govee_protocol::{to_base64, Frame, FrameError, OpCode, OpCodeError};
use govee_state::{CommandError, Engine, EngineConfig, Report, StateError};
use std::path::PathBuf;
use thiserror::Error;
use tracing::debug;
use tracing_subscriber::EnvFilter;

/// Inspect Govee catalogues, frames and commands
#[derive(Parser)]
#[command(name = "govee-tool")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Govee op-code catalogue tool", long_about = None)]
struct Cli {
    /// Catalogue file (JSON or YAML); the built-in catalogue when omitted
    #[arg(short, long, global = true)]
    catalogue: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Load a catalogue and list its device types
    Validate {
        /// Catalogue file to check; overrides --catalogue
        path: Option<PathBuf>,
    },

    /// Decode a report into state values
    Decode {
        /// Device type, e.g. H6072
        #[arg(short, long)]
        device_type: String,

        /// 20-byte report frame, hex or base64
        #[arg(long, conflicts_with_all = ["op_code", "payload"])]
        frame: Option<String>,

        /// Op code, when decoding a bare payload
        #[arg(long, requires = "payload")]
        op_code: Option<String>,

        /// Payload bytes in hex
        #[arg(long, requires = "op_code")]
        payload: Option<String>,
    },

    /// Build a command frame for a state value
    Encode {
        /// Device type, e.g. H6072
        #[arg(short, long)]
        device_type: String,

        /// State key to set
        #[arg(short, long)]
        state_key: String,

        /// Desired value as JSON, e.g. '{"r":255,"g":0,"b":128}'
        value: String,
    },

    /// Parse and verify a raw frame
    Frame {
        /// 20-byte frame, hex or base64
        frame: String,
    },
}

#[derive(Debug, Error)]
enum ToolError {
    #[error(transparent)]
    Catalogue(#[from] CatalogueError),

    #[error(transparent)]
    State(#[from] StateError),

    #[error(transparent)]
    Command(#[from] CommandError),

    #[error(transparent)]
    Frame(#[from] FrameError),

    #[error(transparent)]
    OpCode(#[from] OpCodeError),

    #[error("invalid hex: {0}")]
    Hex(#[from] hex::FromHexError),

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("provide --frame or --op-code with --payload")]
    NoInput,
}

const CLI_DEVICE: &str = "cli";

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    govee_metrics::describe_metrics();

    if let Err(err) = run(cli) {
        eprintln!("error: {}", err);
        std::process::exit(1);
    }
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: Cli) -> Result<(), ToolError> {
    let path = match &cli.command {
        Command::Validate { path: Some(path) } => Some(path),
        _ => cli.catalogue.as_ref(),
    };
    let catalogue = match path {
        Some(path) => Catalogue::from_path(path)?,
        None => Catalogue::builtin()?,
    };
    debug!("Loaded catalogue with {} device types", catalogue.len());

    match cli.command {
        Command::Validate { .. } => validate(&catalogue),
        Command::Decode {
            device_type,
            frame,
            op_code,
            payload,
        } => decode(catalogue, &device_type, frame, op_code, payload),
        Command::Encode {
            device_type,
            state_key,
            value,
        } => encode(catalogue, &device_type, &state_key, &value),
        Command::Frame { frame } => show_frame(&frame),
    }
}

fn validate(catalogue: &Catalogue) -> Result<(), ToolError> {
    println!("catalogue ok: {} device types", catalogue.len());
    for schema in catalogue.schemas() {
        let keys: Vec<&str> = schema.state_keys().iter().map(String::as_str).collect();
        println!(
            "  {}: {} op codes [{}]",
            schema.device_type(),
            schema.supported_op_codes().len(),
            keys.join(", ")
        );
        for def in schema.supported_op_codes() {
            println!(
                "    {} {:<7} {} ({} bytes)",
                def.code(),
                def.direction().to_string(),
                def.state_key(),
                def.required_len()
            );
        }
    }
    Ok(())
}

fn decode(
    catalogue: Catalogue,
    device_type: &str,
    frame: Option<String>,
    op_code: Option<String>,
    payload: Option<String>,
) -> Result<(), ToolError> {
    let report = match (frame, op_code, payload) {
        (Some(frame), _, _) => {
            Report::from_ble_frame(CLI_DEVICE, device_type, &frame_bytes(&frame)?, 1)?
        }
        (None, Some(op_code), Some(payload)) => Report::new(
            CLI_DEVICE,
            device_type,
            OpCode::parse(&op_code)?,
            hex::decode(payload.trim())?,
            1,
        ),
        _ => return Err(ToolError::NoInput),
    };

    let engine = Engine::new(catalogue, EngineConfig::default());
    let outcome = engine.apply_report(&report)?;
    for update in &outcome.updates {
        println!(
            "{} = {}",
            update.state_key,
            serde_json::to_string(&update.value)?
        );
    }
    Ok(())
}

fn encode(
    catalogue: Catalogue,
    device_type: &str,
    state_key: &str,
    value: &str,
) -> Result<(), ToolError> {
    let desired: serde_json::Value = serde_json::from_str(value)?;
    let engine = Engine::new(catalogue, EngineConfig::default());
    engine.register(CLI_DEVICE, device_type)?;

    let command = engine.build(CLI_DEVICE, state_key, &desired)?;
    let frame = command.ble_frame()?;
    println!("op code: {}", command.op_code);
    println!("payload: {}", hex::encode(&command.payload));
    println!("frame:   {}", hex::encode(&frame));
    println!("base64:  {}", to_base64(&frame));
    Ok(())
}

fn show_frame(text: &str) -> Result<(), ToolError> {
    let frame = Frame::parse(&frame_bytes(text)?)?;
    let kind = if frame.is_report() {
        "report"
    } else if frame.is_command() {
        "command"
    } else {
        "other"
    };
    println!("prefix:   0x{:02X} ({})", frame.prefix, kind);
    println!("op code:  {}", frame.op_code);
    println!("payload:  {}", hex::encode(&frame.payload));
    println!("checksum: ok");
    Ok(())
}

/// Frames are accepted as 40 hex digits or base64.
fn frame_bytes(text: &str) -> Result<Vec<u8>, ToolError> {
    let text = text.trim();
    if text.len() == 40 && text.chars().all(|c| c.is_ascii_hexdigit()) {
        return Ok(hex::decode(text)?);
    }
    Ok(govee_protocol::from_base64(text)?)
}
