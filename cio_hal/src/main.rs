//! # CIO HAL Binary
//!
//! Command-line access to the robot core I/O controller registers.
//!
//! # Usage
//!
//! ```bash
//! # Firmware identity against the simulated register file
//! cio_hal -s info
//!
//! # Raw register access
//! cio_hal read di_monitor_1
//! cio_hal write light_pole 0x05
//!
//! # Bank view and bit helpers
//! cio_hal bank
//! cio_hal bank set-bit 2 3
//! cio_hal bank power 1 0 --off
//!
//! # Analog sample under the block semaphore
//! cio_hal analog --block 2 --channel 4
//!
//! # Poll inputs until Ctrl-C, verbose JSON logs
//! cio_hal -v --json watch --interval-ms 100
//! ```

#![deny(warnings)]

use cio_common::config::{ConfigError, ConfigLoader, LogLevel};
use cio_common::consts::{DEFAULT_CONFIG_PATH, ESTOP_CHANNELS, POWER_BANK_COUNT};
use cio_common::hal::config::ControllerConfig;
use cio_common::hal::error::{HalError, IndexKind};
use cio_common::hal::regs::{Register, RegisterWidth};
use cio_common::hal::types::AnalogBlock;
use cio_hal::drivers::create_transport;
use cio_hal::modules::register_builtin_modules;
use cio_hal::{DeviceController, ModuleContext, ModuleRegistry, TeardownRegistry};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{error, info, warn, Level};
use tracing_subscriber::EnvFilter;

/// CIO HAL - register access for the robot core I/O controller
#[derive(Parser, Debug)]
#[command(name = "cio_hal")]
#[command(version)]
#[command(about = "Register access and arbitration layer for the robot core I/O controller")]
#[command(long_about = None)]
struct Args {
    /// Path to the controller configuration file (controller.toml).
    /// Defaults apply when the default path does not exist.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the controller device path
    #[arg(short, long)]
    device: Option<PathBuf>,

    /// Use the simulated register file
    #[arg(short = 's', long)]
    simulate: bool,

    /// Load a built-in module (can be specified multiple times)
    #[arg(short, long = "module", action = clap::ArgAction::Append)]
    modules: Vec<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Output logs in JSON format
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Firmware identity and device state
    Info,
    /// Print the effective configuration as TOML
    Config,
    /// Read one register
    Read {
        /// Register name, e.g. `di_monitor_1`
        register: Register,
    },
    /// Write one register (1, 2 or 4 bytes, little-endian)
    Write {
        /// Register name, e.g. `light_pole`
        register: Register,
        /// Value, decimal or 0x-prefixed hex
        #[arg(value_parser = parse_value)]
        value: u32,
    },
    /// Digital and power banks
    Bank {
        #[command(subcommand)]
        action: Option<BankAction>,
    },
    /// E-stop status channels
    Estop {
        /// Expected high nibble to compare against
        #[arg(long, value_parser = parse_nibble)]
        expect: Option<u8>,
    },
    /// Latch and read the LPC timer
    Timer,
    /// Read one analog sample under the block semaphore
    Analog {
        /// Analog block (1 or 2)
        #[arg(short, long, default_value_t = 1)]
        block: usize,
        /// Channel within the block
        #[arg(short, long, default_value_t = 0)]
        channel: usize,
    },
    /// Poll input banks until Ctrl-C
    Watch {
        /// Poll interval in milliseconds
        #[arg(long, default_value_t = 500)]
        interval_ms: u64,
    },
}

#[derive(Subcommand, Debug)]
enum BankAction {
    /// Write a whole output bank (2 or 3)
    Set {
        /// Output bank
        bank: usize,
        /// Value, decimal or 0x-prefixed hex
        #[arg(value_parser = parse_value)]
        value: u32,
    },
    /// Set one bit of an output bank
    SetBit {
        /// Output bank
        bank: usize,
        /// Bit (0..8)
        bit: u8,
    },
    /// Clear one bit of an output bank
    ClearBit {
        /// Output bank
        bank: usize,
        /// Bit (0..8)
        bit: u8,
    },
    /// Switch one peripheral power output
    Power {
        /// Power bank (0..3)
        bank: usize,
        /// Bit (0..8)
        bit: u8,
        /// Switch off instead of on
        #[arg(long)]
        off: bool,
    },
    /// Invert one peripheral power output
    TogglePower {
        /// Power bank (0..3)
        bank: usize,
        /// Bit (0..8)
        bit: u8,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    if let Err(e) = run() {
        error!("cio_hal failed: {}", e);
        std::process::exit(1);
    }
    Ok(())
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = load_config(&args);
    let log_level = config
        .as_ref()
        .map(|c| c.shared.log_level)
        .unwrap_or_default();
    setup_tracing(&args, log_level);

    let mut config = config?;
    apply_overrides(&mut config, &args);
    config.validate()?;

    info!("CIO HAL v{} starting...", env!("CARGO_PKG_VERSION"));

    if let Command::Config = args.command {
        print!("{}", toml::to_string_pretty(&config)?);
        return Ok(());
    }

    let running = Arc::new(AtomicBool::new(true));
    let flag = Arc::clone(&running);
    ctrlc::set_handler(move || {
        info!("Received shutdown signal");
        flag.store(false, Ordering::SeqCst);
    })?;

    let controller = DeviceController::new(&config, create_transport(&config));
    if !controller.is_enabled() {
        return Err(format!("Controller {:?} not enabled", config.device_path).into());
    }

    let ctx = ModuleContext {
        controller: &controller,
    };
    let mut modules = ModuleRegistry::new();
    register_builtin_modules(&mut modules);

    let mut result: Result<(), Box<dyn std::error::Error>> = Ok(());
    for name in &config.modules {
        if let Err(e) = modules.load(name, &ctx) {
            result = Err(e.into());
            break;
        }
    }
    if result.is_ok() {
        result = execute(&args.command, &controller, &running);
    }

    for e in modules.unload_all(&ctx) {
        warn!("{}", e);
    }
    let hooks = TeardownRegistry::global().run_all();
    info!("CIO HAL shutdown complete ({} teardown hooks)", hooks);
    result
}

/// Load the configuration file. A missing file at the default path yields
/// the default configuration.
fn load_config(args: &Args) -> Result<ControllerConfig, ConfigError> {
    match &args.config {
        Some(path) => ControllerConfig::load(path),
        None => match ControllerConfig::load(Path::new(DEFAULT_CONFIG_PATH)) {
            Err(ConfigError::FileNotFound) => Ok(ControllerConfig::default()),
            other => other,
        },
    }
}

fn apply_overrides(config: &mut ControllerConfig, args: &Args) {
    if let Some(device) = &args.device {
        config.device_path = device.clone();
    }
    if args.simulate {
        config.simulate = true;
    }
    for module in &args.modules {
        if !config.modules.contains(module) {
            config.modules.push(module.clone());
        }
    }
}

fn execute(
    command: &Command,
    controller: &DeviceController,
    running: &AtomicBool,
) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        Command::Info => {
            let identity = controller.identity().ok_or("identity unavailable")?;
            println!("device:        {}", controller.device_path().display());
            println!("transport:     {}", controller.transport_name());
            println!("identity:      {}", identity);
            println!("version reg:   {:#010x}", controller.version_register()?);
            println!("digital banks: {}", controller.bank_count());
        }
        Command::Config => {}
        Command::Read { register } => {
            let payload = controller.read_register(*register)?;
            println!("{} = {:02x?}", register, payload.as_slice());
        }
        Command::Write { register, value } => {
            if !register.is_writable() {
                return Err(format!("{} is read-only", register).into());
            }
            let bytes = encode_value(register.width(), *value)?;
            controller.write_register(*register, &bytes)?;
            println!("{} <- {:02x?}", register, bytes);
        }
        Command::Bank { action } => bank(controller, action.as_ref())?,
        Command::Estop { expect } => {
            for channel in 0..ESTOP_CHANNELS {
                let status = controller.estop_status(channel)?;
                match expect {
                    Some(nibble) => println!(
                        "estop_status_{}: {:#04x} matches {:#x}: {}",
                        channel + 1,
                        status,
                        nibble,
                        controller.estop_matches(channel, *nibble)?
                    ),
                    None => println!("estop_status_{}: {:#04x}", channel + 1, status),
                }
            }
        }
        Command::Timer => {
            println!("elapsed: {} us", controller.elapsed_microseconds()?);
        }
        Command::Analog { block, channel } => {
            let block = AnalogBlock::from_number(*block)
                .ok_or(HalError::invalid_index(IndexKind::AnalogBlock, *block))?;
            let guard = controller.process_lock().lock();
            let transfer = controller.analog_sample(&guard, block, *channel)?;
            if let Err(e) = &transfer.release {
                warn!("{}", e);
            }
            println!(
                "{} channel {}: raw {:#05x} = {:.3} V",
                block, channel, transfer.value.raw, transfer.value.volts
            );
        }
        Command::Watch { interval_ms } => {
            let interval = Duration::from_millis(*interval_ms);
            while running.load(Ordering::SeqCst) {
                println!(
                    "in0 {:08b} in1 {:08b} bumper {:08b} lidar {:#04x}",
                    controller.bank_inputs(0)?,
                    controller.bank_inputs(1)?,
                    controller.bumper_input()?,
                    controller.lidar_safety_status()?,
                );
                std::thread::sleep(interval);
            }
        }
    }
    Ok(())
}

fn bank(
    controller: &DeviceController,
    action: Option<&BankAction>,
) -> Result<(), Box<dyn std::error::Error>> {
    let Some(action) = action else {
        for bank in 0..2 {
            println!("bank {} (in):  {:08b}", bank, controller.bank_inputs(bank)?);
        }
        for bank in 2..4 {
            println!(
                "bank {} (out): {:08b} (shadow {:08b})",
                bank,
                controller.bank_outputs(bank)?,
                controller.shadow_outputs(bank)?
            );
        }
        for bank in 0..POWER_BANK_COUNT {
            println!("power {}:      {:08b}", bank, controller.power_outputs(bank)?);
        }
        return Ok(());
    };

    let guard = controller.process_lock().lock();
    match *action {
        BankAction::Set { bank, value } => {
            let value = u8::try_from(value).map_err(|_| format!("{value} exceeds one byte"))?;
            controller.set_bank_outputs(bank, value)?;
        }
        BankAction::SetBit { bank, bit } => controller.set_output_bit(&guard, bank, bit)?,
        BankAction::ClearBit { bank, bit } => controller.clear_output_bit(&guard, bank, bit)?,
        BankAction::Power { bank, bit, off } => {
            controller.set_power_output(&guard, bank, bit, !off)?
        }
        BankAction::TogglePower { bank, bit } => {
            controller.toggle_power_output(&guard, bank, bit)?
        }
    }
    Ok(())
}

/// Little-endian bytes of `value` at `width`. Block registers are only
/// written through the semaphore-guarded transfers.
fn encode_value(width: RegisterWidth, value: u32) -> Result<Vec<u8>, String> {
    let len = match width {
        RegisterWidth::Block => return Err("block registers need a guarded transfer".into()),
        w => w.bytes(),
    };
    if len < 4 && value >> (len * 8) != 0 {
        return Err(format!("{value:#x} does not fit in {len} byte(s)"));
    }
    Ok(value.to_le_bytes()[..len].to_vec())
}

fn parse_value(s: &str) -> Result<u32, String> {
    let s = s.trim();
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => s.parse(),
    };
    parsed.map_err(|e| format!("invalid value '{s}': {e}"))
}

fn parse_nibble(s: &str) -> Result<u8, String> {
    let value = parse_value(s)?;
    u8::try_from(value)
        .ok()
        .filter(|v| *v <= 0x0F)
        .ok_or_else(|| format!("{s} is not a nibble"))
}

/// Setup tracing subscriber based on CLI arguments and configured level.
fn setup_tracing(args: &Args, configured: LogLevel) {
    let level = if args.verbose {
        Level::DEBUG
    } else {
        Level::from(configured)
    };

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    if args.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn values_parse_as_hex_or_decimal() {
        assert_eq!(parse_value("0x1F"), Ok(0x1F));
        assert_eq!(parse_value("31"), Ok(31));
        assert!(parse_value("0xZZ").is_err());
        assert_eq!(parse_nibble("0xA"), Ok(0xA));
        assert!(parse_nibble("0x10").is_err());
    }

    #[test]
    fn values_encode_at_register_width() {
        assert_eq!(encode_value(RegisterWidth::Byte, 0x05), Ok(vec![0x05]));
        assert_eq!(
            encode_value(RegisterWidth::Word, 0x1234),
            Ok(vec![0x34, 0x12])
        );
        assert!(encode_value(RegisterWidth::Byte, 0x100).is_err());
        assert!(encode_value(RegisterWidth::Block, 0).is_err());
    }

    #[test]
    fn cli_parses_nested_bank_commands() {
        let args = Args::try_parse_from(["cio_hal", "-s", "bank", "power", "1", "0", "--off"])
            .unwrap();
        assert!(args.simulate);
        assert!(matches!(
            args.command,
            Command::Bank {
                action: Some(BankAction::Power { bank: 1, bit: 0, off: true })
            }
        ));
    }
}
