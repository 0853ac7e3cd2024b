//! Command-line driver for the B524/B509 scanner.
//!
//! A thin consumer of [`xreg_scan`]'s public API: parses arguments, wires up
//! logging and SIGINT-to-cancellation, resolves a transport (live daemon or
//! `--dry-run` fixture), runs a scan, and writes the resulting artifact.

use std::fs::File;
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args as ClapArgs, Parser, Subcommand, ValueEnum};

use xreg_scan::config::ScanConfig;
use xreg_scan::ebusd_info::parse_ebusd_info_target_addresses;
use xreg_scan::observer::LoggingObserver;
use xreg_scan::plan::{CustomOverrides, Preset};
use xreg_scan::scan::{broadcast_identification_round, scan_b524, CancellationToken};
use xreg_scan::transport::fixture::FixtureTransport;
use xreg_scan::transport::tcp::EbusdTcpTransport;
use xreg_scan::transport::trace::TracingTransport;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum PresetArg {
    Conservative,
    Recommended,
    Aggressive,
}

impl From<PresetArg> for Preset {
    fn from(value: PresetArg) -> Self {
        match value {
            PresetArg::Conservative => Preset::Conservative,
            PresetArg::Recommended => Preset::Recommended,
            PresetArg::Aggressive => Preset::Aggressive,
        }
    }
}

/// Scan a heating-regulator bus device's extended registers.
#[derive(Debug, Parser)]
#[command(name = "xreg-scan", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Daemon host.
    #[arg(long, default_value = "127.0.0.1", global = true)]
    ebusd_host: String,

    /// Daemon port.
    #[arg(long, default_value_t = 8888, global = true)]
    ebusd_port: u16,

    /// Increase log verbosity (repeatable).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Scan a device's extended registers and write an artifact (§4.G).
    Scan(ScanArgs),
    /// Issue a broadcast identification round and print discovered addresses (§4.J/§6).
    Discover,
}

#[derive(Debug, Clone, ClapArgs)]
struct ScanArgs {
    /// Destination address: `auto` (resolve via the daemon's `info`
    /// command) or a hex literal like `0x15`.
    #[arg(long, default_value = "auto")]
    dst: String,

    /// Planner preset.
    #[arg(long, value_enum, default_value = "recommended")]
    preset: PresetArg,

    /// Scan every known instance slot regardless of the presence heuristic.
    #[arg(long)]
    scan_absent: bool,

    /// Directory to write the artifact into.
    #[arg(long, default_value = ".")]
    output_dir: PathBuf,

    /// Append request/response trace lines to this file.
    #[arg(long)]
    trace_file: Option<PathBuf>,

    /// Replay a fixture file instead of connecting to a live daemon.
    #[arg(long)]
    dry_run: Option<PathBuf>,
}

/// Resolve `auto` via the daemon's `info` command, taking the first
/// reported device target address.
fn resolve_auto_destination(transport: &EbusdTcpTransport) -> anyhow::Result<u8> {
    let lines = transport.send_info_command()?;
    let addresses = parse_ebusd_info_target_addresses(&lines);
    addresses
        .first()
        .copied()
        .ok_or_else(|| anyhow::anyhow!("no device target addresses found in daemon `info` output"))
}

fn run_scan(cli: &Cli, args: ScanArgs) -> anyhow::Result<PathBuf> {
    let mut config = ScanConfig {
        preset: args.preset.into(),
        scan_absent: args.scan_absent,
        custom_overrides: CustomOverrides::default(),
        trace_file: args.trace_file.clone(),
        ..ScanConfig::default()
    };
    config.ebusd.host = cli.ebusd_host.clone();
    config.ebusd.port = cli.ebusd_port;

    let mut observer = LoggingObserver;
    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        ctrlc::set_handler(move || cancel.cancel())?;
    }

    let dst_override = args.dst.strip_prefix("0x").or_else(|| args.dst.strip_prefix("0X"));

    let artifact = if let Some(fixture_path) = &args.dry_run {
        let json = std::fs::read_to_string(fixture_path)?;
        let mut transport = FixtureTransport::from_json(&json)?;
        let dst = match dst_override {
            Some(hex) => u8::from_str_radix(hex, 16)?,
            None => anyhow::bail!("--dry-run requires an explicit --dst (hex literal)"),
        };
        scan_b524(&mut transport, dst, config.preset, &config.custom_overrides, config.scan_absent, &mut observer, &cancel)
    } else {
        let inner = EbusdTcpTransport::new(config.ebusd.clone());
        let dst = match dst_override {
            Some(hex) => u8::from_str_radix(hex, 16)?,
            None => resolve_auto_destination(&inner)?,
        };

        if let Some(trace_path) = &config.trace_file {
            let sink = File::create(trace_path)?;
            let mut transport = TracingTransport::new(inner, sink);
            scan_b524(&mut transport, dst, config.preset, &config.custom_overrides, config.scan_absent, &mut observer, &cancel)
        } else {
            let mut transport = inner;
            scan_b524(&mut transport, dst, config.preset, &config.custom_overrides, config.scan_absent, &mut observer, &cancel)
        }
    };

    let errors = xreg_scan::artifact::validate(&artifact);
    for error in &errors {
        log::warn!("artifact validation: {error}");
    }

    let elapsed = std::time::Duration::from_secs_f64(artifact.meta.scan_duration_seconds.max(0.0));
    log::info!("scan of {} took {}", artifact.meta.destination_address, humantime::format_duration(elapsed));

    std::fs::create_dir_all(&args.output_dir)?;
    let filename = xreg_scan::scan::default_output_filename(
        u8::from_str_radix(artifact.meta.destination_address.trim_start_matches("0x"), 16)?,
        &artifact.meta.scan_timestamp,
    );
    let path = args.output_dir.join(filename);
    let mut file = File::create(&path)?;
    file.write_all(serde_json::to_string_pretty(&artifact)?.as_bytes())?;

    if artifact.meta.incomplete {
        log::warn!("scan incomplete: {:?}", artifact.meta.incomplete_reason);
    }

    Ok(path)
}

/// Issue a broadcast identification round, then read the daemon's own
/// address table and print what it now sees (§4.J/§6).
fn run_discover(cli: &Cli) -> anyhow::Result<Vec<u8>> {
    let mut config = ScanConfig::default();
    config.ebusd.host = cli.ebusd_host.clone();
    config.ebusd.port = cli.ebusd_port;

    let mut transport = EbusdTcpTransport::new(config.ebusd);
    broadcast_identification_round(&mut transport)?;

    let lines = transport.send_info_command()?;
    Ok(parse_ebusd_info_target_addresses(&lines))
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = stderrlog::new()
        .module(module_path!())
        .module("xreg_scan")
        .timestamp(stderrlog::Timestamp::Second)
        .verbosity(usize::from(cli.verbose) + 2)
        .init()
    {
        eprintln!("failed to initialize logging: {e}");
        return ExitCode::from(2);
    }

    match cli.command {
        Command::Scan(ref args) => match run_scan(&cli, args.clone()) {
            Ok(path) => {
                println!("wrote artifact to {}", path.display());
                ExitCode::SUCCESS
            }
            Err(e) => {
                log::error!("scan failed: {e:#}");
                ExitCode::from(1)
            }
        },
        Command::Discover => match run_discover(&cli) {
            Ok(addresses) => {
                if addresses.is_empty() {
                    println!("no devices discovered");
                } else {
                    for addr in addresses {
                        println!("0x{addr:02x}");
                    }
                }
                ExitCode::SUCCESS
            }
            Err(e) => {
                log::error!("discover failed: {e:#}");
                ExitCode::from(1)
            }
        },
    }
}
