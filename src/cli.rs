//! Command-line control surface (§6.6): `discover`, `stream`, `log`, and
//! `simulate-sensor`. This is the thin operator-facing layer the core
//! pipeline is wired up behind; the core itself never depends on it.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};
use log::{error, info};

use crate::config::{EngineConfig, ProcessingConfig, WriterConfig, HTTP_PORT, RDT_PORT, TCP_CMD_PORT};
use crate::net::discovery::{self, Subnet};
use crate::net::http_client::get_calibration_with_fallback;
use crate::processing::ProcessingEngine;
use crate::writer::formats::{Identity, OutputFormat as WriterOutputFormat};
use crate::writer::AsyncFileWriter;

#[derive(Parser, Debug)]
#[command(name = "gsdv", about = "Force/torque sensor acquisition and logging")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Probe a subnet for RDT-speaking sensors.
    Discover {
        /// CIDR subnet, e.g. 192.168.1.0/24
        subnet: String,
        #[arg(long, default_value_t = 50)]
        timeout_ms: u64,
    },
    /// Stream samples from a sensor and report rate/loss at the end.
    Stream {
        host: String,
        #[arg(long, default_value_t = RDT_PORT)]
        udp_port: u16,
        /// Stop after this many seconds; omit to run until Ctrl-C.
        #[arg(long)]
        duration_secs: Option<u64>,
    },
    /// Stream from a sensor and log samples to disk.
    Log {
        host: String,
        output_dir: PathBuf,
        #[arg(long, value_enum, default_value_t = CliOutputFormat::Csv)]
        format: CliOutputFormat,
        #[arg(long)]
        duration_secs: Option<u64>,
        #[arg(long, default_value = "")]
        prefix: String,
        #[arg(long, default_value_t = RDT_PORT)]
        udp_port: u16,
        #[arg(long, default_value_t = TCP_CMD_PORT)]
        tcp_port: u16,
        #[arg(long, default_value_t = HTTP_PORT)]
        http_port: u16,
    },
    /// Run the in-process sensor emulator (no physical hardware required).
    SimulateSensor {
        #[arg(long, default_value = "127.0.0.1:49152")]
        bind: String,
        #[arg(long, default_value_t = 1000.0)]
        rate_hz: f64,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum CliOutputFormat {
    Csv,
    Tsv,
    Excel,
}

impl From<CliOutputFormat> for WriterOutputFormat {
    fn from(f: CliOutputFormat) -> Self {
        match f {
            CliOutputFormat::Csv => WriterOutputFormat::Csv,
            CliOutputFormat::Tsv => WriterOutputFormat::Tsv,
            CliOutputFormat::Excel => WriterOutputFormat::ExcelCompatible,
        }
    }
}

/// Installs a Ctrl-C handler flipping a shared flag, matching the teacher's
/// `running: Arc<AtomicBool>` idiom. Workers observe `running` instead of
/// sleeping unconditionally, so a single Ctrl-C stops any subcommand early.
fn install_running_flag() -> Arc<AtomicBool> {
    let running = Arc::new(AtomicBool::new(true));
    let handler_flag = running.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        info!("received Ctrl-C, shutting down");
        handler_flag.store(false, Ordering::SeqCst);
    }) {
        error!("failed to install Ctrl-C handler: {e}");
    }
    running
}

/// Sleeps up to `duration`, waking early and returning once `running` is
/// cleared. Polls in short slices so stop latency stays well under a second.
fn sleep_or_stopped(duration: Duration, running: &AtomicBool) {
    const POLL: Duration = Duration::from_millis(100);
    let mut remaining = duration;
    while remaining > Duration::ZERO && running.load(Ordering::SeqCst) {
        let slice = remaining.min(POLL);
        thread::sleep(slice);
        remaining -= slice;
    }
}

/// Sleeps until `running` is cleared, with no fixed duration.
fn sleep_until_stopped(running: &AtomicBool) {
    const POLL: Duration = Duration::from_millis(100);
    while running.load(Ordering::SeqCst) {
        thread::sleep(POLL);
    }
}

/// Dispatches a parsed command and returns the process exit code (§6.6:
/// 0 on success, 1 on argument/config error).
pub fn run(command: Command) -> i32 {
    match command {
        Command::Discover { subnet, timeout_ms } => run_discover(&subnet, timeout_ms),
        Command::Stream { host, udp_port, duration_secs } => run_stream(&host, udp_port, duration_secs),
        Command::Log { host, output_dir, format, duration_secs, prefix, udp_port, tcp_port, http_port } => {
            run_log(&host, &output_dir, format.into(), duration_secs, &prefix, udp_port, tcp_port, http_port)
        }
        Command::SimulateSensor { bind, rate_hz } => run_simulate_sensor(&bind, rate_hz),
    }
}

fn run_discover(subnet_str: &str, timeout_ms: u64) -> i32 {
    let subnet: Subnet = match subnet_str.parse() {
        Ok(s) => s,
        Err(e) => {
            error!("invalid subnet '{subnet_str}': {e}");
            return 1;
        }
    };

    for sensor in discovery::discover(&subnet, Duration::from_millis(timeout_ms)) {
        println!("{}", sensor.ip);
    }
    0
}

fn run_stream(host: &str, udp_port: u16, duration_secs: Option<u64>) -> i32 {
    let running = install_running_flag();
    let mut engine = crate::acquisition::AcquisitionEngine::new(host, udp_port, EngineConfig::default());

    if let Err(e) = engine.start() {
        error!("failed to start acquisition: {e}");
        return 1;
    }

    sleep_or_stopped(Duration::from_secs(duration_secs.unwrap_or(10)), &running);

    let stats = engine.stats();
    let tier1_buckets = engine.query_tiered(crate::buffer::TierName::T1, 0, u64::MAX).len();
    engine.stop();

    println!("samples/s: {:.1}", stats.samples_per_second);
    println!("packets received: {}", stats.packets_received);
    println!("packets lost: {}", stats.packets_lost);
    println!("loss ratio: {:.4}", stats.loss_ratio());
    println!("tier1 buckets: {tier1_buckets}");
    0
}

#[allow(clippy::too_many_arguments)]
fn run_log(host: &str, output_dir: &std::path::Path, format: WriterOutputFormat, duration_secs: Option<u64>, prefix: &str, udp_port: u16, tcp_port: u16, http_port: u16) -> i32 {
    let running = install_running_flag();

    if let Err(e) = std::fs::create_dir_all(output_dir) {
        error!("output directory '{}' is not usable: {e}", output_dir.display());
        return 1;
    }

    let calibration = match get_calibration_with_fallback(host, http_port, tcp_port, Duration::from_secs(2)) {
        Ok(cal) => cal,
        Err(e) => {
            error!("failed to retrieve calibration from {host}: {e}");
            return 1;
        }
    };

    let identity = Identity { serial_number: calibration.serial_number.clone(), firmware_version: calibration.firmware_version.clone() };

    let processing_cfg = ProcessingConfig::default();
    let mut processing = ProcessingEngine::new(calibration.clone(), 1000.0, 100.0, false, processing_cfg.input_queue_capacity, processing_cfg.logger_queue_capacity);

    let mut writer = AsyncFileWriter::new();
    if let Err(e) = writer.start(output_dir.to_path_buf(), format, prefix.to_string(), WriterConfig::default(), Some(calibration), Some(identity)) {
        error!("failed to start writer: {e}");
        return 1;
    }

    let logger_rx = processing.logger_receiver();
    let drain_handle = thread::spawn(move || {
        while let Ok(sample) = logger_rx.recv() {
            writer.write(sample);
        }
        writer.stop();
        writer.stats().samples_written
    });

    processing.start();
    let processing = std::sync::Arc::new(processing);

    let mut engine = crate::acquisition::AcquisitionEngine::new(host, udp_port, EngineConfig::default());
    engine.set_sample_callback({
        let processing = processing.clone();
        move |sample| processing.submit_sample(sample)
    });

    if let Err(e) = engine.start() {
        error!("failed to start acquisition: {e}");
        return 1;
    }

    match duration_secs {
        Some(secs) => sleep_or_stopped(Duration::from_secs(secs), &running),
        None => sleep_until_stopped(&running),
    }

    let tier1_buckets = engine.query_tiered(crate::buffer::TierName::T1, 0, u64::MAX).len();
    engine.stop();
    let mut processing = std::sync::Arc::try_unwrap(processing).unwrap_or_else(|_| panic!("processing engine still referenced after acquisition stop"));
    processing.stop();
    drop(processing);

    let samples_written = drain_handle.join().unwrap_or(0);
    info!("logging session complete: {samples_written} samples written, {tier1_buckets} tier1 buckets retained");
    0
}

fn run_simulate_sensor(bind: &str, rate_hz: f64) -> i32 {
    let running = install_running_flag();
    let sim = crate::sim::SensorSimulator::start(bind, rate_hz);
    match sim {
        Ok(sim) => {
            info!("simulating sensor on {}", sim.local_addr());
            sleep_until_stopped(&running);
            0
        }
        Err(e) => {
            error!("failed to start sensor simulator: {e}");
            1
        }
    }
}
