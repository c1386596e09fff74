//! Loopback capture command line
//!
//! Records whatever a render device is playing, either into a WAV file or
//! as raw native-format bytes on stdout for piping into another program.

#![cfg_attr(not(target_os = "windows"), allow(dead_code))]

mod report;

use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;

use clap::{Parser, ValueEnum};
use loopback_capture_core::{
    run_capture, AudioBackend, CaptureConfiguration, CaptureError, CaptureSession, DeviceDirectory, FrameSink,
    NameMatch, RawStreamWriter, SampleFormat, WavWriter, DEFAULT_RING_CAPACITY_FRAMES,
};

#[derive(Parser)]
#[command(name = "loopback-capture")]
#[command(version)]
#[command(about = "Record what a playback device is playing", long_about = None)]
struct Cli {
    /// Print information for every playback device and exit
    #[arg(long)]
    list: bool,

    /// Print information for the selected device and exit
    #[arg(long)]
    info: bool,

    /// Playback device name (default device when omitted)
    #[arg(short, long, default_value = "")]
    name: String,

    /// Match --name as a case-insensitive substring
    #[arg(short, long)]
    find: bool,

    /// Process IDs to include (accepted, not applied)
    #[arg(long, num_args = 1..)]
    include: Vec<u32>,

    /// Process IDs to exclude (accepted, not applied)
    #[arg(long, num_args = 1..)]
    exclude: Vec<u32>,

    /// Shared ring-buffer capacity in frames
    #[arg(long, default_value_t = DEFAULT_RING_CAPACITY_FRAMES)]
    buffer_frames: usize,

    /// WAV sample width
    #[arg(long, value_enum, default_value = "16")]
    bits: Bits,

    /// Print device information as JSON
    #[arg(long)]
    json: bool,

    /// WAV file to write; raw samples go to stdout when omitted
    output: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Bits {
    #[value(name = "8")]
    Eight,
    #[value(name = "16")]
    Sixteen,
}

impl Cli {
    fn configuration(&self) -> CaptureConfiguration {
        CaptureConfiguration {
            device_name: self.name.clone(),
            name_match: if self.find { NameMatch::Partial } else { NameMatch::Exact },
            ring_capacity_frames: self.buffer_frames,
            output_format: match self.bits {
                Bits::Eight => SampleFormat::UnsignedInt8,
                Bits::Sixteen => SampleFormat::SignedInt16,
            },
            ..Default::default()
        }
    }
}

/// Error with an associated exit code.
#[derive(Debug)]
struct CliError {
    message: String,
    exit_code: i32,
}

impl CliError {
    fn general(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            exit_code: 1,
        }
    }
}

impl From<CaptureError> for CliError {
    fn from(e: CaptureError) -> Self {
        Self::general(e.to_string())
    }
}

impl From<io::Error> for CliError {
    fn from(e: io::Error) -> Self {
        Self::general(format!("output failed: {}", e))
    }
}

impl From<serde_json::Error> for CliError {
    fn from(e: serde_json::Error) -> Self {
        Self::general(format!("JSON encoding failed: {}", e))
    }
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e.message);
        std::process::exit(e.exit_code);
    }
}

#[cfg(target_os = "windows")]
fn run(cli: Cli) -> Result<(), CliError> {
    use std::sync::Arc;

    let stop = Arc::new(AtomicBool::new(false));
    {
        let stop = Arc::clone(&stop);
        ctrlc::set_handler(move || {
            log::info!("Received Ctrl+C");
            stop.store(true, std::sync::atomic::Ordering::SeqCst);
        })
        .map_err(|e| CliError::general(format!("cannot install Ctrl+C handler: {}", e)))?;
    }

    let backend = loopback_capture_windows::WasapiBackend::new()?;
    let stdout = io::stdout();
    let stderr = io::stderr();
    execute(&backend, &cli, &stop, &mut stdout.lock(), &mut stderr.lock())
}

#[cfg(not(target_os = "windows"))]
fn run(_cli: Cli) -> Result<(), CliError> {
    Err(CliError::general("loopback capture is only available on Windows"))
}

/// Carry out the command line against `backend`.
///
/// Device information goes to `out`, except while raw samples occupy it,
/// in which case it goes to `diag`.
fn execute<B: AudioBackend>(
    backend: &B,
    cli: &Cli,
    stop: &AtomicBool,
    out: &mut dyn Write,
    diag: &mut dyn Write,
) -> Result<(), CliError> {
    if cli.list {
        let devices = DeviceDirectory::new(backend).list_devices()?;
        out.write_all(report::device_list(&devices, cli.json)?.as_bytes())?;
        return Ok(());
    }

    let config = cli.configuration();
    config.validate().map_err(CliError::general)?;
    if !cli.include.is_empty() || !cli.exclude.is_empty() {
        log::debug!(
            "Process filters are not applied (include {:?}, exclude {:?})",
            cli.include,
            cli.exclude
        );
    }

    let mut session = CaptureSession::open(backend, &config.device_name, config.name_match)?;
    let info = session.info();
    let block = report::device_report(&info, cli.json)?;
    if cli.output.is_none() && !cli.info {
        diag.write_all(block.as_bytes())?;
    } else {
        out.write_all(block.as_bytes())?;
    }
    if cli.info {
        session.close()?;
        return Ok(());
    }

    let mut sink: Box<dyn FrameSink + '_> = match &cli.output {
        Some(path) => Box::new(WavWriter::create_file(
            path,
            info.channels,
            info.sample_rate,
            config.output_format,
        )?),
        None => Box::new(RawStreamWriter::new(&mut *out)),
    };

    if !session.start(config.ring_capacity_frames) {
        return Err(CliError::general(format!("cannot start capture on \"{}\"", info.name)));
    }
    log::info!("Capturing from \"{}\"", info.name);

    let outcome = run_capture(&mut session, sink.as_mut(), stop, config.poll_interval);

    if let Err(e) = session.stop() {
        log::warn!("Stop failed: {}", e);
    }
    session.close()?;
    match sink.finish() {
        Ok(()) | Err(CaptureError::SinkClosed(_)) => {}
        Err(e) => return Err(e.into()),
    }

    let stats = outcome?;
    log::info!(
        "Captured {} frames ({} bytes), {} buffers dropped",
        stats.frames_captured,
        stats.bytes_captured,
        stats.failed_writes
    );
    Ok(())
}
