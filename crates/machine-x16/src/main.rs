//! Headless X16 runner.
//!
//! Runs the machine for a number of frames against a host that accepts
//! everything, then optionally writes a screenshot. Instruction semantics
//! are not modelled, so the CPU is a uniform workload; a ROM image is
//! still loaded so vectors and banked reads behave.

use std::path::PathBuf;
use std::process;

use emu_core::Cpu;
use machine_x16::{
    AudioSink, Frame, Frontend, Host, PixelFormat, RunStatus, VideoSink, WorkloadCpu, X16Config,
    capture,
};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Cycles per instruction for the stand-in CPU (a typical 65C02 average).
const WORKLOAD_CYCLES: u32 = 4;

struct CliArgs {
    config_path: Option<PathBuf>,
    rom_path: Option<PathBuf>,
    frames: u32,
    screenshot_path: Option<PathBuf>,
}

fn parse_args() -> CliArgs {
    let args: Vec<String> = std::env::args().collect();
    let mut cli = CliArgs {
        config_path: None,
        rom_path: None,
        frames: 60,
        screenshot_path: None,
    };

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--config" => {
                i += 1;
                cli.config_path = args.get(i).map(PathBuf::from);
            }
            "--rom" => {
                i += 1;
                cli.rom_path = args.get(i).map(PathBuf::from);
            }
            "--frames" => {
                i += 1;
                if let Some(s) = args.get(i) {
                    cli.frames = s.parse().unwrap_or(60);
                }
            }
            "--screenshot" => {
                i += 1;
                cli.screenshot_path = args.get(i).map(PathBuf::from);
            }
            "--help" | "-h" => {
                eprintln!("Usage: x16-headless [OPTIONS]");
                eprintln!();
                eprintln!("Options:");
                eprintln!("  --config <file>      Machine configuration (JSON)");
                eprintln!("  --rom <file>         ROM image (up to 512 KiB)");
                eprintln!("  --frames <n>         Number of frames to run [default: 60]");
                eprintln!("  --screenshot <file>  Save a PNG of the last frame");
                process::exit(0);
            }
            other => {
                eprintln!("Unknown argument: {other}");
                process::exit(1);
            }
        }
        i += 1;
    }

    cli
}

/// Accepts every frame and sample, keeping counts.
#[derive(Default)]
struct HeadlessHost {
    frames: u64,
    samples: u64,
    midi_bytes: u64,
}

impl VideoSink for HeadlessHost {
    fn present_frame(&mut self, _frame: Frame<'_>) -> bool {
        self.frames += 1;
        true
    }
}

impl AudioSink for HeadlessHost {
    fn play_batch(&mut self, samples: &[i16]) -> bool {
        self.samples += samples.len() as u64;
        true
    }
}

impl Host for HeadlessHost {
    fn set_pixel_format(&mut self, format: PixelFormat) -> bool {
        format == PixelFormat::Xrgb8888
    }

    fn send_midi(&mut self, bytes: &[u8]) {
        self.midi_bytes += bytes.len() as u64;
    }
}

fn run(cli: &CliArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = match &cli.config_path {
        Some(path) => X16Config::load(path)?,
        None => X16Config::default(),
    };

    let mut frontend = Frontend::new(WorkloadCpu::uniform(WORKLOAD_CYCLES), &config)?;
    if let Some(path) = &cli.rom_path {
        let image = std::fs::read(path)?;
        frontend.scheduler_mut().bus_mut().load_rom(&image)?;
        info!(path = %path.display(), bytes = image.len(), "ROM loaded");
    }

    let mut host = HeadlessHost::default();
    frontend.load(&mut host)?;

    for _ in 0..cli.frames {
        if frontend.run(&mut host)? == RunStatus::Halted {
            info!("machine halted");
            break;
        }
    }

    let scheduler = frontend.scheduler();
    info!(
        frames = host.frames,
        samples = host.samples,
        midi_bytes = host.midi_bytes,
        cycles = scheduler.cpu().cycles().get(),
        "run complete"
    );

    if let Some(path) = &cli.screenshot_path {
        capture::save_screenshot(scheduler, path)?;
        info!(path = %path.display(), "screenshot saved");
    }
    Ok(())
}

fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = parse_args();
    if let Err(e) = run(&cli) {
        error!("{e}");
        process::exit(1);
    }
}
