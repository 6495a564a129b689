use std::fs;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use frame::render::NullSurface;
use frame::Console;
use log::info;

/// FRAME console: assembles and runs a `.fm` program against the bundled
/// kernel, in a window unless `--headless` is given.
#[derive(Parser, Debug)]
#[clap(name = "frame", version)]
struct Cli {
    /// Path to a FRAME assembly source file.
    program: String,

    /// Attach the interactive debugger instead of running freely.
    #[clap(short, long)]
    debug: bool,

    /// Run without opening a window (no video output, still useful with --debug).
    #[clap(long)]
    headless: bool,

    /// Window scale factor in pixels per console pixel.
    #[clap(long, default_value_t = 8)]
    scale: usize,
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let source = fs::read_to_string(&cli.program)
        .with_context(|| format!("reading program '{}'", cli.program))?;

    let mut console = Console::new().context("assembling the kernel")?;
    let program = console.load_program(&source).context("assembling the guest program")?;
    info!("loaded '{}', entry point {:#06x}", cli.program, program.start);

    if cli.headless {
        run_headless(&mut console, cli.debug, &program)
    } else {
        run_windowed(&mut console, cli.debug, &program, cli.scale)
    }
}

fn run_headless(console: &mut Console, debug: bool, program: &frame::AssembledImage) -> Result<()> {
    let mut surface = NullSurface;
    let mut debugger = debug.then(|| frame::debugger::Debugger::new(program, console.kernel_image()));
    loop {
        if let Some(dbg) = debugger.as_mut() {
            if dbg.should_pause(&console.cpu) && !dbg.prompt(&console.cpu) {
                return Ok(());
            }
        }
        if console.cpu.halted {
            return Ok(());
        }
        console.scheduler.step(&mut console.cpu, &mut surface);
    }
}

fn run_windowed(console: &mut Console, debug: bool, program: &frame::AssembledImage, scale: usize) -> Result<()> {
    let mut surface = frame::host::MinifbSurface::new("FRAME", scale)
        .map_err(|e| anyhow::anyhow!("opening the console window: {}", e))?;
    let mut debugger = debug.then(|| frame::debugger::Debugger::new(program, console.kernel_image()));
    let mut last = Instant::now();

    while surface.is_open() {
        if let Some(dbg) = debugger.as_mut() {
            if dbg.should_pause(&console.cpu) && !dbg.prompt(&console.cpu) {
                break;
            }
        }
        console.set_input(surface.poll_buttons());
        let elapsed = last.elapsed();
        last = Instant::now();
        console.tick(elapsed, &mut surface);
        surface.present().map_err(|e| anyhow::anyhow!("presenting a frame: {}", e))?;
        if console.cpu.halted && debugger.is_none() {
            break;
        }
    }
    Ok(())
}
