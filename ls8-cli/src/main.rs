use std::path::PathBuf;

use console::Console;
use cpu::Cpu;

use anyhow::{Context, Result};
use clap::Parser;
use log::{info, warn};

/// LS-8 runner
#[derive(Parser)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// Program image to load and execute
    program: PathBuf,

    /// Print the CPU state to stderr before every instruction
    #[clap(long)]
    trace: bool,
}

/// Parses arguments, exiting with status 1 on a usage error
fn parse_args() -> Args {
    match Args::try_parse() {
        Ok(args) => args,
        Err(e) if !e.use_stderr() => e.exit(), // --help or --version
        Err(e) => {
            let _ = e.print();
            std::process::exit(1);
        }
    }
}

fn main() -> Result<()> {
    let env = env_logger::Env::default()
        .filter_or("LS8_LOG", "info")
        .write_style_or("LS8_LOG_STYLE", "auto");
    env_logger::init_from_env(env);

    let args = parse_args();
    let mut vm = Cpu::new();
    match std::fs::read(&args.program) {
        Ok(data) => {
            // Only the ASCII `0` / `1` prefixes matter, so stray bytes in
            // comments are tolerated
            let text = String::from_utf8_lossy(&data);
            let n = vm.load(&text).with_context(|| {
                format!("failed to load {}", args.program.display())
            })?;
            info!("loaded {n} bytes from {:?}", args.program);
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            // Memory stays zeroed, so the run below stops at address 0
            println!("{} not found.", args.program.display());
            warn!("could not open {:?}: {e}", args.program);
        }
        Err(e) => {
            return Err(e).with_context(|| {
                format!("failed to read {}", args.program.display())
            });
        }
    }

    let mut dev = Console::new();
    let start = std::time::Instant::now();
    let r = if args.trace {
        vm.run_with(&mut dev, |vm| eprintln!("{}", vm.trace()))
    } else {
        vm.run(&mut dev)
    };
    info!("ran for {:?}", start.elapsed());

    // Exits the process if the program halted
    dev.check().context("failed to write output")?;
    r.context("execution failed")?;

    Ok(())
}
