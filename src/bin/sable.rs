// Sable CLI - Command Line Interface
// Usage: sable [FILE] [OPTIONS]

use clap::Parser;
use colored::*;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use sable_core::{Config, Interpreter, OutputSink, StdSink};

/// Sable - a class-based, thread-aware scripting language
#[derive(Parser)]
#[command(name = "sable")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "A class-based, thread-aware scripting language", long_about = None)]
struct Cli {
    /// Source file to run (.sbl)
    file: Option<PathBuf>,

    /// Execute inline code
    #[arg(short = 'e', long = "exec")]
    exec: Option<String>,

    /// Check for errors without running
    #[arg(long = "check")]
    check: bool,

    /// JSON configuration file
    #[arg(long = "config")]
    config: Option<PathBuf>,

    /// Emit debug(...) output
    #[arg(long = "debug")]
    debug: bool,

    /// Maximum call depth before a stack overflow error
    #[arg(long = "max-depth")]
    max_depth: Option<usize>,
}

fn main() {
    init_tracing();
    let cli = Cli::parse();

    let result = load_config(&cli).and_then(|config| {
        if let Some(code) = &cli.exec {
            handle_run(code, "<exec>", config, cli.check)
        } else if let Some(path) = &cli.file {
            let source = fs::read_to_string(path)
                .map_err(|e| format!("Error reading file '{}': {}", path.display(), e))?;
            let config = with_script_root(config, path, cli.config.is_some());
            handle_run(&source, &path.to_string_lossy(), config, cli.check)
        } else {
            Err("No input. Pass a script file or use -e <code>.".to_string())
        }
    });

    if let Err(e) = result {
        if !e.is_empty() {
            eprintln!("{}", e);
        }
        std::process::exit(1);
    }
}

/// Diagnostics are off unless SABLE_LOG is set
fn init_tracing() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    if std::env::var("SABLE_LOG").is_ok() {
        let filter = EnvFilter::from_env("SABLE_LOG");
        tracing_subscriber::registry()
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .with(filter)
            .init();
    }
}

fn load_config(cli: &Cli) -> Result<Config, String> {
    let mut config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    if cli.debug {
        config.debug = true;
    }
    if let Some(depth) = cli.max_depth {
        config.max_call_depth = depth;
    }
    Ok(config)
}

/// Without a config file, imports resolve next to the script
fn with_script_root(mut config: Config, path: &Path, explicit: bool) -> Config {
    if !explicit {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            config.import_root = parent.to_path_buf();
        }
    }
    config
}

fn handle_run(source: &str, file: &str, config: Config, check_only: bool) -> Result<(), String> {
    let sink: Arc<dyn OutputSink> = Arc::new(StdSink);
    let mut interp = Interpreter::builder().config(config).sink(sink.clone()).build();

    if check_only {
        interp.check(source, file).map_err(|e| e.format())?;
        println!("{} No errors found in {}", "✓".green(), file);
        return Ok(());
    }

    let result = interp.run_source(source, file);
    // Script threads keep running after the main program returns
    interp.wait_for_threads();
    match result {
        Ok(_) => Ok(()),
        Err(error) => {
            sink.error(&error.format());
            Err(String::new())
        }
    }
}
