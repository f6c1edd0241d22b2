use std::env;
use std::process;

use tortuga_cli::host::{FsStorage, StdPlatform, StdinStream, StdoutStream};
use tortuga_cli::repl;
use tortuga_runtime::{Interp, InterpConfig};
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = env::args().skip(1).collect();
    let mut config = InterpConfig::default();
    let mut files: Vec<String> = Vec::new();

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--nodes" => {
                config.node_capacity = numeric_flag(&args, &mut i, "--nodes");
            }
            "--arena" => {
                config.arena_words = numeric_flag(&args, &mut i, "--arena");
            }
            "help" | "--help" | "-h" => {
                print_usage();
                return;
            }
            "version" | "--version" | "-V" => {
                println!("tortuga {}", env!("CARGO_PKG_VERSION"));
                return;
            }
            other if other.starts_with('-') => {
                eprintln!("Unknown option: {other}");
                print_usage();
                process::exit(1);
            }
            file => {
                files.push(file.to_string());
            }
        }
        i += 1;
    }

    let mut it = Interp::new(
        config,
        Box::new(StdinStream::new()),
        Box::new(StdoutStream),
        Box::new(FsStorage::new(env::current_dir().unwrap_or_default())),
        Box::new(StdPlatform::new()),
    );

    for file in &files {
        let out = tortuga_runtime::persist::load(&mut it, file);
        if repl::handle_outcome(&mut it, out) {
            return;
        }
    }

    process::exit(repl::run_repl(&mut it));
}

fn numeric_flag(args: &[String], i: &mut usize, name: &str) -> usize {
    *i += 1;
    match args.get(*i).and_then(|v| v.parse().ok()) {
        Some(n) => n,
        None => {
            eprintln!("{name} needs a number");
            process::exit(1);
        }
    }
}

fn print_usage() {
    eprintln!("Tortuga - a Logo interpreter");
    eprintln!();
    eprintln!("Usage:");
    eprintln!("  tortuga [options] [file.lg ...]   Load files, then start the REPL");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --nodes N     Cons pool size (default 16384)");
    eprintln!("  --arena N     Frame arena size in words (default 16384)");
    eprintln!("  --help        Show this help");
    eprintln!("  --version     Show version");
}
