//! Merges files and named pipes into stdout without splitting lines.
//!
//! Usage:
//!     pipemux /path/to/file1 /path/to/fifo2 ...
//!
//! Named pipes may not have a writer yet; they are read once one connects.

use std::ffi::OsString;
use std::io;
use std::path::PathBuf;
use std::process;

use pipemux::{Error, LineMerge};
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

const USAGE: &str = "\
Usage: pipemux PATH...

Copies every PATH (regular files or named pipes) to standard output,
never splitting a line from one source with data from another.
Named pipes are read as soon as a writer connects.
";

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn exit_code(err: &Error) -> i32 {
    match err {
        Error::Cancelled => 130,
        _ => 1,
    }
}

#[tokio::main]
pub async fn main() {
    let args: Vec<OsString> = std::env::args_os().skip(1).collect();

    if args.is_empty() {
        print!("{}", USAGE);
        return;
    }

    init_logging();

    let (stop_tx, stop_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = stop_tx.send(true);
        }
    });

    let mut merge = LineMerge::new();
    for path in args {
        merge.add_path(PathBuf::from(path));
    }
    merge.with_shutdown(stop_rx);

    if let Err(e) = merge.run(io::stdout()).await {
        eprintln!("pipemux: {}", e);
        // Exit right away: openers still blocked on a FIFO would otherwise
        // hold up runtime shutdown.
        process::exit(exit_code(&e));
    }
}
