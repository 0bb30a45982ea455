//! Concurrent, line-preserving merge of files and named pipes into a single
//! output stream.
//!
//! Every source is opened in its own task, so a FIFO still waiting for a
//! writer never holds up sources that already have data. A single
//! multiplexer polls whatever is open and only writes up to the last newline
//! it has seen from each source; a trailing partial line waits for more data
//! or for end-of-stream.
//!
//! ## Example
//!
//! ```no_run
//! use pipemux::LineMerge;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), pipemux::Error> {
//!     let mut merge = LineMerge::new();
//!
//!     // FIFOs block on open until a writer connects, which is fine here.
//!     merge.add_path("some/file.log");
//!     merge.add_path("/tmp/some.fifo");
//!
//!     let stats = merge.run(std::io::stdout()).await?;
//!     eprintln!("merged {} sources", stats.sources);
//!     Ok(())
//! }
//! ```
//!
//! ## Caveats
//!
//! Only Unix-like platforms are supported, since readiness polling is built
//! on `poll(2)`. A source's unflushed partial line is held in memory, so a
//! source that never writes a newline grows that buffer until it closes.

mod config;
mod error;
pub mod handoff;
mod merge;
pub mod mux;
mod output;
pub mod poll;
pub mod source;

pub use config::{MuxConfig, DEFAULT_CHUNK_SIZE, DEFAULT_POLL_INTERVAL};
pub use error::Error;
pub use merge::LineMerge;
pub use mux::{MergeStats, Multiplexer};
pub use output::OutputWriter;
pub use poll::{NonBlockingFile, PollReadiness, ReadOutcome, Readiness};
pub use source::{SourceId, SourceState};

#[cfg(doctest)]
doc_comment::doctest!("../README.md");
