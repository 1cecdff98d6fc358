//! linefan, a three-role line-splitting TCP relay.
//!
//! - **source** streams a local file verbatim over one TCP connection;
//! - **splitter** terminates that stream, splits it on line boundaries,
//!   and fans whole lines out round-robin across a fixed set of downstream
//!   connections, propagating backpressure from any slow one back to the
//!   sender;
//! - **sink** appends every byte it receives to a local file.
//!
//! The splitter guarantees line atomicity (a line is never divided between
//! two downstream connections) and per-connection ordering; it makes no
//! ordering guarantee between different downstream connections.

pub mod config;
pub mod sink;
pub mod source;
pub mod splitter;

pub use config::{Config, Role, SinkConfig, SourceConfig, SplitterConfig, Target};
pub use sink::{Sink, SinkStats};
pub use splitter::{
    PoolStats, Splitter, SplitterStats, WriteOutcome, DEFAULT_HIGH_WATER_MARK,
};
