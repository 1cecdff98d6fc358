//! Configuration loading.
//!
//! Each process reads its role and addresses from a configuration
//! directory holding three JSON files:
//!
//! - `app.json` holds `{ "mode": "source" | "splitter" | "sink" }`
//! - `inputs.json` holds what the role consumes (a file to stream, or a
//!   TCP listen port)
//! - `outputs.json` holds where the role's output goes (one target, a
//!   target list, or a file path)
//!
//! Loading resolves the files into one role-specific config value.
//! Validation failures are fatal: a process with a bad config must not
//! bind a socket or enter an accept loop.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::de::DeserializeOwned;
use serde::Deserialize;

/// A downstream `(host, port)` target.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Target {
    pub host: String,
    pub port: u16,
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Process role selected by `app.json`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Source,
    Splitter,
    Sink,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Source => f.write_str("source"),
            Role::Splitter => f.write_str("splitter"),
            Role::Sink => f.write_str("sink"),
        }
    }
}

/// Source role: stream `file` to `target`.
#[derive(Debug, Clone)]
pub struct SourceConfig {
    pub file: PathBuf,
    pub target: Target,
}

/// Splitter role: listen on `listen_port`, fan lines out to `targets`.
#[derive(Debug, Clone)]
pub struct SplitterConfig {
    pub listen_port: u16,
    pub targets: Vec<Target>,
}

/// Sink role: listen on `listen_port`, append received bytes to `file`.
#[derive(Debug, Clone)]
pub struct SinkConfig {
    pub listen_port: u16,
    pub file: PathBuf,
}

/// Resolved configuration for one process.
#[derive(Debug, Clone)]
pub enum Config {
    Source(SourceConfig),
    Splitter(SplitterConfig),
    Sink(SinkConfig),
}

impl Config {
    pub fn role(&self) -> Role {
        match self {
            Config::Source(_) => Role::Source,
            Config::Splitter(_) => Role::Splitter,
            Config::Sink(_) => Role::Sink,
        }
    }

    /// Load and validate the configuration under `dir`.
    pub fn load(dir: &Path) -> Result<Self> {
        let app: AppFile = read_json(&dir.join("app.json"))?;

        match app.mode {
            Role::Source => {
                let inputs: SourceInputs = read_json(&dir.join("inputs.json"))?;
                let outputs: SourceOutputs = read_json(&dir.join("outputs.json"))?;
                Ok(Config::Source(SourceConfig {
                    file: dir.join(inputs.monitor),
                    target: outputs.tcp,
                }))
            }
            Role::Splitter => {
                let inputs: PortInputs = read_json(&dir.join("inputs.json"))?;
                let outputs: SplitterOutputs = read_json(&dir.join("outputs.json"))?;
                if outputs.tcp.is_empty() {
                    bail!("splitter target list in outputs.json is empty");
                }
                Ok(Config::Splitter(SplitterConfig {
                    listen_port: inputs.tcp,
                    targets: outputs.tcp,
                }))
            }
            Role::Sink => {
                let inputs: PortInputs = read_json(&dir.join("inputs.json"))?;
                let outputs: SinkOutputs = read_json(&dir.join("outputs.json"))?;
                Ok(Config::Sink(SinkConfig {
                    listen_port: inputs.tcp,
                    file: outputs.file,
                }))
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct AppFile {
    mode: Role,
}

#[derive(Debug, Deserialize)]
struct SourceInputs {
    /// File to stream, relative to the configuration directory.
    monitor: String,
}

#[derive(Debug, Deserialize)]
struct PortInputs {
    /// TCP listen port.
    tcp: u16,
}

#[derive(Debug, Deserialize)]
struct SourceOutputs {
    tcp: Target,
}

#[derive(Debug, Deserialize)]
struct SplitterOutputs {
    tcp: Vec<Target>,
}

#[derive(Debug, Deserialize)]
struct SinkOutputs {
    file: PathBuf,
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&data).with_context(|| format!("Failed to parse {}", path.display()))
}
