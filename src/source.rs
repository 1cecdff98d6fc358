//! Source role: stream a local file verbatim over one TCP connection.
//!
//! No framing is added; the splitter downstream discovers line boundaries
//! itself. The connection is half-closed once the file is exhausted so the
//! splitter sees a clean end of stream.

use std::io;

use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tracing::info;

use crate::config::SourceConfig;

/// Stream the configured file to the configured target, then shut the
/// write side down.
pub async fn run(config: &SourceConfig) -> io::Result<()> {
    let mut file = File::open(&config.file).await?;
    let mut stream = TcpStream::connect((config.target.host.as_str(), config.target.port)).await?;

    info!(
        file = %config.file.display(),
        target = %config.target,
        "Streaming file"
    );

    let bytes = tokio::io::copy(&mut file, &mut stream).await?;
    stream.shutdown().await?;

    info!(bytes, "Source stream complete");
    Ok(())
}
