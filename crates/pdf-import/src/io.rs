//! Async file I/O for sources and assembled output

use crate::reader::{PdfReader, Source, SourceReader};
use crate::types::*;
use std::path::Path;

/// Read a source document's bytes
pub async fn read_source(path: impl AsRef<Path>) -> Result<Source> {
    let bytes = tokio::fs::read(path.as_ref()).await?;
    Ok(Source::Bytes(bytes))
}

/// Read and parse a source document off the async runtime's worker threads
pub async fn load_reader(path: impl AsRef<Path>) -> Result<PdfReader> {
    let path = path.as_ref().to_owned();
    let source = read_source(&path).await?;
    let reader = tokio::task::spawn_blocking(move || PdfReader::open(&source))
        .await?
        .map_err(|source| ImportError::SourceRead {
            key: path.display().to_string(),
            source,
        })?;
    Ok(reader)
}

/// Write assembled PDF bytes
pub async fn write_output(bytes: Vec<u8>, path: impl AsRef<Path>) -> Result<()> {
    tokio::fs::write(path.as_ref(), bytes).await?;
    Ok(())
}
