//! Reading the file to sign or check, and appending blocks to it.

use std::fs::{self, OpenOptions};
use std::io::{self, Read, Write};
use std::path::Path;

use crate::error::CliError;

/// Path that stands for standard input.
pub const STDIN: &str = "-";

/// Read the whole of `path`, or standard input if it is [`STDIN`].
pub fn read_input(path: &Path) -> Result<Vec<u8>, CliError> {
    if path == Path::new(STDIN) {
        let mut content = Vec::new();
        io::stdin().lock().read_to_end(&mut content)?;
        log::debug!("read {} bytes from stdin", content.len());
        return Ok(content);
    }

    let content = fs::read(path).map_err(|e| with_path(e, path))?;
    log::debug!("read {} bytes from {}", content.len(), path.display());
    Ok(content)
}

/// Append a rendered block to the file at `path`.
pub fn append_block(path: &Path, block: &str) -> Result<(), CliError> {
    let mut file = OpenOptions::new()
        .append(true)
        .open(path)
        .map_err(|e| with_path(e, path))?;
    file.write_all(block.as_bytes())
        .map_err(|e| with_path(e, path))?;
    log::info!("appended signature block to {}", path.display());
    Ok(())
}

fn with_path(err: io::Error, path: &Path) -> io::Error {
    io::Error::new(err.kind(), format!("{}: {}", path.display(), err))
}
