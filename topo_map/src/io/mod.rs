//! File input and output helpers shared by the loaders and writers.

use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::Path;

use crate::error::{Result, TopoError};

/// Reads a file to string.
pub fn read_to_string(path: &Path) -> Result<String> {
    let mut buffer = String::new();
    File::open(path)
        .and_then(|mut f| f.read_to_string(&mut buffer))
        .map_err(|e| TopoError::io(path, e))?;
    Ok(buffer)
}

/// Writes `contents` to `path`, replacing any existing file.
pub fn write_string(path: &Path, contents: &str) -> Result<()> {
    std::fs::write(path, contents).map_err(|e| TopoError::io(path, e))
}

/// Creates `path` and hands a buffered writer to `body`. The buffer is
/// flushed before returning so that write errors are not lost on drop.
pub fn write_with<F>(path: &Path, body: F) -> Result<()>
where
    F: FnOnce(&mut BufWriter<File>) -> std::io::Result<()>,
{
    let file = File::create(path).map_err(|e| TopoError::io(path, e))?;
    let mut writer = BufWriter::new(file);
    body(&mut writer)
        .and_then(|_| writer.flush())
        .map_err(|e| TopoError::io(path, e))
}
