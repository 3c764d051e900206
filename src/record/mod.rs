pub mod event;
pub mod parse;
pub mod stats;

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use anyhow::{Context, Result};

use self::parse::LogRows;

/// Open an event log file for row-by-row parsing.
pub fn open_log(path: &Path) -> Result<LogRows<BufReader<File>>> {
    let file = File::open(path).with_context(|| format!("opening event log {}", path.display()))?;
    Ok(LogRows::new(BufReader::new(file)))
}
