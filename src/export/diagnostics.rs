use std::collections::BTreeSet;
use std::fs::File;
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};

use crate::analyzer::DuplicateEntry;
use crate::ingest::interval::UnresolvedStart;

/// Writes one `serial,location` row per device+location whose install
/// time could not be inferred.
pub fn write_unresolved_starts(path: &Path, unresolved: &BTreeSet<UnresolvedStart>) -> Result<()> {
    write_pairs(
        path,
        "# serial,location",
        unresolved.iter().map(|u| [u.serial.as_str(), u.location.as_str()]),
    )
}

/// Writes one `serial,failure_type` row per device+failure type with at
/// least one zero or negative delta.
pub fn write_duplicate_entries(path: &Path, duplicates: &BTreeSet<DuplicateEntry>) -> Result<()> {
    write_pairs(
        path,
        "# serial,failure_type",
        duplicates.iter().map(|d| [d.serial.as_str(), d.failure.as_str()]),
    )
}

fn write_pairs<'a, I>(path: &Path, header: &str, rows: I) -> Result<()>
where
    I: Iterator<Item = [&'a str; 2]>,
{
    let mut file =
        File::create(path).with_context(|| format!("creating {}", path.display()))?;
    writeln!(file, "{header}").with_context(|| format!("writing {}", path.display()))?;

    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(file);
    for row in rows {
        writer
            .write_record(row)
            .with_context(|| format!("writing {}", path.display()))?;
    }
    writer
        .flush()
        .with_context(|| format!("flushing {}", path.display()))?;
    Ok(())
}
