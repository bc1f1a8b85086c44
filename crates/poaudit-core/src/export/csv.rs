//! CSV export: the line item table, then a marked section of failed documents.

use std::io::Write;
use std::path::Path;

use tracing::info;

use super::{Cell, FAILURE_COLUMNS, ITEM_COLUMNS, failure_cells, item_cells};
use crate::error::ExportError;
use crate::ledger::Ledger;

/// Marker row opening the failed document section.
pub const FAILURES_SECTION: &str = "# failed documents";

/// Write the ledger as CSV to a file.
pub fn write_csv(ledger: &Ledger, path: &Path) -> Result<(), ExportError> {
    let file = std::fs::File::create(path)?;
    write_csv_to(ledger, file)?;
    info!("Exported ledger CSV to {}", path.display());
    Ok(())
}

/// Write the line item table, then a blank row, the section marker and the
/// failed document table if there are any failures.
pub fn write_csv_to<W: Write>(ledger: &Ledger, writer: W) -> Result<(), ExportError> {
    let mut wtr = ::csv::WriterBuilder::new().flexible(true).from_writer(writer);

    wtr.write_record(ITEM_COLUMNS)?;
    for line in ledger.items() {
        wtr.write_record(item_cells(line).iter().map(Cell::render))?;
    }

    let failures: Vec<_> = ledger.failures().collect();
    if !failures.is_empty() {
        wtr.write_record([""])?;
        wtr.write_record([FAILURES_SECTION])?;
        wtr.write_record(FAILURE_COLUMNS)?;
        for failed in failures {
            wtr.write_record(failure_cells(failed).iter().map(Cell::render))?;
        }
    }

    wtr.flush()?;
    Ok(())
}
