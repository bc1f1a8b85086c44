//! XLSX export: one sheet of line items, one of failed documents.

use std::path::Path;

use rust_decimal::prelude::ToPrimitive;
use rust_xlsxwriter::{Color, Format, Workbook, Worksheet};
use tracing::info;

use super::{Cell, FAILURE_COLUMNS, ITEM_COLUMNS, failure_cells, item_cells};
use crate::error::ExportError;
use crate::ledger::Ledger;
use crate::models::config::ExportConfig;

/// Write the ledger as a workbook with a line item sheet and a failure sheet.
pub fn write_xlsx(ledger: &Ledger, config: &ExportConfig, path: &Path) -> Result<(), ExportError> {
    let header_format = Format::new()
        .set_bold()
        .set_background_color(Color::RGB(0x2563EB))
        .set_font_color(Color::RGB(0xFFFFFF));
    let formats = CellFormats {
        number: Format::new().set_num_format("#,##0.00"),
        integer: Format::new().set_num_format("0"),
    };

    let mut workbook = Workbook::new();

    let items: Vec<_> = ledger.items().map(item_cells).collect();
    let sheet = workbook.add_worksheet();
    sheet.set_name(&config.items_sheet)?;
    write_table(sheet, &ITEM_COLUMNS, &items, config, &header_format, &formats)?;

    let failures: Vec<_> = ledger.failures().map(failure_cells).collect();
    let sheet = workbook.add_worksheet();
    sheet.set_name(&config.failures_sheet)?;
    write_table(sheet, &FAILURE_COLUMNS, &failures, config, &header_format, &formats)?;

    workbook.save(path)?;
    info!(
        "Exported {} line items and {} failed documents to {}",
        items.len(),
        failures.len(),
        path.display()
    );
    Ok(())
}

struct CellFormats {
    number: Format,
    integer: Format,
}

fn write_table<const N: usize>(
    sheet: &mut Worksheet,
    header: &[&str; N],
    rows: &[[Cell; N]],
    config: &ExportConfig,
    header_format: &Format,
    formats: &CellFormats,
) -> Result<(), ExportError> {
    let mut widths: Vec<usize> = header.iter().map(|h| h.chars().count()).collect();

    for (col, title) in header.iter().enumerate() {
        sheet.write_string_with_format(0, col as u16, *title, header_format)?;
    }

    for (i, row) in rows.iter().enumerate() {
        let row_num = (i + 1) as u32;
        for (col, cell) in row.iter().enumerate() {
            let col_num = col as u16;
            match cell {
                Cell::Text(s) => {
                    sheet.write_string(row_num, col_num, s)?;
                }
                Cell::Number(d) => match d.to_f64() {
                    Some(n) => {
                        sheet.write_number_with_format(row_num, col_num, n, &formats.number)?;
                    }
                    None => {
                        sheet.write_string(row_num, col_num, d.to_string())?;
                    }
                },
                Cell::Integer(n) => {
                    sheet.write_number_with_format(row_num, col_num, *n as f64, &formats.integer)?;
                }
                Cell::Empty => {}
            }
            widths[col] = widths[col].max(cell.render().chars().count());
        }
    }

    for (col, width) in widths.into_iter().enumerate() {
        let width = width.clamp(config.min_column_width, config.max_column_width);
        sheet.set_column_width(col as u16, width as f64)?;
    }

    sheet.set_freeze_panes(1, 0)?;
    Ok(())
}
