//! Export the review list to CSV.
//!
//! Output is UTF-8 with BOM for Excel compatibility.

use std::io::Write;
use std::path::Path;

use super::report::ReviewRow;

/// Export review rows to a CSV file.
///
/// Columns: Domain, Body_Link, Header_Link
pub fn export_csv(rows: &[ReviewRow], output_path: &Path) -> anyhow::Result<()> {
    let mut file = std::fs::File::create(output_path)?;

    // UTF-8 BOM for Excel
    file.write_all(&[0xEF, 0xBB, 0xBF])?;

    writeln!(file, "Domain,Body_Link,Header_Link")?;

    for row in rows {
        writeln!(
            file,
            "{},{},{}",
            csv_escape(&row.domain),
            csv_escape(row.body_link.as_deref().unwrap_or("")),
            csv_escape(row.header_link.as_deref().unwrap_or("")),
        )?;
    }

    Ok(())
}

/// Escape a value for CSV (RFC 4180).
///
/// Wraps in double quotes if the value contains commas, quotes, or newlines.
fn csv_escape(value: &str) -> String {
    if value.contains(',') || value.contains('"') || value.contains('\n') || value.contains('\r') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}
