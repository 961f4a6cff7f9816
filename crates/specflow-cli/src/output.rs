use serde::Serialize;
use specflow_core::validation::ValidationReport;
use std::path::Path;

pub fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    println!("{}", json);
    Ok(())
}

pub fn print_table(headers: &[&str], rows: Vec<Vec<String>>) {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.len()).collect();
    for row in &rows {
        for (i, cell) in row.iter().enumerate() {
            if i < widths.len() {
                widths[i] = widths[i].max(cell.len());
            }
        }
    }

    let header_row: Vec<String> = headers
        .iter()
        .enumerate()
        .map(|(i, h)| format!("{:width$}", h, width = widths[i]))
        .collect();
    println!("{}", header_row.join("  ").trim_end());

    let sep: Vec<String> = widths.iter().map(|&w| "-".repeat(w)).collect();
    println!("{}", sep.join("  "));

    for row in &rows {
        let cells: Vec<String> = row
            .iter()
            .enumerate()
            .map(|(i, cell)| {
                let w = widths.get(i).copied().unwrap_or(0);
                format!("{:width$}", cell, width = w)
            })
            .collect();
        println!("{}", cells.join("  ").trim_end());
    }
}

/// One row per task in submission order, then a summary line. Targets are
/// shown relative to `root` where possible.
pub fn print_report(root: &Path, report: &ValidationReport) {
    let rows: Vec<Vec<String>> = report
        .outcomes
        .iter()
        .map(|o| {
            let target = o.target.strip_prefix(root).unwrap_or(&o.target);
            vec![
                o.status.as_str().to_uppercase(),
                o.check.clone(),
                target.display().to_string(),
                o.detail.clone().unwrap_or_default(),
            ]
        })
        .collect();
    print_table(&["STATUS", "CHECK", "ARTIFACT", "DETAIL"], rows);

    let c = &report.counts;
    println!();
    println!(
        "{} tasks: {} passed, {} failed, {} errored, {} cancelled",
        report.len(),
        c.pass,
        c.fail,
        c.error,
        c.cancelled
    );
}
