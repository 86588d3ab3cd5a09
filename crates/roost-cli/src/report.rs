//! Human-readable and JSON renderings of a load report.

use std::{fmt::Write as _, fs::File, io::BufWriter, path::Path};

use anyhow::Context as _;
use roost_core::{
  model::{Table, TableCounts},
  pipeline::LoadReport,
};

/// Rejections listed individually in the summary; the rest are counted.
const MAX_LISTED: usize = 20;

pub fn summary(report: &LoadReport) -> String {
  let mut out = String::new();
  let _ = writeln!(out, "{:<14} {:>10} {:>10}", "table", "inserted", "rejected");
  for table in Table::ALL {
    let _ = writeln!(
      out,
      "{:<14} {:>10} {:>10}",
      table.name(),
      report.inserted.get(table),
      report.rejected(table)
    );
  }

  let filtered = report.filtered;
  if filtered.listings + filtered.reviews > 0 {
    let _ = writeln!(
      out,
      "\nfiltered by city: {} listings, {} reviews",
      filtered.listings, filtered.reviews
    );
  }

  if !report.rejections.is_empty() {
    let _ = writeln!(out, "\nrejections:");
    for rejection in report.rejections.iter().take(MAX_LISTED) {
      let _ = writeln!(out, "  {rejection}");
    }
    let rest = report.rejections.len().saturating_sub(MAX_LISTED);
    if rest > 0 {
      let _ = writeln!(out, "  … and {rest} more");
    }
  }
  out
}

pub fn counts(counts: &TableCounts) -> String {
  let mut out = String::new();
  for table in Table::ALL {
    let _ = writeln!(out, "{:<14} {:>10}", table.name(), counts.get(table));
  }
  out
}

/// Write the full report, every rejection included, as pretty JSON.
pub fn write_json(path: &Path, report: &LoadReport) -> anyhow::Result<()> {
  let file = File::create(path)
    .with_context(|| format!("failed to create {}", path.display()))?;
  serde_json::to_writer_pretty(BufWriter::new(file), report)
    .with_context(|| format!("failed to write report to {}", path.display()))?;
  Ok(())
}

#[cfg(test)]
mod tests {
  use roost_core::{Rejection, Violation, pipeline::FilterSummary};

  use super::*;

  fn rejection(position: usize) -> Rejection {
    Rejection {
      table: Table::Host,
      position,
      record: Some(position as i64),
      violation: Violation::DuplicateKey {
        constraint: "dim_hosts.host_id",
        value:      position.to_string(),
      },
    }
  }

  #[test]
  fn summary_lists_counts_and_rejections() {
    let report = LoadReport {
      inserted:   TableCounts { dates: 3, hosts: 1, listings: 0, reviews: 0 },
      rejections: vec![rejection(1)],
      filtered:   FilterSummary { listings: 2, reviews: 5 },
    };
    let text = summary(&report);
    assert!(text.contains(&format!("{:<14} {:>10} {:>10}", "dim_date", 3, 0)), "{text}");
    assert!(text.contains(&format!("{:<14} {:>10} {:>10}", "dim_hosts", 1, 1)), "{text}");
    assert!(text.contains("filtered by city: 2 listings, 5 reviews"));
    assert!(text.contains("duplicate dim_hosts.host_id:1"));
  }

  #[test]
  fn summary_truncates_long_rejection_lists() {
    let report = LoadReport {
      rejections: (0..25).map(rejection).collect(),
      ..LoadReport::default()
    };
    let text = summary(&report);
    assert!(text.contains("… and 5 more"));
    assert!(!text.contains("record #24"));
  }

  #[test]
  fn json_report_keeps_violation_kinds() {
    let report = LoadReport { rejections: vec![rejection(0)], ..LoadReport::default() };
    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["rejections"][0]["violation"]["kind"], "duplicate_key");
    assert_eq!(json["rejections"][0]["table"], "dim_hosts");
  }
}
