//! Per-size ranking and the console/markdown summary.
//!
//! The advisory notes are fixed copy and never look at measured data.

use std::fmt::Write;

use serde::{Deserialize, Serialize};

use crate::suite::BenchmarkRecord;

/// Shown in a time cell when the candidate has no valid result.
pub const UNAVAILABLE: &str = "-";

pub const NO_WINNER: &str = "N/A";

pub const ADVISORY_NOTES: &[&str] = &[
    "Compiled backends are typically fastest for large JSON processing",
    "The in-process reference is quick to iterate on but not tuned for throughput",
    "Memory figures for external executables reflect the harness process, not the child",
    "External executable times include up to 1 ms of exit-polling latency",
    "Memory usage varies significantly between implementations",
];

pub const RECOMMENDATIONS: &[&str] = &[
    "For small files (<10MB): any backend is fine",
    "For large files (>50MB): prefer the fastest compiled backend",
    "Re-run on a quiet machine before drawing conclusions; these are single-shot timings",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedCandidate {
    pub candidate: String,
    pub processing_time: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportRow {
    pub size_mb: u32,
    /// One entry per report column; `None` for errors or missing runs.
    pub times: Vec<Option<f64>>,
    /// Valid results, fastest first.
    pub ranking: Vec<RankedCandidate>,
    /// Candidates listed for this size but without a valid time.
    pub unranked: Vec<String>,
    pub winner: Option<String>,
}

impl ReportRow {
    pub fn winner_label(&self) -> &str {
        self.winner.as_deref().unwrap_or(NO_WINNER)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    /// Candidate names in first-seen order.
    pub candidates: Vec<String>,
    pub rows: Vec<ReportRow>,
}

impl Report {
    pub fn from_records(records: &[BenchmarkRecord]) -> Self {
        let mut candidates: Vec<String> = Vec::new();
        for run in records.iter().flat_map(|r| &r.results) {
            if !candidates.contains(&run.candidate) {
                candidates.push(run.candidate.clone());
            }
        }

        let rows = records
            .iter()
            .map(|record| {
                let times = candidates
                    .iter()
                    .map(|name| record.result(name).and_then(|r| r.processing_time()))
                    .collect();

                let mut ranking: Vec<RankedCandidate> = record
                    .results
                    .iter()
                    .filter_map(|run| {
                        run.result.processing_time().map(|t| RankedCandidate {
                            candidate: run.candidate.clone(),
                            processing_time: t,
                        })
                    })
                    .collect();
                ranking.sort_by(|a, b| a.processing_time.total_cmp(&b.processing_time));

                let unranked = record
                    .results
                    .iter()
                    .filter(|run| !run.result.is_success())
                    .map(|run| run.candidate.clone())
                    .collect();

                ReportRow {
                    size_mb: record.size_mb,
                    times,
                    winner: ranking.first().map(|r| r.candidate.clone()),
                    ranking,
                    unranked,
                }
            })
            .collect();

        Report { candidates, rows }
    }

    /// Plain-text table: size, one time column per candidate, winner.
    pub fn render_table(&self) -> String {
        let headers: Vec<String> = self.candidates.iter().map(|c| format!("{c} (s)")).collect();
        let widths: Vec<usize> = headers.iter().map(|h| h.len().max(10) + 2).collect();
        let total = 10 + widths.iter().sum::<usize>() + 10;

        let mut out = String::new();
        let _ = write!(out, "{:<10}", "Size (MB)");
        for (h, &w) in headers.iter().zip(&widths) {
            let _ = write!(out, "{h:<w$}");
        }
        let _ = writeln!(out, "{:<10}", "Winner");
        let _ = writeln!(out, "{}", "-".repeat(total));

        for row in &self.rows {
            let _ = write!(out, "{:<10}", row.size_mb);
            for (t, &w) in row.times.iter().zip(&widths) {
                let _ = write!(out, "{:<w$}", format_time(*t));
            }
            let _ = writeln!(out, "{:<10}", row.winner_label());
        }

        out
    }

    pub fn render_markdown(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "# Benchmark Summary");
        let _ = writeln!(out);

        let _ = write!(out, "| Size (MB) |");
        for c in &self.candidates {
            let _ = write!(out, " {c} (s) |");
        }
        let _ = writeln!(out, " Winner |");
        let _ = write!(out, "|-----------|");
        for _ in &self.candidates {
            let _ = write!(out, "---------|");
        }
        let _ = writeln!(out, "--------|");

        for row in &self.rows {
            let _ = write!(out, "| {} |", row.size_mb);
            for t in &row.times {
                let _ = write!(out, " {} |", format_time(*t));
            }
            let _ = writeln!(out, " {} |", row.winner_label());
        }

        let _ = writeln!(out);
        let _ = writeln!(out, "## Ranking");
        let _ = writeln!(out);
        for row in &self.rows {
            let ranked: Vec<String> = row
                .ranking
                .iter()
                .map(|r| format!("{} ({:.3}s)", r.candidate, r.processing_time))
                .collect();
            let _ = write!(out, "- **{} MB**: {}", row.size_mb, ranked.join(" < "));
            if !row.unranked.is_empty() {
                let _ = write!(out, "; no valid result: {}", row.unranked.join(", "));
            }
            let _ = writeln!(out);
        }

        out
    }
}

fn format_time(t: Option<f64>) -> String {
    match t {
        Some(t) => format!("{t:.3}"),
        None => UNAVAILABLE.to_string(),
    }
}

/// The static notes block printed after the table.
pub fn render_notes() -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Performance insights:");
    for note in ADVISORY_NOTES {
        let _ = writeln!(out, "- {note}");
    }
    let _ = writeln!(out);
    let _ = writeln!(out, "Recommendations:");
    for rec in RECOMMENDATIONS {
        let _ = writeln!(out, "- {rec}");
    }
    out
}
