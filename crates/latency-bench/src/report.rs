//! Report rendering for a completed run.
//!
//! Text goes out in the classic per-sample listing followed by the summary
//! lines; JSON carries the same data as one object for scripting.

use latency_common::config::{ReportFormat, TransportKind};
use latency_common::state::{ProtocolVariant, Role};
use latency_common::stats::SampleSummary;
use serde::Serialize;
use std::io::{self, Write};

/// Everything printed about one run.
#[derive(Debug, Serialize)]
pub struct RunReport<'a> {
    /// Which side produced the samples.
    pub role: Role,
    /// Transport the run used.
    pub transport: TransportKind,
    /// Wire protocol variant.
    pub variant: ProtocolVariant,
    /// Number of iterations, including the initial one.
    pub iterations: usize,
    /// Every sample in iteration order.
    pub samples: &'a [u64],
    /// Statistics over the retained samples.
    pub summary: SampleSummary,
}

/// Write `report` to `out` in the requested format.
///
/// # Errors
///
/// Returns any error from the underlying writer.
pub fn render<W: Write>(out: &mut W, format: ReportFormat, report: &RunReport<'_>) -> io::Result<()> {
    match format {
        ReportFormat::Text => render_text(out, report),
        ReportFormat::Json => render_json(out, report),
    }
}

fn render_text<W: Write>(out: &mut W, report: &RunReport<'_>) -> io::Result<()> {
    for (i, cycles) in report.samples.iter().enumerate().skip(1) {
        writeln!(out, "{i:4}: {cycles}")?;
    }

    let s = &report.summary;
    writeln!(out, "initial: {}", s.initial)?;
    writeln!(out, "min: {}", s.min)?;
    writeln!(out, "max: {}", s.max)?;
    writeln!(out, "median: {}", s.median)?;
    writeln!(out, "mean: {:.6}", s.mean)?;
    writeln!(out, "stddev: {:.6}", s.stddev)?;
    for (p, cycles) in &s.percentiles {
        writeln!(out, "p{p}: {cycles}")?;
    }
    out.flush()
}

fn render_json<W: Write>(out: &mut W, report: &RunReport<'_>) -> io::Result<()> {
    serde_json::to_writer_pretty(&mut *out, report)?;
    writeln!(out)?;
    out.flush()
}
