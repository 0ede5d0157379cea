//! Console stats report.

use chrono::Utc;
use comfy_table::{presets::UTF8_FULL, Cell, Color, Table};
use flux_metrics::MetricsSnapshot;
use flux_sink::SinkMetrics;
use std::collections::BTreeMap;

/// Render one report: throughput summary, per-stream rows and per-sink rows.
pub fn format_report(snapshot: &MetricsSnapshot, sinks: &BTreeMap<String, SinkMetrics>) -> String {
    let mut output = String::new();

    output.push_str(&format!(
        "DataFlux stats at {} (tick {})\n",
        Utc::now().format("%Y-%m-%d %H:%M:%S UTC"),
        snapshot.tick
    ));

    let mut summary = Table::new();
    summary.load_preset(UTF8_FULL);
    summary.set_header(vec![
        "Elapsed",
        "Rolling EPS",
        "Global EPS",
        "Rolling MB/s",
        "Global MB/s",
        "Total Events",
        "Total Data",
    ]);
    summary.add_row(vec![
        Cell::new(format_duration(snapshot.elapsed_secs)),
        Cell::new(format!("{:.1}", snapshot.rolling_eps)),
        Cell::new(format!("{:.1}", snapshot.global_eps)),
        Cell::new(format!("{:.3}", snapshot.rolling_mb_per_sec())),
        Cell::new(format!("{:.3}", snapshot.global_mb_per_sec())),
        Cell::new(format_number(snapshot.total_events)),
        Cell::new(format!("{:.2} MB", snapshot.total_mb())),
    ]);
    output.push_str(&summary.to_string());
    output.push('\n');

    if !snapshot.streams.is_empty() {
        let mut streams = Table::new();
        streams.load_preset(UTF8_FULL);
        streams.set_header(vec!["Stream", "Events", "% Total", "MB/s"]);
        // Snapshot streams are already sorted by count, highest first
        for stream in &snapshot.streams {
            streams.add_row(vec![
                Cell::new(&stream.name),
                Cell::new(format_number(stream.events)),
                Cell::new(format!("{:.1}%", stream.percent)),
                Cell::new(format!("{:.3}", stream.mb_per_sec)),
            ]);
        }
        output.push_str(&streams.to_string());
        output.push('\n');
    }

    if !sinks.is_empty() {
        let mut table = Table::new();
        table.load_preset(UTF8_FULL);
        table.set_header(vec!["Sink", "Success", "Fail", "Flushes", "Mean Latency"]);
        for (name, metrics) in sinks {
            let fail_cell = if metrics.fail_count > 0 {
                Cell::new(format_number(metrics.fail_count)).fg(Color::Red)
            } else {
                Cell::new(format_number(metrics.fail_count)).fg(Color::Green)
            };
            table.add_row(vec![
                Cell::new(name),
                Cell::new(format_number(metrics.success_count)),
                fail_cell,
                Cell::new(format_number(metrics.flushes)),
                Cell::new(format!("{:.2} ms", metrics.mean_latency_ms)),
            ]);
        }
        output.push_str(&table.to_string());
        output.push('\n');
    }

    output
}

/// Format duration in human-readable format.
pub fn format_duration(secs: f64) -> String {
    if secs < 60.0 {
        format!("{secs:.1}s")
    } else if secs < 3600.0 {
        let mins = (secs / 60.0).floor();
        let remaining_secs = secs - (mins * 60.0);
        format!("{}m {:02.0}s", mins as u64, remaining_secs.floor())
    } else {
        let hours = (secs / 3600.0).floor();
        let mins = ((secs - hours * 3600.0) / 60.0).floor();
        format!("{}h {:02}m", hours as u64, mins as u64)
    }
}

/// Format number with thousands separators.
pub fn format_number(n: u64) -> String {
    let digits = n.to_string();
    let mut result = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }
    result
}
