//! Rendering of search and run reports as text or JSON

use std::fmt::Write as _;
use std::time::Duration;

use chrono::{DateTime, Utc};
use clap::ValueEnum;
use loadscout_core::{PassCriteria, RunMetrics, Verdict};
use loadscout_engine::{SearchReport, SearchStep};
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

/// Result of the `run` subcommand: one timed run at a fixed rate.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub clients: usize,
    pub target_rate: f64,
    pub criteria: PassCriteria,
    pub metrics: RunMetrics,
    pub verdict: Verdict,
}

fn millis(duration: Duration) -> f64 {
    duration.as_nanos() as f64 / 1_000_000.0
}

#[derive(Debug, Serialize)]
struct CriteriaView {
    max_error_rate: f64,
    max_avg_latency_ms: f64,
}

impl From<&PassCriteria> for CriteriaView {
    fn from(criteria: &PassCriteria) -> Self {
        Self {
            max_error_rate: criteria.max_error_rate,
            max_avg_latency_ms: millis(criteria.max_average_latency),
        }
    }
}

#[derive(Debug, Serialize)]
struct MetricsView<'a> {
    total_requests: usize,
    successful_calls: usize,
    failed_calls: usize,
    transport_failures: usize,
    protocol_failures: usize,
    aborted_calls: usize,
    error_rate: f64,
    duration_ms: f64,
    requests_per_sec: f64,
    min_latency_ms: f64,
    avg_latency_ms: f64,
    max_latency_ms: f64,
    p50_latency_ms: f64,
    p95_latency_ms: f64,
    p99_latency_ms: f64,
    sample_errors: &'a [String],
}

impl<'a> From<&'a RunMetrics> for MetricsView<'a> {
    fn from(m: &'a RunMetrics) -> Self {
        Self {
            total_requests: m.total_requests,
            successful_calls: m.successful_calls,
            failed_calls: m.failed_calls,
            transport_failures: m.transport_failures,
            protocol_failures: m.protocol_failures,
            aborted_calls: m.aborted_calls,
            error_rate: m.error_rate(),
            duration_ms: millis(m.total_duration),
            requests_per_sec: m.requests_per_sec,
            min_latency_ms: millis(m.min_latency),
            avg_latency_ms: millis(m.average_latency),
            max_latency_ms: millis(m.max_latency),
            p50_latency_ms: millis(m.p50_latency),
            p95_latency_ms: millis(m.p95_latency),
            p99_latency_ms: millis(m.p99_latency),
            sample_errors: &m.sample_errors,
        }
    }
}

#[derive(Debug, Serialize)]
struct StepView<'a> {
    iteration: usize,
    candidate: usize,
    low: usize,
    high: usize,
    passed: bool,
    failures: &'a [String],
    metrics: MetricsView<'a>,
}

impl<'a> From<&'a SearchStep> for StepView<'a> {
    fn from(step: &'a SearchStep) -> Self {
        Self {
            iteration: step.iteration,
            candidate: step.candidate,
            low: step.bounds.low,
            high: step.bounds.high,
            passed: step.verdict.passed(),
            failures: &step.verdict.failures,
            metrics: MetricsView::from(&step.metrics),
        }
    }
}

#[derive(Debug, Serialize)]
struct SearchReportView<'a> {
    run_id: Uuid,
    started_at: DateTime<Utc>,
    min_candidate: usize,
    max_candidate: usize,
    criteria: CriteriaView,
    max_population: usize,
    iterations: usize,
    confirmed: Option<bool>,
    elapsed_ms: f64,
    steps: Vec<StepView<'a>>,
    confirmations: Vec<StepView<'a>>,
}

#[derive(Debug, Serialize)]
struct RunReportView<'a> {
    run_id: Uuid,
    started_at: DateTime<Utc>,
    clients: usize,
    target_rate: f64,
    criteria: CriteriaView,
    passed: bool,
    failures: &'a [String],
    metrics: MetricsView<'a>,
}

pub fn render_search(report: &SearchReport, format: OutputFormat) -> serde_json::Result<String> {
    match format {
        OutputFormat::Text => Ok(search_text(report)),
        OutputFormat::Json => serde_json::to_string_pretty(&SearchReportView {
            run_id: report.run_id,
            started_at: report.started_at,
            min_candidate: report.min_candidate,
            max_candidate: report.max_candidate,
            criteria: CriteriaView::from(&report.criteria),
            max_population: report.max_population,
            iterations: report.iterations(),
            confirmed: report.confirmed,
            elapsed_ms: millis(report.elapsed),
            steps: report.steps.iter().map(StepView::from).collect(),
            confirmations: report.confirmations.iter().map(StepView::from).collect(),
        }),
    }
}

pub fn render_run(report: &RunReport, format: OutputFormat) -> serde_json::Result<String> {
    match format {
        OutputFormat::Text => Ok(run_text(report)),
        OutputFormat::Json => serde_json::to_string_pretty(&RunReportView {
            run_id: report.run_id,
            started_at: report.started_at,
            clients: report.clients,
            target_rate: report.target_rate,
            criteria: CriteriaView::from(&report.criteria),
            passed: report.verdict.passed(),
            failures: &report.verdict.failures,
            metrics: MetricsView::from(&report.metrics),
        }),
    }
}

fn pass_label(passed: bool) -> &'static str {
    if passed {
        "PASS"
    } else {
        "FAIL"
    }
}

fn metrics_text(out: &mut String, m: &RunMetrics) {
    let _ = writeln!(
        out,
        "  Requests: {} total, {} ok, {} failed ({:.2}% errors)",
        m.total_requests,
        m.successful_calls,
        m.failed_calls,
        m.error_rate() * 100.0
    );
    if m.failed_calls > 0 {
        let _ = writeln!(
            out,
            "  Failures: {} transport, {} protocol, {} aborted",
            m.transport_failures, m.protocol_failures, m.aborted_calls
        );
    }
    let _ = writeln!(
        out,
        "  Throughput: {:.1} req/s over {:.2}s",
        m.requests_per_sec,
        m.total_duration.as_secs_f64()
    );
    if m.has_latency() {
        let _ = writeln!(
            out,
            "  Latency: min {:.2}ms, avg {:.2}ms, max {:.2}ms, p95 {:.2}ms, p99 {:.2}ms",
            millis(m.min_latency),
            millis(m.average_latency),
            millis(m.max_latency),
            millis(m.p95_latency),
            millis(m.p99_latency)
        );
    }
    for error in &m.sample_errors {
        let _ = writeln!(out, "    - {error}");
    }
}

fn search_text(report: &SearchReport) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "Capacity search {}", report.run_id);
    let _ = writeln!(out, "  Started: {}", report.started_at.to_rfc3339());
    let _ = writeln!(
        out,
        "  Range: [{}, {}], max error rate {:.2}%, max avg latency {:.0}ms",
        report.min_candidate,
        report.max_candidate,
        report.criteria.max_error_rate * 100.0,
        millis(report.criteria.max_average_latency)
    );
    out.push('\n');

    for step in report.steps.iter().chain(&report.confirmations) {
        let _ = writeln!(
            out,
            "[{}] {} clients (bounds {}..={}): {}",
            step.iteration,
            step.candidate,
            step.bounds.low,
            step.bounds.high,
            pass_label(step.verdict.passed())
        );
        if !step.verdict.passed() {
            let _ = writeln!(out, "  Reason: {}", step.verdict.summary());
        }
        metrics_text(&mut out, &step.metrics);
    }

    out.push('\n');
    let _ = writeln!(out, "Max population: {}", report.max_population);
    let _ = writeln!(out, "Iterations: {}", report.iterations());
    match report.confirmed {
        Some(true) => {
            let _ = writeln!(out, "Confirmation: passed");
        }
        Some(false) => {
            let _ = writeln!(
                out,
                "Confirmation: FAILED (target did not behave monotonically; result is unreliable)"
            );
        }
        None => {}
    }
    let _ = writeln!(out, "Elapsed: {:.2}s", report.elapsed.as_secs_f64());

    out
}

fn run_text(report: &RunReport) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "Load run {}", report.run_id);
    let _ = writeln!(out, "  Started: {}", report.started_at.to_rfc3339());
    let _ = writeln!(
        out,
        "  Clients: {}, target rate {:.1} req/s",
        report.clients, report.target_rate
    );
    metrics_text(&mut out, &report.metrics);
    let _ = writeln!(out, "Result: {}", pass_label(report.verdict.passed()));
    if !report.verdict.passed() {
        let _ = writeln!(out, "  Reason: {}", report.verdict.summary());
    }

    out
}
