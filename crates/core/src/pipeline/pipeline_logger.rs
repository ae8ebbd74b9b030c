use std::collections::HashMap;
use std::time::Instant;

use crate::pipeline::stage::{SequenceReport, Stage, StageOutcome};

/// Cross-cutting logger for pipeline orchestration events.
///
/// Use cases report progress through this trait instead of printing, so
/// the CLI can summarise a run and tests can stay silent.
pub trait PipelineLogger: Send {
    /// Report item-level progress within a stage (frames, crops).
    fn progress(&mut self, stage: Stage, current: usize, total: usize);

    /// Record how long a stage took for one sequence.
    fn timing(&mut self, stage: Stage, duration_ms: f64);

    /// Record a point-in-time metric (e.g. detections per frame).
    fn metric(&mut self, name: &str, value: f64);

    /// Log a human-readable status message.
    fn info(&mut self, message: &str);

    /// Called once per sequence after its last stage.
    fn sequence_done(&mut self, _report: &SequenceReport) {}

    /// Emit an end-of-run summary. Default: no-op.
    fn summary(&self) {}
}

/// Silent logger that discards all events.
pub struct NullPipelineLogger;

impl PipelineLogger for NullPipelineLogger {
    fn progress(&mut self, _stage: Stage, _current: usize, _total: usize) {}
    fn timing(&mut self, _stage: Stage, _duration_ms: f64) {}
    fn metric(&mut self, _name: &str, _value: f64) {}
    fn info(&mut self, _message: &str) {}
}

/// CLI-oriented logger that tracks per-stage timing, metrics and stage
/// outcomes, and prints a summary when the run completes.
///
/// Progress output is throttled to every `throttle_items` items.
pub struct StdoutPipelineLogger {
    throttle_items: usize,
    timings: HashMap<Stage, Vec<f64>>,
    metrics: HashMap<String, Vec<f64>>,
    outcomes: HashMap<(Stage, StageOutcome), usize>,
    start_time: Instant,
    sequences: usize,
    messages: Vec<String>,
}

impl StdoutPipelineLogger {
    pub fn new(throttle_items: usize) -> Self {
        Self {
            throttle_items: throttle_items.max(1),
            timings: HashMap::new(),
            metrics: HashMap::new(),
            outcomes: HashMap::new(),
            start_time: Instant::now(),
            sequences: 0,
            messages: Vec::new(),
        }
    }

    /// Returns the formatted summary string, or `None` if no data recorded.
    pub fn summary_string(&self) -> Option<String> {
        if self.timings.is_empty() && self.metrics.is_empty() && self.sequences == 0 {
            return None;
        }

        let elapsed_ms = self.start_time.elapsed().as_secs_f64() * 1000.0;
        let mut lines = vec![format!(
            "Pipeline summary ({} sequences, {:.1}s total):",
            self.sequences,
            elapsed_ms / 1000.0
        )];

        for stage in Stage::ALL {
            let Some(durations) = self.timings.get(stage) else {
                continue;
            };
            let total_ms: f64 = durations.iter().sum();
            let avg_ms = total_ms / durations.len().max(1) as f64;
            let pct = if elapsed_ms > 0.0 {
                total_ms / elapsed_ms * 100.0
            } else {
                0.0
            };
            let computed = self.outcome_count(*stage, StageOutcome::Computed);
            let skipped = self.outcome_count(*stage, StageOutcome::Skipped);
            lines.push(format!(
                "  {:10}: avg {avg_ms:8.1}ms  total {total_ms:9.0}ms  ({pct:4.1}%)  computed {computed}, cached {skipped}",
                stage.as_str()
            ));
        }

        let mut metric_names: Vec<_> = self.metrics.keys().collect();
        metric_names.sort();
        for name in metric_names {
            let values = &self.metrics[name];
            let avg = values.iter().sum::<f64>() / values.len().max(1) as f64;
            lines.push(format!("  {name}: avg {avg:.1}"));
        }

        Some(lines.join("\n"))
    }

    pub fn timings_for(&self, stage: Stage) -> Option<&[f64]> {
        self.timings.get(&stage).map(|v| v.as_slice())
    }

    pub fn metrics_for(&self, name: &str) -> Option<&[f64]> {
        self.metrics.get(name).map(|v| v.as_slice())
    }

    pub fn outcome_count(&self, stage: Stage, outcome: StageOutcome) -> usize {
        self.outcomes.get(&(stage, outcome)).copied().unwrap_or(0)
    }
}

impl Default for StdoutPipelineLogger {
    fn default() -> Self {
        Self::new(100)
    }
}

impl PipelineLogger for StdoutPipelineLogger {
    fn progress(&mut self, stage: Stage, current: usize, total: usize) {
        if total > 0 && (current % self.throttle_items == 0 || current == total) {
            let pct = current as f64 / total as f64 * 100.0;
            log::info!("{stage}: {current}/{total} ({pct:.1}%)");
        }
    }

    fn timing(&mut self, stage: Stage, duration_ms: f64) {
        self.timings.entry(stage).or_default().push(duration_ms);
    }

    fn metric(&mut self, name: &str, value: f64) {
        self.metrics
            .entry(name.to_string())
            .or_default()
            .push(value);
    }

    fn info(&mut self, message: &str) {
        self.messages.push(message.to_string());
        log::info!("{message}");
    }

    fn sequence_done(&mut self, report: &SequenceReport) {
        self.sequences += 1;
        for stage in &report.stages {
            *self.outcomes.entry((stage.stage, stage.outcome)).or_default() += 1;
        }
    }

    fn summary(&self) {
        if let Some(text) = self.summary_string() {
            log::info!("\n\n{text}");
        }
    }
}
