use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::cache::fingerprint::Fingerprint;

/// One resumable step of the per-sequence pipeline, in execution order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Stage {
    Extract,
    Detect,
    Recognize,
    Emotions,
    Resolve,
}

impl Stage {
    pub const ALL: &'static [Stage] = &[
        Stage::Extract,
        Stage::Detect,
        Stage::Recognize,
        Stage::Emotions,
        Stage::Resolve,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Extract => "extract",
            Stage::Detect => "detect",
            Stage::Recognize => "recognize",
            Stage::Emotions => "emotions",
            Stage::Resolve => "resolve",
        }
    }

    /// The stages whose outputs `self` reads, followed by `self`.
    pub fn with_prerequisites(self) -> Vec<Stage> {
        match self {
            Stage::Extract => vec![Stage::Extract],
            Stage::Detect => vec![Stage::Extract, Stage::Detect],
            Stage::Recognize => vec![Stage::Extract, Stage::Detect, Stage::Recognize],
            Stage::Emotions => vec![Stage::Extract, Stage::Detect, Stage::Emotions],
            Stage::Resolve => vec![
                Stage::Extract,
                Stage::Detect,
                Stage::Recognize,
                Stage::Resolve,
            ],
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Stage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Stage::ALL
            .iter()
            .copied()
            .find(|stage| stage.as_str() == s)
            .ok_or_else(|| format!("unknown stage '{s}'"))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StageOutcome {
    /// The cache was missing or stale and has been rebuilt.
    Computed,
    /// The cache was current; nothing ran.
    Skipped,
    /// The stage does not apply to this sequence (no annotations, no
    /// emotion model).
    NotApplicable,
}

#[derive(Clone, Debug, PartialEq)]
pub struct StageReport {
    pub stage: Stage,
    pub outcome: StageOutcome,
    /// Fingerprint of the record the stage left behind.
    pub fingerprint: Option<Fingerprint>,
    /// Frames, detections, embeddings or streams, depending on the stage.
    pub items: usize,
}

impl StageReport {
    pub fn not_applicable(stage: Stage) -> Self {
        Self {
            stage,
            outcome: StageOutcome::NotApplicable,
            fingerprint: None,
            items: 0,
        }
    }
}

/// What happened to one sequence during a run.
#[derive(Clone, Debug, PartialEq)]
pub struct SequenceReport {
    pub index: usize,
    pub video: PathBuf,
    pub stages: Vec<StageReport>,
}

impl SequenceReport {
    pub fn outcome_of(&self, stage: Stage) -> Option<StageOutcome> {
        self.stages
            .iter()
            .find(|report| report.stage == stage)
            .map(|report| report.outcome)
    }
}
