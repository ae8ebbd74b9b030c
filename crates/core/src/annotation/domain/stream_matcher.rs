use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::annotation::domain::annotation_category::AnnotationValue;
use crate::recognition::domain::cluster_label::ClusterLabel;
use crate::shared::frame::frame_number_prefix;

/// Frames of one annotation stream that line up with detections of the
/// identity the stream was assigned to.
///
/// `discarded` and `not_found` hold 0-based row indices. Every row ends up
/// in exactly one of `rows`, `discarded` or `not_found`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ValidatedAssignment {
    pub label: ClusterLabel,
    pub matched: Vec<PathBuf>,
    pub rows: Vec<AnnotationValue>,
    pub discarded: Vec<usize>,
    pub not_found: Vec<usize>,
}

impl ValidatedAssignment {
    pub fn total_rows(&self) -> usize {
        self.rows.len() + self.discarded.len() + self.not_found.len()
    }
}

/// Pairs every labeled row with a detection of the identity in the same frame.
///
/// `filenames` are the identity's sorted detection paths; a detection
/// belongs to frame `f` when its file name starts with `%06d_`. When a frame
/// has several detections of the identity, the first is taken.
pub fn map_stream_to_identity(
    label: ClusterLabel,
    filenames: &[PathBuf],
    rows: &[AnnotationValue],
) -> ValidatedAssignment {
    let mut by_frame: HashMap<&str, Vec<&PathBuf>> = HashMap::new();
    for path in filenames {
        let prefix = path
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(|n| n.split_once('_'))
            .map(|(prefix, _)| prefix);
        if let Some(prefix) = prefix {
            by_frame.entry(prefix).or_default().push(path);
        }
    }

    let mut assignment = ValidatedAssignment {
        label,
        matched: Vec::new(),
        rows: Vec::new(),
        discarded: Vec::new(),
        not_found: Vec::new(),
    };

    for (i, row) in rows.iter().enumerate() {
        let frame = i + 1;
        if row.is_unlabeled() {
            log::debug!("Frame {frame} is not labeled, skipping");
            assignment.discarded.push(i);
            continue;
        }
        match by_frame.get(frame_number_prefix(frame).as_str()) {
            None => {
                log::debug!("Frame {frame} has no detection of identity {label}");
                assignment.not_found.push(i);
            }
            Some(detections) => {
                if detections.len() > 1 {
                    log::warn!(
                        "Frame {frame} has {} detections of identity {label}, taking the first",
                        detections.len()
                    );
                }
                assignment.matched.push(detections[0].clone());
                assignment.rows.push(row.clone());
            }
        }
    }

    log::info!(
        "Identity {label}: {} matched, {} unlabeled, {} without detection",
        assignment.rows.len(),
        assignment.discarded.len(),
        assignment.not_found.len()
    );
    assignment
}

#[cfg(test)]
mod tests {
    use super::*;

    const ID: ClusterLabel = ClusterLabel::Identity(0);

    fn va(valence: f64, arousal: f64) -> AnnotationValue {
        AnnotationValue::ValenceArousal { valence, arousal }
    }

    fn det(frame: usize, index: usize) -> PathBuf {
        PathBuf::from(format!("VA_Set/detections/Train_Set/118/{frame:06}_{index:03}.png"))
    }

    #[test]
    fn test_unlabeled_row_is_discarded() {
        let rows = vec![va(0.1, 0.2), va(-5.0, -5.0), va(0.3, 0.4)];
        let files = vec![det(1, 0), det(2, 0), det(3, 0)];
        let a = map_stream_to_identity(ID, &files, &rows);

        assert_eq!(a.discarded, vec![1]);
        assert!(!a.matched.contains(&det(2, 0)));
        assert_eq!(a.matched, vec![det(1, 0), det(3, 0)]);
        assert_eq!(a.rows, vec![va(0.1, 0.2), va(0.3, 0.4)]);
    }

    #[test]
    fn test_missing_detection_is_not_found() {
        let rows = vec![AnnotationValue::Expression(2), AnnotationValue::Expression(3)];
        let a = map_stream_to_identity(ID, &[det(2, 0)], &rows);
        assert_eq!(a.not_found, vec![0]);
        assert_eq!(a.matched, vec![det(2, 0)]);
    }

    #[test]
    fn test_multiple_detections_take_the_first() {
        let rows = vec![AnnotationValue::Expression(4)];
        let files = vec![det(1, 0), det(1, 1)];
        let a = map_stream_to_identity(ID, &files, &rows);
        assert_eq!(a.matched, vec![det(1, 0)]);
    }

    #[test]
    fn test_frame_prefix_is_exact() {
        // frame 1 must not match frame 10 or 100001
        let rows = vec![AnnotationValue::Expression(1)];
        let files = vec![det(10, 0), det(100001, 0)];
        let a = map_stream_to_identity(ID, &files, &rows);
        assert_eq!(a.not_found, vec![0]);
    }

    #[test]
    fn test_accounting_identity() {
        let mut rows = Vec::new();
        let mut files = Vec::new();
        for i in 0..50 {
            rows.push(match i % 5 {
                0 => va(-5.0, 0.0),
                _ => va(0.0, 0.0),
            });
            if i % 3 != 0 {
                files.push(det(i + 1, 0));
            }
        }
        let a = map_stream_to_identity(ID, &files, &rows);
        assert_eq!(a.total_rows(), rows.len());
        assert_eq!(a.matched.len(), a.rows.len());
    }

    #[test]
    fn test_matches_are_in_frame_order() {
        let rows = vec![AnnotationValue::Expression(0); 4];
        let files = vec![det(4, 0), det(2, 0), det(1, 0)];
        let a = map_stream_to_identity(ID, &files, &rows);
        assert_eq!(a.matched, vec![det(1, 0), det(2, 0), det(4, 0)]);
        assert_eq!(a.not_found, vec![2]);
    }
}
