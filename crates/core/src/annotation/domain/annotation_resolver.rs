//! Assigns annotation streams to identity clusters.
//!
//! The dataset does not say which person an annotation file belongs to, so
//! the assignment is inferred from cluster populations and, when two people
//! are annotated or one of two is, from their horizontal position in the
//! frame.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::annotation::domain::annotation_stream::{AnnotationStream, Side, StreamSuffix};
use crate::annotation::domain::assignment_case::AssignmentCase;
use crate::annotation::domain::population_ranking::PopulationRanking;
use crate::annotation::domain::stream_matcher::{map_stream_to_identity, ValidatedAssignment};
use crate::detection::domain::detection::Detection;
use crate::recognition::domain::cluster_label::ClusterLabel;
use crate::recognition::domain::identity_cluster::IdentityCluster;

#[derive(Error, Debug)]
pub enum ResolveError {
    #[error("unsupported annotation category '{0}'")]
    UnsupportedCategory(String),
    #[error("failed to read annotations from {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("malformed annotation in {path} at row {row}: {reason}")]
    MalformedAnnotation {
        path: PathBuf,
        row: usize,
        reason: String,
    },
    #[error("no identity clusters to assign annotations to")]
    NoIdentities,
    #[error("identities {labels:?} share the top population {population}; cannot tell which one is annotated")]
    AmbiguousMostFrequent {
        population: usize,
        labels: Vec<ClusterLabel>,
    },
    #[error("identities {labels:?} share the runner-up population {population}")]
    AmbiguousSecond {
        population: usize,
        labels: Vec<ClusterLabel>,
    },
    #[error("a second identity is required but only one was found")]
    NoSecondIdentity,
    #[error("identities {first} and {second} have the same horizontal position; cannot tell left from right")]
    SpatialTie {
        first: ClusterLabel,
        second: ClusterLabel,
    },
    #[error("identity {label} for stream '{stream}' is not on the {side:?} of the main identity")]
    SideMismatch {
        stream: String,
        label: ClusterLabel,
        side: Side,
    },
    #[error("unsupported annotation stream pattern {0:?}")]
    UnsupportedPattern(Vec<String>),
    #[error("{0} is in the recognition record but not in the detections record")]
    OutOfSync(PathBuf),
    #[error("identity {0} has no detections")]
    EmptyCluster(ClusterLabel),
}

/// Detection centers keyed by normalised detection path.
pub struct DetectionCenters {
    centers: HashMap<PathBuf, [f64; 2]>,
}

impl DetectionCenters {
    pub fn new(detections: &[Detection]) -> Self {
        Self {
            centers: detections
                .iter()
                .map(|d| (d.path.clone(), d.center))
                .collect(),
        }
    }

    pub fn center_of(&self, path: &Path) -> Result<[f64; 2], ResolveError> {
        self.centers
            .get(path)
            .copied()
            .ok_or_else(|| ResolveError::OutOfSync(path.to_path_buf()))
    }
}

/// Resolves every stream of one sequence to an identity and matches its rows.
///
/// Returns a map from stream name to its validated assignment. Any
/// ambiguity the rules cannot break is an error; nothing is guessed.
pub fn resolve_streams(
    clusters: &BTreeMap<ClusterLabel, IdentityCluster>,
    centers: &DetectionCenters,
    streams: &[AnnotationStream],
) -> Result<BTreeMap<String, ValidatedAssignment>, ResolveError> {
    let mut ordered: Vec<&AnnotationStream> = streams.iter().collect();
    ordered.sort_by(|a, b| a.suffix.cmp(&b.suffix).then_with(|| a.name.cmp(&b.name)));
    let suffixes: Vec<&StreamSuffix> = ordered.iter().map(|s| &s.suffix).collect();
    let case = AssignmentCase::classify(&suffixes)?;
    let ranking = PopulationRanking::from_clusters(clusters);
    let resolver = Resolver { clusters, centers };
    log::debug!("Resolving {} stream(s) as {case:?}", ordered.len());

    let pairs: Vec<(&AnnotationStream, ClusterLabel)> = match case {
        AssignmentCase::Single => vec![(ordered[0], ranking.unique_most_frequent()?)],
        AssignmentCase::OneSided(side) => {
            // Only one person is annotated, so the dominant identity must be unique.
            let main = ranking.unique_most_frequent()?;
            let other = ranking.second_most_frequent()?;
            let (left, right) = resolver.order_left_right(other, main)?;
            let label = match side {
                Side::Left => left,
                Side::Right => right,
            };
            vec![(ordered[0], label)]
        }
        AssignmentCase::MainWithSide(side) => {
            let main = ranking.unique_most_frequent()?;
            let other = ranking.second_most_frequent()?;
            let ordering = resolver.compare_x(other, main)?;
            let consistent = match side {
                Side::Left => ordering == Ordering::Less,
                Side::Right => ordering == Ordering::Greater,
            };
            if !consistent {
                return Err(ResolveError::SideMismatch {
                    stream: ordered[1].name.clone(),
                    label: other,
                    side,
                });
            }
            vec![(ordered[0], main), (ordered[1], other)]
        }
        AssignmentCase::LeftRight => {
            let (first, second) = ranking.top_two()?;
            let (left, right) = resolver.order_left_right(first, second)?;
            vec![(ordered[0], left), (ordered[1], right)]
        }
    };

    let mut assignments = BTreeMap::new();
    for (stream, label) in pairs {
        let cluster = resolver.cluster(label)?;
        log::info!("Assigning stream '{}' to identity {label}", stream.name);
        let assignment = map_stream_to_identity(label, &cluster.filenames, &stream.rows);
        assignments.insert(stream.name.clone(), assignment);
    }
    Ok(assignments)
}

struct Resolver<'a> {
    clusters: &'a BTreeMap<ClusterLabel, IdentityCluster>,
    centers: &'a DetectionCenters,
}

impl Resolver<'_> {
    fn cluster(&self, label: ClusterLabel) -> Result<&IdentityCluster, ResolveError> {
        self.clusters
            .get(&label)
            .ok_or(ResolveError::EmptyCluster(label))
    }

    /// Horizontal center of the identity's first detection.
    fn anchor_x(&self, label: ClusterLabel) -> Result<f64, ResolveError> {
        let first = self
            .cluster(label)?
            .first_filename()
            .ok_or(ResolveError::EmptyCluster(label))?;
        Ok(self.centers.center_of(first)?[0])
    }

    fn compare_x(&self, a: ClusterLabel, b: ClusterLabel) -> Result<Ordering, ResolveError> {
        let (xa, xb) = (self.anchor_x(a)?, self.anchor_x(b)?);
        match xa.partial_cmp(&xb) {
            Some(Ordering::Equal) | None => Err(ResolveError::SpatialTie {
                first: a,
                second: b,
            }),
            Some(ordering) => Ok(ordering),
        }
    }

    fn order_left_right(
        &self,
        a: ClusterLabel,
        b: ClusterLabel,
    ) -> Result<(ClusterLabel, ClusterLabel), ResolveError> {
        match self.compare_x(a, b)? {
            Ordering::Less => Ok((a, b)),
            _ => {
                log::debug!("Swapping left and right: {b} is left of {a}");
                Ok((b, a))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotation::domain::annotation_category::AnnotationValue;

    fn id(n: u32) -> ClusterLabel {
        ClusterLabel::Identity(n)
    }

    fn det_path(label: ClusterLabel, frame: usize) -> PathBuf {
        let slot = match label {
            ClusterLabel::Noise => 9,
            ClusterLabel::Identity(n) => n as usize,
        };
        PathBuf::from(format!("E/detections/S/v/{frame:06}_{slot:03}.png"))
    }

    /// Clusters with the given populations; every member of a cluster sits at
    /// horizontal position `x`, one detection per frame starting at frame 1.
    struct Fixture {
        clusters: BTreeMap<ClusterLabel, IdentityCluster>,
        detections: Vec<Detection>,
    }

    fn fixture(populations: &[(ClusterLabel, usize, f64)]) -> Fixture {
        let mut clusters = BTreeMap::new();
        let mut detections = Vec::new();
        let mut index = 0;
        for &(label, population, x) in populations {
            let filenames: Vec<PathBuf> = (1..=population).map(|f| det_path(label, f)).collect();
            for (f, path) in filenames.iter().enumerate() {
                detections.push(Detection {
                    frame: f + 1,
                    center: [x, 100.0],
                    size: 50.0,
                    path: path.clone(),
                    landmark_path: path.with_extension("json"),
                });
            }
            clusters.insert(
                label,
                IdentityCluster {
                    label,
                    indices: (index..index + population).collect(),
                    mean: vec![],
                    covariance: vec![],
                    filenames,
                },
            );
            index += population;
        }
        Fixture {
            clusters,
            detections,
        }
    }

    fn stream(name: &str, suffix: StreamSuffix, frames: usize) -> AnnotationStream {
        AnnotationStream {
            name: name.to_string(),
            suffix,
            rows: vec![AnnotationValue::Expression(3); frames],
        }
    }

    fn resolve(
        f: &Fixture,
        streams: &[AnnotationStream],
    ) -> Result<BTreeMap<String, ValidatedAssignment>, ResolveError> {
        resolve_streams(&f.clusters, &DetectionCenters::new(&f.detections), streams)
    }

    // --- Single stream ---

    #[test]
    fn test_single_stream_takes_most_populous() {
        let f = fixture(&[(id(0), 5, 10.0), (id(1), 30, 50.0)]);
        let out = resolve(&f, &[stream("118", StreamSuffix::Unsuffixed, 40)]).unwrap();
        let a = &out["118"];
        assert_eq!(a.label, id(1));
        assert_eq!(a.rows.len(), 30);
        assert_eq!(a.not_found, (30..40).collect::<Vec<_>>());
        assert_eq!(a.total_rows(), 40);
    }

    #[test]
    fn test_single_stream_tie_is_fatal() {
        let f = fixture(&[(id(0), 30, 10.0), (id(1), 30, 50.0)]);
        let err = resolve(&f, &[stream("118", StreamSuffix::Unsuffixed, 10)]).unwrap_err();
        assert!(matches!(err, ResolveError::AmbiguousMostFrequent { .. }));
    }

    #[test]
    fn test_noise_is_never_assigned() {
        let f = fixture(&[(ClusterLabel::Noise, 100, 10.0), (id(0), 25, 50.0)]);
        let out = resolve(&f, &[stream("118", StreamSuffix::Unsuffixed, 10)]).unwrap();
        assert_eq!(out["118"].label, id(0));
    }

    // --- Left and right ---

    #[test]
    fn test_left_right_by_horizontal_position() {
        let f = fixture(&[(id(0), 30, 10.0), (id(1), 25, 50.0)]);
        let out = resolve(
            &f,
            &[
                stream("118_right", StreamSuffix::Right, 5),
                stream("118_left", StreamSuffix::Left, 5),
            ],
        )
        .unwrap();
        assert_eq!(out["118_left"].label, id(0));
        assert_eq!(out["118_right"].label, id(1));
    }

    #[test]
    fn test_left_right_swaps_when_positions_reversed() {
        let f = fixture(&[(id(0), 30, 50.0), (id(1), 25, 10.0)]);
        let out = resolve(
            &f,
            &[
                stream("118_left", StreamSuffix::Left, 5),
                stream("118_right", StreamSuffix::Right, 5),
            ],
        )
        .unwrap();
        assert_eq!(out["118_left"].label, id(1));
        assert_eq!(out["118_right"].label, id(0));
    }

    #[test]
    fn test_left_right_equal_x_is_fatal() {
        let f = fixture(&[(id(0), 30, 20.0), (id(1), 25, 20.0)]);
        let err = resolve(
            &f,
            &[
                stream("118_left", StreamSuffix::Left, 5),
                stream("118_right", StreamSuffix::Right, 5),
            ],
        )
        .unwrap_err();
        assert!(matches!(err, ResolveError::SpatialTie { .. }));
    }

    #[test]
    fn test_left_right_with_tied_populations() {
        let f = fixture(&[(id(0), 30, 50.0), (id(1), 30, 10.0)]);
        let out = resolve(
            &f,
            &[
                stream("118_left", StreamSuffix::Left, 5),
                stream("118_right", StreamSuffix::Right, 5),
            ],
        )
        .unwrap();
        assert_eq!(out["118_left"].label, id(1));
        assert_eq!(out["118_right"].label, id(0));
    }

    // --- One sided ---

    #[test]
    fn test_one_sided_picks_matching_side() {
        let f = fixture(&[(id(0), 30, 80.0), (id(1), 25, 10.0)]);
        let out = resolve(&f, &[stream("118_left", StreamSuffix::Left, 5)]).unwrap();
        assert_eq!(out["118_left"].label, id(1));

        let out = resolve(&f, &[stream("118_right", StreamSuffix::Right, 5)]).unwrap();
        assert_eq!(out["118_right"].label, id(0));
    }

    #[test]
    fn test_one_sided_with_tied_populations_is_fatal() {
        let f = fixture(&[(id(0), 30, 80.0), (id(1), 30, 10.0)]);
        let err = resolve(&f, &[stream("118_right", StreamSuffix::Right, 5)]).unwrap_err();
        assert!(matches!(err, ResolveError::AmbiguousMostFrequent { population: 30, .. }));
    }

    #[test]
    fn test_one_sided_uses_unique_runner_up() {
        let f = fixture(&[(id(0), 40, 80.0), (id(1), 20, 10.0), (id(2), 5, 40.0)]);
        let out = resolve(&f, &[stream("118_left", StreamSuffix::Left, 5)]).unwrap();
        assert_eq!(out["118_left"].label, id(1));
    }

    #[test]
    fn test_one_sided_without_second_identity_is_fatal() {
        let f = fixture(&[(id(0), 30, 80.0)]);
        let err = resolve(&f, &[stream("118_left", StreamSuffix::Left, 5)]).unwrap_err();
        assert!(matches!(err, ResolveError::NoSecondIdentity));
    }

    // --- Main plus side ---

    #[test]
    fn test_main_with_consistent_side() {
        let f = fixture(&[(id(0), 40, 80.0), (id(1), 25, 10.0)]);
        let out = resolve(
            &f,
            &[
                stream("118_left", StreamSuffix::Left, 5),
                stream("118", StreamSuffix::Unsuffixed, 5),
            ],
        )
        .unwrap();
        assert_eq!(out["118"].label, id(0));
        assert_eq!(out["118_left"].label, id(1));
    }

    #[test]
    fn test_main_with_inconsistent_side_is_fatal() {
        let f = fixture(&[(id(0), 40, 10.0), (id(1), 25, 80.0)]);
        let err = resolve(
            &f,
            &[
                stream("118", StreamSuffix::Unsuffixed, 5),
                stream("118_left", StreamSuffix::Left, 5),
            ],
        )
        .unwrap_err();
        assert!(matches!(err, ResolveError::SideMismatch { .. }));
    }

    // --- Failures ---

    #[test]
    fn test_unsupported_pattern() {
        let f = fixture(&[(id(0), 40, 10.0), (id(1), 25, 80.0)]);
        let err = resolve(
            &f,
            &[
                stream("118", StreamSuffix::Unsuffixed, 5),
                stream("118_left", StreamSuffix::Left, 5),
                stream("118_right", StreamSuffix::Right, 5),
            ],
        )
        .unwrap_err();
        assert!(matches!(err, ResolveError::UnsupportedPattern(_)));
    }

    #[test]
    fn test_missing_detection_is_out_of_sync() {
        let mut f = fixture(&[(id(0), 30, 10.0), (id(1), 25, 50.0)]);
        f.detections.retain(|d| d.path != det_path(id(1), 1));
        let err = resolve(
            &f,
            &[
                stream("118_left", StreamSuffix::Left, 5),
                stream("118_right", StreamSuffix::Right, 5),
            ],
        )
        .unwrap_err();
        assert!(matches!(err, ResolveError::OutOfSync(p) if p == det_path(id(1), 1)));
    }

    #[test]
    fn test_unlabeled_rows_are_discarded_per_stream() {
        let f = fixture(&[(id(0), 10, 10.0)]);
        let mut s = stream("118", StreamSuffix::Unsuffixed, 10);
        s.rows[3] = AnnotationValue::Expression(-1);
        let out = resolve(&f, &[s]).unwrap();
        assert_eq!(out["118"].discarded, vec![3]);
        assert!(!out["118"].matched.contains(&det_path(id(0), 4)));
        assert_eq!(out["118"].total_rows(), 10);
    }
}
