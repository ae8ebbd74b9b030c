use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use ndarray::{Array2, Axis};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::recognition::domain::cluster_label::ClusterLabel;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClusteringError {
    #[error("embedding {index} has {found} dimensions, expected {expected}")]
    DimensionMismatch {
        index: usize,
        expected: usize,
        found: usize,
    },
    #[error("{labels} labels for {embeddings} embeddings and {filenames} file names")]
    LengthMismatch {
        labels: usize,
        embeddings: usize,
        filenames: usize,
    },
}

/// Statistics of one label over a sequence's embeddings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IdentityCluster {
    pub label: ClusterLabel,
    /// Indices into the embedding array, ascending.
    pub indices: Vec<usize>,
    pub mean: Vec<f64>,
    /// Sample covariance; all zeros for a single-member cluster.
    pub covariance: Vec<Vec<f64>>,
    /// Normalised detection paths, sorted.
    pub filenames: Vec<PathBuf>,
}

impl IdentityCluster {
    pub fn population(&self) -> usize {
        self.indices.len()
    }

    pub fn first_filename(&self) -> Option<&Path> {
        self.filenames.first().map(PathBuf::as_path)
    }
}

/// Groups embeddings by label and computes per-label mean and covariance.
///
/// `labels`, `embeddings` and `filenames` are co-indexed.
pub fn build_clusters(
    labels: &[ClusterLabel],
    embeddings: &[Vec<f32>],
    filenames: &[PathBuf],
) -> Result<BTreeMap<ClusterLabel, IdentityCluster>, ClusteringError> {
    if labels.len() != embeddings.len() || labels.len() != filenames.len() {
        return Err(ClusteringError::LengthMismatch {
            labels: labels.len(),
            embeddings: embeddings.len(),
            filenames: filenames.len(),
        });
    }
    check_dimensions(embeddings)?;

    let mut members: BTreeMap<ClusterLabel, Vec<usize>> = BTreeMap::new();
    for (i, label) in labels.iter().enumerate() {
        members.entry(*label).or_default().push(i);
    }

    let dim = embeddings.first().map_or(0, Vec::len);
    let clusters = members
        .into_iter()
        .map(|(label, indices)| {
            let n = indices.len();
            let data = Array2::from_shape_fn((n, dim), |(r, c)| embeddings[indices[r]][c] as f64);
            let mean = data
                .mean_axis(Axis(0))
                .unwrap_or_else(|| ndarray::Array1::zeros(dim));
            let covariance = if n > 1 {
                let centered = &data - &mean;
                centered.t().dot(&centered) / (n as f64 - 1.0)
            } else {
                Array2::zeros((dim, dim))
            };
            let mut names: Vec<PathBuf> = indices.iter().map(|&i| filenames[i].clone()).collect();
            names.sort();

            let cluster = IdentityCluster {
                label,
                indices,
                mean: mean.to_vec(),
                covariance: covariance.outer_iter().map(|row| row.to_vec()).collect(),
                filenames: names,
            };
            (label, cluster)
        })
        .collect();
    Ok(clusters)
}

/// A label is a valid identity iff it is not noise and has at least
/// `min_occurrences` members.
pub fn classify(
    clusters: &BTreeMap<ClusterLabel, IdentityCluster>,
    min_occurrences: usize,
) -> BTreeMap<ClusterLabel, bool> {
    clusters
        .iter()
        .map(|(label, cluster)| {
            (
                *label,
                !label.is_noise() && cluster.population() >= min_occurrences,
            )
        })
        .collect()
}

pub fn check_dimensions(embeddings: &[Vec<f32>]) -> Result<(), ClusteringError> {
    let Some(expected) = embeddings.first().map(Vec::len) else {
        return Ok(());
    };
    match embeddings.iter().position(|e| e.len() != expected) {
        Some(index) => Err(ClusteringError::DimensionMismatch {
            index,
            expected,
            found: embeddings[index].len(),
        }),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const A: ClusterLabel = ClusterLabel::Identity(0);
    const B: ClusterLabel = ClusterLabel::Identity(1);

    fn names(n: usize) -> Vec<PathBuf> {
        (0..n)
            .rev()
            .map(|i| PathBuf::from(format!("d/{:06}_000.png", i + 1)))
            .collect()
    }

    #[test]
    fn test_mean_and_covariance() {
        let labels = vec![A, A, A];
        let embeddings = vec![vec![1.0, 0.0], vec![3.0, 0.0], vec![5.0, 0.0]];
        let clusters = build_clusters(&labels, &embeddings, &names(3)).unwrap();
        let c = &clusters[&A];

        assert_eq!(c.indices, vec![0, 1, 2]);
        assert_relative_eq!(c.mean[0], 3.0);
        assert_relative_eq!(c.mean[1], 0.0);
        // sample variance of 1, 3, 5
        assert_relative_eq!(c.covariance[0][0], 4.0);
        assert_relative_eq!(c.covariance[0][1], 0.0);
        assert_relative_eq!(c.covariance[1][1], 0.0);
    }

    #[test]
    fn test_single_member_covariance_is_zero() {
        let clusters = build_clusters(&[B], &[vec![0.5, 0.25]], &names(1)).unwrap();
        assert_eq!(clusters[&B].covariance, vec![vec![0.0, 0.0], vec![0.0, 0.0]]);
    }

    #[test]
    fn test_filenames_are_sorted() {
        let labels = vec![A, A, A];
        let embeddings = vec![vec![0.0]; 3];
        let clusters = build_clusters(&labels, &embeddings, &names(3)).unwrap();
        let files = &clusters[&A].filenames;
        assert!(files.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(
            clusters[&A].first_filename(),
            Some(Path::new("d/000001_000.png"))
        );
    }

    #[test]
    fn test_every_label_gets_a_cluster() {
        let labels = vec![A, ClusterLabel::Noise, B, A];
        let embeddings = vec![vec![0.0]; 4];
        let clusters = build_clusters(&labels, &embeddings, &names(4)).unwrap();
        assert_eq!(
            clusters.keys().copied().collect::<Vec<_>>(),
            vec![ClusterLabel::Noise, A, B]
        );
        assert_eq!(clusters[&A].indices, vec![0, 3]);
    }

    #[test]
    fn test_length_mismatch() {
        let err = build_clusters(&[A], &[vec![0.0], vec![1.0]], &names(2)).unwrap_err();
        assert!(matches!(err, ClusteringError::LengthMismatch { .. }));
    }

    #[test]
    fn test_dimension_mismatch() {
        let err = check_dimensions(&[vec![0.0, 1.0], vec![0.0]]).unwrap_err();
        assert_eq!(
            err,
            ClusteringError::DimensionMismatch {
                index: 1,
                expected: 2,
                found: 1
            }
        );
    }

    #[test]
    fn test_classify_threshold_and_noise() {
        let mut labels = vec![A; 20];
        labels.extend(vec![B; 19]);
        labels.extend(vec![ClusterLabel::Noise; 25]);
        let embeddings = vec![vec![0.0]; labels.len()];
        let clusters = build_clusters(&labels, &embeddings, &names(labels.len())).unwrap();

        let valid = classify(&clusters, 20);
        assert!(valid[&A]);
        assert!(!valid[&B]);
        assert!(!valid[&ClusterLabel::Noise]);
    }
}
