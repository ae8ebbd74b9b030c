//! Density-based clustering of face embeddings (DBSCAN, Euclidean metric).
//!
//! Neighbourhoods include the point itself and use an inclusive radius. A
//! point with at least `min_samples` neighbours is a core point. Clusters
//! are numbered in the order their first core point appears; a border
//! point joins the first cluster that reaches it.

use crate::recognition::domain::cluster_label::ClusterLabel;
use crate::recognition::domain::identity_cluster::{check_dimensions, ClusteringError};
use crate::recognition::domain::identity_clusterer::IdentityClusterer;

pub struct DbscanClusterer {
    eps: f64,
    min_samples: usize,
}

impl DbscanClusterer {
    pub fn new(eps: f64, min_samples: usize) -> Self {
        Self { eps, min_samples }
    }

    fn within_eps(&self, a: &[f32], b: &[f32]) -> bool {
        squared_distance(a, b) <= self.eps * self.eps
    }

    /// Neighbour count of every point, the point itself included.
    fn neighbor_counts(&self, embeddings: &[Vec<f32>]) -> Vec<usize> {
        let n = embeddings.len();
        let mut counts = vec![1; n];
        for i in 0..n {
            for j in (i + 1)..n {
                if self.within_eps(&embeddings[i], &embeddings[j]) {
                    counts[i] += 1;
                    counts[j] += 1;
                }
            }
        }
        counts
    }
}

impl IdentityClusterer for DbscanClusterer {
    fn cluster(&self, embeddings: &[Vec<f32>]) -> Result<Vec<ClusterLabel>, ClusteringError> {
        check_dimensions(embeddings)?;
        let is_core: Vec<bool> = self
            .neighbor_counts(embeddings)
            .into_iter()
            .map(|count| count >= self.min_samples)
            .collect();

        let mut labels = vec![ClusterLabel::Noise; embeddings.len()];
        let mut queued = vec![false; embeddings.len()];
        let mut next_label = 0u32;
        let mut stack = Vec::new();

        for start in 0..embeddings.len() {
            if !labels[start].is_noise() || !is_core[start] {
                continue;
            }
            let label = ClusterLabel::Identity(next_label);
            queued[start] = true;
            stack.push(start);
            while let Some(current) = stack.pop() {
                labels[current] = label;
                if !is_core[current] {
                    continue;
                }
                for (v, embedding) in embeddings.iter().enumerate() {
                    if labels[v].is_noise()
                        && !queued[v]
                        && self.within_eps(&embeddings[current], embedding)
                    {
                        queued[v] = true;
                        stack.push(v);
                    }
                }
            }
            next_label += 1;
        }

        log::debug!(
            "DBSCAN(eps={}, min_samples={}) found {} clusters in {} embeddings",
            self.eps,
            self.min_samples,
            next_label,
            embeddings.len()
        );
        Ok(labels)
    }
}

fn squared_distance(a: &[f32], b: &[f32]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(x, y)| {
            let d = *x as f64 - *y as f64;
            d * d
        })
        .sum()
}
