use std::collections::BTreeMap;

use crate::annotation::domain::annotation_resolver::ResolveError;
use crate::recognition::domain::cluster_label::ClusterLabel;
use crate::recognition::domain::identity_cluster::IdentityCluster;

/// Identity labels grouped by cluster population, most populous first.
/// Labels sharing a population are kept in ascending order. Noise is excluded.
#[derive(Clone, Debug, PartialEq)]
pub struct PopulationRanking {
    buckets: Vec<(usize, Vec<ClusterLabel>)>,
}

impl PopulationRanking {
    pub fn from_clusters(clusters: &BTreeMap<ClusterLabel, IdentityCluster>) -> Self {
        let mut by_population: BTreeMap<usize, Vec<ClusterLabel>> = BTreeMap::new();
        for (label, cluster) in clusters {
            if label.is_noise() {
                continue;
            }
            by_population
                .entry(cluster.population())
                .or_default()
                .push(*label);
        }
        let buckets = by_population
            .into_iter()
            .rev()
            .map(|(population, mut labels)| {
                labels.sort();
                (population, labels)
            })
            .collect();
        Self { buckets }
    }

    pub fn buckets(&self) -> &[(usize, Vec<ClusterLabel>)] {
        &self.buckets
    }

    /// The most populous identity, which must not share its population.
    pub fn unique_most_frequent(&self) -> Result<ClusterLabel, ResolveError> {
        let (population, labels) = self.top()?;
        match labels.as_slice() {
            [label] => Ok(*label),
            _ => Err(ResolveError::AmbiguousMostFrequent {
                population: *population,
                labels: labels.clone(),
            }),
        }
    }

    /// The first of the most populous identities (ties broken by label).
    pub fn most_frequent(&self) -> Result<ClusterLabel, ResolveError> {
        let (_, labels) = self.top()?;
        labels.first().copied().ok_or(ResolveError::NoIdentities)
    }

    /// Tie-break rule for the runner-up identity.
    ///
    /// If exactly two labels share the top population the second of them is
    /// the runner-up. More than two is ambiguous. Otherwise the next
    /// population bucket must hold exactly one label.
    pub fn second_most_frequent(&self) -> Result<ClusterLabel, ResolveError> {
        let (population, labels) = self.top()?;
        match labels.len() {
            2 => Ok(labels[1]),
            1 => match self.buckets.get(1) {
                Some((_, next)) if next.len() == 1 => Ok(next[0]),
                Some((next_population, next)) => Err(ResolveError::AmbiguousSecond {
                    population: *next_population,
                    labels: next.clone(),
                }),
                None => Err(ResolveError::NoSecondIdentity),
            },
            _ => Err(ResolveError::AmbiguousMostFrequent {
                population: *population,
                labels: labels.clone(),
            }),
        }
    }

    /// The two most populous identities, first and runner-up.
    pub fn top_two(&self) -> Result<(ClusterLabel, ClusterLabel), ResolveError> {
        Ok((self.most_frequent()?, self.second_most_frequent()?))
    }

    fn top(&self) -> Result<&(usize, Vec<ClusterLabel>), ResolveError> {
        self.buckets.first().ok_or(ResolveError::NoIdentities)
    }
}
