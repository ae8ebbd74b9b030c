use crate::recognition::domain::cluster_label::ClusterLabel;
use crate::recognition::domain::identity_cluster::ClusteringError;

/// Assigns every embedding of a sequence to an identity or to noise.
///
/// Implementations must be deterministic: the same embeddings in the same
/// order always yield the same labels.
pub trait IdentityClusterer {
    fn cluster(&self, embeddings: &[Vec<f32>]) -> Result<Vec<ClusterLabel>, ClusteringError>;
}
