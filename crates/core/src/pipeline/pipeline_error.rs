use std::path::PathBuf;

use thiserror::Error;

use crate::annotation::domain::annotation_resolver::ResolveError;
use crate::cache::record::CacheError;
use crate::catalog::domain::video_catalog::CatalogError;
use crate::layout::sequence_layout::LayoutError;
use crate::pipeline::stage::Stage;
use crate::recognition::domain::identity_cluster::ClusteringError;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Layout(#[from] LayoutError),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error(transparent)]
    Cache(#[from] CacheError),
    #[error(transparent)]
    Clustering(#[from] ClusteringError),
    #[error(transparent)]
    Resolve(#[from] ResolveError),
    #[error("{stage} failed: {source}")]
    Collaborator {
        stage: Stage,
        #[source]
        source: Box<dyn std::error::Error>,
    },
    #[error("{stage} needs the {prerequisite} output of {video}, which does not exist")]
    MissingPrerequisite {
        stage: Stage,
        prerequisite: Stage,
        video: PathBuf,
    },
    #[error("{stage} has to run but no {collaborator} is configured")]
    MissingCollaborator {
        stage: Stage,
        collaborator: &'static str,
    },
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl PipelineError {
    pub(crate) fn collaborator(stage: Stage) -> impl FnOnce(Box<dyn std::error::Error>) -> Self {
        move |source| PipelineError::Collaborator { stage, source }
    }
}
