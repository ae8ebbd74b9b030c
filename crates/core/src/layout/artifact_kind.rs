use std::fmt;
use std::str::FromStr;

use crate::layout::sequence_layout::LayoutError;

/// Kind of per-sequence artifact directory.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ArtifactKind {
    /// Extracted frames. The directory name is `videos` for compatibility
    /// with existing output trees.
    Frames,
    Detections,
    Landmarks,
    Segmentations,
    Emotions,
    Reconstructions,
    /// Only available in single-video catalogs.
    Results,
}

impl ArtifactKind {
    pub const ALL: &[ArtifactKind] = &[
        ArtifactKind::Frames,
        ArtifactKind::Detections,
        ArtifactKind::Landmarks,
        ArtifactKind::Segmentations,
        ArtifactKind::Emotions,
        ArtifactKind::Reconstructions,
        ArtifactKind::Results,
    ];

    pub fn dir_name(self) -> &'static str {
        match self {
            ArtifactKind::Frames => "videos",
            ArtifactKind::Detections => "detections",
            ArtifactKind::Landmarks => "landmarks",
            ArtifactKind::Segmentations => "segmentations",
            ArtifactKind::Emotions => "emotions",
            ArtifactKind::Reconstructions => "reconstructions",
            ArtifactKind::Results => "results",
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

impl FromStr for ArtifactKind {
    type Err = LayoutError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ArtifactKind::ALL
            .iter()
            .copied()
            .find(|kind| kind.dir_name() == s)
            .ok_or_else(|| LayoutError::InvalidArgument(format!("unknown artifact kind '{s}'")))
    }
}

/// 3D face reconstruction method. `Deca` is the unnamed default.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ReconstructionMethod {
    Deca,
    Emoca,
    Deep3dFace,
}

impl ReconstructionMethod {
    /// Directory component, or `None` for the default method.
    pub fn dir_component(self) -> Option<&'static str> {
        match self {
            ReconstructionMethod::Deca => None,
            ReconstructionMethod::Emoca => Some("emoca"),
            ReconstructionMethod::Deep3dFace => Some("deep3dface"),
        }
    }
}

impl FromStr for ReconstructionMethod {
    type Err = LayoutError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "deca" => Ok(ReconstructionMethod::Deca),
            "emoca" => Ok(ReconstructionMethod::Emoca),
            "deep3dface" => Ok(ReconstructionMethod::Deep3dFace),
            other => Err(LayoutError::InvalidArgument(format!(
                "unknown reconstruction method '{other}'"
            ))),
        }
    }
}
