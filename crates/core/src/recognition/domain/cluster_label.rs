use std::fmt;

use serde::{Deserialize, Serialize};

/// Cluster assignment of one embedding. `Noise` sorts before every identity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ClusterLabel {
    Noise,
    Identity(u32),
}

impl ClusterLabel {
    pub fn is_noise(self) -> bool {
        matches!(self, ClusterLabel::Noise)
    }
}

impl fmt::Display for ClusterLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClusterLabel::Noise => f.write_str("noise"),
            ClusterLabel::Identity(id) => write!(f, "{id}"),
        }
    }
}
