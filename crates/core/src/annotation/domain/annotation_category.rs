use std::fmt;

use serde::{Deserialize, Serialize};

use crate::annotation::domain::annotation_resolver::ResolveError;

/// Kind of ground-truth track, decided by the sequence's category directory.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AnnotationCategory {
    /// Two float channels in [-1, 1]; -5 on either channel marks an unlabeled frame.
    ValenceArousal,
    /// One of seven expression classes; -1 marks an unlabeled frame.
    Expression,
    /// Eight binary action units; any -1 marks an unlabeled frame.
    ActionUnits,
}

const VA_UNLABELED: f64 = -5.0;
const CLASS_UNLABELED: i32 = -1;

pub const ACTION_UNIT_COUNT: usize = 8;

impl AnnotationCategory {
    /// Accepts either the dataset directory name (`VA_Set`) or the short tag (`va`).
    pub fn from_category_dir(name: &str) -> Result<Self, ResolveError> {
        match name {
            "VA_Set" | "va" => Ok(AnnotationCategory::ValenceArousal),
            "Expression_Set" | "expr7" => Ok(AnnotationCategory::Expression),
            "AU_Set" | "au8" => Ok(AnnotationCategory::ActionUnits),
            other => Err(ResolveError::UnsupportedCategory(other.to_string())),
        }
    }

    pub fn tag(self) -> &'static str {
        match self {
            AnnotationCategory::ValenceArousal => "va",
            AnnotationCategory::Expression => "expr7",
            AnnotationCategory::ActionUnits => "au8",
        }
    }

    pub fn column_count(self) -> usize {
        match self {
            AnnotationCategory::ValenceArousal => 2,
            AnnotationCategory::Expression => 1,
            AnnotationCategory::ActionUnits => ACTION_UNIT_COUNT,
        }
    }
}

impl fmt::Display for AnnotationCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// One row of an annotation file.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum AnnotationValue {
    ValenceArousal { valence: f64, arousal: f64 },
    Expression(i32),
    ActionUnits([i32; ACTION_UNIT_COUNT]),
}

impl AnnotationValue {
    pub fn category(&self) -> AnnotationCategory {
        match self {
            AnnotationValue::ValenceArousal { .. } => AnnotationCategory::ValenceArousal,
            AnnotationValue::Expression(_) => AnnotationCategory::Expression,
            AnnotationValue::ActionUnits(_) => AnnotationCategory::ActionUnits,
        }
    }

    /// True if the row carries the category's "not labeled" sentinel.
    pub fn is_unlabeled(&self) -> bool {
        match self {
            AnnotationValue::ValenceArousal { valence, arousal } => {
                *valence == VA_UNLABELED || *arousal == VA_UNLABELED
            }
            AnnotationValue::Expression(class) => *class == CLASS_UNLABELED,
            AnnotationValue::ActionUnits(units) => units.contains(&CLASS_UNLABELED),
        }
    }
}
