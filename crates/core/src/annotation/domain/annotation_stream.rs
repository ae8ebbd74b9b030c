use std::fmt;

use crate::annotation::domain::annotation_category::AnnotationValue;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Side {
    Left,
    Right,
}

/// Positional marker carried by an annotation file name after the video stem.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum StreamSuffix {
    Unsuffixed,
    Left,
    Right,
    Other(String),
}

impl StreamSuffix {
    pub fn parse(remainder: &str) -> Self {
        match remainder {
            "" => StreamSuffix::Unsuffixed,
            "_left" => StreamSuffix::Left,
            "_right" => StreamSuffix::Right,
            other => StreamSuffix::Other(other.to_string()),
        }
    }

    pub fn side(&self) -> Option<Side> {
        match self {
            StreamSuffix::Left => Some(Side::Left),
            StreamSuffix::Right => Some(Side::Right),
            _ => None,
        }
    }
}

impl fmt::Display for StreamSuffix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamSuffix::Unsuffixed => f.write_str("\"\""),
            StreamSuffix::Left => f.write_str("_left"),
            StreamSuffix::Right => f.write_str("_right"),
            StreamSuffix::Other(s) => f.write_str(s),
        }
    }
}

/// A parsed annotation file. Row `i` annotates frame `i + 1`.
#[derive(Clone, Debug, PartialEq)]
pub struct AnnotationStream {
    /// File stem, used as the key of the validated assignment.
    pub name: String,
    pub suffix: StreamSuffix,
    pub rows: Vec<AnnotationValue>,
}

/// Suffix of an annotation stem belonging to the video with `video_stem`,
/// or `None` if the annotation belongs to another video.
pub fn stream_suffix(video_stem: &str, annotation_stem: &str) -> Option<StreamSuffix> {
    annotation_stem
        .strip_prefix(video_stem)
        .map(StreamSuffix::parse)
}
