use crate::annotation::domain::annotation_resolver::ResolveError;
use crate::annotation::domain::annotation_stream::{Side, StreamSuffix};

/// How a sequence's annotation streams map onto its dominant identities.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AssignmentCase {
    /// One unsuffixed stream for the single dominant identity.
    Single,
    /// Two dominant identities, only the one on `Side` is annotated.
    OneSided(Side),
    /// An unsuffixed stream for the dominant identity plus one for the
    /// runner-up, which must sit on `Side` of it.
    MainWithSide(Side),
    /// `_left` and `_right` streams for two comparably dominant identities.
    LeftRight,
}

impl AssignmentCase {
    /// `suffixes` must be sorted.
    pub fn classify(suffixes: &[&StreamSuffix]) -> Result<Self, ResolveError> {
        use StreamSuffix::{Left, Right, Unsuffixed};
        match suffixes {
            [Unsuffixed] => Ok(AssignmentCase::Single),
            [s] if s.side().is_some() => Ok(AssignmentCase::OneSided(side_of(s))),
            [Unsuffixed, s] if s.side().is_some() => Ok(AssignmentCase::MainWithSide(side_of(s))),
            [Left, Right] => Ok(AssignmentCase::LeftRight),
            _ => Err(ResolveError::UnsupportedPattern(
                suffixes.iter().map(|s| s.to_string()).collect(),
            )),
        }
    }
}

fn side_of(suffix: &StreamSuffix) -> Side {
    match suffix {
        StreamSuffix::Left => Side::Left,
        _ => Side::Right,
    }
}
