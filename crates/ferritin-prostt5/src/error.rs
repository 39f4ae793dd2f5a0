use thiserror::Error;

/// Reasons a single prediction produced no 3Di string.
///
/// None of these are fatal to the process; [`crate::ProstT5::predict`]
/// reports every variant as an empty result.
#[derive(Debug, Error)]
pub enum PredictError {
    #[error("vocabulary has no token for unknown residues ('X' or '<unk>')")]
    UnresolvedUnknownToken,

    #[error("encoder pass failed: {0:#}")]
    Encode(#[source] anyhow::Error),

    #[error("runtime produced no score buffer")]
    MissingScores,

    #[error("score buffer holds {len} values, expected at least {expected}")]
    ScoreBufferTooShort { len: usize, expected: usize },
}
