use thiserror::Error;

/// An error raised when a profile is queried for something it does not contain.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ModelError {
    #[error("unknown sample type '{0}', available: {1}")]
    UnknownSampleType(String, String),
    #[error("profile has no sample types")]
    NoSampleTypes,
    #[error("sample index {0} out of range, profile has {1} sample types")]
    SampleIndexOutOfRange(usize, usize),
    #[error("sample has {actual} values but the profile declares {expected} sample types")]
    ValueCountMismatch { expected: usize, actual: usize },
}
