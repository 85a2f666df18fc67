use thiserror::Error;

/// Failures of the account/instruction codec.
///
/// Every variant is a deterministic function of the input bytes or values, so callers can
/// branch on the kind (retry with another account, treat as fatal, ask the user to fix input).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("buffer too short: need {needed} bytes at offset {offset}, buffer holds {available}")]
    TruncatedBuffer {
        offset: usize,
        needed: usize,
        available: usize,
    },

    #[error("schema mismatch: {0}")]
    SchemaMismatch(&'static str),

    #[error("value does not fit its field: {0}")]
    FieldOverflow(&'static str),

    #[error("invalid encoding: {0}")]
    InvalidEncoding(&'static str),

    #[error("no valid program address found for the given seeds")]
    DerivationExhausted,
}

impl CodecError {
    pub(crate) fn truncated(offset: usize, needed: usize, available: usize) -> Self {
        CodecError::TruncatedBuffer {
            offset,
            needed,
            available,
        }
    }
}

/// Errors surfaced by the read path and transaction assembly, which talk to external
/// collaborators on top of the codec.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error("account {0} not found")]
    AccountNotFound(String),

    #[error("fetch failed: {0}")]
    Fetch(String),

    #[error("transaction submission failed: {0}")]
    Submit(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}
