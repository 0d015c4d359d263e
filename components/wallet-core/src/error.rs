use wallet_core_types::{DisconnectReason, TransferAttributeValidationError, TransferSubmitError};

/// Typed error kinds the spec calls out (§7). Invariant violations that
/// indicate a coding bug (a supported chain missing a handler group) are
/// `debug_assert!`ed in debug builds and surfaced as `Unsupported` in
/// release, per spec §7's policy.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("account blob checksum mismatch")]
    SerializationChecksumFail,
    #[error("account blob version {found} does not match current version {expected}")]
    SerializationVersionMismatch { found: u16, expected: u16 },
    #[error("account blob truncated: need at least {needed} bytes, found {found}")]
    SerializationTruncated { needed: usize, found: usize },
    #[error("account blob declared total_size {declared} does not match actual length {actual}")]
    SerializationSizeMismatch { declared: u32, actual: usize },
    #[error("sub-account field rejected its bytes: {0}")]
    SerializationFieldInvalid(String),
    #[error("wordlist must contain exactly {expected} words, found {found}")]
    InvalidWordlist { expected: usize, found: usize },
    #[error("invalid BIP-39 phrase: {0}")]
    InvalidMnemonic(String),
    #[error("sub-account derivation failed for {chain:?}: {message}")]
    SubAccountDerivation {
        chain: wallet_core_types::Chain,
        message: String,
    },
    #[error("transfer submission failed: {0:?}")]
    TransferSubmit(TransferSubmitError),
    #[error("transfer attribute validation failed: {0:?}")]
    TransferAttributeValidation(TransferAttributeValidationError),
    #[error("wallet sweep failed: {0:?}")]
    WalletSweeperStatus(SweeperStatus),
    #[error("file service error ({kind:?}): {message}")]
    FileService {
        kind: FileServiceErrorKind,
        message: String,
    },
    #[error("wallet manager disconnected: {0:?}")]
    Disconnect(DisconnectReason),
    #[error("chain {0:?} does not support this operation")]
    Unsupported(wallet_core_types::Chain),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweeperStatus {
    InvalidArgs,
    InvalidKey,
    UnsupportedCurrency,
    InsufficientFunds,
    NoTransfersFound,
    UnableToSweep,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileServiceErrorKind {
    /// Unresolvable bug in this crate's own file-service usage.
    Impl,
    /// I/O errno surfaced from the filesystem.
    Unix,
    /// Bytes on disk didn't parse back into an entity.
    Entity,
    /// The underlying storage subsystem itself reported an error.
    Sdb,
}
