use crate::{Amount, Uids};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransferDirection {
    Sent,
    Received,
    Recovered,
}

/// Typed submission error (spec §7, `TransferSubmitError`).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransferSubmitError {
    Unknown,
    Posix(i32),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferAttribute {
    pub key: String,
    pub value: Option<String>,
    pub required: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransferAttributeValidationError {
    /// A required attribute has no value.
    RequiredButNotProvided(String),
    /// A chain-specific handler rejected the attribute's value shape.
    MismatchedType(String),
    /// Aggregate of the above, surfaced to the wallet caller.
    RelationshipInconsistency,
}

/// Fields recorded only once a transfer has reached [`TransferState::Included`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IncludedInfo {
    pub block_number: u64,
    pub block_index: u64,
    pub block_timestamp: u64,
    pub confirmed_fee_basis: Option<FeeBasis>,
    pub success: bool,
    pub error: Option<String>,
}

impl PartialEq for IncludedInfo {
    fn eq(&self, other: &Self) -> bool {
        self.block_number == other.block_number
            && self.block_index == other.block_index
            && self.block_timestamp == other.block_timestamp
            && self.confirmed_fee_basis == other.confirmed_fee_basis
            && self.success == other.success
    }
}

/// Opaque chain-specific (price-per-cost-factor, cost-factor) pair from
/// which a fee amount can be computed (GLOSSARY: Fee-basis).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FeeBasis {
    pub price_per_cost_factor: u128,
    pub cost_factor: u64,
}

impl FeeBasis {
    pub fn fee(&self) -> u128 {
        self.price_per_cost_factor.saturating_mul(self.cost_factor as u128)
    }
}

impl PartialEq for FeeBasis {
    fn eq(&self, other: &Self) -> bool {
        self.price_per_cost_factor == other.price_per_cost_factor
            && self.cost_factor == other.cost_factor
    }
}

/// Transfer state machine (spec §4.5). Equality considers all
/// included-state fields; `SetState` in wallet-core is idempotent on this
/// equality (spec, Testable Properties §8).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum TransferState {
    Created,
    Signed,
    Submitted,
    Included(IncludedInfo),
    Errored(TransferSubmitError),
    Deleted,
}

impl PartialEq for TransferState {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (TransferState::Created, TransferState::Created) => true,
            (TransferState::Signed, TransferState::Signed) => true,
            (TransferState::Submitted, TransferState::Submitted) => true,
            (TransferState::Included(a), TransferState::Included(b)) => a == b,
            (TransferState::Errored(a), TransferState::Errored(b)) => a == b,
            (TransferState::Deleted, TransferState::Deleted) => true,
            _ => false,
        }
    }
}
impl Eq for TransferState {}

impl TransferState {
    pub fn as_tag(&self) -> &'static str {
        match self {
            TransferState::Created => "created",
            TransferState::Signed => "signed",
            TransferState::Submitted => "submitted",
            TransferState::Included(_) => "included",
            TransferState::Errored(_) => "errored",
            TransferState::Deleted => "deleted",
        }
    }
}

/// A transfer's full public record, decoupled from the wallet-core
/// `Transfer` handle so this shared crate stays free of locking/ownership
/// concerns; `wallet-core::transfer::Transfer` wraps one of these behind a
/// mutex plus the handler vtable pointer (spec §4.5).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TransferRecord {
    pub identifier: Option<Uids>,
    pub originating_transaction_id: Option<String>,
    pub source: String,
    pub target: String,
    pub amount: Amount,
    pub direction: TransferDirection,
    pub fee_unit: crate::Unit,
    pub estimated_fee_basis: Option<FeeBasis>,
    pub state: TransferState,
    pub attributes: Vec<TransferAttribute>,
}

impl TransferRecord {
    /// Net signed contribution of this transfer to a wallet's balance,
    /// before fee adjustment (spec §4.5 balance algorithm): `+recv, -sent,
    /// 0 recovered`.
    pub fn signed_amount(&self) -> i128 {
        let magnitude = self.amount.as_base_units() as i128;
        match self.direction {
            TransferDirection::Received => magnitude,
            TransferDirection::Sent => -magnitude,
            TransferDirection::Recovered => 0,
        }
    }
}

/// Ordering key for sorting/compare (spec §4.5): `(block_number,
/// block_transaction_index, transfer_index, uids)`. Both-unincluded
/// transfers fall back to an externally supplied tiebreaker (pointer
/// identity in the source; here the caller passes a stable fallback, e.g.
/// insertion index, since Rust values have no stable address to compare).
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct TransferOrderingKey {
    pub block_number: u64,
    pub block_transaction_index: u64,
    pub transfer_index: u64,
    pub uids: Option<Uids>,
    pub fallback_tiebreak: u64,
}

impl TransferOrderingKey {
    /// An uninlcuded transfer sorts *greater than* an included one (spec
    /// §4.5): uninlcuded transfers get `u64::MAX` sentinels for the
    /// block-position fields, which dominate the derived field-by-field
    /// `Ord` ahead of any real included transfer.
    pub fn for_record(record: &TransferRecord, fallback_tiebreak: u64) -> Self {
        match &record.state {
            TransferState::Included(info) => TransferOrderingKey {
                block_number: info.block_number,
                block_transaction_index: info.block_index,
                transfer_index: 0,
                uids: record.identifier.clone(),
                fallback_tiebreak,
            },
            _ => TransferOrderingKey {
                block_number: u64::MAX,
                block_transaction_index: u64::MAX,
                transfer_index: u64::MAX,
                uids: record.identifier.clone(),
                fallback_tiebreak,
            },
        }
    }
}
