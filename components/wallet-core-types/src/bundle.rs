use crate::Uids;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum BundleStatus {
    Unknown,
    Confirmed,
    Unconfirmed,
}

/// UTXO-style persisted record (spec §3, §4.7). Identity is MD5 over the
/// serialization.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionBundle {
    pub status: BundleStatus,
    pub raw: Vec<u8>,
    pub timestamp: u64,
    pub block_height: u64,
}

/// Account-style persisted record (spec §3, §4.7). Identity is the `uids`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TransferBundle {
    pub status: BundleStatus,
    pub transaction_hash: String,
    pub transaction_id: Option<String>,
    pub uids: Uids,
    pub source: String,
    pub target: String,
    pub amount: String,
    pub currency_code: String,
    pub fee: Option<String>,
    pub transfer_index: u32,
    pub block_timestamp: u64,
    pub block_number: u64,
    pub confirmations: u64,
    pub transaction_index_in_block: u32,
    pub block_hash: String,
    pub attributes: Vec<(String, Option<String>)>,
}

impl TransferBundle {
    /// Version 1 bundles have no explicit `transfer_index`; it is derived
    /// from a `uids` of the form `<network>:<hash>:<index>` (spec §4.7).
    /// Version 2 stores the index explicitly and this helper is a no-op.
    pub fn derive_transfer_index_from_uids(uids: &Uids) -> Option<u32> {
        uids.0.rsplit_once(':').and_then(|(_, idx)| idx.parse().ok())
    }
}

/// A single entry in a currency bundle's denomination list.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DenominationBundle {
    pub name: String,
    pub code: String,
    pub symbol: String,
    pub decimals: u32,
}

/// Descriptor shipped from the remote currency catalogue (spec §3).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CurrencyBundle {
    pub id: Uids,
    pub name: String,
    pub code: String,
    pub currency_type: String,
    pub blockchain_id: String,
    pub contract_address: Option<String>,
    pub verified: bool,
    pub denominations: Vec<DenominationBundle>,
}
