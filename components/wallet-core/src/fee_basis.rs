//! Request/response shapes for fee estimation (spec §4.6.5). Kept separate
//! from `manager/` so `handlers/` can depend on it without a cycle back
//! into the manager module.

use wallet_core_types::{Amount, NetworkFee, TransferAttribute};

/// What the wallet manager hands to the `WalletManagerHandler` vtable when
/// asked to estimate a transfer's fee.
pub struct FeeEstimateRequest {
    pub cookie: u64,
    pub target: String,
    pub amount: Amount,
    pub network_fee: NetworkFee,
    pub attributes: Vec<TransferAttribute>,
}
