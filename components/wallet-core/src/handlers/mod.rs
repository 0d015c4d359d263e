//! Process-wide static table mapping each [`Chain`] tag to a struct of
//! optional handler groups (spec §4.2). A null group means "not
//! supported"; the core surfaces [`CoreError::Unsupported`] rather than
//! crashing. Handler groups are pure function-pointer-shaped vtables (here:
//! `dyn Trait` objects, since Rust's trait-object dispatch is the idiomatic
//! equivalent and avoids the unsafety of raw function pointers) with no
//! per-call state; the registry itself is built once via [`OnceLock`] and
//! never mutated afterwards (Design Notes §9 -- "no mutation after init").

mod btc;
mod eth;

use std::collections::HashMap;
use std::sync::{Arc, OnceLock, Weak};

use wallet_core_types::{Amount, Chain, NetworkFee, TransferDirection, TransferEvent};

use crate::error::{CoreError, SweeperStatus};
use crate::fee_basis::FeeEstimateRequest;
use crate::transfer::Transfer;

/// Per-chain address parsing/derivation/stringify/compare (spec §4.3).
pub trait AddressHandler: Send + Sync {
    fn parse(&self, text: &str) -> Result<String, String>;
    fn stringify(&self, canonical: &str) -> String {
        canonical.to_string()
    }
}

/// Per-chain network bring-up: e.g. default fee tiers beyond the compiled
/// descriptor table (spec §4.4).
pub trait NetworkHandler: Send + Sync {
    fn validate_address_scheme(&self, scheme: wallet_core_types::AddressScheme) -> bool;
}

/// Per-chain transfer identifier derivation and attribute validation
/// (spec §4.5, §4.3 "Identifier derivation").
pub trait TransferHandler: Send + Sync {
    /// Derives a transfer's identifier from its transaction hash, unless
    /// the chain needs a handler-specific hook (e.g. Hedera, where the
    /// identifier isn't simply the hash).
    fn derive_identifier(&self, network_uids: &str, hash_hex: &str) -> String {
        format!("{network_uids}:{hash_hex}")
    }

    fn validate_attribute(&self, key: &str, value: Option<&str>) -> Result<(), String> {
        let _ = (key, value);
        Ok(())
    }
}

/// Per-chain wallet-level behavior: e.g. whether a transfer's fee-unit is
/// considered compatible with the wallet's balance-unit (spec §4.5).
pub trait WalletHandler: Send + Sync {
    fn fee_unit_compatible(&self, fee_currency: &str, balance_currency: &str) -> bool {
        fee_currency == balance_currency
    }
}

/// Per-chain send/sync dispatch + fee estimation glue (spec §4.6.5).
pub trait WalletManagerHandler: Send + Sync {
    fn estimate_fee(&self, request: &FeeEstimateRequest) -> Result<u128, String>;
}

/// Fee-basis construction from raw (price, cost-factor) chain data.
pub trait FeeBasisHandler: Send + Sync {
    fn cost_factor_for_amount(&self, amount_base_units: u128) -> u64;
}

/// Scans a raw private key for spendable balance and produces an unsigned
/// transfer (original_source `WKWalletSweeper.c`; named in spec §4.2 but
/// not elaborated in spec §3-§4, see SPEC_FULL.md §3).
pub trait SweeperHandler: Send + Sync {
    /// Rejects a key that can't possibly be swept: wrong length for this
    /// chain's curve, or the all-zero/invalid scalar the original rejects
    /// via `cryptoKeyCreateFromStringPrivate` returning `NULL`.
    fn validate_key(&self, raw_key: &[u8]) -> Result<(), SweeperStatus>;

    /// Builds the unsigned sweep transfer moving `balance` from the swept
    /// key's own address to `target` (original_source
    /// `wkWalletSweeperValidate`/`cryptoWalletSweeperCreateTransfer`).
    #[allow(clippy::too_many_arguments)]
    fn build_sweep_transfer(
        &self,
        chain: Chain,
        network_uids: &str,
        listener: Weak<dyn Fn(TransferEvent) + Send + Sync>,
        source: &str,
        target: &str,
        balance: Amount,
    ) -> Result<Arc<Transfer>, SweeperStatus> {
        if balance.is_zero() {
            return Err(SweeperStatus::NoTransfersFound);
        }
        let fee_unit = balance.unit.clone();
        Ok(Transfer::new(
            chain,
            network_uids,
            listener,
            balance.unit.clone(),
            fee_unit,
            None,
            balance.value,
            TransferDirection::Sent,
            source,
            target,
            Vec::new(),
        ))
    }
}

/// Derives a standalone private key + address pair for a currency directly
/// from a BIP-39 phrase, independent of any [`crate::account::Account`]
/// (original_source `WKExportablePaperWallet.c`).
pub trait PaperWalletHandler: Send + Sync {
    fn derive_address(&self, seed: &[u8]) -> Result<String, String>;
}

/// A BIP-70-style payment request (original_source `WKPayment.c`):
/// the network it targets, the fee the payee requires, the list of
/// (address, amount) outputs, and an optional memo (SPEC_FULL.md §3).
#[derive(Debug, Clone)]
pub struct PaymentProtocolRequest {
    pub network_uids: String,
    pub required_fee: NetworkFee,
    pub outputs: Vec<(String, Amount)>,
    pub memo: Option<String>,
}

/// BIP-70-style payment request parsing and transfer construction
/// (original_source `WKPayment.c`).
pub trait PaymentProtocolHandler: Send + Sync {
    fn parse_request(&self, raw: &[u8]) -> Result<PaymentProtocolRequest, String>;

    /// Builds an unsigned outgoing transfer for the request's first output
    /// (SPEC_FULL.md §3: "a handler hook to build a Transfer from it").
    fn build_transfer(
        &self,
        chain: Chain,
        request: &PaymentProtocolRequest,
        listener: Weak<dyn Fn(TransferEvent) + Send + Sync>,
        source: &str,
    ) -> Result<Arc<Transfer>, String> {
        let (target, amount) = request
            .outputs
            .first()
            .ok_or_else(|| "payment request has no outputs".to_string())?;
        Ok(Transfer::new(
            chain,
            request.network_uids.clone(),
            listener,
            amount.unit.clone(),
            amount.unit.clone(),
            None,
            amount.value,
            TransferDirection::Sent,
            source,
            target.clone(),
            Vec::new(),
        ))
    }
}

#[derive(Default)]
pub struct HandlerGroup {
    pub network: Option<Box<dyn NetworkHandler>>,
    pub address: Option<Box<dyn AddressHandler>>,
    pub transfer: Option<Box<dyn TransferHandler>>,
    pub wallet: Option<Box<dyn WalletHandler>>,
    pub wallet_manager: Option<Box<dyn WalletManagerHandler>>,
    pub sweeper: Option<Box<dyn SweeperHandler>>,
    pub paper_wallet: Option<Box<dyn PaperWalletHandler>>,
    pub payment_protocol: Option<Box<dyn PaymentProtocolHandler>>,
    pub fee_basis: Option<Box<dyn FeeBasisHandler>>,
}

pub struct HandlerRegistry {
    groups: HashMap<Chain, HandlerGroup>,
}

impl HandlerRegistry {
    fn bootstrap() -> Self {
        let mut groups = HashMap::new();
        groups.insert(Chain::Btc, btc::handler_group());
        groups.insert(Chain::Bch, btc::handler_group());
        groups.insert(Chain::Bsv, btc::handler_group());
        groups.insert(Chain::Ltc, btc::handler_group());
        groups.insert(Chain::Doge, btc::handler_group());
        groups.insert(Chain::Eth, eth::handler_group());
        groups.insert(Chain::Avax, eth::handler_group());
        HandlerRegistry { groups }
    }

    pub fn global() -> &'static HandlerRegistry {
        static REGISTRY: OnceLock<HandlerRegistry> = OnceLock::new();
        REGISTRY.get_or_init(HandlerRegistry::bootstrap)
    }

    pub fn get(&self, chain: Chain) -> Option<&HandlerGroup> {
        self.groups.get(&chain)
    }

    pub fn transfer_handler(&self, chain: Chain) -> Result<&dyn TransferHandler, CoreError> {
        self.get(chain)
            .and_then(|g| g.transfer.as_deref())
            .ok_or(CoreError::Unsupported(chain))
    }

    pub fn wallet_handler(&self, chain: Chain) -> Result<&dyn WalletHandler, CoreError> {
        self.get(chain)
            .and_then(|g| g.wallet.as_deref())
            .ok_or(CoreError::Unsupported(chain))
    }

    pub fn sweeper_handler(&self, chain: Chain) -> Result<&dyn SweeperHandler, CoreError> {
        self.get(chain)
            .and_then(|g| g.sweeper.as_deref())
            .ok_or(CoreError::Unsupported(chain))
    }

    pub fn paper_wallet_handler(&self, chain: Chain) -> Result<&dyn PaperWalletHandler, CoreError> {
        self.get(chain)
            .and_then(|g| g.paper_wallet.as_deref())
            .ok_or(CoreError::Unsupported(chain))
    }

    pub fn payment_protocol_handler(
        &self,
        chain: Chain,
    ) -> Result<&dyn PaymentProtocolHandler, CoreError> {
        self.get(chain)
            .and_then(|g| g.payment_protocol.as_deref())
            .ok_or(CoreError::Unsupported(chain))
    }

    pub fn wallet_manager_handler(
        &self,
        chain: Chain,
    ) -> Result<&dyn WalletManagerHandler, CoreError> {
        self.get(chain)
            .and_then(|g| g.wallet_manager.as_deref())
            .ok_or(CoreError::Unsupported(chain))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_is_none_for_unsupported_chain() {
        let registry = HandlerRegistry::global();
        assert!(registry.get(Chain::Xtz).is_none());
    }

    #[test]
    fn lookup_finds_registered_chain() {
        let registry = HandlerRegistry::global();
        assert!(registry.get(Chain::Btc).is_some());
        assert!(registry.transfer_handler(Chain::Btc).is_ok());
    }

    #[test]
    fn unsupported_chain_surfaces_typed_error() {
        let registry = HandlerRegistry::global();
        let err = registry.transfer_handler(Chain::Hbar).unwrap_err();
        matches!(err, CoreError::Unsupported(Chain::Hbar));
    }

    #[test]
    fn sweeper_handler_rejects_short_key() {
        let registry = HandlerRegistry::global();
        let handler = registry.sweeper_handler(Chain::Btc).unwrap();
        assert!(matches!(
            handler.validate_key(&[1u8; 16]),
            Err(SweeperStatus::InvalidArgs)
        ));
    }

    #[test]
    fn sweeper_handler_builds_transfer_for_nonzero_balance() {
        use wallet_core_types::{Unit, Uids};

        let registry = HandlerRegistry::global();
        let handler = registry.sweeper_handler(Chain::Eth).unwrap();
        let unit = Unit::base(Uids::new("eth"), "Ether", "eth", "ETH");
        let balance = Amount::new(42, false, unit);
        let transfer = handler
            .build_sweep_transfer(
                Chain::Eth,
                "eth:mainnet",
                Weak::new(),
                "0xsource",
                "0xtarget",
                balance,
            )
            .unwrap();
        assert_eq!(transfer.record().amount.value, 42);
    }

    #[test]
    fn sweeper_handler_rejects_empty_balance() {
        use wallet_core_types::{Unit, Uids};

        let registry = HandlerRegistry::global();
        let handler = registry.sweeper_handler(Chain::Btc).unwrap();
        let unit = Unit::base(Uids::new("btc"), "Bitcoin", "btc", "BTC");
        let balance = Amount::new(0, false, unit);
        let err = handler
            .build_sweep_transfer(Chain::Btc, "btc:mainnet", Weak::new(), "src", "dst", balance)
            .unwrap_err();
        assert!(matches!(err, SweeperStatus::NoTransfersFound));
    }

    #[test]
    fn paper_wallet_handler_derives_address_for_each_chain() {
        let registry = HandlerRegistry::global();
        let seed = [7u8; 32];
        let btc = registry
            .paper_wallet_handler(Chain::Btc)
            .unwrap()
            .derive_address(&seed)
            .unwrap();
        assert!(btc.starts_with("bc1"));
        let eth = registry
            .paper_wallet_handler(Chain::Eth)
            .unwrap()
            .derive_address(&seed)
            .unwrap();
        assert!(eth.starts_with("0x"));
    }

    #[test]
    fn payment_protocol_handler_parses_and_builds_transfer() {
        let registry = HandlerRegistry::global();
        let handler = registry.payment_protocol_handler(Chain::Btc).unwrap();
        let raw = b"btc:mainnet|500|bc1qtarget:1000|thanks";
        let request = handler.parse_request(raw).unwrap();
        assert_eq!(request.network_uids, "btc:mainnet");
        assert_eq!(request.outputs.len(), 1);
        assert_eq!(request.memo.as_deref(), Some("thanks"));

        let transfer = handler
            .build_transfer(Chain::Btc, &request, Weak::new(), "bc1qsource")
            .unwrap();
        assert_eq!(transfer.record().amount.value, 1000);
    }

    #[test]
    fn payment_protocol_handler_rejects_malformed_request() {
        let registry = HandlerRegistry::global();
        let handler = registry.payment_protocol_handler(Chain::Eth).unwrap();
        assert!(handler.parse_request(b"eth:mainnet|not-a-number|0xabc:1|").is_err());
    }
}
