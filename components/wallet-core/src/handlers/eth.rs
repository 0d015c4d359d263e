//! Ethereum-family (ETH, AVAX C-chain) handler group. Wallets on these
//! chains may hold a balance currency (e.g. an ERC-20 token) distinct from
//! the fee currency (always the chain's native asset), per spec §3
//! (Wallet).

use bip32::XPrv;
use k256::ecdsa::SigningKey as Secp256k1SigningKey;
use sha2::{Digest, Sha256};
use wallet_core_types::{AddressScheme, Amount, NetworkFee, Uids, Unit};

use super::{
    AddressHandler, FeeBasisHandler, HandlerGroup, NetworkHandler, PaperWalletHandler,
    PaymentProtocolHandler, PaymentProtocolRequest, SweeperHandler, TransferHandler,
    WalletHandler, WalletManagerHandler,
};
use crate::error::SweeperStatus;
use crate::fee_basis::FeeEstimateRequest;

struct EthAddressHandler;
impl AddressHandler for EthAddressHandler {
    fn parse(&self, text: &str) -> Result<String, String> {
        let text = text.trim();
        let hex_part = text.strip_prefix("0x").unwrap_or(text);
        if hex_part.len() != 40 || !hex_part.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(format!("invalid ETH address: {text}"));
        }
        Ok(format!("0x{}", hex_part.to_lowercase()))
    }
}

struct EthNetworkHandler;
impl NetworkHandler for EthNetworkHandler {
    fn validate_address_scheme(&self, scheme: AddressScheme) -> bool {
        matches!(scheme, AddressScheme::Default)
    }
}

struct EthTransferHandler;
impl TransferHandler for EthTransferHandler {}

struct EthWalletHandler;
impl WalletHandler for EthWalletHandler {
    fn fee_unit_compatible(&self, fee_currency: &str, balance_currency: &str) -> bool {
        // An ERC-20 balance wallet's fee-unit is ETH, never the token
        // itself -- fees are never netted out of a token balance.
        fee_currency == balance_currency && fee_currency == "ETH"
    }
}

struct EthWalletManagerHandler;
impl WalletManagerHandler for EthWalletManagerHandler {
    fn estimate_fee(&self, request: &FeeEstimateRequest) -> Result<u128, String> {
        let gas_estimate: u128 = if request.attributes.is_empty() { 21_000 } else { 65_000 };
        Ok(gas_estimate.saturating_mul(request.network_fee.amount_in_smallest_unit))
    }
}

struct EthFeeBasisHandler;
impl FeeBasisHandler for EthFeeBasisHandler {
    fn cost_factor_for_amount(&self, _amount_base_units: u128) -> u64 {
        21_000
    }
}

/// ETH and BTC share secp256k1, so a raw key is sweepable under the same
/// rule as [`super::btc::BtcSweeperHandler`] (original_source
/// `wkWalletSweeperValidate`).
struct EthSweeperHandler;
impl SweeperHandler for EthSweeperHandler {
    fn validate_key(&self, raw_key: &[u8]) -> Result<(), SweeperStatus> {
        if raw_key.len() != 32 {
            return Err(SweeperStatus::InvalidArgs);
        }
        Secp256k1SigningKey::from_slice(raw_key).map_err(|_| SweeperStatus::InvalidKey)?;
        Ok(())
    }
}

/// Derives the BIP-32 master public key for `seed` and hashes it down to
/// the same placeholder `0x`-prefixed shape as [`EthAddressHandler`] (real
/// Keccak-256 address derivation is a chain-specific address builder, out
/// of scope per spec §1).
struct EthPaperWalletHandler;
impl PaperWalletHandler for EthPaperWalletHandler {
    fn derive_address(&self, seed: &[u8]) -> Result<String, String> {
        let xprv = XPrv::new(seed).map_err(|e| e.to_string())?;
        let pubkey = xprv.public_key().to_bytes();
        let digest = Sha256::digest(pubkey);
        Ok(format!("0x{}", hex::encode(&digest[12..32])))
    }
}

/// A minimal internal request shape, not a BIP-70 protobuf/X.509 decoder
/// (that wire format is out of scope per spec §1's "new wire formats"
/// non-goal): `<network>|<fee>|<addr>:<amount>,...|<memo>`.
struct EthPaymentProtocolHandler;
impl PaymentProtocolHandler for EthPaymentProtocolHandler {
    fn parse_request(&self, raw: &[u8]) -> Result<PaymentProtocolRequest, String> {
        let text = std::str::from_utf8(raw).map_err(|e| e.to_string())?;
        let mut parts = text.split('|');
        let network_uids = parts.next().ok_or("missing network")?.to_string();
        let fee_amount: u128 = parts
            .next()
            .ok_or("missing fee")?
            .parse()
            .map_err(|_| "invalid fee".to_string())?;
        let outputs_part = parts.next().ok_or("missing outputs")?;
        let unit = Unit::base(Uids::new("eth"), "Ether", "eth", "ETH");
        let outputs = outputs_part
            .split(',')
            .filter(|entry| !entry.is_empty())
            .map(|entry| {
                let (address, amount) = entry
                    .split_once(':')
                    .ok_or_else(|| format!("malformed output: {entry}"))?;
                let value: u128 = amount
                    .parse()
                    .map_err(|_| format!("invalid amount: {amount}"))?;
                Ok((address.to_string(), Amount::new(value, false, unit.clone())))
            })
            .collect::<Result<Vec<_>, String>>()?;
        let memo = parts.next().filter(|s| !s.is_empty()).map(String::from);
        Ok(PaymentProtocolRequest {
            network_uids,
            required_fee: NetworkFee {
                amount_in_smallest_unit: fee_amount,
                tier_label: "default".into(),
                estimated_confirmation_time_ms: 0,
            },
            outputs,
            memo,
        })
    }
}

pub(super) fn handler_group() -> HandlerGroup {
    HandlerGroup {
        network: Some(Box::new(EthNetworkHandler)),
        address: Some(Box::new(EthAddressHandler)),
        transfer: Some(Box::new(EthTransferHandler)),
        wallet: Some(Box::new(EthWalletHandler)),
        wallet_manager: Some(Box::new(EthWalletManagerHandler)),
        sweeper: Some(Box::new(EthSweeperHandler)),
        paper_wallet: Some(Box::new(EthPaperWalletHandler)),
        payment_protocol: Some(Box::new(EthPaymentProtocolHandler)),
        fee_basis: Some(Box::new(EthFeeBasisHandler)),
    }
}
