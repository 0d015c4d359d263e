//! Bitcoin-family (BTC, BCH, BSV, LTC, DOGE) handler group. Address parsing
//! and script construction are genuinely out of scope (spec §1); this
//! group only supplies the glue the core needs to dispatch through it.

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

struct BtcAddressHandler;
impl AddressHandler for BtcAddressHandler {
    fn parse(&self, text: &str) -> Result<String, String> {
        if text.is_empty() {
            return Err("empty address".into());
        }
        Ok(text.to_string())
    }
}

struct BtcNetworkHandler;
impl NetworkHandler for BtcNetworkHandler {
    fn validate_address_scheme(&self, scheme: AddressScheme) -> bool {
        matches!(
            scheme,
            AddressScheme::Default | AddressScheme::Segwit | AddressScheme::NativeSegwit
        )
    }
}

struct BtcTransferHandler;
impl TransferHandler for BtcTransferHandler {}

struct BtcWalletHandler;
impl WalletHandler for BtcWalletHandler {}

struct BtcWalletManagerHandler;
impl WalletManagerHandler for BtcWalletManagerHandler {
    fn estimate_fee(&self, request: &FeeEstimateRequest) -> Result<u128, String> {
        // UTXO-style fee: a fixed virtual-size estimate times the tier's
        // price. Real sizing requires the to-be-built transaction, which is
        // the chain-specific transaction builder's job (out of scope,
        // spec §1); this is a rough placeholder proportional to amount.
        let vsize_estimate: u128 = 150;
        Ok(vsize_estimate.saturating_mul(request.network_fee.amount_in_smallest_unit))
    }
}

struct BtcFeeBasisHandler;
impl FeeBasisHandler for BtcFeeBasisHandler {
    fn cost_factor_for_amount(&self, _amount_base_units: u128) -> u64 {
        150
    }
}

/// A raw key is sweepable if it parses as a secp256k1 scalar (original_source
/// `wkWalletSweeperValidate` rejecting a key `cryptoKeyCreateFromStringPrivate`
/// can't construct).
struct BtcSweeperHandler;
impl SweeperHandler for BtcSweeperHandler {
    fn validate_key(&self, raw_key: &[u8]) -> Result<(), SweeperStatus> {
        if raw_key.len() != 32 {
            return Err(SweeperStatus::InvalidArgs);
        }
        Secp256k1SigningKey::from_slice(raw_key).map_err(|_| SweeperStatus::InvalidKey)?;
        Ok(())
    }
}

/// Derives the BIP-32 master public key for `seed` and hashes it down to a
/// bech32-shaped placeholder address, the same level of rigor as
/// [`BtcAddressHandler`] (full witness-program encoding is a chain-specific
/// address builder, out of scope per spec §1).
struct BtcPaperWalletHandler;
impl PaperWalletHandler for BtcPaperWalletHandler {
    fn derive_address(&self, seed: &[u8]) -> Result<String, String> {
        let xprv = XPrv::new(seed).map_err(|e| e.to_string())?;
        let pubkey = xprv.public_key().to_bytes();
        let digest = Sha256::digest(Sha256::digest(pubkey));
        Ok(format!("bc1{}", hex::encode(&digest[..20])))
    }
}

/// A minimal internal request shape, not a BIP-70 protobuf/X.509 decoder
/// (that wire format is out of scope per spec §1's "new wire formats"
/// non-goal): `<network>|<fee>|<addr>:<amount>,...|<memo>`.
struct BtcPaymentProtocolHandler;
impl PaymentProtocolHandler for BtcPaymentProtocolHandler {
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
        let unit = Unit::base(Uids::new("btc"), "Bitcoin", "btc", "BTC");
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
        network: Some(Box::new(BtcNetworkHandler)),
        address: Some(Box::new(BtcAddressHandler)),
        transfer: Some(Box::new(BtcTransferHandler)),
        wallet: Some(Box::new(BtcWalletHandler)),
        wallet_manager: Some(Box::new(BtcWalletManagerHandler)),
        sweeper: Some(Box::new(BtcSweeperHandler)),
        paper_wallet: Some(Box::new(BtcPaperWalletHandler)),
        payment_protocol: Some(Box::new(BtcPaymentProtocolHandler)),
        fee_basis: Some(Box::new(BtcFeeBasisHandler)),
    }
}
