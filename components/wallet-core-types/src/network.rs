use crate::{Currency, Unit, Uids};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum NetworkDescriptor {
    Mainnet,
    Testnet,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AddressScheme {
    /// BIP-44 style, or the equivalent default scheme for non-BTC chains.
    Default,
    /// BIP-49 style (e.g. nested segwit).
    Segwit,
    /// BIP-84 style (native segwit).
    NativeSegwit,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SyncMode {
    /// QRY only (spec §4.6, "API only").
    ApiOnly,
    /// QRY for sync, P2P for send.
    ApiSyncP2pSend,
    /// QRY for the initial sync, P2P thereafter; P2P for send.
    P2pSyncApiInitial,
    /// P2P only.
    P2pOnly,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NetworkFee {
    /// Fee amount, denominated in the network's smallest unit.
    pub amount_in_smallest_unit: u128,
    pub tier_label: String,
    pub estimated_confirmation_time_ms: u64,
}

/// A currency bound into a network, with its full set of known display
/// units plus its base and default unit (spec §4.4).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CurrencyAssociation {
    pub currency: Currency,
    pub base_unit: Unit,
    pub default_unit: Unit,
    pub units: Vec<Unit>,
}

impl CurrencyAssociation {
    pub fn unit_with_decimals(&self, decimals: u32) -> Option<&Unit> {
        self.units.iter().find(|u| u.decimals == decimals)
    }
}

/// Immutable descriptor fields plus mutable height/fees/currency-association
/// state, per spec §3. The mutable fields are guarded by `network_lock` when
/// the network is embedded in the engine; this type itself is a plain
/// value -- callers (wallet-core::network::Network) supply the lock.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NetworkDescriptorData {
    pub uids: Uids,
    pub display_name: String,
    pub descriptor: NetworkDescriptor,
    pub is_mainnet: bool,
    pub confirmations_until_final: u64,
    pub confirmation_period_seconds: u64,
    pub default_currency: Uids,
    pub default_address_scheme: AddressScheme,
    pub allowed_address_schemes: Vec<AddressScheme>,
    pub default_sync_mode: SyncMode,
    pub allowed_sync_modes: Vec<SyncMode>,
}

/// Resolves a newly-seen currency bundle denomination set into a
/// [`CurrencyAssociation`], applying the rules of spec §4.4:
/// 1. base unit = the denomination with decimals == 0, or a synthesized one;
/// 2. non-base denominations become units referencing the base unit;
/// 3. default unit = the unit with the greatest decimal offset (or base).
pub fn resolve_currency_association(
    currency: Currency,
    denominations: &[(String, String, String, u32)],
) -> CurrencyAssociation {
    let base = denominations.iter().find(|(_, _, _, decimals)| *decimals == 0);

    let base_unit = match base {
        Some((name, code, symbol, _)) => Unit {
            currency: currency.uids.clone(),
            name: name.clone(),
            code: code.clone(),
            symbol: symbol.clone(),
            decimals: 0,
        },
        None => Unit {
            currency: currency.uids.clone(),
            name: format!("{} INT", currency.name),
            code: format!("{}i", currency.code),
            symbol: format!("{}I", currency.code.to_uppercase()),
            decimals: 0,
        },
    };

    let mut units: Vec<Unit> = denominations
        .iter()
        .filter(|(_, _, _, decimals)| *decimals != 0)
        .map(|(name, code, symbol, decimals)| Unit {
            currency: currency.uids.clone(),
            name: name.clone(),
            code: code.clone(),
            symbol: symbol.clone(),
            decimals: *decimals,
        })
        .collect();
    units.push(base_unit.clone());

    let default_unit = units
        .iter()
        .max_by_key(|u| u.decimals)
        .cloned()
        .unwrap_or_else(|| base_unit.clone());

    CurrencyAssociation {
        currency,
        base_unit,
        default_unit,
        units,
    }
}
