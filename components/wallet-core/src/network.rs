//! The engine's locked wrapper around [`wallet_core_types::NetworkDescriptorData`]
//! (spec §4.4). Immutable descriptor fields pass straight through; height,
//! fee tiers and currency associations are mutable under `network_lock`, a
//! sibling leaf that the lock order (System -> WalletManager -> Wallet ->
//! Transfer, spec §5) never crosses.

use std::sync::{Mutex, RwLock};

use wallet_core_types::{
    resolve_currency_association, AddressScheme, Currency, CurrencyAssociation, NetworkDescriptor,
    NetworkEvent, NetworkFee, NetworkDescriptorData, SyncMode, Uids,
};

use crate::utils::Context;

struct MutableState {
    height: u64,
    verified_block_hash: Option<String>,
    fees: Vec<NetworkFee>,
    currencies: Vec<CurrencyAssociation>,
}

pub struct Network {
    data: NetworkDescriptorData,
    state: Mutex<MutableState>,
    listeners: RwLock<Vec<Box<dyn Fn(NetworkEvent) + Send + Sync>>>,
}

impl Network {
    pub fn new(data: NetworkDescriptorData, initial_height: u64, fees: Vec<NetworkFee>) -> Network {
        Network {
            data,
            state: Mutex::new(MutableState {
                height: initial_height,
                verified_block_hash: None,
                fees,
                currencies: Vec::new(),
            }),
            listeners: RwLock::new(Vec::new()),
        }
    }

    pub fn uids(&self) -> &Uids {
        &self.data.uids
    }

    pub fn is_mainnet(&self) -> bool {
        self.data.is_mainnet
    }

    pub fn descriptor(&self) -> NetworkDescriptor {
        self.data.descriptor
    }

    pub fn confirmations_until_final(&self) -> u64 {
        self.data.confirmations_until_final
    }

    pub fn confirmation_period_seconds(&self) -> u64 {
        self.data.confirmation_period_seconds
    }

    pub fn default_address_scheme(&self) -> AddressScheme {
        self.data.default_address_scheme
    }

    pub fn allowed_address_schemes(&self) -> &[AddressScheme] {
        &self.data.allowed_address_schemes
    }

    pub fn default_sync_mode(&self) -> SyncMode {
        self.data.default_sync_mode
    }

    pub fn allowed_sync_modes(&self) -> &[SyncMode] {
        &self.data.allowed_sync_modes
    }

    pub fn height(&self) -> u64 {
        self.state.lock().expect("network lock poisoned").height
    }

    /// Height updates emit `BlockHeightUpdated` only when the value
    /// actually differs (spec §4.4). `verified_block_hash`, when
    /// supplied, is retained under the same lock regardless of whether
    /// height changed.
    pub fn update_height(&self, ctx: &Context, new_height: u64, verified_block_hash: Option<String>) {
        let old_height = {
            let mut state = self.state.lock().expect("network lock poisoned");
            let old_height = state.height;
            state.height = new_height;
            if verified_block_hash.is_some() {
                state.verified_block_hash = verified_block_hash;
            }
            old_height
        };
        if old_height != new_height {
            self.emit(
                ctx,
                NetworkEvent::BlockHeightUpdated {
                    old: old_height,
                    new: new_height,
                },
            );
        }
    }

    pub fn verified_block_hash(&self) -> Option<String> {
        self.state
            .lock()
            .expect("network lock poisoned")
            .verified_block_hash
            .clone()
    }

    pub fn fees(&self) -> Vec<NetworkFee> {
        self.state.lock().expect("network lock poisoned").fees.clone()
    }

    /// Atomic fee-tier list replacement; emits `FeesUpdated` (spec §4.4).
    pub fn replace_fees(&self, ctx: &Context, fees: Vec<NetworkFee>) {
        {
            let mut state = self.state.lock().expect("network lock poisoned");
            state.fees = fees;
        }
        self.emit(ctx, NetworkEvent::FeesUpdated);
    }

    pub fn currency_association(&self, currency_uids: &str) -> Option<CurrencyAssociation> {
        self.state
            .lock()
            .expect("network lock poisoned")
            .currencies
            .iter()
            .find(|assoc| assoc.currency.uids.0 == currency_uids)
            .cloned()
    }

    /// Installs a currency bundle into this network's association set,
    /// applying the resolution rules of spec §4.4. Returns `true` if a new
    /// association was installed (existing UIDS associations are never
    /// overwritten).
    pub fn install_currency(
        &self,
        currency: Currency,
        denominations: &[(String, String, String, u32)],
    ) -> bool {
        let mut state = self.state.lock().expect("network lock poisoned");
        if state
            .currencies
            .iter()
            .any(|assoc| assoc.currency.uids == currency.uids)
        {
            return false;
        }
        let association = resolve_currency_association(currency, denominations);
        state.currencies.push(association);
        true
    }

    pub fn add_listener(&self, listener: Box<dyn Fn(NetworkEvent) + Send + Sync>) {
        self.listeners
            .write()
            .expect("network listeners lock poisoned")
            .push(listener);
    }

    /// Called by the system façade after ingesting a currency bundle batch
    /// that installed at least one new association for this network (spec
    /// §4.8 "emitting one CurrenciesUpdated event per affected network").
    pub fn emit_currencies_updated(&self, ctx: &Context) {
        self.emit(ctx, NetworkEvent::CurrenciesUpdated);
    }

    fn emit(&self, ctx: &Context, event: NetworkEvent) {
        crate::try_debug!(ctx, "network event: {:?}", event);
        for listener in self.listeners.read().expect("network listeners lock poisoned").iter() {
            listener(event.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_data() -> NetworkDescriptorData {
        NetworkDescriptorData {
            uids: Uids("bitcoin-mainnet".into()),
            display_name: "Bitcoin".into(),
            descriptor: NetworkDescriptor::Mainnet,
            is_mainnet: true,
            confirmations_until_final: 6,
            confirmation_period_seconds: 600,
            default_currency: Uids("btc".into()),
            default_address_scheme: AddressScheme::NativeSegwit,
            allowed_address_schemes: vec![AddressScheme::Default, AddressScheme::NativeSegwit],
            default_sync_mode: SyncMode::ApiOnly,
            allowed_sync_modes: vec![SyncMode::ApiOnly],
        }
    }

    #[test]
    fn height_update_is_idempotent_for_same_value() {
        let network = Network::new(test_data(), 100, Vec::new());
        let events = std::sync::Arc::new(Mutex::new(0u32));
        let events_clone = events.clone();
        network.add_listener(Box::new(move |_| {
            *events_clone.lock().unwrap() += 1;
        }));
        let ctx = Context::empty();
        network.update_height(&ctx, 100, None);
        assert_eq!(*events.lock().unwrap(), 0);
        network.update_height(&ctx, 101, None);
        assert_eq!(*events.lock().unwrap(), 1);
    }

    #[test]
    fn install_currency_never_overwrites_existing_uids() {
        let network = Network::new(test_data(), 100, Vec::new());
        let currency = Currency::new(
            Uids("usdt".into()),
            "Tether",
            "usdt",
            wallet_core_types::CurrencyType::Token,
            None,
        );
        assert!(network.install_currency(
            currency.clone(),
            &[("Tether".into(), "usdt".into(), "USDT".into(), 6)]
        ));
        assert!(!network.install_currency(currency, &[]));
    }
}
