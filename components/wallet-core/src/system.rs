//! The top-level container (spec §4.8): owns the account, the networks
//! and wallet managers built on top of it, and the currency-bundle file
//! store. Mirrors the role `chainhook-sdk`'s top-level observer/indexer
//! struct plays for `ordhook-core` -- one long-lived object the host
//! application constructs once and drives for the process lifetime.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};

use wallet_core_types::{
    Chain, Currency, CurrencyBundle, CurrencyType, LifecycleEvent, NetworkDescriptorData, NetworkFee,
    SyncMode, SystemEvent, SystemState, TransferBundle, Uids, Unit, WalletEvent, WalletManagerEvent,
};

use crate::account::Account;
use crate::client::Client;
use crate::error::CoreError;
use crate::manager::p2p::P2PSubManager;
use crate::manager::WalletManager;
use crate::metrics::Metrics;
use crate::network::Network;
use crate::persistence::{currency_bundle_identifier, decode_currency_bundle, encode_currency_bundle, FileService};
use crate::utils::Context;

const CURRENCY_BUNDLE_DIR: &str = "system/state/currency-bundle";

struct State {
    value: SystemState,
    networks: HashMap<Uids, Arc<Network>>,
    managers: HashMap<Uids, Arc<WalletManager>>,
}

pub struct System<F: FileService> {
    account: Arc<Account>,
    client: Arc<dyn Client>,
    base_path: PathBuf,
    file_service: F,
    is_reachable: AtomicBool,
    is_mainnet: bool,
    started: AtomicBool,
    state: Mutex<State>,
    listener: Weak<dyn Fn(SystemEvent) + Send + Sync>,
    metrics: Option<Metrics>,
}

impl<F: FileService> System<F> {
    /// `metrics` is `None` unless the host application opted into the
    /// Prometheus surface (spec §2); when set, every wallet manager this
    /// system creates shares the same registry.
    pub fn new(
        account: Arc<Account>,
        client: Arc<dyn Client>,
        base_path: impl Into<PathBuf>,
        file_service: F,
        is_mainnet: bool,
        metrics: Option<Metrics>,
        listener: Weak<dyn Fn(SystemEvent) + Send + Sync>,
    ) -> Arc<System<F>> {
        Arc::new(System {
            account,
            client,
            base_path: base_path.into(),
            file_service,
            is_reachable: AtomicBool::new(false),
            is_mainnet,
            started: AtomicBool::new(false),
            state: Mutex::new(State {
                value: SystemState::Created,
                networks: HashMap::new(),
                managers: HashMap::new(),
            }),
            listener,
            metrics,
        })
    }

    pub fn account(&self) -> Arc<Account> {
        self.account.clone()
    }

    pub fn is_mainnet(&self) -> bool {
        self.is_mainnet
    }

    pub fn is_reachable(&self) -> bool {
        self.is_reachable.load(Ordering::Acquire)
    }

    pub fn set_reachable(&self, reachable: bool) {
        self.is_reachable.store(reachable, Ordering::Release);
    }

    pub fn state(&self) -> SystemState {
        self.state.lock().expect("system lock poisoned").value.clone()
    }

    /// Gates listener event delivery on (spec §4.8 "`start`/`stop` gate
    /// listener event delivery"). Events raised while stopped are simply
    /// dropped, not queued.
    pub fn start(&self, ctx: &Context) {
        self.started.store(true, Ordering::Release);
        self.set_state(ctx, SystemState::Connected);
    }

    pub fn stop(&self, ctx: &Context) {
        self.set_state(ctx, SystemState::Disconnected);
        self.started.store(false, Ordering::Release);
    }

    fn set_state(&self, ctx: &Context, new: SystemState) {
        let changed = {
            let mut state = self.state.lock().expect("system lock poisoned");
            let changed = state.value != new;
            state.value = new.clone();
            changed
        };
        if changed {
            crate::try_info!(ctx, "system state -> {:?}", new);
            self.emit(SystemEvent::Lifecycle(LifecycleEvent::Changed((), ())));
        }
    }

    /// Idempotent network registration: returns the existing `Network` if
    /// one with this `uids` was already installed.
    pub fn install_network(&self, data: NetworkDescriptorData, initial_height: u64, fees: Vec<NetworkFee>) -> Arc<Network> {
        let mut state = self.state.lock().expect("system lock poisoned");
        if let Some(existing) = state.networks.get(&data.uids) {
            return existing.clone();
        }
        let uids = data.uids.clone();
        let network = Arc::new(Network::new(data, initial_height, fees));
        state.networks.insert(uids, network.clone());
        drop(state);
        self.emit(SystemEvent::NetworkAdded);
        network
    }

    pub fn network(&self, network_uids: &str) -> Option<Arc<Network>> {
        self.state
            .lock()
            .expect("system lock poisoned")
            .networks
            .get(&Uids::new(network_uids))
            .cloned()
    }

    /// Creates the wallet manager for `network_uids`, or returns the one
    /// already created for it (spec §4.8 "idempotent per (system,
    /// network)"). The network must already be installed via
    /// [`System::install_network`].
    #[allow(clippy::too_many_arguments)]
    pub fn create_wallet_manager(
        &self,
        ctx: Context,
        chain: Chain,
        network_uids: &str,
        client: Arc<dyn Client>,
        mode: SyncMode,
        p2p: Option<Box<dyn P2PSubManager>>,
        native_unit: Unit,
        persisted_transfers: Vec<TransferBundle>,
        manager_listener: Weak<dyn Fn(WalletManagerEvent) + Send + Sync>,
        wallet_listener: Weak<dyn Fn(WalletEvent) + Send + Sync>,
    ) -> Result<Arc<WalletManager>, CoreError> {
        let network = self
            .network(network_uids)
            .ok_or(CoreError::Unsupported(chain))?;

        let mut state = self.state.lock().expect("system lock poisoned");
        if let Some(existing) = state.managers.get(network.uids()) {
            return Ok(existing.clone());
        }

        let manager = WalletManager::new(
            ctx,
            chain,
            network.clone(),
            self.account.clone(),
            client,
            mode,
            p2p,
            native_unit,
            persisted_transfers,
            self.metrics.clone(),
            manager_listener,
            wallet_listener,
        );
        state.managers.insert(network.uids().clone(), manager.clone());
        drop(state);
        self.emit(SystemEvent::ManagerAdded);
        Ok(manager)
    }

    pub fn wallet_manager(&self, network_uids: &str) -> Option<Arc<WalletManager>> {
        self.state
            .lock()
            .expect("system lock poisoned")
            .managers
            .get(&Uids::new(network_uids))
            .cloned()
    }

    /// The root directory the caller's `FileService` is expected to be
    /// rooted at: `<base_path>/<account_fs_identifier>` (spec §4.7, §6).
    pub fn store_root(&self) -> PathBuf {
        self.base_path.join(self.account.fs_identifier())
    }

    /// Currency bundle ingestion (spec §4.8): partitions `bundles` by
    /// owning network (matched on `blockchain_id` against each network's
    /// `uids`), persists every bundle regardless of whether its network is
    /// currently installed, then installs each into its network's
    /// association set and emits one `CurrenciesUpdated` per network that
    /// actually gained an association.
    pub fn ingest_currency_bundles(&self, ctx: &Context, bundles: Vec<CurrencyBundle>) {
        let networks = self.state.lock().expect("system lock poisoned").networks.clone();

        for bundle in &bundles {
            self.persist_currency_bundle(ctx, bundle);
        }

        let mut by_network: HashMap<Uids, Vec<CurrencyBundle>> = HashMap::new();
        for bundle in bundles {
            by_network
                .entry(Uids::new(bundle.blockchain_id.clone()))
                .or_default()
                .push(bundle);
        }

        for (network_uids, bundles) in by_network {
            let Some(network) = networks.get(&network_uids) else {
                crate::try_debug!(
                    ctx,
                    "currency bundles for unknown network {:?} persisted, not installed",
                    network_uids
                );
                continue;
            };

            let mut installed_any = false;
            for bundle in bundles {
                let currency_type = match bundle.currency_type.as_str() {
                    "native" => CurrencyType::Native,
                    _ => CurrencyType::Token,
                };
                let currency = Currency::new(
                    bundle.id.clone(),
                    bundle.name.clone(),
                    bundle.code.clone(),
                    currency_type,
                    bundle.contract_address.clone(),
                );
                let denominations: Vec<(String, String, String, u32)> = bundle
                    .denominations
                    .iter()
                    .map(|d| (d.name.clone(), d.code.clone(), d.symbol.clone(), d.decimals))
                    .collect();
                if network.install_currency(currency, &denominations) {
                    installed_any = true;
                }
            }
            if installed_any {
                network.emit_currencies_updated(ctx);
            }
        }
    }

    fn persist_currency_bundle(&self, ctx: &Context, bundle: &CurrencyBundle) {
        let id = currency_bundle_identifier(&bundle.id);
        let path = PathBuf::from(CURRENCY_BUNDLE_DIR).join(&id);
        if let Err(err) = self.file_service.write(&path, &encode_currency_bundle(bundle)) {
            crate::try_warn!(ctx, "failed to persist currency bundle {}: {}", id, err);
        }
    }

    /// Loads every persisted currency bundle without installing any of
    /// them -- callers re-run [`System::ingest_currency_bundles`] with the
    /// result once their networks are installed (spec §4.7 startup
    /// sequence, generalized to the currency-bundle store).
    pub fn load_currency_bundles(&self, ctx: &Context) -> Vec<CurrencyBundle> {
        let dir = PathBuf::from(CURRENCY_BUNDLE_DIR);
        let paths = match self.file_service.list(&dir) {
            Ok(paths) => paths,
            Err(err) => {
                crate::try_warn!(ctx, "failed to list currency bundle store: {}", err);
                return Vec::new();
            }
        };
        let mut bundles = Vec::new();
        for path in paths {
            match self.file_service.read(&path) {
                Ok(Some(data)) => match decode_currency_bundle(&data) {
                    Ok(bundle) => bundles.push(bundle),
                    Err(err) => crate::try_warn!(ctx, "failed to decode {}: {}", path.display(), err),
                },
                Ok(None) => {}
                Err(err) => crate::try_warn!(ctx, "failed to read {}: {}", path.display(), err),
            }
        }
        bundles
    }

    fn emit(&self, event: SystemEvent) {
        if !self.started.load(Ordering::Acquire) {
            return;
        }
        crate::events::dispatch_weak(&self.listener, |listener| listener(event));
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::path::Path;
    use std::sync::Mutex as StdMutex;

    use wallet_core_types::{AddressScheme, CurrencyBundle, DenominationBundle, SyncMode};

    use super::*;
    use crate::client::CallbackState;
    use crate::client::Client as ClientTrait;

    struct NullClient;
    impl ClientTrait for NullClient {
        fn get_block_number(&self, _state: CallbackState) {}
        fn get_transactions(&self, _: CallbackState, _: &[String], _: u64, _: u64) {}
        fn get_transfers(&self, _: CallbackState, _: &[String], _: u64, _: u64) {}
        fn submit_transaction(&self, _: CallbackState, _: &str, _: &[u8]) {}
        fn estimate_transaction_fee(&self, _: CallbackState, _: &[u8], _: &str) {}
    }

    #[derive(Default)]
    struct MemoryFileService {
        files: StdMutex<HashMap<PathBuf, Vec<u8>>>,
    }

    impl FileService for MemoryFileService {
        fn write(&self, relative_path: &Path, contents: &[u8]) -> Result<(), CoreError> {
            self.files
                .lock()
                .unwrap()
                .insert(relative_path.to_path_buf(), contents.to_vec());
            Ok(())
        }

        fn read(&self, relative_path: &Path) -> Result<Option<Vec<u8>>, CoreError> {
            Ok(self.files.lock().unwrap().get(relative_path).cloned())
        }

        fn list(&self, relative_dir: &Path) -> Result<Vec<PathBuf>, CoreError> {
            Ok(self
                .files
                .lock()
                .unwrap()
                .keys()
                .filter(|p| p.starts_with(relative_dir))
                .cloned()
                .collect())
        }
    }

    fn dead_listener<E: 'static>() -> Weak<dyn Fn(E) + Send + Sync> {
        let strong: Arc<dyn Fn(E) + Send + Sync> = Arc::new(|_event| {});
        Arc::downgrade(&strong)
    }

    fn test_account() -> Arc<Account> {
        Arc::new(Account::from_seed([9u8; 64], "test-uids", 1_577_836_800).unwrap())
    }

    fn test_network_data() -> wallet_core_types::NetworkDescriptorData {
        wallet_core_types::NetworkDescriptorData {
            uids: Uids::new("bitcoin-mainnet"),
            display_name: "Bitcoin".into(),
            descriptor: wallet_core_types::NetworkDescriptor::Mainnet,
            is_mainnet: true,
            confirmations_until_final: 6,
            confirmation_period_seconds: 600,
            default_currency: Uids::new("btc"),
            default_address_scheme: AddressScheme::NativeSegwit,
            allowed_address_schemes: vec![AddressScheme::NativeSegwit],
            default_sync_mode: SyncMode::ApiOnly,
            allowed_sync_modes: vec![SyncMode::ApiOnly],
        }
    }

    #[test]
    fn create_wallet_manager_is_idempotent_per_network() {
        let system = System::new(
            test_account(),
            Arc::new(NullClient),
            PathBuf::from("/tmp"),
            MemoryFileService::default(),
            true,
            None,
            dead_listener(),
        );
        system.install_network(test_network_data(), 0, Vec::new());

        let first = system
            .create_wallet_manager(
                Context::empty(),
                Chain::Btc,
                "bitcoin-mainnet",
                Arc::new(NullClient),
                SyncMode::ApiOnly,
                None,
                Unit::base(Uids::new("btc"), "Bitcoin", "btc", "BTC"),
                Vec::new(),
                dead_listener(),
                dead_listener(),
            )
            .unwrap();
        let second = system
            .create_wallet_manager(
                Context::empty(),
                Chain::Btc,
                "bitcoin-mainnet",
                Arc::new(NullClient),
                SyncMode::ApiOnly,
                None,
                Unit::base(Uids::new("btc"), "Bitcoin", "btc", "BTC"),
                Vec::new(),
                dead_listener(),
                dead_listener(),
            )
            .unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn ingest_currency_bundles_emits_currencies_updated_once_per_network() {
        let system = System::new(
            test_account(),
            Arc::new(NullClient),
            PathBuf::from("/tmp"),
            MemoryFileService::default(),
            true,
            None,
            dead_listener(),
        );
        system.install_network(test_network_data(), 0, Vec::new());

        let events = Arc::new(StdMutex::new(0u32));
        let events_clone = events.clone();
        system
            .network("bitcoin-mainnet")
            .unwrap()
            .add_listener(Box::new(move |event| {
                if matches!(event, wallet_core_types::NetworkEvent::CurrenciesUpdated) {
                    *events_clone.lock().unwrap() += 1;
                }
            }));

        let ctx = Context::empty();
        let bundle = CurrencyBundle {
            id: Uids::new("usdt"),
            name: "Tether".into(),
            code: "usdt".into(),
            currency_type: "token".into(),
            blockchain_id: "bitcoin-mainnet".into(),
            contract_address: None,
            verified: true,
            denominations: vec![DenominationBundle {
                name: "Tether".into(),
                code: "usdt".into(),
                symbol: "USDT".into(),
                decimals: 6,
            }],
        };
        system.ingest_currency_bundles(&ctx, vec![bundle.clone()]);
        system.ingest_currency_bundles(&ctx, vec![bundle]);

        assert_eq!(*events.lock().unwrap(), 1);
        assert!(system
            .network("bitcoin-mainnet")
            .unwrap()
            .currency_association("usdt")
            .is_some());

        let persisted = system.load_currency_bundles(&ctx);
        assert_eq!(persisted.len(), 1);
    }
}
