//! Wallet manager: sync core + send dispatch for one (account, network)
//! pair (spec §4.6). Owns the QRY sub-manager unconditionally and an
//! optional P2P one; the manager's own dispatch thread is the event loop
//! from `crate::events`, so every announce this manager receives is
//! funneled onto one FIFO queue regardless of which sub-manager produced
//! it (spec §5 "all events for a single wallet manager are totally
//! ordered").

pub mod p2p;
pub mod qry;

use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};

use wallet_core_types::{
    Chain, DisconnectReason, SyncMode, TransferBundle, TransferDirection, TransferSubmitError,
    Uids, Unit, WalletManagerEvent, WalletManagerState,
};

use crate::account::Account;
use crate::client::{CallbackState, Client};
use crate::error::CoreError;
use crate::events::{dispatch_weak, sampling_period, EventLoop};
use crate::handlers::HandlerRegistry;
use crate::metrics::Metrics;
use crate::network::Network;
use crate::transfer::Transfer;
use crate::utils::Context;
use crate::wallet::Wallet;

use p2p::P2PSubManager;
use qry::QrySubManager;

/// Enqueued onto the manager's event loop by client announce calls and
/// internal ticks; the single dispatch thread handles these one at a time
/// (spec §5).
enum ManagerEvent {
    Tick,
    BlockNumber {
        success: bool,
        block_number: u64,
        block_hash: Option<String>,
    },
    Transfers {
        state: CallbackState,
        success: bool,
        bundles: Vec<TransferBundle>,
    },
}

struct Shared {
    chain: Chain,
    network: Arc<Network>,
    account: Arc<Account>,
    qry: QrySubManager,
    p2p: Option<Box<dyn P2PSubManager>>,
    client: Arc<dyn Client>,
    mode: Mutex<SyncMode>,
    state: Mutex<WalletManagerState>,
    primary_wallet: Arc<Wallet>,
    additional_wallets: Mutex<HashMap<Uids, Arc<Wallet>>>,
    has_completed_initial_sync: Mutex<bool>,
    listener: Weak<dyn Fn(WalletManagerEvent) + Send + Sync>,
    metrics: Option<Metrics>,
}

pub struct WalletManager {
    shared: Arc<Shared>,
    event_loop: Mutex<Option<EventLoop<ManagerEvent>>>,
}

impl WalletManager {
    /// `persisted_transfers` implements spec §4.7's startup sequence steps
    /// 2-5: loaded by the caller (sorted ascending by block height) from
    /// the bundle store and recovered into the primary wallet before the
    /// event loop starts, so the first sync round only needs to fetch
    /// what's new since the store was last written. UTXO-style chains'
    /// persisted transaction bundles reconstruct inclusion state through
    /// the same per-chain transfer handler that would parse a live
    /// `GetTransactions` response; no such handler is implemented for any
    /// chain in this tree today (see DESIGN.md), so transaction bundles
    /// are not threaded through here. `metrics` is `None` unless the host
    /// application opted into the Prometheus surface (spec §2).
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        ctx: Context,
        chain: Chain,
        network: Arc<Network>,
        account: Arc<Account>,
        client: Arc<dyn Client>,
        mode: SyncMode,
        p2p: Option<Box<dyn P2PSubManager>>,
        native_unit: Unit,
        persisted_transfers: Vec<TransferBundle>,
        metrics: Option<Metrics>,
        listener: Weak<dyn Fn(WalletManagerEvent) + Send + Sync>,
        wallet_listener: Weak<dyn Fn(wallet_core_types::WalletEvent) + Send + Sync>,
    ) -> Arc<WalletManager> {
        let qry = QrySubManager::new(network.confirmation_period_seconds());
        let primary_wallet = Wallet::new(chain, native_unit.clone(), native_unit, wallet_listener);

        let shared = Arc::new(Shared {
            chain,
            network,
            account,
            qry,
            p2p,
            client,
            mode: Mutex::new(mode),
            state: Mutex::new(WalletManagerState::Created),
            primary_wallet,
            additional_wallets: Mutex::new(HashMap::new()),
            has_completed_initial_sync: Mutex::new(false),
            listener,
            metrics,
        });

        for bundle in &persisted_transfers {
            recover_transfer(&ctx, &shared, bundle);
        }

        let manager = Arc::new(WalletManager {
            shared: shared.clone(),
            event_loop: Mutex::new(None),
        });

        let tick_period = sampling_period(manager.shared.network.confirmation_period_seconds());
        let dispatch_shared = shared.clone();
        let dispatch_ctx = ctx.clone();
        let tick_shared = shared.clone();
        let tick_ctx = ctx.clone();
        let event_loop = EventLoop::start(
            ctx,
            tick_period,
            move |event| dispatch(&dispatch_ctx, &dispatch_shared, event),
            move || on_tick(&tick_ctx, &tick_shared),
        );
        *manager.event_loop.lock().expect("manager lock poisoned") = Some(event_loop);

        manager
    }

    pub fn primary_wallet(&self) -> Arc<Wallet> {
        self.shared.primary_wallet.clone()
    }

    pub fn state(&self) -> WalletManagerState {
        self.shared.state.lock().expect("manager lock poisoned").clone()
    }

    pub fn connect(&self, ctx: &Context) {
        self.shared.qry.set_connected(true);
        if let Some(p2p) = &self.shared.p2p {
            p2p.connect();
        }
        self.set_state(ctx, WalletManagerState::Connected);
    }

    pub fn disconnect(&self, ctx: &Context, reason: DisconnectReason) {
        self.shared.qry.set_connected(false);
        if let Some(p2p) = &self.shared.p2p {
            p2p.disconnect();
        }
        self.set_state(ctx, WalletManagerState::Disconnected);
        self.emit(WalletManagerEvent::SyncStopped(reason));
    }

    /// Enqueues a periodic tick onto this manager's own event loop; called
    /// by the host application's timer, or directly in tests.
    pub fn tick(&self) {
        if let Some(loop_handle) = self.event_loop.lock().expect("manager lock poisoned").as_ref() {
            loop_handle.enqueue(ManagerEvent::Tick);
        }
    }

    pub fn on_block_number(&self, success: bool, block_number: u64, block_hash: Option<String>) {
        if let Some(loop_handle) = self.event_loop.lock().expect("manager lock poisoned").as_ref() {
            loop_handle.enqueue(ManagerEvent::BlockNumber {
                success,
                block_number,
                block_hash,
            });
        }
    }

    pub fn on_transfers(&self, state: CallbackState, success: bool, bundles: Vec<TransferBundle>) {
        if let Some(loop_handle) = self.event_loop.lock().expect("manager lock poisoned").as_ref() {
            loop_handle.enqueue(ManagerEvent::Transfers {
                state,
                success,
                bundles,
            });
        }
    }

    /// Transfer submission flow (spec §4.6.4): sign, move to Signed, add
    /// to wallet(s), dispatch to the active send sub-manager.
    pub fn submit_transfer(&self, ctx: &Context, transfer: Arc<Transfer>, serialization: &[u8]) {
        transfer.set_state(ctx, wallet_core_types::TransferState::Signed, false);
        self.shared.primary_wallet.add_transfer(ctx, transfer.clone());
        self.shared
            .primary_wallet
            .notify_transfer_submitted(transfer.identifier());
        if let Some(metrics) = &self.shared.metrics {
            metrics.record_transfer_submitted();
        }

        let mode = *self.shared.mode.lock().expect("mode lock poisoned");
        let has_synced = *self
            .shared
            .has_completed_initial_sync
            .lock()
            .expect("manager lock poisoned");
        let target = p2p::send_source(mode);
        let identifier = transfer.identifier().map(|u| u.0).unwrap_or_default();
        match target {
            p2p::Source::Qry => {
                self.shared
                    .client
                    .submit_transaction(CallbackState { rid: self.shared.qry.current_rid() }, &identifier, serialization);
            }
            p2p::Source::P2p => {
                if let Some(p2p) = &self.shared.p2p {
                    p2p.send(&identifier, serialization);
                } else {
                    self.shared.client.submit_transaction(
                        CallbackState { rid: self.shared.qry.current_rid() },
                        &identifier,
                        serialization,
                    );
                }
            }
        }
        let _ = has_synced;
    }

    /// Remote-announce result for a submission (spec §4.6.4 step 5).
    pub fn handle_submit_result(
        &self,
        ctx: &Context,
        transfer: &Transfer,
        identifier: Option<String>,
        hash: Option<String>,
        success: bool,
    ) {
        if success {
            transfer.set_state(ctx, wallet_core_types::TransferState::Submitted, false);
        } else {
            transfer.mark_errored(ctx, TransferSubmitError::Unknown);
            if transfer.record().direction != TransferDirection::Received {
                self.shared.primary_wallet.recompute_balance(ctx);
            }
        }
        let _ = identifier;
        if let Some(hash) = hash {
            if transfer.set_hash(hash) {
                transfer.set_state(ctx, transfer.state(), true);
            }
        }
    }

    fn set_state(&self, ctx: &Context, new_state: WalletManagerState) {
        let changed = {
            let mut state = self.shared.state.lock().expect("manager lock poisoned");
            let changed = *state != new_state;
            *state = new_state.clone();
            changed
        };
        if changed {
            crate::try_info!(ctx, "wallet manager state -> {:?}", new_state);
            self.emit(WalletManagerEvent::Lifecycle(
                wallet_core_types::LifecycleEvent::Changed((), ()),
            ));
        }
    }

    fn emit(&self, event: WalletManagerEvent) {
        dispatch_weak(&self.shared.listener, |listener| listener(event));
    }
}

impl Drop for WalletManager {
    fn drop(&mut self) {
        if let Some(mut loop_handle) = self.event_loop.lock().expect("manager lock poisoned").take() {
            loop_handle.stop();
        }
    }
}

fn dispatch(ctx: &Context, shared: &Arc<Shared>, event: ManagerEvent) {
    match event {
        ManagerEvent::Tick => on_tick(ctx, shared),
        ManagerEvent::BlockNumber {
            success,
            block_number,
            block_hash,
        } => on_block_number(ctx, shared, success, block_number, block_hash),
        ManagerEvent::Transfers { state, success, bundles } => {
            on_transfers(ctx, shared, state, success, bundles)
        }
    }
}

/// Spec §4.6.1: every sampling period, if connected and the mode uses QRY
/// for sync, issue `GetBlockNumber`.
fn on_tick(ctx: &Context, shared: &Arc<Shared>) {
    if !shared.qry.is_connected() {
        return;
    }
    let mode = *shared.mode.lock().expect("mode lock poisoned");
    let has_synced = *shared
        .has_completed_initial_sync
        .lock()
        .expect("manager lock poisoned");
    if p2p::sync_source(mode, has_synced) != p2p::Source::Qry {
        return;
    }
    crate::try_debug!(ctx, "manager tick: requesting block number");
    if let Some(metrics) = &shared.metrics {
        metrics.record_sync_tick();
    }
    shared.client.get_block_number(CallbackState {
        rid: shared.qry.current_rid(),
    });
}

fn on_block_number(
    ctx: &Context,
    shared: &Arc<Shared>,
    success: bool,
    block_number: u64,
    block_hash: Option<String>,
) {
    if !success {
        return;
    }
    shared.network.update_height(ctx, block_number, block_hash);
    request_sync(ctx, shared);
}

fn request_sync(ctx: &Context, shared: &Arc<Shared>) {
    let height = shared.network.height();
    let Some(sync) = shared.qry.request_sync(height) else {
        return;
    };
    let suppress = shared.qry.should_suppress_events(height);
    if !suppress {
        crate::try_info!(ctx, "sync started rid={}", sync.rid);
    }
    let addresses = recoverable_addresses(shared);
    let end = if sync.unbounded {
        crate::client::BLOCK_HEIGHT_UNBOUND
    } else {
        sync.end_block
    };
    shared.client.get_transfers(
        CallbackState { rid: sync.rid },
        &addresses,
        sync.begin_block,
        end,
    );
}

fn recoverable_addresses(shared: &Arc<Shared>) -> Vec<String> {
    shared
        .primary_wallet
        .transfers()
        .iter()
        .map(|t| t.record().target)
        .collect()
}

/// Spec §4.6.3: the response-handling invariant. Late responses (stale
/// rid) are silently discarded; on success, bundles are recovered into
/// transfers and a gap-limit follow-up is issued under the *same* rid if
/// new addresses appeared.
fn on_transfers(
    ctx: &Context,
    shared: &Arc<Shared>,
    state: CallbackState,
    success: bool,
    bundles: Vec<TransferBundle>,
) {
    if !shared.qry.is_current_rid(state.rid) {
        crate::try_debug!(ctx, "discarding late sync response rid={}", state.rid);
        return;
    }

    if !success {
        shared.qry.mark_complete(false);
        return;
    }

    let old_addresses = recoverable_addresses(shared);

    let mut bundles = bundles;
    bundles.sort_by_key(|b| b.block_number);

    for bundle in &bundles {
        recover_transfer(ctx, shared, bundle);
    }

    let new_addresses = recoverable_addresses(shared);
    let diff: Vec<String> = new_addresses
        .into_iter()
        .filter(|addr| !old_addresses.contains(addr))
        .collect();

    if diff.is_empty() {
        shared.qry.mark_complete(true);
        *shared
            .has_completed_initial_sync
            .lock()
            .expect("manager lock poisoned") = true;
        let height = shared.network.height();
        if !shared.qry.should_suppress_events(height) {
            crate::try_info!(ctx, "sync stopped rid={}", state.rid);
        }
    } else {
        let sync = shared.qry.current_sync();
        shared
            .client
            .get_transfers(CallbackState { rid: sync.rid }, &diff, sync.begin_block, sync.end_block);
    }
}

/// Recovers one transfer from a persisted/remote bundle into the primary
/// wallet (spec §4.7 "Recover transfers from each bundle"). Ownership
/// direction (sent/received/recovered) is an address-handler concern
/// this core doesn't reimplement (spec §1); bundles recovered here are
/// always treated as `Received`, matching how a freshly-synced wallet
/// with no outbound history observes them.
fn recover_transfer(ctx: &Context, shared: &Arc<Shared>, bundle: &TransferBundle) {
    let unit = shared.primary_wallet.unit().clone();
    let fee_unit = shared.primary_wallet.fee_unit().clone();
    let amount_value: u128 = bundle.amount.parse().unwrap_or(0);

    let transfer = Transfer::new(
        shared.chain,
        shared.network.uids().0.clone(),
        shared.primary_wallet.transfer_listener(),
        unit,
        fee_unit,
        None,
        amount_value,
        TransferDirection::Received,
        bundle.source.clone(),
        bundle.target.clone(),
        Vec::new(),
    );
    transfer.set_hash(bundle.transaction_hash.clone());

    let info = wallet_core_types::IncludedInfo {
        block_number: bundle.block_number,
        block_index: bundle.transaction_index_in_block as u64,
        block_timestamp: bundle.block_timestamp,
        confirmed_fee_basis: None,
        success: true,
        error: None,
    };
    transfer.mark_included(ctx, info);

    shared.primary_wallet.add_transfer(ctx, transfer);
}

pub fn estimate_fee(
    shared_registry: &HandlerRegistry,
    chain: Chain,
    request: &crate::fee_basis::FeeEstimateRequest,
) -> Result<u128, CoreError> {
    shared_registry
        .wallet_manager_handler(chain)
        .and_then(|handler| {
            handler
                .estimate_fee(request)
                .map_err(|_| CoreError::Unsupported(chain))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NullClient;
    impl Client for NullClient {
        fn get_block_number(&self, _state: CallbackState) {}
        fn get_transactions(&self, _: CallbackState, _: &[String], _: u64, _: u64) {}
        fn get_transfers(&self, _: CallbackState, _: &[String], _: u64, _: u64) {}
        fn submit_transaction(&self, _: CallbackState, _: &str, _: &[u8]) {}
        fn estimate_transaction_fee(&self, _: CallbackState, _: &[u8], _: &str) {}
    }

    fn test_network() -> Arc<Network> {
        let data = wallet_core_types::NetworkDescriptorData {
            uids: Uids::new("bitcoin-mainnet"),
            display_name: "Bitcoin".into(),
            descriptor: wallet_core_types::NetworkDescriptor::Mainnet,
            is_mainnet: true,
            confirmations_until_final: 6,
            confirmation_period_seconds: 600,
            default_currency: Uids::new("btc"),
            default_address_scheme: wallet_core_types::AddressScheme::NativeSegwit,
            allowed_address_schemes: vec![wallet_core_types::AddressScheme::NativeSegwit],
            default_sync_mode: SyncMode::ApiOnly,
            allowed_sync_modes: vec![SyncMode::ApiOnly],
        };
        Arc::new(Network::new(data, 0, Vec::new()))
    }

    fn test_account() -> Arc<Account> {
        let seed = [7u8; 64];
        Arc::new(Account::from_seed(seed, "test-uids", 1_577_836_800).unwrap())
    }

    fn dead_listener<E: 'static>() -> Weak<dyn Fn(E) + Send + Sync> {
        let strong: Arc<dyn Fn(E) + Send + Sync> = Arc::new(|_event| {});
        Arc::downgrade(&strong)
    }

    #[test]
    fn manager_starts_in_created_state() {
        let manager = WalletManager::new(
            Context::empty(),
            Chain::Btc,
            test_network(),
            test_account(),
            Arc::new(NullClient),
            SyncMode::ApiOnly,
            None,
            Unit::base(Uids::new("btc"), "Bitcoin", "btc", "BTC"),
            Vec::new(),
            None,
            dead_listener(),
            dead_listener(),
        );
        assert_eq!(manager.state(), WalletManagerState::Created);
    }

    #[test]
    fn persisted_transfers_are_recovered_before_first_tick() {
        let manager = WalletManager::new(
            Context::empty(),
            Chain::Btc,
            test_network(),
            test_account(),
            Arc::new(NullClient),
            SyncMode::ApiOnly,
            None,
            Unit::base(Uids::new("btc"), "Bitcoin", "btc", "BTC"),
            vec![wallet_core_types::TransferBundle {
                status: wallet_core_types::BundleStatus::Confirmed,
                transaction_hash: "deadbeef".into(),
                transaction_id: None,
                uids: Uids::new("bitcoin-mainnet:deadbeef:0"),
                source: "addr-a".into(),
                target: "addr-b".into(),
                amount: "1000".into(),
                currency_code: "btc".into(),
                fee: None,
                transfer_index: 0,
                block_timestamp: 1_577_836_800,
                block_number: 100,
                confirmations: 6,
                transaction_index_in_block: 0,
                block_hash: "blockhash".into(),
                attributes: Vec::new(),
            }],
            None,
            dead_listener(),
            dead_listener(),
        );
        assert_eq!(manager.primary_wallet().transfers().len(), 1);
    }

    #[test]
    fn tick_increments_sync_tick_metric() {
        let metrics = Metrics::new();
        let manager = WalletManager::new(
            Context::empty(),
            Chain::Btc,
            test_network(),
            test_account(),
            Arc::new(NullClient),
            SyncMode::ApiOnly,
            None,
            Unit::base(Uids::new("btc"), "Bitcoin", "btc", "BTC"),
            Vec::new(),
            Some(metrics.clone()),
            dead_listener(),
            dead_listener(),
        );
        manager.connect(&Context::empty());
        on_tick(&Context::empty(), &manager.shared);
        assert_eq!(metrics.sync_ticks_total(), 1);
    }
}
