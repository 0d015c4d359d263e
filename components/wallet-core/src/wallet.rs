//! Wallet aggregate (spec §4.5). A wallet owns one balance currency and
//! tracks every [`Transfer`] that touches it. Per spec §5's locking model
//! wallets use a recursive mutex because `add_transfer` can run while
//! already iterating under the same lock (e.g. from inside the sync
//! response handler); Rust has no built-in recursive `Mutex`, so the
//! recursive-call path is split into a public entry point that takes the
//! lock once and a private `*_locked` continuation that assumes it's
//! already held (Design Notes §9's redesign of the C original's recursive
//! mutex).

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use wallet_core_types::{
    Amount, Chain, FeeBasis, LifecycleEvent, TransferAttribute, TransferAttributeValidationError,
    TransferDirection, TransferEvent, TransferState, Uids, Unit, WalletEvent,
};

use crate::handlers::HandlerRegistry;
use crate::transfer::Transfer;
use crate::utils::Context;

struct Inner {
    balance: Amount,
    transfers: Vec<Arc<Transfer>>,
    by_identifier: HashMap<Uids, usize>,
}

pub struct Wallet {
    chain: Chain,
    unit: Unit,
    fee_unit: Unit,
    listener: Weak<dyn Fn(WalletEvent) + Send + Sync>,
    /// Forwards a transfer's own lifecycle changes to `TransferChanged` on
    /// this wallet's listener (spec §4.5/§4.6.4: wallet-level listeners
    /// observe transfer lifecycle transitions). Kept alive for the
    /// wallet's lifetime; every `Transfer` belonging to this wallet is
    /// constructed with `Arc::downgrade(&transfer_listener)`.
    transfer_listener: Arc<dyn Fn(TransferEvent) + Send + Sync>,
    inner: Mutex<Inner>,
}

impl Wallet {
    pub fn new(
        chain: Chain,
        unit: Unit,
        fee_unit: Unit,
        listener: Weak<dyn Fn(WalletEvent) + Send + Sync>,
    ) -> Arc<Wallet> {
        let balance = Amount::zero(unit.clone());
        let forwarded = listener.clone();
        let transfer_listener: Arc<dyn Fn(TransferEvent) + Send + Sync> = Arc::new(move |event| {
            if let TransferEvent::Lifecycle(LifecycleEvent::Changed(_, _)) = event {
                if let Some(listener) = forwarded.upgrade() {
                    listener(WalletEvent::TransferChanged { uids: None });
                }
            }
        });
        Arc::new(Wallet {
            chain,
            unit,
            fee_unit,
            listener,
            transfer_listener,
            inner: Mutex::new(Inner {
                balance,
                transfers: Vec::new(),
                by_identifier: HashMap::new(),
            }),
        })
    }

    /// A weak handle to this wallet's transfer-lifecycle forwarder; pass to
    /// every [`Transfer`] constructed for this wallet in place of a dead
    /// listener, so the transfer's own `set_state`/`mark_included`/
    /// `mark_errored` calls surface on the wallet too.
    pub fn transfer_listener(&self) -> Weak<dyn Fn(TransferEvent) + Send + Sync> {
        Arc::downgrade(&self.transfer_listener)
    }

    pub fn unit(&self) -> &Unit {
        &self.unit
    }

    pub fn balance(&self) -> Amount {
        self.inner.lock().expect("wallet lock poisoned").balance.clone()
    }

    pub fn transfer_count(&self) -> usize {
        self.inner.lock().expect("wallet lock poisoned").transfers.len()
    }

    pub fn transfers(&self) -> Vec<Arc<Transfer>> {
        self.inner.lock().expect("wallet lock poisoned").transfers.clone()
    }

    /// Public entry point: takes the wallet lock once, then recomputes
    /// balance and emits events while still holding it, per spec §5(b)
    /// ("state changes and the events announcing them are emitted while
    /// holding the relevant lock").
    pub fn add_transfer(&self, ctx: &Context, transfer: Arc<Transfer>) {
        let mut guard = self.inner.lock().expect("wallet lock poisoned");
        self.add_transfer_locked(ctx, &mut guard, transfer);
    }

    fn add_transfer_locked(&self, ctx: &Context, guard: &mut MutexGuard<Inner>, transfer: Arc<Transfer>) {
        let old_balance = guard.balance.clone();
        if let Some(identifier) = transfer.identifier() {
            guard.by_identifier.insert(identifier, guard.transfers.len());
        }
        guard.transfers.push(transfer);
        self.recompute_balance_locked(guard);
        self.emit_if_changed(ctx, guard, &old_balance);
        self.emit(WalletEvent::TransferAdded { uids: None });
    }

    /// Marks a transfer as handed off for broadcast (spec §4.6.4 step 4);
    /// called by the wallet manager right after `submit_transfer` adds the
    /// transfer to this wallet, since "submitted" is a manager-observed
    /// milestone rather than a `Transfer` state transition on its own.
    pub fn notify_transfer_submitted(&self, identifier: Option<Uids>) {
        self.emit(WalletEvent::TransferSubmitted { uids: identifier });
    }

    /// Drops a transfer from this wallet (original_source
    /// `cryptoWalletRemTransfer`), recomputing balance and emitting
    /// `TransferDeleted`. Used when a rescan/reorg shows a previously
    /// recovered transfer no longer belongs to the wallet's history.
    pub fn remove_transfer(&self, ctx: &Context, identifier: &Uids) -> bool {
        let mut guard = self.inner.lock().expect("wallet lock poisoned");
        let Some(&index) = guard.by_identifier.get(identifier) else {
            return false;
        };
        let old_balance = guard.balance.clone();
        guard.transfers.remove(index);
        guard.by_identifier.clear();
        for (i, transfer) in guard.transfers.iter().enumerate() {
            if let Some(id) = transfer.identifier() {
                guard.by_identifier.insert(id, i);
            }
        }
        self.recompute_balance_locked(&mut guard);
        self.emit_if_changed(ctx, &mut guard, &old_balance);
        self.emit(WalletEvent::TransferDeleted {
            uids: Some(identifier.clone()),
        });
        true
    }

    /// Fast path: on a single transfer's Included(old) -> Included(new)
    /// transition where only the fee differs, apply the delta instead of
    /// a full recompute (spec §4.5). Any other fee-invalidating
    /// transition (Errored, or a reorg that changes more than the fee)
    /// should call [`Wallet::recompute_balance`] instead.
    pub fn apply_fee_delta(&self, ctx: &Context, old_fee: u128, new_fee: u128) {
        if old_fee == new_fee {
            return;
        }
        let mut guard = self.inner.lock().expect("wallet lock poisoned");
        let old_balance = guard.balance.clone();
        let delta = new_fee as i128 - old_fee as i128;
        let current = guard.balance.as_base_units() as i128;
        let adjusted = current - delta;
        guard.balance = amount_from_base_units(adjusted, self.unit.clone());
        self.emit_if_changed(ctx, &mut guard, &old_balance);
    }

    pub fn recompute_balance(&self, ctx: &Context) {
        let mut guard = self.inner.lock().expect("wallet lock poisoned");
        let old_balance = guard.balance.clone();
        self.recompute_balance_locked(&mut guard);
        self.emit_if_changed(ctx, &mut guard, &old_balance);
    }

    /// The balance algorithm verbatim from spec §4.5: skip Errored
    /// transfers; for every remaining transfer whose unit is compatible
    /// with the wallet's, add its signed amount, then subtract the fee
    /// when the fee unit is compatible and the direction isn't Received.
    fn recompute_balance_locked(&self, guard: &mut MutexGuard<Inner>) {
        let registry = HandlerRegistry::global();
        let handler = registry.wallet_handler(self.chain).ok();

        let mut total: i128 = 0;
        for transfer in &guard.transfers {
            let record = transfer.record();
            if matches!(record.state, TransferState::Errored(_)) {
                continue;
            }
            if !record.amount.unit.is_compatible_with(&self.unit) {
                continue;
            }
            let mut v = record.signed_amount();
            let fee_compatible = handler
                .map(|h| h.fee_unit_compatible(&record.fee_unit.code, &self.unit.code))
                .unwrap_or_else(|| record.fee_unit.is_compatible_with(&self.unit));
            if fee_compatible && record.direction != TransferDirection::Received {
                if let Some(basis) = fee_from_state(&record.state).or(record.estimated_fee_basis.as_ref()) {
                    v -= basis.fee() as i128;
                }
            }
            total += v;
        }
        guard.balance = amount_from_base_units(total, self.unit.clone());
    }

    fn emit_if_changed(&self, ctx: &Context, guard: &mut MutexGuard<Inner>, old_balance: &Amount) {
        let differs = !matches!(guard.balance.compare(old_balance), Ok(std::cmp::Ordering::Equal));
        if differs {
            crate::try_debug!(ctx, "wallet balance updated");
            self.emit(WalletEvent::BalanceUpdated);
        }
    }

    /// Validates every provided attribute through the transfer vtable,
    /// aggregating any failure into `RelationshipInconsistency` (spec
    /// §4.5 "Transfer attributes").
    pub fn validate_attributes(
        &self,
        transfer: &Transfer,
        attributes: &[TransferAttribute],
    ) -> Result<(), TransferAttributeValidationError> {
        for attribute in attributes {
            transfer
                .validate_attribute(attribute)
                .map_err(|_| TransferAttributeValidationError::RelationshipInconsistency)?;
        }
        Ok(())
    }

    pub fn fee_unit(&self) -> &Unit {
        &self.fee_unit
    }

    pub fn fee_basis_estimated(&self, cookie: u64, basis: Option<FeeBasis>) {
        let status = if basis.is_some() {
            wallet_core_types::FeeEstimateStatus::Success
        } else {
            wallet_core_types::FeeEstimateStatus::Failure
        };
        self.emit(WalletEvent::FeeBasisEstimated {
            status,
            cookie,
            basis,
        });
    }

    fn emit(&self, event: WalletEvent) {
        if let Some(listener) = self.listener.upgrade() {
            listener(event);
        }
    }
}

fn fee_from_state(state: &TransferState) -> Option<&FeeBasis> {
    match state {
        TransferState::Included(info) => info.confirmed_fee_basis.as_ref(),
        _ => None,
    }
}

fn amount_from_base_units(value: i128, unit: Unit) -> Amount {
    let negative = value < 0;
    let magnitude = value.unsigned_abs();
    let scale = 10u128.pow(unit.decimals);
    let scaled = if scale == 0 { magnitude } else { magnitude / scale };
    Amount::new(scaled, negative, unit)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wallet_core_types::TransferDirection;

    fn test_unit() -> Unit {
        Unit::base(Uids::new("btc"), "Bitcoin", "btc", "BTC")
    }

    fn dead_listener<E: 'static>() -> Weak<dyn Fn(E) + Send + Sync> {
        let strong: Arc<dyn Fn(E) + Send + Sync> = Arc::new(|_event| {});
        Arc::downgrade(&strong)
    }

    #[test]
    fn balance_sums_received_minus_sent_skipping_errored() {
        let wallet = Wallet::new(Chain::Btc, test_unit(), test_unit(), dead_listener());
        let ctx = Context::empty();

        let received = Transfer::new(
            Chain::Btc,
            "bitcoin-mainnet",
            dead_listener(),
            test_unit(),
            test_unit(),
            None,
            1_000,
            TransferDirection::Received,
            "a",
            "b",
            Vec::new(),
        );
        wallet.add_transfer(&ctx, received);

        let sent = Transfer::new(
            Chain::Btc,
            "bitcoin-mainnet",
            dead_listener(),
            test_unit(),
            test_unit(),
            None,
            300,
            TransferDirection::Sent,
            "b",
            "c",
            Vec::new(),
        );
        wallet.add_transfer(&ctx, sent);

        let errored = Transfer::new(
            Chain::Btc,
            "bitcoin-mainnet",
            dead_listener(),
            test_unit(),
            test_unit(),
            None,
            5_000,
            TransferDirection::Sent,
            "a",
            "b",
            Vec::new(),
        );
        errored.mark_errored(&ctx, wallet_core_types::TransferSubmitError::Unknown);
        wallet.add_transfer(&ctx, errored);

        assert_eq!(wallet.balance().value, 700);
        assert_eq!(wallet.transfer_count(), 3);
    }

    #[test]
    fn recovered_transfer_contributes_zero() {
        let wallet = Wallet::new(Chain::Btc, test_unit(), test_unit(), dead_listener());
        let ctx = Context::empty();
        let recovered = Transfer::new(
            Chain::Btc,
            "bitcoin-mainnet",
            dead_listener(),
            test_unit(),
            test_unit(),
            None,
            9_999,
            TransferDirection::Recovered,
            "a",
            "b",
            Vec::new(),
        );
        wallet.add_transfer(&ctx, recovered);
        assert_eq!(wallet.balance().value, 0);
    }

    #[test]
    fn transfer_state_change_forwards_to_wallet_listener() {
        use std::sync::Mutex as StdMutex;

        let events: Arc<StdMutex<Vec<WalletEvent>>> = Arc::new(StdMutex::new(Vec::new()));
        let sink = events.clone();
        let strong: Arc<dyn Fn(WalletEvent) + Send + Sync> = Arc::new(move |event| {
            sink.lock().unwrap().push(event);
        });
        let wallet = Wallet::new(Chain::Btc, test_unit(), test_unit(), Arc::downgrade(&strong));
        let ctx = Context::empty();

        let transfer = Transfer::new(
            Chain::Btc,
            "bitcoin-mainnet",
            wallet.transfer_listener(),
            test_unit(),
            test_unit(),
            None,
            100,
            TransferDirection::Sent,
            "a",
            "b",
            Vec::new(),
        );
        wallet.add_transfer(&ctx, transfer.clone());
        transfer.set_state(&ctx, TransferState::Signed, false);

        let recorded = events.lock().unwrap();
        assert!(recorded
            .iter()
            .any(|e| matches!(e, WalletEvent::TransferChanged { .. })));
    }

    #[test]
    fn remove_transfer_emits_deleted_and_adjusts_balance() {
        let wallet = Wallet::new(Chain::Btc, test_unit(), test_unit(), dead_listener());
        let ctx = Context::empty();
        let transfer = Transfer::new(
            Chain::Btc,
            "bitcoin-mainnet",
            dead_listener(),
            test_unit(),
            test_unit(),
            None,
            1_000,
            TransferDirection::Received,
            "a",
            "b",
            Vec::new(),
        );
        transfer.set_hash("deadbeef");
        let identifier = transfer.identifier().unwrap();
        wallet.add_transfer(&ctx, transfer);
        assert_eq!(wallet.balance().value, 1_000);

        assert!(wallet.remove_transfer(&ctx, &identifier));
        assert_eq!(wallet.balance().value, 0);
        assert_eq!(wallet.transfer_count(), 0);
        assert!(!wallet.remove_transfer(&ctx, &identifier));
    }
}
