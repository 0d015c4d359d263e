//! The engine's handle around a [`TransferRecord`] (spec §4.5). Holds
//! ownership of the listener reference, unit, fee-unit, estimated
//! fee-basis, amount, direction, source/target and initial state; the
//! per-transfer lock guards identifier, state and the attribute list, per
//! spec §5's lock inventory.

use std::sync::{Arc, Mutex, Weak};

use wallet_core_types::{
    Chain, FeeBasis, IncludedInfo, TransferAttribute, TransferDirection, TransferRecord,
    TransferState, TransferSubmitError, Uids,
};

use crate::handlers::HandlerRegistry;
use crate::utils::Context;

struct Locked {
    record: TransferRecord,
}

/// Two optional hooks run before the `Created` event fires, letting
/// handler code finish chain-specific setup (spec §4.5 "Transfer
/// construction").
pub type PreCreateHook = Box<dyn FnOnce(&mut TransferRecord) + Send>;

pub struct Transfer {
    chain: Chain,
    network_uids: String,
    locked: Mutex<Locked>,
    listener: Weak<dyn Fn(wallet_core_types::TransferEvent) + Send + Sync>,
}

impl Transfer {
    pub fn new(
        chain: Chain,
        network_uids: impl Into<String>,
        listener: Weak<dyn Fn(wallet_core_types::TransferEvent) + Send + Sync>,
        unit: wallet_core_types::Unit,
        fee_unit: wallet_core_types::Unit,
        estimated_fee_basis: Option<FeeBasis>,
        amount_value: u128,
        direction: TransferDirection,
        source: impl Into<String>,
        target: impl Into<String>,
        hooks: Vec<PreCreateHook>,
    ) -> Arc<Transfer> {
        let mut record = TransferRecord {
            identifier: None,
            originating_transaction_id: None,
            source: source.into(),
            target: target.into(),
            amount: wallet_core_types::Amount::new(amount_value, false, unit),
            direction,
            fee_unit,
            estimated_fee_basis,
            state: TransferState::Created,
            attributes: Vec::new(),
        };
        for hook in hooks {
            hook(&mut record);
        }
        let transfer = Arc::new(Transfer {
            chain,
            network_uids: network_uids.into(),
            locked: Mutex::new(Locked { record }),
            listener,
        });
        transfer.emit(wallet_core_types::TransferEvent::Lifecycle(
            wallet_core_types::LifecycleEvent::Created,
        ));
        transfer
    }

    pub fn record(&self) -> TransferRecord {
        self.locked.lock().expect("transfer lock poisoned").record.clone()
    }

    pub fn state(&self) -> TransferState {
        self.locked.lock().expect("transfer lock poisoned").record.state.clone()
    }

    /// Lazily computes the identifier on first access: either via the
    /// chain's `derive_identifier` hook, or by encoding the transfer's
    /// hash into the network's string form. Remains `None` for a Created
    /// transfer without a hash yet (spec §4.5 "Identifier derivation").
    pub fn identifier(&self) -> Option<Uids> {
        let mut locked = self.locked.lock().expect("transfer lock poisoned");
        if locked.record.identifier.is_some() {
            return locked.record.identifier.clone();
        }
        let hash_hex = locked.record.originating_transaction_id.clone()?;
        let registry = HandlerRegistry::global();
        let handler = registry.transfer_handler(self.chain).ok()?;
        let derived = handler.derive_identifier(&self.network_uids, &hash_hex);
        let uids = Uids::new(derived);
        locked.record.identifier = Some(uids.clone());
        Some(uids)
    }

    /// Idempotent state transition: emits `TransferChanged` only when the
    /// new state differs under [`TransferState`]'s equality, unless
    /// `force` is set (spec §4.5 "SetState is idempotent").
    pub fn set_state(&self, ctx: &Context, new_state: TransferState, force: bool) {
        let changed = {
            let mut locked = self.locked.lock().expect("transfer lock poisoned");
            let changed = force || locked.record.state != new_state;
            locked.record.state = new_state;
            changed
        };
        if changed {
            crate::try_debug!(ctx, "transfer state changed");
            self.emit(wallet_core_types::TransferEvent::Lifecycle(
                wallet_core_types::LifecycleEvent::Changed((), ()),
            ));
        }
    }

    pub fn set_hash(&self, hash_hex: impl Into<String>) -> bool {
        let hash_hex = hash_hex.into();
        let mut locked = self.locked.lock().expect("transfer lock poisoned");
        let changed = locked.record.originating_transaction_id.as_deref() != Some(hash_hex.as_str());
        if changed {
            locked.record.originating_transaction_id = Some(hash_hex);
            locked.record.identifier = None;
        }
        changed
    }

    pub fn mark_errored(&self, ctx: &Context, error: TransferSubmitError) {
        self.set_state(ctx, TransferState::Errored(error), false);
    }

    pub fn mark_included(&self, ctx: &Context, info: IncludedInfo) {
        self.set_state(ctx, TransferState::Included(info), false);
    }

    /// Validates one attribute through the chain's vtable, aggregating
    /// per spec §4.5: missing value on a required attribute is
    /// `RequiredButNotProvided`; a handler-rejected shape is
    /// `MismatchedType`.
    pub fn validate_attribute(
        &self,
        attribute: &TransferAttribute,
    ) -> Result<(), wallet_core_types::TransferAttributeValidationError> {
        if attribute.required && attribute.value.is_none() {
            return Err(
                wallet_core_types::TransferAttributeValidationError::RequiredButNotProvided(
                    attribute.key.clone(),
                ),
            );
        }
        let registry = HandlerRegistry::global();
        if let Ok(handler) = registry.transfer_handler(self.chain) {
            handler
                .validate_attribute(&attribute.key, attribute.value.as_deref())
                .map_err(|_| {
                    wallet_core_types::TransferAttributeValidationError::MismatchedType(
                        attribute.key.clone(),
                    )
                })?;
        }
        Ok(())
    }

    pub fn add_attribute(&self, attribute: TransferAttribute) {
        self.locked
            .lock()
            .expect("transfer lock poisoned")
            .record
            .attributes
            .push(attribute);
    }

    fn emit(&self, event: wallet_core_types::TransferEvent) {
        if let Some(listener) = self.listener.upgrade() {
            listener(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wallet_core_types::Unit;

    fn test_unit() -> Unit {
        Unit::base(Uids::new("btc"), "Bitcoin", "btc", "BTC")
    }

    fn dead_listener() -> Weak<dyn Fn(wallet_core_types::TransferEvent) + Send + Sync> {
        let strong: Arc<dyn Fn(wallet_core_types::TransferEvent) + Send + Sync> =
            Arc::new(|_event| {});
        Arc::downgrade(&strong)
    }

    fn make_transfer() -> Arc<Transfer> {
        Transfer::new(
            Chain::Btc,
            "bitcoin-mainnet",
            dead_listener(),
            test_unit(),
            test_unit(),
            None,
            100,
            TransferDirection::Received,
            "addr-a",
            "addr-b",
            Vec::new(),
        )
    }

    #[test]
    fn identifier_is_none_until_hash_is_set() {
        let transfer = make_transfer();
        assert!(transfer.identifier().is_none());
        transfer.set_hash("deadbeef");
        assert_eq!(
            transfer.identifier().as_deref(),
            Some("bitcoin-mainnet:deadbeef")
        );
    }

    #[test]
    fn set_state_is_idempotent_without_force() {
        let transfer = make_transfer();
        let ctx = Context::empty();
        transfer.set_state(&ctx, TransferState::Signed, false);
        assert_eq!(transfer.state().as_tag(), "signed");
        // Re-applying the same state is a no-op, not an error.
        transfer.set_state(&ctx, TransferState::Signed, false);
        assert_eq!(transfer.state().as_tag(), "signed");
    }

    #[test]
    fn required_attribute_without_value_is_rejected() {
        let transfer = make_transfer();
        let attribute = TransferAttribute {
            key: "destination-tag".into(),
            value: None,
            required: true,
        };
        let err = transfer.validate_attribute(&attribute).unwrap_err();
        assert!(matches!(
            err,
            wallet_core_types::TransferAttributeValidationError::RequiredButNotProvided(_)
        ));
    }
}
