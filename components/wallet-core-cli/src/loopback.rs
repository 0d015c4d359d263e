//! In-process demo backend: a [`Client`] that answers every request by
//! calling straight back into the [`WalletManager`] it's bound to, instead
//! of reaching out over a network. Exists so `service start` has something
//! to sync against without a real QRY indexer configured.

use std::sync::{Arc, Mutex, Weak};

use wallet_core::client::{CallbackState, Client};
use wallet_core::manager::WalletManager;

pub struct LoopbackClient {
    manager: Mutex<Option<Weak<WalletManager>>>,
    chain_tip: Mutex<u64>,
}

impl LoopbackClient {
    pub fn new(chain_tip: u64) -> Arc<LoopbackClient> {
        Arc::new(LoopbackClient {
            manager: Mutex::new(None),
            chain_tip: Mutex::new(chain_tip),
        })
    }

    /// Wires the client to the manager it serves. Called once the manager
    /// has been constructed, since the manager itself needs an `Arc<dyn
    /// Client>` before it exists.
    pub fn bind(&self, manager: &Arc<WalletManager>) {
        *self.manager.lock().expect("loopback lock poisoned") = Some(Arc::downgrade(manager));
    }

    fn manager(&self) -> Option<Arc<WalletManager>> {
        self.manager
            .lock()
            .expect("loopback lock poisoned")
            .as_ref()
            .and_then(Weak::upgrade)
    }
}

impl Client for LoopbackClient {
    fn get_block_number(&self, state: CallbackState) {
        let Some(manager) = self.manager() else { return };
        let tip = *self.chain_tip.lock().expect("loopback lock poisoned");
        let _ = state;
        manager.on_block_number(true, tip, Some(format!("demo-block-{tip}")));
    }

    fn get_transactions(&self, _state: CallbackState, _addresses: &[String], _begin_block: u64, _end_block: u64) {}

    fn get_transfers(&self, state: CallbackState, _addresses: &[String], _begin_block: u64, _end_block: u64) {
        let Some(manager) = self.manager() else { return };
        manager.on_transfers(state, true, Vec::new());
    }

    fn submit_transaction(&self, _state: CallbackState, _identifier: &str, _serialization: &[u8]) {}

    fn estimate_transaction_fee(&self, _state: CallbackState, _serialization: &[u8], _hash_hex: &str) {}
}
