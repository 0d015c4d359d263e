//! External collaborator contract (spec §6). Four non-blocking functions
//! the host application implements against a remote indexer or node; each
//! delivers its result asynchronously through the matching `announce_*`
//! call rather than a return value, mirroring `chainhook-sdk`'s observer
//! commands crossing a thread boundary via callback rather than a direct
//! return.

use wallet_core_types::{BundleStatus, CurrencyBundle, TransactionBundle, TransferBundle};

/// Sentinel for an unbounded sync window's end (spec §6).
pub const BLOCK_HEIGHT_UNBOUND: u64 = u64::MAX;

/// Opaque state threaded from a request through to its matching announce
/// call; the manager stashes its `rid` here (spec §4.6.3).
#[derive(Debug, Clone, Copy)]
pub struct CallbackState {
    pub rid: u64,
}

/// The four non-blocking requests a [`Client`] must be able to issue
/// (spec §6). None of them return a value -- the result always arrives
/// later through [`ClientAnnouncer`].
pub trait Client: Send + Sync {
    fn get_block_number(&self, state: CallbackState);

    fn get_transactions(
        &self,
        state: CallbackState,
        addresses: &[String],
        begin_block: u64,
        end_block: u64,
    );

    fn get_transfers(
        &self,
        state: CallbackState,
        addresses: &[String],
        begin_block: u64,
        end_block: u64,
    );

    fn submit_transaction(&self, state: CallbackState, identifier: &str, serialization: &[u8]);

    fn estimate_transaction_fee(&self, state: CallbackState, serialization: &[u8], hash_hex: &str);
}

/// The upward half of the contract: what a [`Client`] implementation
/// calls back into once a request resolves (spec §6 "Announce API").
/// Each announce is itself non-blocking -- it only enqueues onto the
/// owning manager's event loop (spec §5 "suspension points").
pub trait ClientAnnouncer: Send + Sync {
    fn announce_block_number(
        &self,
        state: CallbackState,
        success: bool,
        block_number: u64,
        block_hash: Option<String>,
    );

    fn announce_transactions(&self, state: CallbackState, success: bool, bundles: Vec<TransactionBundle>);

    fn announce_transfers(&self, state: CallbackState, success: bool, bundles: Vec<TransferBundle>);

    fn announce_submit_transfer(
        &self,
        state: CallbackState,
        identifier: Option<String>,
        hash: Option<String>,
        success: bool,
    );

    fn announce_estimate_transaction_fee(
        &self,
        state: CallbackState,
        success: bool,
        cost_units: u64,
        attributes: Vec<(String, Option<String>)>,
    );

    fn announce_currencies(&self, bundles: Vec<CurrencyBundle>);
}

/// Helper used by tests and by in-process demo clients (the CLI's
/// simulated backend) -- a [`ClientAnnouncer`] that just records every
/// call for later inspection instead of forwarding into a running
/// manager.
#[derive(Default)]
pub struct RecordingAnnouncer {
    pub block_numbers: std::sync::Mutex<Vec<(u64, Option<String>)>>,
    pub transaction_batches: std::sync::Mutex<Vec<Vec<TransactionBundle>>>,
    pub transfer_batches: std::sync::Mutex<Vec<Vec<TransferBundle>>>,
}

impl ClientAnnouncer for RecordingAnnouncer {
    fn announce_block_number(
        &self,
        _state: CallbackState,
        success: bool,
        block_number: u64,
        block_hash: Option<String>,
    ) {
        if success {
            self.block_numbers.lock().unwrap().push((block_number, block_hash));
        }
    }

    fn announce_transactions(&self, _state: CallbackState, success: bool, bundles: Vec<TransactionBundle>) {
        if success {
            self.transaction_batches.lock().unwrap().push(bundles);
        }
    }

    fn announce_transfers(&self, _state: CallbackState, success: bool, bundles: Vec<TransferBundle>) {
        if success {
            self.transfer_batches.lock().unwrap().push(bundles);
        }
    }

    fn announce_submit_transfer(
        &self,
        _state: CallbackState,
        _identifier: Option<String>,
        _hash: Option<String>,
        _success: bool,
    ) {
    }

    fn announce_estimate_transaction_fee(
        &self,
        _state: CallbackState,
        _success: bool,
        _cost_units: u64,
        _attributes: Vec<(String, Option<String>)>,
    ) {
    }

    fn announce_currencies(&self, _bundles: Vec<CurrencyBundle>) {}
}

pub fn unconfirmed_bundle(raw: Vec<u8>, timestamp: u64) -> TransactionBundle {
    TransactionBundle {
        status: BundleStatus::Unconfirmed,
        raw,
        timestamp,
        block_height: 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_announcer_drops_failed_block_number() {
        let announcer = RecordingAnnouncer::default();
        announcer.announce_block_number(CallbackState { rid: 1 }, false, 100, None);
        assert!(announcer.block_numbers.lock().unwrap().is_empty());
        announcer.announce_block_number(CallbackState { rid: 1 }, true, 100, Some("hash".into()));
        assert_eq!(announcer.block_numbers.lock().unwrap().len(), 1);
    }
}
