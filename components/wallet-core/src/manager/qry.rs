//! The QRY (remote-indexer) sub-manager (spec §4.6). Always constructed,
//! regardless of sync mode -- even P2P-only managers keep one around
//! since currency-bundle ingestion and fee estimation still flow through
//! it in several modes.

use std::sync::Mutex;

pub const OFFSET_BLOCKS_SECONDS: u64 = 259_200;
const MIN_OFFSET_BLOCKS: u64 = 100;

/// `(rid, begin_block, end_block, completed, success, unbounded)` (spec
/// §4.6). A fresh `rid` on every new sync round lets late responses from a
/// superseded round be detected and discarded (spec §4.6.3).
#[derive(Debug, Clone, Copy)]
pub struct SyncRecord {
    pub rid: u64,
    pub begin_block: u64,
    pub end_block: u64,
    pub completed: bool,
    pub success: bool,
    pub unbounded: bool,
}

impl SyncRecord {
    fn initial() -> SyncRecord {
        SyncRecord {
            rid: 0,
            begin_block: 0,
            end_block: 0,
            completed: true,
            success: true,
            unbounded: false,
        }
    }
}

struct State {
    next_rid: u64,
    sync: SyncRecord,
    connected: bool,
}

pub struct QrySubManager {
    offset: u64,
    state: Mutex<State>,
}

impl QrySubManager {
    /// `offset` defaults to `OFFSET_BLOCKS_SECONDS / confirmation_period`,
    /// floored at 100 blocks (spec §4.6).
    pub fn new(confirmation_period_seconds: u64) -> QrySubManager {
        let offset = if confirmation_period_seconds == 0 {
            MIN_OFFSET_BLOCKS
        } else {
            (OFFSET_BLOCKS_SECONDS / confirmation_period_seconds).max(MIN_OFFSET_BLOCKS)
        };
        QrySubManager {
            offset,
            state: Mutex::new(State {
                next_rid: 1,
                sync: SyncRecord::initial(),
                connected: false,
            }),
        }
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn set_connected(&self, connected: bool) {
        self.state.lock().expect("qry lock poisoned").connected = connected;
    }

    pub fn is_connected(&self) -> bool {
        self.state.lock().expect("qry lock poisoned").connected
    }

    pub fn current_sync(&self) -> SyncRecord {
        self.state.lock().expect("qry lock poisoned").sync
    }

    /// Step 1-3 of `RequestSync` (spec §4.6.2). Returns the new sync
    /// record if a request should be issued, or `None` if
    /// `begin_block >= end_block` (nothing new to fetch).
    pub fn request_sync(&self, network_height: u64) -> Option<SyncRecord> {
        let mut state = self.state.lock().expect("qry lock poisoned");

        if state.sync.completed && state.sync.success {
            state.sync.begin_block = state.sync.end_block.saturating_sub(self.offset);
        }
        state.sync.end_block = network_height.max(state.sync.begin_block);

        if state.sync.begin_block >= state.sync.end_block {
            return None;
        }

        let rid = state.next_rid;
        state.next_rid += 1;
        state.sync.rid = rid;
        state.sync.completed = false;
        Some(state.sync)
    }

    /// Follow-up request for a gap-limit expansion round: keeps the same
    /// `rid` (spec §4.6.3 "without changing requestId across the
    /// round-trip chain").
    pub fn current_rid(&self) -> u64 {
        self.state.lock().expect("qry lock poisoned").sync.rid
    }

    /// True if `rid` is still the in-flight sync's rid; false means a
    /// late, superseded response (spec §4.6.3 step 1).
    pub fn is_current_rid(&self, rid: u64) -> bool {
        self.state.lock().expect("qry lock poisoned").sync.rid == rid
    }

    pub fn mark_complete(&self, success: bool) {
        let mut state = self.state.lock().expect("qry lock poisoned");
        state.sync.completed = true;
        state.sync.success = success;
    }

    /// Whether sync lifecycle events should be suppressed for this round:
    /// an incremental sync close to the chain tip generates no events,
    /// matching P2P's silent per-block progress (spec §4.6.3 step 4).
    pub fn should_suppress_events(&self, network_height: u64) -> bool {
        let state = self.state.lock().expect("qry lock poisoned");
        let threshold = network_height.saturating_sub(2 * self.offset);
        state.sync.begin_block >= threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offset_is_floored_at_100_blocks() {
        // A very long confirmation period would otherwise yield an offset
        // under 100.
        let qry = QrySubManager::new(1_000_000);
        assert_eq!(qry.offset(), MIN_OFFSET_BLOCKS);
    }

    #[test]
    fn offset_uses_three_day_window_divided_by_confirmation_period() {
        let qry = QrySubManager::new(600);
        assert_eq!(qry.offset(), OFFSET_BLOCKS_SECONDS / 600);
    }

    #[test]
    fn request_sync_advances_begin_block_after_successful_completion() {
        let qry = QrySubManager::new(600);
        let first = qry.request_sync(1_000).unwrap();
        assert_eq!(first.begin_block, 0);
        assert_eq!(first.end_block, 1_000);
        qry.mark_complete(true);

        let second = qry.request_sync(1_500).unwrap();
        assert_eq!(second.begin_block, 1_000u64.saturating_sub(qry.offset()));
        assert_eq!(second.end_block, 1_500);
        assert_ne!(second.rid, first.rid);
    }

    #[test]
    fn request_sync_returns_none_when_nothing_new() {
        let qry = QrySubManager::new(600);
        // Network height 0 == the initial begin_block -> nothing to fetch.
        assert!(qry.request_sync(0).is_none());
    }

    #[test]
    fn late_response_with_stale_rid_is_detected() {
        let qry = QrySubManager::new(600);
        let sync = qry.request_sync(1_000).unwrap();
        qry.mark_complete(true);
        let _next = qry.request_sync(2_000).unwrap();
        assert!(!qry.is_current_rid(sync.rid));
    }
}
