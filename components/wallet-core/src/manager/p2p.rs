//! The optional P2P sub-manager vtable (spec §4.6). Only chains that ship
//! a peer-to-peer backend register one; its presence (or absence) at
//! manager-creation time constrains which [`SyncMode`]s are selectable.

use wallet_core_types::SyncMode;

pub trait P2PSubManager: Send + Sync {
    fn connect(&self);
    fn disconnect(&self);

    /// Requests a sync over `[begin_block, end_block)` for `addresses`.
    /// Results surface the same way QRY's do: asynchronously, through the
    /// manager's announce path.
    fn sync(&self, addresses: &[String], begin_block: u64, end_block: u64);

    fn send(&self, identifier: &str, serialization: &[u8]);

    /// `None` when the backend has no reachability signal; `Some(false)`
    /// triggers a fallback to QRY where the mode permits it.
    fn is_reachable(&self) -> Option<bool> {
        None
    }
}

/// Resolves which source serves sync and which serves send for a given
/// mode (spec §4.6 mode-selection table).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Qry,
    P2p,
}

/// `has_completed_initial_sync` distinguishes `P2pSyncApiInitial`'s two
/// phases: QRY drives the first sync, P2P every one after (spec §4.6 mode
/// table, "P2P + API sync").
pub fn sync_source(mode: SyncMode, has_completed_initial_sync: bool) -> Source {
    match mode {
        SyncMode::ApiOnly | SyncMode::ApiSyncP2pSend => Source::Qry,
        SyncMode::P2pSyncApiInitial => {
            if has_completed_initial_sync {
                Source::P2p
            } else {
                Source::Qry
            }
        }
        SyncMode::P2pOnly => Source::P2p,
    }
}

pub fn send_source(mode: SyncMode) -> Source {
    match mode {
        SyncMode::ApiOnly => Source::Qry,
        SyncMode::ApiSyncP2pSend | SyncMode::P2pSyncApiInitial | SyncMode::P2pOnly => Source::P2p,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_selection_table_matches_spec() {
        assert_eq!(sync_source(SyncMode::ApiOnly, false), Source::Qry);
        assert_eq!(send_source(SyncMode::ApiOnly), Source::Qry);

        assert_eq!(sync_source(SyncMode::ApiSyncP2pSend, true), Source::Qry);
        assert_eq!(send_source(SyncMode::ApiSyncP2pSend), Source::P2p);

        assert_eq!(sync_source(SyncMode::P2pSyncApiInitial, false), Source::Qry);
        assert_eq!(sync_source(SyncMode::P2pSyncApiInitial, true), Source::P2p);
        assert_eq!(send_source(SyncMode::P2pSyncApiInitial), Source::P2p);

        assert_eq!(sync_source(SyncMode::P2pOnly, false), Source::P2p);
        assert_eq!(send_source(SyncMode::P2pOnly), Source::P2p);
    }
}
