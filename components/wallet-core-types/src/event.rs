use crate::{FeeBasis, Uids};

/// Generic Created/Changed/Deleted shape shared by System/Network/
/// WalletManager/Wallet/Transfer events (spec §3, Event objects).
#[derive(Clone, Debug)]
pub enum LifecycleEvent<S> {
    Created,
    Changed(S, S),
    Deleted,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SystemState {
    Created,
    Connected,
    Syncing,
    Disconnected,
}

#[derive(Clone, Debug)]
pub enum SystemEvent {
    Lifecycle(LifecycleEvent<SystemState>),
    NetworkAdded,
    ManagerAdded,
}

#[derive(Clone, Debug)]
pub enum NetworkEvent {
    Lifecycle(LifecycleEvent<()>),
    FeesUpdated,
    BlockHeightUpdated { old: u64, new: u64 },
    CurrenciesUpdated,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WalletManagerState {
    Created,
    Disconnected,
    Connected,
    Syncing,
    Deleted,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DisconnectReason {
    Requested,
    Unknown,
    Posix(i32),
}

#[derive(Clone, Debug)]
pub enum WalletManagerEvent {
    Lifecycle(LifecycleEvent<WalletManagerState>),
    SyncStarted,
    SyncContinues,
    SyncStopped(DisconnectReason),
    BlockHeightUpdated { old: u64, new: u64 },
}

#[derive(Clone, Debug)]
pub enum WalletEvent {
    Lifecycle(LifecycleEvent<()>),
    TransferAdded { uids: Option<Uids> },
    TransferChanged { uids: Option<Uids> },
    TransferSubmitted { uids: Option<Uids> },
    TransferDeleted { uids: Option<Uids> },
    BalanceUpdated,
    FeeBasisUpdated,
    FeeBasisEstimated {
        status: FeeEstimateStatus,
        cookie: u64,
        basis: Option<FeeBasis>,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FeeEstimateStatus {
    Success,
    Failure,
}

#[derive(Clone, Debug)]
pub enum TransferEvent {
    Lifecycle(LifecycleEvent<()>),
}
