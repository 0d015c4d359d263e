pub mod account;
pub mod address;
pub mod client;
pub mod crypto;
pub mod error;
pub mod events;
pub mod fee_basis;
pub mod handlers;
pub mod manager;
pub mod metrics;
pub mod network;
pub mod persistence;
pub mod system;
pub mod transfer;
pub mod utils;
pub mod wallet;

pub use account::Account;
pub use address::Address;
pub use client::{Client, ClientAnnouncer};
pub use error::CoreError;
pub use handlers::HandlerRegistry;
pub use manager::WalletManager;
pub use metrics::Metrics;
pub use network::Network;
pub use persistence::{FileService, LocalFileService};
pub use system::System;
pub use transfer::Transfer;
pub use utils::Context;
pub use wallet::Wallet;
