extern crate serde;

#[macro_use]
extern crate serde_derive;

pub mod bundle;
pub mod currency;
pub mod event;
pub mod network;
pub mod transfer;

pub use bundle::*;
pub use currency::*;
pub use event::*;
pub use network::*;
pub use transfer::*;

/// Every cross-chain entity (account, network, wallet, transfer, ...) in the
/// core is tagged by one of these variants; the handler registry in
/// `wallet-core::handlers` is keyed by this enum.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Chain {
    Btc,
    Bch,
    Bsv,
    Ltc,
    Doge,
    Eth,
    Xrp,
    Hbar,
    Xtz,
    Xlm,
    Avax,
    /// Only registered under `#[cfg(test)]`; lets unit tests exercise the
    /// handler-dispatch path without depending on a real chain's crypto.
    #[cfg(test)]
    Test,
}

impl Chain {
    pub fn all() -> &'static [Chain] {
        &[
            Chain::Btc,
            Chain::Bch,
            Chain::Bsv,
            Chain::Ltc,
            Chain::Doge,
            Chain::Eth,
            Chain::Xrp,
            Chain::Hbar,
            Chain::Xtz,
            Chain::Xlm,
            Chain::Avax,
        ]
    }

    /// UTXO-style chains use transaction bundles; account-style chains use
    /// transfer bundles (spec §4.6.2).
    pub fn is_utxo_style(&self) -> bool {
        matches!(
            self,
            Chain::Btc | Chain::Bch | Chain::Bsv | Chain::Ltc | Chain::Doge
        )
    }
}

/// Opaque, external-assigned identifier used for set identity of transfers,
/// currencies and networks (GLOSSARY: UIDS).
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Uids(pub String);

impl Uids {
    pub fn new<S: Into<String>>(s: S) -> Self {
        Uids(s.into())
    }
}

impl std::fmt::Display for Uids {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for Uids {
    fn from(s: String) -> Self {
        Uids(s)
    }
}

impl From<&str> for Uids {
    fn from(s: &str) -> Self {
        Uids(s.to_string())
    }
}

/// Block height/index identifier, paired the way `chainhook-types`'s
/// `BlockIdentifier` pairs height with hash -- kept intentionally small
/// here since full reorg-path tracking is handled by the sync core, not
/// this shared types crate.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BlockHeight(pub u64);

impl From<u64> for BlockHeight {
    fn from(v: u64) -> Self {
        BlockHeight(v)
    }
}
