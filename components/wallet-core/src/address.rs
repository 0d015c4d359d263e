//! Polymorphic address value (spec §4.3). Construction and stringification
//! dispatch through the chain's [`AddressHandler`]; equality and hashing
//! are done locally off a precomputed hash so `Address` can sit in sets
//! without re-entering the handler on every lookup.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use wallet_core_types::Chain;

use crate::error::CoreError;
use crate::handlers::HandlerRegistry;

#[derive(Debug, Clone)]
pub struct Address {
    chain: Chain,
    canonical: String,
    hash_value: u64,
}

impl Address {
    /// Parses `text` through the chain's address handler. Out-of-scope
    /// chains (no handler registered) surface [`CoreError::Unsupported`]
    /// rather than falling back to a no-op parse.
    pub fn parse(chain: Chain, text: &str) -> Result<Address, CoreError> {
        let registry = HandlerRegistry::global();
        let handler = registry
            .get(chain)
            .and_then(|group| group.address.as_deref())
            .ok_or(CoreError::Unsupported(chain))?;
        let canonical = handler
            .parse(text)
            .map_err(CoreError::SerializationFieldInvalid)?;
        Ok(Address::from_canonical(chain, canonical))
    }

    fn from_canonical(chain: Chain, canonical: String) -> Address {
        let mut hasher = DefaultHasher::new();
        chain.hash(&mut hasher);
        canonical.hash(&mut hasher);
        let hash_value = hasher.finish();
        Address {
            chain,
            canonical,
            hash_value,
        }
    }

    pub fn chain(&self) -> Chain {
        self.chain
    }

    /// Re-renders the address the way the chain's own wallets expect to
    /// see it (e.g. checksum-cased), by delegating back to the handler.
    pub fn stringify(&self) -> String {
        HandlerRegistry::global()
            .get(self.chain)
            .and_then(|group| group.address.as_deref())
            .map(|handler| handler.stringify(&self.canonical))
            .unwrap_or_else(|| self.canonical.clone())
    }

    pub fn as_canonical(&self) -> &str {
        &self.canonical
    }
}

impl PartialEq for Address {
    fn eq(&self, other: &Self) -> bool {
        self.chain == other.chain && self.canonical == other.canonical
    }
}

impl Eq for Address {}

impl Hash for Address {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.hash_value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn parse_rejects_empty_btc_address() {
        assert!(Address::parse(Chain::Btc, "").is_err());
    }

    #[test]
    fn eth_address_is_lowercased_and_prefixed() {
        let addr = Address::parse(Chain::Eth, "0xAbC0000000000000000000000000000000001").unwrap_err();
        // 39 hex chars after 0x -- one short -- must be rejected.
        assert!(matches!(addr, CoreError::SerializationFieldInvalid(_)));
        let addr = Address::parse(Chain::Eth, "0xAbC0000000000000000000000000000000FEED").unwrap();
        assert_eq!(addr.as_canonical(), "0xabc0000000000000000000000000000000feed");
    }

    #[test]
    fn unsupported_chain_is_rejected() {
        let err = Address::parse(Chain::Hbar, "anything").unwrap_err();
        assert!(matches!(err, CoreError::Unsupported(Chain::Hbar)));
    }

    #[test]
    fn equal_addresses_hash_identically_for_set_membership() {
        let a = Address::parse(Chain::Btc, "bc1qexampleaddress").unwrap();
        let b = Address::parse(Chain::Btc, "bc1qexampleaddress").unwrap();
        let mut set = HashSet::new();
        set.insert(a);
        assert!(set.contains(&b));
    }
}
