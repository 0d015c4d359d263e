//! Bundle store (spec §4.7). `FileService` is the out-of-scope
//! collaborator per spec §1 ("the on-disk file-service primitive"); this
//! module owns everything on the engine's side of that boundary --
//! RLP encode/decode, identity derivation, the versioned migration, and
//! the `<base>/<fs_identifier>/...` path layout -- while `LocalFileService`
//! is the one in-tree adapter over `std::fs` that makes the engine
//! runnable without a real collaborator plugged in.

use std::fs;
use std::path::{Path, PathBuf};

use alloy_rlp::{RlpDecodable, RlpEncodable};
use sha2::{Digest, Sha256};
use wallet_core_types::{BundleStatus, CurrencyBundle, DenominationBundle, TransactionBundle, TransferBundle, Uids};

use crate::crypto::md5_hex;
use crate::error::{CoreError, FileServiceErrorKind};
use crate::utils::Context;

/// Current version stamped on every persisted transfer-bundle file. v1
/// bundles (no explicit `transfer_index`) still load: the index is
/// derived from the `uids` suffix on read (spec §4.7).
const TRANSFER_BUNDLE_VERSION: u16 = 2;
const TRANSACTION_BUNDLE_VERSION: u16 = 1;
const CURRENCY_BUNDLE_VERSION: u16 = 1;

/// Persists and loads RLP-encoded bundles under
/// `<base>/<fs_identifier>/...` (spec §4.7, §6 "Persisted file layout").
/// The out-of-scope collaborator this core requires -- callers may supply
/// any implementation; [`LocalFileService`] is the bundled default.
pub trait FileService: Send + Sync {
    fn write(&self, relative_path: &Path, contents: &[u8]) -> Result<(), CoreError>;
    fn read(&self, relative_path: &Path) -> Result<Option<Vec<u8>>, CoreError>;
    fn list(&self, relative_dir: &Path) -> Result<Vec<PathBuf>, CoreError>;
}

pub struct LocalFileService {
    root: PathBuf,
}

impl LocalFileService {
    pub fn new(root: impl Into<PathBuf>) -> LocalFileService {
        LocalFileService { root: root.into() }
    }

    fn full_path(&self, relative: &Path) -> PathBuf {
        self.root.join(relative)
    }
}

impl FileService for LocalFileService {
    fn write(&self, relative_path: &Path, contents: &[u8]) -> Result<(), CoreError> {
        let full = self.full_path(relative_path);
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent).map_err(|e| unix_error(e.to_string()))?;
        }
        fs::write(&full, contents).map_err(|e| unix_error(e.to_string()))
    }

    fn read(&self, relative_path: &Path) -> Result<Option<Vec<u8>>, CoreError> {
        let full = self.full_path(relative_path);
        match fs::read(&full) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(unix_error(e.to_string())),
        }
    }

    fn list(&self, relative_dir: &Path) -> Result<Vec<PathBuf>, CoreError> {
        let full = self.full_path(relative_dir);
        let entries = match fs::read_dir(&full) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(unix_error(e.to_string())),
        };
        let mut paths = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| unix_error(e.to_string()))?;
            paths.push(relative_dir.join(entry.file_name()));
        }
        Ok(paths)
    }
}

fn unix_error(message: String) -> CoreError {
    CoreError::FileService {
        kind: FileServiceErrorKind::Unix,
        message,
    }
}

fn entity_error(message: String) -> CoreError {
    CoreError::FileService {
        kind: FileServiceErrorKind::Entity,
        message,
    }
}

/// Wire shape for a persisted transaction bundle (spec §4.7): `[status,
/// bytes, timestamp, block_height]`.
#[derive(RlpEncodable, RlpDecodable)]
struct TransactionBundleWire {
    status: u8,
    raw: Vec<u8>,
    timestamp: u64,
    block_height: u64,
}

/// Wire shape for a persisted transfer bundle (spec §4.7): 16 items when
/// an explicit `transfer_index` is present (version 2); version-1 files on
/// disk have 15 and the index is re-derived from `uids` on load.
#[derive(RlpEncodable, RlpDecodable)]
struct TransferBundleWire {
    status: u8,
    transaction_hash: String,
    transaction_id: String,
    uids: String,
    source: String,
    target: String,
    amount: String,
    currency_code: String,
    fee: String,
    transfer_index: u32,
    block_timestamp: u64,
    block_number: u64,
    confirmations: u64,
    transaction_index_in_block: u32,
    block_hash: String,
    attribute_keys: Vec<String>,
    attribute_values: Vec<String>,
}

#[derive(RlpEncodable, RlpDecodable)]
struct CurrencyBundleWire {
    id: String,
    name: String,
    code: String,
    currency_type: String,
    blockchain_id: String,
    contract_address: String,
    verified: bool,
    denomination_names: Vec<String>,
    denomination_codes: Vec<String>,
    denomination_symbols: Vec<String>,
    denomination_decimals: Vec<u32>,
}

fn status_tag(status: BundleStatus) -> u8 {
    match status {
        BundleStatus::Unknown => 0,
        BundleStatus::Confirmed => 1,
        BundleStatus::Unconfirmed => 2,
    }
}

fn status_from_tag(tag: u8) -> BundleStatus {
    match tag {
        1 => BundleStatus::Confirmed,
        2 => BundleStatus::Unconfirmed,
        _ => BundleStatus::Unknown,
    }
}

pub fn transaction_bundle_identifier(raw: &[u8]) -> String {
    md5_hex(raw)
}

pub fn encode_transaction_bundle(bundle: &TransactionBundle) -> Vec<u8> {
    let wire = TransactionBundleWire {
        status: status_tag(bundle.status),
        raw: bundle.raw.clone(),
        timestamp: bundle.timestamp,
        block_height: bundle.block_height,
    };
    let mut out = Vec::new();
    out.extend_from_slice(&TRANSACTION_BUNDLE_VERSION.to_be_bytes());
    out.extend_from_slice(&alloy_rlp::encode(wire));
    out
}

pub fn decode_transaction_bundle(data: &[u8]) -> Result<TransactionBundle, CoreError> {
    let (_version, body) = split_version(data)?;
    let wire: TransactionBundleWire = alloy_rlp::decode_exact(body)
        .map_err(|e| entity_error(e.to_string()))?;
    Ok(TransactionBundle {
        status: status_from_tag(wire.status),
        raw: wire.raw,
        timestamp: wire.timestamp,
        block_height: wire.block_height,
    })
}

pub fn encode_transfer_bundle(bundle: &TransferBundle) -> Vec<u8> {
    let (attribute_keys, attribute_values): (Vec<String>, Vec<String>) = bundle
        .attributes
        .iter()
        .map(|(k, v)| (k.clone(), v.clone().unwrap_or_default()))
        .unzip();
    let wire = TransferBundleWire {
        status: status_tag(bundle.status),
        transaction_hash: bundle.transaction_hash.clone(),
        transaction_id: bundle.transaction_id.clone().unwrap_or_default(),
        uids: bundle.uids.0.clone(),
        source: bundle.source.clone(),
        target: bundle.target.clone(),
        amount: bundle.amount.clone(),
        currency_code: bundle.currency_code.clone(),
        fee: bundle.fee.clone().unwrap_or_default(),
        transfer_index: bundle.transfer_index,
        block_timestamp: bundle.block_timestamp,
        block_number: bundle.block_number,
        confirmations: bundle.confirmations,
        transaction_index_in_block: bundle.transaction_index_in_block,
        block_hash: bundle.block_hash.clone(),
        attribute_keys,
        attribute_values,
    };
    let mut out = Vec::new();
    out.extend_from_slice(&TRANSFER_BUNDLE_VERSION.to_be_bytes());
    out.extend_from_slice(&alloy_rlp::encode(wire));
    out
}

/// Decodes a transfer bundle, applying the version-1/version-2 migration
/// (spec §4.7): version 1 has no explicit `transfer_index` and it's
/// derived from `uids` of form `<network>:<hash>:<index>`.
pub fn decode_transfer_bundle(data: &[u8]) -> Result<TransferBundle, CoreError> {
    let (version, body) = split_version(data)?;
    let wire: TransferBundleWire = alloy_rlp::decode_exact(body)
        .map_err(|e| entity_error(e.to_string()))?;

    let uids = Uids::new(wire.uids);
    let transfer_index = if version >= 2 {
        wire.transfer_index
    } else {
        TransferBundle::derive_transfer_index_from_uids(&uids).unwrap_or(wire.transfer_index)
    };

    let attributes = wire
        .attribute_keys
        .into_iter()
        .zip(wire.attribute_values)
        .map(|(k, v)| (k, if v.is_empty() { None } else { Some(v) }))
        .collect();

    Ok(TransferBundle {
        status: status_from_tag(wire.status),
        transaction_hash: wire.transaction_hash,
        transaction_id: if wire.transaction_id.is_empty() {
            None
        } else {
            Some(wire.transaction_id)
        },
        uids,
        source: wire.source,
        target: wire.target,
        amount: wire.amount,
        currency_code: wire.currency_code,
        fee: if wire.fee.is_empty() { None } else { Some(wire.fee) },
        transfer_index,
        block_timestamp: wire.block_timestamp,
        block_number: wire.block_number,
        confirmations: wire.confirmations,
        transaction_index_in_block: wire.transaction_index_in_block,
        block_hash: wire.block_hash,
        attributes,
    })
}

pub fn encode_currency_bundle(bundle: &CurrencyBundle) -> Vec<u8> {
    let wire = CurrencyBundleWire {
        id: bundle.id.0.clone(),
        name: bundle.name.clone(),
        code: bundle.code.clone(),
        currency_type: bundle.currency_type.clone(),
        blockchain_id: bundle.blockchain_id.clone(),
        contract_address: bundle.contract_address.clone().unwrap_or_default(),
        verified: bundle.verified,
        denomination_names: bundle.denominations.iter().map(|d| d.name.clone()).collect(),
        denomination_codes: bundle.denominations.iter().map(|d| d.code.clone()).collect(),
        denomination_symbols: bundle.denominations.iter().map(|d| d.symbol.clone()).collect(),
        denomination_decimals: bundle.denominations.iter().map(|d| d.decimals).collect(),
    };
    let mut out = Vec::new();
    out.extend_from_slice(&CURRENCY_BUNDLE_VERSION.to_be_bytes());
    out.extend_from_slice(&alloy_rlp::encode(wire));
    out
}

pub fn decode_currency_bundle(data: &[u8]) -> Result<CurrencyBundle, CoreError> {
    let (_version, body) = split_version(data)?;
    let wire: CurrencyBundleWire = alloy_rlp::decode_exact(body)
        .map_err(|e| entity_error(e.to_string()))?;
    let denominations = wire
        .denomination_names
        .into_iter()
        .zip(wire.denomination_codes)
        .zip(wire.denomination_symbols)
        .zip(wire.denomination_decimals)
        .map(|(((name, code), symbol), decimals)| DenominationBundle {
            name,
            code,
            symbol,
            decimals,
        })
        .collect();
    Ok(CurrencyBundle {
        id: Uids::new(wire.id),
        name: wire.name,
        code: wire.code,
        currency_type: wire.currency_type,
        blockchain_id: wire.blockchain_id,
        contract_address: if wire.contract_address.is_empty() {
            None
        } else {
            Some(wire.contract_address)
        },
        verified: wire.verified,
        denominations,
    })
}

/// `currency` bundle identity is SHA-256 over `id` (spec §4.7).
pub fn currency_bundle_identifier(id: &Uids) -> String {
    hex::encode(Sha256::digest(id.0.as_bytes()))
}

fn split_version(data: &[u8]) -> Result<(u16, &[u8]), CoreError> {
    if data.len() < 2 {
        return Err(entity_error("bundle file shorter than version header".into()));
    }
    let version = u16::from_be_bytes([data[0], data[1]]);
    Ok((version, &data[2..]))
}

/// One wallet manager's store, rooted at `<base_path>/<account_fs_identifier>/`
/// (spec §4.7). File naming follows spec §6: one sub-directory per kind,
/// named by the record identifier.
pub struct BundleStore<F: FileService> {
    service: F,
    network_currency_dir: PathBuf,
}

impl<F: FileService> BundleStore<F> {
    pub fn new(service: F, network_uids: &str, currency_code: &str) -> BundleStore<F> {
        BundleStore {
            service,
            network_currency_dir: PathBuf::from(network_uids).join(currency_code),
        }
    }

    pub fn save_transaction(&self, ctx: &Context, bundle: &TransactionBundle) {
        let id = transaction_bundle_identifier(&bundle.raw);
        let path = self.network_currency_dir.join("transactions").join(&id);
        if let Err(err) = self.service.write(&path, &encode_transaction_bundle(bundle)) {
            crate::try_warn!(ctx, "failed to persist transaction bundle {}: {}", id, err);
        }
    }

    pub fn save_transfer(&self, ctx: &Context, bundle: &TransferBundle) {
        let id = md5_hex(bundle.uids.0.as_bytes());
        let path = self.network_currency_dir.join("transfers").join(&id);
        if let Err(err) = self.service.write(&path, &encode_transfer_bundle(bundle)) {
            crate::try_warn!(ctx, "failed to persist transfer bundle {}: {}", id, err);
        }
    }

    /// Loads all persisted transaction bundles, sorted ascending by block
    /// height (spec §4.7 startup sequence step 2). File-service errors are
    /// logged and the store continues with whatever loaded successfully
    /// (spec §4.7 "the manager continues operating with an empty store").
    pub fn load_transactions(&self, ctx: &Context) -> Vec<TransactionBundle> {
        let dir = self.network_currency_dir.join("transactions");
        let mut bundles = self.load_all(ctx, &dir, decode_transaction_bundle);
        bundles.sort_by_key(|b| b.block_height);
        bundles
    }

    /// Loads all persisted transfer bundles, sorted ascending by block
    /// height (spec §4.7 startup sequence step 3).
    pub fn load_transfers(&self, ctx: &Context) -> Vec<TransferBundle> {
        let dir = self.network_currency_dir.join("transfers");
        let mut bundles = self.load_all(ctx, &dir, decode_transfer_bundle);
        bundles.sort_by_key(|b| b.block_number);
        bundles
    }

    fn load_all<T>(
        &self,
        ctx: &Context,
        dir: &Path,
        decode: impl Fn(&[u8]) -> Result<T, CoreError>,
    ) -> Vec<T> {
        let paths = match self.service.list(dir) {
            Ok(paths) => paths,
            Err(err) => {
                crate::try_warn!(ctx, "failed to list {}: {}", dir.display(), err);
                return Vec::new();
            }
        };
        let mut out = Vec::new();
        for path in paths {
            match self.service.read(&path) {
                Ok(Some(data)) => match decode(&data) {
                    Ok(entity) => out.push(entity),
                    Err(err) => crate::try_warn!(ctx, "failed to decode {}: {}", path.display(), err),
                },
                Ok(None) => {}
                Err(err) => crate::try_warn!(ctx, "failed to read {}: {}", path.display(), err),
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct MemoryFileService {
        files: Mutex<std::collections::HashMap<PathBuf, Vec<u8>>>,
    }

    impl FileService for MemoryFileService {
        fn write(&self, relative_path: &Path, contents: &[u8]) -> Result<(), CoreError> {
            self.files
                .lock()
                .unwrap()
                .insert(relative_path.to_path_buf(), contents.to_vec());
            Ok(())
        }

        fn read(&self, relative_path: &Path) -> Result<Option<Vec<u8>>, CoreError> {
            Ok(self.files.lock().unwrap().get(relative_path).cloned())
        }

        fn list(&self, relative_dir: &Path) -> Result<Vec<PathBuf>, CoreError> {
            Ok(self
                .files
                .lock()
                .unwrap()
                .keys()
                .filter(|p| p.starts_with(relative_dir))
                .cloned()
                .collect())
        }
    }

    fn test_transaction_bundle(block_height: u64) -> TransactionBundle {
        TransactionBundle {
            status: BundleStatus::Confirmed,
            raw: vec![1, 2, 3],
            timestamp: 1_577_836_800,
            block_height,
        }
    }

    #[test]
    fn transaction_bundle_round_trips_through_rlp() {
        let bundle = test_transaction_bundle(100);
        let encoded = encode_transaction_bundle(&bundle);
        let decoded = decode_transaction_bundle(&encoded).unwrap();
        assert_eq!(decoded, bundle);
    }

    #[test]
    fn v1_transfer_bundle_derives_index_from_uids() {
        let uids = Uids::new("bitcoin-mainnet:deadbeef:3");
        let index = TransferBundle::derive_transfer_index_from_uids(&uids);
        assert_eq!(index, Some(3));
    }

    #[test]
    fn store_loads_transaction_bundles_sorted_by_height() {
        let store = BundleStore::new(MemoryFileService::default(), "bitcoin-mainnet", "btc");
        let ctx = Context::empty();
        store.save_transaction(&ctx, &test_transaction_bundle(300));
        store.save_transaction(&ctx, &test_transaction_bundle(100));
        store.save_transaction(&ctx, &test_transaction_bundle(200));

        let loaded = store.load_transactions(&ctx);
        let heights: Vec<u64> = loaded.iter().map(|b| b.block_height).collect();
        assert_eq!(heights, vec![100, 200, 300]);
    }
}
