use std::path::PathBuf;

use crate::toml::ConfigToml;

pub const DEFAULT_WORKING_DIR: &str = "data";
pub const DEFAULT_ULIMIT: usize = 2048;
pub const DEFAULT_MEMORY_AVAILABLE: usize = 8;
pub const DEFAULT_SYNC_CLIENT_THREADS: usize = 4;
pub const DEFAULT_SYNC_CLIENT_TIMEOUT: u32 = 15;
pub const DEFAULT_CONFIRMATION_PERIOD_SECONDS: u64 = 600;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NetworkDescriptor {
    Mainnet,
    Testnet,
}

#[derive(Clone, Debug)]
pub struct Config {
    pub account: AccountConfig,
    pub client: ClientConfig,
    pub network: NetworkConfig,
    pub resources: ResourcesConfig,
    pub storage: StorageConfig,
    pub metrics: Option<MetricsConfig>,
}

/// Seeds the demo account the CLI constructs on first run (spec §4.3);
/// production hosts pass a real BIP-39 phrase on the command line instead
/// of reading one from config.
#[derive(Clone, Debug)]
pub struct AccountConfig {
    pub uids: String,
}

/// The remote-indexer (QRY) endpoint a [`Client`](wallet_core::Client)
/// implementation is constructed against.
#[derive(Clone, Debug)]
pub struct ClientConfig {
    pub rpc_url: String,
    pub api_key: Option<String>,
}

#[derive(Clone, Debug)]
pub struct NetworkConfig {
    pub descriptor: NetworkDescriptor,
    pub uids: String,
    pub confirmation_period_seconds: u64,
}

#[derive(Clone, Debug)]
pub struct StorageConfig {
    pub working_dir: String,
}

#[derive(Clone, Debug)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub prometheus_port: u16,
}

#[derive(Deserialize, Debug, Clone)]
pub struct ResourcesConfig {
    pub ulimit: usize,
    pub cpu_core_available: usize,
    pub memory_available: usize,
    pub sync_client_threads: usize,
    pub sync_client_timeout: u32,
}

impl ResourcesConfig {
    pub fn get_optimal_thread_pool_capacity(&self) -> usize {
        // One thread to feed the pool, another for the reduce step.
        self.cpu_core_available.saturating_sub(2).max(1)
    }
}

impl Config {
    pub fn from_file_path(file_path: &str) -> Result<Config, String> {
        ConfigToml::config_from_file_path(file_path)
    }

    pub fn expected_cache_path(&self) -> PathBuf {
        let mut destination_path = PathBuf::new();
        destination_path.push(&self.storage.working_dir);
        destination_path
    }

    pub fn devnet_default() -> Config {
        Config {
            account: AccountConfig {
                uids: "devnet-account".into(),
            },
            storage: StorageConfig {
                working_dir: default_cache_path(),
            },
            resources: ResourcesConfig {
                cpu_core_available: num_cpus::get(),
                memory_available: DEFAULT_MEMORY_AVAILABLE,
                ulimit: DEFAULT_ULIMIT,
                sync_client_threads: DEFAULT_SYNC_CLIENT_THREADS,
                sync_client_timeout: DEFAULT_SYNC_CLIENT_TIMEOUT,
            },
            client: ClientConfig {
                rpc_url: "http://0.0.0.0:18443".into(),
                api_key: None,
            },
            network: NetworkConfig {
                descriptor: NetworkDescriptor::Testnet,
                uids: "bitcoin-regtest".into(),
                confirmation_period_seconds: DEFAULT_CONFIRMATION_PERIOD_SECONDS,
            },
            metrics: Some(MetricsConfig {
                enabled: true,
                prometheus_port: 9153,
            }),
        }
    }

    pub fn testnet_default() -> Config {
        let mut default = Config::devnet_default();
        default.network.descriptor = NetworkDescriptor::Testnet;
        default.network.uids = "bitcoin-testnet".into();
        default
    }

    pub fn mainnet_default() -> Config {
        let mut default = Config::devnet_default();
        default.client.rpc_url = "https://api.example.com".into();
        default.network.descriptor = NetworkDescriptor::Mainnet;
        default.network.uids = "bitcoin-mainnet".into();
        default
    }

    pub fn test_default() -> Config {
        let mut config = Self::mainnet_default();
        config.storage.working_dir = "tmp".to_string();
        config.resources.sync_client_threads = 1;
        config.resources.cpu_core_available = 1;
        config
    }
}

pub fn default_cache_path() -> String {
    let mut cache_path = std::env::current_dir().expect("unable to get current dir");
    cache_path.push("data");
    format!("{}", cache_path.display())
}
