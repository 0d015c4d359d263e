use std::fs::File;
use std::io::{BufReader, Read};

use crate::{
    AccountConfig, ClientConfig, Config, MetricsConfig, NetworkConfig, NetworkDescriptor,
    ResourcesConfig, StorageConfig, DEFAULT_CONFIRMATION_PERIOD_SECONDS, DEFAULT_MEMORY_AVAILABLE,
    DEFAULT_SYNC_CLIENT_THREADS, DEFAULT_SYNC_CLIENT_TIMEOUT, DEFAULT_ULIMIT, DEFAULT_WORKING_DIR,
};

#[derive(Deserialize, Debug, Clone)]
pub struct AccountConfigToml {
    pub uids: String,
}

#[derive(Deserialize, Debug, Clone)]
pub struct ClientConfigToml {
    pub rpc_url: String,
    pub api_key: Option<String>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct NetworkConfigToml {
    pub descriptor: String,
    pub uids: String,
    pub confirmation_period_seconds: Option<u64>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct StorageConfigToml {
    pub working_dir: Option<String>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct ResourcesConfigToml {
    pub ulimit: Option<usize>,
    pub cpu_core_available: Option<usize>,
    pub memory_available: Option<usize>,
    pub sync_client_threads: Option<usize>,
    pub sync_client_timeout: Option<u32>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct MetricsConfigToml {
    pub enabled: bool,
    pub prometheus_port: u16,
}

#[derive(Deserialize, Debug, Clone)]
pub struct ConfigToml {
    pub account: AccountConfigToml,
    pub client: ClientConfigToml,
    pub network: NetworkConfigToml,
    pub storage: StorageConfigToml,
    pub resources: ResourcesConfigToml,
    pub metrics: Option<MetricsConfigToml>,
}

impl ConfigToml {
    pub fn config_from_file_path(file_path: &str) -> Result<Config, String> {
        let file = File::open(file_path)
            .map_err(|e| format!("unable to read file {}\n{:?}", file_path, e))?;
        let mut file_reader = BufReader::new(file);
        let mut file_buffer = vec![];
        file_reader
            .read_to_end(&mut file_buffer)
            .map_err(|e| format!("unable to read file {}\n{:?}", file_path, e))?;

        let config_file: ConfigToml = match toml::from_slice(&file_buffer) {
            Ok(s) => s,
            Err(e) => {
                return Err(format!("Config file malformatted {}", e));
            }
        };
        ConfigToml::config_from_toml(config_file)
    }

    fn config_from_toml(toml: ConfigToml) -> Result<Config, String> {
        let descriptor = match toml.network.descriptor.as_str() {
            "mainnet" => NetworkDescriptor::Mainnet,
            "testnet" | "regtest" | "devnet" => NetworkDescriptor::Testnet,
            _ => return Err("network.descriptor not supported".to_string()),
        };
        let metrics = toml.metrics.map(|metrics| MetricsConfig {
            enabled: metrics.enabled,
            prometheus_port: metrics.prometheus_port,
        });
        let config = Config {
            account: AccountConfig {
                uids: toml.account.uids,
            },
            client: ClientConfig {
                rpc_url: toml.client.rpc_url,
                api_key: toml.client.api_key,
            },
            network: NetworkConfig {
                descriptor,
                uids: toml.network.uids,
                confirmation_period_seconds: toml
                    .network
                    .confirmation_period_seconds
                    .unwrap_or(DEFAULT_CONFIRMATION_PERIOD_SECONDS),
            },
            storage: StorageConfig {
                working_dir: toml.storage.working_dir.unwrap_or(DEFAULT_WORKING_DIR.into()),
            },
            resources: ResourcesConfig {
                ulimit: toml.resources.ulimit.unwrap_or(DEFAULT_ULIMIT),
                cpu_core_available: toml.resources.cpu_core_available.unwrap_or(num_cpus::get()),
                memory_available: toml
                    .resources
                    .memory_available
                    .unwrap_or(DEFAULT_MEMORY_AVAILABLE),
                sync_client_threads: toml
                    .resources
                    .sync_client_threads
                    .unwrap_or(DEFAULT_SYNC_CLIENT_THREADS),
                sync_client_timeout: toml
                    .resources
                    .sync_client_timeout
                    .unwrap_or(DEFAULT_SYNC_CLIENT_TIMEOUT),
            },
            metrics,
        };
        Ok(config)
    }
}
