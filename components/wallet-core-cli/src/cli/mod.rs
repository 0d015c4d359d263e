use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use bip39::{Language, Mnemonic};
use clap::Parser;
use commands::{AccountCommand, ConfigCommand, Protocol, ServiceCommand};
use config::generator::generate_toml_config;
use config::{Config, NetworkDescriptor as ConfigNetworkDescriptor};
use wallet_core::account::{self, Account};
use wallet_core::client::CallbackState;
use wallet_core::error::CoreError;
use wallet_core::metrics::Metrics;
use wallet_core::persistence::LocalFileService;
use wallet_core::system::System;
use wallet_core::utils::Context;
use wallet_core_types::{
    AddressScheme, Chain, NetworkDescriptor, NetworkDescriptorData, SyncMode, Uids, Unit,
};

use crate::loopback::LoopbackClient;

mod commands;

pub fn main() {
    let logger = hiro_system_kit::log::setup_logger();
    let _guard = hiro_system_kit::log::setup_global_logger(logger.clone());
    let ctx = Context {
        logger: Some(logger),
        tracer: false,
    };

    let opts: Protocol = match Protocol::try_parse() {
        Ok(opts) => opts,
        Err(e) => {
            println!("{}", e);
            process::exit(1);
        }
    };

    if let Err(e) = hiro_system_kit::nestable_block_on(handle_command(opts, &ctx)) {
        error!(ctx.expect_logger(), "{e}");
        std::thread::sleep(std::time::Duration::from_millis(500));
        process::exit(1);
    }
}

fn wordlist() -> Vec<&'static str> {
    Language::English.word_list().to_vec()
}

fn now_unix() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before epoch")
        .as_secs()
}

fn derive_account(paper_key: &str, uids: &str) -> Result<Account, String> {
    account::validate_paper_key(paper_key, &wordlist()).map_err(|e| e.to_string())?;
    let mnemonic = Mnemonic::parse_in_normalized(Language::English, paper_key)
        .map_err(|e| format!("invalid paper key: {e}"))?;
    let seed_bytes = mnemonic.to_seed("");
    let mut seed = [0u8; 64];
    seed.copy_from_slice(&seed_bytes);
    Account::from_seed(seed, uids, now_unix()).map_err(|e| e.to_string())
}

async fn handle_command(opts: Protocol, ctx: &Context) -> Result<(), String> {
    match opts {
        Protocol::Account(subcmd) => match subcmd {
            AccountCommand::GeneratePaperKey(_) => {
                let phrase = account::generate_paper_key(&wordlist()).map_err(|e| e.to_string())?;
                println!("{phrase}");
            }
            AccountCommand::Show(cmd) => {
                let account = derive_account(&cmd.paper_key, "cli-account")?;
                println!("uids: {}", account.uids());
                println!("fs_identifier: {}", account.fs_identifier());
                println!("btc_mpk: {}", hex::encode(account.btc_mpk()));
            }
        },
        Protocol::Config(subcmd) => match subcmd {
            ConfigCommand::New(cmd) => {
                use std::fs::File;
                use std::io::Write;
                let network = match (cmd.mainnet, cmd.testnet, cmd.regtest) {
                    (true, false, false) => "mainnet",
                    (false, true, false) => "testnet",
                    (false, false, true) => "regtest",
                    _ => return Err("Invalid network".into()),
                };
                let config_content = generate_toml_config(network);
                let mut file_path = PathBuf::new();
                file_path.push("Wallet.toml");
                let mut file = File::create(&file_path)
                    .map_err(|e| format!("unable to open file {}\n{}", file_path.display(), e))?;
                file.write_all(config_content.as_bytes())
                    .map_err(|e| format!("unable to write file {}\n{}", file_path.display(), e))?;
                println!("Created file Wallet.toml");
            }
        },
        Protocol::Service(subcmd) => match subcmd {
            ServiceCommand::Start(cmd) => {
                let config = Config::from_file_path(&cmd.config_path)?;
                run_service(ctx, &config, &cmd.paper_key).map_err(|e| e.to_string())?;
            }
        },
    }
    Ok(())
}

/// Brings up a [`System`] with one installed network and wallet manager,
/// synced against an in-process [`LoopbackClient`] instead of a real QRY
/// indexer, then drives a handful of ticks and prints the resulting wallet
/// balance. Demonstrates the startup sequence (spec §4.7) end to end
/// without requiring an external collaborator to be configured.
fn run_service(ctx: &Context, config: &Config, paper_key: &str) -> Result<(), CoreError> {
    let account = derive_account(paper_key, &config.account.uids)
        .map_err(|message| CoreError::SerializationFieldInvalid(message))?;
    let account = Arc::new(account);

    let base_path = PathBuf::from(&config.storage.working_dir);
    let file_service = LocalFileService::new(base_path.clone());
    let is_mainnet = matches!(config.network.descriptor, ConfigNetworkDescriptor::Mainnet);
    let client = LoopbackClient::new(100);

    let metrics = match &config.metrics {
        Some(metrics_config) if metrics_config.enabled => {
            let metrics = Metrics::new();
            let port = metrics_config.prometheus_port;
            let serving = metrics.clone();
            std::thread::spawn(move || {
                hiro_system_kit::nestable_block_on(
                    wallet_core::metrics::start_serving_prometheus_metrics(port, serving),
                );
            });
            Some(metrics)
        }
        _ => None,
    };

    let dead_system_listener = dead_listener::<wallet_core_types::SystemEvent>();
    let system = System::new(
        account.clone(),
        client.clone(),
        base_path,
        file_service,
        is_mainnet,
        metrics,
        dead_system_listener,
    );
    system.start(ctx);

    let descriptor = if is_mainnet {
        NetworkDescriptor::Mainnet
    } else {
        NetworkDescriptor::Testnet
    };
    let network_data = NetworkDescriptorData {
        uids: Uids::new(config.network.uids.clone()),
        display_name: "Bitcoin".into(),
        descriptor,
        is_mainnet,
        confirmations_until_final: 6,
        confirmation_period_seconds: config.network.confirmation_period_seconds,
        default_currency: Uids::new("btc"),
        default_address_scheme: AddressScheme::NativeSegwit,
        allowed_address_schemes: vec![AddressScheme::NativeSegwit],
        default_sync_mode: SyncMode::ApiOnly,
        allowed_sync_modes: vec![SyncMode::ApiOnly],
    };
    system.install_network(network_data, 0, Vec::new());

    let native_unit = Unit::base(Uids::new("btc"), "Bitcoin", "btc", "BTC");
    let manager = system.create_wallet_manager(
        ctx.clone(),
        Chain::Btc,
        &config.network.uids,
        client.clone(),
        SyncMode::ApiOnly,
        None,
        native_unit,
        Vec::new(),
        dead_listener::<wallet_core_types::WalletManagerEvent>(),
        dead_listener::<wallet_core_types::WalletEvent>(),
    )?;
    client.bind(&manager);

    manager.connect(ctx);
    manager.tick();
    manager.on_block_number(true, 100, Some("demo-block-100".into()));
    let _ = CallbackState { rid: 0 };

    std::thread::sleep(std::time::Duration::from_millis(200));

    let wallet = manager.primary_wallet();
    let balance = wallet.balance();
    println!("wallet manager state: {:?}", manager.state());
    println!("balance: {} {}", balance.value, balance.unit.code);
    Ok(())
}

fn dead_listener<E: 'static>() -> std::sync::Weak<dyn Fn(E) + Send + Sync> {
    let strong: Arc<dyn Fn(E) + Send + Sync> = Arc::new(|_event| {});
    Arc::downgrade(&strong)
}
