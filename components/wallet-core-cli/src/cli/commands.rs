use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[clap(name = "wallet-core-cli", author, version, about, long_about = None)]
pub enum Protocol {
    /// Derive and inspect accounts
    #[clap(subcommand)]
    Account(AccountCommand),
    /// Generate a new configuration file
    #[clap(subcommand)]
    Config(ConfigCommand),
    /// Bring up a wallet manager
    #[clap(subcommand)]
    Service(ServiceCommand),
}

#[derive(Subcommand, PartialEq, Clone, Debug)]
pub enum AccountCommand {
    /// Generate a fresh BIP-39 paper key
    #[clap(name = "generate-paper-key", bin_name = "generate-paper-key")]
    GeneratePaperKey(GeneratePaperKeyCommand),
    /// Derive an account from a paper key and print its identifiers
    #[clap(name = "show", bin_name = "show")]
    Show(ShowAccountCommand),
}

#[derive(Parser, PartialEq, Clone, Debug)]
pub struct GeneratePaperKeyCommand {}

#[derive(Parser, PartialEq, Clone, Debug)]
pub struct ShowAccountCommand {
    #[clap(long = "paper-key")]
    pub paper_key: String,
}

#[derive(Subcommand, PartialEq, Clone, Debug)]
#[clap(bin_name = "config", aliases = &["config"])]
pub enum ConfigCommand {
    /// Generate new config
    #[clap(name = "new", bin_name = "new", aliases = &["generate"])]
    New(NewConfigCommand),
}

#[derive(Parser, PartialEq, Clone, Debug)]
pub struct NewConfigCommand {
    /// Target Regtest network
    #[clap(
        long = "regtest",
        conflicts_with = "testnet",
        conflicts_with = "mainnet"
    )]
    pub regtest: bool,
    /// Target Testnet network
    #[clap(
        long = "testnet",
        conflicts_with = "regtest",
        conflicts_with = "mainnet"
    )]
    pub testnet: bool,
    /// Target Mainnet network
    #[clap(
        long = "mainnet",
        conflicts_with = "testnet",
        conflicts_with = "regtest"
    )]
    pub mainnet: bool,
}

#[derive(Subcommand, PartialEq, Clone, Debug)]
pub enum ServiceCommand {
    /// Bring up a wallet manager and drive a few sync ticks against a
    /// loopback demo backend
    #[clap(name = "start", bin_name = "start")]
    Start(ServiceStartCommand),
}

#[derive(Parser, PartialEq, Clone, Debug)]
pub struct ServiceStartCommand {
    #[clap(long = "config-path")]
    pub config_path: String,
    #[clap(long = "paper-key")]
    pub paper_key: String,
}
