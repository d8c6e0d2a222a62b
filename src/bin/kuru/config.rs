//! Configuration for the command line client.
//!
//! Configuration comes from two sources:
//! - Environment variables (via .env file or shell): connection details, keys
//! - CLI arguments: the action to perform and its parameters

use alloy::primitives::Address;
use clap::{Args, Parser, Subcommand};
use fastnum::{UD128, decimal::Context};
use kuru_sdk::{Chain, types::PriceLevel};
use url::Url;

/// Environment configuration (connection details, credentials).
#[derive(Debug, serde::Deserialize)]
pub struct EnvConfig {
    /// RPC URL of the node
    pub rpc_url: String,

    /// Private key for signing transactions
    pub pk: String,

    /// Overrides the feed URL of the testnet preset
    pub ws_url: Option<String>,

    /// Overrides the indexer API URL of the testnet preset
    pub api_url: Option<String>,

    /// Overrides the margin account address of the testnet preset
    pub margin_account_address: Option<String>,

    /// Overrides the chain ID of the testnet preset
    pub chain_id: Option<u64>,
}

impl EnvConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, envy::Error> {
        envy::from_env()
    }

    /// Testnet preset with the overrides applied.
    pub fn chain(&self) -> Result<Chain, ConfigError> {
        let testnet = Chain::testnet();
        let margin_account = match &self.margin_account_address {
            Some(addr) => addr
                .parse()
                .map_err(|_| ConfigError::InvalidAddress(addr.clone()))?,
            None => testnet.margin_account(),
        };
        Ok(Chain::custom(
            self.chain_id.unwrap_or(testnet.chain_id()),
            margin_account,
            parse_url(self.ws_url.as_deref(), testnet.ws_url())?,
            parse_url(self.api_url.as_deref(), testnet.api_url())?,
        ))
    }
}

fn parse_url(value: Option<&str>, default: &Url) -> Result<Url, ConfigError> {
    match value {
        Some(url) => Url::parse(url).map_err(|_| ConfigError::InvalidUrl(url.to_string())),
        None => Ok(default.clone()),
    }
}

/// CLI arguments.
#[derive(Debug, Parser)]
#[command(name = "kuru")]
#[command(about = "Command line client for the Kuru orderbook DEX")]
pub struct CliConfig {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Place a limit buy order
    LimitBuy(LimitArgs),

    /// Place a limit sell order
    LimitSell(LimitArgs),

    /// Spend a quote amount at market
    MarketBuy(MarketArgs),

    /// Sell a base amount at market
    MarketSell(MarketArgs),

    /// Cancel orders by their orderbook IDs
    Cancel {
        #[arg(long)]
        market: Address,

        /// Comma-separated order IDs
        #[arg(long, value_delimiter = ',', required = true)]
        order_ids: Vec<u64>,
    },

    /// Place and cancel several orders in one transaction
    BatchUpdate(BatchArgs),

    /// Print the order book of a market
    L2Book {
        #[arg(long)]
        market: Address,

        /// Number of levels printed per side
        #[arg(long, default_value_t = 10)]
        depth: usize,
    },

    /// Print margin account balances
    Balances {
        /// Comma-separated token addresses, the native asset if not specified
        #[arg(long, value_delimiter = ',')]
        tokens: Vec<Address>,
    },

    /// Deposit into the margin account
    Deposit(TransferArgs),

    /// Withdraw from the margin account
    Withdraw(TransferArgs),

    /// Print feed events of a market until interrupted
    Watch {
        #[arg(long)]
        market: Address,
    },
}

#[derive(Debug, Args)]
pub struct LimitArgs {
    #[arg(long)]
    pub market: Address,

    /// Price in quote per base (e.g., 3.51)
    #[arg(long)]
    pub price: String,

    /// Size in base units
    #[arg(long)]
    pub size: String,

    #[arg(long)]
    pub post_only: bool,

    /// Client order ID to track the order with
    #[arg(long)]
    pub cloid: Option<String>,
}

#[derive(Debug, Args)]
pub struct MarketArgs {
    #[arg(long)]
    pub market: Address,

    /// Quote amount for buys, base amount for sells
    #[arg(long)]
    pub size: String,

    /// Minimum amount received, in the asset bought
    #[arg(long, default_value = "0")]
    pub min_amount_out: String,

    /// Pay from the margin account balance
    #[arg(long)]
    pub margin: bool,

    #[arg(long)]
    pub fill_or_kill: bool,
}

#[derive(Debug, Args)]
pub struct BatchArgs {
    #[arg(long)]
    pub market: Address,

    /// Buy order as PRICE@SIZE, may be repeated
    #[arg(long = "buy")]
    pub buys: Vec<String>,

    /// Sell order as PRICE@SIZE, may be repeated
    #[arg(long = "sell")]
    pub sells: Vec<String>,

    /// Comma-separated order IDs to cancel
    #[arg(long, value_delimiter = ',')]
    pub cancel: Vec<u64>,

    #[arg(long)]
    pub post_only: bool,
}

#[derive(Debug, Args)]
pub struct TransferArgs {
    /// Token address, the native asset if not specified
    #[arg(long, default_value_t = Address::ZERO)]
    pub token: Address,

    /// Amount in token units (e.g., 1.5)
    #[arg(long)]
    pub amount: String,
}

pub fn parse_amount(value: &str) -> Result<UD128, ConfigError> {
    UD128::from_str(value, Context::default())
        .map_err(|_| ConfigError::InvalidAmount(value.to_string()))
}

/// Parses a `PRICE@SIZE` level.
pub fn parse_level(value: &str) -> Result<PriceLevel, ConfigError> {
    let (price, size) = value
        .split_once('@')
        .ok_or_else(|| ConfigError::InvalidLevel(value.to_string()))?;
    Ok(PriceLevel::new(
        parse_amount(price.trim())?,
        parse_amount(size.trim())?,
    ))
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Invalid price level {0}, expected PRICE@SIZE")]
    InvalidLevel(String),

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}
