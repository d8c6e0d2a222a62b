//! Command line client for the Kuru orderbook DEX.
//!
//! Places and cancels orders, moves collateral in and out of the margin
//! account, and prints the order book or the live event feed of a market.

mod config;
mod error;

use std::process::exit;

use alloy::{
    primitives::Address,
    rpc::types::TransactionReceipt,
    signers::local::PrivateKeySigner,
};
use clap::Parser;
use kuru_sdk::{
    client::KuruClient,
    error::KuruError,
    num::Rounding,
    types::{Cloid, OrderRequest, Side, TxOptions},
    ws::EventHandlers,
};
use tracing::{error, info};
use url::Url;

use config::{
    BatchArgs, CliConfig, Command, EnvConfig, LimitArgs, MarketArgs, parse_amount, parse_level,
};
use error::Result;

#[tokio::main]
async fn main() {
    // Load .env file
    if let Err(e) = dotenvy::dotenv() {
        eprintln!("Warning: Failed to load .env file: {}", e);
    }

    let env_config = match EnvConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to parse environment configuration: {}", e);
            exit(1);
        }
    };

    let cli_config = CliConfig::parse();

    if std::env::var("RUST_LOG").is_err() {
        unsafe {
            std::env::set_var("RUST_LOG", "info");
        }
    }

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let client = match connect(&env_config).await {
        Ok(client) => client,
        Err(e) => {
            eprintln!("Failed to connect: {}", e);
            exit(1);
        }
    };

    if let Err(e) = run(&client, cli_config.command).await {
        error!(%e, "command failed");
        exit(1);
    }
}

async fn connect(env_config: &EnvConfig) -> Result<KuruClient> {
    let chain = env_config.chain()?;
    let signer: PrivateKeySigner = env_config.pk.parse()?;
    let rpc_url = Url::parse(&env_config.rpc_url)?;
    Ok(KuruClient::connect(chain, rpc_url, signer).await?)
}

async fn run(client: &KuruClient, command: Command) -> Result<()> {
    let tx = TxOptions::default();
    match command {
        Command::LimitBuy(args) => limit(client, Side::Buy, args, &tx).await,
        Command::LimitSell(args) => limit(client, Side::Sell, args, &tx).await,
        Command::MarketBuy(args) => market(client, Side::Buy, args, &tx).await,
        Command::MarketSell(args) => market(client, Side::Sell, args, &tx).await,
        Command::Cancel { market, order_ids } => {
            let receipt = client
                .create_order(&OrderRequest::cancel(market, order_ids), &tx)
                .await?;
            print_receipt("cancel", &receipt);
            Ok(())
        }
        Command::BatchUpdate(args) => batch_update(client, args, &tx).await,
        Command::L2Book { market, depth } => {
            let executor = client.executor(market).await?;
            let book = executor.orderbook().fetch_l2_book().await?;
            println!("block {}", book.block_num());
            for level in book.asks().iter().take(depth).rev() {
                println!("  ask {:>20} {:>20}", level.price(), level.size());
            }
            for level in book.bids().iter().take(depth) {
                println!("  bid {:>20} {:>20}", level.price(), level.size());
            }
            Ok(())
        }
        Command::Balances { tokens } => {
            let tokens = if tokens.is_empty() {
                vec![Address::ZERO]
            } else {
                tokens
            };
            for token in tokens {
                let balance = client.margin_balance(token).await?;
                println!("{token}: {balance}");
            }
            Ok(())
        }
        Command::Deposit(args) => {
            let amount = parse_amount(&args.amount)?;
            let receipt = client.deposit(args.token, amount, &tx).await?;
            print_receipt("deposit", &receipt);
            Ok(())
        }
        Command::Withdraw(args) => {
            let amount = parse_amount(&args.amount)?;
            let receipt = client.withdraw(args.token, amount, &tx).await?;
            print_receipt("withdraw", &receipt);
            Ok(())
        }
        Command::Watch { market } => {
            let handlers = EventHandlers::new().on_event(|event| println!("{event:?}"));
            let mut feed = client.subscribe(market, handlers).await?;
            let interrupted = tokio::select! {
                result = feed.wait() => {
                    result?;
                    false
                }
                result = tokio::signal::ctrl_c() => {
                    result?;
                    true
                }
            };
            if interrupted {
                info!("interrupted, leaving feed");
                feed.disconnect().await?;
            }
            Ok(())
        }
    }
}

async fn limit(client: &KuruClient, side: Side, args: LimitArgs, tx: &TxOptions) -> Result<()> {
    let mut request = OrderRequest::limit(
        args.market,
        side,
        parse_amount(&args.price)?,
        parse_amount(&args.size)?,
    )
    .with_post_only(args.post_only);
    if let Some(cloid) = &args.cloid {
        request = request.with_cloid(cloid.as_str());
    }
    let receipt = client.create_order(&request, tx).await?;
    print_receipt("limit order", &receipt);

    if let Some(cloid) = args.cloid.map(Cloid::new) {
        let order_id = client
            .tracker(args.market)
            .and_then(|tracker| tracker.order_id(&cloid));
        match order_id {
            Some(id) => println!("{cloid} -> order {id}"),
            None => println!("{cloid} filled on placement"),
        }
    }
    Ok(())
}

async fn market(client: &KuruClient, side: Side, args: MarketArgs, tx: &TxOptions) -> Result<()> {
    let request = OrderRequest::market(
        args.market,
        side,
        parse_amount(&args.size)?,
        parse_amount(&args.min_amount_out)?,
    )
    .with_margin(args.margin)
    .with_fill_or_kill(args.fill_or_kill);
    let receipt = client.create_order(&request, tx).await?;
    print_receipt("market order", &receipt);
    Ok(())
}

async fn batch_update(client: &KuruClient, args: BatchArgs, tx: &TxOptions) -> Result<()> {
    let buys = args
        .buys
        .iter()
        .map(|s| parse_level(s))
        .collect::<std::result::Result<Vec<_>, _>>()?;
    let sells = args
        .sells
        .iter()
        .map(|s| parse_level(s))
        .collect::<std::result::Result<Vec<_>, _>>()?;
    let executor = client.executor(args.market).await?;
    let pending = executor
        .orderbook()
        .batch_update(&buys, &sells, &args.cancel, args.post_only, Rounding::Exact, tx)
        .await?;
    let receipt = pending
        .get_receipt()
        .await
        .map_err(KuruError::from)?;
    print_receipt("batch update", &receipt);
    Ok(())
}

fn print_receipt(action: &str, receipt: &TransactionReceipt) {
    let status = if receipt.status() { "succeeded" } else { "reverted" };
    println!(
        "{action} {status}: {} (gas used {})",
        receipt.transaction_hash, receipt.gas_used
    );
}
