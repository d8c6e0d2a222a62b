//! High level client tying the contract wrappers, the tracker and the feed together.

use std::sync::Arc;

use alloy::{
    network::EthereumWallet,
    primitives::Address,
    providers::{DynProvider, Provider, ProviderBuilder},
    rpc::types::TransactionReceipt,
    signers::local::PrivateKeySigner,
};
use dashmap::DashMap;
use fastnum::UD128;
use tracing::{info, warn};
use url::Url;

use crate::{
    Chain,
    api::KuruApi,
    error::KuruError,
    executor::OrderExecutor,
    margin::MarginAccount,
    num::Converter,
    orderbook::PendingTx,
    token::{NATIVE_DECIMALS, Token},
    tracker::OrderTracker,
    types::{Cloid, OrderRequest, TxOptions},
    ws::{EventHandlers, WebSocketHandler, WsConfig},
};

/// Signing client of the exchange.
///
/// Executors are created lazily for every market an order is sent to, and
/// each keeps its own [`OrderTracker`]. Orders placed with a CLOID can later
/// be cancelled by that CLOID alone.
pub struct KuruClient {
    chain: Chain,
    provider: DynProvider,
    margin: MarginAccount<DynProvider>,
    executors: DashMap<Address, Arc<OrderExecutor<DynProvider>>>,
    cloid_markets: DashMap<Cloid, Address>,
}

impl KuruClient {
    /// Connects over HTTP and signs with `signer`.
    ///
    /// Fails if the node serves a different chain.
    pub async fn connect(
        chain: Chain,
        rpc_url: Url,
        signer: PrivateKeySigner,
    ) -> Result<Self, KuruError> {
        let owner = signer.address();
        let provider = ProviderBuilder::new()
            .wallet(EthereumWallet::new(signer))
            .connect_http(rpc_url)
            .erased();
        let chain_id = provider.get_chain_id().await?;
        if chain_id != chain.chain_id() {
            return Err(KuruError::Fatal(format!(
                "node serves chain {chain_id}, expected {}",
                chain.chain_id()
            )));
        }
        info!(chain_id, %owner, margin_account = %chain.margin_account(), "client connected");
        Ok(Self::from_provider(chain, provider, owner))
    }

    /// Client over an existing provider, which must sign for `owner`.
    pub fn from_provider(chain: Chain, provider: DynProvider, owner: Address) -> Self {
        Self {
            margin: MarginAccount::new(chain.margin_account(), owner, provider.clone()),
            chain,
            provider,
            executors: DashMap::new(),
            cloid_markets: DashMap::new(),
        }
    }

    pub fn chain(&self) -> &Chain {
        &self.chain
    }

    pub fn owner(&self) -> Address {
        self.margin.owner()
    }

    pub fn provider(&self) -> &DynProvider {
        &self.provider
    }

    pub fn margin_account(&self) -> &MarginAccount<DynProvider> {
        &self.margin
    }

    /// Indexer API of the chain.
    pub fn api(&self) -> KuruApi {
        KuruApi::new(self.chain.api_url().clone())
    }

    /// Deposits a decimal `amount` of `token` and waits for the receipt.
    pub async fn deposit(
        &self,
        token: Address,
        amount: UD128,
        tx: &TxOptions,
    ) -> Result<TransactionReceipt, KuruError> {
        let raw = self.converter(token).await?.truncate(amount);
        confirm(self.margin.deposit(token, raw, tx).await?).await
    }

    /// Withdraws a decimal `amount` of `token` and waits for the receipt.
    pub async fn withdraw(
        &self,
        token: Address,
        amount: UD128,
        tx: &TxOptions,
    ) -> Result<TransactionReceipt, KuruError> {
        let raw = self.converter(token).await?.truncate(amount);
        confirm(self.margin.withdraw(token, raw, tx).await?).await
    }

    /// Margin balance of the owner in `token`.
    pub async fn margin_balance(&self, token: Address) -> Result<UD128, KuruError> {
        let (converter, raw) = futures::try_join!(
            self.converter(token),
            self.margin.get_balance(self.owner(), token)
        )?;
        converter.from_unsigned(raw)
    }

    pub async fn create_order(
        &self,
        request: &OrderRequest,
        tx: &TxOptions,
    ) -> Result<TransactionReceipt, KuruError> {
        let executor = self.executor(request.market_address()).await?;
        self.remember_cloid(request);
        executor.place_order(request, tx).await
    }

    /// Cancels the order placed with `cloid`.
    pub async fn cancel_order(
        &self,
        cloid: &Cloid,
        tx: &TxOptions,
    ) -> Result<TransactionReceipt, KuruError> {
        let market = self
            .cloid_markets
            .get(cloid)
            .map(|m| *m)
            .ok_or_else(|| KuruError::UnknownCloid(cloid.clone()))?;
        self.executor(market)
            .await?
            .cancel_orders(std::slice::from_ref(cloid), tx)
            .await
    }

    pub async fn batch_cancel_orders(
        &self,
        market: Address,
        cloids: &[Cloid],
        tx: &TxOptions,
    ) -> Result<TransactionReceipt, KuruError> {
        self.executor(market).await?.cancel_orders(cloids, tx).await
    }

    /// Sends limit and cancel requests of one market as a single transaction.
    pub async fn batch_orders(
        &self,
        requests: &[OrderRequest],
        tx: &TxOptions,
    ) -> Result<TransactionReceipt, KuruError> {
        let market = single_market(requests)?;
        let executor = self.executor(market).await?;
        requests.iter().for_each(|r| self.remember_cloid(r));
        executor.batch_orders(requests, tx).await
    }

    /// Tracker of a market the client has already sent orders to.
    pub fn tracker(&self, market: Address) -> Option<Arc<OrderTracker>> {
        self.executors.get(&market).map(|e| e.tracker())
    }

    /// Subscribes to the feed of `market`.
    ///
    /// Events update the market tracker before the callbacks of `handlers`
    /// run, so the callbacks observe the new order state.
    pub async fn subscribe(
        &self,
        market: Address,
        handlers: EventHandlers,
    ) -> Result<WebSocketHandler, KuruError> {
        let executor = self.executor(market).await?;
        let tracking = EventHandlers::new().on_event(move |event| {
            executor.handle_event(event);
            handlers.dispatch(event);
        });
        let config = WsConfig::new(self.chain.ws_url().clone()).with_market(market);
        let mut handler = WebSocketHandler::new(config, tracking);
        handler.connect().await?;
        Ok(handler)
    }

    /// Executor of `market`, connected on first use.
    pub async fn executor(
        &self,
        market: Address,
    ) -> Result<Arc<OrderExecutor<DynProvider>>, KuruError> {
        if let Some(executor) = self.executors.get(&market) {
            return Ok(executor.clone());
        }
        let executor = OrderExecutor::connect(market, self.provider.clone()).await?;
        Ok(self
            .executors
            .entry(market)
            .or_insert_with(|| Arc::new(executor))
            .clone())
    }

    fn remember_cloid(&self, request: &OrderRequest) {
        if request.is_cancel() {
            return;
        }
        if let Some(cloid) = request.cloid() {
            let previous = self
                .cloid_markets
                .insert(cloid.clone(), request.market_address());
            if previous.is_some_and(|m| m != request.market_address()) {
                warn!(%cloid, "client order id reused on another market");
            }
        }
    }

    async fn converter(&self, token: Address) -> Result<Converter, KuruError> {
        let decimals = if token.is_zero() {
            NATIVE_DECIMALS
        } else {
            Token::new(token, &self.provider).decimals().await?
        };
        Ok(Converter::new(decimals))
    }
}

async fn confirm(pending: PendingTx) -> Result<TransactionReceipt, KuruError> {
    let receipt = pending.get_receipt().await?;
    if !receipt.status() {
        return Err(KuruError::TransactionFailed(receipt.transaction_hash));
    }
    Ok(receipt)
}

fn single_market(requests: &[OrderRequest]) -> Result<Address, KuruError> {
    let Some(first) = requests.first() else {
        return Err(KuruError::InvalidOrder("empty batch".to_string()));
    };
    let market = first.market_address();
    if let Some(other) = requests.iter().find(|r| r.market_address() != market) {
        return Err(KuruError::InvalidOrder(format!(
            "batch mixes markets {market} and {}",
            other.market_address()
        )));
    }
    Ok(market)
}

#[cfg(test)]
mod tests {
    use alloy::primitives::{address, aliases::{U40, U96}};
    use fastnum::udec128;
    use httpmock::prelude::*;
    use serde_json::json;

    use super::*;
    use crate::{
        abi::orderbook::OrderBook,
        executor::tests::{
            TX_HASH, calldata, created_log, mock_rpc, receipt_json, rpc_provider,
        },
        orderbook::Orderbook,
        tracker::OrderStatus,
        types::{Side, mon_usdc},
    };

    const MARKET: Address = address!("0xd3af145f1aa1a471b5f0f62c52cf8fcdc9ab55d3");

    fn offline_client() -> KuruClient {
        let provider = ProviderBuilder::new()
            .connect_http("http://127.0.0.1:1".parse().unwrap())
            .erased();
        KuruClient::from_provider(Chain::testnet(), provider, Address::ZERO)
    }

    #[test]
    fn test_single_market() {
        let other = address!("0x1111111111111111111111111111111111111111");
        let a = OrderRequest::limit(MARKET, Side::Buy, udec128!(1), udec128!(1));
        let b = OrderRequest::cancel(MARKET, vec![1]);
        assert_eq!(single_market(&[a.clone(), b]).unwrap(), MARKET);

        let c = OrderRequest::cancel(other, vec![2]);
        assert!(matches!(
            single_market(&[a, c]),
            Err(KuruError::InvalidOrder(_))
        ));
        assert!(single_market(&[]).is_err());
    }

    #[tokio::test]
    async fn test_cancel_unknown_cloid() {
        let client = offline_client();
        let cloid = Cloid::new("never-placed");
        let result = client.cancel_order(&cloid, &TxOptions::default()).await;
        assert!(matches!(result, Err(KuruError::UnknownCloid(c)) if c == cloid));
        assert!(client.tracker(MARKET).is_none());
    }

    #[test]
    fn test_remember_cloid_skips_cancels() {
        let client = offline_client();
        let placed = OrderRequest::limit(MARKET, Side::Sell, udec128!(2), udec128!(1))
            .with_cloid(Cloid::new("a"));
        client.remember_cloid(&placed);
        client.remember_cloid(&OrderRequest::cancel_cloids(MARKET, vec![Cloid::new("b")]));

        assert_eq!(
            client.cloid_markets.get(&Cloid::new("a")).map(|m| *m),
            Some(MARKET)
        );
        assert!(!client.cloid_markets.contains_key(&Cloid::new("b")));
    }

    #[tokio::test]
    async fn test_create_and_cancel_by_cloid() {
        let server = MockServer::start_async().await;
        let place = OrderBook::addSellOrderCall {
            price: 35_200_000,
            size: U96::from(150_000_000_000u64),
            postOnly: true,
        };
        let cancel = OrderBook::batchCancelOrdersCall {
            orderIds: vec![U40::from(9)],
        };
        let placed = mock_rpc(&server, "eth_sendTransaction", &[calldata(place)], json!(TX_HASH)).await;
        let cancelled =
            mock_rpc(&server, "eth_sendTransaction", &[calldata(cancel)], json!(TX_HASH)).await;
        let logs = [(MARKET, created_log(9, 35_200_000, false))];
        mock_rpc(&server, "eth_getTransactionReceipt", &[], receipt_json(true, &logs)).await;

        let client =
            KuruClient::from_provider(Chain::testnet(), rpc_provider(&server.base_url()), Address::ZERO);
        let executor = OrderExecutor::new(Orderbook::with_market_params(
            MARKET,
            client.provider().clone(),
            mon_usdc(),
        ));
        client.executors.insert(MARKET, Arc::new(executor));

        let cloid = Cloid::new("ask-1");
        let request = OrderRequest::limit(MARKET, Side::Sell, udec128!(3.52), udec128!(1.5))
            .with_post_only(true)
            .with_cloid(cloid.clone());
        client
            .create_order(&request, &TxOptions::default())
            .await
            .unwrap();
        placed.assert_async().await;

        let tracker = client.tracker(MARKET).unwrap();
        assert_eq!(tracker.order_id(&cloid), Some(9));

        client
            .cancel_order(&cloid, &TxOptions::default())
            .await
            .unwrap();
        cancelled.assert_async().await;
        assert_eq!(tracker.status(&cloid), Some(OrderStatus::Cancelled));
    }
}
