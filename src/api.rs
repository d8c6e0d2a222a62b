//! Client of the exchange indexer REST API.

use alloy::primitives::{Address, TxHash};
use itertools::Itertools;
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, de::DeserializeOwned};
use tracing::debug;
use url::Url;

use crate::{
    error::KuruError,
    types::{Cloid, OrderId, flexible},
};

/// Order as indexed by the API.
///
/// Prices and sizes are kept in the textual form the API sends them in.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ApiOrder {
    #[serde(rename = "marketAddress")]
    pub market_address: Address,
    #[serde(rename = "orderid", deserialize_with = "flexible::u64")]
    pub order_id: OrderId,
    pub owner: Address,
    #[serde(deserialize_with = "flexible::string")]
    pub size: String,
    #[serde(deserialize_with = "flexible::string")]
    pub price: String,
    #[serde(rename = "isbuy")]
    pub is_buy: bool,
    #[serde(rename = "remainingsize", deserialize_with = "flexible::string")]
    pub remaining_size: String,
    #[serde(rename = "iscanceled")]
    pub is_canceled: bool,
    #[serde(rename = "blocknumber", deserialize_with = "flexible::u64")]
    pub block_number: u64,
    #[serde(rename = "txindex", deserialize_with = "flexible::u64")]
    pub tx_index: u64,
    #[serde(rename = "logindex", deserialize_with = "flexible::u64")]
    pub log_index: u64,
    #[serde(rename = "transactionhash")]
    pub transaction_hash: Option<TxHash>,
    #[serde(rename = "triggertime", deserialize_with = "flexible::string")]
    pub trigger_time: String,
    pub cloid: Option<String>,
}

/// Trade as indexed by the API.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ApiTrade {
    #[serde(rename = "orderid", deserialize_with = "flexible::u64")]
    pub order_id: OrderId,
    #[serde(rename = "makeraddress")]
    pub maker_address: Address,
    #[serde(rename = "takeraddress")]
    pub taker_address: Address,
    #[serde(rename = "isbuy")]
    pub is_buy: bool,
    #[serde(deserialize_with = "flexible::string")]
    pub price: String,
    #[serde(rename = "filledsize", deserialize_with = "flexible::string")]
    pub filled_size: String,
    #[serde(rename = "blocknumber", deserialize_with = "flexible::u64")]
    pub block_number: u64,
    #[serde(rename = "txindex", deserialize_with = "flexible::u64")]
    pub tx_index: u64,
    #[serde(rename = "logindex", deserialize_with = "flexible::u64")]
    pub log_index: u64,
    #[serde(rename = "transactionhash")]
    pub transaction_hash: Option<TxHash>,
    #[serde(rename = "triggertime", deserialize_with = "flexible::string")]
    pub trigger_time: String,
    #[serde(rename = "monadPrice")]
    pub monad_price: Option<f64>,
}

#[derive(Deserialize)]
struct Envelope<T> {
    #[serde(default = "Option::default")]
    data: Option<Page<T>>,
}

#[derive(Deserialize)]
struct Page<T> {
    #[serde(default = "Vec::new")]
    data: Vec<T>,
}

#[derive(serde::Serialize)]
#[serde(rename_all = "camelCase")]
struct ClientOrdersRequest {
    client_order_ids: Vec<String>,
    market_address: String,
    user_address: String,
}

/// Indexer API client, read-only.
#[derive(Clone, Debug)]
pub struct KuruApi {
    client: Client,
    base: String,
}

impl KuruApi {
    pub fn new(base: Url) -> Self {
        Self::with_client(Client::new(), base)
    }

    pub fn with_client(client: Client, base: Url) -> Self {
        Self {
            client,
            base: base.as_str().trim_end_matches('/').to_string(),
        }
    }

    /// Order history of a user across markets.
    pub async fn get_user_orders(
        &self,
        user: Address,
        limit: Option<u32>,
        offset: Option<u32>,
    ) -> Result<Vec<ApiOrder>, KuruError> {
        let req = self
            .client
            .get(format!("{}/orders/user/{}", self.base, hex(user)))
            .query(&page_query(limit, offset));
        self.fetch(req).await
    }

    /// Orders of a user still resting on the books.
    pub async fn get_active_orders(
        &self,
        user: Address,
        limit: Option<u32>,
        offset: Option<u32>,
    ) -> Result<Vec<ApiOrder>, KuruError> {
        let req = self
            .client
            .get(format!("{}/{}/user/orders/active", self.base, hex(user)))
            .query(&page_query(limit, offset));
        self.fetch(req).await
    }

    /// Trades of a user on a market, optionally within a time range in seconds.
    pub async fn get_trades(
        &self,
        market: Address,
        user: Address,
        start_timestamp: Option<u64>,
        end_timestamp: Option<u64>,
    ) -> Result<Vec<ApiTrade>, KuruError> {
        let mut query = Vec::new();
        if let Some(start) = start_timestamp {
            query.push(("startTimestamp", start.to_string()));
        }
        if let Some(end) = end_timestamp {
            query.push(("endTimestamp", end.to_string()));
        }
        let req = self
            .client
            .get(format!(
                "{}/{}/trades/user/{}",
                self.base,
                hex(market),
                hex(user)
            ))
            .query(&query);
        self.fetch(req).await
    }

    pub async fn get_orders_by_ids(
        &self,
        market: Address,
        order_ids: &[OrderId],
    ) -> Result<Vec<ApiOrder>, KuruError> {
        let req = self
            .client
            .get(format!("{}/orders/market/{}", self.base, hex(market)))
            .query(&[("orderIds", order_ids.iter().join(","))]);
        self.fetch(req).await
    }

    /// Orders placed through the SDK with the given CLOIDs.
    pub async fn get_orders_by_cloids(
        &self,
        market: Address,
        user: Address,
        cloids: &[Cloid],
    ) -> Result<Vec<ApiOrder>, KuruError> {
        let body = ClientOrdersRequest {
            client_order_ids: cloids.iter().map(Cloid::to_hex_prefixed).collect(),
            market_address: hex(market),
            user_address: hex(user),
        };
        let req = self
            .client
            .post(format!("{}/orders/client", self.base))
            .json(&body);
        self.fetch(req).await
    }

    async fn fetch<T: DeserializeOwned>(&self, req: RequestBuilder) -> Result<Vec<T>, KuruError> {
        let req = req.build()?;
        debug!(method = %req.method(), url = %req.url(), "api request");
        let resp = self.client.execute(req).await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(KuruError::Api(format!("status {status}: {body}")));
        }
        let envelope: Envelope<T> = serde_json::from_slice(&resp.bytes().await?)?;
        Ok(envelope.data.map(|page| page.data).unwrap_or_default())
    }
}

fn hex(address: Address) -> String {
    address.to_string().to_lowercase()
}

fn page_query(limit: Option<u32>, offset: Option<u32>) -> Vec<(&'static str, u32)> {
    [("limit", limit), ("offset", offset)]
        .into_iter()
        .filter_map(|(key, value)| value.map(|v| (key, v)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_without_inner_list() {
        let envelope: Envelope<ApiOrder> =
            serde_json::from_str(r#"{"success":true,"data":{}}"#).unwrap();
        assert!(envelope.data.unwrap().data.is_empty());

        let envelope: Envelope<ApiOrder> = serde_json::from_str(r#"{"success":false}"#).unwrap();
        assert!(envelope.data.is_none());
    }

    #[test]
    fn test_page_query_skips_unset() {
        assert_eq!(page_query(Some(10), None), vec![("limit", 10)]);
        assert!(page_query(None, None).is_empty());
    }
}
