use alloy::primitives::{Address, address};
use httpmock::prelude::*;
use kuru_sdk::{api::KuruApi, error::KuruError, types::Cloid};
use serde_json::json;
use tokio_test::{assert_err, assert_ok};
use url::Url;

const MARKET: Address = address!("0xd3af145f1aa1a471b5f0f62c52cf8fcdc9ab55d3");
const USER: Address = address!("0x1111111111111111111111111111111111111111");

fn api(server: &MockServer) -> KuruApi {
    KuruApi::new(Url::parse(&server.url("/api/v2")).unwrap())
}

fn order_json(order_id: u64, price: &str) -> serde_json::Value {
    json!({
        "marketAddress": "0xd3af145f1aa1a471b5f0f62c52cf8fcdc9ab55d3",
        "orderid": order_id,
        "owner": "0x1111111111111111111111111111111111111111",
        "size": "10000000000",
        "price": price,
        "isbuy": true,
        "remainingsize": 5000000000u64,
        "iscanceled": false,
        "blocknumber": "41753780",
        "txindex": 5,
        "logindex": 14,
        "transactionhash": "0x47de82c4aa40baa30cabac4a74568488a8c74ded85a4e905f1ceaad4f29945e3",
        "triggertime": "2025-10-07T13:36:45.000Z"
    })
}

#[tokio::test]
async fn test_get_user_orders() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/api/v2/orders/user/0x1111111111111111111111111111111111111111")
                .query_param("limit", "10")
                .query_param("offset", "20");
            then.status(200).json_body(json!({
                "success": true,
                "data": { "data": [order_json(7, "35100000"), order_json(8, "35200000")] }
            }));
        })
        .await;

    let orders = assert_ok!(api(&server).get_user_orders(USER, Some(10), Some(20)).await);
    mock.assert_async().await;

    assert_eq!(orders.len(), 2);
    assert_eq!(orders[0].order_id, 7);
    assert_eq!(orders[0].market_address, MARKET);
    assert_eq!(orders[0].price, "35100000");
    assert_eq!(orders[0].remaining_size, "5000000000");
    assert_eq!(orders[0].block_number, 41753780);
    assert_eq!(orders[0].tx_index, 5);
    assert!(orders[0].is_buy);
    assert!(orders[0].transaction_hash.is_some());
    assert_eq!(orders[1].price, "35200000");
}

#[tokio::test]
async fn test_get_active_orders_without_list() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/api/v2/0x1111111111111111111111111111111111111111/user/orders/active");
            then.status(200).json_body(json!({ "success": true, "data": {} }));
        })
        .await;

    let orders = assert_ok!(api(&server).get_active_orders(USER, None, None).await);
    mock.assert_async().await;
    assert!(orders.is_empty());
}

#[tokio::test]
async fn test_get_trades_time_range() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(GET)
                .path(
                    "/api/v2/0xd3af145f1aa1a471b5f0f62c52cf8fcdc9ab55d3/trades/user/0x1111111111111111111111111111111111111111",
                )
                .query_param("startTimestamp", "1759844000")
                .query_param("endTimestamp", "1759845000");
            then.status(200).json_body(json!({
                "data": { "data": [{
                    "orderid": "9",
                    "makeraddress": "0x1111111111111111111111111111111111111111",
                    "takeraddress": "0x2222222222222222222222222222222222222222",
                    "isbuy": false,
                    "price": "35100000",
                    "filledsize": "2500000000",
                    "blocknumber": 41753781,
                    "txindex": 1,
                    "logindex": 3,
                    "transactionhash": "0xe2f90e72fd2c741ed02cfd7153e40d0d2d15472a44f5e9c30d3c9d189f02bcf6",
                    "triggertime": 1759844206,
                    "monadPrice": 3.51
                }] }
            }));
        })
        .await;

    let trades = assert_ok!(
        api(&server)
            .get_trades(MARKET, USER, Some(1759844000), Some(1759845000))
            .await
    );
    mock.assert_async().await;

    assert_eq!(trades.len(), 1);
    assert_eq!(trades[0].order_id, 9);
    assert_eq!(
        trades[0].taker_address,
        address!("0x2222222222222222222222222222222222222222")
    );
    assert_eq!(trades[0].filled_size, "2500000000");
    assert_eq!(trades[0].trigger_time, "1759844206");
    assert_eq!(trades[0].monad_price, Some(3.51));
}

#[tokio::test]
async fn test_get_orders_by_ids() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/api/v2/orders/market/0xd3af145f1aa1a471b5f0f62c52cf8fcdc9ab55d3")
                .query_param("orderIds", "1,2");
            then.status(200)
                .json_body(json!({ "data": { "data": [order_json(1, "1"), order_json(2, "2")] } }));
        })
        .await;

    let orders = assert_ok!(api(&server).get_orders_by_ids(MARKET, &[1, 2]).await);
    mock.assert_async().await;
    assert_eq!(
        orders.iter().map(|o| o.order_id).collect::<Vec<_>>(),
        vec![1, 2]
    );
}

#[tokio::test]
async fn test_get_orders_by_cloids() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/api/v2/orders/client")
                .json_body(json!({
                    "clientOrderIds": ["0xabc", "0x01"],
                    "marketAddress": "0xd3af145f1aa1a471b5f0f62c52cf8fcdc9ab55d3",
                    "userAddress": "0x1111111111111111111111111111111111111111"
                }));
            then.status(200).json_body(json!({
                "data": { "data": [{ "orderid": 3, "cloid": "0xabc" }] }
            }));
        })
        .await;

    let cloids = [Cloid::new("abc"), Cloid::new("0x01")];
    let orders = assert_ok!(api(&server).get_orders_by_cloids(MARKET, USER, &cloids).await);
    mock.assert_async().await;

    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0].order_id, 3);
    assert_eq!(orders[0].cloid.as_deref(), Some("0xabc"));
}

#[tokio::test]
async fn test_error_status() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/api/v2/orders/user/0x1111111111111111111111111111111111111111");
            then.status(500).body("indexer unavailable");
        })
        .await;

    let err = assert_err!(api(&server).get_user_orders(USER, None, None).await);
    mock.assert_async().await;
    assert!(matches!(err, KuruError::Api(ref msg) if msg.contains("500") && msg.contains("indexer unavailable")));
}
