use std::time::Duration;

use alloy::{
    primitives::Address, providers::Provider, rpc::types::Filter, sol_types::SolEventInterface,
};
use futures::{Stream, stream};
use tracing::trace;

use crate::{abi::orderbook::OrderBook::OrderBookEvents, error::KuruError, types};

pub type RawEvent = types::EventContext<OrderBookEvents>;
pub type RawBlockEvents = types::BlockEvents<RawEvent>;

/// Returns stream of raw events emitted by the given orderbook contracts,
/// batched per block, starting from the specified block.
///
/// Polls logs via the given [`Provider`] to produce strictly continuous
/// block sequence, with [`Provider`]-configured interval. Blocks without
/// orderbook activity are yielded with no events.
///
/// It is recommended to setup provider with
/// [`alloy::transports::layers::RetryBackoffLayer`].
///
/// Logs that are not orderbook events are skipped. Fails if `orderbooks` is
/// empty, as the node would then return logs of every contract.
pub fn raw<P, S, SFut>(
    orderbooks: Vec<Address>,
    provider: P,
    from_block: u64,
    sleep: S,
) -> Result<impl Stream<Item = Result<RawBlockEvents, KuruError>>, KuruError>
where
    P: Provider,
    S: Fn(Duration) -> SFut + Copy,
    SFut: Future<Output = ()>,
{
    if orderbooks.is_empty() {
        return Err(KuruError::InvalidRequest(
            "no orderbook addresses to stream".to_string(),
        ));
    }
    Ok(stream::unfold(
        (provider, orderbooks, from_block),
        move |(provider, orderbooks, mut block_num)| async move {
            let filter = Filter::new()
                .address(orderbooks.clone())
                .from_block(block_num)
                .to_block(block_num);
            loop {
                // Some nodes answer with an empty log list for blocks past the tip,
                // so the tip is checked explicitly
                let result =
                    futures::try_join!(provider.get_block_number(), provider.get_logs(&filter))
                        .map_err(KuruError::from)
                        .and_then(|(head_block_num, logs)| {
                            if head_block_num < block_num {
                                return Err(KuruError::InvalidRequest(
                                    "block is not available yet".to_string(),
                                ));
                            }
                            let block_ts = logs.first().and_then(|l| l.block_timestamp);
                            let events = logs
                                .iter()
                                .filter_map(|log| match OrderBookEvents::decode_log(&log.inner) {
                                    Ok(decoded) => Some(RawEvent::new(
                                        log.transaction_hash.unwrap_or_default(),
                                        log.transaction_index.unwrap_or_default(),
                                        log.log_index.unwrap_or_default(),
                                        log.address(),
                                        decoded.data,
                                    )),
                                    Err(err) => {
                                        trace!(block_num, address = %log.address(), %err, "skipping log");
                                        None
                                    }
                                })
                                .collect();
                            Ok(RawBlockEvents::new(
                                block_num,
                                block_ts.unwrap_or_default(),
                                events,
                            ))
                        });
                if result.is_ok() {
                    block_num += 1;
                    return Some((result, (provider, orderbooks, block_num)));
                }
                if matches!(result, Err(KuruError::InvalidRequest(_))) {
                    sleep(provider.client().poll_interval()).await;
                    continue;
                }
                return Some((result, (provider, orderbooks, block_num)));
            }
        },
    ))
}

#[cfg(test)]
mod tests {
    use alloy::{
        primitives::address, providers::ProviderBuilder, rpc::client::RpcClient,
        transports::layers::RetryBackoffLayer,
    };
    use futures::StreamExt;

    use super::*;

    #[test]
    fn test_rejects_empty_orderbooks() {
        let provider = ProviderBuilder::new().connect_http("http://127.0.0.1:1".parse().unwrap());
        let result = raw(vec![], provider, 1, tokio::time::sleep);
        assert!(matches!(result, Err(KuruError::InvalidRequest(_))));
    }

    #[tokio::test]
    #[ignore = "requires Monad testnet access"]
    async fn test_stream_recent_blocks() {
        let client = RpcClient::builder()
            .layer(RetryBackoffLayer::new(10, 100, 200))
            .connect("https://testnet-rpc.monad.xyz")
            .await
            .unwrap();
        client.set_poll_interval(Duration::from_millis(100));
        let provider = ProviderBuilder::new().connect_client(client);

        let mon_usdc = address!("0xd3af145f1aa1a471b5f0f62c52cf8fcdc9ab55d3");
        let mut block_num = provider.get_block_number().await.unwrap() + 1;
        let stream = raw(vec![mon_usdc], provider, block_num, tokio::time::sleep).unwrap();
        let block_results = stream.take(10).collect::<Vec<_>>().await;

        for b in &block_results {
            let block = b.as_ref().unwrap();
            assert_eq!(block.block_number(), block_num);
            assert!(block.events().iter().all(|e| e.address() == mon_usdc));
            block_num += 1;
        }
    }
}
