use alloy::{
    primitives::{Address, U256},
    providers::Provider,
};
use fastnum::{UD128, decimal::Context};
use tokio::sync::OnceCell;
use tracing::debug;

use crate::{
    abi::erc20::IERC20::IERC20Instance,
    error::KuruError,
    num::Converter,
    orderbook::PendingTx,
    types::TxOptions,
};

/// Decimals of the chain native asset.
pub const NATIVE_DECIMALS: u8 = 18;

#[derive(Clone, Debug, PartialEq, Eq)]
struct Metadata {
    name: String,
    symbol: String,
    decimals: u8,
}

/// ERC-20 token helper.
///
/// Name, symbol and decimals are fetched on first use and cached.
pub struct Token<P: Provider> {
    instance: IERC20Instance<P>,
    metadata: OnceCell<Metadata>,
}

impl<P: Provider> Token<P> {
    pub fn new(address: Address, provider: P) -> Self {
        Self {
            instance: IERC20Instance::new(address, provider),
            metadata: OnceCell::new(),
        }
    }

    pub fn address(&self) -> Address {
        *self.instance.address()
    }

    pub async fn name(&self) -> Result<String, KuruError> {
        Ok(self.metadata().await?.name.clone())
    }

    pub async fn symbol(&self) -> Result<String, KuruError> {
        Ok(self.metadata().await?.symbol.clone())
    }

    pub async fn decimals(&self) -> Result<u8, KuruError> {
        Ok(self.metadata().await?.decimals)
    }

    pub async fn balance_of(&self, owner: Address) -> Result<U256, KuruError> {
        Ok(self.instance.balanceOf(owner).call().await?)
    }

    pub async fn allowance(&self, owner: Address, spender: Address) -> Result<U256, KuruError> {
        Ok(self.instance.allowance(owner, spender).call().await?)
    }

    pub async fn approve(
        &self,
        spender: Address,
        amount: U256,
        tx: &TxOptions,
    ) -> Result<PendingTx, KuruError> {
        debug!(token = %self.address(), %spender, %amount, "sending approve");
        Ok(tx
            .apply(self.instance.approve(spender, amount))
            .send()
            .await?)
    }

    /// Converts token units to a decimal amount.
    pub async fn format_units(&self, amount: U256) -> Result<UD128, KuruError> {
        Converter::new(self.decimals().await?).from_unsigned(amount)
    }

    /// Converts a decimal string to token units, extra digits are truncated.
    pub async fn parse_units(&self, amount: &str) -> Result<U256, KuruError> {
        let decimals = self.decimals().await?;
        parse_units(amount, decimals)
    }

    async fn metadata(&self) -> Result<&Metadata, KuruError> {
        self.metadata
            .get_or_try_init(|| async {
                let name_call = self.instance.name();
                let symbol_call = self.instance.symbol();
                let decimals_call = self.instance.decimals();
                let (name, symbol, decimals) = futures::try_join!(
                    name_call.call().into_future(),
                    symbol_call.call().into_future(),
                    decimals_call.call().into_future(),
                )?;
                Ok::<_, KuruError>(Metadata {
                    name,
                    symbol,
                    decimals,
                })
            })
            .await
    }
}

/// Converts a decimal string to units of an asset with `decimals`.
pub fn parse_units(amount: &str, decimals: u8) -> Result<U256, KuruError> {
    let value = UD128::from_str(amount.trim(), Context::default())
        .map_err(|e| KuruError::InvalidRequest(format!("invalid amount {amount:?}: {e}")))?;
    Ok(Converter::new(decimals).truncate(value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_units() {
        assert_eq!(parse_units("1.5", 6).unwrap(), U256::from(1_500_000));
        assert_eq!(
            parse_units("0.1", NATIVE_DECIMALS).unwrap(),
            U256::from(100_000_000_000_000_000u64)
        );
        assert_eq!(parse_units(" 2.0000009 ", 6).unwrap(), U256::from(2_000_000));
        assert!(matches!(
            parse_units("abc", 6),
            Err(KuruError::InvalidRequest(_))
        ));
    }
}
