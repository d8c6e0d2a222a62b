//! Margin account contract wrapper.

use alloy::{
    primitives::{Address, U256},
    providers::Provider,
};
use tracing::{debug, info};

use crate::{
    abi::{erc20::IERC20::IERC20Instance, margin::MarginAccount::MarginAccountInstance},
    error::KuruError,
    orderbook::PendingTx,
    types::TxOptions,
};

/// Wrapper over the margin account contract acting on behalf of `owner`.
///
/// Amounts are in token units, the zero address stands for the native asset.
pub struct MarginAccount<P: Provider> {
    instance: MarginAccountInstance<P>,
    owner: Address,
}

impl<P: Provider> MarginAccount<P> {
    pub fn new(address: Address, owner: Address, provider: P) -> Self {
        Self {
            instance: MarginAccountInstance::new(address, provider),
            owner,
        }
    }

    pub fn address(&self) -> Address {
        *self.instance.address()
    }

    pub fn owner(&self) -> Address {
        self.owner
    }

    /// Deposits `amount` of `token` to the owner's margin balance.
    ///
    /// For ERC-20 tokens the allowance is checked first. When it is short,
    /// exactly `amount` is approved and the approval receipt is awaited
    /// before the deposit is sent.
    pub async fn deposit(
        &self,
        token: Address,
        amount: U256,
        tx: &TxOptions,
    ) -> Result<PendingTx, KuruError> {
        if amount.is_zero() {
            return Err(KuruError::InvalidRequest("zero deposit amount".to_string()));
        }
        let value = if token.is_zero() {
            amount
        } else {
            self.ensure_allowance(token, amount).await?;
            U256::ZERO
        };
        debug!(margin_account = %self.address(), %token, %amount, "sending deposit");
        let pending = tx
            .apply(self.instance.deposit(self.owner, token, amount).value(value))
            .send()
            .await?;
        Ok(pending)
    }

    pub async fn withdraw(
        &self,
        token: Address,
        amount: U256,
        tx: &TxOptions,
    ) -> Result<PendingTx, KuruError> {
        if amount.is_zero() {
            return Err(KuruError::InvalidRequest(
                "zero withdrawal amount".to_string(),
            ));
        }
        debug!(margin_account = %self.address(), %token, %amount, "sending withdrawal");
        let pending = tx
            .apply(self.instance.withdraw(amount, token))
            .send()
            .await?;
        Ok(pending)
    }

    pub async fn get_balance(&self, user: Address, token: Address) -> Result<U256, KuruError> {
        Ok(self.instance.getBalance(user, token).call().await?)
    }

    async fn ensure_allowance(&self, token: Address, amount: U256) -> Result<(), KuruError> {
        let erc20 = IERC20Instance::new(token, self.instance.provider());
        let allowance = erc20.allowance(self.owner, self.address()).call().await?;
        if allowance >= amount {
            return Ok(());
        }
        info!(%token, %allowance, %amount, "approving margin account");
        let receipt = erc20
            .approve(self.address(), amount)
            .send()
            .await?
            .get_receipt()
            .await?;
        if !receipt.status() {
            return Err(KuruError::TransactionFailed(receipt.transaction_hash));
        }
        Ok(())
    }
}
