use alloy::{
    contract::{CallBuilder, CallDecoder},
    providers::Provider,
};

/// Optional transaction parameters overriding what the provider fills in.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TxOptions {
    gas_limit: Option<u64>,
    gas_price: Option<u128>,
    max_fee_per_gas: Option<u128>,
    max_priority_fee_per_gas: Option<u128>,
    nonce: Option<u64>,
}

impl TxOptions {
    pub fn with_gas_limit(mut self, gas_limit: u64) -> Self {
        self.gas_limit = Some(gas_limit);
        self
    }

    /// Legacy gas price, mutually exclusive with EIP-1559 fees on the node side.
    pub fn with_gas_price(mut self, gas_price: u128) -> Self {
        self.gas_price = Some(gas_price);
        self
    }

    pub fn with_max_fee_per_gas(mut self, max_fee_per_gas: u128) -> Self {
        self.max_fee_per_gas = Some(max_fee_per_gas);
        self
    }

    pub fn with_max_priority_fee_per_gas(mut self, max_priority_fee_per_gas: u128) -> Self {
        self.max_priority_fee_per_gas = Some(max_priority_fee_per_gas);
        self
    }

    pub fn with_nonce(mut self, nonce: u64) -> Self {
        self.nonce = Some(nonce);
        self
    }

    pub fn gas_limit(&self) -> Option<u64> {
        self.gas_limit
    }

    pub fn gas_price(&self) -> Option<u128> {
        self.gas_price
    }

    pub fn max_fee_per_gas(&self) -> Option<u128> {
        self.max_fee_per_gas
    }

    pub fn max_priority_fee_per_gas(&self) -> Option<u128> {
        self.max_priority_fee_per_gas
    }

    pub fn nonce(&self) -> Option<u64> {
        self.nonce
    }

    /// Applies the set fields to the contract call.
    pub fn apply<P: Provider, D: CallDecoder>(&self, mut call: CallBuilder<P, D>) -> CallBuilder<P, D> {
        if let Some(gas) = self.gas_limit {
            call = call.gas(gas);
        }
        if let Some(gas_price) = self.gas_price {
            call = call.gas_price(gas_price);
        }
        if let Some(max_fee) = self.max_fee_per_gas {
            call = call.max_fee_per_gas(max_fee);
        }
        if let Some(priority_fee) = self.max_priority_fee_per_gas {
            call = call.max_priority_fee_per_gas(priority_fee);
        }
        if let Some(nonce) = self.nonce {
            call = call.nonce(nonce);
        }
        call
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_sets_only_given_fields() {
        let opts = TxOptions::default().with_gas_limit(500_000).with_nonce(7);
        assert_eq!(opts.gas_limit(), Some(500_000));
        assert_eq!(opts.nonce(), Some(7));
        assert_eq!(opts.gas_price(), None);
        assert_eq!(opts.max_fee_per_gas(), None);
        assert_eq!(opts.max_priority_fee_per_gas(), None);
    }
}
