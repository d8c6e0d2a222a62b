#[allow(clippy::too_many_arguments)]
pub mod orderbook {
    alloy::sol!(
        /// Orderbook market contract.
        #[derive(Debug)]
        #[sol(rpc)]
        contract OrderBook {
            event OrderCreated(uint40 orderId, address owner, uint96 size, uint32 price, bool isBuy);
            event Trade(
                uint40 orderId,
                address makerAddress,
                bool isBuy,
                uint256 price,
                uint96 updatedSize,
                address takerAddress,
                address txOrigin,
                uint96 filledSize
            );
            event OrdersCanceled(uint40[] orderId, address owner);

            function addBuyOrder(uint32 price, uint96 size, bool postOnly) external;
            function addSellOrder(uint32 price, uint96 size, bool postOnly) external;
            function placeAndExecuteMarketBuy(
                uint96 quoteSize,
                uint256 minAmountOut,
                bool isMargin,
                bool isFillOrKill
            ) external payable returns (uint256);
            function placeAndExecuteMarketSell(
                uint96 size,
                uint256 minAmountOut,
                bool isMargin,
                bool isFillOrKill
            ) external payable returns (uint256);
            function batchCancelOrders(uint40[] orderIds) external;
            function batchUpdate(
                uint32[] buyPrices,
                uint96[] buySizes,
                uint32[] sellPrices,
                uint96[] sellSizes,
                uint40[] orderIdsToCancel,
                bool postOnly
            ) external;

            function getMarketParams() external view returns (
                uint32 pricePrecision,
                uint96 sizePrecision,
                address baseAssetAddress,
                uint256 baseAssetDecimals,
                address quoteAssetAddress,
                uint256 quoteAssetDecimals,
                uint32 tickSize,
                uint96 minSize,
                uint96 maxSize,
                uint256 takerFeeBps,
                uint256 makerFeeBps
            );
            function bestBidAsk() external view returns (uint256 bestBid, uint256 bestAsk);
            function getL2Book() external view returns (bytes);
        }
    );
}

#[allow(clippy::too_many_arguments)]
pub mod margin {
    alloy::sol!(
        /// Margin account holding trader collateral for all markets.
        #[derive(Debug)]
        #[sol(rpc)]
        contract MarginAccount {
            event Deposit(address owner, address token, uint256 amount);
            event Withdrawal(address owner, address token, uint256 amount);

            function deposit(address user, address token, uint256 amount) external payable;
            function withdraw(uint256 amount, address token) external;
            function getBalance(address user, address token) external view returns (uint256);
        }
    );
}

pub mod erc20 {
    alloy::sol!(
        #[derive(Debug)]
        #[sol(rpc)]
        interface IERC20 {
            function name() external view returns (string);
            function symbol() external view returns (string);
            function decimals() external view returns (uint8);
            function balanceOf(address account) external view returns (uint256);
            function allowance(address owner, address spender) external view returns (uint256);
            function approve(address spender, uint256 amount) external returns (bool);
            function transfer(address to, uint256 amount) external returns (bool);
        }
    );
}

pub mod errors {
    alloy::sol!(
        /// Custom errors the orderbook and margin account contracts revert with.
        #[derive(Debug, PartialEq, Eq)]
        interface KuruErrors {
            error OnlyOwnerAllowedError();
            error OnlyVaultAllowed();
            error SizeError();
            error TickSizeError();
            error PriceError();
            error PostOnlyError();
            error ProvisionError();
            error InsufficientLiquidityError();
            error MarketStateError();
            error MarketFeeError();
            error NativeAssetInsufficient();
            error NativeAssetSurplus();
            error NativeAssetTransferFail();
            error OrderAlreadyFilledOrCancelled();
            error SlippageExceeded();
            error LengthMismatch();
            error InsufficientBalance();
            error NativeAssetMismatch();
            error ZeroAddressNotAllowed();
        }
    );
}
