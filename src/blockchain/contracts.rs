//! 외부 컨트랙트 ABI 바인딩
//!
//! ERC-20, Uniswap V3 (factory / quoter / swap router) 그리고 거래 실행,
//! 포트폴리오, AI 오라클 컨트랙트의 호출 표면만 정의한다.

use alloy::sol;

sol! {
    #[sol(rpc)]
    interface IERC20 {
        function balanceOf(address account) external view returns (uint256);
        function allowance(address owner, address spender) external view returns (uint256);
        function approve(address spender, uint256 amount) external returns (bool);
        function decimals() external view returns (uint8);
        function symbol() external view returns (string memory);
        function name() external view returns (string memory);
    }

    #[sol(rpc)]
    interface IUniswapV3Factory {
        /// 풀이 없으면 0 주소
        function getPool(address tokenA, address tokenB, uint24 fee) external view returns (address pool);
    }

    /// Uniswap V3 Quoter (V1). 내부적으로 revert 하므로 eth_call로만 호출한다.
    #[sol(rpc)]
    interface IQuoter {
        function quoteExactInputSingle(
            address tokenIn,
            address tokenOut,
            uint24 fee,
            uint256 amountIn,
            uint160 sqrtPriceLimitX96
        ) external returns (uint256 amountOut);

        function quoteExactInput(bytes memory path, uint256 amountIn) external returns (uint256 amountOut);
    }

    #[sol(rpc)]
    interface ISwapRouter {
        struct ExactInputSingleParams {
            address tokenIn;
            address tokenOut;
            uint24 fee;
            address recipient;
            uint256 deadline;
            uint256 amountIn;
            uint256 amountOutMinimum;
            uint160 sqrtPriceLimitX96;
        }

        function exactInputSingle(ExactInputSingleParams calldata params) external payable returns (uint256 amountOut);
    }

    #[sol(rpc)]
    interface ITradeExecutor {
        function executeManualTrade(address tokenIn, address tokenOut, uint256 amountIn, address recipient) external returns (uint256 amountOut);
        function whitelistedTokens(address token) external view returns (bool);
        function findBestPool(address tokenIn, address tokenOut) external view returns (address pool, uint24 fee);
        function MIN_TRADE_AMOUNT() external view returns (uint256);
    }

    #[sol(rpc)]
    interface IPortfolioManager {
        function createPortfolio(uint8 riskLevel) external;
        function deposit(address token, uint256 amount) external;
        function withdraw(address token, uint256 amount) external;
        function userPortfolios(address user) external view returns (uint256 totalValue, uint8 riskLevel, bool isActive, uint256 createdAt);
        function getTokenBalance(address user, address token) external view returns (uint256);
        function updateAutoTrading(bool enabled, uint256 minConfidence, uint256 maxRiskScore, uint256 tradeAmount) external;
        function getAutoTradingSettings(address user) external view returns (bool enabled, uint256 minConfidence, uint256 maxRiskScore, uint256 tradeAmount);
        function approvedTokens(address token) external view returns (bool);
        function addToken(address token) external;
    }

    #[sol(rpc)]
    interface IAIOracle {
        function getPrediction(address token) external view returns (
            uint256 confidence,
            int256 priceDirection,
            uint256 timestamp,
            bool isHoneypot,
            uint256 riskScore
        );
    }
}
