//! Contract bindings
#![allow(clippy::too_many_arguments)]

use ethers::contract::abigen;

abigen!(
    CurveLens,
    r#"[
        function getCurveState(address token) external view returns (uint256 progressBps, bool graduated, bool locked)
        function getAmountOut(address token, uint256 amountIn, bool isBuy) external view returns (address router, uint256 amountOut)
    ]"#
);

abigen!(
    CurveRouter,
    r#"[
        function buy(uint256 amountOutMin, address token, address to, uint256 deadline) external payable
        function sell(uint256 amountIn, uint256 amountOutMin, address token, address to, uint256 deadline) external
        function sellPermit(uint256 amountIn, uint256 amountOutMin, address token, address to, uint256 deadline, uint8 v, bytes32 r, bytes32 s) external
    ]"#
);

abigen!(
    PermitToken,
    r#"[
        function nonces(address owner) external view returns (uint256)
        function DOMAIN_SEPARATOR() external view returns (bytes32)
        function approve(address spender, uint256 value) external returns (bool)
        function allowance(address owner, address spender) external view returns (uint256)
        function decimals() external view returns (uint8)
    ]"#
);
