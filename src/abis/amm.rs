use alloy::sol;

// Third-party AMM pair event, emitted by the liquidity pools that migrated
// tokens trade on after graduating from the bonding curve.
sol! {
    event Swap(address indexed sender, uint256 amount0In, uint256 amount1In, uint256 amount0Out, uint256 amount1Out, address indexed to);
}
