use alloy::sol;

// First-generation launchpad schema. Trades carry no price field, so
// market capitalization cannot be derived from these logs.
sol! {
    event TokenCreated(address indexed token, address indexed creator, string name, string symbol, uint256 totalSupply);
    event TokenPurchased(address indexed token, address indexed buyer, uint256 amount, uint256 cost);
    event TokenSold(address indexed token, address indexed seller, uint256 amount, uint256 refund);
    event TokenMigrated(address indexed token, uint256 fee);
    event TradingHalted(address indexed token);
}
