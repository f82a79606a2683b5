use alloy::sol;

// Second-generation launchpad schema. Trades include the spot price and the
// bonding-curve offers/funds pair; creates carry a metadata URI.
sol! {
    event TokenCreated(address indexed token, address indexed creator, string name, string symbol, uint256 totalSupply, string uri);
    event TokenPurchased(address indexed token, address indexed buyer, uint256 amount, uint256 cost, uint256 price, uint256 offers, uint256 funds);
    event TokenSold(address indexed token, address indexed seller, uint256 amount, uint256 refund, uint256 price, uint256 offers, uint256 funds);
    event TokenMigrated(address indexed token, uint256 fee);
    event TradingHalted(address indexed token);
}
