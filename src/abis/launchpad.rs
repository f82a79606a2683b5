use alloy::sol;

sol! {
    #[sol(rpc)]
    interface ILaunchpad {
        function founderOf(address token) external view returns (address);
        function pairOf(address token) external view returns (address);
    }
}
