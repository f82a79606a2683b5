pub mod amm;
pub mod erc20;
pub mod launchpad;
pub mod v1;
pub mod v2;

pub use erc20::IERC20;
pub use launchpad::ILaunchpad;
