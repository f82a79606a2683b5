mod blocks;

pub use blocks::BlockTimestampCache;
