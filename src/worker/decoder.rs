//! Log decoding module.
//!
//! Maps raw subscription logs to typed [`DecodedEvent`]s. Dispatch is an
//! explicit per-schema-version table: the origin tag selects which ABI
//! module's signatures a log is matched against, so a layout change in a
//! future schema version can never silently read the wrong field.
//!
//! Pure and stateless: no I/O, and decoding the same log twice yields
//! identical results.

use alloy::primitives::{Address, B256, U256};
use alloy::rpc::types::Log;
use alloy::sol_types::SolEvent;
use serde::Deserialize;

use crate::abis::{amm, v1, v2};
use crate::models::TradeDirection;
use crate::utils::{format_units, NOT_AVAILABLE, TOKEN_DECIMALS};

/// Launchpad contract schema generation.
///
/// V1 trade events carry no price field; V2 adds price and the
/// offers/funds pair, and creates carry a metadata URI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemaVersion {
    V1,
    V2,
}

/// Which monitored contract a log came from, and therefore which decode
/// table applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogOrigin {
    Launchpad(SchemaVersion),
    Amm,
}

/// A decoded log, normalized but not yet enriched.
///
/// Quantities are already scaled to decimal strings; the raw V2 trade
/// price is kept as U256 for the market-cap computation downstream.
#[derive(Debug, Clone, PartialEq)]
pub enum DecodedEvent {
    Created {
        token: Address,
        creator: Address,
        name: String,
        symbol: String,
        initial_supply: String,
        uri: String,
    },
    Trade {
        direction: TradeDirection,
        account: Address,
        token: Address,
        token_amount: String,
        quote_amount: String,
        price: Option<U256>,
    },
    Migrated {
        token: Address,
        fee: String,
    },
    Halted {
        token: Address,
    },
}

/// Decode a raw log against the origin's schema table.
///
/// Returns None for logs that do not match any known signature or whose
/// payload fails ABI decoding; the router logs and skips those.
pub fn decode_log(origin: LogOrigin, log: &Log) -> Option<DecodedEvent> {
    let topic0 = log.topic0()?;

    match origin {
        LogOrigin::Launchpad(SchemaVersion::V1) => decode_v1(topic0, log),
        LogOrigin::Launchpad(SchemaVersion::V2) => decode_v2(topic0, log),
        LogOrigin::Amm => decode_amm(topic0, log),
    }
}

fn decode_v1(topic0: &B256, log: &Log) -> Option<DecodedEvent> {
    match topic0 {
        t if t == &v1::TokenCreated::SIGNATURE_HASH => {
            let event = log.log_decode::<v1::TokenCreated>().ok()?.inner.data;
            Some(DecodedEvent::Created {
                token: event.token,
                creator: event.creator,
                name: event.name,
                symbol: event.symbol,
                initial_supply: format_units(event.totalSupply, TOKEN_DECIMALS),
                // V1 creates carry no metadata URI
                uri: NOT_AVAILABLE.to_string(),
            })
        },
        t if t == &v1::TokenPurchased::SIGNATURE_HASH => {
            let event = log.log_decode::<v1::TokenPurchased>().ok()?.inner.data;
            Some(DecodedEvent::Trade {
                direction: TradeDirection::Buy,
                account: event.buyer,
                token: event.token,
                token_amount: format_units(event.amount, TOKEN_DECIMALS),
                quote_amount: format_units(event.cost, TOKEN_DECIMALS),
                price: None,
            })
        },
        t if t == &v1::TokenSold::SIGNATURE_HASH => {
            let event = log.log_decode::<v1::TokenSold>().ok()?.inner.data;
            Some(DecodedEvent::Trade {
                direction: TradeDirection::Sell,
                account: event.seller,
                token: event.token,
                token_amount: format_units(event.amount, TOKEN_DECIMALS),
                quote_amount: format_units(event.refund, TOKEN_DECIMALS),
                price: None,
            })
        },
        t if t == &v1::TokenMigrated::SIGNATURE_HASH => {
            let event = log.log_decode::<v1::TokenMigrated>().ok()?.inner.data;
            Some(DecodedEvent::Migrated {
                token: event.token,
                fee: format_units(event.fee, TOKEN_DECIMALS),
            })
        },
        t if t == &v1::TradingHalted::SIGNATURE_HASH => {
            let event = log.log_decode::<v1::TradingHalted>().ok()?.inner.data;
            Some(DecodedEvent::Halted { token: event.token })
        },
        _ => None,
    }
}

fn decode_v2(topic0: &B256, log: &Log) -> Option<DecodedEvent> {
    match topic0 {
        t if t == &v2::TokenCreated::SIGNATURE_HASH => {
            let event = log.log_decode::<v2::TokenCreated>().ok()?.inner.data;
            let uri = if event.uri.is_empty() {
                NOT_AVAILABLE.to_string()
            } else {
                event.uri
            };
            Some(DecodedEvent::Created {
                token: event.token,
                creator: event.creator,
                name: event.name,
                symbol: event.symbol,
                initial_supply: format_units(event.totalSupply, TOKEN_DECIMALS),
                uri,
            })
        },
        t if t == &v2::TokenPurchased::SIGNATURE_HASH => {
            let event = log.log_decode::<v2::TokenPurchased>().ok()?.inner.data;
            Some(DecodedEvent::Trade {
                direction: TradeDirection::Buy,
                account: event.buyer,
                token: event.token,
                token_amount: format_units(event.amount, TOKEN_DECIMALS),
                quote_amount: format_units(event.cost, TOKEN_DECIMALS),
                price: Some(event.price),
            })
        },
        t if t == &v2::TokenSold::SIGNATURE_HASH => {
            let event = log.log_decode::<v2::TokenSold>().ok()?.inner.data;
            Some(DecodedEvent::Trade {
                direction: TradeDirection::Sell,
                account: event.seller,
                token: event.token,
                token_amount: format_units(event.amount, TOKEN_DECIMALS),
                quote_amount: format_units(event.refund, TOKEN_DECIMALS),
                price: Some(event.price),
            })
        },
        t if t == &v2::TokenMigrated::SIGNATURE_HASH => {
            let event = log.log_decode::<v2::TokenMigrated>().ok()?.inner.data;
            Some(DecodedEvent::Migrated {
                token: event.token,
                fee: format_units(event.fee, TOKEN_DECIMALS),
            })
        },
        t if t == &v2::TradingHalted::SIGNATURE_HASH => {
            let event = log.log_decode::<v2::TradingHalted>().ok()?.inner.data;
            Some(DecodedEvent::Halted { token: event.token })
        },
        _ => None,
    }
}

/// Third-party pair swaps for migrated tokens.
///
/// Pair convention: token0 is the launchpad token, token1 the quote
/// currency. Quote flowing in means someone bought the token. The pair
/// address identifies the market; swap logs carry no token address of
/// their own. No price field, so market cap stays unknown.
fn decode_amm(topic0: &B256, log: &Log) -> Option<DecodedEvent> {
    if topic0 != &amm::Swap::SIGNATURE_HASH {
        return None;
    }

    let event = log.log_decode::<amm::Swap>().ok()?.inner.data;

    let (direction, token_amount, quote_amount) = if event.amount1In > U256::ZERO {
        (TradeDirection::Buy, event.amount0Out, event.amount1In)
    } else {
        (TradeDirection::Sell, event.amount0In, event.amount1Out)
    };

    Some(DecodedEvent::Trade {
        direction,
        account: event.sender,
        token: log.address(),
        token_amount: format_units(token_amount, TOKEN_DECIMALS),
        quote_amount: format_units(quote_amount, TOKEN_DECIMALS),
        price: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::LogData;

    fn raw_log(address: Address, data: LogData) -> Log {
        Log {
            inner: alloy::primitives::Log { address, data },
            block_number: Some(100),
            ..Default::default()
        }
    }

    fn launchpad() -> Address {
        Address::repeat_byte(0x10)
    }

    #[test]
    fn test_v1_purchase_decodes_without_price() {
        let event = v1::TokenPurchased {
            token: Address::repeat_byte(0xBB),
            buyer: Address::repeat_byte(0xAA),
            amount: U256::from(1_500_000_000_000_000_000u128), // 1.5 tokens
            cost: U256::from(10_000_000_000_000_000u128),      // 0.01 quote
        };
        let log = raw_log(launchpad(), event.encode_log_data());

        let decoded = decode_log(LogOrigin::Launchpad(SchemaVersion::V1), &log).unwrap();
        match decoded {
            DecodedEvent::Trade {
                direction,
                token_amount,
                quote_amount,
                price,
                ..
            } => {
                assert_eq!(direction, TradeDirection::Buy);
                assert_eq!(token_amount, "1.5");
                assert_eq!(quote_amount, "0.01");
                assert_eq!(price, None);
            },
            other => panic!("expected trade, got {:?}", other),
        }
    }

    #[test]
    fn test_v2_purchase_carries_price() {
        let price = U256::from(2_000_000_000_000_000_000u128); // 2.0
        let event = v2::TokenPurchased {
            token: Address::repeat_byte(0xBB),
            buyer: Address::repeat_byte(0xAA),
            amount: U256::from(1_000_000_000_000_000_000u128),
            cost: U256::from(2_000_000_000_000_000_000u128),
            price,
            offers: U256::from(1),
            funds: U256::from(2),
        };
        let log = raw_log(launchpad(), event.encode_log_data());

        let decoded = decode_log(LogOrigin::Launchpad(SchemaVersion::V2), &log).unwrap();
        match decoded {
            DecodedEvent::Trade { price: p, .. } => assert_eq!(p, Some(price)),
            other => panic!("expected trade, got {:?}", other),
        }
    }

    #[test]
    fn test_v1_create_substitutes_uri_sentinel() {
        let event = v1::TokenCreated {
            token: Address::repeat_byte(0xBB),
            creator: Address::repeat_byte(0xAA),
            name: "Pepe".to_string(),
            symbol: "PEPE".to_string(),
            totalSupply: U256::from(10).pow(U256::from(24)),
        };
        let log = raw_log(launchpad(), event.encode_log_data());

        let decoded = decode_log(LogOrigin::Launchpad(SchemaVersion::V1), &log).unwrap();
        match decoded {
            DecodedEvent::Created {
                initial_supply,
                uri,
                name,
                symbol,
                ..
            } => {
                assert_eq!(initial_supply, "1000000");
                assert_eq!(uri, NOT_AVAILABLE);
                assert_eq!(name, "Pepe");
                assert_eq!(symbol, "PEPE");
            },
            other => panic!("expected create, got {:?}", other),
        }
    }

    #[test]
    fn test_v2_create_keeps_uri() {
        let event = v2::TokenCreated {
            token: Address::repeat_byte(0xBB),
            creator: Address::repeat_byte(0xAA),
            name: "Pepe".to_string(),
            symbol: "PEPE".to_string(),
            totalSupply: U256::from(10).pow(U256::from(24)),
            uri: "ipfs://pepe".to_string(),
        };
        let log = raw_log(launchpad(), event.encode_log_data());

        let decoded = decode_log(LogOrigin::Launchpad(SchemaVersion::V2), &log).unwrap();
        match decoded {
            DecodedEvent::Created { uri, .. } => assert_eq!(uri, "ipfs://pepe"),
            other => panic!("expected create, got {:?}", other),
        }
    }

    #[test]
    fn test_wrong_schema_version_does_not_decode() {
        // A V2 purchase log has a different signature hash than V1; the V1
        // table must reject it rather than misread fields.
        let event = v2::TokenPurchased {
            token: Address::repeat_byte(0xBB),
            buyer: Address::repeat_byte(0xAA),
            amount: U256::from(1),
            cost: U256::from(1),
            price: U256::from(1),
            offers: U256::from(1),
            funds: U256::from(1),
        };
        let log = raw_log(launchpad(), event.encode_log_data());

        assert_eq!(decode_log(LogOrigin::Launchpad(SchemaVersion::V1), &log), None);
    }

    #[test]
    fn test_amm_swap_maps_to_trade() {
        let pair = Address::repeat_byte(0x77);
        let event = amm::Swap {
            sender: Address::repeat_byte(0xAA),
            amount0In: U256::ZERO,
            amount1In: U256::from(10_000_000_000_000_000u128), // quote in
            amount0Out: U256::from(3_000_000_000_000_000_000u128), // token out
            amount1Out: U256::ZERO,
            to: Address::repeat_byte(0xCC),
        };
        let log = raw_log(pair, event.encode_log_data());

        let decoded = decode_log(LogOrigin::Amm, &log).unwrap();
        match decoded {
            DecodedEvent::Trade {
                direction,
                token,
                token_amount,
                quote_amount,
                price,
                ..
            } => {
                assert_eq!(direction, TradeDirection::Buy);
                assert_eq!(token, pair);
                assert_eq!(token_amount, "3");
                assert_eq!(quote_amount, "0.01");
                assert_eq!(price, None);
            },
            other => panic!("expected trade, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_is_idempotent() {
        let event = v2::TokenSold {
            token: Address::repeat_byte(0xBB),
            seller: Address::repeat_byte(0xAA),
            amount: U256::from(5_000_000_000_000_000_000u128),
            refund: U256::from(1_000_000_000_000_000_000u128),
            price: U256::from(200_000_000_000_000_000u128),
            offers: U256::from(9),
            funds: U256::from(8),
        };
        let log = raw_log(launchpad(), event.encode_log_data());

        let first = decode_log(LogOrigin::Launchpad(SchemaVersion::V2), &log).unwrap();
        let second = decode_log(LogOrigin::Launchpad(SchemaVersion::V2), &log).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_unknown_signature_yields_none() {
        let event = amm::Swap {
            sender: Address::repeat_byte(0xAA),
            amount0In: U256::ZERO,
            amount1In: U256::from(1),
            amount0Out: U256::from(1),
            amount1Out: U256::ZERO,
            to: Address::repeat_byte(0xCC),
        };
        let log = raw_log(launchpad(), event.encode_log_data());

        // A pair swap signature is not in the launchpad tables
        assert_eq!(decode_log(LogOrigin::Launchpad(SchemaVersion::V1), &log), None);
        assert_eq!(decode_log(LogOrigin::Launchpad(SchemaVersion::V2), &log), None);
    }
}
