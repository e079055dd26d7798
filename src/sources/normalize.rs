//! Maps the pool tuples of different exchange contracts onto `PoolRecord`.
//!
//! Contracts disagree on field names (`reserve0` vs `balance-x`, …). Each
//! logical field has an ordered list of candidate names; the first one that
//! is present with a usable value wins, otherwise the field default applies.
//! Reserves are stricter: a present reserve that is not a non-negative
//! integer rejects the whole record.

use crate::config::ExchangeConfig;
use crate::models::pool::{is_integer_amount, PoolRecord};
use super::clarity::ClarityValue;
use super::SourceError;

const LP_TOKEN: &[&str] = &["lp-token", "lpToken"];
const RESERVE0: &[&str] = &["reserve0", "balance-x"];
const RESERVE1: &[&str] = &["reserve1", "balance-y"];
const SYMBOL: &[&str] = &["symbol"];
const TOKEN0: &[&str] = &["token0", "token-x"];
const TOKEN1: &[&str] = &["token1", "token-y"];

fn first_match<F>(pool: &ClarityValue, candidates: &[&str], extract: F) -> Option<String>
where
    F: Fn(&ClarityValue) -> Option<String>,
{
    candidates
        .iter()
        .filter_map(|name| pool.tuple_field(name))
        .find_map(extract)
}

fn text(value: &ClarityValue) -> Option<String> {
    value.display_value().filter(|s| !s.is_empty())
}

fn amount(value: &ClarityValue) -> Option<String> {
    match value.as_u128() {
        Some(v) => Some(v.to_string()),
        None => value.display_value().filter(|s| is_integer_amount(s)),
    }
}

fn reserve(
    pool: &ClarityValue,
    candidates: &[&str],
    exchange: &ExchangeConfig,
    pool_id: u64,
) -> Result<String, SourceError> {
    let Some((name, value)) = candidates
        .iter()
        .find_map(|name| pool.tuple_field(name).map(|value| (*name, value)))
    else {
        return Ok(PoolRecord::DEFAULT_RESERVE.to_string());
    };

    amount(value).ok_or_else(|| {
        SourceError::Parse(format!(
            "{} pool {pool_id}: {name} is not a non-negative integer: {value:?}",
            exchange.name
        ))
    })
}

/// Builds a record from a decoded (already unwrapped) pool tuple.
pub fn pool_record(
    exchange: &ExchangeConfig,
    pool_id: u64,
    pool: &ClarityValue,
) -> Result<PoolRecord, SourceError> {
    if !matches!(pool, ClarityValue::Tuple(_)) {
        return Err(SourceError::Parse(format!(
            "pool {pool_id} of {} is not a tuple",
            exchange.name
        )));
    }

    Ok(PoolRecord {
        pool_id,
        lp_token: first_match(pool, LP_TOKEN, text)
            .unwrap_or_else(|| PoolRecord::default_lp_token(exchange)),
        reserve0: reserve(pool, RESERVE0, exchange, pool_id)?,
        reserve1: reserve(pool, RESERVE1, exchange, pool_id)?,
        symbol: first_match(pool, SYMBOL, text)
            .unwrap_or_else(|| PoolRecord::DEFAULT_SYMBOL.to_string()),
        token0: first_match(pool, TOKEN0, text).unwrap_or_default(),
        token1: first_match(pool, TOKEN1, text).unwrap_or_default(),
    })
}

/// Reads the pool count out of a decoded `get-nr-pools` result.
pub fn pool_count(value: ClarityValue) -> Result<u64, SourceError> {
    let value = value.unwrap_result()?;
    let count = value
        .as_u128()
        .ok_or_else(|| SourceError::Parse(format!("pool count is not an integer: {value:?}")))?;
    u64::try_from(count).map_err(|_| SourceError::Parse(format!("pool count {count} out of range")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exchange() -> ExchangeConfig {
        ExchangeConfig {
            name: "CHARISMA".to_string(),
            contract_address: "SP2ZNGJ85ENDY6QRHQ5P2D4FXKGZWCKTB2T0Z55KS".to_string(),
            contract_name: "univ2-core".to_string(),
        }
    }

    fn tuple(fields: Vec<(&str, ClarityValue)>) -> ClarityValue {
        ClarityValue::Tuple(fields.into_iter().map(|(k, v)| (k.to_string(), v)).collect())
    }

    fn ascii(s: &str) -> ClarityValue {
        ClarityValue::StringAscii(s.to_string())
    }

    #[test]
    fn reads_primary_spelling() {
        let pool = tuple(vec![
            ("lp-token", ascii("SP1.lp-a")),
            ("reserve0", ClarityValue::UInt(100)),
            ("reserve1", ClarityValue::UInt(200)),
            ("symbol", ascii("STX-CHA")),
            ("token0", ascii("SP1.wstx")),
            ("token1", ascii("SP1.cha")),
        ]);

        let record = pool_record(&exchange(), 3, &pool).unwrap();
        assert_eq!(record.pool_id, 3);
        assert_eq!(record.lp_token, "SP1.lp-a");
        assert_eq!(record.reserve0, "100");
        assert_eq!(record.reserve1, "200");
        assert_eq!(record.symbol, "STX-CHA");
        assert_eq!(record.token0, "SP1.wstx");
        assert_eq!(record.token1, "SP1.cha");
    }

    #[test]
    fn reads_alternate_spelling() {
        let pool = tuple(vec![
            ("lpToken", ascii("SP1.lp-b")),
            ("balance-x", ClarityValue::UInt(7)),
            ("balance-y", ClarityValue::UInt(8)),
            ("token-x", ascii("SP1.x")),
            ("token-y", ascii("SP1.y")),
        ]);

        let record = pool_record(&exchange(), 1, &pool).unwrap();
        assert_eq!(record.lp_token, "SP1.lp-b");
        assert_eq!(record.reserve0, "7");
        assert_eq!(record.reserve1, "8");
        assert_eq!(record.token0, "SP1.x");
        assert_eq!(record.token1, "SP1.y");
    }

    #[test]
    fn first_candidate_wins() {
        let pool = tuple(vec![
            ("balance-x", ClarityValue::UInt(1)),
            ("reserve0", ClarityValue::UInt(2)),
        ]);
        let record = pool_record(&exchange(), 1, &pool).unwrap();
        assert_eq!(record.reserve0, "2");
    }

    #[test]
    fn falls_back_to_defaults() {
        let pool = tuple(vec![("symbol", ascii(""))]);
        let record = pool_record(&exchange(), 9, &pool).unwrap();

        assert_eq!(
            record.lp_token,
            "SP2ZNGJ85ENDY6QRHQ5P2D4FXKGZWCKTB2T0Z55KS.univ2-core"
        );
        assert_eq!(record.reserve0, "0");
        assert_eq!(record.reserve1, "0");
        assert_eq!(record.symbol, "LP");
        assert_eq!(record.token0, "");
        assert_eq!(record.token1, "");
    }

    #[test]
    fn rejects_unusable_reserves() {
        let negative = tuple(vec![
            ("reserve0", ClarityValue::Int(-4)),
            ("reserve1", ClarityValue::UInt(1)),
        ]);
        assert!(matches!(
            pool_record(&exchange(), 1, &negative),
            Err(SourceError::Parse(_))
        ));

        let fractional = tuple(vec![
            ("reserve0", ClarityValue::UInt(1)),
            ("reserve1", ascii("1.5")),
        ]);
        assert!(matches!(
            pool_record(&exchange(), 1, &fractional),
            Err(SourceError::Parse(_))
        ));
    }

    #[test]
    fn accepts_signed_and_string_reserves() {
        let pool = tuple(vec![
            ("reserve0", ClarityValue::Int(12)),
            ("balance-y", ascii("340")),
        ]);
        let record = pool_record(&exchange(), 1, &pool).unwrap();
        assert_eq!(record.reserve0, "12");
        assert_eq!(record.reserve1, "340");
    }

    #[test]
    fn rejects_non_tuple() {
        assert!(matches!(
            pool_record(&exchange(), 1, &ClarityValue::UInt(1)),
            Err(SourceError::Parse(_))
        ));
    }

    #[test]
    fn pool_count_unwraps_ok() {
        let value = ClarityValue::ResponseOk(Box::new(ClarityValue::UInt(42)));
        assert_eq!(pool_count(value).unwrap(), 42);
        assert!(matches!(pool_count(ascii("x")), Err(SourceError::Parse(_))));
        assert!(matches!(
            pool_count(ClarityValue::ResponseErr(Box::new(ClarityValue::UInt(1)))),
            Err(SourceError::Decode(_))
        ));
    }
}
