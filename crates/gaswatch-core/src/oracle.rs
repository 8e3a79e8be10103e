//! Gas price oracle
//!
//! Etherscan's gas oracle answers in one of two shapes. The legacy shape
//! carries `SafeGasPrice`; the v2 shape may only carry `suggestBaseFee`, to
//! which an estimated priority fee is added. [`parse_gas_oracle_response`]
//! applies [`EXTRACTION_RULES`] in order and the first rule that finds its
//! field decides the price.

use std::str::FromStr;

use async_trait::async_trait;
use reqwest::Client;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::config::OracleConfig;
use crate::error::{Error, Result};

/// Priority fee in Gwei added on top of the v2 base fee
pub const PRIORITY_FEE_GWEI: Decimal = Decimal::TWO;

const SUCCESS_STATUS: &str = "1";

/// Source of the current gas price
#[async_trait]
pub trait PriceOracle: Send + Sync {
    /// Current gas price in whole Gwei, or `None` when it cannot be determined
    async fn fetch_current_price(&self) -> Option<i32>;
}

/// Response envelope of the Etherscan API
#[derive(Debug, Deserialize)]
pub struct GasOracleResponse {
    /// `"1"` on success
    pub status: Option<String>,
    /// Human-readable status
    pub message: Option<String>,
    /// Object on success, error string otherwise
    pub result: Option<serde_json::Value>,
}

/// The `result` object of a successful gas oracle call
#[derive(Debug, Default, Deserialize)]
pub struct GasOracleResult {
    /// Legacy safe gas price, decimal Gwei
    #[serde(rename = "SafeGasPrice")]
    pub safe_gas_price: Option<String>,
    /// v2 suggested base fee, decimal Gwei
    #[serde(rename = "suggestBaseFee")]
    pub suggest_base_fee: Option<String>,
}

/// A rule that may derive the price from one response field.
///
/// `None` means the field is absent or empty and the next rule applies.
pub type ExtractionRule = fn(&GasOracleResult) -> Option<Result<Decimal>>;

/// Extraction rules in precedence order
pub const EXTRACTION_RULES: &[(&str, ExtractionRule)] = &[
    ("legacy_safe_gas_price", legacy_safe_gas_price),
    ("v2_base_fee_plus_priority", v2_base_fee_plus_priority),
];

fn legacy_safe_gas_price(result: &GasOracleResult) -> Option<Result<Decimal>> {
    non_empty(result.safe_gas_price.as_deref()).map(parse_decimal)
}

fn v2_base_fee_plus_priority(result: &GasOracleResult) -> Option<Result<Decimal>> {
    non_empty(result.suggest_base_fee.as_deref())
        .map(|fee| parse_decimal(fee).map(|base| base + PRIORITY_FEE_GWEI))
}

// Only a truly empty field counts as absent; whitespace is a bad value
fn non_empty(field: Option<&str>) -> Option<&str> {
    field.filter(|s| !s.is_empty())
}

fn parse_decimal(raw: &str) -> Result<Decimal> {
    Decimal::from_str(raw.trim()).map_err(|e| Error::upstream(format!("invalid decimal '{raw}': {e}")))
}

/// Round half-up (away from zero) to a whole number of Gwei
fn round_half_up(value: Decimal) -> Option<i32> {
    value
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i32()
}

/// Derive the gas price from a decoded envelope
pub fn parse_gas_oracle_response(response: &GasOracleResponse) -> Option<i32> {
    if response.status.as_deref() != Some(SUCCESS_STATUS) {
        debug!(status = ?response.status, message = ?response.message, "Gas oracle reported failure");
        return None;
    }

    let result = match response.result.as_ref() {
        Some(value @ serde_json::Value::Object(_)) => {
            match GasOracleResult::deserialize(value) {
                Ok(result) => result,
                Err(e) => {
                    warn!(error = %e, "Gas oracle result has an unexpected shape");
                    return None;
                }
            }
        }
        _ => return None,
    };

    for (name, rule) in EXTRACTION_RULES {
        match rule(&result) {
            None => continue,
            Some(Ok(value)) => {
                let price = round_half_up(value);
                debug!(rule = %name, raw = %value, price = ?price, "Extracted gas price");
                return price;
            }
            Some(Err(e)) => {
                warn!(rule = %name, error = %e, "Gas oracle field could not be parsed");
                return None;
            }
        }
    }

    None
}

/// Derive the gas price from a raw response body
pub fn parse_gas_oracle_body(body: &str) -> Option<i32> {
    match serde_json::from_str::<GasOracleResponse>(body) {
        Ok(response) => parse_gas_oracle_response(&response),
        Err(e) => {
            warn!(error = %e, "Gas oracle returned malformed JSON");
            None
        }
    }
}

/// Etherscan gas oracle client
pub struct EtherscanClient {
    client: Client,
    api_url: String,
    api_key: String,
    chain_id: u64,
}

impl EtherscanClient {
    /// Create a client; every request is bounded by `config.timeout`
    pub fn new(config: &OracleConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| Error::config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_url: config.api_url.clone(),
            api_key: config.api_key.clone(),
            chain_id: config.chain_id,
        })
    }

    async fn fetch_body(&self) -> Result<String> {
        let chain_id = self.chain_id.to_string();
        let response = self
            .client
            .get(&self.api_url)
            .query(&[
                ("chainid", chain_id.as_str()),
                ("module", "gastracker"),
                ("action", "gasoracle"),
                ("apikey", self.api_key.as_str()),
            ])
            .send()
            .await
            .map_err(|e| Error::upstream(e.without_url().to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::upstream(format!("Etherscan returned {status}: {body}")));
        }

        response
            .text()
            .await
            .map_err(|e| Error::upstream(e.without_url().to_string()))
    }
}

#[async_trait]
impl PriceOracle for EtherscanClient {
    async fn fetch_current_price(&self) -> Option<i32> {
        info!(url = %self.api_url, chain_id = self.chain_id, "Querying gas oracle");

        let body = match self.fetch_body().await {
            Ok(body) => body,
            Err(e) => {
                warn!(error = %e, "Gas oracle request failed");
                return None;
            }
        };

        let price = parse_gas_oracle_body(&body);
        match price {
            Some(price) => info!(price, "Current gas price"),
            None => warn!("Gas oracle response carried no usable price"),
        }
        price
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;
    use std::time::Duration;
    use wiremock::matchers::{method, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn envelope(result: serde_json::Value) -> String {
        json!({ "status": "1", "message": "OK", "result": result }).to_string()
    }

    #[test]
    fn legacy_safe_gas_price_is_rounded() {
        let body = envelope(json!({ "LastBlock": "1", "SafeGasPrice": "23.4", "ProposeGasPrice": "25" }));
        assert_eq!(parse_gas_oracle_body(&body), Some(23));
    }

    #[test]
    fn base_fee_gets_priority_fee_added() {
        let body = envelope(json!({ "suggestBaseFee": "18.6", "gasUsedRatio": "0.4" }));
        assert_eq!(parse_gas_oracle_body(&body), Some(21));
    }

    #[test]
    fn legacy_field_takes_precedence() {
        let body = envelope(json!({ "SafeGasPrice": "10", "suggestBaseFee": "50.0" }));
        assert_eq!(parse_gas_oracle_body(&body), Some(10));
    }

    #[test]
    fn empty_legacy_field_falls_through_to_base_fee() {
        let body = envelope(json!({ "SafeGasPrice": "", "suggestBaseFee": "3.2" }));
        assert_eq!(parse_gas_oracle_body(&body), Some(5));
    }

    #[test]
    fn blank_legacy_field_yields_no_price() {
        let body = envelope(json!({ "SafeGasPrice": "   ", "suggestBaseFee": "3.2" }));
        assert_eq!(parse_gas_oracle_body(&body), None);
    }

    #[rstest]
    #[case("22.5", 23)]
    #[case("22.49", 22)]
    #[case("0.5", 1)]
    #[case("7", 7)]
    fn ties_round_half_up(#[case] raw: &str, #[case] expected: i32) {
        let body = envelope(json!({ "SafeGasPrice": raw }));
        assert_eq!(parse_gas_oracle_body(&body), Some(expected));
    }

    #[test]
    fn base_fee_tie_rounds_up() {
        // 0.5 + 2 = 2.5
        let body = envelope(json!({ "suggestBaseFee": "0.5" }));
        assert_eq!(parse_gas_oracle_body(&body), Some(3));
    }

    #[rstest]
    #[case(json!({ "LastBlock": "1" }).to_string())]
    #[case(envelope(json!({ "LastBlock": "1" })))]
    #[case(envelope(json!({ "SafeGasPrice": "", "suggestBaseFee": "" })))]
    #[case(json!({ "status": "0", "message": "NOTOK", "result": "Invalid API Key" }).to_string())]
    #[case(json!({ "status": "1", "message": "OK" }).to_string())]
    #[case(json!({ "status": "1", "message": "OK", "result": null }).to_string())]
    #[case("not json at all".to_string())]
    fn unusable_responses_yield_none(#[case] body: String) {
        assert_eq!(parse_gas_oracle_body(&body), None);
    }

    #[test]
    fn garbage_legacy_value_does_not_fall_through() {
        let body = envelope(json!({ "SafeGasPrice": "abc", "suggestBaseFee": "12.0" }));
        assert_eq!(parse_gas_oracle_body(&body), None);
    }

    fn client_for(server: &MockServer, timeout: Duration) -> EtherscanClient {
        EtherscanClient::new(&OracleConfig {
            api_url: format!("{}/v2/api", server.uri()),
            api_key: "test-key".to_string(),
            chain_id: 1,
            timeout,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn fetches_and_parses_over_http() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("module", "gastracker"))
            .and(query_param("action", "gasoracle"))
            .and(query_param("chainid", "1"))
            .and(query_param("apikey", "test-key"))
            .respond_with(
                ResponseTemplate::new(200).set_body_string(envelope(json!({ "SafeGasPrice": "23.4" }))),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server, Duration::from_secs(5));

        assert_eq!(client.fetch_current_price().await, Some(23));
    }

    #[tokio::test]
    async fn server_error_yields_none() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server, Duration::from_secs(5));

        assert_eq!(client.fetch_current_price().await, None);
    }

    #[tokio::test]
    async fn slow_upstream_times_out_to_none() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(envelope(json!({ "SafeGasPrice": "23.4" })))
                    .set_delay(Duration::from_secs(2)),
            )
            .mount(&server)
            .await;

        let client = client_for(&server, Duration::from_millis(200));

        assert_eq!(client.fetch_current_price().await, None);
    }
}
