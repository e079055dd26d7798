use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use crate::config::ExchangeConfig;
use crate::models::PoolRecord;
use super::clarity::ClarityValue;
use super::{normalize, PoolSource, SourceError};

const POOL_COUNT_FN: &str = "get-nr-pools";
const POOL_DETAILS_FN: &str = "do-get-pool";

/// Read-only contract calls through the Hiro Stacks API.
pub struct HiroClient {
    client: Client,
    base_url: String,
}

#[derive(Debug, Serialize)]
struct CallReadRequest<'a> {
    sender: &'a str,
    arguments: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct CallReadResponse {
    okay: bool,
    result: Option<String>,
    cause: Option<String>,
}

impl CallReadResponse {
    fn into_value(self) -> Result<ClarityValue, SourceError> {
        if !self.okay {
            return Err(SourceError::Rejected(
                self.cause.unwrap_or_else(|| "no cause given".to_string()),
            ));
        }
        let result = self
            .result
            .ok_or_else(|| SourceError::Parse("okay response without result".to_string()))?;
        Ok(ClarityValue::from_hex(&result)?)
    }
}

impl HiroClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, SourceError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SourceError::Network(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn call_url(&self, exchange: &ExchangeConfig, function: &str) -> String {
        format!(
            "{}/v2/contracts/call-read/{}/{}/{}",
            self.base_url, exchange.contract_address, exchange.contract_name, function
        )
    }

    async fn call_read(
        &self,
        exchange: &ExchangeConfig,
        function: &str,
        arguments: Vec<String>,
    ) -> Result<ClarityValue, SourceError> {
        let url = self.call_url(exchange, function);
        let body = CallReadRequest {
            sender: &exchange.contract_address,
            arguments,
        };

        let resp = self.client.post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| SourceError::Network(e.to_string()))?;

        if resp.status() == 429 {
            return Err(SourceError::RateLimit);
        }

        if !resp.status().is_success() {
            return Err(SourceError::Status(resp.status().as_u16()));
        }

        let data: CallReadResponse = resp.json()
            .await
            .map_err(|e| SourceError::Parse(e.to_string()))?;

        data.into_value()
    }
}

#[async_trait]
impl PoolSource for HiroClient {
    fn name(&self) -> &'static str {
        "Hiro"
    }

    async fn pool_count(&self, exchange: &ExchangeConfig) -> Result<u64, SourceError> {
        let value = self.call_read(exchange, POOL_COUNT_FN, vec![]).await?;
        normalize::pool_count(value)
    }

    async fn pool_details(
        &self,
        exchange: &ExchangeConfig,
        pool_id: u64,
    ) -> Result<PoolRecord, SourceError> {
        let argument = ClarityValue::UInt(u128::from(pool_id)).to_hex();
        let value = self.call_read(exchange, POOL_DETAILS_FN, vec![argument]).await?;
        normalize::pool_record(exchange, pool_id, &value.unwrap_result()?)
    }
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

    #[test]
    fn builds_call_read_url() {
        let client = HiroClient::new("https://api.mainnet.hiro.so/", Duration::from_secs(1)).unwrap();
        assert_eq!(
            client.call_url(&exchange(), POOL_COUNT_FN),
            "https://api.mainnet.hiro.so/v2/contracts/call-read/SP2ZNGJ85ENDY6QRHQ5P2D4FXKGZWCKTB2T0Z55KS/univ2-core/get-nr-pools"
        );
    }

    #[test]
    fn request_body_shape() {
        let body = CallReadRequest {
            sender: "SP1",
            arguments: vec![ClarityValue::UInt(2).to_hex()],
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["sender"], "SP1");
        assert_eq!(json["arguments"][0], "0x0100000000000000000000000000000002");
    }

    #[test]
    fn okay_response_decodes_result() {
        let resp: CallReadResponse = serde_json::from_str(
            r#"{"okay":true,"result":"0x070100000000000000000000000000000005"}"#,
        )
        .unwrap();
        let value = resp.into_value().unwrap();
        assert_eq!(normalize::pool_count(value).unwrap(), 5);
    }

    #[test]
    fn failed_response_is_rejected() {
        let resp: CallReadResponse =
            serde_json::from_str(r#"{"okay":false,"cause":"Unchecked(NoSuchContract)"}"#).unwrap();
        match resp.into_value() {
            Err(SourceError::Rejected(cause)) => assert!(cause.contains("NoSuchContract")),
            other => panic!("expected rejection, got {other:?}"),
        }
    }
}
