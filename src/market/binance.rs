//! # market::binance
//!
//! **Binance USDⓈ-M futures adapter** — public price endpoints plus the signed
//! commission-rate endpoint.
//!
//! | Endpoint                   | Used for                               |
//! |----------------------------|----------------------------------------|
//! | `GET /fapi/v1/ticker/price`  | last traded price                    |
//! | `GET /fapi/v1/premiumIndex`  | mark price                           |
//! | `GET /fapi/v1/exchangeInfo`  | USDT-quoted perpetual symbol list    |
//! | `GET /fapi/v1/commissionRate`| maker/taker rates (needs API key)    |

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use tracing::{debug, error, warn};

use crate::error::AppError;
use crate::market::{FeeSchedule, MarketData, RawCommission};
use crate::models::{tick::UNAVAILABLE, PriceTick};

type HmacSha256 = Hmac<Sha256>;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

// ─── Wire formats ─────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct TickerPrice {
    #[serde(default)]
    price: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PremiumIndex {
    #[serde(default)]
    mark_price: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ExchangeInfo {
    #[serde(default)]
    symbols: Vec<SymbolInfo>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SymbolInfo {
    symbol: String,
    #[serde(default)]
    quote_asset: String,
    #[serde(default)]
    contract_type: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CommissionRate {
    #[serde(default)]
    maker_commission_rate: Option<String>,
    #[serde(default)]
    taker_commission_rate: Option<String>,
}

// ─── Client ───────────────────────────────────────────────────────────────────

/// API key pair for signed endpoints.
#[derive(Debug, Clone)]
pub struct ApiCredentials {
    pub api_key: String,
    pub secret: String,
}

pub struct BinanceFutures {
    client: reqwest::Client,
    base_url: String,
    credentials: Option<ApiCredentials>,
}

impl BinanceFutures {
    pub fn new(client: reqwest::Client, base_url: &str, credentials: Option<ApiCredentials>) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            credentials,
        }
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, AppError> {
        let url = format!("{}{}", self.base_url, path);

        let response = self
            .client
            .get(&url)
            .query(query)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, url = %url, "Binance unreachable");
                AppError::MarketData(format!("Binance unreachable: {e}"))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::MarketData(format!("Binance HTTP {status} on {path}: {body}")));
        }

        response
            .json()
            .await
            .map_err(|e| AppError::MarketData(format!("Binance response parse error on {path}: {e}")))
    }
}

fn usdt_perpetuals(info: ExchangeInfo, limit: usize) -> Vec<String> {
    info.symbols
        .into_iter()
        .filter(|s| s.quote_asset == "USDT" && s.contract_type == "PERPETUAL")
        .map(|s| s.symbol)
        .take(limit)
        .collect()
}

/// Hex HMAC-SHA256 of `payload`, as Binance expects in `signature=`.
pub fn sign_query(secret: &str, payload: &str) -> Result<String, AppError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| AppError::Internal(anyhow::anyhow!("HMAC key error: {e}")))?;
    mac.update(payload.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

#[async_trait]
impl MarketData for BinanceFutures {
    async fn current_symbol_list(&self, limit: usize) -> Result<Vec<String>, AppError> {
        let info: ExchangeInfo = self.get_json("/fapi/v1/exchangeInfo", &[]).await?;
        Ok(usdt_perpetuals(info, limit))
    }

    async fn price_tick(&self, symbol: &str) -> Result<PriceTick, AppError> {
        let query = [("symbol", symbol)];
        let (ticker, premium) = tokio::join!(
            self.get_json::<TickerPrice>("/fapi/v1/ticker/price", &query),
            self.get_json::<PremiumIndex>("/fapi/v1/premiumIndex", &query),
        );

        let last = ticker?.price.unwrap_or_else(|| UNAVAILABLE.to_string());
        let mark = premium?.mark_price.unwrap_or_else(|| UNAVAILABLE.to_string());
        debug!(symbol, last = %last, mark = %mark, "price tick");

        Ok(PriceTick::new(symbol, last, mark))
    }
}

#[async_trait]
impl FeeSchedule for BinanceFutures {
    async fn commission_rates(&self, symbol: &str) -> Result<RawCommission, AppError> {
        let Some(creds) = &self.credentials else {
            return Err(AppError::MarketData(
                "commission rates need BINANCE_API_KEY / BINANCE_API_SECRET".into(),
            ));
        };

        let payload = format!("symbol={symbol}&timestamp={}", Utc::now().timestamp_millis());
        let signature = sign_query(&creds.secret, &payload)?;
        let url = format!("{}/fapi/v1/commissionRate?{payload}&signature={signature}", self.base_url);

        let response = self
            .client
            .get(&url)
            .header("X-MBX-APIKEY", &creds.api_key)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await
            .map_err(|e| AppError::MarketData(format!("Binance unreachable: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            warn!(symbol, http_status = %status, "commission rate lookup rejected");
            return Err(AppError::MarketData(format!("Binance HTTP {status}: {body}")));
        }

        let rates: CommissionRate = response
            .json()
            .await
            .map_err(|e| AppError::MarketData(format!("commission rate parse error: {e}")))?;

        Ok(RawCommission {
            maker: rates.maker_commission_rate.and_then(|r| r.parse().ok()),
            taker: rates.taker_commission_rate.and_then(|r| r.parse().ok()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signature_matches_reference_vector() {
        // Example from the Binance API documentation.
        let secret = "NhqPtmdSJYdKjVHjA7PZj4Mge3R5YNiP1e3UZjInClVN65XAbvqqM6A7H5fATj0j";
        let payload = "symbol=LTCBTC&side=BUY&type=LIMIT&timeInForce=GTC&quantity=1&price=0.1&recvWindow=5000&timestamp=1499827319559";
        assert_eq!(
            sign_query(secret, payload).unwrap(),
            "c8db56825ae71d6d79447849e617115f4a920fa2acdcab2b053c4b2838bd6b71"
        );
    }

    #[test]
    fn test_exchange_info_filters_usdt_perpetuals() {
        let raw = r#"{"symbols":[
            {"symbol":"BTCUSDT","quoteAsset":"USDT","contractType":"PERPETUAL"},
            {"symbol":"BTCUSDT_250926","quoteAsset":"USDT","contractType":"CURRENT_QUARTER"},
            {"symbol":"ETHBTC","quoteAsset":"BTC","contractType":"PERPETUAL"},
            {"symbol":"ETHUSDT","quoteAsset":"USDT","contractType":"PERPETUAL"}
        ]}"#;
        let info: ExchangeInfo = serde_json::from_str(raw).unwrap();
        assert_eq!(usdt_perpetuals(info, 30), vec!["BTCUSDT", "ETHUSDT"]);
    }

    #[test]
    fn test_missing_mark_price_deserialises_to_none() {
        let p: PremiumIndex = serde_json::from_str(r#"{"symbol":"BTCUSDT"}"#).unwrap();
        assert!(p.mark_price.is_none());
    }
}
