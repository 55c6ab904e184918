//! BitMEX exchange adapter.
//!
//! BitMEX authenticates its account endpoints with an HMAC-SHA256 signature
//! over verb, path, expiry and body, sent in headers next to the api key and
//! the expiry itself. Wallet history arrives as one unpaginated list that
//! mixes deposits, withdrawals, realised PnL and ledger noise; balances are
//! reported in satoshis for the single XBt settlement wallet.

use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use rust_decimal::Decimal;
use serde_json::{Map, Value};
use time::OffsetDateTime;

use crate::domain::{
    Asset, AssetMovement, AssetRegistry, Location, MarginPosition, MissingTimestampPolicy,
    MovementCategory, TimeWindow, UtcDateTime, ValuedBalance, ValuedBalances,
};
use crate::exchange::{ApiKeyValidity, Exchange, MessageSink, PriceOracle};
use crate::exchange_policy::ExchangePolicy;
use crate::history::{fold_records, Collected, RecordOutcome};
use crate::http_client::{HttpClient, HttpMethod, HttpRequest};
use crate::payload::{self, parse_response, Payload};
use crate::signing::{Credentials, RequestSigner, SigningPolicy};
use crate::throttling::ThrottlingQueue;
use crate::{NormalizationError, RemoteError};

const BITMEX_BASE_URL: &str = "https://www.bitmex.com";
const API_PREFIX: &str = "/api/v1/";
/// 200 plus 401: an authenticated-but-rejected response still carries a
/// structured error body worth parsing.
const ACCEPTED_STATUS: [u16; 2] = [200, 401];
const REQUEST_TIMEOUT_MS: u64 = 10_000;
/// Exchange-native name of the settlement wallet currency (satoshis).
const SETTLEMENT_SYMBOL: &str = "XBt";

fn default_symbol_quirks() -> BTreeMap<String, String> {
    BTreeMap::from([(String::from("XBt"), String::from("BTC"))])
}

/// Adapter for one BitMEX account.
pub struct BitmexAdapter {
    credentials: Credentials,
    signer: RequestSigner,
    signing_policy: SigningPolicy,
    symbol_quirks: BTreeMap<String, String>,
    http_client: Arc<dyn HttpClient>,
    asset_registry: Arc<dyn AssetRegistry>,
    message_sink: Arc<dyn MessageSink>,
    throttling: ThrottlingQueue,
    missing_timestamp: MissingTimestampPolicy,
    base_url: String,
}

impl BitmexAdapter {
    pub fn new(
        credentials: Credentials,
        http_client: Arc<dyn HttpClient>,
        asset_registry: Arc<dyn AssetRegistry>,
        message_sink: Arc<dyn MessageSink>,
    ) -> Self {
        let signer = RequestSigner::new(&credentials);
        Self {
            credentials,
            signer,
            signing_policy: SigningPolicy::bitmex_default(),
            symbol_quirks: default_symbol_quirks(),
            http_client,
            asset_registry,
            message_sink,
            throttling: ThrottlingQueue::from_policy(&ExchangePolicy::bitmex_default()),
            missing_timestamp: MissingTimestampPolicy::default(),
            base_url: String::from(BITMEX_BASE_URL),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_policy(mut self, policy: &ExchangePolicy) -> Self {
        self.throttling = ThrottlingQueue::from_policy(policy);
        self
    }

    pub fn with_signing_policy(mut self, signing_policy: SigningPolicy) -> Self {
        self.signing_policy = signing_policy;
        self
    }

    pub fn with_missing_timestamp_policy(mut self, policy: MissingTimestampPolicy) -> Self {
        self.missing_timestamp = policy;
        self
    }

    pub fn with_symbol_quirk(
        mut self,
        native: impl Into<String>,
        canonical: impl Into<String>,
    ) -> Self {
        self.symbol_quirks.insert(native.into(), canonical.into());
        self
    }

    fn expires(&self) -> i64 {
        OffsetDateTime::now_utc().unix_timestamp()
            + self.signing_policy.expiry_horizon().as_secs() as i64
    }

    async fn api_query(
        &self,
        method: HttpMethod,
        endpoint: &str,
        options: &[(&str, &str)],
        body: &str,
    ) -> Result<Payload, RemoteError> {
        self.throttling
            .acquire()
            .map_err(|retry_after| RemoteError::RateLimited {
                location: Location::Bitmex,
                retry_after,
            })?;

        let bare_path = format!("{API_PREFIX}{endpoint}");
        let request_path = if options.is_empty() {
            bare_path.clone()
        } else {
            format!("{bare_path}?{}", encode_options(options))
        };
        let url = format!("{}{}", self.base_url, request_path);

        let expires = self.expires();
        let mut request = HttpRequest::new(method, url.clone())
            .with_timeout_ms(REQUEST_TIMEOUT_MS)
            .with_header("api-key", self.credentials.api_key())
            .with_header("api-expires", expires.to_string());

        if self.signing_policy.requires_signature(endpoint) {
            let signed_path = self
                .signing_policy
                .signed_path(endpoint, &bare_path, &request_path);
            let signature = self.signer.sign(method, signed_path, expires, body);
            request = request.with_header("api-signature", signature);
        }

        if !body.is_empty() {
            request = request
                .with_header("content-type", "application/json")
                .with_header("content-length", body.len().to_string())
                .with_body(body);
        }

        tracing::debug!(verb = %method, %url, "bitmex api query");

        let response =
            self.http_client
                .execute(request)
                .await
                .map_err(|error| RemoteError::Transport {
                    location: Location::Bitmex,
                    reason: error.message().to_owned(),
                })?;

        if !ACCEPTED_STATUS.contains(&response.status) {
            return Err(RemoteError::UnexpectedStatus {
                location: Location::Bitmex,
                url,
                status: response.status,
            });
        }

        parse_response(Location::Bitmex, &response.body)
    }

    async fn api_query_mapping(
        &self,
        method: HttpMethod,
        endpoint: &str,
        options: &[(&str, &str)],
    ) -> Result<Map<String, Value>, RemoteError> {
        Ok(self
            .api_query(method, endpoint, options, "")
            .await?
            .expect_mapping())
    }

    async fn api_query_sequence(
        &self,
        method: HttpMethod,
        endpoint: &str,
        options: &[(&str, &str)],
    ) -> Result<Vec<Value>, RemoteError> {
        Ok(self
            .api_query(method, endpoint, options, "")
            .await?
            .expect_sequence())
    }

    /// Wallet history comes back as one unpaginated list. Exchanges that page
    /// their history swap out just this fetch step.
    async fn fetch_wallet_history(&self) -> Result<Vec<Value>, RemoteError> {
        self.api_query_sequence(HttpMethod::Get, "user/walletHistory", &[])
            .await
    }

    fn resolve_symbol(&self, symbol: &str) -> Result<Asset, NormalizationError> {
        let canonical = self
            .symbol_quirks
            .get(symbol)
            .map(String::as_str)
            .unwrap_or(symbol);
        self.asset_registry.resolve(canonical)
    }

    fn margin_outcome(
        &self,
        record: &Map<String, Value>,
        window: TimeWindow,
    ) -> RecordOutcome<MarginPosition> {
        let transact_type = match payload::text_field(record, "transactType") {
            Ok(value) => value,
            Err(error) => return RecordOutcome::Discard(error),
        };
        if transact_type != "RealisedPNL" {
            return RecordOutcome::Skip;
        }

        let timestamp = match payload::optional_timestamp(record, "timestamp") {
            Ok(value) => value,
            Err(error) => return RecordOutcome::Discard(error),
        };
        if !window.admits(timestamp, self.missing_timestamp) {
            return RecordOutcome::Skip;
        }

        match self.margin_from_record(record) {
            Ok(position) => RecordOutcome::Event(position),
            Err(error) => RecordOutcome::Discard(error),
        }
    }

    fn margin_from_record(
        &self,
        record: &Map<String, Value>,
    ) -> Result<MarginPosition, NormalizationError> {
        let close_time = payload::timestamp_field(record, "transactTime")?;
        let currency = payload::text_field(record, "currency")?;
        let asset = self.resolve_symbol(&currency)?;

        let profit_loss = asset.from_smallest_unit(payload::decimal_field(record, "amount")?);
        let fee = asset
            .from_smallest_unit(payload::optional_decimal(record, "fee")?.unwrap_or(Decimal::ZERO));
        // BitMEX repurposes the address column as the position's free-text note.
        let notes = payload::text_field(record, "address")?;
        let link = payload::text_field(record, "transactID")?;

        MarginPosition::new(
            Location::Bitmex,
            None,
            close_time,
            profit_loss,
            asset.clone(),
            fee,
            asset,
            notes,
            link,
        )
        .map_err(|error| NormalizationError::Deserialization(error.to_string()))
    }

    fn movement_outcome(
        &self,
        record: &Map<String, Value>,
        window: TimeWindow,
    ) -> RecordOutcome<AssetMovement> {
        let transact_type = match payload::text_field(record, "transactType") {
            Ok(value) => value,
            Err(error) => return RecordOutcome::Discard(error),
        };
        let category = match transact_type.as_str() {
            "Deposit" => MovementCategory::Deposit,
            "Withdrawal" => MovementCategory::Withdrawal,
            // Exchanges emit many irrelevant ledger line types.
            _ => return RecordOutcome::Skip,
        };

        let timestamp = match payload::optional_timestamp(record, "timestamp") {
            Ok(value) => value,
            Err(error) => return RecordOutcome::Discard(error),
        };
        if !window.admits(timestamp, self.missing_timestamp) {
            return RecordOutcome::Skip;
        }

        match self.movement_from_record(record, category, timestamp) {
            Ok(movement) => RecordOutcome::Event(movement),
            Err(error) => RecordOutcome::Discard(error),
        }
    }

    fn movement_from_record(
        &self,
        record: &Map<String, Value>,
        category: MovementCategory,
        timestamp: Option<UtcDateTime>,
    ) -> Result<AssetMovement, NormalizationError> {
        // A movement is an on-chain fact and needs a concrete timestamp even
        // though the window filter tolerates its absence.
        let timestamp =
            timestamp.ok_or_else(|| NormalizationError::MissingKey(String::from("timestamp")))?;

        let currency = payload::text_field(record, "currency")?;
        let asset = self.resolve_symbol(&currency)?;

        // Some sources report signed amounts meaning direction; direction is
        // carried solely by the category.
        let amount = asset.from_smallest_unit(payload::decimal_field(record, "amount")?.abs());
        let fee = asset
            .from_smallest_unit(payload::optional_decimal(record, "fee")?.unwrap_or(Decimal::ZERO));

        let address = payload::optional_text(record, "address");
        let transaction_id = payload::optional_text(record, "tx");
        let link = payload::text_field(record, "transactID")?;

        AssetMovement::new(
            Location::Bitmex,
            category,
            address,
            transaction_id,
            timestamp,
            asset.clone(),
            amount,
            asset,
            fee,
            link,
        )
        .map_err(|error| NormalizationError::Deserialization(error.to_string()))
    }

    /// Current settlement-wallet balance valued through the price oracle.
    ///
    /// All-or-nothing: a corrupt balance response is batch-fatal because
    /// there is nothing partial to salvage.
    pub async fn balances(&self, oracle: &dyn PriceOracle) -> Result<ValuedBalances, RemoteError> {
        let response = self
            .api_query_mapping(
                HttpMethod::Get,
                "user/wallet",
                &[("currency", SETTLEMENT_SYMBOL)],
            )
            .await?;

        let asset =
            self.resolve_symbol(SETTLEMENT_SYMBOL)
                .map_err(|_| RemoteError::CorruptPayload {
                    location: Location::Bitmex,
                    reason: format!(
                        "settlement asset '{SETTLEMENT_SYMBOL}' is not registered"
                    ),
                })?;

        let units = payload::decimal_field(&response, "amount").map_err(|error| {
            RemoteError::CorruptPayload {
                location: Location::Bitmex,
                reason: error.to_string(),
            }
        })?;
        let amount = asset.from_smallest_unit(units);

        let usd_price = oracle.find_usd_price(&asset).await?;
        let usd_value = amount * usd_price;

        tracing::debug!(%amount, %usd_value, "bitmex balance query result");

        let mut balances = ValuedBalances::new();
        balances.insert(asset, ValuedBalance { amount, usd_value });
        Ok(balances)
    }

    /// Closed margin positions whose ledger timestamp falls in the window.
    pub async fn margin_history(
        &self,
        window: TimeWindow,
    ) -> Result<Collected<MarginPosition>, RemoteError> {
        let records = self.fetch_wallet_history().await?;
        tracing::debug!(results = records.len(), "bitmex margin history query");

        Ok(fold_records(
            Location::Bitmex,
            "margin position",
            &records,
            self.message_sink.as_ref(),
            |record| self.margin_outcome(record, window),
        ))
    }

    /// Deposits and withdrawals whose timestamp falls in the window.
    pub async fn deposits_withdrawals(
        &self,
        window: TimeWindow,
    ) -> Result<Collected<AssetMovement>, RemoteError> {
        let records = self.fetch_wallet_history().await?;
        tracing::debug!(results = records.len(), "bitmex deposit/withdrawal query");

        Ok(fold_records(
            Location::Bitmex,
            "asset movement",
            &records,
            self.message_sink.as_ref(),
            |record| self.movement_outcome(record, window),
        ))
    }

    /// Probe the credentials against the account endpoint, distinguishing a
    /// rejected key from a rejected secret by the exchange's error text.
    pub async fn check_api_key(&self) -> Result<ApiKeyValidity, RemoteError> {
        match self.api_query(HttpMethod::Get, "user", &[], "").await {
            Ok(_) => Ok(ApiKeyValidity::Valid),
            Err(RemoteError::Remote { message, .. }) if message.contains("Invalid API Key") => {
                Ok(ApiKeyValidity::Invalid {
                    reason: String::from("Provided API Key is invalid"),
                })
            }
            Err(RemoteError::Remote { message, .. }) if message.contains("Signature not valid") => {
                Ok(ApiKeyValidity::Invalid {
                    reason: String::from("Provided API Secret is invalid"),
                })
            }
            Err(error) => Err(error),
        }
    }
}

fn encode_options(options: &[(&str, &str)]) -> String {
    options
        .iter()
        .map(|(key, value)| format!("{key}={}", urlencoding::encode(value)))
        .collect::<Vec<_>>()
        .join("&")
}

impl Exchange for BitmexAdapter {
    fn location(&self) -> Location {
        Location::Bitmex
    }

    fn validate_api_key<'a>(
        &'a self,
    ) -> Pin<Box<dyn Future<Output = Result<ApiKeyValidity, RemoteError>> + Send + 'a>> {
        Box::pin(self.check_api_key())
    }

    fn query_balances<'a>(
        &'a self,
        oracle: &'a dyn PriceOracle,
    ) -> Pin<Box<dyn Future<Output = Result<ValuedBalances, RemoteError>> + Send + 'a>> {
        Box::pin(self.balances(oracle))
    }

    fn query_margin_history<'a>(
        &'a self,
        window: TimeWindow,
    ) -> Pin<Box<dyn Future<Output = Result<Collected<MarginPosition>, RemoteError>> + Send + 'a>>
    {
        Box::pin(self.margin_history(window))
    }

    fn query_deposits_withdrawals<'a>(
        &'a self,
        window: TimeWindow,
    ) -> Pin<Box<dyn Future<Output = Result<Collected<AssetMovement>, RemoteError>> + Send + 'a>>
    {
        Box::pin(self.deposits_withdrawals(window))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::StaticAssetRegistry;
    use crate::exchange::{CollectingSink, StaticPriceOracle};
    use crate::http_client::{HttpError, HttpResponse};
    use rust_decimal_macros::dec;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::time::Duration;

    struct ScriptedHttpClient {
        responses: Mutex<VecDeque<Result<HttpResponse, HttpError>>>,
        requests: Mutex<Vec<HttpRequest>>,
    }

    impl ScriptedHttpClient {
        fn with_responses(
            responses: impl IntoIterator<Item = Result<HttpResponse, HttpError>>,
        ) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses.into_iter().collect()),
                requests: Mutex::new(Vec::new()),
            })
        }

        fn ok(body: impl Into<String>) -> Arc<Self> {
            Self::with_responses([Ok(HttpResponse::ok_json(body))])
        }

        fn recorded_requests(&self) -> Vec<HttpRequest> {
            self.requests
                .lock()
                .expect("request store should not be poisoned")
                .clone()
        }
    }

    impl HttpClient for ScriptedHttpClient {
        fn execute<'a>(
            &'a self,
            request: HttpRequest,
        ) -> Pin<Box<dyn Future<Output = Result<HttpResponse, HttpError>> + Send + 'a>> {
            self.requests
                .lock()
                .expect("request store should not be poisoned")
                .push(request);
            let response = self
                .responses
                .lock()
                .expect("response store should not be poisoned")
                .pop_front()
                .unwrap_or_else(|| Ok(HttpResponse::ok_json("{}")));
            Box::pin(async move { response })
        }
    }

    fn credentials() -> Credentials {
        Credentials::new(
            "LAqUlngMIQkIUjXMUreyu3qn",
            "chNOOS4KvNXR_Xq4k4c3z6195RYTnDzJ".as_bytes(),
        )
    }

    fn make_adapter(client: Arc<ScriptedHttpClient>) -> (BitmexAdapter, Arc<CollectingSink>) {
        let sink = Arc::new(CollectingSink::new());
        let adapter = BitmexAdapter::new(
            credentials(),
            client,
            Arc::new(StaticAssetRegistry::default()),
            sink.clone(),
        );
        (adapter, sink)
    }

    fn full_2018_window() -> TimeWindow {
        TimeWindow::new(
            UtcDateTime::parse("2018-01-01T00:00:00Z").expect("valid"),
            UtcDateTime::parse("2018-12-31T23:59:59Z").expect("valid"),
        )
        .expect("ordered")
    }

    fn deposit_record() -> Value {
        json!({
            "transactID": "mov-1",
            "account": 126541,
            "currency": "XBt",
            "transactType": "Deposit",
            "amount": 100000000,
            "fee": null,
            "transactStatus": "Completed",
            "address": "3BMEXqGpG4FxBA1KWhRFufXfSTRgzfDBhJ",
            "tx": "b749bb43fd9af51c0b4ad6fba57dcfd9f0a5a483",
            "transactTime": "2018-08-21T01:00:00Z",
            "timestamp": "2018-08-21T01:00:00Z"
        })
    }

    #[tokio::test]
    async fn balance_query_values_the_settlement_wallet() {
        let client = ScriptedHttpClient::ok(r#"{"addr": null, "amount": "150000000", "currency": "XBt"}"#);
        let (adapter, _) = make_adapter(client.clone());
        let oracle = StaticPriceOracle::new().with_price("BTC", dec!(30000));

        let balances = adapter.balances(&oracle).await.expect("balance query");

        assert_eq!(balances.len(), 1);
        let (asset, balance) = balances.iter().next().expect("one entry");
        assert_eq!(asset.symbol(), "BTC");
        assert_eq!(balance.amount, dec!(1.5));
        assert_eq!(balance.usd_value, dec!(45000));

        let requests = client.recorded_requests();
        assert_eq!(requests.len(), 1);
        assert!(requests[0].url.ends_with("/api/v1/user/wallet?currency=XBt"));
    }

    #[tokio::test]
    async fn balance_query_propagates_oracle_failure() {
        let client = ScriptedHttpClient::ok(r#"{"amount": 1}"#);
        let (adapter, _) = make_adapter(client);

        let err = adapter
            .balances(&StaticPriceOracle::new())
            .await
            .expect_err("unpriced settlement asset");
        assert_eq!(
            err,
            RemoteError::PriceLookup {
                asset: String::from("BTC")
            }
        );
    }

    #[tokio::test]
    async fn corrupt_balance_payload_is_fatal() {
        let client = ScriptedHttpClient::ok(r#"{"amount": "not-a-number"}"#);
        let (adapter, _) = make_adapter(client);
        let oracle = StaticPriceOracle::new().with_price("BTC", dec!(30000));

        let err = adapter.balances(&oracle).await.expect_err("corrupt amount");
        assert!(matches!(err, RemoteError::CorruptPayload { .. }));
    }

    #[tokio::test]
    async fn wallet_query_signs_bare_path_but_requests_full_path() {
        let client = ScriptedHttpClient::ok(r#"{"amount": 1}"#);
        let (adapter, _) = make_adapter(client.clone());
        let oracle = StaticPriceOracle::new().with_price("BTC", dec!(30000));

        adapter.balances(&oracle).await.expect("balance query");

        let request = &client.recorded_requests()[0];
        assert!(request.url.contains("?currency=XBt"));

        let expires: i64 = request.headers["api-expires"].parse().expect("numeric");
        let expected = RequestSigner::new(&credentials()).sign(
            HttpMethod::Get,
            "/api/v1/user/wallet",
            expires,
            "",
        );
        assert_eq!(request.headers["api-signature"], expected);
        assert_eq!(request.headers["api-key"], "LAqUlngMIQkIUjXMUreyu3qn");
    }

    #[tokio::test]
    async fn non_exempt_endpoints_sign_the_full_query_string() {
        let client = ScriptedHttpClient::ok("[]");
        let (adapter, _) = make_adapter(client.clone());

        adapter
            .api_query(HttpMethod::Get, "user/walletHistory", &[("count", "5")], "")
            .await
            .expect("query");

        let request = &client.recorded_requests()[0];
        let expires: i64 = request.headers["api-expires"].parse().expect("numeric");
        let expected = RequestSigner::new(&credentials()).sign(
            HttpMethod::Get,
            "/api/v1/user/walletHistory?count=5",
            expires,
            "",
        );
        assert_eq!(request.headers["api-signature"], expected);
    }

    #[tokio::test]
    async fn deposit_record_normalizes_to_an_asset_movement() {
        let client = ScriptedHttpClient::ok(json!([deposit_record()]).to_string());
        let (adapter, sink) = make_adapter(client);

        let collected = adapter
            .deposits_withdrawals(full_2018_window())
            .await
            .expect("history query");

        assert_eq!(collected.events.len(), 1);
        assert!(collected.warnings.is_empty());
        assert!(sink.warnings().is_empty());

        let movement = &collected.events[0];
        assert_eq!(movement.category, MovementCategory::Deposit);
        assert_eq!(movement.asset.symbol(), "BTC");
        assert_eq!(movement.amount, dec!(1));
        assert_eq!(movement.fee, dec!(0));
        assert_eq!(movement.link, "mov-1");
        assert_eq!(
            movement.address.as_deref(),
            Some("3BMEXqGpG4FxBA1KWhRFufXfSTRgzfDBhJ")
        );
    }

    #[tokio::test]
    async fn withdrawal_amount_sign_is_normalized_away() {
        let mut record = deposit_record();
        record["transactType"] = json!("Withdrawal");
        record["amount"] = json!(-50000000);
        record["fee"] = json!(300000);
        let client = ScriptedHttpClient::ok(json!([record]).to_string());
        let (adapter, _) = make_adapter(client);

        let collected = adapter
            .deposits_withdrawals(full_2018_window())
            .await
            .expect("history query");

        let movement = &collected.events[0];
        assert_eq!(movement.category, MovementCategory::Withdrawal);
        assert_eq!(movement.amount, dec!(0.5));
        assert_eq!(movement.fee, dec!(0.003));
        assert!(movement.amount >= Decimal::ZERO);
    }

    #[tokio::test]
    async fn irrelevant_ledger_types_are_silently_skipped() {
        let mut record = deposit_record();
        record["transactType"] = json!("SomeOtherType");
        let client = ScriptedHttpClient::ok(json!([record]).to_string());
        let (adapter, sink) = make_adapter(client);

        let collected = adapter
            .deposits_withdrawals(full_2018_window())
            .await
            .expect("history query");

        assert!(collected.events.is_empty());
        assert!(collected.warnings.is_empty());
        assert!(sink.warnings().is_empty());
        assert!(sink.errors().is_empty());
    }

    #[tokio::test]
    async fn unknown_asset_warns_and_keeps_the_batch_alive() {
        let mut bad = deposit_record();
        bad["currency"] = json!("ROFL");
        bad["transactID"] = json!("mov-bad");
        let client = ScriptedHttpClient::ok(json!([bad, deposit_record()]).to_string());
        let (adapter, sink) = make_adapter(client);

        let collected = adapter
            .deposits_withdrawals(full_2018_window())
            .await
            .expect("history query");

        assert_eq!(collected.events.len(), 1);
        assert_eq!(collected.warnings.len(), 1);
        assert!(collected.warnings[0].message.contains("ROFL"));
        assert_eq!(sink.warnings().len(), 1);
    }

    #[tokio::test]
    async fn missing_required_key_warns_generically() {
        let mut record = deposit_record();
        record.as_object_mut().expect("mapping").remove("transactID");
        let client = ScriptedHttpClient::ok(json!([record]).to_string());
        let (adapter, sink) = make_adapter(client);

        let collected = adapter
            .deposits_withdrawals(full_2018_window())
            .await
            .expect("history query");

        assert!(collected.events.is_empty());
        assert_eq!(collected.warnings.len(), 1);
        assert!(collected.warnings[0].message.contains("Check logs"));
        assert_eq!(sink.errors().len(), 1);
    }

    #[tokio::test]
    async fn window_bounds_are_inclusive_for_movements() {
        let mut record = deposit_record();
        record["timestamp"] = json!("2018-01-01T00:00:00Z");
        let client = ScriptedHttpClient::ok(json!([record]).to_string());
        let (adapter, _) = make_adapter(client);

        let collected = adapter
            .deposits_withdrawals(full_2018_window())
            .await
            .expect("history query");
        assert_eq!(collected.events.len(), 1);
    }

    #[tokio::test]
    async fn out_of_window_movements_are_skipped() {
        let mut record = deposit_record();
        record["timestamp"] = json!("2017-12-31T23:59:59Z");
        let client = ScriptedHttpClient::ok(json!([record]).to_string());
        let (adapter, sink) = make_adapter(client);

        let collected = adapter
            .deposits_withdrawals(full_2018_window())
            .await
            .expect("history query");

        assert!(collected.events.is_empty());
        assert!(collected.warnings.is_empty());
        assert!(sink.errors().is_empty());
    }

    fn realised_pnl_record() -> Value {
        json!({
            "transactID": "pnl-1",
            "account": 126541,
            "currency": "XBt",
            "transactType": "RealisedPNL",
            "amount": 5000000,
            "fee": 0,
            "transactStatus": "Completed",
            "address": "XBTUSD",
            "tx": "",
            "text": "",
            "transactTime": "2018-06-01T00:00:00Z",
            "timestamp": "2018-06-01T00:00:00Z"
        })
    }

    #[tokio::test]
    async fn realised_pnl_becomes_a_margin_position() {
        let client = ScriptedHttpClient::ok(json!([realised_pnl_record()]).to_string());
        let (adapter, _) = make_adapter(client);

        let collected = adapter
            .margin_history(full_2018_window())
            .await
            .expect("history query");

        assert_eq!(collected.events.len(), 1);
        let position = &collected.events[0];
        assert_eq!(position.profit_loss, dec!(0.05));
        assert_eq!(position.pl_asset.symbol(), "BTC");
        assert_eq!(position.notes, "XBTUSD");
        assert_eq!(position.link, "pnl-1");
        assert_eq!(position.open_time, None);
        assert_eq!(
            position.close_time,
            UtcDateTime::parse("2018-06-01T00:00:00Z").expect("valid")
        );
    }

    #[tokio::test]
    async fn negative_realised_pnl_keeps_its_sign() {
        let mut record = realised_pnl_record();
        record["amount"] = json!(-2500000);
        let client = ScriptedHttpClient::ok(json!([record]).to_string());
        let (adapter, _) = make_adapter(client);

        let collected = adapter
            .margin_history(full_2018_window())
            .await
            .expect("history query");
        assert_eq!(collected.events[0].profit_loss, dec!(-0.025));
    }

    #[tokio::test]
    async fn margin_record_without_ledger_timestamp_follows_policy() {
        let mut record = realised_pnl_record();
        record["timestamp"] = json!(null);
        let body = json!([record]).to_string();

        let client = ScriptedHttpClient::ok(body.clone());
        let (adapter, _) = make_adapter(client);
        let collected = adapter
            .margin_history(full_2018_window())
            .await
            .expect("history query");
        assert_eq!(collected.events.len(), 1);

        let client = ScriptedHttpClient::ok(body);
        let (adapter, _) = make_adapter(client);
        let adapter = adapter.with_missing_timestamp_policy(MissingTimestampPolicy::Drop);
        let collected = adapter
            .margin_history(full_2018_window())
            .await
            .expect("history query");
        assert!(collected.events.is_empty());
    }

    #[tokio::test]
    async fn valid_key_probe_succeeds() {
        let client = ScriptedHttpClient::ok(r#"{"id": 126541, "username": "satoshi"}"#);
        let (adapter, _) = make_adapter(client);

        let validity = adapter.check_api_key().await.expect("probe");
        assert!(validity.is_valid());
    }

    #[tokio::test]
    async fn rejected_key_and_secret_are_distinguished() {
        let key_rejected = HttpResponse::with_status(
            401,
            r#"{"error": {"message": "Invalid API Key.", "name": "HTTPError"}}"#,
        );
        let secret_rejected = HttpResponse::with_status(
            401,
            r#"{"error": {"message": "Signature not valid.", "name": "HTTPError"}}"#,
        );

        let client = ScriptedHttpClient::with_responses([Ok(key_rejected)]);
        let (adapter, _) = make_adapter(client);
        let validity = adapter.check_api_key().await.expect("probe");
        assert_eq!(
            validity,
            ApiKeyValidity::Invalid {
                reason: String::from("Provided API Key is invalid")
            }
        );

        let client = ScriptedHttpClient::with_responses([Ok(secret_rejected)]);
        let (adapter, _) = make_adapter(client);
        let validity = adapter.check_api_key().await.expect("probe");
        assert_eq!(
            validity,
            ApiKeyValidity::Invalid {
                reason: String::from("Provided API Secret is invalid")
            }
        );
    }

    #[tokio::test]
    async fn unrelated_remote_errors_propagate_from_the_probe() {
        let client = ScriptedHttpClient::with_responses([Ok(HttpResponse::with_status(
            401,
            r#"{"error": {"message": "This key is disabled.", "name": "HTTPError"}}"#,
        ))]);
        let (adapter, _) = make_adapter(client);

        let err = adapter.check_api_key().await.expect_err("must propagate");
        assert!(matches!(err, RemoteError::Remote { .. }));
    }

    #[tokio::test]
    async fn status_outside_the_allow_list_is_fatal() {
        let client =
            ScriptedHttpClient::with_responses([Ok(HttpResponse::with_status(502, "bad gateway"))]);
        let (adapter, _) = make_adapter(client);

        let err = adapter
            .margin_history(full_2018_window())
            .await
            .expect_err("must fail");
        assert!(matches!(
            err,
            RemoteError::UnexpectedStatus { status: 502, .. }
        ));
    }

    #[tokio::test]
    async fn transport_failures_surface_as_remote_errors() {
        let client = ScriptedHttpClient::with_responses([Err(HttpError::new(
            "connection failed: dns error",
        ))]);
        let (adapter, _) = make_adapter(client);

        let err = adapter
            .margin_history(full_2018_window())
            .await
            .expect_err("must fail");
        match err {
            RemoteError::Transport { reason, .. } => assert!(reason.contains("dns error")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn invalid_json_body_is_a_remote_error() {
        let client = ScriptedHttpClient::ok("<html>maintenance</html>");
        let (adapter, _) = make_adapter(client);

        let err = adapter
            .margin_history(full_2018_window())
            .await
            .expect_err("must fail");
        assert_eq!(
            err,
            RemoteError::InvalidJson {
                location: Location::Bitmex
            }
        );
    }

    #[tokio::test]
    async fn exhausted_quota_fails_before_the_wire() {
        let client = ScriptedHttpClient::ok("[]");
        let (adapter, _) = make_adapter(client.clone());
        let adapter = adapter.with_policy(&ExchangePolicy {
            location: Location::Bitmex,
            quota_window: Duration::from_secs(60),
            quota_limit: 1,
            retry_after: Duration::from_secs(2),
        });

        adapter
            .margin_history(full_2018_window())
            .await
            .expect("first call fits the quota");

        let err = adapter
            .margin_history(full_2018_window())
            .await
            .expect_err("second call must be throttled");
        assert_eq!(
            err,
            RemoteError::RateLimited {
                location: Location::Bitmex,
                retry_after: Duration::from_secs(2),
            }
        );
        assert_eq!(client.recorded_requests().len(), 1);
    }
}
