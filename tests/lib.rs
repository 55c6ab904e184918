//! Shared fixtures for the workspace behavior tests: a scripted offline
//! transport and canned BitMEX wallet records.

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use serde_json::{json, Value};

pub use tally_core::{
    ApiKeyValidity, BitmexAdapter, CollectingSink, Credentials, Exchange, HttpClient, HttpError,
    HttpMethod, HttpRequest, HttpResponse, Location, MovementCategory, RemoteError,
    StaticAssetRegistry, StaticPriceOracle, TimeWindow, UtcDateTime,
};

/// Transport double that replays canned responses and records every request.
pub struct ScriptedHttpClient {
    responses: Mutex<VecDeque<Result<HttpResponse, HttpError>>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl ScriptedHttpClient {
    pub fn with_responses(
        responses: impl IntoIterator<Item = Result<HttpResponse, HttpError>>,
    ) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.into_iter().collect()),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn ok(body: impl Into<String>) -> Arc<Self> {
        Self::with_responses([Ok(HttpResponse::ok_json(body))])
    }

    pub fn recorded_requests(&self) -> Vec<HttpRequest> {
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

pub fn test_credentials() -> Credentials {
    Credentials::new(
        "LAqUlngMIQkIUjXMUreyu3qn",
        "chNOOS4KvNXR_Xq4k4c3z6195RYTnDzJ".as_bytes(),
    )
}

pub fn bitmex_adapter(
    client: Arc<ScriptedHttpClient>,
) -> (BitmexAdapter, Arc<CollectingSink>) {
    let sink = Arc::new(CollectingSink::new());
    let adapter = BitmexAdapter::new(
        test_credentials(),
        client,
        Arc::new(StaticAssetRegistry::default()),
        sink.clone(),
    );
    (adapter, sink)
}

pub fn full_2018_window() -> TimeWindow {
    TimeWindow::new(
        UtcDateTime::parse("2018-01-01T00:00:00Z").expect("valid"),
        UtcDateTime::parse("2018-12-31T23:59:59Z").expect("valid"),
    )
    .expect("ordered")
}

pub fn deposit_record(id: &str) -> Value {
    json!({
        "transactID": id,
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

pub fn realised_pnl_record(id: &str) -> Value {
    json!({
        "transactID": id,
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
