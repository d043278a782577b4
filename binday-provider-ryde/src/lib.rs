//! Provider implementation for the City of Ryde using its "My Area" API.

/// Extraction of collection dates from the schedule fragment.
pub mod extract;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::Deserialize;
use serde::de::DeserializeOwned;

use binday_core::{
    model::{AddressMatch, AddressQuery, CollectionSchedule, CouncilMeta, LocationId},
    plugin::CouncilPlugin,
    ports::{AddressPort, PortError, SchedulePort},
};

/// Public address search endpoint.
pub const SEARCH_URL: &str = "https://www.ryde.nsw.gov.au/api/v1/myarea/search";
/// Public waste services endpoint.
pub const SCHEDULE_URL: &str = "https://www.ryde.nsw.gov.au/ocapi/Public/myarea/wasteservices";
/// Locale sent with every schedule request.
pub const DEFAULT_LOCALE: &str = "en-AU";
/// Upper bound on each request.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

const SEARCH_PATH: &str = "/api/v1/myarea/search";
const SCHEDULE_PATH: &str = "/ocapi/Public/myarea/wasteservices";

#[derive(Debug, Clone, PartialEq, Eq)]
/// Where the two Ryde endpoints live.
pub struct RydeEndpoints {
    /// Address search URL.
    pub search_url: String,
    /// Waste services URL.
    pub schedule_url: String,
    /// Value of the `ocsvclang` parameter.
    pub locale: String,
}

impl RydeEndpoints {
    /// Endpoints rooted at `base_url` instead of the council's host.
    #[must_use]
    pub fn with_base_url(base_url: &str) -> Self {
        let base = base_url.trim_end_matches('/');
        Self {
            search_url: format!("{base}{SEARCH_PATH}"),
            schedule_url: format!("{base}{SCHEDULE_PATH}"),
            locale: DEFAULT_LOCALE.to_owned(),
        }
    }
}

impl Default for RydeEndpoints {
    fn default() -> Self {
        Self {
            search_url: SEARCH_URL.to_owned(),
            schedule_url: SCHEDULE_URL.to_owned(),
            locale: DEFAULT_LOCALE.to_owned(),
        }
    }
}

/// Response from the address search.
#[derive(Debug, Deserialize)]
struct SearchResponse {
    // Items are decoded one at a time so a malformed tail cannot fail the top match.
    #[serde(rename = "Items", default)]
    items: Option<Vec<serde_json::Value>>,
}

/// Ranked search hit.
#[derive(Debug, Deserialize)]
struct SearchItem {
    #[serde(rename = "Id")]
    id: RawId,
    #[serde(rename = "AddressSingleLine")]
    address_single_line: String,
    #[serde(rename = "MunicipalSubdivision", default)]
    municipal_subdivision: Option<String>,
    #[serde(rename = "Score")]
    score: f64,
}

/// The search has returned ids both as strings and as numbers.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawId {
    Text(String),
    Number(serde_json::Number),
}

impl From<RawId> for LocationId {
    fn from(raw: RawId) -> Self {
        match raw {
            RawId::Text(text) => LocationId(text),
            RawId::Number(number) => LocationId(number.to_string()),
        }
    }
}

/// Envelope around the schedule fragment.
#[derive(Debug, Deserialize)]
struct WasteServicesResponse {
    #[serde(default)]
    success: bool,
    #[serde(rename = "responseContent", default)]
    response_content: Option<String>,
}

/// Address search implementation for Ryde.
pub struct RydeAddressPort {
    client: Client,
    endpoints: RydeEndpoints,
}

impl RydeAddressPort {
    /// Create a new address port bound to the given HTTP client.
    #[must_use]
    pub fn new(client: Client, endpoints: RydeEndpoints) -> Self {
        Self { client, endpoints }
    }
}

#[async_trait]
impl AddressPort for RydeAddressPort {
    async fn resolve(&self, query: &AddressQuery) -> Result<Option<AddressMatch>, PortError> {
        tracing::debug!(query = %query, url = %self.endpoints.search_url, "searching address");

        let req = self
            .client
            .get(&self.endpoints.search_url)
            .query(&[("keywords", query.as_str())]);

        let resp = fetch_json::<SearchResponse>(req).await?;

        // The service ranks by relevance; the first hit wins regardless of score.
        let Some(top) = resp.items.and_then(|items| items.into_iter().next()) else {
            return Ok(None);
        };

        let item = serde_json::from_value::<SearchItem>(top)
            .map_err(|err| PortError::Decode(format!("top search result: {err}")))?;

        Ok(Some(AddressMatch {
            location_id: item.id.into(),
            canonical_address: item.address_single_line,
            zone_label: item.municipal_subdivision,
            match_score: item.score,
        }))
    }
}

/// Waste schedule implementation for Ryde.
pub struct RydeSchedulePort {
    client: Client,
    endpoints: RydeEndpoints,
}

impl RydeSchedulePort {
    /// Create a new schedule port bound to the given HTTP client.
    #[must_use]
    pub fn new(client: Client, endpoints: RydeEndpoints) -> Self {
        Self { client, endpoints }
    }
}

#[async_trait]
impl SchedulePort for RydeSchedulePort {
    async fn schedule(&self, location: &LocationId) -> Result<CollectionSchedule, PortError> {
        tracing::debug!(location_id = %location, url = %self.endpoints.schedule_url, "fetching schedule");

        let req = self.client.get(&self.endpoints.schedule_url).query(&[
            ("geolocationid", location.0.as_str()),
            ("ocsvclang", self.endpoints.locale.as_str()),
        ]);

        let envelope = fetch_json::<WasteServicesResponse>(req).await?;

        if !envelope.success {
            return Err(PortError::UpstreamRejected);
        }

        let fragment = envelope
            .response_content
            .ok_or(PortError::MissingContent)?;

        Ok(extract::extract_schedule(&fragment))
    }
}

/// Build an HTTP client suitable for both ports.
///
/// # Errors
///
/// Returns the underlying [`reqwest::Error`] when the TLS backend cannot be initialised.
pub fn http_client(timeout: Duration) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(concat!("binday/", env!("CARGO_PKG_VERSION")))
        .timeout(timeout)
        .build()
}

/// Build the plugin bundle for the Ryde provider.
#[must_use]
pub fn plugin(client: Client, endpoints: RydeEndpoints) -> CouncilPlugin {
    let address_port = Arc::new(RydeAddressPort::new(client.clone(), endpoints.clone()));
    let schedule_port = Arc::new(RydeSchedulePort::new(client, endpoints));

    CouncilPlugin {
        meta: council_meta(),
        address_port,
        schedule_port,
    }
}

fn council_meta() -> CouncilMeta {
    CouncilMeta {
        name: String::from("Ryde Council"),
    }
}

// Small helper to fetch and decode JSON with status handling.
async fn fetch_json<T: DeserializeOwned>(req: RequestBuilder) -> Result<T, PortError> {
    let body = req
        .send()
        .await
        .map_err(PortError::from)?
        .error_for_status()
        .map_err(PortError::from)?
        .bytes()
        .await
        .map_err(PortError::from)?;

    serde_json::from_slice(&body).map_err(|err| PortError::Decode(err.to_string()))
}

#[cfg(test)]
mod tests {
    use binday_core::dates::FixedClock;
    use binday_core::model::Category;
    use binday_core::service::{BindayService, PipelineError};
    use chrono::NaiveDate;
    use mockito::{Matcher, Server};

    use super::*;

    fn query(text: &str) -> AddressQuery {
        AddressQuery::new(text).expect("non-empty query")
    }

    fn ports(server: &Server) -> (RydeAddressPort, RydeSchedulePort) {
        let client = http_client(DEFAULT_TIMEOUT).expect("client builds");
        let endpoints = RydeEndpoints::with_base_url(&server.url());
        (
            RydeAddressPort::new(client.clone(), endpoints.clone()),
            RydeSchedulePort::new(client, endpoints),
        )
    }

    #[test]
    fn endpoints_join_base_url() {
        let endpoints = RydeEndpoints::with_base_url("http://127.0.0.1:1234/");
        assert_eq!(
            endpoints.search_url,
            "http://127.0.0.1:1234/api/v1/myarea/search"
        );
        assert_eq!(
            endpoints.schedule_url,
            "http://127.0.0.1:1234/ocapi/Public/myarea/wasteservices"
        );
        assert_eq!(RydeEndpoints::default().search_url, SEARCH_URL);
    }

    #[tokio::test]
    async fn resolve_takes_first_item_even_with_lower_score() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", SEARCH_PATH)
            .match_query(Matcher::UrlEncoded(
                "keywords".into(),
                "54 North Road, Ryde".into(),
            ))
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"Items":[
                    {"Id":"a1b2","AddressSingleLine":"54 North Road, RYDE NSW 2112","MunicipalSubdivision":"West Ward","Score":3.5},
                    {"Id":"c3d4","AddressSingleLine":"54 North Road, EASTWOOD NSW 2122","Score":9.0}
                ]}"#,
            )
            .create_async()
            .await;

        let (addresses, _) = ports(&server);
        let resolved = addresses
            .resolve(&query("54 North Road, Ryde"))
            .await
            .expect("search succeeds")
            .expect("address matched");

        mock.assert_async().await;
        assert_eq!(resolved.location_id, LocationId("a1b2".to_owned()));
        assert_eq!(resolved.canonical_address, "54 North Road, RYDE NSW 2112");
        assert_eq!(resolved.zone_label.as_deref(), Some("West Ward"));
        assert!((resolved.match_score - 3.5).abs() < f64::EPSILON, "score kept");
    }

    #[tokio::test]
    async fn resolve_accepts_numeric_id_without_zone() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", SEARCH_PATH)
            .match_query(Matcher::Any)
            .with_body(r#"{"Items":[{"Id":90210,"AddressSingleLine":"1 Devlin St, RYDE NSW 2112","Score":1}]}"#)
            .create_async()
            .await;

        let (addresses, _) = ports(&server);
        let resolved = addresses
            .resolve(&query("1 Devlin St"))
            .await
            .expect("search succeeds")
            .expect("address matched");

        assert_eq!(resolved.location_id, LocationId("90210".to_owned()));
        assert_eq!(resolved.zone_label, None);
    }

    #[tokio::test]
    async fn resolve_without_items_is_not_found() {
        for body in [r#"{"Items":[]}"#, r#"{}"#, r#"{"Items":null}"#] {
            let mut server = Server::new_async().await;
            server
                .mock("GET", SEARCH_PATH)
                .match_query(Matcher::Any)
                .with_body(body)
                .create_async()
                .await;

            let (addresses, _) = ports(&server);
            let resolved = addresses
                .resolve(&query("nowhere"))
                .await
                .expect("empty result is not an error");
            assert!(resolved.is_none(), "{body} must resolve to nothing");
        }
    }

    #[tokio::test]
    async fn resolve_reports_transport_and_decode_failures() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", SEARCH_PATH)
            .match_query(Matcher::Any)
            .with_status(503)
            .create_async()
            .await;
        let (addresses, _) = ports(&server);
        let err = addresses.resolve(&query("x")).await.expect_err("503 fails");
        assert!(matches!(err, PortError::Network(_)), "unexpected error: {err}");

        let mut server = Server::new_async().await;
        server
            .mock("GET", SEARCH_PATH)
            .match_query(Matcher::Any)
            .with_body("<html>maintenance</html>")
            .create_async()
            .await;
        let (addresses, _) = ports(&server);
        let err = addresses.resolve(&query("x")).await.expect_err("html fails");
        assert!(matches!(err, PortError::Decode(_)), "unexpected error: {err}");

        let mut server = Server::new_async().await;
        server
            .mock("GET", SEARCH_PATH)
            .match_query(Matcher::Any)
            .with_body(r#"{"Items":[{"Id":"a1","Score":2}]}"#)
            .create_async()
            .await;
        let (addresses, _) = ports(&server);
        let err = addresses.resolve(&query("x")).await.expect_err("missing address fails");
        assert!(matches!(err, PortError::Decode(_)), "unexpected error: {err}");
    }

    #[tokio::test]
    async fn schedule_sends_location_and_locale() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", SCHEDULE_PATH)
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("geolocationid".into(), "a1b2".into()),
                Matcher::UrlEncoded("ocsvclang".into(), "en-AU".into()),
            ]))
            .with_body(
                r#"{"success":true,"responseContent":"&lt;h3&gt;General Waste&lt;/h3&gt;&lt;div class=&quot;next-service&quot;&gt;Wed 21/1/2026&lt;/div&gt;"}"#,
            )
            .create_async()
            .await;

        let (_, schedules) = ports(&server);
        let schedule = schedules
            .schedule(&LocationId("a1b2".to_owned()))
            .await
            .expect("schedule fetched");

        mock.assert_async().await;
        let entry = schedule.get(Category::GeneralWaste).expect("general waste listed");
        assert_eq!(entry.raw_date_label, "Wed 21/1/2026");
        assert_eq!(schedule.len(), 1);
    }

    #[tokio::test]
    async fn schedule_rejected_by_upstream() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", SCHEDULE_PATH)
            .match_query(Matcher::Any)
            .with_body(r#"{"success":false,"responseContent":"<h3>Recycling</h3>"}"#)
            .create_async()
            .await;

        let (_, schedules) = ports(&server);
        let err = schedules
            .schedule(&LocationId("a1b2".to_owned()))
            .await
            .expect_err("success=false fails");
        assert!(matches!(err, PortError::UpstreamRejected), "unexpected error: {err}");
    }

    #[tokio::test]
    async fn schedule_without_content_fails() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", SCHEDULE_PATH)
            .match_query(Matcher::Any)
            .with_body(r#"{"success":true}"#)
            .create_async()
            .await;

        let (_, schedules) = ports(&server);
        let err = schedules
            .schedule(&LocationId("a1b2".to_owned()))
            .await
            .expect_err("missing content fails");
        assert!(matches!(err, PortError::MissingContent), "unexpected error: {err}");
    }

    #[tokio::test]
    async fn pipeline_resolves_then_extracts() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", SEARCH_PATH)
            .match_query(Matcher::UrlEncoded(
                "keywords".into(),
                "54 North Road, Ryde".into(),
            ))
            .with_body(r#"{"Items":[{"Id":"x-54","AddressSingleLine":"54 North Road, RYDE NSW 2112","Score":7.25}]}"#)
            .create_async()
            .await;
        server
            .mock("GET", SCHEDULE_PATH)
            .match_query(Matcher::UrlEncoded("geolocationid".into(), "x-54".into()))
            .with_body(
                r#"{"success":true,"responseContent":"<h3>General Waste</h3>\n<div class=\"col\">\n<div class=\"next-service\">\n  Wed 21/1/2026\n</div></div>"}"#,
            )
            .create_async()
            .await;

        let client = http_client(DEFAULT_TIMEOUT).expect("client builds");
        let today = NaiveDate::from_ymd_opt(2026, 1, 20).expect("valid test date");
        let service = BindayService::with_clock(
            plugin(client, RydeEndpoints::with_base_url(&server.url())),
            Arc::new(FixedClock::on(today)),
        );

        let snapshot = service
            .waste_collection_info(&query("54 North Road, Ryde"))
            .await
            .expect("pipeline succeeds");

        assert_eq!(snapshot.address.location_id, LocationId("x-54".to_owned()));
        assert_eq!(snapshot.schedule.len(), 1);
        let entry = snapshot.entry(Category::GeneralWaste).expect("general waste");
        assert_eq!(entry.raw_date_label, "Wed 21/1/2026");
        assert_eq!(entry.days_until(today), 1);
    }

    #[tokio::test]
    async fn pipeline_distinguishes_unknown_address() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", SEARCH_PATH)
            .match_query(Matcher::Any)
            .with_body(r#"{"Items":[]}"#)
            .create_async()
            .await;
        let schedule_mock = server
            .mock("GET", SCHEDULE_PATH)
            .match_query(Matcher::Any)
            .expect(0)
            .create_async()
            .await;

        let client = http_client(DEFAULT_TIMEOUT).expect("client builds");
        let service = BindayService::new(plugin(client, RydeEndpoints::with_base_url(&server.url())));

        let err = service
            .waste_collection_info(&query("1 Nowhere Lane"))
            .await
            .expect_err("unknown address fails");

        schedule_mock.assert_async().await;
        assert!(
            matches!(err, PipelineError::AddressNotFound { .. }),
            "unexpected error: {err}"
        );
    }
}
