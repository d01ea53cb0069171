//! Integration tests for image-id resolution against a mock search endpoint.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use serde_json::{Value, json};
use tileclip_core::api::{Credentials, Endpoints, PlanetClient, RetryPolicy};
use tileclip_core::geo::{GeoBox, GeoPoint, SequentialIdGenerator, TileGridBuilder};
use tileclip_core::search::{IdResolver, ResolveOutcome, SearchFilters};
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, Request, Respond, ResponseTemplate};

mod support;
use support::socket_guard::start_mock_server_or_skip;

macro_rules! require_mock_server {
    () => {{
        let Some(mock_server) = start_mock_server_or_skip().await else {
            return;
        };
        mock_server
    }};
}

const SEARCH_PATH: &str = "/data/v1/quick-search";

fn client_for(base: &str) -> PlanetClient {
    PlanetClient::with_settings(Credentials::new("test-key"), Endpoints::with_base(base), 5, 10)
        .expect("client should build")
}

fn fast_retry() -> RetryPolicy {
    RetryPolicy::with_delays(Duration::from_millis(1), Duration::from_millis(4))
}

fn resolver(concurrency: usize) -> IdResolver {
    IdResolver::new(concurrency, fast_retry(), SearchFilters::default()).expect("valid resolver")
}

fn tile(id: &str) -> GeoBox {
    let nw = GeoPoint::new(37.807_952, -122.509_337).expect("valid point");
    GeoBox::from_size(id, nw, 200.0, 200.0).expect("valid tile")
}

fn features(ids: &[&str]) -> Value {
    let features: Vec<Value> = ids.iter().map(|id| json!({ "id": id })).collect();
    json!({ "type": "FeatureCollection", "features": features })
}

/// Answers each search with an id derived from the tile's northwest corner,
/// delaying earlier tiles longer so completions arrive out of order.
struct FootprintEcho;

impl Respond for FootprintEcho {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let body: Value = serde_json::from_slice(&request.body).unwrap_or(Value::Null);
        let corner = &body["filter"]["config"][0]["config"]["coordinates"][0][1];
        let lng = corner[0].as_f64().unwrap_or_default();
        let lat = corner[1].as_f64().unwrap_or_default();
        let delay_ms = ((lng * 1e4).rem_euclid(20.0)) as u64;
        ResponseTemplate::new(200)
            .set_body_json(features(&[format!("img {lat:.6} {lng:.6}").as_str()]))
            .set_delay(Duration::from_millis(20 - delay_ms))
    }
}

/// Returns 429 for the first `limited` calls, then one candidate.
struct RateLimitedThenOk {
    calls: Arc<AtomicUsize>,
    limited: usize,
}

impl Respond for RateLimitedThenOk {
    fn respond(&self, _request: &Request) -> ResponseTemplate {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        if n < self.limited {
            ResponseTemplate::new(429).set_body_string("slow down")
        } else {
            ResponseTemplate::new(200).set_body_json(features(&["after-backoff"]))
        }
    }
}

// ==================== Resolution Tests ====================

#[tokio::test]
async fn test_resolve_takes_first_candidate_and_tags_tile() {
    let mock_server = require_mock_server!();

    Mock::given(method("POST"))
        .and(path(SEARCH_PATH))
        .and(header("authorization", "Basic dGVzdC1rZXk6"))
        .and(body_partial_json(json!({ "item_types": ["PSScene3Band"], "filter": { "type": "AndFilter" } })))
        .respond_with(ResponseTemplate::new(200).set_body_json(features(&["first", "second"])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server.uri());
    let results = resolver(5).resolve(&client, vec![tile("tile-0001")]).await.unwrap();

    assert_eq!(results.len(), 1);
    assert_eq!(
        results[0].outcome,
        ResolveOutcome::Resolved {
            image_id: "first".to_string()
        }
    );
    let image = results[0].tile.image().expect("image attached");
    assert_eq!(image.image_id, "first");
    assert_eq!(image.item_type, "PSScene3Band");
    assert_eq!(image.asset_type, "visual");
}

#[tokio::test]
async fn test_resolve_empty_result_is_no_candidate() {
    let mock_server = require_mock_server!();

    Mock::given(method("POST"))
        .and(path(SEARCH_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(features(&[])))
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server.uri());
    let results = resolver(5).resolve(&client, vec![tile("t")]).await.unwrap();

    assert_eq!(results[0].outcome, ResolveOutcome::NoCandidate);
    assert!(results[0].tile.image().is_none());
}

#[tokio::test]
async fn test_resolve_retries_rate_limit_until_success() {
    let mock_server = require_mock_server!();
    let calls = Arc::new(AtomicUsize::new(0));

    Mock::given(method("POST"))
        .and(path(SEARCH_PATH))
        .respond_with(RateLimitedThenOk {
            calls: Arc::clone(&calls),
            limited: 3,
        })
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server.uri());
    let results = resolver(1).resolve(&client, vec![tile("t")]).await.unwrap();

    assert!(results[0].is_resolved(), "{:?}", results[0].outcome);
    assert_eq!(calls.load(Ordering::SeqCst), 4);
}

#[tokio::test]
async fn test_resolve_server_error_fails_without_retry() {
    let mock_server = require_mock_server!();

    Mock::given(method("POST"))
        .and(path(SEARCH_PATH))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server.uri());
    let results = resolver(5).resolve(&client, vec![tile("t")]).await.unwrap();

    match &results[0].outcome {
        ResolveOutcome::Failed { status, error } => {
            assert_eq!(*status, Some(500));
            assert!(error.contains("boom"), "{error}");
        }
        other => panic!("expected failure, got {other:?}"),
    }
}

#[tokio::test]
async fn test_resolve_one_failure_does_not_affect_siblings() {
    let mock_server = require_mock_server!();

    Mock::given(method("POST"))
        .and(path(SEARCH_PATH))
        .and(body_partial_json(json!({ "item_types": ["PSScene3Band"] })))
        .respond_with(ResponseTemplate::new(200).set_body_json(features(&["ok"])))
        .up_to_n_times(2)
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(path(SEARCH_PATH))
        .respond_with(ResponseTemplate::new(403).set_body_string("forbidden"))
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server.uri());
    let results = resolver(1)
        .resolve(&client, vec![tile("a"), tile("b"), tile("c")])
        .await
        .unwrap();

    assert_eq!(results.len(), 3);
    assert!(results[0].is_resolved());
    assert!(results[1].is_resolved());
    assert!(matches!(results[2].outcome, ResolveOutcome::Failed { status: Some(403), .. }));
}

#[tokio::test]
async fn test_resolve_preserves_input_order() {
    let mock_server = require_mock_server!();

    Mock::given(method("POST"))
        .and(path(SEARCH_PATH))
        .respond_with(FootprintEcho)
        .mount(&mock_server)
        .await;

    let nw = GeoPoint::new(37.807_952, -122.509_337).unwrap();
    let aoi = GeoBox::from_size("aoi", nw, 1000.0, 400.0).unwrap();
    let tiles = TileGridBuilder::new(200.0, 200.0)
        .unwrap()
        .with_id_generator(Arc::new(SequentialIdGenerator::default()))
        .build(&aoi)
        .unwrap();
    assert_eq!(tiles.len(), 10);
    let expected_ids: Vec<String> = tiles.iter().map(|t| t.id().to_string()).collect();

    let client = client_for(&mock_server.uri());
    let results = resolver(10).resolve(&client, tiles).await.unwrap();

    let ids: Vec<&str> = results.iter().map(|r| r.tile.id()).collect();
    assert_eq!(ids, expected_ids);
    for result in &results {
        let nw = result.tile.northwest();
        let expected = format!("img {:.6} {:.6}", nw.lat(), nw.lng());
        assert_eq!(result.tile.image().unwrap().image_id, expected);
    }
}
