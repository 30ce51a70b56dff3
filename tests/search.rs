use chrono::{TimeZone, Utc};
use httpmock::prelude::*;
use scihub::{
    CatalogEngine, CatalogSearcher, Client, ClientConfig, Error, Footprint, Platform,
    SearchCriteria, SpatialRelation,
};
use serde_json::json;
use std::time::Duration;

fn config(server: &MockServer) -> ClientConfig {
    ClientConfig::new("user", "secret")
        .with_base_url(server.base_url())
        .with_progress(false)
        .with_retry_delay(Duration::ZERO)
}

fn criteria() -> SearchCriteria {
    SearchCriteria::new(Utc.with_ymd_and_hms(2022, 1, 1, 0, 0, 0).unwrap())
        .with_platform(Platform::Sentinel2)
        .with_product_type("S2MSI2A")
        .with_footprint(Footprint::new(
            "POLYGON((35.82 50.51,37.36 50.47,37.27 49.48,35.76 49.53,35.82 50.51))",
            SpatialRelation::Intersects,
        ))
}

#[test]
fn single_result_page_over_http() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(GET)
            .path("/search")
            .query_param("format", "json")
            .query_param("rows", "100")
            .header("authorization", "Basic dXNlcjpzZWNyZXQ=");
        then.status(200)
            .header("Content-Type", "application/json")
            .json_body(json!({
                "feed": {
                    "opensearch:totalResults": "1",
                    "opensearch:startIndex": "0",
                    "opensearch:itemsPerPage": "100",
                    "entry": {
                        "id": "2b17b57d-fff4-4645-b539-91f305c27c69",
                        "title": "S2A_MSIL2A_20220108T084401_N0301_R064_T36UYA_20220108T105134",
                        "ondemand": "false",
                        "date": {"name": "beginposition", "content": "2022-01-08T08:44:01.024Z"},
                        "double": {"name": "cloudcoverpercentage", "content": "87.301544"},
                        "str": [
                            {"name": "tileid", "content": "36UYA"},
                            {"name": "producttype", "content": "S2MSI2A"}
                        ]
                    }
                }
            }));
    });

    let client = Client::new(config(&server)).unwrap();
    let result = client.search(&criteria()).unwrap();
    mock.assert();

    assert_eq!(result.total_results, 1);
    let record = &result.records[0];
    assert_eq!(record.id, "2b17b57d-fff4-4645-b539-91f305c27c69");
    assert_eq!(record.tile_id, "36UYA");
    assert_eq!(record.product_type, "S2MSI2A");
    assert_eq!(record.cloud_cover_percentage, 87.301544);
    assert!(record.begin_position.is_some());
}

#[test]
fn query_text_reaches_the_hub_intact() {
    let server = MockServer::start();
    let expected_q = "(platformname:'Sentinel-2') AND (producttype:S2MSI2A) AND \
                      beginposition:[2022-01-01T00:00:00.000Z TO NOW] AND \
                      footprint:\"Intersects(POLYGON((35.82 50.51,37.36 50.47,37.27 49.48,35.76 49.53,35.82 50.51)))\"";
    let mock = server.mock(|when, then| {
        when.method(GET).path("/search").query_param("q", expected_q);
        then.status(200)
            .json_body(json!({"feed": {"opensearch:totalResults": "0"}}));
    });

    let engine = CatalogEngine::new(&config(&server)).unwrap();
    let result = engine.search(&criteria()).unwrap();
    mock.assert();
    assert_eq!(result.total_results, 0);
    assert!(result.records.is_empty());
}

#[test]
fn bad_credentials_are_reported() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/search");
        then.status(401).body("Full authentication is required to access this resource");
    });

    let engine = CatalogEngine::new(&config(&server)).unwrap();
    let err = engine.search(&criteria()).unwrap_err();
    assert!(matches!(err, Error::Status { status: 401, .. }));
    assert!(err.to_string().contains("Full authentication"));
}

#[test]
fn connection_failure_is_a_transport_error() {
    // Nothing listens on port 9 of the loopback interface.
    let config = ClientConfig::new("user", "secret")
        .with_base_url("http://127.0.0.1:9/dhus")
        .with_timeout(Duration::from_secs(5));
    let engine = CatalogEngine::new(&config).unwrap();
    let err = engine.search(&criteria()).unwrap_err();
    assert!(matches!(err, Error::Http(_)));
    assert!(err.is_transient());
}
