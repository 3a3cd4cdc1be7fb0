//! Cloudflare DNS backend against a mocked API

use serde_json::json;
use stackflow_cloud::{
    Config, ControlPlane, ErrorClass, ResourceKind, ResourceStatus,
};
use stackflow_cloud_cloudflare::{CloudflareDnsControlPlane, DnsConfig};
use wiremock::matchers::{bearer_token, body_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const RECORDS: &str = "/zones/zone-1/dns_records";

fn control_plane(server: &MockServer) -> CloudflareDnsControlPlane {
    CloudflareDnsControlPlane::new(
        DnsConfig::new("token", "zone-1", "example.com").with_base_url(server.uri()),
    )
}

fn record_json(content: &str) -> serde_json::Value {
    json!({
        "id": "rec-1",
        "name": "shop.example.com",
        "type": "CNAME",
        "content": content,
        "ttl": 300,
        "proxied": false
    })
}

fn declared(target: &str) -> Config {
    let mut config = Config::new();
    config.insert("zone".to_string(), json!("example.com"));
    config.insert("record_name".to_string(), json!("shop"));
    config.insert("record_type".to_string(), json!("CNAME"));
    config.insert("ttl".to_string(), json!(300));
    config.insert("target".to_string(), json!(target));
    config
}

#[tokio::test]
async fn test_describe_missing_record() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(RECORDS))
        .and(query_param("name", "shop.example.com"))
        .and(bearer_token("token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true, "errors": [], "result": []
        })))
        .expect(1)
        .mount(&server)
        .await;

    let state = control_plane(&server)
        .describe(ResourceKind::DnsRecord, "shop.example.com")
        .await
        .unwrap();
    assert_eq!(state.status, ResourceStatus::Missing);
}

#[tokio::test]
async fn test_describe_existing_record() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(RECORDS))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true, "errors": [], "result": [record_json("lb.example.net")]
        })))
        .mount(&server)
        .await;

    let state = control_plane(&server)
        .describe(ResourceKind::DnsRecord, "shop.example.com")
        .await
        .unwrap();
    assert_eq!(state.status, ResourceStatus::Ready);
    assert_eq!(state.id.as_deref(), Some("rec-1"));
    assert_eq!(state.observed, declared("lb.example.net"));
    assert_eq!(state.attributes["fqdn"], json!("shop.example.com"));
}

#[tokio::test]
async fn test_create_posts_cname() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(RECORDS))
        .and(body_json(json!({
            "type": "CNAME",
            "name": "shop.example.com",
            "content": "lb.example.net",
            "ttl": 300,
            "proxied": false
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true, "errors": [], "result": record_json("lb.example.net")
        })))
        .expect(1)
        .mount(&server)
        .await;

    let id = control_plane(&server)
        .create(ResourceKind::DnsRecord, "shop.example.com", &declared("lb.example.net"))
        .await
        .unwrap();
    assert_eq!(id, "rec-1");
}

#[tokio::test]
async fn test_update_and_delete_by_record_id() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path(format!("{}/rec-1", RECORDS)))
        .and(body_json(json!({"content": "lb-2.example.net", "ttl": 300})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true, "errors": [], "result": record_json("lb-2.example.net")
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path(format!("{}/rec-1", RECORDS)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true, "errors": [], "result": {"id": "rec-1"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let cp = control_plane(&server);
    cp.update(ResourceKind::DnsRecord, "rec-1", &declared("lb-2.example.net"))
        .await
        .unwrap();
    cp.delete(ResourceKind::DnsRecord, "rec-1").await.unwrap();
}

#[tokio::test]
async fn test_http_failures_are_classified() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(RECORDS))
        .respond_with(ResponseTemplate::new(429).set_body_json(json!({
            "success": false,
            "errors": [{"code": 971, "message": "Please wait and consider throttling your request speed"}],
            "result": null
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(RECORDS))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "success": false,
            "errors": [{"code": 81053, "message": "An A, AAAA, or CNAME record with that host already exists."}],
            "result": null
        })))
        .mount(&server)
        .await;

    let cp = control_plane(&server);
    let err = cp
        .describe(ResourceKind::DnsRecord, "shop.example.com")
        .await
        .unwrap_err();
    assert_eq!(err.class, ErrorClass::Throttled);
    assert!(err.is_retryable());

    let err = cp
        .create(ResourceKind::DnsRecord, "shop.example.com", &declared("lb.example.net"))
        .await
        .unwrap_err();
    assert_eq!(err.class, ErrorClass::InvalidConfig);
    assert!(err.message.contains("81053"));
}
