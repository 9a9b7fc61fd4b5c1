use super::aic::AicAdapter;
use super::cma::CmaAdapter;
use super::met::MetAdapter;
use super::rma::RmaAdapter;
use super::smk::SmkAdapter;
use super::*;
use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn test_config() -> SourceHttpConfig {
    SourceHttpConfig {
        rate_limit_ms: 0,
        retry_base_delay_ms: 10,
        max_retries: 3,
        ..SourceHttpConfig::default()
    }
}

#[test]
fn bucket_cursor_round_trip() {
    assert_eq!(parse_bucket_cursor(None).unwrap(), (0, 0));
    assert_eq!(parse_bucket_cursor(Some("2:300")).unwrap(), (2, 300));
    assert_eq!(
        parse_bucket_cursor(Some(&format_bucket_cursor(1, 100))).unwrap(),
        (1, 100)
    );
}

#[test]
fn bucket_cursor_rejects_garbage() {
    assert!(parse_bucket_cursor(Some("nonsense")).is_err());
    assert!(parse_bucket_cursor(Some("1:-5")).is_err());
}

#[tokio::test]
async fn http_client_retries_server_errors() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/data"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/data"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .mount(&server)
        .await;

    let client = HttpClient::new(&test_config());
    let url = Url::parse(&format!("{}/data", server.uri())).unwrap();
    let body = client.get_json(&url).await.unwrap();
    assert_eq!(body["ok"], json!(true));
}

#[tokio::test]
async fn http_client_gives_up_after_retry_budget() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&server)
        .await;

    let client = HttpClient::new(&test_config());
    let url = Url::parse(&server.uri()).unwrap();
    let error = client.get_json(&url).await.unwrap_err();
    assert_eq!(error.status(), Some(503));
}

#[tokio::test]
async fn http_client_does_not_retry_client_errors() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let client = HttpClient::new(&test_config());
    let url = Url::parse(&server.uri()).unwrap();
    let error = client.get_json(&url).await.unwrap_err();
    assert_eq!(error.status(), Some(404));
}

#[tokio::test]
async fn smk_pages_through_filter_buckets() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("offset", "0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [{"object_number": "KMS1"}],
            "found": 150
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("offset", "100"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [{"object_number": "KMS2"}],
            "found": 150
        })))
        .mount(&server)
        .await;

    let adapter =
        SmkAdapter::new(&test_config()).with_base_url(format!("{}/search", server.uri()));

    // First page of the first bucket, then its second page, then a bucket
    // advance once the bucket is exhausted.
    let page = adapter.fetch(None).await.unwrap();
    assert_eq!(page.records.len(), 1);
    assert_eq!(page.next_cursor.as_deref(), Some("0:100"));

    let page = adapter.fetch(Some("0:100")).await.unwrap();
    assert_eq!(page.records.len(), 1);
    assert_eq!(page.next_cursor.as_deref(), Some("1:0"));
}

#[tokio::test]
async fn smk_finishes_after_last_bucket() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [],
            "found": 0
        })))
        .mount(&server)
        .await;

    let adapter = SmkAdapter::new(&test_config()).with_base_url(server.uri());
    let last_bucket = format_bucket_cursor(5, 0);
    let page = adapter.fetch(Some(&last_bucket)).await.unwrap();
    assert!(page.records.is_empty());
    assert!(page.next_cursor.is_none());
}

#[tokio::test]
async fn cma_requests_cc0_works_with_images() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(query_param("cc0", "1"))
        .and(query_param("has_image", "1"))
        .and(query_param("type", "Print"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{"accession_number": "1953.424"}],
            "info": {"total": 1}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let adapter = CmaAdapter::new(&test_config()).with_base_url(server.uri());
    let page = adapter.fetch(None).await.unwrap();
    assert_eq!(page.records.len(), 1);
    // One result in the Print bucket: move straight to the Painting bucket.
    assert_eq!(page.next_cursor.as_deref(), Some("1:0"));
}

#[tokio::test]
async fn aic_reports_total_and_next_page() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(query_param("page", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "pagination": {"total": 250, "total_pages": 3},
            "data": [{"id": 1}, {"id": 2}]
        })))
        .mount(&server)
        .await;

    let adapter = AicAdapter::new(&test_config()).with_base_url(server.uri());
    let page = adapter.fetch(None).await.unwrap();
    assert_eq!(page.records.len(), 2);
    assert_eq!(page.total, Some(250));
    assert_eq!(page.next_cursor.as_deref(), Some("2"));
}

#[tokio::test]
async fn met_lists_departments_then_fetches_objects() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/objects"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "total": 2,
            "objectIDs": [101, 102]
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/objects/101"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "objectID": 101,
            "accessionNumber": "59.23"
        })))
        .mount(&server)
        .await;
    // Stale listing entry: the object was removed after the ID listing.
    Mock::given(method("GET"))
        .and(path("/objects/102"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let adapter =
        MetAdapter::new(&test_config()).with_base_url(format!("{}/objects", server.uri()));
    let page = adapter.fetch(None).await.unwrap();
    assert_eq!(page.records.len(), 1);
    assert_eq!(page.records[0]["objectID"], json!(101));
    assert_eq!(page.total, Some(2));
    assert!(page.next_cursor.is_none());
}

#[tokio::test]
async fn met_relists_departments_on_each_new_pass() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/objects"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "total": 1,
            "objectIDs": [101]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/objects/101"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"objectID": 101})))
        .mount(&server)
        .await;

    let adapter =
        MetAdapter::new(&test_config()).with_base_url(format!("{}/objects", server.uri()));
    let page = adapter.fetch(None).await.unwrap();
    assert_eq!(page.records.len(), 1);

    // An artwork appears upstream between passes; the next pass must see
    // it instead of replaying the old listing.
    server.reset().await;
    Mock::given(method("GET"))
        .and(path("/objects"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "total": 2,
            "objectIDs": [101, 102]
        })))
        .mount(&server)
        .await;
    for id in [101, 102] {
        Mock::given(method("GET"))
            .and(path(format!("/objects/{}", id)))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"objectID": id})))
            .mount(&server)
            .await;
    }

    let page = adapter.fetch(None).await.unwrap();
    assert_eq!(page.records.len(), 2);
    assert_eq!(page.total, Some(2));
}

const RMA_RECORD_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<OAI-PMH>
  <GetRecord>
    <record>
      <header>
        <identifier>https://id.rijksmuseum.nl/200100988</identifier>
      </header>
      <metadata>
        <rdf:RDF>
          <edm:ProvidedCHO rdf:about="https://id.rijksmuseum.nl/200100988">
            <dc:identifier>SK-C-5</dc:identifier>
          </edm:ProvidedCHO>
        </rdf:RDF>
      </metadata>
    </record>
  </GetRecord>
</OAI-PMH>"#;

#[tokio::test]
async fn rma_lists_items_then_fetches_oai_records() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("type", "painting"))
        .and(query_param("pageToken", ""))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "partOf": {"totalItems": 42},
            "orderedItems": [{"id": "https://id.rijksmuseum.nl/200100988"}],
            "next": {"id": format!("{}/search?type=painting&pageToken=abc", server.uri())}
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/oai"))
        .and(query_param("verb", "GetRecord"))
        .and(query_param("metadataPrefix", "edm"))
        .respond_with(ResponseTemplate::new(200).set_body_string(RMA_RECORD_XML))
        .mount(&server)
        .await;

    let adapter = RmaAdapter::new(&test_config()).with_base_urls(
        format!("{}/search", server.uri()),
        format!("{}/oai", server.uri()),
    );

    let page = adapter.fetch(None).await.unwrap();
    assert_eq!(page.records.len(), 1);
    assert_eq!(
        page.records[0].pointer("/metadata/rdf:RDF/edm:ProvidedCHO/dc:identifier"),
        Some(&json!("SK-C-5"))
    );
    assert_eq!(page.total, Some(42));
    assert_eq!(page.next_cursor.as_deref(), Some("0:abc"));
}

#[tokio::test]
async fn rma_advances_through_work_type_buckets() {
    let server = MockServer::start().await;

    // No next link: the painting bucket is exhausted.
    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "partOf": {"totalItems": 0},
            "orderedItems": []
        })))
        .mount(&server)
        .await;

    let adapter = RmaAdapter::new(&test_config()).with_base_urls(
        format!("{}/search", server.uri()),
        format!("{}/oai", server.uri()),
    );

    let page = adapter.fetch(None).await.unwrap();
    assert_eq!(page.next_cursor.as_deref(), Some("1:"));

    let page = adapter.fetch(Some("1:")).await.unwrap();
    assert!(page.next_cursor.is_none());

    let page = adapter.fetch(Some("2:")).await.unwrap();
    assert!(page.records.is_empty());
    assert!(page.next_cursor.is_none());
}

#[tokio::test]
async fn registry_exposes_all_builtin_museums() {
    let registry = SourceRegistry::builtin(&test_config());
    assert_eq!(registry.slugs(), vec!["aic", "cma", "met", "rma", "smk"]);
    for info in SUPPORTED_MUSEUMS {
        assert!(registry.get(info.slug).is_some(), "missing {}", info.slug);
    }
}

#[test]
fn registry_rejects_sources_without_a_normalizer() {
    struct LouvreAdapter;

    #[async_trait]
    impl SourceAdapter for LouvreAdapter {
        fn slug(&self) -> &'static str {
            "louvre"
        }

        async fn fetch(&self, _cursor: Option<&str>) -> Result<SourcePage> {
            Ok(SourcePage::default())
        }
    }

    let mut registry = SourceRegistry::new();
    let error = registry.register(Arc::new(LouvreAdapter)).unwrap_err();
    assert!(matches!(error, SyncError::Config(_)));
    assert!(registry.get("louvre").is_none());
}
