use super::*;
use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client(server: &MockServer, dimension: u32) -> EmbeddingClient {
    let config = EmbeddingConfig {
        dimension,
        ..EmbeddingConfig::default()
    };
    EmbeddingClient::new(&config)
        .expect("valid config")
        .with_base_url(Url::parse(&server.uri()).expect("valid mock URI"))
}

fn payload() -> EmbedPayload {
    EmbedPayload {
        text: "Nighthawks; Edward Hopper; painting".to_string(),
        image_url: "https://example.com/image.jpg".to_string(),
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn embed_sends_model_text_and_image() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/embed"))
        .and(body_partial_json(json!({
            "model": "clip-vit-l-14",
            "image_url": "https://example.com/image.jpg"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "embedding": vec![0.5_f32; 768]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server, 768);
    let handle = tokio::task::spawn_blocking(move || client.embed(&payload()));
    let vector = handle.await.expect("task completes").expect("embed succeeds");
    assert_eq!(vector.len(), 768);
}

#[tokio::test(flavor = "multi_thread")]
async fn embed_rejects_dimension_mismatch_without_retrying() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/embed"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "embedding": vec![0.5_f32; 512]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server, 768);
    let handle = tokio::task::spawn_blocking(move || client.embed(&payload()));
    let error = handle.await.expect("task completes").unwrap_err();
    assert!(matches!(error, crate::SyncError::Embedding(_)));
}

#[tokio::test(flavor = "multi_thread")]
async fn embed_retries_transient_failures() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/embed"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/embed"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "embedding": vec![0.1_f32; 768]
        })))
        .mount(&server)
        .await;

    let client = client(&server, 768);
    let handle = tokio::task::spawn_blocking(move || client.embed(&payload()));
    assert!(handle.await.expect("task completes").is_ok());
}

#[tokio::test(flavor = "multi_thread")]
async fn health_check_verifies_status_and_model() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "ok",
            "model": "clip-vit-l-14"
        })))
        .mount(&server)
        .await;

    let client = client(&server, 768);
    let handle = tokio::task::spawn_blocking(move || client.health_check());
    assert!(handle.await.expect("task completes").is_ok());
}

#[tokio::test(flavor = "multi_thread")]
async fn health_check_rejects_wrong_model() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "ok",
            "model": "clip-vit-b-32"
        })))
        .mount(&server)
        .await;

    let client = client(&server, 768);
    let handle = tokio::task::spawn_blocking(move || client.health_check());
    assert!(handle.await.expect("task completes").is_err());
}
