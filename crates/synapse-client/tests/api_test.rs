//! REST client against a mock training server.

use mockito::Matcher;
use serde_json::json;
use synapse_client::error::GENERIC_API_MESSAGE;
use synapse_client::{ApiClient, ClientError};
use synapse_training::example::FALLBACK_IMAGE;
use synapse_training::{ExampleKind, NetworkConfig, NetworkId, TrainingConfig};

fn example_json(actual: u8, predicted: u8) -> serde_json::Value {
    json!({
        "image_data": "iVBORw0KGgo=",
        "actual_digit": actual,
        "predicted_digit": predicted,
        "correct": actual == predicted,
        "network_output": [0.0, 0.1, 0.0, 0.0, 0.0, 0.0, 0.0, 0.85, 0.0, 0.05]
    })
}

#[tokio::test]
async fn test_create_network_sends_layer_sizes() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/api/networks")
        .match_body(Matcher::Json(json!({"layer_sizes": [784, 128, 64, 10]})))
        .match_header("x-request-id", Matcher::Any)
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"network_id":"N1","layer_sizes":[784,128,64,10],"message":"Network created"}"#)
        .create_async()
        .await;

    let client = ApiClient::new(format!("{}/api", server.url()));
    let response = client.create_network(&NetworkConfig::default()).await.unwrap();

    mock.assert_async().await;
    assert_eq!(response.network_id, NetworkId::from("N1"));
    assert_eq!(response.layer_sizes, vec![784, 128, 64, 10]);
}

#[tokio::test]
async fn test_create_network_retries_once() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/api/networks")
        .with_status(503)
        .with_body(r#"{"message":"Busy, try later"}"#)
        .expect(2)
        .create_async()
        .await;

    let client = ApiClient::new(format!("{}/api", server.url()));
    let err = client.create_network(&NetworkConfig::default()).await.unwrap_err();

    mock.assert_async().await;
    assert_eq!(err.user_message(), "Busy, try later");
}

#[tokio::test]
async fn test_train_network_is_not_retried() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/api/networks/N1/train")
        .match_body(Matcher::Json(json!({"epochs": 10, "mini_batch_size": 10, "learning_rate": 3.0})))
        .with_status(500)
        .with_body("Internal Server Error")
        .expect(1)
        .create_async()
        .await;

    let client = ApiClient::new(format!("{}/api", server.url()));
    let err = client.train_network(&NetworkId::from("N1"), &TrainingConfig::default()).await.unwrap_err();

    mock.assert_async().await;
    assert!(matches!(err, ClientError::Api { status: 500, .. }));
    assert_eq!(err.user_message(), GENERIC_API_MESSAGE);
}

#[tokio::test]
async fn test_train_network_returns_job() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("POST", "/api/networks/N1/train")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"job_id":"J1","network_id":"N1","message":"Training started"}"#)
        .create_async()
        .await;

    let client = ApiClient::new(format!("{}/api", server.url()));
    let response = client.train_network(&NetworkId::from("N1"), &TrainingConfig::default()).await.unwrap();
    assert_eq!(response.job_id.as_str(), "J1");
}

#[tokio::test]
async fn test_invalid_training_config_never_reaches_server() {
    let server = mockito::Server::new_async().await;
    let client = ApiClient::new(format!("{}/api", server.url()));
    let config = TrainingConfig { epochs: 0, ..TrainingConfig::default() };

    let err = client.train_network(&NetworkId::from("N1"), &config).await.unwrap_err();
    assert!(matches!(err, ClientError::Training(_)));
}

#[tokio::test]
async fn test_examples_accept_single_object() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("GET", "/api/networks/N1/successful_example")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(example_json(7, 7).to_string())
        .create_async()
        .await;

    let client = ApiClient::new(format!("{}/api", server.url()));
    let example = client.example(Some(&NetworkId::from("N1")), ExampleKind::Successful).await.unwrap();
    assert_eq!(example.actual_digit, 7);
    assert!(example.correct);
}

#[tokio::test]
async fn test_gallery_truncates_and_forces_kind() {
    let mut server = mockito::Server::new_async().await;
    let body = json!([example_json(1, 2), example_json(3, 5), example_json(4, 4), example_json(8, 0)]);
    let _mock = server
        .mock("GET", "/api/networks/N1/unsuccessful_example")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(body.to_string())
        .create_async()
        .await;

    let client = ApiClient::new(format!("{}/api", server.url()));
    let gallery = client.gallery(Some(&NetworkId::from("N1")), ExampleKind::Unsuccessful).await.unwrap();
    assert_eq!(gallery.len(), 3);
    assert!(gallery.iter().all(|e| !e.correct));
}

#[tokio::test]
async fn test_example_falls_back_after_retry() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/api/networks/N1/unsuccessful_example")
        .with_status(500)
        .expect(2)
        .create_async()
        .await;

    let client = ApiClient::new(format!("{}/api", server.url()));
    let example = client.example(Some(&NetworkId::from("N1")), ExampleKind::Unsuccessful).await.unwrap();

    mock.assert_async().await;
    assert_eq!(example.image_data, FALLBACK_IMAGE);
    assert_eq!((example.actual_digit, example.predicted_digit), (9, 4));
    assert!(!example.correct);
}

#[tokio::test]
async fn test_examples_require_network() {
    let client = ApiClient::new("http://127.0.0.1:9/api");
    let err = client.random_example(None).await.unwrap_err();
    assert_eq!(err.user_message(), "No trained network available");
}

#[tokio::test]
async fn test_unreachable_server_is_sanitized() {
    let client = ApiClient::new("http://127.0.0.1:9/api");
    let err = client.train_network(&NetworkId::from("N1"), &TrainingConfig::default()).await.unwrap_err();
    assert!(matches!(err, ClientError::Api { status: 0, .. }));
    assert_eq!(err.user_message(), GENERIC_API_MESSAGE);
}
