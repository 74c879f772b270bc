//! KV client against the in-process mock service

mod common;

use common::MockKv;
use faultline::client::PatchOp;
use serde_json::json;

#[tokio::test]
async fn test_put_get_delete_round() {
    let mock = MockKv::start().await;
    let client = mock.client();

    client.put_json("k1", &json!({"id": 1})).await.unwrap();
    assert_eq!(client.get_json("k1").await.unwrap(), Some(json!({"id": 1})));

    client.delete("k1").await.unwrap();
    assert_eq!(client.get("k1").await.unwrap(), None);
}

#[tokio::test]
async fn test_miss_is_none_not_error() {
    let mock = MockKv::start().await;
    assert_eq!(mock.client().get_json("absent").await.unwrap(), None);
}

#[tokio::test]
async fn test_raw_body_reads_back_as_string() {
    let mock = MockKv::start().await;
    let client = mock.client();

    mock.insert_raw("blob", b"not json at all");
    assert_eq!(
        client.get_json("blob").await.unwrap(),
        Some(json!("not json at all"))
    );
    assert_eq!(
        client.get("blob").await.unwrap().as_deref(),
        Some(&b"not json at all"[..])
    );
}

#[tokio::test]
async fn test_patch_ops() {
    let mock = MockKv::start().await;
    let client = mock.client();
    client
        .put_json("doc", &json!({"count": 1, "name": "a"}))
        .await
        .unwrap();

    client.patch("doc", PatchOp::SetInt, "count", "42").await.unwrap();
    client.patch("doc", PatchOp::SetStr, "name", "b").await.unwrap();
    client.patch("doc", PatchOp::PatchStr, "name", "cd").await.unwrap();

    assert_eq!(mock.value("doc"), Some(json!({"count": 42, "name": "bcd"})));
}

#[tokio::test]
async fn test_patch_rejection_is_unexpected_status() {
    let mock = MockKv::start().await;
    let err = mock
        .client()
        .patch("missing", PatchOp::SetInt, "x", "1")
        .await
        .unwrap_err();
    assert_eq!(err.code(), "FAULTLINE_UNEXPECTED_STATUS");
    assert!(!err.is_fatal());
}

#[tokio::test]
async fn test_health_follows_service_state() {
    let mock = MockKv::start().await;
    let client = mock.client();
    client.health().await.unwrap();

    mock.set_healthy(false);
    let err = client.health().await.unwrap_err();
    assert_eq!(err.code(), "FAULTLINE_UNEXPECTED_STATUS");
}

#[tokio::test]
async fn test_metrics_on_both_paths() {
    let mock = MockKv::start().await;
    mock.set_thread_count(7);
    let client = mock.client();

    let doc = client.metrics().await.unwrap();
    assert_eq!(doc["system"]["thread_count"], 7);

    let doc = client.metrics_at("/kv/metrics").await.unwrap();
    assert_eq!(doc["system"]["thread_count"], 7);
}
