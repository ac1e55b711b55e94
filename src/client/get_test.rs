use std::sync::Arc;

use tokio::sync::mpsc::UnboundedReceiver;
use tracing_test::traced_test;

use crate::client::CacheClient;
use crate::codec::CachedPayload;
use crate::codec::StringCodec;
use crate::codec::FLAG_UTF8;
use crate::errors::Error;
use crate::operation::OpPayload;
use crate::operation::OperationStatus;
use crate::operation::StatusCode;
use crate::test_utils::ScriptedTransport;
use crate::test_utils::SubmittedOp;

fn build_client() -> (CacheClient, UnboundedReceiver<SubmittedOp>) {
    let (transport, rx) = ScriptedTransport::new();
    let client = CacheClient::builder(transport).app_name("test_app").build();
    (client, rx)
}

fn utf8_payload(key: &str, data: &str) -> OpPayload {
    OpPayload::Value {
        key: key.to_string(),
        flags: FLAG_UTF8,
        data: data.as_bytes().to_vec(),
    }
}

#[tokio::test]
async fn test_get_hit() {
    let (client, mut rx) = build_client();

    let future = client.async_get("user:1", Arc::new(StringCodec)).unwrap();
    let mut op = rx.recv().await.unwrap();
    op.payload(utf8_payload("user:1", "alice"));
    op.finish(OperationStatus::success());

    let result = future.wait().await;
    assert!(result.is_success());
    assert_eq!(result.value, Some("alice".to_string()));
}

#[tokio::test]
async fn test_get_miss() {
    let (client, mut rx) = build_client();

    let future = client.async_get("user:1", Arc::new(StringCodec)).unwrap();
    let op = rx.recv().await.unwrap();
    op.finish(OperationStatus::new(StatusCode::NotFound, "not found"));

    let result = future.wait().await;
    assert_eq!(result.value, None);
    assert_eq!(result.status.code, StatusCode::NotFound);
}

#[tokio::test]
#[traced_test]
async fn test_get_wrong_key_data_dropped() {
    let (client, mut rx) = build_client();

    let future = client.async_get("user:1", Arc::new(StringCodec)).unwrap();
    let mut op = rx.recv().await.unwrap();
    op.payload(utf8_payload("user:2", "bob"));
    op.finish(OperationStatus::success());

    // The operation still completes; only the mismatched data is discarded.
    let result = future.wait().await;
    assert!(result.is_success());
    assert_eq!(result.value, None);
    assert!(logs_contain("wrong key returned"));
}

#[tokio::test]
#[traced_test]
async fn test_get_decode_failure_is_a_miss() {
    let (client, mut rx) = build_client();

    let future = client.async_get("user:1", Arc::new(StringCodec)).unwrap();
    let mut op = rx.recv().await.unwrap();
    op.payload(OpPayload::Value {
        key: "user:1".to_string(),
        flags: FLAG_UTF8,
        data: vec![0xff, 0xfe],
    });
    op.finish(OperationStatus::success());

    let result = future.wait().await;
    assert_eq!(result.value, None);
    assert!(logs_contain("failed to decode"));
}

#[tokio::test]
async fn test_get_invalid_key_fails_synchronously() {
    let (client, mut rx) = build_client();

    let result = client.async_get("bad key", Arc::new(StringCodec));
    assert!(matches!(result, Err(Error::Key(_))));
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn test_get_and_touch_returns_value_and_cas() {
    let (client, mut rx) = build_client();

    let future = client
        .async_get_and_touch("user:1", 300, Arc::new(StringCodec))
        .unwrap();
    let mut op = rx.recv().await.unwrap();
    op.payload(OpPayload::ValueCas {
        key: "user:1".to_string(),
        cas: 99,
        flags: FLAG_UTF8,
        data: b"alice".to_vec(),
    });
    op.finish(OperationStatus::success());

    let result = future.wait().await;
    assert!(result.is_success());
    let cas_value = result.value.unwrap();
    assert_eq!(cas_value.cas, 99);
    assert_eq!(cas_value.value, "alice");
    assert_eq!(result.cas, Some(99));
}

#[tokio::test]
#[traced_test]
async fn test_get_and_touch_wrong_key_only_warns() {
    let (client, mut rx) = build_client();

    let future = client
        .async_get_and_touch("user:1", 300, Arc::new(StringCodec))
        .unwrap();
    let mut op = rx.recv().await.unwrap();
    op.payload(OpPayload::ValueCas {
        key: "user:2".to_string(),
        cas: 7,
        flags: FLAG_UTF8,
        data: b"bob".to_vec(),
    });
    op.finish(OperationStatus::success());

    // Downgraded to a warning; the data is still used.
    let result = future.wait().await;
    assert_eq!(result.value.map(|v| v.value), Some("bob".to_string()));
    assert!(logs_contain("wrong key returned"));
}

#[tokio::test]
async fn test_get_payload_and_expiration_reach_the_transport() {
    let (client, mut rx) = build_client();

    let _future = client
        .async_get_and_touch("user:1", 600, Arc::new(StringCodec))
        .unwrap();
    let op = rx.recv().await.unwrap();
    match &op.op.command {
        crate::operation::OpCommand::GetAndTouch { key, expiration } => {
            assert_eq!(key, "user:1");
            assert_eq!(*expiration, 600);
        }
        other => panic!("unexpected command: {other:?}"),
    }
}

#[tokio::test]
async fn test_raw_payload_codec() {
    use crate::codec::RawCodec;

    let (client, mut rx) = build_client();
    let future = client.async_get("blob:1", Arc::new(RawCodec)).unwrap();
    let mut op = rx.recv().await.unwrap();
    op.payload(OpPayload::Value {
        key: "blob:1".to_string(),
        flags: 9,
        data: vec![1, 2, 3],
    });
    op.finish(OperationStatus::success());

    let result = future.wait().await;
    assert_eq!(result.value, Some(CachedPayload::new(9, vec![1, 2, 3])));
}
