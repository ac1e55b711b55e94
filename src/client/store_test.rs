use tokio::sync::mpsc::UnboundedReceiver;

use crate::client::CacheClient;
use crate::codec::Codec;
use crate::codec::StringCodec;
use crate::codec::FLAG_UTF8;
use crate::errors::CodecError;
use crate::errors::Error;
use crate::operation::CompletionLatch;
use crate::operation::OpCommand;
use crate::operation::OpPayload;
use crate::operation::OperationStatus;
use crate::operation::StatusCode;
use crate::operation::StoreKind;
use crate::test_utils::ScriptedTransport;
use crate::test_utils::SubmittedOp;

fn build_client() -> (CacheClient, UnboundedReceiver<SubmittedOp>) {
    let (transport, rx) = ScriptedTransport::new();
    let client = CacheClient::builder(transport).app_name("test_app").build();
    (client, rx)
}

#[tokio::test]
async fn test_set_success_with_cas() {
    let (client, mut rx) = build_client();

    let future = client
        .set("user:1", 300, &"alice".to_string(), &StringCodec, None)
        .unwrap();
    let mut op = rx.recv().await.unwrap();
    match &op.op.command {
        OpCommand::Store {
            kind,
            key,
            flags,
            expiration,
            data,
        } => {
            assert_eq!(*kind, StoreKind::Set);
            assert_eq!(key, "user:1");
            assert_eq!(*flags, FLAG_UTF8);
            assert_eq!(*expiration, 300);
            assert_eq!(data, b"alice");
        }
        other => panic!("unexpected command: {other:?}"),
    }

    op.payload(OpPayload::Cas(17));
    op.finish(OperationStatus::success());

    let result = future.wait().await;
    assert_eq!(result.value, Some(true));
    assert_eq!(result.cas, Some(17));
}

#[tokio::test]
async fn test_rejected_store_reports_false_not_error() {
    let (client, mut rx) = build_client();

    let future = client
        .replace("user:1", 300, &"alice".to_string(), &StringCodec, None)
        .unwrap();
    let op = rx.recv().await.unwrap();
    op.finish(OperationStatus::new(StatusCode::NotStored, "not stored"));

    let result = future.wait().await;
    assert_eq!(result.value, Some(false));
    assert_eq!(result.status.code, StatusCode::NotStored);
}

#[tokio::test]
async fn test_add_command_kind() {
    let (client, mut rx) = build_client();

    let _future = client
        .add("user:1", 0, &"alice".to_string(), &StringCodec, None)
        .unwrap();
    let op = rx.recv().await.unwrap();
    assert!(matches!(
        op.op.command,
        OpCommand::Store {
            kind: StoreKind::Add,
            ..
        }
    ));
}

#[tokio::test]
async fn test_delete_resolves_boolean() {
    let (client, mut rx) = build_client();

    let future = client.delete("user:1", None).unwrap();
    let mut op = rx.recv().await.unwrap();
    assert!(matches!(op.op.command, OpCommand::Delete { .. }));

    op.payload(OpPayload::Cas(3));
    op.finish(OperationStatus::success());

    let result = future.wait().await;
    assert_eq!(result.value, Some(true));
    assert_eq!(result.cas, Some(3));
}

#[tokio::test]
async fn test_touch_carries_expiration() {
    let (client, mut rx) = build_client();

    let future = client.touch("user:1", 900, None).unwrap();
    let op = rx.recv().await.unwrap();
    match &op.op.command {
        OpCommand::Touch { key, expiration } => {
            assert_eq!(key, "user:1");
            assert_eq!(*expiration, 900);
        }
        other => panic!("unexpected command: {other:?}"),
    }
    op.finish(OperationStatus::new(StatusCode::NotFound, "not found"));

    let result = future.wait().await;
    assert_eq!(result.value, Some(false));
}

#[tokio::test]
async fn test_write_latch_signaled_by_store() {
    let (client, mut rx) = build_client();
    let latch = CompletionLatch::new(1);

    let _future = client
        .set("user:1", 300, &"alice".to_string(), &StringCodec, Some(&latch))
        .unwrap();
    assert_eq!(latch.registered_count(), 1);
    assert!(!latch.is_satisfied());

    let op = rx.recv().await.unwrap();
    op.finish(OperationStatus::success());
    assert!(latch.is_satisfied());
}

#[tokio::test]
async fn test_write_only_client_skips_latch() {
    let (transport, mut rx) = ScriptedTransport::new();
    let client = CacheClient::builder(transport).write_only(true).build();
    let latch = CompletionLatch::new(1);

    let _future = client
        .set("user:1", 300, &"alice".to_string(), &StringCodec, Some(&latch))
        .unwrap();
    assert_eq!(latch.registered_count(), 0);

    let op = rx.recv().await.unwrap();
    op.finish(OperationStatus::success());
    assert!(!latch.is_satisfied());
}

#[tokio::test]
async fn test_encode_failure_fails_synchronously() {
    struct FailingCodec;
    impl Codec<String> for FailingCodec {
        fn encode(&self, _: &String) -> Result<crate::codec::CachedPayload, CodecError> {
            Err(CodecError::Encode("boom".into()))
        }
        fn decode(&self, _: &crate::codec::CachedPayload) -> Result<String, CodecError> {
            unreachable!()
        }
    }

    let (client, mut rx) = build_client();
    let result = client.set("user:1", 0, &"v".to_string(), &FailingCodec, None);
    assert!(matches!(result, Err(Error::Codec(_))));
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn test_rejected_submission_surfaces_transport_error() {
    let (transport, _rx) = ScriptedTransport::new();
    let client = CacheClient::builder(transport.clone()).build();
    transport.reject_submits(true);

    let result = client.set("user:1", 0, &"v".to_string(), &StringCodec, None);
    assert!(matches!(result, Err(Error::Transport(_))));
}
