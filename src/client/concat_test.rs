use tokio::sync::mpsc::UnboundedReceiver;

use crate::client::CacheClient;
use crate::codec::CachedPayload;
use crate::codec::FLAG_UTF8;
use crate::constants::APPEND_OR_ADD_ADD_LEG;
use crate::constants::APPEND_OR_ADD_RETRY_LEG;
use crate::constants::WRITE;
use crate::operation::CompletionLatch;
use crate::operation::ConcatKind;
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

fn payload() -> CachedPayload {
    CachedPayload::new(FLAG_UTF8, b",item".to_vec())
}

fn not_found() -> OperationStatus {
    OperationStatus::new(StatusCode::NotFound, "not found")
}

#[tokio::test]
async fn test_append_against_existing_entry_is_single_leg() {
    let (client, mut rx) = build_client();

    let future = client.append_or_add("list:1", 300, payload(), None).unwrap();
    let op = rx.recv().await.unwrap();
    assert!(matches!(
        op.op.command,
        OpCommand::Concat {
            kind: ConcatKind::Append,
            ..
        }
    ));
    op.finish(OperationStatus::success());

    let result = future.wait().await;
    assert_eq!(result.value, Some(true));
    assert!(result.is_success());
    // No add leg was ever issued.
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn test_append_miss_falls_back_to_add() {
    let (client, mut rx) = build_client();

    let future = client.append_or_add("list:1", 300, payload(), None).unwrap();
    rx.recv().await.unwrap().finish(not_found());

    let mut add = rx.recv().await.unwrap();
    match &add.op.command {
        OpCommand::Store {
            kind,
            key,
            flags,
            expiration,
            data,
        } => {
            assert_eq!(*kind, StoreKind::Add);
            assert_eq!(key, "list:1");
            assert_eq!(*flags, FLAG_UTF8);
            assert_eq!(*expiration, 300);
            assert_eq!(data, b",item");
        }
        other => panic!("unexpected command: {other:?}"),
    }
    add.payload(OpPayload::Cas(11));
    add.finish(OperationStatus::success());

    let result = future.wait().await;
    assert_eq!(result.value, Some(true));
    assert_eq!(result.cas, Some(11));
    assert!(rx.try_recv().is_err());

    let add_counter = client.metrics().event_counter(
        APPEND_OR_ADD_ADD_LEG,
        WRITE,
        Some(&OperationStatus::success()),
        None,
    );
    assert_eq!(add_counter.get(), 1);
}

#[tokio::test]
async fn test_lost_create_race_retries_append_once() {
    let (client, mut rx) = build_client();

    let future = client.append_or_add("list:1", 300, payload(), None).unwrap();
    rx.recv().await.unwrap().finish(not_found());
    rx.recv()
        .await
        .unwrap()
        .finish(OperationStatus::new(StatusCode::Exists, "exists"));

    let retry = rx.recv().await.unwrap();
    assert!(matches!(
        retry.op.command,
        OpCommand::Concat {
            kind: ConcatKind::Append,
            ..
        }
    ));
    retry.finish(OperationStatus::success());

    let result = future.wait().await;
    assert_eq!(result.value, Some(true));
    assert!(result.is_success());
    assert!(rx.try_recv().is_err());

    let retry_counter = client.metrics().event_counter(
        APPEND_OR_ADD_RETRY_LEG,
        WRITE,
        Some(&OperationStatus::success()),
        None,
    );
    assert_eq!(retry_counter.get(), 1);
}

#[tokio::test]
async fn test_failed_retry_is_the_final_outcome() {
    let (client, mut rx) = build_client();

    let future = client.append_or_add("list:1", 300, payload(), None).unwrap();
    rx.recv().await.unwrap().finish(not_found());
    rx.recv()
        .await
        .unwrap()
        .finish(OperationStatus::new(StatusCode::Exists, "exists"));
    rx.recv()
        .await
        .unwrap()
        .finish(OperationStatus::new(StatusCode::NotStored, "not stored"));

    let result = future.wait().await;
    assert_eq!(result.value, Some(false));
    assert_eq!(result.status.code, StatusCode::NotStored);
    // Retry depth is one: no fourth operation.
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn test_composite_signals_latch_exactly_once() {
    let (client, mut rx) = build_client();
    let latch = CompletionLatch::new(1);

    let _future = client
        .append_or_add("list:1", 300, payload(), Some(&latch))
        .unwrap();
    rx.recv().await.unwrap().finish(not_found());
    assert!(!latch.is_satisfied());

    rx.recv()
        .await
        .unwrap()
        .finish(OperationStatus::new(StatusCode::Exists, "exists"));
    assert!(!latch.is_satisfied());

    rx.recv().await.unwrap().finish(OperationStatus::success());
    assert!(latch.is_satisfied());
    assert_eq!(latch.completed_count(), 1);
}
