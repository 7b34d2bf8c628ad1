//! Blocking facade driven from plain threads.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use labellerr_sdk::{
    AnnotationSource, BlockingClient, ClientConfig, ErrorKind, HandleState, JobStatus,
    MockTransport, TimeoutOrigin, UploadRequest,
};

fn blocking_client(transport: &Arc<MockTransport>) -> BlockingClient {
    let mut config = ClientConfig::new("key", "secret");
    config.poll_interval_ms = 20;
    config.transient_retry_delay_ms = 1;
    BlockingClient::from_client_parts(config, transport.clone()).unwrap()
}

fn json_request() -> UploadRequest {
    UploadRequest::new(
        "proj-1",
        "client-1",
        "json",
        AnnotationSource::bytes("ann.json", r#"{"labels":[]}"#),
    )
}

#[test]
fn test_blocking_upload_sync_returns_completed() {
    let transport = Arc::new(MockTransport::new().with_statuses(["queued", "completed"]));
    let client = blocking_client(&transport);

    let result = client
        .upload_sync(&json_request(), Duration::from_secs(5))
        .unwrap();

    assert_eq!(result.status, JobStatus::Completed);
    assert_eq!(transport.status_calls(), 2);
}

#[test]
fn test_blocking_upload_sync_surfaces_processing_failure() {
    let transport = Arc::new(MockTransport::new().with_statuses(["processing", "failed"]));
    let client = blocking_client(&transport);

    let err = client
        .upload_sync(&json_request(), Duration::from_secs(5))
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::ProcessingFailed);
}

#[test]
fn test_blocking_async_handle_caller_timeout_then_result() {
    let transport = Arc::new(
        MockTransport::new().with_statuses(["queued", "queued", "queued", "completed"]),
    );
    let client = blocking_client(&transport);

    let handle = client.upload_async(&json_request()).unwrap();
    let err = handle.result(Duration::from_millis(1)).unwrap_err();
    assert_eq!(err.timeout_origin(), Some(TimeoutOrigin::CallerWait));

    let result = handle.result(Duration::from_secs(5)).unwrap();
    assert_eq!(result.status, JobStatus::Completed);
    assert!(handle.is_done());
    assert!(!handle.cancel());
}

#[test]
fn test_blocking_cancel_stops_background_poll() {
    let transport = Arc::new(MockTransport::new().with_statuses(["processing"]));
    let client = blocking_client(&transport);

    let handle = client.upload_async(&json_request()).unwrap();
    assert!(handle.cancel());
    assert!(matches!(handle.state(), HandleState::Cancelled));

    let err = handle.result(Duration::from_secs(1)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Internal);

    thread::sleep(Duration::from_millis(60));
    let calls = transport.status_calls();
    thread::sleep(Duration::from_millis(80));
    assert_eq!(transport.status_calls(), calls);
}

#[test]
fn test_blocking_handle_shared_across_threads() {
    let transport = Arc::new(MockTransport::new().with_statuses(["queued", "completed"]));
    let client = blocking_client(&transport);
    let handle = client.upload_async(&json_request()).unwrap();

    let waiters: Vec<_> = (0..3)
        .map(|_| {
            let handle = handle.clone();
            thread::spawn(move || handle.result(Duration::from_secs(5)))
        })
        .collect();

    let results: Vec<_> = waiters
        .into_iter()
        .map(|waiter| waiter.join().unwrap().unwrap())
        .collect();
    assert!(results.iter().all(|r| r.completed_at == results[0].completed_at));
    assert_eq!(transport.status_calls(), 2);
}

#[test]
fn test_blocking_close_rejects_further_calls() {
    let transport = Arc::new(MockTransport::new());
    let client = blocking_client(&transport);

    client.close().unwrap();
    let err = client
        .upload_sync(&json_request(), Duration::from_secs(1))
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(transport.total_calls(), 0);
}
