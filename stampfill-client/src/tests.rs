use reqwest::StatusCode;
use stampfill_test::node::BatchState;
use stampfill_test::server::TestServer;

use super::*;

const BATCH: &str = "b7f8691f430db68104e5c92b8aaf2041bd99749fc1aeba44db77ab0a014b614b";

fn batch_id() -> BatchId {
    BATCH.parse().unwrap()
}

#[test]
fn rejects_empty_batch_ids() {
    assert!(matches!(BatchId::new(""), Err(Error::InvalidBatchId(_))));
    assert!(matches!("  ".parse::<BatchId>(), Err(Error::InvalidBatchId(_))));
    assert_eq!(batch_id().as_str(), BATCH);
}

#[test]
fn deserializes_batch_and_ignores_unknown_fields() {
    let json = r#"{
        "batchID": "cafe",
        "utilization": 3,
        "expired": false,
        "usable": true,
        "depth": 20,
        "bucketDepth": 16,
        "batchTTL": 86400
    }"#;

    let batch: Batch = serde_json::from_str(json).unwrap();
    assert_eq!(batch.batch_id.as_str(), "cafe");
    assert_eq!(batch.utilization, 3);
    assert!(!batch.expired);
    assert!(batch.usable);
    assert!(!batch.is_full());
}

#[test]
fn empty_batch_id_in_response_is_rejected() {
    let json = r#"{"batchID": "", "utilization": 0, "expired": false, "usable": true}"#;
    assert!(serde_json::from_str::<Batch>(json).is_err());
}

#[test]
fn full_at_max_utilization() {
    let mut batch = Batch::placeholder(batch_id());
    assert!(!batch.usable);
    assert!(!batch.is_full());

    batch.utilization = MAX_UTILIZATION - 1;
    assert!(!batch.is_full());
    batch.utilization = MAX_UTILIZATION;
    assert!(batch.is_full());
    batch.utilization = MAX_UTILIZATION + 1;
    assert!(!batch.is_full());
}

#[test]
fn invalid_url_fails_on_build() {
    let result = Client::builder("not a url").build();
    assert!(matches!(result, Err(Error::Reqwest(_))));
}

#[tokio::test]
async fn fetches_batch_state() {
    let server = TestServer::new().await;
    server
        .node()
        .script_batch(BATCH, [BatchState::pending(), BatchState::usable(4)]);

    let client = Client::builder(server.url("/")).build().unwrap();

    let first = client.batch(&batch_id()).await.unwrap();
    assert_eq!(first.batch_id, batch_id());
    assert!(!first.usable);

    let second = client.batch(&batch_id()).await.unwrap();
    assert!(second.usable);
    assert_eq!(second.utilization, 4);
    assert!(!second.expired);

    assert_eq!(server.node().polls(BATCH), 2);
}

#[tokio::test]
async fn unknown_batch_reports_node_message() {
    let server = TestServer::new().await;
    let client = Client::builder(server.url("/")).build().unwrap();

    let err = client.batch(&batch_id()).await.unwrap_err();
    let Error::UnexpectedStatus { status, message } = err else {
        panic!("expected status error, got {err:?}");
    };
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(message, "issuer does not exist");
}

#[tokio::test]
async fn malformed_batch_body_is_an_error() {
    let server = TestServer::new().await;
    server.node().malformed_stamps(BATCH);
    let client = Client::builder(server.url("/")).build().unwrap();

    let err = client.batch(&batch_id()).await.unwrap_err();
    assert!(matches!(err, Error::Reqwest(ref e) if e.is_decode()), "{err:?}");
}

#[tokio::test]
async fn uploads_with_postage_headers() {
    let server = TestServer::new().await;
    server.node().script_batch(BATCH, [BatchState::usable(0)]);
    let client = Client::builder(server.url("/")).build().unwrap();

    let response = client
        .upload(vec![7u8; 4096])
        .batch(&batch_id())
        .encrypt(true)
        .deferred(false)
        .send()
        .await
        .unwrap();
    assert!(!response.reference.as_str().is_empty());

    let uploads = server.node().uploads();
    assert_eq!(uploads.len(), 1);
    let upload = &uploads[0];
    assert_eq!(upload.batch_id.as_deref(), Some(BATCH));
    assert_eq!(
        upload.content_type.as_deref(),
        Some("application/octet-stream")
    );
    assert_eq!(upload.encrypt.as_deref(), Some("true"));
    assert_eq!(upload.deferred.as_deref(), Some("false"));
    assert_eq!(upload.len, 4096);
}

#[tokio::test]
async fn upload_options_are_forwarded() {
    let server = TestServer::new().await;
    server.node().script_batch(BATCH, [BatchState::usable(0)]);
    let client = Client::builder(server.url("/")).build().unwrap();

    let options = UploadOptions {
        encrypt: false,
        deferred: true,
    };
    client
        .upload("oh hai!")
        .batch(&batch_id())
        .options(options)
        .send()
        .await
        .unwrap();

    let upload = &server.node().uploads()[0];
    assert_eq!(upload.encrypt.as_deref(), Some("false"));
    assert_eq!(upload.deferred.as_deref(), Some("true"));
}

#[tokio::test]
async fn failed_upload_reports_status() {
    let server = TestServer::new().await;
    server.node().script_batch(BATCH, [BatchState::usable(0)]);
    server
        .node()
        .fail_upload(BATCH, 1, StatusCode::PAYMENT_REQUIRED);
    let client = Client::builder(server.url("/")).build().unwrap();

    let err = client
        .upload("oh hai!")
        .batch(&batch_id())
        .send()
        .await
        .unwrap_err();
    assert!(
        matches!(err, Error::UnexpectedStatus { status, .. } if status == StatusCode::PAYMENT_REQUIRED)
    );
    assert!(server.node().uploads().is_empty());
}

#[tokio::test]
async fn upload_requires_batch() {
    let server = TestServer::new().await;
    let client = Client::builder(server.url("/")).build().unwrap();

    let err = client.upload("oh hai!").send().await.unwrap_err();
    assert!(matches!(err, Error::MissingBatch));
}

#[tokio::test]
async fn respects_path_prefix() {
    let client = Client::builder("http://localhost:1635/api/").build().unwrap();
    let request = client
        .request(reqwest::Method::GET, &["stamps", BATCH])
        .unwrap()
        .build()
        .unwrap();
    assert_eq!(
        request.url().as_str(),
        format!("http://localhost:1635/api/stamps/{BATCH}")
    );
}
