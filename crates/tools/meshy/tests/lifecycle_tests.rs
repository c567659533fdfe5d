//! Integration tests for the submit / poll / list lifecycle
//!
//! A scripted transport stands in for the Meshy API: it hands out canned
//! responses in order and records every request it receives.

use async_trait::async_trait;
use meshy::transport::{FormPart, Headers};
use meshy::{
    ApiKey, BinaryPayload, ClientConfig, HttpResponse, ImageTo3DRequest, JobFamily, ListQuery,
    MeshyClient, MeshyError, PreviewRequest, RefineRequest, RequestBody, SortOrder, Status,
    TaskCache, TaskRef, TaskRequest, TextureRequest, Transport,
};
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone)]
struct RecordedRequest {
    method: &'static str,
    url: String,
    headers: Headers,
    body: Option<RequestBody>,
}

/// Replays scripted responses; once the script runs out the last response
/// repeats forever
#[derive(Default)]
struct ScriptedTransport {
    script: Mutex<VecDeque<HttpResponse>>,
    last: Mutex<Option<HttpResponse>>,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl ScriptedTransport {
    fn new(responses: impl IntoIterator<Item = HttpResponse>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(responses.into_iter().collect()),
            ..Default::default()
        })
    }

    fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    fn remaining(&self) -> usize {
        self.script.lock().unwrap().len()
    }

    fn respond(&self, request: RecordedRequest) -> HttpResponse {
        self.requests.lock().unwrap().push(request);
        let next = self.script.lock().unwrap().pop_front();
        let mut last = self.last.lock().unwrap();
        if let Some(response) = next {
            *last = Some(response);
        }
        last.clone().expect("script is empty")
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn get(&self, url: &str, headers: &Headers) -> meshy::Result<HttpResponse> {
        Ok(self.respond(RecordedRequest {
            method: "GET",
            url: url.to_string(),
            headers: headers.clone(),
            body: None,
        }))
    }

    async fn post(
        &self,
        url: &str,
        headers: &Headers,
        body: RequestBody,
    ) -> meshy::Result<HttpResponse> {
        Ok(self.respond(RecordedRequest {
            method: "POST",
            url: url.to_string(),
            headers: headers.clone(),
            body: Some(body),
        }))
    }
}

fn test_config() -> ClientConfig {
    ClientConfig::default()
        .with_polling_interval(Duration::from_millis(1))
        .with_rate_limit_backoff(Duration::from_millis(1))
}

fn client(transport: &Arc<ScriptedTransport>) -> MeshyClient {
    MeshyClient::with_transport(
        transport.clone(),
        Some(ApiKey::new("msy_test_key").unwrap()),
        test_config(),
    )
    .unwrap()
}

fn created(id: &str) -> HttpResponse {
    HttpResponse::new(202, json!({ "result": id }).to_string())
}

fn task(id: &str, status: &str, progress: u8) -> Value {
    json!({ "id": id, "status": status, "progress": progress })
}

fn ok(value: Value) -> HttpResponse {
    HttpResponse::new(200, value.to_string())
}

fn rate_limited() -> HttpResponse {
    HttpResponse::new(429, "{\"message\":\"Too many requests\"}")
}

fn json_body(request: &RecordedRequest) -> Value {
    match &request.body {
        Some(RequestBody::Json(body)) => serde_json::from_str(body).unwrap(),
        other => panic!("expected JSON body, got {:?}", other),
    }
}

#[tokio::test]
async fn test_texture_without_model_never_reaches_network() {
    let transport = ScriptedTransport::new([]);
    let client = client(&transport);

    let request: TaskRequest = TextureRequest::new("A lantern", "Rusty iron").into();
    let err = client.submit(&request).await.unwrap_err();

    match err {
        MeshyError::Validation(message) => assert!(message.contains("model")),
        other => panic!("unexpected error: {other}"),
    }
    assert!(transport.requests().is_empty());
}

#[tokio::test]
async fn test_missing_api_key_never_reaches_network() {
    let transport = ScriptedTransport::new([created("never")]);
    let client = MeshyClient::with_transport(transport.clone(), None, test_config()).unwrap();

    let err = client
        .submit(&PreviewRequest::new("A lantern").into())
        .await
        .unwrap_err();

    assert!(matches!(err, MeshyError::Authentication(_)));
    assert!(transport.requests().is_empty());
}

#[tokio::test]
async fn test_preview_then_refine() {
    let mut preview_done = task("prev-1", "SUCCEEDED", 100);
    preview_done["mode"] = json!("preview");
    preview_done["model_urls"] = json!({ "glb": "https://assets.meshy.ai/prev-1.glb" });

    let mut refine_done = task("ref-1", "SUCCEEDED", 100);
    refine_done["mode"] = json!("refine");
    refine_done["model_urls"] = json!({
        "glb": "https://assets.meshy.ai/ref-1.glb",
        "fbx": "https://assets.meshy.ai/ref-1.fbx"
    });
    refine_done["texture_urls"] = json!([{ "base_color": "https://assets.meshy.ai/ref-1.png" }]);

    let transport = ScriptedTransport::new([
        created("prev-1"),
        ok(task("prev-1", "IN_PROGRESS", 40)),
        ok(preview_done),
        created("ref-1"),
        ok(refine_done),
    ]);
    let client = client(&transport);
    let cancel = CancellationToken::new();

    let mut seen = Vec::new();
    let preview = client
        .submit_and_poll(
            &PreviewRequest::new("A lantern").into(),
            |r| seen.push((r.status, r.progress)),
            &cancel,
        )
        .await
        .unwrap();
    assert_eq!(preview.status, Status::Succeeded);
    assert_eq!(
        seen,
        vec![(Status::InProgress, 40), (Status::Succeeded, 100)]
    );

    let refine = RefineRequest::from_preview(&preview).unwrap();
    let refined = client
        .submit_and_poll(&refine.into(), |_| {}, &cancel)
        .await
        .unwrap();

    let urls = refined.model_urls.unwrap();
    assert!(!urls.is_empty());
    assert!(urls.glb.is_some_and(|glb| !glb.is_empty()));
    assert_eq!(refined.texture_urls.len(), 1);

    let requests = transport.requests();
    assert_eq!(requests.len(), 5);
    assert_eq!(requests[0].method, "POST");
    assert_eq!(requests[0].url, "https://api.meshy.ai/v2/text-to-3d");
    assert_eq!(json_body(&requests[0])["mode"], "preview");
    assert_eq!(requests[1].url, "https://api.meshy.ai/v2/text-to-3d/prev-1");

    let refine_body = json_body(&requests[3]);
    assert_eq!(refine_body["mode"], "refine");
    assert_eq!(refine_body["preview_task_id"], "prev-1");
    assert_eq!(requests[4].url, "https://api.meshy.ai/v2/text-to-3d/ref-1");
}

#[tokio::test]
async fn test_rate_limiting_is_invisible_to_progress() {
    let transport = ScriptedTransport::new([
        rate_limited(),
        rate_limited(),
        rate_limited(),
        ok(task("t-1", "PENDING", 0)),
        ok(task("t-1", "SUCCEEDED", 100)),
    ]);
    let client = client(&transport);

    let mut calls = 0;
    let result = client
        .poll(
            &TaskRef::new(JobFamily::Texture, "t-1"),
            |_| calls += 1,
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(result.status, Status::Succeeded);
    assert_eq!(calls, 2);
    assert_eq!(transport.requests().len(), 5);
}

fn assert_remote_429(err: MeshyError) {
    match err {
        MeshyError::Remote { status, body } => {
            assert_eq!(status, 429);
            assert!(body.contains("Too many requests"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_submit_reports_rate_limit_as_remote_error() {
    let transport = ScriptedTransport::new([rate_limited(), created("late")]);
    let client = client(&transport);

    let err = client
        .submit(&PreviewRequest::new("A lantern").into())
        .await
        .unwrap_err();

    assert!(!err.is_retryable());
    assert_remote_429(err);
    assert_eq!(transport.requests().len(), 1);
}

#[tokio::test]
async fn test_single_requests_report_rate_limit_as_remote_error() {
    let transport = ScriptedTransport::new([rate_limited()]);
    let client = client(&transport);

    let err = client
        .retrieve(&TaskRef::new(JobFamily::Texture, "t-1"))
        .await
        .unwrap_err();
    assert_remote_429(err);

    let err = client
        .list(JobFamily::Texture, &ListQuery::new())
        .await
        .unwrap_err();
    assert_remote_429(err);

    assert_remote_429(client.credit_balance().await.unwrap_err());
    assert_eq!(transport.requests().len(), 3);
}

#[tokio::test]
async fn test_list_returns_server_order() {
    // 15 tasks on the server, newest first; the requested page holds 12
    let all: Vec<Value> = (0..15)
        .map(|i| {
            let mut t = task(&format!("tex-{i:02}"), "SUCCEEDED", 100);
            t["created_at"] = json!(1_700_000_000_000i64 + i * 1000);
            t["object_prompt"] = json!(format!("Object {i}"));
            t
        })
        .rev()
        .collect();
    let page: Vec<Value> = all.iter().take(12).cloned().collect();

    let transport = ScriptedTransport::new([ok(Value::Array(page))]);
    let client = client(&transport);

    let query = ListQuery::new()
        .page(1)
        .page_size(12)
        .sort(SortOrder::Descending);
    let tasks = client.list(JobFamily::Texture, &query).await.unwrap();

    assert_eq!(tasks.len(), 12);
    assert_eq!(tasks[0].id.as_str(), "tex-14");
    assert_eq!(tasks[11].id.as_str(), "tex-03");
    assert!(tasks
        .windows(2)
        .all(|pair| pair[0].created_at > pair[1].created_at));
    assert_eq!(tasks[0].display_prompt(), Some("Object 14"));

    let requests = transport.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].method, "GET");
    assert_eq!(
        requests[0].url,
        "https://api.meshy.ai/v1/text-to-texture?pageNum=1&pageSize=12&sortBy=-created_at"
    );
}

#[tokio::test]
async fn test_image_listing_is_unsupported() {
    let transport = ScriptedTransport::new([ok(json!([]))]);
    let client = client(&transport);

    let err = client
        .list(JobFamily::ImageTo3D, &ListQuery::new())
        .await
        .unwrap_err();

    assert!(matches!(err, MeshyError::Unsupported(_)));
    assert!(transport.requests().is_empty());
}

#[tokio::test]
async fn test_file_upload_uses_multipart_only() {
    let transport = ScriptedTransport::new([created("img-1")]);
    let client = client(&transport);

    let payload = BinaryPayload::new("fox.png", vec![0x89, b'P', b'N', b'G']);
    let task = client
        .submit(&ImageTo3DRequest::from_file(payload).into())
        .await
        .unwrap();
    assert_eq!(task, TaskRef::new(JobFamily::ImageTo3D, "img-1"));

    let requests = transport.requests();
    assert_eq!(requests[0].url, "https://api.meshy.ai/v1/image-to-3d");
    let form = match &requests[0].body {
        Some(RequestBody::Multipart(form)) => form,
        other => panic!("expected multipart body, got {:?}", other),
    };
    let files: Vec<&str> = form
        .parts()
        .iter()
        .filter_map(|part| match part {
            FormPart::File { name, .. } => Some(name.as_str()),
            FormPart::Text { .. } => None,
        })
        .collect();
    assert_eq!(files, vec!["image_file"]);
    assert_eq!(form.text_value("enable_pbr"), Some("true"));
    assert_eq!(form.text_value("image_url"), None);
}

#[tokio::test]
async fn test_url_reference_uses_json_only() {
    let transport = ScriptedTransport::new([created("tex-1")]);
    let client = client(&transport);

    let request = TextureRequest::new("A lantern", "Rusty iron")
        .with_model_url("https://example.com/lantern.glb");
    client.submit(&request.into()).await.unwrap();

    let requests = transport.requests();
    assert_eq!(requests[0].url, "https://api.meshy.ai/v1/text-to-texture");
    let body = json_body(&requests[0]);
    assert_eq!(body["model_url"], "https://example.com/lantern.glb");
    assert_eq!(body["object_prompt"], "A lantern");
    assert!(body.get("model_file").is_none());
    assert!(body.get("negative_prompt").is_none());
}

#[tokio::test]
async fn test_requests_carry_credentials() {
    let transport = ScriptedTransport::new([ok(task("t-1", "SUCCEEDED", 100))]);
    let client = client(&transport);

    client
        .retrieve(&TaskRef::new(JobFamily::TextTo3DLegacy, "t-1"))
        .await
        .unwrap();

    let request = &transport.requests()[0];
    assert_eq!(request.url, "https://api.meshy.ai/v1/text-to-3d/t-1");
    let header = |name: &str| {
        request
            .headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.clone())
    };
    assert_eq!(header("authorization").as_deref(), Some("Bearer msy_test_key"));
    assert!(header("user-agent").is_some_and(|ua| ua.starts_with("meshy-rs/")));
}

#[tokio::test]
async fn test_blank_task_id_is_protocol_error() {
    let transport = ScriptedTransport::new([created("   ")]);
    let client = client(&transport);

    let err = client
        .submit(&PreviewRequest::new("A lantern").into())
        .await
        .unwrap_err();

    assert!(matches!(err, MeshyError::Protocol(_)));
    assert_eq!(transport.requests().len(), 1);
}

#[tokio::test]
async fn test_malformed_snapshot_is_protocol_error() {
    let transport = ScriptedTransport::new([HttpResponse::new(200, "<html>oops</html>")]);
    let client = client(&transport);

    let err = client
        .poll(
            &TaskRef::new(JobFamily::Texture, "t-1"),
            |_| {},
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, MeshyError::Protocol(_)));
}

#[tokio::test]
async fn test_server_error_ends_polling() {
    let transport = ScriptedTransport::new([
        ok(task("t-1", "IN_PROGRESS", 10)),
        HttpResponse::new(500, "{\"message\":\"Internal error\"}"),
        ok(task("t-1", "SUCCEEDED", 100)),
    ]);
    let client = client(&transport);

    let mut calls = 0;
    let err = client
        .poll(
            &TaskRef::new(JobFamily::Texture, "t-1"),
            |_| calls += 1,
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

    match err {
        MeshyError::Remote { status, body } => {
            assert_eq!(status, 500);
            assert!(body.contains("Internal error"));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(calls, 1);
    assert_eq!(transport.requests().len(), 2);
    assert_eq!(transport.remaining(), 1);
}

#[tokio::test]
async fn test_no_polling_after_terminal_status() {
    let mut failed = task("t-1", "FAILED", 30);
    failed["task_error"] = json!({ "message": "Model could not be processed" });

    let transport = ScriptedTransport::new([ok(failed), ok(task("t-1", "SUCCEEDED", 100))]);
    let client = client(&transport);

    let result = client
        .poll(
            &TaskRef::new(JobFamily::Texture, "t-1"),
            |_| {},
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(result.status, Status::Failed);
    assert_eq!(result.error_message(), Some("Model could not be processed"));
    assert_eq!(transport.requests().len(), 1);
    assert_eq!(transport.remaining(), 1);
}

#[tokio::test]
async fn test_status_regression_is_passed_through() {
    let transport = ScriptedTransport::new([
        ok(task("t-1", "IN_PROGRESS", 20)),
        ok(task("t-1", "PENDING", 0)),
        ok(task("t-1", "SUCCEEDED", 100)),
    ]);
    let client = client(&transport);

    let mut statuses = Vec::new();
    client
        .poll(
            &TaskRef::new(JobFamily::Texture, "t-1"),
            |r| statuses.push(r.status),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(
        statuses,
        vec![Status::InProgress, Status::Pending, Status::Succeeded]
    );
}

#[tokio::test]
async fn test_cancelled_before_first_poll() {
    let transport = ScriptedTransport::new([ok(task("t-1", "SUCCEEDED", 100))]);
    let client = client(&transport);

    let cancel = CancellationToken::new();
    cancel.cancel();
    let err = client
        .poll(&TaskRef::new(JobFamily::Texture, "t-1"), |_| {}, &cancel)
        .await
        .unwrap_err();

    assert!(matches!(err, MeshyError::Cancelled));
    assert!(transport.requests().is_empty());
}

#[tokio::test]
async fn test_spawned_poll_can_be_cancelled() {
    let transport = ScriptedTransport::new([ok(task("t-1", "IN_PROGRESS", 5))]);
    let client = client(&transport);

    let mut handle = client.spawn_poll(TaskRef::new(JobFamily::Texture, "t-1"));
    let first = handle.next_snapshot().await.unwrap();
    assert_eq!(first.status, Status::InProgress);

    handle.cancel();
    assert!(handle.is_cancelled());
    let err = handle.await_result().await.unwrap_err();
    assert!(matches!(err, MeshyError::Cancelled));
}

#[tokio::test]
async fn test_dropped_handle_stops_polling() {
    let transport = ScriptedTransport::new([ok(task("t-1", "IN_PROGRESS", 5))]);
    let client = client(&transport);

    let mut handle = client.spawn_poll(TaskRef::new(JobFamily::Texture, "t-1"));
    handle.next_snapshot().await.unwrap();
    drop(handle);

    tokio::time::sleep(Duration::from_millis(50)).await;
    let settled = transport.requests().len();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(transport.requests().len(), settled);
}

#[tokio::test]
async fn test_await_result_timeout_cancels_poll() {
    let transport = ScriptedTransport::new([ok(task("t-1", "IN_PROGRESS", 5))]);
    let client = client(&transport);

    let timeout = Duration::from_millis(20);
    let handle = client.spawn_poll(TaskRef::new(JobFamily::Texture, "t-1"));
    let err = handle.await_result_timeout(timeout).await.unwrap_err();
    match err {
        MeshyError::TimeoutError(elapsed) => assert_eq!(elapsed, timeout),
        other => panic!("unexpected error: {other}"),
    }

    tokio::time::sleep(Duration::from_millis(20)).await;
    let settled = transport.requests().len();
    assert!(settled >= 1);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(transport.requests().len(), settled);
}

/// Accepts requests and never answers them
#[derive(Default)]
struct HangingTransport {
    calls: AtomicUsize,
}

#[async_trait]
impl Transport for HangingTransport {
    async fn get(&self, _url: &str, _headers: &Headers) -> meshy::Result<HttpResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        std::future::pending().await
    }

    async fn post(
        &self,
        _url: &str,
        _headers: &Headers,
        _body: RequestBody,
    ) -> meshy::Result<HttpResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        std::future::pending().await
    }
}

fn cancel_after(cancel: &CancellationToken, delay: Duration) {
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        trigger.cancel();
    });
}

#[tokio::test]
async fn test_cancel_interrupts_pending_request() {
    let transport = Arc::new(HangingTransport::default());
    let client = MeshyClient::with_transport(
        transport.clone(),
        Some(ApiKey::new("msy_test_key").unwrap()),
        test_config(),
    )
    .unwrap();

    let cancel = CancellationToken::new();
    cancel_after(&cancel, Duration::from_millis(20));
    let mut calls = 0;
    let err = tokio::time::timeout(
        Duration::from_secs(5),
        client.poll(&TaskRef::new(JobFamily::Texture, "t-1"), |_| calls += 1, &cancel),
    )
    .await
    .expect("poll ignored cancellation")
    .unwrap_err();

    assert!(matches!(err, MeshyError::Cancelled));
    assert_eq!(transport.calls.load(Ordering::SeqCst), 1);
    assert_eq!(calls, 0);
}

#[tokio::test]
async fn test_cancel_interrupts_rate_limit_backoff() {
    let transport = ScriptedTransport::new([rate_limited()]);
    let client = MeshyClient::with_transport(
        transport.clone(),
        Some(ApiKey::new("msy_test_key").unwrap()),
        test_config().with_rate_limit_backoff(Duration::from_secs(3600)),
    )
    .unwrap();

    let cancel = CancellationToken::new();
    cancel_after(&cancel, Duration::from_millis(20));
    let mut calls = 0;
    let err = tokio::time::timeout(
        Duration::from_secs(5),
        client.poll(&TaskRef::new(JobFamily::Texture, "t-1"), |_| calls += 1, &cancel),
    )
    .await
    .expect("poll ignored cancellation")
    .unwrap_err();

    assert!(matches!(err, MeshyError::Cancelled));
    assert_eq!(transport.requests().len(), 1);
    assert_eq!(calls, 0);
}

#[tokio::test]
async fn test_blank_retrieve_id_never_reaches_network() {
    let transport = ScriptedTransport::new([ok(task("t-1", "SUCCEEDED", 100))]);
    let client = client(&transport);
    let blank = TaskRef::new(JobFamily::TextTo3DPreview, "");

    let err = client.retrieve(&blank).await.unwrap_err();
    assert!(matches!(err, MeshyError::Validation(_)));

    let err = client
        .poll(&blank, |_| {}, &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, MeshyError::Validation(_)));

    assert!(transport.requests().is_empty());
}

#[tokio::test]
async fn test_spawned_poll_updates_cache() {
    let listing = json!([
        task("a", "SUCCEEDED", 100),
        task("b", "PENDING", 0),
    ]);
    let mut queued = task("b", "PENDING", 0);
    queued["preceding_tasks"] = json!(2);

    let transport = ScriptedTransport::new([
        ok(listing),
        ok(queued),
        ok(task("b", "IN_PROGRESS", 50)),
        ok(task("b", "SUCCEEDED", 100)),
    ]);
    let client = client(&transport);

    let mut cache = TaskCache::new();
    let tasks = client
        .list(JobFamily::TextTo3DLegacy, &ListQuery::new())
        .await
        .unwrap();
    cache.replace(JobFamily::TextTo3DLegacy, tasks);

    let mut handle = client.spawn_poll(TaskRef::new(JobFamily::TextTo3DLegacy, "b"));
    let mut snapshots = 0;
    while let Some(snapshot) = handle.next_snapshot().await {
        assert!(cache.merge(&snapshot));
        snapshots += 1;
    }
    let result = handle.await_result().await.unwrap();

    assert_eq!(snapshots, 3);
    assert_eq!(result.status, Status::Succeeded);
    let cached = &cache.get(JobFamily::TextTo3DLegacy)[1];
    assert_eq!(cached.id.as_str(), "b");
    assert_eq!(cached.status, Status::Succeeded);
    assert_eq!(cached.progress, 100);
    assert_eq!(cached.preceding_tasks, None);
}

#[tokio::test]
async fn test_account_endpoints() {
    let transport = ScriptedTransport::new([
        ok(json!({ "creditBalance": 950, "freeCreditBalance": 50 })),
        ok(json!({ "tier": "pro", "refillAt": 1_700_000_000_000i64 })),
    ]);
    let client = client(&transport);

    let credits = client.credit_balance().await.unwrap();
    let subscription = client.subscription().await.unwrap();

    assert_eq!(credits.credit_balance, 950);
    assert_eq!(subscription.tier, "pro");
    let urls: Vec<String> = transport.requests().into_iter().map(|r| r.url).collect();
    assert_eq!(
        urls,
        vec![
            "https://api.meshy.ai/v1/me/credits",
            "https://api.meshy.ai/v1/me/tier"
        ]
    );
}
