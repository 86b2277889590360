mod common;

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use common::{chat_completion, closed_port_base, write_png, MockServer};
use serde_json::json;
use vlm_bridge::imaging::ImagePreparer;
use vlm_bridge::llm::providers::openai_compatible::{ImageTransport, OpenAiCompatibleProvider};
use vlm_bridge::llm::ProviderConfig;
use vlm_bridge::monitor::{ActiveProbe, NoopProbe, ResourceProbe};
use vlm_bridge::sidecar::ImageServer;
use vlm_bridge::{ModelError, VisionModel};

fn provider(base: &str, scratch: &std::path::Path) -> OpenAiCompatibleProvider {
    let cfg = ProviderConfig::new("gpt-4o")
        .with_base_url(format!("{base}/v1/chat/completions"))
        .with_api_key("sk-test")
        .with_temperature(0.3)
        .with_max_tokens(512);
    let preparer = ImagePreparer::new(5 * 1024 * 1024, 2048, scratch.to_path_buf());
    OpenAiCompatibleProvider::new("openai", cfg, ImageTransport::Inline(preparer)).unwrap()
}

#[tokio::test]
async fn sends_prompt_and_inline_images_in_order() {
    let server = MockServer::json(200, chat_completion("Observation: ok")).await;
    let dir = tempfile::tempdir().unwrap();
    let first = dir.path().join("before.png");
    let second = dir.path().join("after.png");
    write_png(&first, 32, 32);
    write_png(&second, 16, 16);

    let model = provider(&server.base, &dir.path().join("scratch"));
    let out = model
        .get_response("describe the change", &[first, second])
        .await;
    assert_eq!(out, Ok("Observation: ok".to_string()));

    let reqs = server.requests();
    assert_eq!(reqs.len(), 1);
    let req = &reqs[0];
    assert_eq!(req.path(), "/v1/chat/completions");
    assert_eq!(req.header("authorization").as_deref(), Some("Bearer sk-test"));

    let body = req.json();
    assert_eq!(body["model"], "gpt-4o");
    assert_eq!(body["max_tokens"], 512);
    assert!((body["temperature"].as_f64().unwrap() - 0.3).abs() < 1e-6);
    let content = body["messages"][0]["content"].as_array().unwrap();
    assert_eq!(body["messages"][0]["role"], "user");
    assert_eq!(content.len(), 3);
    assert_eq!(content[0], json!({"type": "text", "text": "describe the change"}));
    for part in &content[1..] {
        assert_eq!(part["type"], "image_url");
        assert!(part["image_url"]["url"]
            .as_str()
            .unwrap()
            .starts_with("data:image/jpeg;base64,"));
    }
    assert_ne!(content[1], content[2]);
}

#[tokio::test]
async fn no_images_is_a_valid_request() {
    let server = MockServer::json(200, chat_completion("fine")).await;
    let dir = tempfile::tempdir().unwrap();
    let out = provider(&server.base, dir.path()).get_response("hello", &[]).await;
    assert_eq!(out, Ok("fine".to_string()));
    let content = server.requests()[0].json()["messages"][0]["content"].clone();
    assert_eq!(content.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn reasoning_field_rescues_empty_content() {
    let server = MockServer::json(
        200,
        json!({"choices": [{"message": {"content": "", "reasoning": "Decision: SUCCESS"}}]}),
    )
    .await;
    let dir = tempfile::tempdir().unwrap();
    let out = provider(&server.base, dir.path()).get_response("p", &[]).await;
    assert_eq!(out, Ok("Decision: SUCCESS".to_string()));
}

#[tokio::test]
async fn failures_are_classified() {
    let dir = tempfile::tempdir().unwrap();

    let server = MockServer::json(400, json!({"error": {"message": "Invalid image"}})).await;
    let out = provider(&server.base, dir.path()).get_response("p", &[]).await;
    assert_eq!(out, Err(ModelError::ProviderError("Invalid image".into())));

    let server = MockServer::json(200, json!({"object": "chat.completion"})).await;
    let out = provider(&server.base, dir.path()).get_response("p", &[]).await;
    assert!(matches!(out, Err(ModelError::MalformedResponse(_))));

    let server = MockServer::json(200, json!({"choices": [{"message": {"content": ""}}]})).await;
    let out = provider(&server.base, dir.path()).get_response("p", &[]).await;
    assert!(matches!(out, Err(ModelError::EmptyResponse(_))));

    let server = MockServer::respond(502, "text/html", "<html>bad gateway</html>".into()).await;
    let out = provider(&server.base, dir.path()).get_response("p", &[]).await;
    assert!(matches!(out, Err(ModelError::ParseError(_))));

    let out = provider(&closed_port_base(), dir.path()).get_response("p", &[]).await;
    assert!(matches!(out, Err(ModelError::NetworkError(_))));
}

#[tokio::test]
async fn unreadable_image_fails_only_the_request() {
    let server = MockServer::json(200, chat_completion("unused")).await;
    let dir = tempfile::tempdir().unwrap();
    let out = provider(&server.base, dir.path())
        .get_response("p", &[PathBuf::from("/no/such/screenshot.png")])
        .await;
    assert!(matches!(out, Err(ModelError::AdapterError(_))));
    assert!(server.requests().is_empty());
}

#[tokio::test]
async fn timeout_is_reported_within_bound() {
    let server = MockServer::silent().await;
    let cfg = ProviderConfig::new("gpt-4o")
        .with_base_url(format!("{}/v1/chat/completions", server.base))
        .with_timeout(Duration::from_secs(1));
    let dir = tempfile::tempdir().unwrap();
    let preparer = ImagePreparer::new(1024 * 1024, 1024, dir.path().to_path_buf());
    let model = OpenAiCompatibleProvider::new("openai", cfg, ImageTransport::Inline(preparer)).unwrap();

    let started = Instant::now();
    let out = model.get_response("p", &[]).await;
    assert_eq!(out, Err(ModelError::Timeout(1)));
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn served_transport_references_sidecar_urls() {
    let server = MockServer::json(200, chat_completion("ok")).await;
    let root = tempfile::tempdir().unwrap();
    let shot = root.path().join("shot.png");
    write_png(&shot, 8, 8);

    let sidecar = Arc::new(ImageServer::new(18765, root.path()).unwrap());
    let port = sidecar.start().await.unwrap();

    let cfg = ProviderConfig::new("gpt-4o").with_base_url(format!("{}/v1/chat/completions", server.base));
    let model = OpenAiCompatibleProvider::new("openai", cfg, ImageTransport::Served(sidecar.clone())).unwrap();
    assert_eq!(model.get_response("p", &[shot]).await, Ok("ok".to_string()));

    let body = server.requests()[0].json();
    assert_eq!(
        body["messages"][0]["content"][1]["image_url"]["url"],
        format!("http://localhost:{port}/shot.png")
    );
    sidecar.stop().await;
}

#[tokio::test]
async fn concurrent_calls_share_one_adapter() {
    let server = MockServer::json(200, chat_completion("same")).await;
    let dir = tempfile::tempdir().unwrap();
    let model: Arc<dyn VisionModel> = Arc::new(provider(&server.base, dir.path()));

    let calls = (0..4).map(|i| {
        let model = model.clone();
        tokio::spawn(async move { model.get_response(&format!("step {i}"), &[]).await })
    });
    for call in calls.collect::<Vec<_>>() {
        assert_eq!(call.await.unwrap(), Ok("same".to_string()));
    }
    assert_eq!(server.requests().len(), 4);
}

#[derive(Default)]
struct CountingProbe {
    started: Arc<AtomicUsize>,
    stopped: Arc<AtomicUsize>,
}

struct CountingRun {
    stopped: Arc<AtomicUsize>,
}

impl ResourceProbe for CountingProbe {
    fn start(&self) -> Box<dyn ActiveProbe> {
        self.started.fetch_add(1, Ordering::SeqCst);
        Box::new(CountingRun {
            stopped: self.stopped.clone(),
        })
    }
}

impl ActiveProbe for CountingRun {
    fn stop(&mut self) {
        self.stopped.fetch_add(1, Ordering::SeqCst);
    }

    fn summarize(&self) -> String {
        "counted".into()
    }
}

#[tokio::test]
async fn custom_probe_wraps_each_call() {
    let server = MockServer::json(200, chat_completion("ok")).await;
    let dir = tempfile::tempdir().unwrap();
    let probe = CountingProbe::default();
    let (started, stopped) = (probe.started.clone(), probe.stopped.clone());

    let model = provider(&server.base, dir.path()).with_probe(Arc::new(probe));
    assert_eq!(model.get_response("a", &[]).await, Ok("ok".to_string()));
    assert_eq!(model.get_response("b", &[]).await, Ok("ok".to_string()));
    assert_eq!(started.load(Ordering::SeqCst), 2);
    assert_eq!(stopped.load(Ordering::SeqCst), 2);

    let quiet = provider(&server.base, dir.path()).with_probe(Arc::new(NoopProbe));
    assert_eq!(quiet.get_response("c", &[]).await, Ok("ok".to_string()));
}
