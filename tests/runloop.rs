//! Runloop client against a mock Runloop API.

use code_assistant::config::SandboxProvider;
use code_assistant::sandbox::{FileUpload, RunloopSandbox, SandboxBackend, SandboxErrorKind};
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn devbox(server: &MockServer) -> RunloopSandbox {
    Mock::given(method("POST"))
        .and(path("/v1/devboxes"))
        .and(header("authorization", "Bearer rl-key"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"id": "dbx_1", "status": "provisioning"})),
        )
        .expect(1)
        .mount(server)
        .await;
    RunloopSandbox::create(&server.uri(), "rl-key").await.unwrap()
}

#[tokio::test]
async fn execute_combines_stdout_and_stderr() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/devboxes/dbx_1/execute_sync"))
        .and(body_json(json!({"command": "python main.py"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "exit_status": 1,
            "stdout": "partial",
            "stderr": "Traceback"
        })))
        .mount(&server)
        .await;

    let sandbox = devbox(&server).await;
    assert_eq!(sandbox.id(), "dbx_1");
    assert_eq!(sandbox.provider(), SandboxProvider::Runloop);

    let resp = sandbox.execute("python main.py", None).await.unwrap();
    assert_eq!(resp.exit_code, 1);
    assert_eq!(resp.output, "partial\nTraceback");
}

#[tokio::test]
async fn upload_download_and_shutdown() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/devboxes/dbx_1/upload_file"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/devboxes/dbx_1/download_file"))
        .and(body_json(json!({"path": "/home/user/a.txt"})))
        .respond_with(ResponseTemplate::new(200).set_body_string("hello"))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/devboxes/dbx_1/shutdown"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "dbx_1"})))
        .expect(1)
        .mount(&server)
        .await;

    let sandbox = devbox(&server).await;
    let uploaded = sandbox
        .upload_files(vec![FileUpload {
            destination: "/home/user/a.txt".to_string(),
            content: b"hello".to_vec(),
        }])
        .await;
    assert!(uploaded[0].error.is_none());

    let downloaded = sandbox.download_files(&["/home/user/a.txt".to_string()]).await;
    assert_eq!(downloaded[0].content.as_deref(), Some(&b"hello"[..]));

    sandbox.delete().await.unwrap();
}

#[tokio::test]
async fn rate_limit_is_classified() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/devboxes"))
        .respond_with(ResponseTemplate::new(429).set_body_string("slow down"))
        .mount(&server)
        .await;

    let err = RunloopSandbox::create(&server.uri(), "rl-key").await.err().unwrap();
    assert_eq!(err.kind, SandboxErrorKind::RateLimited);
    assert!(err.is_transient());
}
