//! HTTP API tests over a real socket.

mod common;

use std::sync::atomic::Ordering;

use base64::Engine;
use common::{harness, Harness};
use serde_json::{json, Value};
use tokio::net::TcpListener;

async fn start(h: &Harness) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = h.app.clone();
    tokio::spawn(async move {
        docchat::server::serve(app, listener).await.unwrap();
    });
    format!("http://{}", addr)
}

fn encode(text: &str) -> String {
    base64::engine::general_purpose::STANDARD.encode(text)
}

async fn upload_atlas(client: &reqwest::Client, base: &str) -> Value {
    let resp = client
        .post(format!("{}/documents", base))
        .json(&json!({
            "documents": [
                { "name": "france.txt", "data_base64": encode("The capital of France is Paris.") },
                { "name": "germany.md", "content_type": "text/markdown",
                  "data_base64": encode("Berlin is the capital of Germany.") }
            ]
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    resp.json().await.unwrap()
}

#[tokio::test]
async fn health_reports_version() {
    let h = harness();
    let base = start(&h).await;
    let body: Value = reqwest::get(format!("{}/health", base))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn upload_then_converse() {
    let h = harness();
    let base = start(&h).await;
    let client = reqwest::Client::new();

    let report = upload_atlas(&client, &base).await;
    assert_eq!(report["index"]["chunks"], 2);
    assert_eq!(report["documents"].as_array().unwrap().len(), 2);

    let resp = client
        .post(format!("{}/sessions/s1/messages", base))
        .json(&json!({ "utterance": "What is the capital of France?" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let turn: Value = resp.json().await.unwrap();
    assert!(turn["answer"].as_str().unwrap().contains("Paris"));
    assert_eq!(turn["transcript"].as_array().unwrap().len(), 2);
    assert_eq!(turn["transcript"][0]["role"], "user");
    assert_eq!(turn["sources"][0]["chunk"]["metadata"]["source"], "france.txt");

    let session: Value = client
        .get(format!("{}/sessions/s1", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(session["id"], "s1");
    assert_eq!(session["transcript"].as_array().unwrap().len(), 2);

    let list: Value = client
        .get(format!("{}/sessions", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(list["sessions"], json!(["s1"]));
}

#[tokio::test]
async fn unknown_session_is_404() {
    let h = harness();
    let base = start(&h).await;
    let resp = reqwest::get(format!("{}/sessions/nobody", base)).await.unwrap();
    assert_eq!(resp.status(), 404);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "not_found");
}

#[tokio::test]
async fn empty_utterance_is_400() {
    let h = harness();
    let base = start(&h).await;
    let resp = reqwest::Client::new()
        .post(format!("{}/sessions/s1/messages", base))
        .json(&json!({ "utterance": "" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "bad_request");
}

#[tokio::test]
async fn invalid_base64_is_400() {
    let h = harness();
    let base = start(&h).await;
    let resp = reqwest::Client::new()
        .post(format!("{}/documents", base))
        .json(&json!({ "documents": [{ "name": "x.txt", "data_base64": "@@not base64@@" }] }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    assert_eq!(h.app.indexer().snapshot().len(), 0);
}

#[tokio::test]
async fn model_outage_is_502_with_stage() {
    let h = harness();
    let base = start(&h).await;
    let client = reqwest::Client::new();
    upload_atlas(&client, &base).await;

    h.llm.fail_answers.store(true, Ordering::SeqCst);
    let resp = client
        .post(format!("{}/sessions/s1/messages", base))
        .json(&json!({ "utterance": "What is the capital of France?" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 502);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "language_model_service");
    assert_eq!(body["error"]["stage"], "synthesize");
    assert!(h.app.sessions().transcript("s1").unwrap().is_empty());
}
