//! 端到端：JsonFileStore + 真实 HttpToolInvoker + Mock 补全服务 + 本地 HTTP 桩

use std::sync::Arc;

use hive::dialog::EventKind;
use hive::llm::MockLlmClient;
use hive::store::{Agent, HttpToolConfig, JsonFileStore, Store, Tool};
use hive::tools::{HttpToolInvoker, ToolInvoker};
use hive::DialogOrchestrator;
use serde_json::{json, Value};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::oneshot;

/// 收到的请求：请求行 + 头（原文）与 body
struct Captured {
    head: String,
    body: String,
}

/// 只应答一次的 HTTP 桩，返回 base_url 与收到请求的接收端
async fn serve_once(status: &'static str, body: &'static str) -> (String, oneshot::Receiver<Captured>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = oneshot::channel();

    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut buf = Vec::new();
        let mut chunk = [0u8; 1024];
        let head_end = loop {
            let n = socket.read(&mut chunk).await.unwrap();
            buf.extend_from_slice(&chunk[..n]);
            if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                break pos + 4;
            }
            if n == 0 {
                break buf.len();
            }
        };
        let head = String::from_utf8_lossy(&buf[..head_end]).to_string();
        let content_length = head
            .lines()
            .find_map(|l| {
                let (k, v) = l.split_once(':')?;
                k.eq_ignore_ascii_case("content-length")
                    .then(|| v.trim().parse::<usize>().ok())
                    .flatten()
            })
            .unwrap_or(0);
        while buf.len() < head_end + content_length {
            let n = socket.read(&mut chunk).await.unwrap();
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);
        }
        let received = String::from_utf8_lossy(&buf[head_end..]).to_string();

        let response = format!(
            "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        );
        let _ = tx.send(Captured {
            head,
            body: received,
        });
        socket.write_all(response.as_bytes()).await.unwrap();
        socket.shutdown().await.ok();
    });

    (format!("http://{addr}"), rx)
}

#[tokio::test]
async fn test_ask_calls_http_tool_and_persists_everything() {
    let (base_url, captured) = serve_once("200 OK", r#"{"temp_c":31}"#).await;

    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(JsonFileStore::open(dir.path()).unwrap());
    store
        .save_tools(&[Tool::http(
            "weather",
            "Current weather by city",
            HttpToolConfig::new(format!("{base_url}/v1/"), "get", "weather/<city>")
                .with_header("X-Api-Key", "secret"),
        )
        .unwrap()])
        .unwrap();
    store
        .save_agents(&[Agent::new("forecaster", "Weather questions").with_tools(["weather"])])
        .unwrap();

    let llm = Arc::new(MockLlmClient::with_replies([
        r#"{"tool":"weather","params":{"city":"Lagos","units":"metric"}}"#,
        "It is 31C in Lagos.",
    ]));
    let invoker = Arc::new(HttpToolInvoker::new(5, "Mozilla/5.0", 1000, true));
    let orchestrator = DialogOrchestrator::new(llm.clone(), invoker, store.clone());

    let outcome = orchestrator.ask("forecaster", "Weather in Lagos?").await.unwrap();
    assert_eq!(outcome.response, "It is 31C in Lagos.");
    assert_eq!(outcome.tools_used, vec!["weather".to_string()]);

    let req = captured.await.unwrap();
    assert!(req.head.starts_with("GET /v1/weather/Lagos?units=metric HTTP/1.1\r\n"));
    let head = req.head.to_ascii_lowercase();
    assert!(head.contains("x-api-key: secret"));
    assert!(head.contains("user-agent: mozilla/5.0"));
    assert!(head.contains("accept: application/json"));
    assert!(req.body.is_empty());

    let second = &llm.requests()[1];
    assert_eq!(
        second.messages[3].content,
        r#"Tool execution result: Tool 'weather' executed successfully. Response: {"temp_c":31}"#
    );

    let completed = outcome
        .debug_log
        .iter()
        .find(|e| e.event == EventKind::ToolExecutionCompleted)
        .unwrap();
    let debug_info = completed.get("debug_info").unwrap();
    assert_eq!(debug_info["response"]["status_code"], json!(200));
    assert_eq!(
        debug_info["request"]["combined_url"],
        json!(format!("{base_url}/v1/weather/Lagos"))
    );

    // 重新打开目录，确认落盘
    let reopened = JsonFileStore::open(dir.path()).unwrap();
    let logs = reopened.get_agent_logs("forecaster", 10).unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].response, "It is 31C in Lagos.");
    assert_eq!(logs[0].debug_log, outcome.debug_log);
    assert!(reopened.get_tool("weather").unwrap().unwrap().last_used.is_some());
    assert!(reopened.get_agent("forecaster").unwrap().unwrap().last_active.is_some());
}

#[tokio::test]
async fn test_post_body_rendered_and_path_param_consumed() {
    let (base_url, captured) = serve_once("201 Created", r#"{"id":7}"#).await;
    let invoker = HttpToolInvoker::new(5, "Mozilla/5.0", 1000, true);
    let mut tool = Tool::http(
        "create_item",
        "Create an item in a list",
        HttpToolConfig::new(&base_url, "POST", "/lists/<list>/items")
            .with_body_template(r#"{"name":"$name","qty":$qty}"#),
    )
    .unwrap();

    let outcome = invoker
        .execute(&mut tool, &json!({"list": "groceries", "name": "milk", "qty": 2}))
        .await;
    assert!(outcome.succeeded(), "{}", outcome.result);
    assert_eq!(
        outcome.result,
        r#"Tool 'create_item' executed successfully. Response: {"id":7}"#
    );
    assert!(tool.last_used.is_some());

    let req = captured.await.unwrap();
    assert!(req.head.starts_with("POST /lists/groceries/items HTTP/1.1\r\n"));
    let body: Value = serde_json::from_str(&req.body).unwrap();
    assert_eq!(body, json!({"name": "milk", "qty": 2}));
    assert_eq!(outcome.trace.request.body, Some(body));
}

#[tokio::test]
async fn test_non_success_status_is_still_a_response() {
    let (base_url, _captured) = serve_once("404 Not Found", r#"{"error":"no such city"}"#).await;
    let invoker = HttpToolInvoker::new(5, "Mozilla/5.0", 1000, true);
    let mut tool = Tool::http(
        "weather",
        "w",
        HttpToolConfig::new(&base_url, "GET", "/weather/<city>"),
    )
    .unwrap();

    let outcome = invoker.execute(&mut tool, &json!({"city": "Atlantis"})).await;
    let response = outcome.trace.response.as_ref().unwrap();
    assert_eq!(response.status_code, 404);
    assert!(response.text.contains("no such city"));
}
