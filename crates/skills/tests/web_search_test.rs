//! Web search against a local stand-in for the provider.

use std::time::Duration;

use bouncer_core::traits::{Tool, ToolRegistry};
use bouncer_core::Error;
use bouncer_skills::{DefaultToolRegistry, ReadFileTool, SearchConfig, WebSearchTool, WriteFileTool};
use serde_json::json;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

/// Serve `status` + `body` to every connection; returns the base URL.
async fn serve(status: &'static str, body: String) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                return;
            };
            let body = body.clone();
            tokio::spawn(async move {
                let mut buf = Vec::new();
                let mut chunk = [0u8; 1024];
                while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
                    match socket.read(&mut chunk).await {
                        Ok(0) | Err(_) => break,
                        Ok(n) => buf.extend_from_slice(&chunk[..n]),
                    }
                }
                let response = format!(
                    "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status,
                    body.len(),
                    body
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    format!("http://{}/", addr)
}

fn config(endpoint: String) -> SearchConfig {
    SearchConfig {
        endpoint,
        max_results: 5,
        retries: 1,
        request_timeout: Duration::from_secs(5),
    }
}

#[tokio::test]
async fn test_search_renders_markdown_links() {
    let body = json!({
        "Heading": "Cognitive bias",
        "AbstractText": "A systematic pattern of deviation from rationality.",
        "AbstractURL": "https://en.wikipedia.org/wiki/Cognitive_bias",
        "RelatedTopics": [
            {"Text": "Anchoring - reliance on the first piece of information", "FirstURL": "https://duckduckgo.com/Anchoring"}
        ]
    })
    .to_string();
    let endpoint = serve("200 OK", body).await;

    let tool = WebSearchTool::new(config(endpoint));
    let output = tool.execute(json!({"query": "cognitive bias"})).await.unwrap();

    assert!(output.success);
    assert!(output
        .content
        .contains("[Cognitive bias](https://en.wikipedia.org/wiki/Cognitive_bias)"));
    assert!(output.content.contains("[Anchoring](https://duckduckgo.com/Anchoring)"));
}

#[tokio::test]
async fn test_search_empty_answer_is_not_an_error() {
    let endpoint = serve("200 OK", "{}".to_string()).await;
    let tool = WebSearchTool::new(config(endpoint));

    let output = tool.execute(json!({"query": "zzzz"})).await.unwrap();
    assert!(output.content.contains("No results found"));
}

#[tokio::test]
async fn test_search_provider_error_maps_to_unavailable() {
    let endpoint = serve("503 Service Unavailable", "{}".to_string()).await;
    let tool = WebSearchTool::new(config(endpoint));

    let result = tool.execute(json!({"query": "anything"})).await;
    assert!(matches!(result, Err(Error::SearchUnavailable(_))));
}

#[tokio::test]
async fn test_default_tool_set_registers_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let registry = DefaultToolRegistry::new();
    registry
        .register(Box::new(WebSearchTool::new(SearchConfig::default())))
        .await
        .unwrap();
    registry
        .register(Box::new(WriteFileTool::new(dir.path())))
        .await
        .unwrap();
    registry
        .register(Box::new(ReadFileTool::new(dir.path())))
        .await
        .unwrap();

    let defs = registry.list().await.unwrap();
    let names: Vec<&str> = defs.iter().map(|d| d.name.as_str()).collect();
    assert_eq!(names, vec!["web_search", "write_to_file", "read_file"]);
    assert!(defs[1].parameters.to_string().contains("content"));

    registry
        .execute("write_to_file", json!({"path": "a.txt", "content": "hi"}))
        .await
        .unwrap();
    let read = registry.execute("read_file", json!({"path": "a.txt"})).await.unwrap();
    assert_eq!(read.content, "hi");
}
