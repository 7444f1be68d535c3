//! Retrieval integration tests against a throwaway local HTTP responder.

use std::io::{Read, Write};

use stream_scraper::{
    scrape, Error, FetchConfig, ImmediateSession, ScrapeRequest, SourceDocument, TextOptions,
};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

fn http_response(status_line: &str, server: Option<&str>, body: &str) -> String {
    let server_header = server.map(|s| format!("Server: {s}\r\n")).unwrap_or_default();
    format!(
        "HTTP/1.1 {status_line}\r\n{server_header}Content-Type: text/html\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    )
}

/// Serve one canned response and return the URL to request.
async fn serve_once(response: String) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut buf = Vec::new();
        let mut chunk = [0u8; 1024];
        while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
            let n = socket.read(&mut chunk).await.unwrap();
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);
        }
        socket.write_all(response.as_bytes()).await.unwrap();
        socket.shutdown().await.ok();
    });
    format!("http://{addr}/")
}

fn serve_once_blocking(response: String) -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    std::thread::spawn(move || {
        let (mut socket, _) = listener.accept().unwrap();
        let mut buf = Vec::new();
        let mut chunk = [0u8; 1024];
        while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
            let n = socket.read(&mut chunk).unwrap();
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);
        }
        socket.write_all(response.as_bytes()).unwrap();
    });
    format!("http://{addr}/")
}

#[tokio::test]
async fn test_fetch_ok_page() {
    let url = serve_once(http_response("200 OK", Some("nginx"), "<h1>Hello</h1>")).await;
    let session = ImmediateSession::fetch(&url, &FetchConfig::default()).await.unwrap();
    assert_eq!(session.document().status(), 200);
    assert_eq!(session.document().server(), Some("nginx"));
    assert_eq!(session.html("h1").unwrap(), "<h1>Hello</h1>");
}

#[tokio::test]
async fn test_origin_error_page_is_extractable() {
    let url = serve_once(http_response(
        "404 Not Found",
        Some("nginx"),
        "<h1>Page not found</h1>",
    ))
    .await;
    let doc = SourceDocument::fetch(&url, &FetchConfig::default()).await.unwrap();
    assert_eq!(doc.status(), 404);
    let session = ImmediateSession::new(doc);
    let text = session.text("h1", TextOptions::default()).unwrap();
    assert_eq!(text.as_joined(), Some("Page not found"));
}

#[tokio::test]
async fn test_infrastructure_failure_is_retrieval_error() {
    let url = serve_once(http_response("502 Bad Gateway", None, "bad gateway")).await;
    let err = SourceDocument::fetch(&url, &FetchConfig::default()).await.unwrap_err();
    assert!(matches!(err, Error::Retrieval(_)));
    assert!(err.to_string().contains("Status 502 requesting"), "{err}");
}

#[tokio::test]
async fn test_cloudflare_failure_is_retrieval_error() {
    let url = serve_once(http_response("530 Origin Error", Some("cloudflare"), "")).await;
    let err = SourceDocument::fetch(&url, &FetchConfig::default()).await.unwrap_err();
    assert!(matches!(err, Error::Retrieval(_)));
}

#[tokio::test]
async fn test_connection_refused_is_retrieval_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let err = SourceDocument::fetch(&format!("http://{addr}/"), &FetchConfig::default())
        .await
        .unwrap_err();
    assert!(err.to_string().starts_with("Failed to fetch URL:"), "{err}");
}

#[tokio::test]
async fn test_scrape_request_with_url() {
    let url = serve_once(http_response(
        "200 OK",
        Some("nginx"),
        r#"<h1>Example Domain</h1><a href="https://www.iana.org/domains/example">More</a>"#,
    ))
    .await;
    let body = format!(
        r#"{{"url": "{url}", "operations": [{{"selector": "h1", "extractor": "html"}}, {{"selector": "a", "extractor": "attribute", "attribute": "href"}}]}}"#
    );
    let request = ScrapeRequest::from_json(&body).unwrap();
    let response = scrape(&request, &FetchConfig::default()).await.unwrap();
    assert_eq!(
        response.to_json().unwrap(),
        r#"["<h1>Example Domain</h1>","https://www.iana.org/domains/example"]"#
    );
}

#[test]
fn test_blocking_fetch() {
    let url = serve_once_blocking(http_response("200 OK", Some("nginx"), "<p>blocking</p>"));
    let doc = SourceDocument::fetch_blocking(&url, &FetchConfig::default()).unwrap();
    assert_eq!(doc.status(), 200);
    assert_eq!(doc.body(), "<p>blocking</p>");
}

#[test]
fn test_blocking_infrastructure_failure() {
    let url = serve_once_blocking(http_response("503 Service Unavailable", None, ""));
    let err = SourceDocument::fetch_blocking(&url, &FetchConfig::default()).unwrap_err();
    assert!(matches!(err, Error::Retrieval(_)));
}
