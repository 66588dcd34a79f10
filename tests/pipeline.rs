//! End-to-end runs against a mock news API.
//!
//! Every test starts its own `MockServer` and points the pipeline at it via
//! `FeedConfig::with_server`. Output goes into a `Vec<u8>`.

use std::io::{self, Write};
use std::time::Duration;

use quick_xml::events::Event;
use quick_xml::Reader;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use url::Url;
use vesti_rss::fetch::build_client;
use vesti_rss::{run, FeedConfig, FeedError};
use wiremock::matchers::{method, path, path_regex};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

fn item(id: u64) -> Value {
    json!({
        "id": id,
        "title": format!("Новость {id}"),
        "anons": format!("Анонс & {id}"),
        "url": format!("/article/{id}"),
        "datePub": {"day": "5 января 2024", "time": "09:30"}
    })
}

fn page(items: Vec<Value>, next: &str) -> Value {
    json!({"success": true, "data": items, "pagination": {"next": next}})
}

async fn mount_page(server: &MockServer, at: &str, body: Value) {
    Mock::given(method("GET"))
        .and(path(at))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

fn config(server: &MockServer, max_items: usize) -> FeedConfig {
    FeedConfig::with_server(&Url::parse(&server.uri()).unwrap(), max_items).unwrap()
}

async fn run_against(
    server: &MockServer,
    max_items: usize,
) -> (Result<vesti_rss::RunSummary, FeedError>, String) {
    let mut out = Vec::new();
    let result = run(
        &config(server, max_items),
        build_client().unwrap(),
        &mut out,
        CancellationToken::new(),
    )
    .await;
    (result, String::from_utf8(out).unwrap())
}

/// Collects guid texts, failing the test if the document is not well formed.
fn guids(doc: &str) -> Vec<u64> {
    let mut reader = Reader::from_str(doc);
    let mut out = Vec::new();
    let mut in_guid = false;
    loop {
        match reader.read_event().unwrap() {
            Event::Start(e) if e.name().as_ref() == b"guid" => in_guid = true,
            Event::End(e) if e.name().as_ref() == b"guid" => in_guid = false,
            Event::Text(t) if in_guid => out.push(t.unescape().unwrap().parse().unwrap()),
            Event::Eof => break,
            _ => {}
        }
    }
    out
}

fn is_complete(doc: &str) -> bool {
    doc.trim_end().ends_with("</rss>")
}

#[tokio::test]
async fn follows_pages_until_target() {
    let server = MockServer::start().await;
    mount_page(&server, "/api/news", page(vec![item(1), item(2), item(2)], "/api/news/2")).await;
    mount_page(&server, "/api/news/2", page(vec![item(3), item(4), item(5)], "/api/news/3")).await;
    mount_page(&server, "/api/news/3", page(vec![item(6)], "/api/news/3")).await;

    let (result, doc) = run_against(&server, 4).await;
    let summary = result.unwrap();

    assert_eq!(summary.items, 4);
    assert_eq!(summary.duplicates, 1);
    assert_eq!(guids(&doc), vec![1, 2, 3, 4]);
    assert!(is_complete(&doc));
    assert!(doc.contains("<description>Анонс &amp; 1</description>"));
    assert!(doc.contains(&format!("<link>{}/article/1</link>", server.uri())));
}

#[tokio::test]
async fn exhausted_source_ends_with_footer() {
    let server = MockServer::start().await;
    mount_page(&server, "/api/news", page(vec![item(1), item(2)], "/api/news/2")).await;
    mount_page(&server, "/api/news/2", page(vec![item(2), item(3)], "/api/news/2")).await;

    let (result, doc) = run_against(&server, 100).await;
    let summary = result.unwrap();

    assert_eq!(summary.items, 3);
    assert_eq!(summary.pages, 2);
    assert_eq!(guids(&doc), vec![1, 2, 3]);
    assert!(is_complete(&doc));
}

#[tokio::test]
async fn bad_records_are_skipped() {
    let server = MockServer::start().await;
    let mut broken = item(1);
    broken["url"] = json!("not a path");
    let mut late = item(2);
    late["datePub"]["time"] = json!("25:00");
    mount_page(&server, "/api/news", page(vec![broken, late, item(3)], "/api/news")).await;

    let (result, doc) = run_against(&server, 10).await;
    let summary = result.unwrap();

    assert_eq!(summary.rejected, 2);
    assert_eq!(guids(&doc), vec![3]);
    assert!(is_complete(&doc));
}

#[tokio::test]
async fn unsuccessful_page_keeps_earlier_items_but_fails() {
    let server = MockServer::start().await;
    mount_page(&server, "/api/news", page(vec![item(1), item(2)], "/api/news/2")).await;
    mount_page(&server, "/api/news/2", json!({"success": false, "data": []})).await;

    let (result, doc) = run_against(&server, 10).await;

    assert!(matches!(result, Err(FeedError::Unsuccessful { .. })));
    assert!(doc.contains(r#"<guid isPermaLink="false">1</guid>"#));
    assert!(doc.contains(r#"<guid isPermaLink="false">2</guid>"#));
    assert!(!is_complete(&doc));
}

#[tokio::test]
async fn html_error_page_fails_the_run() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>502 Bad Gateway</html>"))
        .mount(&server)
        .await;

    let (result, doc) = run_against(&server, 10).await;

    assert!(matches!(result, Err(FeedError::UnexpectedBody { .. })));
    assert!(!result.unwrap_err().is_shutdown());
    assert!(!doc.contains("<item>"));
    assert!(!is_complete(&doc));
}

#[tokio::test]
async fn target_reached_wins_over_later_page_failure() {
    let server = MockServer::start().await;
    mount_page(&server, "/api/news", page(vec![item(1), item(2)], "/api/news/2")).await;
    // /api/news/2 is not mounted, so reading ahead hits a 404

    let (result, doc) = run_against(&server, 2).await;

    assert_eq!(result.unwrap().items, 2);
    assert_eq!(guids(&doc), vec![1, 2]);
    assert!(is_complete(&doc));
}

#[tokio::test]
async fn shutdown_interrupts_in_flight_request() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/news"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(page(vec![item(1)], "/api/news/2"))
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;

    let shutdown = CancellationToken::new();
    let trigger = shutdown.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        trigger.cancel();
    });

    let mut out = Vec::new();
    let result = tokio::time::timeout(
        Duration::from_secs(2),
        run(&config(&server, 10), build_client().unwrap(), &mut out, shutdown),
    )
    .await
    .expect("run did not stop promptly");

    assert!(result.unwrap_err().is_shutdown());
    assert!(!is_complete(&String::from_utf8(out).unwrap()));
}

/// Descriptions of every item, in document order.
fn descriptions(doc: &str) -> Vec<String> {
    let mut reader = Reader::from_str(doc);
    let mut out = Vec::new();
    let (mut in_item, mut in_desc) = (false, false);
    loop {
        match reader.read_event().unwrap() {
            Event::Start(e) if e.name().as_ref() == b"item" => in_item = true,
            Event::End(e) if e.name().as_ref() == b"item" => in_item = false,
            Event::Start(e) if e.name().as_ref() == b"description" => in_desc = in_item,
            Event::End(e) if e.name().as_ref() == b"description" => in_desc = false,
            Event::Text(t) if in_desc => out.push(t.unescape().unwrap().into_owned()),
            Event::Eof => break,
            _ => {}
        }
    }
    out
}

async fn mount_raw_page(server: &MockServer, first: &[u8]) {
    let mut body = br#"{"success":true,"data":["#.to_vec();
    body.extend_from_slice(first);
    body.extend_from_slice(
        format!(r#",{{"id":2,"title":"ok","anons":"fine","url":"/article/2",{DATE}}}],"pagination":{{"next":"/api/news"}}}}"#)
            .as_bytes(),
    );
    Mock::given(method("GET"))
        .and(path("/api/news"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "application/json"))
        .mount(server)
        .await;
}

const DATE: &str = r#""datePub":{"day":"5 января 2024","time":"09:30"}"#;

#[tokio::test]
async fn null_summary_is_written_empty() {
    let server = MockServer::start().await;
    let first = format!(r#"{{"id":1,"title":"t","anons":null,"url":"/article/1",{DATE}}}"#);
    mount_raw_page(&server, first.as_bytes()).await;

    let (result, doc) = run_against(&server, 10).await;

    assert_eq!(result.unwrap().items, 2);
    assert_eq!(guids(&doc), vec![1, 2]);
    assert!(doc.contains("<description></description>"));
    assert!(is_complete(&doc));
}

#[tokio::test]
async fn lone_surrogate_becomes_markers() {
    let server = MockServer::start().await;
    let first = format!(r#"{{"id":1,"title":"t","anons":"bad \ud800 here","url":"/article/1",{DATE}}}"#);
    mount_raw_page(&server, first.as_bytes()).await;

    let (result, doc) = run_against(&server, 10).await;

    assert_eq!(result.unwrap().items, 2);
    let texts = descriptions(&doc);
    assert!(texts[0].starts_with("bad \\uFFFD"), "{texts:?}");
    assert!(texts[0].ends_with("\\uFFFD here"), "{texts:?}");
    assert_eq!(texts[1], "fine");
}

#[tokio::test]
async fn invalid_utf8_becomes_a_marker() {
    let server = MockServer::start().await;
    let mut first = br#"{"id":1,"title":"t","anons":"caf"#.to_vec();
    first.push(0xFF);
    first.extend_from_slice(format!(r#"e","url":"/article/1",{DATE}}}"#).as_bytes());
    mount_raw_page(&server, &first).await;

    let (result, doc) = run_against(&server, 10).await;

    assert_eq!(result.unwrap().items, 2);
    assert_eq!(descriptions(&doc), vec!["caf\\uFFFDe".to_string(), "fine".to_string()]);
    assert!(is_complete(&doc));
}

/// Serves `/api/news`, `/api/news/2`, `/api/news/3` and so on forever.
fn endless_pages() -> impl Respond {
    |req: &Request| {
        let n: u64 = req
            .url
            .path()
            .rsplit('/')
            .next()
            .and_then(|s| s.parse().ok())
            .unwrap_or(1);
        ResponseTemplate::new(200).set_body_json(page(vec![item(n)], &format!("/api/news/{}", n + 1)))
    }
}

/// Accepts `limit` bytes, then fails every write.
struct ClosesAfter {
    written: Vec<u8>,
    limit: usize,
}

impl Write for ClosesAfter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.written.len() + buf.len() > self.limit {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "reader went away"));
        }
        self.written.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[tokio::test]
async fn write_failure_mid_run_stops_everything() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path_regex(r"^/api/news(/\d+)?$"))
        .respond_with(endless_pages())
        .mount(&server)
        .await;

    let mut sink = ClosesAfter {
        written: Vec::new(),
        limit: 400,
    };
    let result = tokio::time::timeout(
        Duration::from_secs(5),
        run(&config(&server, 500), build_client().unwrap(), &mut sink, CancellationToken::new()),
    )
    .await
    .expect("reader was not stopped");

    assert!(matches!(result, Err(FeedError::Output(_))));
    let doc = String::from_utf8_lossy(&sink.written);
    assert!(doc.contains("<channel>"));
    assert!(!doc.contains("</rss>"));
}
