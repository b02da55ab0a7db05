use std::{net::SocketAddr, sync::Arc};

use chrono::Utc;
use http_body_util::BodyExt;
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpStream,
};

use crate::{
    envelope::{Envelope, MsgType, RoutedUpdate, encode_source_update},
    shared::Identifier,
    signal::{SignalSample, SignalStatus},
    store::{StateQuery, StateTree, StateView, error::QueryError},
};

use super::*;

struct TreeReader(StateTree);

impl StateReader for TreeReader {
    fn snapshot(&self) -> StateTree {
        self.0.clone()
    }

    fn query(&self, query: &StateQuery) -> Result<StateView, QueryError> {
        self.0.query(query)
    }
}

fn id(s: &str) -> Identifier {
    Identifier::new(s).unwrap()
}

fn reader() -> TreeReader {
    let mut tree = StateTree::new();
    tree.register_probe(&id("s1"), &id("p1"));

    let sample = SignalSample::new(SignalStatus::Present, -65.0, Utc::now());
    let source_tier =
        encode_source_update(MsgType::SignalStatusChange, &id("r0"), Some(&id("l0")), &sample)
            .unwrap();
    let text = Envelope::wrap_site(MsgType::SignalStatusChange, id("s1"), id("p1"), source_tier)
        .encode()
        .unwrap();
    tree.apply(RoutedUpdate::decode_chain(&text).unwrap(), Utc::now())
        .unwrap();

    TreeReader(tree)
}

async fn body_json(response: Response<Full<Bytes>>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

const CURRENT: &str =
    "/diatomite/sites/s1/probes/p1/RadioSources/r0/listeners/l0/current_signal_state";

#[tokio::test]
async fn test_get_current_signal_state() {
    let response = handle(&reader(), &Method::GET, CURRENT);

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "application/json"
    );

    let body = body_json(response).await;
    assert_eq!(body["current_signal_state"]["status"], "PRESENT");
    assert_eq!(body["current_signal_state"]["level"], -65.0);
}

#[tokio::test]
async fn test_get_views_at_each_level() {
    let reader = reader();

    let body = body_json(handle(&reader, &Method::GET, "/diatomite/sites")).await;
    assert!(body["sites"]["s1"]["probes"]["p1"].is_object());

    let body = body_json(handle(
        &reader,
        &Method::GET,
        "/diatomite/sites/s1/probes/p1/RadioSources",
    ))
    .await;
    assert_eq!(body["radio_sources"]["r0"]["id"], "r0");

    let body = body_json(handle(
        &reader,
        &Method::GET,
        "/diatomite/sites/s1/probes/p1/RadioSources/r0/listeners/l0",
    ))
    .await;
    assert_eq!(body["id"], "l0");
    assert_eq!(body["signal_state"]["previous"]["status"], "PRE_INIT");
}

#[tokio::test]
async fn test_unknown_site_is_bad_request_naming_the_path() {
    let response = handle(&reader(), &Method::GET, "/diatomite/sites/unknownsite");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = body_json(response).await;
    let error = &body["errors"][0];
    assert_eq!(error["status"], 400);
    assert_eq!(error["title"], "Bad Request");
    assert_eq!(error["source"]["pointer"], "/diatomite/sites/unknownsite");
    assert_eq!(error["detail"], "Unknown site `unknownsite`");
}

#[tokio::test]
async fn test_non_read_methods_are_refused_whatever_the_path() {
    let reader = reader();

    for (method, path) in [
        (Method::POST, CURRENT),
        (Method::POST, "/diatomite/sites/unknownsite"),
        (Method::PUT, "/elsewhere"),
        (Method::DELETE, "/diatomite/sites"),
    ] {
        let response = handle(&reader, &method, path);
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED, "{method} {path}");
        assert_eq!(response.headers()[header::ALLOW], "GET, HEAD");
    }
}

#[tokio::test]
async fn test_paths_outside_the_surface_are_forbidden() {
    let reader = reader();

    for path in ["/", "/diatomite", "/status", "/diatomite/sites/s1/antennas"] {
        let response = handle(&reader, &Method::GET, path);
        assert_eq!(response.status(), StatusCode::FORBIDDEN, "{path}");

        let body = body_json(response).await;
        assert_eq!(body["errors"][0]["source"]["pointer"], path);
    }
}

#[tokio::test]
async fn test_head_has_get_headers_and_empty_body() {
    let reader = reader();

    let get = handle(&reader, &Method::GET, CURRENT);
    let head = handle(&reader, &Method::HEAD, CURRENT);

    assert_eq!(head.status(), get.status());
    assert_eq!(
        head.headers()[header::CONTENT_LENGTH],
        get.headers()[header::CONTENT_LENGTH]
    );

    let bytes = head.into_body().collect().await.unwrap().to_bytes();
    assert!(bytes.is_empty());
}

async fn raw_request(addr: SocketAddr, request: &str) -> String {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(request.as_bytes()).await.unwrap();

    let mut response = String::new();
    stream.read_to_string(&mut response).await.unwrap();
    response
}

#[tokio::test]
async fn test_read_surface_serves_over_http() {
    let config = ReadSurfaceConfig::default().with_bind_addr(SocketAddr::from(([127, 0, 0, 1], 0)));
    let controller = ReadSurface::bind(config, Arc::new(reader())).await.unwrap();
    let addr = controller.local_addr();

    let response = raw_request(
        addr,
        &format!("GET {CURRENT} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n"),
    )
    .await;
    assert!(response.starts_with("HTTP/1.1 200 OK"), "{response}");
    assert!(response.contains(r#""status":"PRESENT""#));

    let response = raw_request(
        addr,
        "POST /diatomite/sites HTTP/1.1\r\nHost: localhost\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
    )
    .await;
    assert!(response.starts_with("HTTP/1.1 405"), "{response}");

    controller.shutdown().await.unwrap();
    assert!(matches!(
        controller.shutdown().await,
        Err(error::ReadSurfaceError::AlreadyShutdown)
    ));
    assert!(TcpStream::connect(addr).await.is_err());
}

#[test]
fn test_accept_retry_delay_backs_off_up_to_cap() {
    use std::time::Duration;

    use super::server::accept_retry_delay;

    assert_eq!(accept_retry_delay(0), Duration::from_millis(50));
    assert_eq!(accept_retry_delay(1), Duration::from_millis(100));
    assert_eq!(accept_retry_delay(3), Duration::from_millis(400));
    assert_eq!(accept_retry_delay(5), Duration::from_secs(1));
    assert_eq!(accept_retry_delay(u32::MAX), Duration::from_secs(1));
}
