#![allow(dead_code)]

use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::Response;
use axum::routing::get;
use axum::Router;
use futures::stream;
use reqwest::Url;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// How the test server treats `Range` requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeMode {
    /// Answer every range with 206 and exactly the requested bytes.
    Honor,
    /// Ignore ranges, always answer 200 with the full body.
    Ignore,
    /// Honor the `bytes=0-0` probe only, answer 200 to any other range.
    ProbeOnly,
    /// Honor the probe, answer 206 to other ranges but drop their last byte.
    Truncate,
    /// Honor the probe, answer 206 to other ranges with the right number of
    /// bytes but a `Content-Range` starting at 0.
    Mislabel,
}

/// Knobs of the test server.
#[derive(Debug, Clone)]
pub struct ServerOptions {
    pub mode: RangeMode,
    /// Answer this many requests with 429 before serving.
    pub fail_first: usize,
    /// Split bodies into chunks of this size, sleeping between them.
    pub slow_chunks: Option<(usize, Duration)>,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            mode: RangeMode::Honor,
            fail_first: 0,
            slow_chunks: None,
        }
    }
}

/// Request counters.
#[derive(Debug, Default)]
pub struct Counters {
    /// Every request, rejected ones included.
    pub requests: AtomicUsize,
    /// Requests answered with 429.
    pub rejected: AtomicUsize,
    /// `bytes=0-0` probes.
    pub probes: AtomicUsize,
    /// Ranged requests other than probes.
    pub segments: AtomicUsize,
    /// Requests served the full body.
    pub full: AtomicUsize,
}

impl Counters {
    pub fn get(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }
}

struct ServerState {
    payload: Bytes,
    options: ServerOptions,
    remaining_failures: AtomicUsize,
    counters: Arc<Counters>,
}

/// An HTTP server on a random local port serving one payload at `/file`.
pub struct TestServer {
    pub addr: SocketAddr,
    pub counters: Arc<Counters>,
    pub payload: Bytes,
}

impl TestServer {
    pub async fn start(payload: Vec<u8>, options: ServerOptions) -> Self {
        let payload = Bytes::from(payload);
        let counters = Arc::new(Counters::default());
        let state = Arc::new(ServerState {
            payload: payload.clone(),
            remaining_failures: AtomicUsize::new(options.fail_first),
            options,
            counters: counters.clone(),
        });

        let app = Router::new()
            .route("/file", get(serve))
            .with_state(state);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind test server");
        let addr = listener.local_addr().expect("Failed to read local address");
        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("Test server failed");
        });

        Self {
            addr,
            counters,
            payload,
        }
    }

    pub fn url(&self) -> Url {
        Url::parse(&format!("http://{}/file", self.addr)).expect("Invalid server URL")
    }

    pub fn requests(&self) -> usize {
        Counters::get(&self.counters.requests)
    }

    pub fn full_requests(&self) -> usize {
        Counters::get(&self.counters.full)
    }

    pub fn segment_requests(&self) -> usize {
        Counters::get(&self.counters.segments)
    }

    pub fn probe_requests(&self) -> usize {
        Counters::get(&self.counters.probes)
    }
}

fn parse_range(headers: &HeaderMap) -> Option<(u64, u64)> {
    let value = headers.get(header::RANGE)?.to_str().ok()?;
    let (start, end) = value.strip_prefix("bytes=")?.split_once('-')?;
    Some((start.parse().ok()?, end.parse().ok()?))
}

async fn serve(State(state): State<Arc<ServerState>>, headers: HeaderMap) -> Response {
    let counters = &state.counters;
    counters.requests.fetch_add(1, Ordering::SeqCst);

    let reject = state
        .remaining_failures
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok();
    if reject {
        counters.rejected.fetch_add(1, Ordering::SeqCst);
        return Response::builder()
            .status(StatusCode::TOO_MANY_REQUESTS)
            .body(Body::empty())
            .expect("Invalid response");
    }

    let total = state.payload.len() as u64;
    let range = parse_range(&headers).filter(|(start, end)| start <= end && *end < total);
    let Some((start, end)) = range else {
        return full(&state);
    };

    let probe = (start, end) == (0, 0);
    if probe {
        counters.probes.fetch_add(1, Ordering::SeqCst);
    } else {
        counters.segments.fetch_add(1, Ordering::SeqCst);
    }

    match state.options.mode {
        RangeMode::Ignore => full(&state),
        RangeMode::ProbeOnly if !probe => full(&state),
        RangeMode::Truncate if !probe => partial(&state, start, end, end),
        RangeMode::Mislabel if !probe => mislabeled(&state, start, end),
        _ => partial(&state, start, end, end + 1),
    }
}

fn full(state: &ServerState) -> Response {
    state.counters.full.fetch_add(1, Ordering::SeqCst);
    Response::builder()
        .status(StatusCode::OK)
        .header(header::ACCEPT_RANGES, "bytes")
        .header(header::CONTENT_LENGTH, state.payload.len())
        .body(body(state, state.payload.clone()))
        .expect("Invalid response")
}

fn partial(state: &ServerState, start: u64, end: u64, body_end: u64) -> Response {
    let slice = state.payload.slice(start as usize..body_end as usize);
    Response::builder()
        .status(StatusCode::PARTIAL_CONTENT)
        .header(
            header::CONTENT_RANGE,
            format!("bytes {}-{}/{}", start, end, state.payload.len()),
        )
        .header(header::CONTENT_LENGTH, slice.len())
        .body(body(state, slice))
        .expect("Invalid response")
}

fn mislabeled(state: &ServerState, start: u64, end: u64) -> Response {
    let slice = state.payload.slice(start as usize..end as usize + 1);
    Response::builder()
        .status(StatusCode::PARTIAL_CONTENT)
        .header(
            header::CONTENT_RANGE,
            format!("bytes 0-{}/{}", end - start, state.payload.len()),
        )
        .header(header::CONTENT_LENGTH, slice.len())
        .body(body(state, slice))
        .expect("Invalid response")
}

fn body(state: &ServerState, bytes: Bytes) -> Body {
    let Some((chunk_size, delay)) = state.options.slow_chunks else {
        return Body::from(bytes);
    };
    let chunks = stream::unfold(bytes, move |mut rest| async move {
        if rest.is_empty() {
            return None;
        }
        tokio::time::sleep(delay).await;
        let chunk = rest.split_to(chunk_size.min(rest.len()));
        Some((Ok::<_, Infallible>(chunk), rest))
    });
    Body::from_stream(chunks)
}
