// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Resilient IPP-over-HTTP transport.
//
// One `IppTransport` serves the whole process. It keeps two independent
// routes, local and remote, each with its own pooled HTTP client, timeouts,
// connection permits and circuit breaker, so trouble with a remote spooler
// never blocks printing to the local one.
//
// Send path:
//   0. refuse if shutting down or the route's circuit is open (no I/O)
//   1. frame the request; stream header + document with an exact length
//   2. take a route permit, POST application/ipp
//   3. read and parse the response; failures become a deferred error.
//      The socket timeout bounds silence, not total time: gaps in upload
//      progress, the wait for the response head, and gaps between
//      response body chunks.
//   4. release body and permit
//   5. only then hand the outcome to the circuit breaker

use std::error::Error as StdError;
use std::future::Future;
use std::io;
use std::path::Path;
use std::pin::pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use futures::{StreamExt, future, stream};
use http_body_util::combinators::UnsyncBoxBody;
use http_body_util::{BodyExt, LengthLimitError, Limited, StreamBody};
use hyper::body::Frame;
use hyper::{Method, Request, header};
use hyper_util::client::legacy::Client;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::rt::{TokioExecutor, TokioTimer};
use tokio::io::AsyncReadExt;
use tokio::sync::{Semaphore, watch};
use tokio::time::timeout;
use tracing::{debug, info, instrument, warn};

use pressgang_core::config::{RouteConfig, TransportConfig};
use pressgang_core::error::ConnectionError;
use pressgang_ipp::dictionary::ATTRIBUTES_CHARSET;
use pressgang_ipp::tag::{STATUS_CLIENT_ERROR_NOT_FOUND, is_successful};
use pressgang_ipp::{
    AttrGroup, GroupTag, IppVersion, IppWriter, Message, MessageCharset, RejectedAttribute,
    RequestIdGenerator, read_message,
};

use crate::breaker::{CircuitBreaker, DeferredError};
use crate::endpoint::{Endpoint, EndpointClass};

/// MIME type of IPP requests and responses (RFC 8010 §4).
pub const IPP_CONTENT_TYPE: &str = "application/ipp";

/// Read size when streaming a document from disk.
const DOCUMENT_CHUNK_SIZE: usize = 64 * 1024;

/// Largest response body accepted from a spooler.
pub const MAX_RESPONSE_BYTES: usize = 4 * 1024 * 1024;

type RequestBody = UnsyncBoxBody<Bytes, io::Error>;
type HttpClient = Client<HttpConnector, RequestBody>;

/// A parsed spooler answer whose status the caller has to look at.
///
/// Either a successful status (`0x0000..=0x00FF`) or client-error-not-found.
#[derive(Debug, Clone)]
pub struct IppResponse {
    pub version: IppVersion,
    pub status: u16,
    pub request_id: u32,
    pub groups: Vec<AttrGroup>,
    /// Request attributes that failed to encode and were never sent.
    pub rejected: Vec<RejectedAttribute>,
}

impl IppResponse {
    pub fn group(&self, tag: GroupTag) -> Option<&AttrGroup> {
        self.groups.iter().find(|g| g.tag() == tag)
    }

    pub fn is_not_found(&self) -> bool {
        self.status == STATUS_CLIENT_ERROR_NOT_FOUND
    }
}

struct Route {
    class: EndpointClass,
    config: RouteConfig,
    client: HttpClient,
    permits: Semaphore,
    breaker: CircuitBreaker,
}

impl Route {
    fn new(class: EndpointClass, config: &RouteConfig, transport: &TransportConfig) -> Self {
        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(config.connect_timeout()));
        connector.set_nodelay(true);
        connector.enforce_http(true);

        let client = Client::builder(TokioExecutor::new())
            .pool_timer(TokioTimer::new())
            .pool_idle_timeout(transport.pool_idle_timeout())
            .pool_max_idle_per_host(transport.max_connections_per_route)
            .build(connector);

        Self {
            class,
            config: config.clone(),
            client,
            permits: Semaphore::new(transport.max_connections_per_route),
            breaker: CircuitBreaker::new(class.as_str(), &transport.breaker),
        }
    }
}

/// Process-wide IPP client with per-route pooling and circuit breaking.
pub struct IppTransport {
    local: Route,
    remote: Route,
    pool_acquire_timeout: Duration,
    request_ids: RequestIdGenerator,
    writer: IppWriter,
    shutting_down: AtomicBool,
}

impl IppTransport {
    /// Build the transport. Must be called inside a Tokio runtime.
    pub fn new(config: TransportConfig) -> Self {
        info!(
            max_per_route = config.max_connections_per_route,
            max_total = config.max_connections_total(),
            failure_threshold = config.breaker.failure_threshold,
            cool_down_ms = config.breaker.cool_down_ms,
            "IPP transport starting"
        );
        Self {
            local: Route::new(EndpointClass::Local, &config.local, &config),
            remote: Route::new(EndpointClass::Remote, &config.remote, &config),
            pool_acquire_timeout: config.pool_acquire_timeout(),
            request_ids: RequestIdGenerator::new(),
            writer: IppWriter::new(),
            shutting_down: AtomicBool::new(false),
        }
    }

    fn route(&self, class: EndpointClass) -> &Route {
        match class {
            EndpointClass::Local => &self.local,
            EndpointClass::Remote => &self.remote,
        }
    }

    /// Circuit breaker of one route, for inspection or manual reset.
    pub fn breaker(&self, class: EndpointClass) -> &CircuitBreaker {
        &self.route(class).breaker
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down.load(Ordering::Acquire)
    }

    /// Stop accepting sends. Requests already in flight finish, but their
    /// failures no longer reach the circuit breakers.
    pub fn shutdown(&self) {
        if !self.shutting_down.swap(true, Ordering::AcqRel) {
            info!("IPP transport shutting down");
            self.local.permits.close();
            self.remote.permits.close();
        }
    }

    /// Send a request built elsewhere, e.g. by the Print-Job builder.
    pub async fn send_message(
        &self,
        endpoint: &Endpoint,
        message: &Message,
        document: Option<&Path>,
    ) -> Result<IppResponse, ConnectionError> {
        self.send(endpoint, message.code, &message.groups, document).await
    }

    /// Frame and deliver one IPP request, optionally followed by a document
    /// streamed from disk, and return the parsed response.
    #[instrument(
        skip_all,
        fields(endpoint = %endpoint, class = %endpoint.class(), operation = operation)
    )]
    pub async fn send(
        &self,
        endpoint: &Endpoint,
        operation: u16,
        groups: &[AttrGroup],
        document: Option<&Path>,
    ) -> Result<IppResponse, ConnectionError> {
        if self.is_shutting_down() {
            return Err(ConnectionError::ShutDown);
        }

        let route = self.route(endpoint.class());
        let Some(admission) = route.breaker.admit() else {
            return Err(ConnectionError::CircuitOpen {
                class: route.class.as_str(),
                uri: endpoint.uri().to_string(),
            });
        };

        // Dropping this future before the outcome is in hands the probe
        // slot back through the admission's drop.
        let outcome = self.exchange(route, endpoint, operation, groups, document).await;

        if self.is_shutting_down() {
            debug!("shutdown in progress; outcome not counted");
            drop(admission);
            return outcome.map_err(DeferredError::into_inner);
        }
        admission.execute(outcome)
    }

    async fn exchange(
        &self,
        route: &Route,
        endpoint: &Endpoint,
        operation: u16,
        groups: &[AttrGroup],
        document: Option<&Path>,
    ) -> Result<IppResponse, DeferredError> {
        let uri = endpoint.uri();
        let request_id = self.request_ids.next();
        let framed = self
            .writer
            .write(operation, request_id, groups, charset_of(groups));
        let header_len = framed.bytes.len() as u64;

        let (file, document_len) = match document {
            Some(path) => {
                let file = tokio::fs::File::open(path).await.map_err(ConnectionError::Io)?;
                let len = file.metadata().await.map_err(ConnectionError::Io)?.len();
                (Some(file), len)
            }
            None => (None, 0),
        };
        let content_length = header_len + document_len;
        let (upload, upload_progress) = watch::channel(false);

        let request = Request::builder()
            .method(Method::POST)
            .uri(endpoint.target().clone())
            .header(header::CONTENT_TYPE, IPP_CONTENT_TYPE)
            .header(header::CONTENT_LENGTH, content_length)
            .body(request_body(framed.bytes.clone(), file, upload))
            .map_err(|e| ConnectionError::Http {
                uri: uri.to_string(),
                detail: e.to_string(),
            })?;

        let acquire_ms = self.pool_acquire_timeout.as_millis() as u64;
        let permit = timeout(self.pool_acquire_timeout, route.permits.acquire())
            .await
            .map_err(|_| ConnectionError::PoolExhausted {
                class: route.class.as_str(),
                timeout_ms: acquire_ms,
            })?
            .map_err(|_| ConnectionError::ShutDown)?;

        info!(request_id, bytes = content_length, "sending IPP request");

        let socket_timeout = route.config.socket_timeout();
        let timed_out = || ConnectionError::Timeout {
            uri: uri.to_string(),
            timeout_ms: route.config.socket_timeout_ms,
        };

        let response = await_response(route.client.request(request), upload_progress, socket_timeout)
            .await
            .ok_or_else(timed_out)?
            .map_err(|e| classify_client_error(uri, &e))?;

        let http_status = response.status();
        let mut body = Limited::new(response.into_body(), MAX_RESPONSE_BYTES);
        let mut collected = BytesMut::new();
        while let Some(frame) = timeout(socket_timeout, body.frame()).await.map_err(|_| timed_out())? {
            let frame = frame.map_err(|e| response_body_error(uri, &*e))?;
            if let Ok(data) = frame.into_data() {
                collected.extend_from_slice(&data);
            }
        }
        drop(body);
        drop(permit);
        let body = collected.freeze();

        if !http_status.is_success() {
            return Err(ConnectionError::Http {
                uri: uri.to_string(),
                detail: format!("HTTP status {http_status}"),
            }
            .into());
        }

        let outcome = read_message(&body);
        if let Some(source) = outcome.error {
            warn!(error = %source, bytes = body.len(), "unparseable IPP response");
            return Err(ConnectionError::Malformed {
                uri: uri.to_string(),
                source,
            }
            .into());
        }
        let message = outcome.message;

        if message.request_id != request_id {
            warn!(request_id, response_id = message.request_id, "response request-id mismatch");
        }

        let status = message.status_code();
        if !is_successful(status) && status != STATUS_CLIENT_ERROR_NOT_FOUND {
            warn!(status = format_args!("0x{status:04x}"), "spooler rejected request");
            return Err(ConnectionError::Status {
                uri: uri.to_string(),
                code: status,
            }
            .into());
        }

        debug!(status = format_args!("0x{status:04x}"), groups = message.groups.len(), "IPP response");
        Ok(IppResponse {
            version: message.version,
            status,
            request_id: message.request_id,
            groups: message.groups,
            rejected: framed.rejected,
        })
    }
}

/// Charset the request declares in `attributes-charset`, UTF-8 if absent.
fn charset_of(groups: &[AttrGroup]) -> MessageCharset {
    groups
        .iter()
        .find(|g| g.tag() == GroupTag::Operation)
        .and_then(|g| g.first_value(ATTRIBUTES_CHARSET))
        .and_then(MessageCharset::from_name)
        .unwrap_or_default()
}

/// IPP header followed by the document, read in chunks.
///
/// `upload` is touched for every chunk handed to the connection and set to
/// `true` once the last one has gone.
fn request_body(header: Bytes, file: Option<tokio::fs::File>, upload: watch::Sender<bool>) -> RequestBody {
    let head = stream::once(future::ready(Ok::<_, io::Error>(Frame::data(header))));
    let document = stream::try_unfold(file, |file| async move {
        let Some(mut file) = file else {
            return Ok(None);
        };
        let mut buf = BytesMut::with_capacity(DOCUMENT_CHUNK_SIZE);
        match file.read_buf(&mut buf).await {
            Ok(0) => Ok(None),
            Ok(_) => Ok(Some((Frame::data(buf.freeze()), Some(file)))),
            Err(e) => Err(e),
        }
    });

    let progress = Arc::new(upload);
    let finished = Arc::clone(&progress);
    let done = stream::once(async move {
        finished.send_replace(true);
        None::<Result<Frame<Bytes>, io::Error>>
    })
    .filter_map(future::ready);

    let frames = head
        .chain(document)
        .inspect(move |_| progress.send_modify(|_| {}))
        .chain(done);
    StreamBody::new(frames).boxed_unsync()
}

/// Wait for the response head of a request whose body reports progress on
/// `upload`. Returns `None` when the socket timeout passes without upload
/// progress, or passes after the upload finished without a response.
async fn await_response<F: Future>(
    pending: F,
    mut upload: watch::Receiver<bool>,
    socket_timeout: Duration,
) -> Option<F::Output> {
    let mut pending = pin!(pending);
    let mut uploading = true;
    while uploading {
        tokio::select! {
            output = &mut pending => return Some(output),
            progress = timeout(socket_timeout, upload.changed()) => match progress {
                Err(_) => return None,
                Ok(Ok(())) => uploading = !*upload.borrow_and_update(),
                // The body was dropped, so nothing more will be sent.
                Ok(Err(_)) => uploading = false,
            },
        }
    }
    timeout(socket_timeout, pending).await.ok()
}

fn response_body_error(uri: &str, error: &(dyn StdError + Send + Sync + 'static)) -> ConnectionError {
    let detail = if error.is::<LengthLimitError>() {
        format!("response body exceeds {MAX_RESPONSE_BYTES} bytes")
    } else {
        error_chain(error)
    };
    ConnectionError::Http {
        uri: uri.to_string(),
        detail,
    }
}

fn classify_client_error(uri: &str, error: &hyper_util::client::legacy::Error) -> ConnectionError {
    let detail = error_chain(error);
    if error.is_connect() {
        ConnectionError::Connect {
            uri: uri.to_string(),
            detail,
        }
    } else {
        ConnectionError::Http {
            uri: uri.to_string(),
            detail,
        }
    }
}

/// `outer: inner: root` rendering of an error and its sources.
fn error_chain(error: &dyn StdError) -> String {
    let mut detail = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        detail.push_str(": ");
        detail.push_str(&cause.to_string());
        source = cause.source();
    }
    detail
}

#[cfg(test)]
mod tests {
    use std::io::Write as _;
    use std::net::SocketAddr;
    use std::sync::atomic::AtomicUsize;
    use std::sync::{Arc, Mutex};

    use tokio::io::AsyncWriteExt;
    use tokio::net::{TcpListener, TcpStream};

    use pressgang_core::config::BreakerConfig;
    use pressgang_core::printer::PrinterDescription;
    use pressgang_core::types::{DocumentMeta, PrintRequest};
    use pressgang_ipp::dictionary::*;
    use pressgang_ipp::tag::*;
    use pressgang_ipp::{AttrValue, SyntaxKind};

    use super::*;
    use crate::breaker::CircuitState;
    use crate::builder::build_print_job_request;

    // -----------------------------------------------------------------------
    // Fake spooler: minimal HTTP/1.1 keep-alive server answering IPP
    // -----------------------------------------------------------------------

    #[derive(Clone, Copy)]
    enum Behaviour {
        Status(u16),
        Garbage,
        Hang,
        Oversized,
    }

    struct Recorded {
        head: String,
        body: Vec<u8>,
    }

    struct FakeSpooler {
        addr: SocketAddr,
        requests: Arc<Mutex<Vec<Recorded>>>,
        connections: Arc<AtomicUsize>,
    }

    impl FakeSpooler {
        async fn start(behaviour: Behaviour) -> Self {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            let addr = listener.local_addr().unwrap();
            let requests = Arc::new(Mutex::new(Vec::new()));
            let connections = Arc::new(AtomicUsize::new(0));

            let (reqs, conns) = (requests.clone(), connections.clone());
            tokio::spawn(async move {
                while let Ok((stream, _)) = listener.accept().await {
                    conns.fetch_add(1, Ordering::SeqCst);
                    tokio::spawn(serve(stream, behaviour, reqs.clone()));
                }
            });

            Self {
                addr,
                requests,
                connections,
            }
        }

        fn uri(&self) -> String {
            format!("ipp://127.0.0.1:{}/printers/office", self.addr.port())
        }

        fn bodies(&self) -> Vec<Vec<u8>> {
            self.requests.lock().unwrap().iter().map(|r| r.body.clone()).collect()
        }
    }

    fn find_subsequence(haystack: &[u8], needle: &[u8]) -> Option<usize> {
        haystack.windows(needle.len()).position(|w| w == needle)
    }

    async fn serve(mut stream: TcpStream, behaviour: Behaviour, requests: Arc<Mutex<Vec<Recorded>>>) {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 8192];
        loop {
            let head_end = loop {
                if let Some(pos) = find_subsequence(&buf, b"\r\n\r\n") {
                    break pos + 4;
                }
                match stream.read(&mut chunk).await {
                    Ok(0) | Err(_) => return,
                    Ok(n) => buf.extend_from_slice(&chunk[..n]),
                }
            };
            let head = String::from_utf8_lossy(&buf[..head_end]).into_owned();
            let content_length = head
                .lines()
                .filter_map(|line| line.split_once(':'))
                .find(|(name, _)| name.eq_ignore_ascii_case("content-length"))
                .and_then(|(_, value)| value.trim().parse::<usize>().ok())
                .unwrap_or(0);
            while buf.len() < head_end + content_length {
                match stream.read(&mut chunk).await {
                    Ok(0) | Err(_) => return,
                    Ok(n) => buf.extend_from_slice(&chunk[..n]),
                }
            }
            let body: Vec<u8> = buf.drain(..head_end + content_length).skip(head_end).collect();
            let request_id = read_message(&body).message.request_id;
            requests.lock().unwrap().push(Recorded { head, body });

            let payload = match behaviour {
                Behaviour::Status(status) => ipp_response(status, request_id),
                Behaviour::Garbage => b"this is not IPP".to_vec(),
                Behaviour::Oversized => vec![0u8; MAX_RESPONSE_BYTES + 1],
                Behaviour::Hang => {
                    tokio::time::sleep(Duration::from_secs(30)).await;
                    return;
                }
            };
            let mut response = format!(
                "HTTP/1.1 200 OK\r\nContent-Type: application/ipp\r\nContent-Length: {}\r\n\r\n",
                payload.len()
            )
            .into_bytes();
            response.extend_from_slice(&payload);
            if stream.write_all(&response).await.is_err() {
                return;
            }
        }
    }

    fn ipp_response(status: u16, request_id: u32) -> Vec<u8> {
        let mut operation = AttrGroup::new(GroupTag::Operation);
        operation
            .add_value(AttrValue::of(ATTRIBUTES_CHARSET, SyntaxKind::Charset, "utf-8"))
            .add_value(AttrValue::of(ATTRIBUTES_NATURAL_LANGUAGE, SyntaxKind::NaturalLanguage, "en"));
        let mut job = AttrGroup::new(GroupTag::Job);
        job.add_value(AttrValue::of("job-id", SyntaxKind::Integer, "17"))
            .add_value(AttrValue::of("job-state", SyntaxKind::Enum, "3"));
        IppWriter::new()
            .write(status, request_id, &[operation, job], MessageCharset::Utf8)
            .bytes
            .to_vec()
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    }

    fn test_config() -> TransportConfig {
        let route = RouteConfig {
            connect_timeout_ms: 1_000,
            socket_timeout_ms: 2_000,
        };
        TransportConfig {
            local: route.clone(),
            remote: route,
            max_connections_per_route: 4,
            pool_acquire_timeout_ms: 1_000,
            pool_idle_timeout_ms: 5_000,
            breaker: BreakerConfig {
                failure_threshold: 3,
                cool_down_ms: 60_000,
            },
        }
    }

    fn print_job_groups(uri: &str) -> Vec<AttrGroup> {
        let mut operation = AttrGroup::new(GroupTag::Operation);
        operation
            .add_value(AttrValue::of(ATTRIBUTES_CHARSET, SyntaxKind::Charset, "utf-8"))
            .add_value(AttrValue::of(ATTRIBUTES_NATURAL_LANGUAGE, SyntaxKind::NaturalLanguage, "en"))
            .add_value(AttrValue::of(PRINTER_URI, SyntaxKind::Uri, uri))
            .add_value(AttrValue::of(REQUESTING_USER_NAME, SyntaxKind::Name, "tester"));
        vec![operation]
    }

    /// A loopback port with nothing listening on it.
    async fn dead_port() -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap().port()
    }

    // -----------------------------------------------------------------------
    // Tests
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn print_job_round_trip() {
        init_tracing();
        let spooler = FakeSpooler::start(Behaviour::Status(STATUS_OK)).await;
        let transport = IppTransport::new(test_config());
        let endpoint = Endpoint::local(&spooler.uri()).unwrap();

        let response = transport
            .send(&endpoint, OP_PRINT_JOB, &print_job_groups(&spooler.uri()), None)
            .await
            .unwrap();

        assert_eq!(response.status, STATUS_OK);
        let job = response.group(GroupTag::Job).unwrap();
        assert_eq!(job.first_value("job-id"), Some("17"));

        let recorded = spooler.requests.lock().unwrap();
        let head = recorded[0].head.to_ascii_lowercase();
        assert!(head.starts_with("post /printers/office http/1.1"));
        assert!(head.contains("content-type: application/ipp"));
        let sent = read_message(&recorded[0].body).into_result().unwrap();
        assert_eq!(sent.operation_id(), OP_PRINT_JOB);
        assert_eq!(
            sent.group(GroupTag::Operation).unwrap().first_value(REQUESTING_USER_NAME),
            Some("tester")
        );
    }

    #[tokio::test]
    async fn built_print_job_reaches_spooler() {
        let spooler = FakeSpooler::start(Behaviour::Status(STATUS_OK)).await;
        let transport = IppTransport::new(test_config());
        let endpoint = Endpoint::local(&spooler.uri()).unwrap();

        let printer = PrinterDescription {
            name: "office".into(),
            printer_uri: spooler.uri(),
            ..Default::default()
        };
        let document = DocumentMeta {
            byte_len: 4096,
            document_name: "invoice.pdf".into(),
            job_name: "Invoice".into(),
            requesting_user: "tester".into(),
        };
        let request = PrintRequest {
            copies: 2,
            ..Default::default()
        }
        .with_option("media", "iso_a4_210x297mm");
        let built = build_print_job_request(&request, &printer, &document, &AttrDictionary::standard());

        transport.send_message(&endpoint, &built.message, None).await.unwrap();

        let sent = read_message(&spooler.bodies()[0]).into_result().unwrap();
        let job = sent.group(GroupTag::Job).unwrap();
        assert_eq!(job.first_value("copies"), Some("2"));
        let size = job.find_collection("media-col/media-size").unwrap();
        assert_eq!(size.first_value("x-dimension"), Some("21000"));
        assert_eq!(
            sent.group(GroupTag::Operation).unwrap().first_value("job-k-octets"),
            Some("4")
        );
    }

    #[tokio::test]
    async fn request_ids_strictly_increase() {
        let spooler = FakeSpooler::start(Behaviour::Status(STATUS_OK)).await;
        let transport = IppTransport::new(test_config());
        let endpoint = Endpoint::local(&spooler.uri()).unwrap();
        let groups = print_job_groups(&spooler.uri());

        let mut seen = Vec::new();
        for _ in 0..4 {
            let response = transport
                .send(&endpoint, OP_GET_PRINTER_ATTRIBUTES, &groups, None)
                .await
                .unwrap();
            seen.push(response.request_id);
        }

        let sent: Vec<u32> = spooler
            .bodies()
            .iter()
            .map(|body| read_message(body).message.request_id)
            .collect();
        assert_eq!(sent, seen);
        assert!(sent.iter().all(|&id| id != 0));
        assert!(sent.windows(2).all(|pair| pair[0] < pair[1]));
    }

    #[tokio::test]
    async fn document_is_streamed_after_header() {
        let spooler = FakeSpooler::start(Behaviour::Status(STATUS_OK)).await;
        let transport = IppTransport::new(test_config());
        let endpoint = Endpoint::local(&spooler.uri()).unwrap();

        let mut document = tempfile::NamedTempFile::new().unwrap();
        let content: Vec<u8> = (0..300 * 1024).map(|i| (i % 251) as u8).collect();
        document.write_all(&content).unwrap();
        document.flush().unwrap();

        transport
            .send(
                &endpoint,
                OP_PRINT_JOB,
                &print_job_groups(&spooler.uri()),
                Some(document.path()),
            )
            .await
            .unwrap();

        let bodies = spooler.bodies();
        let sent = read_message(&bodies[0]).into_result().unwrap();
        assert_eq!(sent.document.as_deref(), Some(content.as_slice()));
    }

    #[tokio::test]
    async fn missing_document_is_an_io_error() {
        let spooler = FakeSpooler::start(Behaviour::Status(STATUS_OK)).await;
        let transport = IppTransport::new(test_config());
        let endpoint = Endpoint::local(&spooler.uri()).unwrap();

        let err = transport
            .send(
                &endpoint,
                OP_PRINT_JOB,
                &print_job_groups(&spooler.uri()),
                Some(Path::new("/nonexistent/pressgang/job.pdf")),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ConnectionError::Io(_)));
        assert_eq!(transport.breaker(EndpointClass::Local).consecutive_failures(), 0);
        assert_eq!(spooler.connections.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn circuit_opens_and_fails_fast_without_io() {
        init_tracing();
        let transport = IppTransport::new(test_config());
        let dead = Endpoint::remote(&format!("ipp://127.0.0.1:{}/printers/gone", dead_port().await)).unwrap();
        let groups = print_job_groups(dead.uri());

        for _ in 0..3 {
            let err = transport.send(&dead, OP_PRINT_JOB, &groups, None).await.unwrap_err();
            assert!(matches!(err, ConnectionError::Connect { .. }), "{err}");
        }
        assert_eq!(transport.breaker(EndpointClass::Remote).state(), CircuitState::Open);

        // A healthy remote spooler is not contacted while the circuit is open.
        let spooler = FakeSpooler::start(Behaviour::Status(STATUS_OK)).await;
        let healthy = Endpoint::remote(&spooler.uri()).unwrap();
        let err = transport.send(&healthy, OP_PRINT_JOB, &groups, None).await.unwrap_err();
        assert!(matches!(err, ConnectionError::CircuitOpen { class: "remote", .. }));
        assert_eq!(spooler.connections.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn remote_failures_leave_local_route_alone() {
        let transport = IppTransport::new(test_config());
        let dead = Endpoint::remote(&format!("ipp://127.0.0.1:{}/", dead_port().await)).unwrap();
        let groups = print_job_groups(dead.uri());
        for _ in 0..3 {
            let _ = transport.send(&dead, OP_PRINT_JOB, &groups, None).await;
        }

        let local = transport.breaker(EndpointClass::Local);
        assert_eq!(local.state(), CircuitState::Closed);
        assert_eq!(local.consecutive_failures(), 0);

        let spooler = FakeSpooler::start(Behaviour::Status(STATUS_OK)).await;
        let endpoint = Endpoint::local(&spooler.uri()).unwrap();
        assert!(transport.send(&endpoint, OP_PRINT_JOB, &groups, None).await.is_ok());
        assert_eq!(transport.breaker(EndpointClass::Remote).state(), CircuitState::Open);
    }

    #[tokio::test]
    async fn error_status_is_returned_but_not_counted() {
        let spooler = FakeSpooler::start(Behaviour::Status(STATUS_CLIENT_ERROR_BAD_REQUEST)).await;
        let transport = IppTransport::new(test_config());
        let endpoint = Endpoint::local(&spooler.uri()).unwrap();
        let groups = print_job_groups(&spooler.uri());

        for _ in 0..4 {
            let err = transport.send(&endpoint, OP_PRINT_JOB, &groups, None).await.unwrap_err();
            assert!(matches!(err, ConnectionError::Status { code: 0x0400, .. }));
        }
        assert_eq!(transport.breaker(EndpointClass::Local).state(), CircuitState::Closed);
    }

    #[tokio::test]
    async fn not_found_is_a_response() {
        let spooler = FakeSpooler::start(Behaviour::Status(STATUS_CLIENT_ERROR_NOT_FOUND)).await;
        let transport = IppTransport::new(test_config());
        let endpoint = Endpoint::local(&spooler.uri()).unwrap();

        let response = transport
            .send(&endpoint, OP_GET_PRINTER_ATTRIBUTES, &print_job_groups(&spooler.uri()), None)
            .await
            .unwrap();
        assert!(response.is_not_found());
    }

    #[tokio::test]
    async fn malformed_response_counts_as_failure() {
        let spooler = FakeSpooler::start(Behaviour::Garbage).await;
        let transport = IppTransport::new(test_config());
        let endpoint = Endpoint::local(&spooler.uri()).unwrap();

        let err = transport
            .send(&endpoint, OP_PRINT_JOB, &print_job_groups(&spooler.uri()), None)
            .await
            .unwrap_err();
        assert!(matches!(err, ConnectionError::Malformed { .. }));
        assert_eq!(transport.breaker(EndpointClass::Local).consecutive_failures(), 1);
    }

    #[tokio::test]
    async fn silent_spooler_times_out() {
        let spooler = FakeSpooler::start(Behaviour::Hang).await;
        let mut config = test_config();
        config.local.socket_timeout_ms = 100;
        let transport = IppTransport::new(config);
        let endpoint = Endpoint::local(&spooler.uri()).unwrap();

        let err = transport
            .send(&endpoint, OP_PRINT_JOB, &print_job_groups(&spooler.uri()), None)
            .await
            .unwrap_err();
        assert!(matches!(err, ConnectionError::Timeout { timeout_ms: 100, .. }));
    }

    #[tokio::test]
    async fn cancelled_probe_does_not_wedge_the_circuit() {
        let mut config = test_config();
        config.breaker = BreakerConfig {
            failure_threshold: 1,
            cool_down_ms: 50,
        };
        let transport = IppTransport::new(config);
        let dead = Endpoint::local(&format!("ipp://127.0.0.1:{}/", dead_port().await)).unwrap();
        let groups = print_job_groups(dead.uri());
        let _ = transport.send(&dead, OP_PRINT_JOB, &groups, None).await;
        assert_eq!(transport.breaker(EndpointClass::Local).state(), CircuitState::Open);
        tokio::time::sleep(Duration::from_millis(80)).await;

        // The half-open request is abandoned by its caller mid-flight.
        let hanging = FakeSpooler::start(Behaviour::Hang).await;
        let stuck = Endpoint::local(&hanging.uri()).unwrap();
        let abandoned = timeout(
            Duration::from_millis(100),
            transport.send(&stuck, OP_PRINT_JOB, &groups, None),
        )
        .await;
        assert!(abandoned.is_err());
        assert_eq!(transport.breaker(EndpointClass::Local).state(), CircuitState::Open);

        let spooler = FakeSpooler::start(Behaviour::Status(STATUS_OK)).await;
        let healthy = Endpoint::local(&spooler.uri()).unwrap();
        transport.send(&healthy, OP_PRINT_JOB, &groups, None).await.unwrap();
        assert_eq!(transport.breaker(EndpointClass::Local).state(), CircuitState::Closed);
        assert_eq!(spooler.connections.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn oversized_response_is_refused() {
        let spooler = FakeSpooler::start(Behaviour::Oversized).await;
        let transport = IppTransport::new(test_config());
        let endpoint = Endpoint::local(&spooler.uri()).unwrap();

        let err = transport
            .send(&endpoint, OP_PRINT_JOB, &print_job_groups(&spooler.uri()), None)
            .await
            .unwrap_err();
        assert!(
            matches!(&err, ConnectionError::Http { detail, .. } if detail.contains("exceeds")),
            "{err}"
        );
    }

    #[tokio::test]
    async fn slow_upload_does_not_count_as_silence() {
        let (upload, progress) = watch::channel(false);
        tokio::spawn(async move {
            for _ in 0..8 {
                tokio::time::sleep(Duration::from_millis(40)).await;
                upload.send_modify(|_| {});
            }
            upload.send_replace(true);
        });
        let head = async {
            tokio::time::sleep(Duration::from_millis(360)).await;
            "head"
        };

        let response = await_response(head, progress, Duration::from_millis(100)).await;
        assert_eq!(response, Some("head"));
    }

    #[tokio::test]
    async fn stalled_upload_times_out() {
        let (_upload, progress) = watch::channel(false);
        let response = await_response(future::pending::<()>(), progress, Duration::from_millis(50)).await;
        assert!(response.is_none());
    }

    #[tokio::test]
    async fn silence_after_upload_times_out() {
        let (upload, progress) = watch::channel(false);
        upload.send_replace(true);
        let response = await_response(future::pending::<()>(), progress, Duration::from_millis(50)).await;
        assert!(response.is_none());
    }

    #[tokio::test]
    async fn shutdown_refuses_new_sends() {
        let spooler = FakeSpooler::start(Behaviour::Status(STATUS_OK)).await;
        let transport = IppTransport::new(test_config());
        let endpoint = Endpoint::local(&spooler.uri()).unwrap();

        transport.shutdown();
        assert!(transport.is_shutting_down());
        let err = transport
            .send(&endpoint, OP_PRINT_JOB, &print_job_groups(&spooler.uri()), None)
            .await
            .unwrap_err();
        assert!(matches!(err, ConnectionError::ShutDown));
        assert_eq!(transport.breaker(EndpointClass::Local).consecutive_failures(), 0);
        assert_eq!(spooler.connections.load(Ordering::SeqCst), 0);
    }
}
