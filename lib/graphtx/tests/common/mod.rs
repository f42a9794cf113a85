#![allow(dead_code, reason = "Each test binary uses a different subset of the helpers")]

use graphtx::model::{NamedNode, Quad};
use graphtx::{ClientConfig, GraphDbClient, HttpTransport, TransportError};
use http::header::{HeaderName, CONTENT_TYPE, LOCATION};
use http::{HeaderMap, Method, Request, Response, StatusCode};
use oxigraph::sparql::results::QueryResultsFormat;
use oxigraph::sparql::{Query, QueryResults, Update};
use oxigraph::store::Store;
use oxrdfio::{RdfFormat, RdfParser};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;
use url::{form_urlencoded, Url};
use uuid::Uuid;

pub const SERVER: &str = "http://localhost:7200";
pub const REPOSITORY: &str = "test";
pub const REPOSITORY_PATH: &str = "/repositories/test";

pub fn config() -> ClientConfig {
    ClientConfig::new(SERVER, REPOSITORY).unwrap()
}

pub fn client<T: HttpTransport>(transport: T) -> GraphDbClient<T> {
    GraphDbClient::with_transport(&config(), transport)
}

pub fn ex(name: &str) -> NamedNode {
    NamedNode::new_unchecked(format!("http://example.com/{name}"))
}

/// A request as seen by a test transport.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl RecordedRequest {
    fn new(request: &Request<Vec<u8>>) -> Self {
        Self {
            method: request.method().clone(),
            url: Url::parse(&request.uri().to_string()).unwrap(),
            headers: request.headers().clone(),
            body: request.body().clone(),
        }
    }

    /// A parameter of the URL query string.
    pub fn param(&self, name: &str) -> Option<String> {
        self.url
            .query_pairs()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.into_owned())
    }

    /// A parameter of the form encoded body.
    pub fn form(&self, name: &str) -> Option<String> {
        form_urlencoded::parse(&self.body)
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.into_owned())
    }

    pub fn header(&self, name: HeaderName) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

#[derive(Debug, Default)]
pub struct Recorder {
    requests: Mutex<Vec<RecordedRequest>>,
}

impl Recorder {
    fn record(&self, request: &Request<Vec<u8>>) -> RecordedRequest {
        let request = RecordedRequest::new(request);
        self.requests.lock().unwrap().push(request.clone());
        request
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn last(&self) -> Option<RecordedRequest> {
        self.requests.lock().unwrap().last().cloned()
    }
}

pub fn response(
    status: StatusCode,
    content_type: Option<&str>,
    body: impl Into<Vec<u8>>,
) -> Response<Vec<u8>> {
    let mut response = Response::builder().status(status);
    if let Some(content_type) = content_type {
        response = response.header(CONTENT_TYPE, content_type);
    }
    response.body(body.into()).unwrap()
}

pub fn begin_response(location: &str) -> Response<Vec<u8>> {
    Response::builder()
        .status(StatusCode::CREATED)
        .header(LOCATION, location)
        .body(Vec::new())
        .unwrap()
}

/// Answers requests with a scripted sequence of responses.
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    pub recorder: Recorder,
    responses: Mutex<VecDeque<Result<Response<Vec<u8>>, TransportError>>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn then(self, response: Response<Vec<u8>>) -> Self {
        self.responses.lock().unwrap().push_back(Ok(response));
        self
    }

    #[must_use]
    pub fn then_fail(self, error: TransportError) -> Self {
        self.responses.lock().unwrap().push_back(Err(error));
        self
    }

    /// Answers the next request with a freshly started transaction.
    #[must_use]
    pub fn then_begin(self) -> Self {
        let location = format!("{REPOSITORY_PATH}/transactions/{}", Uuid::new_v4());
        self.then(begin_response(&location))
    }
}

impl HttpTransport for ScriptedTransport {
    fn send(&self, request: Request<Vec<u8>>) -> Result<Response<Vec<u8>>, TransportError> {
        self.recorder.record(&request);
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| {
                Ok(response(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Some("text/plain"),
                    "unexpected request",
                ))
            })
    }
}

struct State {
    committed: Store,
    transactions: HashMap<Uuid, Store>,
    updates_before_failure: Option<usize>,
}

/// An in-memory store implementing the RDF4J transaction protocol on top of an oxigraph [`Store`].
///
/// Every transaction works on its own copy of the committed data, which replaces it on commit.
/// Uploaded graphs land in the named graph given by `baseUri`. The default graph of queries is the
/// union of all graphs.
pub struct FakeGraphDb {
    pub recorder: Recorder,
    state: Mutex<State>,
}

impl FakeGraphDb {
    pub fn new() -> Self {
        Self {
            recorder: Recorder::default(),
            state: Mutex::new(State {
                committed: Store::new().unwrap(),
                transactions: HashMap::new(),
                updates_before_failure: None,
            }),
        }
    }

    /// Makes the update request following the next `count` ones fail.
    pub fn fail_update_after(&self, count: usize) {
        self.state.lock().unwrap().updates_before_failure = Some(count);
    }

    pub fn committed(&self) -> HashSet<Quad> {
        self.state
            .lock()
            .unwrap()
            .committed
            .iter()
            .collect::<Result<_, _>>()
            .unwrap()
    }

    pub fn open_transactions(&self) -> usize {
        self.state.lock().unwrap().transactions.len()
    }

    fn handle(&self, request: &RecordedRequest) -> Response<Vec<u8>> {
        let Some(path) = request.url.path().strip_prefix(REPOSITORY_PATH) else {
            return response(StatusCode::NOT_FOUND, Some("text/plain"), "Unknown repository");
        };
        let mut state = self.state.lock().unwrap();
        if request.method == Method::POST && path == "/transactions" {
            let id = Uuid::new_v4();
            let working = Store::new().unwrap();
            working
                .extend(state.committed.iter().map(Result::unwrap))
                .unwrap();
            state.transactions.insert(id, working);
            return begin_response(&format!("{REPOSITORY_PATH}/transactions/{id}"));
        }
        if request.method == Method::POST && path.is_empty() {
            let Some(query) = request.form("query") else {
                return bad_request("Missing parameter: query");
            };
            return evaluate(&query, &state.committed);
        }
        let id = path
            .strip_prefix("/transactions/")
            .and_then(|id| Uuid::parse_str(id).ok());
        let (Some(id), true) = (id, request.method == Method::PUT) else {
            return response(StatusCode::NOT_FOUND, Some("text/plain"), "Not found");
        };
        let State {
            committed,
            transactions,
            updates_before_failure,
        } = &mut *state;
        let action = request.param("action");
        match action.as_deref() {
            None => {
                return match transactions.remove(&id) {
                    Some(_) => response(StatusCode::NO_CONTENT, None, ""),
                    None => unknown_transaction(id),
                };
            }
            Some("COMMIT") => {
                return match transactions.remove(&id) {
                    Some(working) => {
                        *committed = working;
                        response(StatusCode::OK, None, "")
                    }
                    None => unknown_transaction(id),
                };
            }
            Some(_) => (),
        }
        let Some(working) = transactions.get(&id) else {
            return unknown_transaction(id);
        };
        match action.as_deref().unwrap_or_default() {
            "QUERY" => match request.param("query") {
                Some(query) => evaluate(&query, working),
                None => bad_request("Missing parameter: query"),
            },
            "UPDATE" => {
                if let Some(remaining) = updates_before_failure {
                    if *remaining == 0 {
                        *updates_before_failure = None;
                        return bad_request("MALFORMED QUERY: injected failure");
                    }
                    *remaining -= 1;
                }
                match request.param("update") {
                    Some(update) => {
                        apply_update(&update, request.param("baseUri").as_deref(), working)
                    }
                    None => bad_request("Missing parameter: update"),
                }
            }
            "ADD" => add(request, working),
            "DELETE" => match request.param("baseURI") {
                Some(graph) => {
                    working
                        .remove_named_graph(NamedNode::new_unchecked(graph).as_ref())
                        .unwrap();
                    response(StatusCode::OK, None, "")
                }
                None => bad_request("Missing parameter: baseURI"),
            },
            action => bad_request(format!("Unsupported action {action}")),
        }
    }
}

impl HttpTransport for FakeGraphDb {
    fn send(&self, request: Request<Vec<u8>>) -> Result<Response<Vec<u8>>, TransportError> {
        let request = self.recorder.record(&request);
        Ok(self.handle(&request))
    }
}

fn bad_request(message: impl Into<Vec<u8>>) -> Response<Vec<u8>> {
    response(StatusCode::BAD_REQUEST, Some("text/plain"), message)
}

fn unknown_transaction(id: Uuid) -> Response<Vec<u8>> {
    response(
        StatusCode::NOT_FOUND,
        Some("text/plain"),
        format!("Transaction with id {id} not found"),
    )
}

fn add(request: &RecordedRequest, working: &Store) -> Response<Vec<u8>> {
    let Some(graph) = request.param("baseUri") else {
        return bad_request("Missing parameter: baseUri");
    };
    let Some(format) = request
        .header(CONTENT_TYPE)
        .and_then(RdfFormat::from_media_type)
    else {
        return response(
            StatusCode::UNSUPPORTED_MEDIA_TYPE,
            Some("text/plain"),
            "Unsupported RDF format",
        );
    };
    let quads = RdfParser::from_format(format)
        .with_default_graph(NamedNode::new_unchecked(graph))
        .for_reader(request.body.as_slice())
        .collect::<Result<Vec<_>, _>>();
    match quads {
        Ok(quads) => {
            working.extend(quads).unwrap();
            response(StatusCode::OK, None, "")
        }
        Err(e) => bad_request(e.to_string()),
    }
}

fn apply_update(update: &str, base: Option<&str>, working: &Store) -> Response<Vec<u8>> {
    let update = match Update::parse(update, base) {
        Ok(update) => update,
        Err(e) => return bad_request(format!("MALFORMED QUERY: {e}")),
    };
    match working.update(update) {
        Ok(()) => response(StatusCode::NO_CONTENT, None, ""),
        Err(e) => response(
            StatusCode::INTERNAL_SERVER_ERROR,
            Some("text/plain"),
            e.to_string(),
        ),
    }
}

/// Answers `SELECT` and `ASK` in SPARQL JSON, `CONSTRUCT` and `DESCRIBE` in N-Triples.
fn evaluate(query: &str, data: &Store) -> Response<Vec<u8>> {
    let mut query = match Query::parse(query, None) {
        Ok(query) => query,
        Err(e) => return bad_request(format!("MALFORMED QUERY: {e}")),
    };
    query.dataset_mut().set_default_graph_as_union();
    let results = match data.query(query) {
        Ok(results) => results,
        Err(e) => {
            return response(
                StatusCode::INTERNAL_SERVER_ERROR,
                Some("text/plain"),
                e.to_string(),
            )
        }
    };
    let (content_type, body) = if let QueryResults::Graph(_) = results {
        (
            "application/n-triples",
            results.write_graph(Vec::new(), RdfFormat::NTriples),
        )
    } else {
        (
            "application/sparql-results+json",
            results.write(Vec::new(), QueryResultsFormat::Json),
        )
    };
    response(StatusCode::OK, Some(content_type), body.unwrap())
}
