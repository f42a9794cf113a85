//! Construction of the HTTP requests of the RDF4J transaction protocol.
//!
//! | Operation | Method | Target | Parameters |
//! |---|---|---|---|
//! | begin | `POST` | `{repository}/transactions` | |
//! | query | `POST` | `{repository}{query path}` | body `query=…` |
//! | query in a transaction | `PUT` | `{transaction}` | `action=QUERY&query=…` |
//! | update | `PUT` | `{transaction}` | `action=UPDATE[&baseUri=…]&update=…` |
//! | save graph | `PUT` | `{transaction}` | `action=ADD&baseUri=…`, body is the graph |
//! | delete graph | `PUT` | `{transaction}` | `action=DELETE&baseURI=…` |
//! | commit | `PUT` | `{transaction}` | `action=COMMIT` |
//! | rollback | `PUT` | `{transaction}` | |

use crate::config::Endpoints;
use graphtx_model::NamedNodeRef;
use http::header::{ACCEPT, CONTENT_TYPE};
use http::{Method, Request};
use regex::Regex;
use spargebra::Query;
use std::sync::LazyLock;
use url::form_urlencoded;
use url::Url;

/// Accept header of queries answered with a SPARQL result set.
pub const SPARQL_RESULTS_ACCEPT: &str = "application/sparql-results+json, application/sparql-results+xml;q=0.9, text/tab-separated-values;q=0.5, text/csv;q=0.4";

/// Accept header of queries answered with a graph.
pub const RDF_ACCEPT: &str = "text/turtle, application/n-triples;q=0.9, application/rdf+xml;q=0.8, application/n-quads;q=0.7, application/trig;q=0.7";

/// Accept header of queries whose answer shape is unknown.
pub const RDF_OR_SPARQL_RESULTS_ACCEPT: &str = "application/sparql-results+json, application/sparql-results+xml;q=0.9, text/turtle;q=0.9, application/n-triples;q=0.8, application/rdf+xml;q=0.8, text/tab-separated-values;q=0.5, text/csv;q=0.4, application/n-quads;q=0.4, application/trig;q=0.4, text/plain;q=0.1";

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded;charset=utf-8";
const ANY: &str = "*/*";

#[allow(clippy::expect_used, reason = "The pattern is a valid constant")]
static ASK_KEYWORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bASK\b").expect("valid ASK pattern"));

/// The shape of a query, as far as it can be determined locally.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum QueryKind {
    Ask,
    Select,
    ConstructOrDescribe,
    /// The query could not be parsed locally. It is still sent to the store.
    Unknown,
}

impl QueryKind {
    /// Classifies the query by parsing it.
    pub fn classify(query: &str) -> Self {
        match Query::parse(query, None) {
            Ok(Query::Select { .. }) => Self::Select,
            Ok(Query::Ask { .. }) => Self::Ask,
            Ok(Query::Construct { .. } | Query::Describe { .. }) => Self::ConstructOrDescribe,
            Err(_) => Self::Unknown,
        }
    }

    /// Whether the store answers with a SPARQL result set.
    pub fn expects_result_set(self) -> bool {
        matches!(self, Self::Ask | Self::Select)
    }
}

/// A SPARQL query together with the options governing its evaluation and decoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryRequest {
    text: String,
    kind: QueryKind,
    looks_like_ask: bool,
    allow_plain_text_results: bool,
    inference: bool,
}

impl QueryRequest {
    /// Wraps and classifies a query. Plain-text results are allowed and inference is disabled.
    pub fn new(text: impl Into<String>) -> Self {
        let text = text.into();
        let kind = QueryKind::classify(&text);
        let looks_like_ask = match kind {
            QueryKind::Ask => true,
            QueryKind::Unknown => ASK_KEYWORD.is_match(&text),
            QueryKind::Select | QueryKind::ConstructOrDescribe => false,
        };
        Self {
            text,
            kind,
            looks_like_ask,
            allow_plain_text_results: true,
            inference: false,
        }
    }

    /// Whether a `text/plain` or `text/boolean` answer may be decoded as a boolean.
    ///
    /// The flag only matters for queries that can not be classified locally.
    #[must_use]
    pub fn with_plain_text_results(mut self, allow: bool) -> Self {
        self.allow_plain_text_results = allow;
        self
    }

    /// Asks the store to evaluate the query with inferred statements (`infer=true`).
    #[must_use]
    pub fn with_inference(mut self, inference: bool) -> Self {
        self.inference = inference;
        self
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn kind(&self) -> QueryKind {
        self.kind
    }

    pub fn inference(&self) -> bool {
        self.inference
    }

    /// The `Accept` header to send and whether plain-text answers may be decoded.
    pub fn negotiation(&self) -> Negotiation {
        match self.kind {
            QueryKind::Ask | QueryKind::Select => Negotiation {
                accept: SPARQL_RESULTS_ACCEPT,
                allow_plain_text_results: false,
            },
            QueryKind::ConstructOrDescribe => Negotiation {
                accept: RDF_ACCEPT,
                allow_plain_text_results: false,
            },
            QueryKind::Unknown => Negotiation {
                accept: RDF_OR_SPARQL_RESULTS_ACCEPT,
                allow_plain_text_results: self.allow_plain_text_results && self.looks_like_ask,
            },
        }
    }
}

/// The outcome of the result shape negotiation of a [`QueryRequest`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Negotiation {
    pub accept: &'static str,
    pub allow_plain_text_results: bool,
}

/// Replaces every non-ASCII character by its SPARQL escape, `\uXXXX` or `\UXXXXXXXX`.
///
/// ```
/// use graphtx::request::escape_query;
///
/// assert_eq!(escape_query("ASK { ?s ?p \"é\" }"), "ASK { ?s ?p \"\\u00E9\" }");
/// ```
pub fn escape_query(query: &str) -> String {
    let mut escaped = String::with_capacity(query.len());
    for c in query.chars() {
        let code = u32::from(c);
        if c.is_ascii() {
            escaped.push(c);
        } else if code <= 0xFFFF {
            push_escape(&mut escaped, 'u', code, 4);
        } else {
            push_escape(&mut escaped, 'U', code, 8);
        }
    }
    escaped
}

fn push_escape(output: &mut String, marker: char, code: u32, digits: u32) {
    output.push('\\');
    output.push(marker);
    for position in (0..digits).rev() {
        let digit = (code >> (position * 4)) & 0xF;
        output.extend(char::from_digit(digit, 16).map(|d| d.to_ascii_uppercase()));
    }
}

/// `POST {repository}/transactions`
pub fn begin(endpoints: &Endpoints) -> Result<Request<Vec<u8>>, http::Error> {
    build(Method::POST, endpoints.transactions(), ANY, None, Vec::new())
}

/// `PUT {transaction}?action=COMMIT`
pub fn commit(transaction: &Url) -> Result<Request<Vec<u8>>, http::Error> {
    let url = with_parameters(transaction, [("action", "COMMIT")]);
    build(Method::PUT, &url, ANY, None, Vec::new())
}

/// `PUT {transaction}`
pub fn rollback(transaction: &Url) -> Result<Request<Vec<u8>>, http::Error> {
    build(Method::PUT, transaction, ANY, None, Vec::new())
}

/// A query, sent to the query endpoint or, inside a transaction, to the transaction.
pub fn query(
    endpoints: &Endpoints,
    query: &QueryRequest,
    transaction: Option<&Url>,
) -> Result<Request<Vec<u8>>, http::Error> {
    let accept = query.negotiation().accept;
    let escaped = escape_query(query.text());
    let infer = query.inference().then_some(("infer", "true"));
    if let Some(transaction) = transaction {
        let url = with_parameters(
            transaction,
            infer
                .into_iter()
                .chain([("action", "QUERY"), ("query", escaped.as_str())]),
        );
        build(
            Method::PUT,
            &url,
            accept,
            Some(FORM_CONTENT_TYPE),
            Vec::new(),
        )
    } else {
        let url = with_parameters(endpoints.query(), infer);
        let body = form_urlencoded::Serializer::new(String::new())
            .append_pair("query", &escaped)
            .finish();
        build(
            Method::POST,
            &url,
            accept,
            Some(FORM_CONTENT_TYPE),
            body.into_bytes(),
        )
    }
}

/// `PUT {transaction}?action=UPDATE[&baseUri=…]&update=…`
pub fn update(
    transaction: &Url,
    update: &str,
    base: Option<NamedNodeRef<'_>>,
) -> Result<Request<Vec<u8>>, http::Error> {
    let escaped = escape_query(update);
    let url = with_parameters(
        transaction,
        [("action", "UPDATE")]
            .into_iter()
            .chain(base.map(|base| ("baseUri", base.as_str())))
            .chain([("update", escaped.as_str())]),
    );
    build(Method::PUT, &url, ANY, Some(FORM_CONTENT_TYPE), Vec::new())
}

/// `PUT {transaction}?action=ADD&baseUri=…` with the serialized graph as body.
pub fn save_graph(
    transaction: &Url,
    graph: NamedNodeRef<'_>,
    content_type: &str,
    body: Vec<u8>,
) -> Result<Request<Vec<u8>>, http::Error> {
    let url = with_parameters(
        transaction,
        [("action", "ADD"), ("baseUri", graph.as_str())],
    );
    build(Method::PUT, &url, ANY, Some(content_type), body)
}

/// `PUT {transaction}?action=DELETE&baseURI=…`
pub fn delete_graph(
    transaction: &Url,
    graph: NamedNodeRef<'_>,
) -> Result<Request<Vec<u8>>, http::Error> {
    let url = with_parameters(
        transaction,
        [("action", "DELETE"), ("baseURI", graph.as_str())],
    );
    build(Method::PUT, &url, ANY, None, Vec::new())
}

fn with_parameters<'a>(url: &Url, parameters: impl IntoIterator<Item = (&'a str, &'a str)>) -> Url {
    let mut url = url.clone();
    let mut parameters = parameters.into_iter().peekable();
    if parameters.peek().is_some() {
        url.query_pairs_mut().extend_pairs(parameters);
    }
    url
}

fn build(
    method: Method,
    url: &Url,
    accept: &str,
    content_type: Option<&str>,
    body: Vec<u8>,
) -> Result<Request<Vec<u8>>, http::Error> {
    let mut request = Request::builder()
        .method(method)
        .uri(url.as_str())
        .header(ACCEPT, accept);
    if let Some(content_type) = content_type {
        request = request.header(CONTENT_TYPE, content_type);
    }
    request.body(body)
}
