use crate::batch::GraphUpdate;
use crate::config::{ClientConfig, Endpoints};
use crate::error::{ConfigError, GraphDbError, GraphUpdateError, Operation, TransactionStateViolation};
use crate::request::{self, QueryRequest};
use crate::results::{QueryResults, QueryResultsHandler, RdfHandler, ResponseDecoder, ResultSetHandler};
use crate::transaction::{parse_location, IsolationLevel, LocationError, Transaction, TransactionState};
use crate::transport::{HttpTransport, ReqwestTransport};
use graphtx_model::{Graph, NamedNode, NamedNodeRef, Term};
use http::header::{CONTENT_TYPE, LOCATION};
use http::{Request, Response};
use oxrdfio::{RdfFormat, RdfSerializer};
use tracing::debug;
use uuid::Uuid;

const LIST_GRAPHS_QUERY: &str = "SELECT DISTINCT ?g WHERE { GRAPH ?g { ?s ?p ?o } }";

/// A triple store exposing queries, updates and graph management inside explicit transactions.
///
/// Operations bound to a transaction fail with [`GraphDbError::TransactionState`] before any
/// network access if the transaction is not active or belongs to another store instance.
pub trait TransactionalStore {
    /// Opens a new transaction.
    fn begin(&self, isolation_level: IsolationLevel) -> Result<Transaction, GraphDbError>;

    /// Commits the transaction. On failure, the transaction stays active.
    fn commit(&self, transaction: &mut Transaction) -> Result<(), GraphDbError>;

    /// Rolls back the transaction. On failure, the transaction stays active.
    fn rollback(&self, transaction: &mut Transaction) -> Result<(), GraphDbError>;

    /// Evaluates a query and streams its results into the handlers.
    ///
    /// Result sets go to `results_handler` and graphs to `rdf_handler`.
    fn query_with_handlers(
        &self,
        query: &QueryRequest,
        transaction: Option<&Transaction>,
        rdf_handler: &mut dyn RdfHandler,
        results_handler: &mut dyn QueryResultsHandler,
    ) -> Result<(), GraphDbError>;

    /// Executes a SPARQL update, resolving relative IRIs against `base` if given.
    fn update_with_base(
        &self,
        update: &str,
        base: Option<NamedNodeRef<'_>>,
        transaction: &Transaction,
    ) -> Result<(), GraphDbError>;

    /// Uploads the triples of `graph` into the named graph `graph_name`.
    fn save_graph(
        &self,
        graph_name: NamedNodeRef<'_>,
        graph: &Graph,
        transaction: &Transaction,
    ) -> Result<(), GraphDbError>;

    /// Deletes the named graph `graph_name`.
    fn delete_graph(
        &self,
        graph_name: NamedNodeRef<'_>,
        transaction: &Transaction,
    ) -> Result<(), GraphDbError>;

    /// Evaluates a query and collects its results.
    ///
    /// A result set is returned if the response contained one, the graph otherwise.
    fn query(
        &self,
        query: &QueryRequest,
        transaction: Option<&Transaction>,
    ) -> Result<QueryResults, GraphDbError> {
        let mut results = ResultSetHandler::default();
        let mut graph = Graph::new();
        self.query_with_handlers(query, transaction, &mut graph, &mut results)?;
        Ok(results
            .into_query_results()
            .unwrap_or(QueryResults::Graph(graph)))
    }

    /// Evaluates a query with plain-text results allowed and inference disabled.
    fn query_text(
        &self,
        query: &str,
        transaction: Option<&Transaction>,
    ) -> Result<QueryResults, GraphDbError> {
        self.query(&QueryRequest::new(query), transaction)
    }

    /// Executes a SPARQL update.
    fn update(&self, update: &str, transaction: &Transaction) -> Result<(), GraphDbError> {
        self.update_with_base(update, None, transaction)
    }

    /// Executes a SPARQL update with `graph` as base IRI.
    fn update_in_graph(
        &self,
        graph: NamedNodeRef<'_>,
        update: &str,
        transaction: &Transaction,
    ) -> Result<(), GraphDbError> {
        self.update_with_base(update, Some(graph), transaction)
    }

    /// Applies the additions and removals of `update`, one triple per request.
    ///
    /// The first failing request stops the batch. The requests sent before it stay applied inside
    /// the transaction, [`GraphUpdateError::applied`] tells how many.
    fn update_graph(
        &self,
        update: &GraphUpdate,
        transaction: &Transaction,
    ) -> Result<(), GraphUpdateError> {
        let total = update.len();
        if !transaction.is_active() {
            return Err(GraphUpdateError {
                applied: 0,
                total,
                source: GraphDbError::TransactionState {
                    operation: Operation::UpdateGraph,
                    transaction: transaction.id(),
                    violation: TransactionStateViolation::Finished(transaction.state()),
                },
            });
        }
        for (applied, operation) in update.operations().enumerate() {
            self.update_in_graph(update.graph(), &operation, transaction)
                .map_err(|e| GraphUpdateError {
                    applied,
                    total,
                    source: e.with_operation(Operation::UpdateGraph),
                })?;
        }
        Ok(())
    }

    /// Lists the named graphs containing at least one triple.
    fn list_graphs(&self, transaction: Option<&Transaction>) -> Result<Vec<NamedNode>, GraphDbError> {
        let query = QueryRequest::new(LIST_GRAPHS_QUERY).with_plain_text_results(false);
        let results = self
            .query(&query, transaction)
            .map_err(|e| e.with_operation(Operation::ListGraphs))?;
        let QueryResults::Solutions(solutions) = results else {
            return Ok(Vec::new());
        };
        Ok(solutions
            .into_iter()
            .filter_map(|solution| match solution.get("g") {
                Some(Term::NamedNode(graph)) => Some(graph.clone()),
                _ => None,
            })
            .collect())
    }
}

/// A client of a GraphDB (or any RDF4J compatible) repository.
///
/// ```no_run
/// use graphtx::model::{Graph, NamedNodeRef, TripleRef};
/// use graphtx::{ClientConfig, GraphDbClient, IsolationLevel, QueryResults, TransactionalStore};
///
/// let client = GraphDbClient::new(ClientConfig::new("http://localhost:7200", "test")?)?;
/// let graph_name = NamedNodeRef::new("http://example.com/g")?;
/// let ex = NamedNodeRef::new("http://example.com/s")?;
/// let mut graph = Graph::new();
/// graph.insert(TripleRef::new(ex, ex, ex));
///
/// let mut transaction = client.begin(IsolationLevel::default())?;
/// client.save_graph(graph_name, &graph, &transaction)?;
/// let answer = client.query_text("ASK { GRAPH ?g { ?s ?p ?o } }", Some(&transaction))?;
/// assert_eq!(answer, QueryResults::Boolean(true));
/// client.commit(&mut transaction)?;
/// # Result::<_, Box<dyn std::error::Error>>::Ok(())
/// ```
#[derive(Debug)]
pub struct GraphDbClient<T = ReqwestTransport> {
    transport: T,
    endpoints: Endpoints,
    save_format: RdfFormat,
    owner: Uuid,
}

impl GraphDbClient {
    /// Creates a client sending its requests with [`reqwest`].
    pub fn new(config: ClientConfig) -> Result<Self, ConfigError> {
        let transport = ReqwestTransport::new(&config)?;
        Ok(Self::with_transport(&config, transport))
    }
}

impl<T: HttpTransport> GraphDbClient<T> {
    /// Creates a client sending its requests through `transport`.
    ///
    /// Credentials, timeouts and user agent of `config` are the responsibility of the transport.
    pub fn with_transport(config: &ClientConfig, transport: T) -> Self {
        Self {
            transport,
            endpoints: config.endpoints().clone(),
            save_format: config.save_format(),
            owner: Uuid::new_v4(),
        }
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    fn execute(
        &self,
        operation: Operation,
        transaction: Option<Uuid>,
        request: Result<Request<Vec<u8>>, http::Error>,
    ) -> Result<Response<Vec<u8>>, GraphDbError> {
        let request = request.map_err(|e| GraphDbError::unexpected(operation, e))?;
        debug!(
            %operation,
            method = %request.method(),
            url = %request.uri(),
            transaction = transaction.map(tracing::field::display),
            "Sending request"
        );
        let response = self
            .transport
            .send(request)
            .map_err(|e| GraphDbError::from_transport_error(operation, e))?;
        let status = response.status();
        if !status.is_success() {
            debug!(%operation, %status, "The store refused the request");
            return Err(GraphDbError::from_response(
                operation,
                status,
                response.body(),
            ));
        }
        Ok(response)
    }
}

impl<T: HttpTransport> TransactionalStore for GraphDbClient<T> {
    fn begin(&self, isolation_level: IsolationLevel) -> Result<Transaction, GraphDbError> {
        let response = self.execute(
            Operation::Begin,
            None,
            request::begin(&self.endpoints),
        )?;
        let id = response
            .headers()
            .get(LOCATION)
            .ok_or(LocationError::Missing)
            .and_then(|location| location.to_str().map_err(|_| LocationError::NotUtf8))
            .and_then(|location| parse_location(self.endpoints.transactions(), location))
            .map_err(|e| GraphDbError::protocol_violation_from(Operation::Begin, e))?;
        debug!(transaction = %id, ?isolation_level, "Transaction started");
        Ok(Transaction::new(
            id,
            self.endpoints.transaction(id),
            self.owner,
            isolation_level,
        ))
    }

    fn commit(&self, transaction: &mut Transaction) -> Result<(), GraphDbError> {
        transaction.ensure_usable(self.owner, Operation::Commit)?;
        self.execute(
            Operation::Commit,
            Some(transaction.id()),
            request::commit(transaction.url()),
        )?;
        transaction.finish(TransactionState::Committed);
        Ok(())
    }

    fn rollback(&self, transaction: &mut Transaction) -> Result<(), GraphDbError> {
        transaction.ensure_usable(self.owner, Operation::Rollback)?;
        self.execute(
            Operation::Rollback,
            Some(transaction.id()),
            request::rollback(transaction.url()),
        )?;
        transaction.finish(TransactionState::RolledBack);
        Ok(())
    }

    fn query_with_handlers(
        &self,
        query: &QueryRequest,
        transaction: Option<&Transaction>,
        rdf_handler: &mut dyn RdfHandler,
        results_handler: &mut dyn QueryResultsHandler,
    ) -> Result<(), GraphDbError> {
        if let Some(transaction) = transaction {
            transaction.ensure_usable(self.owner, Operation::Query)?;
        }
        let response = self.execute(
            Operation::Query,
            transaction.map(Transaction::id),
            request::query(&self.endpoints, query, transaction.map(Transaction::url)),
        )?;
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok());
        ResponseDecoder::new(query.kind(), query.negotiation().allow_plain_text_results)
            .decode(content_type, response.body(), rdf_handler, results_handler)
            .map_err(|e| GraphDbError::protocol_violation_from(Operation::Query, e))
    }

    fn update_with_base(
        &self,
        update: &str,
        base: Option<NamedNodeRef<'_>>,
        transaction: &Transaction,
    ) -> Result<(), GraphDbError> {
        transaction.ensure_usable(self.owner, Operation::Update)?;
        self.execute(
            Operation::Update,
            Some(transaction.id()),
            request::update(transaction.url(), update, base),
        )?;
        Ok(())
    }

    fn save_graph(
        &self,
        graph_name: NamedNodeRef<'_>,
        graph: &Graph,
        transaction: &Transaction,
    ) -> Result<(), GraphDbError> {
        transaction.ensure_usable(self.owner, Operation::SaveGraph)?;
        let mut serializer = RdfSerializer::from_format(self.save_format).for_writer(Vec::new());
        for triple in graph {
            serializer
                .serialize_triple(triple)
                .map_err(|e| GraphDbError::unexpected(Operation::SaveGraph, e))?;
        }
        let body = serializer
            .finish()
            .map_err(|e| GraphDbError::unexpected(Operation::SaveGraph, e))?;
        self.execute(
            Operation::SaveGraph,
            Some(transaction.id()),
            request::save_graph(
                transaction.url(),
                graph_name,
                self.save_format.media_type(),
                body,
            ),
        )?;
        Ok(())
    }

    fn delete_graph(
        &self,
        graph_name: NamedNodeRef<'_>,
        transaction: &Transaction,
    ) -> Result<(), GraphDbError> {
        transaction.ensure_usable(self.owner, Operation::DeleteGraph)?;
        self.execute(
            Operation::DeleteGraph,
            Some(transaction.id()),
            request::delete_graph(transaction.url(), graph_name),
        )?;
        Ok(())
    }
}
