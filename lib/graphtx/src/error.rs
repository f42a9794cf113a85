//! The error taxonomy of the client and the translation of transport and protocol failures into
//! it.

use crate::transaction::TransactionState;
use crate::transport::TransportError;
use http::StatusCode;
use std::error::Error;
use std::fmt;
use std::io;
use uuid::Uuid;

/// The protocol operation during which an error was raised.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operation {
    /// Creating a transaction.
    Begin,
    /// Committing a transaction.
    Commit,
    /// Rolling back a transaction.
    Rollback,
    /// Evaluating a SPARQL query.
    Query,
    /// Executing a SPARQL update.
    Update,
    /// Applying a batch of triple additions and removals to a graph.
    UpdateGraph,
    /// Uploading a serialized graph.
    SaveGraph,
    /// Deleting a graph.
    DeleteGraph,
    /// Listing the named graphs of the repository.
    ListGraphs,
}

impl Operation {
    /// The human-readable name of the operation.
    pub fn name(self) -> &'static str {
        match self {
            Self::Begin => "begin",
            Self::Commit => "commit",
            Self::Rollback => "rollback",
            Self::Query => "query",
            Self::Update => "update",
            Self::UpdateGraph => "update graph",
            Self::SaveGraph => "save graph",
            Self::DeleteGraph => "delete graph",
            Self::ListGraphs => "list graphs",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Why a transaction handle was refused before any request was sent.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum TransactionStateViolation {
    /// The transaction has already been committed or rolled back.
    #[error("the transaction is already {0}")]
    Finished(TransactionState),
    /// The transaction was created by another client instance.
    #[error("the transaction belongs to another client")]
    ForeignOwner,
}

/// An error raised by an operation against a GraphDB repository.
///
/// Every variant carries the [`Operation`] that failed. Variants created from an HTTP response
/// also carry the status code and the response body returned by the server.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum GraphDbError {
    /// The store could not be reached (DNS, connection or timeout failure).
    #[error("{operation}: could not reach the store: {source}")]
    Connection {
        /// The failed operation.
        operation: Operation,
        /// The transport failure.
        #[source]
        source: TransportError,
    },
    /// The store refused the credentials (`401` or `403`).
    #[error("{operation}: the store refused the request ({status}): {body}")]
    Authentication {
        /// The failed operation.
        operation: Operation,
        /// The response status.
        status: StatusCode,
        /// The response body.
        body: String,
    },
    /// The response did not conform to the protocol.
    #[error("{operation}: the store violated the protocol: {message}")]
    ProtocolViolation {
        /// The failed operation.
        operation: Operation,
        /// What was wrong with the response.
        message: String,
        /// The underlying decoding failure, if any.
        #[source]
        source: Option<Box<dyn Error + Send + Sync + 'static>>,
    },
    /// The store rejected the query or update with a diagnostic message.
    #[error("{operation}: the store rejected the request ({status}): {body}")]
    Query {
        /// The failed operation.
        operation: Operation,
        /// The response status.
        status: StatusCode,
        /// The diagnostic returned by the store.
        body: String,
    },
    /// The transaction handle can not be used anymore. Raised before any network access.
    #[error("{operation}: transaction {transaction} can not be used: {violation}")]
    TransactionState {
        /// The refused operation.
        operation: Operation,
        /// The identifier of the transaction.
        transaction: Uuid,
        /// Why the transaction was refused.
        #[source]
        violation: TransactionStateViolation,
    },
    /// Any other failure.
    #[error("{operation}: unexpected failure{}: {message}", .status.map(|s| format!(" ({s})")).unwrap_or_default())]
    Unknown {
        /// The failed operation.
        operation: Operation,
        /// The response status, if a response was received.
        status: Option<StatusCode>,
        /// The response body or a description of the failure.
        message: String,
        /// The underlying failure, if any.
        #[source]
        source: Option<Box<dyn Error + Send + Sync + 'static>>,
    },
}

impl GraphDbError {
    /// Translates a failure of the transport layer.
    pub fn from_transport_error(operation: Operation, error: TransportError) -> Self {
        if error.is_connection_failure() {
            Self::Connection {
                operation,
                source: error,
            }
        } else {
            Self::Unknown {
                operation,
                status: None,
                message: error.to_string(),
                source: Some(Box::new(error)),
            }
        }
    }

    /// Translates a non-successful HTTP response.
    pub fn from_response(operation: Operation, status: StatusCode, body: &[u8]) -> Self {
        let body = String::from_utf8_lossy(body).trim().to_owned();
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Self::Authentication {
                operation,
                status,
                body,
            },
            status if status.is_client_error() && !body.is_empty() => Self::Query {
                operation,
                status,
                body,
            },
            status => Self::Unknown {
                operation,
                status: Some(status),
                message: body,
                source: None,
            },
        }
    }

    pub(crate) fn protocol_violation_from(
        operation: Operation,
        error: impl Into<Box<dyn Error + Send + Sync + 'static>>,
    ) -> Self {
        let error = error.into();
        Self::ProtocolViolation {
            operation,
            message: error.to_string(),
            source: Some(error),
        }
    }

    pub(crate) fn unexpected(
        operation: Operation,
        error: impl Into<Box<dyn Error + Send + Sync + 'static>>,
    ) -> Self {
        let error = error.into();
        Self::Unknown {
            operation,
            status: None,
            message: error.to_string(),
            source: Some(error),
        }
    }

    /// The operation that failed.
    pub fn operation(&self) -> Operation {
        match self {
            Self::Connection { operation, .. }
            | Self::Authentication { operation, .. }
            | Self::ProtocolViolation { operation, .. }
            | Self::Query { operation, .. }
            | Self::TransactionState { operation, .. }
            | Self::Unknown { operation, .. } => *operation,
        }
    }

    /// The HTTP status returned by the store, if the failure comes from a response.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Authentication { status, .. } | Self::Query { status, .. } => Some(*status),
            Self::Unknown { status, .. } => *status,
            Self::Connection { .. }
            | Self::ProtocolViolation { .. }
            | Self::TransactionState { .. } => None,
        }
    }

    /// Attributes the error to an enclosing operation.
    #[must_use]
    pub fn with_operation(mut self, new_operation: Operation) -> Self {
        match &mut self {
            Self::Connection { operation, .. }
            | Self::Authentication { operation, .. }
            | Self::ProtocolViolation { operation, .. }
            | Self::Query { operation, .. }
            | Self::TransactionState { operation, .. }
            | Self::Unknown { operation, .. } => *operation = new_operation,
        }
        self
    }
}

impl From<GraphDbError> for io::Error {
    #[inline]
    fn from(error: GraphDbError) -> Self {
        match error {
            GraphDbError::Connection { .. } => Self::new(io::ErrorKind::NotConnected, error),
            GraphDbError::Authentication { .. } => {
                Self::new(io::ErrorKind::PermissionDenied, error)
            }
            GraphDbError::ProtocolViolation { .. } => Self::new(io::ErrorKind::InvalidData, error),
            GraphDbError::Query { .. } | GraphDbError::TransactionState { .. } => {
                Self::new(io::ErrorKind::InvalidInput, error)
            }
            GraphDbError::Unknown { .. } => Self::other(error),
        }
    }
}

/// An error raised while applying a [`GraphUpdate`](crate::batch::GraphUpdate).
///
/// The batch stops at the first failing update; the operations before it stay applied inside the
/// transaction.
#[derive(Debug, thiserror::Error)]
#[error("{source} (after {applied} of {total} graph update operations)")]
pub struct GraphUpdateError {
    /// The number of update operations applied before the failure.
    pub applied: usize,
    /// The number of update operations in the batch.
    pub total: usize,
    /// The failure of the update operation.
    #[source]
    pub source: GraphDbError,
}

impl From<GraphUpdateError> for GraphDbError {
    #[inline]
    fn from(error: GraphUpdateError) -> Self {
        error.source
    }
}

/// An error raised while building a [`ClientConfig`](crate::config::ClientConfig).
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The server URL is invalid.
    #[error("Invalid server URL '{url}': {source}")]
    InvalidServerUrl {
        /// The URL itself.
        url: String,
        /// The parsing error.
        #[source]
        source: url::ParseError,
    },
    /// The server URL can not be used as a base for repository paths.
    #[error("The server URL '{0}' can not be used as a base URL")]
    CannotBeABase(String),
    /// The repository name is empty or contains a path separator.
    #[error("Invalid repository name '{0}'")]
    InvalidRepository(String),
    /// The HTTP client could not be created.
    #[error("Could not create the HTTP client: {0}")]
    HttpClient(#[source] Box<dyn Error + Send + Sync + 'static>),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unauthorized_is_an_authentication_error() {
        let error = GraphDbError::from_response(Operation::Begin, StatusCode::UNAUTHORIZED, b"");
        assert!(matches!(error, GraphDbError::Authentication { .. }));
        assert_eq!(error.operation(), Operation::Begin);
        assert_eq!(error.status(), Some(StatusCode::UNAUTHORIZED));
    }

    #[test]
    fn bad_request_with_diagnostic_is_a_query_error() {
        let error = GraphDbError::from_response(
            Operation::Query,
            StatusCode::BAD_REQUEST,
            b"MALFORMED QUERY: Encountered \" \"}\" \n",
        );
        let GraphDbError::Query { body, .. } = &error else {
            panic!("unexpected error {error:?}")
        };
        assert_eq!(body, "MALFORMED QUERY: Encountered \" \"}\"");
        assert!(error.to_string().starts_with("query: "));
    }

    #[test]
    fn bad_request_without_body_is_unknown() {
        let error = GraphDbError::from_response(Operation::Update, StatusCode::NOT_FOUND, b"  ");
        assert!(matches!(
            error,
            GraphDbError::Unknown {
                status: Some(StatusCode::NOT_FOUND),
                ..
            }
        ));
    }

    #[test]
    fn server_error_is_unknown_and_keeps_body() {
        let error = GraphDbError::from_response(
            Operation::Commit,
            StatusCode::INTERNAL_SERVER_ERROR,
            b"boom",
        );
        assert_eq!(
            error.to_string(),
            "commit: unexpected failure (500 Internal Server Error): boom"
        );
    }

    #[test]
    fn with_operation_rewrites_the_operation() {
        let error = GraphDbError::protocol_violation_from(Operation::Query, "no decoder")
            .with_operation(Operation::ListGraphs);
        assert_eq!(error.operation(), Operation::ListGraphs);
        assert_eq!(
            error.to_string(),
            "list graphs: the store violated the protocol: no decoder"
        );
    }

    #[test]
    fn graph_update_error_unwraps_to_source() {
        let error = GraphUpdateError {
            applied: 2,
            total: 5,
            source: GraphDbError::from_response(
                Operation::UpdateGraph,
                StatusCode::BAD_REQUEST,
                b"bad",
            ),
        };
        assert_eq!(
            error.to_string(),
            "update graph: the store rejected the request (400 Bad Request): bad (after 2 of 5 graph update operations)"
        );
        let error = GraphDbError::from(error);
        assert_eq!(error.status(), Some(StatusCode::BAD_REQUEST));
    }
}
