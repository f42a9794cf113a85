//! Transaction handles and their lifecycle.

use crate::error::{GraphDbError, Operation, TransactionStateViolation};
use std::fmt;
use tracing::warn;
use url::Url;
use uuid::Uuid;

/// The lifecycle state of a [`Transaction`].
///
/// `Committed` and `RolledBack` are terminal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TransactionState {
    Active,
    Committed,
    RolledBack,
}

impl TransactionState {
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Active)
    }
}

impl fmt::Display for TransactionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Active => "active",
            Self::Committed => "committed",
            Self::RolledBack => "rolled back",
        })
    }
}

/// The isolation level requested when beginning a transaction.
///
/// The level is kept on the handle for inspection only; the store applies its own isolation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum IsolationLevel {
    #[default]
    Unspecified,
    ReadUncommitted,
    ReadCommitted,
    RepeatableRead,
    Serializable,
    Snapshot,
}

/// A transaction opened on the store by [`begin`](crate::TransactionalStore::begin).
///
/// The handle is only usable with the client that created it. It is not synchronized; sharing it
/// between threads requires external locking. Dropping an active handle leaves the transaction
/// open on the store until the store expires it.
pub struct Transaction {
    id: Uuid,
    url: Url,
    owner: Uuid,
    isolation_level: IsolationLevel,
    state: TransactionState,
}

impl Transaction {
    pub(crate) fn new(id: Uuid, url: Url, owner: Uuid, isolation_level: IsolationLevel) -> Self {
        Self {
            id,
            url,
            owner,
            isolation_level,
            state: TransactionState::Active,
        }
    }

    /// The identifier assigned by the store.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// The endpoint of the transaction, `{repository}/transactions/{id}`.
    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn isolation_level(&self) -> IsolationLevel {
        self.isolation_level
    }

    pub fn state(&self) -> TransactionState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.state == TransactionState::Active
    }

    /// Fails if the handle can not be used by the client `owner` for `operation`.
    pub(crate) fn ensure_usable(&self, owner: Uuid, operation: Operation) -> Result<(), GraphDbError> {
        let violation = if self.state.is_terminal() {
            TransactionStateViolation::Finished(self.state)
        } else if self.owner != owner {
            TransactionStateViolation::ForeignOwner
        } else {
            return Ok(());
        };
        Err(GraphDbError::TransactionState {
            operation,
            transaction: self.id,
            violation,
        })
    }

    pub(crate) fn finish(&mut self, state: TransactionState) {
        debug_assert!(state.is_terminal(), "transactions only finish in a terminal state");
        self.state = state;
    }
}

impl fmt::Debug for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transaction")
            .field("id", &self.id)
            .field("url", &self.url.as_str())
            .field("isolation_level", &self.isolation_level)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl Drop for Transaction {
    fn drop(&mut self) {
        if self.is_active() {
            warn!(
                transaction = %self.id,
                "Dropping an active transaction, it stays open on the store until it expires"
            );
        }
    }
}

/// Why a `Location` header returned by a begin request was refused.
#[derive(Debug, thiserror::Error)]
pub enum LocationError {
    #[error("The begin response has no Location header")]
    Missing,
    #[error("The Location header is not valid UTF-8")]
    NotUtf8,
    #[error("The Location '{location}' is not a valid URL: {source}")]
    InvalidUrl {
        location: String,
        #[source]
        source: url::ParseError,
    },
    #[error("The Location '{location}' does not match '{expected}/{{id}}'")]
    TemplateMismatch { location: String, expected: String },
    #[error("The Location '{location}' does not end with a transaction identifier: {source}")]
    InvalidIdentifier {
        location: String,
        #[source]
        source: uuid::Error,
    },
    #[error("The Location '{location}' carries the nil transaction identifier")]
    NilIdentifier { location: String },
}

/// Extracts the transaction identifier from the `Location` returned by a begin request.
///
/// The location is resolved against `transactions`, the URL the request was sent to. Its path must
/// be exactly `{transactions path}/{id}`, without query or fragment, and `{id}` must be a non-nil
/// UUID.
pub(crate) fn parse_location(transactions: &Url, location: &str) -> Result<Uuid, LocationError> {
    let resolved = transactions
        .join(location)
        .map_err(|source| LocationError::InvalidUrl {
            location: location.to_owned(),
            source,
        })?;
    let mismatch = || LocationError::TemplateMismatch {
        location: location.to_owned(),
        expected: transactions.path().to_owned(),
    };
    if resolved.query().is_some() || resolved.fragment().is_some() {
        return Err(mismatch());
    }
    let id = resolved
        .path()
        .strip_prefix(transactions.path())
        .and_then(|rest| rest.strip_prefix('/'))
        .filter(|id| !id.is_empty() && !id.contains('/'))
        .ok_or_else(mismatch)?;
    let id = Uuid::parse_str(id).map_err(|source| LocationError::InvalidIdentifier {
        location: location.to_owned(),
        source,
    })?;
    if id.is_nil() {
        return Err(LocationError::NilIdentifier {
            location: location.to_owned(),
        });
    }
    Ok(id)
}

#[cfg(test)]
mod tests {
    use super::*;

    const ID: &str = "3a1e0f6c-4a4b-4c4e-8d2f-0b9a3c7e5d11";

    fn transactions() -> Url {
        Url::parse("http://localhost:7200/repositories/test/transactions").unwrap()
    }

    #[test]
    fn absolute_location() {
        let id = parse_location(
            &transactions(),
            &format!("http://localhost:7200/repositories/test/transactions/{ID}"),
        )
        .unwrap();
        assert_eq!(id.to_string(), ID);
    }

    #[test]
    fn relative_location() {
        let id = parse_location(&transactions(), &format!("/repositories/test/transactions/{ID}"))
            .unwrap();
        assert_eq!(id.to_string(), ID);
        let id = parse_location(&transactions(), &format!("transactions/{ID}")).unwrap();
        assert_eq!(id.to_string(), ID);
    }

    #[test]
    fn location_of_another_repository() {
        let error = parse_location(
            &transactions(),
            &format!("http://localhost:7200/repositories/other/transactions/{ID}"),
        )
        .unwrap_err();
        assert!(matches!(error, LocationError::TemplateMismatch { .. }), "{error}");
    }

    #[test]
    fn location_with_trailing_segments() {
        for location in [
            format!("/repositories/test/transactions/{ID}/"),
            format!("/repositories/test/transactions/{ID}/extra"),
            format!("/repositories/test/transactions/{ID}?x=y"),
            format!("/repositories/test/transactions/{ID}#top"),
            "/repositories/test/transactions/".to_owned(),
            "/repositories/test/transactionsfoo".to_owned(),
        ] {
            assert!(
                matches!(
                    parse_location(&transactions(), &location),
                    Err(LocationError::TemplateMismatch { .. })
                ),
                "{location} should be refused"
            );
        }
    }

    #[test]
    fn location_with_malformed_identifier() {
        let error =
            parse_location(&transactions(), "/repositories/test/transactions/not-a-uuid").unwrap_err();
        assert!(matches!(error, LocationError::InvalidIdentifier { .. }), "{error}");
        let error = parse_location(
            &transactions(),
            "/repositories/test/transactions/00000000-0000-0000-0000-000000000000",
        )
        .unwrap_err();
        assert!(matches!(error, LocationError::NilIdentifier { .. }), "{error}");
    }

    #[test]
    fn finished_transaction_is_refused() {
        let owner = Uuid::new_v4();
        let mut transaction = Transaction::new(
            Uuid::new_v4(),
            transactions(),
            owner,
            IsolationLevel::Snapshot,
        );
        transaction.ensure_usable(owner, Operation::Query).unwrap();
        transaction.finish(TransactionState::Committed);
        let error = transaction
            .ensure_usable(owner, Operation::Rollback)
            .unwrap_err();
        assert_eq!(
            error.to_string(),
            format!(
                "rollback: transaction {} can not be used: the transaction is already committed",
                transaction.id()
            )
        );
    }

    #[test]
    fn foreign_transaction_is_refused() {
        let transaction = Transaction::new(
            Uuid::new_v4(),
            transactions(),
            Uuid::new_v4(),
            IsolationLevel::default(),
        );
        let error = transaction
            .ensure_usable(Uuid::new_v4(), Operation::Update)
            .unwrap_err();
        assert!(matches!(
            error,
            GraphDbError::TransactionState {
                violation: TransactionStateViolation::ForeignOwner,
                ..
            }
        ));
    }
}
