#![doc = include_str!("../README.md")]
#![doc(test(attr(deny(warnings))))]
#![cfg_attr(docsrs, feature(doc_auto_cfg))]

pub mod batch;
mod client;
pub mod config;
pub mod error;
pub mod request;
pub mod results;
pub mod transaction;
pub mod transport;

pub mod model {
    pub use graphtx_model::*;
}

pub mod io {
    pub use oxrdfio::{RdfFormat, RdfParseError, RdfParser, RdfSerializer};
}

pub use batch::GraphUpdate;
pub use client::{GraphDbClient, TransactionalStore};
pub use config::{ClientConfig, Credentials};
pub use error::{ConfigError, GraphDbError, GraphUpdateError, Operation};
pub use request::{QueryKind, QueryRequest};
pub use results::{QueryResults, QueryResultsFormat, QuerySolution, QuerySolutions};
pub use transaction::{IsolationLevel, Transaction, TransactionState};
pub use transport::{HttpTransport, ReqwestTransport, TransportError};
