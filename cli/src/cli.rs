use clap::{Parser, Subcommand, ValueHint};
use std::path::PathBuf;

#[derive(Parser)]
#[command(about, version, name = "graphtx")]
/// GraphTx command line client of GraphDB repositories
pub struct Args {
    #[command(flatten)]
    pub connection: ConnectionArgs,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(clap::Args)]
pub struct ConnectionArgs {
    /// Base URL of the GraphDB server
    #[arg(
        short,
        long,
        env = "GRAPHTX_SERVER",
        default_value = "http://localhost:7200",
        value_hint = ValueHint::Url
    )]
    pub server: String,
    /// Identifier of the repository
    #[arg(short, long, env = "GRAPHTX_REPOSITORY")]
    pub repository: String,
    /// User name for HTTP basic authentication
    #[arg(short, long, env = "GRAPHTX_USER", requires = "password")]
    pub user: Option<String>,
    /// Password for HTTP basic authentication
    #[arg(short, long, env = "GRAPHTX_PASSWORD", requires = "user", hide_env_values = true)]
    pub password: Option<String>,
    /// Timeout of each request, in seconds
    #[arg(long, env = "GRAPHTX_TIMEOUT")]
    pub timeout: Option<u64>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Evaluate a SPARQL query and write its results to stdout
    Query {
        /// The SPARQL query
        ///
        /// If no query is given, stdin is read.
        query: Option<String>,
        /// File to read the query from
        #[arg(long, conflicts_with = "query", value_hint = ValueHint::FilePath)]
        query_file: Option<PathBuf>,
        /// The format of SELECT and ASK results
        ///
        /// It can be an extension like "tsv" or a MIME type like "application/sparql-results+json".
        #[arg(long, default_value = "tsv")]
        results_format: String,
        /// The format of CONSTRUCT and DESCRIBE results
        ///
        /// It can be an extension like "nt" or a MIME type like "text/turtle".
        #[arg(long, default_value = "nt")]
        graph_format: String,
        /// Include inferred statements
        #[arg(long)]
        infer: bool,
        /// Never decode a plain-text answer as a boolean
        #[arg(long)]
        no_plain_text: bool,
    },
    /// Execute a SPARQL update in its own transaction
    Update {
        /// The SPARQL update
        ///
        /// If no update is given, stdin is read.
        update: Option<String>,
        /// File to read the update from
        #[arg(long, conflicts_with = "update", value_hint = ValueHint::FilePath)]
        update_file: Option<PathBuf>,
        /// Base IRI of the update
        #[arg(long, value_hint = ValueHint::Url)]
        base: Option<String>,
    },
    /// Load a RDF file into a named graph in its own transaction
    Load {
        /// File to load
        ///
        /// If no file is given, stdin is read.
        #[arg(short, long, value_hint = ValueHint::FilePath)]
        file: Option<PathBuf>,
        /// The format of the file to load
        ///
        /// It can be an extension like "nt" or a MIME type like "application/n-triples".
        ///
        /// By default the format is guessed from the file extension.
        #[arg(long, required_unless_present = "file")]
        format: Option<String>,
        /// Name of the graph to load the triples into
        #[arg(short, long, value_hint = ValueHint::Url)]
        graph: String,
    },
    /// Delete a named graph in its own transaction
    Drop {
        /// Name of the graph to delete
        #[arg(value_hint = ValueHint::Url)]
        graph: String,
    },
    /// List the named graphs of the repository
    Graphs,
}
