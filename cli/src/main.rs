use crate::cli::{Args, Command, ConnectionArgs};
use anyhow::{bail, Context};
use clap::Parser;
use graphtx::io::{RdfFormat, RdfParser};
use graphtx::model::{Graph, NamedNode, Triple};
use graphtx::{
    ClientConfig, GraphDbClient, IsolationLevel, QueryRequest, QueryResults, QueryResultsFormat,
    Transaction, TransactionalStore,
};
use std::ffi::OsStr;
use std::fs::{self, File};
use std::io::{self, stdin, stdout, Read, Write};
use std::path::Path;
use std::time::Duration;
use tracing::warn;
use tracing_subscriber::EnvFilter;

mod cli;

pub fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();
    let client = GraphDbClient::new(client_config(args.connection)?)?;
    match args.command {
        Command::Query {
            query,
            query_file,
            results_format,
            graph_format,
            infer,
            no_plain_text,
        } => {
            let results_format = results_format_from_name(&results_format)?;
            let graph_format = rdf_format_from_name(&graph_format)?;
            let query = QueryRequest::new(read_text(query, query_file.as_deref())?)
                .with_inference(infer)
                .with_plain_text_results(!no_plain_text);
            let results = client.query(&query, None)?;
            let mut stdout = stdout().lock();
            if let QueryResults::Graph(_) = results {
                results.write_graph(&mut stdout, graph_format)?;
            } else {
                results.write(&mut stdout, results_format)?;
            }
            stdout.flush()?;
            Ok(())
        }
        Command::Update {
            update,
            update_file,
            base,
        } => {
            let update = read_text(update, update_file.as_deref())?;
            let base = base.map(|base| graph_name(&base)).transpose()?;
            in_transaction(&client, |transaction| {
                if let Some(base) = &base {
                    client.update_in_graph(base.as_ref(), &update, transaction)?;
                } else {
                    client.update(&update, transaction)?;
                }
                Ok(())
            })
        }
        Command::Load { file, format, graph } => {
            let graph_name = graph_name(&graph)?;
            let format = if let Some(format) = format {
                rdf_format_from_name(&format)?
            } else if let Some(file) = &file {
                rdf_format_from_path(file)?
            } else {
                bail!("The --format option must be set when reading from stdin")
            };
            let parser = RdfParser::from_format(format)
                .with_base_iri(graph_name.as_str())
                .with_context(|| format!("Invalid base IRI {graph_name}"))?;
            let graph = if let Some(file) = file {
                read_graph(parser, File::open(&file).with_context(|| {
                    format!("Not able to open {}", file.display())
                })?)?
            } else {
                read_graph(parser, stdin().lock())?
            };
            in_transaction(&client, |transaction| {
                client.save_graph(graph_name.as_ref(), &graph, transaction)?;
                Ok(())
            })
        }
        Command::Drop { graph } => {
            let graph_name = graph_name(&graph)?;
            in_transaction(&client, |transaction| {
                client.delete_graph(graph_name.as_ref(), transaction)?;
                Ok(())
            })
        }
        Command::Graphs => {
            let mut stdout = stdout().lock();
            for graph in client.list_graphs(None)? {
                writeln!(stdout, "{}", graph.as_str())?;
            }
            stdout.flush()?;
            Ok(())
        }
    }
}

fn client_config(connection: ConnectionArgs) -> anyhow::Result<ClientConfig> {
    let mut config = ClientConfig::new(&connection.server, &connection.repository)?;
    if let (Some(user), Some(password)) = (connection.user, connection.password) {
        config = config.with_credentials(user, password);
    }
    if let Some(timeout) = connection.timeout {
        config = config.with_timeout(Duration::from_secs(timeout));
    }
    Ok(config)
}

/// Runs `action` in a new transaction, committed on success and rolled back otherwise.
fn in_transaction(
    client: &GraphDbClient,
    action: impl FnOnce(&Transaction) -> anyhow::Result<()>,
) -> anyhow::Result<()> {
    let mut transaction = client.begin(IsolationLevel::default())?;
    let result = action(&transaction)
        .and_then(|()| client.commit(&mut transaction).map_err(anyhow::Error::from));
    if result.is_err() && transaction.is_active() {
        if let Err(e) = client.rollback(&mut transaction) {
            warn!(transaction = %transaction.id(), error = %e, "Rollback failed");
        }
    }
    result
}

fn read_text(text: Option<String>, file: Option<&Path>) -> anyhow::Result<String> {
    if let Some(text) = text {
        return Ok(text);
    }
    if let Some(file) = file {
        return fs::read_to_string(file)
            .with_context(|| format!("Not able to read {}", file.display()));
    }
    let mut text = String::new();
    stdin().lock().read_to_string(&mut text)?;
    Ok(text)
}

fn read_graph(parser: RdfParser, reader: impl Read) -> anyhow::Result<Graph> {
    let mut graph = Graph::new();
    for quad in parser.for_reader(reader) {
        let quad = quad?;
        graph.insert(&Triple::new(quad.subject, quad.predicate, quad.object));
    }
    Ok(graph)
}

fn graph_name(name: &str) -> anyhow::Result<NamedNode> {
    NamedNode::new(name).with_context(|| format!("The graph name {name} is invalid"))
}

fn rdf_format_from_path(path: &Path) -> anyhow::Result<RdfFormat> {
    let Some(ext) = path.extension().and_then(OsStr::to_str) else {
        bail!(
            "The path {} has no extension to guess a file format from",
            path.display()
        )
    };
    RdfFormat::from_extension(ext).with_context(|| {
        format!("Not able to guess the file format from file name extension '{ext}'")
    })
}

fn rdf_format_from_name(name: &str) -> anyhow::Result<RdfFormat> {
    if let Some(t) = RdfFormat::from_extension(name) {
        return Ok(t);
    }
    if let Some(t) = RdfFormat::from_media_type(name) {
        return Ok(t);
    }
    bail!("The file format '{name}' is unknown")
}

fn results_format_from_name(name: &str) -> anyhow::Result<QueryResultsFormat> {
    if let Some(t) = QueryResultsFormat::from_extension(name) {
        return Ok(t);
    }
    if let Some(t) = QueryResultsFormat::from_media_type(name) {
        return Ok(t);
    }
    bail!("The query results format '{name}' is unknown")
}
