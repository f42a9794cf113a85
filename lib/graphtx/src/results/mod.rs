//! Query results and the decoding of query responses.

mod decoder;
mod result_set;

pub use decoder::{ResponseDecoder, ResponseParseError};
pub use sparesults::{QueryResultsFormat, QuerySolution};

use graphtx_model::{Graph, Triple, Variable, VariableRef};
use oxrdfio::{RdfFormat, RdfSerializer};
use sparesults::QueryResultsSerializer;
use std::io::{self, Write};
use std::sync::Arc;

/// Receives the solutions or the boolean of a SPARQL result set.
pub trait QueryResultsHandler {
    /// Called once with the answer of an `ASK` query.
    fn handle_boolean(&mut self, value: bool);

    /// Called once before the solutions of a `SELECT` query.
    fn handle_variables(&mut self, variables: &[Variable]);

    /// Called for each solution, in the order of the response.
    fn handle_solution(&mut self, solution: QuerySolution);
}

/// Receives the triples of a graph response.
pub trait RdfHandler {
    fn handle_triple(&mut self, triple: Triple);
}

impl RdfHandler for Graph {
    fn handle_triple(&mut self, triple: Triple) {
        self.insert(&triple);
    }
}

impl RdfHandler for Vec<Triple> {
    fn handle_triple(&mut self, triple: Triple) {
        self.push(triple);
    }
}

/// What a [`ResultSetHandler`] has received so far.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ResultsType {
    #[default]
    Unknown,
    Boolean,
    Bindings,
}

/// Collects a result set in memory.
#[derive(Debug, Default)]
pub struct ResultSetHandler {
    results_type: ResultsType,
    boolean: bool,
    variables: Vec<Variable>,
    solutions: Vec<QuerySolution>,
}

impl ResultSetHandler {
    pub fn results_type(&self) -> ResultsType {
        self.results_type
    }

    /// The collected results, `None` if nothing was received.
    pub fn into_query_results(self) -> Option<QueryResults> {
        match self.results_type {
            ResultsType::Unknown => None,
            ResultsType::Boolean => Some(QueryResults::Boolean(self.boolean)),
            ResultsType::Bindings => Some(QueryResults::Solutions(QuerySolutions {
                variables: self.variables.into(),
                solutions: self.solutions,
            })),
        }
    }

    /// Sends the collected results to another handler.
    pub(crate) fn replay(self, handler: &mut dyn QueryResultsHandler) {
        match self.results_type {
            ResultsType::Unknown => (),
            ResultsType::Boolean => handler.handle_boolean(self.boolean),
            ResultsType::Bindings => {
                handler.handle_variables(&self.variables);
                for solution in self.solutions {
                    handler.handle_solution(solution);
                }
            }
        }
    }
}

impl QueryResultsHandler for ResultSetHandler {
    fn handle_boolean(&mut self, value: bool) {
        self.results_type = ResultsType::Boolean;
        self.boolean = value;
    }

    fn handle_variables(&mut self, variables: &[Variable]) {
        self.results_type = ResultsType::Bindings;
        variables.clone_into(&mut self.variables);
    }

    fn handle_solution(&mut self, solution: QuerySolution) {
        self.results_type = ResultsType::Bindings;
        self.solutions.push(solution);
    }
}

/// Results of a [SPARQL query](https://www.w3.org/TR/sparql11-query/).
#[derive(Debug, PartialEq)]
pub enum QueryResults {
    /// Results of a [SELECT](https://www.w3.org/TR/sparql11-query/#select) query.
    Solutions(QuerySolutions),
    /// Result of a [ASK](https://www.w3.org/TR/sparql11-query/#ask) query.
    Boolean(bool),
    /// Results of a [CONSTRUCT](https://www.w3.org/TR/sparql11-query/#construct) or
    /// [DESCRIBE](https://www.w3.org/TR/sparql11-query/#describe) query.
    Graph(Graph),
}

impl QueryResults {
    /// Writes the query results (solutions or boolean).
    ///
    /// Graph results are written as solutions binding `?subject`, `?predicate` and `?object`.
    pub fn write<W: Write>(&self, writer: W, format: QueryResultsFormat) -> io::Result<W> {
        let serializer = QueryResultsSerializer::from_format(format);
        match self {
            Self::Boolean(value) => serializer.serialize_boolean_to_writer(writer, *value),
            Self::Solutions(solutions) => {
                let mut serializer = serializer
                    .serialize_solutions_to_writer(writer, solutions.variables().to_vec())?;
                for solution in solutions {
                    serializer.serialize(solution)?;
                }
                serializer.finish()
            }
            Self::Graph(graph) => {
                let s = VariableRef::new_unchecked("subject");
                let p = VariableRef::new_unchecked("predicate");
                let o = VariableRef::new_unchecked("object");
                let mut serializer = serializer.serialize_solutions_to_writer(
                    writer,
                    vec![s.into_owned(), p.into_owned(), o.into_owned()],
                )?;
                for triple in graph {
                    serializer.serialize([
                        (s, triple.subject.into()),
                        (p, triple.predicate.into()),
                        (o, triple.object),
                    ])?;
                }
                serializer.finish()
            }
        }
    }

    /// Writes the graph query results.
    ///
    /// This method fails if it is called on the `Solution` or `Boolean` results.
    pub fn write_graph<W: Write>(&self, writer: W, format: RdfFormat) -> io::Result<W> {
        let Self::Graph(graph) = self else {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "Bindings or booleans could not be formatted as an RDF graph",
            ));
        };
        let mut serializer = RdfSerializer::from_format(format).for_writer(writer);
        for triple in graph {
            serializer.serialize_triple(triple)?;
        }
        serializer.finish()
    }
}

/// The solutions of a `SELECT` query.
#[derive(Debug, PartialEq)]
pub struct QuerySolutions {
    variables: Arc<[Variable]>,
    solutions: Vec<QuerySolution>,
}

impl QuerySolutions {
    /// The projected variables, in the order of the response.
    pub fn variables(&self) -> &[Variable] {
        &self.variables
    }

    pub fn len(&self) -> usize {
        self.solutions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.solutions.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, QuerySolution> {
        self.solutions.iter()
    }
}

impl IntoIterator for QuerySolutions {
    type Item = QuerySolution;
    type IntoIter = std::vec::IntoIter<QuerySolution>;

    fn into_iter(self) -> Self::IntoIter {
        self.solutions.into_iter()
    }
}

impl<'a> IntoIterator for &'a QuerySolutions {
    type Item = &'a QuerySolution;
    type IntoIter = std::slice::Iter<'a, QuerySolution>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use graphtx_model::{Literal, NamedNode, Term};

    fn collected() -> ResultSetHandler {
        let mut handler = ResultSetHandler::default();
        let variables = vec![Variable::new_unchecked("s"), Variable::new_unchecked("o")];
        handler.handle_variables(&variables);
        handler.handle_solution(QuerySolution::from((
            variables,
            vec![
                Some(NamedNode::new_unchecked("http://example.com/s").into()),
                Some(Literal::from(1).into()),
            ],
        )));
        handler
    }

    #[test]
    fn empty_handler_has_no_results() {
        let handler = ResultSetHandler::default();
        assert_eq!(handler.results_type(), ResultsType::Unknown);
        assert_eq!(handler.into_query_results(), None);
    }

    #[test]
    fn handler_collects_bindings() {
        let handler = collected();
        assert_eq!(handler.results_type(), ResultsType::Bindings);
        let Some(QueryResults::Solutions(solutions)) = handler.into_query_results() else {
            panic!("expected solutions")
        };
        assert_eq!(solutions.variables().len(), 2);
        assert_eq!(solutions.len(), 1);
        assert_eq!(
            solutions.iter().next().and_then(|s| s.get("o")),
            Some(&Term::from(Literal::from(1)))
        );
    }

    #[test]
    fn replay_forwards_everything() {
        let mut target = ResultSetHandler::default();
        collected().replay(&mut target);
        assert_eq!(
            target.into_query_results(),
            collected().into_query_results()
        );
    }

    #[test]
    fn write_boolean_as_json() {
        let output = QueryResults::Boolean(true)
            .write(Vec::new(), QueryResultsFormat::Json)
            .unwrap();
        assert_eq!(
            String::from_utf8(output).unwrap(),
            r#"{"head":{},"boolean":true}"#
        );
    }

    #[test]
    fn write_graph_rejects_solutions() {
        let results = collected().into_query_results().unwrap();
        assert!(results.write_graph(Vec::new(), RdfFormat::NTriples).is_err());
    }
}
