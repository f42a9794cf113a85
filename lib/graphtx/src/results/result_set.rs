//! Reading of SPARQL results encoded in RDF with the result set vocabulary.

use crate::results::QueryResultsHandler;
use graphtx_model::vocab::{rdf, result_set as rs};
use graphtx_model::{NamedNodeRef, Term, TermRef, Triple, Variable};
use sparesults::QuerySolution;
use std::sync::Arc;

/// The RDF document does not describe a SPARQL result set.
#[derive(Debug, thiserror::Error)]
#[error("Invalid RDF result set: {0}")]
pub struct InvalidResultSet(String);

struct Solution<'a> {
    index: Option<u64>,
    bindings: Vec<(usize, TermRef<'a>)>,
}

/// Reads the result set described by `triples` into `handler`.
///
/// Solutions carrying `rs:index` are sorted by it and come before the others.
pub(super) fn read(
    triples: &[Triple],
    handler: &mut dyn QueryResultsHandler,
) -> Result<(), InvalidResultSet> {
    let Some(result_set) = find_result_set(triples) else {
        return Err(InvalidResultSet("no rs:ResultSet in the document".into()));
    };

    if let Some(value) = objects(triples, result_set, rs::BOOLEAN).next() {
        handler.handle_boolean(parse_boolean(value)?);
        return Ok(());
    }

    let mut variables = Vec::new();
    for name in objects(triples, result_set, rs::RESULT_VARIABLE) {
        variable_position(&mut variables, name)?;
    }

    let mut solutions = Vec::new();
    for solution in objects(triples, result_set, rs::SOLUTION) {
        let index = objects(triples, solution, rs::INDEX)
            .next()
            .map(|index| match index {
                TermRef::Literal(literal) => literal.value().parse::<u64>().ok(),
                _ => None,
            })
            .map(|index| {
                index.ok_or_else(|| InvalidResultSet(format!("invalid rs:index {solution}")))
            })
            .transpose()?;
        let mut bindings = Vec::new();
        for binding in objects(triples, solution, rs::BINDING) {
            let Some(name) = objects(triples, binding, rs::VARIABLE).next() else {
                return Err(InvalidResultSet(format!("binding {binding} has no rs:variable")));
            };
            let Some(value) = objects(triples, binding, rs::VALUE).next() else {
                return Err(InvalidResultSet(format!("binding {binding} has no rs:value")));
            };
            bindings.push((variable_position(&mut variables, name)?, value));
        }
        solutions.push(Solution { index, bindings });
    }
    solutions.sort_by_key(|s| s.index.map_or((1, 0), |i| (0, i)));

    handler.handle_variables(&variables);
    let variables: Arc<[Variable]> = variables.into();
    for solution in solutions {
        let mut values: Vec<Option<Term>> = vec![None; variables.len()];
        for (position, value) in solution.bindings {
            values[position] = Some(value.into_owned());
        }
        handler.handle_solution(QuerySolution::from((Arc::clone(&variables), values)));
    }
    Ok(())
}

fn find_result_set(triples: &[Triple]) -> Option<TermRef<'_>> {
    triples
        .iter()
        .find(|t| {
            t.predicate.as_ref() == rdf::TYPE && t.object.as_ref() == TermRef::from(rs::RESULT_SET)
        })
        .or_else(|| {
            triples.iter().find(|t| {
                [rs::BOOLEAN, rs::RESULT_VARIABLE, rs::SOLUTION].contains(&t.predicate.as_ref())
            })
        })
        .map(|t| t.subject.as_ref().into())
}

fn objects<'a>(
    triples: &'a [Triple],
    subject: TermRef<'a>,
    predicate: NamedNodeRef<'a>,
) -> impl Iterator<Item = TermRef<'a>> + 'a {
    triples
        .iter()
        .filter(move |t| {
            t.predicate.as_ref() == predicate && TermRef::from(t.subject.as_ref()) == subject
        })
        .map(|t| t.object.as_ref())
}

fn variable_position(
    variables: &mut Vec<Variable>,
    name: TermRef<'_>,
) -> Result<usize, InvalidResultSet> {
    let TermRef::Literal(name) = name else {
        return Err(InvalidResultSet(format!("variable name {name} is not a literal")));
    };
    let variable = Variable::new(name.value())
        .map_err(|e| InvalidResultSet(format!("invalid variable name {name}: {e}")))?;
    if let Some(position) = variables.iter().position(|v| *v == variable) {
        return Ok(position);
    }
    variables.push(variable);
    Ok(variables.len() - 1)
}

fn parse_boolean(value: TermRef<'_>) -> Result<bool, InvalidResultSet> {
    match value {
        TermRef::Literal(literal) => match literal.value() {
            "true" | "1" => Ok(true),
            "false" | "0" => Ok(false),
            _ => Err(InvalidResultSet(format!("invalid rs:boolean {literal}"))),
        },
        _ => Err(InvalidResultSet(format!("invalid rs:boolean {value}"))),
    }
}
