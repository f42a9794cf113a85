//! Translation of graph diffs into single-triple SPARQL updates.

use graphtx_model::{format_triple, NamedNode, NamedNodeRef, Triple};
use itertools::Itertools;

/// A set of triple additions and removals applied to one named graph.
///
/// Both sides are deduplicated, keeping the first occurrence of each triple. A triple present in
/// both sides is removed first and then added again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphUpdate {
    graph: NamedNode,
    additions: Vec<Triple>,
    removals: Vec<Triple>,
}

impl GraphUpdate {
    pub fn new(
        graph: impl Into<NamedNode>,
        additions: impl IntoIterator<Item = Triple>,
        removals: impl IntoIterator<Item = Triple>,
    ) -> Self {
        Self {
            graph: graph.into(),
            additions: additions.into_iter().unique().collect(),
            removals: removals.into_iter().unique().collect(),
        }
    }

    pub fn graph(&self) -> NamedNodeRef<'_> {
        self.graph.as_ref()
    }

    pub fn additions(&self) -> &[Triple] {
        &self.additions
    }

    pub fn removals(&self) -> &[Triple] {
        &self.removals
    }

    /// The number of update operations, one per triple.
    pub fn len(&self) -> usize {
        self.additions.len() + self.removals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.additions.is_empty() && self.removals.is_empty()
    }

    /// The update operations in execution order: every `DELETE DATA` and then every
    /// `INSERT DATA`.
    pub fn operations(&self) -> impl Iterator<Item = String> + '_ {
        let graph = self.graph.as_ref();
        self.removals
            .iter()
            .map(move |triple| delete_data(graph, triple))
            .chain(
                self.additions
                    .iter()
                    .map(move |triple| insert_data(graph, triple)),
            )
    }
}

/// `DELETE DATA { GRAPH <graph> { triple } }`
pub fn delete_data(graph: NamedNodeRef<'_>, triple: &Triple) -> String {
    format!("DELETE DATA {{ GRAPH {graph} {{ {} }} }}", format_triple(triple))
}

/// `INSERT DATA { GRAPH <graph> { triple } }`
pub fn insert_data(graph: NamedNodeRef<'_>, triple: &Triple) -> String {
    format!("INSERT DATA {{ GRAPH {graph} {{ {} }} }}", format_triple(triple))
}

#[cfg(test)]
mod tests {
    use super::*;
    use graphtx_model::Literal;

    fn ex(name: &str) -> NamedNode {
        NamedNode::new_unchecked(format!("http://example.com/{name}"))
    }

    fn triple(s: &str, o: &str) -> Triple {
        Triple::new(ex(s), ex("p"), Literal::new_simple_literal(o))
    }

    #[test]
    fn removals_come_first() {
        let update = GraphUpdate::new(
            ex("g"),
            [triple("a", "1"), triple("b", "2")],
            [triple("c", "3")],
        );
        insta::assert_snapshot!(update.operations().join("\n"), @r#"
        DELETE DATA { GRAPH <http://example.com/g> { <http://example.com/c> <http://example.com/p> "3" . } }
        INSERT DATA { GRAPH <http://example.com/g> { <http://example.com/a> <http://example.com/p> "1" . } }
        INSERT DATA { GRAPH <http://example.com/g> { <http://example.com/b> <http://example.com/p> "2" . } }
        "#);
    }

    #[test]
    fn duplicates_are_dropped() {
        let update = GraphUpdate::new(
            ex("g"),
            [triple("a", "1"), triple("b", "2"), triple("a", "1")],
            [triple("c", "3"), triple("c", "3")],
        );
        assert_eq!(update.len(), 3);
        assert_eq!(update.additions(), [triple("a", "1"), triple("b", "2")]);
        assert_eq!(update.removals(), [triple("c", "3")]);
    }

    #[test]
    fn empty_update_has_no_operations() {
        let update = GraphUpdate::new(ex("g"), Vec::new(), Vec::new());
        assert!(update.is_empty());
        assert_eq!(update.operations().count(), 0);
    }

    #[test]
    fn update_text_is_parseable() {
        let update = GraphUpdate::new(ex("g"), [triple("a", "é")], [triple("a", "e")]);
        for operation in update.operations() {
            spargebra::Update::parse(&operation, None).unwrap();
        }
    }
}
