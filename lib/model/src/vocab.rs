//! Vocabularies used by the protocol client.

pub use oxrdf::vocab::{rdf, xsd};

/// The [result set vocabulary](https://www.w3.org/2001/sw/DataAccess/tests/result-set) used to
/// encode SPARQL query results as an RDF graph.
pub mod result_set {
    use oxrdf::NamedNodeRef;

    /// The namespace of the vocabulary.
    pub const NAMESPACE: &str = "http://www.w3.org/2001/sw/DataAccess/tests/result-set#";

    /// The class of result sets.
    pub const RESULT_SET: NamedNodeRef<'_> = NamedNodeRef::new_unchecked(
        "http://www.w3.org/2001/sw/DataAccess/tests/result-set#ResultSet",
    );
    /// Links a result set to the name of a projected variable.
    pub const RESULT_VARIABLE: NamedNodeRef<'_> = NamedNodeRef::new_unchecked(
        "http://www.w3.org/2001/sw/DataAccess/tests/result-set#resultVariable",
    );
    /// Links a result set to one of its solutions.
    pub const SOLUTION: NamedNodeRef<'_> = NamedNodeRef::new_unchecked(
        "http://www.w3.org/2001/sw/DataAccess/tests/result-set#solution",
    );
    /// Links a solution to one of its bindings.
    pub const BINDING: NamedNodeRef<'_> = NamedNodeRef::new_unchecked(
        "http://www.w3.org/2001/sw/DataAccess/tests/result-set#binding",
    );
    /// The variable name of a binding.
    pub const VARIABLE: NamedNodeRef<'_> = NamedNodeRef::new_unchecked(
        "http://www.w3.org/2001/sw/DataAccess/tests/result-set#variable",
    );
    /// The value of a binding.
    pub const VALUE: NamedNodeRef<'_> = NamedNodeRef::new_unchecked(
        "http://www.w3.org/2001/sw/DataAccess/tests/result-set#value",
    );
    /// The answer of an `ASK` query.
    pub const BOOLEAN: NamedNodeRef<'_> = NamedNodeRef::new_unchecked(
        "http://www.w3.org/2001/sw/DataAccess/tests/result-set#boolean",
    );
    /// The position of a solution in an ordered result set.
    pub const INDEX: NamedNodeRef<'_> = NamedNodeRef::new_unchecked(
        "http://www.w3.org/2001/sw/DataAccess/tests/result-set#index",
    );
}
