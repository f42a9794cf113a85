use oxrdf::TripleRef;

/// Formats a triple as a single N-Triples statement, including the terminating ` .`.
///
/// The output only depends on the triple itself, hence formatting the same triple twice always
/// yields the same text. This is the form used when triples are embedded into SPARQL Update
/// `DATA` blocks.
///
/// ```
/// use graphtx_model::{format_triple, LiteralRef, NamedNodeRef, TripleRef};
///
/// let ex = NamedNodeRef::new_unchecked("http://example.com/a");
/// let p = NamedNodeRef::new_unchecked("http://example.com/p");
/// let triple = TripleRef::new(ex, p, LiteralRef::new_simple_literal("v"));
/// assert_eq!(
///     format_triple(triple),
///     "<http://example.com/a> <http://example.com/p> \"v\" ."
/// );
/// ```
pub fn format_triple<'a>(triple: impl Into<TripleRef<'a>>) -> String {
    let triple = triple.into();
    format!(
        "{} {} {} .",
        triple.subject, triple.predicate, triple.object
    )
}
