mod ntriples;
pub mod vocab;

pub use ntriples::format_triple;

// Re-export some oxrdf types.
pub use oxrdf::{
    BlankNode, BlankNodeRef, Graph, GraphName, GraphNameRef, IriParseError, Literal, LiteralRef,
    NamedNode, NamedNodeRef, NamedOrBlankNode, NamedOrBlankNodeRef, Quad, QuadRef, Subject,
    SubjectRef, Term, TermParseError, TermRef, Triple, TripleRef, Variable, VariableNameParseError,
    VariableRef,
};
