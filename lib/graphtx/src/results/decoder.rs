use crate::request::QueryKind;
use crate::results::result_set::{self, InvalidResultSet};
use crate::results::{QueryResultsHandler, RdfHandler, ResultSetHandler};
use graphtx_model::Triple;
use mediatype::MediaType;
use oxrdfio::{RdfFormat, RdfParseError, RdfParser};
use sparesults::{
    QueryResultsFormat, QueryResultsParseError, QueryResultsParser,
    ReaderQueryResultsParserOutput,
};
use tracing::{trace, warn};

/// A query response that could not be decoded.
#[derive(Debug, thiserror::Error)]
pub enum ResponseParseError {
    /// No decoder handles the content type of the response.
    #[error("No decoder available for content type '{0}'")]
    UnsupportedContentType(String),
    /// The SPARQL result set is malformed.
    #[error(transparent)]
    Results(#[from] QueryResultsParseError),
    /// The RDF document is malformed.
    #[error(transparent)]
    Rdf(#[from] RdfParseError),
    /// The plain-text answer is neither `true` nor `false`.
    #[error("Invalid plain-text boolean '{0}'")]
    InvalidBoolean(String),
    /// The RDF document does not describe a result set.
    #[error(transparent)]
    InvalidResultSet(#[from] InvalidResultSet),
    /// An XML answer is neither a SPARQL XML result set nor an RDF document.
    #[error("Not a SPARQL XML result set ({results}) nor an RDF document ({rdf})")]
    Xml {
        /// The failure of the SPARQL XML result set decoder.
        #[source]
        results: Box<ResponseParseError>,
        /// The failure of the RDF decoder.
        rdf: Box<ResponseParseError>,
    },
}

/// The decoders able to read a SPARQL result set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ResultsDecoder {
    Sparql(QueryResultsFormat),
    PlainBoolean,
}

/// Decodes query responses according to their content type and the shape of the query.
///
/// The decoder is chosen in three steps:
/// 1. a SPARQL result set decoder matching the content type,
/// 2. for generic XML content types, the SPARQL XML result set decoder,
/// 3. an RDF decoder matching the content type. For `SELECT` and `ASK` queries, the graph is read
///    as an RDF encoded result set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResponseDecoder {
    kind: QueryKind,
    allow_plain_text_results: bool,
}

impl ResponseDecoder {
    pub fn new(kind: QueryKind, allow_plain_text_results: bool) -> Self {
        Self {
            kind,
            allow_plain_text_results,
        }
    }

    /// Decodes `body` into the handlers.
    pub fn decode(
        &self,
        content_type: Option<&str>,
        body: &[u8],
        rdf_handler: &mut dyn RdfHandler,
        results_handler: &mut dyn QueryResultsHandler,
    ) -> Result<(), ResponseParseError> {
        let media_type = content_type.and_then(essence);
        let Some(media_type) = media_type else {
            return Err(ResponseParseError::UnsupportedContentType(
                content_type.unwrap_or_default().to_owned(),
            ));
        };

        if let Some(decoder) = self.results_decoder(&media_type) {
            trace!(%media_type, ?decoder, "Decoding SPARQL result set");
            return match decoder {
                ResultsDecoder::Sparql(format) => decode_results(format, body, results_handler),
                ResultsDecoder::PlainBoolean => {
                    results_handler.handle_boolean(parse_plain_boolean(body)?);
                    Ok(())
                }
            };
        }

        let mut xml_error = None;
        if is_xml(&media_type) {
            let mut buffer = ResultSetHandler::default();
            match decode_results(QueryResultsFormat::Xml, body, &mut buffer) {
                Ok(()) => {
                    warn!(%media_type, "Decoded a generic XML response as a SPARQL XML result set");
                    buffer.replay(results_handler);
                    return Ok(());
                }
                Err(e) => {
                    trace!(%media_type, error = %e, "Not a SPARQL XML result set");
                    xml_error = Some(e);
                }
            }
        }

        self.decode_rdf(media_type, body, rdf_handler, results_handler)
            .map_err(|rdf| match xml_error {
                Some(results) => ResponseParseError::Xml {
                    results: Box::new(results),
                    rdf: Box::new(rdf),
                },
                None => rdf,
            })
    }

    fn decode_rdf(
        &self,
        media_type: String,
        body: &[u8],
        rdf_handler: &mut dyn RdfHandler,
        results_handler: &mut dyn QueryResultsHandler,
    ) -> Result<(), ResponseParseError> {
        let Some(format) = RdfFormat::from_media_type(&media_type) else {
            return Err(ResponseParseError::UnsupportedContentType(media_type));
        };
        trace!(%media_type, ?format, "Decoding RDF");
        let triples = parse_triples(format, body)?;
        if self.kind.expects_result_set() {
            warn!(%media_type, "Decoding a result set encoded in RDF");
            result_set::read(&triples, results_handler)?;
        } else {
            for triple in triples {
                rdf_handler.handle_triple(triple);
            }
        }
        Ok(())
    }

    fn results_decoder(&self, media_type: &str) -> Option<ResultsDecoder> {
        Some(match media_type {
            "application/sparql-results+xml" => ResultsDecoder::Sparql(QueryResultsFormat::Xml),
            "application/sparql-results+json" | "application/json" => {
                ResultsDecoder::Sparql(QueryResultsFormat::Json)
            }
            "text/csv" => ResultsDecoder::Sparql(QueryResultsFormat::Csv),
            "text/tab-separated-values" | "text/tsv" => {
                ResultsDecoder::Sparql(QueryResultsFormat::Tsv)
            }
            "text/plain" | "text/boolean" if self.allow_plain_text_results => {
                ResultsDecoder::PlainBoolean
            }
            _ => return None,
        })
    }
}

/// `type/subtype[+suffix]` in lower case, without parameters.
fn essence(content_type: &str) -> Option<String> {
    let media_type = MediaType::parse(content_type.trim()).ok()?;
    let mut essence = format!("{}/{}", media_type.ty.as_str(), media_type.subty.as_str());
    if let Some(suffix) = media_type.suffix {
        essence.push('+');
        essence.push_str(suffix.as_str());
    }
    Some(essence.to_ascii_lowercase())
}

fn is_xml(media_type: &str) -> bool {
    matches!(media_type, "application/xml" | "text/xml") || media_type.ends_with("+xml")
}

fn decode_results(
    format: QueryResultsFormat,
    body: &[u8],
    handler: &mut dyn QueryResultsHandler,
) -> Result<(), ResponseParseError> {
    match QueryResultsParser::from_format(format).for_reader(body)? {
        ReaderQueryResultsParserOutput::Boolean(value) => handler.handle_boolean(value),
        ReaderQueryResultsParserOutput::Solutions(solutions) => {
            handler.handle_variables(solutions.variables());
            for solution in solutions {
                handler.handle_solution(solution?);
            }
        }
    }
    Ok(())
}

fn parse_plain_boolean(body: &[u8]) -> Result<bool, ResponseParseError> {
    let text = String::from_utf8_lossy(body);
    let text = text.trim();
    if text.eq_ignore_ascii_case("true") {
        Ok(true)
    } else if text.eq_ignore_ascii_case("false") {
        Ok(false)
    } else {
        Err(ResponseParseError::InvalidBoolean(text.to_owned()))
    }
}

fn parse_triples(format: RdfFormat, body: &[u8]) -> Result<Vec<Triple>, RdfParseError> {
    RdfParser::from_format(format)
        .for_reader(body)
        .map(|quad| quad.map(|q| Triple::new(q.subject, q.predicate, q.object)))
        .collect()
}
