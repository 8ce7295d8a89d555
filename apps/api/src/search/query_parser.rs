//! Query interpretation: free-text search query → model reply → JSON object.
//!
//! A reply without a usable JSON object is not an error: it comes back as
//! `QueryInterpretation::Raw` so callers can still show what the model said.

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::llm_client::{
    extract_json_object, GenerationError, GenerationOptions, RawText, TextGenerator,
};
use crate::search::prompts::query_interpretation_prompt;

/// What the model made of a query. Serializes as the bare parsed object, or as
/// `{"rawAnalysis": "..."}` when nothing could be parsed.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum QueryInterpretation {
    Parsed(Map<String, Value>),
    Raw {
        #[serde(rename = "rawAnalysis")]
        raw_analysis: String,
    },
}

impl From<Result<Map<String, Value>, RawText>> for QueryInterpretation {
    fn from(parsed: Result<Map<String, Value>, RawText>) -> Self {
        match parsed {
            Ok(map) => QueryInterpretation::Parsed(map),
            Err(RawText(raw_analysis)) => QueryInterpretation::Raw { raw_analysis },
        }
    }
}

/// Parses a model reply. Never fails.
pub fn parse_interpretation(reply: &str) -> QueryInterpretation {
    let interpretation = QueryInterpretation::from(extract_json_object(reply));
    if let QueryInterpretation::Raw { .. } = &interpretation {
        warn!("Search interpretation reply held no JSON object; returning raw text");
    }
    interpretation
}

/// Sends the query to the model and parses the reply.
/// Fails only when the model itself could not be reached or returned nothing.
pub async fn interpret_query(
    query: &str,
    llm: &dyn TextGenerator,
) -> Result<QueryInterpretation, GenerationError> {
    let prompt = query_interpretation_prompt(query);
    let reply = llm.generate(&prompt, GenerationOptions::extraction()).await?;
    info!("Interpreted search query ({} chars of model output)", reply.len());
    Ok(parse_interpretation(&reply))
}


#[cfg(test)]
mod tests {
    use super::testing::CannedGenerator;
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_fenced_reply_round_trips_exactly() {
        let llm = CannedGenerator::replying("```json\n{\"skills\":[\"React\"],\"experience\":3}\n```");
        let interpretation = interpret_query("React devs with 3+ years", &llm)
            .await
            .unwrap();
        assert_eq!(
            serde_json::to_value(&interpretation).unwrap(),
            json!({"skills": ["React"], "experience": 3})
        );
    }

    #[tokio::test]
    async fn test_reply_without_json_degrades_to_raw_analysis() {
        let llm = CannedGenerator::replying("I cannot determine this.");
        let interpretation = interpret_query("???", &llm).await.unwrap();
        assert_eq!(
            serde_json::to_value(&interpretation).unwrap(),
            json!({"rawAnalysis": "I cannot determine this."})
        );
    }

    #[tokio::test]
    async fn test_prompt_embeds_query_and_json_instruction() {
        let llm = CannedGenerator::replying("{}");
        interpret_query("senior rust engineers in Berlin", &llm)
            .await
            .unwrap();
        let prompt = llm.last_prompt().unwrap();
        assert!(prompt.contains("\"senior rust engineers in Berlin\""));
        assert!(prompt.contains("jobTitles"));
        assert!(prompt.contains("single JSON object only"));
    }

    #[tokio::test]
    async fn test_backend_without_candidates_is_generation_error() {
        let llm = CannedGenerator::empty();
        let err = interpret_query("anything", &llm).await.unwrap_err();
        assert!(matches!(err, GenerationError::EmptyContent { .. }));
    }

    #[test]
    fn test_unparseable_fenced_block_is_raw_not_error() {
        let reply = "```json\n{skills: [React]}\n```";
        assert_eq!(
            parse_interpretation(reply),
            QueryInterpretation::Raw {
                raw_analysis: reply.to_string()
            }
        );
    }
}
