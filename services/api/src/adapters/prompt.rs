//! services/api/src/adapters/prompt.rs
//!
//! The shared generation prompt and response-parsing helpers used by both
//! LLM backends. The prompt instructs the model to answer only from the
//! provided text and to reply with a bare JSON array.

use pdfqa_core::domain::GeneratedQa;
use pdfqa_core::ports::{PortError, PortResult};
use serde::Deserialize;

const QA_PROMPT_TEMPLATE: &str = r#"You are an expert at creating high-quality question-answer pairs for training data.

I will provide you with a section of text from a document. Please generate 3-5 question-answer pairs that:
1. Cover the most important information in the text
2. Have clear, unambiguous answers found directly in the text
3. Range from factual recall to conceptual understanding
4. Are diverse in structure (what, how, why questions)

Section Heading: "{heading}"

Text:
```
{content}
```

Format your response as JSON with this structure:
[
    {
        "question": "The question text",
        "answer": "The answer text",
        "type": "factual|conceptual|procedural"
    }
]

Only output the JSON, nothing else."#;

/// Renders the generation prompt for one chunk.
pub fn build_prompt(heading: &str, content: &str) -> String {
    QA_PROMPT_TEMPLATE
        .replace("{heading}", heading)
        .replace("{content}", content)
}

/// The shape each backend is instructed to produce.
#[derive(Deserialize)]
struct RawQa {
    question: String,
    answer: String,
    #[serde(rename = "type")]
    kind: Option<String>,
}

/// Parses a JSON array of `{question, answer, type}` triples.
pub fn parse_qa_array(json: &str) -> PortResult<Vec<GeneratedQa>> {
    let raw: Vec<RawQa> = serde_json::from_str(json)
        .map_err(|e| PortError::Unexpected(format!("LLM response was not a valid Q&A array: {e}")))?;
    Ok(raw
        .into_iter()
        .map(|qa| GeneratedQa {
            question: qa.question,
            answer: qa.answer,
            kind: qa.kind.unwrap_or_else(|| "unknown".to_string()),
        })
        .collect())
}

/// Slices the substring between the first `[` and the last `]`, for backends
/// that wrap the JSON array in extraneous prose.
pub fn extract_json_array(text: &str) -> PortResult<&str> {
    let start = text.find('[');
    let end = text.rfind(']');
    match (start, end) {
        (Some(start), Some(end)) if end > start => Ok(&text[start..=end]),
        _ => Err(PortError::Unexpected(
            "Could not find a JSON array in the LLM response".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_embeds_heading_and_content() {
        let prompt = build_prompt("Results", "The measured value was 42.");
        assert!(prompt.contains("Section Heading: \"Results\""));
        assert!(prompt.contains("The measured value was 42."));
    }

    #[test]
    fn parses_a_well_formed_array() {
        let json = r#"[{"question": "What was measured?", "answer": "The value 42.", "type": "factual"}]"#;
        let pairs = parse_qa_array(json).unwrap();
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].kind, "factual");
    }

    #[test]
    fn missing_type_tag_defaults_to_unknown() {
        let json = r#"[{"question": "Q?", "answer": "A."}]"#;
        let pairs = parse_qa_array(json).unwrap();
        assert_eq!(pairs[0].kind, "unknown");
    }

    #[test]
    fn array_is_extracted_from_surrounding_prose() {
        let text = "Sure! Here are the pairs:\n[{\"question\": \"Q?\", \"answer\": \"A.\"}]\nHope that helps.";
        let sliced = extract_json_array(text).unwrap();
        assert!(sliced.starts_with('['));
        assert!(sliced.ends_with(']'));
        assert_eq!(parse_qa_array(sliced).unwrap().len(), 1);
    }

    #[test]
    fn prose_without_an_array_is_an_error() {
        assert!(extract_json_array("no json here").is_err());
        assert!(parse_qa_array("{\"not\": \"an array\"}").is_err());
    }
}
