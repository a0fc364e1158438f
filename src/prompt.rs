//! Prompt assembly for question answering
//!
//! Retrieved chunks are "stuffed" into one prompt together with the recent
//! conversation and the question.

use crate::types::{ChatTurn, Chunk};
use serde::{Deserialize, Serialize};

pub const QA_INSTRUCTIONS: &str = "Use the following pieces of context to answer the question at the end. \
If you don't know the answer, just say that you don't know, don't try to make up an answer.";

pub const CONDENSE_INSTRUCTIONS: &str = "Given the following conversation and a follow up question, \
rephrase the follow up question to be a standalone question, in its original language.";

/// How the prompt is wrapped for the model
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum PromptFormat {
    /// Bare text, for base or hosted models that apply their own template
    Plain,
    /// `[INST] <<SYS>> ... <</SYS>> ... [/INST]` as Llama-2-chat was trained on
    #[default]
    Llama2Chat,
}

/// Build the answer prompt.
///
/// `history` should already be cut to the window that belongs in the prompt.
pub fn build_qa_prompt(format: PromptFormat, context: &[Chunk], history: &[ChatTurn], question: &str) -> String {
    let context_text = context
        .iter()
        .map(|c| c.text.trim())
        .collect::<Vec<_>>()
        .join("\n\n");

    let mut body = String::new();
    body.push_str(&context_text);
    body.push_str("\n\n");
    if !history.is_empty() {
        body.push_str("Chat history:\n");
        body.push_str(&format_history(history));
        body.push('\n');
    }
    body.push_str(&format!("Question: {}", question.trim()));

    match format {
        PromptFormat::Plain => format!("{}\n\n{}\nHelpful Answer:", QA_INSTRUCTIONS, body),
        PromptFormat::Llama2Chat => wrap_llama2(QA_INSTRUCTIONS, &body),
    }
}

/// Build the prompt that rewrites a follow-up into a standalone question
pub fn build_condense_prompt(format: PromptFormat, history: &[ChatTurn], question: &str) -> String {
    let body = format!(
        "Chat History:\n{}\nFollow Up Input: {}",
        format_history(history),
        question.trim()
    );

    match format {
        PromptFormat::Plain => format!("{}\n\n{}\nStandalone question:", CONDENSE_INSTRUCTIONS, body),
        PromptFormat::Llama2Chat => wrap_llama2(CONDENSE_INSTRUCTIONS, &body),
    }
}

fn format_history(history: &[ChatTurn]) -> String {
    let mut out = String::new();
    for turn in history {
        out.push_str(&format!("Human: {}\nAssistant: {}\n", turn.question.trim(), turn.answer.trim()));
    }
    out
}

fn wrap_llama2(system: &str, body: &str) -> String {
    format!("[INST] <<SYS>>\n{}\n<</SYS>>\n\n{} [/INST]", system, body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Metadata;

    fn chunk(text: &str) -> Chunk {
        Chunk {
            text: text.to_string(),
            metadata: Metadata::new(),
            start: 0,
        }
    }

    #[test]
    fn test_plain_prompt_contains_context_and_question() {
        let prompt = build_qa_prompt(
            PromptFormat::Plain,
            &[chunk("Revenue grew 10% in Q3."), chunk("Costs fell.")],
            &[],
            "How much did revenue grow?",
        );
        assert!(prompt.starts_with(QA_INSTRUCTIONS));
        assert!(prompt.contains("Revenue grew 10% in Q3.\n\nCosts fell."));
        assert!(prompt.contains("Question: How much did revenue grow?"));
        assert!(prompt.ends_with("Helpful Answer:"));
        assert!(!prompt.contains("Chat history"));
    }

    #[test]
    fn test_history_included_in_order() {
        let history = vec![ChatTurn::new("first?", "one"), ChatTurn::new("second?", "two")];
        let prompt = build_qa_prompt(PromptFormat::Plain, &[chunk("ctx")], &history, "third?");
        let first = prompt.find("Human: first?").unwrap();
        let second = prompt.find("Human: second?").unwrap();
        assert!(first < second);
        assert!(prompt.contains("Assistant: two"));
    }

    #[test]
    fn test_llama2_wrapping() {
        let prompt = build_qa_prompt(PromptFormat::Llama2Chat, &[chunk("ctx")], &[], "q?");
        assert!(prompt.starts_with("[INST] <<SYS>>\n"));
        assert!(prompt.contains("<</SYS>>"));
        assert!(prompt.ends_with("[/INST]"));
    }

    #[test]
    fn test_condense_prompt() {
        let history = vec![ChatTurn::new("What was Q3 revenue?", "It grew 10%.")];
        let prompt = build_condense_prompt(PromptFormat::Plain, &history, "And Q4?");
        assert!(prompt.contains("Follow Up Input: And Q4?"));
        assert!(prompt.contains("Human: What was Q3 revenue?"));
        assert!(prompt.ends_with("Standalone question:"));
    }

    #[test]
    fn test_format_serializes_snake_case() {
        assert_eq!(serde_json::to_string(&PromptFormat::Llama2Chat).unwrap(), "\"llama2_chat\"");
    }
}
