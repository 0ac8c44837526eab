//! Prompt templates for RAG generation

use super::retriever::RetrievalResult;
use crate::types::{Message, Turn};

const SYSTEM_INSTRUCTION: &str = "You are a helpful assistant that answers questions about the user's uploaded documents. \
Use the numbered context passages below when they are relevant and cite them inline as [n]. \
If the answer is not in the context, say that you could not find it in the documents, \
then answer from the conversation if you can.";

const NO_CONTEXT_INSTRUCTION: &str = "You are a helpful assistant that answers questions about the user's uploaded documents. \
No passages from the documents matched this question, so answer from the conversation so far \
and say so if the documents would be needed.";

/// Prompt builder for RAG queries
pub struct PromptBuilder;

impl PromptBuilder {
    /// Render retrieved chunks as numbered passages with their sources.
    pub fn build_context(retrieval: &RetrievalResult) -> String {
        retrieval
            .chunks
            .iter()
            .map(|retrieved| {
                let c = &retrieved.citation;
                format!(
                    "[{}] {} (chars {}-{})\n{}",
                    c.marker, c.filename, c.start, c.end, retrieved.chunk.text
                )
            })
            .collect::<Vec<_>>()
            .join("\n\n---\n\n")
    }

    /// System instruction, then the full history verbatim, then the question.
    pub fn build_messages(question: &str, retrieval: &RetrievalResult, history: &[Turn]) -> Vec<Message> {
        let system = if retrieval.is_empty() {
            NO_CONTEXT_INSTRUCTION.to_string()
        } else {
            format!(
                "{}\n\nCONTEXT FROM DOCUMENTS:\n\n{}",
                SYSTEM_INSTRUCTION,
                Self::build_context(retrieval)
            )
        };

        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(Message::system(system));
        messages.extend(history.iter().map(Message::from));
        messages.push(Message::user(question));
        messages
    }

    /// Ask the model to rewrite a follow-up into a standalone question.
    pub fn build_condense_messages(question: &str, history: &[Turn]) -> Vec<Message> {
        let transcript = history
            .iter()
            .map(|turn| format!("{}: {}", turn.role.as_str(), turn.content))
            .collect::<Vec<_>>()
            .join("\n");

        vec![Message::user(format!(
            "Given the following conversation and a follow up question, rephrase the follow up question \
to be a standalone question, in its original language. Reply with the question only.\n\n\
Chat History:\n{}\n\nFollow Up Input: {}\nStandalone question:",
            transcript, question
        ))]
    }
}
