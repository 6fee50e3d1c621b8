//! Markdown rendering of agent replies for the chat UI.
//!
//! Presentation only: the section order is fixed but nothing parses it back.

use super::agent::{AgentOutcome, StructuredResponse};

pub fn format(response: &StructuredResponse) -> String {
    match response {
        StructuredResponse::FollowUp { output } | StructuredResponse::Invalid { output } => {
            output.clone()
        }
        StructuredResponse::Translation { original, output, explanation } => {
            render("Translation", original, output, explanation)
        }
        StructuredResponse::Correction { original, output, explanation } => {
            render("Correction", original, output, explanation)
        }
    }
}

pub fn format_outcome(outcome: &AgentOutcome) -> String {
    match outcome {
        AgentOutcome::Structured(response) => format(response),
        AgentOutcome::Raw(text) => text.clone(),
    }
}

fn render(label: &str, original: &str, output: &str, explanation: &str) -> String {
    format!(
        "### {label}  \n\
         **Original**:  \n\
         {original}  \n\
         **Output**:  \n\
         {output}  \n\
         ___ \n\
         **Explanation**:  \n\
         >{explanation}"
    )
}
