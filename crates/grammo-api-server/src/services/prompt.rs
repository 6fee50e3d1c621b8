//! Turns a raw user message plus the `mode` / `tone` modifiers into the
//! message list sent to the agent.
//!
//! Only the new turn is built here; earlier turns live in the agent's own
//! history and are never re-sent by the caller.

use crate::models::chat::ChatMessage;

const DEFAULT: &str = "default";

/// Task steering picked by the client
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mode {
    /// Let the model infer the task from the message alone
    Default,
    /// Explicit grammar, spelling and punctuation review
    Grammar,
    /// Anything else, including no mode at all
    Passthrough,
}

impl Mode {
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.map(str::trim) {
            Some(DEFAULT) => Mode::Default,
            Some("grammar") => Mode::Grammar,
            _ => Mode::Passthrough,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Tone {
    Default,
    Custom(String),
}

impl Tone {
    /// Missing or blank tone is treated as `default`.
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.map(str::trim) {
            None | Some("") | Some(DEFAULT) => Tone::Default,
            Some(tone) => Tone::Custom(tone.to_string()),
        }
    }
}

pub fn compose(mode: &Mode, tone: &Tone, message: &str) -> Vec<ChatMessage> {
    if *mode == Mode::Default && *tone == Tone::Default {
        return vec![ChatMessage::user(message)];
    }

    let mut content = match mode {
        Mode::Grammar => grammar_instruction(message),
        _ => format!("{}\n", message),
    };

    if let Tone::Custom(tone) = tone {
        content.push_str(&tone_instruction(tone));
    }

    vec![ChatMessage::user(content)]
}

/// The message is fenced so its content cannot be read as instructions.
fn grammar_instruction(message: &str) -> String {
    format!(
        "Carefully review the following text (inside triple backticks) for grammar, \
         spelling, and punctuation mistakes. Correct any errors you find and provide \
         suggestions for improvement if appropriate.\n\n```{}```\n",
        message
    )
}

fn tone_instruction(tone: &str) -> String {
    format!(
        "Please use a {} tone while preserving its original meaning and clarity.",
        tone
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn content(messages: &[ChatMessage]) -> &str {
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].role, "user");
        &messages[0].content
    }

    #[test]
    fn test_default_mode_and_tone_keep_message_verbatim() {
        let msg = "  translate: je suis fatigué\n";
        let out = compose(&Mode::Default, &Tone::Default, msg);
        assert_eq!(content(&out), msg);
    }

    #[test]
    fn test_grammar_mode_fences_message() {
        let msg = "She don't like apples.";
        let out = compose(&Mode::Grammar, &Tone::Default, msg);
        let text = content(&out);

        assert!(text.contains("grammar, spelling, and punctuation"));
        assert!(text.contains(&format!("```{}```", msg)));
        assert!(!text.contains("tone"));
    }

    #[test]
    fn test_other_mode_appends_newline() {
        let out = compose(&Mode::Passthrough, &Tone::Default, "hello");
        assert_eq!(content(&out), "hello\n");
    }

    #[test]
    fn test_tone_is_appended_last() {
        for mode in [Mode::Default, Mode::Grammar, Mode::Passthrough] {
            let out = compose(&mode, &Tone::Custom("formal".into()), "hey there");
            let text = content(&out);
            assert!(text.contains("hey there"));
            assert!(
                text.ends_with("Please use a formal tone while preserving its original meaning and clarity."),
                "mode {:?} produced {:?}",
                mode,
                text
            );
        }
    }

    #[test]
    fn test_default_mode_with_tone_uses_passthrough_body() {
        let out = compose(&Mode::Default, &Tone::Custom("casual".into()), "hi");
        assert!(content(&out).starts_with("hi\nPlease use a casual tone"));
    }

    #[test]
    fn test_parse_modifiers() {
        assert_eq!(Mode::parse(Some("default")), Mode::Default);
        assert_eq!(Mode::parse(Some("grammar")), Mode::Grammar);
        assert_eq!(Mode::parse(Some("translate")), Mode::Passthrough);
        assert_eq!(Mode::parse(None), Mode::Passthrough);

        assert_eq!(Tone::parse(None), Tone::Default);
        assert_eq!(Tone::parse(Some("")), Tone::Default);
        assert_eq!(Tone::parse(Some("default")), Tone::Default);
        assert_eq!(Tone::parse(Some("friendly")), Tone::Custom("friendly".into()));
    }
}
