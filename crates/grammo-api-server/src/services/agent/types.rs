use serde::Deserialize;

/// Classified model output. Each task type carries only the fields it uses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StructuredResponse {
    Translation {
        original: String,
        output: String,
        explanation: String,
    },
    Correction {
        original: String,
        output: String,
        explanation: String,
    },
    FollowUp {
        output: String,
    },
    Invalid {
        output: String,
    },
}

impl StructuredResponse {
    pub fn task_type(&self) -> &'static str {
        match self {
            Self::Translation { .. } => "translation",
            Self::Correction { .. } => "correction",
            Self::FollowUp { .. } => "follow-up",
            Self::Invalid { .. } => "invalid",
        }
    }

    pub fn output(&self) -> &str {
        match self {
            Self::Translation { output, .. }
            | Self::Correction { output, .. }
            | Self::FollowUp { output }
            | Self::Invalid { output } => output,
        }
    }
}

/// Wire shape the model is asked to produce. Every field is optional so a
/// partially conforming reply still classifies instead of failing.
#[derive(Debug, Deserialize)]
pub(crate) struct RawResponse {
    #[serde(default)]
    original: Option<String>,
    #[serde(default)]
    task_type: Option<String>,
    #[serde(default)]
    output: Option<String>,
    #[serde(default)]
    explanation: Option<String>,
}

impl From<RawResponse> for StructuredResponse {
    fn from(raw: RawResponse) -> Self {
        let output = raw.output.unwrap_or_default();
        let original = raw.original.unwrap_or_default();
        let explanation = raw.explanation.unwrap_or_default();

        match raw.task_type.as_deref().map(|t| t.trim().to_lowercase()).as_deref() {
            Some("translation") => Self::Translation { original, output, explanation },
            Some("correction") => Self::Correction { original, output, explanation },
            Some("follow-up") | Some("follow_up") | Some("followup") => Self::FollowUp { output },
            _ => Self::Invalid { output },
        }
    }
}

/// What one agent turn produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentOutcome {
    Structured(StructuredResponse),
    /// Reply text that could not be read as a structured object
    Raw(String),
}

/// Classify a model reply; `None` when it holds no parseable object.
///
/// Replies may wrap the object in prose, so each `{` is tried as the start of
/// a JSON value and the first one that reads as a [`RawResponse`] wins.
pub(crate) fn parse_structured(reply: &str) -> Option<StructuredResponse> {
    reply
        .match_indices('{')
        .find_map(|(at, _)| {
            serde_json::Deserializer::from_str(&reply[at..])
                .into_iter::<RawResponse>()
                .next()?
                .ok()
        })
        .map(StructuredResponse::from)
}
