//! Core data models for translation

use serde::{Deserialize, Serialize};

use crate::core::errors::{ProxyError, Result};

/// Translation request as sent by the browser client
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranslationRequest {
    /// Transcribed text
    #[serde(default)]
    pub input_text: Option<String>,
    /// Language of the text
    #[serde(default)]
    pub input_lang: Option<String>,
    /// Language to translate into
    #[serde(default)]
    pub output_lang: Option<String>,
}

impl TranslationRequest {
    /// Request with all three fields set
    pub fn new(
        input_text: impl Into<String>,
        input_lang: impl Into<String>,
        output_lang: impl Into<String>,
    ) -> Self {
        Self {
            input_text: Some(input_text.into()),
            input_lang: Some(input_lang.into()),
            output_lang: Some(output_lang.into()),
        }
    }

    /// Check that all three fields are present and non-empty
    pub fn validate(self) -> Result<ValidatedRequest> {
        fn present(field: Option<String>) -> Option<String> {
            field.filter(|value| !value.is_empty())
        }

        match (
            present(self.input_text),
            present(self.input_lang),
            present(self.output_lang),
        ) {
            (Some(text), Some(source_lang), Some(target_lang)) => Ok(ValidatedRequest {
                text,
                source_lang,
                target_lang,
            }),
            _ => Err(ProxyError::missing_fields()),
        }
    }
}

/// A request whose fields have passed validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedRequest {
    /// Text to translate
    pub text: String,
    /// Source language
    pub source_lang: String,
    /// Target language
    pub target_lang: String,
}

impl ValidatedRequest {
    /// Short prefix of the input used in log lines
    pub fn preview(&self) -> String {
        self.text.chars().take(50).collect()
    }
}

/// Successful translation body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslationResult {
    /// Trimmed translation
    pub translated: String,
}

/// Chat message in the upstream completion format
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// `system`, `user` or `assistant`
    pub role: String,
    /// Message text
    pub content: String,
}

impl ChatMessage {
    /// System instruction message
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    /// User message
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// Upstream chat completion request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatCompletionRequest {
    /// Model id
    pub model: String,
    /// System message, then user message
    pub messages: Vec<ChatMessage>,
    /// Output token cap
    pub max_tokens: u32,
    /// Sampling temperature
    pub temperature: f32,
}

/// The parts of the upstream response the proxy reads
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChatCompletionResponse {
    /// Completion choices; only the first is used
    #[serde(default)]
    pub choices: Vec<ChatChoice>,
}

/// One completion choice
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChatChoice {
    /// Generated message
    #[serde(default)]
    pub message: Option<ChoiceMessage>,
}

/// Message inside a completion choice
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChoiceMessage {
    /// Generated text
    #[serde(default)]
    pub content: Option<String>,
}

impl ChatCompletionResponse {
    /// Trimmed content of the first choice, if any
    pub fn first_content(&self) -> Option<&str> {
        self.choices
            .first()
            .and_then(|choice| choice.message.as_ref())
            .and_then(|message| message.content.as_deref())
            .map(str::trim)
            .filter(|content| !content.is_empty())
    }
}

/// A language the browser client can offer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Language {
    /// Language or locale tag
    pub code: &'static str,
    /// Display name
    pub name: &'static str,
}

/// Speech-recognition locales offered as input languages
pub const INPUT_LANGUAGES: &[Language] = &[
    Language { code: "en-US", name: "English (US)" },
    Language { code: "es-ES", name: "Spanish" },
    Language { code: "fr-FR", name: "French" },
    Language { code: "de-DE", name: "German" },
    Language { code: "it-IT", name: "Italian" },
    Language { code: "pt-BR", name: "Portuguese (Brazil)" },
    Language { code: "ru-RU", name: "Russian" },
    Language { code: "zh-CN", name: "Chinese (Simplified)" },
    Language { code: "ja-JP", name: "Japanese" },
    Language { code: "ko-KR", name: "Korean" },
    Language { code: "ar-SA", name: "Arabic" },
    Language { code: "hi-IN", name: "Hindi" },
];

/// Output languages
pub const OUTPUT_LANGUAGES: &[Language] = &[
    Language { code: "en", name: "English" },
    Language { code: "es", name: "Spanish" },
    Language { code: "fr", name: "French" },
    Language { code: "de", name: "German" },
    Language { code: "it", name: "Italian" },
    Language { code: "pt", name: "Portuguese" },
    Language { code: "ru", name: "Russian" },
    Language { code: "zh", name: "Chinese" },
    Language { code: "ja", name: "Japanese" },
    Language { code: "ko", name: "Korean" },
    Language { code: "ar", name: "Arabic" },
    Language { code: "hi", name: "Hindi" },
];
