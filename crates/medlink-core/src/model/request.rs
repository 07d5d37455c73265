// ── Translation request/result domain types ──

use chrono::{DateTime, Utc};
use medlink_api::{TranslateAudioRequest, TranslateTextRequest, TranslationResponse};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// A translation request as the engine carries it: either text or
/// base64 audio, plus the language pair and medical context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum TranslationJob {
    #[serde(rename_all = "camelCase")]
    Text {
        text: String,
        source_language: String,
        target_language: String,
        context: String,
    },
    #[serde(rename_all = "camelCase")]
    Audio {
        audio_data: String,
        source_language: String,
        target_language: String,
        context: String,
    },
}

impl TranslationJob {
    pub fn text(
        text: impl Into<String>,
        source: impl Into<String>,
        target: impl Into<String>,
        context: Option<String>,
    ) -> Self {
        Self::Text {
            text: text.into(),
            source_language: source.into(),
            target_language: target.into(),
            context: context.unwrap_or_else(|| "general".into()),
        }
    }

    pub fn audio(
        audio_data: impl Into<String>,
        source: impl Into<String>,
        target: impl Into<String>,
        context: Option<String>,
    ) -> Self {
        Self::Audio {
            audio_data: audio_data.into(),
            source_language: source.into(),
            target_language: target.into(),
            context: context.unwrap_or_else(|| "general".into()),
        }
    }

    pub fn language_pair(&self) -> (&str, &str) {
        match self {
            Self::Text {
                source_language,
                target_language,
                ..
            }
            | Self::Audio {
                source_language,
                target_language,
                ..
            } => (source_language, target_language),
        }
    }

    pub fn context(&self) -> &str {
        match self {
            Self::Text { context, .. } | Self::Audio { context, .. } => context,
        }
    }

    pub fn is_audio(&self) -> bool {
        matches!(self, Self::Audio { .. })
    }

    /// Cache key: content digest plus the full language/context tuple.
    pub fn cache_key(&self) -> CacheKey {
        let (content, prefix) = match self {
            Self::Text { text, .. } => (text.as_str(), "t"),
            Self::Audio { audio_data, .. } => (audio_data.as_str(), "a"),
        };
        let digest = Sha256::digest(content.as_bytes());
        let (source, target) = self.language_pair();
        CacheKey {
            digest: format!("{prefix}:{digest:x}"),
            source_language: source.to_owned(),
            target_language: target.to_owned(),
            context: self.context().to_owned(),
        }
    }
}

impl TranslationJob {
    /// Wire request for the text endpoint, when this is a text job.
    pub fn as_text_request(&self) -> Option<TranslateTextRequest> {
        match self {
            Self::Text {
                text,
                source_language,
                target_language,
                context,
            } => Some(TranslateTextRequest {
                text: text.clone(),
                source_language: source_language.clone(),
                target_language: target_language.clone(),
                context: context.clone(),
            }),
            Self::Audio { .. } => None,
        }
    }

    /// Wire request for the audio endpoint, when this is an audio job.
    pub fn as_audio_request(&self) -> Option<TranslateAudioRequest> {
        match self {
            Self::Audio {
                audio_data,
                source_language,
                target_language,
                context,
            } => Some(TranslateAudioRequest {
                audio_data: audio_data.clone(),
                source_language: source_language.clone(),
                target_language: target_language.clone(),
                context: context.clone(),
            }),
            Self::Text { .. } => None,
        }
    }
}

/// Which transport ultimately produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "lowercase")]
pub enum ResultSource {
    Edge,
    Cloud,
    Offline,
    Cache,
}

/// A completed translation, normalized from any transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranslationResult {
    #[serde(default)]
    pub translated_text: Option<String>,
    #[serde(default)]
    pub transcribed_text: Option<String>,
    #[serde(default)]
    pub audio_response: Option<String>,
    #[serde(default)]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub processing_time: Option<f64>,
    pub source: ResultSource,
}

impl TranslationResult {
    pub fn from_response(resp: TranslationResponse, source: ResultSource) -> Self {
        Self {
            translated_text: resp.translated_text,
            transcribed_text: resp.transcribed_text,
            audio_response: resp.audio_response,
            confidence: resp.confidence,
            processing_time: resp.processing_time,
            source,
        }
    }

    /// The same result re-labeled as a cache hit.
    pub fn as_cached(mut self) -> Self {
        self.source = ResultSource::Cache;
        self
    }
}

/// A translation request captured while disconnected, awaiting replay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfflineQueueItem {
    pub job: TranslationJob,
    pub enqueued_at: DateTime<Utc>,
}

impl OfflineQueueItem {
    pub fn new(job: TranslationJob) -> Self {
        Self {
            job,
            enqueued_at: Utc::now(),
        }
    }
}

/// Composite cache key: content digest + language pair + context.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheKey {
    pub digest: String,
    pub source_language: String,
    pub target_language: String,
    pub context: String,
}

impl CacheKey {
    /// Stable flat representation used as the storage map key.
    pub fn storage_key(&self) -> String {
        format!(
            "{}|{}|{}|{}",
            self.digest, self.source_language, self.target_language, self.context
        )
    }
}

/// A cached translation with its insertion timestamp (used for
/// oldest-first eviction).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
    pub result: TranslationResult,
    pub cached_at: DateTime<Utc>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn cache_key_distinguishes_language_pairs() {
        let a = TranslationJob::text("hello", "en", "es", None).cache_key();
        let b = TranslationJob::text("hello", "en", "fr", None).cache_key();
        assert_ne!(a.storage_key(), b.storage_key());
    }

    #[test]
    fn cache_key_distinguishes_context() {
        let a = TranslationJob::text("hello", "en", "es", None).cache_key();
        let b = TranslationJob::text("hello", "en", "es", Some("cardiology".into())).cache_key();
        assert_ne!(a.storage_key(), b.storage_key());
    }

    #[test]
    fn cache_key_separates_text_and_audio_content() {
        let a = TranslationJob::text("QUJD", "en", "es", None).cache_key();
        let b = TranslationJob::audio("QUJD", "en", "es", None).cache_key();
        assert_ne!(a.storage_key(), b.storage_key());
    }

    #[test]
    fn default_context_is_general() {
        let job = TranslationJob::text("hi", "en", "es", None);
        assert_eq!(job.context(), "general");
    }
}
