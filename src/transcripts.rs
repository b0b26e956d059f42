//! Client for the external full-text transcript index.
//!
//! The index is consumed over HTTP (Elasticsearch-compatible
//! `_search`). It is constructed explicitly and injected behind a
//! trait, so request handlers never touch a shared global client and
//! tests can substitute a double.

use async_trait::async_trait;
use chrono::{Duration, FixedOffset, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

use crate::config::{IndexConfig, StorageConfig, TimeConfig};
use crate::error::{ClipError, ClipResult};
use crate::reconcile::{resolve_window, ClipWindow};
use crate::time_utils::format_timestamp_for_query;

/// One transcription hit as the index stores it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transcription {
    pub text: String,
    pub channel: String,
    pub display_name: String,
    pub timestamp: String,
    pub service: String,
    pub channel_id: String,
}

/// The consumed interface of the full-text index.
#[async_trait]
pub trait TranscriptIndex: Send + Sync {
    /// Ranked hits for a phrase, bucketed per channel with a bounded
    /// top-N each, restricted to the configured lookback window.
    async fn search_phrase(&self, phrase: &str) -> ClipResult<Vec<Transcription>>;

    /// All hits of one channel inside `[start, end)`, oldest first.
    /// Bounds are pre-rendered query strings (see
    /// [`format_timestamp_for_query`]).
    async fn fetch_range(&self, channel: &str, start: &str, end: &str)
        -> ClipResult<Vec<Transcription>>;
}

/// Elasticsearch-compatible implementation.
pub struct ElasticIndex {
    client: reqwest::Client,
    config: IndexConfig,
    zone: FixedOffset,
}

impl ElasticIndex {
    pub fn new(config: IndexConfig, zone: FixedOffset) -> ClipResult<Self> {
        let client = reqwest::Client::builder()
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .build()?;
        Ok(Self {
            client,
            config,
            zone,
        })
    }

    async fn search(&self, body: Value) -> ClipResult<Value> {
        let url = format!(
            "{}/{}/_search",
            self.config.url.trim_end_matches('/'),
            self.config.index
        );
        let response = self
            .client
            .post(&url)
            .basic_auth(&self.config.username, Some(&self.config.password))
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let payload: Value = response.json().await?;
        if !status.is_success() {
            return Err(ClipError::Index(format!(
                "index returned {}: {}",
                status, payload
            )));
        }
        Ok(payload)
    }
}

#[async_trait]
impl TranscriptIndex for ElasticIndex {
    async fn search_phrase(&self, phrase: &str) -> ClipResult<Vec<Transcription>> {
        let since = Utc::now().with_timezone(&self.zone) - Duration::hours(self.config.lookback_hours);
        let body = json!({
            "size": 0,
            "query": {
                "bool": {
                    "must": [
                        { "match": { "text": phrase } }
                    ],
                    "filter": [
                        { "range": { "@timestamp": { "gte": format_timestamp_for_query(&since) } } }
                    ]
                }
            },
            "sort": [
                { "@timestamp": { "order": "desc" } }
            ],
            "aggs": {
                "by_channel": {
                    "terms": { "field": "slug.keyword", "size": 50 },
                    "aggs": {
                        "top_transcriptions": {
                            "top_hits": {
                                "size": self.config.per_channel_hits,
                                "sort": [
                                    { "@timestamp": { "order": "desc" } }
                                ]
                            }
                        }
                    }
                }
            }
        });

        let payload = self.search(body).await?;
        let mut results = Vec::new();
        if let Some(buckets) = payload
            .pointer("/aggregations/by_channel/buckets")
            .and_then(Value::as_array)
        {
            for bucket in buckets {
                if let Some(hits) = bucket
                    .pointer("/top_transcriptions/hits/hits")
                    .and_then(Value::as_array)
                {
                    for hit in hits {
                        if let Some(source) = hit.get("_source") {
                            results.push(hit_to_transcription(source));
                        }
                    }
                }
            }
        }
        debug!("phrase search {:?}: {} hits", phrase, results.len());
        Ok(results)
    }

    async fn fetch_range(
        &self,
        channel: &str,
        start: &str,
        end: &str,
    ) -> ClipResult<Vec<Transcription>> {
        let body = json!({
            "query": {
                "bool": {
                    "must": [
                        { "match": { "slug": channel } },
                        { "range": { "@timestamp": { "gte": start, "lt": end } } }
                    ]
                }
            },
            "sort": [
                { "@timestamp": { "order": "asc" } }
            ],
            "size": 100
        });

        let payload = self.search(body).await?;
        let results = payload
            .pointer("/hits/hits")
            .and_then(Value::as_array)
            .map(|hits| {
                hits.iter()
                    .filter_map(|hit| hit.get("_source"))
                    .map(hit_to_transcription)
                    .collect()
            })
            .unwrap_or_default();
        Ok(results)
    }
}

fn hit_to_transcription(source: &Value) -> Transcription {
    Transcription {
        text: str_field(source, "text"),
        channel: str_field(source, "slug"),
        display_name: str_field(source, "name"),
        timestamp: str_field(source, "@timestamp"),
        service: str_field(source, "service"),
        channel_id: str_field(source, "channel_id"),
    }
}

fn str_field(value: &Value, key: &str) -> String {
    value
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

/// The joined transcript of one clip, with the window it was fetched
/// for and the strategy that produced that window.
#[derive(Debug, Clone, Serialize)]
pub struct ClipTranscript {
    pub text: String,
    pub window: ClipWindow,
}

/// Fetch and join the transcriptions covering a clip.
///
/// The window comes from segment boundaries when possible, from the
/// fixed-duration grid otherwise; exactly one of the two per request.
pub async fn transcript_for_clip(
    index: &dyn TranscriptIndex,
    storage: &StorageConfig,
    time: &TimeConfig,
    channel: &str,
    instant: chrono::DateTime<FixedOffset>,
    duration_secs: i64,
) -> ClipResult<ClipTranscript> {
    let window = resolve_window(storage, time.fixed_offset, channel, instant, duration_secs).await?;
    let start = format_timestamp_for_query(&window.start);
    let end = format_timestamp_for_query(&window.end);
    let hits = index.fetch_range(channel, &start, &end).await?;

    let text = hits
        .iter()
        .map(|t| t.text.trim())
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ");

    Ok(ClipTranscript { text, window })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hit_to_transcription_maps_index_fields() {
        let source = json!({
            "text": "la noticia del momento",
            "slug": "a24",
            "name": "A24 Noticias",
            "@timestamp": "2025-09-05T23:41:06Z",
            "service": "whisper",
            "channel_id": "ch-7"
        });
        let t = hit_to_transcription(&source);
        assert_eq!(t.text, "la noticia del momento");
        assert_eq!(t.channel, "a24");
        assert_eq!(t.display_name, "A24 Noticias");
        assert_eq!(t.timestamp, "2025-09-05T23:41:06Z");
        assert_eq!(t.service, "whisper");
        assert_eq!(t.channel_id, "ch-7");
    }

    #[test]
    fn test_hit_to_transcription_tolerates_missing_fields() {
        let t = hit_to_transcription(&json!({ "text": "solo texto" }));
        assert_eq!(t.text, "solo texto");
        assert_eq!(t.channel, "");
        assert_eq!(t.channel_id, "");
    }
}
