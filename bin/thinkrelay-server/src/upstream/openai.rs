//! OpenAI-compatible streaming chat-completion client.
//!
//! Works against any provider exposing `POST {base_url}/chat/completions`
//! with `stream: true`. Reasoning models report their deliberation in
//! `delta.reasoning_content` (or `delta.reasoning`), the reply in
//! `delta.content`.

use std::time::Duration;

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thinkrelay_proto::{ChatMessage, SseDecoder, DONE_MARKER};
use tracing::{debug, warn};

use super::{CompletionClient, Delta, DeltaStream, UpstreamError};

/// Longest provider error body kept in an [`UpstreamError::Rejected`].
const MAX_ERROR_BODY: usize = 512;

pub struct OpenAiCompatClient {
    http: Client,
    base_url: String,
    api_key: String,
}

impl std::fmt::Debug for OpenAiCompatClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiCompatClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl OpenAiCompatClient {
    /// Build a client. Only connection setup is bounded in time; a running
    /// generation may take as long as the provider needs.
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Result<Self, UpstreamError> {
        let http = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self { http, base_url: base_url.into(), api_key: api_key.into() })
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
}

#[derive(Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
    #[serde(default)]
    error: Option<serde_json::Value>,
}

#[derive(Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: Option<WireDelta>,
}

#[derive(Deserialize)]
struct WireDelta {
    #[serde(default)]
    reasoning_content: Option<String>,
    /// Spelling used by some OpenAI-compatible servers, sometimes alongside
    /// `reasoning_content`.
    #[serde(default)]
    reasoning: Option<String>,
    #[serde(default)]
    content: Option<String>,
}

#[async_trait]
impl CompletionClient for OpenAiCompatClient {
    async fn open(
        &self,
        model: &str,
        messages: &[ChatMessage],
    ) -> Result<DeltaStream, UpstreamError> {
        let response = self
            .http
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(&CompletionRequest { model, messages, stream: true })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body: String = response
                .text()
                .await
                .unwrap_or_default()
                .chars()
                .take(MAX_ERROR_BODY)
                .collect();
            warn!(status = status.as_u16(), %model, "upstream rejected completion request");
            return Err(UpstreamError::Rejected { status: status.as_u16(), body });
        }

        debug!(%model, messages = messages.len(), "upstream stream opened");
        Ok(Box::pin(delta_stream(response.bytes_stream())))
    }
}

/// Turn a provider SSE byte stream into deltas.
///
/// Frames that do not parse are skipped. An `error` object from the provider
/// or a broken body ends the stream with an error item.
fn delta_stream<S, B, E>(bytes: S) -> impl Stream<Item = Result<Delta, UpstreamError>> + Send
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send,
    E: std::fmt::Display + Send,
{
    async_stream::stream! {
        let mut bytes = Box::pin(bytes);
        let mut decoder = SseDecoder::new();
        let mut finished = false;

        while !finished {
            let frames = match bytes.next().await {
                Some(Ok(chunk)) => decoder.feed(chunk.as_ref()),
                Some(Err(e)) => {
                    yield Err(UpstreamError::Stream(e.to_string()));
                    return;
                }
                None => {
                    finished = true;
                    decoder.finish().into_iter().collect()
                }
            };

            for frame in frames {
                match parse_frame(&frame.data) {
                    Ok(Some(delta)) => yield Ok(delta),
                    Ok(None) => {}
                    Err(UpstreamError::Decode(detail)) => {
                        debug!(%detail, "skipping unreadable upstream frame");
                    }
                    Err(e) => {
                        yield Err(e);
                        return;
                    }
                }
            }
        }
    }
}

/// Parse one `data:` payload. `Ok(None)` for `[DONE]` and frames without
/// text.
fn parse_frame(data: &str) -> Result<Option<Delta>, UpstreamError> {
    let data = data.trim();
    if data.is_empty() || data == DONE_MARKER {
        return Ok(None);
    }

    let chunk: StreamChunk =
        serde_json::from_str(data).map_err(|e| UpstreamError::Decode(e.to_string()))?;

    if let Some(error) = chunk.error {
        let message = error
            .get("message")
            .and_then(|m| m.as_str())
            .map(str::to_owned)
            .unwrap_or_else(|| error.to_string());
        return Err(UpstreamError::Stream(message));
    }

    let Some(delta) = chunk.choices.into_iter().next().and_then(|c| c.delta) else {
        return Ok(None);
    };
    let delta = Delta {
        reasoning: delta
            .reasoning_content
            .filter(|s| !s.is_empty())
            .or(delta.reasoning.filter(|s| !s.is_empty())),
        answer: delta.content.filter(|s| !s.is_empty()),
    };
    if delta == Delta::default() {
        return Ok(None);
    }
    Ok(Some(delta))
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod test {
    use super::*;
    use futures::stream;

    fn collect(chunks: Vec<&'static str>) -> Vec<Result<Delta, String>> {
        let source = stream::iter(chunks.into_iter().map(Ok::<_, std::io::Error>));
        futures::executor::block_on(
            delta_stream(source)
                .map(|item| item.map_err(|e| e.to_string()))
                .collect(),
        )
    }

    #[test]
    fn reasoning_and_content_fields_are_split() {
        let out = collect(vec![
            "data: {\"choices\":[{\"delta\":{\"role\":\"assistant\"}}]}\n\n",
            "data: {\"choices\":[{\"delta\":{\"reasoning_content\":\"hmm\"}}]}\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"Hi\"}}]}\n\n",
            "data: [DONE]\n\n",
        ]);
        assert_eq!(out, vec![Ok(Delta::reasoning("hmm")), Ok(Delta::answer("Hi"))]);
    }

    #[test]
    fn frames_split_mid_json_are_reassembled() {
        let out = collect(vec![
            "data: {\"choices\":[{\"delta\":{\"con",
            "tent\":\"line1\\nline2\"}}]}\n",
            "\n",
        ]);
        assert_eq!(out, vec![Ok(Delta::answer("line1\nline2"))]);
    }

    #[test]
    fn reasoning_alias_is_accepted() {
        let out = collect(vec!["data: {\"choices\":[{\"delta\":{\"reasoning\":\"r\"}}]}\n\n"]);
        assert_eq!(out, vec![Ok(Delta::reasoning("r"))]);
    }

    #[test]
    fn both_reasoning_spellings_in_one_frame() {
        let out = collect(vec![concat!(
            r#"data: {"choices":[{"delta":{"#,
            r#""reasoning_content":"r","reasoning":"r","content":"answer"}}]}"#,
            "\n\n",
        )]);
        let expected = Delta { reasoning: Some("r".into()), answer: Some("answer".into()) };
        assert_eq!(out, vec![Ok(expected)]);
    }

    #[test]
    fn unreadable_frames_are_skipped() {
        let out = collect(vec![
            "data: not json\n\n",
            ": ping\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"ok\"}}]}\n\n",
        ]);
        assert_eq!(out, vec![Ok(Delta::answer("ok"))]);
    }

    #[test]
    fn provider_error_object_ends_stream() {
        let out = collect(vec![
            "data: {\"choices\":[{\"delta\":{\"content\":\"a\"}}]}\n\n",
            "data: {\"error\":{\"message\":\"quota exceeded\"}}\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"b\"}}]}\n\n",
        ]);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0], Ok(Delta::answer("a")));
        assert!(out[1].as_ref().unwrap_err().contains("quota exceeded"));
    }

    #[test]
    fn trailing_frame_without_blank_line_is_flushed() {
        let out = collect(vec!["data: {\"choices\":[{\"delta\":{\"content\":\"end\"}}]}"]);
        assert_eq!(out, vec![Ok(Delta::answer("end"))]);
    }

    #[test]
    fn broken_body_yields_stream_error() {
        let source = stream::iter(vec![
            Ok("data: {\"choices\":[{\"delta\":{\"content\":\"a\"}}]}\n\n"),
            Err(std::io::Error::other("reset by peer")),
        ]);
        let out: Vec<_> = futures::executor::block_on(delta_stream(source).collect());
        assert!(matches!(out[0], Ok(_)));
        assert!(matches!(&out[1], Err(UpstreamError::Stream(m)) if m.contains("reset")));
    }

    #[test]
    fn endpoint_joins_base_url() {
        let client = OpenAiCompatClient::new("https://api.example.com/v1/", "k").unwrap();
        assert_eq!(client.endpoint(), "https://api.example.com/v1/chat/completions");
    }
}
