//! HTTP transport to a thinkrelay server.

use futures::StreamExt;
use reqwest::{Client, Response, StatusCode, Url};
use serde::Deserialize;
use serde_json::json;
use thinkrelay_proto::SseDecoder;
use tracing::{debug, warn};

use crate::consumer::{Renderer, TurnConsumer, TurnOutcome};
use crate::conversation::Conversation;
use crate::error::ClientError;

/// A logged-in session as returned by `POST /login`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub token: String,
    pub user_id: i64,
    pub username: String,
    #[serde(default)]
    pub expires_in: Option<u64>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RegisterBody {
    user_id: i64,
}

#[derive(Deserialize)]
struct ModelsBody {
    #[serde(default)]
    models: Vec<String>,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

#[derive(Debug, Clone)]
pub struct RelayClient {
    http: Client,
    base_url: Url,
}

impl RelayClient {
    pub fn new(base_url: &str) -> Result<Self, ClientError> {
        // `Url::join` replaces the last segment unless the base ends with `/`.
        let base_url = if base_url.ends_with('/') {
            base_url.to_owned()
        } else {
            format!("{base_url}/")
        };
        let base_url = Url::parse(&base_url).map_err(|e| ClientError::Url(e.to_string()))?;
        Ok(Self { http: Client::builder().build()?, base_url })
    }

    fn url(&self, path: &str) -> Result<Url, ClientError> {
        self.base_url.join(path).map_err(|e| ClientError::Url(e.to_string()))
    }

    /// Create an account. Returns the new user id.
    pub async fn register(&self, username: &str, password: &str) -> Result<i64, ClientError> {
        let response = self
            .http
            .post(self.url("register")?)
            .json(&json!({ "username": username, "password": password }))
            .send()
            .await?;
        let body: RegisterBody = check(response).await?.json().await?;
        Ok(body.user_id)
    }

    pub async fn login(&self, username: &str, password: &str) -> Result<Session, ClientError> {
        let response = self
            .http
            .post(self.url("login")?)
            .json(&json!({ "username": username, "password": password }))
            .send()
            .await?;
        Ok(check(response).await?.json().await?)
    }

    pub async fn models(&self, token: &str) -> Result<Vec<String>, ClientError> {
        let mut url = self.url("models")?;
        url.query_pairs_mut().append_pair("token", token);
        let body: ModelsBody = check(self.http.get(url).send().await?).await?.json().await?;
        Ok(body.models)
    }

    /// Run one relay request, feeding every event into `consumer`.
    ///
    /// Protocol-level endings (`[DONE]`, `[ERROR]`) come back as
    /// `Ok(outcome)`. Everything else is an `Err`, and the consumer has been
    /// told about it through `on_transport_error`.
    pub async fn stream_turn<R: Renderer>(
        &self,
        token: &str,
        model: Option<&str>,
        prompt_json: &str,
        consumer: &mut TurnConsumer<R>,
    ) -> Result<TurnOutcome, ClientError> {
        consumer.begin();
        let result = self.pump(token, model, prompt_json, consumer).await;
        if let Err(e) = &result {
            consumer.on_transport_error(e.to_string());
        }
        result
    }

    async fn pump<R: Renderer>(
        &self,
        token: &str,
        model: Option<&str>,
        prompt_json: &str,
        consumer: &mut TurnConsumer<R>,
    ) -> Result<TurnOutcome, ClientError> {
        let mut url = self.url("relay")?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("token", token).append_pair("prompt", prompt_json);
            if let Some(model) = model {
                query.append_pair("model", model);
            }
        }

        let response = check(self.http.get(url).send().await?).await?;
        let mut body = response.bytes_stream();
        let mut decoder = SseDecoder::new();

        while let Some(chunk) = body.next().await {
            let chunk = chunk.map_err(|e| ClientError::Stream(e.to_string()))?;
            for frame in decoder.feed(&chunk) {
                consumer.on_payload(&frame.data);
                if let Some(outcome) = consumer.outcome() {
                    // Anything after the terminal event is not read.
                    return Ok(outcome.clone());
                }
            }
        }

        // A frame cut off by end of stream is not dispatched.
        match consumer.outcome() {
            Some(outcome) => Ok(outcome.clone()),
            None => Err(ClientError::Stream("connection closed before end of turn".to_owned())),
        }
    }

    /// Send `prompt` as the next turn of `conversation` and record the result.
    pub async fn run_turn<R: Renderer>(
        &self,
        conversation: &mut Conversation,
        token: &str,
        model: Option<&str>,
        prompt: &str,
        consumer: &mut TurnConsumer<R>,
    ) -> Result<TurnOutcome, ClientError> {
        let prompt_json = conversation.begin_turn(prompt)?;
        self.settle(conversation, token, model, &prompt_json, consumer).await
    }

    /// Regenerate the last answer of `conversation`.
    pub async fn retry_turn<R: Renderer>(
        &self,
        conversation: &mut Conversation,
        token: &str,
        model: Option<&str>,
        consumer: &mut TurnConsumer<R>,
    ) -> Result<TurnOutcome, ClientError> {
        let prompt_json = conversation.retry()?;
        self.settle(conversation, token, model, &prompt_json, consumer).await
    }

    async fn settle<R: Renderer>(
        &self,
        conversation: &mut Conversation,
        token: &str,
        model: Option<&str>,
        prompt_json: &str,
        consumer: &mut TurnConsumer<R>,
    ) -> Result<TurnOutcome, ClientError> {
        let result = self.stream_turn(token, model, prompt_json, consumer).await;
        match &result {
            Ok(TurnOutcome::Completed { answer, .. }) => {
                conversation.complete_turn(answer.clone())?
            }
            Ok(TurnOutcome::Failed { reason }) => {
                debug!(%reason, "turn failed; dropping it from the conversation");
                conversation.fail_turn()?;
            }
            Err(_) => conversation.fail_turn()?,
        }
        result
    }
}

/// Map non-success statuses to errors, keeping the server's `error` kind.
async fn check(response: Response) -> Result<Response, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let text = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&text)
        .map(|b| b.error)
        .unwrap_or(text);
    warn!(status = status.as_u16(), %message, "server rejected request");
    if status == StatusCode::UNAUTHORIZED && message == "bad token" {
        return Err(ClientError::BadToken);
    }
    Err(ClientError::Status { status: status.as_u16(), message })
}
