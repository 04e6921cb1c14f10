//! thinkrelay-chat – terminal client.
//!
//! Logs in (optionally registering first), then reads prompts from stdin and
//! streams each answer. Commands: `/retry`, `/clear`, `/models`, `/quit`.

mod render;

use anyhow::Context;
use clap::Parser;
use thinkrelay_client::{
    ClientError, Conversation, DEFAULT_GREETING, RelayClient, Renderer, Session, TurnConsumer,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::render::TerminalRenderer;

#[derive(Debug, Parser)]
#[command(version, about = "Chat with a reasoning model through a thinkrelay server")]
struct Args {
    /// Server base URL.
    #[arg(long, env = "THINKRELAY_SERVER", default_value = "http://localhost:3000")]
    server: String,

    #[arg(long, short, env = "THINKRELAY_USER")]
    username: String,

    #[arg(long, short, env = "THINKRELAY_PASSWORD")]
    password: String,

    /// Model to use; the server's default when omitted.
    #[arg(long, short, env = "THINKRELAY_MODEL")]
    model: Option<String>,

    /// Print the model's reasoning as it streams.
    #[arg(long)]
    show_thinking: bool,

    /// Create the account before logging in.
    #[arg(long)]
    register: bool,
}

#[derive(Debug, Clone, Copy)]
enum Command<'a> {
    Prompt(&'a str),
    Retry,
    Clear,
    Models,
    Quit,
}

fn parse_command(line: &str) -> Option<Command<'_>> {
    let line = line.trim();
    match line {
        "" => None,
        "/retry" => Some(Command::Retry),
        "/clear" => Some(Command::Clear),
        "/models" => Some(Command::Models),
        "/quit" | "/exit" => Some(Command::Quit),
        _ => Some(Command::Prompt(line)),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("THINKRELAY_LOG").unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let client = RelayClient::new(&args.server)?;

    if args.register {
        match client.register(&args.username, &args.password).await {
            Ok(user_id) => info!(user_id, "account created"),
            Err(ClientError::Status { status: 409, .. }) => {
                warn!("account already exists; logging in")
            }
            Err(e) => return Err(e).context("registration failed"),
        }
    }

    let session = client
        .login(&args.username, &args.password)
        .await
        .context("login failed")?;
    info!(user = %session.username, expires_in = ?session.expires_in, "logged in");
    println!("{DEFAULT_GREETING}");

    let renderer = TerminalRenderer::new(std::io::stdout(), args.show_thinking);
    let mut repl = Repl {
        client: &client,
        username: &args.username,
        password: &args.password,
        model: args.model.as_deref(),
        session,
        conversation: Conversation::with_greeting(DEFAULT_GREETING),
        consumer: TurnConsumer::new(renderer),
    };
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Some(line) = lines.next_line().await? {
        let Some(command) = parse_command(&line) else { continue };
        match command {
            Command::Quit => break,
            Command::Clear => {
                repl.conversation.clear();
                println!("{DEFAULT_GREETING}");
                continue;
            }
            _ => {}
        }

        match repl.run(command).await {
            Ok(Reply::Models(models)) => println!("{}", models.join("\n")),
            Ok(Reply::Turn) => {}
            Err(ClientError::Conversation(e)) => eprintln!("[error] {e}"),
            Err(ClientError::BadToken) => eprintln!("[error] session rejected after a fresh login"),
            // The renderer has already shown transport failures.
            Err(e) => warn!(error = %e, "command failed"),
        }
    }

    Ok(())
}

#[derive(Debug, PartialEq)]
enum Reply {
    Models(Vec<String>),
    Turn,
}

/// Session and history for one interactive run.
struct Repl<'a, R: Renderer> {
    client: &'a RelayClient,
    username: &'a str,
    password: &'a str,
    model: Option<&'a str>,
    session: Session,
    conversation: Conversation,
    consumer: TurnConsumer<R>,
}

impl<R: Renderer> Repl<'_, R> {
    /// Run a server-bound command. Tokens are short-lived, so a rejected
    /// token triggers one fresh login and a second attempt.
    async fn run(&mut self, command: Command<'_>) -> Result<Reply, ClientError> {
        match self.execute(command).await {
            Err(ClientError::BadToken) => {
                self.session = self.client.login(self.username, self.password).await?;
                info!(expires_in = ?self.session.expires_in, "session renewed");
                self.execute(command).await
            }
            other => other,
        }
    }

    async fn execute(&mut self, command: Command<'_>) -> Result<Reply, ClientError> {
        let token = self.session.token.as_str();
        match command {
            Command::Models => return Ok(Reply::Models(self.client.models(token).await?)),
            Command::Retry => {
                self.client
                    .retry_turn(&mut self.conversation, token, self.model, &mut self.consumer)
                    .await?;
            }
            Command::Prompt(prompt) => {
                self.client
                    .run_turn(&mut self.conversation, token, self.model, prompt, &mut self.consumer)
                    .await?;
            }
            Command::Clear | Command::Quit => {}
        }
        Ok(Reply::Turn)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use axum::extract::Query;
    use axum::http::{StatusCode, header};
    use axum::response::IntoResponse;
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use serde_json::json;
    use std::collections::HashMap;

    #[test]
    fn commands_are_recognised() {
        assert!(matches!(parse_command("/retry"), Some(Command::Retry)));
        assert!(matches!(parse_command(" /clear "), Some(Command::Clear)));
        assert!(matches!(parse_command("/exit"), Some(Command::Quit)));
        assert!(matches!(parse_command("hello"), Some(Command::Prompt("hello"))));
        assert!(parse_command("   ").is_none());
    }

    fn fresh_only(q: &HashMap<String, String>) -> Option<axum::response::Response> {
        (q.get("token").map(String::as_str) != Some("fresh")).then(|| {
            (StatusCode::UNAUTHORIZED, Json(json!({ "error": "bad token" }))).into_response()
        })
    }

    /// Accepts only the token handed out by `/login`.
    async fn spawn_server() -> RelayClient {
        let app = Router::new()
            .route(
                "/login",
                post(|| async {
                    let session = json!({ "token": "fresh", "userId": 1, "username": "u" });
                    Json(session)
                }),
            )
            .route(
                "/models",
                get(|Query(q): Query<HashMap<String, String>>| async move {
                    fresh_only(&q)
                        .unwrap_or_else(|| Json(json!({ "models": ["m1"] })).into_response())
                }),
            )
            .route(
                "/relay",
                get(|Query(q): Query<HashMap<String, String>>| async move {
                    fresh_only(&q).unwrap_or_else(|| {
                        let body = concat!(
                            "data: <think>\n\ndata: </think>\n\n",
                            "data: again\n\ndata: [DONE]\n\n",
                        );
                        ([(header::CONTENT_TYPE, "text/event-stream")], body).into_response()
                    })
                }),
            );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
        RelayClient::new(&format!("http://{addr}")).unwrap()
    }

    fn repl(client: &RelayClient) -> Repl<'_, TerminalRenderer<Vec<u8>>> {
        Repl {
            client,
            username: "u",
            password: "p",
            model: None,
            session: Session {
                token: "stale".into(),
                user_id: 1,
                username: "u".into(),
                expires_in: None,
            },
            conversation: Conversation::with_greeting("hi"),
            consumer: TurnConsumer::new(TerminalRenderer::new(Vec::new(), false)),
        }
    }

    #[tokio::test]
    async fn models_logs_in_again_on_expired_token() {
        let client = spawn_server().await;
        let mut repl = repl(&client);
        let reply = repl.run(Command::Models).await.unwrap();
        assert_eq!(reply, Reply::Models(vec!["m1".into()]));
        assert_eq!(repl.session.token, "fresh");
    }

    #[tokio::test]
    async fn retry_logs_in_again_and_keeps_history() {
        let client = spawn_server().await;
        let mut repl = repl(&client);
        repl.conversation.begin_turn("question").unwrap();
        repl.conversation.complete_turn("first").unwrap();

        assert_eq!(repl.run(Command::Retry).await.unwrap(), Reply::Turn);
        assert_eq!(repl.session.token, "fresh");
        let messages = repl.conversation.messages();
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[1].content, "question");
        assert_eq!(messages[2].content, "again");
    }

    #[tokio::test]
    async fn prompt_logs_in_again() {
        let client = spawn_server().await;
        let mut repl = repl(&client);
        assert_eq!(repl.run(Command::Prompt("q")).await.unwrap(), Reply::Turn);
        assert_eq!(repl.conversation.messages().len(), 3);
    }
}
