use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use interview_core::signature::{sign_body, SIGNATURE_HEADER};
use interview_core::CORRELATION_ID_HEADER;
use serde_json::{json, Map, Value};
use std::fs;
use std::path::PathBuf;

/// Drive an interview session engine the way the interview system does
#[derive(Parser, Debug)]
#[command(name = "interview")]
#[command(about = "Send lifecycle callbacks to an interview session engine", long_about = None)]
struct Cli {
    /// Base URL of the engine
    #[arg(long, env = "INTERVIEW_SERVER_URL", default_value = "http://localhost:3000")]
    server: String,

    /// Shared secret used to sign callback bodies
    #[arg(long, env = "WEBHOOK_SECRET", hide_env_values = true)]
    secret: Option<String>,

    /// Correlation ID to attach to the request
    #[arg(long)]
    correlation_id: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Report that the interview room is ready
    Ready(ReadyArgs),
    /// Set a session's status
    Status(StatusArgs),
    /// Submit the interview result
    Submit(SubmitArgs),
    /// Show a session with its result and recent events
    Show(ShowArgs),
}

#[derive(Parser, Debug)]
struct ReadyArgs {
    #[arg(long)]
    candidate_id: String,

    #[arg(long)]
    interview_id: String,

    /// Link the candidate will be sent
    #[arg(long)]
    url: String,
}

#[derive(Parser, Debug)]
struct StatusArgs {
    #[arg(long)]
    candidate_id: String,

    #[arg(long)]
    interview_id: String,

    /// One of analyzing-interview, created-pending, completed, failed
    status: String,
}

#[derive(Parser, Debug)]
struct SubmitArgs {
    /// JSON result payload; flags below override its fields
    #[arg(long)]
    payload: Option<PathBuf>,

    #[arg(long)]
    candidate_id: Option<String>,

    #[arg(long)]
    interview_id: Option<String>,

    #[arg(long)]
    summary: Option<String>,

    #[arg(long)]
    cost: Option<f64>,

    /// File containing the transcript text
    #[arg(long)]
    transcript: Option<PathBuf>,
}

#[derive(Parser, Debug)]
struct ShowArgs {
    session_id: String,

    /// Bearer token for the inspection endpoint
    #[arg(long, env = "STATUS_AUTH_TOKEN", hide_env_values = true)]
    token: String,
}

fn build_result_body(args: &SubmitArgs) -> Result<Value> {
    let mut body = match &args.payload {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("Failed to read payload file {}", path.display()))?;
            match serde_json::from_str(&text)
                .with_context(|| format!("Payload file {} is not valid JSON", path.display()))?
            {
                Value::Object(map) => map,
                _ => return Err(anyhow!("Payload file {} must hold a JSON object", path.display())),
            }
        }
        None => Map::new(),
    };

    if let Some(id) = &args.candidate_id {
        body.insert("candidateId".to_string(), json!(id));
    }
    if let Some(id) = &args.interview_id {
        body.insert("interviewId".to_string(), json!(id));
    }
    if let Some(summary) = &args.summary {
        body.insert("summary".to_string(), json!(summary));
    }
    if let Some(cost) = args.cost {
        body.insert("cost".to_string(), json!(cost));
    }
    if let Some(path) = &args.transcript {
        let transcript = fs::read_to_string(path)
            .with_context(|| format!("Failed to read transcript {}", path.display()))?;
        body.insert("transcript".to_string(), json!(transcript));
    }

    Ok(Value::Object(body))
}

struct Engine<'a> {
    client: &'a reqwest::Client,
    base: &'a str,
    secret: Option<&'a str>,
    correlation_id: Option<&'a str>,
}

impl Engine<'_> {
    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base.trim_end_matches('/'), path)
    }

    async fn post(&self, path: &str, body: &Value) -> Result<Value> {
        let bytes = serde_json::to_vec(body).context("Failed to serialize request body")?;
        let mut request = self
            .client
            .post(self.url(path))
            .header(reqwest::header::CONTENT_TYPE, "application/json");
        if let Some(secret) = self.secret {
            request = request.header(SIGNATURE_HEADER, sign_body(secret, &bytes));
        }
        if let Some(id) = self.correlation_id {
            request = request.header(CORRELATION_ID_HEADER, id);
        }

        let response = request
            .body(bytes)
            .send()
            .await
            .with_context(|| format!("Failed to reach {}", self.base))?;
        read_json(response).await
    }

    async fn get(&self, path: &str, token: &str) -> Result<Value> {
        let response = self
            .client
            .get(self.url(path))
            .bearer_auth(token)
            .send()
            .await
            .with_context(|| format!("Failed to reach {}", self.base))?;
        read_json(response).await
    }
}

async fn read_json(response: reqwest::Response) -> Result<Value> {
    let status = response.status();
    let text = response
        .text()
        .await
        .context("Failed to read response body")?;

    if !status.is_success() {
        return Err(anyhow!("Engine returned {}: {}", status, text));
    }
    serde_json::from_str(&text).context("Engine returned invalid JSON")
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(60))
        .build()
        .context("Failed to create HTTP client")?;

    let engine = Engine {
        client: &client,
        base: &cli.server,
        secret: cli.secret.as_deref(),
        correlation_id: cli.correlation_id.as_deref(),
    };

    let response = match cli.command {
        Commands::Ready(args) => {
            engine
                .post(
                    "/callbacks/session-ready",
                    &json!({
                        "candidateId": args.candidate_id,
                        "interviewId": args.interview_id,
                        "interviewUrl": args.url,
                    }),
                )
                .await?
        }
        Commands::Status(args) => {
            engine
                .post(
                    "/callbacks/status-update",
                    &json!({
                        "candidateId": args.candidate_id,
                        "interviewId": args.interview_id,
                        "status": args.status,
                    }),
                )
                .await?
        }
        Commands::Submit(args) => {
            let body = build_result_body(&args)?;
            engine.post("/callbacks/result", &body).await?
        }
        Commands::Show(args) => {
            engine
                .get(&format!("/sessions/{}", args.session_id), &args.token)
                .await?
        }
    };

    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}
