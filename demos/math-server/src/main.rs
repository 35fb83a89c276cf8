//! Math MCP server
//!
//! ```bash
//! cargo run -p math-server -- --transport streamable-http --bind 127.0.0.1:8641
//! ```

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::Context as _;
use clap::{Parser, ValueEnum};
use minimcp_http::HttpMcpServer;
use minimcp_server::prelude::*;
use minimcp_server::stdio::StdioTransport;
use serde_json::json;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Transport {
    Stdio,
    Http,
    StreamableHttp,
}

#[derive(Parser, Debug)]
#[command(name = "math-server", about = "Arithmetic tools over MCP")]
struct Args {
    /// Wire transport
    #[arg(long, value_enum, env = "MATH_SERVER_TRANSPORT", default_value = "stdio")]
    transport: Transport,

    /// Listen address for the HTTP transports
    #[arg(long, env = "MATH_SERVER_BIND", default_value = "127.0.0.1:8641")]
    bind: SocketAddr,

    /// MCP endpoint path for the HTTP transports
    #[arg(long, env = "MATH_SERVER_PATH", default_value = "/mcp")]
    path: String,

    /// Seconds a handler may go without progress before it is cancelled
    #[arg(long, env = "MATH_SERVER_IDLE_TIMEOUT", default_value_t = 30)]
    idle_timeout_secs: u64,

    /// Handlers allowed to run at once
    #[arg(long, env = "MATH_SERVER_MAX_CONCURRENCY", default_value_t = 100)]
    max_concurrency: usize,
}

fn build_server(args: &Args) -> McpResult<MiniMcp> {
    MiniMcp::builder()
        .name("math-server")
        .version(env!("CARGO_PKG_VERSION"))
        .title("Math Server")
        .instructions("Arithmetic tools, a pi constant and multiplication tables")
        .idle_timeout(Duration::from_secs(args.idle_timeout_secs))
        .max_concurrency(args.max_concurrency)
        .tool(FunctionTool::new(
            Tool::new("add", ToolSchema::object().number("a", "First addend").number("b", "Second addend"))
                .with_description("Add two numbers"),
            |args: ToolArguments, _ctx: Context| async move {
                let a: f64 = required_arg(&args, "a")?;
                let b: f64 = required_arg(&args, "b")?;
                Ok(CallToolResult::text((a + b).to_string())
                    .with_structured_content(json!({"sum": a + b})))
            },
        ))
        .tool(FunctionTool::new(
            Tool::new("divide", ToolSchema::object().number("a", "Dividend").number("b", "Divisor"))
                .with_description("Divide a by b"),
            |args: ToolArguments, _ctx: Context| async move {
                let a: f64 = required_arg(&args, "a")?;
                let b: f64 = required_arg(&args, "b")?;
                if b == 0.0 {
                    return Err(McpError::tool_execution("Division by zero"));
                }
                Ok(CallToolResult::text((a / b).to_string()))
            },
        ))
        .tool(FunctionTool::new(
            Tool::new("count_down", ToolSchema::object().number("from", "Starting value"))
                .with_description("Count down to zero, reporting progress once a second"),
            |args: ToolArguments, ctx: Context| async move {
                let from: u32 = required_arg(&args, "from")?;
                for step in 0..from {
                    let remaining = from - step;
                    ctx.report_progress(step as f64, Some(from as f64), Some(format!("{} left", remaining)))
                        .await?;
                    tokio::time::sleep(Duration::from_secs(1)).await;
                }
                Ok(CallToolResult::text(format!("Counted down from {}", from)))
            },
        ))
        .prompt(FunctionPrompt::new(
            Prompt::new("explain")
                .with_description("Ask for an explanation of a math topic")
                .with_argument(PromptArgument::new("topic").required()),
            |args: PromptArguments, _ctx: Context| async move {
                let topic = args.get("topic").cloned().unwrap_or_default();
                Ok(vec![PromptMessage::user_text(format!(
                    "Explain {} in simple terms, with one worked example.",
                    topic
                ))])
            },
        ))
        .resource(FunctionResource::new(
            Resource::new("math://constants/pi", "pi")
                .with_description("The ratio of a circle's circumference to its diameter")
                .with_mime_type("text/plain"),
            |uri: String, _params: UriParams, _ctx: Context| async move {
                Ok(vec![ResourceContents::text(uri, std::f64::consts::PI.to_string())])
            },
        ))
        .resource(FunctionResource::template(
            ResourceTemplate::new("math://tables/{n}", "multiplication table")
                .with_mime_type("text/plain"),
            |uri: String, params: UriParams, _ctx: Context| async move {
                let n: i64 = params
                    .get("n")
                    .and_then(|n| n.parse().ok())
                    .ok_or_else(|| McpError::invalid_params("n must be an integer"))?;
                let table: Vec<String> = (1..=10).map(|i| format!("{} x {} = {}", n, i, n * i)).collect();
                Ok(vec![ResourceContents::text(uri, table.join("\n"))])
            },
        ))
        .build()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // stdout carries protocol messages on stdio, so logs always go to stderr
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let server = build_server(&args).context("invalid server definition")?;
    info!(transport = ?args.transport, "Starting math-server");

    match args.transport {
        Transport::Stdio => StdioTransport::new(server).run().await?,
        Transport::Http | Transport::StreamableHttp => {
            let http = HttpMcpServer::builder(server)
                .bind_address(args.bind)
                .mcp_path(args.path)
                .streaming(args.transport == Transport::StreamableHttp)
                .build()?;
            http.run_until(async {
                let _ = tokio::signal::ctrl_c().await;
            })
            .await?;
        }
    }
    Ok(())
}
