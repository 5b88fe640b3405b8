//! Demo MCP server over SSE
//!
//! Serves two tools, `echo` and `server_time`. Connect with any SSE client:
//!
//! ```text
//! curl -N http://127.0.0.1:3000/sse
//! curl -X POST http://127.0.0.1:3000/messages/<connection-id> \
//!      -H 'content-type: application/json' \
//!      -d '{"jsonrpc":"2.0","id":1,"method":"tools/list"}'
//! ```

use beacon_mcp_logging::{init_tracing, LogFormat, LoggingConfig};
use beacon_mcp_server::{
    DispatcherConfig, McpServer, ServerConfig, SseConfig, ToolDescriptor, ToolRegistry,
};
use clap::Parser;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Parser)]
#[command(name = "beacon-sse-demo")]
#[command(about = "Demo MCP server exposing tools over Server-Sent Events")]
struct Args {
    /// Address to bind
    #[arg(long, env = "BEACON_HOST", default_value = "127.0.0.1")]
    host: String,

    /// Port to bind
    #[arg(short, long, env = "BEACON_PORT", default_value_t = 3000)]
    port: u16,

    /// Maximum number of concurrent SSE streams
    #[arg(long, default_value_t = 100)]
    max_connections: usize,

    /// Skip the automatic initialize handshake
    #[arg(long)]
    no_auto_initialize: bool,

    /// Close streams idle for this many seconds
    #[arg(long)]
    idle_timeout: Option<u64>,

    /// Log output format: pretty, json or compact
    #[arg(long, default_value = "pretty")]
    log_format: LogFormat,

    /// Default log filter, overridden by RUST_LOG
    #[arg(long, default_value = "info")]
    log_level: String,
}

async fn echo(arguments: Map<String, Value>) -> anyhow::Result<Value> {
    let text = arguments
        .get("text")
        .and_then(Value::as_str)
        .ok_or_else(|| anyhow::anyhow!("missing required argument: text"))?;
    Ok(json!(text))
}

async fn server_time(arguments: Map<String, Value>) -> anyhow::Result<Value> {
    let now = chrono::Utc::now();
    match arguments.get("format").and_then(Value::as_str) {
        Some("unix") => Ok(json!({ "unix": now.timestamp() })),
        Some("rfc3339") | None => Ok(json!({ "rfc3339": now.to_rfc3339() })),
        Some(other) => anyhow::bail!("invalid format '{other}', expected unix or rfc3339"),
    }
}

fn tools() -> Vec<ToolDescriptor> {
    vec![
        ToolDescriptor::from_fn(
            "echo",
            "Return the given text unchanged",
            json!({
                "type": "object",
                "properties": {"text": {"type": "string"}},
                "required": ["text"]
            }),
            echo,
        ),
        ToolDescriptor::from_fn(
            "server_time",
            "Current server time",
            json!({
                "type": "object",
                "properties": {"format": {"type": "string", "enum": ["unix", "rfc3339"]}}
            }),
            server_time,
        ),
    ]
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    init_tracing(&LoggingConfig {
        level: args.log_level.clone(),
        format: args.log_format,
    })?;

    let registry = Arc::new(ToolRegistry::new());
    registry.register_all(tools())?;

    let mut transport = SseConfig::default()
        .with_host(args.host)
        .with_port(args.port)
        .with_max_connections(args.max_connections)
        .with_auto_initialize(!args.no_auto_initialize);
    transport.idle_timeout_secs = args.idle_timeout;

    let config = ServerConfig {
        dispatcher: DispatcherConfig::new("beacon-sse-demo", env!("CARGO_PKG_VERSION"))
            .with_instructions("Call echo with {\"text\": ...} or server_time."),
        transport,
        ..Default::default()
    };

    let mut server = McpServer::new(registry, config)?;
    info!(tools = server.registry().size(), "Starting demo server");
    server.run().await?;
    info!("Demo server stopped");
    Ok(())
}
