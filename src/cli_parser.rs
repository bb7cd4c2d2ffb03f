// Copyright 2024-2026 llamacpp-observer Contributors
// SPDX-License-Identifier: Apache-2.0

//! CLI argument parsing and help text for llamacpp-observer.

/// Top-level command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Serve,
    Exporter,
    Help(Option<String>),
    Version,
}

/// Parsed command line: the command plus configuration overrides keyed
/// by environment variable name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CliArgs {
    pub command: Command,
    pub overrides: Vec<(&'static str, String)>,
}

const FLAGS: &[(&str, &str)] = &[
    ("--base-url", "LLAMACPP_BASE_URL"),
    ("--model", "LLAMACPP_MODEL"),
    ("--addr", "LLAMACPP_EXPORTER_ADDR"),
    ("--interval", "LLAMACPP_SCRAPE_INTERVAL"),
    ("--timeout", "LLAMACPP_CLIENT_TIMEOUT"),
];

/// Parse `args` as produced by `std::env::args()`.
pub fn parse(args: &[String]) -> Result<CliArgs, String> {
    let mut rest = args.iter().skip(1);
    let command = match args.get(1).map(String::as_str) {
        Some("serve") => {
            rest.next();
            Command::Serve
        }
        Some("exporter") => {
            rest.next();
            Command::Exporter
        }
        Some("help" | "--help" | "-h") => {
            rest.next();
            return Ok(CliArgs { command: Command::Help(rest.next().cloned()), overrides: Vec::new() });
        }
        Some("version" | "--version" | "-V") => {
            return Ok(CliArgs { command: Command::Version, overrides: Vec::new() });
        }
        Some(other) if !other.starts_with("--") => return Err(format!("Unknown command: {}", other)),
        _ => Command::Serve,
    };

    let mut overrides = Vec::new();
    while let Some(arg) = rest.next() {
        let (flag, inline) = match arg.split_once('=') {
            Some((flag, value)) => (flag, Some(value.to_string())),
            None => (arg.as_str(), None),
        };
        let Some(&(_, var)) = FLAGS.iter().find(|(name, _)| *name == flag) else {
            return Err(format!("Unknown argument: {}", arg));
        };
        let value = match inline {
            Some(value) => value,
            None => rest.next().cloned().ok_or_else(|| format!("Missing value for {}", flag))?,
        };
        overrides.push((var, value));
    }
    Ok(CliArgs { command, overrides })
}

/// Print general usage information.
pub fn print_usage() {
    let version = env!("CARGO_PKG_VERSION");
    eprintln!(
        "llamacpp-observer - llama.cpp metrics exporter, tracer and RAG API v{}

USAGE:
    llamacpp-observer [COMMAND] [OPTIONS]

COMMANDS:
    serve        Run the exporter, inference monitor and RAG API (default)
    exporter     Run the metrics exporter only
    version      Show version information
    help         Show this help message

OPTIONS:
    --base-url URL     llama.cpp engine base URL
    --model NAME       Value of the model label on scraped series
    --addr ADDR        Exporter listen address (e.g. :9100)
    --interval DUR     Scrape interval (e.g. 5s)
    --timeout DUR      Engine client timeout (e.g. 3s)

ENVIRONMENT:
    LLAMACPP_BASE_URL, LLAMACPP_MODEL, LLAMACPP_EXPORTER_ADDR,
    LLAMACPP_SCRAPE_INTERVAL, LLAMACPP_CLIENT_TIMEOUT, LLAMACPP_BATCH_BUCKETS,
    LLAMACPP_CONFIG      TOML file read before the environment
    MODEL_RUNNER_URL     Endpoint serving /info (defaults to the base URL)
    RAG_API_ADDR, VECTOR_DB_URL, UPLOAD_DIR, LLM_MODEL, LLM_TIMEOUT,
    CHUNK_SIZE, CHUNK_OVERLAP
    OTEL_EXPORTER_OTLP_ENDPOINT, OTEL_SERVICE_NAME, TRACING_ENABLED
    SHUTDOWN_TIMEOUT, LOG_FORMAT (text|json), RUST_LOG

EXIT CODES:
    0  Clean shutdown
    1  Startup or configuration failure
",
        version
    );
}

/// Print detailed help for a specific command.
pub fn print_command_help(command: &str) {
    match command {
        "serve" => eprintln!(
            "llamacpp-observer serve - Run everything

USAGE:
    llamacpp-observer serve [OPTIONS]

DESCRIPTION:
    Scrapes the engine's /stats endpoint, serves /metrics on the exporter
    address, traces inference requests over OTLP and serves the RAG API
    (/api/documents/upload, /api/rag/query, /api/rag/stream, /health).
"
        ),
        "exporter" => eprintln!(
            "llamacpp-observer exporter - Metrics only

USAGE:
    llamacpp-observer exporter [OPTIONS]

DESCRIPTION:
    Scrapes the engine's /stats endpoint and serves /metrics. No tracing
    and no RAG API.

EXAMPLES:
    llamacpp-observer exporter --base-url http://localhost:8080 --interval 10s
"
        ),
        _ => eprintln!(
            "No detailed help available for '{}'. Use 'llamacpp-observer help' for general usage.",
            command
        ),
    }
}
