//! Single API call, printed as the tool result envelope

use anyhow::{Context, Result};
use clap::{Args, ValueEnum};
use colored::*;
use log::info;
use serde_json::{Value, json};
use std::fs;
use std::path::PathBuf;

use crate::api::{HttpMethod, RequestExecutor, RequestPayload};
use crate::config::Config;

#[derive(Args)]
pub struct RawCommands {
    /// API path relative to the profile base URL (e.g. /invoices)
    pub path: String,

    /// HTTP method
    #[arg(short, long, default_value = "get")]
    pub method: MethodArg,

    /// JSON body for PUT and POST
    #[arg(short, long)]
    pub data: Option<String>,

    /// Query parameter as key=value, repeatable (GET only)
    #[arg(short, long)]
    pub query: Vec<String>,

    /// Output format
    #[arg(long, default_value = "json")]
    pub format: OutputFormat,

    /// Write the result to a file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum MethodArg {
    Get,
    Put,
    Post,
}

impl From<MethodArg> for HttpMethod {
    fn from(method: MethodArg) -> Self {
        match method {
            MethodArg::Get => HttpMethod::Get,
            MethodArg::Put => HttpMethod::Put,
            MethodArg::Post => HttpMethod::Post,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Pretty-printed JSON (default)
    Json,
    /// Single-line JSON
    JsonCompact,
}

/// Run the call; returns whether the result was ok
pub async fn handle_raw_command(args: RawCommands, config: &Config, profile: Option<&str>) -> Result<bool> {
    let method = HttpMethod::from(args.method);
    let payload = build_payload(method, args.data.as_deref(), &args.query)?;

    let resolved = config.resolve(profile)?;
    let executor = RequestExecutor::connect(&resolved, config.resilience.to_config())?;

    info!("Executing raw {} {}", method, args.path);
    let result = executor.call(method, &args.path, payload).await;
    let value = result.to_json();

    let rendered = match args.format {
        OutputFormat::Json => serde_json::to_string_pretty(&value)?,
        OutputFormat::JsonCompact => serde_json::to_string(&value)?,
    };

    match &args.output {
        Some(path) => {
            fs::write(path, format!("{}\n", rendered))
                .with_context(|| format!("Failed to write output file: {}", path.display()))?;
            let marker = if result.is_success() { "✓".green() } else { "✗".red() };
            eprintln!("{} Result written to {}", marker, path.display().to_string().cyan());
        }
        None => println!("{}", rendered),
    }

    Ok(result.is_success())
}

fn build_payload(method: HttpMethod, data: Option<&str>, query: &[String]) -> Result<RequestPayload> {
    if method.is_mutating() {
        if !query.is_empty() {
            anyhow::bail!("--query is only supported for GET requests");
        }
        let body: Value = match data {
            Some(data) => serde_json::from_str(data).context("--data is not valid JSON")?,
            None => json!({}),
        };
        return Ok(RequestPayload::Json(body));
    }

    if data.is_some() {
        anyhow::bail!("--data is only supported for PUT and POST requests");
    }
    if query.is_empty() {
        return Ok(RequestPayload::None);
    }

    let params = query
        .iter()
        .map(|pair| parse_query_pair(pair))
        .collect::<Result<Vec<_>>>()?;
    Ok(RequestPayload::Query(params))
}

pub(crate) fn parse_query_pair(pair: &str) -> Result<(String, String)> {
    match pair.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => Ok((key.trim().to_string(), value.to_string())),
        _ => anyhow::bail!("Invalid query parameter '{}', expected key=value", pair),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_query_pair() {
        assert_eq!(
            parse_query_pair("status=open").unwrap(),
            ("status".to_string(), "open".to_string())
        );
        assert_eq!(
            parse_query_pair("from=2024-01-01=x").unwrap(),
            ("from".to_string(), "2024-01-01=x".to_string())
        );
        assert!(parse_query_pair("novalue").is_err());
        assert!(parse_query_pair("=x").is_err());
    }

    #[test]
    fn test_build_payload() {
        assert_eq!(build_payload(HttpMethod::Get, None, &[]).unwrap(), RequestPayload::None);
        assert_eq!(
            build_payload(HttpMethod::Get, None, &["page=2".to_string()]).unwrap(),
            RequestPayload::Query(vec![("page".to_string(), "2".to_string())])
        );
        assert_eq!(
            build_payload(HttpMethod::Post, Some(r#"{"name":"Acme"}"#), &[]).unwrap(),
            RequestPayload::Json(json!({"name": "Acme"}))
        );
        assert_eq!(
            build_payload(HttpMethod::Put, None, &[]).unwrap(),
            RequestPayload::Json(json!({}))
        );

        assert!(build_payload(HttpMethod::Get, Some("{}"), &[]).is_err());
        assert!(build_payload(HttpMethod::Post, Some("not json"), &[]).is_err());
        assert!(build_payload(HttpMethod::Post, None, &["a=b".to_string()]).is_err());
    }
}
