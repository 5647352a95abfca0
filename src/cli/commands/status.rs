use anyhow::Result;
use clap::Args;
use colored::*;
use log::{error, info};

use crate::api::RequestExecutor;
use crate::config::Config;

#[derive(Args)]
pub struct StatusCommands {
    /// GET this path after authenticating to capture rate-limit headers
    #[arg(long)]
    pub probe: Option<String>,
}

pub async fn handle_status_command(args: StatusCommands, config: &Config, profile: Option<&str>) -> Result<()> {
    info!("Executing status command");

    let resolved = config.resolve(profile)?;
    let executor = RequestExecutor::connect(&resolved, config.resilience.to_config())?;
    let context = executor.profile();

    println!("Payday CLI Status");
    println!("=================");
    println!("Profile:   {}", context.profile_key.bold());
    println!("Base URL:  {}", context.base_url);
    println!("Client ID: {}", resolved.credentials.client_id);
    if let Some(tenant_id) = &context.tenant_id {
        println!("Tenant:    {}", tenant_id);
    }
    if context.read_only {
        println!("Mode:      {}", "read-only".yellow());
    } else {
        println!("Mode:      {}", "read-write".green());
    }

    println!("\nAuthenticating...");
    match executor.tokens().get_token(context).await {
        Ok(_) => {
            info!("Authentication successful for profile: {}", context.profile_key);
            println!("{} Authentication successful", "✓".green());
            if let Some(remaining) = executor.tokens().cached_expiry(&context.profile_key).await {
                println!("  Token usable for another {}s", remaining.as_secs());
            }
        }
        Err(e) => {
            error!("Authentication failed: {}", e);
            println!("{} Authentication failed: {}", "✗".red(), e);
            return Ok(());
        }
    }

    if let Some(path) = &args.probe {
        println!("\nProbing {}...", path.cyan());
        match executor.get(path, &[]).await {
            Ok(response) => println!(
                "{} {} in {}ms",
                "✓".green(),
                response.status,
                response.duration.as_millis()
            ),
            Err(e) => println!("{} {}", "✗".red(), e),
        }
    }

    match executor.rate_limit_snapshot() {
        Some(snapshot) => println!(
            "\nRate limit: {}/{} remaining, resets at {}",
            snapshot.remaining,
            snapshot.limit,
            snapshot.reset_at.to_rfc3339()
        ),
        None => println!("\nRate limit: {}", "not reported yet".dimmed()),
    }

    Ok(())
}
