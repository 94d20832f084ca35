use anyhow::{Context, Result};
use clap::Parser;
use highlevel_core::api::HighLevelClient;
use highlevel_core::auth::{run_manual_flow, AuthError, OAuthClient};
use highlevel_core::config::Settings;
use highlevel_core::services::{FieldUpdateOutcome, FieldUpdateTask, DEFAULT_VALUE};
use tokio::task;
use tracing_subscriber::EnvFilter;
use url::Url;

const LOG_ENV: &str = "HIGHLEVEL_LOG";

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Authorize against HighLevel and write a custom field on one contact"
)]
struct Cli {
    /// Custom field name to update (defaults to HIGHLEVEL_CUSTOM_FIELD_NAME)
    #[arg(long = "field")]
    field: Option<String>,
    /// Value written into the custom field
    #[arg(long, default_value = DEFAULT_VALUE)]
    value: String,
    /// Launch the system browser on the consent page
    #[arg(long)]
    open: bool,
    /// Resolve the contact and field but skip the update
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let settings = Settings::from_env().context("failed to load configuration")?;
    run(cli, settings).await
}

async fn run(cli: Cli, settings: Settings) -> Result<()> {
    let oauth = OAuthClient::from_settings(&settings).context("failed to build OAuth client")?;

    tracing::info!("step 1: visit the authorization URL to obtain a code");
    let session = match run_manual_flow(&oauth, cli.open, print_authorization_url, || async {
        prompt_for_code().await
    })
    .await
    {
        Ok(session) => session,
        Err(err) => {
            log_auth_failure(&err);
            return Ok(());
        }
    };

    let client = HighLevelClient::from_settings(&session, &settings)
        .context("failed to build HighLevel client")?;
    let field_name = cli.field.unwrap_or(settings.custom_field_name);

    let outcome = match FieldUpdateTask::new(&client, field_name)
        .with_value(cli.value)
        .dry_run(cli.dry_run)
        .run()
        .await
    {
        Ok(outcome) => outcome,
        Err(err) => {
            tracing::error!(error = %err, "HighLevel request failed");
            return Ok(());
        }
    };

    match outcome {
        FieldUpdateOutcome::Updated { contact_id, .. } => {
            tracing::info!(%contact_id, "custom field updated successfully");
        }
        FieldUpdateOutcome::UpdateRejected { contact_id, .. } => {
            tracing::error!(%contact_id, "failed to update custom field");
        }
        FieldUpdateOutcome::DryRun {
            contact_id,
            field_id,
        } => {
            println!("Would update field {field_id} on contact {contact_id}.");
        }
        FieldUpdateOutcome::NoContacts => {
            tracing::warn!(
                location_id = client.location_id(),
                "no contacts found; nothing to update"
            );
        }
        FieldUpdateOutcome::FieldNotFound { name } => {
            tracing::warn!(%name, "custom field not found; nothing to update");
        }
    }

    Ok(())
}

fn log_auth_failure(err: &AuthError) {
    match err {
        AuthError::TokenEndpoint { status, body } => {
            tracing::error!(%status, %body, "token exchange failed");
        }
        AuthError::MissingField {
            field,
            status,
            body,
        } => {
            tracing::error!(%field, %status, %body, "token response incomplete");
        }
        AuthError::Decode {
            status,
            body,
            source,
        } => {
            tracing::error!(%status, %body, error = %source, "token response unreadable");
        }
        other => tracing::error!(error = %other, "failed to get access token"),
    }
}

async fn prompt_for_code() -> Result<String, AuthError> {
    task::spawn_blocking(|| {
        use std::io::{self, Write};
        print!("Paste the code (or the full redirect URL): ");
        io::stdout().flush().map_err(AuthError::Io)?;
        let mut input = String::new();
        io::stdin().read_line(&mut input).map_err(AuthError::Io)?;
        Ok(input.trim().to_owned())
    })
    .await
    .map_err(|_| AuthError::Cancelled)?
}

fn print_authorization_url(url: &Url) -> Result<(), AuthError> {
    tracing::info!(%url, "authorization URL ready");
    println!("\nAuthorize the application by visiting:\n  {}\n", url);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_demo_behaviour() {
        let cli = Cli::try_parse_from(["highlevel"]).unwrap();
        assert_eq!(cli.value, "TEST");
        assert!(cli.field.is_none());
        assert!(!cli.open);
        assert!(!cli.dry_run);
    }

    #[test]
    fn flags_override_defaults() {
        let cli = Cli::try_parse_from([
            "highlevel",
            "--field",
            "Lead Source",
            "--value",
            "Webinar",
            "--dry-run",
            "--open",
        ])
        .unwrap();
        assert_eq!(cli.field.as_deref(), Some("Lead Source"));
        assert_eq!(cli.value, "Webinar");
        assert!(cli.dry_run);
        assert!(cli.open);
    }
}
