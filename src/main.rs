use anyhow::Context;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use gmail_mailer::config::Config;
use gmail_mailer::mail::Mailer;
use gmail_mailer::models::{EmailTemplate, Recipients};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Initialize logging
    let json = std::env::var("LOG_FORMAT").is_ok_and(|format| format.eq_ignore_ascii_case("json"));
    tracing_subscriber::registry()
        .with(json.then(|| fmt::layer().json()))
        .with((!json).then(fmt::layer))
        .with(EnvFilter::from_default_env())
        .init();

    // Load configuration
    let config = Config::from_env()?;
    tracing::info!(
        user = %config.gmail_user,
        host = %config.smtp_host,
        port = %config.smtp_port,
        "Configuration loaded"
    );

    let mailer = Mailer::from_config(&config)?;

    if !mailer.verify_connection().await {
        anyhow::bail!("could not verify the connection to {}", config.smtp_host);
    }

    let Some(path) = &config.templates_path else {
        tracing::info!("MAIL_TEMPLATES not set, nothing to send");
        return Ok(());
    };

    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("reading templates from {}", path.display()))?;
    let templates: Vec<EmailTemplate> = serde_json::from_str(&raw)
        .with_context(|| format!("parsing templates from {}", path.display()))?;

    let default_to = config.default_to.clone().map(Recipients::from);
    let results = mailer.send_templated_emails(templates, default_to).await;

    println!("{}", serde_json::to_string_pretty(&results)?);

    let failed = results.iter().filter(|r| !r.success).count();
    if failed > 0 {
        tracing::warn!(failed, total = results.len(), "Some templates were not sent");
    }

    Ok(())
}
