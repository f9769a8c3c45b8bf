// Access token command

use anyhow::{Context, Result};
use boxwatch_client::{Authenticator, Config};
use serde_json::json;

use crate::output::{print_field, OutputFormat};

pub async fn run(config: &Config, format: OutputFormat) -> Result<()> {
    let token = Authenticator::new(config.client.clone())?
        .fetch_token()
        .await
        .context("Token exchange failed")?;

    if format.is_text() {
        print_field("Access token", &token.access_token);
        print_field("Token type", &token.token_type);
        print_field("Expires in", &format!("{}s", token.expires_in));
        return Ok(());
    }

    format.print_value(&json!({
        "access_token": token.access_token,
        "token_type": token.token_type,
        "expires_in": token.expires_in,
    }))
}
