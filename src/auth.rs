use std::sync::Mutex;

use anyhow::{bail, Context, Result};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{Duration, Local};
use rand::distr::Alphanumeric;
use rand::Rng;
use reqwest::Client;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use tracing::info;

use crate::app::read_line;
use crate::config::Config;
use crate::mal;

const AUTHORIZE_URL: &str = "https://myanimelist.net/v1/oauth2/authorize";
const VERIFIER_LEN: usize = 128;

#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: i64,
}

/// Random code verifier and its S256 challenge for the PKCE flow.
pub fn generate_pkce_pair() -> (String, String) {
    let verifier: String = rand::rng()
        .sample_iter(&Alphanumeric)
        .take(VERIFIER_LEN)
        .map(char::from)
        .collect();
    let challenge = URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()));
    (verifier, challenge)
}

/// Pulls the authorization code out of a pasted redirect URL.
pub fn extract_auth_code(redirected_url: &str) -> Option<&str> {
    let (_, rest) = redirected_url.split_once("code=")?;
    let code = rest.split('&').next().unwrap_or(rest);
    (!code.is_empty()).then_some(code)
}

/// Interactive authorization: print the URL, wait for the pasted redirect,
/// exchange the code and save the tokens.
pub async fn run_interactive(http: &Client, config: &Mutex<Config>) -> Result<()> {
    let creds = config.lock().unwrap().mal_api.clone();
    if creds.client_id.is_empty() || creds.client_secret.is_empty() {
        bail!("client_id/client_secret missing; add your MAL API credentials to the config file first");
    }

    let (verifier, challenge) = generate_pkce_pair();
    let auth_url = format!(
        "{AUTHORIZE_URL}?response_type=code&client_id={}&code_challenge={}&code_challenge_method=S256&redirect_uri={}",
        creds.client_id, challenge, creds.redirect_uri
    );

    println!("Open this URL in a browser and authorize the application:");
    println!("\n{auth_url}\n");
    println!("After authorizing you will be redirected to a localhost URL.");
    let pasted = read_line("Paste the full redirect URL here: ")?;

    let code = extract_auth_code(pasted.trim())
        .context("could not find 'code' in the pasted URL (expected ...?code=...)")?;
    info!("authorization code received; exchanging for tokens");

    let token = exchange_code(http, &creds.client_id, &creds.client_secret, &creds.redirect_uri, code, &verifier).await?;
    store_tokens(config, token)?;
    println!("Tokens obtained and saved.");
    Ok(())
}

async fn exchange_code(
    http: &Client,
    client_id: &str,
    client_secret: &str,
    redirect_uri: &str,
    code: &str,
    verifier: &str,
) -> Result<TokenResponse> {
    let response = http
        .post(mal::TOKEN_URL)
        .form(&[
            ("client_id", client_id),
            ("client_secret", client_secret),
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", redirect_uri),
            ("code_verifier", verifier),
        ])
        .send()
        .await
        .context("token exchange request failed")?;

    let status = response.status();
    let body = response
        .text()
        .await
        .context("reading token response failed")?;
    if !status.is_success() {
        bail!("token endpoint returned {status}: {body}");
    }
    serde_json::from_str(&body).context("unexpected token response shape")
}

pub fn store_tokens(config: &Mutex<Config>, token: TokenResponse) -> Result<()> {
    let mut config = config.lock().unwrap();
    config.mal_api.access_token = Some(token.access_token);
    config.mal_api.refresh_token = Some(token.refresh_token);
    config.mal_api.token_expiry =
        Some((Local::now() + Duration::seconds(token.expires_in)).to_rfc3339());
    config.save()
}
