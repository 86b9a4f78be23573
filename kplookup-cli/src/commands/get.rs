//! Specifier resolution command.

use std::path::Path;

use secrecy::ExposeSecret;

use kplookup_core::config::LookupSettings;
use kplookup_core::lookup::CredentialLookup;

use crate::error::CliError;

/// Parameters for the `get` command
pub struct GetParams<'a> {
    /// Specifiers to resolve, in order
    pub specifiers: &'a [String],
    /// Emit a JSON object instead of one secret per line
    pub json: bool,
    /// Backend protocol override
    pub backend: Option<&'a str>,
    /// Socket path override (browser protocol)
    pub socket: Option<&'a Path>,
    /// Endpoint override (HTTP protocol)
    pub endpoint: Option<&'a str>,
    /// Identity file override
    pub identity_file: Option<&'a Path>,
    /// Connect + pairing bound in seconds
    pub connect_timeout: Option<u64>,
    /// Per-query bound in seconds
    pub query_timeout: Option<u64>,
}

/// Resolve the given specifiers and print their secrets to stdout.
///
/// Secrets are the only thing written to stdout; everything else goes to
/// stderr so the output stays safe to capture in scripts.
pub fn cmd_get(config_path: Option<&Path>, params: GetParams<'_>) -> Result<(), CliError> {
    let settings = apply_overrides(LookupSettings::load(config_path)?, &params)?;
    let lookup = CredentialLookup::from_settings(&settings);

    let rt = tokio::runtime::Runtime::new()?;
    let raws: Vec<&str> = params.specifiers.iter().map(String::as_str).collect();
    let secrets = rt.block_on(lookup.resolve_many(&raws))?;

    if params.json {
        let map: serde_json::Map<String, serde_json::Value> = params
            .specifiers
            .iter()
            .zip(&secrets)
            .map(|(spec, secret)| {
                (
                    spec.clone(),
                    serde_json::Value::String(secret.expose_secret().to_string()),
                )
            })
            .collect();
        println!("{}", serde_json::Value::Object(map));
    } else {
        for secret in &secrets {
            println!("{}", secret.expose_secret());
        }
    }
    Ok(())
}

fn apply_overrides(
    mut settings: LookupSettings,
    params: &GetParams<'_>,
) -> Result<LookupSettings, CliError> {
    if let Some(backend) = params.backend {
        settings.backend = backend.parse().map_err(CliError::InvalidArgument)?;
    }
    if let Some(socket) = params.socket {
        settings.socket_path = Some(socket.to_path_buf());
    }
    if let Some(endpoint) = params.endpoint {
        settings.endpoint = Some(endpoint.to_string());
    }
    if let Some(identity_file) = params.identity_file {
        settings.identity_file = Some(identity_file.to_path_buf());
    }
    if let Some(secs) = params.connect_timeout {
        settings.connect_timeout_secs = secs;
    }
    if let Some(secs) = params.query_timeout {
        settings.query_timeout_secs = secs;
    }
    Ok(settings)
}
