use reqwest::RequestBuilder;
use serde_json::Value;
use sidebar_common::{Error, Result};
use sidebar_config::{AuthMethod, ResolvedProviderConfig};
use std::time::Duration;
use tracing::warn;

const MAX_ERROR_BODY_CHARS: usize = 500;

/// Attach the configured credential. `api_key_header` is the vendor header
/// used for [`AuthMethod::ApiKey`]; without one the key goes out as a bearer token.
pub(crate) fn apply_auth(
    builder: RequestBuilder,
    config: &ResolvedProviderConfig,
    api_key_header: Option<&str>,
) -> Result<RequestBuilder> {
    match config.auth_method {
        AuthMethod::None => Ok(builder),
        AuthMethod::Bearer => Ok(builder.bearer_auth(config.require_credential()?)),
        AuthMethod::ApiKey => {
            let key = config.require_credential()?;
            Ok(match api_key_header {
                Some(header) => builder.header(header, key),
                None => builder.bearer_auth(key),
            })
        }
    }
}

/// Fail fast with `AuthMissing` before any network traffic.
pub(crate) fn check_credential(config: &ResolvedProviderConfig) -> Result<()> {
    if config.auth_method != AuthMethod::None {
        config.require_credential()?;
    }
    Ok(())
}

/// Send a JSON request and parse a JSON reply within `budget`. Dropping the
/// in-flight future on expiry aborts the underlying connection.
pub(crate) async fn send_json(
    builder: RequestBuilder,
    budget: Duration,
    vendor: &str,
) -> Result<Value> {
    let call = async {
        let response = builder
            .send()
            .await
            .map_err(|e| transport_error(vendor, e, budget))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!("{vendor} returned HTTP {status}");
            return Err(Error::Http {
                status: status.as_u16(),
                body: error_summary(&body),
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| transport_error(vendor, e, budget))?;
        serde_json::from_slice::<Value>(&bytes)
            .map_err(|e| Error::MalformedResponse(format!("{vendor} returned invalid JSON: {e}")))
    };

    match tokio::time::timeout(budget, call).await {
        Ok(result) => result,
        Err(_) => {
            warn!("{vendor} request exceeded {}s", budget.as_secs_f64());
            Err(Error::Timeout(budget))
        }
    }
}

fn transport_error(vendor: &str, err: reqwest::Error, budget: Duration) -> Error {
    if err.is_timeout() {
        return Error::Timeout(budget);
    }
    Error::ConnectivityFailed(format!("{vendor} request failed: {err}"))
}

/// Prefer the vendor's `error.message`, else a clipped raw body.
fn error_summary(body: &str) -> String {
    let from_json = serde_json::from_str::<Value>(body).ok().and_then(|v| {
        v.pointer("/error/message")
            .or_else(|| v.get("error"))
            .and_then(Value::as_str)
            .map(str::to_string)
    });
    let text = from_json.unwrap_or_else(|| body.trim().to_string());
    if text.chars().count() > MAX_ERROR_BODY_CHARS {
        let clipped: String = text.chars().take(MAX_ERROR_BODY_CHARS).collect();
        format!("{clipped}...")
    } else {
        text
    }
}

/// Join every string found at `text_field` across `items`, failing when none is present.
pub(crate) fn join_text_parts<'a>(
    items: impl Iterator<Item = &'a Value>,
    text_field: &str,
) -> Option<String> {
    let parts: Vec<&str> = items
        .filter_map(|item| item.get(text_field).and_then(Value::as_str))
        .collect();
    (!parts.is_empty()).then(|| parts.concat())
}
