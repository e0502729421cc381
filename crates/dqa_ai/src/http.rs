use std::time::Duration;

use dqa_core::error::AppError;
use serde_json::Value;
use tracing::debug;

/// POST a JSON body and decode a JSON response.
///
/// Transport failures, timeouts, HTTP 429 and 5xx are marked retryable; other statuses are not.
pub(crate) fn post_json(
    url: &str,
    headers: &[(&str, &str)],
    body: &Value,
    timeout: Duration,
    code: &str,
    what: &str,
) -> Result<Value, AppError> {
    let mut req = ureq::post(url).timeout(timeout);
    for (k, v) in headers {
        req = req.set(k, v);
    }
    debug!(url = %redact_query(url), what, "http request");

    match req.send_json(body) {
        Ok(r) if r.status() == 200 => r.into_json::<Value>().map_err(|e| {
            AppError::new(code, format!("Failed to decode {what} response")).with_details(e.to_string())
        }),
        Ok(r) => Err(AppError::new(code, format!("{what} request failed"))
            .with_details(format!("status={}", r.status()))),
        Err(ureq::Error::Status(status, r)) => {
            let body = r.into_string().unwrap_or_default();
            Err(AppError::new(code, format!("{what} request failed"))
                .with_details(format!("status={status}; body={}", snippet(&body, 300)))
                .with_retryable(status == 429 || status >= 500))
        }
        Err(e) => Err(AppError::new(code, format!("Failed to call {what} endpoint"))
            .with_details(e.to_string())
            .with_retryable(true)),
    }
}

fn redact_query(url: &str) -> &str {
    url.split_once('?').map(|(u, _)| u).unwrap_or(url)
}

pub(crate) fn snippet(text: &str, max_chars: usize) -> String {
    let t = text.trim();
    match t.char_indices().nth(max_chars) {
        None => t.to_string(),
        Some((i, _)) => format!("{}...", &t[..i]),
    }
}
