use std::time::Duration;

use dqa_core::error::{codes, AppError};

const HEALTH_TIMEOUT: Duration = Duration::from_millis(800);

/// Handle on a local Ollama server. Only loopback (`http://127.0.0.1[:port]`) is accepted, so
/// document text never leaves the machine through this provider.
#[derive(Debug, Clone)]
pub struct OllamaClient {
    base_url: String,
}

pub(crate) fn is_loopback_base_url(url: &str) -> bool {
    match url.strip_prefix("http://127.0.0.1") {
        Some("") => true,
        Some(rest) => rest
            .strip_prefix(':')
            .and_then(|port| port.parse::<u16>().ok())
            .is_some_and(|port| port != 0),
        None => false,
    }
}

impl OllamaClient {
    pub fn new(base_url: &str) -> Result<Self, AppError> {
        let base_url = base_url.trim_end_matches('/');
        if !is_loopback_base_url(base_url) {
            return Err(
                AppError::new(codes::AI_REMOTE_NOT_ALLOWED, "Ollama must run on 127.0.0.1")
                    .with_details(format!("base_url={base_url}")),
            );
        }
        Ok(Self {
            base_url: base_url.to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub(crate) fn endpoint(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// `GET /api/tags` with a short timeout.
    pub fn health_check(&self) -> Result<(), AppError> {
        match ureq::get(&self.endpoint("/api/tags")).timeout(HEALTH_TIMEOUT).call() {
            Ok(r) if r.status() == 200 => Ok(()),
            Ok(r) => Err(AppError::new(codes::AI_UNREACHABLE, "Ollama answered the health check with an error")
                .with_details(format!("status={}", r.status()))),
            Err(e) => Err(AppError::new(codes::AI_UNREACHABLE, "Ollama is not reachable")
                .with_details(format!("base_url={}; err={e}", self.base_url))
                .with_retryable(true)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::OllamaClient;

    #[test]
    fn only_loopback_urls_are_accepted() {
        let accepted = [
            "http://127.0.0.1:11434",
            "http://127.0.0.1",
            "http://127.0.0.1:11434/",
        ];
        for url in accepted {
            assert!(OllamaClient::new(url).is_ok(), "{url} should be accepted");
        }

        let rejected = [
            "http://localhost:11434",
            "http://0.0.0.0:11434",
            "http://[::1]:11434",
            "https://example.com",
            "http://127.0.0.1.evil.com:11434",
            "http://127.0.0.1@evil.com:11434",
            "http://127.0.0.1:",
            "http://127.0.0.1:0",
            "http://127.0.0.1:99999",
            "http://127.0.0.1:11434/api",
        ];
        for url in rejected {
            assert!(OllamaClient::new(url).is_err(), "{url} should be rejected");
        }
    }

    #[test]
    fn endpoints_hang_off_the_trimmed_base() {
        let c = OllamaClient::new("http://127.0.0.1:11434/").expect("client");
        assert_eq!(c.base_url(), "http://127.0.0.1:11434");
        assert_eq!(c.endpoint("/api/generate"), "http://127.0.0.1:11434/api/generate");
    }
}
