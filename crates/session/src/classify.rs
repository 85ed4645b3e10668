//! Decides what a response means before anything tries to parse it.

use std::time::Duration;

use memchr::memmem;

use crate::config::SessionConfig;
use crate::error::ErrorKind;
use crate::transport::HttpResponse;

/// Judges a final (non-redirect) response. `Ok(())` means the body is real
/// content.
///
/// Rules, first match wins:
/// 1. landing on the login page we didn't ask for → login required,
/// 2. 429 → rate limited,
/// 3. 403 / 503 → challenge,
/// 4. 404 → not found,
/// 5. other 5xx → upstream failure,
/// 6. other 4xx → rejected,
/// 7. 2xx carrying a challenge marker → challenge.
pub(crate) fn classify(response: &HttpResponse, requested: &str, config: &SessionConfig) -> Result<(), ErrorKind> {
    let landed = response.url.path();
    let on_login = landed == config.login_path || landed == config.sign_in_path;
    let asked_login = requested == config.login_path || requested == config.sign_in_path;
    if on_login && !asked_login {
        return Err(ErrorKind::LoginRequired(requested.to_string()));
    }
    let url = response.url.to_string();
    match response.status {
        429 => Err(ErrorKind::RateLimited {
            retry_after: response.header("retry-after").and_then(parse_retry_after),
        }),
        403 | 503 => Err(ErrorKind::ChallengeDetected(url)),
        404 => Err(ErrorKind::NotFound(url)),
        status @ 500..=599 => Err(ErrorKind::Upstream { status, url }),
        status @ 400..=499 => Err(ErrorKind::Rejected { status, url }),
        _ if has_challenge_marker(&response.body, &config.challenge_markers) => Err(ErrorKind::ChallengeDetected(url)),
        _ => Ok(()),
    }
}

/// Only the delta-seconds form; HTTP dates are ignored.
fn parse_retry_after(value: &str) -> Option<Duration> {
    value.trim().parse::<u64>().ok().map(Duration::from_secs)
}

fn has_challenge_marker(body: &[u8], markers: &[String]) -> bool {
    markers
        .iter()
        .filter(|marker| !marker.is_empty())
        .any(|marker| memmem::find(body, marker.as_bytes()).is_some())
}
