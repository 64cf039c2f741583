//! Advisory classification of the scraped target's HTTP status.

use std::fmt;

/// Category of a non-200 target status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageErrorKind {
    /// Navigation settled on a 3xx — a redirect the engine did not follow
    /// through.
    RedirectExhausted,
    ClientError,
    ServerError,
    Unknown,
}

/// Diagnostic annotation for the response. Never changes the service's own
/// status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageError {
    pub kind: PageErrorKind,
    pub status: Option<u16>,
}

impl fmt::Display for PageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.kind, self.status) {
            (PageErrorKind::RedirectExhausted, Some(code)) => write!(f, "redirect error: {code}"),
            (PageErrorKind::ClientError, Some(code)) => write!(f, "client error: {code}"),
            (PageErrorKind::ServerError, Some(code)) => write!(f, "server error: {code}"),
            (PageErrorKind::Unknown, Some(code)) => write!(f, "unexpected status: {code}"),
            (_, None) => write!(f, "no response received"),
        }
    }
}

/// Classify a target status code. 200 is no error; anything else gets a
/// semantic category for diagnostic annotation.
pub fn classify(status: Option<u16>) -> Option<PageError> {
    let Some(code) = status else {
        return Some(PageError {
            kind: PageErrorKind::Unknown,
            status: None,
        });
    };

    let kind = match code {
        200 => return None,
        300..=399 => PageErrorKind::RedirectExhausted,
        400..=499 => PageErrorKind::ClientError,
        500..=599 => PageErrorKind::ServerError,
        _ => PageErrorKind::Unknown,
    };

    Some(PageError {
        kind,
        status: Some(code),
    })
}
