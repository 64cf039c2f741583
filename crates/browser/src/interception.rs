//! Per-sub-request continue/abort policy, wired through the CDP `Fetch`
//! domain.
//!
//! The rule set is fixed when the session is constructed; changing policy
//! means starting a new session. The policy covers every request a page
//! issues — documents, scripts, images, XHR — not just the top-level
//! document.

use {
    chromiumoxide::{
        Page,
        cdp::browser_protocol::{
            fetch::{
                AuthChallengeResponse, AuthChallengeResponseResponse, ContinueRequestParams,
                ContinueWithAuthParams, EnableParams, EventAuthRequired, EventRequestPaused,
                FailRequestParams,
            },
            network::ErrorReason,
        },
    },
    futures::StreamExt,
    tracing::{debug, trace},
};

use crate::error::ScrapeError;

/// File extensions aborted when media blocking is enabled.
const BLOCKED_MEDIA_EXTENSIONS: &[&str] = &[
    "png", "jpg", "jpeg", "gif", "svg", "mp3", "mp4", "avi", "flac", "ogg", "wav", "webm",
];

/// Advertising/tracking hosts, matched by substring against the request
/// hostname.
const AD_HOST_FRAGMENTS: &[&str] = &[
    "doubleclick.net",
    "adservice.google.com",
    "googlesyndication.com",
    "googletagservices.com",
    "googletagmanager.com",
    "google-analytics.com",
    "adsystem.com",
    "adservice.com",
    "adnxs.com",
    "ads-twitter.com",
    "facebook.net",
    "fbcdn.net",
    "amazon-adsystem.com",
];

/// Verdict for a single sub-resource request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Continue,
    Abort,
}

/// Immutable interception rule set bound to a session.
#[derive(Debug, Clone)]
pub struct InterceptionPolicy {
    block_media: bool,
    proxy_credentials: Option<(String, String)>,
}

impl InterceptionPolicy {
    pub fn new(block_media: bool, proxy_credentials: Option<(String, String)>) -> Self {
        Self {
            block_media,
            proxy_credentials,
        }
    }

    /// Evaluate the rules in order: media extension, then ad-host
    /// deny-list, then allow.
    pub fn decide(&self, url: &str) -> Action {
        if self.block_media && has_blocked_extension(url) {
            return Action::Abort;
        }

        if let Ok(parsed) = url::Url::parse(url)
            && let Some(host) = parsed.host_str()
            && AD_HOST_FRAGMENTS
                .iter()
                .any(|fragment| host.contains(fragment))
        {
            return Action::Abort;
        }

        Action::Continue
    }

    /// Install the policy on a page. Must run before the page navigates
    /// anywhere; requests issued while nothing answers `Fetch.requestPaused`
    /// would stall.
    pub async fn install(&self, page: &Page) -> Result<(), ScrapeError> {
        // Listeners must be registered before Fetch.enable or early
        // requests race past them.
        let mut request_events = page.event_listener::<EventRequestPaused>().await?;
        let auth_events = if self.proxy_credentials.is_some() {
            Some(page.event_listener::<EventAuthRequired>().await?)
        } else {
            None
        };

        let enable = EnableParams::builder()
            .handle_auth_requests(self.proxy_credentials.is_some())
            .build();
        page.execute(enable).await?;

        let policy = self.clone();
        let request_page = page.clone();
        tokio::spawn(async move {
            while let Some(event) = request_events.next().await {
                match policy.decide(&event.request.url) {
                    Action::Abort => {
                        trace!(url = %event.request.url, "aborting sub-request");
                        let params = FailRequestParams::new(
                            event.request_id.clone(),
                            ErrorReason::BlockedByClient,
                        );
                        if let Err(e) = request_page.execute(params).await {
                            debug!(error = %e, "failed to abort sub-request");
                        }
                    },
                    Action::Continue => {
                        let params = ContinueRequestParams::new(event.request_id.clone());
                        if let Err(e) = request_page.execute(params).await {
                            debug!(error = %e, "failed to continue sub-request");
                        }
                    },
                }
            }
            // Stream ends when the page closes.
        });

        if let (Some(mut auth_events), Some((username, password))) =
            (auth_events, self.proxy_credentials.clone())
        {
            let auth_page = page.clone();
            tokio::spawn(async move {
                while let Some(event) = auth_events.next().await {
                    let response = AuthChallengeResponse {
                        response: AuthChallengeResponseResponse::ProvideCredentials,
                        username: Some(username.clone()),
                        password: Some(password.clone()),
                    };
                    let params = ContinueWithAuthParams::new(event.request_id.clone(), response);
                    if let Err(e) = auth_page.execute(params).await {
                        debug!(error = %e, "failed to answer auth challenge");
                    }
                }
            });
        }

        Ok(())
    }
}

fn has_blocked_extension(url: &str) -> bool {
    let Ok(parsed) = url::Url::parse(url) else {
        return false;
    };
    let path = parsed.path().to_ascii_lowercase();
    match path.rsplit_once('.') {
        Some((_, ext)) => BLOCKED_MEDIA_EXTENSIONS.contains(&ext),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(block_media: bool) -> InterceptionPolicy {
        InterceptionPolicy::new(block_media, None)
    }

    #[test]
    fn allows_ordinary_requests() {
        let p = policy(false);
        assert_eq!(p.decide("https://example.com/index.html"), Action::Continue);
        assert_eq!(p.decide("https://example.com/app.js"), Action::Continue);
    }

    #[test]
    fn media_blocked_only_when_enabled() {
        let url = "https://example.com/photo.jpg";
        assert_eq!(policy(false).decide(url), Action::Continue);
        assert_eq!(policy(true).decide(url), Action::Abort);
    }

    #[test]
    fn media_extension_is_case_insensitive() {
        assert_eq!(
            policy(true).decide("https://example.com/CLIP.MP4"),
            Action::Abort
        );
    }

    #[test]
    fn media_check_uses_path_not_query() {
        assert_eq!(
            policy(true).decide("https://example.com/page?img=x.png"),
            Action::Continue
        );
    }

    #[test]
    fn ad_hosts_blocked_by_substring() {
        let p = policy(false);
        assert_eq!(
            p.decide("https://stats.g.doubleclick.net/collect"),
            Action::Abort
        );
        assert_eq!(
            p.decide("https://www.googletagmanager.com/gtm.js"),
            Action::Abort
        );
        assert_eq!(p.decide("https://news.example.org/a"), Action::Continue);
    }

    #[test]
    fn ad_hosts_blocked_regardless_of_media_flag() {
        assert_eq!(
            policy(true).decide("https://cdn.fbcdn.net/pixel"),
            Action::Abort
        );
    }

    #[test]
    fn unparseable_urls_continue() {
        assert_eq!(policy(true).decide("not a url"), Action::Continue);
    }
}
