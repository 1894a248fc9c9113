use crate::navigator::Navigator;
use crate::points::PointsReader;
use std::time::Duration;
use tokio::time::{sleep, timeout};
use tracing::{error, info, warn};

/// URL fragments that mean the browser is still somewhere in the sign-in flow.
pub const LOGIN_URL_MARKERS: &[&str] = &["login.live.com", "oauth2", "account.microsoft.com"];

const LOGIN_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Decides whether the persistent profile is signed in, and waits for the
/// user to sign in by hand when it is not.
pub struct LoginGate<'a> {
    navigator: &'a Navigator,
    points: &'a PointsReader,
    dashboard_url: &'a str,
    account_url: &'a str,
}

impl<'a> LoginGate<'a> {
    pub fn new(
        navigator: &'a Navigator,
        points: &'a PointsReader,
        dashboard_url: &'a str,
        account_url: &'a str,
    ) -> Self {
        Self {
            navigator,
            points,
            dashboard_url,
            account_url,
        }
    }

    /// Signed in means the dashboard renders a balance.
    pub async fn check_logged_in(&self) -> bool {
        info!("checking login status");
        let timing = self.navigator.timing();
        if let Err(e) = self
            .navigator
            .goto(self.dashboard_url, timing.initial_settle())
            .await
        {
            warn!(error = %e, "could not open dashboard for the login check");
            return false;
        }
        self.navigator.dismiss_overlays().await;
        match self.points.read().await {
            Some(points) => {
                info!(%points, "logged in");
                true
            }
            None => {
                info!("not logged in");
                false
            }
        }
    }

    fn still_signing_in(&self, url: &str) -> bool {
        url == "about:blank"
            || same_page(url, self.dashboard_url)
            || LOGIN_URL_MARKERS.iter().any(|m| url.contains(m))
            || url.starts_with(self.account_url)
    }

    /// Polled while waiting: off the sign-in flow, or back on the dashboard
    /// with a balance showing.
    async fn signed_in_at(&self, url: &str) -> bool {
        if !self.still_signing_in(url) {
            info!(%url, "left the sign-in flow");
            return true;
        }
        if url.starts_with(self.dashboard_url) && self.points.read().await.is_some() {
            info!(%url, "balance showing on the dashboard");
            return true;
        }
        false
    }

    /// Open the account page and wait up to `limit` for the browser to leave
    /// the sign-in flow, then confirm on the dashboard.
    pub async fn await_manual_login(&self, limit: Duration) -> bool {
        let timing = self.navigator.timing();
        let engine = self.navigator.engine();

        if let Err(e) = self
            .navigator
            .goto(self.account_url, timing.initial_settle())
            .await
        {
            warn!(error = %e, "could not open the account page");
        }

        // Signed-in profiles get bounced straight to the dashboard
        if let Ok(url) = engine.current_url().await {
            if url.starts_with(self.dashboard_url) && self.check_logged_in().await {
                return true;
            }
        }

        info!(
            timeout_secs = limit.as_secs(),
            "please sign in manually in the browser window"
        );
        let waited = timeout(limit, async {
            loop {
                match engine.current_url().await {
                    Ok(url) => {
                        if self.signed_in_at(&url).await {
                            break;
                        }
                    }
                    Err(e) => warn!(error = %e, "could not read the current url"),
                }
                sleep(LOGIN_POLL_INTERVAL).await;
            }
        })
        .await;
        if waited.is_err() {
            error!("timed out waiting for manual sign-in");
            return false;
        }

        sleep(timing.initial_settle()).await;
        self.check_logged_in().await
    }

    /// Check, and fall back to the manual flow with the configured limit.
    pub async fn establish(&self) -> bool {
        if self.check_logged_in().await {
            return true;
        }
        let limit = self.navigator.timing().manual_login();
        if self.await_manual_login(limit).await {
            info!("manual sign-in confirmed");
            true
        } else {
            error!("sign-in could not be confirmed");
            false
        }
    }
}

fn same_page(url: &str, page: &str) -> bool {
    url.trim_end_matches('/') == page.trim_end_matches('/')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_page_ignores_trailing_slash() {
        assert!(same_page("https://rewards.test", "https://rewards.test/"));
        assert!(same_page("https://rewards.test/", "https://rewards.test/"));
        assert!(!same_page("https://rewards.test/?signin=done", "https://rewards.test/"));
    }
}
