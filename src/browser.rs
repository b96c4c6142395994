//! Browser session owned by one run.
//!
//! One CDP browser process and one active page. The session starts lazily on
//! the first navigation, and `close` is idempotent so the coordinator can
//! tear it down on every exit path.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::Page;
use futures::StreamExt;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use which::which;

use crate::errors::{Error, Result};
use crate::types::BrowserEngine;

/// Navigation deadline applied on top of the driver's own waits.
pub const NAVIGATION_DEADLINE: Duration = Duration::from_secs(30);
/// Default wait applied to element lookups before interaction.
pub const ELEMENT_DEADLINE: Duration = Duration::from_secs(10);
const POLL_INTERVAL: Duration = Duration::from_millis(250);

#[derive(Default)]
struct SessionState {
    browser: Option<Browser>,
    page: Option<Page>,
    handler_task: Option<JoinHandle<()>>,
    closed: bool,
}

/// One browser process plus one active page, scoped to a single run.
pub struct BrowserSession {
    engine: BrowserEngine,
    headless: bool,
    state: Mutex<SessionState>,
    close_calls: AtomicU32,
}

impl BrowserSession {
    pub fn new(engine: BrowserEngine, headless: bool) -> Self {
        Self {
            engine,
            headless,
            state: Mutex::new(SessionState::default()),
            close_calls: AtomicU32::new(0),
        }
    }

    pub fn engine(&self) -> BrowserEngine {
        self.engine
    }

    /// Launch the browser if it is not running yet. Subsequent calls no-op.
    pub async fn ensure_started(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        if state.closed {
            return Err(Error::state("browser session already closed"));
        }
        if state.browser.is_some() {
            return Ok(());
        }

        let config = self.launch_config()?;
        info!(
            engine = self.engine.as_str(),
            headless = self.headless,
            "launching browser"
        );
        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| Error::browser(format!("failed to launch browser: {e}")))?;

        let handler_task = tokio::spawn(async move { while handler.next().await.is_some() {} });

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| Error::browser(format!("failed to open page: {e}")))?;

        state.browser = Some(browser);
        state.page = Some(page);
        state.handler_task = Some(handler_task);
        Ok(())
    }

    /// Active page handle. Fails before initialization.
    pub async fn page(&self) -> Result<Page> {
        let state = self.state.lock().await;
        if state.closed {
            return Err(Error::state("browser session already closed"));
        }
        state
            .page
            .clone()
            .ok_or_else(|| Error::state("browser session not ready; navigate to a page first"))
    }

    pub async fn is_started(&self) -> bool {
        self.state.lock().await.browser.is_some()
    }

    pub async fn is_closed(&self) -> bool {
        self.state.lock().await.closed
    }

    /// Number of times `close` has been invoked (idempotency witness).
    pub fn close_calls(&self) -> u32 {
        self.close_calls.load(Ordering::SeqCst)
    }

    /// Tear down the browser process. Safe to call more than once.
    pub async fn close(&self) {
        self.close_calls.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.lock().await;
        if state.closed {
            return;
        }
        state.closed = true;
        state.page = None;
        if let Some(mut browser) = state.browser.take() {
            if let Err(e) = browser.close().await {
                warn!(error = %e, "browser close reported an error");
            }
            let _ = browser.wait().await;
        }
        if let Some(task) = state.handler_task.take() {
            task.abort();
        }
        debug!("browser session closed");
    }

    fn launch_config(&self) -> Result<BrowserConfig> {
        let mut builder = BrowserConfig::builder()
            .no_sandbox()
            .window_size(1280, 720);
        if !self.headless {
            builder = builder.with_head();
        }
        if let Some(executable) = executable_for(self.engine) {
            builder = builder.chrome_executable(executable);
        }
        builder
            .build()
            .map_err(|e| Error::browser(format!("invalid browser configuration: {e}")))
    }
}

/// Resolve the executable for an engine variant.
///
/// Edge is the primary engine pointed at the msedge binary; Firefox and
/// Webkit resolve an executable by name and fall back to the driver default
/// when absent.
fn executable_for(engine: BrowserEngine) -> Option<PathBuf> {
    let candidates: &[&str] = match engine {
        BrowserEngine::Chromium => &[
            "google-chrome-stable",
            "google-chrome",
            "chromium",
            "chromium-browser",
        ],
        BrowserEngine::Edge => &["microsoft-edge", "microsoft-edge-stable", "msedge"],
        BrowserEngine::Firefox => &["firefox"],
        BrowserEngine::Webkit => &["epiphany-browser", "MiniBrowser"],
    };

    for name in candidates {
        if let Ok(path) = which(name) {
            return Some(path);
        }
    }

    if engine != BrowserEngine::Chromium {
        warn!(
            engine = engine.as_str(),
            "no executable found for engine; falling back to driver default"
        );
    }
    None
}

/// Find an element by selector, waiting up to `deadline` for it to appear.
///
/// Supports CSS selectors, XPath (`//` prefix) and the `text=` shorthand.
pub async fn find_element(
    page: &Page,
    selector: &str,
    deadline: Duration,
) -> Result<chromiumoxide::element::Element> {
    let started = tokio::time::Instant::now();
    loop {
        let lookup = if let Some(rest) = selector.strip_prefix("text=") {
            let quoted = xpath_quote(rest);
            page.find_xpath(format!(
                "//*[contains(normalize-space(.), {quoted}) and not(.//*[contains(normalize-space(.), {quoted})])]"
            ))
            .await
        } else if selector.starts_with("//") {
            page.find_xpath(selector).await
        } else {
            page.find_element(selector).await
        };

        match lookup {
            Ok(element) => return Ok(element),
            Err(e) => {
                if started.elapsed() >= deadline {
                    return Err(Error::browser_action(
                        format!("element not found within {}ms: {e}", deadline.as_millis()),
                        "find",
                        Some(selector),
                    ));
                }
                tokio::time::sleep(POLL_INTERVAL).await;
            }
        }
    }
}

/// Quote a literal for embedding in an XPath expression.
fn xpath_quote(raw: &str) -> String {
    if !raw.contains('\'') {
        return format!("'{raw}'");
    }
    if !raw.contains('"') {
        return format!("\"{raw}\"");
    }
    // Mixed quotes need concat().
    let parts: Vec<String> = raw.split('\'').map(|p| format!("'{p}'")).collect();
    format!("concat({})", parts.join(", \"'\", "))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn page_before_start_is_a_state_error() {
        let session = BrowserSession::new(BrowserEngine::Chromium, true);
        let err = session.page().await.unwrap_err();
        assert!(matches!(err, Error::State { .. }));
    }

    #[tokio::test]
    async fn close_is_idempotent() {
        let session = BrowserSession::new(BrowserEngine::Chromium, true);
        session.close().await;
        session.close().await;
        assert!(session.is_closed().await);
        assert_eq!(session.close_calls(), 2);
        // A closed session refuses to restart.
        assert!(session.ensure_started().await.is_err());
    }

    #[test]
    fn xpath_quoting_handles_apostrophes() {
        assert_eq!(xpath_quote("More information"), "'More information'");
        assert_eq!(xpath_quote("it's here"), "\"it's here\"");
        assert!(xpath_quote("a'b\"c").starts_with("concat("));
    }
}
