//! Headless Chromium page fetcher
//!
//! One browser is launched per crawl. Every fetch opens its own tab, waits
//! for navigation, reads the rendered DOM and closes the tab again. Assets
//! are plain downloads and go through an inner [`HttpFetcher`].

use crate::config::HttpConfig;
use crate::crawler::fetcher::{FetchError, FetchedPage, HttpFetcher, PageFetcher};
use crate::crawler::parser::parse_html;
use crate::ScribeError;
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::page::Page;
use futures::StreamExt;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use url::Url;

struct Rendered {
    content: String,
    final_url: Option<String>,
    status: u16,
}

pub struct BrowserFetcher {
    browser: Mutex<Option<Browser>>,
    handler: std::sync::Mutex<Option<JoinHandle<()>>>,
    assets: HttpFetcher,
}

impl BrowserFetcher {
    /// Launches headless Chromium and spawns its CDP event handler
    pub async fn launch(http: &HttpConfig) -> Result<Self, ScribeError> {
        tracing::info!("Launching headless browser");

        let config = BrowserConfig::builder()
            .request_timeout(Duration::from_secs(30))
            .window_size(1280, 1024)
            .arg(format!("--user-agent={}", http.user_agent))
            .arg("--disable-gpu")
            .arg("--disable-extensions")
            .arg("--disable-notifications")
            .arg("--no-first-run")
            .arg("--no-default-browser-check")
            .arg("--mute-audio")
            .build()
            .map_err(|e| FetchError::Browser(format!("invalid browser config: {}", e)))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| FetchError::Browser(format!("launch failed: {}", e)))?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    tracing::debug!("Browser handler error: {:?}", e);
                }
            }
            tracing::debug!("Browser event handler finished");
        });

        Ok(Self {
            browser: Mutex::new(Some(browser)),
            handler: std::sync::Mutex::new(Some(handler_task)),
            assets: HttpFetcher::new(http)?,
        })
    }

    async fn open_tab(&self) -> Result<Page, FetchError> {
        let guard = self.browser.lock().await;
        let browser = guard
            .as_ref()
            .ok_or_else(|| FetchError::Browser("browser already shut down".to_string()))?;
        browser
            .new_page("about:blank")
            .await
            .map_err(|e| FetchError::Browser(format!("failed to open tab: {}", e)))
    }

    /// Navigates to `url` and returns the rendered DOM, the final URL and
    /// the status of the main document response
    async fn render(page: &Page, url: &Url) -> Result<Rendered, FetchError> {
        page.goto(url.as_str())
            .await
            .map_err(|e| FetchError::Network(format!("navigation failed: {}", e)))?;
        let request = page
            .wait_for_navigation_response()
            .await
            .map_err(|e| FetchError::Network(format!("navigation failed: {}", e)))?;

        let status = request
            .as_ref()
            .and_then(|request| request.response.as_ref())
            .map(|response| response.status);
        if let Some(error) = status.and_then(FetchError::from_code) {
            return Err(error);
        }

        let content = page
            .content()
            .await
            .map_err(|e| FetchError::Malformed(format!("unreadable DOM: {}", e)))?;
        let final_url = page.url().await.ok().flatten();

        Ok(Rendered {
            content,
            final_url,
            status: status.and_then(|s| u16::try_from(s).ok()).unwrap_or(200),
        })
    }
}

#[async_trait]
impl PageFetcher for BrowserFetcher {
    async fn fetch(&self, url: &Url, timeout: Duration) -> Result<FetchedPage, FetchError> {
        let page = self.open_tab().await?;

        let rendered = tokio::time::timeout(timeout, Self::render(&page, url)).await;

        if let Err(e) = page.close().await {
            tracing::debug!("Failed to close tab for {}: {}", url, e);
        }

        let Rendered {
            content,
            final_url,
            status,
        } = rendered.map_err(|_| FetchError::Timeout)??;

        let final_url = final_url
            .and_then(|u| Url::parse(&u).ok())
            .filter(|u| matches!(u.scheme(), "http" | "https"))
            .unwrap_or_else(|| url.clone());
        let parsed = parse_html(&content, &final_url);

        Ok(FetchedPage {
            final_url,
            status_code: status,
            content_type: Some("text/html".to_string()),
            content,
            title: parsed.title,
            links: parsed.links,
            assets: parsed.assets,
        })
    }

    async fn fetch_asset(&self, url: &Url, timeout: Duration) -> Result<Vec<u8>, FetchError> {
        self.assets.fetch_asset(url, timeout).await
    }

    async fn shutdown(&self) {
        if let Some(mut browser) = self.browser.lock().await.take() {
            tracing::info!("Closing headless browser");
            if let Err(e) = browser.close().await {
                tracing::warn!("Failed to close browser: {}", e);
            }
            if let Err(e) = browser.wait().await {
                tracing::warn!("Failed to wait for browser exit: {}", e);
            }
        }

        let handler = self.handler.lock().ok().and_then(|mut h| h.take());
        if let Some(handler) = handler {
            let _ = handler.await;
        }
    }

    fn name(&self) -> &'static str {
        "browser"
    }
}

impl Drop for BrowserFetcher {
    fn drop(&mut self) {
        if let Ok(mut handler) = self.handler.lock() {
            if let Some(handler) = handler.take() {
                handler.abort();
            }
        }
    }
}
