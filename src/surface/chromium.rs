//! Live trading page driven through chromiumoxide.
//!
//! Attaches to an already running Chromium (started with
//! `--remote-debugging-port`) so the user's logged-in session is reused.
//! Matched elements are tagged with a `data-ps-handle` attribute; the
//! handle number is what the engine passes back for later reads and
//! clicks.

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use chromiumoxide::browser::Browser;
use chromiumoxide::page::Page;
use futures::StreamExt;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::{NodeHandle, Rect, SelectorSet, Surface};
use crate::config::BrowserConfig;

/// Attribute that carries the handle number on tagged elements.
const HANDLE_ATTR: &str = "data-ps-handle";

/// Response of the DevTools `/json/version` endpoint.
#[derive(Debug, Deserialize)]
struct VersionInfo {
    #[serde(rename = "webSocketDebuggerUrl")]
    web_socket_debugger_url: String,
    #[serde(rename = "Browser", default)]
    browser: String,
}

/// Resolve the browser-level WebSocket URL from the DevTools HTTP endpoint.
pub async fn discover_ws_url(devtools_url: &str, timeout: Duration) -> Result<String> {
    let url = format!("{}/json/version", devtools_url.trim_end_matches('/'));
    let client = reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .context("Failed to build HTTP client")?;

    let info: VersionInfo = client
        .get(&url)
        .send()
        .await
        .with_context(|| format!("DevTools endpoint unreachable: {url}"))?
        .error_for_status()
        .context("DevTools endpoint returned an error status")?
        .json()
        .await
        .context("Failed to parse DevTools version info")?;

    debug!(browser = %info.browser, ws = %info.web_socket_debugger_url, "DevTools endpoint resolved");
    Ok(info.web_socket_debugger_url)
}

/// A `Surface` backed by one Chromium tab.
pub struct ChromiumSurface {
    page: Page,
    _browser: Browser,
}

impl ChromiumSurface {
    /// Attach to the running browser and pick the trading tab.
    ///
    /// The first tab whose URL contains `page_url_contains` is used; when
    /// none matches and `open_url` is configured, a new tab is opened.
    pub async fn connect(cfg: &BrowserConfig) -> Result<Self> {
        let ws_url = discover_ws_url(
            &cfg.devtools_url,
            Duration::from_millis(cfg.connect_timeout_ms),
        )
        .await?;

        let (browser, mut handler) = Browser::connect(ws_url)
            .await
            .context("Failed to connect to Chromium")?;

        tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    warn!(error = %e, "Chromium handler error");
                }
            }
        });

        let mut chosen = None;
        for page in browser.pages().await.context("Failed to list tabs")? {
            let url = page.url().await.ok().flatten().unwrap_or_default();
            if url.contains(&cfg.page_url_contains) {
                info!(url = %url, "Attached to trading tab");
                chosen = Some(page);
                break;
            }
        }

        let page = match (chosen, cfg.open_url.as_deref()) {
            (Some(page), _) => page,
            (None, Some(open_url)) => {
                info!(url = open_url, "No matching tab, opening a new one");
                browser
                    .new_page(open_url)
                    .await
                    .with_context(|| format!("Failed to open {open_url}"))?
            }
            (None, None) => bail!(
                "No open tab matches '{}' and no open_url is configured",
                cfg.page_url_contains
            ),
        };

        Ok(Self {
            page,
            _browser: browser,
        })
    }

    async fn eval<T: DeserializeOwned>(&self, script: String) -> Result<T> {
        let result = self
            .page
            .evaluate_expression(script)
            .await
            .context("Page script failed")?;
        result
            .into_value()
            .map_err(|e| anyhow!("Failed to convert script result: {e:?}"))
    }

    /// Wrap a statement block so it runs against the tagged element `el`.
    fn on_node(node: NodeHandle, body: &str) -> String {
        format!(
            "(() => {{ const el = document.querySelector('[{HANDLE_ATTR}=\"{id}\"]'); \
             if (!el) throw new Error('node {id} is detached'); {body} }})()",
            id = node.0,
        )
    }
}

#[async_trait]
impl Surface for ChromiumSurface {
    async fn query_all(&self, set: &SelectorSet) -> Result<Vec<NodeHandle>> {
        let selectors = serde_json::to_string(set.selectors)?;
        let script = format!(
            r#"(() => {{
                const state = window.__psHandles || (window.__psHandles = {{ next: 1 }});
                for (const sel of {selectors}) {{
                    let nodes;
                    try {{ nodes = document.querySelectorAll(sel); }} catch (e) {{ continue; }}
                    if (nodes.length === 0) continue;
                    return Array.from(nodes).map(el => {{
                        if (!el.hasAttribute('{HANDLE_ATTR}')) {{
                            el.setAttribute('{HANDLE_ATTR}', String(state.next++));
                        }}
                        return Number(el.getAttribute('{HANDLE_ATTR}'));
                    }});
                }}
                return [];
            }})()"#
        );
        let ids: Vec<u64> = self
            .eval(script)
            .await
            .with_context(|| format!("query_all({set}) failed"))?;
        Ok(ids.into_iter().map(NodeHandle).collect())
    }

    async fn click(&self, node: NodeHandle) -> Result<()> {
        let _: bool = self
            .eval(Self::on_node(node, "el.click(); return true;"))
            .await
            .with_context(|| format!("click({node}) failed"))?;
        Ok(())
    }

    async fn bounding_rect(&self, node: NodeHandle) -> Result<Rect> {
        let body = "const r = el.getBoundingClientRect(); \
                    const s = window.getComputedStyle(el); \
                    const hidden = s.display === 'none' || s.visibility === 'hidden' || s.opacity === '0'; \
                    return hidden ? { x: r.x, y: r.y, width: 0, height: 0 } \
                                  : { x: r.x, y: r.y, width: r.width, height: r.height };";
        self.eval(Self::on_node(node, body))
            .await
            .with_context(|| format!("bounding_rect({node}) failed"))
    }

    async fn text_of(&self, node: NodeHandle) -> Result<String> {
        self.eval(Self::on_node(node, "return el.textContent || '';"))
            .await
            .with_context(|| format!("text_of({node}) failed"))
    }

    async fn attribute(&self, node: NodeHandle, name: &str) -> Result<Option<String>> {
        let name = serde_json::to_string(name)?;
        self.eval(Self::on_node(node, &format!("return el.getAttribute({name});")))
            .await
            .with_context(|| format!("attribute({node}) failed"))
    }

    async fn leaf_texts(&self, set: &SelectorSet, needle: &str, max_len: usize) -> Result<Vec<String>> {
        self.eval(leaf_texts_script(set, needle, max_len)?)
            .await
            .with_context(|| format!("leaf_texts({set}) failed"))
    }

    async fn dispatch_keydown(&self, key: &str) -> Result<()> {
        let key = serde_json::to_string(key)?;
        let script = format!(
            "(() => {{ document.dispatchEvent(new KeyboardEvent('keydown', {{ key: {key}, bubbles: true }})); return true; }})()"
        );
        let _: bool = self.eval(script).await.context("dispatch_keydown failed")?;
        Ok(())
    }
}

/// Filter leaves in a single page pass; nothing on the page is written.
fn leaf_texts_script(set: &SelectorSet, needle: &str, max_len: usize) -> Result<String> {
    let selectors = serde_json::to_string(set.selectors)?;
    let needle = serde_json::to_string(needle)?;
    Ok(format!(
        r#"(() => {{
            for (const sel of {selectors}) {{
                let nodes;
                try {{ nodes = document.querySelectorAll(sel); }} catch (e) {{ continue; }}
                if (nodes.length === 0) continue;
                const out = [];
                for (const el of nodes) {{
                    if (el.children.length > 0) continue;
                    const text = (el.textContent || '').trim();
                    if (text.includes({needle}) && [...text].length < {max_len}) out.push(text);
                }}
                return out;
            }}
            return [];
        }})()"#
    ))
}
