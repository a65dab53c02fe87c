//! CDP-backed channel.
//!
//! Attaches to an already running application through its remote-debugging
//! endpoint and evaluates each [`RemoteCall`] with `Runtime.callFunctionOn`,
//! passing the payload as a structured call argument.

#![allow(
    clippy::significant_drop_tightening,
    clippy::missing_errors_doc,
    clippy::redundant_clone
)]

use super::{ChannelError, RemoteCall, RemoteExecutionChannel, RemoteFunction};
use crate::runner::Connector;
use async_trait::async_trait;
use chromiumoxide::browser::Browser as CdpBrowser;
use chromiumoxide::cdp::js_protocol::runtime::{CallArgument, CallFunctionOnParams};
use chromiumoxide::page::Page as CdpPage;
use futures::StreamExt;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Channel over a single attached page
#[derive(Debug)]
pub struct CdpChannel {
    page: Mutex<CdpPage>,
    #[allow(dead_code)]
    browser: CdpBrowser,
    handle: tokio::task::JoinHandle<()>,
}

impl CdpChannel {
    /// Attach to `endpoint`, picking the first page whose URL contains
    /// `url_contains` (or the first page when `None`).
    pub async fn attach(endpoint: &str, url_contains: Option<&str>) -> Result<Self, ChannelError> {
        let connect_err = |message: String| ChannelError::Connect {
            endpoint: endpoint.to_string(),
            message,
        };

        let (browser, mut handler) = CdpBrowser::connect(endpoint)
            .await
            .map_err(|e| connect_err(e.to_string()))?;

        let handle = tokio::spawn(async move {
            while let Some(h) = handler.next().await {
                if h.is_err() {
                    break;
                }
            }
        });

        let pages = browser
            .pages()
            .await
            .map_err(|e| connect_err(e.to_string()))?;

        let mut selected = None;
        for page in pages {
            let url = page.url().await.ok().flatten().unwrap_or_default();
            if url_contains.map_or(true, |needle| url.contains(needle)) {
                selected = Some(page);
                break;
            }
        }

        let page = selected.ok_or_else(|| connect_err("no matching page target".to_string()))?;
        tracing::debug!(endpoint, "attached to page target");

        Ok(Self {
            page: Mutex::new(page),
            browser,
            handle,
        })
    }

    fn params(call: &RemoteCall) -> Result<CallFunctionOnParams, ChannelError> {
        CallFunctionOnParams::builder()
            .function_declaration(call.function.declaration())
            .argument(CallArgument::builder().value(call.args.clone()).build())
            .await_promise(call.function.is_async())
            .return_by_value(true)
            .build()
            .map_err(|e| ChannelError::evaluation(call.function, e))
    }
}

impl Drop for CdpChannel {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[async_trait]
impl RemoteExecutionChannel for CdpChannel {
    async fn evaluate(&self, call: RemoteCall) -> Result<Value, ChannelError> {
        let function: RemoteFunction = call.function;
        let params = Self::params(&call)?;
        let page = self.page.lock().await;
        let result = page.evaluate_function(params).await.map_err(|e| {
            let message = e.to_string();
            if self.handle.is_finished() {
                ChannelError::disconnected(message)
            } else {
                ChannelError::evaluation(function, message)
            }
        })?;
        result
            .into_value::<Value>()
            .map_err(|e| ChannelError::Decode {
                function: function.name().to_string(),
                message: e.to_string(),
            })
    }
}

/// Suite-level connector that attaches a [`CdpChannel`]
#[derive(Debug, Clone)]
pub struct CdpConnector {
    /// Remote-debugging endpoint (`ws://...` or `http://host:port`)
    pub endpoint: String,
    /// Optional page URL filter
    pub url_contains: Option<String>,
}

impl CdpConnector {
    /// Create a connector for `endpoint`
    #[must_use]
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            url_contains: None,
        }
    }

    /// Only attach to a page whose URL contains `needle`
    #[must_use]
    pub fn with_url_filter(mut self, needle: impl Into<String>) -> Self {
        self.url_contains = Some(needle.into());
        self
    }
}

#[async_trait]
impl Connector for CdpConnector {
    async fn connect(&self) -> Result<Arc<dyn RemoteExecutionChannel>, ChannelError> {
        let channel =
            CdpChannel::attach(&self.endpoint, self.url_contains.as_deref()).await?;
        channel
            .evaluate(RemoteCall::bare(RemoteFunction::Ping))
            .await?;
        Ok(Arc::new(channel))
    }
}
