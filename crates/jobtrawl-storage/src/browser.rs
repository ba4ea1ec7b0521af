use std::time::Duration;

use async_trait::async_trait;
use fantoccini::error::{CmdError, NewSessionError};
use fantoccini::{Client, ClientBuilder, Locator};
use serde_json::json;
use thiserror::Error;
use tracing::{debug, info};

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
AppleWebKit/537.36 (KHTML, like Gecko) Chrome/122.0 Safari/537.36";

#[derive(Debug, Clone)]
pub struct BrowserConfig {
    pub webdriver_url: String,
    pub headless: bool,
    pub user_agent: String,
    pub window_size: (u32, u32),
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            webdriver_url: "http://localhost:9515".to_string(),
            headless: true,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            window_size: (1920, 1080),
        }
    }
}

impl BrowserConfig {
    /// Chrome command-line switches passed through `goog:chromeOptions`.
    pub fn chrome_args(&self) -> Vec<String> {
        let mut args = Vec::new();
        if self.headless {
            args.push("--headless=new".to_string());
        }
        args.push("--no-sandbox".to_string());
        args.push("--disable-dev-shm-usage".to_string());
        args.push(format!(
            "--window-size={},{}",
            self.window_size.0, self.window_size.1
        ));
        args.push("--disable-blink-features=AutomationControlled".to_string());
        args.push(format!("--user-agent={}", self.user_agent));
        args
    }
}

#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("starting WebDriver session at {url}: {source}")]
    Connect {
        url: String,
        #[source]
        source: NewSessionError,
    },
    #[error("timed out after {}s waiting for `{selector}`", .timeout.as_secs_f64())]
    WaitTimeout { selector: String, timeout: Duration },
    #[error(transparent)]
    Command(#[from] CmdError),
}

/// The slice of a browser the collector needs.
#[async_trait]
pub trait PageDriver: Send + Sync {
    async fn goto(&self, url: &str) -> Result<(), BrowserError>;

    /// Resolve once any element matches `selector`, or fail with [`BrowserError::WaitTimeout`].
    async fn wait_for_any(&self, selector: &str, timeout: Duration) -> Result<(), BrowserError>;

    async fn page_source(&self) -> Result<String, BrowserError>;

    async fn close(&self) -> Result<(), BrowserError>;
}

/// A WebDriver-controlled Chrome session.
#[derive(Debug, Clone)]
pub struct BrowserSession {
    client: Client,
}

impl BrowserSession {
    pub async fn connect(config: &BrowserConfig) -> Result<Self, BrowserError> {
        let mut caps = serde_json::Map::new();
        caps.insert(
            "goog:chromeOptions".to_string(),
            json!({ "args": config.chrome_args() }),
        );

        info!(webdriver = %config.webdriver_url, headless = config.headless, "starting browser");
        let client = ClientBuilder::native()
            .capabilities(caps)
            .connect(&config.webdriver_url)
            .await
            .map_err(|source| BrowserError::Connect {
                url: config.webdriver_url.clone(),
                source,
            })?;
        Ok(Self { client })
    }
}

#[async_trait]
impl PageDriver for BrowserSession {
    async fn goto(&self, url: &str) -> Result<(), BrowserError> {
        self.client.goto(url).await?;
        Ok(())
    }

    async fn wait_for_any(&self, selector: &str, timeout: Duration) -> Result<(), BrowserError> {
        match self
            .client
            .wait()
            .at_most(timeout)
            .for_element(Locator::Css(selector))
            .await
        {
            Ok(_) => Ok(()),
            Err(CmdError::WaitTimeout) => Err(BrowserError::WaitTimeout {
                selector: selector.to_string(),
                timeout,
            }),
            Err(err) => Err(err.into()),
        }
    }

    async fn page_source(&self) -> Result<String, BrowserError> {
        Ok(self.client.source().await?)
    }

    async fn close(&self) -> Result<(), BrowserError> {
        debug!("closing browser session");
        self.client.clone().close().await?;
        Ok(())
    }
}
