use crate::config::{BrowserConfig, WaitUntil};
use crate::driver::{DriverFactory, PageDriver};
use crate::error::DriverError;
use crate::middleware::UserAgentRotator;
use async_trait::async_trait;
use fantoccini::wd::{Capabilities, TimeoutConfiguration};
use fantoccini::{Client, ClientBuilder, Locator};
use serde_json::{Value, json};
use std::time::Duration;
use tokio::time::{Instant, sleep, timeout};

/// Hides the most common automation tells before the site's scripts look
const STEALTH_SCRIPT: &str = r#"
    Object.defineProperty(navigator, 'webdriver', { get: () => undefined });
    Object.defineProperty(navigator, 'plugins', { get: () => [1, 2, 3, 4, 5] });
    Object.defineProperty(navigator, 'languages', { get: () => ['zh-CN', 'zh', 'en'] });
    return null;
"#;

const READY_STATE_POLL: Duration = Duration::from_millis(250);

/// A single WebDriver session used as one page
pub struct WebDriverPage {
    client: Option<Client>,
}

impl WebDriverPage {
    pub fn new(client: Client) -> Self {
        Self {
            client: Some(client),
        }
    }

    fn client(&self) -> Result<&Client, DriverError> {
        self.client.as_ref().ok_or(DriverError::SessionClosed)
    }

    async fn wait_for_ready_state(
        client: &Client,
        url: &str,
        wait_until: WaitUntil,
        deadline: Instant,
        limit: Duration,
    ) -> Result<(), DriverError> {
        loop {
            let state = client
                .execute("return document.readyState;", vec![])
                .await?;
            let reached = match (wait_until, state.as_str()) {
                (WaitUntil::Load, Some("complete")) => true,
                (WaitUntil::DomContentLoaded, Some("interactive" | "complete")) => true,
                _ => false,
            };
            if reached {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(DriverError::NavigationTimeout {
                    url: url.to_string(),
                    timeout: limit,
                });
            }
            sleep(READY_STATE_POLL).await;
        }
    }
}

#[async_trait]
impl PageDriver for WebDriverPage {
    async fn navigate(
        &mut self,
        url: &str,
        wait_until: WaitUntil,
        limit: Duration,
    ) -> Result<(), DriverError> {
        let client = self.client()?;
        let deadline = Instant::now() + limit;

        match timeout(limit, client.goto(url)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                if e.to_string().contains("Unable to find session") {
                    ::log::warn!("Lost session while accessing {}", url);
                    return Err(e.into());
                }
                return Err(DriverError::Navigation {
                    url: url.to_string(),
                    reason: e.to_string(),
                });
            }
            Err(_) => {
                return Err(DriverError::NavigationTimeout {
                    url: url.to_string(),
                    timeout: limit,
                });
            }
        }

        Self::wait_for_ready_state(client, url, wait_until, deadline, limit).await?;

        if let Err(e) = client.execute(STEALTH_SCRIPT, vec![]).await {
            ::log::debug!("Stealth script failed on {}: {}", url, e);
        }
        Ok(())
    }

    async fn evaluate_script(&mut self, script: &str) -> Result<Value, DriverError> {
        self.client()?
            .execute(script, vec![])
            .await
            .map_err(|e| DriverError::Script(e.to_string()))
    }

    async fn wait_for_selector(
        &mut self,
        selector: &str,
        limit: Duration,
    ) -> Result<bool, DriverError> {
        let found = self
            .client()?
            .wait()
            .at_most(limit)
            .for_element(Locator::Css(selector))
            .await;
        match found {
            Ok(_) => Ok(true),
            Err(fantoccini::error::CmdError::WaitTimeout) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn content(&mut self) -> Result<String, DriverError> {
        Ok(self.client()?.source().await?)
    }

    async fn close(&mut self) -> Result<(), DriverError> {
        match self.client.take() {
            Some(client) => Ok(client.close().await?),
            None => Ok(()),
        }
    }
}

/// Connects new WebDriver sessions configured from [`BrowserConfig`]
pub struct WebDriverFactory {
    config: BrowserConfig,
    user_agents: UserAgentRotator,
}

impl WebDriverFactory {
    pub fn new(config: BrowserConfig) -> Self {
        let user_agents = UserAgentRotator::new(config.user_agents.clone());
        Self {
            config,
            user_agents,
        }
    }

    fn capabilities(&self, user_agent: &str) -> Capabilities {
        let mut args = vec![
            "--no-sandbox".to_string(),
            "--disable-dev-shm-usage".to_string(),
            "--disable-gpu".to_string(),
            "--disable-blink-features=AutomationControlled".to_string(),
            "--blink-settings=imagesEnabled=false".to_string(),
            format!(
                "--window-size={},{}",
                self.config.window_width, self.config.window_height
            ),
            format!("--user-agent={}", user_agent),
        ];
        if self.config.headless {
            args.push("--headless=new".to_string());
        }

        let mut caps = Capabilities::new();
        caps.insert("pageLoadStrategy".to_string(), json!("eager"));
        caps.insert("acceptInsecureCerts".to_string(), json!(true));
        caps.insert(
            "goog:chromeOptions".to_string(),
            json!({ "args": args, "excludeSwitches": ["enable-automation"] }),
        );
        caps
    }

    async fn connect(&self, webdriver_url: &str, user_agent: &str) -> Option<Client> {
        let mut builder = ClientBuilder::native();
        builder.capabilities(self.capabilities(user_agent));
        match builder.connect(webdriver_url).await {
            Ok(client) => {
                ::log::debug!("Connected to WebDriver at {}", webdriver_url);
                Some(client)
            }
            Err(e) => {
                ::log::debug!("Failed to connect to WebDriver at {}: {}", webdriver_url, e);
                None
            }
        }
    }
}

#[async_trait]
impl DriverFactory for WebDriverFactory {
    async fn open(&self) -> Result<Box<dyn PageDriver>, DriverError> {
        let user_agent = self.user_agents.next();
        let candidates = std::iter::once(&self.config.webdriver_url).chain(
            self.config
                .fallback_webdriver_urls
                .iter()
                .filter(|url| **url != self.config.webdriver_url),
        );

        for url in candidates {
            if let Some(client) = self.connect(url, user_agent).await {
                let timeouts = TimeoutConfiguration::new(
                    Some(Duration::from_secs(30)),
                    Some(Duration::from_secs(90)),
                    Some(Duration::ZERO),
                );
                if let Err(e) = client.update_timeouts(timeouts).await {
                    ::log::debug!("Could not set session timeouts: {}", e);
                }
                return Ok(Box::new(WebDriverPage::new(client)));
            }
        }

        ::log::error!(
            "Failed to connect to any WebDriver server; start one or set WEBDRIVER_URL (tried {})",
            self.config.webdriver_url
        );
        Err(DriverError::Connect(self.config.webdriver_url.clone()))
    }
}
