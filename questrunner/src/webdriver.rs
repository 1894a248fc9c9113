//! [`WebEngine`] backed by a W3C WebDriver server (msedgedriver, chromedriver).

use crate::config::{BrowserConfig, BrowserKind};
use crate::engine::{ScriptArg, WebEngine, WindowRect};
use crate::errors::AutomationError;
use crate::selector::Selector;
use reqwest::{Method, Url};
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tokio::process::{Child, Command};
use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

/// Key under which WebDriver serializes element references
pub const ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f735466cecf";

const DRIVER_READY_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Deserialize)]
struct WireResponse {
    #[serde(default)]
    value: Value,
}

#[derive(Debug, Deserialize)]
struct WireError {
    error: String,
    #[serde(default)]
    message: String,
}

/// Map a WebDriver error code onto the crate's error taxonomy.
pub fn map_wire_error(code: &str, message: String) -> AutomationError {
    match code {
        "stale element reference" | "detached shadow root" => AutomationError::StaleElement(message),
        "element click intercepted" => AutomationError::ClickIntercepted(message),
        "element not interactable" => AutomationError::ElementNotInteractable(message),
        "no such window" => AutomationError::NoSuchWindow(message),
        "no such element" => AutomationError::ElementNotFound(message),
        "timeout" | "script timeout" => AutomationError::Timeout(message),
        "invalid selector" => AutomationError::InvalidSelector(message),
        "invalid argument" => AutomationError::InvalidArgument(message),
        "session not created" => AutomationError::SessionNotCreated(message),
        // The browser went away underneath us
        "invalid session id" => AutomationError::WindowLost(message),
        _ => AutomationError::PlatformError(format!("{code}: {message}")),
    }
}

/// Capabilities for a new session using the persistent profile.
pub fn capabilities(config: &BrowserConfig) -> Value {
    let mut args = vec![
        format!("--user-data-dir={}", config.profile_dir.display()),
        "--profile-directory=Default".to_string(),
        "--start-maximized".to_string(),
        "--disable-notifications".to_string(),
        "--disable-extensions".to_string(),
        "--disable-infobars".to_string(),
        "--disable-popup-blocking".to_string(),
        "--disable-features=PasswordManager".to_string(),
        "--disable-blink-features=AutomationControlled".to_string(),
    ];
    if config.headless {
        args.push("--headless=new".to_string());
    }
    args.extend(config.extra_args.iter().cloned());

    let (browser_name, options_key) = match config.kind {
        BrowserKind::Edge => ("MicrosoftEdge", "ms:edgeOptions"),
        BrowserKind::Chrome => ("chrome", "goog:chromeOptions"),
    };
    json!({
        "capabilities": {
            "alwaysMatch": {
                "browserName": browser_name,
                options_key: {
                    "args": args,
                    "excludeSwitches": ["enable-automation"],
                }
            }
        }
    })
}

fn element_ref(value: &Value) -> Result<String, AutomationError> {
    value
        .get(ELEMENT_KEY)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| AutomationError::PlatformError(format!("not an element reference: {value}")))
}

fn script_arg(arg: &ScriptArg) -> Value {
    match arg {
        ScriptArg::Element(id) => json!({ ELEMENT_KEY: id }),
        ScriptArg::Value(value) => value.clone(),
    }
}

/// A live WebDriver session.
pub struct WebDriverEngine {
    base_url: String,
    session_id: String,
    cdp_vendor: &'static str,
    client: reqwest::Client,
    driver: Mutex<Option<Child>>,
}

impl WebDriverEngine {
    /// Start the driver binary if configured, then open a browser session.
    pub async fn launch(config: &BrowserConfig) -> Result<Self, AutomationError> {
        std::fs::create_dir_all(&config.profile_dir).map_err(|e| {
            AutomationError::InvalidArgument(format!(
                "cannot create profile dir {}: {e}",
                config.profile_dir.display()
            ))
        })?;

        let base_url = config.webdriver_url.trim_end_matches('/').to_string();
        let client = reqwest::Client::new();

        let driver = match &config.driver_binary {
            Some(binary) => {
                let port = Url::parse(&base_url)
                    .ok()
                    .and_then(|u| u.port_or_known_default())
                    .ok_or_else(|| {
                        AutomationError::InvalidArgument(format!(
                            "webdriver url has no port: {base_url}"
                        ))
                    })?;
                info!(binary = %binary.display(), port, "starting webdriver");
                let child = Command::new(binary)
                    .arg(format!("--port={port}"))
                    .kill_on_drop(true)
                    .spawn()
                    .map_err(|e| {
                        AutomationError::SessionNotCreated(format!(
                            "failed to start {}: {e}",
                            binary.display()
                        ))
                    })?;
                Some(child)
            }
            None => None,
        };

        wait_until_ready(&client, &base_url).await?;

        let response = client
            .post(format!("{base_url}/session"))
            .json(&capabilities(config))
            .send()
            .await
            .map_err(|e| AutomationError::SessionNotCreated(format!("webdriver unreachable: {e}")))?;
        let status = response.status();
        let body: Value = response
            .json()
            .await
            .map_err(|e| AutomationError::SessionNotCreated(format!("bad session response: {e}")))?;
        if !status.is_success() {
            return Err(AutomationError::SessionNotCreated(body["value"].to_string()));
        }
        let session_id = body["value"]["sessionId"]
            .as_str()
            .ok_or_else(|| AutomationError::SessionNotCreated("response without session id".into()))?
            .to_string();
        info!(%session_id, "browser session created");

        Ok(Self {
            base_url,
            session_id,
            cdp_vendor: match config.kind {
                BrowserKind::Edge => "ms",
                BrowserKind::Chrome => "goog",
            },
            client,
            driver: Mutex::new(driver),
        })
    }

    async fn command(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<Value, AutomationError> {
        let url = format!("{}/session/{}{}", self.base_url, self.session_id, path);
        debug!(%method, %path, "webdriver command");
        let mut request = self.client.request(method, &url);
        if let Some(body) = body {
            request = request.json(&body);
        }
        let response = request
            .send()
            .await
            .map_err(|e| AutomationError::PlatformError(format!("webdriver request failed: {e}")))?;
        let status = response.status();
        let wire: WireResponse = response
            .json()
            .await
            .map_err(|e| AutomationError::PlatformError(format!("bad webdriver response: {e}")))?;

        if status.is_success() {
            return Ok(wire.value);
        }
        match serde_json::from_value::<WireError>(wire.value) {
            Ok(err) => Err(map_wire_error(&err.error, err.message)),
            Err(_) => Err(AutomationError::PlatformError(format!(
                "webdriver returned {status}"
            ))),
        }
    }

    async fn get(&self, path: &str) -> Result<Value, AutomationError> {
        self.command(Method::GET, path, None).await
    }

    async fn post(&self, path: &str, body: Value) -> Result<Value, AutomationError> {
        self.command(Method::POST, path, Some(body)).await
    }
}

async fn wait_until_ready(client: &reqwest::Client, base_url: &str) -> Result<(), AutomationError> {
    let deadline = Instant::now() + DRIVER_READY_TIMEOUT;
    loop {
        if let Ok(response) = client.get(format!("{base_url}/status")).send().await {
            if let Ok(body) = response.json::<Value>().await {
                if body["value"]["ready"].as_bool().unwrap_or(false) {
                    return Ok(());
                }
            }
        }
        if Instant::now() >= deadline {
            return Err(AutomationError::SessionNotCreated(format!(
                "webdriver at {base_url} not ready after {DRIVER_READY_TIMEOUT:?}"
            )));
        }
        sleep(Duration::from_millis(250)).await;
    }
}

#[async_trait::async_trait]
impl WebEngine for WebDriverEngine {
    async fn navigate(&self, url: &str) -> Result<(), AutomationError> {
        self.post("/url", json!({ "url": url }))
            .await
            .map(|_| ())
            .map_err(|e| match e {
                AutomationError::WindowLost(_) => e,
                other => AutomationError::Navigation(format!("{url}: {other}")),
            })
    }

    async fn current_url(&self) -> Result<String, AutomationError> {
        let value = self.get("/url").await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    async fn find_elements(
        &self,
        selector: &Selector,
        root: Option<&str>,
    ) -> Result<Vec<String>, AutomationError> {
        if !selector.is_valid() {
            return Err(AutomationError::InvalidSelector(selector.to_string()));
        }
        let path = match root {
            Some(id) => format!("/element/{id}/elements"),
            None => "/elements".to_string(),
        };
        let value = self
            .post(
                &path,
                json!({ "using": selector.strategy(), "value": selector.value() }),
            )
            .await?;
        value
            .as_array()
            .map(|items| items.iter().map(element_ref).collect::<Result<Vec<_>, _>>())
            .unwrap_or_else(|| Ok(Vec::new()))
    }

    async fn element_attribute(
        &self,
        element: &str,
        name: &str,
    ) -> Result<Option<String>, AutomationError> {
        let value = self
            .get(&format!("/element/{element}/attribute/{name}"))
            .await?;
        Ok(match value {
            Value::Null => None,
            Value::String(s) => Some(s),
            other => Some(other.to_string()),
        })
    }

    async fn element_text(&self, element: &str) -> Result<String, AutomationError> {
        let value = self.get(&format!("/element/{element}/text")).await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    async fn element_tag(&self, element: &str) -> Result<String, AutomationError> {
        let value = self.get(&format!("/element/{element}/name")).await?;
        Ok(value.as_str().unwrap_or_default().to_lowercase())
    }

    async fn is_displayed(&self, element: &str) -> Result<bool, AutomationError> {
        let value = self.get(&format!("/element/{element}/displayed")).await?;
        Ok(value.as_bool().unwrap_or(false))
    }

    async fn is_enabled(&self, element: &str) -> Result<bool, AutomationError> {
        let value = self.get(&format!("/element/{element}/enabled")).await?;
        Ok(value.as_bool().unwrap_or(false))
    }

    async fn clear_element(&self, element: &str) -> Result<(), AutomationError> {
        self.post(&format!("/element/{element}/clear"), json!({}))
            .await
            .map(|_| ())
    }

    async fn send_keys(&self, element: &str, text: &str) -> Result<(), AutomationError> {
        self.post(&format!("/element/{element}/value"), json!({ "text": text }))
            .await
            .map(|_| ())
    }

    async fn execute_script(
        &self,
        script: &str,
        args: &[ScriptArg],
    ) -> Result<Value, AutomationError> {
        let args: Vec<Value> = args.iter().map(script_arg).collect();
        self.post("/execute/sync", json!({ "script": script, "args": args }))
            .await
    }

    async fn window_handle(&self) -> Result<String, AutomationError> {
        let value = self.get("/window").await?;
        value
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| AutomationError::NoSuchWindow("no current window".into()))
    }

    async fn window_handles(&self) -> Result<Vec<String>, AutomationError> {
        let value = self.get("/window/handles").await?;
        Ok(value
            .as_array()
            .map(|handles| {
                handles
                    .iter()
                    .filter_map(|h| h.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn switch_to_window(&self, handle: &str) -> Result<(), AutomationError> {
        self.post("/window", json!({ "handle": handle }))
            .await
            .map(|_| ())
    }

    async fn close_window(&self) -> Result<(), AutomationError> {
        self.command(Method::DELETE, "/window", None)
            .await
            .map(|_| ())
    }

    async fn set_window_rect(&self, rect: WindowRect) -> Result<(), AutomationError> {
        self.post(
            "/window/rect",
            json!({ "width": rect.width, "height": rect.height }),
        )
        .await
        .map(|_| ())
    }

    async fn maximize_window(&self) -> Result<(), AutomationError> {
        self.post("/window/maximize", json!({})).await.map(|_| ())
    }

    async fn override_user_agent(&self, user_agent: Option<&str>) -> Result<(), AutomationError> {
        // An empty override hands control back to the browser default
        let path = format!("/{}/cdp/execute", self.cdp_vendor);
        self.post(
            &path,
            json!({
                "cmd": "Network.setUserAgentOverride",
                "params": { "userAgent": user_agent.unwrap_or("") },
            }),
        )
        .await
        .map(|_| ())
    }

    async fn quit(&self) -> Result<(), AutomationError> {
        let result = self
            .command(Method::DELETE, "", None)
            .await
            .map(|_| ());
        if let Some(mut child) = self.driver.lock().await.take() {
            if let Err(e) = child.kill().await {
                warn!(error = %e, "failed to stop webdriver process");
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_wire_error_mapping() {
        assert!(matches!(
            map_wire_error("stale element reference", "gone".into()),
            AutomationError::StaleElement(_)
        ));
        assert!(matches!(
            map_wire_error("element not interactable", String::new()),
            AutomationError::ElementNotInteractable(_)
        ));
        assert!(matches!(
            map_wire_error("script timeout", String::new()),
            AutomationError::Timeout(_)
        ));
        assert!(matches!(
            map_wire_error("unknown error", "boom".into()),
            AutomationError::PlatformError(m) if m.contains("boom")
        ));
    }

    #[test]
    fn test_capabilities() {
        let config = BrowserConfig {
            kind: BrowserKind::Chrome,
            profile_dir: PathBuf::from("/tmp/profile"),
            headless: true,
            extra_args: vec!["--lang=en".into()],
            ..BrowserConfig::default()
        };
        let caps = capabilities(&config);
        let matched = &caps["capabilities"]["alwaysMatch"];
        assert_eq!(matched["browserName"], "chrome");
        let args = matched["goog:chromeOptions"]["args"].as_array().unwrap();
        assert!(args.contains(&json!("--user-data-dir=/tmp/profile")));
        assert!(args.contains(&json!("--headless=new")));
        assert!(args.contains(&json!("--lang=en")));
    }

    #[test]
    fn test_element_refs() {
        let value = json!({ ELEMENT_KEY: "abc" });
        assert_eq!(element_ref(&value).unwrap(), "abc");
        assert!(element_ref(&json!({"other": 1})).is_err());
        assert_eq!(script_arg(&ScriptArg::Element("abc".into())), value);
    }
}
