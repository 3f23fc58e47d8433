//! HTTP transport for the analytics endpoints

use std::time::Duration;

use super::{AnalyticsError, Result};

/// Form POST and JSON GET, the two calls the poster makes
pub trait AnalyticsTransport: Send + Sync {
    fn post_form(&self, url: &str, form: &[(&str, String)]) -> Result<()>;

    fn get_json(&self, url: &str) -> Result<serde_json::Value>;
}

/// Blocking reqwest client
pub struct HttpTransport {
    client: reqwest::blocking::Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AnalyticsError::Client(format!("HTTP client init failed: {e}")))?;
        Ok(Self { client })
    }
}

impl AnalyticsTransport for HttpTransport {
    fn post_form(&self, url: &str, form: &[(&str, String)]) -> Result<()> {
        self.client
            .post(url)
            .form(form)
            .send()?
            .error_for_status()?;
        Ok(())
    }

    fn get_json(&self, url: &str) -> Result<serde_json::Value> {
        let value = self
            .client
            .get(url)
            .send()?
            .error_for_status()?
            .json::<serde_json::Value>()?;
        Ok(value)
    }
}
