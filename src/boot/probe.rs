//! HTTP liveness probe

use std::time::Duration;

use async_trait::async_trait;

use crate::error::{AppError, Result};

/// Issues a GET and reports the status code
#[async_trait]
pub trait HttpProbe: Send + Sync {
    async fn get_status(&self, url: &str) -> Result<u16>;
}

/// reqwest-backed probe
pub struct ReqwestProbe {
    client: reqwest::Client,
}

impl ReqwestProbe {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpProbe for ReqwestProbe {
    async fn get_status(&self, url: &str) -> Result<u16> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| AppError::Http(e.to_string()))?;
        Ok(response.status().as_u16())
    }
}
