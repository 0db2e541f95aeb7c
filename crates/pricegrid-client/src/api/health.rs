//! Health API.

use crate::client::PriceGridClient;
use crate::error::{Error, Result};

/// Health API client.
pub struct HealthApi {
    client: PriceGridClient,
}

impl HealthApi {
    pub(crate) fn new(client: PriceGridClient) -> Self {
        Self { client }
    }

    /// Check health. The endpoint answers with a bare status code.
    pub async fn check(&self) -> Result<()> {
        let inner = self.client.inner();
        let url = self.client.url("health")?;

        let response = inner.http.get(url).timeout(inner.timeout).send().await?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(Error::Api {
                status: response.status().as_u16(),
                message: "Health check failed".to_string(),
            })
        }
    }

    /// Simple connectivity check - returns true if server is reachable.
    pub async fn is_healthy(&self) -> bool {
        self.check().await.is_ok()
    }
}
