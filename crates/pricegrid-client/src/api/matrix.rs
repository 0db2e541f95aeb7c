//! Price-matrix API.

use reqwest::header::CONTENT_TYPE;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::client::PriceGridClient;
use crate::error::{Error, Result};
use crate::sse::{self, EventStream};
use crate::types::{MatrixQuery, MatrixRequest, MatrixResponse};

/// Streaming endpoint path.
const STREAM_PATH: &str = "price-matrix-stream";

/// One-shot endpoint path.
const BATCH_PATH: &str = "price-matrix";

/// Media type of the streaming endpoint's body.
const EVENT_STREAM: &str = "text/event-stream";

/// Price-matrix API client.
pub struct MatrixApi {
    client: PriceGridClient,
}

impl MatrixApi {
    pub(crate) fn new(client: PriceGridClient) -> Self {
        Self { client }
    }

    /// Open a price-matrix stream.
    ///
    /// Events are decoded as they arrive. Triggering `cancel` before the
    /// response headers arrive returns [`Error::Cancelled`]; triggering it
    /// afterwards ends the returned stream without an error. Dropping the
    /// stream closes the connection.
    pub async fn stream(
        &self,
        request: &MatrixRequest,
        cancel: CancellationToken,
    ) -> Result<EventStream> {
        debug!(
            origin = %request.origin,
            destination = %request.destination,
            combinations = request.combination_count(),
            "Opening price-matrix stream"
        );

        let query = MatrixQuery::from(request);
        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(Error::Cancelled),
            response = self.client.post_stream(STREAM_PATH, request, &query) => response?,
        };

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        if !content_type.starts_with(EVENT_STREAM) {
            return Err(Error::Stream(format!(
                "expected {}, got {:?}",
                EVENT_STREAM, content_type
            )));
        }

        Ok(sse::event_stream(response.bytes_stream(), cancel))
    }

    /// Fetch the whole matrix in one response.
    ///
    /// The server prices every combination before answering, which for a full
    /// window takes much longer than the first streamed events.
    pub async fn fetch(&self, request: &MatrixRequest) -> Result<MatrixResponse> {
        self.client.post(BATCH_PATH, request).await
    }
}
