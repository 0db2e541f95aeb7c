//! HTTP client for the pricegrid price-matrix service.
//!
//! This crate provides a typed client for the pricing stream service and the
//! incremental decoder for its line-oriented event stream.
//!
//! # Example
//!
//! ```no_run
//! use futures::StreamExt;
//! use pricegrid_client::{MatrixEvent, MatrixRequest, PriceGridClient, Result};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> Result<()> {
//! let client = PriceGridClient::builder()
//!     .base_url("http://localhost:3000")
//!     .build()?;
//!
//! let request = MatrixRequest::new(
//!     "FRA",
//!     "BCN",
//!     vec!["2025-06-10".to_string()],
//!     vec!["2025-06-17".to_string()],
//! );
//!
//! let mut stream = client.matrix().stream(&request, CancellationToken::new()).await?;
//! while let Some(event) = stream.next().await {
//!     match event? {
//!         MatrixEvent::Price(update) => println!("{:?}", update),
//!         MatrixEvent::Complete { .. } => break,
//!         _ => {}
//!     }
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # API Coverage
//!
//! - **Matrix**: streaming price matrix, one-shot price matrix
//! - **Health**: server health checks

pub mod api;
pub mod client;
pub mod error;
pub mod sse;
pub mod types;

pub use client::{ClientBuilder, PriceGridClient};
pub use error::{Error, Result};
pub use sse::{EventStream, LineDecoder};
pub use types::*;
