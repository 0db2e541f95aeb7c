//! The seam between the request coordinator and the transport.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use pricegrid_client::{EventStream, MatrixRequest, PriceGridClient};

/// Opens price-matrix event streams.
#[async_trait]
pub trait PriceSource: Send + Sync {
    /// Issue one streaming request.
    ///
    /// Implementations end the returned stream when `cancel` fires and
    /// report a cancellation before the stream opens as
    /// [`pricegrid_client::Error::Cancelled`].
    async fn open(
        &self,
        request: &MatrixRequest,
        cancel: CancellationToken,
    ) -> pricegrid_client::Result<EventStream>;
}

#[async_trait]
impl PriceSource for PriceGridClient {
    async fn open(
        &self,
        request: &MatrixRequest,
        cancel: CancellationToken,
    ) -> pricegrid_client::Result<EventStream> {
        self.matrix().stream(request, cancel).await
    }
}

#[cfg(any(test, feature = "testing"))]
pub use mock::{MockReply, MockSource, MockStep};

#[cfg(any(test, feature = "testing"))]
mod mock {
    use std::collections::VecDeque;
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use parking_lot::Mutex;
    use tokio_util::sync::CancellationToken;

    use pricegrid_client::{Error, EventStream, MatrixEvent, MatrixRequest, PriceUpdate};

    use super::PriceSource;

    /// Computes the price for an (outbound, inbound) pair; `None` means no offer.
    type Responder = Arc<dyn Fn(&str, &str) -> Option<String> + Send + Sync>;

    /// One step of a scripted stream.
    #[derive(Debug, Clone)]
    pub enum MockStep {
        /// Deliver an event.
        Event(MatrixEvent),
        /// Wait before the next step.
        Delay(Duration),
        /// Fail the transport.
        Fail(String),
        /// Never deliver anything else.
        Hang,
    }

    impl MockStep {
        /// A price event.
        pub fn price(outbound: &str, inbound: &str, price: Option<&str>) -> Self {
            MockStep::Event(MatrixEvent::Price(PriceUpdate {
                outbound_date: outbound.to_string(),
                inbound_date: inbound.to_string(),
                price: price.map(str::to_string),
                currency: Some("EUR".to_string()),
            }))
        }

        /// A complete event.
        pub fn complete() -> Self {
            MockStep::Event(MatrixEvent::Complete {
                total: 0,
                successful: 0,
                failed: 0,
            })
        }
    }

    /// Reply to one `open` call.
    #[derive(Debug, Clone)]
    pub enum MockReply {
        /// Stream the steps, stopping when cancelled.
        Script(Vec<MockStep>),
        /// Stream the steps and keep delivering after cancellation,
        /// like a transport that does not stop promptly.
        Leaky(Vec<MockStep>),
        /// Reject the request with an HTTP status.
        Reject(u16),
    }

    /// Scripted price source for tests.
    ///
    /// Replies queued with [`reply`](Self::reply) are used first, in order.
    /// Once they run out, the responder (if any) answers every valid pair of
    /// the request windows followed by a `complete` event.
    #[derive(Default)]
    pub struct MockSource {
        replies: Mutex<VecDeque<MockReply>>,
        responder: Option<Responder>,
        requests: Mutex<Vec<MatrixRequest>>,
    }

    impl MockSource {
        /// Create a source with no replies; streams only `complete`.
        pub fn new() -> Self {
            Self::default()
        }

        /// Create a source that prices every pair with `responder`.
        pub fn answering(
            responder: impl Fn(&str, &str) -> Option<String> + Send + Sync + 'static,
        ) -> Self {
            Self {
                responder: Some(Arc::new(responder)),
                ..Self::default()
            }
        }

        /// Create a source that prices every pair at the same value.
        pub fn flat(price: &str) -> Self {
            let price = price.to_string();
            Self::answering(move |_, _| Some(price.clone()))
        }

        /// Queue a reply.
        pub fn reply(self, reply: MockReply) -> Self {
            self.replies.lock().push_back(reply);
            self
        }

        /// Requests received so far.
        pub fn requests(&self) -> Vec<MatrixRequest> {
            self.requests.lock().clone()
        }

        /// Number of requests received so far.
        pub fn request_count(&self) -> usize {
            self.requests.lock().len()
        }

        fn respond(&self, request: &MatrixRequest) -> Vec<MockStep> {
            let mut steps = Vec::new();
            if let Some(responder) = &self.responder {
                for out in &request.outbound_dates {
                    for inb in request.inbound_dates.iter().filter(|inb| *inb > out) {
                        steps.push(MockStep::price(out, inb, responder(out, inb).as_deref()));
                    }
                }
            }
            steps.push(MockStep::complete());
            steps
        }
    }

    #[async_trait]
    impl PriceSource for MockSource {
        async fn open(
            &self,
            request: &MatrixRequest,
            cancel: CancellationToken,
        ) -> pricegrid_client::Result<EventStream> {
            self.requests.lock().push(request.clone());

            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }

            let reply = self.replies.lock().pop_front();
            let (steps, honor_cancel) = match reply {
                Some(MockReply::Reject(status)) => {
                    return Err(Error::Api {
                        status,
                        message: format!("HTTP {}", status),
                    });
                }
                Some(MockReply::Script(steps)) => (steps, true),
                Some(MockReply::Leaky(steps)) => (steps, false),
                None => (self.respond(request), true),
            };

            Ok(Box::pin(async_stream::stream! {
                for step in steps {
                    if honor_cancel && cancel.is_cancelled() {
                        return;
                    }
                    match step {
                        MockStep::Event(event) => yield Ok(event),
                        MockStep::Delay(delay) => {
                            if honor_cancel {
                                tokio::select! {
                                    _ = cancel.cancelled() => return,
                                    _ = tokio::time::sleep(delay) => {}
                                }
                            } else {
                                tokio::time::sleep(delay).await;
                            }
                        }
                        MockStep::Fail(message) => {
                            yield Err(Error::Stream(message));
                            return;
                        }
                        MockStep::Hang => {
                            cancel.cancelled().await;
                            return;
                        }
                    }
                }
            }))
        }
    }
}
