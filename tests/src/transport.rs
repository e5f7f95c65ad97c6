use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use fngate_kernel::gateway::{InvocationTransport, InvokeRequest, InvokeResult, TransportError};
use parking_lot::Mutex;
use tracing::debug;

/// One scripted outcome of [`MockTransport`].
#[derive(Debug, Clone)]
pub enum MockReply {
    Result(InvokeResult),
    /// Fails with [`TransportError::Network`] carrying the message.
    NetworkError(String),
    /// Fails with [`TransportError::Service`].
    ServiceError(u16, String),
}

/// A mock invocation service.
///
/// Replies are consumed in the order they were queued; once the queue is
/// empty every call gets the default result. Every request is recorded.
#[derive(Clone)]
pub struct MockTransport {
    replies: Arc<Mutex<VecDeque<MockReply>>>,
    default_result: Arc<Mutex<InvokeResult>>,
    delay: Arc<Mutex<Option<Duration>>>,
    /// Track all requests passed to this transport
    pub call_history: Arc<Mutex<Vec<InvokeRequest>>>,
}

impl MockTransport {
    /// Answers every call with `200` and an empty JSON object.
    pub fn new() -> Self {
        Self::with_default(InvokeResult::ok("{}"))
    }

    pub fn with_default(result: InvokeResult) -> Self {
        Self {
            replies: Arc::new(Mutex::new(VecDeque::new())),
            default_result: Arc::new(Mutex::new(result)),
            delay: Arc::new(Mutex::new(None)),
            call_history: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Queue a reply for a future call.
    pub fn push(&self, reply: MockReply) -> &Self {
        self.replies.lock().push_back(reply);
        self
    }

    pub fn push_result(&self, result: InvokeResult) -> &Self {
        self.push(MockReply::Result(result))
    }

    pub fn push_network_error(&self, message: &str) -> &Self {
        self.push(MockReply::NetworkError(message.to_string()))
    }

    /// Delay every reply by `delay`.
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock() = Some(delay);
    }

    /// Retrieve the history of requests made to this transport
    pub fn history(&self) -> Vec<InvokeRequest> {
        self.call_history.lock().clone()
    }

    /// The most recent request, if any.
    pub fn last_request(&self) -> Option<InvokeRequest> {
        self.call_history.lock().last().cloned()
    }

    /// Check the total number of times the transport was invoked
    pub fn call_count(&self) -> usize {
        self.call_history.lock().len()
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl InvocationTransport for MockTransport {
    async fn invoke(&self, request: InvokeRequest) -> Result<InvokeResult, TransportError> {
        let function = request.function_name.clone();
        self.call_history.lock().push(request);

        let delay = *self.delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let reply = self.replies.lock().pop_front();
        debug!(function = %function, reply = ?reply, "mock invocation");
        match reply {
            Some(MockReply::Result(result)) => Ok(result),
            Some(MockReply::NetworkError(message)) => {
                Err(TransportError::Network { function, message })
            }
            Some(MockReply::ServiceError(status, message)) => Err(TransportError::Service {
                function,
                status,
                message,
            }),
            None => Ok(self.default_result.lock().clone()),
        }
    }
}

/// Answers each call with its own payload and a JSON content type.
#[derive(Clone, Default)]
pub struct EchoTransport {
    pub call_history: Arc<Mutex<Vec<InvokeRequest>>>,
}

impl EchoTransport {
    pub fn last_request(&self) -> Option<InvokeRequest> {
        self.call_history.lock().last().cloned()
    }
}

#[async_trait]
impl InvocationTransport for EchoTransport {
    async fn invoke(&self, request: InvokeRequest) -> Result<InvokeResult, TransportError> {
        let payload = request.payload.clone().unwrap_or_default();
        self.call_history.lock().push(request);
        Ok(InvokeResult::ok(payload).with_header("content-type", "application/json"))
    }
}

#[macro_export]
macro_rules! assert_invoked {
    ($transport:expr, $expected_count:expr) => {
        let count = $transport.call_count();
        assert_eq!(
            count, $expected_count,
            "Expected the transport to be invoked {} times, but it was invoked {} times",
            $expected_count, count
        );
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn request() -> InvokeRequest {
        InvokeRequest {
            function_name: "arn:aws:lambda:us-east-1:1:function:a".to_string(),
            client_context: None,
            payload: None,
            headers: HashMap::new(),
        }
    }

    #[tokio::test]
    async fn queued_replies_come_before_the_default() {
        let transport = MockTransport::new();
        transport
            .push_result(InvokeResult::ok("first"))
            .push_network_error("down");

        let first = transport.invoke(request()).await.unwrap();
        assert_eq!(first.payload.as_ref(), b"first");
        assert!(matches!(
            transport.invoke(request()).await,
            Err(TransportError::Network { .. })
        ));
        let fallback = transport.invoke(request()).await.unwrap();
        assert_eq!(fallback.payload.as_ref(), b"{}");

        assert_invoked!(transport, 3);
    }
}
