//! Channels to external systems, and the primary/fallback pair.
//!
//! A [`FallbackTransport`] tries its primary channel under a timeout. On any
//! primary failure it retries the same call on the fallback. Once the
//! fallback has served a call the transport goes sticky and every later call
//! skips the primary for the rest of the process.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{info, warn};

use crate::error::TransportError;
use crate::types::ArgumentMap;

/// A request/response channel to an external system.
#[async_trait]
pub trait Channel: Send + Sync {
    fn name(&self) -> &str;

    async fn call(&self, operation: &str, arguments: &ArgumentMap) -> Result<Value, TransportError>;
}

/// Turn a raw response into a result: an object carrying `"success": false`
/// is a rejection, anything else is success.
pub fn interpret_response(channel: &str, response: Value) -> Result<Value, TransportError> {
    let rejected = response
        .get("success")
        .and_then(Value::as_bool)
        .is_some_and(|ok| !ok);
    if rejected {
        let reason = response
            .get("error")
            .or_else(|| response.get("message"))
            .and_then(Value::as_str)
            .unwrap_or("call reported failure")
            .to_string();
        return Err(TransportError::Rejected {
            channel: channel.to_string(),
            reason,
        });
    }
    Ok(response)
}

pub struct FallbackTransport {
    name: String,
    primary: Arc<dyn Channel>,
    fallback: Arc<dyn Channel>,
    primary_timeout: Duration,
    sticky: AtomicBool,
}

impl FallbackTransport {
    pub fn new(
        name: impl Into<String>,
        primary: Arc<dyn Channel>,
        fallback: Arc<dyn Channel>,
        primary_timeout: Duration,
    ) -> Self {
        Self {
            name: name.into(),
            primary,
            fallback,
            primary_timeout,
            sticky: AtomicBool::new(false),
        }
    }

    /// Whether the primary has been abandoned for this process.
    pub fn is_sticky(&self) -> bool {
        self.sticky.load(Ordering::SeqCst)
    }

    async fn call_primary(&self, operation: &str, arguments: &ArgumentMap) -> Result<Value, TransportError> {
        let name = self.primary.name().to_string();
        match tokio::time::timeout(self.primary_timeout, self.primary.call(operation, arguments)).await {
            Ok(result) => interpret_response(&name, result?),
            Err(_) => Err(TransportError::Timeout {
                channel: name,
                after_ms: self.primary_timeout.as_millis() as u64,
            }),
        }
    }

    async fn call_fallback(&self, operation: &str, arguments: &ArgumentMap) -> Result<Value, TransportError> {
        let name = self.fallback.name().to_string();
        let response = interpret_response(&name, self.fallback.call(operation, arguments).await?)?;
        if !self.sticky.swap(true, Ordering::SeqCst) {
            info!(transport = %self.name, fallback = %name, "Fallback served a call, staying on it");
        }
        Ok(response)
    }
}

#[async_trait]
impl Channel for FallbackTransport {
    fn name(&self) -> &str {
        &self.name
    }

    async fn call(&self, operation: &str, arguments: &ArgumentMap) -> Result<Value, TransportError> {
        if self.is_sticky() {
            return self.call_fallback(operation, arguments).await;
        }

        match self.call_primary(operation, arguments).await {
            Ok(response) => Ok(response),
            Err(e) => {
                warn!(
                    transport = %self.name,
                    operation = %operation,
                    error = %e,
                    "Primary channel failed, trying fallback"
                );
                self.call_fallback(operation, arguments).await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::AtomicUsize;

    enum Behaviour {
        Ok,
        Fail,
        Refuse,
        Hang,
    }

    struct CountingChannel {
        name: &'static str,
        behaviour: Behaviour,
        calls: AtomicUsize,
    }

    impl CountingChannel {
        fn new(name: &'static str, behaviour: Behaviour) -> Arc<Self> {
            Arc::new(Self {
                name,
                behaviour,
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Channel for CountingChannel {
        fn name(&self) -> &str {
            self.name
        }

        async fn call(&self, operation: &str, _arguments: &ArgumentMap) -> Result<Value, TransportError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.behaviour {
                Behaviour::Ok => Ok(json!({ "success": true, "via": self.name, "op": operation })),
                Behaviour::Fail => Err(TransportError::Unavailable {
                    channel: self.name.into(),
                    reason: "connection refused".into(),
                }),
                Behaviour::Refuse => Ok(json!({ "success": false, "error": "nope" })),
                Behaviour::Hang => {
                    tokio::time::sleep(Duration::from_secs(30)).await;
                    Ok(json!({}))
                }
            }
        }
    }

    fn transport(primary: Arc<CountingChannel>, fallback: Arc<CountingChannel>) -> FallbackTransport {
        FallbackTransport::new("records", primary, fallback, Duration::from_millis(50))
    }

    #[test]
    fn test_interpret_response() {
        assert!(interpret_response("x", json!({ "id": 7 })).is_ok());
        assert!(interpret_response("x", json!("done")).is_ok());
        assert!(interpret_response("x", json!({ "success": true })).is_ok());
        match interpret_response("x", json!({ "success": false, "error": "bad input" })) {
            Err(TransportError::Rejected { reason, .. }) => assert_eq!(reason, "bad input"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_primary_success_never_touches_fallback() {
        let primary = CountingChannel::new("rpc", Behaviour::Ok);
        let fallback = CountingChannel::new("direct", Behaviour::Ok);
        let t = transport(primary.clone(), fallback.clone());

        let out = t.call("create", &ArgumentMap::new()).await.unwrap();
        assert_eq!(out["via"], json!("rpc"));
        assert_eq!(fallback.calls(), 0);
        assert!(!t.is_sticky());
    }

    #[tokio::test]
    async fn test_fallback_is_sticky_after_success() {
        let primary = CountingChannel::new("rpc", Behaviour::Fail);
        let fallback = CountingChannel::new("direct", Behaviour::Ok);
        let t = transport(primary.clone(), fallback.clone());

        let out = t.call("create", &ArgumentMap::new()).await.unwrap();
        assert_eq!(out["via"], json!("direct"));
        assert!(t.is_sticky());
        assert_eq!(primary.calls(), 1);

        for _ in 0..3 {
            t.call("create", &ArgumentMap::new()).await.unwrap();
        }
        assert_eq!(primary.calls(), 1);
        assert_eq!(fallback.calls(), 4);
    }

    #[tokio::test]
    async fn test_primary_timeout_falls_back() {
        let primary = CountingChannel::new("rpc", Behaviour::Hang);
        let fallback = CountingChannel::new("direct", Behaviour::Ok);
        let t = transport(primary, fallback.clone());

        let out = t.call("create", &ArgumentMap::new()).await.unwrap();
        assert_eq!(out["via"], json!("direct"));
        assert!(t.is_sticky());
    }

    #[tokio::test]
    async fn test_primary_rejection_falls_back() {
        let primary = CountingChannel::new("rpc", Behaviour::Refuse);
        let fallback = CountingChannel::new("direct", Behaviour::Ok);
        let t = transport(primary, fallback.clone());

        t.call("create", &ArgumentMap::new()).await.unwrap();
        assert_eq!(fallback.calls(), 1);
    }

    #[tokio::test]
    async fn test_both_failing_is_not_sticky() {
        let primary = CountingChannel::new("rpc", Behaviour::Fail);
        let fallback = CountingChannel::new("direct", Behaviour::Fail);
        let t = transport(primary.clone(), fallback);

        assert!(t.call("create", &ArgumentMap::new()).await.is_err());
        assert!(!t.is_sticky());

        t.call("create", &ArgumentMap::new()).await.unwrap_err();
        assert_eq!(primary.calls(), 2);
    }

    #[tokio::test]
    async fn test_fallback_rejection_surfaces() {
        let primary = CountingChannel::new("rpc", Behaviour::Fail);
        let fallback = CountingChannel::new("direct", Behaviour::Refuse);
        let t = transport(primary, fallback);

        match t.call("create", &ArgumentMap::new()).await {
            Err(TransportError::Rejected { channel, .. }) => assert_eq!(channel, "direct"),
            other => panic!("unexpected {:?}", other),
        }
    }
}
