//! Ambient per-call tracking context.

use std::{collections::HashMap, future::Future};

use crate::RequestHeader;

tokio::task_local! {
    static CURRENT: CallContext;
}

/// Tracking values of the call being handled (or about to be issued).
///
/// On the server side this is built from the received [`RequestHeader`] and
/// handed to the handler; any call the handler makes downstream derives its own
/// header from it, so the request id is reused and the sequence grows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallContext {
    request_id: Option<String>,
    sequence: Option<String>,
    meta: HashMap<String, String>,
}

impl CallContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    pub fn with_sequence(mut self, sequence: impl Into<String>) -> Self {
        self.sequence = Some(sequence.into());
        self
    }

    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.meta.insert(key.into(), value.into());
        self
    }

    pub fn request_id(&self) -> Option<&str> {
        self.request_id.as_deref()
    }

    pub fn sequence(&self) -> Option<&str> {
        self.sequence.as_deref()
    }

    pub fn meta(&self) -> &HashMap<String, String> {
        &self.meta
    }

    /// Insert `entries`, overwriting existing keys.
    pub fn merge_meta<I, K, V>(&mut self, entries: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.meta
            .extend(entries.into_iter().map(|(k, v)| (k.into(), v.into())));
    }

    /// The context installed by the enclosing [`CallContext::scope`], if any.
    pub fn current() -> Option<CallContext> {
        CURRENT.try_with(Clone::clone).ok()
    }

    /// Run `fut` with `self` as the ambient context.
    pub async fn scope<F: Future>(self, fut: F) -> F::Output {
        CURRENT.scope(self, fut).await
    }
}

impl From<RequestHeader> for CallContext {
    fn from(header: RequestHeader) -> Self {
        Self {
            request_id: Some(header.request_id),
            sequence: Some(header.seq),
            meta: header.meta,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scope_exposes_context() {
        assert!(CallContext::current().is_none());

        let ctx = CallContext::new().with_request_id("req").with_sequence("1");
        let seen = ctx
            .clone()
            .scope(async { CallContext::current() })
            .await;
        assert_eq!(seen, Some(ctx));
        assert!(CallContext::current().is_none());
    }

    #[test]
    fn test_merge_overwrites() {
        let mut ctx = CallContext::new().with_meta("clientA", "ping");
        ctx.merge_meta([("clientA", "add"), ("clientB", "add")]);
        assert_eq!(ctx.meta().get("clientA").map(String::as_str), Some("add"));
        assert_eq!(ctx.meta().len(), 2);
    }

    #[test]
    fn test_from_header() {
        let header = RequestHeader {
            request_id: "req".to_string(),
            seq: "1.2".to_string(),
            meta: HashMap::from([("k".to_string(), "v".to_string())]),
        };
        let ctx = CallContext::from(header);
        assert_eq!(ctx.request_id(), Some("req"));
        assert_eq!(ctx.sequence(), Some("1.2"));
        assert_eq!(ctx.meta().get("k").map(String::as_str), Some("v"));
    }
}
