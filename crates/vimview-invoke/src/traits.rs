//! Remote invoker trait

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::error::InvokeError;
use crate::identity::ObjectIdentity;

/// Named arguments of a remote operation
pub type Arguments = Map<String, Value>;

/// Transport-agnostic access to the management service
///
/// Implementations own connection setup, authentication cookies and
/// request framing. Callers only supply the operation name, the target
/// object and a flat argument mapping.
#[async_trait]
pub trait RemoteInvoker: Send + Sync {
    /// Invoke `operation` on `target`
    ///
    /// Returns the decoded response, or `Value::Null` for operations that
    /// return nothing.
    async fn invoke(
        &self,
        operation: &str,
        target: &ObjectIdentity,
        arguments: Arguments,
    ) -> Result<Value, InvokeError>;

    /// Short name of the transport, for logging
    fn invoker_type(&self) -> &'static str;
}
