//! vimview-invoke: Remote invocation abstraction
//!
//! Provides the object identity and wire value types shared with the
//! management service, the `RemoteInvoker` trait every transport implements,
//! and an HTTP gateway implementation.

pub mod error;
pub mod http;
pub mod identity;
pub mod traits;
pub mod value;

pub use error::InvokeError;
pub use http::HttpInvoker;
pub use identity::ObjectIdentity;
pub use traits::{Arguments, RemoteInvoker};
pub use value::{DataObject, WireValue};
