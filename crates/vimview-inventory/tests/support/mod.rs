//! Scripted invoker shared by the integration tests
#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;

use vimview_invoke::{Arguments, DataObject, InvokeError, ObjectIdentity, RemoteInvoker, WireValue};
use vimview_inventory::query::{DynamicProperty, ObjectContent};
use vimview_inventory::{InventoryClient, PropertyFilterSpec};

pub const RETRIEVE_PROPERTIES: &str = "RetrieveProperties";

/// One recorded invocation
#[derive(Debug, Clone)]
pub struct Call {
    pub operation: String,
    pub target: ObjectIdentity,
    pub arguments: Arguments,
}

impl Call {
    /// Decode the filter spec of a `RetrieveProperties` call
    pub fn filter_spec(&self) -> PropertyFilterSpec {
        let spec = self.arguments["specSet"][0].clone();
        serde_json::from_value(spec).unwrap()
    }
}

/// Invoker answering from per-operation scripts
///
/// Queued responses are consumed first; afterwards the operation's sticky
/// response (if any) is returned on every call.
#[derive(Default)]
pub struct ScriptedInvoker {
    calls: Mutex<Vec<Call>>,
    queued: Mutex<HashMap<String, VecDeque<Result<Value, InvokeError>>>>,
    sticky: Mutex<HashMap<String, Value>>,
}

impl ScriptedInvoker {
    /// Invoker that already answers the login handshake
    pub fn logged_in() -> Arc<Self> {
        let invoker = Self::default();
        invoker.always("RetrieveServiceContent", wire(service_content()));
        invoker.always("Login", Value::Null);
        Arc::new(invoker)
    }

    /// Answer every call to `operation` with `response`
    pub fn always(&self, operation: &str, response: Value) {
        self.sticky
            .lock()
            .unwrap()
            .insert(operation.to_string(), response);
    }

    /// Answer the next call to `operation` with `response`
    pub fn push(&self, operation: &str, response: Result<Value, InvokeError>) {
        self.queued
            .lock()
            .unwrap()
            .entry(operation.to_string())
            .or_default()
            .push_back(response);
    }

    /// Answer the next `RetrieveProperties` call with these rows
    pub fn push_rows(&self, rows: Vec<ObjectContent>) {
        self.push(RETRIEVE_PROPERTIES, Ok(serde_json::to_value(rows).unwrap()));
    }

    /// Every call so far, in order
    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    /// Calls made to one operation
    pub fn calls_to(&self, operation: &str) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|c| c.operation == operation)
            .collect()
    }

    /// Forget recorded calls
    pub fn reset_calls(&self) {
        self.calls.lock().unwrap().clear();
    }
}

#[async_trait]
impl RemoteInvoker for ScriptedInvoker {
    async fn invoke(
        &self,
        operation: &str,
        target: &ObjectIdentity,
        arguments: Arguments,
    ) -> Result<Value, InvokeError> {
        self.calls.lock().unwrap().push(Call {
            operation: operation.to_string(),
            target: target.clone(),
            arguments,
        });

        if let Some(response) = self
            .queued
            .lock()
            .unwrap()
            .get_mut(operation)
            .and_then(VecDeque::pop_front)
        {
            return response;
        }
        self.sticky
            .lock()
            .unwrap()
            .get(operation)
            .cloned()
            .ok_or_else(|| InvokeError::Fault {
                name: "MethodNotFound".to_string(),
                message: format!("no scripted response for {operation}"),
            })
    }

    fn invoker_type(&self) -> &'static str {
        "scripted"
    }
}

pub fn root_folder() -> ObjectIdentity {
    ObjectIdentity::new("Folder", "group-d1")
}

pub fn session_manager() -> ObjectIdentity {
    ObjectIdentity::new("SessionManager", "SessionManager")
}

pub fn service_content() -> WireValue {
    DataObject::new("ServiceContent")
        .with_field("rootFolder", root_folder())
        .with_field("propertyCollector", ObjectIdentity::new("PropertyCollector", "propertyCollector"))
        .with_field("sessionManager", session_manager())
        .with_field("taskManager", ObjectIdentity::new("TaskManager", "TaskManager"))
        .into()
}

pub fn wire(value: impl Into<WireValue>) -> Value {
    serde_json::to_value(value.into()).unwrap()
}

pub fn row(obj: ObjectIdentity, props: Vec<(&str, WireValue)>) -> ObjectContent {
    ObjectContent {
        obj,
        prop_set: props
            .into_iter()
            .map(|(name, val)| DynamicProperty {
                name: name.to_string(),
                val,
            })
            .collect(),
    }
}

pub fn task_row(task: &ObjectIdentity, info: DataObject) -> ObjectContent {
    row(task.clone(), vec![("info", info.into())])
}

pub fn task_info(state: &str) -> DataObject {
    DataObject::new("TaskInfo").with_field("state", state)
}

/// Log in through `invoker` and forget the handshake calls
pub async fn login(invoker: &Arc<ScriptedInvoker>) -> InventoryClient {
    let client = InventoryClient::login_with(invoker.clone(), "root", "secret")
        .await
        .unwrap();
    invoker.reset_calls();
    client
}
