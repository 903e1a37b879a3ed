mod support;

use std::time::Duration;

use pretty_assertions::assert_eq;
use serde_json::json;

use support::{RETRIEVE_PROPERTIES, ScriptedInvoker, login, row, task_info, task_row, wire};
use vimview_invoke::{DataObject, ObjectIdentity, WireValue};
use vimview_inventory::{
    CancelReason, CancelToken, Datacenter, Datastore, FaultInfo, InventoryError, TaskOutcome,
    TaskWaiter,
};

fn task() -> ObjectIdentity {
    ObjectIdentity::new("Task", "task-301")
}

fn fast() -> TaskWaiter {
    TaskWaiter::new().with_poll_interval(Duration::from_millis(1))
}

#[tokio::test]
async fn test_queued_running_success_polls_twice() {
    let invoker = ScriptedInvoker::logged_in();
    let client = login(&invoker).await.with_waiter(fast());

    invoker.push_rows(vec![task_row(&task(), task_info("queued"))]);
    invoker.push_rows(vec![task_row(
        &task(),
        task_info("running").with_field("progress", WireValue::Int(40)),
    )]);
    invoker.push_rows(vec![task_row(
        &task(),
        task_info("success").with_field("result", ObjectIdentity::new("VirtualMachine", "vm-77")),
    )]);

    let outcome = client.wait_for_task(task(), &CancelToken::new()).await.unwrap();

    assert_eq!(
        outcome,
        TaskOutcome::Success(ObjectIdentity::new("VirtualMachine", "vm-77").into())
    );
    // initial sync plus two polls
    assert_eq!(invoker.calls_to(RETRIEVE_PROPERTIES).len(), 3);
}

#[tokio::test]
async fn test_queued_error_returns_fault_after_one_poll() {
    let invoker = ScriptedInvoker::logged_in();
    let client = login(&invoker).await.with_waiter(fast());

    let fault = DataObject::new("InvalidPowerState").with_field("requestedState", "poweredOn");
    let error = DataObject::new("LocalizedMethodFault")
        .with_field("fault", fault.clone())
        .with_field("localizedMessage", "The attempted operation cannot be performed in the current state.");

    invoker.push_rows(vec![task_row(&task(), task_info("queued"))]);
    invoker.push_rows(vec![task_row(&task(), task_info("error").with_field("error", error))]);

    let outcome = client.wait_for_task(task(), &CancelToken::new()).await.unwrap();

    let TaskOutcome::Failed(info) = outcome else {
        panic!("expected a failed outcome");
    };
    assert_eq!(info.fault_name, "InvalidPowerState");
    assert_eq!(info.detail, WireValue::Data(fault));
    assert_eq!(
        info.localized_message,
        "The attempted operation cannot be performed in the current state."
    );
    assert_eq!(invoker.calls_to(RETRIEVE_PROPERTIES).len(), 2);
}

#[tokio::test]
async fn test_error_without_fault_is_empty_failure() {
    let invoker = ScriptedInvoker::logged_in();
    let client = login(&invoker).await.with_waiter(fast());

    invoker.push_rows(vec![task_row(&task(), task_info("running"))]);
    invoker.push_rows(vec![task_row(&task(), task_info("error"))]);

    let outcome = client.wait_for_task(task(), &CancelToken::new()).await.unwrap();

    assert_eq!(outcome, TaskOutcome::Failed(FaultInfo::default()));
    assert_eq!(invoker.calls_to(RETRIEVE_PROPERTIES).len(), 2);
}

#[tokio::test]
async fn test_unrecognized_state_is_protocol_error() {
    let invoker = ScriptedInvoker::logged_in();
    let client = login(&invoker).await.with_waiter(fast());

    invoker.push_rows(vec![task_row(&task(), task_info("queued"))]);
    invoker.push_rows(vec![task_row(&task(), task_info("bogus"))]);

    let err = client
        .wait_for_task(task(), &CancelToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, InventoryError::Protocol(msg) if msg.contains("bogus")));
}

#[tokio::test]
async fn test_already_cancelled_does_not_poll() {
    let invoker = ScriptedInvoker::logged_in();
    let client = login(&invoker).await.with_waiter(fast());
    invoker.push_rows(vec![task_row(&task(), task_info("running"))]);

    let cancel = CancelToken::new();
    cancel.cancel();
    let outcome = client.wait_for_task(task(), &cancel).await.unwrap();

    assert_eq!(outcome, TaskOutcome::Cancelled(CancelReason::Aborted));
    assert_eq!(invoker.calls_to(RETRIEVE_PROPERTIES).len(), 1);
}

#[tokio::test]
async fn test_cancel_interrupts_sleep() {
    let invoker = ScriptedInvoker::logged_in();
    let client = login(&invoker)
        .await
        .with_waiter(TaskWaiter::new().with_poll_interval(Duration::from_secs(3600)));
    invoker.push_rows(vec![task_row(&task(), task_info("running"))]);

    let cancel = CancelToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        trigger.cancel();
    });

    let outcome = client.wait_for_task(task(), &cancel).await.unwrap();
    assert_eq!(outcome, TaskOutcome::Cancelled(CancelReason::Aborted));
    assert_eq!(invoker.calls_to(RETRIEVE_PROPERTIES).len(), 1);
}

#[tokio::test]
async fn test_timeout() {
    let invoker = ScriptedInvoker::logged_in();
    let client = login(&invoker).await.with_waiter(
        TaskWaiter::new()
            .with_poll_interval(Duration::from_secs(3600))
            .with_timeout(Duration::from_millis(20)),
    );
    invoker.always(
        RETRIEVE_PROPERTIES,
        serde_json::to_value(vec![task_row(&task(), task_info("running"))]).unwrap(),
    );

    let outcome = client.wait_for_task(task(), &CancelToken::new()).await.unwrap();
    assert_eq!(outcome, TaskOutcome::Cancelled(CancelReason::TimedOut));
}

#[tokio::test]
async fn test_power_on_multi_vm() {
    let invoker = ScriptedInvoker::logged_in();
    let client = login(&invoker).await;

    let datacenter = ObjectIdentity::new("Datacenter", "datacenter-2");
    let vms = vec![
        ObjectIdentity::new("VirtualMachine", "vm-1"),
        ObjectIdentity::new("VirtualMachine", "vm-2"),
    ];

    invoker.push_rows(vec![row(datacenter.clone(), vec![("name", "dc1".into())])]);
    invoker.push("PowerOnMultiVM_Task", Ok(wire(task())));
    invoker.push_rows(vec![task_row(&task(), task_info("running"))]);
    invoker.push_rows(vec![task_row(&task(), task_info("success"))]);

    let dc: Datacenter = client
        .fetch_one(datacenter.clone())
        .await
        .unwrap()
        .downcast()
        .unwrap();
    let outcome = dc
        .power_on_multi_vm(&vms, &fast(), &CancelToken::new())
        .await
        .unwrap();

    assert!(outcome.is_success());
    let call = &invoker.calls_to("PowerOnMultiVM_Task")[0];
    assert_eq!(call.target, datacenter);
    assert_eq!(
        call.arguments["vm"],
        json!([
            {"type": "VirtualMachine", "value": "vm-1"},
            {"type": "VirtualMachine", "value": "vm-2"},
        ])
    );
}

#[tokio::test]
async fn test_datastore_refresh_resyncs() {
    let invoker = ScriptedInvoker::logged_in();
    let client = login(&invoker).await;

    let datastore = ObjectIdentity::new("Datastore", "datastore-11");
    let summary = |free: i64| {
        DataObject::new("DatastoreSummary")
            .with_field("capacity", WireValue::Int(1_000))
            .with_field("freeSpace", WireValue::Int(free))
    };
    invoker.push_rows(vec![row(datastore.clone(), vec![("summary", summary(600).into())])]);
    invoker.always("RefreshDatastore", serde_json::Value::Null);
    invoker.push_rows(vec![row(datastore.clone(), vec![("summary", summary(250).into())])]);

    let mut ds: Datastore = client
        .fetch_one(datastore)
        .await
        .unwrap()
        .downcast()
        .unwrap();
    assert_eq!(ds.free_space(), Some(600));

    ds.refresh().await.unwrap();

    assert_eq!(ds.capacity(), Some(1_000));
    assert_eq!(ds.free_space(), Some(250));
    let operations: Vec<String> = invoker.calls().into_iter().map(|c| c.operation).collect();
    assert_eq!(
        operations,
        vec![RETRIEVE_PROPERTIES, "RefreshDatastore", RETRIEVE_PROPERTIES]
    );
}
