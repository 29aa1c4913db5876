//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use jsonrpc_bind::prelude::*;
use jsonrpc_bind::{DispatchObserver, NotificationFailure};
use serde_json::{Value, json};

/// Records notification failures instead of logging them.
#[derive(Debug, Default, Clone)]
pub struct RecordingObserver {
    pub failures: Arc<Mutex<Vec<(String, i64)>>>,
}

impl RecordingObserver {
    pub fn failures(&self) -> Vec<(String, i64)> {
        self.failures.lock().unwrap().clone()
    }
}

impl DispatchObserver for RecordingObserver {
    fn notification_failed(&self, failure: &NotificationFailure<'_>) {
        self.failures
            .lock()
            .unwrap()
            .push((failure.method.to_string(), failure.error.code));
    }
}

/// Echo of the bound argument list, so tests can see exactly what was bound.
pub fn echo() -> impl MethodHandler + 'static {
    handler_fn(|args: BoundArguments, _ctx: CallContext| async move {
        Ok::<_, MethodError>(Value::Array(args.into_values()))
    })
}

pub fn calculator() -> JsonRpcDispatcher {
    calculator_with(JsonRpcDispatcher::builder())
}

pub fn calculator_with(builder: jsonrpc_bind::DispatcherBuilder) -> JsonRpcDispatcher {
    builder
        .method(
            MethodTarget::builder("add")
                .param("a", ParamType::I64)
                .param("b", ParamType::I64),
            handler_fn(|args: BoundArguments, _ctx: CallContext| async move {
                Ok::<_, MethodError>(args.arg::<i64>(0)? + args.arg::<i64>(1)?)
            }),
        )
        .method(
            MethodTarget::builder("subtract")
                .param("minuend", ParamType::I64)
                .param("subtrahend", ParamType::I64),
            handler_fn(|args: BoundArguments, _ctx: CallContext| async move {
                Ok::<_, MethodError>(args.arg::<i64>(0)? - args.arg::<i64>(1)?)
            }),
        )
        .method(
            MethodTarget::builder("echo3")
                .param("a", ParamType::I64)
                .param("b", ParamType::I64)
                .optional("c", ParamType::I64, json!(0)),
            echo(),
        )
        .method(
            MethodTarget::builder("stripped")
                .param("a", ParamType::I64)
                .param("b", ParamType::I64)
                .strip_names(),
            echo(),
        )
        .method(
            MethodTarget::builder("sleep").param("millis", ParamType::U64),
            handler_fn(|args: BoundArguments, _ctx: CallContext| async move {
                let millis: u64 = args.arg(0)?;
                tokio::time::sleep(Duration::from_millis(millis)).await;
                Ok::<_, MethodError>(millis)
            }),
        )
        .method(
            MethodTarget::builder("fail"),
            handler_fn(|_args: BoundArguments, _ctx: CallContext| async move {
                Err::<Value, _>(MethodError::internal("storage unavailable"))
            }),
        )
        .method(MethodTarget::builder("note").param("text", ParamType::String), echo())
        .build()
        .expect("calculator declarations are valid")
}

/// Dispatch `payload` and parse the response text, panicking when there is none.
pub async fn call(dispatcher: &JsonRpcDispatcher, payload: Value) -> Value {
    let text = dispatcher
        .handle_str(&payload.to_string())
        .await
        .expect("expected a response");
    serde_json::from_str(&text).expect("response is valid JSON")
}

pub async fn call_raw(dispatcher: &JsonRpcDispatcher, payload: &str) -> Option<Value> {
    dispatcher
        .handle_str(payload)
        .await
        .map(|text| serde_json::from_str(&text).expect("response is valid JSON"))
}
