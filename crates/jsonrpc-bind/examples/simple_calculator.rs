//! Simple Calculator JSON-RPC Example
//!
//! Registers a few calculator methods (an overloaded `add`, a `divide` with a
//! domain error and an optional parameter, a variadic `sum`) and feeds raw
//! payloads through the dispatcher.
//!
//! Run with `RUST_LOG=debug` to see dispatch tracing.

use jsonrpc_bind::prelude::*;
use serde_json::json;
use thiserror::Error;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Error)]
enum CalculatorError {
    #[error("division by zero")]
    DivisionByZero,
}

impl ToJsonRpcError for CalculatorError {
    fn to_error_object(&self) -> JsonRpcErrorObject {
        match self {
            CalculatorError::DivisionByZero => {
                JsonRpcErrorObject::server_error(-32000, &self.to_string(), None)
            }
        }
    }
}

fn build_dispatcher() -> anyhow::Result<JsonRpcDispatcher> {
    let dispatcher = JsonRpcDispatcher::builder()
        .method(
            MethodTarget::builder("add")
                .param("a", ParamType::I64)
                .param("b", ParamType::I64),
            handler_fn(|args: BoundArguments, _ctx: CallContext| async move {
                Ok::<_, MethodError>(json!(args.arg::<i64>(0)? + args.arg::<i64>(1)?))
            }),
        )
        // Tried only when the integer overload does not bind.
        .method(
            MethodTarget::builder("add")
                .param("a", ParamType::String)
                .param("b", ParamType::String),
            handler_fn(|args: BoundArguments, _ctx: CallContext| async move {
                let joined = args.arg::<String>(0)? + &args.arg::<String>(1)?;
                Ok::<_, MethodError>(json!(joined))
            }),
        )
        .method(
            MethodTarget::builder("divide")
                .param("dividend", ParamType::F64)
                .param("divisor", ParamType::F64)
                .optional("round", ParamType::Bool, json!(false)),
            handler_fn(|args: BoundArguments, _ctx: CallContext| async move {
                let divisor: f64 = args.arg(1)?;
                if divisor == 0.0 {
                    return Err(MethodError::domain(CalculatorError::DivisionByZero));
                }
                let quotient = args.arg::<f64>(0)? / divisor;
                Ok(if args.arg::<bool>(2)? { quotient.round() } else { quotient })
            }),
        )
        .method(
            MethodTarget::builder("sum").variadic(ParameterSpec::required("values", ParamType::F64)),
            handler_fn(|args: BoundArguments, _ctx: CallContext| async move {
                Ok::<_, MethodError>(args.arg::<Vec<f64>>(0)?.iter().sum::<f64>())
            }),
        )
        // Registered without parameter names: positional calls only.
        .method(
            MethodTarget::builder("subtract")
                .param("a", ParamType::F64)
                .param("b", ParamType::F64)
                .strip_names(),
            handler_fn(|args: BoundArguments, _ctx: CallContext| async move {
                Ok::<_, MethodError>(args.arg::<f64>(0)? - args.arg::<f64>(1)?)
            }),
        )
        .build()?;
    Ok(dispatcher)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let dispatcher = build_dispatcher()?;
    info!(methods = ?dispatcher.registered_methods(), "calculator ready");

    let payloads = [
        r#"{"jsonrpc": "2.0", "method": "add", "params": {"a": 5, "b": 3}, "id": 1}"#,
        r#"{"jsonrpc": "2.0", "method": "add", "params": ["foo", "bar"], "id": 2}"#,
        r#"{"jsonrpc": "2.0", "method": "divide", "params": [7, 2, true], "id": 3}"#,
        r#"{"jsonrpc": "2.0", "method": "divide", "params": {"dividend": 1, "divisor": 0}, "id": 4}"#,
        r#"{"jsonrpc": "2.0", "method": "sum", "params": [1, 2, 3.5], "id": 5}"#,
        r#"{"jsonrpc": "2.0", "method": "subtract", "params": [10, 4], "id": 6}"#,
        r#"{"jsonrpc": "2.0", "method": "subtract", "params": {"a": 10, "b": 4}, "id": 7}"#,
        r#"{"jsonrpc": "2.0", "method": "multiply", "params": [2, 3], "id": 8}"#,
        r#"[{"jsonrpc": "2.0", "method": "sum", "params": [1]}, {"jsonrpc": "2.0", "method": "add", "params": [1, 1], "id": 9}]"#,
        r#"{"jsonrpc": "2.0", "method": "add", "params": [1, 2]"#,
    ];

    for payload in payloads {
        println!("--> {}", payload);
        match dispatcher.handle_str(payload).await {
            Some(reply) => println!("<-- {}\n", reply),
            None => println!("<-- (no response)\n"),
        }
    }

    let caller = RequestBuilder::default();
    let divide = dispatcher
        .overloads("divide")
        .into_iter()
        .next()
        .ok_or_else(|| anyhow::anyhow!("divide is not registered"))?;
    let request = caller.request(&divide, vec![json!(9), json!(3)])?;
    let text = serde_json::to_string(&request)?;
    println!("--> {}", text);
    if let Some(reply) = dispatcher.handle_str(&text).await {
        let quotient: f64 = jsonrpc_bind::codec::decode_response(&reply)?
            .into_result()
            .map_err(|e| anyhow::anyhow!("call failed: {}", e))?;
        println!("<-- {} (decoded {})", reply, quotient);
    }

    Ok(())
}
