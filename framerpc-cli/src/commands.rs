//! Command execution.

use crate::Commands;
use colored::Colorize;
use framerpc_client::{Client, ClientError};
use framerpc_protocol::Envelope;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Instant;

#[derive(Serialize)]
struct AddArgs {
    a: i64,
    b: i64,
}

#[derive(Deserialize)]
struct AddReply {
    result: i64,
}

/// Executes a command and returns the formatted output.
pub async fn execute(client: &Client, cmd: Commands) -> Result<String, Box<dyn std::error::Error>> {
    match cmd {
        Commands::Call {
            method,
            params,
            count,
        } => {
            validate_method(&method)?;
            let params = parse_json_arg(&params)?;

            if count <= 1 {
                let reply: Value = client.call(&method, &params).await.map_err(explain)?;
                return Ok(format_json(&reply));
            }

            let start = Instant::now();
            let mut last = Value::Null;
            for _ in 0..count {
                last = client.call(&method, &params).await.map_err(explain)?;
            }
            let elapsed = start.elapsed();

            Ok(format!(
                "{}\n{} {} calls in {:.2?} ({:.0} calls/s)",
                format_json(&last),
                "Completed".green(),
                count,
                elapsed,
                count as f64 / elapsed.as_secs_f64().max(f64::EPSILON)
            ))
        }

        Commands::Add { a, b } => {
            let reply: AddReply = client
                .call("Arithmetic.Add", &AddArgs { a, b })
                .await
                .map_err(explain)?;
            Ok(format!("{} + {} = {}", a, b, reply.result.to_string().cyan()))
        }
    }
}

/// Checks that `method` has the `Service.Method` shape before sending it.
fn validate_method(method: &str) -> Result<(), Box<dyn std::error::Error>> {
    let envelope = Envelope::new(method, Vec::<u8>::new());
    match envelope.split_method() {
        Some(_) => Ok(()),
        None => Err(format!("method must look like Service.Method, got {:?}", method).into()),
    }
}

/// Adds a hint to timeouts, which is how failed calls surface.
fn explain(err: ClientError) -> Box<dyn std::error::Error> {
    match err {
        ClientError::Timeout => format!(
            "{} (no reply: unknown method, bad parameters or the method failed)",
            err
        )
        .into(),
        other => other.into(),
    }
}

/// Parses a JSON argument (or `@path` to read from file).
fn parse_json_arg(arg: &str) -> Result<Value, Box<dyn std::error::Error>> {
    if let Some(path) = arg.strip_prefix('@') {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    } else {
        Ok(serde_json::from_str(arg)?)
    }
}

/// Formats JSON for display.
fn format_json(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}
