//! Demo service exposed by the `framerpc` binary.

use framerpc_protocol::PayloadCodec;
use framerpc_server::{MethodResult, Methods, Service};
use serde::{Deserialize, Serialize};

/// Integer arithmetic, reachable as `Arithmetic.<Method>`.
pub struct Arithmetic;

#[derive(Debug, Deserialize)]
pub struct AddArgs {
    pub a: i64,
    pub b: i64,
}

#[derive(Debug, Default, Serialize)]
pub struct AddReply {
    pub result: i64,
}

impl Arithmetic {
    /// `Arithmetic.Add`: `{"a":3,"b":4}` -> `{"result":7}`.
    pub fn add(&self, args: AddArgs, reply: &mut AddReply) -> MethodResult {
        reply.result = args
            .a
            .checked_add(args.b)
            .ok_or_else(|| format!("{} + {} overflows", args.a, args.b))?;
        Ok(())
    }
}

impl Service for Arithmetic {
    fn register_methods<C: PayloadCodec>(methods: &mut Methods<'_, Self, C>) {
        methods.method("Add", Self::add);
    }
}
