//! Method registry.
//!
//! A receiver becomes callable by implementing [`Service`] and listing its RPC
//! methods in [`Service::register_methods`]. Every listed method must have the
//! shape
//!
//! ```text
//! fn(&self, args: A, reply: &mut R) -> MethodResult
//! ```
//!
//! with `A: DeserializeOwned` and `R: Default + Serialize`. The shape is checked
//! by the compiler when the method is listed; methods that are not listed are
//! not reachable over the wire.
//!
//! Each method is stored under `"<Service>.<Method>"` together with a closure
//! that knows the concrete argument and reply types, so the connection handler
//! can decode parameters without knowing them.
//!
//! # Example
//!
//! ```
//! use framerpc_protocol::JsonCodec;
//! use framerpc_server::{MethodResult, Methods, Registry, Service};
//! use serde::{Deserialize, Serialize};
//!
//! struct Arithmetic;
//!
//! #[derive(Deserialize)]
//! struct AddArgs { a: i64, b: i64 }
//!
//! #[derive(Default, Serialize)]
//! struct AddReply { result: i64 }
//!
//! impl Arithmetic {
//!     fn add(&self, args: AddArgs, reply: &mut AddReply) -> MethodResult {
//!         reply.result = args.a + args.b;
//!         Ok(())
//!     }
//! }
//!
//! impl Service for Arithmetic {
//!     fn register_methods<C: framerpc_protocol::PayloadCodec>(methods: &mut Methods<'_, Self, C>) {
//!         methods.method("Add", Self::add);
//!     }
//! }
//!
//! let mut registry = Registry::<JsonCodec>::new();
//! registry.register(Arithmetic).unwrap();
//! assert!(registry.contains("Arithmetic.Add"));
//! ```

use crate::error::{MethodError, RegistryError, ServerError};
use framerpc_protocol::PayloadCodec;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

/// Status returned by RPC methods.
pub type MethodResult = Result<(), MethodError>;

type Invoker<C> = Box<dyn Fn(&C, &[u8]) -> Result<Vec<u8>, ServerError> + Send + Sync>;

/// A receiver whose methods can be called remotely.
pub trait Service: Send + Sync + Sized + 'static {
    /// Prefix of this service's qualified method names.
    ///
    /// Defaults to the type's own name without module path or generics.
    fn service_name() -> String {
        short_type_name::<Self>().to_string()
    }

    /// Lists the methods exposed by this service.
    fn register_methods<C: PayloadCodec>(methods: &mut Methods<'_, Self, C>);
}

/// Returns the last path segment of `T`'s name, generics stripped.
fn short_type_name<T: ?Sized>() -> &'static str {
    let full = std::any::type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

fn is_valid_name(name: &str) -> bool {
    !name.is_empty() && !name.contains('.') && !name.chars().any(char::is_whitespace)
}

/// A registered method: qualified name, argument and reply shapes, and the
/// bound invocation.
pub struct MethodDescriptor<C> {
    name: String,
    argument_type: &'static str,
    reply_type: &'static str,
    invoker: Invoker<C>,
}

impl<C: PayloadCodec> MethodDescriptor<C> {
    /// Qualified name, `"<Service>.<Method>"`.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Rust type name of the argument.
    pub fn argument_type(&self) -> &'static str {
        self.argument_type
    }

    /// Rust type name of the reply.
    pub fn reply_type(&self) -> &'static str {
        self.reply_type
    }

    /// Decodes `params` into a fresh argument, calls the method with a fresh
    /// default reply and returns the encoded reply.
    ///
    /// A failure reported by the method is returned as
    /// [`ServerError::MethodInvocation`] and nothing is encoded.
    pub fn invoke(&self, codec: &C, params: &[u8]) -> Result<Vec<u8>, ServerError> {
        (self.invoker)(codec, params)
    }
}

impl<C> std::fmt::Debug for MethodDescriptor<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MethodDescriptor")
            .field("name", &self.name)
            .field("argument_type", &self.argument_type)
            .field("reply_type", &self.reply_type)
            .finish()
    }
}

/// Builder handed to [`Service::register_methods`].
pub struct Methods<'a, S, C> {
    service_name: &'a str,
    receiver: Arc<S>,
    entries: Vec<MethodDescriptor<C>>,
    invalid: Vec<String>,
}

impl<'a, S, C> Methods<'a, S, C>
where
    S: Service,
    C: PayloadCodec,
{
    fn new(service_name: &'a str, receiver: Arc<S>) -> Self {
        Self {
            service_name,
            receiver,
            entries: Vec::new(),
            invalid: Vec::new(),
        }
    }

    /// Exposes `f` under `"<Service>.<name>"`.
    pub fn method<A, R, F>(&mut self, name: &str, f: F) -> &mut Self
    where
        A: DeserializeOwned + 'static,
        R: Default + Serialize + 'static,
        F: Fn(&S, A, &mut R) -> MethodResult + Send + Sync + 'static,
    {
        if !is_valid_name(name) {
            self.invalid.push(name.to_string());
            return self;
        }

        let qualified = format!("{}.{}", self.service_name, name);
        let receiver = Arc::clone(&self.receiver);
        let method = qualified.clone();

        let invoker: Invoker<C> = Box::new(move |codec: &C, params: &[u8]| {
            let args: A = codec
                .decode(params)
                .map_err(|source| ServerError::ArgumentDecode {
                    method: method.clone(),
                    source,
                })?;

            let mut reply = R::default();
            f(receiver.as_ref(), args, &mut reply).map_err(|source| {
                ServerError::MethodInvocation {
                    method: method.clone(),
                    source,
                }
            })?;

            codec
                .encode(&reply)
                .map_err(|source| ServerError::ReplyEncode {
                    method: method.clone(),
                    source,
                })
        });

        self.entries.push(MethodDescriptor {
            name: qualified,
            argument_type: std::any::type_name::<A>(),
            reply_type: std::any::type_name::<R>(),
            invoker,
        });
        self
    }
}

/// Registry mapping qualified method names to descriptors.
///
/// Filled before the server starts and shared read-only afterwards.
pub struct Registry<C> {
    methods: HashMap<String, MethodDescriptor<C>>,
}

impl<C: PayloadCodec> Registry<C> {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            methods: HashMap::new(),
        }
    }

    /// Registers every method `service` lists.
    ///
    /// Returns the number of methods registered. Nothing is registered when an
    /// error is returned. A method already present under the same qualified
    /// name is replaced.
    pub fn register<S: Service>(&mut self, service: S) -> Result<usize, RegistryError> {
        self.register_arc(Arc::new(service))
    }

    /// Like [`Registry::register`] for a receiver that is shared elsewhere.
    pub fn register_arc<S: Service>(&mut self, service: Arc<S>) -> Result<usize, RegistryError> {
        let service_name = S::service_name();
        if !is_valid_name(&service_name) {
            return Err(RegistryError::InvalidServiceName(service_name));
        }

        let mut methods = Methods::new(&service_name, service);
        S::register_methods(&mut methods);

        if let Some(method) = methods.invalid.into_iter().next() {
            return Err(RegistryError::InvalidMethodName {
                service: service_name.clone(),
                method,
            });
        }
        if methods.entries.is_empty() {
            return Err(RegistryError::NoMethods(service_name.clone()));
        }

        let count = methods.entries.len();
        for descriptor in methods.entries {
            tracing::debug!(
                "Registered {} ({} -> {})",
                descriptor.name,
                descriptor.argument_type,
                descriptor.reply_type
            );
            if let Some(previous) = self.methods.insert(descriptor.name.clone(), descriptor) {
                tracing::warn!("Method {} registered twice, replacing", previous.name);
            }
        }

        Ok(count)
    }

    /// Looks up a method by qualified name.
    pub fn resolve(&self, name: &str) -> Option<&MethodDescriptor<C>> {
        self.methods.get(name)
    }

    /// Returns whether a method is registered under `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.methods.contains_key(name)
    }

    /// Returns the number of registered methods.
    pub fn len(&self) -> usize {
        self.methods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }

    /// Returns all qualified method names, sorted.
    pub fn method_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.methods.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl<C: PayloadCodec> Default for Registry<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> std::fmt::Debug for Registry<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("methods", &self.methods.len())
            .finish()
    }
}
