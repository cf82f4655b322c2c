//! mcpmath Function Library
//!
//! Describes callable functions and ships the built-in math catalog.
//!
//! # Architecture
//!
//! - [`FunctionDescriptor`]: immutable metadata (name, domain, category,
//!   ordered parameter schema, cost class) plus an invocation handle
//! - [`Arguments`]: arguments bound against a descriptor's schema, in
//!   declaration order with defaults filled in
//! - [`InvocationContext`]: deadline, cancellation flag and optional progress
//!   sink handed to every invocation
//! - [`Catalog`]: ordered collection with unique names
//! - [`library`]: the built-in `arithmetic`, `number_theory` and
//!   `trigonometry` domains
//!
//! Functions are synchronous. The server runs them on the blocking pool and
//! expects long-running ones to call [`InvocationContext::checkpoint`] so a
//! timed-out call stops early.
//!
//! # Example
//!
//! ```
//! use mcpmath_functions::{Catalog, FunctionDescriptor, InvocationContext, ParamKind};
//! use serde_json::json;
//!
//! let double = FunctionDescriptor::builder("double", "arithmetic")
//!     .category("basic_operations")
//!     .param("x", ParamKind::Number)
//!     .handler(|args, _ctx| Ok(json!(args.number("x")? * 2.0)))
//!     .build();
//!
//! let catalog = Catalog::from_descriptors([double]).unwrap();
//! let function = catalog.get("double").unwrap();
//!
//! let args = function.bind(json!({"x": 4}).as_object().unwrap()).unwrap();
//! let value = function.invoke(&args, &InvocationContext::new()).unwrap();
//! assert_eq!(value, json!(8.0));
//! ```

pub mod catalog;
pub mod context;
pub mod descriptor;
pub mod error;
pub mod library;

pub use catalog::{Catalog, CatalogError};
pub use context::{CancelHandle, InvocationContext, ProgressSink, ProgressUpdate};
pub use descriptor::{
    Arguments, CostClass, DescriptorBuilder, FunctionDescriptor, Invocable, ParamKind, ParamSpec,
};
pub use error::{ArgumentError, FunctionError};
