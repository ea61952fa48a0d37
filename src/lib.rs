//! Dependency injection through a cycle-checked object-graph resolver.
//!
//! Types describe how they are built by implementing [`Injectable`]; an [`Injector`]
//! maps [`Token`]s to [`Provider`]s and wires instances together on request.
//!
//! ```
//! use std::sync::Arc;
//!
//! use knit::{Constructor, Injectable, Injector};
//!
//! struct Config {
//!     url: &'static str,
//! }
//!
//! struct Database {
//!     config: Arc<Config>,
//! }
//!
//! impl Injectable for Database {
//!     fn constructors() -> Vec<Constructor<Self>> {
//!         vec![Constructor::from_fn(|config: Arc<Config>| Database { config })]
//!     }
//! }
//!
//! # fn main() -> knit::Result<()> {
//! let injector = Injector::new();
//! injector.for_type::<Config>().to_value(Config { url: "postgres://localhost" });
//! injector.for_type::<Database>().to_singleton();
//!
//! let db = injector.inject::<Database>()?;
//! assert_eq!(db.config.url, "postgres://localhost");
//! assert!(Arc::ptr_eq(&db, &injector.inject::<Database>()?));
//! # Ok(())
//! # }
//! ```
#![forbid(unsafe_code)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::must_use_candidate)]

#[macro_use]
pub(crate) mod macros;

pub mod blueprint;
pub mod context;
pub mod injector;
pub mod provider;
pub mod registry;
pub mod resolver;

#[doc(inline)]
pub use knit_core::{Erased, Error, RawToken, Result, Token, Trace, TypeKey, error::BoxError};

pub use blueprint::{Companion, Constructor, Field, Injectable, Param, Qualified};
pub use context::ResolutionContext;
pub use injector::{Binding, Injector, InjectorBuilder};
pub use provider::Provider;
pub use registry::Registry;
pub use resolver::Resolver;
