//! Core types for the `knit` library.
#![forbid(unsafe_code)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::must_use_candidate)]

pub mod erased;
pub mod error;
pub mod token;
pub mod trace;

pub use erased::Erased;
pub use error::{Error, Result};
pub use token::{RawToken, Scope, Token, TypeKey};
pub use trace::{Frame, Trace};
