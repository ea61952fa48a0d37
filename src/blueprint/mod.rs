//! Descriptions of how a type is built.
//!
//! The resolver never inspects types on its own. A buildable type hands out plain data
//! through [`Injectable`]: its constructor candidates, the fields populated after
//! construction, and the companion bindings it declares for its own subtree.

use knit_core::{Error, RawToken, Result, Token};

use crate::provider::Provider;

mod constructor;
pub use constructor::{Args, Constructor, ConstructorFn, TryConstructorFn};

mod dependency;
pub use dependency::{Dependency, Param, Qualified};

mod field;
pub use field::Field;

/// A type the resolver can build.
///
/// # Example
///
/// ```
/// use std::sync::{Arc, OnceLock};
///
/// use knit::{Constructor, Field, Injectable, Injector};
///
/// struct Clock;
///
/// struct Scheduler {
///     clock: OnceLock<Arc<Clock>>,
/// }
///
/// impl Injectable for Scheduler {
///     fn constructors() -> Vec<Constructor<Self>> {
///         vec![Constructor::from_fn(|| Scheduler { clock: OnceLock::new() })]
///     }
///
///     fn fields() -> Vec<Field<Self>> {
///         vec![Field::new("clock", |this: &Scheduler, clock: Arc<Clock>| {
///             let _ = this.clock.set(clock);
///         })]
///     }
/// }
///
/// let injector = Injector::new();
/// injector.for_type::<Clock>().to_value(Clock);
/// injector.provide::<Scheduler>();
///
/// let scheduler = injector.inject::<Scheduler>().unwrap();
/// assert!(scheduler.clock.get().is_some());
/// ```
pub trait Injectable: Send + Sync + Sized + 'static {
    /// The constructor candidates. See [`select_constructor`] for the selection policy.
    fn constructors() -> Vec<Constructor<Self>>;

    /// Fields populated after construction, in order.
    fn fields() -> Vec<Field<Self>> {
        Vec::new()
    }

    /// Bindings visible only while this type and its dependencies are being built.
    ///
    /// A type declaring companions also offers its own instance to the dependencies
    /// resolved for its fields.
    fn companions() -> Vec<Companion> {
        Vec::new()
    }
}

/// A binding a type declares for its own construction subtree.
#[derive(Debug)]
pub struct Companion {
    token: RawToken,
    provider: Provider,
}

impl Companion {
    pub fn new<T>(token: &Token<T>, provider: Provider) -> Self
    where
        T: ?Sized,
    {
        Self {
            token: token.raw().clone(),
            provider,
        }
    }

    /// Binds `T` to a fresh instance of itself on each request.
    pub fn class<T>() -> Self
    where
        T: Injectable,
    {
        Self::new(&Token::<T>::by_type(), Provider::class::<T>())
    }

    pub const fn token(&self) -> &RawToken {
        &self.token
    }

    pub fn into_parts(self) -> (RawToken, Provider) {
        (self.token, self.provider)
    }
}

/// Picks the constructor to use out of `candidates`.
///
/// A single candidate is always used. Out of two candidates, the one without parameters
/// is preferred if it is the only such candidate. Every other shape is ambiguous.
///
/// # Errors
///
/// Returns [`Error::InvalidBinding`] if there is no candidate or the candidates are
/// ambiguous.
pub fn select_constructor<T>(mut candidates: Vec<Constructor<T>>) -> Result<Constructor<T>>
where
    T: 'static,
{
    match candidates.len() {
        0 => Err(Error::invalid_binding::<T>("no constructor is available")),
        1 => Ok(candidates.swap_remove(0)),
        2 => {
            let mut nullary = candidates
                .iter()
                .enumerate()
                .filter(|(_, c)| c.params().is_empty())
                .map(|(i, _)| i);

            match (nullary.next(), nullary.next()) {
                (Some(i), None) => Ok(candidates.swap_remove(i)),
                _ => Err(ambiguous::<T>(2)),
            }
        }
        n => Err(ambiguous::<T>(n)),
    }
}

fn ambiguous<T: 'static>(n: usize) -> Error {
    Error::invalid_binding::<T>(format!(
        "{n} constructors are available, expected one, or one without parameters and one other"
    ))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use rstest::rstest;

    use super::*;

    struct Config;

    #[derive(Debug, PartialEq, Eq)]
    enum Built {
        Nullary,
        Unary,
        Binary,
    }

    fn nullary() -> Constructor<Built> {
        Constructor::from_fn(|| Built::Nullary)
    }

    fn unary() -> Constructor<Built> {
        Constructor::from_fn(|_: Arc<Config>| Built::Unary)
    }

    fn binary() -> Constructor<Built> {
        Constructor::from_fn(|_: Arc<Config>, _: Arc<String>| Built::Binary)
    }

    #[rstest]
    #[case::single_nullary(vec![nullary()], Built::Nullary)]
    #[case::single_unary(vec![unary()], Built::Unary)]
    #[case::prefer_nullary(vec![unary(), nullary()], Built::Nullary)]
    #[case::prefer_nullary_first(vec![nullary(), binary()], Built::Nullary)]
    fn test_select(#[case] candidates: Vec<Constructor<Built>>, #[case] expected: Built) {
        let selected = select_constructor(candidates).unwrap();
        let values = selected
            .params()
            .iter()
            .map(|param| {
                Some(if param.ty() == knit_core::TypeKey::of::<Config>() {
                    knit_core::Erased::new(Config)
                } else {
                    knit_core::Erased::new(String::new())
                })
            })
            .collect();
        assert_eq!(selected.build(values).unwrap(), expected);
    }

    #[rstest]
    #[case::none(vec![])]
    #[case::two_nullary(vec![nullary(), nullary()])]
    #[case::two_with_params(vec![unary(), binary()])]
    #[case::nullary_and_many(vec![nullary(), unary(), binary()])]
    fn test_select_invalid(#[case] candidates: Vec<Constructor<Built>>) {
        let err = select_constructor(candidates).unwrap_err();
        assert!(err.is_invalid_binding());
    }

    #[test]
    fn test_companion() {
        struct Child;

        impl Injectable for Child {
            fn constructors() -> Vec<Constructor<Self>> {
                vec![Constructor::from_fn(|| Child)]
            }
        }

        let companion = Companion::class::<Child>();
        assert_eq!(companion.token(), Token::<Child>::by_type().raw());
        let (_, provider) = companion.into_parts();
        assert!(matches!(provider, Provider::Class(_)));
    }
}
