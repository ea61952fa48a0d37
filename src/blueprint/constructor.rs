//! Constructor descriptors and the typed helpers deriving them from closures.

use knit_core::error::BoxError;
use knit_core::{Erased, Error, Result, TypeKey};

use super::dependency::{Dependency, Param};

type BuildFn<T> = Box<dyn Fn(&mut Args) -> Result<T>>;

/// A way to build `T` out of resolved parameters.
///
/// In most cases, you don't need to list parameters manually: [`Constructor::from_fn`]
/// derives them from the closure signature.
///
/// ```
/// use std::sync::Arc;
///
/// use knit::blueprint::{Constructor, Param};
///
/// struct Config;
/// struct Cache;
/// struct Service {
///     config: Arc<Config>,
///     cache: Option<Arc<Cache>>,
/// }
///
/// let constructor = Constructor::from_fn(|config: Arc<Config>, cache: Option<Arc<Cache>>| {
///     Service { config, cache }
/// });
/// assert_eq!(
///     constructor.params(),
///     &[Param::required::<Config>(), Param::optional::<Cache>()]
/// );
/// ```
pub struct Constructor<T> {
    params: Vec<Param>,
    build: BuildFn<T>,
}

impl<T> Constructor<T>
where
    T: 'static,
{
    /// Creates a constructor from explicit parameters and a build function reading them
    /// from [`Args`] in order.
    pub fn new<F>(params: Vec<Param>, build: F) -> Self
    where
        F: Fn(&mut Args) -> Result<T> + 'static,
    {
        Self {
            params,
            build: Box::new(build),
        }
    }

    /// Creates a constructor from a closure taking [`Dependency`] parameters.
    pub fn from_fn<F, A>(f: F) -> Self
    where
        F: ConstructorFn<A, T>,
    {
        f.into_constructor()
    }

    /// Like [`from_fn`](Self::from_fn), for closures returning a [`Result`] with an
    /// arbitrary error type.
    pub fn try_from_fn<F, A>(f: F) -> Self
    where
        F: TryConstructorFn<A, T>,
    {
        f.into_constructor()
    }

    pub fn params(&self) -> &[Param] {
        &self.params
    }

    /// Builds an instance out of resolved arguments, in the order of [`params`](Self::params).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Construction`] if an argument does not fit its parameter or if the
    /// build function fails.
    pub fn build(&self, values: Vec<Option<Erased>>) -> Result<T> {
        let mut args = Args::new(TypeKey::of::<T>(), values);
        (self.build)(&mut args)
    }
}

impl<T> Constructor<T>
where
    T: Default + 'static,
{
    /// A zero-parameter constructor calling [`Default::default`].
    pub fn default_impl() -> Self {
        Self::new(Vec::new(), |_| Ok(T::default()))
    }
}

impl<T> std::fmt::Debug for Constructor<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Constructor")
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

/// Resolved constructor arguments.
#[derive(Debug)]
pub struct Args {
    owner: TypeKey,
    values: std::vec::IntoIter<Option<Erased>>,
    position: usize,
}

impl Args {
    fn new(owner: TypeKey, values: Vec<Option<Erased>>) -> Self {
        Self {
            owner,
            values: values.into_iter(),
            position: 0,
        }
    }

    /// Takes the next argument.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Construction`] if there are no arguments left or if the next one
    /// does not fit `D`.
    pub fn next<D>(&mut self) -> Result<D>
    where
        D: Dependency,
    {
        let position = self.position;
        self.position += 1;

        let value = self.values.next().ok_or_else(|| {
            Error::construction_of(self.owner, format!("missing argument #{position}"))
        })?;

        D::extract(value).ok_or_else(|| {
            Error::construction_of(
                self.owner,
                format!(
                    "argument #{position} does not fit `{}`",
                    std::any::type_name::<D>()
                ),
            )
        })
    }

    /// Number of arguments not taken yet.
    pub fn remaining(&self) -> usize {
        self.values.len()
    }
}

/// Closures that can be turned into a [`Constructor`].
pub trait ConstructorFn<A, T>: Sized + 'static {
    fn into_constructor(self) -> Constructor<T>;
}

/// Fallible closures that can be turned into a [`Constructor`].
pub trait TryConstructorFn<A, T>: Sized + 'static {
    fn into_constructor(self) -> Constructor<T>;
}

impl<F, T> ConstructorFn<(), T> for F
where
    F: Fn() -> T + 'static,
    T: 'static,
{
    fn into_constructor(self) -> Constructor<T> {
        Constructor::new(Vec::new(), move |_| Ok(self()))
    }
}

impl<F, T, E> TryConstructorFn<(), T> for F
where
    F: Fn() -> Result<T, E> + 'static,
    T: 'static,
    E: Into<BoxError>,
{
    fn into_constructor(self) -> Constructor<T> {
        Constructor::new(Vec::new(), move |_| self().map_err(Error::construction::<T>))
    }
}

macro_rules! impl_constructor_fn {
    ($($ty:ident),*) => {
        #[allow(non_snake_case)]
        impl<F, T, $($ty,)*> ConstructorFn<($($ty,)*), T> for F
        where
            F: Fn($($ty,)*) -> T + 'static,
            T: 'static,
            $( $ty: Dependency, )*
        {
            fn into_constructor(self) -> Constructor<T> {
                Constructor::new(vec![$( $ty::param(), )*], move |args| {
                    $( let $ty = args.next::<$ty>()?; )*
                    Ok(self($($ty,)*))
                })
            }
        }
    };
}

apply_tuples!(impl_constructor_fn);

macro_rules! impl_try_constructor_fn {
    ($($ty:ident),*) => {
        #[allow(non_snake_case)]
        impl<F, T, E, $($ty,)*> TryConstructorFn<($($ty,)*), T> for F
        where
            F: Fn($($ty,)*) -> Result<T, E> + 'static,
            T: 'static,
            E: Into<BoxError>,
            $( $ty: Dependency, )*
        {
            fn into_constructor(self) -> Constructor<T> {
                Constructor::new(vec![$( $ty::param(), )*], move |args| {
                    $( let $ty = args.next::<$ty>()?; )*
                    self($($ty,)*).map_err(Error::construction::<T>)
                })
            }
        }
    };
}

apply_tuples!(impl_try_constructor_fn);
