//! [`Injector`] and its binding helpers.

use std::fmt::Display;
use std::sync::{Arc, Weak};

use knit_core::{Error, RawToken, Result, Token, Trace, TypeKey};

use crate::blueprint::Injectable;
use crate::context::ResolutionContext;
use crate::provider::Provider;
use crate::registry::Registry;
use crate::resolver::Resolver;

/// [`Injector`] owns the global bindings and runs resolution passes over them.
///
/// Injectors are cheap to clone: every clone shares the same bindings. An injector binds
/// itself under `Token::<Injector>::by_type()`, so values can request the injector that
/// builds them.
///
/// # Example
///
/// ```
/// use knit::{Constructor, Injectable, Injector};
///
/// trait Greeter: Send + Sync {
///     fn greet(&self) -> String;
/// }
///
/// struct English;
///
/// impl Greeter for English {
///     fn greet(&self) -> String {
///         "hello".to_string()
///     }
/// }
///
/// impl Injectable for English {
///     fn constructors() -> Vec<Constructor<Self>> {
///         vec![Constructor::from_fn(|| English)]
///     }
/// }
///
/// let injector = Injector::new();
/// injector
///     .for_type::<dyn Greeter>()
///     .to_singleton_as::<English>(|english| english);
///
/// let greeter = injector.inject::<dyn Greeter>().unwrap();
/// assert_eq!(greeter.greet(), "hello");
/// ```
#[derive(Clone)]
pub struct Injector {
    inner: Arc<Inner>,
}

struct Inner {
    registry: Registry,
    parent: Option<Injector>,
}

impl Default for Injector {
    fn default() -> Self {
        Self::new()
    }
}

impl Injector {
    /// Creates an injector with no bindings besides itself.
    pub fn new() -> Self {
        Self::with_parent(None)
    }

    /// Returns a new builder for `Injector`.
    #[must_use]
    pub fn builder() -> InjectorBuilder {
        InjectorBuilder {
            parent: None,
            bindings: Vec::new(),
        }
    }

    /// Creates an injector falling back to the bindings of `self` for tokens it does not
    /// bind itself.
    ///
    /// A binding found in an ancestor is built against that ancestor, so the child's own
    /// bindings never leak into values the ancestor provides.
    #[must_use]
    pub fn child(&self) -> Self {
        Self::with_parent(Some(self.clone()))
    }

    fn with_parent(parent: Option<Self>) -> Self {
        let inner = Arc::new_cyclic(|this: &Weak<Inner>| {
            let registry = Registry::new();
            let this = this.clone();
            registry.bind(
                Token::<Self>::by_type().into_raw(),
                Provider::factory(move |_| {
                    this.upgrade()
                        .map(|inner| Arc::new(Self { inner }))
                        .ok_or_else(|| {
                            Error::invalid_binding::<Self>("the injector has been dropped")
                        })
                }),
            );
            Inner { registry, parent }
        });
        Self { inner }
    }

    pub fn registry(&self) -> &Registry {
        &self.inner.registry
    }

    pub fn parent(&self) -> Option<&Self> {
        self.inner.parent.as_ref()
    }

    /// Finds the provider of `token` in this injector or its ancestors, along with the
    /// injector that owns it.
    pub fn lookup(&self, token: &RawToken) -> Option<(&Self, Arc<Provider>)> {
        let mut current = Some(self);
        while let Some(injector) = current {
            if let Some(provider) = injector.registry().lookup(token) {
                return Some((injector, provider));
            }
            current = injector.parent();
        }
        None
    }

    /// Binds `token` to `provider`, replacing and returning the previous provider.
    pub fn bind(&self, token: RawToken, provider: Provider) -> Option<Arc<Provider>> {
        debug!(token = %token, provider = provider.kind(), "binding");
        self.registry().bind(token, provider)
    }

    /// Starts a binding for the type-scoped token of `T`.
    pub fn for_type<T>(&self) -> Binding<'_, T>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.for_token(&Token::by_type())
    }

    /// Starts a binding for `token`.
    pub fn for_token<T>(&self, token: &Token<T>) -> Binding<'_, T>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        Binding {
            injector: self,
            token: token.clone(),
        }
    }

    /// Binds `T` to a new instance of itself on each request.
    pub fn provide<T>(&self)
    where
        T: Injectable,
    {
        self.for_type::<T>().to_class();
    }

    /// Resolves the type-scoped token of `T` in a new resolution pass.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingBinding`] if `T` or one of its required dependencies is not
    /// bound, [`Error::CircularDependency`] if the object graph loops, and any other error
    /// raised while building the value.
    pub fn inject<T>(&self) -> Result<Arc<T>>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.inject_token(&Token::by_type())
    }

    /// Like [`inject`](Self::inject), but returns `None` if `T` itself is not bound.
    ///
    /// # Errors
    ///
    /// Fails like [`inject`](Self::inject) for every other reason.
    pub fn inject_optional<T>(&self) -> Result<Option<Arc<T>>>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.inject_token_optional(&Token::by_type())
    }

    /// Resolves `token` in a new resolution pass.
    ///
    /// # Errors
    ///
    /// See [`inject`](Self::inject).
    pub fn inject_token<T>(&self, token: &Token<T>) -> Result<Arc<T>>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.pass(token, |resolver| resolver.resolve(token))
    }

    /// Resolves `token` in a new resolution pass, returning `None` if it is not bound.
    ///
    /// # Errors
    ///
    /// See [`inject_optional`](Self::inject_optional).
    pub fn inject_token_optional<T>(&self, token: &Token<T>) -> Result<Option<Arc<T>>>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.pass(token, |resolver| resolver.resolve_optional(token))
    }

    /// Resolves the fields of an instance built elsewhere.
    ///
    /// Constructors are not run.
    ///
    /// # Errors
    ///
    /// Returns the first error raised while resolving or assigning a field.
    pub fn initialize<T>(&self, instance: &Arc<T>) -> Result<()>
    where
        T: Injectable,
    {
        self.pass(&TypeKey::of::<T>(), |resolver| resolver.populate(instance))
    }

    #[cfg_attr(not(feature = "tracing"), allow(unused_variables))]
    fn pass<R, F>(&self, request: &dyn Display, f: F) -> Result<R>
    where
        F: FnOnce(&Resolver<'_>) -> Result<R>,
    {
        #[cfg(feature = "tracing")]
        let _span = ::tracing::debug_span!("inject", request = %request).entered();

        let context = ResolutionContext::root();
        let trace = Trace::new();
        let result = f(&Resolver::new(self, &context, &trace));

        if let Err(err) = &result {
            debug!(error = %err, "resolution failed");
        }
        result
    }
}

impl PartialEq for Injector {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Injector {}

impl std::fmt::Debug for Injector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Injector")
            .field("bindings", &self.registry().len())
            .field("parent", &self.parent())
            .finish()
    }
}

/// A pending binding for a token, created by [`Injector::for_type`] and
/// [`Injector::for_token`].
#[must_use = "a binding does nothing until a provider is chosen"]
pub struct Binding<'a, T: ?Sized> {
    injector: &'a Injector,
    token: Token<T>,
}

impl<T> Binding<'_, T>
where
    T: ?Sized + Send + Sync + 'static,
{
    pub const fn token(&self) -> &Token<T> {
        &self.token
    }

    /// Binds the token to `provider`.
    pub fn to(self, provider: Provider) {
        self.injector.bind(self.token.into_raw(), provider);
    }

    /// Binds the token to an already shared value.
    pub fn to_arc(self, value: Arc<T>) {
        self.to(Provider::arc(value));
    }

    /// Binds the token to a new `U` on each request, handed out as `T`.
    pub fn to_class_as<U>(self, upcast: fn(Arc<U>) -> Arc<T>)
    where
        U: Injectable,
    {
        self.to(Provider::class_as(upcast));
    }

    /// Binds the token to a single `U`, built on first request and handed out as `T`.
    pub fn to_singleton_as<U>(self, upcast: fn(Arc<U>) -> Arc<T>)
    where
        U: Injectable,
    {
        self.to(Provider::singleton_as(upcast));
    }

    /// Binds the token to `factory`, called on each request.
    pub fn to_factory<F>(self, factory: F)
    where
        F: Fn(&Resolver<'_>) -> Result<Arc<T>> + Send + Sync + 'static,
    {
        self.to(Provider::factory(factory));
    }
}

impl<T> Binding<'_, T>
where
    T: Send + Sync + 'static,
{
    pub fn to_value(self, value: T) {
        self.to(Provider::value(value));
    }
}

impl<T> Binding<'_, T>
where
    T: Injectable,
{
    pub fn to_class(self) {
        self.to(Provider::class::<T>());
    }

    pub fn to_singleton(self) {
        self.to(Provider::singleton::<T>());
    }
}

/// A builder for [`Injector`].
///
/// Bindings are applied in order, so a later binding of the same token wins.
#[derive(Debug)]
pub struct InjectorBuilder {
    parent: Option<Injector>,
    bindings: Vec<(RawToken, Provider)>,
}

impl InjectorBuilder {
    /// Makes the built injector a child of `parent`.
    #[must_use]
    pub fn with_parent(mut self, parent: &Injector) -> Self {
        self.parent = Some(parent.clone());
        self
    }

    /// Registers a binding.
    #[must_use]
    pub fn with_binding<T>(mut self, token: &Token<T>, provider: Provider) -> Self
    where
        T: ?Sized,
    {
        self.bindings.push((token.raw().clone(), provider));
        self
    }

    /// Registers a value under the type-scoped token of `T`.
    #[must_use]
    pub fn with_value<T>(self, value: T) -> Self
    where
        T: Send + Sync + 'static,
    {
        self.with_binding(&Token::<T>::by_type(), Provider::value(value))
    }

    /// Registers `T` as a transient class.
    #[must_use]
    pub fn with_class<T>(self) -> Self
    where
        T: Injectable,
    {
        self.with_binding(&Token::<T>::by_type(), Provider::class::<T>())
    }

    /// Registers `T` as a singleton.
    #[must_use]
    pub fn with_singleton<T>(self) -> Self
    where
        T: Injectable,
    {
        self.with_binding(&Token::<T>::by_type(), Provider::singleton::<T>())
    }

    /// Registers a factory under the type-scoped token of `T`.
    #[must_use]
    pub fn with_factory<T, F>(self, factory: F) -> Self
    where
        T: ?Sized + Send + Sync + 'static,
        F: Fn(&Resolver<'_>) -> Result<Arc<T>> + Send + Sync + 'static,
    {
        self.with_binding(&Token::<T>::by_type(), Provider::factory(factory))
    }

    /// Finalizes the building process and returns the built injector.
    #[must_use]
    pub fn build(self) -> Injector {
        let Self { parent, bindings } = self;

        let injector = Injector::with_parent(parent);
        for (token, provider) in bindings {
            injector.bind(token, provider);
        }
        injector
    }
}
