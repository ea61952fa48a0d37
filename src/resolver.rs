//! The resolution algorithm.

use std::sync::Arc;

use knit_core::{Erased, Error, RawToken, Result, Token, Trace, TypeKey};

use crate::blueprint::{Injectable, Param, select_constructor};
use crate::context::ResolutionContext;
use crate::injector::Injector;
use crate::provider::Provider;

/// [`Resolver`] resolves tokens within one step of a resolution pass.
///
/// A resolver is handed to providers and factories. It sees the bindings of its
/// [`ResolutionContext`] first and the bindings of the [`Injector`] second. Every token
/// it resolves gets a fresh child context, so [`bind_local`](Self::bind_local) only
/// affects the dependencies of the value being produced.
#[derive(Clone, Copy)]
pub struct Resolver<'a> {
    injector: &'a Injector,
    context: &'a ResolutionContext<'a>,
    trace: &'a Trace,
}

impl<'a> Resolver<'a> {
    pub(crate) const fn new(
        injector: &'a Injector,
        context: &'a ResolutionContext<'a>,
        trace: &'a Trace,
    ) -> Self {
        Self {
            injector,
            context,
            trace,
        }
    }

    pub const fn injector(&self) -> &'a Injector {
        self.injector
    }

    pub const fn context(&self) -> &'a ResolutionContext<'a> {
        self.context
    }

    pub const fn trace(&self) -> &'a Trace {
        self.trace
    }

    /// Resolves the type-scoped token of `T`.
    ///
    /// # Errors
    ///
    /// See [`resolve`](Self::resolve).
    pub fn get<T>(&self) -> Result<Arc<T>>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.resolve(&Token::<T>::by_type())
    }

    /// Resolves the type-scoped token of `T`, returning `None` if it is not bound.
    ///
    /// # Errors
    ///
    /// See [`resolve_optional`](Self::resolve_optional).
    pub fn get_optional<T>(&self) -> Result<Option<Arc<T>>>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.resolve_optional(&Token::<T>::by_type())
    }

    /// Resolves `token`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingBinding`] if `token` is not bound, or any error raised while
    /// producing the value.
    pub fn resolve<T>(&self, token: &Token<T>) -> Result<Arc<T>>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        match self.resolve_raw(token.raw())? {
            Some(value) => downcast(token.raw(), value),
            None => Err(self.missing(token.raw())),
        }
    }

    /// Resolves `token`, returning `None` if it is not bound.
    ///
    /// Only the absence of `token` itself is turned into `None`. A missing binding deeper
    /// in the graph is still an error.
    ///
    /// # Errors
    ///
    /// Returns any error raised while producing the value.
    pub fn resolve_optional<T>(&self, token: &Token<T>) -> Result<Option<Arc<T>>>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.resolve_raw(token.raw())?
            .map(|value| downcast(token.raw(), value))
            .transpose()
    }

    /// Resolves `token` without checking the type of the value.
    ///
    /// Returns `Ok(None)` if neither the context nor the injector binds `token`.
    ///
    /// # Errors
    ///
    /// Returns any error raised while producing the value.
    pub fn resolve_raw(&self, token: &RawToken) -> Result<Option<Erased>> {
        // Providers owned by an ancestor injector are built against that ancestor.
        let (owner, provider) = match self.context.lookup(token) {
            Some(provider) => (self.injector, provider),
            None => match self.injector.lookup(token) {
                Some(found) => found,
                None => {
                    trace!(token = %token, "no binding");
                    return Ok(None);
                }
            },
        };

        trace!(
            token = %token,
            provider = provider.kind(),
            depth = self.trace.depth(),
            "resolving"
        );

        let context = self.context.child();
        let resolver = Resolver::new(owner, &context, self.trace);
        provider.provide(&resolver).map(Some)
    }

    /// Binds `token` for the dependencies resolved through this resolver only.
    pub fn bind_local<T>(&self, token: &Token<T>, provider: Provider)
    where
        T: ?Sized,
    {
        self.context.bind_local(token.raw().clone(), provider);
    }

    /// Resolves the fields of an existing instance.
    ///
    /// `T` is on the trace while its fields are resolved, and the instance itself is
    /// offered to them along with the companions of `T`.
    ///
    /// # Errors
    ///
    /// Returns the first error raised while resolving or assigning a field.
    pub fn populate<T>(&self, instance: &Arc<T>) -> Result<()>
    where
        T: Injectable,
    {
        let _frame = self.trace.push(TypeKey::of::<T>())?;

        let context = self.context.child();
        let resolver = Resolver::new(self.injector, &context, self.trace);
        resolver.bind_companions::<T>();
        resolver.offer(instance);
        resolver.assign_fields::<T>(instance)
    }

    /// Builds a new `T` and populates its fields.
    ///
    /// Pushing `T` onto the trace is the caller's job.
    pub(crate) fn construct<T>(&self) -> Result<Arc<T>>
    where
        T: Injectable,
    {
        debug!(ty = std::any::type_name::<T>(), "constructing");

        let offers_self = self.bind_companions::<T>();
        let constructor = select_constructor(T::constructors())?;
        let values = constructor
            .params()
            .iter()
            .map(|param| self.resolve_param(param))
            .collect::<Result<Vec<_>>>()?;
        let instance = Arc::new(constructor.build(values)?);

        if offers_self {
            self.offer(&instance);
        }
        self.assign_fields::<T>(&instance)?;
        Ok(instance)
    }

    /// Binds the companions of `T` in the current context. Returns `true` if there was
    /// any.
    fn bind_companions<T>(&self) -> bool
    where
        T: Injectable,
    {
        let companions = T::companions();
        let any = !companions.is_empty();
        for companion in companions {
            let (token, provider) = companion.into_parts();
            trace!(token = %token, "binding companion");
            self.context.bind_local(token, provider);
        }
        any
    }

    fn offer<T>(&self, instance: &Arc<T>)
    where
        T: Send + Sync + 'static,
    {
        self.context.bind_local(
            RawToken::by_type(TypeKey::of::<T>()),
            Provider::arc(Arc::clone(instance)),
        );
    }

    fn assign_fields<T>(&self, instance: &T) -> Result<()>
    where
        T: Injectable,
    {
        for field in T::fields() {
            trace!(field = field.name(), "assigning field");
            let value = self.resolve_param(field.param())?;
            field.assign(instance, value)?;
        }
        Ok(())
    }

    fn resolve_param(&self, param: &Param) -> Result<Option<Erased>> {
        let token = param.token();
        match self.resolve_raw(&token)? {
            Some(value) if value.value_type_id() == param.ty().id() => Ok(Some(value)),
            Some(value) => Err(mismatch(param.ty(), &token, &value)),
            None if param.is_optional() => Ok(None),
            None => Err(self.missing(&token)),
        }
    }

    fn missing(&self, token: &RawToken) -> Error {
        Error::missing_binding(token, self.trace.render())
    }
}

impl std::fmt::Debug for Resolver<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resolver")
            .field("trace", &self.trace.render())
            .finish_non_exhaustive()
    }
}

fn downcast<T>(token: &RawToken, value: Erased) -> Result<Arc<T>>
where
    T: ?Sized + Send + Sync + 'static,
{
    value
        .downcast::<T>()
        .map_err(|value| mismatch(TypeKey::of::<T>(), token, &value))
}

fn mismatch(expected: TypeKey, token: &RawToken, value: &Erased) -> Error {
    Error::invalid_binding_of(
        expected,
        format!("{token} is bound to a value of `{}`", value.value_type_name()),
    )
}
