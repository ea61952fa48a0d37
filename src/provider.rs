//! Strategies producing values for tokens.

use std::sync::{Arc, Mutex, OnceLock, PoisonError};

use knit_core::{Erased, Result, TypeKey};

use crate::blueprint::Injectable;
use crate::resolver::Resolver;

type BuildFn = dyn Fn(&Resolver<'_>) -> Result<Erased> + Send + Sync;

/// [`Provider`] describes how to produce a value when a token is resolved.
pub enum Provider {
    /// Always returns the same shared value.
    Value(Erased),
    /// Builds a new instance on every resolution.
    Class(ClassProvider),
    /// Builds an instance on first resolution and returns it from then on.
    Singleton(SingletonProvider),
    /// Calls a function on every resolution.
    Factory(FactoryProvider),
}

impl Provider {
    pub fn value<T>(value: T) -> Self
    where
        T: Send + Sync + 'static,
    {
        Self::Value(Erased::new(value))
    }

    pub fn arc<T>(value: Arc<T>) -> Self
    where
        T: ?Sized + Send + Sync + 'static,
    {
        Self::Value(Erased::from_arc(value))
    }

    pub fn class<T>() -> Self
    where
        T: Injectable,
    {
        Self::Class(ClassProvider::new::<T, T>(|value| value))
    }

    /// Builds `U` and hands it out as `T`, e.g. a trait object `U` implements.
    pub fn class_as<U, T>(upcast: fn(Arc<U>) -> Arc<T>) -> Self
    where
        U: Injectable,
        T: ?Sized + Send + Sync + 'static,
    {
        Self::Class(ClassProvider::new(upcast))
    }

    pub fn singleton<T>() -> Self
    where
        T: Injectable,
    {
        Self::Singleton(SingletonProvider::new(ClassProvider::new::<T, T>(|value| {
            value
        })))
    }

    pub fn singleton_as<U, T>(upcast: fn(Arc<U>) -> Arc<T>) -> Self
    where
        U: Injectable,
        T: ?Sized + Send + Sync + 'static,
    {
        Self::Singleton(SingletonProvider::new(ClassProvider::new(upcast)))
    }

    pub fn factory<T, F>(factory: F) -> Self
    where
        T: ?Sized + Send + Sync + 'static,
        F: Fn(&Resolver<'_>) -> Result<Arc<T>> + Send + Sync + 'static,
    {
        Self::Factory(FactoryProvider::new(factory))
    }

    /// A short name of the variant, for diagnostics.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Value(_) => "value",
            Self::Class(_) => "class",
            Self::Singleton(_) => "singleton",
            Self::Factory(_) => "factory",
        }
    }

    /// Produces a value.
    ///
    /// `resolver` is scoped to this resolution step: bindings it adds are only seen by
    /// the dependencies this provider resolves.
    ///
    /// # Errors
    ///
    /// Returns any error raised while building the value or resolving its dependencies.
    pub fn provide(&self, resolver: &Resolver<'_>) -> Result<Erased> {
        match self {
            Self::Value(value) => Ok(value.clone()),
            Self::Class(class) => class.provide(resolver),
            Self::Singleton(singleton) => singleton.provide(resolver),
            Self::Factory(factory) => factory.provide(resolver),
        }
    }
}

impl std::fmt::Debug for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Self::Class(class) => f.debug_tuple("Class").field(class).finish(),
            Self::Singleton(singleton) => f.debug_tuple("Singleton").field(singleton).finish(),
            Self::Factory(factory) => f.debug_tuple("Factory").field(factory).finish(),
        }
    }
}

/// Builds instances of a subject type through the construction protocol.
#[derive(Clone)]
pub struct ClassProvider {
    subject: TypeKey,
    build: Arc<BuildFn>,
}

impl ClassProvider {
    pub fn new<U, T>(upcast: fn(Arc<U>) -> Arc<T>) -> Self
    where
        U: Injectable,
        T: ?Sized + Send + Sync + 'static,
    {
        Self {
            subject: TypeKey::of::<U>(),
            build: Arc::new(move |resolver: &Resolver<'_>| {
                resolver
                    .construct::<U>()
                    .map(|value| Erased::from_arc(upcast(value)))
            }),
        }
    }

    /// The type actually built.
    pub const fn subject(&self) -> TypeKey {
        self.subject
    }

    fn provide(&self, resolver: &Resolver<'_>) -> Result<Erased> {
        let _frame = resolver.trace().push(self.subject)?;
        (self.build)(resolver)
    }
}

impl std::fmt::Debug for ClassProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClassProvider")
            .field("subject", &self.subject.name())
            .finish_non_exhaustive()
    }
}

/// A [`ClassProvider`] building at most once.
pub struct SingletonProvider {
    class: ClassProvider,
    cache: OnceLock<Erased>,
    lock: Mutex<()>,
}

impl SingletonProvider {
    pub const fn new(class: ClassProvider) -> Self {
        Self {
            class,
            cache: OnceLock::new(),
            lock: Mutex::new(()),
        }
    }

    /// Returns `true` once the instance has been built.
    pub fn is_built(&self) -> bool {
        self.cache.get().is_some()
    }

    fn provide(&self, resolver: &Resolver<'_>) -> Result<Erased> {
        if let Some(value) = self.cache.get() {
            trace!(subject = self.class.subject.name(), "singleton cache hit");
            return Ok(value.clone());
        }

        // Pushing before locking turns a re-entrant request into a cycle error
        // instead of a deadlock.
        let _frame = resolver.trace().push(self.class.subject)?;
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(value) = self.cache.get() {
            return Ok(value.clone());
        }

        let value = (self.class.build)(resolver)?;
        Ok(self.cache.get_or_init(|| value).clone())
    }
}

impl std::fmt::Debug for SingletonProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SingletonProvider")
            .field("subject", &self.class.subject.name())
            .field("built", &self.is_built())
            .finish_non_exhaustive()
    }
}

/// Produces values by calling a function with the current [`Resolver`].
#[derive(Clone)]
pub struct FactoryProvider {
    produces: TypeKey,
    factory: Arc<BuildFn>,
}

impl FactoryProvider {
    pub fn new<T, F>(factory: F) -> Self
    where
        T: ?Sized + Send + Sync + 'static,
        F: Fn(&Resolver<'_>) -> Result<Arc<T>> + Send + Sync + 'static,
    {
        Self {
            produces: TypeKey::of::<T>(),
            factory: Arc::new(move |resolver: &Resolver<'_>| {
                factory(resolver).map(Erased::from_arc)
            }),
        }
    }

    pub const fn produces(&self) -> TypeKey {
        self.produces
    }

    fn provide(&self, resolver: &Resolver<'_>) -> Result<Erased> {
        (self.factory)(resolver)
    }
}

impl std::fmt::Debug for FactoryProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FactoryProvider")
            .field("produces", &self.produces.name())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use crate::blueprint::Constructor;
    use crate::injector::Injector;

    use super::*;

    static BUILT: AtomicUsize = AtomicUsize::new(0);

    struct Slow;

    impl Injectable for Slow {
        fn constructors() -> Vec<Constructor<Self>> {
            vec![Constructor::from_fn(|| {
                BUILT.fetch_add(1, Ordering::SeqCst);
                std::thread::sleep(Duration::from_millis(20));
                Slow
            })]
        }
    }

    #[test]
    fn test_kind() {
        assert_eq!(Provider::value(1u8).kind(), "value");
        assert_eq!(Provider::class::<Slow>().kind(), "class");
        assert_eq!(Provider::singleton::<Slow>().kind(), "singleton");
        assert_eq!(
            Provider::factory(|_| Ok(Arc::new(Slow))).kind(),
            "factory"
        );
    }

    #[test]
    fn test_subject_and_produces() {
        trait Marker: Send + Sync {}

        impl Marker for Slow {}

        let Provider::Class(class) = Provider::class_as::<Slow, dyn Marker>(|slow| slow) else {
            panic!("expected a class provider");
        };
        assert_eq!(class.subject(), TypeKey::of::<Slow>());

        let singleton = Provider::singleton::<Slow>();
        let Provider::Singleton(singleton) = &singleton else {
            panic!("expected a singleton provider");
        };
        assert!(!singleton.is_built());

        let factory = FactoryProvider::new(|_| Ok(Arc::new(Slow) as Arc<dyn Marker>));
        assert_eq!(factory.produces(), TypeKey::of::<dyn Marker>());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_singleton_built_once_across_threads() {
        let injector = Injector::new();
        injector.for_type::<Slow>().to_singleton();

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let injector = injector.clone();
                tokio::task::spawn_blocking(move || injector.inject::<Slow>().unwrap())
            })
            .collect();

        let mut instances = Vec::new();
        for task in tasks {
            instances.push(task.await.unwrap());
        }

        assert_eq!(BUILT.load(Ordering::SeqCst), 1);
        assert!(instances.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
    }
}
