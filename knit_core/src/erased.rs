//! Utilites around shared values with erased type informations.

use std::any::{Any, TypeId};
use std::sync::Arc;

/// [`Erased`] is a shared handle to a value of an arbitrary type.
///
/// The handle stores an `Arc<T>` behind [`Any`], so `T` may be unsized (e.g. a trait object).
/// Cloning an `Erased` never clones the underlying value.
#[derive(Clone)]
pub struct Erased {
    inner: Arc<dyn Any + Send + Sync>,
    type_id: TypeId,
    type_name: &'static str,
}

impl Erased {
    /// Creates a new `Erased` from a shared value.
    pub fn from_arc<T>(value: Arc<T>) -> Self
    where
        T: ?Sized + Send + Sync + 'static,
    {
        Self {
            inner: Arc::new(value),
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
        }
    }

    /// Creates a new `Erased` owning `value`.
    pub fn new<T>(value: T) -> Self
    where
        T: Send + Sync + 'static,
    {
        Self::from_arc(Arc::new(value))
    }

    /// Tries to downcast `self` into a shared value of type `T`.
    ///
    /// # Errors
    ///
    /// If the underlying value is not of type `T`, this method will return
    /// itself as error.
    pub fn downcast<T>(self) -> Result<Arc<T>, Self>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        match self.inner.downcast_ref::<Arc<T>>() {
            Some(value) => Ok(Arc::clone(value)),
            None => Err(self),
        }
    }

    /// Returns `true` if the underlying value is of type `T`.
    pub fn is<T>(&self) -> bool
    where
        T: ?Sized + 'static,
    {
        self.type_id == TypeId::of::<T>()
    }

    /// Returns the [`TypeId`] of the underlying value.
    pub const fn value_type_id(&self) -> TypeId {
        self.type_id
    }

    /// Returns the type name of the underlying value.
    pub const fn value_type_name(&self) -> &'static str {
        self.type_name
    }
}

impl std::fmt::Debug for Erased {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Erased")
            .field("type_name", &self.type_name)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::any::TypeId;
    use std::fmt::Display;
    use std::sync::Arc;

    use super::Erased;

    #[allow(dead_code)]
    fn test_implements_send_and_sync() -> impl Send + Sync {
        Erased::new("Hello".to_string())
    }

    #[test]
    fn test_downcast() {
        let erased = Erased::new("Hello".to_string());
        let got = erased.downcast::<String>().unwrap();
        assert_eq!(*got, "Hello");
    }

    #[test]
    fn test_downcast_err() {
        let erased = Erased::new("Hello".to_string());
        let err = erased.downcast::<i32>().unwrap_err();

        let got = err.downcast::<String>().unwrap();
        assert_eq!(*got, "Hello");
    }

    #[test]
    fn test_downcast_unsized() {
        let value: Arc<dyn Display + Send + Sync> = Arc::new(42);
        let erased = Erased::from_arc(value);
        assert!(erased.is::<dyn Display + Send + Sync>());
        assert!(!erased.is::<i32>());

        let got = erased.downcast::<dyn Display + Send + Sync>().unwrap();
        assert_eq!(got.to_string(), "42");
    }

    #[test]
    fn test_type_id() {
        let erased = Erased::new("Hello".to_string());
        assert_eq!(erased.value_type_id(), TypeId::of::<String>());
        assert_eq!(erased.value_type_name(), std::any::type_name::<String>());
    }

    #[test]
    fn test_clone_shares_value() {
        let a = Arc::new(100);
        let erased = Erased::from_arc(Arc::clone(&a));
        assert_eq!(Arc::strong_count(&a), 2);

        let cloned = erased.clone();
        assert_eq!(Arc::strong_count(&a), 2);

        let got = cloned.downcast::<i32>().unwrap();
        assert!(Arc::ptr_eq(&a, &got));
        assert_eq!(Arc::strong_count(&a), 3);
    }

    #[test]
    fn test_drop() {
        let a = Arc::new(100);
        let erased = Erased::from_arc(Arc::clone(&a));
        assert_eq!(Arc::strong_count(&a), 2);

        drop(erased);
        assert_eq!(Arc::strong_count(&a), 1);
    }
}
