use std::marker::PhantomData;
use std::ops::Deref;
use std::sync::Arc;

use knit_core::{Erased, RawToken, TypeKey};

/// Describes one injectable constructor parameter or field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Param {
    ty: TypeKey,
    override_ty: Option<TypeKey>,
    optional: bool,
}

impl Param {
    /// A parameter that fails resolution when `T` is not bound.
    pub fn required<T>() -> Self
    where
        T: ?Sized + 'static,
    {
        Self {
            ty: TypeKey::of::<T>(),
            override_ty: None,
            optional: false,
        }
    }

    /// A parameter that resolves to nothing when `T` is not bound.
    pub fn optional<T>() -> Self
    where
        T: ?Sized + 'static,
    {
        Self {
            optional: true,
            ..Self::required::<T>()
        }
    }

    /// Looks the parameter up by the type-scoped token of `Q` instead of its own type.
    #[must_use]
    pub fn qualified_by<Q>(self) -> Self
    where
        Q: ?Sized + 'static,
    {
        Self {
            override_ty: Some(TypeKey::of::<Q>()),
            ..self
        }
    }

    /// The type of the value handed to the constructor or setter.
    pub const fn ty(&self) -> TypeKey {
        self.ty
    }

    pub const fn override_ty(&self) -> Option<TypeKey> {
        self.override_ty
    }

    pub const fn is_optional(&self) -> bool {
        self.optional
    }

    /// The token this parameter is resolved through.
    pub fn token(&self) -> RawToken {
        RawToken::by_type(self.override_ty.unwrap_or(self.ty))
    }
}

/// A value that can be requested by a constructor parameter or a field.
///
/// Implemented for `Arc<T>` (required), `Option<Arc<T>>` (optional), and their
/// [`Qualified`] counterparts.
pub trait Dependency: Sized {
    /// The descriptor of the request.
    fn param() -> Param;

    /// Converts a resolved value, `None` meaning the value does not fit `Self`.
    fn extract(value: Option<Erased>) -> Option<Self>;
}

impl<T> Dependency for Arc<T>
where
    T: ?Sized + Send + Sync + 'static,
{
    fn param() -> Param {
        Param::required::<T>()
    }

    fn extract(value: Option<Erased>) -> Option<Self> {
        value?.downcast().ok()
    }
}

impl<T> Dependency for Option<Arc<T>>
where
    T: ?Sized + Send + Sync + 'static,
{
    fn param() -> Param {
        Param::optional::<T>()
    }

    fn extract(value: Option<Erased>) -> Option<Self> {
        match value {
            Some(value) => value.downcast().ok().map(Some),
            None => Some(None),
        }
    }
}

/// A `T` looked up through the type-scoped token of the qualifier `Q`.
///
/// Bind it with `Token::<T>::qualified::<Q>()`.
pub struct Qualified<Q: ?Sized, T: ?Sized> {
    value: Arc<T>,
    _marker: PhantomData<fn() -> Q>,
}

impl<Q: ?Sized, T: ?Sized> Qualified<Q, T> {
    pub const fn new(value: Arc<T>) -> Self {
        Self {
            value,
            _marker: PhantomData,
        }
    }

    pub fn into_inner(self) -> Arc<T> {
        self.value
    }
}

impl<Q: ?Sized, T: ?Sized> Deref for Qualified<Q, T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.value
    }
}

impl<Q: ?Sized, T: ?Sized> Clone for Qualified<Q, T> {
    fn clone(&self) -> Self {
        Self::new(Arc::clone(&self.value))
    }
}

impl<Q, T> Dependency for Qualified<Q, T>
where
    Q: ?Sized + 'static,
    T: ?Sized + Send + Sync + 'static,
{
    fn param() -> Param {
        Param::required::<T>().qualified_by::<Q>()
    }

    fn extract(value: Option<Erased>) -> Option<Self> {
        <Arc<T> as Dependency>::extract(value).map(Self::new)
    }
}

impl<Q, T> Dependency for Option<Qualified<Q, T>>
where
    Q: ?Sized + 'static,
    T: ?Sized + Send + Sync + 'static,
{
    fn param() -> Param {
        Param::optional::<T>().qualified_by::<Q>()
    }

    fn extract(value: Option<Erased>) -> Option<Self> {
        <Option<Arc<T>> as Dependency>::extract(value).map(|value| value.map(Qualified::new))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Primary;

    #[test]
    fn test_params() {
        let param = <Arc<String>>::param();
        assert_eq!(param.ty(), TypeKey::of::<String>());
        assert!(!param.is_optional());
        assert_eq!(param.token(), RawToken::by_type(TypeKey::of::<String>()));

        let param = <Option<Arc<String>>>::param();
        assert!(param.is_optional());

        let param = <Qualified<Primary, String>>::param();
        assert_eq!(param.ty(), TypeKey::of::<String>());
        assert_eq!(param.override_ty(), Some(TypeKey::of::<Primary>()));
        assert_eq!(param.token(), RawToken::by_type(TypeKey::of::<Primary>()));
    }

    #[test]
    fn test_extract() {
        let value = Erased::new("hello".to_string());
        let got = <Arc<String>>::extract(Some(value.clone())).unwrap();
        assert_eq!(*got, "hello");

        assert!(<Arc<String>>::extract(None).is_none());
        assert!(<Arc<u32>>::extract(Some(value.clone())).is_none());

        assert!(matches!(<Option<Arc<String>>>::extract(None), Some(None)));
        assert!(<Option<Arc<u32>>>::extract(Some(value.clone())).is_none());

        let got = <Qualified<Primary, String>>::extract(Some(value)).unwrap();
        assert_eq!(&*got, "hello");
    }
}
