//! Tokens identifying bindings.

use std::any::TypeId;
use std::borrow::Cow;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_IDENTITY: AtomicU64 = AtomicU64::new(0);

/// A runtime description of a type: its [`TypeId`] plus its name for diagnostics.
///
/// Equality and hashing only consider the [`TypeId`].
#[derive(Debug, Clone, Copy)]
pub struct TypeKey {
    id: TypeId,
    name: &'static str,
}

impl TypeKey {
    pub fn of<T>() -> Self
    where
        T: ?Sized + 'static,
    {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    pub const fn id(&self) -> TypeId {
        self.id
    }

    /// The fully qualified type name.
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// The type name with every module path stripped, e.g. `Arc<Database>` for
    /// `alloc::sync::Arc<app::db::Database>`.
    pub fn short_name(&self) -> String {
        let mut out = String::with_capacity(self.name.len());
        let mut segment = String::new();

        for ch in self.name.chars() {
            if ch.is_alphanumeric() || ch == '_' || ch == ':' {
                segment.push(ch);
            } else {
                out.push_str(strip_path(&segment));
                segment.clear();
                out.push(ch);
            }
        }
        out.push_str(strip_path(&segment));

        out
    }
}

fn strip_path(path: &str) -> &str {
    path.rsplit("::").next().unwrap_or(path)
}

impl PartialEq for TypeKey {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeKey {}

impl Hash for TypeKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl std::fmt::Display for TypeKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name)
    }
}

/// How a token is compared against other tokens.
#[derive(Debug, Clone)]
pub enum Scope {
    /// Equal to every other type-scoped token of the same subject type.
    ByType,
    /// Equal only to itself and its clones.
    ByIdentity { id: u64, label: Cow<'static, str> },
}

/// A type-erased token.
///
/// This is a *raw* version of the token. To bind and resolve values of concrete types,
/// consider using [`Token`].
#[derive(Debug, Clone)]
pub struct RawToken {
    subject: TypeKey,
    scope: Scope,
}

impl RawToken {
    pub const fn by_type(subject: TypeKey) -> Self {
        Self {
            subject,
            scope: Scope::ByType,
        }
    }

    /// Creates a fresh identity token. Never equal to any previously created token.
    pub fn by_identity(subject: TypeKey, label: impl Into<Cow<'static, str>>) -> Self {
        Self {
            subject,
            scope: Scope::ByIdentity {
                id: NEXT_IDENTITY.fetch_add(1, Ordering::Relaxed),
                label: label.into(),
            },
        }
    }

    pub const fn subject(&self) -> TypeKey {
        self.subject
    }

    pub const fn scope(&self) -> &Scope {
        &self.scope
    }

    /// The diagnostic label, empty for type-scoped tokens.
    pub fn label(&self) -> &str {
        match &self.scope {
            Scope::ByType => "",
            Scope::ByIdentity { label, .. } => label,
        }
    }

    pub const fn is_by_type(&self) -> bool {
        matches!(self.scope, Scope::ByType)
    }
}

impl PartialEq for RawToken {
    fn eq(&self, other: &Self) -> bool {
        match (&self.scope, &other.scope) {
            (Scope::ByType, Scope::ByType) => self.subject == other.subject,
            (Scope::ByIdentity { id: a, .. }, Scope::ByIdentity { id: b, .. }) => a == b,
            _ => false,
        }
    }
}

impl Eq for RawToken {}

impl Hash for RawToken {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match &self.scope {
            Scope::ByType => {
                0u8.hash(state);
                self.subject.hash(state);
            }
            Scope::ByIdentity { id, .. } => {
                1u8.hash(state);
                id.hash(state);
            }
        }
    }
}

impl std::fmt::Display for RawToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.scope {
            Scope::ByType => write!(f, "type {}", self.subject),
            Scope::ByIdentity { label, .. } => {
                write!(f, "token \"{label}\" of type {}", self.subject)
            }
        }
    }
}

/// A token for values of type `Arc<T>`.
///
/// # Example
///
/// ```
/// use knit_core::Token;
///
/// let a = Token::<u32>::new("RETRIES");
/// let b = Token::<u32>::new("RETRIES");
/// assert_ne!(a, b);
/// assert_eq!(a, a.clone());
/// assert_eq!(Token::<u32>::by_type(), Token::<u32>::by_type());
/// ```
pub struct Token<T: ?Sized> {
    raw: RawToken,
    _marker: PhantomData<fn() -> Arc<T>>,
}

impl<T> Token<T>
where
    T: ?Sized + 'static,
{
    /// Creates a token matching every request for `T` by type.
    pub fn by_type() -> Self {
        Self::from_raw(RawToken::by_type(TypeKey::of::<T>()))
    }

    /// Creates a fresh identity token. Values bound under it can only be resolved
    /// through this token or its clones.
    pub fn new(label: impl Into<Cow<'static, str>>) -> Self {
        Self::from_raw(RawToken::by_identity(TypeKey::of::<T>(), label))
    }

    /// Creates a token for values of type `T` registered under the type-scoped
    /// token of the qualifier `Q`.
    pub fn qualified<Q>() -> Self
    where
        Q: ?Sized + 'static,
    {
        Self::from_raw(RawToken::by_type(TypeKey::of::<Q>()))
    }
}

impl<T: ?Sized> Token<T> {
    /// Wraps a raw token. The caller is responsible for the subject matching `T`.
    pub const fn from_raw(raw: RawToken) -> Self {
        Self {
            raw,
            _marker: PhantomData,
        }
    }

    pub const fn raw(&self) -> &RawToken {
        &self.raw
    }

    pub fn into_raw(self) -> RawToken {
        self.raw
    }
}

impl<T: ?Sized> Clone for Token<T> {
    fn clone(&self) -> Self {
        Self::from_raw(self.raw.clone())
    }
}

impl<T: ?Sized> PartialEq for Token<T> {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl<T: ?Sized> Eq for Token<T> {}

impl<T: ?Sized> Hash for Token<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.raw.hash(state);
    }
}

impl<T: ?Sized> std::fmt::Debug for Token<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Token").field(&self.raw).finish()
    }
}

impl<T: ?Sized> std::fmt::Display for Token<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.raw.fmt(f)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    mod app {
        pub struct Database;
        pub struct Pool<T>(pub T);
    }

    #[test]
    fn test_by_type_equality() {
        let a = RawToken::by_type(TypeKey::of::<String>());
        let b = RawToken::by_type(TypeKey::of::<String>());
        let c = RawToken::by_type(TypeKey::of::<u32>());
        assert_eq!(a, b);
        assert_ne!(a, c);

        let set: HashSet<_> = [a, b, c].into_iter().collect();
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_identity_never_aliases() {
        let a = RawToken::by_identity(TypeKey::of::<String>(), "NAME");
        let b = RawToken::by_identity(TypeKey::of::<String>(), "NAME");
        assert_ne!(a, b);
        assert_eq!(a, a.clone());
        assert_ne!(a, RawToken::by_type(TypeKey::of::<String>()));
        assert_eq!(a.label(), "NAME");
    }

    #[test]
    fn test_display() {
        let token = Token::<app::Database>::by_type();
        assert_eq!(token.to_string(), format!("type {}", std::any::type_name::<app::Database>()));

        let token = Token::<u32>::new("RETRIES");
        assert_eq!(token.to_string(), "token \"RETRIES\" of type u32");
    }

    #[test]
    fn test_short_name() {
        assert_eq!(TypeKey::of::<app::Database>().short_name(), "Database");
        assert_eq!(TypeKey::of::<Arc<app::Database>>().short_name(), "Arc<Database>");
        assert_eq!(
            TypeKey::of::<app::Pool<(u8, app::Database)>>().short_name(),
            "Pool<(u8, Database)>"
        );
        assert_eq!(TypeKey::of::<u32>().short_name(), "u32");
    }
}
