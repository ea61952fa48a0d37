//! Cycle detection for a single resolution pass.

use std::cell::RefCell;
use std::collections::HashSet;

use crate::error::{Error, Result};
use crate::token::TypeKey;

#[derive(Debug, Default)]
struct Inner {
    stack: Vec<TypeKey>,
    members: HashSet<TypeKey>,
}

/// [`Trace`] records the types currently under construction.
///
/// A trace belongs to exactly one top-level resolution and is shared by reference
/// through every nested step. A type can only be on the trace once; pushing it again
/// means the object graph loops back on itself.
///
/// # Example
///
/// ```
/// use knit_core::{Trace, TypeKey};
///
/// struct A;
/// struct B;
///
/// let trace = Trace::new();
/// let a = trace.push(TypeKey::of::<A>()).unwrap();
/// let b = trace.push(TypeKey::of::<B>()).unwrap();
///
/// let err = trace.push(TypeKey::of::<A>()).unwrap_err();
/// assert_eq!(err.cycle(), Some("A -> B -> A"));
///
/// drop(b);
/// drop(a);
/// assert!(trace.is_empty());
/// ```
#[derive(Debug, Default)]
pub struct Trace {
    inner: RefCell<Inner>,
}

/// An entry on a [`Trace`]. Dropping the frame pops the entry.
#[derive(Debug)]
#[must_use = "dropping a frame immediately pops it from the trace"]
pub struct Frame<'t> {
    trace: &'t Trace,
    key: TypeKey,
}

impl Trace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pushes `key` onto the trace.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CircularDependency`] if `key` is already on the trace. The trace
    /// is left unchanged in that case.
    pub fn push(&self, key: TypeKey) -> Result<Frame<'_>> {
        let mut inner = self.inner.borrow_mut();
        if !inner.members.insert(key) {
            let chain = render_chain(inner.stack.iter().chain(Some(&key)));
            return Err(Error::CircularDependency { chain });
        }
        inner.stack.push(key);
        drop(inner);

        Ok(Frame { trace: self, key })
    }

    fn pop(&self, key: TypeKey) {
        let mut inner = self.inner.borrow_mut();
        let top = inner.stack.pop();
        debug_assert_eq!(top, Some(key), "trace frames must be dropped in LIFO order");
        inner.members.remove(&key);
    }

    pub fn contains(&self, key: TypeKey) -> bool {
        self.inner.borrow().members.contains(&key)
    }

    pub fn depth(&self) -> usize {
        self.inner.borrow().stack.len()
    }

    pub fn is_empty(&self) -> bool {
        self.depth() == 0
    }

    /// Renders the trace as `A -> B -> C` in push order.
    ///
    /// Types are shown by their short names, except for distinct types sharing one.
    pub fn render(&self) -> String {
        render_chain(self.inner.borrow().stack.iter())
    }
}

fn render_chain<'a>(keys: impl Iterator<Item = &'a TypeKey>) -> String {
    let keys: Vec<(&TypeKey, String)> = keys.map(|key| (key, key.short_name())).collect();

    keys.iter()
        .map(|(key, short)| {
            let collides = keys
                .iter()
                .any(|(other, other_short)| other_short == short && other != key);
            if collides {
                key.name().to_string()
            } else {
                short.clone()
            }
        })
        .collect::<Vec<_>>()
        .join(" -> ")
}

impl std::fmt::Display for Trace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.render())
    }
}

impl Frame<'_> {
    pub const fn key(&self) -> TypeKey {
        self.key
    }
}

impl Drop for Frame<'_> {
    fn drop(&mut self) {
        self.trace.pop(self.key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct A;
    struct B;
    struct C;

    #[test]
    fn test_push_and_pop() {
        let trace = Trace::new();
        let a = trace.push(TypeKey::of::<A>()).unwrap();
        assert!(trace.contains(TypeKey::of::<A>()));
        assert_eq!(a.key(), TypeKey::of::<A>());

        {
            let _b = trace.push(TypeKey::of::<B>()).unwrap();
            assert_eq!(trace.depth(), 2);
            assert_eq!(trace.render(), "A -> B");
        }

        assert_eq!(trace.depth(), 1);
        assert!(!trace.contains(TypeKey::of::<B>()));

        drop(a);
        assert!(trace.is_empty());
        assert_eq!(trace.render(), "");
    }

    #[test]
    fn test_cycle_leaves_trace_unchanged() {
        let trace = Trace::new();
        let _a = trace.push(TypeKey::of::<A>()).unwrap();
        let _b = trace.push(TypeKey::of::<B>()).unwrap();
        let _c = trace.push(TypeKey::of::<C>()).unwrap();

        let err = trace.push(TypeKey::of::<B>()).unwrap_err();
        assert!(err.is_circular_dependency());
        assert_eq!(err.cycle(), Some("A -> B -> C -> B"));
        assert_eq!(trace.to_string(), "A -> B -> C");
    }

    #[test]
    fn test_self_cycle() {
        let trace = Trace::new();
        let _a = trace.push(TypeKey::of::<A>()).unwrap();
        let err = trace.push(TypeKey::of::<A>()).unwrap_err();
        assert_eq!(err.cycle(), Some("A -> A"));
    }

    mod primary {
        pub struct Config;
    }

    mod replica {
        pub struct Config;
    }

    #[test]
    fn test_colliding_short_names() {
        let primary = TypeKey::of::<primary::Config>();
        let replica = TypeKey::of::<replica::Config>();

        let trace = Trace::new();
        let _a = trace.push(TypeKey::of::<A>()).unwrap();
        let _primary = trace.push(primary).unwrap();
        let _replica = trace.push(replica).unwrap();

        let err = trace.push(primary).unwrap_err();
        assert_eq!(
            err.cycle(),
            Some(
                format!(
                    "A -> {} -> {} -> {}",
                    primary.name(),
                    replica.name(),
                    primary.name()
                )
                .as_str()
            )
        );
        assert_ne!(primary.short_name(), primary.name());
    }

    #[test]
    fn test_pop_on_error_path() {
        fn fails(trace: &Trace) -> Result<()> {
            let _frame = trace.push(TypeKey::of::<B>())?;
            Err(Error::construction::<B>("boom"))
        }

        let trace = Trace::new();
        let _a = trace.push(TypeKey::of::<A>()).unwrap();
        assert!(fails(&trace).is_err());
        assert_eq!(trace.render(), "A");

        // a sibling resolution of the same type must not see a stale entry
        assert!(fails(&trace).unwrap_err().is_construction());
    }
}
