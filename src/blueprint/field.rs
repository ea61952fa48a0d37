use knit_core::error::BoxError;
use knit_core::{Erased, Error, Result};

use super::dependency::{Dependency, Param};

type AssignFn<T> = Box<dyn Fn(&T, Option<Erased>) -> Result<()>>;

/// A field populated after construction.
///
/// Fields are assigned through a shared reference, so the field itself needs interior
/// mutability, typically a [`OnceLock`](std::sync::OnceLock).
pub struct Field<T> {
    name: &'static str,
    param: Param,
    assign: AssignFn<T>,
}

impl<T> Field<T>
where
    T: 'static,
{
    /// Creates a field assigned by `setter`.
    pub fn new<D, F>(name: &'static str, setter: F) -> Self
    where
        D: Dependency,
        F: Fn(&T, D) + 'static,
    {
        Self::try_new(name, move |this: &T, value: D| {
            setter(this, value);
            Ok::<_, BoxError>(())
        })
    }

    /// Creates a field assigned by a fallible `setter`.
    pub fn try_new<D, F, E>(name: &'static str, setter: F) -> Self
    where
        D: Dependency,
        F: Fn(&T, D) -> Result<(), E> + 'static,
        E: Into<BoxError>,
    {
        let assign = move |this: &T, value: Option<Erased>| {
            let value = D::extract(value).ok_or_else(|| {
                Error::construction::<T>(format!(
                    "field `{name}` does not fit `{}`",
                    std::any::type_name::<D>()
                ))
            })?;
            setter(this, value).map_err(Error::construction::<T>)
        };

        Self {
            name,
            param: D::param(),
            assign: Box::new(assign),
        }
    }

    pub const fn name(&self) -> &'static str {
        self.name
    }

    pub const fn param(&self) -> &Param {
        &self.param
    }

    /// Assigns a resolved value to this field of `instance`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Construction`] if the value does not fit the field or the setter
    /// fails.
    pub fn assign(&self, instance: &T, value: Option<Erased>) -> Result<()> {
        (self.assign)(instance, value)
    }
}

impl<T> std::fmt::Debug for Field<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Field")
            .field("name", &self.name)
            .field("param", &self.param)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, OnceLock};

    use super::*;

    struct Service;

    #[derive(Default)]
    struct App {
        service: OnceLock<Arc<Service>>,
        name: OnceLock<Option<Arc<String>>>,
    }

    #[test]
    fn test_assign() {
        let field = Field::new("service", |app: &App, service: Arc<Service>| {
            let _ = app.service.set(service);
        });
        assert_eq!(field.name(), "service");
        assert_eq!(*field.param(), Param::required::<Service>());

        let app = App::default();
        field.assign(&app, Some(Erased::new(Service))).unwrap();
        assert!(app.service.get().is_some());
    }

    #[test]
    fn test_assign_optional() {
        let field = Field::new("name", |app: &App, name: Option<Arc<String>>| {
            let _ = app.name.set(name);
        });
        assert!(field.param().is_optional());

        let app = App::default();
        field.assign(&app, None).unwrap();
        assert!(matches!(app.name.get(), Some(None)));
    }

    #[test]
    fn test_assign_fails() {
        let field = Field::try_new("service", |app: &App, service: Arc<Service>| {
            app.service.set(service).map_err(|_| "already assigned")
        });

        let app = App::default();
        field.assign(&app, Some(Erased::new(Service))).unwrap();

        let err = field.assign(&app, Some(Erased::new(Service))).unwrap_err();
        assert!(err.to_string().ends_with("already assigned"));

        let err = field.assign(&app, Some(Erased::new(42u8))).unwrap_err();
        assert!(err.to_string().contains("field `service` does not fit"));
    }
}
