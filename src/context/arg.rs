//! Resolving function parameters from the container.
//!
//! Constructors, [`invoke`](super::Container::invoke) and
//! [`go`](super::Container::go) accept plain closures. Each parameter type
//! says how it is resolved, and an optional positional [`Arg`] refines it:
//!
//! | parameter         | resolved as                         | `Arg`                  |
//! |-------------------|-------------------------------------|------------------------|
//! | `Arc<T>`          | the single bean providing `T`       | `Arg::Bean(selector)`  |
//! | `Vec<Arc<T>>`     | collected beans providing `T`       | `Arg::Collect(..)`     |
//! | `Option<X>`       | `X`, or `None` when no bean matches | as for `X`             |
//! | `Prop<T>`         | `T` bound from properties           | `Arg::Value(tag)`      |
//! | `Container`       | the refreshed container             | none                   |

use std::sync::Arc;

use super::assembly::Assembly;
use super::{Container, ContainerError, Selector};
use crate::config::{Bind, BindOptions, BoxError};

/// A positional argument for a function parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Arg {
    Bean(Selector),
    Collect(Vec<Selector>),
    /// A property tag such as `${server.port:=8080}`.
    Value(String),
}

impl Arg {
    fn describe(&self) -> String {
        match self {
            Arg::Bean(selector) => format!("bean selector '{selector}'"),
            Arg::Collect(selectors) => format!("{} collect selectors", selectors.len()),
            Arg::Value(tag) => format!("value tag '{tag}'"),
        }
    }
}

impl From<Selector> for Arg {
    fn from(selector: Selector) -> Self {
        Arg::Bean(selector)
    }
}

/// `"${...}"` becomes [`Arg::Value`], anything else a bean selector.
impl From<&str> for Arg {
    fn from(s: &str) -> Self {
        if s.starts_with("${") {
            Arg::Value(s.to_string())
        } else {
            Arg::Bean(Selector::from(s))
        }
    }
}

/// A parameter type the container knows how to supply.
pub trait FromContainer: Sized {
    fn from_container(assembly: &mut Assembly<'_>, index: usize, arg: Option<&Arg>) -> Result<Self, ContainerError>;

    /// Whether anything matches, checked without wiring. An `Option`
    /// parameter is `None` exactly when this is false.
    fn available(_assembly: &Assembly<'_>, _arg: Option<&Arg>) -> bool {
        true
    }
}

impl<T: ?Sized + Send + Sync + 'static> FromContainer for Arc<T> {
    fn from_container(assembly: &mut Assembly<'_>, index: usize, arg: Option<&Arg>) -> Result<Self, ContainerError> {
        match arg {
            None => assembly.get::<T>(&Selector::Inferred),
            Some(Arg::Bean(selector)) => assembly.get::<T>(selector),
            Some(other) => Err(ContainerError::InvalidArgument {
                index,
                expected: "a bean selector",
                found: other.describe(),
            }),
        }
    }

    fn available(assembly: &Assembly<'_>, arg: Option<&Arg>) -> bool {
        match arg {
            None => assembly.provides::<T>(&Selector::Inferred),
            Some(Arg::Bean(selector)) => assembly.provides::<T>(selector),
            Some(_) => true,
        }
    }
}

impl<T: ?Sized + Send + Sync + 'static> FromContainer for Vec<Arc<T>> {
    fn from_container(assembly: &mut Assembly<'_>, index: usize, arg: Option<&Arg>) -> Result<Self, ContainerError> {
        match arg {
            None => assembly.collect::<T>(&[]),
            Some(Arg::Collect(selectors)) => assembly.collect::<T>(selectors),
            Some(Arg::Bean(selector)) => assembly.collect::<T>(std::slice::from_ref(selector)),
            Some(other) => Err(ContainerError::InvalidArgument {
                index,
                expected: "collect selectors",
                found: other.describe(),
            }),
        }
    }

    fn available(assembly: &Assembly<'_>, arg: Option<&Arg>) -> bool {
        match arg {
            None => assembly.provides_any::<T>(),
            Some(Arg::Collect(selectors)) if selectors.is_empty() => assembly.provides_any::<T>(),
            Some(Arg::Collect(selectors)) => selectors.iter().all(|s| assembly.provides::<T>(s)),
            Some(Arg::Bean(selector)) => assembly.provides::<T>(selector),
            Some(_) => true,
        }
    }
}

impl<X: FromContainer> FromContainer for Option<X> {
    fn from_container(assembly: &mut Assembly<'_>, index: usize, arg: Option<&Arg>) -> Result<Self, ContainerError> {
        if !X::available(assembly, arg) {
            return Ok(None);
        }
        // a matched bean that fails to wire is an error, not an absence
        X::from_container(assembly, index, arg).map(Some)
    }
}

/// Available once the container is refreshed; during refresh it is reported
/// as not found, so `Option<Container>` yields `None`.
impl FromContainer for Container {
    fn from_container(assembly: &mut Assembly<'_>, index: usize, arg: Option<&Arg>) -> Result<Self, ContainerError> {
        if let Some(arg) = arg {
            return Err(ContainerError::InvalidArgument {
                index,
                expected: "no argument",
                found: arg.describe(),
            });
        }
        assembly.container().cloned().ok_or_else(|| ContainerError::BeanNotFound {
            type_name: std::any::type_name::<Container>(),
            selector: Selector::Inferred.to_string(),
        })
    }

    fn available(assembly: &Assembly<'_>, _arg: Option<&Arg>) -> bool {
        assembly.container().is_some()
    }
}

/// A parameter bound from properties at the tag given by [`Arg::Value`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Prop<T>(pub T);

impl<T> Prop<T> {
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T> std::ops::Deref for Prop<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.0
    }
}

impl<T: Bind + Default> FromContainer for Prop<T> {
    fn from_container(assembly: &mut Assembly<'_>, index: usize, arg: Option<&Arg>) -> Result<Self, ContainerError> {
        match arg {
            Some(Arg::Value(tag)) => {
                let mut value = T::default();
                assembly.bind(&mut value, BindOptions::tag(tag.clone()))?;
                Ok(Prop(value))
            }
            Some(other) => Err(ContainerError::InvalidArgument {
                index,
                expected: "a value tag",
                found: other.describe(),
            }),
            None => Err(ContainerError::MissingArgument {
                index,
                expected: "a value tag",
            }),
        }
    }
}

/// A function whose parameters can all be resolved from the container.
///
/// Implemented for closures and functions of up to eight [`FromContainer`]
/// parameters.
pub trait Handler<Args> {
    type Output;

    fn call(self, assembly: &mut Assembly<'_>, args: &[Arg]) -> Result<Self::Output, ContainerError>;
}

macro_rules! impl_handler {
    ($($ty:ident),*) => {
        impl<F, R, $($ty,)*> Handler<($($ty,)*)> for F
        where
            F: FnOnce($($ty),*) -> R,
            $($ty: FromContainer,)*
        {
            type Output = R;

            #[allow(non_snake_case, unused_mut, unused_variables)]
            fn call(self, assembly: &mut Assembly<'_>, args: &[Arg]) -> Result<R, ContainerError> {
                let mut index = 0;
                $(
                    let $ty = $ty::from_container(assembly, index, args.get(index))?;
                    index += 1;
                )*
                if args.len() > index {
                    return Err(ContainerError::TooManyArguments {
                        expected: index,
                        given: args.len(),
                    });
                }
                Ok(self($($ty),*))
            }
        }
    };
}

impl_handler!();
impl_handler!(A1);
impl_handler!(A1, A2);
impl_handler!(A1, A2, A3);
impl_handler!(A1, A2, A3, A4);
impl_handler!(A1, A2, A3, A4, A5);
impl_handler!(A1, A2, A3, A4, A5, A6);
impl_handler!(A1, A2, A3, A4, A5, A6, A7);
impl_handler!(A1, A2, A3, A4, A5, A6, A7, A8);

/// Return types accepted by `invoke` and `go`: `()` or `Result<(), E>`.
pub trait InvokeOutput {
    fn into_result(self) -> Result<(), BoxError>;
}

impl InvokeOutput for () {
    fn into_result(self) -> Result<(), BoxError> {
        Ok(())
    }
}

impl<E: Into<BoxError>> InvokeOutput for Result<(), E> {
    fn into_result(self) -> Result<(), BoxError> {
        self.map_err(Into::into)
    }
}
