//! Bean definitions.

use std::any::{type_name, Any, TypeId};
use std::fmt;
use std::sync::Arc;

use super::arg::{Arg, Handler};
use super::assembly::Assembly;
use super::ContainerError;
use crate::config::{Bind, BindOptions, BoxError};

/// A wired singleton with its concrete type erased.
pub(crate) type Instance = Arc<dyn Any + Send + Sync>;

type Cast = Arc<dyn Fn(&Instance) -> Option<Box<dyn Any + Send + Sync>> + Send + Sync>;
type Factory<T> = Box<dyn FnOnce(&mut Assembly<'_>, &[Arg], &str) -> Result<T, ContainerError>>;
type Injector<T> = Box<dyn FnOnce(&mut T, &mut Assembly<'_>) -> Result<(), ContainerError>>;
type InitFn<T> = Box<dyn FnOnce(&mut T) -> Result<(), BoxError>>;
pub(crate) type LinkFn<T> = Box<dyn FnOnce(&T, &mut Assembly<'_>) -> Result<(), ContainerError>>;
pub(crate) type LinkAllFn = Box<dyn FnOnce(&Instance, &mut Assembly<'_>) -> Result<(), ContainerError>>;
pub(crate) type DestroyFn = Box<dyn Fn(&Instance) + Send + Sync>;
pub(crate) type BuildFn = Box<dyn FnOnce(&mut Assembly<'_>) -> Result<Box<dyn Pending>, ContainerError>>;

/// Wiring progress of a definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Unwired,
    /// Constructor or injectors are running.
    Wiring,
    /// Constructed and injected, init callback pending.
    Wired,
    Ready,
    /// Constructor, injector or init callback returned an error.
    Failed,
}

/// One type a bean can be looked up as.
#[derive(Clone)]
pub(crate) struct Export {
    pub type_id: TypeId,
    pub type_name: &'static str,
    /// Set for group beans: the instance is a `Vec<Arc<E>>` flattened by collect.
    pub elements: bool,
    cast: Cast,
}

impl Export {
    fn view<T, U>(convert: impl Fn(Arc<T>) -> Arc<U> + Send + Sync + 'static) -> Self
    where
        T: Send + Sync + 'static,
        U: ?Sized + Send + Sync + 'static,
    {
        Self {
            type_id: TypeId::of::<U>(),
            type_name: type_name::<U>(),
            elements: false,
            cast: Arc::new(move |instance: &Instance| {
                let concrete = Arc::clone(instance).downcast::<T>().ok()?;
                Some(Box::new(convert(concrete)) as Box<dyn Any + Send + Sync>)
            }),
        }
    }

    fn elements<E>() -> Self
    where
        E: ?Sized + Send + Sync + 'static,
    {
        Self {
            type_id: TypeId::of::<E>(),
            type_name: type_name::<E>(),
            elements: true,
            cast: Arc::new(|instance: &Instance| {
                let group = Arc::clone(instance).downcast::<Vec<Arc<E>>>().ok()?;
                Some(Box::new(group.as_ref().clone()) as Box<dyn Any + Send + Sync>)
            }),
        }
    }

    pub fn cast<U: ?Sized + Send + Sync + 'static>(&self, instance: &Instance) -> Option<Arc<U>> {
        (self.cast)(instance)?.downcast::<Arc<U>>().ok().map(|b| *b)
    }

    pub fn cast_elements<U: ?Sized + Send + Sync + 'static>(&self, instance: &Instance) -> Option<Vec<Arc<U>>> {
        (self.cast)(instance)?.downcast::<Vec<Arc<U>>>().ok().map(|b| *b)
    }
}

impl fmt::Debug for Export {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Export")
            .field("type_name", &self.type_name)
            .field("elements", &self.elements)
            .finish()
    }
}

/// Identity of a definition: its name, own type and exported views.
#[derive(Debug, Clone)]
pub(crate) struct BeanMeta {
    pub name: String,
    pub type_name: &'static str,
    pub exports: Vec<Export>,
}

impl BeanMeta {
    pub fn export(&self, type_id: TypeId, elements: bool) -> Option<&Export> {
        self.exports
            .iter()
            .find(|e| e.type_id == type_id && e.elements == elements)
    }
}

/// Definition of a bean of type `T`.
///
/// ```
/// use std::sync::Arc;
/// use propwire::{Bean, ContainerBuilder, Selector};
///
/// trait Greeter: Send + Sync {
///     fn greet(&self) -> String;
/// }
///
/// struct English;
/// impl Greeter for English {
///     fn greet(&self) -> String {
///         "hello".into()
///     }
/// }
///
/// let container = ContainerBuilder::new()
///     .bean(Bean::object(English).name("en").export::<dyn Greeter>(|e| e))
///     .refresh()?;
///
/// let greeter: Arc<dyn Greeter> = container.get::<dyn Greeter>("en")?;
/// assert_eq!(greeter.greet(), "hello");
/// # Ok::<(), propwire::ContainerError>(())
/// ```
#[must_use = "a bean does nothing until registered"]
pub struct Bean<T> {
    meta: BeanMeta,
    args: Vec<Arg>,
    factory: Factory<T>,
    injectors: Vec<Injector<T>>,
    init: Option<InitFn<T>>,
    links: Vec<LinkFn<T>>,
    destroy: Option<DestroyFn>,
}

fn factory<T, F>(f: F) -> Factory<T>
where
    F: FnOnce(&mut Assembly<'_>, &[Arg], &str) -> Result<T, ContainerError> + 'static,
{
    Box::new(f)
}

fn build_fn<F>(f: F) -> BuildFn
where
    F: FnOnce(&mut Assembly<'_>) -> Result<Box<dyn Pending>, ContainerError> + 'static,
{
    Box::new(f)
}

fn link_all_fn<F>(f: F) -> LinkAllFn
where
    F: FnOnce(&Instance, &mut Assembly<'_>) -> Result<(), ContainerError> + 'static,
{
    Box::new(f)
}

impl<T: Send + Sync + 'static> Bean<T> {
    fn with_factory(factory: Factory<T>) -> Self {
        Self {
            meta: BeanMeta {
                name: type_name::<T>().to_string(),
                type_name: type_name::<T>(),
                exports: vec![Export::view::<T, T>(|this| this)],
            },
            args: Vec::new(),
            factory,
            injectors: Vec::new(),
            init: None,
            links: Vec::new(),
            destroy: None,
        }
    }

    /// A bean around an existing value.
    pub fn object(value: T) -> Self {
        Self::with_factory(factory(move |_, _, _| Ok(value)))
    }

    /// A bean built by `ctor`, whose parameters are resolved from the container.
    pub fn from_fn<F, A>(ctor: F) -> Self
    where
        F: Handler<A, Output = T> + 'static,
    {
        Self::with_factory(factory(move |assembly, args, _| ctor.call(assembly, args)))
    }

    /// Like [`from_fn`](Self::from_fn) for constructors returning `Result`.
    pub fn try_from_fn<F, A, E>(ctor: F) -> Self
    where
        F: Handler<A, Output = Result<T, E>> + 'static,
        E: Into<BoxError>,
    {
        Self::with_factory(factory(move |assembly, args, name| {
            ctor.call(assembly, args)?
                .map_err(|e| ContainerError::Construct {
                    bean: name.to_string(),
                    source: e.into(),
                })
        }))
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.meta.name = name.into();
        self
    }

    /// Positional arguments for the constructor's parameters.
    pub fn args(mut self, args: impl IntoIterator<Item = Arg>) -> Self {
        self.args = args.into_iter().collect();
        self
    }

    /// Adds a field injector, run after construction in registration order.
    pub fn inject<F>(mut self, inject: F) -> Self
    where
        F: FnOnce(&mut T, &mut Assembly<'_>) -> Result<(), ContainerError> + 'static,
    {
        self.injectors.push(Box::new(inject));
        self
    }

    /// Binds properties onto the bean at `tag` (`${server}`), in injector order.
    pub fn bind(self, tag: impl Into<String>) -> Self
    where
        T: Bind,
    {
        let opts = BindOptions::tag(tag);
        self.inject(move |this, assembly| assembly.bind(this, opts))
    }

    /// Runs once the bean and all its dependencies are wired.
    pub fn init<E>(mut self, init: impl FnOnce(&mut T) -> Result<(), E> + 'static) -> Self
    where
        E: Into<BoxError>,
    {
        self.init = Some(Box::new(move |this: &mut T| init(this).map_err(Into::into)));
        self
    }

    /// Runs once every registered bean is ready, in registration order.
    ///
    /// Only a shared reference is available, so links suit references that
    /// would be cycles at construction time: two singletons pointing at each
    /// other keep a `OnceLock<Weak<_>>` and fill it here.
    pub fn link<F>(mut self, link: F) -> Self
    where
        F: FnOnce(&T, &mut Assembly<'_>) -> Result<(), ContainerError> + 'static,
    {
        self.links.push(Box::new(link));
        self
    }

    /// Runs when the container closes, in reverse readiness order.
    pub fn destroy(mut self, destroy: impl Fn(&T) + Send + Sync + 'static) -> Self {
        self.destroy = Some(Box::new(move |instance: &Instance| {
            if let Some(this) = instance.downcast_ref::<T>() {
                destroy(this);
            }
        }));
        self
    }

    /// Makes the bean available as `U`, typically a trait object.
    pub fn export<U>(mut self, convert: impl Fn(Arc<T>) -> Arc<U> + Send + Sync + 'static) -> Self
    where
        U: ?Sized + Send + Sync + 'static,
    {
        self.meta.exports.push(Export::view::<T, U>(convert));
        self
    }

    pub(crate) fn meta(&self) -> &BeanMeta {
        &self.meta
    }

    pub(crate) fn take_links(&mut self) -> Vec<LinkFn<T>> {
        std::mem::take(&mut self.links)
    }

    /// Runs constructor and injectors, leaving the init callback pending.
    pub(crate) fn build(self, assembly: &mut Assembly<'_>) -> Result<PendingBean<T>, ContainerError> {
        let Bean {
            meta,
            args,
            factory,
            injectors,
            init,
            links: _,
            destroy: _,
        } = self;

        let mut value = factory(assembly, &args, &meta.name)?;
        for inject in injectors {
            inject(&mut value, assembly)?;
        }
        Ok(PendingBean {
            name: meta.name,
            value,
            init,
        })
    }

    pub(crate) fn into_definition(mut self) -> Definition {
        let meta = self.meta.clone();
        let destroy = self.destroy.take();
        let links = self.take_links();
        let link = (!links.is_empty()).then(|| {
            link_all_fn(move |instance, assembly| {
                let Some(this) = instance.downcast_ref::<T>() else {
                    return Ok(());
                };
                links.into_iter().try_for_each(|link| link(this, assembly))
            })
        });
        Definition {
            meta,
            state: State::Unwired,
            build: Some(build_fn(move |assembly| {
                self.build(assembly).map(|p| Box::new(p) as Box<dyn Pending>)
            })),
            instance: None,
            link,
            destroy,
        }
    }
}

impl<E: ?Sized + Send + Sync + 'static> Bean<Vec<Arc<E>>> {
    /// Marks a `Vec<Arc<E>>` bean as a group: auto-mode collects of `E`
    /// include each of its elements.
    pub fn group(mut self) -> Self {
        self.meta.exports.push(Export::elements::<E>());
        self
    }
}

impl<T> fmt::Debug for Bean<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bean")
            .field("meta", &self.meta)
            .field("args", &self.args)
            .field("injectors", &self.injectors.len())
            .field("links", &self.links.len())
            .finish_non_exhaustive()
    }
}

/// A constructed bean whose init callback has not run yet.
pub(crate) struct PendingBean<T> {
    name: String,
    value: T,
    init: Option<InitFn<T>>,
}

impl<T> PendingBean<T> {
    pub fn finish(mut self) -> Result<T, ContainerError> {
        self.run_init()?;
        Ok(self.value)
    }

    fn run_init(&mut self) -> Result<(), ContainerError> {
        match self.init.take() {
            Some(init) => init(&mut self.value).map_err(|source| ContainerError::Init {
                bean: self.name.clone(),
                source,
            }),
            None => Ok(()),
        }
    }
}

/// Type-erased [`PendingBean`].
pub(crate) trait Pending {
    fn init(&mut self) -> Result<(), ContainerError>;
    fn into_instance(self: Box<Self>) -> Instance;
}

impl<T: Send + Sync + 'static> Pending for PendingBean<T> {
    fn init(&mut self) -> Result<(), ContainerError> {
        self.run_init()
    }

    fn into_instance(self: Box<Self>) -> Instance {
        Arc::new(self.value)
    }
}

/// Arena node for a registered bean.
pub(crate) struct Definition {
    pub meta: BeanMeta,
    pub state: State,
    pub build: Option<BuildFn>,
    pub instance: Option<Instance>,
    pub link: Option<LinkAllFn>,
    pub destroy: Option<DestroyFn>,
}

/// A ready bean after refresh.
#[derive(Debug)]
pub(crate) struct Singleton {
    pub meta: BeanMeta,
    pub instance: Instance,
}

impl fmt::Debug for Definition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Definition")
            .field("meta", &self.meta)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}
