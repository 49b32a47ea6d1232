//! Dependency container built on top of the property store.
//!
//! Beans are registered on a [`ContainerBuilder`]. [`refresh`](ContainerBuilder::refresh)
//! wires every definition once, depth first, and returns an immutable
//! [`Container`] that can be cloned and shared across threads.
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use propwire::{Arg, Bean, Config, ContainerBuilder, Prop};
//!
//! struct Database {
//!     url: String,
//! }
//!
//! struct Repository {
//!     db: Arc<Database>,
//! }
//!
//! let props = Config::builder()
//!     .with_value("db.url", "postgres://localhost/app")
//!     .build()?;
//!
//! let container = ContainerBuilder::new()
//!     .with_properties(props)
//!     .bean(
//!         Bean::from_fn(|url: Prop<String>| Database { url: url.into_inner() })
//!             .args([Arg::from("${db.url}")]),
//!     )
//!     .bean(Bean::from_fn(|db: Arc<Database>| Repository { db }))
//!     .refresh()?;
//!
//! let repo = container.get::<Repository>("")?;
//! assert_eq!(repo.db.url, "postgres://localhost/app");
//! # Ok::<(), propwire::Error>(())
//! ```

mod arg;
mod assembly;
mod bean;
mod error;
mod selector;
mod task;

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

pub use arg::{Arg, FromContainer, Handler, InvokeOutput, Prop};
pub use assembly::Assembly;
pub use bean::{Bean, State};
pub use error::ContainerError;
pub use selector::{BeanInfo, Selector};

use crate::config::{Bind, BindOptions, Properties};
use assembly::Destroyer;
use bean::{BeanMeta, Definition, Singleton};
use task::TaskTracker;

/// Registration phase of a [`Container`].
#[derive(Debug, Default)]
#[must_use = "builders do nothing until .refresh() is called"]
pub struct ContainerBuilder {
    defs: Vec<Definition>,
    properties: Properties,
}

impl ContainerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the property store used for value injection and binding.
    pub fn with_properties(mut self, properties: Properties) -> Self {
        self.properties = properties;
        self
    }

    pub fn bean<T: Send + Sync + 'static>(mut self, bean: Bean<T>) -> Self {
        self.register(bean);
        self
    }

    /// Registers an existing value under its type name.
    pub fn object<T: Send + Sync + 'static>(self, value: T) -> Self {
        self.bean(Bean::object(value))
    }

    pub fn register<T: Send + Sync + 'static>(&mut self, bean: Bean<T>) {
        tracing::debug!(bean = %bean.meta().name, "bean registered");
        self.defs.push(bean.into_definition());
    }

    /// Definitions matching `selector`; nothing is wired.
    pub fn find(&self, selector: impl Into<Selector>) -> Vec<BeanInfo> {
        find_in(self.defs.iter().map(|d| (&d.meta, d.state)), &selector.into())
    }

    /// Wires every definition in registration order.
    ///
    /// Each bean's init callback runs right after the bean itself is wired,
    /// so dependencies are initialised first. Once all beans are ready their
    /// [`link`](Bean::link) callbacks run, again in registration order. If
    /// any bean fails, the destroy callbacks of the beans already ready run
    /// in reverse order before the error is returned.
    pub fn refresh(self) -> Result<Container, ContainerError> {
        let ContainerBuilder { mut defs, properties } = self;

        let count = defs.len();
        let mut assembly = Assembly::refreshing(&mut defs, &properties);
        let wired = assemble(&mut assembly, count);
        let destroyers = assembly.into_destroyers();
        if let Err(e) = wired {
            for destroyer in destroyers.into_iter().rev() {
                destroyer.run();
            }
            return Err(e);
        }

        let singletons: Vec<Singleton> = defs
            .into_iter()
            .filter_map(|def| {
                def.instance.map(|instance| Singleton {
                    meta: def.meta,
                    instance,
                })
            })
            .collect();
        tracing::info!(beans = singletons.len(), "container refreshed");

        Ok(Container {
            inner: Arc::new(Inner {
                properties,
                singletons,
                destroyers: Mutex::new(destroyers),
                tasks: TaskTracker::default(),
            }),
        })
    }
}

fn assemble(assembly: &mut Assembly<'_>, count: usize) -> Result<(), ContainerError> {
    for idx in 0..count {
        assembly.wire(idx)?;
    }
    for idx in 0..count {
        assembly.link(idx)?;
    }
    Ok(())
}

fn find_in<'a>(beans: impl Iterator<Item = (&'a BeanMeta, State)>, selector: &Selector) -> Vec<BeanInfo> {
    beans
        .filter(|(meta, _)| selector.matches(meta))
        .map(|(meta, state)| BeanInfo::new(meta, state))
        .collect()
}

/// A refreshed container: every registered bean is ready.
///
/// Cloning is cheap; clones share the same beans, properties and tasks.
#[derive(Clone)]
pub struct Container {
    inner: Arc<Inner>,
}

struct Inner {
    properties: Properties,
    singletons: Vec<Singleton>,
    destroyers: Mutex<Vec<Destroyer>>,
    tasks: TaskTracker,
}

impl Container {
    pub fn properties(&self) -> &Properties {
        &self.inner.properties
    }

    pub fn prop(&self, key: &str) -> Option<&str> {
        self.inner.properties.get(key)
    }

    pub fn prop_or(&self, key: &str, default: impl ToString) -> String {
        self.inner.properties.get_or(key, default)
    }

    /// The single bean providing `T` that matches `selector`.
    pub fn get<T>(&self, selector: impl Into<Selector>) -> Result<Arc<T>, ContainerError>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        Assembly::ready(self).get::<T>(&selector.into())
    }

    pub fn find(&self, selector: impl Into<Selector>) -> Vec<BeanInfo> {
        find_in(
            self.inner.singletons.iter().map(|s| (&s.meta, State::Ready)),
            &selector.into(),
        )
    }

    /// See [`Assembly::collect`].
    pub fn collect<T>(&self, selectors: &[Selector]) -> Result<Vec<Arc<T>>, ContainerError>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        Assembly::ready(self).collect::<T>(selectors)
    }

    pub fn bind<T: Bind + ?Sized>(&self, target: &mut T, opts: BindOptions) -> Result<(), ContainerError> {
        Ok(self.inner.properties.bind_with(target, opts)?)
    }

    /// Constructs, injects and initialises `bean` without registering it.
    ///
    /// The caller owns the result; its destroy callback is never run.
    pub fn wire<T: Send + Sync + 'static>(&self, bean: Bean<T>) -> Result<T, ContainerError> {
        Assembly::ready(self).wire_bean(bean)
    }

    /// Calls `f` with its parameters resolved from the container.
    pub fn invoke<F, A>(&self, f: F, args: &[Arg]) -> Result<(), ContainerError>
    where
        F: Handler<A>,
        F::Output: InvokeOutput,
    {
        let output = f.call(&mut Assembly::ready(self), args)?;
        output.into_result().map_err(ContainerError::Invoke)
    }

    /// Runs `f` on its own thread.
    ///
    /// Parameters are resolved inside the task. Resolution errors, returned
    /// errors and panics are logged and never reach the caller;
    /// [`wait`](Self::wait) and [`close`](Self::close) join the task.
    pub fn go<F, A>(&self, f: F, args: &[Arg]) -> Result<(), ContainerError>
    where
        F: Handler<A> + Send + 'static,
        F::Output: InvokeOutput,
        A: 'static,
    {
        let container = self.clone();
        let args = args.to_vec();
        self.inner.tasks.spawn(move || {
            let output = f.call(&mut Assembly::ready(&container), &args)?;
            output.into_result()
        })
    }

    /// Blocks until every task started with [`go`](Self::go) has finished.
    pub fn wait(&self) {
        self.inner.tasks.wait();
    }

    /// Joins all tasks, then runs destroy callbacks in reverse readiness order.
    ///
    /// Callbacks run once; closing again only waits for tasks.
    pub fn close(&self) {
        self.wait();
        let destroyers = std::mem::take(
            &mut *self
                .inner
                .destroyers
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        );
        for destroyer in destroyers.into_iter().rev() {
            destroyer.run();
        }
        tracing::info!("container closed");
    }

    pub(crate) fn singletons(&self) -> &[Singleton] {
        &self.inner.singletons
    }
}

impl fmt::Debug for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Container")
            .field("beans", &self.inner.singletons.len())
            .field("properties", &self.inner.properties.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BoxError;
    use crate::{bindable, ConfigError};
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};

    trait Greeter: Send + Sync + fmt::Debug {
        fn greet(&self) -> String;
    }

    #[derive(Debug)]
    struct Fixed(&'static str);

    impl Greeter for Fixed {
        fn greet(&self) -> String {
            self.0.to_string()
        }
    }

    fn greeter(name: &'static str) -> Bean<Fixed> {
        Bean::object(Fixed(name)).name(name).export::<dyn Greeter>(|g| g)
    }

    fn greetings(greeters: &[Arc<dyn Greeter>]) -> Vec<String> {
        greeters.iter().map(|g| g.greet()).collect()
    }

    type Log = Arc<Mutex<Vec<String>>>;

    fn record(log: &Log, entry: &str) {
        log.lock().unwrap().push(entry.to_string());
    }

    #[derive(Default)]
    struct Counter {
        hits: AtomicUsize,
    }

    #[test]
    fn test_selective_collect_follows_selector_order() {
        let container = ContainerBuilder::new()
            .bean(greeter("a"))
            .bean(greeter("b"))
            .bean(greeter("c"))
            .refresh()
            .unwrap();

        let picked = container
            .collect::<dyn Greeter>(&[Selector::from("c"), Selector::from("a")])
            .unwrap();
        assert_eq!(greetings(&picked), vec!["c", "a"]);

        let all = container.collect::<dyn Greeter>(&[]).unwrap();
        assert_eq!(greetings(&all), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_cardinality_errors() {
        let container = ContainerBuilder::new()
            .bean(greeter("a"))
            .bean(greeter("b"))
            .refresh()
            .unwrap();

        let err = container.get::<dyn Greeter>("").unwrap_err();
        assert!(matches!(
            err,
            ContainerError::AmbiguousBean { ref candidates, .. } if candidates == &["a", "b"]
        ));

        let err = container.get::<dyn Greeter>("missing").unwrap_err();
        assert!(matches!(err, ContainerError::BeanNotFound { ref selector, .. } if selector == "missing"));

        let err = container
            .collect::<dyn Greeter>(&[Selector::from("a"), Selector::from("missing")])
            .unwrap_err();
        assert!(matches!(err, ContainerError::BeanNotFound { .. }));

        assert!(matches!(
            container.collect::<Counter>(&[]),
            Err(ContainerError::BeanNotFound { .. })
        ));

        assert_eq!(container.get::<dyn Greeter>("b").unwrap().greet(), "b");
    }

    #[test]
    fn test_type_selector() {
        let container = ContainerBuilder::new()
            .bean(greeter("a"))
            .object(Counter::default())
            .refresh()
            .unwrap();

        let found = container.find(Selector::of::<dyn Greeter>());
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "a");
        assert!(container.get::<Fixed>(Selector::of::<Fixed>()).is_ok());
        assert!(container.get::<Counter>(Selector::of::<Fixed>()).is_err());
    }

    struct First(#[allow(dead_code)] Arc<Second>);
    struct Second(#[allow(dead_code)] Arc<First>);

    #[test]
    fn test_wiring_cycle_reports_chain() {
        let err = ContainerBuilder::new()
            .bean(Bean::from_fn(|s: Arc<Second>| First(s)).name("first"))
            .bean(Bean::from_fn(|f: Arc<First>| Second(f)).name("second"))
            .refresh()
            .unwrap_err();

        let ContainerError::CircularDependency { chain } = err else {
            panic!("expected a cycle");
        };
        assert_eq!(chain, vec!["first", "second", "first"]);
    }

    #[derive(Default)]
    struct Left {
        right: std::sync::OnceLock<std::sync::Weak<Right>>,
    }

    #[derive(Default)]
    struct Right {
        left: std::sync::OnceLock<std::sync::Weak<Left>>,
    }

    #[test]
    fn test_mutual_singletons_link_after_wiring() {
        let container = ContainerBuilder::new()
            .bean(Bean::object(Left::default()).name("left").link(|this, assembly| {
                let right = assembly.get::<Right>(&Selector::Inferred)?;
                let _ = this.right.set(Arc::downgrade(&right));
                Ok(())
            }))
            .bean(Bean::object(Right::default()).name("right").link(|this, assembly| {
                let left = assembly.get::<Left>(&Selector::Inferred)?;
                let _ = this.left.set(Arc::downgrade(&left));
                Ok(())
            }))
            .refresh()
            .unwrap();

        let left = container.get::<Left>("").unwrap();
        let right = container.get::<Right>("").unwrap();
        assert!(Arc::ptr_eq(&left.right.get().unwrap().upgrade().unwrap(), &right));
        assert!(Arc::ptr_eq(&right.left.get().unwrap().upgrade().unwrap(), &left));
    }

    #[test]
    fn test_link_failure_fails_refresh() {
        let log = Log::default();
        let left_log = log.clone();

        let err = ContainerBuilder::new()
            .bean(
                Bean::object(Left::default())
                    .name("left")
                    .destroy(move |_| record(&left_log, "left")),
            )
            .bean(Bean::object(Right::default()).name("right").link(|_, assembly| {
                assembly.get::<Counter>(&Selector::Inferred).map(drop)
            }))
            .refresh()
            .unwrap_err();

        assert!(matches!(err, ContainerError::BeanNotFound { .. }));
        assert_eq!(*log.lock().unwrap(), vec!["left"]);
    }

    #[test]
    fn test_optional_parameter_propagates_nested_failures() {
        struct Core;
        struct Middle(#[allow(dead_code)] Arc<Core>);
        struct Outer(Option<Arc<Middle>>);

        let err = ContainerBuilder::new()
            .bean(Bean::from_fn(|m: Option<Arc<Middle>>| Outer(m)).name("outer"))
            .bean(Bean::from_fn(|i: Arc<Core>| Middle(i)).name("middle"))
            .refresh()
            .unwrap_err();
        let ContainerError::BeanNotFound { type_name, .. } = err else {
            panic!("expected the missing dependency of middle");
        };
        assert!(type_name.ends_with("Core"));

        let container = ContainerBuilder::new()
            .bean(Bean::from_fn(|m: Option<Arc<Middle>>| Outer(m)).name("outer"))
            .bean(Bean::from_fn(|i: Arc<Core>| Middle(i)).name("middle"))
            .bean(Bean::object(Core).name("core"))
            .refresh()
            .unwrap();
        let outer = container.get::<Outer>("").unwrap();
        assert!(Arc::ptr_eq(outer.0.as_ref().unwrap(), &container.get::<Middle>("").unwrap()));

        let container = ContainerBuilder::new()
            .bean(Bean::from_fn(|m: Option<Arc<Middle>>| Outer(m)).name("outer"))
            .refresh()
            .unwrap();
        assert!(container.get::<Outer>("").unwrap().0.is_none());
    }

    #[test]
    fn test_failed_bean_is_not_reported_as_cycle() {
        struct Broken;
        struct Careless;
        struct User(#[allow(dead_code)] Arc<Broken>);

        let err = ContainerBuilder::new()
            .bean(Bean::object(Careless).inject(|_, assembly| {
                // the error is dropped on purpose
                let _ = assembly.get::<Broken>(&Selector::Inferred);
                Ok(())
            }))
            .bean(Bean::try_from_fn(|| Err::<Broken, _>("down")).name("broken"))
            .bean(Bean::from_fn(|b: Arc<Broken>| User(b)))
            .refresh()
            .unwrap_err();

        assert!(matches!(err, ContainerError::WiringFailed { ref bean } if bean == "broken"));
    }

    #[test]
    fn test_dependencies_wire_depth_first_with_init_order() {
        struct Dep;
        struct Svc(Arc<Dep>);

        let log = Log::default();
        let (svc_log, dep_log) = (log.clone(), log.clone());

        let container = ContainerBuilder::new()
            .bean(Bean::from_fn(|d: Arc<Dep>| Svc(d)).name("svc").init(move |_| {
                record(&svc_log, "svc");
                Ok::<(), BoxError>(())
            }))
            .bean(Bean::object(Dep).name("dep").init(move |_| {
                record(&dep_log, "dep");
                Ok::<(), BoxError>(())
            }))
            .refresh()
            .unwrap();

        assert_eq!(*log.lock().unwrap(), vec!["dep", "svc"]);
        let svc = container.get::<Svc>("svc").unwrap();
        assert!(Arc::ptr_eq(&svc.0, &container.get::<Dep>("").unwrap()));
    }

    #[test]
    fn test_destroy_runs_in_reverse_readiness_order() {
        struct Pool;
        struct Cache(#[allow(dead_code)] Arc<Pool>);

        let log = Log::default();
        let (cache_log, pool_log) = (log.clone(), log.clone());

        let container = ContainerBuilder::new()
            .bean(
                Bean::from_fn(|p: Arc<Pool>| Cache(p))
                    .destroy(move |_| record(&cache_log, "cache")),
            )
            .bean(Bean::object(Pool).destroy(move |_| record(&pool_log, "pool")))
            .refresh()
            .unwrap();

        container.close();
        container.close();
        assert_eq!(*log.lock().unwrap(), vec!["cache", "pool"]);
    }

    #[test]
    fn test_failed_refresh_destroys_ready_beans() {
        struct Pool;
        struct Broken;

        let log = Log::default();
        let pool_log = log.clone();

        let err = ContainerBuilder::new()
            .bean(Bean::object(Pool).destroy(move |_| record(&pool_log, "pool")))
            .bean(Bean::try_from_fn(|| Err::<Broken, _>("no connection")).name("broken"))
            .refresh()
            .unwrap_err();

        assert!(matches!(err, ContainerError::Construct { ref bean, .. } if bean == "broken"));
        assert_eq!(*log.lock().unwrap(), vec!["pool"]);
    }

    #[test]
    fn test_init_failure_names_bean() {
        struct Svc;

        let err = ContainerBuilder::new()
            .bean(Bean::object(Svc).name("svc").init(|_| Err("not ready")))
            .refresh()
            .unwrap_err();
        assert!(matches!(err, ContainerError::Init { ref bean, .. } if bean == "svc"));
    }

    #[test]
    fn test_group_beans_flatten_into_collect() {
        let group: Vec<Arc<dyn Greeter>> = vec![Arc::new(Fixed("g1")), Arc::new(Fixed("g2"))];

        let container = ContainerBuilder::new()
            .bean(greeter("a"))
            .bean(Bean::object(group).name("group").group())
            .bean(greeter("b"))
            .refresh()
            .unwrap();

        let all = container.collect::<dyn Greeter>(&[]).unwrap();
        assert_eq!(greetings(&all), vec!["a", "g1", "g2", "b"]);
    }

    #[test]
    fn test_collect_parameter_and_default_empty() {
        struct Registry(Vec<Arc<dyn Greeter>>);
        struct Hooks(Option<Vec<Arc<dyn Greeter>>>);

        let container = ContainerBuilder::new()
            .bean(greeter("a"))
            .bean(greeter("b"))
            .bean(
                Bean::from_fn(|all: Vec<Arc<dyn Greeter>>| Registry(all))
                    .args([Arg::Collect(vec!["b".into(), "a".into()])]),
            )
            .refresh()
            .unwrap();
        assert_eq!(greetings(&container.get::<Registry>("").unwrap().0), vec!["b", "a"]);

        let empty = ContainerBuilder::new()
            .bean(Bean::from_fn(|hooks: Option<Vec<Arc<dyn Greeter>>>| Hooks(hooks)))
            .refresh()
            .unwrap();
        assert!(empty.get::<Hooks>("").unwrap().0.is_none());
    }

    #[test]
    fn test_prop_parameters() {
        struct Server {
            host: String,
            port: u16,
        }

        let props = Properties::from_map([("server.port", "9000")]);
        let container = ContainerBuilder::new()
            .with_properties(props)
            .bean(
                Bean::from_fn(|host: Prop<String>, port: Prop<u16>| Server {
                    host: host.into_inner(),
                    port: *port,
                })
                .args([Arg::from("${server.host:=localhost}"), Arg::from("${server.port}")]),
            )
            .refresh()
            .unwrap();

        let server = container.get::<Server>("").unwrap();
        assert_eq!(server.host, "localhost");
        assert_eq!(server.port, 9000);
    }

    #[test]
    fn test_argument_errors() {
        struct Svc;

        let err = ContainerBuilder::new()
            .bean(Bean::from_fn(|_: Prop<u16>| Svc))
            .refresh()
            .unwrap_err();
        assert!(matches!(err, ContainerError::MissingArgument { index: 0, .. }));

        let err = ContainerBuilder::new()
            .bean(Bean::from_fn(|| Svc).args([Arg::from("x")]))
            .refresh()
            .unwrap_err();
        assert!(matches!(err, ContainerError::TooManyArguments { expected: 0, given: 1 }));

        let err = ContainerBuilder::new()
            .object(Counter::default())
            .bean(Bean::from_fn(|_: Arc<Counter>| Svc).args([Arg::from("${port}")]))
            .refresh()
            .unwrap_err();
        assert!(matches!(err, ContainerError::InvalidArgument { index: 0, .. }));

        let err = ContainerBuilder::new()
            .bean(Bean::from_fn(|_: Prop<u16>| Svc).args([Arg::from("${port}")]))
            .refresh()
            .unwrap_err();
        assert!(matches!(
            err,
            ContainerError::Config(ConfigError::PropertyNotFound { ref key, .. }) if key == "port"
        ));
    }

    #[derive(Debug, Default, PartialEq)]
    struct ServerConfig {
        host: String,
        port: u16,
        tags: Vec<String>,
    }

    bindable!(ServerConfig {
        host: "${host:=localhost}",
        port: "${port}",
        tags: "${tags:=}",
    });

    #[test]
    fn test_bean_property_binding() {
        let props = Properties::from_map([("server.port", "8080"), ("server.tags", "a,b")]);
        let container = ContainerBuilder::new()
            .with_properties(props)
            .bean(Bean::object(ServerConfig::default()).bind("${server}"))
            .refresh()
            .unwrap();

        let config = container.get::<ServerConfig>("").unwrap();
        assert_eq!(
            *config,
            ServerConfig {
                host: "localhost".into(),
                port: 8080,
                tags: vec!["a".into(), "b".into()],
            }
        );

        let mut other = ServerConfig::default();
        container.bind(&mut other, BindOptions::key("server")).unwrap();
        assert_eq!(other, *config);
    }

    #[test]
    fn test_field_injection() {
        #[derive(Default)]
        struct Endpoint {
            greeter: Option<Arc<dyn Greeter>>,
            name: String,
        }

        let container = ContainerBuilder::new()
            .with_properties(Properties::from_map([("app.name", "demo")]))
            .bean(greeter("a"))
            .bean(
                Bean::object(Endpoint::default())
                    .inject(|this, assembly| {
                        this.greeter = Some(assembly.get::<dyn Greeter>(&Selector::from("a"))?);
                        Ok(())
                    })
                    .inject(|this, assembly| {
                        this.name = assembly.resolve("${app.name}")?;
                        Ok(())
                    }),
            )
            .refresh()
            .unwrap();

        let endpoint = container.get::<Endpoint>("").unwrap();
        assert_eq!(endpoint.greeter.as_ref().unwrap().greet(), "a");
        assert_eq!(endpoint.name, "demo");
    }

    #[test]
    fn test_find_reports_state() {
        let builder = ContainerBuilder::new().bean(greeter("a")).object(Counter::default());

        let found = builder.find("a");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].state, State::Unwired);
        assert_eq!(found[0].exports.len(), 2);
        assert_eq!(builder.find("").len(), 2);

        let container = builder.refresh().unwrap();
        let found = container.find("a");
        assert_eq!(found[0].state, State::Ready);
        assert!(container.find("missing").is_empty());
    }

    #[test]
    fn test_wire_ad_hoc_bean() {
        struct Job {
            counter: Arc<Counter>,
            retries: u32,
        }

        let container = ContainerBuilder::new()
            .with_properties(Properties::from_map([("job.retries", "3")]))
            .object(Counter::default())
            .refresh()
            .unwrap();

        let job = container
            .wire(
                Bean::from_fn(|counter: Arc<Counter>, retries: Prop<u32>| Job {
                    counter,
                    retries: retries.0,
                })
                .args([Arg::Bean(Selector::Inferred), Arg::from("${job.retries}")]),
            )
            .unwrap();
        assert_eq!(job.retries, 3);
        assert!(Arc::ptr_eq(&job.counter, &container.get::<Counter>("").unwrap()));

        // ad-hoc beans are not registered
        assert_eq!(container.find("").len(), 1);
    }

    #[test]
    fn test_invoke_propagates_errors() {
        let container = ContainerBuilder::new().object(Counter::default()).refresh().unwrap();

        container
            .invoke(|c: Arc<Counter>| {
                c.hits.fetch_add(1, Ordering::SeqCst);
            }, &[])
            .unwrap();
        assert_eq!(container.get::<Counter>("").unwrap().hits.load(Ordering::SeqCst), 1);

        let err = container
            .invoke(
                |_: Arc<Counter>| -> Result<(), std::io::Error> {
                    Err(std::io::Error::new(std::io::ErrorKind::Other, "nope"))
                },
                &[],
            )
            .unwrap_err();
        let ContainerError::Invoke(source) = err else {
            panic!("expected an invoke error");
        };
        assert_eq!(source.to_string(), "nope");

        let err = container.invoke(|_: Arc<Fixed>| {}, &[]).unwrap_err();
        assert!(matches!(err, ContainerError::BeanNotFound { .. }));
    }

    fn explode() {
        panic!("boom");
    }

    #[test]
    fn test_panicking_task_does_not_affect_others() {
        let container = ContainerBuilder::new().object(Counter::default()).refresh().unwrap();

        container.go(explode, &[]).unwrap();
        for _ in 0..4 {
            container
                .go(|c: Arc<Counter>| {
                    c.hits.fetch_add(1, Ordering::SeqCst);
                }, &[])
                .unwrap();
        }
        // resolution failures are logged inside the task
        container.go(|_: Arc<Fixed>| {}, &[]).unwrap();

        container.wait();
        assert_eq!(container.get::<Counter>("").unwrap().hits.load(Ordering::SeqCst), 4);

        // the caller still works after a task panicked
        container
            .invoke(|c: Arc<Counter>| {
                c.hits.fetch_add(1, Ordering::SeqCst);
            }, &[])
            .unwrap();
        assert_eq!(container.get::<Counter>("").unwrap().hits.load(Ordering::SeqCst), 5);
    }

    #[test]
    fn test_container_parameter() {
        let container = ContainerBuilder::new()
            .with_properties(Properties::from_map([("name", "svc")]))
            .refresh()
            .unwrap();

        container
            .invoke(|c: Container| {
                assert_eq!(c.prop("name"), Some("svc"));
            }, &[])
            .unwrap();

        let err = ContainerBuilder::new()
            .bean(Bean::from_fn(|c: Container| c.prop_or("name", "none")))
            .refresh()
            .unwrap_err();
        assert!(matches!(err, ContainerError::BeanNotFound { .. }));
    }

    #[test]
    fn test_container_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Container>();
    }

    #[test]
    fn test_prop_passthrough() {
        let container = ContainerBuilder::new()
            .with_properties(Properties::from_map([("a", "1")]))
            .refresh()
            .unwrap();
        assert_eq!(container.prop("a"), Some("1"));
        assert_eq!(container.prop("b"), None);
        assert_eq!(container.prop_or("b", 2), "2");
    }
}
