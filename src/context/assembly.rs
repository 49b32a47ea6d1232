//! Wiring state for one container call.

use std::any::{type_name, TypeId};
use std::sync::Arc;

use super::bean::{Bean, BeanMeta, Definition, DestroyFn, Instance, State};
use super::{Container, ContainerError, Selector};
use crate::config::{Bind, BindOptions, Properties};

enum Registry<'a> {
    /// Definitions being wired by `refresh`.
    Refreshing(&'a mut [Definition]),
    Ready(&'a Container),
}

/// A ready bean with a destroy callback, in readiness order.
pub(crate) struct Destroyer {
    pub name: String,
    pub instance: Instance,
    pub destroy: DestroyFn,
}

impl Destroyer {
    pub fn run(self) {
        tracing::debug!(bean = %self.name, "destroying bean");
        (self.destroy)(&self.instance);
    }
}

/// Resolves dependencies while beans and function arguments are built.
///
/// Handed to constructors, injectors and [`FromContainer`](super::FromContainer)
/// implementations. It records the chain of beans being wired so cycles and
/// failures can be reported with the full injection path.
pub struct Assembly<'a> {
    registry: Registry<'a>,
    properties: &'a Properties,
    chain: Vec<String>,
    destroyers: Vec<Destroyer>,
}

impl<'a> Assembly<'a> {
    pub(crate) fn refreshing(defs: &'a mut [Definition], properties: &'a Properties) -> Self {
        Self {
            registry: Registry::Refreshing(defs),
            properties,
            chain: Vec::new(),
            destroyers: Vec::new(),
        }
    }

    pub(crate) fn ready(container: &'a Container) -> Self {
        Self {
            registry: Registry::Ready(container),
            properties: container.properties(),
            chain: Vec::new(),
            destroyers: Vec::new(),
        }
    }

    pub(crate) fn into_destroyers(self) -> Vec<Destroyer> {
        self.destroyers
    }

    /// The container, once refresh has finished.
    pub fn container(&self) -> Option<&'a Container> {
        match self.registry {
            Registry::Ready(container) => Some(container),
            Registry::Refreshing(_) => None,
        }
    }

    pub fn properties(&self) -> &'a Properties {
        self.properties
    }

    pub fn prop(&self, key: &str) -> Option<&'a str> {
        self.properties.get(key)
    }

    pub fn resolve(&self, s: &str) -> Result<String, ContainerError> {
        Ok(self.properties.resolve(s)?)
    }

    pub fn bind<T: Bind + ?Sized>(&self, target: &mut T, opts: BindOptions) -> Result<(), ContainerError> {
        Ok(self.properties.bind_with(target, opts)?)
    }

    /// Names of the beans currently being wired, outermost first.
    pub fn trace(&self) -> &[String] {
        &self.chain
    }

    /// The single bean providing `T` that matches `selector`.
    pub fn get<T>(&mut self, selector: &Selector) -> Result<Arc<T>, ContainerError>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        let type_id = TypeId::of::<T>();
        let found = self.candidates(type_id, selector);
        let idx = match found.as_slice() {
            [idx] => *idx,
            [] => return Err(not_found::<T>(selector)),
            _ => {
                return Err(ContainerError::AmbiguousBean {
                    type_name: type_name::<T>(),
                    selector: selector.to_string(),
                    candidates: found.iter().map(|&i| self.meta(i).name.clone()).collect(),
                })
            }
        };

        let export = self
            .meta(idx)
            .export(type_id, false)
            .cloned()
            .ok_or_else(|| not_found::<T>(selector))?;
        let instance = self.wire(idx)?;
        export.cast::<T>(&instance).ok_or_else(|| not_found::<T>(selector))
    }

    /// Whether a bean providing `T` matches `selector`. Nothing is wired.
    pub fn provides<T: ?Sized + 'static>(&self, selector: &Selector) -> bool {
        !self.candidates(TypeId::of::<T>(), selector).is_empty()
    }

    /// Whether any bean, or any group, provides `T`. Nothing is wired.
    pub fn provides_any<T: ?Sized + 'static>(&self) -> bool {
        let type_id = TypeId::of::<T>();
        (0..self.len()).any(|i| self.meta(i).exports.iter().any(|e| e.type_id == type_id))
    }

    /// Beans providing `T`.
    ///
    /// With no selectors every bean exporting `T` is returned, group beans
    /// contributing each of their elements, in registration order. Otherwise
    /// each selector must match exactly one bean and the result follows the
    /// selector order.
    pub fn collect<T>(&mut self, selectors: &[Selector]) -> Result<Vec<Arc<T>>, ContainerError>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        if !selectors.is_empty() {
            return selectors.iter().map(|s| self.get::<T>(s)).collect();
        }

        let type_id = TypeId::of::<T>();
        let mut beans = Vec::new();
        for idx in 0..self.len() {
            let Some(export) = self.meta(idx).exports.iter().find(|e| e.type_id == type_id).cloned() else {
                continue;
            };
            let instance = self.wire(idx)?;
            if export.elements {
                beans.extend(export.cast_elements::<T>(&instance).unwrap_or_default());
            } else if let Some(bean) = export.cast::<T>(&instance) {
                beans.push(bean);
            }
        }

        if beans.is_empty() {
            return Err(not_found::<T>(&Selector::Inferred));
        }
        Ok(beans)
    }

    /// Builds a bean outside the registry.
    pub(crate) fn wire_bean<T: Send + Sync + 'static>(&mut self, mut bean: Bean<T>) -> Result<T, ContainerError> {
        let name = bean.meta().name.clone();
        let links = bean.take_links();
        self.chain.push(name);
        tracing::debug!(chain = %self.chain.join(" -> "), "wiring bean");
        let built = bean.build(self).and_then(|pending| pending.finish());
        let linked = built.and_then(|value| {
            links.into_iter().try_for_each(|link| link(&value, self))?;
            Ok(value)
        });
        self.chain.pop();
        linked
    }

    /// Wires the definition at `idx` and its dependencies, depth first.
    pub(crate) fn wire(&mut self, idx: usize) -> Result<Instance, ContainerError> {
        let (name, build) = {
            let def = match &mut self.registry {
                Registry::Ready(container) => return Ok(Arc::clone(&container.singletons()[idx].instance)),
                Registry::Refreshing(defs) => &mut defs[idx],
            };
            if let Some(instance) = &def.instance {
                return Ok(Arc::clone(instance));
            }
            let build = match (def.state, def.build.take()) {
                (State::Unwired, Some(build)) => build,
                (State::Failed, _) => {
                    return Err(ContainerError::WiringFailed {
                        bean: def.meta.name.clone(),
                    })
                }
                _ => {
                    let mut chain = self.chain.clone();
                    chain.push(def.meta.name.clone());
                    return Err(ContainerError::CircularDependency { chain });
                }
            };
            def.state = State::Wiring;
            (def.meta.name.clone(), build)
        };

        self.chain.push(name.clone());
        tracing::debug!(chain = %self.chain.join(" -> "), "wiring bean");
        let built = build(self);
        self.chain.pop();
        let mut pending = match built {
            Ok(pending) => pending,
            Err(e) => {
                self.set_state(idx, State::Failed);
                return Err(e);
            }
        };

        self.set_state(idx, State::Wired);
        if let Err(e) = pending.init() {
            self.set_state(idx, State::Failed);
            return Err(e);
        }
        let instance = pending.into_instance();

        if let Registry::Refreshing(defs) = &mut self.registry {
            let def = &mut defs[idx];
            def.instance = Some(Arc::clone(&instance));
            def.state = State::Ready;
            if let Some(destroy) = def.destroy.take() {
                self.destroyers.push(Destroyer {
                    name: name.clone(),
                    instance: Arc::clone(&instance),
                    destroy,
                });
            }
        }
        tracing::debug!(bean = %name, "bean ready");
        Ok(instance)
    }

    /// Runs the link callbacks of a ready definition.
    pub(crate) fn link(&mut self, idx: usize) -> Result<(), ContainerError> {
        let Registry::Refreshing(defs) = &mut self.registry else {
            return Ok(());
        };
        let def = &mut defs[idx];
        let (Some(link), Some(instance)) = (def.link.take(), def.instance.clone()) else {
            return Ok(());
        };
        let name = def.meta.name.clone();

        self.chain.push(name);
        tracing::debug!(chain = %self.chain.join(" -> "), "linking bean");
        let linked = link(&instance, self);
        self.chain.pop();
        linked
    }

    fn set_state(&mut self, idx: usize, state: State) {
        if let Registry::Refreshing(defs) = &mut self.registry {
            defs[idx].state = state;
        }
    }

    fn len(&self) -> usize {
        match &self.registry {
            Registry::Refreshing(defs) => defs.len(),
            Registry::Ready(container) => container.singletons().len(),
        }
    }

    fn meta(&self, idx: usize) -> &BeanMeta {
        match &self.registry {
            Registry::Refreshing(defs) => &defs[idx].meta,
            Registry::Ready(container) => &container.singletons()[idx].meta,
        }
    }

    fn candidates(&self, type_id: TypeId, selector: &Selector) -> Vec<usize> {
        (0..self.len())
            .filter(|&i| {
                let meta = self.meta(i);
                meta.export(type_id, false).is_some() && selector.matches(meta)
            })
            .collect()
    }
}

fn not_found<T: ?Sized>(selector: &Selector) -> ContainerError {
    ContainerError::BeanNotFound {
        type_name: type_name::<T>(),
        selector: selector.to_string(),
    }
}
