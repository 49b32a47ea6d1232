//! Layered properties with placeholder resolution, typed binding and a small
//! dependency container that injects both.

pub mod config;
pub mod context;
mod error;

pub use config::{Bind, BindOptions, Binder, Config, ConfigError, FormatRegistry, Kind, Properties, Value};
pub use context::{
    Arg, Assembly, Bean, BeanInfo, Container, ContainerBuilder, ContainerError, FromContainer, Handler, InvokeOutput,
    Prop, Selector, State,
};
pub use error::Error;
