use std::fmt;

use crate::ecs::entity::Entity;

/// Result type for fallible ECS operations.
pub type Result<T> = std::result::Result<T, Error>;

/// How a system touched a component storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    Read,
    Write,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Read => f.write_str("read"),
            Mode::Write => f.write_str("write"),
        }
    }
}

/// Errors raised by the world, its storages and its scheduler.
///
/// Type names are carried as `&'static str` from [`std::any::type_name`] so messages name the
/// offending Rust type.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("component type already registered: {component}")]
    DuplicateComponentType { component: &'static str },

    #[error("component type not registered: {component}")]
    UnknownComponentType { component: &'static str },

    #[error("entity {entity} already has component {component}")]
    DuplicateComponent {
        entity: Entity,
        component: &'static str,
    },

    #[error("entity {entity} has no component {component}")]
    MissingComponent {
        entity: Entity,
        component: &'static str,
    },

    #[error("system type already registered: {system}")]
    DuplicateSystemType { system: &'static str },

    #[error("system type not found: {system}")]
    UnknownSystemType { system: &'static str },

    #[error("entity is not alive: {entity}")]
    InvalidEntity { entity: Entity },

    #[error("ordering {from} before {to} would create a cycle")]
    CyclicDependency { from: String, to: String },

    #[error("{mode} access to {component} was not declared by the running system")]
    UndeclaredAccess {
        component: &'static str,
        mode: Mode,
    },

    /// `std::error::Error::source` yields the boxed cause, so downcast it to `Box<Error>`.
    #[error("system {system} failed: {source}")]
    SystemFailed {
        system: &'static str,
        #[source]
        source: Box<Error>,
    },
}
