pub mod component;
pub mod entity;
mod error;
pub mod query;
pub mod schedule;
pub mod storage;
pub mod system;
pub mod world;

pub use component::Component;
pub use entity::Entity;
pub use error::{Error, Mode, Result};
pub use query::{EntityQuery, EntitySet};
pub use schedule::State as ScheduleState;
pub use storage::Storage;
pub use system::{ComponentAccess, Context, Declare, Read, Subflow, System, Write};
pub use world::{Config, EntityBuilder, Ref, World};
