//! Reactive reads over the [`Store`](crate::store::Store).
//!
//! A [`LiveQuery`] owns a background driver that re-runs its [`Query`]
//! whenever a committed [`ChangeEvent`] could affect the result or its
//! dependency key changes, and publishes only the newest result.

pub mod event;
pub mod query;
pub mod subscription;

pub use event::{ChangeEvent, ChangeKind};
pub use query::{AllLists, Query, TasksForList};
pub use subscription::{LiveQuery, LiveSnapshot, LiveState};
