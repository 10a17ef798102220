//! Storage layer (spec §4.A).
//!
//! Four narrow traits, one per entity, rather than the teacher's single
//! generic `Repository<Id, Entity, Create, Update>` — see `traits.rs` for
//! why. [`Repository`] is a convenience supertrait so callers can hold a
//! single `Arc<dyn Repository>` instead of threading four trait objects
//! through every constructor.

mod error;
pub mod memory;
#[cfg(feature = "database")]
pub mod postgres;
mod traits;

pub use error::{RepositoryError, RepositoryOperation};
pub use traits::{AuditRepository, InstanceRepository, SnapshotRepository, TemplateRepository};

/// Every storage capability this crate needs, bundled for convenience.
pub trait Repository: InstanceRepository + TemplateRepository + SnapshotRepository + AuditRepository {}

impl<T> Repository for T where
    T: InstanceRepository + TemplateRepository + SnapshotRepository + AuditRepository
{
}
