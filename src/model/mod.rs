//! Domain entities: [`ProxyInstance`], [`ConfigSnapshot`], [`ConfigTemplate`],
//! [`AuditRecord`], and their supporting types (spec §3).

mod audit;
mod instance;
mod snapshot;
mod template;

pub use audit::{AuditRecord, AuditStatus, NewAuditRecord};
pub use instance::{
    AuthKind, Credentials, InstanceStatus, NewProxyInstance, ProxyInstance, UpdateProxyInstance,
};
pub use snapshot::{ConfigSnapshot, NewConfigSnapshot};
pub use template::{ConfigTemplate, NewConfigTemplate, TemplateVariable, TemplateVariableType};
