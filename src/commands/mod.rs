//! M3 Versioning commands and the typed-command discipline from spec §9
//! ("model each command as a typed record with a `validate()` step").
//!
//! Every command function takes a `&UnitOfWork` already open on the caller's
//! transaction, plus a command struct, and returns a typed output. The
//! fine-grained [`crate::permission::PermissionService`] check happens at
//! the top of each function (spec §9: "the fine-grained check remains in
//! the command for testability"), not in a decorator.

pub mod dataset;
pub mod jobs;
pub mod versioning;

pub use dataset::*;
pub use jobs::*;
pub use versioning::*;
