//! `sea-orm` entity models for the persisted schema (spec §6 "Persisted
//! state layout"). One module per table; `migration/` carries the DDL that
//! creates them.

pub mod commit_manifests;
pub mod commit_schemas;
pub mod commits;
pub mod dataset_permissions;
pub mod dataset_tags;
pub mod datasets;
pub mod jobs;
pub mod refs;
pub mod rows;
