//! Runtime configuration for the dataset service core.
//!
//! Mirrors the layering the broader example corpus uses for service config
//! (env overrides file, both backed by a `Default` impl with documented
//! defaults): built with the `config` crate so an operator can supply a TOML
//! file and/or environment variables prefixed `DATASET_`.

use serde::{Deserialize, Deserializer, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Config {
    /// Connection string for the relational store backing every repository.
    pub database_url: String,

    /// Upload size ceiling enforced by the import command before a job is
    /// ever queued. Accepts either a bare number of bytes or a humantime-style
    /// suffixed string (`"1GiB"`) in the source file; always normalized to
    /// bytes at load time.
    #[serde(deserialize_with = "string_or_bytes")]
    pub max_upload_size_bytes: u64,

    /// How long a worker with no pending job of its type sleeps before
    /// polling again.
    pub worker_poll_interval_ms: u64,

    /// Number of worker tasks started per `RunType` at process init.
    pub worker_pool_size_per_type: usize,

    /// Name of the branch created for every new dataset and protected from
    /// deletion.
    pub default_branch_name: String,

    /// Batch size used when the commit preparer and row store insert rows;
    /// also the batch boundary at which a sampling/SQL worker checks for
    /// cooperative cancellation.
    pub row_store_batch_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: "postgres://localhost/dataset_core".to_string(),
            max_upload_size_bytes: 1024 * 1024 * 1024,
            worker_poll_interval_ms: 500,
            worker_pool_size_per_type: 2,
            default_branch_name: "main".to_string(),
            row_store_batch_size: 1000,
        }
    }
}

impl Config {
    /// Load configuration from `path` (if it exists) layered under
    /// environment variables prefixed `DATASET_` (e.g. `DATASET_DATABASE_URL`),
    /// falling back to [`Config::default`] for anything neither source sets.
    pub fn load(path: Option<&str>) -> Result<Config, config::ConfigError> {
        let defaults = Config::default();
        let mut builder = config::Config::builder()
            .set_default("database_url", defaults.database_url)?
            .set_default("max_upload_size_bytes", defaults.max_upload_size_bytes as i64)?
            .set_default("worker_poll_interval_ms", defaults.worker_poll_interval_ms as i64)?
            .set_default(
                "worker_pool_size_per_type",
                defaults.worker_pool_size_per_type as i64,
            )?
            .set_default("default_branch_name", defaults.default_branch_name)?
            .set_default("row_store_batch_size", defaults.row_store_batch_size as i64)?;

        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }
        builder = builder.add_source(
            config::Environment::with_prefix("DATASET")
                .prefix_separator("_")
                .separator("__"),
        );

        builder.build()?.try_deserialize()
    }
}

/// Accepts either a raw integer or a human-readable `"512MiB"`/`"1GiB"` string
/// for byte-size fields, matching the flexibility the teacher crate's pack
/// cache sizes already offered.
fn string_or_bytes<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StringOrU64 {
        String(String),
        U64(u64),
    }

    match StringOrU64::deserialize(deserializer)? {
        StringOrU64::U64(v) => Ok(v),
        StringOrU64::String(v) => parse_byte_size(&v).map_err(serde::de::Error::custom),
    }
}

fn parse_byte_size(input: &str) -> Result<u64, String> {
    let trimmed = input.trim();
    let (digits, suffix) = trimmed.split_at(
        trimmed
            .find(|c: char| !c.is_ascii_digit() && c != '.')
            .unwrap_or(trimmed.len()),
    );
    let value: f64 = digits
        .parse()
        .map_err(|_| format!("'{input}' is not a valid byte size"))?;
    let multiplier: f64 = match suffix.trim().to_ascii_uppercase().as_str() {
        "" | "B" => 1.0,
        "K" | "KB" | "KIB" => 1024.0,
        "M" | "MB" | "MIB" => 1024.0 * 1024.0,
        "G" | "GB" | "GIB" => 1024.0 * 1024.0 * 1024.0,
        other => return Err(format!("unrecognized byte-size suffix '{other}'")),
    };
    Ok((value * multiplier) as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let cfg = Config::default();
        assert_eq!(cfg.max_upload_size_bytes, 1024 * 1024 * 1024);
        assert_eq!(cfg.worker_poll_interval_ms, 500);
        assert_eq!(cfg.worker_pool_size_per_type, 2);
        assert_eq!(cfg.default_branch_name, "main");
        assert_eq!(cfg.row_store_batch_size, 1000);
    }

    #[test]
    fn parses_suffixed_byte_sizes() {
        assert_eq!(parse_byte_size("1GiB").unwrap(), 1024 * 1024 * 1024);
        assert_eq!(parse_byte_size("512MiB").unwrap(), 512 * 1024 * 1024);
        assert_eq!(parse_byte_size("2048").unwrap(), 2048);
    }
}
