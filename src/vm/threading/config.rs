//! How OS threads backing managed threads are built.
//!
//! ## Environment Variables
//!
//! - `DOTNET_RS_THREAD_STACK_SIZE`: stack size in bytes for every managed thread
//! - `DOTNET_RS_THREAD_NAME_PREFIX`: OS thread names become `<prefix>-<n>`
//!
//! Unset variables keep the platform defaults; unparsable ones are ignored with
//! a warning.
use crate::utils::sync::{AtomicU64, Ordering};
use std::{env, thread};
use tracing::warn;

pub const STACK_SIZE_VAR: &str = "DOTNET_RS_THREAD_STACK_SIZE";
pub const NAME_PREFIX_VAR: &str = "DOTNET_RS_THREAD_NAME_PREFIX";

/// Suffix counter for named threads, shared by every config.
static NEXT_THREAD_NAME: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ThreadConfig {
    pub stack_size: Option<usize>,
    pub name_prefix: Option<String>,
}

impl ThreadConfig {
    pub fn from_env() -> Self {
        Self::from_vars(|key| env::var(key).ok())
    }

    pub fn from_vars(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let stack_size = lookup(STACK_SIZE_VAR).and_then(|raw| match raw.trim().parse() {
            Ok(size) => Some(size),
            Err(e) => {
                warn!("Ignoring {}={:?}: {}", STACK_SIZE_VAR, raw, e);
                None
            }
        });
        let name_prefix = lookup(NAME_PREFIX_VAR).filter(|prefix| !prefix.is_empty());

        Self {
            stack_size,
            name_prefix,
        }
    }

    pub(super) fn builder(&self) -> thread::Builder {
        let mut builder = thread::Builder::new();
        if let Some(size) = self.stack_size {
            builder = builder.stack_size(size);
        }
        if let Some(prefix) = &self.name_prefix {
            let n = NEXT_THREAD_NAME.fetch_add(1, Ordering::Relaxed);
            builder = builder.name(format!("{}-{}", prefix, n));
        }
        builder
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_unset() {
        assert_eq!(ThreadConfig::from_vars(vars(&[])), ThreadConfig::default());
    }

    #[test]
    fn test_reads_stack_size_and_prefix() {
        let config = ThreadConfig::from_vars(vars(&[
            (STACK_SIZE_VAR, " 1048576 "),
            (NAME_PREFIX_VAR, "managed"),
        ]));
        assert_eq!(config.stack_size, Some(1 << 20));
        assert_eq!(config.name_prefix.as_deref(), Some("managed"));
    }

    #[test]
    fn test_ignores_bad_values() {
        let config = ThreadConfig::from_vars(vars(&[
            (STACK_SIZE_VAR, "lots"),
            (NAME_PREFIX_VAR, ""),
        ]));
        assert_eq!(config, ThreadConfig::default());
    }

    #[test]
    fn test_builder_names_threads() {
        let config = ThreadConfig {
            stack_size: None,
            name_prefix: Some("worker".into()),
        };
        let name = config
            .builder()
            .spawn(|| thread::current().name().map(str::to_owned))
            .unwrap()
            .join()
            .unwrap()
            .unwrap();
        assert!(name.starts_with("worker-"), "unexpected name {}", name);
    }
}
