// Copyright 2022-2024 Protocol Labs
// SPDX-License-Identifier: Apache-2.0, MIT

use config::{ConfigError, Source, Value, ValueKind};
use ethers_core::types::U256;
use lazy_static::lazy_static;
use regex::Regex;
use serde::de::Error;
use serde::Deserializer;
use std::fmt::Formatter;
use std::path::{Path, PathBuf};

#[macro_export]
macro_rules! home_relative {
    // Paths in a section which has no access to the home directory.
    ($settings:ty { $($name:ident),+ } ) => {
      impl $settings {
        $(
        pub fn $name(&self, home_dir: &std::path::Path) -> std::path::PathBuf {
            $crate::utils::expand_path(home_dir, &self.$name)
        }
        )+
      }
    };
}

/// Resolve a configured path, which can be:
/// * absolute, e.g. "/foo/bar"
/// * relative to the user's `$HOME`, e.g. "~/foo/bar"
/// * relative to the `--home-dir` of the CLI, e.g. "foo/bar"
pub fn expand_path(home_dir: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }
    let path = if path.starts_with("~") {
        path.to_path_buf()
    } else {
        home_dir.join(path)
    };
    expand_tilde(&path)
}

/// Replace a leading `~` with the user's home directory, if there is one.
pub fn expand_tilde(path: &Path) -> PathBuf {
    let Ok(rest) = path.strip_prefix("~") else {
        return path.to_path_buf();
    };
    match dirs::home_dir() {
        Some(home) if rest.as_os_str().is_empty() => home,
        Some(home) => home.join(rest),
        None => path.to_path_buf(),
    }
}

/// Configuration source which replaces `${VAR}` in string values with environment variables.
///
/// Variables which are not set are left in place. Interpolation happens before
/// the values are parsed into their target types.
#[derive(Clone, Debug)]
pub struct EnvInterpol<T>(pub T);

impl<T: Source + Clone + Send + Sync + 'static> Source for EnvInterpol<T> {
    fn clone_into_box(&self) -> Box<dyn Source + Send + Sync> {
        Box::new(self.clone())
    }

    fn collect(&self) -> Result<config::Map<String, Value>, ConfigError> {
        let mut values = self.0.collect()?;
        values.values_mut().for_each(interpolate);
        Ok(values)
    }
}

lazy_static! {
    /// Environment variable references like `${DEPLOYER_KEY}`.
    static ref ENV_VAR_RE: Regex = Regex::new(r"\$\{([^}]+)\}").expect("env var regex parses");
}

/// Substitute the variables which are set; `None` if there was nothing to substitute.
fn interpolate_str(value: &str) -> Option<String> {
    if !ENV_VAR_RE.is_match(value) {
        return None;
    }
    let replaced = ENV_VAR_RE.replace_all(value, |caps: &regex::Captures| {
        std::env::var(&caps[1]).unwrap_or_else(|_| caps[0].to_owned())
    });
    Some(replaced.into_owned())
}

/// Walk strings, arrays and tables; other kinds are left alone.
fn interpolate(value: &mut Value) {
    match value.kind {
        ValueKind::String(ref mut s) => {
            if let Some(i) = interpolate_str(s) {
                *s = i;
            }
        }
        ValueKind::Array(ref mut vs) => vs.iter_mut().for_each(interpolate),
        ValueKind::Table(ref mut t) => t.values_mut().for_each(interpolate),
        _ => {}
    }
}

/// Deserialize a token amount given as a decimal string, a `0x` prefixed hex string or an integer.
///
/// Large amounts don't fit into TOML integers, so they are usually written as strings.
pub fn deserialize_u256<'de, D>(deserializer: D) -> Result<U256, D::Error>
where
    D: Deserializer<'de>,
{
    struct Visitor;
    impl<'de> serde::de::Visitor<'de> for Visitor {
        type Value = U256;

        fn expecting(&self, formatter: &mut Formatter) -> std::fmt::Result {
            formatter.write_str("a non-negative integer or a numeric string")
        }

        fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
        where
            E: Error,
        {
            match v.strip_prefix("0x") {
                Some(h) => U256::from_str_radix(h, 16).map_err(E::custom),
                None => U256::from_dec_str(v).map_err(E::custom),
            }
        }

        fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
        where
            E: Error,
        {
            Ok(U256::from(v))
        }

        fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
        where
            E: Error,
        {
            u64::try_from(v)
                .map(U256::from)
                .map_err(|_| E::custom("negative amount"))
        }
    }
    deserializer.deserialize_any(Visitor)
}

#[cfg(test)]
pub(crate) mod tests {
    use std::path::{Path, PathBuf};

    use super::{expand_path, expand_tilde, interpolate_str};

    /// Set some env vars, run a fallible piece of code, then unset the variables otherwise they would affect the next test.
    pub fn with_env_vars<F, T, E>(vars: Vec<(&str, &str)>, f: F) -> Result<T, E>
    where
        F: FnOnce() -> Result<T, E>,
    {
        for (k, v) in vars.iter() {
            std::env::set_var(k, v);
        }
        let result = f();
        for (k, _) in vars {
            std::env::remove_var(k);
        }
        result
    }

    #[test]
    fn tilde_expands_to_home() {
        let home = std::env::var("HOME").expect("should work on Linux");
        assert_eq!(
            expand_tilde(Path::new("~/.diamond")),
            PathBuf::from(format!("{home}/.diamond"))
        );
        assert_eq!(expand_tilde(Path::new("/foo/bar")), PathBuf::from("/foo/bar"));
        assert_eq!(expand_tilde(Path::new("~foo/bar")), PathBuf::from("~foo/bar"));
    }

    #[test]
    fn paths_are_relative_to_home_dir() {
        let home_dir = Path::new("/srv/diamond");
        assert_eq!(
            expand_path(home_dir, Path::new("artifacts")),
            PathBuf::from("/srv/diamond/artifacts")
        );
        assert_eq!(
            expand_path(home_dir, Path::new("/opt/artifacts")),
            PathBuf::from("/opt/artifacts")
        );
    }

    #[test]
    #[serial_test::serial]
    fn interpolates_only_set_vars() {
        let i = with_env_vars::<_, _, ()>(vec![("DIAMOND_TEST_HOST", "node")], || {
            Ok(interpolate_str("http://${DIAMOND_TEST_HOST}:${DIAMOND_TEST_PORT}"))
        })
        .unwrap()
        .expect("has vars");
        assert_eq!(i, "http://node:${DIAMOND_TEST_PORT}");

        assert!(interpolate_str("no vars here").is_none());
        assert!(interpolate_str("${UNCLOSED").is_none());
    }
}
