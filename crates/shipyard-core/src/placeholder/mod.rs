//! `{{ expr | modifier(args) }}` templating used across build configuration.
//!
//! Lookup order is fixed: the built-in table (`git.*`, `time.*`) first, then
//! each caller-supplied [`ResolverTable`] in the order given.

mod builtin;
mod git;
mod modifiers;
mod scanner;

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

pub use git::{GitCli, GitRepositoryInfo};
pub use modifiers::{ModifierFn, ModifierRegistry};
pub use scanner::{ModifierCall, Placeholder, extract, split_args, unquote};

/// A zero-argument lookup producing a placeholder value.
pub type ResolverFn = Box<dyn Fn() -> crate::Result<String> + Send + Sync>;

/// Caller-supplied lookups, e.g. `app.dir` bound to the package being built.
#[derive(Default)]
pub struct ResolverTable {
    entries: BTreeMap<String, ResolverFn>,
}

impl ResolverTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert<F>(&mut self, key: impl Into<String>, resolver: F)
    where
        F: Fn() -> crate::Result<String> + Send + Sync + 'static,
    {
        self.entries.insert(key.into(), Box::new(resolver));
    }

    /// Binds `key` to a fixed value.
    pub fn with_value(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let value = value.into();
        self.insert(key, move || Ok(value.clone()));
        self
    }

    pub fn get(&self, key: &str) -> Option<&ResolverFn> {
        self.entries.get(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }
}

impl fmt::Debug for ResolverTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.entries.keys()).finish()
    }
}

type BuiltinFn = fn(&Placeholders) -> crate::Result<String>;

const BUILTINS: &[(&str, BuiltinFn)] = &[
    ("git.branch", git_branch),
    ("git.commit", git_commit),
    ("git.tag", git_tag),
    ("time.timestamp", time_timestamp),
    ("time.iso8601", time_iso8601),
];

fn git_branch(p: &Placeholders) -> crate::Result<String> {
    p.git.current_branch()
}

fn git_commit(p: &Placeholders) -> crate::Result<String> {
    p.git.current_commit()
}

fn git_tag(p: &Placeholders) -> crate::Result<String> {
    p.git.current_tag()?.ok_or(crate::Error::NoGitTag)
}

fn time_timestamp(_: &Placeholders) -> crate::Result<String> {
    builtin::unix_timestamp()
}

fn time_iso8601(_: &Placeholders) -> crate::Result<String> {
    builtin::iso8601_timestamp()
}

/// Resolves placeholders in arbitrary strings.
#[derive(Clone)]
pub struct Placeholders {
    git: Arc<dyn GitRepositoryInfo>,
    modifiers: ModifierRegistry,
}

impl fmt::Debug for Placeholders {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Placeholders").finish_non_exhaustive()
    }
}

impl Placeholders {
    pub fn new(git: Arc<dyn GitRepositoryInfo>) -> Self {
        Self {
            git,
            modifiers: ModifierRegistry,
        }
    }

    /// Keys served by the built-in table.
    pub fn builtin_keys() -> impl Iterator<Item = &'static str> {
        BUILTINS.iter().map(|(key, _)| *key)
    }

    /// Replaces every placeholder in `text` with its modified value.
    ///
    /// Each occurrence is resolved on its own and substituted at its own span,
    /// so repeated identical placeholders each consult their resolver.
    ///
    /// # Errors
    ///
    /// - [`Error::UnresolvedPlaceholder`](crate::Error::UnresolvedPlaceholder) when no table knows the key
    /// - [`Error::UnknownModifier`](crate::Error::UnknownModifier) for a modifier outside the registry
    /// - [`Error::PlaceholderResolution`](crate::Error::PlaceholderResolution) wrapping resolver and modifier failures
    pub fn resolve(&self, text: &str, extra: &[&ResolverTable]) -> crate::Result<String> {
        let placeholders = extract(text)?;
        if placeholders.is_empty() {
            return Ok(text.to_owned());
        }

        let mut out = String::with_capacity(text.len());
        let mut cursor = 0;
        for placeholder in &placeholders {
            let value = self.resolve_one(placeholder, extra)?;
            out.push_str(&text[cursor..placeholder.span.start]);
            out.push_str(&value);
            cursor = placeholder.span.end;
        }
        out.push_str(&text[cursor..]);

        tracing::trace!(input = %text, output = %out, "resolved placeholders");
        Ok(out)
    }

    /// Resolves each item of `values`, stopping at the first failure.
    pub fn resolve_all<S: AsRef<str>>(
        &self,
        values: &[S],
        extra: &[&ResolverTable],
    ) -> crate::Result<Vec<String>> {
        values
            .iter()
            .map(|v| self.resolve(v.as_ref(), extra))
            .collect()
    }

    fn resolve_one(&self, placeholder: &Placeholder, extra: &[&ResolverTable]) -> crate::Result<String> {
        let wrap = |source: crate::Error| crate::Error::PlaceholderResolution {
            placeholder: placeholder.raw.clone(),
            source: Box::new(source),
        };

        let mut value = match BUILTINS.iter().find(|(key, _)| *key == placeholder.expr) {
            Some((_, builtin)) => builtin(self).map_err(wrap)?,
            None => {
                let resolver = extra
                    .iter()
                    .find_map(|table| table.get(&placeholder.expr))
                    .ok_or_else(|| crate::Error::UnresolvedPlaceholder {
                        placeholder: placeholder.raw.clone(),
                    })?;
                resolver().map_err(wrap)?
            }
        };

        for call in &placeholder.modifiers {
            let modifier = self.modifiers.lookup(&call.name).ok_or_else(|| {
                crate::Error::UnknownModifier {
                    modifier: call.name.clone(),
                    placeholder: placeholder.raw.clone(),
                }
            })?;
            value = modifier(&value, &call.args).map_err(wrap)?;
        }

        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StaticGit;

    impl GitRepositoryInfo for StaticGit {
        fn current_branch(&self) -> crate::Result<String> {
            Ok("main".to_owned())
        }
        fn current_commit(&self) -> crate::Result<String> {
            Ok("56b189842130315a634ce6d510a4578f151eca32".to_owned())
        }
        fn current_tag(&self) -> crate::Result<Option<String>> {
            Ok(None)
        }
    }

    fn placeholders() -> Placeholders {
        Placeholders::new(Arc::new(StaticGit))
    }

    #[test]
    fn text_without_placeholders_is_unchanged() {
        assert_eq!(placeholders().resolve("plain {text}", &[]).unwrap(), "plain {text}");
    }

    #[test]
    fn builtins_shadow_extra_tables() {
        let extra = ResolverTable::new().with_value("git.branch", "shadowed");
        let out = placeholders().resolve("{{ git.branch }}", &[&extra]).unwrap();
        assert_eq!(out, "main");
    }

    #[test]
    fn extra_tables_checked_in_order() {
        let first = ResolverTable::new().with_value("app.dir", "apps/api");
        let second = ResolverTable::new()
            .with_value("app.dir", "ignored")
            .with_value("app.package", "api");
        let out = placeholders()
            .resolve("{{app.dir}}:{{app.package}}", &[&first, &second])
            .unwrap();
        assert_eq!(out, "apps/api:api");
    }

    #[test]
    fn missing_tag_is_bad_user_input() {
        let err = placeholders().resolve("{{ git.tag }}", &[]).unwrap_err();
        assert!(err.is_bad_user_input());
        assert!(err.to_string().contains("{{ git.tag }}"), "got: {err}");
    }

    #[test]
    fn resolver_table_debug_lists_keys() {
        let table = ResolverTable::new().with_value("app.dir", "x");
        assert_eq!(format!("{table:?}"), r#"{"app.dir"}"#);
        assert_eq!(table.keys().collect::<Vec<_>>(), vec!["app.dir"]);
    }
}
