use super::{BuildPlan, CopySource, CopySpec, Operation, Stage};

/// BuildKit frontend with `COPY --parents` and `COPY --exclude`.
pub const SYNTAX: &str = "docker/dockerfile:1.7-labs";

/// Renders a [`BuildPlan`] as a multi-stage Dockerfile.
pub struct DockerfileRenderer<'a> {
    plan: &'a BuildPlan,
    ignore_excludes: Vec<String>,
}

impl<'a> DockerfileRenderer<'a> {
    pub fn new(plan: &'a BuildPlan) -> Self {
        Self {
            plan,
            ignore_excludes: Vec::new(),
        }
    }

    /// Excludes applied to copies that request `.gitignore` handling.
    pub fn with_ignore_excludes(mut self, excludes: Vec<String>) -> Self {
        self.ignore_excludes = excludes;
        self
    }

    pub fn render(&self) -> String {
        let mut out = format!("# syntax={SYNTAX}\n");
        for stage in &self.plan.stages {
            out.push('\n');
            self.render_stage(&mut out, stage);
        }
        out
    }

    fn render_stage(&self, out: &mut String, stage: &Stage) {
        line(out, &format!("# === Stage: {} ===", stage.name));
        line(
            out,
            &format!(
                "FROM --platform={} {} AS {}",
                self.plan.platform, stage.base_image, stage.name
            ),
        );

        let mut mounts: Vec<String> = Vec::new();
        for op in &stage.ops {
            match op {
                Operation::Workdir(dir) => line(out, &format!("WORKDIR {dir}")),
                Operation::Env { key, value, expand } => {
                    let value = quote_env(value, !*expand);
                    line(out, &format!("ENV {key}={value}"));
                }
                Operation::MountCache { id, target } => {
                    mounts.push(format!("--mount=type=cache,id={id},target={target}"));
                }
                Operation::Exec(argv) => {
                    let mut run = vec!["RUN".to_owned()];
                    run.extend(mounts.iter().cloned());
                    run.push(json_array(argv));
                    line(out, &run.join(" "));
                }
                Operation::Copy(spec) => line(out, &self.render_copy(spec)),
                Operation::Entrypoint(argv) => line(out, &format!("ENTRYPOINT {}", json_array(argv))),
                Operation::DefaultArgs(args) => line(out, &format!("CMD {}", json_array(args))),
            }
        }
    }

    fn render_copy(&self, spec: &CopySpec) -> String {
        let mut parts = vec!["COPY".to_owned()];
        if let CopySource::Stage(name) = &spec.source {
            parts.push(format!("--from={name}"));
        }
        if !spec.include.is_empty() {
            parts.push("--parents".to_owned());
        }
        let ignore: &[String] = if spec.gitignore {
            self.ignore_excludes.as_slice()
        } else {
            &[]
        };
        for pattern in spec.exclude.iter().chain(ignore) {
            parts.push(format!("--exclude={pattern}"));
        }

        if spec.include.is_empty() {
            parts.push(spec.from_path.clone());
            parts.push(spec.dest.clone());
        } else {
            for path in &spec.include {
                parts.push(source_path(&spec.source, &spec.from_path, path));
            }
            parts.push(dir_dest(&spec.dest));
        }

        parts.join(" ")
    }
}

/// A source for `COPY --parents`: stage paths pivot on `/./` so the part
/// after it is recreated under the destination.
fn source_path(source: &CopySource, from_path: &str, path: &str) -> String {
    let path = optional_glob(path);
    match source {
        CopySource::Host if from_path == "." => path,
        _ => format!("{}/./{path}", from_path.trim_end_matches('/')),
    }
}

/// Turns `a/b.json` into `a/b.jso[n]` so a missing path matches nothing
/// instead of failing the copy.
fn optional_glob(path: &str) -> String {
    let path = path.trim_start_matches("./");
    if path == "." || path.is_empty() || path.contains(['*', '?', '[']) {
        return path.to_owned();
    }
    let mut chars: Vec<char> = path.trim_end_matches('/').chars().collect();
    match chars.pop() {
        Some(last) if last.is_alphanumeric() || matches!(last, '_' | '-') => {
            let head: String = chars.into_iter().collect();
            format!("{head}[{last}]")
        }
        _ => path.to_owned(),
    }
}

fn line(out: &mut String, text: &str) {
    out.push_str(text);
    out.push('\n');
}

fn dir_dest(dest: &str) -> String {
    if dest.ends_with('/') {
        dest.to_owned()
    } else {
        format!("{dest}/")
    }
}

/// JSON exec form, e.g. `["pnpm","fetch"]`.
fn json_array(argv: &[String]) -> String {
    serde_json::Value::from(argv.to_vec()).to_string()
}

fn quote_env(value: &str, escape_vars: bool) -> String {
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('"');
    for c in value.chars() {
        match c {
            '"' | '\\' => {
                quoted.push('\\');
                quoted.push(c);
            }
            '$' if escape_vars => quoted.push_str("\\$"),
            _ => quoted.push(c),
        }
    }
    quoted.push('"');
    quoted
}

/// Translates root `.gitignore` content into `COPY --exclude` patterns.
///
/// Negations have no `--exclude` equivalent and are dropped; unanchored
/// patterns match at any depth.
pub fn gitignore_excludes(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#') && !line.starts_with('!'))
        .map(|line| {
            let body = line.trim_end_matches('/');
            match body.strip_prefix('/') {
                Some(anchored) => anchored.to_owned(),
                None if body.contains('/') || body.starts_with("**") => body.to_owned(),
                None => format!("**/{body}"),
            }
        })
        .filter(|pattern| !pattern.is_empty() && pattern != "**/")
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn optional_glob_wraps_last_character() {
        assert_eq!(optional_glob(".npmrc"), ".npmr[c]");
        assert_eq!(optional_glob("apps/api/package.json"), "apps/api/package.jso[n]");
        assert_eq!(optional_glob("apps/api/"), "apps/ap[i]");
        assert_eq!(optional_glob("."), ".");
        assert_eq!(optional_glob("src/*.ts"), "src/*.ts");
        assert_eq!(optional_glob("./tsconfig.json"), "tsconfig.jso[n]");
    }

    #[test]
    fn stage_sources_pivot_on_dot() {
        let stage = CopySource::Stage("builder".to_owned());
        assert_eq!(
            source_path(&stage, "/app", "apps/api/node_modules"),
            "/app/./apps/api/node_module[s]"
        );
        assert_eq!(source_path(&CopySource::Host, ".", "pnpm-lock.yaml"), "pnpm-lock.yam[l]");
    }

    #[test]
    fn env_values_are_quoted() {
        assert_eq!(quote_env("$PNPM_HOME:$PATH", false), "\"$PNPM_HOME:$PATH\"");
        assert_eq!(quote_env("a$b \"c\"", true), "\"a\\$b \\\"c\\\"\"");
    }

    #[test]
    fn gitignore_translation() {
        let excludes = gitignore_excludes("# deps\nnode_modules/\n/coverage\ndist\n!keep\n\npackages/*/tmp\n**/.env\n");
        assert_eq!(
            excludes,
            vec!["**/node_modules", "coverage", "**/dist", "packages/*/tmp", "**/.env"]
        );
    }
}
