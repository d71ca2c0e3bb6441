use crate::errors::{ItemEvalError, ItemEvalResult};
use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use std::borrow::Cow;
use std::path::{Path, PathBuf};
use tracing::trace;
use walkdir::WalkDir;

const WILDCARDS: [char; 2] = ['*', '?'];

/// Whether an item specification fragment should be treated as a glob rather than a literal value.
pub fn is_glob<S: AsRef<str>>(fragment: S) -> bool {
    fragment.as_ref().contains(WILDCARDS)
}

fn trim_current_dir(mut value: &str) -> &str {
    while let Some(rest) = value.strip_prefix("./") {
        value = rest;
    }
    value
}

// Forward slashes only, without leading `./` segments
fn normalize(value: &str) -> Cow<'_, str> {
    if value.contains('\\') {
        Cow::Owned(trim_current_dir(&value.replace('\\', "/")).to_string())
    } else {
        Cow::Borrowed(trim_current_dir(value))
    }
}

// Only `*`, `?` and `**` are wildcards; brackets and braces are file name characters.
fn escape_literals(pattern: &str) -> String {
    let mut ret = String::with_capacity(pattern.len());
    for c in pattern.chars() {
        match c {
            '[' | ']' | '{' | '}' => {
                ret.push('[');
                ret.push(c);
                ret.push(']');
            }
            _ => ret.push(c),
        }
    }
    ret
}

// Leading directories of a pattern that contain no wildcards, including the trailing '/'
fn fixed_prefix(pattern: &str) -> &str {
    let mut end = 0;
    for (i, _) in pattern.match_indices('/') {
        if pattern[..i].contains(WILDCARDS) {
            break;
        }
        end = i + 1;
    }
    &pattern[..end]
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct GlobMatch {
    pub path: String,
    /// The directories matched by the wildcard part of the pattern, e.g. `a/b/` for
    /// `src/**/*.cs` matching `src/a/b/x.cs`
    pub recursive_dir: String,
}

/// A single predicate equivalent to OR-ing a test against each of its patterns.
#[derive(Clone, Debug, Default)]
pub struct GlobPredicate {
    set: Option<GlobSet>,
}

impl GlobPredicate {
    pub fn is_match<S: AsRef<str>>(&self, value: S) -> bool {
        self.set
            .as_ref()
            .is_some_and(|set| set.is_match(normalize(value.as_ref()).as_ref()))
    }

    pub fn is_empty(&self) -> bool {
        self.set.as_ref().is_none_or(GlobSet::is_empty)
    }
}

pub trait GlobMatcher {
    fn build_predicate(&self, patterns: &[String]) -> ItemEvalResult<GlobPredicate>;

    /// Expand `pattern` against the file system, skipping anything matched by `excludes`.
    fn expand(&self, pattern: &str, excludes: &[String]) -> ItemEvalResult<Vec<GlobMatch>>;
}

/// Globs files below a project directory. `*` and `?` never cross a `/`; `**` does.
#[derive(Clone, Debug)]
pub struct FileGlobber {
    root: PathBuf,
    case_insensitive: bool,
}

impl FileGlobber {
    pub fn new<P: Into<PathBuf>>(root: P, case_insensitive: bool) -> Self {
        FileGlobber {
            root: root.into(),
            case_insensitive,
        }
    }
}

impl GlobMatcher for FileGlobber {
    fn build_predicate(&self, patterns: &[String]) -> ItemEvalResult<GlobPredicate> {
        if patterns.is_empty() {
            return Ok(GlobPredicate::default());
        }

        let mut builder = GlobSetBuilder::new();
        for pattern in patterns {
            let glob = GlobBuilder::new(&escape_literals(&normalize(pattern)))
                .case_insensitive(self.case_insensitive)
                .literal_separator(true)
                .build()
                .map_err(|source| ItemEvalError::InvalidGlob {
                    pattern: pattern.clone(),
                    source,
                })?;
            builder.add(glob);
        }

        let set = builder.build().map_err(|source| ItemEvalError::InvalidGlob {
            pattern: patterns.join(";"),
            source,
        })?;

        Ok(GlobPredicate { set: Some(set) })
    }

    fn expand(&self, pattern: &str, excludes: &[String]) -> ItemEvalResult<Vec<GlobMatch>> {
        let pattern = normalize(pattern);
        let matcher = self.build_predicate(&[pattern.to_string()])?;
        let excludes = self.build_predicate(excludes)?;

        let base = fixed_prefix(&pattern);
        let absolute = Path::new(pattern.as_ref()).is_absolute();
        let walk_root = self.root.join(base);
        if !walk_root.is_dir() {
            trace!(%pattern, "glob base directory does not exist");
            return Ok(vec![]);
        }

        let mut ret = vec![];
        for entry in WalkDir::new(&walk_root).sort_by_file_name() {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }

            let path = if absolute {
                entry.path()
            } else {
                match entry.path().strip_prefix(&self.root) {
                    Ok(relative) => relative,
                    Err(_) => continue,
                }
            };

            let path = normalize(&path.to_string_lossy()).into_owned();
            if !matcher.is_match(&path) || excludes.is_match(&path) {
                continue;
            }

            let wildcard_part = path.get(base.len()..).unwrap_or_default();
            let recursive_dir = wildcard_part
                .rfind('/')
                .map(|i| wildcard_part[..=i].to_string())
                .unwrap_or_default();

            ret.push(GlobMatch {
                path,
                recursive_dir,
            });
        }

        trace!(%pattern, matches = ret.len(), "expanded glob");
        Ok(ret)
    }
}

#[cfg(test)]
mod test {
    use crate::glob::{FileGlobber, GlobMatch, GlobMatcher, fixed_prefix, is_glob};
    use pretty_assertions::assert_eq;
    use std::fs;

    fn patterns(p: &[&str]) -> Vec<String> {
        p.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn glob_detection() {
        assert!(is_glob("*.cs"));
        assert!(is_glob("a?.cs"));
        assert!(!is_glob("a.cs"));
    }

    #[test]
    fn prefix() {
        assert_eq!(fixed_prefix("src/**/*.cs"), "src/");
        assert_eq!(fixed_prefix("src/a/*.cs"), "src/a/");
        assert_eq!(fixed_prefix("*.cs"), "");
        assert_eq!(fixed_prefix("**/x/*.cs"), "");
    }

    #[test]
    fn predicate_is_union() {
        let globber = FileGlobber::new(".", true);
        let both = globber.build_predicate(&patterns(&["*.cs", "*.vb"])).unwrap();
        let cs = globber.build_predicate(&patterns(&["*.cs"])).unwrap();
        let vb = globber.build_predicate(&patterns(&["*.vb"])).unwrap();

        for value in ["a.cs", "b.vb", "c.fs", "dir/a.cs", "A.CS", "x.cs.bak"] {
            assert_eq!(
                both.is_match(value),
                cs.is_match(value) || vb.is_match(value),
                "{value}"
            );
        }
        assert!(both.is_match("A.CS"));
        assert!(!both.is_match("dir/a.cs"));
    }

    #[test]
    fn predicate_case_sensitivity_and_separators() {
        let sensitive = FileGlobber::new(".", false);
        let p = sensitive.build_predicate(&patterns(&["src/**/*.cs"])).unwrap();
        assert!(p.is_match("src/a/b/c.cs"));
        assert!(p.is_match(r"src\a\c.cs"));
        assert!(!p.is_match("src/a/C.CS"));
    }

    #[test]
    fn empty_predicate_matches_nothing() {
        let globber = FileGlobber::new(".", true);
        let p = globber.build_predicate(&[]).unwrap();
        assert!(p.is_empty());
        assert!(!p.is_match("anything"));
    }

    #[test]
    fn brackets_and_braces_are_literal() {
        let globber = FileGlobber::new(".", true);

        let p = globber.build_predicate(&patterns(&["lib[1]/*.dll"])).unwrap();
        assert!(p.is_match("lib[1]/a.dll"));
        assert!(!p.is_match("lib1/b.dll"));

        let p = globber.build_predicate(&patterns(&["c{x}*.txt"])).unwrap();
        assert!(p.is_match("c{x}.txt"));
        assert!(!p.is_match("cx.txt"));

        let p = globber.build_predicate(&patterns(&["a[*.cs"])).unwrap();
        assert!(p.is_match("a[b].cs"));
        assert!(!p.is_match("ab.cs"));

        assert_eq!(fixed_prefix("lib[1]/*.dll"), "lib[1]/");
    }

    #[test]
    fn leading_current_dir_is_ignored() {
        let globber = FileGlobber::new(".", true);
        let p = globber.build_predicate(&patterns(&["./src/*.cs"])).unwrap();
        assert!(p.is_match("src/a.cs"));
        assert!(p.is_match("./src/a.cs"));
        assert!(p.is_match(r".\src\a.cs"));
    }

    #[test]
    fn expand_files() {
        let dir = tempfile::tempdir().unwrap();
        for file in [
            "a.cs",
            "b.txt",
            "src/c.cs",
            "src/x/y/d.cs",
            "src/x/e.tmp",
            "lib[1]/a.dll",
            "lib1/b.dll",
        ] {
            let path = dir.path().join(file);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, "").unwrap();
        }

        let globber = FileGlobber::new(dir.path(), true);

        let matches = globber.expand("src/**/*.cs", &[]).unwrap();
        assert_eq!(
            matches,
            vec![
                GlobMatch {
                    path: "src/c.cs".into(),
                    recursive_dir: "".into()
                },
                GlobMatch {
                    path: "src/x/y/d.cs".into(),
                    recursive_dir: "x/y/".into()
                },
            ]
        );

        let top = globber.expand("*.cs", &[]).unwrap();
        assert_eq!(top.len(), 1);
        assert_eq!(top[0].path, "a.cs");

        let excluded = globber
            .expand("**/*.cs", &patterns(&["src/x/**"]))
            .unwrap()
            .into_iter()
            .map(|m| m.path)
            .collect::<Vec<_>>();
        assert_eq!(excluded, vec!["a.cs", "src/c.cs"]);

        assert!(globber.expand("missing/**/*.cs", &[]).unwrap().is_empty());

        let dotted = globber.expand("././src/*.cs", &[]).unwrap();
        assert_eq!(
            dotted,
            vec![GlobMatch {
                path: "src/c.cs".into(),
                recursive_dir: "".into()
            }]
        );

        let bracketed = globber
            .expand("lib[1]/*.dll", &[])
            .unwrap()
            .into_iter()
            .map(|m| m.path)
            .collect::<Vec<_>>();
        assert_eq!(bracketed, vec!["lib[1]/a.dll"]);
    }
}
