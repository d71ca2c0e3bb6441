use derive_builder::Builder;
use std::path::PathBuf;

#[derive(Builder, Clone, Debug, Eq, PartialEq)]
#[builder(default)]
pub struct EvaluatorOptions {
    /// Globs and relative paths resolve against this directory. A relative directory is made
    /// absolute against the current directory for built-in path metadata such as `FullPath`.
    #[builder(setter(into))]
    pub project_directory: PathBuf,

    /// Keep the items of every list per ignore set once computed
    pub memoize_upstream: bool,

    pub case_insensitive_globs: bool,
}

impl Default for EvaluatorOptions {
    fn default() -> Self {
        EvaluatorOptions {
            project_directory: PathBuf::from("."),
            memoize_upstream: true,
            case_insensitive_globs: true,
        }
    }
}
