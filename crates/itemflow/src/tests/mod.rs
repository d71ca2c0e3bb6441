mod lazy_resolution;

use crate::errors::ItemEvalResult;
use crate::evaluator::LazyItemEvaluator;
use crate::factory::DefaultItemFactory;
use crate::glob::{FileGlobber, GlobMatch, GlobMatcher, GlobPredicate};
use crate::item::{Item, ItemType};
use crate::options::EvaluatorOptions;
use crate::simple_expander::SimpleExpander;
use indexmap::IndexMap;
use std::cell::RefCell;
use std::rc::Rc;

/// Globs against a fixed list of paths and records every expansion it is asked for.
#[derive(Clone, Default)]
pub(crate) struct FixedGlobber {
    files: Vec<String>,
    expansions: Rc<RefCell<Vec<(String, Vec<String>)>>>,
}

impl FixedGlobber {
    pub(crate) fn new(files: &[&str]) -> Self {
        FixedGlobber {
            files: files.iter().map(|f| f.to_string()).collect(),
            expansions: Rc::default(),
        }
    }

    pub(crate) fn expansions(&self) -> Vec<(String, Vec<String>)> {
        self.expansions.borrow().clone()
    }
}

impl GlobMatcher for FixedGlobber {
    fn build_predicate(&self, patterns: &[String]) -> ItemEvalResult<GlobPredicate> {
        FileGlobber::new(".", true).build_predicate(patterns)
    }

    fn expand(&self, pattern: &str, excludes: &[String]) -> ItemEvalResult<Vec<GlobMatch>> {
        self.expansions
            .borrow_mut()
            .push((pattern.to_string(), excludes.to_vec()));

        let matcher = self.build_predicate(&[pattern.to_string()])?;
        let excludes = self.build_predicate(excludes)?;
        Ok(self
            .files
            .iter()
            .filter(|f| matcher.is_match(f) && !excludes.is_match(f))
            .map(|f| GlobMatch {
                path: f.clone(),
                recursive_dir: String::new(),
            })
            .collect())
    }
}

pub(crate) fn evaluator(files: &[&str]) -> (LazyItemEvaluator, FixedGlobber) {
    evaluator_with(EvaluatorOptions::default(), IndexMap::new(), files)
}

pub(crate) fn evaluator_with(
    options: EvaluatorOptions,
    properties: IndexMap<String, String>,
    files: &[&str],
) -> (LazyItemEvaluator, FixedGlobber) {
    let globber = FixedGlobber::new(files);
    let factory = DefaultItemFactory::new(options.project_directory.clone());
    let evaluator = LazyItemEvaluator::new(
        options,
        properties,
        Box::new(SimpleExpander::new()),
        Box::new(factory),
        Box::new(globber.clone()),
    );
    (evaluator, globber)
}

pub(crate) fn items_of(evaluator: &LazyItemEvaluator, item_type: &str) -> Vec<Item> {
    evaluator.items(&ItemType::from(item_type)).unwrap()
}

pub(crate) fn identities(items: &[Item]) -> Vec<&str> {
    items.iter().map(Item::identity).collect()
}
