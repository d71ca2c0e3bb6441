use crate::errors::ItemEvalResult;
use crate::evaluator::{ItemElement, LazyItemEvaluator};
use crate::expander::{ExpansionContext, Expander};
use crate::factory::DefaultItemFactory;
use crate::item::{Item, ItemType};
use crate::lazy_list::LazyItemList;
use crate::operation::IgnoreSet;
use crate::options::{EvaluatorOptions, EvaluatorOptionsBuilder};
use crate::shredder::ItemExpressionCapture;
use crate::simple_expander::SimpleExpander;
use crate::tests::{FixedGlobber, evaluator, evaluator_with, identities, items_of};
use indexmap::IndexMap;
use pretty_assertions::assert_eq;
use std::cell::RefCell;
use std::rc::Rc;

fn ignore(globs: &[&str]) -> IgnoreSet {
    globs.iter().map(|g| g.to_string()).collect()
}

fn shared_upstream(evaluator: &mut LazyItemEvaluator) {
    evaluator
        .process_item_elements([
            ItemElement::include("Source", "*.cs"),
            ItemElement::include("First", "@(Source)"),
            ItemElement::include("Second", "@(Source)"),
        ])
        .unwrap();

    for item_type in ["First", "Second", "Source"] {
        assert_eq!(
            identities(&items_of(evaluator, item_type)),
            vec!["a.cs", "b.cs"]
        );
    }
}

#[test_log::test]
fn upstream_globs_are_expanded_once() {
    let (mut e, globber) = evaluator(&["a.cs", "b.cs", "c.txt"]);
    shared_upstream(&mut e);
    assert_eq!(globber.expansions().len(), 1);
}

#[test_log::test]
fn results_do_not_depend_on_memoization() {
    let options = EvaluatorOptionsBuilder::default()
        .memoize_upstream(false)
        .build()
        .unwrap();
    let (mut e, globber) = evaluator_with(options, IndexMap::new(), &["a.cs", "b.cs", "c.txt"]);
    shared_upstream(&mut e);
    assert_eq!(globber.expansions().len(), 3);
}

#[test_log::test]
fn removed_globs_are_not_expanded_by_earlier_includes() {
    let (mut e, globber) = evaluator(&["a.cs", "b.txt", "c.cs"]);
    e.process_item_elements([
        ItemElement::include("Compile", "*.cs;*.txt"),
        ItemElement::remove("Compile", "*.txt"),
    ])
    .unwrap();

    assert_eq!(identities(&items_of(&e, "Compile")), vec!["a.cs", "c.cs"]);
    assert_eq!(
        globber.expansions(),
        vec![("*.cs".to_string(), vec!["*.txt".to_string()])]
    );
}

#[test_log::test]
fn includes_after_a_remove_still_expand() {
    let (mut e, globber) = evaluator(&["a.txt"]);
    e.process_item_elements([
        ItemElement::include("Content", "*.txt"),
        ItemElement::remove("Content", "*.txt"),
        ItemElement::include("Content", "*.txt"),
    ])
    .unwrap();

    assert_eq!(identities(&items_of(&e, "Content")), vec!["a.txt"]);
    assert_eq!(
        globber.expansions(),
        vec![("*.txt".to_string(), Vec::<String>::new())]
    );
}

#[test_log::test]
fn ignore_set_is_part_of_the_memo_key() {
    let (mut e, _) = evaluator(&["x.cs"]);
    e.process_item_element(ItemElement::include("Compile", "*.cs;a.txt"))
        .unwrap();

    let compile = ItemType::from("Compile");
    let ignoring = e.resolve_upstream(&compile, &ignore(&["*.cs"])).unwrap();
    assert_eq!(
        ignoring.iter().map(|d| d.item.identity()).collect::<Vec<_>>(),
        vec!["a.txt"]
    );
    assert_eq!(identities(&items_of(&e, "Compile")), vec!["x.cs", "a.txt"]);
}

#[test_log::test]
fn resolving_is_repeatable() {
    let (mut e, _) = evaluator(&["a.cs"]);
    e.process_item_elements([
        ItemElement::include("Compile", "*.cs;b.cs"),
        ItemElement::remove("Compile", "b.cs"),
    ])
    .unwrap();

    let first = e.all_items().unwrap();
    let second = e.all_items().unwrap();
    assert_eq!(first, second);
}

/// Resolves a list from inside item expansion, standing in for a reference back into a list that
/// is being resolved.
struct ReentrantExpander {
    inner: SimpleExpander,
    target: Rc<RefCell<Option<Rc<LazyItemList>>>>,
}

impl Expander for ReentrantExpander {
    fn expand_properties(&self, expression: &str, ctx: &ExpansionContext) -> ItemEvalResult<String> {
        self.inner.expand_properties(expression, ctx)
    }

    fn expand_to_string(&self, expression: &str, ctx: &ExpansionContext) -> ItemEvalResult<String> {
        self.inner.expand_to_string(expression, ctx)
    }

    fn expand_capture_to_items(
        &self,
        capture: &ItemExpressionCapture,
        ctx: &ExpansionContext,
        include_null_results: bool,
    ) -> ItemEvalResult<Vec<Item>> {
        if let Some(list) = self.target.borrow().as_ref() {
            list.get_items(&IgnoreSet::new())?;
        }
        self.inner
            .expand_capture_to_items(capture, ctx, include_null_results)
    }

    fn evaluate_condition(&self, condition: &str, ctx: &ExpansionContext) -> ItemEvalResult<bool> {
        self.inner.evaluate_condition(condition, ctx)
    }
}

#[test_log::test]
fn reentrant_resolution_is_reported() {
    let target = Rc::new(RefCell::new(None));
    let mut e = LazyItemEvaluator::new(
        EvaluatorOptions::default(),
        IndexMap::new(),
        Box::new(ReentrantExpander {
            inner: SimpleExpander::new(),
            target: Rc::clone(&target),
        }),
        Box::new(DefaultItemFactory::new(".")),
        Box::new(FixedGlobber::new(&[])),
    );
    e.process_item_elements([
        ItemElement::include("Other", "o"),
        ItemElement::include("Loop", "l;@(Other)"),
    ])
    .unwrap();

    let loop_type = ItemType::from("Loop");
    *target.borrow_mut() = e.item_list(&loop_type).cloned();

    let err = e.items(&loop_type).unwrap_err();
    let message = format!("{err:#}");
    assert!(
        message.contains("'Loop' was referenced while it was being resolved"),
        "{message}"
    );

    // The in-progress marker does not outlive the failed resolution
    *target.borrow_mut() = None;
    assert_eq!(identities(&items_of(&e, "Loop")), vec!["l", "o"]);
}
