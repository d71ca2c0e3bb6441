use indexmap::IndexMap;
use itemflow::evaluator::{ItemElement, LazyItemEvaluator};
use itemflow::item::{Item, ItemType};
use itemflow::metadata::MetadataElement;
use itemflow::options::EvaluatorOptionsBuilder;
use pretty_assertions::assert_eq;
use std::fs;
use std::path::Path;

fn touch(root: &Path, files: &[&str]) {
    for file in files {
        let path = root.join(file);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "").unwrap();
    }
}

fn evaluator(root: &Path) -> LazyItemEvaluator {
    let options = EvaluatorOptionsBuilder::default()
        .project_directory(root)
        .build()
        .unwrap();
    LazyItemEvaluator::with_defaults(options, IndexMap::new())
}

fn identities(items: &[Item]) -> Vec<&str> {
    items.iter().map(Item::identity).collect()
}

#[test_log::test]
fn include_exclude_and_remove_files() {
    let dir = tempfile::tempdir().unwrap();
    touch(
        dir.path(),
        &[
            "src/a.cs",
            "src/sub/b.cs",
            "src/c.g.cs",
            "src/obj/d.cs",
            "src/readme.md",
        ],
    );

    let mut e = evaluator(dir.path());
    e.process_item_elements([
        ItemElement::include("Compile", "src/**/*.cs")
            .with_exclude("src/obj/**")
            .with_metadata(MetadataElement::new(
                "Link",
                "%(RecursiveDir)%(Filename)%(Extension)",
            )),
        ItemElement::remove("Compile", "**/*.g.cs"),
    ])
    .unwrap();

    let items = e.items(&ItemType::from("Compile")).unwrap();
    assert_eq!(identities(&items), vec!["src/a.cs", "src/sub/b.cs"]);

    let links = items
        .iter()
        .map(|item| item.get_metadata("Link").unwrap())
        .collect::<Vec<_>>();
    assert_eq!(links, vec!["a.cs", "sub/b.cs"]);
    assert_eq!(items[1].metadata_value("RelativeDir").unwrap(), "src/sub/");
}

#[test_log::test]
fn globs_are_case_insensitive_by_default() {
    let dir = tempfile::tempdir().unwrap();
    touch(dir.path(), &["One.CS", "two.cs", "three.vb"]);

    let mut e = evaluator(dir.path());
    e.process_item_elements([
        ItemElement::include("Compile", "*.cs"),
        ItemElement::include("Sorted", "@(Compile)"),
        ItemElement::remove("Sorted", "ONE.cs"),
    ])
    .unwrap();

    let compile = e.items(&ItemType::from("Compile")).unwrap();
    assert_eq!(identities(&compile), vec!["One.CS", "two.cs"]);

    let sorted = e.items(&ItemType::from("Sorted")).unwrap();
    assert_eq!(identities(&sorted), vec!["two.cs"]);
}

#[test_log::test]
fn missing_directories_yield_nothing() {
    let dir = tempfile::tempdir().unwrap();

    let mut e = evaluator(dir.path());
    e.process_item_element(ItemElement::include("Compile", "nowhere/**/*.cs;kept.cs"))
        .unwrap();

    let items = e.items(&ItemType::from("Compile")).unwrap();
    assert_eq!(identities(&items), vec!["kept.cs"]);
}
