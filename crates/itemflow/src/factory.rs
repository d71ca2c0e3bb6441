use crate::errors::{ItemEvalError, ItemEvalResult};
use crate::glob::GlobMatch;
use crate::item::{Item, ItemType, MetadataTable, is_reserved_metadata, set_metadata_in};
use fxhash::FxHashMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;

/// What a new item is made from.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ItemSource {
    Value(String),
    Glob(GlobMatch),
}

pub trait ItemFactory {
    fn create_items(&self, item_type: &ItemType, sources: Vec<ItemSource>) -> Vec<Item>;

    /// Copy an item that came from another item list into `item_type`, keeping its metadata.
    fn clone_item_as(&self, item_type: &ItemType, source: &Item) -> Item {
        source.retyped(item_type)
    }

    /// Apply the same name/value pairs to every item in one call.
    fn set_metadata_batch(
        &self,
        metadata: &[(String, String)],
        items: &mut [Item],
    ) -> ItemEvalResult<()>;

    fn create_values<I, S>(&self, item_type: &ItemType, values: I) -> Vec<Item>
    where
        Self: Sized,
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.create_items(
            item_type,
            values
                .into_iter()
                .map(|v| ItemSource::Value(v.into()))
                .collect(),
        )
    }
}

/// Creates items that all start out sharing a single empty metadata table, and applies batched
/// metadata so that items which shared a table before the batch share the resulting table too.
#[derive(Debug)]
pub struct DefaultItemFactory {
    project_directory: Rc<Path>,
    empty_metadata: Rc<MetadataTable>,
}

impl DefaultItemFactory {
    /// Relative project directories are made absolute against the current directory, so that
    /// `FullPath` and friends are always absolute.
    pub fn new<P: Into<PathBuf>>(project_directory: P) -> Self {
        let project_directory = project_directory.into();
        let project_directory = std::path::absolute(&project_directory).unwrap_or(project_directory);
        DefaultItemFactory {
            project_directory: Rc::from(project_directory),
            empty_metadata: Rc::new(MetadataTable::new()),
        }
    }
}

impl ItemFactory for DefaultItemFactory {
    fn create_items(&self, item_type: &ItemType, sources: Vec<ItemSource>) -> Vec<Item> {
        sources
            .into_iter()
            .map(|source| {
                let (identity, recursive_dir) = match source {
                    ItemSource::Value(value) => (value, None),
                    ItemSource::Glob(m) => (m.path, Some(m.recursive_dir)),
                };
                Item::new(
                    item_type.clone(),
                    identity,
                    Rc::clone(&self.empty_metadata),
                    Rc::clone(&self.project_directory),
                )
                .with_recursive_dir(recursive_dir)
            })
            .collect()
    }

    fn set_metadata_batch(
        &self,
        metadata: &[(String, String)],
        items: &mut [Item],
    ) -> ItemEvalResult<()> {
        if metadata.is_empty() {
            return Ok(());
        }

        if let Some((name, _)) = metadata.iter().find(|(name, _)| is_reserved_metadata(name)) {
            return Err(ItemEvalError::ReservedMetadata { name: name.clone() }.into());
        }

        // One output table per distinct input table
        let mut tables: FxHashMap<*const MetadataTable, Rc<MetadataTable>> =
            FxHashMap::default();

        for item in items.iter_mut() {
            let current = item.metadata_table();
            let table = tables
                .entry(Rc::as_ptr(current))
                .or_insert_with(|| {
                    let mut table = MetadataTable::clone(current);
                    for (name, value) in metadata {
                        set_metadata_in(&mut table, name, value.clone());
                    }
                    Rc::new(table)
                })
                .clone();
            item.replace_metadata_table(table);
        }

        Ok(())
    }
}
