use crate::errors::{ItemEvalError, ItemEvalResult};
use derive_more::{Display, From};
use indexmap::IndexMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;

/// Metadata names whose values are intrinsic to an item rather than assigned to it. Most of them
/// are derived from the item's identity, so they almost always differ between items.
pub static RESERVED_METADATA: [&str; 15] = [
    "FullPath",
    "RootDir",
    "Filename",
    "Extension",
    "RelativeDir",
    "Directory",
    "RecursiveDir",
    "Identity",
    "ModifiedTime",
    "CreatedTime",
    "AccessedTime",
    "DefiningProjectFullPath",
    "DefiningProjectDirectory",
    "DefiningProjectName",
    "DefiningProjectExtension",
];

pub fn is_reserved_metadata<S: AsRef<str>>(name: S) -> bool {
    let name = name.as_ref();
    RESERVED_METADATA
        .iter()
        .any(|reserved| reserved.eq_ignore_ascii_case(name))
}

/// Name of an item collection, e.g. `Compile` in `@(Compile)`.
#[derive(Clone, Debug, Display, From, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct ItemType(String);

impl ItemType {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ItemType {
    fn from(value: &str) -> Self {
        ItemType(value.to_string())
    }
}

pub type MetadataTable = IndexMap<String, String>;

pub(crate) fn get_metadata_in<'t>(table: &'t MetadataTable, name: &str) -> Option<&'t str> {
    table
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .map(|(_, value)| value.as_str())
}

pub(crate) fn set_metadata_in(table: &mut MetadataTable, name: &str, value: String) {
    match table.keys().position(|key| key.eq_ignore_ascii_case(name)) {
        Some(i) => table[i] = value,
        None => {
            table.insert(name.to_string(), value);
        }
    }
}

/// A single evaluated item.
///
/// The custom metadata table sits behind an `Rc` so that many items can share one table. Any write
/// through [`Item::set_metadata`] gives the written item its own copy first, so sharing is never
/// observable.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Item {
    item_type: ItemType,
    identity: String,
    metadata: Rc<MetadataTable>,
    recursive_dir: Option<String>,
    project_directory: Rc<Path>,
}

impl Item {
    pub fn new<S: Into<String>>(
        item_type: ItemType,
        identity: S,
        metadata: Rc<MetadataTable>,
        project_directory: Rc<Path>,
    ) -> Self {
        Item {
            item_type,
            identity: identity.into(),
            metadata,
            recursive_dir: None,
            project_directory,
        }
    }

    pub fn with_recursive_dir(mut self, recursive_dir: Option<String>) -> Self {
        self.recursive_dir = recursive_dir;
        self
    }

    pub fn item_type(&self) -> &ItemType {
        &self.item_type
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// Same metadata, different identity. Used for item transforms like `@(A->'%(Filename).obj')`.
    pub fn with_identity<S: Into<String>>(&self, identity: S) -> Item {
        Item {
            identity: identity.into(),
            recursive_dir: None,
            ..self.clone()
        }
    }

    /// Same identity and metadata, filed under another item type.
    pub fn retyped(&self, item_type: &ItemType) -> Item {
        Item {
            item_type: item_type.clone(),
            ..self.clone()
        }
    }

    /// Custom metadata in assignment order.
    pub fn metadata(&self) -> impl Iterator<Item = (&str, &str)> {
        self.metadata.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn metadata_count(&self) -> usize {
        self.metadata.len()
    }

    /// Custom metadata only; names are case-insensitive.
    pub fn get_metadata<S: AsRef<str>>(&self, name: S) -> Option<&str> {
        get_metadata_in(&self.metadata, name.as_ref())
    }

    /// Custom or built-in metadata. Built-in metadata always has a value, possibly empty.
    pub fn metadata_value<S: AsRef<str>>(&self, name: S) -> Option<String> {
        let name = name.as_ref();
        if is_reserved_metadata(name) {
            return Some(self.builtin_metadata(name));
        }

        self.get_metadata(name).map(String::from)
    }

    pub fn set_metadata<N: AsRef<str>, V: Into<String>>(
        &mut self,
        name: N,
        value: V,
    ) -> ItemEvalResult<()> {
        let name = name.as_ref();
        if is_reserved_metadata(name) {
            return Err(ItemEvalError::ReservedMetadata {
                name: name.to_string(),
            }
            .into());
        }

        set_metadata_in(Rc::make_mut(&mut self.metadata), name, value.into());
        Ok(())
    }

    /// Whether both items currently point at the same metadata table.
    pub fn shares_metadata_with(&self, other: &Item) -> bool {
        Rc::ptr_eq(&self.metadata, &other.metadata)
    }

    pub(crate) fn metadata_table(&self) -> &Rc<MetadataTable> {
        &self.metadata
    }

    pub(crate) fn replace_metadata_table(&mut self, table: Rc<MetadataTable>) {
        self.metadata = table;
    }

    fn full_path(&self) -> PathBuf {
        let identity = self.identity.replace('\\', "/");
        let path = Path::new(&identity);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.project_directory.join(path)
        }
    }

    fn file_name(&self) -> &str {
        self.identity
            .rsplit(['/', '\\'])
            .next()
            .unwrap_or(self.identity.as_str())
    }

    fn builtin_metadata(&self, name: &str) -> String {
        let file_name = self.file_name();
        let (stem, extension) = match file_name.rfind('.') {
            Some(dot) => (&file_name[..dot], &file_name[dot..]),
            None => (file_name, ""),
        };

        match name.to_ascii_lowercase().as_str() {
            "identity" => self.identity.clone(),
            "filename" => stem.to_string(),
            "extension" => extension.to_string(),
            "relativedir" => self
                .identity
                .rfind(['/', '\\'])
                .map(|sep| self.identity[..=sep].to_string())
                .unwrap_or_default(),
            "recursivedir" => self.recursive_dir.clone().unwrap_or_default(),
            "fullpath" => self.full_path().display().to_string(),
            "rootdir" => self
                .full_path()
                .ancestors()
                .last()
                .map(|root| root.display().to_string())
                .unwrap_or_default(),
            "directory" => {
                let full_path = self.full_path();
                let root = full_path.ancestors().last().unwrap_or(Path::new(""));
                match full_path.parent().and_then(|p| p.strip_prefix(root).ok()) {
                    Some(dir) if !dir.as_os_str().is_empty() => format!("{}/", dir.display()),
                    _ => String::new(),
                }
            }
            // Time and defining-project metadata are not tracked.
            _ => String::new(),
        }
    }
}

/// An item as stored in an item list: the item, the position of the element that produced it, and
/// whether that element's condition held.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ItemData {
    pub item: Item,
    pub element_order: usize,
    pub condition_result: bool,
}

impl ItemData {
    pub fn new(item: Item, element_order: usize, condition_result: bool) -> Self {
        ItemData {
            item,
            element_order,
            condition_result,
        }
    }
}
