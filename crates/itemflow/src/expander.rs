use crate::errors::ItemEvalResult;
use crate::item::{Item, ItemType, MetadataTable};
use crate::shredder::ItemExpressionCapture;
use indexmap::IndexMap;

/// Where `%(Name)` references are looked up during an expansion.
#[derive(Clone, Copy, Debug)]
pub enum MetadataScope<'a> {
    /// Metadata references are left unexpanded
    None,
    /// A single item, including its built-in metadata
    Item(&'a Item),
    /// A transient table of values evaluated earlier in the same metadata group
    Table(&'a MetadataTable),
}

pub type ItemLookup<'a> = dyn Fn(&ItemType) -> ItemEvalResult<Vec<Item>> + 'a;

/// Everything an expansion may read. The active metadata is always passed in explicitly.
#[derive(Clone, Copy)]
pub struct ExpansionContext<'a> {
    pub properties: &'a IndexMap<String, String>,
    pub items: &'a ItemLookup<'a>,
    pub metadata: MetadataScope<'a>,
}

impl<'a> ExpansionContext<'a> {
    pub fn new(properties: &'a IndexMap<String, String>, items: &'a ItemLookup<'a>) -> Self {
        ExpansionContext {
            properties,
            items,
            metadata: MetadataScope::None,
        }
    }

    pub fn with_metadata<'b>(&self, metadata: MetadataScope<'b>) -> ExpansionContext<'b>
    where
        'a: 'b,
    {
        ExpansionContext {
            properties: self.properties,
            items: self.items,
            metadata,
        }
    }

    pub fn lookup_items(&self, item_type: &ItemType) -> ItemEvalResult<Vec<Item>> {
        (self.items)(item_type)
    }
}

/// The expression engine the item operations delegate to. Implementations must be deterministic
/// for a fixed context.
pub trait Expander {
    /// Expand `$(...)` only. Item specifications are property-expanded before they are split into
    /// fragments.
    fn expand_properties(&self, expression: &str, ctx: &ExpansionContext) -> ItemEvalResult<String>;

    /// Expand everything, leaving escaped sequences escaped.
    fn expand_to_string(&self, expression: &str, ctx: &ExpansionContext) -> ItemEvalResult<String>;

    fn expand_capture_to_items(
        &self,
        capture: &ItemExpressionCapture,
        ctx: &ExpansionContext,
        include_null_results: bool,
    ) -> ItemEvalResult<Vec<Item>>;

    fn evaluate_condition(&self, condition: &str, ctx: &ExpansionContext) -> ItemEvalResult<bool>;
}
