use crate::errors::ItemEvalResult;
use crate::expander::{ExpansionContext, Expander};
use crate::glob::{GlobMatcher, GlobPredicate, is_glob};
use crate::item::{Item, ItemType};
use crate::shredder::ItemExpressionCapture;
use fxhash::FxHashSet;
use itemflow_util::split_item_spec::split_item_spec;

/// One `;`-separated piece of an item specification.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum SpecFragment {
    /// e.g. `a.cs`
    Value(String),
    /// e.g. `src/**/*.cs`
    Glob(String),
    /// e.g. `@(Compile)`; once expanded, its items only ever match as literal values
    Expression(ItemExpressionCapture),
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ItemSpec {
    fragments: Vec<SpecFragment>,
}

impl ItemSpec {
    pub fn new(fragments: Vec<SpecFragment>) -> Self {
        ItemSpec { fragments }
    }

    /// Split and classify an item specification. Properties must already be expanded.
    pub fn parse<S: AsRef<str>>(text: S) -> ItemEvalResult<ItemSpec> {
        let text = text.as_ref();
        let mut fragments = vec![];

        for range in split_item_spec(text) {
            let piece = &text[range];
            let fragment = if piece.contains("@(") {
                SpecFragment::Expression(ItemExpressionCapture::parse(piece)?)
            } else if is_glob(piece) {
                SpecFragment::Glob(piece.to_string())
            } else {
                SpecFragment::Value(piece.to_string())
            };
            fragments.push(fragment);
        }

        Ok(ItemSpec { fragments })
    }

    pub fn fragments(&self) -> &[SpecFragment] {
        &self.fragments
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    pub fn globs(&self) -> impl Iterator<Item = &str> {
        self.fragments.iter().filter_map(|f| match f {
            SpecFragment::Glob(glob) => Some(glob.as_str()),
            _ => None,
        })
    }

    pub fn referenced_item_types(&self) -> impl Iterator<Item = &ItemType> {
        self.fragments.iter().filter_map(|f| match f {
            SpecFragment::Expression(capture) => Some(&capture.item_type),
            _ => None,
        })
    }

    /// Resolve the specification into a predicate over item identities. Item references are
    /// expanded here, against `ctx`.
    pub fn matcher(
        &self,
        ctx: &ExpansionContext,
        expander: &dyn Expander,
        globber: &dyn GlobMatcher,
    ) -> ItemEvalResult<ItemSpecMatcher> {
        let mut values = FxHashSet::default();
        let mut globs = vec![];

        for fragment in &self.fragments {
            match fragment {
                SpecFragment::Expression(capture) => {
                    for item in expander.expand_capture_to_items(capture, ctx, false)? {
                        values.insert(item.identity().to_ascii_lowercase());
                    }
                }
                SpecFragment::Value(value) => {
                    values.insert(value.to_ascii_lowercase());
                }
                SpecFragment::Glob(glob) => globs.push(glob.clone()),
            }
        }

        Ok(ItemSpecMatcher {
            values,
            globs: globber.build_predicate(&globs)?,
        })
    }
}

/// Literal values (ASCII case-insensitive) plus one combined glob predicate.
#[derive(Debug, Default)]
pub struct ItemSpecMatcher {
    values: FxHashSet<String>,
    globs: GlobPredicate,
}

impl ItemSpecMatcher {
    pub fn is_match<S: AsRef<str>>(&self, identity: S) -> bool {
        let identity = identity.as_ref();
        self.values.contains(&identity.to_ascii_lowercase()) || self.globs.is_match(identity)
    }

    /// Positions of the matching items, in their original order.
    pub fn matching_positions<'i, I>(&self, items: I) -> Vec<usize>
    where
        I: IntoIterator<Item = &'i Item>,
    {
        items
            .into_iter()
            .enumerate()
            .filter(|(_, item)| self.is_match(item.identity()))
            .map(|(i, _)| i)
            .collect()
    }
}
