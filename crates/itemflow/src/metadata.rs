//! Applying a group of metadata elements to a set of items.
//!
//! A group is either evaluated once and the resulting table applied to every item ("shared"
//! mode), or evaluated separately for every item ("individual" mode). Both paths are plain
//! functions over the same inputs, and [`plan_batch`] only picks shared mode when the two are
//! guaranteed to agree.

use crate::errors::ItemEvalResult;
use crate::expander::{ExpansionContext, Expander, MetadataScope};
use crate::factory::ItemFactory;
use crate::item::{Item, MetadataTable, set_metadata_in};
use crate::location::ElementLocation;
use crate::shredder::{MetadataReferences, referenced_metadata};
use anyhow::Context;
use tracing::{debug, trace};

/// `<Name Condition="...">value</Name>`
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct MetadataElement {
    pub name: String,
    pub value: String,
    pub condition: Option<String>,
    pub location: ElementLocation,
}

impl MetadataElement {
    pub fn new<N: Into<String>, V: Into<String>>(name: N, value: V) -> Self {
        MetadataElement {
            name: name.into(),
            value: value.into(),
            condition: None,
            location: ElementLocation::default(),
        }
    }

    pub fn with_condition<C: Into<String>>(mut self, condition: C) -> Self {
        self.condition = Some(condition.into());
        self
    }

    pub fn with_location(mut self, location: ElementLocation) -> Self {
        self.location = location;
        self
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum IndividualReason {
    /// Built-in metadata such as `%(Filename)` differs from item to item.
    BuiltInMetadata,
    /// Custom metadata may differ too, particularly when the items came from other item lists.
    CustomMetadata { references_upstream: bool },
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum BatchStrategy {
    Shared,
    Individual(IndividualReason),
}

/// Decide how a metadata group must be evaluated. Every value and condition is scanned for bare
/// metadata references; any reference at all forces individual mode.
///
/// Custom metadata on items that did not come from another item list would in principle be
/// identical for all items, but that is not relied upon: a custom reference forces individual
/// mode whether or not `references_upstream` is set.
pub fn plan_batch(
    metadata: &[MetadataElement],
    references_upstream: bool,
) -> ItemEvalResult<BatchStrategy> {
    let mut references = MetadataReferences::default();
    for element in metadata {
        let texts = std::iter::once(element.value.as_str()).chain(element.condition.as_deref());
        let found = referenced_metadata(texts).with_context(|| {
            format!("{}: scanning metadata '{}'", element.location, element.name)
        })?;
        references.builtin.extend(found.builtin);
        references.custom.extend(found.custom);
    }

    let strategy = if references.has_builtin() {
        BatchStrategy::Individual(IndividualReason::BuiltInMetadata)
    } else if references.has_custom() {
        BatchStrategy::Individual(IndividualReason::CustomMetadata {
            references_upstream,
        })
    } else {
        BatchStrategy::Shared
    };

    trace!(?strategy, ?references, "planned metadata batch");
    Ok(strategy)
}

fn condition_holds(
    element: &MetadataElement,
    ctx: &ExpansionContext,
    expander: &dyn Expander,
) -> ItemEvalResult<bool> {
    match &element.condition {
        None => Ok(true),
        Some(condition) => expander
            .evaluate_condition(condition, ctx)
            .with_context(|| {
                format!(
                    "{}: evaluating condition of metadata '{}'",
                    element.location, element.name
                )
            }),
    }
}

fn expand_value(
    element: &MetadataElement,
    ctx: &ExpansionContext,
    expander: &dyn Expander,
) -> ItemEvalResult<String> {
    expander
        .expand_to_string(&element.value, ctx)
        .with_context(|| format!("{}: expanding metadata '{}'", element.location, element.name))
}

/// Evaluate the group once. Later elements see the values of earlier ones through a transient
/// table; elements whose condition is false contribute nothing.
pub fn evaluate_shared(
    metadata: &[MetadataElement],
    ctx: &ExpansionContext,
    expander: &dyn Expander,
) -> ItemEvalResult<Vec<(String, String)>> {
    let mut table = MetadataTable::new();
    let mut assignments = Vec::with_capacity(metadata.len());

    for element in metadata {
        let value = {
            let table_ctx = ctx.with_metadata(MetadataScope::Table(&table));
            if !condition_holds(element, &table_ctx, expander)? {
                continue;
            }
            expand_value(element, &table_ctx, expander)?
        };

        set_metadata_in(&mut table, &element.name, value.clone());
        assignments.push((element.name.clone(), value));
    }

    Ok(assignments)
}

/// Evaluate the group for one item. The item's own metadata, including values assigned earlier
/// in the group, is what `%(...)` sees.
pub fn evaluate_for_item(
    metadata: &[MetadataElement],
    item: &Item,
    ctx: &ExpansionContext,
    expander: &dyn Expander,
) -> ItemEvalResult<Item> {
    let mut item = item.clone();

    for element in metadata {
        let value = {
            let item_ctx = ctx.with_metadata(MetadataScope::Item(&item));
            if !condition_holds(element, &item_ctx, expander)? {
                continue;
            }
            expand_value(element, &item_ctx, expander)?
        };

        item.set_metadata(&element.name, value)
            .with_context(|| format!("{}: assigning metadata", element.location))?;
    }

    Ok(item)
}

/// Apply a metadata group to `items`. Nothing is written unless every element evaluated
/// successfully for every item.
pub fn decorate_items_with_metadata(
    items: &mut [Item],
    metadata: &[MetadataElement],
    references_upstream: bool,
    ctx: &ExpansionContext,
    expander: &dyn Expander,
    factory: &dyn ItemFactory,
) -> ItemEvalResult<Option<BatchStrategy>> {
    if metadata.is_empty() {
        return Ok(None);
    }

    let strategy = plan_batch(metadata, references_upstream)?;
    debug!(?strategy, items = items.len(), metadata = metadata.len(), "decorating items");

    match strategy {
        BatchStrategy::Individual(_) => {
            let decorated = items
                .iter()
                .map(|item| evaluate_for_item(metadata, item, ctx, expander))
                .collect::<ItemEvalResult<Vec<_>>>()?;

            for (item, decorated) in items.iter_mut().zip(decorated) {
                *item = decorated;
            }
        }
        BatchStrategy::Shared => {
            let assignments = evaluate_shared(metadata, ctx, expander)?;
            factory.set_metadata_batch(&assignments, items).with_context(|| {
                format!("{}: assigning metadata", metadata[0].location)
            })?;
        }
    }

    Ok(Some(strategy))
}
