//! Item operations. Every operation runs the same three phases against the item list it is
//! applied to:
//!
//! 1. **select** the items to work on
//! 2. **mutate** the selected items
//! 3. **save** the selected items back into the list
//!
//! Include operations select brand-new items synthesized from their specification. Remove
//! operations do all of their work while selecting. Update operations select the items matching
//! their specification and write them back in place.

use crate::errors::ItemEvalResult;
use crate::evaluator::EvaluatorData;
use crate::expander::ExpansionContext;
use crate::factory::ItemSource;
use crate::item::{Item, ItemData, ItemType};
use crate::lazy_list::LazyItemList;
use crate::location::ElementLocation;
use crate::metadata::{MetadataElement, decorate_items_with_metadata};
use crate::spec::{ItemSpec, ItemSpecMatcher, SpecFragment};
use crate::shredder::item_captures;
use anyhow::Context;
use im_rc::Vector;
use indexmap::{IndexMap, IndexSet};
use std::collections::BTreeSet;
use std::rc::Rc;
use tracing::{debug, trace};

/// Glob patterns that are being resolved further up the stack. Earlier operations exclude them
/// from their own glob expansion instead of expanding them again.
pub type IgnoreSet = BTreeSet<String>;

/// The items an operation works on. `positions` is empty for synthesized items, otherwise it holds
/// the list position each item was selected from.
#[derive(Debug, Default)]
struct Selection {
    items: Vec<Item>,
    positions: Vec<usize>,
}

impl Selection {
    fn fresh(items: Vec<Item>) -> Self {
        Selection {
            items,
            positions: vec![],
        }
    }

    fn at(list: &Vector<ItemData>, positions: Vec<usize>) -> Self {
        Selection {
            items: positions.iter().map(|&i| list[i].item.clone()).collect(),
            positions,
        }
    }
}

fn keep_unchanged(_selection: &mut Selection) -> ItemEvalResult<()> {
    Ok(())
}

fn discard(_selection: Selection, _list: &mut Vector<ItemData>) {}

/// What every operation knows about itself.
pub struct OperationCommon {
    item_type: ItemType,
    location: ElementLocation,
    spec: ItemSpec,
    referenced_item_lists: IndexMap<ItemType, Rc<LazyItemList>>,
    data: Rc<EvaluatorData>,
}

impl OperationCommon {
    pub(crate) fn new(
        item_type: ItemType,
        location: ElementLocation,
        spec: ItemSpec,
        referenced_item_lists: IndexMap<ItemType, Rc<LazyItemList>>,
        data: Rc<EvaluatorData>,
    ) -> Self {
        OperationCommon {
            item_type,
            location,
            spec,
            referenced_item_lists,
            data,
        }
    }

    pub fn item_type(&self) -> &ItemType {
        &self.item_type
    }

    pub fn location(&self) -> &ElementLocation {
        &self.location
    }

    pub fn spec(&self) -> &ItemSpec {
        &self.spec
    }

    pub fn references_upstream(&self) -> bool {
        !self.referenced_item_lists.is_empty()
    }

    /// Items of another list, as they were when this operation was declared. Only items whose
    /// element condition held are visible.
    pub fn referenced_items(
        &self,
        item_type: &ItemType,
        globs_to_ignore: &IgnoreSet,
    ) -> ItemEvalResult<Vec<Item>> {
        let Some(list) = self.referenced_item_lists.get(item_type) else {
            return Ok(vec![]);
        };

        Ok(list
            .get_items(globs_to_ignore)?
            .iter()
            .filter(|data| data.condition_result)
            .map(|data| data.item.clone())
            .collect())
    }

    fn in_context<T>(
        &self,
        f: impl FnOnce(&ExpansionContext) -> ItemEvalResult<T>,
    ) -> ItemEvalResult<T> {
        let nothing_ignored = IgnoreSet::new();
        let lookup = |item_type: &ItemType| self.referenced_items(item_type, &nothing_ignored);
        let ctx = ExpansionContext::new(&self.data.properties, &lookup);
        f(&ctx)
    }

    fn matcher(&self, spec: &ItemSpec) -> ItemEvalResult<ItemSpecMatcher> {
        self.in_context(|ctx| spec.matcher(ctx, &*self.data.expander, &*self.data.globber))
            .with_context(|| format!("{}: matching {} items", self.location, self.item_type))
    }

    fn select_matching(&self, list: &Vector<ItemData>) -> ItemEvalResult<Selection> {
        let matcher = self.matcher(&self.spec)?;
        let positions = matcher.matching_positions(list.iter().map(|data| &data.item));
        Ok(Selection::at(list, positions))
    }

    fn decorate(
        &self,
        selection: &mut Selection,
        metadata: &[MetadataElement],
    ) -> ItemEvalResult<()> {
        self.in_context(|ctx| {
            decorate_items_with_metadata(
                &mut selection.items,
                metadata,
                self.references_upstream(),
                ctx,
                &*self.data.expander,
                &*self.data.factory,
            )
        })?;
        Ok(())
    }
}

pub struct IncludeOperation {
    common: OperationCommon,
    exclude: Option<ItemSpec>,
    metadata: Vec<MetadataElement>,
    element_order: usize,
    condition_result: bool,
}

impl IncludeOperation {
    pub(crate) fn new(
        common: OperationCommon,
        exclude: Option<ItemSpec>,
        metadata: Vec<MetadataElement>,
        element_order: usize,
        condition_result: bool,
    ) -> Self {
        IncludeOperation {
            common,
            exclude,
            metadata,
            element_order,
            condition_result,
        }
    }

    fn select(&self, globs_to_ignore: &IgnoreSet) -> ItemEvalResult<Selection> {
        let common = &self.common;
        let data = &common.data;

        let excluded_globs = self
            .exclude
            .iter()
            .flat_map(|exclude| exclude.globs())
            .map(String::from)
            .chain(globs_to_ignore.iter().cloned())
            .collect::<Vec<_>>();

        let mut items = vec![];
        common.in_context(|ctx| {
            for fragment in common.spec.fragments() {
                match fragment {
                    SpecFragment::Value(value) => items.extend(data.factory.create_items(
                        &common.item_type,
                        vec![ItemSource::Value(value.clone())],
                    )),
                    SpecFragment::Glob(glob) => {
                        if globs_to_ignore.contains(glob) {
                            trace!(%glob, "glob is being resolved upstream; skipping");
                            continue;
                        }
                        let matches = data.globber.expand(glob, &excluded_globs)?;
                        items.extend(data.factory.create_items(
                            &common.item_type,
                            matches.into_iter().map(ItemSource::Glob).collect(),
                        ));
                    }
                    SpecFragment::Expression(capture) => {
                        for item in data.expander.expand_capture_to_items(capture, ctx, false)? {
                            items.push(data.factory.clone_item_as(&common.item_type, &item));
                        }
                    }
                }
            }
            Ok(())
        })
        .with_context(|| format!("{}: including {} items", common.location, common.item_type))?;

        if let Some(exclude) = &self.exclude {
            let matcher = common.matcher(exclude)?;
            items.retain(|item| !matcher.is_match(item.identity()));
        }

        Ok(Selection::fresh(items))
    }

    fn mutate(&self, selection: &mut Selection) -> ItemEvalResult<()> {
        self.common.decorate(selection, &self.metadata)
    }

    fn save(&self, selection: Selection, list: &mut Vector<ItemData>) {
        for item in selection.items {
            list.push_back(ItemData::new(item, self.element_order, self.condition_result));
        }
    }
}

pub struct RemoveOperation {
    common: OperationCommon,
}

impl RemoveOperation {
    pub(crate) fn new(common: OperationCommon) -> Self {
        RemoveOperation { common }
    }

    /// Globs this operation removes. Operations before it need not expand them.
    pub fn removed_globs(&self) -> impl Iterator<Item = &str> {
        self.common.spec.globs()
    }

    // Removal happens here; the selection is what was removed.
    fn select(&self, list: &mut Vector<ItemData>) -> ItemEvalResult<Selection> {
        let removed = self.common.select_matching(list)?;
        if removed.items.is_empty() {
            return Ok(removed);
        }

        let mut positions = removed.positions.iter().copied().peekable();
        *list = list
            .iter()
            .enumerate()
            .filter(|(i, _)| positions.next_if_eq(i).is_none())
            .map(|(_, data)| data.clone())
            .collect();

        Ok(removed)
    }
}

pub struct UpdateOperation {
    common: OperationCommon,
    metadata: Vec<MetadataElement>,
}

impl UpdateOperation {
    pub(crate) fn new(common: OperationCommon, metadata: Vec<MetadataElement>) -> Self {
        UpdateOperation { common, metadata }
    }

    fn select(&self, list: &Vector<ItemData>) -> ItemEvalResult<Selection> {
        self.common.select_matching(list)
    }

    fn mutate(&self, selection: &mut Selection) -> ItemEvalResult<()> {
        self.common.decorate(selection, &self.metadata)
    }

    fn save(&self, selection: Selection, list: &mut Vector<ItemData>) {
        for (position, item) in selection.positions.into_iter().zip(selection.items) {
            if let Some(data) = list.get_mut(position) {
                data.item = item;
            }
        }
    }
}

pub enum ItemOperation {
    Include(IncludeOperation),
    Remove(RemoveOperation),
    Update(UpdateOperation),
}

impl ItemOperation {
    pub fn common(&self) -> &OperationCommon {
        match self {
            ItemOperation::Include(op) => &op.common,
            ItemOperation::Remove(op) => &op.common,
            ItemOperation::Update(op) => &op.common,
        }
    }

    pub fn item_type(&self) -> &ItemType {
        self.common().item_type()
    }

    fn name(&self) -> &'static str {
        match self {
            ItemOperation::Include(_) => "include",
            ItemOperation::Remove(_) => "remove",
            ItemOperation::Update(_) => "update",
        }
    }

    /// Run select, mutate and save, in that order, against `list`.
    pub fn apply(
        &self,
        list: &mut Vector<ItemData>,
        globs_to_ignore: &IgnoreSet,
    ) -> ItemEvalResult<()> {
        debug!(
            operation = self.name(),
            item_type = %self.item_type(),
            location = %self.common().location,
            items = list.len(),
            ?globs_to_ignore,
            "applying item operation"
        );

        match self {
            ItemOperation::Include(op) => {
                let mut selection = op.select(globs_to_ignore)?;
                op.mutate(&mut selection)?;
                op.save(selection, list);
            }
            ItemOperation::Remove(op) => {
                let mut selection = op.select(list)?;
                keep_unchanged(&mut selection)?;
                discard(selection, list);
            }
            ItemOperation::Update(op) => {
                let mut selection = op.select(list)?;
                op.mutate(&mut selection)?;
                op.save(selection, list);
            }
        }

        Ok(())
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum OperationKind {
    Include,
    Remove,
    Update,
}

/// Collects the static declaration of one item element and turns it into an operation. Upstream
/// lists are snapshotted when they are registered, so later operations on those types are never
/// visible to this one.
pub struct OperationBuilder {
    item_type: ItemType,
    location: ElementLocation,
    condition_result: bool,
    element_order: usize,
    spec: ItemSpec,
    exclude: Option<ItemSpec>,
    metadata: Vec<MetadataElement>,
    referenced_item_lists: IndexMap<ItemType, Rc<LazyItemList>>,
}

impl OperationBuilder {
    pub fn new(item_type: ItemType, spec: ItemSpec) -> Self {
        OperationBuilder {
            item_type,
            location: ElementLocation::default(),
            condition_result: true,
            element_order: 0,
            spec,
            exclude: None,
            metadata: vec![],
            referenced_item_lists: IndexMap::new(),
        }
    }

    pub fn location(mut self, location: ElementLocation) -> Self {
        self.location = location;
        self
    }

    pub fn condition_result(mut self, condition_result: bool) -> Self {
        self.condition_result = condition_result;
        self
    }

    pub fn element_order(mut self, element_order: usize) -> Self {
        self.element_order = element_order;
        self
    }

    pub fn exclude(mut self, exclude: Option<ItemSpec>) -> Self {
        self.exclude = exclude;
        self
    }

    pub fn metadata(mut self, metadata: Vec<MetadataElement>) -> Self {
        self.metadata = metadata;
        self
    }

    /// Item types referenced anywhere in the declaration: the specification, the exclude
    /// specification, and metadata values and conditions.
    pub fn referenced_item_types(&self) -> ItemEvalResult<IndexSet<ItemType>> {
        let mut types = self
            .spec
            .referenced_item_types()
            .chain(self.exclude.iter().flat_map(|e| e.referenced_item_types()))
            .cloned()
            .collect::<IndexSet<_>>();

        for element in &self.metadata {
            for text in std::iter::once(&element.value).chain(element.condition.as_ref()) {
                let captures = item_captures(text).with_context(|| {
                    format!("{}: scanning metadata '{}'", element.location, element.name)
                })?;
                types.extend(captures.into_iter().map(|c| c.item_type));
            }
        }

        Ok(types)
    }

    pub fn reference(mut self, item_type: ItemType, list: Rc<LazyItemList>) -> Self {
        self.referenced_item_lists.insert(item_type, list);
        self
    }

    pub fn build(self, kind: OperationKind, data: Rc<EvaluatorData>) -> ItemOperation {
        let OperationBuilder {
            item_type,
            location,
            condition_result,
            element_order,
            spec,
            exclude,
            metadata,
            referenced_item_lists,
        } = self;

        let common = OperationCommon::new(item_type, location, spec, referenced_item_lists, data);
        match kind {
            OperationKind::Include => ItemOperation::Include(IncludeOperation::new(
                common,
                exclude,
                metadata,
                element_order,
                condition_result,
            )),
            OperationKind::Remove => ItemOperation::Remove(RemoveOperation::new(common)),
            OperationKind::Update => ItemOperation::Update(UpdateOperation::new(common, metadata)),
        }
    }
}
