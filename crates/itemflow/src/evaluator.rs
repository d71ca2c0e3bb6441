use crate::errors::ItemEvalResult;
use crate::expander::{Expander, ExpansionContext};
use crate::factory::{DefaultItemFactory, ItemFactory};
use crate::glob::{FileGlobber, GlobMatcher};
use crate::item::{Item, ItemData, ItemType};
use crate::lazy_list::LazyItemList;
use crate::location::ElementLocation;
use crate::metadata::MetadataElement;
use crate::operation::{IgnoreSet, OperationBuilder, OperationKind};
use crate::options::EvaluatorOptions;
use crate::simple_expander::SimpleExpander;
use crate::spec::ItemSpec;
use anyhow::Context;
use indexmap::IndexMap;
use itemflow_util::group::GroupInOrder;
use std::rc::Rc;
use tracing::{debug, info};

/// Shared by the evaluator and every operation it creates.
pub struct EvaluatorData {
    pub options: EvaluatorOptions,
    pub properties: IndexMap<String, String>,
    pub expander: Box<dyn Expander>,
    pub factory: Box<dyn ItemFactory>,
    pub globber: Box<dyn GlobMatcher>,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ItemElementKind {
    Include {
        include: String,
        exclude: Option<String>,
    },
    Remove(String),
    Update(String),
}

/// One declared item element, e.g. `<Compile Include="*.cs" Exclude="gen/**" />`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ItemElement {
    pub item_type: ItemType,
    pub kind: ItemElementKind,
    pub condition: Option<String>,
    pub metadata: Vec<MetadataElement>,
    pub location: ElementLocation,
}

impl ItemElement {
    fn new<T: Into<ItemType>>(item_type: T, kind: ItemElementKind) -> Self {
        ItemElement {
            item_type: item_type.into(),
            kind,
            condition: None,
            metadata: vec![],
            location: ElementLocation::default(),
        }
    }

    pub fn include<T: Into<ItemType>, S: Into<String>>(item_type: T, include: S) -> Self {
        Self::new(
            item_type,
            ItemElementKind::Include {
                include: include.into(),
                exclude: None,
            },
        )
    }

    pub fn remove<T: Into<ItemType>, S: Into<String>>(item_type: T, remove: S) -> Self {
        Self::new(item_type, ItemElementKind::Remove(remove.into()))
    }

    pub fn update<T: Into<ItemType>, S: Into<String>>(item_type: T, update: S) -> Self {
        Self::new(item_type, ItemElementKind::Update(update.into()))
    }

    /// Only meaningful for include elements.
    pub fn with_exclude<S: Into<String>>(mut self, exclude: S) -> Self {
        if let ItemElementKind::Include { exclude: e, .. } = &mut self.kind {
            *e = Some(exclude.into());
        }
        self
    }

    pub fn with_condition<S: Into<String>>(mut self, condition: S) -> Self {
        self.condition = Some(condition.into());
        self
    }

    pub fn with_metadata(mut self, metadata: MetadataElement) -> Self {
        self.metadata.push(metadata);
        self
    }

    pub fn with_location(mut self, location: ElementLocation) -> Self {
        self.location = location;
        self
    }
}

/// Turns item elements, in declaration order, into lazily evaluated item lists.
pub struct LazyItemEvaluator {
    data: Rc<EvaluatorData>,
    item_lists: IndexMap<ItemType, Rc<LazyItemList>>,
    next_element_order: usize,
}

impl LazyItemEvaluator {
    pub fn new(
        options: EvaluatorOptions,
        properties: IndexMap<String, String>,
        expander: Box<dyn Expander>,
        factory: Box<dyn ItemFactory>,
        globber: Box<dyn GlobMatcher>,
    ) -> Self {
        LazyItemEvaluator {
            data: Rc::new(EvaluatorData {
                options,
                properties,
                expander,
                factory,
                globber,
            }),
            item_lists: IndexMap::new(),
            next_element_order: 0,
        }
    }

    /// An evaluator using the regex expander, the default item factory and file system globbing
    /// below `options.project_directory`.
    pub fn with_defaults(options: EvaluatorOptions, properties: IndexMap<String, String>) -> Self {
        let factory = DefaultItemFactory::new(options.project_directory.clone());
        let globber = FileGlobber::new(
            options.project_directory.clone(),
            options.case_insensitive_globs,
        );

        Self::new(
            options,
            properties,
            Box::new(SimpleExpander::new()),
            Box::new(factory),
            Box::new(globber),
        )
    }

    pub fn options(&self) -> &EvaluatorOptions {
        &self.data.options
    }

    /// Register an item element. Nothing is evaluated apart from the element's condition and the
    /// properties in its specifications.
    pub fn process_item_element(&mut self, element: ItemElement) -> ItemEvalResult<()> {
        let element_order = self.next_element_order;
        self.next_element_order += 1;

        let location = element.location.clone();
        let (condition_result, spec, exclude) = {
            let lookup = |item_type: &ItemType| self.items(item_type);
            let ctx = ExpansionContext::new(&self.data.properties, &lookup);
            let expander = &*self.data.expander;

            let condition_result = match &element.condition {
                Some(condition) => expander
                    .evaluate_condition(condition, &ctx)
                    .with_context(|| format!("{location}: evaluating condition"))?,
                None => true,
            };

            let parse = |text: &str| -> ItemEvalResult<ItemSpec> {
                expander
                    .expand_properties(text, &ctx)
                    .and_then(ItemSpec::parse)
                    .with_context(|| format!("{location}: parsing '{text}'"))
            };

            let (spec, exclude) = match &element.kind {
                ItemElementKind::Include { include, exclude } => {
                    (parse(include.as_str())?, exclude.as_deref().map(parse).transpose()?)
                }
                ItemElementKind::Remove(spec) | ItemElementKind::Update(spec) => {
                    (parse(spec.as_str())?, None)
                }
            };

            (condition_result, spec, exclude)
        };

        let kind = match element.kind {
            ItemElementKind::Include { .. } => OperationKind::Include,
            ItemElementKind::Remove(_) => OperationKind::Remove,
            ItemElementKind::Update(_) => OperationKind::Update,
        };

        if !condition_result && kind != OperationKind::Include {
            debug!(item_type = %element.item_type, %location, "condition is false; skipping");
            return Ok(());
        }

        // Metadata declared as attributes has no location of its own.
        let metadata = element
            .metadata
            .into_iter()
            .map(|m| {
                if m.location == ElementLocation::default() {
                    m.with_location(location.clone())
                } else {
                    m
                }
            })
            .collect::<Vec<_>>();

        let mut builder = OperationBuilder::new(element.item_type.clone(), spec)
            .location(element.location)
            .condition_result(condition_result)
            .element_order(element_order)
            .exclude(exclude)
            .metadata(metadata);

        let referenced = builder.referenced_item_types()?;
        for item_type in referenced {
            if let Some(list) = self.item_lists.get(&item_type) {
                let list = Rc::clone(list);
                builder = builder.reference(item_type, list);
            }
        }

        let operation = builder.build(kind, Rc::clone(&self.data));
        let previous = self.item_lists.get(&element.item_type).cloned();
        let list = LazyItemList::new(previous, operation, self.data.options.memoize_upstream);
        self.item_lists.insert(element.item_type, Rc::new(list));

        Ok(())
    }

    pub fn process_item_elements<I>(&mut self, elements: I) -> ItemEvalResult<()>
    where
        I: IntoIterator<Item = ItemElement>,
    {
        for element in elements {
            self.process_item_element(element)?;
        }
        Ok(())
    }

    pub fn item_types(&self) -> impl Iterator<Item = &ItemType> {
        self.item_lists.keys()
    }

    pub fn item_list(&self, item_type: &ItemType) -> Option<&Rc<LazyItemList>> {
        self.item_lists.get(item_type)
    }

    /// Every item of `item_type`, whatever its condition result, with glob expansion skipping
    /// `globs_to_ignore`.
    pub fn resolve_upstream(
        &self,
        item_type: &ItemType,
        globs_to_ignore: &IgnoreSet,
    ) -> ItemEvalResult<Vec<ItemData>> {
        match self.item_lists.get(item_type) {
            Some(list) => Ok(list.get_items(globs_to_ignore)?.into_iter().collect()),
            None => Ok(vec![]),
        }
    }

    /// The live items of `item_type`.
    pub fn items(&self, item_type: &ItemType) -> ItemEvalResult<Vec<Item>> {
        Ok(self
            .resolve_upstream(item_type, &IgnoreSet::new())?
            .into_iter()
            .filter(|data| data.condition_result)
            .map(|data| data.item)
            .collect())
    }

    /// The live items of every type, in the order their elements were declared.
    pub fn all_items(&self) -> ItemEvalResult<Vec<ItemData>> {
        let mut all = vec![];
        for item_type in self.item_lists.keys() {
            all.extend(
                self.resolve_upstream(item_type, &IgnoreSet::new())?
                    .into_iter()
                    .filter(|data| data.condition_result),
            );
        }

        all.sort_by_key(|data| data.element_order);
        info!(items = all.len(), "evaluated items");
        Ok(all)
    }

    pub fn items_by_type(&self) -> ItemEvalResult<IndexMap<ItemType, Vec<Item>>> {
        Ok(self
            .all_items()?
            .into_iter()
            .map(|data| data.item)
            .group_in_order(|item| item.item_type().clone()))
    }
}
