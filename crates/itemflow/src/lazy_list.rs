use crate::errors::{ItemEvalError, ItemEvalResult};
use crate::item::{ItemData, ItemType};
use crate::operation::{IgnoreSet, ItemOperation};
use fxhash::{FxHashMap, FxHashSet};
use im_rc::Vector;
use scopeguard::defer;
use std::cell::RefCell;
use std::rc::Rc;
use tracing::trace;

/// One link in the chain of operations declared for an item type. A list is the result of
/// applying its operation on top of everything before it; nothing is computed until someone asks.
pub struct LazyItemList {
    previous: Option<Rc<LazyItemList>>,
    operation: ItemOperation,
    memoize: bool,
    memo: RefCell<FxHashMap<IgnoreSet, Vector<ItemData>>>,
    in_progress: RefCell<FxHashSet<IgnoreSet>>,
}

impl LazyItemList {
    pub fn new(
        previous: Option<Rc<LazyItemList>>,
        operation: ItemOperation,
        memoize: bool,
    ) -> Self {
        LazyItemList {
            previous,
            operation,
            memoize,
            memo: RefCell::new(FxHashMap::default()),
            in_progress: RefCell::new(FxHashSet::default()),
        }
    }

    pub fn item_type(&self) -> &ItemType {
        self.operation.item_type()
    }

    pub fn operation(&self) -> &ItemOperation {
        &self.operation
    }

    pub fn previous(&self) -> Option<&Rc<LazyItemList>> {
        self.previous.as_ref()
    }

    fn memoized(&self, globs_to_ignore: &IgnoreSet) -> Option<Vector<ItemData>> {
        self.memo.borrow().get(globs_to_ignore).cloned()
    }

    fn remember(&self, globs_to_ignore: &IgnoreSet, items: &Vector<ItemData>) {
        if self.memoize {
            self.memo
                .borrow_mut()
                .insert(globs_to_ignore.clone(), items.clone());
        }
    }

    /// The items of this list, with glob expansion skipping `globs_to_ignore`. Results are
    /// memoized per ignore set.
    pub fn get_items(&self, globs_to_ignore: &IgnoreSet) -> ItemEvalResult<Vector<ItemData>> {
        if let Some(items) = self.memoized(globs_to_ignore) {
            trace!(item_type = %self.item_type(), ?globs_to_ignore, "memoized items");
            return Ok(items);
        }

        if !self
            .in_progress
            .borrow_mut()
            .insert(globs_to_ignore.clone())
        {
            return Err(ItemEvalError::CircularItemReference {
                item_type: self.item_type().to_string(),
            }
            .into());
        }
        defer! {
            self.in_progress.borrow_mut().remove(globs_to_ignore);
        }

        self.compute_items(globs_to_ignore)
    }

    fn compute_items(&self, globs_to_ignore: &IgnoreSet) -> ItemEvalResult<Vector<ItemData>> {
        // Walk back until the first operation, or until an earlier list already knows its items.
        // Each Remove adds its globs to what the operations before it may skip.
        let mut pending = vec![];
        let mut items = Vector::new();
        let mut ignore = globs_to_ignore.clone();
        let mut current = Some(self);

        while let Some(list) = current {
            if !std::ptr::eq(list, self) {
                if let Some(memoized) = list.memoized(&ignore) {
                    items = memoized;
                    break;
                }
            }

            let earlier_ignore = match &list.operation {
                ItemOperation::Remove(remove) => {
                    let mut earlier = ignore.clone();
                    earlier.extend(remove.removed_globs().map(String::from));
                    earlier
                }
                _ => ignore.clone(),
            };

            pending.push((list, ignore));
            ignore = earlier_ignore;
            current = list.previous.as_deref();
        }

        trace!(
            item_type = %self.item_type(),
            operations = pending.len(),
            "resolving item list"
        );

        for (list, ignore) in pending.into_iter().rev() {
            list.operation.apply(&mut items, &ignore)?;
            list.remember(&ignore, &items);
        }

        Ok(items)
    }
}
