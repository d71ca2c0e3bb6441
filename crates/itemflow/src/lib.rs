//!
//! ## Introduction
//! This crate evaluates the item elements of a declarative build description into ordered
//! collections of typed items carrying metadata. Item elements are registered in declaration
//! order; the items of an item type are only computed when something asks for them.
//!
//! ```text
//! <Compile Include="src/**/*.cs;Generated.cs" Exclude="src/obj/**" />
//! <Compile Remove="*.tmp" />
//! <Compile Update="@(Generated)" Visible="false" />
//! ```
//!
//! ## Terminology
//!
//! ### Item lists and operations
//! Every item element becomes an **operation** (include, remove or update) appended to the
//! **lazy item list** of its item type. A lazy item list is the result of applying its operation
//! on top of the list before it, so the list for `Compile` above is three links long.
//!
//! ### Specifications and fragments
//! The `;`-separated text of an `Include`, `Exclude`, `Remove` or `Update` attribute is an **item
//! specification**. Each piece is a **fragment**: a literal value, a glob pattern, or an item
//! reference such as `@(Generated)`. Items produced by an item reference always match as literal
//! values, even if their identity looks like a glob.
//!
//! ### Upstream references and snapshots
//! An operation that references another item type sees that type's list as it was when the
//! operation was declared. Later operations on the referenced type are invisible to it.
//!
//! ### Ignore sets
//! When a list is resolved, the globs of later `Remove` operations are handed back to earlier
//! operations as the **ignore set**. Earlier includes skip those globs instead of expanding them
//! only for the items to be removed again. Resolved lists are memoized per ignore set.
//!
//! ### Shared and individual metadata
//! A metadata group is evaluated once and applied to every item (**shared** mode) unless it
//! references built-in metadata such as `%(Filename)` or custom metadata such as `%(Link)`. Then it
//! is evaluated for every item on its own (**individual** mode). Items decorated
//! in shared mode share one copy-on-write metadata table.

pub mod errors;
pub mod evaluator;
pub mod expander;
pub mod factory;
pub mod glob;
pub mod item;
pub mod lazy_list;
pub mod location;
pub mod metadata;
pub mod operation;
pub mod options;
pub mod shredder;
pub mod simple_expander;
pub mod spec;

#[cfg(test)]
mod tests;
