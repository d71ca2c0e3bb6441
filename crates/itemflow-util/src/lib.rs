pub mod group;
pub mod split;
pub mod split_item_spec;
