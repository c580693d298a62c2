pub mod inventory;
pub mod merge;
