//! Binding environment and the storage adaptor surface.

pub mod binding;
pub mod table;

pub use binding::BindingTuple;
pub use table::{Capability, InMemoryTable, Pushdown, Table};
