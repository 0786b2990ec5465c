//! Built-in tree classes.

mod integer;

pub use integer::{IntegerClass, IntegerUdata};
