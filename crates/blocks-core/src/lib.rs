mod autoformat;
mod blocks;
mod clipboard;
mod core;
mod decorate;
mod drag_select;
mod edit;
mod error;
mod grammar;
mod normalize;
mod ops;
mod schema;
mod store;

pub use crate::autoformat::*;
pub use crate::clipboard::*;
pub use crate::core::*;
pub use crate::decorate::*;
pub use crate::drag_select::*;
pub use crate::error::*;
pub use crate::grammar::*;
pub use crate::normalize::*;
pub use crate::ops::*;
pub use crate::schema::*;
pub use crate::store::*;
