//! Core domain entities.
//!
//! - [`Advertisement`] - An ad that can be clicked
//! - [`NewClick`] - A click that passed admission and can be persisted

pub mod advertisement;
pub mod click;

pub use advertisement::Advertisement;
pub use click::NewClick;
