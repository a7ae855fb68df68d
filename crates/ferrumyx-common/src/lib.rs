//! ferrumyx-common — shared error taxonomy, data model, and vocabulary used
//! by the pipeline library and the driver binary.

pub mod error;
pub mod models;
pub mod vocab;

pub use error::{FerrumyxError, Result};
