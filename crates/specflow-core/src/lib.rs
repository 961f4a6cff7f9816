pub mod cache;
pub mod checks;
pub mod config;
pub mod error;
pub mod feature;
pub mod git;
pub mod id_alloc;
pub mod io;
pub mod migrations;
pub mod path_guard;
pub mod paths;
pub mod sanitize;
pub mod template;
pub mod validation;

pub use error::{Result, SpecflowError};
