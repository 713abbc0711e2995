//! Query patches for script URLs.
//!
//! - `value`: parameter values and their truthiness
//! - `patch`: ordered `QueryPatch` and the `compute_patch()` merge
//! - `creator`: `QueryCreator` trait, build timestamp, static and combined creators
//! - `content`: content-hash creator for files under the output root

mod content;
mod creator;
mod patch;
mod value;

pub use content::{ContentHash, DEFAULT_HASH_LENGTH, DEFAULT_VERSION_KEY};
pub use creator::{
    BuildTimestamp, Combined, DEFAULT_TIMESTAMP_KEY, QueryCreator, ScriptContext, StaticQuery,
};
pub use patch::{QueryPatch, compute_patch};
pub use value::QueryValue;
