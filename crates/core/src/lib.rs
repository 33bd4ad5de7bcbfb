//! INI configuration reader with typed values and live reload.
//!
//! Values are written as literals (`7`, `10.5`, `'text'`, `[1, 2]`,
//! `{'a': 1}`) and come back as [`TypedValue`]s. The backing file is re-parsed
//! on read when its modification time advances; fully materialized sections
//! can be memoized until the next reload.
//!
//! Supports `%(name)s` and `${ENV_VAR}` placeholders, resolved at read time.

pub mod bind;
pub mod cache;
pub mod error;
pub mod global;
pub mod ini;
pub mod interpolate;
pub mod literal;
pub mod options;
pub mod reader;
pub mod store;
pub mod value;

pub use {
    bind::{ConfigBinding, bind, bind_as},
    cache::{SectionCache, SectionValues},
    error::{Error, Result},
    literal::coerce,
    options::ReaderOptions,
    reader::ConfReader,
    store::FileStore,
    value::{FromValue, MapKey, TypedValue},
};
