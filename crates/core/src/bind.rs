//! Inject configuration values into function calls.
//!
//! [`bind`] wraps a function so that every call first resolves a configured
//! value and then passes it after the caller's own arguments:
//!
//! ```no_run
//! use std::sync::Arc;
//! use confreader_core::{ConfReader, ConfigBinding, ReaderOptions, bind_as};
//!
//! # fn main() -> confreader_core::Result<()> {
//! let reader = Arc::new(ConfReader::open("app.ini", ReaderOptions::default())?);
//! let connect = bind_as(
//!     reader,
//!     ConfigBinding::new("server", "port"),
//!     |host: String, port: i64| format!("{host}:{port}"),
//! );
//! let addr = connect("localhost".to_string())?;
//! assert!(addr.starts_with("localhost:"));
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use crate::{
    error::Result,
    reader::ConfReader,
    value::{FromValue, TypedValue},
};

/// Which value to inject, and whether reading it may force a reload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigBinding {
    pub section: String,
    pub key: String,
    pub force_reload: bool,
}

impl ConfigBinding {
    pub fn new(section: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            section: section.into(),
            key: key.into(),
            force_reload: false,
        }
    }

    #[must_use]
    pub fn with_force_reload(mut self, force_reload: bool) -> Self {
        self.force_reload = force_reload;
        self
    }

    pub fn resolve(&self, reader: &ConfReader) -> Result<TypedValue> {
        reader.get(&self.section, &self.key, self.force_reload)
    }

    pub fn resolve_as<T: FromValue>(&self, reader: &ConfReader) -> Result<T> {
        reader.get_as(&self.section, &self.key, self.force_reload)
    }
}

/// Wrap `f` so each call receives the bound value, read at call time, as its
/// last argument.
pub fn bind<A, R, F>(
    reader: Arc<ConfReader>,
    binding: ConfigBinding,
    f: F,
) -> impl Fn(A) -> Result<R>
where
    F: Fn(A, TypedValue) -> R,
{
    move |args| {
        let value = binding.resolve(&reader)?;
        Ok(f(args, value))
    }
}

/// [`bind`] with the value converted to `T` first.
pub fn bind_as<T, A, R, F>(
    reader: Arc<ConfReader>,
    binding: ConfigBinding,
    f: F,
) -> impl Fn(A) -> Result<R>
where
    T: FromValue,
    F: Fn(A, T) -> R,
{
    move |args| {
        let value = binding.resolve_as(&reader)?;
        Ok(f(args, value))
    }
}
