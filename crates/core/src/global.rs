//! Process-wide reader handle.
//!
//! Prefer passing an `Arc<ConfReader>` around. This module exists for code
//! that wants one shared reader without threading it through: the first
//! [`init`] wins, later calls get the live instance and their arguments are
//! ignored until [`destroy`] is called.

use std::{
    path::{Path, PathBuf},
    sync::{Arc, Mutex, RwLock},
};

use tracing::debug;

use crate::{
    bind::ConfigBinding,
    cache::SectionValues,
    error::{Error, Result},
    options::ReaderOptions,
    reader::ConfReader,
    value::TypedValue,
};

static INSTANCE: RwLock<Option<Arc<ConfReader>>> = RwLock::new(None);

/// Path and options of the last instance, used to rebuild after [`destroy`].
static LAST: Mutex<Option<(PathBuf, ReaderOptions)>> = Mutex::new(None);

/// Build the process reader, or return the live one unchanged.
pub fn init(path: impl AsRef<Path>, options: ReaderOptions) -> Result<Arc<ConfReader>> {
    let mut slot = INSTANCE.write().unwrap_or_else(|e| e.into_inner());
    if let Some(reader) = slot.as_ref() {
        debug!("config reader already initialized, ignoring arguments");
        return Ok(Arc::clone(reader));
    }
    let reader = Arc::new(ConfReader::open(path, options)?);
    remember(&reader);
    *slot = Some(Arc::clone(&reader));
    Ok(reader)
}

/// The live reader, rebuilt from the last configured path if it was destroyed.
pub fn instance() -> Result<Arc<ConfReader>> {
    if let Some(reader) = INSTANCE.read().unwrap_or_else(|e| e.into_inner()).as_ref() {
        return Ok(Arc::clone(reader));
    }
    let (path, options) = LAST
        .lock()
        .unwrap_or_else(|e| e.into_inner())
        .clone()
        .ok_or(Error::NotInitialized)?;
    init(path, options)
}

/// Drop the live reader. Handles already given out stay valid.
pub fn destroy() {
    let taken = INSTANCE.write().unwrap_or_else(|e| e.into_inner()).take();
    if let Some(reader) = taken {
        remember(&reader);
        debug!("config reader destroyed");
    }
}

#[must_use]
pub fn is_initialized() -> bool {
    INSTANCE
        .read()
        .unwrap_or_else(|e| e.into_inner())
        .is_some()
}

pub fn get(section: &str, key: &str, force_reload: bool) -> Result<TypedValue> {
    instance()?.get(section, key, force_reload)
}

pub fn get_section(section: &str, force_reload: bool) -> Result<Arc<SectionValues>> {
    instance()?.get_section(section, force_reload)
}

pub fn change_config_file(path: impl AsRef<Path>) -> Result<()> {
    let reader = instance()?;
    reader.change_config_file(path)?;
    remember(&reader);
    Ok(())
}

/// Like [`crate::bind`], resolving the process reader at each call.
pub fn read_conf<A, R, F>(binding: ConfigBinding, f: F) -> impl Fn(A) -> Result<R>
where
    F: Fn(A, TypedValue) -> R,
{
    move |args| {
        let reader = instance()?;
        let value = binding.resolve(&reader)?;
        Ok(f(args, value))
    }
}

fn remember(reader: &ConfReader) {
    *LAST.lock().unwrap_or_else(|e| e.into_inner()) = Some((reader.path(), reader.options()));
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    // The handle is process-wide; tests touching it must not interleave.
    static SERIAL: Mutex<()> = Mutex::new(());

    fn ini(dir: &tempfile::TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn first_init_wins_until_destroyed() {
        let _guard = SERIAL.lock().unwrap_or_else(|e| e.into_inner());
        destroy();
        let dir = tempfile::tempdir().unwrap();
        let one = ini(&dir, "one.ini", "[S]\nv = 1\n");
        let two = ini(&dir, "two.ini", "[S]\nv = 2\n");

        let first = init(&one, ReaderOptions::default()).unwrap();
        let second = init(&two, ReaderOptions::default().with_dict_cache(true)).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert!(!second.dict_cache_enabled());
        assert_eq!(get("S", "v", false).unwrap(), TypedValue::Int(1));

        destroy();
        assert!(!is_initialized());
        let third = init(&two, ReaderOptions::default()).unwrap();
        assert!(!Arc::ptr_eq(&first, &third));
        assert_eq!(get("S", "v", false).unwrap(), TypedValue::Int(2));
        destroy();
    }

    #[test]
    fn instance_rebuilds_from_last_path() {
        let _guard = SERIAL.lock().unwrap_or_else(|e| e.into_inner());
        destroy();
        let dir = tempfile::tempdir().unwrap();
        let one = ini(&dir, "one.ini", "[S]\nv = 1\n");
        let two = ini(&dir, "two.ini", "[S]\nv = 2\n");

        init(&one, ReaderOptions::default()).unwrap();
        change_config_file(&two).unwrap();
        instance().unwrap().set_reload(false);
        destroy();

        let rebuilt = instance().unwrap();
        assert_eq!(rebuilt.path(), two);
        assert!(!rebuilt.reload_enabled());
        assert_eq!(get("S", "v", false).unwrap(), TypedValue::Int(2));
        destroy();
    }

    #[test]
    fn read_conf_follows_the_live_instance() {
        let _guard = SERIAL.lock().unwrap_or_else(|e| e.into_inner());
        destroy();
        let dir = tempfile::tempdir().unwrap();
        let one = ini(&dir, "one.ini", "[S]\nv = 'first'\n");
        let two = ini(&dir, "two.ini", "[S]\nv = 'second'\n");

        let greet = read_conf(ConfigBinding::new("S", "v"), |name: String, v: TypedValue| {
            format!("{name}:{}", v.as_str().unwrap_or_default())
        });

        init(&one, ReaderOptions::default()).unwrap();
        assert_eq!(greet("a".into()).unwrap(), "a:first");
        change_config_file(&two).unwrap();
        assert_eq!(greet("b".into()).unwrap(), "b:second");
        destroy();
    }
}
