//! The configuration accessor.
//!
//! Every read starts with the reload gate: when reloading is permitted (the
//! reader-wide flag or the per-call `force_reload`) and the file's
//! modification time moved past the one recorded at load, the file is parsed
//! again and the section cache is cleared. The check is repeated under the
//! write lock, and the swap happens entirely under it, so readers only ever
//! see a complete document.

use std::{
    collections::BTreeSet,
    path::{Path, PathBuf},
    sync::{
        Arc, RwLock, RwLockReadGuard, RwLockWriteGuard,
        atomic::{AtomicBool, Ordering},
    },
    time::SystemTime,
};

use tracing::{debug, info};

use crate::{
    cache::{SectionCache, SectionValues},
    error::{Error, Result},
    literal,
    options::ReaderOptions,
    store::FileStore,
    value::{FromValue, TypedValue},
};

#[derive(Debug)]
struct State {
    path: PathBuf,
    /// `None` after a failed reload; the next read loads again unconditionally.
    store: Option<FileStore>,
}

impl State {
    fn store(&self) -> Result<&FileStore> {
        self.store.as_ref().ok_or(Error::NotInitialized)
    }
}

#[derive(Debug)]
pub struct ConfReader {
    state: RwLock<State>,
    cache: SectionCache,
    reload: AtomicBool,
    dict_cache: AtomicBool,
}

impl ConfReader {
    /// Load `path` and build a reader over it.
    pub fn open(path: impl AsRef<Path>, options: ReaderOptions) -> Result<Self> {
        let path = absolute(path.as_ref())?;
        let store = FileStore::load(&path)?;
        info!(path = %path.display(), "config reader initialized");
        Ok(Self {
            state: RwLock::new(State {
                path,
                store: Some(store),
            }),
            cache: SectionCache::new(),
            reload: AtomicBool::new(options.reload),
            dict_cache: AtomicBool::new(options.dict_cache),
        })
    }

    /// Typed value of `key` in `section`.
    pub fn get(&self, section: &str, key: &str, force_reload: bool) -> Result<TypedValue> {
        let state = self.fresh_state(force_reload)?;
        resolve(state.store()?, section, key)
    }

    /// Like [`ConfReader::get`], converted to `T`.
    pub fn get_as<T: FromValue>(&self, section: &str, key: &str, force_reload: bool) -> Result<T> {
        T::try_from_value(self.get(section, key, force_reload)?)
    }

    /// Every key of `section` with its typed value.
    ///
    /// With the dict cache enabled, repeated calls return the same `Arc` until
    /// the next reload.
    pub fn get_section(&self, section: &str, force_reload: bool) -> Result<Arc<SectionValues>> {
        let state = self.fresh_state(force_reload)?;
        let store = state.store()?;
        if !store.has_section(section) {
            return Err(Error::NoSuchSection(section.to_string()));
        }

        let caching = self.dict_cache_enabled();
        if caching && let Some(hit) = self.cache.get(section) {
            return Ok(hit);
        }

        let mut values = SectionValues::new();
        for key in store.section_keys(section)? {
            let value = resolve(store, section, &key)?;
            values.insert(key, value);
        }

        // Still under the read guard: a reload cannot clear the cache before this lands.
        if caching {
            return Ok(self.cache.put(section, values));
        }
        Ok(Arc::new(values))
    }

    /// Section names in file order.
    pub fn sections(&self, force_reload: bool) -> Result<Vec<String>> {
        let state = self.fresh_state(force_reload)?;
        Ok(state.store()?.sections())
    }

    /// Keys of `section` as written, without resolving any value.
    pub fn section_keys(&self, section: &str, force_reload: bool) -> Result<BTreeSet<String>> {
        let state = self.fresh_state(force_reload)?;
        state.store()?.section_keys(section)
    }

    /// Switch to another file. Always re-parses and clears the cache; on
    /// failure the reader keeps its current file.
    pub fn change_config_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = absolute(path.as_ref())?;
        let store = FileStore::load(&path)?;

        let mut state = self.write_state();
        self.cache.clear();
        state.path = path;
        state.store = Some(store);
        info!(path = %state.path.display(), "config file changed");
        Ok(())
    }

    /// Re-parse the current file regardless of its modification time.
    pub fn reload_now(&self) -> Result<()> {
        let mut state = self.write_state();
        self.replace_store(&mut state)
    }

    pub fn set_reload(&self, enabled: bool) {
        self.reload.store(enabled, Ordering::Relaxed);
    }

    pub fn reload_enabled(&self) -> bool {
        self.reload.load(Ordering::Relaxed)
    }

    /// Turning the cache off also empties it.
    pub fn set_dict_cache(&self, enabled: bool) {
        // Waits out in-flight `get_section` calls, which insert under the read guard.
        let _state = self.write_state();
        self.dict_cache.store(enabled, Ordering::Relaxed);
        if !enabled {
            self.cache.clear();
        }
    }

    pub fn dict_cache_enabled(&self) -> bool {
        self.dict_cache.load(Ordering::Relaxed)
    }

    pub fn options(&self) -> ReaderOptions {
        ReaderOptions {
            reload: self.reload_enabled(),
            dict_cache: self.dict_cache_enabled(),
        }
    }

    pub fn path(&self) -> PathBuf {
        self.read_state().path.clone()
    }

    /// Modification time recorded by the last successful load.
    pub fn loaded_at(&self) -> Option<SystemTime> {
        self.read_state().store.as_ref().map(FileStore::modified)
    }

    /// Number of sections currently memoized.
    pub fn cached_sections(&self) -> usize {
        self.cache.len()
    }

    /// Run the reload gate and return a read guard over an up-to-date store.
    fn fresh_state(&self, force_reload: bool) -> Result<RwLockReadGuard<'_, State>> {
        loop {
            let permitted = self.reload_enabled() || force_reload;
            let state = self.read_state();
            if !is_stale(&state, permitted)? {
                return Ok(state);
            }
            drop(state);

            let mut state = self.write_state();
            // Another reader may have reloaded while we waited for the lock.
            if is_stale(&state, permitted)? {
                self.replace_store(&mut state)?;
            }
        }
    }

    fn replace_store(&self, state: &mut State) -> Result<()> {
        self.cache.clear();
        match FileStore::load(&state.path) {
            Ok(store) => {
                debug!(path = %state.path.display(), "config reader reloaded");
                state.store = Some(store);
                Ok(())
            },
            Err(e) => {
                state.store = None;
                Err(e)
            },
        }
    }

    fn read_state(&self) -> RwLockReadGuard<'_, State> {
        self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, State> {
        self.state.write().unwrap_or_else(|e| e.into_inner())
    }
}

/// Stale when nothing is loaded, or when reloading is permitted and the file
/// changed since the last load. No file system access when not permitted.
fn is_stale(state: &State, permitted: bool) -> Result<bool> {
    match &state.store {
        None => Ok(true),
        Some(_) if !permitted => Ok(false),
        Some(store) => Ok(modified_time(&state.path)? > store.modified()),
    }
}

fn modified_time(path: &Path) -> Result<SystemTime> {
    std::fs::metadata(path)
        .and_then(|m| m.modified())
        .map_err(|e| Error::from_io(path, e))
}

fn absolute(path: &Path) -> Result<PathBuf> {
    std::path::absolute(path).map_err(|e| Error::from_io(path, e))
}

fn resolve(store: &FileStore, section: &str, key: &str) -> Result<TypedValue> {
    match store.lookup(section, key)? {
        Some(raw) => literal::coerce(&raw),
        None => Err(Error::malformed("", format!("'{key}' has no value"))),
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        super::*,
        std::{fs::File, time::Duration},
    };

    fn write(path: &Path, content: &str) {
        std::fs::write(path, content).unwrap();
    }

    fn set_mtime(path: &Path, time: SystemTime) {
        File::options()
            .write(true)
            .open(path)
            .unwrap()
            .set_modified(time)
            .unwrap();
    }

    #[test]
    fn reload_flag_off_skips_mtime_check() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("c.ini");
        write(&path, "[S]\nv = 1\n");
        let reader = ConfReader::open(&path, ReaderOptions::default().with_reload(false)).unwrap();

        // Even a deleted file goes unnoticed while reloading is off.
        std::fs::remove_file(&path).unwrap();
        assert_eq!(reader.get("S", "v", false).unwrap(), TypedValue::Int(1));
        assert!(matches!(
            reader.get("S", "v", true),
            Err(Error::FileNotFound { .. })
        ));
    }

    #[test]
    fn failed_reload_drops_document_and_retries() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("c.ini");
        write(&path, "[S]\nv = 1\n");
        let reader = ConfReader::open(&path, ReaderOptions::default()).unwrap();
        let loaded = reader.loaded_at().unwrap();

        write(&path, "[S\n");
        set_mtime(&path, loaded + Duration::from_secs(10));
        assert!(matches!(reader.get("S", "v", false), Err(Error::Parse { .. })));
        assert!(reader.loaded_at().is_none());

        // With reloading off, the next read still has to load something.
        reader.set_reload(false);
        write(&path, "[S]\nv = 2\n");
        assert_eq!(reader.get("S", "v", false).unwrap(), TypedValue::Int(2));
    }

    #[test]
    fn reload_now_ignores_mtime() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("c.ini");
        write(&path, "[S]\nv = 1\n");
        let reader = ConfReader::open(&path, ReaderOptions::default()).unwrap();
        let loaded = reader.loaded_at().unwrap();

        write(&path, "[S]\nv = 2\n");
        set_mtime(&path, loaded);
        assert_eq!(reader.get("S", "v", false).unwrap(), TypedValue::Int(1));
        reader.reload_now().unwrap();
        assert_eq!(reader.get("S", "v", false).unwrap(), TypedValue::Int(2));
    }

    #[test]
    fn key_without_value_is_malformed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("c.ini");
        write(&path, "[S]\nflag\n");
        let reader = ConfReader::open(&path, ReaderOptions::default()).unwrap();
        assert!(matches!(
            reader.get("S", "flag", false),
            Err(Error::MalformedLiteral { .. })
        ));
    }

    #[test]
    fn path_is_absolute() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("c.ini");
        write(&path, "[S]\n");
        let reader = ConfReader::open(&path, ReaderOptions::default()).unwrap();
        assert!(reader.path().is_absolute());
    }

    #[test]
    fn disabling_dict_cache_while_sections_are_read_leaves_it_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("c.ini");
        write(&path, "[S]\na = 1\nb = [1, 2]\nc = {'k': 'v'}\n");
        let reader = ConfReader::open(
            &path,
            ReaderOptions::default()
                .with_reload(false)
                .with_dict_cache(true),
        )
        .unwrap();
        let done = AtomicBool::new(false);
        let mut leaked = 0;

        std::thread::scope(|s| {
            for _ in 0..2 {
                s.spawn(|| {
                    while !done.load(Ordering::Relaxed) {
                        reader.get_section("S", false).unwrap();
                    }
                });
            }
            for _ in 0..300 {
                reader.set_dict_cache(false);
                if reader.cached_sections() != 0 {
                    leaked += 1;
                }
                reader.set_dict_cache(true);
            }
            done.store(true, Ordering::Relaxed);
        });
        assert_eq!(leaked, 0);
    }
}
