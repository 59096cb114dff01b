//! Module loading seam
//!
//! A [`ScreenModule`] is one loaded version of a screen's backing code. A
//! [`ModuleLoader`] produces a fresh module for an identity every time it is
//! asked; reloading a screen means asking again after the old module was
//! dropped.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use reloader_core::prelude::*;

/// A constructed, displayable screen object
pub trait Screen: Send {
    /// Screen name the object was constructed under
    fn name(&self) -> &str;

    /// Produce the screen's current content
    fn render(&self) -> String;
}

/// One loaded version of a screen module
pub trait ScreenModule: Send + Sync {
    /// Module identity this was loaded for
    fn identity(&self) -> &str;

    /// Backing source file; registrations are tracked per file
    fn source_path(&self) -> &Path;

    /// Construct a new instance of `type_name` for `screen_name`
    fn construct(&self, type_name: &str, screen_name: &str) -> Result<Box<dyn Screen>>;
}

/// Resolves a module identity to a freshly loaded module
#[cfg_attr(test, mockall::automock)]
pub trait ModuleLoader: Send + Sync {
    fn load(&self, module: &str) -> Result<Arc<dyn ScreenModule>>;
}

/// Factory producing a fresh module version
pub type ModuleFactory = Arc<dyn Fn() -> Result<Arc<dyn ScreenModule>> + Send + Sync>;

/// Loader backed by typed factory registrations.
///
/// Cloning shares the same table, so a hot-swap trigger can hold a clone and
/// [`register`](Self::register) a new factory while the registry keeps using
/// the loader. The next activation of that screen picks the new factory up.
#[derive(Clone, Default)]
pub struct FactoryLoader {
    factories: Arc<RwLock<HashMap<String, ModuleFactory>>>,
}

impl fmt::Debug for FactoryLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let modules: Vec<String> = self
            .factories
            .read()
            .map(|table| table.keys().cloned().collect())
            .unwrap_or_default();
        f.debug_struct("FactoryLoader")
            .field("modules", &modules)
            .finish()
    }
}

impl FactoryLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the factory for `module`
    pub fn register<F>(&self, module: impl Into<String>, factory: F)
    where
        F: Fn() -> Result<Arc<dyn ScreenModule>> + Send + Sync + 'static,
    {
        let module = module.into();
        match self.factories.write() {
            Ok(mut table) => {
                debug!("Registered factory for module {}", module);
                table.insert(module, Arc::new(factory));
            }
            Err(e) => error!("Factory table poisoned, dropping registration for {}: {}", module, e),
        }
    }

    pub fn contains(&self, module: &str) -> bool {
        self.factories
            .read()
            .map(|table| table.contains_key(module))
            .unwrap_or(false)
    }
}

impl ModuleLoader for FactoryLoader {
    fn load(&self, module: &str) -> Result<Arc<dyn ScreenModule>> {
        let factory = self
            .factories
            .read()
            .map_err(|_| Error::reload(module, "factory table poisoned"))?
            .get(module)
            .cloned()
            .ok_or_else(|| Error::reload(module, "no factory registered for module"))?;

        factory()
    }
}

type Constructor = Arc<dyn Fn(&str) -> Result<Box<dyn Screen>> + Send + Sync>;

/// A module exposing a single screen type built by a closure
pub struct SimpleModule {
    identity: String,
    source_path: PathBuf,
    type_name: String,
    constructor: Constructor,
}

impl SimpleModule {
    pub fn new<F>(
        identity: impl Into<String>,
        source_path: impl Into<PathBuf>,
        type_name: impl Into<String>,
        constructor: F,
    ) -> Self
    where
        F: Fn(&str) -> Result<Box<dyn Screen>> + Send + Sync + 'static,
    {
        Self {
            identity: identity.into(),
            source_path: source_path.into(),
            type_name: type_name.into(),
            constructor: Arc::new(constructor),
        }
    }
}

impl ScreenModule for SimpleModule {
    fn identity(&self) -> &str {
        &self.identity
    }

    fn source_path(&self) -> &Path {
        &self.source_path
    }

    fn construct(&self, type_name: &str, screen_name: &str) -> Result<Box<dyn Screen>> {
        if type_name != self.type_name {
            return Err(Error::reload(
                screen_name,
                format!(
                    "module {} defines {}, not {}",
                    self.identity, self.type_name, type_name
                ),
            ));
        }
        (self.constructor)(screen_name)
    }
}
