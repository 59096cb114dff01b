//! Screen registry with reload-on-activation
//!
//! Every activation after the first discards the screen's loaded module and
//! asks the loader for a fresh one before constructing, so an updated factory
//! (or rebuilt module) is always observed. Only one version of a module is
//! held at any time.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use reloader_core::prelude::*;

use crate::loader::{FactoryLoader, ModuleLoader, Screen, ScreenModule};
use crate::naming::{derive_identity, ScreenIdentity};

struct ScreenEntry {
    identity: ScreenIdentity,
    instance: Option<Box<dyn Screen>>,
}

struct LoadedModule {
    handle: Arc<dyn ScreenModule>,
    generation: u64,
}

/// Screen name to live object registry.
///
/// Methods take `&mut self`, so activations never overlap. Wrap the registry
/// in a `Mutex` when it is shared between threads.
pub struct ScreenRegistry<L: ModuleLoader = FactoryLoader> {
    loader: L,
    entries: HashMap<String, ScreenEntry>,
    loaded: HashMap<String, LoadedModule>,
    /// Load count per module, kept across unloads
    generations: HashMap<String, u64>,
    /// Backing file to the module registered from it
    bindings: HashMap<PathBuf, String>,
    current: Option<String>,
}

impl<L: ModuleLoader> ScreenRegistry<L> {
    pub fn new(loader: L) -> Self {
        Self {
            loader,
            entries: HashMap::new(),
            loaded: HashMap::new(),
            generations: HashMap::new(),
            bindings: HashMap::new(),
            current: None,
        }
    }

    pub fn loader(&self) -> &L {
        &self.loader
    }

    /// Register `name` without loading anything.
    ///
    /// Registering the same name again is a no-op. A different name whose
    /// module or type identity matches an existing screen is rejected.
    pub fn register_screen(&mut self, name: &str) -> Result<&ScreenIdentity> {
        if !self.entries.contains_key(name) {
            let identity = derive_identity(name)?;

            if let Some(other) = self.entries.values().find(|e| {
                e.identity.module == identity.module || e.identity.type_name == identity.type_name
            }) {
                return Err(Error::screen_name(
                    name,
                    format!("identities collide with screen '{}'", other.identity.name),
                ));
            }

            debug!(
                "Registered screen '{}' (module {}, type {})",
                name, identity.module, identity.type_name
            );
            self.entries.insert(
                name.to_string(),
                ScreenEntry {
                    identity,
                    instance: None,
                },
            );
        }

        match self.entries.get(name) {
            Some(entry) => Ok(&entry.identity),
            None => Err(Error::UnknownScreen {
                name: name.to_string(),
            }),
        }
    }

    /// Load (or reload) the screen's module, construct a new instance and
    /// make it current.
    ///
    /// On failure the previously current screen stays current and the
    /// entry keeps its last good instance.
    pub fn activate(&mut self, name: &str) -> Result<&dyn Screen> {
        let identity = self.register_screen(name)?.clone();

        if let Some(previous) = self.loaded.remove(&identity.module) {
            self.unbind(previous.handle.source_path());
            debug!(
                "Unloaded module {} (generation {})",
                identity.module, previous.generation
            );
        }

        let module = self
            .loader
            .load(&identity.module)
            .map_err(|e| reload_error(name, e))?;

        let generation = {
            let count = self.generations.entry(identity.module.clone()).or_insert(0);
            *count += 1;
            *count
        };
        self.bindings
            .insert(module.source_path().to_path_buf(), identity.module.clone());
        self.loaded.insert(
            identity.module.clone(),
            LoadedModule {
                handle: Arc::clone(&module),
                generation,
            },
        );
        info!(
            "Loaded module {} for '{}' (generation {})",
            identity.module, name, generation
        );

        let screen = match module.construct(&identity.type_name, name) {
            Ok(screen) => screen,
            Err(e) => {
                warn!("Constructing {} failed: {}", identity.type_name, e);
                return Err(reload_error(name, e));
            }
        };

        self.current = Some(name.to_string());
        let entry = self
            .entries
            .get_mut(name)
            .ok_or_else(|| Error::UnknownScreen {
                name: name.to_string(),
            })?;
        Ok(&**entry.instance.insert(screen))
    }

    /// Make an already constructed screen current without reloading it.
    ///
    /// A registered screen that was never constructed is activated instead.
    pub fn switch_to(&mut self, name: &str) -> Result<&dyn Screen> {
        let constructed = match self.entries.get(name) {
            Some(entry) => entry.instance.is_some(),
            None => {
                return Err(Error::UnknownScreen {
                    name: name.to_string(),
                })
            }
        };

        if !constructed {
            return self.activate(name);
        }

        self.current = Some(name.to_string());
        self.entries
            .get(name)
            .and_then(|entry| entry.instance.as_deref())
            .ok_or_else(|| Error::UnknownScreen {
                name: name.to_string(),
            })
    }

    /// The live object of the current screen
    pub fn current(&self) -> Option<&dyn Screen> {
        let name = self.current.as_ref()?;
        self.entries.get(name)?.instance.as_deref()
    }

    pub fn current_name(&self) -> Option<&str> {
        self.current.as_deref()
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Whether a version of `module` is held right now
    pub fn is_loaded(&self, module: &str) -> bool {
        self.loaded.contains_key(module)
    }

    /// How many times `module` has been loaded
    pub fn module_generation(&self, module: &str) -> u64 {
        self.generations.get(module).copied().unwrap_or(0)
    }

    /// Module registered from `path`, if any
    pub fn bound_module(&self, path: &Path) -> Option<&str> {
        self.bindings.get(path).map(String::as_str)
    }

    pub fn screen_names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    fn unbind(&mut self, path: &Path) {
        if self.bindings.remove(path).is_some() {
            trace!("Removed registrations bound to {}", path.display());
        }
    }
}

impl Default for ScreenRegistry<FactoryLoader> {
    fn default() -> Self {
        Self::new(FactoryLoader::new())
    }
}

fn reload_error(screen: &str, error: Error) -> Error {
    match error {
        Error::Reload { .. } => error,
        other => Error::reload(screen, other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::{MockModuleLoader, SimpleModule};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct Text {
        name: String,
        body: String,
    }

    impl Screen for Text {
        fn name(&self) -> &str {
            &self.name
        }

        fn render(&self) -> String {
            self.body.clone()
        }
    }

    fn text_module(module: &str, type_name: &str, body: &'static str) -> Arc<dyn ScreenModule> {
        Arc::new(SimpleModule::new(
            module,
            format!("screens/{}.rs", module),
            type_name,
            move |name| {
                Ok(Box::new(Text {
                    name: name.to_string(),
                    body: body.to_string(),
                }) as Box<dyn Screen>)
            },
        ))
    }

    fn registry_with(modules: &[(&str, &str, &'static str)]) -> ScreenRegistry {
        let loader = FactoryLoader::new();
        for &(module, type_name, body) in modules {
            let (m, t) = (module.to_string(), type_name.to_string());
            loader.register(module, move || Ok(text_module(&m, &t, body)));
        }
        ScreenRegistry::new(loader)
    }

    #[test]
    fn test_first_activation_loads_and_constructs() {
        let mut registry = registry_with(&[("main_screen", "MainScreen", "v1")]);

        let screen = registry.activate("Main Screen").unwrap();
        assert_eq!(screen.name(), "Main Screen");
        assert_eq!(screen.render(), "v1");
        assert_eq!(registry.current_name(), Some("Main Screen"));
        assert!(registry.is_loaded("main_screen"));
        assert_eq!(registry.module_generation("main_screen"), 1);
        assert_eq!(
            registry.bound_module(Path::new("screens/main_screen.rs")),
            Some("main_screen")
        );
    }

    #[test]
    fn test_second_activation_observes_swapped_factory() {
        let mut registry = registry_with(&[("main_screen", "MainScreen", "v1")]);
        assert_eq!(registry.activate("Main Screen").unwrap().render(), "v1");

        registry
            .loader()
            .register("main_screen", || Ok(text_module("main_screen", "MainScreen", "v2")));

        assert_eq!(registry.activate("Main Screen").unwrap().render(), "v2");
        assert_eq!(registry.module_generation("main_screen"), 2);
    }

    #[test]
    fn test_unchanged_source_yields_distinct_instances() {
        let built = Arc::new(AtomicUsize::new(0));
        let loader = FactoryLoader::new();
        let counter = Arc::clone(&built);
        loader.register("login", move || {
            let counter = Arc::clone(&counter);
            Ok(Arc::new(SimpleModule::new("login", "screens/login.rs", "Login", move |name| {
                let n = counter.fetch_add(1, Ordering::SeqCst);
                Ok(Box::new(Text {
                    name: name.to_string(),
                    body: format!("instance {}", n),
                }) as Box<dyn Screen>)
            })) as Arc<dyn ScreenModule>)
        });
        let mut registry = ScreenRegistry::new(loader);

        let first = registry.activate("Login").unwrap().render();
        let second = registry.activate("Login").unwrap().render();
        assert_ne!(first, second);
        assert_eq!(built.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_reload_unloads_before_loading_fresh() {
        // The loader sees how many versions the registry still holds
        let held: Arc<Mutex<Vec<std::sync::Weak<dyn ScreenModule>>>> =
            Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&held);
        let mut mock = MockModuleLoader::new();
        mock.expect_load()
            .times(2)
            .returning(move |_| {
                let mut versions = seen.lock().unwrap();
                let alive = versions.iter().filter(|w| w.strong_count() > 0).count();
                assert_eq!(alive, 0, "previous version still loaded");
                let module = text_module("login", "Login", "ok");
                versions.push(Arc::downgrade(&module));
                Ok(module)
            });

        let mut registry = ScreenRegistry::new(mock);
        registry.activate("Login").unwrap();
        registry.activate("Login").unwrap();
        assert_eq!(held.lock().unwrap().len(), 2);
    }

    #[test]
    fn test_failed_reload_keeps_previous_current_screen() {
        let mut registry = registry_with(&[
            ("home", "Home", "home"),
            ("settings", "Settings", "settings v1"),
        ]);
        registry.activate("Settings").unwrap();
        registry.activate("Home").unwrap();

        registry.loader().register("settings", || {
            Err(Error::reload("Settings", "syntax error in settings"))
        });

        let err = registry.activate("Settings").err().unwrap();
        assert!(matches!(err, Error::Reload { .. }));
        assert!(err.is_recoverable());
        assert_eq!(registry.current_name(), Some("Home"));
        assert_eq!(registry.current().unwrap().render(), "home");

        // The last good instance is still there to switch back to
        assert_eq!(registry.switch_to("Settings").unwrap().render(), "settings v1");
    }

    #[test]
    fn test_construct_failure_is_reload_error() {
        let loader = FactoryLoader::new();
        loader.register("broken", || {
            Ok(Arc::new(SimpleModule::new("broken", "screens/broken.rs", "Broken", |_| {
                Err(Error::process("constructor panicked"))
            })) as Arc<dyn ScreenModule>)
        });
        let mut registry = ScreenRegistry::new(loader);

        let err = registry.activate("Broken").err().unwrap();
        assert!(matches!(err, Error::Reload { ref screen, .. } if screen == "Broken"));
        assert!(registry.current().is_none());
    }

    #[test]
    fn test_unknown_module_is_reload_error() {
        let mut registry = ScreenRegistry::default();
        assert!(matches!(
            registry.activate("Nowhere"),
            Err(Error::Reload { .. })
        ));
        assert!(registry.is_registered("Nowhere"));
    }

    #[test]
    fn test_switch_to_does_not_reload() {
        let mut registry = registry_with(&[("home", "Home", "home"), ("about", "About", "about")]);
        registry.activate("Home").unwrap();
        registry.activate("About").unwrap();

        assert_eq!(registry.switch_to("Home").unwrap().render(), "home");
        assert_eq!(registry.current_name(), Some("Home"));
        assert_eq!(registry.module_generation("home"), 1);
    }

    #[test]
    fn test_switch_to_unconstructed_screen_activates_it() {
        let mut registry = registry_with(&[("about", "About", "about")]);
        registry.register_screen("About").unwrap();
        assert_eq!(registry.switch_to("About").unwrap().render(), "about");
        assert_eq!(registry.module_generation("about"), 1);
    }

    #[test]
    fn test_switch_to_unregistered_screen() {
        let mut registry = ScreenRegistry::default();
        assert!(matches!(
            registry.switch_to("Ghost"),
            Err(Error::UnknownScreen { .. })
        ));
    }

    #[test]
    fn test_colliding_identities_rejected() {
        let mut registry = ScreenRegistry::default();
        registry.register_screen("Main Screen").unwrap();

        // Same type identity, different module
        assert!(matches!(
            registry.register_screen("MainScreen"),
            Err(Error::ScreenName { .. })
        ));
        // Same module identity, different type
        assert!(matches!(
            registry.register_screen("main screen"),
            Err(Error::ScreenName { .. })
        ));
        // Re-registering the same name is fine
        assert!(registry.register_screen("Main Screen").is_ok());
    }

    #[test]
    fn test_reload_rebinds_backing_file() {
        let mut registry = registry_with(&[("home", "Home", "home")]);
        registry.activate("Home").unwrap();

        registry.loader().register("home", || {
            Ok(Arc::new(SimpleModule::new("home", "screens/home_v2.rs", "Home", |name| {
                Ok(Box::new(Text {
                    name: name.to_string(),
                    body: "moved".to_string(),
                }) as Box<dyn Screen>)
            })) as Arc<dyn ScreenModule>)
        });
        registry.activate("Home").unwrap();

        assert_eq!(registry.bound_module(Path::new("screens/home.rs")), None);
        assert_eq!(
            registry.bound_module(Path::new("screens/home_v2.rs")),
            Some("home")
        );
    }
}
