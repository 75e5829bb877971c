//! Class lookup across the classpath.
//!
//! Lookups return one of three states: the class was found (parsed, with its location),
//! the class is JDK-provided and opaque, or the class is absent.
//!
//! Parsed classes are memoized in a bounded LRU cache owned by one analysis. Evicted classes
//! are re-read from their archive on the next lookup.

use crate::classfile::{self, ClassInfo};
use crate::classpath::ClasspathEntry;
use crate::error::CheckerError;
use crate::types::ClassFile;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::hash::Hash;
use std::sync::Arc;
use tracing::debug;

pub const DEFAULT_CACHE_CAPACITY: usize = 1000;

/// Package prefixes whose classes ship with the JDK.
pub const DEFAULT_SYSTEM_PACKAGES: &[&str] = &[
    "java.",
    "jdk.",
    "sun.",
    "com.sun.",
    "javax.accessibility.",
    "javax.annotation.processing.",
    "javax.crypto.",
    "javax.imageio.",
    "javax.lang.model.",
    "javax.management.",
    "javax.naming.",
    "javax.net.",
    "javax.print.",
    "javax.rmi.ssl.",
    "javax.script.",
    "javax.security.auth.",
    "javax.security.cert.",
    "javax.security.sasl.",
    "javax.smartcardio.",
    "javax.sound.",
    "javax.sql.",
    "javax.swing.",
    "javax.tools.",
    "javax.transaction.xa.",
    "javax.xml.catalog.",
    "javax.xml.crypto.",
    "javax.xml.datatype.",
    "javax.xml.namespace.",
    "javax.xml.parsers.",
    "javax.xml.stream.",
    "javax.xml.transform.",
    "javax.xml.validation.",
    "javax.xml.xpath.",
    "org.ietf.jgss.",
    "org.w3c.dom.",
    "org.xml.sax.",
];

const JDK_LOCATION: &str = "jrt:/java.base";

/// A parsed class and where it was found.
#[derive(Debug, Clone)]
pub struct LoadedClass {
    pub info: Arc<ClassInfo>,
    pub location: ClassFile,
}

#[derive(Debug, Clone)]
pub enum ClassLookup {
    Found(LoadedClass),
    /// A JDK class with no bootstrap classpath to read it from.
    System,
    NotFound,
}

impl ClassLookup {
    pub fn found(&self) -> Option<&LoadedClass> {
        match self {
            ClassLookup::Found(loaded) => Some(loaded),
            _ => None,
        }
    }
}

/// Finds classes by binary name.
pub trait ClassRepository: Send + Sync {
    fn find_class(&self, class_name: &str) -> Result<ClassLookup, CheckerError>;

    fn is_system_class(&self, class_name: &str) -> bool;
}

/// Reads and parses classes from classpath entries, first entry wins.
#[derive(Debug)]
pub struct ClassLoader {
    classpath: Vec<Arc<ClasspathEntry>>,
    bootstrap: Vec<Arc<ClasspathEntry>>,
    system_packages: Vec<String>,
    /// Location reported for hard-coded JDK classes.
    jdk: Arc<ClasspathEntry>,
}

impl ClassLoader {
    pub fn new(
        classpath: Vec<Arc<ClasspathEntry>>,
        bootstrap: Vec<Arc<ClasspathEntry>>,
        system_packages: Vec<String>,
    ) -> Self {
        Self {
            classpath,
            bootstrap,
            system_packages,
            jdk: Arc::new(ClasspathEntry::new(JDK_LOCATION)),
        }
    }

    /// Loader with the default JDK packages and no bootstrap classpath.
    pub fn for_classpath(classpath: Vec<Arc<ClasspathEntry>>) -> Self {
        Self::new(
            classpath,
            Vec::new(),
            DEFAULT_SYSTEM_PACKAGES.iter().map(|p| p.to_string()).collect(),
        )
    }

    pub fn classpath(&self) -> &[Arc<ClasspathEntry>] {
        &self.classpath
    }

    pub fn is_system_class(&self, class_name: &str) -> bool {
        self.system_packages
            .iter()
            .any(|prefix| class_name.starts_with(prefix.as_str()))
    }

    pub fn load(&self, class_name: &str) -> Result<ClassLookup, CheckerError> {
        if self.is_system_class(class_name) {
            if let Some(loaded) = load_from(&self.bootstrap, class_name)? {
                return Ok(ClassLookup::Found(loaded));
            }
            if let Some(info) = classfile::jdk_class(class_name) {
                return Ok(ClassLookup::Found(LoadedClass {
                    info: Arc::new(info),
                    location: ClassFile::new(self.jdk.clone(), class_name),
                }));
            }
            return Ok(ClassLookup::System);
        }
        Ok(match load_from(&self.classpath, class_name)? {
            Some(loaded) => ClassLookup::Found(loaded),
            None => ClassLookup::NotFound,
        })
    }
}

fn load_from(
    entries: &[Arc<ClasspathEntry>],
    class_name: &str,
) -> Result<Option<LoadedClass>, CheckerError> {
    for entry in entries {
        let Some(bytes) = entry.read_class(class_name)? else {
            continue;
        };
        let info = ClassInfo::parse(&bytes).map_err(|source| CheckerError::ClassFormat {
            class_name: class_name.to_string(),
            location: entry.to_string(),
            source,
        })?;
        return Ok(Some(LoadedClass {
            info: Arc::new(info),
            location: ClassFile::new(entry.clone(), class_name),
        }));
    }
    Ok(None)
}

// ============================================================================
// Repositories
// ============================================================================

#[derive(Debug)]
struct LruCache<K, V> {
    capacity: usize,
    map: HashMap<K, V>,
    order: VecDeque<K>,
}

impl<K, V> LruCache<K, V>
where
    K: Eq + Hash + Clone + std::fmt::Debug,
    V: Clone,
{
    fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            map: HashMap::new(),
            order: VecDeque::new(),
        }
    }

    fn get_cloned(&mut self, key: &K) -> Option<V> {
        let value = self.map.get(key)?.clone();
        self.touch(key);
        Some(value)
    }

    fn insert(&mut self, key: K, value: V) {
        self.map.insert(key.clone(), value);
        self.touch(&key);
        self.evict_if_needed();
    }

    fn touch(&mut self, key: &K) {
        if let Some(pos) = self.order.iter().position(|k| k == key) {
            self.order.remove(pos);
        }
        self.order.push_back(key.clone());
    }

    fn evict_if_needed(&mut self) {
        while self.map.len() > self.capacity {
            let Some(oldest) = self.order.pop_front() else {
                break;
            };
            debug!(class = ?oldest, "Evicting class from cache");
            self.map.remove(&oldest);
        }
    }

    fn len(&self) -> usize {
        self.map.len()
    }
}

/// Repository that keeps up to `capacity` lookups, least recently used evicted first.
#[derive(Debug)]
pub struct CachingClassRepository {
    loader: ClassLoader,
    cache: Mutex<LruCache<String, ClassLookup>>,
}

impl CachingClassRepository {
    pub fn new(loader: ClassLoader, capacity: usize) -> Self {
        Self {
            loader,
            cache: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub fn cached_len(&self) -> usize {
        self.cache.lock().len()
    }
}

impl ClassRepository for CachingClassRepository {
    fn find_class(&self, class_name: &str) -> Result<ClassLookup, CheckerError> {
        if let Some(hit) = self.cache.lock().get_cloned(&class_name.to_string()) {
            return Ok(hit);
        }
        let lookup = self.loader.load(class_name)?;
        self.cache.lock().insert(class_name.to_string(), lookup.clone());
        Ok(lookup)
    }

    fn is_system_class(&self, class_name: &str) -> bool {
        self.loader.is_system_class(class_name)
    }
}

/// Repository that parses on every lookup.
#[derive(Debug)]
pub struct NoCachingClassRepository {
    loader: ClassLoader,
}

impl NoCachingClassRepository {
    pub fn new(loader: ClassLoader) -> Self {
        Self { loader }
    }
}

impl ClassRepository for NoCachingClassRepository {
    fn find_class(&self, class_name: &str) -> Result<ClassLookup, CheckerError> {
        self.loader.load(class_name)
    }

    fn is_system_class(&self, class_name: &str) -> bool {
        self.loader.is_system_class(class_name)
    }
}

/// A caching repository, or a non-caching one when `capacity` is zero.
pub fn class_repository(loader: ClassLoader, capacity: usize) -> Arc<dyn ClassRepository> {
    if capacity == 0 {
        Arc::new(NoCachingClassRepository::new(loader))
    } else {
        Arc::new(CachingClassRepository::new(loader, capacity))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classfile::ClassBuilder;
    use std::fs;

    fn class_dir(classes: &[&str]) -> (tempfile::TempDir, Arc<ClasspathEntry>) {
        let dir = tempfile::tempdir().unwrap();
        for class in classes {
            let path = dir.path().join(format!("{}.class", class.replace('.', "/")));
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, ClassBuilder::new(class).build()).unwrap();
        }
        let entry = Arc::new(ClasspathEntry::new(dir.path()));
        (dir, entry)
    }

    #[test]
    fn first_entry_wins() {
        let (_first_dir, first) = class_dir(&["a.Foo"]);
        let (_second_dir, second) = class_dir(&["a.Foo", "a.Bar"]);
        let loader = ClassLoader::for_classpath(vec![first.clone(), second.clone()]);

        let foo = loader.load("a.Foo").unwrap();
        assert_eq!(foo.found().unwrap().location.entry(), &first);
        let bar = loader.load("a.Bar").unwrap();
        assert_eq!(bar.found().unwrap().location.entry(), &second);
        assert!(matches!(loader.load("a.Missing").unwrap(), ClassLookup::NotFound));
    }

    #[test]
    fn system_classes_are_opaque_unless_described() {
        let loader = ClassLoader::for_classpath(Vec::new());
        assert!(matches!(loader.load("java.util.List").unwrap(), ClassLookup::System));
        assert!(matches!(loader.load("org.w3c.dom.Node").unwrap(), ClassLookup::System));
        let object = loader.load("java.lang.Object").unwrap();
        assert!(object.found().unwrap().info.find_method("hashCode", "()I").is_some());
        let serializable = loader.load("java.io.Serializable").unwrap();
        let serializable = serializable.found().unwrap();
        assert!(serializable.info.is_interface());
        assert_eq!(serializable.location.entry().to_string(), JDK_LOCATION);
        assert!(!loader.is_system_class("javax.annotation.Nullable"));
    }

    #[test]
    fn bootstrap_classpath_supplies_system_classes() {
        let (_dir, jdk) = class_dir(&["java.util.List"]);
        let loader = ClassLoader::new(
            Vec::new(),
            vec![jdk],
            DEFAULT_SYSTEM_PACKAGES.iter().map(|p| p.to_string()).collect(),
        );
        assert!(loader.load("java.util.List").unwrap().found().is_some());
        assert!(matches!(loader.load("java.util.Map").unwrap(), ClassLookup::System));
    }

    #[test]
    fn cache_returns_shared_parse_and_evicts_oldest() {
        let (_dir, entry) = class_dir(&["a.A", "a.B", "a.C"]);
        let repository = CachingClassRepository::new(ClassLoader::for_classpath(vec![entry]), 2);

        let first = repository.find_class("a.A").unwrap();
        let again = repository.find_class("a.A").unwrap();
        assert!(Arc::ptr_eq(
            &first.found().unwrap().info,
            &again.found().unwrap().info
        ));

        repository.find_class("a.B").unwrap();
        repository.find_class("a.C").unwrap();
        assert_eq!(repository.cached_len(), 2);
        let reloaded = repository.find_class("a.A").unwrap();
        assert!(!Arc::ptr_eq(
            &first.found().unwrap().info,
            &reloaded.found().unwrap().info
        ));
    }

    #[test]
    fn lru_touch_protects_recent_entries() {
        let mut cache = LruCache::new(2);
        cache.insert("a".to_string(), 1);
        cache.insert("b".to_string(), 2);
        assert_eq!(cache.get_cloned(&"a".to_string()), Some(1));
        cache.insert("c".to_string(), 3);
        assert_eq!(cache.get_cloned(&"b".to_string()), None);
        assert_eq!(cache.get_cloned(&"a".to_string()), Some(1));
    }
}
