//! Classpath entries and the annotated classpath.
//!
//! A [`ClasspathEntry`] is one jar file or class directory. Its defined class names are
//! listed once on first use and then kept for the life of the entry.

use crate::error::CheckerError;
use crate::types::{ArtifactProblem, Coordinate, CoordinateKey, DependencyPath};
use indexmap::IndexMap;
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;
use std::fs::{self, File};
use std::hash::{Hash, Hasher};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};
use walkdir::WalkDir;

const CLASS_SUFFIX: &str = ".class";

/// One binary unit of the classpath, optionally tied to the artifact it was resolved from.
#[derive(Debug)]
pub struct ClasspathEntry {
    path: PathBuf,
    coordinate: Option<Coordinate>,
    class_names: OnceLock<BTreeSet<String>>,
}

impl ClasspathEntry {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            coordinate: None,
            class_names: OnceLock::new(),
        }
    }

    pub fn with_coordinate(path: impl Into<PathBuf>, coordinate: Coordinate) -> Self {
        Self {
            path: path.into(),
            coordinate: Some(coordinate),
            class_names: OnceLock::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn coordinate(&self) -> Option<&Coordinate> {
        self.coordinate.as_ref()
    }

    fn is_directory(&self) -> bool {
        self.path.is_dir()
    }

    /// Binary names of every class defined in this entry.
    pub fn class_names(&self) -> Result<&BTreeSet<String>, CheckerError> {
        if let Some(names) = self.class_names.get() {
            return Ok(names);
        }
        let names = if self.is_directory() {
            self.list_directory()?
        } else {
            self.list_archive()?
        };
        Ok(self.class_names.get_or_init(|| names))
    }

    pub fn defines(&self, class_name: &str) -> Result<bool, CheckerError> {
        Ok(self.class_names()?.contains(class_name))
    }

    fn list_archive(&self) -> Result<BTreeSet<String>, CheckerError> {
        let archive = self.open_archive()?;
        Ok(archive
            .file_names()
            .filter_map(class_name_from_path)
            .collect())
    }

    fn list_directory(&self) -> Result<BTreeSet<String>, CheckerError> {
        let mut names = BTreeSet::new();
        for entry in WalkDir::new(&self.path) {
            let entry = entry.map_err(|err| CheckerError::Io {
                path: self.path.clone(),
                source: err.into(),
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            let relative = entry
                .path()
                .strip_prefix(&self.path)
                .unwrap_or(entry.path());
            let relative = relative.to_string_lossy().replace('\\', "/");
            if let Some(name) = class_name_from_path(&relative) {
                names.insert(name);
            }
        }
        Ok(names)
    }

    fn open_archive(&self) -> Result<zip::ZipArchive<File>, CheckerError> {
        let file = File::open(&self.path).map_err(|source| CheckerError::Io {
            path: self.path.clone(),
            source,
        })?;
        zip::ZipArchive::new(file).map_err(|source| CheckerError::Zip {
            path: self.path.clone(),
            source,
        })
    }

    /// Raw bytes of `class_name`, or `None` if this entry does not define it.
    pub fn read_class(&self, class_name: &str) -> Result<Option<Vec<u8>>, CheckerError> {
        if !self.defines(class_name)? {
            return Ok(None);
        }
        let relative = format!("{}{}", class_name.replace('.', "/"), CLASS_SUFFIX);
        if self.is_directory() {
            let path = self.path.join(&relative);
            return fs::read(&path)
                .map(Some)
                .map_err(|source| CheckerError::Io { path, source });
        }
        let mut archive = self.open_archive()?;
        let mut file = archive
            .by_name(&relative)
            .map_err(|source| CheckerError::Zip {
                path: self.path.clone(),
                source,
            })?;
        let mut bytes = Vec::with_capacity(file.size() as usize);
        file.read_to_end(&mut bytes)
            .map_err(|source| CheckerError::Io {
                path: self.path.clone(),
                source,
            })?;
        Ok(Some(bytes))
    }

    /// Every class in this entry with its bytes, reading an archive only once.
    pub fn read_all_classes(&self) -> Result<Vec<(String, Vec<u8>)>, CheckerError> {
        let names = self.class_names()?;
        if self.is_directory() {
            return names
                .iter()
                .map(|name| {
                    let path = self
                        .path
                        .join(format!("{}{}", name.replace('.', "/"), CLASS_SUFFIX));
                    fs::read(&path)
                        .map(|bytes| (name.clone(), bytes))
                        .map_err(|source| CheckerError::Io { path, source })
                })
                .collect();
        }

        let mut archive = self.open_archive()?;
        let mut classes = Vec::with_capacity(names.len());
        for index in 0..archive.len() {
            let mut file = archive.by_index(index).map_err(|source| CheckerError::Zip {
                path: self.path.clone(),
                source,
            })?;
            let Some(name) = class_name_from_path(file.name()) else {
                continue;
            };
            let mut bytes = Vec::with_capacity(file.size() as usize);
            file.read_to_end(&mut bytes)
                .map_err(|source| CheckerError::Io {
                    path: self.path.clone(),
                    source,
                })?;
            classes.push((name, bytes));
        }
        Ok(classes)
    }
}

/// `a/b/C$D.class` -> `a.b.C$D`. Module descriptors and multi-release variants are skipped.
fn class_name_from_path(path: &str) -> Option<String> {
    let stem = path.strip_suffix(CLASS_SUFFIX)?;
    if stem.starts_with("META-INF/")
        || stem.ends_with("module-info")
        || stem.ends_with("package-info")
    {
        return None;
    }
    Some(stem.trim_start_matches('/').replace('/', "."))
}

impl PartialEq for ClasspathEntry {
    fn eq(&self, other: &Self) -> bool {
        self.path == other.path && self.coordinate == other.coordinate
    }
}

impl Eq for ClasspathEntry {}

impl Hash for ClasspathEntry {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.path.hash(state);
        self.coordinate.hash(state);
    }
}

impl PartialOrd for ClasspathEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ClasspathEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.path
            .cmp(&other.path)
            .then_with(|| self.coordinate.cmp(&other.coordinate))
    }
}

impl fmt::Display for ClasspathEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.coordinate {
            Some(coordinate) => write!(f, "{}", coordinate),
            None => write!(f, "{}", self.path.display()),
        }
    }
}

// ============================================================================
// Annotated classpath
// ============================================================================

/// Classpath entries in classpath order, each with the dependency paths that reached it.
#[derive(Debug, Clone, Default)]
pub struct AnnotatedClasspath {
    entries: IndexMap<Arc<ClasspathEntry>, Vec<DependencyPath>>,
}

impl AnnotatedClasspath {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `path` for `entry`, appending the entry to the classpath on first sight.
    pub fn insert(&mut self, entry: Arc<ClasspathEntry>, path: DependencyPath) {
        let paths = self.entries.entry(entry).or_default();
        if !paths.contains(&path) {
            paths.push(path);
        }
    }

    /// Appends `entry` without recording a path.
    pub fn insert_entry(&mut self, entry: Arc<ClasspathEntry>) {
        self.entries.entry(entry).or_default();
    }

    pub fn entries(&self) -> impl Iterator<Item = &Arc<ClasspathEntry>> {
        self.entries.keys()
    }

    pub fn paths(&self, entry: &ClasspathEntry) -> &[DependencyPath] {
        self.entries
            .get(entry)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The selected entry for an artifact key, if any.
    pub fn entry_for_key(&self, key: &CoordinateKey) -> Option<&Arc<ClasspathEntry>> {
        self.entries.keys().find(|entry| {
            entry
                .coordinate()
                .is_some_and(|coordinate| &coordinate.key() == key)
        })
    }

    pub fn entry_for_coordinate(&self, coordinate: &Coordinate) -> Option<&Arc<ClasspathEntry>> {
        self.entries
            .keys()
            .find(|entry| entry.coordinate() == Some(coordinate))
    }
}

/// Output of classpath construction.
#[derive(Debug, Clone, Default)]
pub struct ClasspathResult {
    pub classpath: AnnotatedClasspath,
    /// Entries whose classes seed reachability.
    pub entry_points: Vec<Arc<ClasspathEntry>>,
    pub artifact_problems: Vec<ArtifactProblem>,
}

impl ClasspathResult {
    pub fn entries(&self) -> Vec<Arc<ClasspathEntry>> {
        self.classpath.entries().cloned().collect()
    }

    /// Renders the dependency paths of each entry, one block per entry.
    pub fn format_dependency_paths<'a>(
        &self,
        entries: impl IntoIterator<Item = &'a Arc<ClasspathEntry>>,
    ) -> String {
        let mut out = String::new();
        for entry in entries {
            let paths = self.classpath.paths(entry);
            match paths.split_first() {
                Some((first, rest)) => {
                    out.push_str(&format!("{} is at:\n", entry));
                    out.push_str(&format!("  {}\n", first));
                    if !rest.is_empty() {
                        out.push_str(&format!(
                            "  and {} dependency path{}.\n",
                            rest.len(),
                            if rest.len() == 1 { "" } else { "s" }
                        ));
                    }
                }
                None => out.push_str(&format!("{} is not in any dependency path.\n", entry)),
            }
        }
        out
    }
}
