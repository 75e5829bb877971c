//! Artifact resolution and classpath construction.
//!
//! [`ArtifactResolver`] turns root coordinates into a [`DependencyGraph`]: every dependency
//! path in breadth-first order plus the files backing each artifact.
//! [`LocalRepositoryResolver`] reads Maven-layout repository directories.
//! [`ClasspathBuilder`] runs a resolver and a mediation to produce the classpath.

use crate::classpath::{AnnotatedClasspath, ClasspathEntry, ClasspathResult};
use crate::error::CheckerError;
use crate::mediation::DependencyMediation;
use crate::types::{ArtifactProblem, Coordinate, CoordinateKey, Dependency, DependencyPath, Scope};
use parking_lot::Mutex;
use regex::Regex;
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};
use tracing::{debug, info, warn};

/// Parent chains longer than this are treated as cyclic.
const MAX_PARENT_DEPTH: usize = 32;

// ============================================================================
// Dependency graph
// ============================================================================

/// Resolver output: dependency paths in level order and the files of resolved artifacts.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    paths: Vec<DependencyPath>,
    files: HashMap<Coordinate, PathBuf>,
    artifact_problems: Vec<ArtifactProblem>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_path(&mut self, path: DependencyPath) {
        self.paths.push(path);
    }

    pub fn set_file(&mut self, coordinate: Coordinate, file: PathBuf) {
        self.files.insert(coordinate, file);
    }

    pub fn add_problem(&mut self, problem: ArtifactProblem) {
        self.artifact_problems.push(problem);
    }

    pub fn paths(&self) -> &[DependencyPath] {
        &self.paths
    }

    pub fn file(&self, coordinate: &Coordinate) -> Option<&Path> {
        self.files.get(coordinate).map(PathBuf::as_path)
    }

    pub fn artifact_problems(&self) -> &[ArtifactProblem] {
        &self.artifact_problems
    }
}

/// Resolves root artifacts to their dependency graph.
pub trait ArtifactResolver: Send + Sync {
    /// Unresolvable artifacts are reported in the graph, not as errors.
    fn resolve(&self, roots: &[Coordinate]) -> Result<DependencyGraph, CheckerError>;

    /// Artifacts managed by a BOM.
    fn read_bom(&self, bom: &Coordinate) -> Result<Vec<Coordinate>, CheckerError>;
}

// ============================================================================
// POM model
// ============================================================================

#[derive(Debug, Clone, Default)]
struct RawDependency {
    group_id: String,
    artifact_id: String,
    version: Option<String>,
    scope: Option<String>,
    classifier: Option<String>,
    type_: Option<String>,
    optional: bool,
    exclusions: Vec<CoordinateKey>,
}

impl RawDependency {
    fn key(&self) -> (String, String) {
        (self.group_id.clone(), self.artifact_id.clone())
    }

    fn resolved(&self, properties: &BTreeMap<String, String>) -> Self {
        let resolve = |value: &Option<String>| {
            value
                .as_deref()
                .map(|v| resolve_placeholders(v, properties))
        };
        Self {
            group_id: resolve_placeholders(&self.group_id, properties),
            artifact_id: resolve_placeholders(&self.artifact_id, properties),
            version: resolve(&self.version),
            scope: resolve(&self.scope),
            classifier: resolve(&self.classifier),
            type_: resolve(&self.type_),
            optional: self.optional,
            exclusions: self.exclusions.clone(),
        }
    }

    fn is_import(&self) -> bool {
        self.scope.as_deref() == Some("import") && self.type_.as_deref() == Some("pom")
    }

    fn is_jar(&self) -> bool {
        matches!(self.type_.as_deref(), None | Some("jar") | Some("bundle"))
    }
}

#[derive(Debug, Clone)]
struct PomParent {
    group_id: String,
    artifact_id: String,
    version: String,
}

#[derive(Debug, Clone, Default)]
struct RawPom {
    group_id: Option<String>,
    artifact_id: Option<String>,
    version: Option<String>,
    parent: Option<PomParent>,
    properties: BTreeMap<String, String>,
    dependencies: Vec<RawDependency>,
    dependency_management: Vec<RawDependency>,
}

#[derive(Debug, Clone, Default)]
struct EffectivePom {
    properties: BTreeMap<String, String>,
    dependency_management: BTreeMap<(String, String), RawDependency>,
    dependencies: Vec<RawDependency>,
}

fn parse_pom(path: &Path) -> Result<RawPom, CheckerError> {
    let contents = std::fs::read_to_string(path).map_err(|source| CheckerError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let doc = roxmltree::Document::parse(&contents).map_err(|err| CheckerError::InvalidPom {
        path: path.to_path_buf(),
        message: err.to_string(),
    })?;
    let project = doc.root_element();
    if project.tag_name().name() != "project" {
        return Err(CheckerError::InvalidPom {
            path: path.to_path_buf(),
            message: format!("unexpected root element <{}>", project.tag_name().name()),
        });
    }

    let mut pom = RawPom {
        group_id: child_text(&project, "groupId"),
        artifact_id: child_text(&project, "artifactId"),
        version: child_text(&project, "version"),
        ..RawPom::default()
    };

    if let Some(parent) = child_element(&project, "parent") {
        if let (Some(group_id), Some(artifact_id), Some(version)) = (
            child_text(&parent, "groupId"),
            child_text(&parent, "artifactId"),
            child_text(&parent, "version"),
        ) {
            pom.parent = Some(PomParent {
                group_id,
                artifact_id,
                version,
            });
        }
    }

    if let Some(properties) = child_element(&project, "properties") {
        for child in properties.children().filter(|n| n.is_element()) {
            let value = child.text().map(str::trim).unwrap_or_default();
            pom.properties
                .insert(child.tag_name().name().to_string(), value.to_string());
        }
    }

    if let Some(dependencies) = child_element(&project, "dependencies") {
        pom.dependencies = parse_dependencies(&dependencies);
    }
    if let Some(management) = child_element(&project, "dependencyManagement") {
        if let Some(dependencies) = child_element(&management, "dependencies") {
            pom.dependency_management = parse_dependencies(&dependencies);
        }
    }
    Ok(pom)
}

fn parse_dependencies(node: &roxmltree::Node<'_, '_>) -> Vec<RawDependency> {
    node.children()
        .filter(|n| n.is_element() && n.has_tag_name("dependency"))
        .filter_map(|dependency| {
            let exclusions = child_element(&dependency, "exclusions")
                .map(|exclusions| {
                    exclusions
                        .children()
                        .filter(|n| n.is_element() && n.has_tag_name("exclusion"))
                        .filter_map(|exclusion| {
                            Some(CoordinateKey::new(
                                child_text(&exclusion, "groupId")?,
                                child_text(&exclusion, "artifactId")?,
                            ))
                        })
                        .collect()
                })
                .unwrap_or_default();
            Some(RawDependency {
                group_id: child_text(&dependency, "groupId")?,
                artifact_id: child_text(&dependency, "artifactId")?,
                version: child_text(&dependency, "version"),
                scope: child_text(&dependency, "scope"),
                classifier: child_text(&dependency, "classifier"),
                type_: child_text(&dependency, "type"),
                optional: child_text(&dependency, "optional").as_deref() == Some("true"),
                exclusions,
            })
        })
        .collect()
}

fn child_element<'a>(
    node: &roxmltree::Node<'a, 'a>,
    name: &str,
) -> Option<roxmltree::Node<'a, 'a>> {
    node.children()
        .find(|n| n.is_element() && n.tag_name().name() == name)
}

fn child_text(node: &roxmltree::Node<'_, '_>, name: &str) -> Option<String> {
    child_element(node, name)
        .and_then(|n| n.text())
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}

fn resolve_placeholders(text: &str, properties: &BTreeMap<String, String>) -> String {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r"\$\{([^}]+)\}").expect("valid regex"));

    let mut current = text.to_string();
    // Properties may refer to other properties.
    for _ in 0..8 {
        if !current.contains("${") {
            break;
        }
        let next = re
            .replace_all(&current, |caps: &regex::Captures<'_>| {
                properties
                    .get(&caps[1])
                    .cloned()
                    .unwrap_or_else(|| caps[0].to_string())
            })
            .into_owned();
        if next == current {
            break;
        }
        current = next;
    }
    current
}

fn default_maven_repo() -> Option<PathBuf> {
    let home = std::env::var_os("HOME")
        .or_else(|| std::env::var_os("USERPROFILE"))
        .map(PathBuf::from)?;
    Some(home.join(".m2/repository"))
}

// ============================================================================
// Local repository resolver
// ============================================================================

/// Resolves artifacts from Maven-layout directories such as `~/.m2/repository`.
pub struct LocalRepositoryResolver {
    repositories: Vec<PathBuf>,
    poms: Mutex<HashMap<Coordinate, Option<Arc<EffectivePom>>>>,
}

impl LocalRepositoryResolver {
    pub fn new(repositories: Vec<PathBuf>) -> Self {
        Self {
            repositories,
            poms: Mutex::new(HashMap::new()),
        }
    }

    /// Resolver over `~/.m2/repository`, when a home directory is known.
    pub fn with_default_repository() -> Self {
        Self::new(default_maven_repo().into_iter().collect())
    }

    pub fn repositories(&self) -> &[PathBuf] {
        &self.repositories
    }

    fn relative_path(
        coordinate: &Coordinate,
        extension: &str,
        classifier: Option<&str>,
    ) -> PathBuf {
        let file_name = match classifier {
            Some(classifier) => format!(
                "{}-{}-{}.{}",
                coordinate.artifact, coordinate.version, classifier, extension
            ),
            None => format!("{}-{}.{}", coordinate.artifact, coordinate.version, extension),
        };
        PathBuf::from(coordinate.group.replace('.', "/"))
            .join(&coordinate.artifact)
            .join(&coordinate.version)
            .join(file_name)
    }

    fn locate(&self, relative: &Path) -> Option<PathBuf> {
        self.repositories
            .iter()
            .map(|repository| repository.join(relative))
            .find(|candidate| candidate.is_file())
    }

    /// The jar backing `coordinate`, if present in some repository.
    pub fn jar_path(&self, coordinate: &Coordinate) -> Option<PathBuf> {
        self.locate(&Self::relative_path(
            coordinate,
            "jar",
            coordinate.classifier.as_deref(),
        ))
    }

    fn pom_path(&self, coordinate: &Coordinate) -> Option<PathBuf> {
        self.locate(&Self::relative_path(coordinate, "pom", None))
    }

    fn effective_pom(
        &self,
        coordinate: &Coordinate,
    ) -> Result<Option<Arc<EffectivePom>>, CheckerError> {
        let pom_coordinate = Coordinate::new(
            coordinate.group.as_str(),
            coordinate.artifact.as_str(),
            coordinate.version.as_str(),
        );
        if let Some(cached) = self.poms.lock().get(&pom_coordinate) {
            return Ok(cached.clone());
        }
        let pom = self.build_effective_pom(&pom_coordinate, 0)?.map(Arc::new);
        self.poms.lock().insert(pom_coordinate, pom.clone());
        Ok(pom)
    }

    fn build_effective_pom(
        &self,
        coordinate: &Coordinate,
        depth: usize,
    ) -> Result<Option<EffectivePom>, CheckerError> {
        let Some(path) = self.pom_path(coordinate) else {
            return Ok(None);
        };
        if depth > MAX_PARENT_DEPTH {
            return Err(CheckerError::InvalidPom {
                path,
                message: "parent chain is too deep".to_string(),
            });
        }
        let raw = parse_pom(&path)?;

        let parent = match &raw.parent {
            Some(parent) => {
                let parent_coordinate =
                    Coordinate::new(&parent.group_id, &parent.artifact_id, &parent.version);
                let resolved = self.build_effective_pom(&parent_coordinate, depth + 1)?;
                if resolved.is_none() {
                    warn!(pom = %coordinate, parent = %parent_coordinate, "Parent POM not found");
                }
                resolved
            }
            None => None,
        };

        let mut properties = parent
            .as_ref()
            .map(|p| p.properties.clone())
            .unwrap_or_default();
        properties.extend(raw.properties.clone());
        let group_id = raw
            .group_id
            .clone()
            .or_else(|| raw.parent.as_ref().map(|p| p.group_id.clone()))
            .unwrap_or_else(|| coordinate.group.clone());
        let version = raw
            .version
            .clone()
            .or_else(|| raw.parent.as_ref().map(|p| p.version.clone()))
            .unwrap_or_else(|| coordinate.version.clone());
        let artifact_id = raw
            .artifact_id
            .clone()
            .unwrap_or_else(|| coordinate.artifact.clone());
        for (prefix, value) in [
            ("groupId", &group_id),
            ("artifactId", &artifact_id),
            ("version", &version),
        ] {
            properties.insert(format!("project.{}", prefix), value.clone());
            properties.insert(format!("pom.{}", prefix), value.clone());
        }
        if let Some(parent) = &raw.parent {
            properties.insert("project.parent.groupId".to_string(), parent.group_id.clone());
            properties.insert("project.parent.version".to_string(), parent.version.clone());
        }

        let mut dependency_management = parent
            .as_ref()
            .map(|p| p.dependency_management.clone())
            .unwrap_or_default();
        let mut imports = Vec::new();
        for managed in &raw.dependency_management {
            let managed = managed.resolved(&properties);
            if managed.is_import() {
                imports.push(managed);
            } else {
                dependency_management.insert(managed.key(), managed);
            }
        }
        for import in imports {
            let Some(version) = import.version.clone() else {
                continue;
            };
            let bom = Coordinate::new(&import.group_id, &import.artifact_id, version);
            match self.build_effective_pom(&bom, depth + 1)? {
                Some(bom_pom) => {
                    for (key, managed) in bom_pom.dependency_management {
                        dependency_management.entry(key).or_insert(managed);
                    }
                }
                None => warn!(pom = %coordinate, bom = %bom, "Imported BOM not found"),
            }
        }

        let mut dependencies: Vec<RawDependency> = parent
            .as_ref()
            .map(|p| p.dependencies.clone())
            .unwrap_or_default();
        for dependency in &raw.dependencies {
            let mut dependency = dependency.resolved(&properties);
            if let Some(managed) = dependency_management.get(&dependency.key()) {
                if dependency.version.is_none() {
                    dependency.version = managed.version.clone();
                }
                if dependency.scope.is_none() {
                    dependency.scope = managed.scope.clone();
                }
                if dependency.exclusions.is_empty() {
                    dependency.exclusions = managed.exclusions.clone();
                }
            }
            dependencies.retain(|existing| existing.key() != dependency.key());
            dependencies.push(dependency);
        }

        Ok(Some(EffectivePom {
            properties,
            dependency_management,
            dependencies,
        }))
    }

    /// Declared dependencies of `coordinate` with versions filled in.
    pub fn direct_dependencies(
        &self,
        coordinate: &Coordinate,
    ) -> Result<Vec<Dependency>, CheckerError> {
        let Some(pom) = self.effective_pom(coordinate)? else {
            debug!(artifact = %coordinate, "No POM; treating as having no dependencies");
            return Ok(Vec::new());
        };
        let mut dependencies = Vec::new();
        for raw in &pom.dependencies {
            if !raw.is_jar() {
                continue;
            }
            let Some(version) = raw.version.as_deref().filter(|v| !v.contains("${")) else {
                warn!(
                    artifact = %coordinate,
                    dependency = %format!("{}:{}", raw.group_id, raw.artifact_id),
                    "Dependency version is not resolvable"
                );
                continue;
            };
            let mut dependency_coordinate =
                Coordinate::new(&raw.group_id, &raw.artifact_id, version);
            if let Some(classifier) = &raw.classifier {
                dependency_coordinate = dependency_coordinate.with_classifier(classifier.as_str());
            }
            dependencies.push(
                Dependency::new(dependency_coordinate)
                    .with_scope(raw.scope.as_deref().map(Scope::parse).unwrap_or_default())
                    .optional(raw.optional)
                    .with_exclusions(raw.exclusions.clone()),
            );
        }
        Ok(dependencies)
    }
}

impl ArtifactResolver for LocalRepositoryResolver {
    fn resolve(&self, roots: &[Coordinate]) -> Result<DependencyGraph, CheckerError> {
        let mut graph = DependencyGraph::new();
        let mut queue: VecDeque<DependencyPath> = roots
            .iter()
            .map(|root| DependencyPath::new(None).append(Dependency::new(root.clone())))
            .collect();
        let mut expanded: HashSet<Coordinate> = HashSet::new();

        while let Some(path) = queue.pop_front() {
            let Some(leaf) = path.leaf().cloned() else {
                continue;
            };
            graph.add_path(path.clone());
            if !expanded.insert(leaf.clone()) {
                continue;
            }

            match self.jar_path(&leaf) {
                Some(jar) => graph.set_file(leaf.clone(), jar),
                None => {
                    warn!(artifact = %leaf, "Artifact jar not found in local repositories");
                    graph.add_problem(ArtifactProblem::Unresolvable {
                        coordinate: leaf.clone(),
                        path: path
                            .dependencies()
                            .iter()
                            .map(|d| d.coordinate.clone())
                            .collect(),
                    });
                    continue;
                }
            }

            let is_root = path.dependencies().len() == 1;
            let excluded: HashSet<&CoordinateKey> = path
                .dependencies()
                .iter()
                .flat_map(|d| d.exclusions.iter())
                .collect();
            for dependency in self.direct_dependencies(&leaf)? {
                if dependency.scope == Scope::Test {
                    continue;
                }
                if !is_root && (dependency.optional || dependency.scope == Scope::Provided) {
                    continue;
                }
                if matches!(dependency.scope, Scope::System | Scope::Import) {
                    continue;
                }
                if excluded.contains(&dependency.coordinate.key()) {
                    debug!(artifact = %dependency.coordinate, "Excluded along dependency path");
                    continue;
                }
                queue.push_back(path.append(dependency));
            }
        }
        info!(
            roots = roots.len(),
            paths = graph.paths().len(),
            problems = graph.artifact_problems().len(),
            "Resolved dependency graph"
        );
        Ok(graph)
    }

    fn read_bom(&self, bom: &Coordinate) -> Result<Vec<Coordinate>, CheckerError> {
        let pom = self
            .effective_pom(bom)?
            .ok_or_else(|| CheckerError::ArtifactNotFound(bom.to_string()))?;
        let mut managed = Vec::new();
        for dependency in pom.dependency_management.values() {
            if !dependency.is_jar() || dependency.classifier.as_deref() == Some("tests") {
                continue;
            }
            let Some(version) = dependency.version.as_deref().filter(|v| !v.contains("${")) else {
                continue;
            };
            let mut coordinate =
                Coordinate::new(&dependency.group_id, &dependency.artifact_id, version);
            if let Some(classifier) = &dependency.classifier {
                coordinate = coordinate.with_classifier(classifier.as_str());
            }
            managed.push(coordinate);
        }
        Ok(managed)
    }
}

// ============================================================================
// Classpath builder
// ============================================================================

/// Resolves and mediates a classpath.
#[derive(Clone)]
pub struct ClasspathBuilder {
    resolver: Arc<dyn ArtifactResolver>,
    mediation: Arc<dyn DependencyMediation>,
}

impl ClasspathBuilder {
    pub fn new(
        resolver: Arc<dyn ArtifactResolver>,
        mediation: Arc<dyn DependencyMediation>,
    ) -> Self {
        Self {
            resolver,
            mediation,
        }
    }

    pub fn resolver(&self) -> &Arc<dyn ArtifactResolver> {
        &self.resolver
    }

    /// The classpath for `roots`; the roots' own entries are the entry points.
    pub fn resolve(&self, roots: &[Coordinate]) -> Result<ClasspathResult, CheckerError> {
        let graph = self.resolver.resolve(roots)?;
        let mut result = self.mediation.mediate(&graph);
        result.entry_points = roots
            .iter()
            .filter_map(|root| result.classpath.entry_for_coordinate(root).cloned())
            .collect();
        info!(
            entries = result.classpath.len(),
            artifact_problems = result.artifact_problems.len(),
            "Built classpath"
        );
        Ok(result)
    }

    /// An unannotated classpath of jar files, all of them entry points.
    pub fn from_jars(paths: &[PathBuf]) -> ClasspathResult {
        let mut classpath = AnnotatedClasspath::new();
        let mut entry_points = Vec::new();
        for path in paths {
            let entry = Arc::new(ClasspathEntry::new(path.clone()));
            classpath.insert(entry.clone(), DependencyPath::new(None));
            entry_points.push(entry);
        }
        ClasspathResult {
            classpath,
            entry_points,
            artifact_problems: Vec::new(),
        }
    }
}
