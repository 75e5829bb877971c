//! Core types for the linkage checker.
//!
//! This module defines the data model shared by every stage of a run:
//! - Artifact coordinates and dependency paths (mediation layer)
//! - Symbols and class file locators (resolution layer)
//! - Linkage problems, their causes, and artifact problems (findings)

use crate::classpath::ClasspathEntry;
use crate::descriptor;
use crate::error::CheckerError;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;
use std::sync::Arc;

// ============================================================================
// Coordinates
// ============================================================================

/// Identifies one version of a package: `groupId:artifactId[:classifier]:version`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Coordinate {
    pub group: String,
    pub artifact: String,
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub classifier: Option<String>,
}

impl Coordinate {
    pub fn new(
        group: impl Into<String>,
        artifact: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            group: group.into(),
            artifact: artifact.into(),
            version: version.into(),
            classifier: None,
        }
    }

    pub fn with_classifier(mut self, classifier: impl Into<String>) -> Self {
        self.classifier = Some(classifier.into());
        self
    }

    /// The versionless key used as the unit of mediation.
    pub fn key(&self) -> CoordinateKey {
        CoordinateKey::new(&self.group, &self.artifact)
    }

    /// Same coordinate at a different version.
    pub fn with_version(&self, version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            ..self.clone()
        }
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.classifier {
            Some(classifier) => write!(
                f,
                "{}:{}:jar:{}:{}",
                self.group, self.artifact, classifier, self.version
            ),
            None => write!(f, "{}:{}:{}", self.group, self.artifact, self.version),
        }
    }
}

impl FromStr for Coordinate {
    type Err = CheckerError;

    /// Accepts `g:a:v`, `g:a:type:v` and `g:a:type:classifier:v`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.trim().split(':').collect();
        if parts.iter().any(|p| p.is_empty()) {
            return Err(CheckerError::InvalidCoordinate(s.to_string()));
        }
        match parts.as_slice() {
            [group, artifact, version] | [group, artifact, _, version] => {
                Ok(Coordinate::new(*group, *artifact, *version))
            }
            [group, artifact, _, classifier, version] => {
                Ok(Coordinate::new(*group, *artifact, *version).with_classifier(*classifier))
            }
            _ => Err(CheckerError::InvalidCoordinate(s.to_string())),
        }
    }
}

/// A coordinate without its version: `groupId:artifactId`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CoordinateKey {
    pub group: String,
    pub artifact: String,
}

impl CoordinateKey {
    pub fn new(group: impl Into<String>, artifact: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            artifact: artifact.into(),
        }
    }
}

impl fmt::Display for CoordinateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.group, self.artifact)
    }
}

impl FromStr for CoordinateKey {
    type Err = CheckerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().split_once(':') {
            Some((group, artifact))
                if !group.is_empty() && !artifact.is_empty() && !artifact.contains(':') =>
            {
                Ok(CoordinateKey::new(group, artifact))
            }
            _ => Err(CheckerError::InvalidCoordinate(s.to_string())),
        }
    }
}

// ============================================================================
// Dependencies
// ============================================================================

/// Maven dependency scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    #[default]
    Compile,
    Runtime,
    Provided,
    Test,
    System,
    Import,
}

impl Scope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scope::Compile => "compile",
            Scope::Runtime => "runtime",
            Scope::Provided => "provided",
            Scope::Test => "test",
            Scope::System => "system",
            Scope::Import => "import",
        }
    }

    /// Parses a POM `<scope>` value. Unknown values fall back to compile.
    pub fn parse(value: &str) -> Self {
        match value.trim() {
            "runtime" => Scope::Runtime,
            "provided" => Scope::Provided,
            "test" => Scope::Test,
            "system" => Scope::System,
            "import" => Scope::Import,
            _ => Scope::Compile,
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One edge of a dependency path: the artifact plus how it was declared.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Dependency {
    pub coordinate: Coordinate,
    pub scope: Scope,
    pub optional: bool,
    /// Keys this declaration excludes from its own subtree.
    pub exclusions: Vec<CoordinateKey>,
}

impl Dependency {
    pub fn new(coordinate: Coordinate) -> Self {
        Self {
            coordinate,
            scope: Scope::Compile,
            optional: false,
            exclusions: Vec::new(),
        }
    }

    pub fn with_scope(mut self, scope: Scope) -> Self {
        self.scope = scope;
        self
    }

    pub fn optional(mut self, optional: bool) -> Self {
        self.optional = optional;
        self
    }

    pub fn with_exclusions(mut self, exclusions: Vec<CoordinateKey>) -> Self {
        self.exclusions = exclusions;
        self
    }
}

/// A path from a root of the dependency graph to a leaf artifact.
///
/// `root` is `None` for graphs built from several root artifacts; in that case each root
/// appears as the first dependency of its paths.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct DependencyPath {
    root: Option<Coordinate>,
    path: Vec<Dependency>,
}

impl DependencyPath {
    pub fn new(root: Option<Coordinate>) -> Self {
        Self {
            root,
            path: Vec::new(),
        }
    }

    /// Returns a copy of this path extended by `dependency`.
    pub fn append(&self, dependency: Dependency) -> Self {
        let mut copy = self.clone();
        copy.path.push(dependency);
        copy
    }

    /// Returns this path followed by the dependencies of `child`. The child's root is dropped.
    pub fn concat(&self, child: &DependencyPath) -> Self {
        let mut copy = self.clone();
        copy.path.extend(child.path.iter().cloned());
        copy
    }

    /// Number of nodes, counting the root slot.
    pub fn len(&self) -> usize {
        self.path.len() + 1
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_none() && self.path.is_empty()
    }

    pub fn root(&self) -> Option<&Coordinate> {
        self.root.as_ref()
    }

    pub fn dependencies(&self) -> &[Dependency] {
        &self.path
    }

    /// The artifact at the end of the path.
    pub fn leaf(&self) -> Option<&Coordinate> {
        self.path
            .last()
            .map(|dependency| &dependency.coordinate)
            .or(self.root.as_ref())
    }

    /// The artifact at node `i`; node 0 is the root.
    pub fn get(&self, i: usize) -> Option<&Coordinate> {
        if i == 0 {
            self.root.as_ref()
        } else {
            self.path.get(i - 1).map(|dependency| &dependency.coordinate)
        }
    }

    /// Versionless keys of every artifact in the path, root first.
    pub fn artifact_keys(&self) -> Vec<CoordinateKey> {
        self.root
            .iter()
            .chain(self.path.iter().map(|dependency| &dependency.coordinate))
            .map(Coordinate::key)
            .collect()
    }

    /// The path to the parent of the leaf.
    pub fn parent_path(&self) -> Self {
        let mut parent = self.clone();
        parent.path.pop();
        parent
    }

    /// Returns the artifact that declares an exclusion of `key` somewhere on this path.
    ///
    /// An exclusion attached to a dependency is declared by the artifact one level above it.
    pub fn find_exclusion(&self, key: &CoordinateKey) -> Option<&Coordinate> {
        let mut previous = self.root.as_ref();
        for dependency in &self.path {
            if dependency.exclusions.iter().any(|excluded| excluded == key) {
                return previous;
            }
            previous = Some(&dependency.coordinate);
        }
        None
    }

    /// True when any dependency on the path is declared in `key`'s coordinates.
    pub fn contains_key(&self, key: &CoordinateKey) -> bool {
        self.artifact_keys().iter().any(|k| k == key)
    }
}

impl fmt::Display for DependencyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts: Vec<String> = Vec::with_capacity(self.len());
        if let Some(root) = &self.root {
            parts.push(root.to_string());
        }
        for dependency in &self.path {
            let optional = if dependency.optional { ", optional" } else { "" };
            parts.push(format!(
                "{} ({}{})",
                dependency.coordinate, dependency.scope, optional
            ));
        }
        f.write_str(&parts.join(" / "))
    }
}

// ============================================================================
// Symbols
// ============================================================================

/// A method named by a `Methodref` or `InterfaceMethodref` constant.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MethodSymbol {
    pub class_name: String,
    pub name: String,
    pub descriptor: String,
    /// True when the reference came from an `InterfaceMethodref`.
    pub is_interface: bool,
}

impl MethodSymbol {
    pub fn new(
        class_name: impl Into<String>,
        name: impl Into<String>,
        descriptor: impl Into<String>,
        is_interface: bool,
    ) -> Self {
        Self {
            class_name: class_name.into(),
            name: name.into(),
            descriptor: descriptor.into(),
            is_interface,
        }
    }
}

/// A field named by a `Fieldref` constant.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FieldSymbol {
    pub class_name: String,
    pub name: String,
    pub descriptor: String,
}

impl FieldSymbol {
    pub fn new(
        class_name: impl Into<String>,
        name: impl Into<String>,
        descriptor: impl Into<String>,
    ) -> Self {
        Self {
            class_name: class_name.into(),
            name: name.into(),
            descriptor: descriptor.into(),
        }
    }
}

/// A symbolic reference from one class to another class, method, or field.
///
/// Class names are binary names (`com.example.Outer$Inner`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Symbol {
    Class(String),
    /// The class named as the referencing class's superclass.
    SuperClass(String),
    /// A class named as one of the referencing class's direct interfaces.
    SuperInterface(String),
    Method(MethodSymbol),
    Field(FieldSymbol),
}

impl Symbol {
    /// Binary name of the class that owns the symbol.
    pub fn class_name(&self) -> &str {
        match self {
            Symbol::Class(name) | Symbol::SuperClass(name) | Symbol::SuperInterface(name) => name,
            Symbol::Method(method) => &method.class_name,
            Symbol::Field(field) => &field.class_name,
        }
    }

    /// Collapses supertype references into plain class references.
    pub fn normalized(self) -> Self {
        match self {
            Symbol::SuperClass(name) | Symbol::SuperInterface(name) => Symbol::Class(name),
            other => other,
        }
    }

    pub fn is_class_reference(&self) -> bool {
        matches!(
            self,
            Symbol::Class(_) | Symbol::SuperClass(_) | Symbol::SuperInterface(_)
        )
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Symbol::Class(name) | Symbol::SuperClass(name) | Symbol::SuperInterface(name) => {
                write!(f, "Class {}", name)
            }
            Symbol::Method(method) => {
                let parameters = descriptor::parameter_type_names(&method.descriptor)
                    .map(|names| names.join(", "))
                    .unwrap_or_else(|_| method.descriptor.clone());
                write!(
                    f,
                    "{}'s method {}({})",
                    method.class_name, method.name, parameters
                )
            }
            Symbol::Field(field) => write!(f, "{}'s field {}", field.class_name, field.name),
        }
    }
}

// ============================================================================
// Class file locator
// ============================================================================

/// Locates exactly one class definition: the classpath entry plus the binary class name.
#[derive(Debug, Clone)]
pub struct ClassFile {
    entry: Arc<ClasspathEntry>,
    binary_name: String,
}

impl ClassFile {
    pub fn new(entry: Arc<ClasspathEntry>, binary_name: impl Into<String>) -> Self {
        Self {
            entry,
            binary_name: binary_name.into(),
        }
    }

    pub fn entry(&self) -> &Arc<ClasspathEntry> {
        &self.entry
    }

    pub fn binary_name(&self) -> &str {
        &self.binary_name
    }

    /// The class file of the outermost class (`a.B$C$D` -> `a.B`) in the same entry.
    pub fn top_level(&self) -> ClassFile {
        match self.binary_name.split_once('$') {
            Some((outer, _)) if !outer.is_empty() => ClassFile::new(self.entry.clone(), outer),
            _ => self.clone(),
        }
    }
}

impl PartialEq for ClassFile {
    fn eq(&self, other: &Self) -> bool {
        self.binary_name == other.binary_name && self.entry == other.entry
    }
}

impl Eq for ClassFile {}

impl Hash for ClassFile {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.binary_name.hash(state);
        self.entry.hash(state);
    }
}

impl PartialOrd for ClassFile {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ClassFile {
    fn cmp(&self, other: &Self) -> Ordering {
        self.binary_name
            .cmp(&other.binary_name)
            .then_with(|| self.entry.as_ref().cmp(other.entry.as_ref()))
    }
}

impl fmt::Display for ClassFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.binary_name, self.entry)
    }
}

// ============================================================================
// Linkage problems
// ============================================================================

/// The seven kinds of linkage problem.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ProblemKind {
    /// The target class is absent from the classpath.
    ClassNotFound,
    /// The target's shape is incompatible with the reference: class vs interface
    /// mismatch, or an invalid superclass.
    IncompatibleClassChange,
    /// The target class is not accessible from the source class.
    InaccessibleClass,
    /// The target method or field is not accessible from the source class.
    InaccessibleMember,
    /// The target class exists but does not declare or inherit the member.
    SymbolNotFound,
    /// A concrete class does not implement an abstract method of a supertype.
    AbstractMethod,
    /// A method with the same parameters exists but returns a different type.
    ReturnTypeChanged { actual_type: String },
}

impl ProblemKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProblemKind::ClassNotFound => "ClassNotFound",
            ProblemKind::IncompatibleClassChange => "IncompatibleClassChange",
            ProblemKind::InaccessibleClass => "InaccessibleClass",
            ProblemKind::InaccessibleMember => "InaccessibleMember",
            ProblemKind::SymbolNotFound => "SymbolNotFound",
            ProblemKind::AbstractMethod => "AbstractMethod",
            ProblemKind::ReturnTypeChanged { .. } => "ReturnTypeChanged",
        }
    }
}

/// A reference that cannot be validly linked against the classpath.
///
/// Identity is the pair (target symbol, source class file). Kind, target location and
/// cause are derived data, so the same reference reached twice collapses to one problem.
#[derive(Debug, Clone)]
pub struct LinkageProblem {
    kind: ProblemKind,
    symbol: Symbol,
    source: ClassFile,
    target: Option<ClassFile>,
    cause: Option<LinkageProblemCause>,
}

impl LinkageProblem {
    pub fn new(
        kind: ProblemKind,
        symbol: Symbol,
        source: ClassFile,
        target: Option<ClassFile>,
    ) -> Self {
        Self {
            kind,
            symbol: symbol.normalized(),
            source,
            target,
            cause: None,
        }
    }

    pub fn kind(&self) -> &ProblemKind {
        &self.kind
    }

    pub fn symbol(&self) -> &Symbol {
        &self.symbol
    }

    pub fn source(&self) -> &ClassFile {
        &self.source
    }

    /// The class expected to contain the symbol, when it was found.
    pub fn target(&self) -> Option<&ClassFile> {
        self.target.as_ref()
    }

    pub fn cause(&self) -> Option<&LinkageProblemCause> {
        self.cause.as_ref()
    }

    pub fn set_cause(&mut self, cause: LinkageProblemCause) {
        self.cause = Some(cause);
    }

    pub fn with_cause(mut self, cause: LinkageProblemCause) -> Self {
        self.cause = Some(cause);
        self
    }

    /// The message fragment that follows the symbol.
    pub fn message(&self) -> String {
        match &self.kind {
            ProblemKind::ClassNotFound | ProblemKind::SymbolNotFound => "is not found".to_string(),
            ProblemKind::IncompatibleClassChange => "has changed incompatibly".to_string(),
            ProblemKind::InaccessibleClass | ProblemKind::InaccessibleMember => {
                "is not accessible".to_string()
            }
            ProblemKind::AbstractMethod => {
                format!("is not implemented in the class {}", self.source.binary_name())
            }
            ProblemKind::ReturnTypeChanged { actual_type } => format!(
                "is not found. The expected return type does not match actual type {}",
                actual_type
            ),
        }
    }

    /// Describes the problem on the symbol alone, without the source class.
    pub fn format_symbol_problem(&self) -> String {
        match &self.target {
            Some(target) => format!("({}) {} {}", target.entry(), self.symbol, self.message()),
            None => format!("{} {}", self.symbol, self.message()),
        }
    }
}

impl PartialEq for LinkageProblem {
    fn eq(&self, other: &Self) -> bool {
        self.symbol == other.symbol && self.source == other.source
    }
}

impl Eq for LinkageProblem {}

impl Hash for LinkageProblem {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.symbol.hash(state);
        self.source.hash(state);
    }
}

impl PartialOrd for LinkageProblem {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for LinkageProblem {
    fn cmp(&self, other: &Self) -> Ordering {
        self.symbol
            .cmp(&other.symbol)
            .then_with(|| self.source.cmp(&other.source))
    }
}

impl fmt::Display for LinkageProblem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format_symbol_problem())
    }
}

/// Why a linkage problem exists, as diagnosed from the source artifact's own dependencies.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LinkageProblemCause {
    /// The classpath selected a version of an artifact that lacks the symbol, while the
    /// version the source artifact was built against has it.
    DependencyConflict {
        symbol: Symbol,
        selected: DependencyPath,
        unselected: DependencyPath,
    },
    /// The artifact providing the symbol is absent, typically because it sits behind an
    /// optional or provided-scope dependency.
    MissingDependency { path: DependencyPath },
    /// The artifact providing the symbol was excluded by `excluding`.
    ExcludedDependency {
        path: DependencyPath,
        excluding: Coordinate,
    },
    Unknown,
}

impl LinkageProblemCause {
    pub fn as_str(&self) -> &'static str {
        match self {
            LinkageProblemCause::DependencyConflict { .. } => "DependencyConflict",
            LinkageProblemCause::MissingDependency { .. } => "MissingDependency",
            LinkageProblemCause::ExcludedDependency { .. } => "ExcludedDependency",
            LinkageProblemCause::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for LinkageProblemCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkageProblemCause::DependencyConflict {
                symbol,
                selected,
                unselected,
            } => {
                let leaf = |path: &DependencyPath| {
                    path.leaf().map(|c| c.to_string()).unwrap_or_default()
                };
                write!(
                    f,
                    "Dependency conflict: {} (selected for the class path) does not have the symbol \"{}\" but {} (unselected) defines it.\n  selected: {}\n  unselected: {}",
                    leaf(selected),
                    symbol,
                    leaf(unselected),
                    selected,
                    unselected
                )
            }
            LinkageProblemCause::MissingDependency { path } => {
                let mut reason = "";
                // The leaf itself is not part of the reason; only the edges leading to it.
                let edges = path.dependencies();
                for dependency in edges.iter().take(edges.len().saturating_sub(1)) {
                    if dependency.optional {
                        reason = " because the path contains an optional dependency";
                        break;
                    }
                    if dependency.scope == Scope::Provided {
                        reason = " because the path contains a provided-scope dependency";
                        break;
                    }
                }
                let leaf = path.leaf().map(|c| c.to_string()).unwrap_or_default();
                write!(
                    f,
                    "The valid symbol is in {} at {} but it was not selected{}",
                    leaf, path, reason
                )
            }
            LinkageProblemCause::ExcludedDependency { path, excluding } => {
                let leaf = path.leaf();
                write!(
                    f,
                    "The valid symbol is in {} at {} but it was not selected because {} excludes {}.",
                    leaf.map(|c| c.to_string()).unwrap_or_default(),
                    path,
                    excluding,
                    leaf.map(|c| c.key().to_string()).unwrap_or_default()
                )
            }
            LinkageProblemCause::Unknown => f.write_str("Unknown"),
        }
    }
}

// ============================================================================
// Artifact problems
// ============================================================================

/// A dependency-resolution failure. Collected per run; never aborts the analysis.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ArtifactProblem {
    /// The artifact could not be resolved to a file.
    Unresolvable {
        coordinate: Coordinate,
        /// Artifacts from the root down to the unresolved one; empty when unknown.
        path: Vec<Coordinate>,
    },
}

impl ArtifactProblem {
    pub fn coordinate(&self) -> &Coordinate {
        match self {
            ArtifactProblem::Unresolvable { coordinate, .. } => coordinate,
        }
    }
}

impl fmt::Display for ArtifactProblem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArtifactProblem::Unresolvable { coordinate, path } if path.is_empty() => {
                write!(f, "{} was not resolved. Dependency path is unknown.", coordinate)
            }
            ArtifactProblem::Unresolvable { coordinate, path } => {
                let path: Vec<String> = path.iter().map(|c| c.to_string()).collect();
                write!(
                    f,
                    "{} was not resolved. Dependency path: {}",
                    coordinate,
                    path.join(" > ")
                )
            }
        }
    }
}
