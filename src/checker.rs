//! Linkage resolution.
//!
//! For every class on the classpath and every symbol it references outside its own
//! classpath entry, the checker resolves the target the way the JVM links it and
//! classifies failures into [`ProblemKind`]s:
//!
//! - class references: presence, superclass validity, class accessibility
//! - method and field references: owner presence, supertype chain presence, member
//!   lookup through the hierarchy, member accessibility, changed return types
//! - concrete classes: every abstract method inherited from another entry is implemented
//!
//! Problems are reported against the top-level class of the referencing class and
//! collected into a `BTreeSet`, so one (symbol, source) pair is reported once no matter
//! how many checks or nested classes reach it.

use crate::classfile::{AccessFlags, ClassInfo, package_of};
use crate::classpath::{ClasspathEntry, ClasspathResult};
use crate::config::CheckerConfig;
use crate::descriptor::{MethodDescriptor, parse_method_descriptor};
use crate::error::CheckerError;
use crate::exclusion::ExcludedErrors;
use crate::graph::ClassReferenceGraph;
use crate::repository::{ClassLoader, ClassLookup, ClassRepository, LoadedClass, class_repository};
use crate::symbols::SymbolReferences;
use crate::types::{ClassFile, FieldSymbol, LinkageProblem, MethodSymbol, ProblemKind, Symbol};
use std::collections::{BTreeSet, HashSet, VecDeque};
use std::sync::Arc;
use tracing::{debug, info, warn};

const METHOD_HANDLE: &str = "java.lang.invoke.MethodHandle";
const NO_CLASS_DEF_FOUND: &str = "java.lang.NoClassDefFoundError";
const MAX_NESTING: usize = 32;

/// Result of checking whether a class can be accessed from a source class.
#[derive(Debug, Clone, PartialEq, Eq)]
enum ClassAccess {
    Accessible,
    Inaccessible,
    /// An enclosing class needed for the check is absent.
    MissingEnclosing(String),
}

/// The superclass chain and all superinterfaces of a class, starting with the class.
#[derive(Debug, Default)]
struct Hierarchy {
    classes: Vec<LoadedClass>,
    /// First supertype that is on neither the classpath nor the JDK.
    missing: Option<String>,
    /// The superclass chain passes through a JDK class that cannot be read.
    opaque_superclass: bool,
    opaque_interface: bool,
}

impl Hierarchy {
    fn is_opaque(&self) -> bool {
        self.opaque_superclass || self.opaque_interface
    }

    fn superclasses(&self) -> impl Iterator<Item = &LoadedClass> {
        self.classes.iter().filter(|class| !class.info.is_interface())
    }
}

/// A class being checked, with its parsed form.
struct SourceClass<'a> {
    file: &'a ClassFile,
    info: Arc<ClassInfo>,
}

/// Finds linkage problems on one classpath.
#[derive(Clone)]
pub struct LinkageChecker {
    repository: Arc<dyn ClassRepository>,
    references: Arc<SymbolReferences>,
    graph: Arc<ClassReferenceGraph>,
    excluded: ExcludedErrors,
    /// Handlers for these types suppress missing-class problems.
    class_guard_types: Vec<String>,
    /// Handlers for these types suppress missing-member problems.
    member_guard_types: Vec<String>,
}

impl LinkageChecker {
    /// Parses the classpath, extracts symbol references and builds the reference graph.
    pub fn create(
        classpath: &ClasspathResult,
        config: &CheckerConfig,
        excluded: ExcludedErrors,
    ) -> Result<Self, CheckerError> {
        let entries = classpath.entries();
        if entries.is_empty() {
            return Err(CheckerError::EmptyClasspath);
        }
        info!(entries = entries.len(), "Creating linkage checker");

        let bootstrap = config
            .bootstrap_classpath
            .iter()
            .map(|path| Arc::new(ClasspathEntry::new(path.clone())))
            .collect();
        let loader = ClassLoader::new(entries.clone(), bootstrap, config.system_packages.clone());
        let repository = class_repository(loader, config.class_cache_capacity);

        let references = SymbolReferences::extract(&entries)?;
        let graph = ClassReferenceGraph::build(&references, &classpath.entry_points)?;
        Ok(Self::new(
            repository,
            references,
            Arc::new(graph),
            excluded,
            &config.defensive_catch_types,
        ))
    }

    pub fn new(
        repository: Arc<dyn ClassRepository>,
        references: SymbolReferences,
        graph: Arc<ClassReferenceGraph>,
        excluded: ExcludedErrors,
        defensive_catch_types: &[String],
    ) -> Self {
        let member_guard_types = defensive_catch_types
            .iter()
            .filter(|t| t.as_str() != NO_CLASS_DEF_FOUND)
            .cloned()
            .collect();
        Self {
            repository,
            references: Arc::new(references),
            graph,
            excluded,
            class_guard_types: defensive_catch_types.to_vec(),
            member_guard_types,
        }
    }

    /// A checker over the same classpath and graph with a different reference map.
    pub fn clone_with(&self, references: SymbolReferences) -> Self {
        Self {
            references: Arc::new(references),
            ..self.clone()
        }
    }

    pub fn references(&self) -> &SymbolReferences {
        &self.references
    }

    pub fn graph(&self) -> &ClassReferenceGraph {
        &self.graph
    }

    pub fn repository(&self) -> &Arc<dyn ClassRepository> {
        &self.repository
    }

    /// Every problem on the classpath that no exclusion rule matches.
    pub fn find_linkage_problems(&self) -> Result<BTreeSet<LinkageProblem>, CheckerError> {
        let mut problems = BTreeSet::new();
        for (file, symbols) in self.references.iter() {
            let Some(info) = self.load_source(file)? else {
                warn!(class = %file, "Source class disappeared from its entry; skipping");
                continue;
            };
            let source = SourceClass { file, info };
            let own_classes = file.entry().class_names()?;

            for symbol in symbols {
                if own_classes.contains(symbol.class_name()) {
                    continue;
                }
                let problem = match symbol {
                    Symbol::Class(_) | Symbol::SuperClass(_) | Symbol::SuperInterface(_) => {
                        self.check_class(&source, symbol)?
                    }
                    Symbol::Method(method) => self.check_method(&source, method)?,
                    Symbol::Field(field) => self.check_field(&source, field)?,
                };
                if let Some(problem) = problem {
                    problems.insert(problem);
                }
            }

            for problem in self.check_abstract_methods(&source)? {
                problems.insert(problem);
            }
        }

        let total = problems.len();
        problems.retain(|problem| !self.excluded.contains(problem));
        info!(
            problems = problems.len(),
            excluded = total - problems.len(),
            "Finished linkage check"
        );
        Ok(problems)
    }

    /// Problems whose source class, or a class nested in it, is reachable from the entry
    /// points.
    pub fn find_reachable_problems(&self) -> Result<BTreeSet<LinkageProblem>, CheckerError> {
        let mut problems = self.find_linkage_problems()?;
        let reachable: HashSet<&str> = self
            .graph
            .reachable_classes()
            .iter()
            .map(|class_name| top_level_name(class_name))
            .collect();
        problems.retain(|problem| reachable.contains(problem.source().binary_name()));
        Ok(problems)
    }

    // ------------------------------------------------------------------------
    // Class references
    // ------------------------------------------------------------------------

    fn check_class(
        &self,
        source: &SourceClass<'_>,
        symbol: &Symbol,
    ) -> Result<Option<LinkageProblem>, CheckerError> {
        let class_name = symbol.class_name();
        let target = match self.repository.find_class(class_name)? {
            ClassLookup::System => return Ok(None),
            ClassLookup::NotFound => {
                // Constants named only by InnerClasses or nest attributes never resolve.
                if matches!(symbol, Symbol::Class(_)) && !source.info.uses_class(class_name) {
                    return Ok(None);
                }
                return self.class_not_found(source, class_name);
            }
            ClassLookup::Found(target) => target,
        };

        let incompatible = match symbol {
            Symbol::SuperClass(_) => target.info.access.is_final() || target.info.is_interface(),
            Symbol::SuperInterface(_) => !target.info.is_interface(),
            _ => false,
        };
        if incompatible {
            return Ok(Some(problem(
                ProblemKind::IncompatibleClassChange,
                symbol.clone(),
                source.file,
                Some(&target),
            )));
        }

        self.check_class_access(source, &target)
    }

    fn class_not_found(
        &self,
        source: &SourceClass<'_>,
        class_name: &str,
    ) -> Result<Option<LinkageProblem>, CheckerError> {
        if self.is_guarded(source, &self.class_guard_types)? {
            debug!(source = %source.file, class = class_name, "Missing class is guarded");
            return Ok(None);
        }
        Ok(Some(problem(
            ProblemKind::ClassNotFound,
            Symbol::Class(class_name.to_string()),
            source.file,
            None,
        )))
    }

    fn check_class_access(
        &self,
        source: &SourceClass<'_>,
        target: &LoadedClass,
    ) -> Result<Option<LinkageProblem>, CheckerError> {
        match self.class_access(&source.info, target)? {
            ClassAccess::Accessible => Ok(None),
            ClassAccess::Inaccessible => Ok(Some(problem(
                ProblemKind::InaccessibleClass,
                Symbol::Class(target.info.name.clone()),
                source.file,
                Some(target),
            ))),
            ClassAccess::MissingEnclosing(outer) => self.class_not_found(source, &outer),
        }
    }

    /// Class accessibility, checking each enclosing class in turn.
    fn class_access(
        &self,
        source: &ClassInfo,
        target: &LoadedClass,
    ) -> Result<ClassAccess, CheckerError> {
        let mut current = target.info.clone();
        for _ in 0..MAX_NESTING {
            let access = current.effective_access();
            let same_package = package_of(&source.name) == current.package_name();
            let accessible = if access.is_public() {
                true
            } else if access.is_private() {
                top_level_name(&source.name) == top_level_name(&current.name)
            } else if access.is_protected() {
                // Nested classes only; also open to subclasses of the enclosing class.
                same_package
                    || match current.enclosing_class() {
                        Some(outer) => self.is_subclass(source, outer)?,
                        None => false,
                    }
            } else {
                same_package
            };
            if !accessible {
                return Ok(ClassAccess::Inaccessible);
            }

            let Some(outer) = current.enclosing_class() else {
                return Ok(ClassAccess::Accessible);
            };
            if outer == current.name {
                return Ok(ClassAccess::Accessible);
            }
            match self.repository.find_class(outer)? {
                ClassLookup::Found(loaded) => current = loaded.info,
                ClassLookup::System => return Ok(ClassAccess::Accessible),
                ClassLookup::NotFound => {
                    return Ok(ClassAccess::MissingEnclosing(outer.to_string()));
                }
            }
        }
        Ok(ClassAccess::Accessible)
    }

    // ------------------------------------------------------------------------
    // Member references
    // ------------------------------------------------------------------------

    fn check_method(
        &self,
        source: &SourceClass<'_>,
        method: &MethodSymbol,
    ) -> Result<Option<LinkageProblem>, CheckerError> {
        if method.class_name.starts_with('[') {
            return Ok(None);
        }
        // Signature-polymorphic; the JVM links any descriptor.
        if method.class_name == METHOD_HANDLE
            && (method.name == "invoke" || method.name == "invokeExact")
        {
            return Ok(None);
        }

        let target = match self.repository.find_class(&method.class_name)? {
            ClassLookup::System => return Ok(None),
            ClassLookup::NotFound => return self.class_not_found(source, &method.class_name),
            ClassLookup::Found(target) => target,
        };
        if let Some(problem) = self.check_class_access(source, &target)? {
            return Ok(Some(problem));
        }

        let symbol = Symbol::Method(method.clone());
        if method.is_interface != target.info.is_interface() {
            return Ok(Some(problem(
                ProblemKind::IncompatibleClassChange,
                symbol,
                source.file,
                Some(&target),
            )));
        }

        let hierarchy = self.hierarchy(&target, true)?;
        if let Some(missing) = &hierarchy.missing {
            return self.class_not_found(source, missing);
        }

        // Constructors are never inherited.
        let candidates: Vec<&LoadedClass> = if method.name == "<init>" {
            hierarchy.classes.iter().take(1).collect()
        } else {
            hierarchy.classes.iter().collect()
        };

        for candidate in &candidates {
            if let Some(found) = candidate.info.find_method(&method.name, &method.descriptor) {
                if self.member_accessible(&source.info, &candidate.info, found.access)? {
                    return Ok(None);
                }
                return Ok(Some(problem(
                    ProblemKind::InaccessibleMember,
                    symbol,
                    source.file,
                    Some(candidate),
                )));
            }
        }
        if hierarchy.is_opaque() {
            return Ok(None);
        }

        // Only after every candidate fails an exact match.
        if let Some(parameters) = MethodDescriptor::parameter_part(&method.descriptor) {
            for candidate in &candidates {
                let changed = candidate.info.methods.iter().find(|m| {
                    m.name == method.name
                        && MethodDescriptor::parameter_part(&m.descriptor) == Some(parameters)
                });
                let actual = changed
                    .and_then(|m| parse_method_descriptor(&m.descriptor).ok())
                    .map(|descriptor| descriptor.return_type_name());
                if let Some(actual_type) = actual {
                    return Ok(Some(problem(
                        ProblemKind::ReturnTypeChanged { actual_type },
                        symbol,
                        source.file,
                        Some(candidate),
                    )));
                }
            }
        }

        self.symbol_not_found(source, symbol, &target)
    }

    fn check_field(
        &self,
        source: &SourceClass<'_>,
        field: &FieldSymbol,
    ) -> Result<Option<LinkageProblem>, CheckerError> {
        let target = match self.repository.find_class(&field.class_name)? {
            ClassLookup::System => return Ok(None),
            ClassLookup::NotFound => return self.class_not_found(source, &field.class_name),
            ClassLookup::Found(target) => target,
        };
        if let Some(problem) = self.check_class_access(source, &target)? {
            return Ok(Some(problem));
        }

        let hierarchy = self.hierarchy(&target, false)?;
        if let Some(missing) = &hierarchy.missing {
            return self.class_not_found(source, missing);
        }

        let symbol = Symbol::Field(field.clone());
        for candidate in hierarchy.superclasses() {
            if let Some(found) = candidate.info.find_field(&field.name) {
                if self.member_accessible(&source.info, &candidate.info, found.access)? {
                    return Ok(None);
                }
                return Ok(Some(problem(
                    ProblemKind::InaccessibleMember,
                    symbol,
                    source.file,
                    Some(candidate),
                )));
            }
        }
        if hierarchy.opaque_superclass {
            return Ok(None);
        }
        self.symbol_not_found(source, symbol, &target)
    }

    fn symbol_not_found(
        &self,
        source: &SourceClass<'_>,
        symbol: Symbol,
        target: &LoadedClass,
    ) -> Result<Option<LinkageProblem>, CheckerError> {
        if self.is_guarded(source, &self.member_guard_types)? {
            debug!(source = %source.file, symbol = %symbol, "Missing member is guarded");
            return Ok(None);
        }
        Ok(Some(problem(
            ProblemKind::SymbolNotFound,
            symbol,
            source.file,
            Some(target),
        )))
    }

    /// Member access per JLS 6.6.1: public, then protected, then private, then package.
    fn member_accessible(
        &self,
        source: &ClassInfo,
        declaring: &ClassInfo,
        access: AccessFlags,
    ) -> Result<bool, CheckerError> {
        let same_package = package_of(&source.name) == declaring.package_name();
        if access.is_public() {
            Ok(true)
        } else if access.is_protected() {
            Ok(same_package || self.is_subclass(source, &declaring.name)?)
        } else if access.is_private() {
            Ok(top_level_name(&source.name) == top_level_name(&declaring.name))
        } else {
            Ok(same_package)
        }
    }

    /// True if `class_name` is a superclass of `source`.
    fn is_subclass(&self, source: &ClassInfo, class_name: &str) -> Result<bool, CheckerError> {
        let mut seen = HashSet::new();
        let mut next = source.super_name.clone();
        while let Some(name) = next {
            if name == class_name {
                return Ok(true);
            }
            if !seen.insert(name.clone()) {
                break;
            }
            next = match self.repository.find_class(&name)? {
                ClassLookup::Found(loaded) => loaded.info.super_name.clone(),
                ClassLookup::System => None,
                ClassLookup::NotFound => {
                    warn!(
                        source = %source.name,
                        class = %name,
                        "Superclass of source is missing; treating protected access as denied"
                    );
                    None
                }
            };
        }
        Ok(false)
    }

    // ------------------------------------------------------------------------
    // Abstract methods
    // ------------------------------------------------------------------------

    /// Abstract methods inherited from other entries that a concrete class leaves
    /// unimplemented.
    fn check_abstract_methods(
        &self,
        source: &SourceClass<'_>,
    ) -> Result<Vec<LinkageProblem>, CheckerError> {
        if source.info.is_interface() || source.info.is_abstract() {
            return Ok(Vec::new());
        }
        let own = LoadedClass {
            info: source.info.clone(),
            location: source.file.clone(),
        };
        let is_foreign = |class: &LoadedClass| {
            class.location.entry() != source.file.entry()
                && !self.repository.is_system_class(&class.info.name)
        };

        let hierarchy = self.hierarchy(&own, true)?;
        let declaring: Vec<&LoadedClass> = hierarchy
            .classes
            .iter()
            .skip(1)
            .filter(|class| class.info.is_interface() || class.info.is_abstract())
            .filter(|class| is_foreign(class))
            .collect();
        if declaring.is_empty() || hierarchy.missing.is_some() || hierarchy.opaque_superclass {
            return Ok(Vec::new());
        }

        let mut problems = Vec::new();
        for class in declaring {
            for method in class.info.methods.iter().filter(|m| m.needs_implementation()) {
                let implemented = hierarchy.classes.iter().any(|candidate| {
                    candidate
                        .info
                        .find_method(&method.name, &method.descriptor)
                        .is_some_and(|m| !m.access.is_abstract())
                });
                if implemented {
                    continue;
                }
                let symbol = Symbol::Method(MethodSymbol::new(
                    class.info.name.as_str(),
                    method.name.as_str(),
                    method.descriptor.as_str(),
                    class.info.is_interface(),
                ));
                problems.push(problem(
                    ProblemKind::AbstractMethod,
                    symbol,
                    source.file,
                    Some(class),
                ));
            }
        }
        Ok(problems)
    }

    // ------------------------------------------------------------------------
    // Lookup helpers
    // ------------------------------------------------------------------------

    /// The superclass chain of `class`, then every superinterface breadth-first.
    ///
    /// With `with_object`, interfaces also see `java.lang.Object`, as interface method
    /// resolution does.
    fn hierarchy(&self, class: &LoadedClass, with_object: bool) -> Result<Hierarchy, CheckerError> {
        let mut hierarchy = Hierarchy {
            classes: vec![class.clone()],
            ..Hierarchy::default()
        };
        let mut seen = HashSet::from([class.info.name.clone()]);

        let mut next = class.info.super_name.clone();
        while let Some(name) = next.take() {
            if !seen.insert(name.clone()) {
                break;
            }
            match self.repository.find_class(&name)? {
                ClassLookup::Found(loaded) => {
                    next = loaded.info.super_name.clone();
                    hierarchy.classes.push(loaded);
                }
                ClassLookup::System => hierarchy.opaque_superclass = true,
                ClassLookup::NotFound => hierarchy.missing = Some(name),
            }
        }

        let mut queue: VecDeque<String> = hierarchy
            .classes
            .iter()
            .flat_map(|c| c.info.interfaces.iter().cloned())
            .collect();
        while let Some(name) = queue.pop_front() {
            if !seen.insert(name.clone()) {
                continue;
            }
            match self.repository.find_class(&name)? {
                ClassLookup::Found(loaded) => {
                    queue.extend(loaded.info.interfaces.iter().cloned());
                    hierarchy.classes.push(loaded);
                }
                ClassLookup::System => hierarchy.opaque_interface = true,
                ClassLookup::NotFound => {
                    hierarchy.missing.get_or_insert(name);
                }
            }
        }

        if with_object && class.info.is_interface() && seen.insert("java.lang.Object".to_string())
        {
            if let ClassLookup::Found(object) = self.repository.find_class("java.lang.Object")? {
                hierarchy.classes.push(object);
            }
        }
        Ok(hierarchy)
    }

    /// The parsed form of `file` itself, even when an earlier entry shadows it.
    fn load_source(&self, file: &ClassFile) -> Result<Option<Arc<ClassInfo>>, CheckerError> {
        if let ClassLookup::Found(loaded) = self.repository.find_class(file.binary_name())? {
            if &loaded.location == file {
                return Ok(Some(loaded.info));
            }
        }
        let Some(bytes) = file.entry().read_class(file.binary_name())? else {
            return Ok(None);
        };
        let info = ClassInfo::parse(&bytes).map_err(|source| CheckerError::ClassFormat {
            class_name: file.binary_name().to_string(),
            location: file.entry().to_string(),
            source,
        })?;
        Ok(Some(Arc::new(info)))
    }

    /// True if the source class, or the top-level class enclosing it, has a handler for
    /// one of `types`.
    fn is_guarded(&self, source: &SourceClass<'_>, types: &[String]) -> Result<bool, CheckerError> {
        if types.is_empty() {
            return Ok(false);
        }
        if source.info.catches_any(types) {
            return Ok(true);
        }
        let top_level = source.file.top_level();
        if &top_level == source.file {
            return Ok(false);
        }
        Ok(self
            .load_source(&top_level)?
            .is_some_and(|info| info.catches_any(types)))
    }
}

/// A problem reported against the top-level class enclosing `source`.
fn problem(
    kind: ProblemKind,
    symbol: Symbol,
    source: &ClassFile,
    target: Option<&LoadedClass>,
) -> LinkageProblem {
    LinkageProblem::new(
        kind,
        symbol,
        source.top_level(),
        target.map(|loaded| loaded.location.clone()),
    )
}

fn top_level_name(class_name: &str) -> &str {
    class_name
        .split_once('$')
        .map(|(outer, _)| outer)
        .filter(|outer| !outer.is_empty())
        .unwrap_or(class_name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classfile::ClassBuilder;
    use crate::resolver::ClasspathBuilder;
    use std::fs::File;
    use std::io::Write;
    use std::path::{Path, PathBuf};
    use zip::write::SimpleFileOptions;

    fn jar(dir: &Path, name: &str, classes: Vec<(&str, ClassBuilder)>) -> PathBuf {
        let path = dir.join(name);
        let mut writer = zip::ZipWriter::new(File::create(&path).unwrap());
        for (class_name, builder) in classes {
            writer
                .start_file(
                    format!("{}.class", class_name.replace('.', "/")),
                    SimpleFileOptions::default(),
                )
                .unwrap();
            writer.write_all(&builder.build()).unwrap();
        }
        writer.finish().unwrap();
        path
    }

    fn checker(jars: &[PathBuf]) -> LinkageChecker {
        let classpath = ClasspathBuilder::from_jars(jars);
        LinkageChecker::create(
            &classpath,
            &CheckerConfig::default(),
            ExcludedErrors::with_rules(Vec::new()),
        )
        .unwrap()
    }

    /// (kind, symbol, source class) of each problem.
    fn summarize(problems: &BTreeSet<LinkageProblem>) -> Vec<(String, String, String)> {
        problems
            .iter()
            .map(|p| {
                (
                    p.kind().as_str().to_string(),
                    p.symbol().to_string(),
                    p.source().binary_name().to_string(),
                )
            })
            .collect()
    }

    fn check(jars: &[PathBuf]) -> Vec<(String, String, String)> {
        summarize(&checker(jars).find_linkage_problems().unwrap())
    }

    fn one(kind: &str, symbol: &str, source: &str) -> Vec<(String, String, String)> {
        vec![(kind.to_string(), symbol.to_string(), source.to_string())]
    }

    #[test]
    fn missing_method_is_symbol_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let app = jar(
            dir.path(),
            "app.jar",
            vec![("a.Foo", ClassBuilder::new("a.Foo").invokes("b.Bar", "method", "()V"))],
        );
        let v1 = jar(
            dir.path(),
            "bar-1.jar",
            vec![(
                "b.Bar",
                ClassBuilder::new("b.Bar").method(
                    AccessFlags::PUBLIC | AccessFlags::STATIC,
                    "method",
                    "()V",
                ),
            )],
        );
        let v2 = jar(dir.path(), "bar-2.jar", vec![("b.Bar", ClassBuilder::new("b.Bar"))]);

        assert!(check(&[app.clone(), v1]).is_empty());
        assert_eq!(
            check(&[app, v2]),
            one("SymbolNotFound", "b.Bar's method method()", "a.Foo")
        );
    }

    #[test]
    fn unimplemented_interface_method() {
        let dir = tempfile::tempdir().unwrap();
        let app = jar(
            dir.path(),
            "app.jar",
            vec![("a.Foo", ClassBuilder::new("a.Foo").interface("b.I"))],
        );
        let lib = jar(
            dir.path(),
            "lib.jar",
            vec![("b.I", ClassBuilder::interface_named("b.I").abstract_method("run", "()V"))],
        );
        let problems = checker(&[app, lib]).find_linkage_problems().unwrap();
        assert_eq!(
            summarize(&problems),
            one("AbstractMethod", "b.I's method run()", "a.Foo")
        );
        let problem = problems.first().unwrap();
        assert_eq!(problem.target().unwrap().binary_name(), "b.I");
        assert_eq!(
            problem.format_symbol_problem(),
            format!(
                "({}) b.I's method run() is not implemented in the class a.Foo",
                problem.target().unwrap().entry()
            )
        );
    }

    #[test]
    fn implemented_or_default_methods_are_fine() {
        let dir = tempfile::tempdir().unwrap();
        let app = jar(
            dir.path(),
            "app.jar",
            vec![
                (
                    "a.Impl",
                    ClassBuilder::new("a.Impl")
                        .interface("b.I")
                        .method(AccessFlags::PUBLIC, "run", "()V"),
                ),
                ("a.UsesDefault", ClassBuilder::new("a.UsesDefault").interface("b.D")),
                (
                    "a.Abstract",
                    ClassBuilder::new("a.Abstract")
                        .access(AccessFlags::PUBLIC | AccessFlags::ABSTRACT)
                        .interface("b.I"),
                ),
            ],
        );
        let lib = jar(
            dir.path(),
            "lib.jar",
            vec![
                ("b.I", ClassBuilder::interface_named("b.I").abstract_method("run", "()V")),
                (
                    "b.D",
                    ClassBuilder::interface_named("b.D").method(AccessFlags::PUBLIC, "run", "()V"),
                ),
            ],
        );
        assert!(check(&[app, lib]).is_empty());
    }

    #[test]
    fn private_nested_class_is_inaccessible() {
        let dir = tempfile::tempdir().unwrap();
        let app = jar(
            dir.path(),
            "app.jar",
            vec![(
                "a.Foo",
                ClassBuilder::new("a.Foo").references_class("b.Outer$Hidden"),
            )],
        );
        let lib = jar(
            dir.path(),
            "lib.jar",
            vec![
                ("b.Outer", ClassBuilder::new("b.Outer")),
                (
                    "b.Outer$Hidden",
                    ClassBuilder::new("b.Outer$Hidden").inner_class(
                        "b.Outer$Hidden",
                        Some("b.Outer"),
                        AccessFlags::PRIVATE | AccessFlags::STATIC,
                    ),
                ),
            ],
        );
        assert_eq!(
            check(&[app, lib]),
            one("InaccessibleClass", "Class b.Outer$Hidden", "a.Foo")
        );
    }

    #[test]
    fn package_private_class_needs_same_package() {
        let dir = tempfile::tempdir().unwrap();
        let app = jar(
            dir.path(),
            "app.jar",
            vec![
                ("a.Foo", ClassBuilder::new("a.Foo").references_class("b.Hidden")),
                ("b.Friend", ClassBuilder::new("b.Friend").references_class("b.Hidden")),
            ],
        );
        let lib = jar(
            dir.path(),
            "lib.jar",
            vec![("b.Hidden", ClassBuilder::new("b.Hidden").access(AccessFlags::SUPER))],
        );
        assert_eq!(
            check(&[app, lib]),
            one("InaccessibleClass", "Class b.Hidden", "a.Foo")
        );
    }

    #[test]
    fn protected_nested_class_needs_package_or_subclass() {
        let dir = tempfile::tempdir().unwrap();
        let app = jar(
            dir.path(),
            "app.jar",
            vec![
                ("a.Foo", ClassBuilder::new("a.Foo").references_class("b.Outer$Prot")),
                (
                    "a.Sub",
                    ClassBuilder::new("a.Sub")
                        .super_class("b.Outer")
                        .references_class("b.Outer$Prot"),
                ),
            ],
        );
        let lib = jar(
            dir.path(),
            "lib.jar",
            vec![
                ("b.Outer", ClassBuilder::new("b.Outer")),
                (
                    "b.Outer$Prot",
                    ClassBuilder::new("b.Outer$Prot").inner_class(
                        "b.Outer$Prot",
                        Some("b.Outer"),
                        AccessFlags::PROTECTED | AccessFlags::STATIC,
                    ),
                ),
            ],
        );
        let other = jar(
            dir.path(),
            "other.jar",
            vec![("b.Neighbor", ClassBuilder::new("b.Neighbor").references_class("b.Outer$Prot"))],
        );
        assert_eq!(
            check(&[app, lib, other]),
            one("InaccessibleClass", "Class b.Outer$Prot", "a.Foo")
        );
    }

    #[test]
    fn nested_sources_collapse_to_their_top_level_class() {
        let dir = tempfile::tempdir().unwrap();
        let app = jar(
            dir.path(),
            "app.jar",
            vec![
                ("a.Foo", ClassBuilder::new("a.Foo").references_class("c.Gone")),
                ("a.Foo$1", ClassBuilder::new("a.Foo$1").references_class("c.Gone")),
                (
                    "a.Foo$Inner",
                    ClassBuilder::new("a.Foo$Inner").invokes("c.AlsoGone", "run", "()V"),
                ),
            ],
        );
        let checker = checker(&[app]);
        let expected = vec![
            (
                "ClassNotFound".to_string(),
                "Class c.AlsoGone".to_string(),
                "a.Foo".to_string(),
            ),
            (
                "ClassNotFound".to_string(),
                "Class c.Gone".to_string(),
                "a.Foo".to_string(),
            ),
        ];
        assert_eq!(summarize(&checker.find_linkage_problems().unwrap()), expected);
        assert_eq!(summarize(&checker.find_reachable_problems().unwrap()), expected);
    }

    #[test]
    fn absent_class_is_reported_regardless_of_reachability() {
        let dir = tempfile::tempdir().unwrap();
        let app = jar(dir.path(), "app.jar", vec![("a.Entry", ClassBuilder::new("a.Entry"))]);
        let lib = jar(
            dir.path(),
            "lib.jar",
            vec![("b.Unused", ClassBuilder::new("b.Unused").references_class("c.Gone"))],
        );
        let mut classpath = ClasspathBuilder::from_jars(&[app.clone(), lib]);
        classpath.entry_points.retain(|entry| entry.path() == app);
        let checker = LinkageChecker::create(
            &classpath,
            &CheckerConfig::default(),
            ExcludedErrors::with_rules(Vec::new()),
        )
        .unwrap();

        assert_eq!(
            summarize(&checker.find_linkage_problems().unwrap()),
            one("ClassNotFound", "Class c.Gone", "b.Unused")
        );
        assert!(checker.find_reachable_problems().unwrap().is_empty());
    }

    #[test]
    fn defensive_catch_suppresses_missing_class() {
        let dir = tempfile::tempdir().unwrap();
        let app = jar(
            dir.path(),
            "app.jar",
            vec![
                (
                    "a.Guarded",
                    ClassBuilder::new("a.Guarded")
                        .references_class("c.Gone")
                        .catches("java.lang.NoClassDefFoundError"),
                ),
                (
                    "a.Guarded$1",
                    ClassBuilder::new("a.Guarded$1").references_class("c.AlsoGone"),
                ),
            ],
        );
        assert!(check(&[app]).is_empty());
    }

    #[test]
    fn no_class_def_found_handler_does_not_hide_missing_members() {
        let dir = tempfile::tempdir().unwrap();
        let lib = jar(dir.path(), "lib.jar", vec![("b.Bar", ClassBuilder::new("b.Bar"))]);
        let narrow = jar(
            dir.path(),
            "narrow.jar",
            vec![(
                "a.Foo",
                ClassBuilder::new("a.Foo")
                    .invokes("b.Bar", "gone", "()V")
                    .catches("java.lang.NoClassDefFoundError"),
            )],
        );
        let broad = jar(
            dir.path(),
            "broad.jar",
            vec![(
                "a.Foo",
                ClassBuilder::new("a.Foo")
                    .invokes("b.Bar", "gone", "()V")
                    .catches("java.lang.LinkageError"),
            )],
        );
        assert_eq!(check(&[narrow, lib.clone()]).len(), 1);
        assert!(check(&[broad, lib]).is_empty());
    }

    #[test]
    fn inner_classes_only_reference_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let app = jar(
            dir.path(),
            "app.jar",
            vec![(
                "a.Foo",
                ClassBuilder::new("a.Foo").inner_class(
                    "c.Gone$Inner",
                    Some("c.Gone"),
                    AccessFlags::PUBLIC | AccessFlags::STATIC,
                ),
            )],
        );
        assert!(check(&[app]).is_empty());
    }

    #[test]
    fn changed_return_type() {
        let dir = tempfile::tempdir().unwrap();
        let app = jar(
            dir.path(),
            "app.jar",
            vec![("a.Foo", ClassBuilder::new("a.Foo").invokes("b.Bar", "value", "()J"))],
        );
        let lib = jar(
            dir.path(),
            "lib.jar",
            vec![(
                "b.Bar",
                ClassBuilder::new("b.Bar").method(
                    AccessFlags::PUBLIC | AccessFlags::STATIC,
                    "value",
                    "()I",
                ),
            )],
        );
        let problems = checker(&[app, lib]).find_linkage_problems().unwrap();
        let problem = problems.first().unwrap();
        assert_eq!(
            problem.kind(),
            &ProblemKind::ReturnTypeChanged {
                actual_type: "int".to_string()
            }
        );
        assert_eq!(problems.len(), 1);
    }

    #[test]
    fn inherited_members_resolve_through_superclass() {
        let dir = tempfile::tempdir().unwrap();
        let app = jar(
            dir.path(),
            "app.jar",
            vec![(
                "a.Foo",
                ClassBuilder::new("a.Foo")
                    .invokes("b.Child", "inherited", "()V")
                    .reads_field("b.Child", "COUNT", "I"),
            )],
        );
        let lib = jar(
            dir.path(),
            "lib.jar",
            vec![
                ("b.Child", ClassBuilder::new("b.Child").super_class("b.Parent")),
                (
                    "b.Parent",
                    ClassBuilder::new("b.Parent")
                        .method(AccessFlags::PUBLIC | AccessFlags::STATIC, "inherited", "()V")
                        .field(AccessFlags::PUBLIC | AccessFlags::STATIC, "COUNT", "I"),
                ),
            ],
        );
        assert!(check(&[app, lib]).is_empty());
    }

    #[test]
    fn missing_ancestor_is_blamed() {
        let dir = tempfile::tempdir().unwrap();
        let app = jar(
            dir.path(),
            "app.jar",
            vec![("a.Foo", ClassBuilder::new("a.Foo").invokes("b.Child", "run", "()V"))],
        );
        let lib = jar(
            dir.path(),
            "lib.jar",
            vec![("b.Child", ClassBuilder::new("b.Child").super_class("c.Parent"))],
        );
        let problems = check(&[app, lib]);
        assert!(problems.contains(&(
            "ClassNotFound".to_string(),
            "Class c.Parent".to_string(),
            "a.Foo".to_string()
        )));
        assert!(!problems.iter().any(|(kind, _, _)| kind == "SymbolNotFound"));
    }

    #[test]
    fn member_access_rules() {
        let dir = tempfile::tempdir().unwrap();
        let app = jar(
            dir.path(),
            "app.jar",
            vec![
                (
                    "a.Sub",
                    ClassBuilder::new("a.Sub")
                        .super_class("b.Base")
                        .invokes("b.Base", "prot", "()V"),
                ),
                (
                    "a.Stranger",
                    ClassBuilder::new("a.Stranger")
                        .invokes("b.Base", "prot", "()V")
                        .invokes("b.Base", "secret", "()V")
                        .reads_field("b.Base", "internal", "I"),
                ),
            ],
        );
        let lib = jar(
            dir.path(),
            "lib.jar",
            vec![(
                "b.Base",
                ClassBuilder::new("b.Base")
                    .method(AccessFlags::PROTECTED | AccessFlags::STATIC, "prot", "()V")
                    .method(AccessFlags::PRIVATE | AccessFlags::STATIC, "secret", "()V")
                    .field(AccessFlags::STATIC, "internal", "I"),
            )],
        );
        let problems = check(&[app, lib]);
        assert_eq!(problems.len(), 3);
        assert!(problems.iter().all(|(kind, _, source)| {
            kind == "InaccessibleMember" && source == "a.Stranger"
        }));
    }

    #[test]
    fn shape_mismatches_are_incompatible_changes() {
        let dir = tempfile::tempdir().unwrap();
        let app = jar(
            dir.path(),
            "app.jar",
            vec![
                ("a.Ext", ClassBuilder::new("a.Ext").super_class("b.Sealed")),
                (
                    "a.Caller",
                    ClassBuilder::new("a.Caller").invokes_interface("b.Plain", "run", "()V"),
                ),
            ],
        );
        let lib = jar(
            dir.path(),
            "lib.jar",
            vec![
                (
                    "b.Sealed",
                    ClassBuilder::new("b.Sealed").access(AccessFlags::PUBLIC | AccessFlags::FINAL),
                ),
                (
                    "b.Plain",
                    ClassBuilder::new("b.Plain").method(AccessFlags::PUBLIC, "run", "()V"),
                ),
            ],
        );
        assert_eq!(
            check(&[app, lib]),
            vec![
                (
                    "IncompatibleClassChange".to_string(),
                    "Class b.Sealed".to_string(),
                    "a.Ext".to_string()
                ),
                (
                    "IncompatibleClassChange".to_string(),
                    "b.Plain's method run()".to_string(),
                    "a.Caller".to_string()
                ),
            ]
        );
    }

    #[test]
    fn supertype_kind_mismatches_are_incompatible_changes() {
        let dir = tempfile::tempdir().unwrap();
        let app = jar(
            dir.path(),
            "app.jar",
            vec![
                ("a.Ext", ClassBuilder::new("a.Ext").super_class("b.I")),
                ("a.Impl", ClassBuilder::new("a.Impl").interface("b.C")),
            ],
        );
        let lib = jar(
            dir.path(),
            "lib.jar",
            vec![
                ("b.I", ClassBuilder::interface_named("b.I")),
                ("b.C", ClassBuilder::new("b.C")),
            ],
        );
        assert_eq!(
            check(&[app, lib]),
            vec![
                (
                    "IncompatibleClassChange".to_string(),
                    "Class b.C".to_string(),
                    "a.Impl".to_string()
                ),
                (
                    "IncompatibleClassChange".to_string(),
                    "Class b.I".to_string(),
                    "a.Ext".to_string()
                ),
            ]
        );
    }

    #[test]
    fn known_jdk_supertypes_do_not_hide_missing_members() {
        let dir = tempfile::tempdir().unwrap();
        let app = jar(
            dir.path(),
            "app.jar",
            vec![(
                "a.Foo",
                ClassBuilder::new("a.Foo")
                    .invokes("b.Bar", "method", "()V")
                    .invokes("b.Oops", "getMessage", "()Ljava/lang/String;")
                    .invokes("b.Oops", "missing", "()V")
                    .invokes("b.Worker", "start", "()V"),
            )],
        );
        let lib = jar(
            dir.path(),
            "lib.jar",
            vec![
                ("b.Bar", ClassBuilder::new("b.Bar").interface("java.io.Serializable")),
                ("b.Oops", ClassBuilder::new("b.Oops").super_class("java.lang.RuntimeException")),
                // Thread is not described, so its members stay unknown.
                ("b.Worker", ClassBuilder::new("b.Worker").super_class("java.lang.Thread")),
            ],
        );
        assert_eq!(
            check(&[app, lib]),
            vec![
                (
                    "SymbolNotFound".to_string(),
                    "b.Bar's method method()".to_string(),
                    "a.Foo".to_string()
                ),
                (
                    "SymbolNotFound".to_string(),
                    "b.Oops's method missing()".to_string(),
                    "a.Foo".to_string()
                ),
            ]
        );
    }

    #[test]
    fn jdk_and_polymorphic_references_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let app = jar(
            dir.path(),
            "app.jar",
            vec![(
                "a.Foo",
                ClassBuilder::new("a.Foo")
                    .invokes("java.util.Collections", "madeUp", "()V")
                    .invokes(METHOD_HANDLE, "invokeExact", "(I)I")
                    .invokes("[Ljava/lang/String;", "clone", "()Ljava/lang/Object;")
                    .references_class("javax.net.ssl.SSLContext"),
            )],
        );
        assert!(check(&[app]).is_empty());
    }

    #[test]
    fn repeated_runs_agree_and_clone_with_drops_sources() {
        let dir = tempfile::tempdir().unwrap();
        let app = jar(
            dir.path(),
            "app.jar",
            vec![
                ("a.One", ClassBuilder::new("a.One").references_class("c.Gone")),
                ("a.Two", ClassBuilder::new("a.Two").invokes("c.Gone", "run", "()V")),
            ],
        );
        let checker = checker(&[app]);
        let first = checker.find_linkage_problems().unwrap();
        assert_eq!(first, checker.find_linkage_problems().unwrap());
        assert_eq!(first.len(), 2);

        let mut references = SymbolReferences::new();
        for (source, symbols) in checker.references().iter() {
            if source.binary_name() == "a.One" {
                references.insert_all(source.clone(), symbols.iter().cloned());
            }
        }
        let narrowed = checker.clone_with(references).find_linkage_problems().unwrap();
        assert_eq!(
            summarize(&narrowed),
            one("ClassNotFound", "Class c.Gone", "a.One")
        );
    }

    #[test]
    fn empty_classpath_is_an_error() {
        let result = LinkageChecker::create(
            &ClasspathResult::default(),
            &CheckerConfig::default(),
            ExcludedErrors::default(),
        );
        assert!(matches!(result, Err(CheckerError::EmptyClasspath)));
    }
}
