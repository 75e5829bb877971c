//! Root-cause diagnosis for linkage problems.
//!
//! A problem is traced back to the dependency tree of its source artifact alone. When that
//! tree resolves the symbol from an artifact that the full classpath selected at another
//! version, or dropped, the difference is the cause.
//!
//! Diagnosis is best-effort: every failure ends in [`LinkageProblemCause::Unknown`].

use crate::checker::LinkageChecker;
use crate::classpath::{ClasspathEntry, ClasspathResult};
use crate::config::CheckerConfig;
use crate::error::CheckerError;
use crate::exclusion::ExcludedErrors;
use crate::resolver::ClasspathBuilder;
use crate::types::{Coordinate, DependencyPath, LinkageProblem, LinkageProblemCause, Symbol};
use dashmap::DashMap;
use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;
use tracing::{debug, warn};

/// The classpath of one artifact's own dependency tree and the problems found in it.
struct Subtree {
    classpath: ClasspathResult,
    /// (symbol, source class) pairs that already fail inside the subtree.
    problems: HashSet<(Symbol, String)>,
}

pub struct CauseDiagnoser {
    builder: ClasspathBuilder,
    config: CheckerConfig,
    /// `None` records a subtree that could not be resolved or checked.
    subtrees: DashMap<Coordinate, Option<Arc<Subtree>>>,
}

impl CauseDiagnoser {
    pub fn new(builder: ClasspathBuilder, config: CheckerConfig) -> Self {
        Self {
            builder,
            config,
            subtrees: DashMap::new(),
        }
    }

    /// Attaches a cause to every problem.
    pub fn annotate(
        &self,
        problems: BTreeSet<LinkageProblem>,
        classpath: &ClasspathResult,
    ) -> BTreeSet<LinkageProblem> {
        problems
            .into_iter()
            .map(|problem| {
                let cause = self.diagnose(&problem, classpath);
                problem.with_cause(cause)
            })
            .collect()
    }

    pub fn diagnose(
        &self,
        problem: &LinkageProblem,
        classpath: &ClasspathResult,
    ) -> LinkageProblemCause {
        match self.try_diagnose(problem, classpath) {
            Ok(cause) => cause,
            Err(err) => {
                warn!(problem = %problem, error = %err, "Failed to diagnose linkage problem");
                LinkageProblemCause::Unknown
            }
        }
    }

    fn try_diagnose(
        &self,
        problem: &LinkageProblem,
        classpath: &ClasspathResult,
    ) -> Result<LinkageProblemCause, CheckerError> {
        let source_entry = problem.source().entry();
        let Some(source_coordinate) = source_entry.coordinate() else {
            return Ok(LinkageProblemCause::Unknown);
        };
        let Some(subtree) = self.subtree(source_coordinate) else {
            return Ok(LinkageProblemCause::Unknown);
        };

        let reference = (
            problem.symbol().clone(),
            problem.source().binary_name().to_string(),
        );
        if subtree.problems.contains(&reference) {
            debug!(problem = %problem, "Problem already exists in the source's own tree");
            return Ok(LinkageProblemCause::Unknown);
        }

        let Some(provider) = find_provider(&subtree.classpath, problem.symbol().class_name())?
        else {
            return Ok(LinkageProblemCause::Unknown);
        };
        let Some(provider_coordinate) = provider.coordinate() else {
            return Ok(LinkageProblemCause::Unknown);
        };
        let Some(unselected) = subtree.classpath.classpath.paths(&provider).first() else {
            return Ok(LinkageProblemCause::Unknown);
        };

        let key = provider_coordinate.key();
        if let Some(selected_entry) = classpath.classpath.entry_for_key(&key) {
            if selected_entry.coordinate() == Some(provider_coordinate) {
                return Ok(LinkageProblemCause::Unknown);
            }
            let selected = classpath
                .classpath
                .paths(selected_entry)
                .first()
                .cloned()
                .unwrap_or_default();
            return Ok(LinkageProblemCause::DependencyConflict {
                symbol: problem.symbol().clone(),
                selected,
                unselected: unselected.clone(),
            });
        }

        let path = match classpath.classpath.paths(source_entry).first() {
            Some(source_path) => join_paths(source_path, unselected),
            None => unselected.clone(),
        };
        Ok(match path.find_exclusion(&key) {
            Some(excluding) => LinkageProblemCause::ExcludedDependency {
                excluding: excluding.clone(),
                path,
            },
            None => LinkageProblemCause::MissingDependency { path },
        })
    }

    /// The memoized subtree for `coordinate`.
    fn subtree(&self, coordinate: &Coordinate) -> Option<Arc<Subtree>> {
        if let Some(cached) = self.subtrees.get(coordinate) {
            return cached.value().clone();
        }
        let subtree = match self.analyze(coordinate) {
            Ok(subtree) => Some(Arc::new(subtree)),
            Err(err) => {
                warn!(artifact = %coordinate, error = %err, "Failed to analyze dependency subtree");
                None
            }
        };
        self.subtrees
            .entry(coordinate.clone())
            .or_insert(subtree)
            .value()
            .clone()
    }

    fn analyze(&self, coordinate: &Coordinate) -> Result<Subtree, CheckerError> {
        let classpath = self.builder.resolve(std::slice::from_ref(coordinate))?;
        let checker = LinkageChecker::create(
            &classpath,
            &self.config,
            ExcludedErrors::with_rules(Vec::new()),
        )?;
        let problems = checker
            .find_linkage_problems()?
            .into_iter()
            .map(|p| (p.symbol().clone(), p.source().binary_name().to_string()))
            .collect();
        Ok(Subtree {
            classpath,
            problems,
        })
    }
}

/// The first entry of `classpath` that defines `class_name`.
fn find_provider(
    classpath: &ClasspathResult,
    class_name: &str,
) -> Result<Option<Arc<ClasspathEntry>>, CheckerError> {
    for entry in classpath.classpath.entries() {
        if entry.defines(class_name)? {
            return Ok(Some(entry.clone()));
        }
    }
    Ok(None)
}

/// `outer` followed by `inner` without inner's first node, which is outer's leaf.
fn join_paths(outer: &DependencyPath, inner: &DependencyPath) -> DependencyPath {
    inner
        .dependencies()
        .iter()
        .skip(1)
        .fold(outer.clone(), |path, dependency| path.append(dependency.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mediation::MavenMediation;
    use crate::resolver::{ArtifactResolver, DependencyGraph};
    use crate::types::{ClassFile, Dependency, ProblemKind};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FailingResolver {
        calls: AtomicUsize,
    }

    impl ArtifactResolver for FailingResolver {
        fn resolve(&self, roots: &[Coordinate]) -> Result<DependencyGraph, CheckerError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(CheckerError::ArtifactNotFound(roots[0].to_string()))
        }

        fn read_bom(&self, bom: &Coordinate) -> Result<Vec<Coordinate>, CheckerError> {
            Err(CheckerError::ArtifactNotFound(bom.to_string()))
        }
    }

    #[test]
    fn resolution_failure_is_unknown_and_memoized() {
        let resolver = Arc::new(FailingResolver {
            calls: AtomicUsize::new(0),
        });
        let builder = ClasspathBuilder::new(resolver.clone(), Arc::new(MavenMediation));
        let diagnoser = CauseDiagnoser::new(builder, CheckerConfig::default());

        let coordinate = Coordinate::new("g", "user", "1");
        let entry = Arc::new(ClasspathEntry::with_coordinate("/user.jar", coordinate));
        let problems: BTreeSet<LinkageProblem> = ["a.One", "a.Two"]
            .into_iter()
            .map(|source| {
                LinkageProblem::new(
                    ProblemKind::ClassNotFound,
                    Symbol::Class("c.Gone".to_string()),
                    ClassFile::new(entry.clone(), source),
                    None,
                )
            })
            .collect();

        let annotated = diagnoser.annotate(problems, &ClasspathResult::default());
        assert!(annotated
            .iter()
            .all(|p| p.cause() == Some(&LinkageProblemCause::Unknown)));
        assert_eq!(resolver.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn problems_without_coordinates_are_unknown() {
        let builder = ClasspathBuilder::new(
            Arc::new(FailingResolver {
                calls: AtomicUsize::new(0),
            }),
            Arc::new(MavenMediation),
        );
        let diagnoser = CauseDiagnoser::new(builder, CheckerConfig::default());
        let problem = LinkageProblem::new(
            ProblemKind::ClassNotFound,
            Symbol::Class("c.Gone".to_string()),
            ClassFile::new(Arc::new(ClasspathEntry::new("/plain.jar")), "a.Foo"),
            None,
        );
        assert_eq!(
            diagnoser.diagnose(&problem, &ClasspathResult::default()),
            LinkageProblemCause::Unknown
        );
    }

    #[test]
    fn joined_path_drops_shared_node() {
        let user = Coordinate::new("g", "user", "1");
        let outer = DependencyPath::new(None)
            .append(Dependency::new(Coordinate::new("g", "app", "1")))
            .append(Dependency::new(user.clone()));
        let inner = DependencyPath::new(None)
            .append(Dependency::new(user))
            .append(Dependency::new(Coordinate::new("g", "lib", "2")).optional(true));
        assert_eq!(
            join_paths(&outer, &inner).to_string(),
            "g:app:1 (compile) / g:user:1 (compile) / g:lib:2 (compile, optional)"
        );
    }
}
