//! Dependency mediation: one artifact version per coordinate key.
//!
//! Input is a dependency graph whose paths are in breadth-first order. Output is the
//! annotated classpath plus artifact problems for selected artifacts without a file.

use crate::classpath::{AnnotatedClasspath, ClasspathEntry, ClasspathResult};
use crate::resolver::DependencyGraph;
use crate::types::{ArtifactProblem, Coordinate, CoordinateKey, Dependency, DependencyPath};
use crate::version::Version;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::debug;

/// Chooses one version per coordinate key.
pub trait DependencyMediation: Send + Sync {
    fn mediate(&self, graph: &DependencyGraph) -> ClasspathResult;
}

/// Which mediation to apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediationStrategy {
    #[default]
    Maven,
    Gradle,
}

impl MediationStrategy {
    pub fn build(
        self,
        enforced_platform: BTreeMap<CoordinateKey, String>,
    ) -> Arc<dyn DependencyMediation> {
        match self {
            MediationStrategy::Maven => Arc::new(MavenMediation),
            MediationStrategy::Gradle => Arc::new(GradleMediation::new(enforced_platform)),
        }
    }
}

impl FromStr for MediationStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "maven" => Ok(MediationStrategy::Maven),
            "gradle" => Ok(MediationStrategy::Gradle),
            other => Err(format!("unknown mediation `{}`; expected maven or gradle", other)),
        }
    }
}

impl fmt::Display for MediationStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediationStrategy::Maven => f.write_str("maven"),
            MediationStrategy::Gradle => f.write_str("gradle"),
        }
    }
}

/// Builds classpath entries for selected paths, reusing one entry per coordinate.
struct ClasspathAssembler<'a> {
    graph: &'a DependencyGraph,
    result: ClasspathResult,
    entries: HashMap<Coordinate, Arc<ClasspathEntry>>,
    reported: HashSet<Coordinate>,
}

impl<'a> ClasspathAssembler<'a> {
    fn new(graph: &'a DependencyGraph) -> Self {
        let result = ClasspathResult {
            classpath: AnnotatedClasspath::new(),
            entry_points: Vec::new(),
            artifact_problems: graph.artifact_problems().to_vec(),
        };
        let reported = result
            .artifact_problems
            .iter()
            .map(|problem| problem.coordinate().clone())
            .collect();
        Self {
            graph,
            result,
            entries: HashMap::new(),
            reported,
        }
    }

    fn add(&mut self, coordinate: &Coordinate, path: &DependencyPath) {
        if let Some(entry) = self.entries.get(coordinate) {
            self.result.classpath.insert(entry.clone(), path.clone());
            return;
        }
        match self.graph.file(coordinate) {
            Some(file) => {
                let entry = Arc::new(ClasspathEntry::with_coordinate(file, coordinate.clone()));
                self.entries.insert(coordinate.clone(), entry.clone());
                self.result.classpath.insert(entry, path.clone());
            }
            None => self.report_unresolvable(coordinate, Some(path)),
        }
    }

    fn report_unresolvable(&mut self, coordinate: &Coordinate, path: Option<&DependencyPath>) {
        if self.reported.insert(coordinate.clone()) {
            let path = path
                .map(|path| {
                    (0..path.len())
                        .filter_map(|i| path.get(i).cloned())
                        .collect()
                })
                .unwrap_or_default();
            self.result.artifact_problems.push(ArtifactProblem::Unresolvable {
                coordinate: coordinate.clone(),
                path,
            });
        }
    }

    fn finish(self) -> ClasspathResult {
        self.result
    }
}

/// The first version of a key met in breadth-first order wins ("nearest wins").
#[derive(Debug, Clone, Copy, Default)]
pub struct MavenMediation;

impl DependencyMediation for MavenMediation {
    fn mediate(&self, graph: &DependencyGraph) -> ClasspathResult {
        let mut assembler = ClasspathAssembler::new(graph);
        let mut selected: HashMap<CoordinateKey, Coordinate> = HashMap::new();

        for path in graph.paths() {
            let Some(leaf) = path.leaf() else {
                continue;
            };
            match selected.get(&leaf.key()) {
                None => {
                    selected.insert(leaf.key(), leaf.clone());
                    assembler.add(leaf, path);
                }
                Some(winner) if winner == leaf => assembler.add(leaf, path),
                Some(winner) => {
                    debug!(dropped = %leaf, selected = %winner, "Maven mediation dropped version");
                }
            }
        }
        assembler.finish()
    }
}

/// The highest version of each key wins, unless an enforced platform pins the key.
#[derive(Debug, Clone, Default)]
pub struct GradleMediation {
    enforced_platform: BTreeMap<CoordinateKey, String>,
}

impl GradleMediation {
    pub fn new(enforced_platform: BTreeMap<CoordinateKey, String>) -> Self {
        Self { enforced_platform }
    }
}

impl DependencyMediation for GradleMediation {
    fn mediate(&self, graph: &DependencyGraph) -> ClasspathResult {
        let mut observed: IndexMap<CoordinateKey, Vec<Coordinate>> = IndexMap::new();
        for path in graph.paths() {
            if let Some(leaf) = path.leaf() {
                let versions = observed.entry(leaf.key()).or_default();
                if !versions.contains(leaf) {
                    versions.push(leaf.clone());
                }
            }
        }

        let mut selected: HashMap<CoordinateKey, Coordinate> = HashMap::new();
        for (key, versions) in &observed {
            let winner = match self.enforced_platform.get(key) {
                Some(version) => versions
                    .iter()
                    .find(|c| &c.version == version)
                    .cloned()
                    .or_else(|| versions.first().map(|c| c.with_version(version.as_str()))),
                None => {
                    let mut best: Option<&Coordinate> = None;
                    for candidate in versions {
                        let better = best.is_none_or(|current| {
                            Version::parse(&candidate.version) > Version::parse(&current.version)
                        });
                        if better {
                            best = Some(candidate);
                        }
                    }
                    best.cloned()
                }
            };
            if let Some(winner) = winner {
                debug!(
                    key = %key,
                    selected = %winner,
                    candidates = versions.len(),
                    "Gradle mediation"
                );
                selected.insert(key.clone(), winner);
            }
        }

        let mut assembler = ClasspathAssembler::new(graph);
        let mut placed: HashSet<CoordinateKey> = HashSet::new();
        for path in graph.paths() {
            let Some(leaf) = path.leaf() else {
                continue;
            };
            let Some(winner) = selected.get(&leaf.key()) else {
                continue;
            };
            if winner == leaf {
                placed.insert(leaf.key());
                assembler.add(leaf, path);
            } else if !placed.contains(&leaf.key()) && !versions_contain(&observed, winner) {
                // An enforced version no path reaches takes the place of the first one seen.
                placed.insert(leaf.key());
                let substituted = match path.dependencies().last() {
                    Some(last) => path.parent_path().append(Dependency {
                        coordinate: winner.clone(),
                        ..last.clone()
                    }),
                    None => path.clone(),
                };
                assembler.add(winner, &substituted);
            }
        }
        assembler.finish()
    }
}

fn versions_contain(
    observed: &IndexMap<CoordinateKey, Vec<Coordinate>>,
    coordinate: &Coordinate,
) -> bool {
    observed
        .get(&coordinate.key())
        .is_some_and(|versions| versions.contains(coordinate))
}
