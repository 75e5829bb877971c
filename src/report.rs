//! Report rendering.
//!
//! Problems are grouped by their symbol-level description, so one broken symbol referenced
//! from many classes is printed once with every referencing class under it.

use crate::classpath::{ClasspathEntry, ClasspathResult};
use crate::types::{ArtifactProblem, LinkageProblem, LinkageProblemCause};
use indexmap::IndexMap;
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt::Write as _;
use std::sync::Arc;

#[derive(Debug, Serialize)]
pub struct LinkageReport {
    pub problem_count: usize,
    pub groups: Vec<ProblemGroup>,
    pub artifact_problems: Vec<String>,
}

/// Problems sharing one symbol-level description.
#[derive(Debug, Serialize)]
pub struct ProblemGroup {
    pub kind: String,
    pub symbol: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    pub references: Vec<ProblemReference>,
}

#[derive(Debug, Serialize)]
pub struct ProblemReference {
    pub class_name: String,
    pub location: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cause: Option<CauseReport>,
}

#[derive(Debug, Serialize)]
pub struct CauseReport {
    pub kind: String,
    pub message: String,
}

impl From<&LinkageProblemCause> for CauseReport {
    fn from(cause: &LinkageProblemCause) -> Self {
        Self {
            kind: cause.as_str().to_string(),
            message: cause.to_string(),
        }
    }
}

/// Groups problems by `format_symbol_problem`, keeping the set's order.
pub fn group_problems<'a>(
    problems: impl IntoIterator<Item = &'a LinkageProblem>,
) -> IndexMap<String, Vec<&'a LinkageProblem>> {
    let mut groups: IndexMap<String, Vec<&LinkageProblem>> = IndexMap::new();
    for problem in problems {
        groups
            .entry(problem.format_symbol_problem())
            .or_default()
            .push(problem);
    }
    groups
}

pub fn build_report(
    problems: &BTreeSet<LinkageProblem>,
    artifact_problems: &[ArtifactProblem],
) -> LinkageReport {
    let groups = group_problems(problems)
        .into_iter()
        .filter_map(|(message, members)| {
            let first = *members.first()?;
            Some(ProblemGroup {
                kind: first.kind().as_str().to_string(),
                symbol: first.symbol().to_string(),
                message,
                target: first.target().map(|target| target.entry().to_string()),
                references: members
                    .iter()
                    .map(|problem| ProblemReference {
                        class_name: problem.source().binary_name().to_string(),
                        location: problem.source().entry().to_string(),
                        cause: problem.cause().map(CauseReport::from),
                    })
                    .collect(),
            })
        })
        .collect();

    LinkageReport {
        problem_count: problems.len(),
        groups,
        artifact_problems: artifact_problems.iter().map(ToString::to_string).collect(),
    }
}

/// The grouped text form of `problems`.
pub fn format_linkage_problems(problems: &BTreeSet<LinkageProblem>) -> String {
    let mut out = String::new();
    for (message, members) in group_problems(problems) {
        let count = members.len();
        let _ = writeln!(out, "{};", message);
        let _ = writeln!(
            out,
            "  referenced by {} class file{}",
            count,
            if count == 1 { "" } else { "s" }
        );
        for problem in members {
            let _ = writeln!(
                out,
                "    {} ({})",
                problem.source().binary_name(),
                problem.source().entry()
            );
            if let Some(cause) = problem.cause() {
                out.push_str("      Cause:\n");
                for line in cause.to_string().lines() {
                    let _ = writeln!(out, "        {}", line);
                }
            }
        }
    }
    out
}

/// The full text report: problems, then artifact problems, then the dependency paths of
/// the artifacts whose classes have problems.
pub fn format_report(problems: &BTreeSet<LinkageProblem>, classpath: &ClasspathResult) -> String {
    let mut out = String::new();
    if problems.is_empty() {
        out.push_str("No linkage problems found.\n");
    } else {
        out.push_str(&format_linkage_problems(problems));
    }

    if !classpath.artifact_problems.is_empty() {
        out.push('\n');
        for problem in &classpath.artifact_problems {
            let _ = writeln!(out, "{}", problem);
        }
    }

    let mut seen = BTreeSet::new();
    let problematic: Vec<&Arc<ClasspathEntry>> = problems
        .iter()
        .map(|problem| problem.source().entry())
        .filter(|entry| entry.coordinate().is_some())
        .filter(|entry| seen.insert(entry.path().to_path_buf()))
        .collect();
    if !problematic.is_empty() {
        out.push_str("\nProblematic artifacts in the dependency tree:\n");
        out.push_str(&classpath.format_dependency_paths(problematic));
    }
    out
}
