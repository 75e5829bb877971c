//! Pairwise compatibility of artifacts.
//!
//! Each artifact is checked alone, then every unordered pair together. A pair's count is
//! the number of problems that appear only when both artifacts share one classpath.

use crate::checker::LinkageChecker;
use crate::config::CheckerConfig;
use crate::error::CheckerError;
use crate::exclusion::ExcludedErrors;
use crate::resolver::ClasspathBuilder;
use crate::types::{Coordinate, LinkageProblem};
use anyhow::{Context, Result};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use tokio::task;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct PairResult {
    pub first: String,
    pub second: String,
    /// Problems in the combined classpath that neither artifact has alone.
    pub problem_count: usize,
}

/// Checks every pair of `artifacts`, running up to `concurrency` analyses at once.
pub async fn check_pairs(
    builder: ClasspathBuilder,
    config: CheckerConfig,
    artifacts: Vec<Coordinate>,
    concurrency: usize,
) -> Result<Vec<PairResult>> {
    let excluded = match &config.exclusion_file {
        Some(path) => ExcludedErrors::from_file(path)?,
        None => ExcludedErrors::default(),
    };

    let singles = artifacts.iter().map(|a| vec![a.clone()]).collect();
    let single_problems: HashMap<Coordinate, BTreeSet<LinkageProblem>> =
        run_analyses(&builder, &config, &excluded, singles, concurrency)
            .await?
            .into_iter()
            .filter_map(|(roots, problems)| Some((roots.into_iter().next()?, problems)))
            .collect();

    let mut pairs = Vec::new();
    for (i, first) in artifacts.iter().enumerate() {
        for second in &artifacts[i + 1..] {
            pairs.push(vec![first.clone(), second.clone()]);
        }
    }
    info!(artifacts = artifacts.len(), pairs = pairs.len(), "Checking artifact pairs");

    let empty = BTreeSet::new();
    let analyses = run_analyses(&builder, &config, &excluded, pairs, concurrency).await?;
    let mut results: Vec<PairResult> = analyses
        .into_iter()
        .filter_map(|(roots, problems)| {
            let [first, second] = <[Coordinate; 2]>::try_from(roots).ok()?;
            let alone_first = single_problems.get(&first).unwrap_or(&empty);
            let alone_second = single_problems.get(&second).unwrap_or(&empty);
            let problem_count = problems
                .iter()
                .filter(|p| !alone_first.contains(*p) && !alone_second.contains(*p))
                .count();
            Some(PairResult {
                first: first.to_string(),
                second: second.to_string(),
                problem_count,
            })
        })
        .collect();
    results.sort();
    Ok(results)
}

async fn run_analyses(
    builder: &ClasspathBuilder,
    config: &CheckerConfig,
    excluded: &ExcludedErrors,
    jobs: Vec<Vec<Coordinate>>,
    concurrency: usize,
) -> Result<Vec<(Vec<Coordinate>, BTreeSet<LinkageProblem>)>> {
    let results: Vec<Result<_>> = stream::iter(jobs.into_iter().map(|roots| {
        let builder = builder.clone();
        let config = config.clone();
        let excluded = excluded.clone();
        async move {
            let job = roots.clone();
            let problems = task::spawn_blocking(move || analyze(&builder, &config, excluded, &job))
                .await
                .context("Analysis task panicked")?
                .with_context(|| format!("Failed to check {}", describe(&roots)))?;
            Ok((roots, problems))
        }
    }))
    .buffer_unordered(concurrency.max(1))
    .collect()
    .await;
    results.into_iter().collect()
}

/// One analysis with its own class cache.
fn analyze(
    builder: &ClasspathBuilder,
    config: &CheckerConfig,
    excluded: ExcludedErrors,
    roots: &[Coordinate],
) -> Result<BTreeSet<LinkageProblem>, CheckerError> {
    let classpath = builder.resolve(roots)?;
    LinkageChecker::create(&classpath, config, excluded)?.find_linkage_problems()
}

fn describe(roots: &[Coordinate]) -> String {
    roots
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" + ")
}
