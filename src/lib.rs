// Allow some clippy lints that are too strict for our codebase
#![allow(clippy::collapsible_if)]
#![allow(clippy::too_many_arguments)]
#![allow(clippy::new_without_default)]

//! Linkage Checker
//!
//! Finds binary incompatibilities ("linkage errors") in a JVM classpath without running
//! any code.
//!
//! # Architecture
//!
//! A run moves through four stages:
//!
//! 1. **Classpath assembly**: root artifacts are resolved against local Maven repositories
//!    and mediated (Maven nearest-wins or Gradle highest-wins) into one ordered classpath
//!    annotated with the dependency paths that reached each entry.
//!
//! 2. **Symbol extraction**: every class file is parsed and reduced to the classes,
//!    methods and fields it references.
//!
//! 3. **Linkage resolution**: each reference is resolved across the classpath following the
//!    JVM's lookup and access rules. Failures become [`LinkageProblem`]s.
//!
//! 4. **Filtering and diagnosis**: exclusion rules drop accepted problems, reachability
//!    from the entry points narrows the report, and the cause diagnoser explains each
//!    remaining problem from the source artifact's own dependency tree.
//!
//! # Usage
//!
//! ```ignore
//! use linkage_checker::{CheckerConfig, ClasspathBuilder, ExcludedErrors, LinkageChecker};
//!
//! let classpath = ClasspathBuilder::from_jars(&["app.jar".into(), "lib.jar".into()]);
//! let config = CheckerConfig::default();
//! let checker = LinkageChecker::create(&classpath, &config, ExcludedErrors::default())?;
//! for problem in checker.find_linkage_problems()? {
//!     println!("{}", problem);
//! }
//! ```

pub mod cause;
pub mod checker;
pub mod classfile;
pub mod classpath;
pub mod compatibility;
pub mod config;
pub mod descriptor;
pub mod error;
pub mod exclusion;
pub mod graph;
pub mod mediation;
pub mod report;
pub mod repository;
pub mod resolver;
pub mod symbols;
pub mod types;
pub mod version;

// Re-exports
pub use cause::CauseDiagnoser;
pub use checker::LinkageChecker;
pub use classpath::{AnnotatedClasspath, ClasspathEntry, ClasspathResult};
pub use config::CheckerConfig;
pub use error::{CheckerError, ClassFormatError, LinkageCheckFailed};
pub use exclusion::{ExcludedErrors, ExclusionFile, ExclusionRule, Matcher};
pub use graph::ClassReferenceGraph;
pub use mediation::{DependencyMediation, GradleMediation, MavenMediation, MediationStrategy};
pub use repository::{
    CachingClassRepository, ClassLookup, ClassRepository, NoCachingClassRepository,
};
pub use resolver::{ArtifactResolver, ClasspathBuilder, DependencyGraph, LocalRepositoryResolver};
pub use symbols::SymbolReferences;
pub use types::*;
pub use version::Version;
