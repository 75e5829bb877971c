//! Exclusion rules for known or accepted linkage problems.
//!
//! A rule pairs an optional source matcher with an optional target matcher. Each side is a
//! disjunction of leaf matchers; a missing side matches everything. A problem is excluded
//! when any rule matches it.
//!
//! Rules are read from XML files of this shape:
//!
//! ```xml
//! <LinkageCheckerFilter>
//!   <LinkageError>
//!     <Target><Class name="com.example.Gone"/></Target>
//!     <Source><Package name="com.example.legacy"/></Source>
//!     <Reason>Only loaded on Java 8.</Reason>
//!   </LinkageError>
//! </LinkageCheckerFilter>
//! ```

use crate::error::CheckerError;
use crate::types::{ClassFile, LinkageProblem, Symbol};
use anyhow::{Context, Result};
use std::collections::BTreeSet;
use std::fmt::Write as _;
use std::fs;
use std::path::Path;

/// Namespace written to, and accepted in, exclusion files.
pub const EXCLUSION_NAMESPACE: &str =
    "https://www.github.com/GoogleCloudPlatform/cloud-opensource-java/linkage-checker-exclusion";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Matcher {
    /// Classes in the package or its subpackages.
    Package(String),
    Class(String),
    Method { class_name: String, name: String },
    Field { class_name: String, name: String },
}

impl Matcher {
    fn matches_source(&self, source: &ClassFile) -> bool {
        match self {
            Matcher::Package(package) => source.binary_name().starts_with(package.as_str()),
            Matcher::Class(class_name) => {
                source.binary_name() == class_name
                    || source.top_level().binary_name() == class_name
            }
            Matcher::Method { .. } | Matcher::Field { .. } => false,
        }
    }

    fn matches_target(&self, symbol: &Symbol) -> bool {
        match (self, symbol) {
            (Matcher::Package(package), _) => symbol
                .class_name()
                .strip_prefix(package.as_str())
                .is_some_and(|rest| rest.starts_with('.')),
            (Matcher::Class(class_name), _) => symbol.class_name() == class_name,
            (Matcher::Method { class_name, name }, Symbol::Method(method)) => {
                &method.class_name == class_name && &method.name == name
            }
            (Matcher::Field { class_name, name }, Symbol::Field(field)) => {
                &field.class_name == class_name && &field.name == name
            }
            _ => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ExclusionRule {
    pub source: Option<Vec<Matcher>>,
    pub target: Option<Vec<Matcher>>,
    pub reason: Option<String>,
}

impl ExclusionRule {
    pub fn new(source: Option<Vec<Matcher>>, target: Option<Vec<Matcher>>) -> Self {
        Self {
            source,
            target,
            reason: None,
        }
    }

    pub fn matches(&self, problem: &LinkageProblem) -> bool {
        let source_matches = self.source.as_ref().is_none_or(|matchers| {
            matchers
                .iter()
                .any(|matcher| matcher.matches_source(problem.source()))
        });
        let target_matches = self.target.as_ref().is_none_or(|matchers| {
            matchers
                .iter()
                .any(|matcher| matcher.matches_target(problem.symbol()))
        });
        source_matches && target_matches
    }
}

/// The active rule set: built-in rules plus any loaded from files.
#[derive(Debug, Clone)]
pub struct ExcludedErrors {
    rules: Vec<ExclusionRule>,
}

impl Default for ExcludedErrors {
    fn default() -> Self {
        Self {
            rules: default_rules(),
        }
    }
}

impl ExcludedErrors {
    /// Built-in rules plus the rules of `path`.
    pub fn from_file(path: &Path) -> Result<Self, CheckerError> {
        let mut excluded = Self::default();
        excluded.rules.extend(ExclusionFile::parse(path)?);
        Ok(excluded)
    }

    /// Only the given rules, without the built-in ones.
    pub fn with_rules(rules: Vec<ExclusionRule>) -> Self {
        Self { rules }
    }

    pub fn add_rules(&mut self, rules: impl IntoIterator<Item = ExclusionRule>) {
        self.rules.extend(rules);
    }

    pub fn rules(&self) -> &[ExclusionRule] {
        &self.rules
    }

    pub fn contains(&self, problem: &LinkageProblem) -> bool {
        self.rules.iter().any(|rule| rule.matches(problem))
    }
}

/// Rules for well-known false positives in widely used libraries.
fn default_rules() -> Vec<ExclusionRule> {
    let package = |name: &str| Matcher::Package(name.to_string());
    let class = |name: &str| Matcher::Class(name.to_string());
    vec![
        // Compiled against a newer JDK and only loaded there.
        ExclusionRule::new(Some(vec![class("reactor.core.publisher.Traces")]), None),
        ExclusionRule::new(
            Some(vec![
                package("com.oracle.svm"),
                package("com.oracle.graal"),
                package("org.graalvm"),
            ]),
            Some(vec![package("jdk.vm.ci")]),
        ),
        // Injected into the bootstrap class loader at runtime.
        ExclusionRule::new(
            Some(vec![package("org.mockito.internal.creation.bytebuddy")]),
            Some(vec![class(
                "org.mockito.internal.creation.bytebuddy.MockMethodDispatcher",
            )]),
        ),
    ]
}

// ============================================================================
// Exclusion file I/O
// ============================================================================

pub struct ExclusionFile;

impl ExclusionFile {
    pub fn parse(path: &Path) -> Result<Vec<ExclusionRule>, CheckerError> {
        let contents = fs::read_to_string(path).map_err(|source| CheckerError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse_str(&contents).map_err(|message| CheckerError::InvalidExclusionFile {
            path: path.to_path_buf(),
            message,
        })
    }

    pub fn parse_str(contents: &str) -> Result<Vec<ExclusionRule>, String> {
        let doc = roxmltree::Document::parse(contents).map_err(|err| err.to_string())?;
        let root = doc.root_element();
        check_element(&root, &["LinkageCheckerFilter"])?;

        let mut rules = Vec::new();
        for error in root.children().filter(|n| n.is_element()) {
            check_element(&error, &["LinkageError"])?;
            let mut rule = ExclusionRule::default();
            for section in error.children().filter(|n| n.is_element()) {
                check_element(&section, &["Source", "Target", "Reason"])?;
                match section.tag_name().name() {
                    "Source" => {
                        if rule.source.is_some() {
                            return Err("duplicate <Source> in <LinkageError>".to_string());
                        }
                        rule.source = Some(parse_matchers(&section, false)?);
                    }
                    "Target" => {
                        if rule.target.is_some() {
                            return Err("duplicate <Target> in <LinkageError>".to_string());
                        }
                        rule.target = Some(parse_matchers(&section, true)?);
                    }
                    _ => rule.reason = section.text().map(|t| t.trim().to_string()),
                }
            }
            rules.push(rule);
        }
        Ok(rules)
    }

    /// Writes one rule per problem, so that a later run with this file reports nothing.
    pub fn write<'a>(
        path: &Path,
        problems: impl IntoIterator<Item = &'a LinkageProblem>,
    ) -> Result<()> {
        fs::write(path, Self::render(problems))
            .with_context(|| format!("Failed to write exclusion file: {}", path.display()))
    }

    pub fn render<'a>(problems: impl IntoIterator<Item = &'a LinkageProblem>) -> String {
        let rules: BTreeSet<(String, String)> = problems
            .into_iter()
            .map(|problem| {
                let target = match problem.symbol() {
                    Symbol::Method(method) => format!(
                        "<Method className=\"{}\" name=\"{}\"/>",
                        escape(&method.class_name),
                        escape(&method.name)
                    ),
                    Symbol::Field(field) => format!(
                        "<Field className=\"{}\" name=\"{}\"/>",
                        escape(&field.class_name),
                        escape(&field.name)
                    ),
                    other => format!("<Class name=\"{}\"/>", escape(other.class_name())),
                };
                let source = format!(
                    "<Class name=\"{}\"/>",
                    escape(problem.source().binary_name())
                );
                (target, source)
            })
            .collect();

        let mut out = String::new();
        out.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
        let _ = writeln!(out, "<LinkageCheckerFilter xmlns=\"{}\">", EXCLUSION_NAMESPACE);
        for (target, source) in rules {
            out.push_str("  <LinkageError>\n");
            let _ = writeln!(out, "    <Target>{}</Target>", target);
            let _ = writeln!(out, "    <Source>{}</Source>", source);
            out.push_str("  </LinkageError>\n");
        }
        out.push_str("</LinkageCheckerFilter>\n");
        out
    }
}

fn check_element(node: &roxmltree::Node<'_, '_>, allowed: &[&str]) -> Result<(), String> {
    let tag = node.tag_name();
    if let Some(namespace) = tag.namespace() {
        if namespace != EXCLUSION_NAMESPACE {
            return Err(format!("unexpected namespace {} on <{}>", namespace, tag.name()));
        }
    }
    if allowed.contains(&tag.name()) {
        Ok(())
    } else {
        Err(format!(
            "unexpected element <{}>; expected one of {}",
            tag.name(),
            allowed.join(", ")
        ))
    }
}

fn parse_matchers(
    section: &roxmltree::Node<'_, '_>,
    is_target: bool,
) -> Result<Vec<Matcher>, String> {
    let attribute = |node: &roxmltree::Node<'_, '_>, name: &str| {
        node.attribute(name)
            .map(str::to_string)
            .ok_or_else(|| format!("<{}> requires a {} attribute", node.tag_name().name(), name))
    };
    let allowed: &[&str] = if is_target {
        &["Package", "Class", "Method", "Field"]
    } else {
        &["Package", "Class"]
    };

    let mut matchers = Vec::new();
    for node in section.children().filter(|n| n.is_element()) {
        check_element(&node, allowed)?;
        let matcher = match node.tag_name().name() {
            "Package" => Matcher::Package(attribute(&node, "name")?),
            "Class" => Matcher::Class(attribute(&node, "name")?),
            "Method" => Matcher::Method {
                class_name: attribute(&node, "className")?,
                name: attribute(&node, "name")?,
            },
            _ => Matcher::Field {
                class_name: attribute(&node, "className")?,
                name: attribute(&node, "name")?,
            },
        };
        matchers.push(matcher);
    }
    if matchers.is_empty() {
        return Err(format!("<{}> has no matchers", section.tag_name().name()));
    }
    Ok(matchers)
}

fn escape(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
