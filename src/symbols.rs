//! Symbol extraction.
//!
//! Every class on the classpath is parsed once and reduced to the set of symbols it
//! references. The result is a multimap from source class file to symbols, built once per
//! classpath and not mutated afterwards.

use crate::classfile::{ClassInfo, MemberRef};
use crate::classpath::ClasspathEntry;
use crate::error::CheckerError;
use crate::types::{ClassFile, FieldSymbol, MethodSymbol, Symbol};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::{debug, info};

/// Symbols referenced by each class file.
#[derive(Debug, Clone, Default)]
pub struct SymbolReferences {
    references: BTreeMap<ClassFile, BTreeSet<Symbol>>,
}

impl SymbolReferences {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses every class of every entry.
    pub fn extract(entries: &[Arc<ClasspathEntry>]) -> Result<Self, CheckerError> {
        let mut references = SymbolReferences::new();
        for entry in entries {
            let classes = entry.read_all_classes()?;
            debug!(entry = %entry, classes = classes.len(), "Extracting symbols");
            for (class_name, bytes) in classes {
                let info = ClassInfo::parse(&bytes).map_err(|source| CheckerError::ClassFormat {
                    class_name: class_name.clone(),
                    location: entry.to_string(),
                    source,
                })?;
                references.insert_all(
                    ClassFile::new(entry.clone(), class_name),
                    symbols_of(&info),
                );
            }
        }
        info!(
            classes = references.len(),
            symbols = references.symbol_count(),
            "Extracted symbol references"
        );
        Ok(references)
    }

    pub fn insert(&mut self, source: ClassFile, symbol: Symbol) {
        self.references.entry(source).or_default().insert(symbol);
    }

    pub fn insert_all(&mut self, source: ClassFile, symbols: impl IntoIterator<Item = Symbol>) {
        self.references.entry(source).or_default().extend(symbols);
    }

    pub fn get(&self, source: &ClassFile) -> Option<&BTreeSet<Symbol>> {
        self.references.get(source)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ClassFile, &BTreeSet<Symbol>)> {
        self.references.iter()
    }

    pub fn sources(&self) -> impl Iterator<Item = &ClassFile> {
        self.references.keys()
    }

    /// Number of source class files.
    pub fn len(&self) -> usize {
        self.references.len()
    }

    pub fn is_empty(&self) -> bool {
        self.references.is_empty()
    }

    pub fn symbol_count(&self) -> usize {
        self.references.values().map(BTreeSet::len).sum()
    }

    /// The references made by every class except those in `entry`.
    pub fn without_entry(&self, entry: &ClasspathEntry) -> Self {
        Self {
            references: self
                .references
                .iter()
                .filter(|(source, _)| source.entry().as_ref() != entry)
                .map(|(source, symbols)| (source.clone(), symbols.clone()))
                .collect(),
        }
    }
}

/// Symbols referenced by one parsed class.
///
/// The superclass and interfaces become supertype symbols, every other Class constant a
/// class symbol, and member reference constants method or field symbols. The class never
/// references itself.
pub fn symbols_of(info: &ClassInfo) -> BTreeSet<Symbol> {
    let mut symbols = BTreeSet::new();
    if let Some(super_name) = &info.super_name {
        symbols.insert(Symbol::SuperClass(super_name.clone()));
    }
    for interface in &info.interfaces {
        symbols.insert(Symbol::SuperInterface(interface.clone()));
    }
    for constant in &info.class_constants {
        if constant.class_name != info.name
            && info.super_name.as_deref() != Some(constant.class_name.as_str())
            && !info.interfaces.contains(&constant.class_name)
        {
            symbols.insert(Symbol::Class(constant.class_name.clone()));
        }
    }
    for member in &info.member_refs {
        let symbol = match member {
            MemberRef::Method {
                class_name,
                name,
                descriptor,
                interface,
            } => Symbol::Method(MethodSymbol::new(
                class_name.as_str(),
                name.as_str(),
                descriptor.as_str(),
                *interface,
            )),
            MemberRef::Field {
                class_name,
                name,
                descriptor,
            } => Symbol::Field(FieldSymbol::new(
                class_name.as_str(),
                name.as_str(),
                descriptor.as_str(),
            )),
        };
        symbols.insert(symbol);
    }
    symbols
}
