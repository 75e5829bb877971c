//! Error types.
//!
//! Linkage problems are findings, not errors: they live in [`crate::types`]. The
//! types here cover malformed input and run-level failures.

use std::path::PathBuf;
use thiserror::Error;

/// A class file could not be decoded.
#[derive(Debug, Error)]
pub enum ClassFormatError {
    #[error("unexpected end of class file")]
    UnexpectedEof,
    #[error("invalid magic number {0:#010x}")]
    InvalidMagic(u32),
    #[error("unsupported constant pool tag {tag} at index {index}")]
    UnsupportedConstant { tag: u8, index: u16 },
    #[error("constant pool index {index} is out of range")]
    InvalidConstantIndex { index: u16 },
    #[error("constant pool entry {index} is not a {expected}")]
    UnexpectedConstant { index: u16, expected: &'static str },
    #[error("invalid modified UTF-8 in constant pool entry {index}")]
    InvalidUtf8 { index: u16 },
    #[error("invalid descriptor `{0}`")]
    InvalidDescriptor(String),
    #[error("invalid instruction at code offset {offset}")]
    InvalidBytecode { offset: usize },
}

/// A failure that aborts a linkage check run.
#[derive(Debug, Error)]
pub enum CheckerError {
    #[error("the linkage classpath is empty; supply one or more jar files")]
    EmptyClasspath,
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to open archive {path}: {source}")]
    Zip {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },
    #[error("malformed class {class_name} in {location}: {source}")]
    ClassFormat {
        class_name: String,
        location: String,
        #[source]
        source: ClassFormatError,
    },
    #[error("invalid coordinate `{0}`; expected groupId:artifactId[:classifier]:version")]
    InvalidCoordinate(String),
    #[error("invalid exclusion file {path}: {message}")]
    InvalidExclusionFile { path: PathBuf, message: String },
    #[error("invalid POM {path}: {message}")]
    InvalidPom { path: PathBuf, message: String },
    #[error("{0} was not found in any local repository")]
    ArtifactNotFound(String),
}

/// Returned when a check completes but unsuppressed linkage problems remain.
///
/// Callers use this to exit non-zero without the library terminating the process.
#[derive(Debug, Error)]
#[error("found {problem_count} linkage problem{}", if *.problem_count == 1 { "" } else { "s" })]
pub struct LinkageCheckFailed {
    pub problem_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_message_pluralizes() {
        assert_eq!(
            LinkageCheckFailed { problem_count: 1 }.to_string(),
            "found 1 linkage problem"
        );
        assert_eq!(
            LinkageCheckFailed { problem_count: 3 }.to_string(),
            "found 3 linkage problems"
        );
    }
}
