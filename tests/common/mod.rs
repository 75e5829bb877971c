//! Fixtures shared by the integration tests: jars built from synthetic class files and a
//! Maven-layout repository in a temp directory.

#![allow(dead_code)]

use linkage_checker::classfile::ClassBuilder;
use linkage_checker::{Coordinate, LocalRepositoryResolver};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use zip::write::SimpleFileOptions;

/// Writes a jar holding `classes` to `dir/name`.
pub fn jar(dir: &Path, name: &str, classes: Vec<(&str, ClassBuilder)>) -> PathBuf {
    let path = dir.join(name);
    write_jar(&path, classes);
    path
}

fn write_jar(path: &Path, classes: Vec<(&str, ClassBuilder)>) {
    let mut writer = zip::ZipWriter::new(File::create(path).unwrap());
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
}

/// A local Maven repository rooted in a temp directory.
pub struct Repo {
    dir: tempfile::TempDir,
}

impl Repo {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().unwrap(),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    fn artifact_dir(&self, coordinate: &str) -> (PathBuf, Coordinate) {
        let c: Coordinate = coordinate.parse().unwrap();
        let dir = self
            .dir
            .path()
            .join(c.group.replace('.', "/"))
            .join(&c.artifact)
            .join(&c.version);
        fs::create_dir_all(&dir).unwrap();
        (dir, c)
    }

    /// Writes a POM whose project element holds `body`.
    pub fn pom(&self, coordinate: &str, body: &str) {
        let (dir, c) = self.artifact_dir(coordinate);
        let xml = format!(
            "<project><groupId>{}</groupId><artifactId>{}</artifactId><version>{}</version>{}</project>",
            c.group, c.artifact, c.version, body
        );
        fs::write(dir.join(format!("{}-{}.pom", c.artifact, c.version)), xml).unwrap();
    }

    /// Publishes an artifact with the given dependency elements and classes.
    pub fn artifact(
        &self,
        coordinate: &str,
        dependencies: &str,
        classes: Vec<(&str, ClassBuilder)>,
    ) {
        self.pom(coordinate, &format!("<dependencies>{}</dependencies>", dependencies));
        let (dir, c) = self.artifact_dir(coordinate);
        write_jar(&dir.join(format!("{}-{}.jar", c.artifact, c.version)), classes);
    }

    /// Publishes a BOM managing `managed`.
    pub fn bom(&self, coordinate: &str, managed: &[&str]) {
        let dependencies: String = managed.iter().map(|c| dep(c, "")).collect();
        self.pom(
            coordinate,
            &format!(
                "<packaging>pom</packaging><dependencyManagement><dependencies>{}</dependencies></dependencyManagement>",
                dependencies
            ),
        );
    }

    pub fn resolver(&self) -> LocalRepositoryResolver {
        LocalRepositoryResolver::new(vec![self.dir.path().to_path_buf()])
    }
}

/// A `<dependency>` element for `coordinate` with `extra` child elements.
pub fn dep(coordinate: &str, extra: &str) -> String {
    let c: Coordinate = coordinate.parse().unwrap();
    format!(
        "<dependency><groupId>{}</groupId><artifactId>{}</artifactId><version>{}</version>{}</dependency>",
        c.group, c.artifact, c.version, extra
    )
}

/// An `<exclusions>` element excluding `group:artifact`.
pub fn excluding(key: &str) -> String {
    let (group, artifact) = key.split_once(':').unwrap();
    format!(
        "<exclusions><exclusion><groupId>{}</groupId><artifactId>{}</artifactId></exclusion></exclusions>",
        group, artifact
    )
}
