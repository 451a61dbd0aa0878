use std::path::{Path, PathBuf};

use pw_core::{GameRules, SkeletonKey, ValidationReport, World, validate};
use walkdir::WalkDir;

use crate::applier::{LoadSummary, PackageApplier};
use crate::config::LoaderConfig;
use crate::document::Document;
use crate::error::LoadError;
use crate::scheduler::schedule;

/// One row of the computed load order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleEntry {
    /// Package label.
    pub package: String,
    /// File the document came from, relative to the content root.
    pub origin: Option<PathBuf>,
    /// Load priority.
    pub priority: i32,
    /// Dependency score.
    pub score: usize,
    /// Position in discovery order.
    pub discovery: usize,
}

/// Everything a load produced besides the world itself.
#[derive(Debug, Default)]
pub struct LoadReport {
    /// Counts per kind and per outcome.
    pub summary: LoadSummary,
    /// Documents in the order they were applied.
    pub schedule: Vec<ScheduleEntry>,
    /// Documents that failed without stopping the load.
    pub failures: Vec<LoadError>,
    /// Structural validation result, when validation ran.
    pub validation: Option<ValidationReport>,
    /// The rules document, when one was found.
    pub rules_file: Option<PathBuf>,
}

/// Files found under a content directory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Discovered {
    /// Content documents, sorted by path.
    pub documents: Vec<PathBuf>,
    /// The reserved rules document at the top of the content directory.
    pub rules: Option<PathBuf>,
}

/// Read the reserved game-rules document.
pub fn read_rules(path: &Path) -> Result<GameRules, LoadError> {
    let source = std::fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let name = path.display().to_string();
    serde_json::from_str(&source).map_err(|e| LoadError::syntax(&name, &source, &e))
}

/// Loads content documents into a world: parse all, schedule, apply,
/// validate.
#[derive(Debug, Default)]
pub struct ContentLoader {
    config: LoaderConfig,
    applier: PackageApplier,
}

impl ContentLoader {
    /// A loader with the given configuration.
    pub fn new(config: LoaderConfig) -> Self {
        Self {
            config,
            applier: PackageApplier::new(),
        }
    }

    /// The active configuration.
    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    /// Counts accumulated across every load through this loader.
    pub fn summary(&self) -> &LoadSummary {
        self.applier.summary()
    }

    /// Find every `*.json` file under `dir`, sorted by path.
    ///
    /// Only a rules file directly inside `dir` counts as the rules
    /// document; one found deeper is skipped.
    pub fn discover(&self, dir: &Path) -> Result<Discovered, LoadError> {
        let mut discovered = Discovered::default();
        for entry in WalkDir::new(dir).sort_by_file_name() {
            let entry = entry.map_err(|e| LoadError::Io {
                path: e.path().map_or_else(|| dir.to_path_buf(), Path::to_path_buf),
                source: e.into(),
            })?;
            let path = entry.path();
            if !entry.file_type().is_file() || path.extension().is_none_or(|ext| ext != "json") {
                continue;
            }
            if path.file_name().is_some_and(|name| name == self.config.rules_file.as_str()) {
                if entry.depth() == 1 {
                    discovered.rules = Some(path.to_path_buf());
                } else {
                    tracing::warn!(path = %path.display(), "ignoring nested rules file");
                }
            } else {
                discovered.documents.push(path.to_path_buf());
            }
        }
        discovered.documents.sort();
        Ok(discovered)
    }

    /// Load every document under `dir` into `world`.
    pub fn load_dir(&mut self, world: &mut World, dir: &Path) -> Result<LoadReport, LoadError> {
        if !dir.is_dir() {
            return Err(LoadError::Io {
                path: dir.to_path_buf(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "not a directory"),
            });
        }
        let discovered = self.discover(dir)?;
        tracing::info!(dir = %dir.display(), documents = discovered.documents.len(), "discovered content");

        let mut failures = Vec::new();
        if let Some(path) = &discovered.rules {
            match read_rules(path) {
                Ok(rules) => world.rules = rules,
                Err(e) => self.recover(e, &mut failures)?,
            }
        }

        let mut documents = Vec::with_capacity(discovered.documents.len());
        for path in &discovered.documents {
            match Document::read(path) {
                Ok(mut document) => {
                    document.origin = path.strip_prefix(dir).ok().map(Path::to_path_buf);
                    documents.push(document);
                }
                Err(e) => {
                    self.applier.record_failure();
                    self.recover(e, &mut failures)?;
                }
            }
        }

        let mut report = self.load_documents(world, documents)?;
        failures.append(&mut report.failures);
        report.failures = failures;
        report.rules_file = discovered.rules;
        Ok(report)
    }

    /// Schedule and apply already-parsed documents, then validate.
    pub fn load_documents(&mut self, world: &mut World, documents: Vec<Document>) -> Result<LoadReport, LoadError> {
        let scheduled = schedule(documents, &self.config.priorities);
        let mut report = LoadReport {
            schedule: scheduled
                .iter()
                .map(|s| ScheduleEntry {
                    package: s.document.label(),
                    origin: s.document.origin.clone(),
                    priority: s.priority,
                    score: s.dependencies.score,
                    discovery: s.discovery,
                })
                .collect(),
            ..LoadReport::default()
        };

        for entry in &scheduled {
            if let Err(e) = self.applier.apply(world, &entry.document) {
                self.recover(e, &mut report.failures)?;
            }
        }

        if self.config.validate {
            report.validation = Some(validate(world)?);
        }
        report.summary = self.applier.summary().clone();
        tracing::info!(summary = %report.summary, "load finished");
        Ok(report)
    }

    /// Apply one more document after the initial load.
    ///
    /// Returns every skeleton still outstanding afterwards.
    pub fn load_dynamic(&mut self, world: &mut World, document: &Document) -> Result<Vec<SkeletonKey>, LoadError> {
        self.applier.apply(world, document)?;
        if self.config.validate {
            validate(world)?;
        }
        Ok(world.registry().skeletons().map(|(key, _)| key).collect())
    }

    /// Keep going after a non-fatal error, or hand it back.
    fn recover(&self, error: LoadError, failures: &mut Vec<LoadError>) -> Result<(), LoadError> {
        if error.is_fatal() || self.config.strict {
            return Err(error);
        }
        tracing::warn!(error = %error, "skipping document");
        failures.push(error);
        Ok(())
    }
}
