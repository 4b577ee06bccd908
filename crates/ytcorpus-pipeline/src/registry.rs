//! Step Registry & Versioning (spec component C6, §4.4).
//!
//! Grounded on `original_source/compose/services/pipeline/versioning.py`
//! (`get_version_hash`, `get_execution_order`) and `decorator.py`
//! (`pipeline_step`, the global step registry). The reference
//! implementation registers steps reflectively via a decorator at import
//! time and derives a step's version hash from its own source code (a git
//! blob hash when available, else a SHA-256 of the function body). Rust has
//! neither mechanism, so per spec §9 REDESIGN FLAGS this crate replaces
//! reflective registration with explicit `register_step` calls, and derives
//! the version hash from a caller-supplied source text — in practice the
//! step's own source file via `include_str!(file!())` at the call site,
//! which changes exactly when the step's implementation changes.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value as Json;
use sha2::{Digest, Sha256};

use crate::context::Context;
use crate::error::{PipelineError, PipelineResult};

/// A single pipeline step. Implementors do their own work and report success
/// or failure through the `Result`; the runner (not the step) is responsible
/// for timing and for recording the outcome onto the `Context`.
#[async_trait]
pub trait Step: Send + Sync {
    async fn run(&self, ctx: &mut Context) -> Result<Json, String>;
}

/// Static metadata recorded at registration time.
#[derive(Debug, Clone)]
pub struct StepMetadata {
    pub name: String,
    pub version_hash: String,
    pub dependencies: Vec<String>,
    pub description: Option<String>,
}

struct Entry {
    step: Arc<dyn Step>,
    metadata: StepMetadata,
}

/// First 12 hex characters of the SHA-256 digest of `source`, matching the
/// reference implementation's hash length (spec §4.4 invariant: "a stable
/// version identifier... 12 characters").
pub fn version_hash_of_source(source: &str) -> String {
    let digest = Sha256::digest(source.as_bytes());
    format!("{digest:x}")[..12].to_string()
}

/// The set of registered steps: names, versions, dependency edges, and
/// lookup by name. Built once at process start-up via explicit
/// `register_step` calls, then shared read-only across pipeline runs.
#[derive(Default)]
pub struct StepRegistry {
    entries: HashMap<String, Entry>,
}

impl StepRegistry {
    pub fn new() -> Self {
        Self { entries: HashMap::new() }
    }

    /// Register a step. `dependencies` names other registered (or
    /// not-yet-registered) steps that must succeed first. `source_text` is
    /// hashed to produce the step's version; callers pass
    /// `include_str!(file!())` so the version tracks the step's own source
    /// file. Registering the same name twice is a programmer error.
    pub fn register_step(
        &mut self,
        name: impl Into<String>,
        dependencies: &[&str],
        step: Arc<dyn Step>,
        source_text: &str,
        description: Option<&str>,
    ) -> PipelineResult<()> {
        let name = name.into();
        if self.entries.contains_key(&name) {
            return Err(PipelineError::DuplicateStep(name));
        }
        let metadata = StepMetadata {
            version_hash: version_hash_of_source(source_text),
            dependencies: dependencies.iter().map(|s| s.to_string()).collect(),
            description: description.map(|s| s.to_string()),
            name: name.clone(),
        };
        self.entries.insert(name, Entry { step, metadata });
        Ok(())
    }

    pub fn step(&self, name: &str) -> Option<&Arc<dyn Step>> {
        self.entries.get(name).map(|e| &e.step)
    }

    pub fn metadata(&self, name: &str) -> Option<&StepMetadata> {
        self.entries.get(name).map(|e| &e.metadata)
    }

    pub fn version_hash(&self, name: &str) -> Option<&str> {
        self.entries.get(name).map(|e| e.metadata.version_hash.as_str())
    }

    pub fn dependencies(&self, name: &str) -> Option<&[String]> {
        self.entries.get(name).map(|e| e.metadata.dependencies.as_slice())
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Every registered step name, sorted for deterministic iteration.
    pub fn all_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.entries.keys().cloned().collect();
        names.sort();
        names
    }

    /// Topologically sort `targets` and their transitive dependencies into a
    /// valid execution order (spec §4.4 `get_execution_order`). Each step
    /// appears once, after all of its dependencies. Raises `UnknownStep` for
    /// an unregistered name and `CircularDependency` if the dependency graph
    /// has a cycle.
    pub fn execution_order(&self, targets: &[&str]) -> PipelineResult<Vec<String>> {
        let mut order = Vec::new();
        let mut visited = HashSet::new();
        let mut in_progress = HashSet::new();

        for target in targets {
            self.visit(target, &mut visited, &mut in_progress, &mut order)?;
        }
        Ok(order)
    }

    fn visit(
        &self,
        name: &str,
        visited: &mut HashSet<String>,
        in_progress: &mut HashSet<String>,
        order: &mut Vec<String>,
    ) -> PipelineResult<()> {
        if visited.contains(name) {
            return Ok(());
        }
        if in_progress.contains(name) {
            return Err(PipelineError::CircularDependency(name.to_string()));
        }
        let entry = self.entries.get(name).ok_or_else(|| PipelineError::UnknownStep(name.to_string()))?;

        in_progress.insert(name.to_string());
        for dep in &entry.metadata.dependencies {
            self.visit(dep, visited, in_progress, order)?;
        }
        in_progress.remove(name);

        visited.insert(name.to_string());
        order.push(name.to_string());
        Ok(())
    }
}
