//! Host job abstraction
//!
//! The host workflow engine owns its jobs; the executor only needs a few
//! read-only attributes and a way to interpolate native arguments against
//! them. [`WorkflowJob`] is that seam and [`JobSpec`] a plain implementation
//! of it.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::format::{self, Accessor, FieldRef, FormatError};

/// Shared handle to a host job
pub type JobHandle = Arc<dyn WorkflowJob>;

/// A runnable unit of work as seen by the executor
pub trait WorkflowJob: Send + Sync + fmt::Debug {
    /// Host-assigned job id, unique within one workflow run
    fn jobid(&self) -> u64;

    /// Name of the rule this job was created from
    fn rule(&self) -> &str;

    /// Interpolates `template` against the job's attributes
    ///
    /// Fails if the template references an attribute the job does not have.
    fn format_wildcards(&self, template: &str) -> Result<String, FormatError>;
}

/// Ordered list of values, some of which may carry a name
///
/// Used for inputs, outputs, params and the like, which can be addressed
/// both positionally (`{input[0]}`) and by name (`{input.reads}`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedList {
    items: Vec<(Option<String>, String)>,
}

impl NamedList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an unnamed value
    pub fn push(&mut self, value: impl Into<String>) {
        self.items.push((None, value.into()));
    }

    /// Appends a value that can also be looked up by `name`
    pub fn push_named(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.items.push((Some(name.into()), value.into()));
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.items.get(index).map(|(_, value)| value.as_str())
    }

    pub fn get_named(&self, name: &str) -> Option<&str> {
        self.items
            .iter()
            .find(|(key, _)| key.as_deref() == Some(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// All values joined by single spaces
    pub fn joined(&self) -> String {
        self.items
            .iter()
            .map(|(_, value)| value.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn resolve(&self, accessor: Option<Accessor<'_>>) -> Option<String> {
        match accessor {
            None => Some(self.joined()),
            Some(Accessor::Index(index)) => self.get(index).map(str::to_string),
            Some(Accessor::Key(key)) => self.get_named(key).map(str::to_string),
        }
    }
}

impl<S: Into<String>> FromIterator<S> for NamedList {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            items: iter.into_iter().map(|value| (None, value.into())).collect(),
        }
    }
}

/// Plain job description for hosts without their own job type
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobSpec {
    pub jobid: u64,
    pub name: String,
    pub rule: String,
    pub threads: u32,
    pub input: NamedList,
    pub output: NamedList,
    pub log: NamedList,
    pub params: NamedList,
    pub wildcards: NamedList,
    pub resources: NamedList,
    pub dependencies: NamedList,
}

impl JobSpec {
    /// Creates a single-threaded job whose name is its rule
    pub fn new(jobid: u64, rule: impl Into<String>) -> Self {
        let rule = rule.into();
        Self {
            jobid,
            name: rule.clone(),
            rule,
            threads: 1,
            input: NamedList::new(),
            output: NamedList::new(),
            log: NamedList::new(),
            params: NamedList::new(),
            wildcards: NamedList::new(),
            resources: NamedList::new(),
            dependencies: NamedList::new(),
        }
    }

    pub fn with_threads(mut self, threads: u32) -> Self {
        self.threads = threads;
        self
    }

    pub fn with_wildcard(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.wildcards.push_named(name, value);
        self
    }

    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push_named(name, value);
        self
    }

    pub fn with_resource(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.resources.push_named(name, value);
        self
    }

    pub fn with_input(mut self, path: impl Into<String>) -> Self {
        self.input.push(path);
        self
    }

    pub fn with_output(mut self, path: impl Into<String>) -> Self {
        self.output.push(path);
        self
    }

    fn resolve(&self, field: FieldRef<'_>) -> Option<String> {
        let list = match field.name {
            "input" => &self.input,
            "output" => &self.output,
            "log" => &self.log,
            "params" => &self.params,
            "wildcards" => &self.wildcards,
            "resources" => &self.resources,
            "dependencies" => &self.dependencies,
            scalar => {
                // Scalars have no items to index into
                if field.accessor.is_some() {
                    return None;
                }
                return match scalar {
                    "jobid" => Some(self.jobid.to_string()),
                    "name" => Some(self.name.clone()),
                    "rule" | "rulename" => Some(self.rule.clone()),
                    "threads" => Some(self.threads.to_string()),
                    _ => None,
                };
            }
        };
        list.resolve(field.accessor)
    }
}

impl WorkflowJob for JobSpec {
    fn jobid(&self) -> u64 {
        self.jobid
    }

    fn rule(&self) -> &str {
        &self.rule
    }

    fn format_wildcards(&self, template: &str) -> Result<String, FormatError> {
        format::format_template(template, |field| self.resolve(field))
    }
}
