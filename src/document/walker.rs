//! Depth-first traversal of a YAML document with in-place substitution.

use crate::error::HelmVaultError;
use serde_yaml::Value;
use std::fmt;

/// Chain of mapping keys from the document root.
///
/// Sequence elements do not contribute a segment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TreePath {
    segments: Vec<String>,
}

impl TreePath {
    pub fn root() -> Self {
        Self::default()
    }

    pub fn child(&self, key: &str) -> Self {
        let mut segments = self.segments.clone();
        segments.push(key.to_string());
        Self { segments }
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }
}

impl fmt::Display for TreePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.segments.is_empty() {
            return write!(f, "/");
        }
        for segment in &self.segments {
            write!(f, "/{}", segment)?;
        }
        Ok(())
    }
}

/// Position of a scalar handed to a visitor
#[derive(Debug, Clone, Copy)]
pub struct Entry<'a> {
    /// Keys above the entry
    pub ancestors: &'a TreePath,
    /// The entry's own mapping key, `None` for sequence elements
    pub key: Option<&'a str>,
}

impl Entry<'_> {
    /// Printable location, e.g. `/secrets/stringData/password`
    pub fn location(&self) -> String {
        match self.key {
            Some(key) => self.ancestors.child(key).to_string(),
            None => format!("{}[]", self.ancestors),
        }
    }
}

/// Decision a visitor takes for one scalar
#[derive(Debug)]
pub enum Visit {
    /// Not a placeholder, leave it alone
    Skip,
    /// Overwrite the scalar in place
    Replace { value: Value, detail: String },
    /// A placeholder that could not be processed; the scalar stays as it was
    Fail(HelmVaultError),
}

/// Callback evaluated on every scalar under a mapping key or in a sequence
pub trait NodeVisitor {
    fn visit(&mut self, entry: &Entry<'_>, value: &Value) -> Visit;
}

/// Result for one placeholder
#[derive(Debug)]
pub enum OutcomeStatus {
    Replaced(String),
    Failed(HelmVaultError),
}

#[derive(Debug)]
pub struct NodeOutcome {
    pub location: String,
    pub status: OutcomeStatus,
}

impl NodeOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self.status, OutcomeStatus::Failed(_))
    }
}

/// Every placeholder the traversal touched, in document order
#[derive(Debug, Default)]
pub struct WalkReport {
    pub outcomes: Vec<NodeOutcome>,
}

impl WalkReport {
    pub fn total(&self) -> usize {
        self.outcomes.len()
    }

    pub fn failures(&self) -> impl Iterator<Item = &NodeOutcome> {
        self.outcomes.iter().filter(|o| o.is_failure())
    }

    pub fn failure_count(&self) -> usize {
        self.failures().count()
    }

    /// Turn a report with failures into a session error
    pub fn into_result(self) -> Result<Self, HelmVaultError> {
        let failed = self.failure_count();
        if failed > 0 {
            return Err(HelmVaultError::PartialFailure {
                failed,
                total: self.total(),
            });
        }
        Ok(self)
    }
}

struct Pending<'v> {
    parent: TreePath,
    key: Option<String>,
    node: &'v mut Value,
    evaluate: bool,
}

/// Explicit work-list traversal.
///
/// Entries are visited in document order. A failing entry does not stop its
/// siblings from being visited, and replaced values are not traversed again.
pub struct Walker;

impl Walker {
    /// Run `visitor` over every scalar in `root` and apply its replacements
    pub fn traverse(root: &mut Value, visitor: &mut dyn NodeVisitor) -> WalkReport {
        let mut report = WalkReport::default();
        let mut stack = vec![Pending {
            parent: TreePath::root(),
            key: None,
            node: root,
            evaluate: false,
        }];

        while let Some(Pending {
            parent,
            key,
            node,
            evaluate,
        }) = stack.pop()
        {
            if evaluate && is_scalar(node) {
                let entry = Entry {
                    ancestors: &parent,
                    key: key.as_deref(),
                };
                match visitor.visit(&entry, node) {
                    Visit::Skip => {}
                    Visit::Replace { value, detail } => {
                        *node = value;
                        report.outcomes.push(NodeOutcome {
                            location: entry.location(),
                            status: OutcomeStatus::Replaced(detail),
                        });
                    }
                    Visit::Fail(err) => {
                        report.outcomes.push(NodeOutcome {
                            location: entry.location(),
                            status: OutcomeStatus::Failed(err),
                        });
                    }
                }
                continue;
            }

            let path = match &key {
                Some(k) => parent.child(k),
                None => parent.clone(),
            };

            match node {
                Value::Mapping(mapping) => {
                    let children: Vec<_> = mapping.iter_mut().collect();
                    for (k, v) in children.into_iter().rev() {
                        stack.push(Pending {
                            parent: path.clone(),
                            key: Some(key_segment(k)),
                            node: v,
                            evaluate: true,
                        });
                    }
                }
                Value::Sequence(items) => {
                    for item in items.iter_mut().rev() {
                        stack.push(Pending {
                            parent: path.clone(),
                            key: None,
                            node: item,
                            evaluate: true,
                        });
                    }
                }
                Value::Tagged(tagged) => stack.push(Pending {
                    parent,
                    key,
                    node: &mut tagged.value,
                    evaluate,
                }),
                _ => {}
            }
        }

        report
    }
}

fn is_scalar(node: &Value) -> bool {
    matches!(
        node,
        Value::Null | Value::Bool(_) | Value::Number(_) | Value::String(_)
    )
}

/// Render a mapping key as a path segment
pub(crate) fn key_segment(key: &Value) -> String {
    match key {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => "null".to_string(),
        other => serde_yaml::to_string(other)
            .map(|s| s.trim().to_string())
            .unwrap_or_default(),
    }
}
