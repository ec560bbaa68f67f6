use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};

/// Separator between field names in a precondition label.
pub const LABEL_SEPARATOR: &str = ",";

/// Fields whose precondition makes an entity eventually immutable, and the
/// role a method plays with respect to that precondition.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Eventual {
    fields: BTreeSet<String>,
    mark: bool,
    after: Option<bool>,
    test: Option<bool>,
}

impl Eventual {
    /// Descriptor of an entity that is not eventually anything.
    pub fn not_eventual() -> Self {
        Self::default()
    }

    /// Descriptor of a type whose immutability depends on `fields`.
    pub fn of_fields<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            fields: collect_fields(fields),
            ..Self::default()
        }
    }

    pub fn new<I, S>(fields: I, mark: bool, after: Option<bool>, test: Option<bool>) -> EngineResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let fields = collect_fields(fields);
        if fields.is_empty() {
            let flag = if mark {
                Some("mark")
            } else if after.is_some() {
                Some("after")
            } else if test.is_some() {
                Some("test")
            } else {
                None
            };
            if let Some(flag) = flag {
                return Err(EngineError::EmptyEventual { flag });
            }
        }
        Ok(Self {
            fields,
            mark,
            after,
            test,
        })
    }

    pub fn is_eventual(&self) -> bool {
        !self.fields.is_empty()
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(String::as_str)
    }

    pub fn mark(&self) -> bool {
        self.mark
    }

    pub fn after(&self) -> Option<bool> {
        self.after
    }

    pub fn test(&self) -> Option<bool> {
        self.test
    }

    /// Sorted, deduplicated field names joined with [`LABEL_SEPARATOR`].
    pub fn label(&self) -> String {
        self.fields
            .iter()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(LABEL_SEPARATOR)
    }
}

fn collect_fields<I, S>(fields: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    fields
        .into_iter()
        .map(Into::into)
        .map(|field| field.trim().to_string())
        .filter(|field| !field.is_empty())
        .collect()
}

/// Split a user-written label list such as `"a, b,c"`.
pub fn split_labels(labels: &str) -> Vec<&str> {
    labels
        .split(LABEL_SEPARATOR)
        .map(str::trim)
        .filter(|label| !label.is_empty())
        .collect()
}
