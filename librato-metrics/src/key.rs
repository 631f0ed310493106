use std::fmt;

use crate::Tags;

/// The identity under which samples are grouped within one collection period.
///
/// Two samples share a key if their name, their full tag set and their source are equal. Tags
/// contribute in insertion order, so the same tags inserted in a different order form a
/// different key. Name and tags are compared raw, before sanitization.
#[derive(Clone, Eq, PartialEq, Hash)]
pub struct AggregationKey {
    name: String,
    tags: Vec<(String, String)>,
    source: Option<String>,
}

impl AggregationKey {
    /// Creates the key for a measurement.
    pub fn new(name: &str, tags: Option<&Tags>, source: Option<&str>) -> Self {
        Self {
            name: name.to_owned(),
            tags: tags
                .into_iter()
                .flatten()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            source: source.map(str::to_owned),
        }
    }
}

impl fmt::Debug for AggregationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        for (key, value) in &self.tags {
            write!(f, ";{key}={value}")?;
        }
        if let Some(ref source) = self.source {
            write!(f, ";source={source}")?;
        }
        Ok(())
    }
}
