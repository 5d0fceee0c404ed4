//! Named collection of datasets.

use std::collections::HashMap;

use log::warn;

use crate::dataset::Dataset;
use crate::handler::{FileHandler, NoHandler};

/// A set of [`Dataset`]s addressable by name.
///
/// Handy for pipelines that join several collections, e.g. looking up the
/// secondary of an overlap search by name.
///
/// # Examples
/// ```
/// use timedex::{Dataset, DatasetManager};
///
/// let mut manager = DatasetManager::new();
/// manager.insert(
///     Dataset::builder("/d/{year}/{month}/{day}.nc")
///         .name("daily")
///         .build()
///         .unwrap(),
/// );
/// assert!(manager.get("daily").is_some());
/// ```
pub struct DatasetManager<H: FileHandler = NoHandler> {
    datasets: HashMap<String, Dataset<H>>,
}

impl<H: FileHandler> Default for DatasetManager<H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H: FileHandler> DatasetManager<H> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            datasets: HashMap::new(),
        }
    }

    /// Add a dataset under its own name, replacing and returning any
    /// dataset already stored under that name.
    pub fn insert(&mut self, dataset: Dataset<H>) -> Option<Dataset<H>> {
        let name = dataset.name().to_string();
        let previous = self.datasets.insert(name.clone(), dataset);
        if previous.is_some() {
            warn!("Overwriting dataset '{name}'");
        }
        previous
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Dataset<H>> {
        self.datasets.get(name)
    }

    #[must_use]
    pub fn get_mut(&mut self, name: &str) -> Option<&mut Dataset<H>> {
        self.datasets.get_mut(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<Dataset<H>> {
        self.datasets.remove(name)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.datasets.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.datasets.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.datasets.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Dataset<H>)> {
        self.datasets.iter().map(|(name, ds)| (name.as_str(), ds))
    }
}
