use crate::error::{Error, Result};

/// Queue depth, worker count and display name of one stage.
///
/// The shorthand builder operators take a bare `parallelism` and use
/// [`StageOptions::parallel`], which sizes the queue to the worker count.
/// Use [`PipelineBuilder::pipe`](crate::pipeline::chain::PipelineBuilder::pipe)
/// with explicit options to decouple the two.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageOptions {
    name: Option<&'static str>,
    bounded_capacity: usize,
    max_degree_of_parallelism: usize,
}

impl StageOptions {
    pub fn new() -> Self {
        Self::parallel(1)
    }

    pub fn parallel(parallelism: usize) -> Self {
        Self {
            name: None,
            bounded_capacity: parallelism,
            max_degree_of_parallelism: parallelism,
        }
    }

    pub fn bounded_capacity(mut self, capacity: usize) -> Self {
        self.bounded_capacity = capacity;
        self
    }

    pub fn max_degree_of_parallelism(mut self, parallelism: usize) -> Self {
        self.max_degree_of_parallelism = parallelism;
        self
    }

    pub fn name(mut self, name: &'static str) -> Self {
        self.name = Some(name);
        self
    }

    pub fn capacity(&self) -> usize {
        self.bounded_capacity
    }

    pub fn parallelism(&self) -> usize {
        self.max_degree_of_parallelism
    }

    pub fn stage_name(&self) -> Option<&'static str> {
        self.name
    }

    pub(crate) fn or_name(mut self, name: &'static str) -> Self {
        self.name.get_or_insert(name);
        self
    }

    pub(crate) fn validate(&self) -> Result<()> {
        let stage = self.name.unwrap_or("stage");
        if self.bounded_capacity == 0 {
            return Err(Error::build(format!(
                "stage `{stage}`: bounded capacity must be at least 1"
            )));
        }
        if self.max_degree_of_parallelism == 0 {
            return Err(Error::build(format!(
                "stage `{stage}`: max degree of parallelism must be at least 1"
            )));
        }
        Ok(())
    }
}

impl Default for StageOptions {
    fn default() -> Self {
        Self::new()
    }
}
