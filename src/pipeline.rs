//! Ordered composition of filter and transform stages.
//!
//! A derived-field filter needs the field projected into each record before
//! the predicate reads it, so stages run strictly in the order they were
//! added:
//!
//! ```
//! use pdh::filters::regexp;
//! use pdh::pipeline::Pipeline;
//! use pdh::transform::{extract_from_dict, Transformations};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let pipeline = Pipeline::new()
//!     .derive(Transformations::new().with("service", extract_from_dict("service", "summary", "")))
//!     .filter(vec![regexp("service", "^db-")?]);
//! let kept = pipeline.run(Vec::new())?;
//! assert!(kept.is_empty());
//! # Ok(())
//! # }
//! ```

use tracing::debug;

use crate::filters::{self, FilterError, Predicate};
use crate::record::Record;
use crate::transform::{self, Mode, TransformError, Transformations};

/// Errors from any stage of a pipeline.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// A predicate failed.
    #[error("filter failed: {0}")]
    Filter(#[from] FilterError),
    /// An extractor failed.
    #[error("transformation failed: {0}")]
    Transform(#[from] TransformError),
}

/// One step of a [`Pipeline`].
#[derive(Debug, Clone)]
pub enum Stage {
    /// Narrow the record set.
    Filter(Vec<Predicate>),
    /// Project or augment every record.
    Transform {
        /// Output fields.
        transformations: Transformations,
        /// Fresh projection or in-place augmentation.
        mode: Mode,
    },
}

/// Sequence of stages applied to a record set.
#[derive(Debug, Clone, Default)]
pub struct Pipeline {
    stages: Vec<Stage>,
}

impl Pipeline {
    /// Empty pipeline: returns its input unchanged.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a filter stage.
    #[must_use]
    pub fn filter(mut self, predicates: Vec<Predicate>) -> Self {
        if !predicates.is_empty() {
            self.stages.push(Stage::Filter(predicates));
        }
        self
    }

    /// Append a fresh projection stage.
    #[must_use]
    pub fn project(mut self, transformations: Transformations) -> Self {
        self.stages.push(Stage::Transform {
            transformations,
            mode: Mode::Fresh,
        });
        self
    }

    /// Append a stage adding derived fields to the existing records.
    #[must_use]
    pub fn derive(mut self, transformations: Transformations) -> Self {
        self.stages.push(Stage::Transform {
            transformations,
            mode: Mode::Preserve,
        });
        self
    }

    /// Stages in execution order.
    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    /// Run every stage over `records`.
    ///
    /// # Errors
    ///
    /// Returns the first [`PipelineError`]; later stages do not run.
    pub fn run(&self, records: Vec<Record>) -> Result<Vec<Record>, PipelineError> {
        let mut current = records;
        for (idx, stage) in self.stages.iter().enumerate() {
            current = match stage {
                Stage::Filter(predicates) => filters::apply(current, predicates)?,
                Stage::Transform {
                    transformations,
                    mode,
                } => transform::apply(current, transformations, *mode)?,
            };
            debug!(stage = idx, records = current.len(), "pipeline stage done");
        }
        Ok(current)
    }
}
