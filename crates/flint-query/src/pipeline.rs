use bson::Document;

use crate::error::RenderError;
use crate::stage::Stage;

/// An append-only sequence of aggregation stages.
///
/// Stages render in the order they were appended, which is the order the
/// store executes them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Pipeline {
    stages: Vec<Stage>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, stage: impl Into<Stage>) {
        self.stages.push(stage.into());
    }

    /// Append every present stage, skipping `None` entries.
    pub fn append<I, S>(&mut self, stages: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<Option<Stage>>,
    {
        self.stages
            .extend(stages.into_iter().filter_map(Into::into));
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    /// Render each stage, failing on the first one that cannot be rendered.
    pub fn render(&self) -> Result<Vec<Document>, RenderError> {
        self.stages.iter().map(Stage::render).collect()
    }
}

impl FromIterator<Stage> for Pipeline {
    fn from_iter<I: IntoIterator<Item = Stage>>(iter: I) -> Self {
        Self {
            stages: iter.into_iter().collect(),
        }
    }
}
