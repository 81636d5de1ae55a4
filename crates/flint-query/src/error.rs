/// A stage could not be rendered into a pipeline document.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderError {
    pub stage: &'static str,
    pub message: String,
}

impl RenderError {
    pub(crate) fn new(stage: &'static str, message: impl Into<String>) -> Self {
        Self {
            stage,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for RenderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "cannot render {} stage: {}", self.stage, self.message)
    }
}

impl std::error::Error for RenderError {}
