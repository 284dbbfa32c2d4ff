use crate::data_structures::transform::TransformId;

/// A string placed in the UI. Glyph layout is left to the application.
#[derive(Debug, Clone)]
pub struct UiText {
    pub unique_id: u32,
    pub text: String,
    pub transform: TransformId,
}

impl UiText {
    pub fn new(unique_id: u32, text: impl Into<String>, transform: TransformId) -> Self {
        Self {
            unique_id,
            text: text.into(),
            transform,
        }
    }
}
