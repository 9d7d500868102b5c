use serde::{Deserialize, Serialize};

/// Canonical question shape. The question bank normalizes every stored
/// variant (option arrays, legacy numeric-keyed fields) into this before it
/// reaches the session engine; nothing downstream handles raw records.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    pub id: String,
    pub text: String,
    pub options: Vec<QuestionOption>,
    /// Canonical answer key. `id` is the only valid join key between a
    /// question and a submitted answer; `correct_index` addresses `options`.
    pub correct_index: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionOption {
    pub id: String,
    pub text: String,
    pub is_correct: bool,
}

/// Question projection for session views: no answer key, no correctness
/// flags. Scoring happens server-side only.
#[derive(Debug, Clone, Serialize)]
pub struct QuestionView {
    pub id: String,
    pub text: String,
    pub options: Vec<OptionView>,
}

#[derive(Debug, Clone, Serialize)]
pub struct OptionView {
    pub id: String,
    pub text: String,
}

impl From<&Question> for QuestionView {
    fn from(q: &Question) -> Self {
        Self {
            id: q.id.clone(),
            text: q.text.clone(),
            options: q
                .options
                .iter()
                .map(|o| OptionView {
                    id: o.id.clone(),
                    text: o.text.clone(),
                })
                .collect(),
        }
    }
}
