use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub grade: Option<String>,
    pub cohort_status: String,
}

impl Student {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        cohort_status: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            grade: None,
            cohort_status: cohort_status.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "camelCase")]
pub enum Cohort {
    ExamTrack,
    General,
}

impl Cohort {
    pub fn as_str(&self) -> &'static str {
        match self {
            Cohort::ExamTrack => "examTrack",
            Cohort::General => "general",
        }
    }
}
