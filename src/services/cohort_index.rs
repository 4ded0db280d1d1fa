use std::collections::HashMap;

use crate::error::{AppError, AppResult};
use crate::models::settings::CohortRules;
use crate::models::student::{Cohort, Student};

/// Student id to cohort lookup built once per request from the registry.
pub struct CohortIndex<'a> {
    cohorts: HashMap<&'a str, Option<Cohort>>,
}

impl<'a> CohortIndex<'a> {
    pub fn build(students: &'a [Student], rules: &CohortRules) -> Self {
        Self {
            cohorts: students
                .iter()
                .map(|student| (student.id.as_str(), rules.classify(&student.cohort_status)))
                .collect(),
        }
    }

    /// `Ok(None)` for registered but ineligible students (e.g. withdrawn),
    /// `MissingReferenceData` for ids the registry does not know.
    pub fn resolve(&self, student_id: &str) -> AppResult<Option<Cohort>> {
        self.cohorts
            .get(student_id)
            .copied()
            .ok_or_else(|| AppError::missing_reference(student_id))
    }

    pub fn population(&self, cohort: Cohort) -> usize {
        self.cohorts
            .values()
            .filter(|value| **value == Some(cohort))
            .count()
    }
}
