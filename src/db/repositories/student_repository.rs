use std::convert::TryFrom;

use rusqlite::{named_params, Connection, OptionalExtension, Row};

use crate::error::AppResult;
use crate::models::student::Student;

#[derive(Debug, Clone)]
pub struct StudentRow {
    pub id: String,
    pub name: String,
    pub grade: Option<String>,
    pub cohort_status: String,
}

impl StudentRow {
    pub fn into_student(self) -> Student {
        Student {
            id: self.id,
            name: self.name,
            grade: self.grade,
            cohort_status: self.cohort_status,
        }
    }
}

impl TryFrom<&Row<'_>> for StudentRow {
    type Error = rusqlite::Error;

    fn try_from(row: &Row<'_>) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.get("id")?,
            name: row.get("name")?,
            grade: row.get("grade")?,
            cohort_status: row.get("cohort_status")?,
        })
    }
}

pub struct StudentRepository;

impl StudentRepository {
    pub fn upsert(conn: &Connection, student: &Student) -> AppResult<()> {
        conn.execute(
            r#"
                INSERT INTO students (id, name, grade, cohort_status)
                VALUES (:id, :name, :grade, :cohort_status)
                ON CONFLICT(id) DO UPDATE SET
                    name = excluded.name,
                    grade = excluded.grade,
                    cohort_status = excluded.cohort_status
            "#,
            named_params! {
                ":id": &student.id,
                ":name": &student.name,
                ":grade": &student.grade,
                ":cohort_status": &student.cohort_status,
            },
        )?;
        Ok(())
    }

    pub fn find(conn: &Connection, student_id: &str) -> AppResult<Option<Student>> {
        let mut stmt = conn.prepare(
            "SELECT id, name, grade, cohort_status FROM students WHERE id = :id LIMIT 1",
        )?;
        let row = stmt
            .query_row(named_params! {":id": student_id}, |row| {
                StudentRow::try_from(row)
            })
            .optional()?;
        Ok(row.map(StudentRow::into_student))
    }

    pub fn list_all(conn: &Connection) -> AppResult<Vec<Student>> {
        let mut stmt =
            conn.prepare("SELECT id, name, grade, cohort_status FROM students ORDER BY id")?;
        let rows = stmt
            .query_map([], |row| StudentRow::try_from(row))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows.into_iter().map(StudentRow::into_student).collect())
    }
}
