//! The student/lecturer directory kept alongside the reference rows.
//!
//! The coordinator only reads it through [`Directory`]. The upserts are for
//! seeding and administration.

use rusqlite::OptionalExtension as _;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use accolade_core::store::Directory;

use crate::{
  Error, Result,
  encode::{decode_uuid, encode_uuid},
  reference_store::SqliteReferenceStore,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lecturer {
  pub lecturer_id:     Uuid,
  pub user_id:         Uuid,
  pub lecturer_number: String,
  #[serde(default)]
  pub department:      String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Student {
  pub student_id:     Uuid,
  pub user_id:        Uuid,
  pub student_number: String,
  #[serde(default)]
  pub program_study:  String,
  #[serde(default)]
  pub academic_year:  String,
  /// The lecturer allowed to verify this student's achievements.
  #[serde(default)]
  pub advisor_id:     Option<Uuid>,
}

impl SqliteReferenceStore {
  pub async fn upsert_lecturer(&self, lecturer: &Lecturer) -> Result<()> {
    let id_str   = encode_uuid(lecturer.lecturer_id);
    let user_str = encode_uuid(lecturer.user_id);
    let number   = lecturer.lecturer_number.clone();
    let dept     = lecturer.department.clone();

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO lecturers (lecturer_id, user_id, lecturer_number, department)
           VALUES (?1, ?2, ?3, ?4)
           ON CONFLICT (lecturer_id) DO UPDATE SET
             user_id         = excluded.user_id,
             lecturer_number = excluded.lecturer_number,
             department      = excluded.department",
          rusqlite::params![id_str, user_str, number, dept],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Insert or replace a student. The advisor, if any, must already exist.
  pub async fn upsert_student(&self, student: &Student) -> Result<()> {
    let id_str      = encode_uuid(student.student_id);
    let user_str    = encode_uuid(student.user_id);
    let number      = student.student_number.clone();
    let program     = student.program_study.clone();
    let year        = student.academic_year.clone();
    let advisor_str = student.advisor_id.map(encode_uuid);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO students (
             student_id, user_id, student_number, program_study,
             academic_year, advisor_id
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
           ON CONFLICT (student_id) DO UPDATE SET
             user_id        = excluded.user_id,
             student_number = excluded.student_number,
             program_study  = excluded.program_study,
             academic_year  = excluded.academic_year,
             advisor_id     = excluded.advisor_id",
          rusqlite::params![id_str, user_str, number, program, year, advisor_str],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Point a student at a new advisor, or at none.
  pub async fn assign_advisor(
    &self,
    student_id: Uuid,
    lecturer_id: Option<Uuid>,
  ) -> Result<()> {
    let id_str      = encode_uuid(student_id);
    let advisor_str = lecturer_id.map(encode_uuid);

    let changed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE students SET advisor_id = ?2 WHERE student_id = ?1",
          rusqlite::params![id_str, advisor_str],
        )?)
      })
      .await?;

    if changed == 0 {
      return Err(Error::StudentNotFound(student_id));
    }
    Ok(())
  }
}

impl Directory for SqliteReferenceStore {
  type Error = Error;

  async fn is_advisor_of(&self, lecturer_id: Uuid, student_id: Uuid) -> Result<bool> {
    let student_str  = encode_uuid(student_id);
    let lecturer_str = encode_uuid(lecturer_id);

    let found = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT 1 FROM students WHERE student_id = ?1 AND advisor_id = ?2",
              rusqlite::params![student_str, lecturer_str],
              |_| Ok(()),
            )
            .optional()?
            .is_some(),
        )
      })
      .await?;

    Ok(found)
  }

  async fn advisees_of(&self, lecturer_id: Uuid) -> Result<Vec<Uuid>> {
    let lecturer_str = encode_uuid(lecturer_id);

    let ids: Vec<String> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT student_id FROM students WHERE advisor_id = ?1 ORDER BY student_id",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![lecturer_str], |row| row.get(0))?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    ids.iter().map(|s| decode_uuid(s)).collect()
  }
}
