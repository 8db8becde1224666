//! Integration tests for the SQLite stores against in-memory databases.

use std::sync::Arc;

use accolade_core::{
  Error as CoreError,
  achievement::{
    AchievementDetails, Attachment, CompetitionDetails, CompetitionLevel,
    DetailPatch, NewDetail, PublicationDetails,
  },
  lifecycle::Coordinator,
  reference::{Operation, ReferenceQuery, Status, StatusChange, TransitionOutcome},
  scope::Actor,
  store::{DetailStore, Directory, ReferenceStore},
};
use chrono::Utc;
use uuid::Uuid;

use crate::{Error, Lecturer, SqliteDetailStore, SqliteReferenceStore, Student};

async fn details() -> SqliteDetailStore {
  SqliteDetailStore::open_in_memory()
    .await
    .expect("in-memory detail store")
}

async fn references() -> SqliteReferenceStore {
  SqliteReferenceStore::open_in_memory()
    .await
    .expect("in-memory reference store")
}

fn competition(title: &str, tags: &[&str]) -> NewDetail {
  let mut input = NewDetail::new(
    title,
    AchievementDetails::Competition(CompetitionDetails {
      competition_name: Some(title.into()),
      level:            Some(CompetitionLevel::National),
      rank:             Some(1),
      medal:            Some("gold".into()),
      event_date:       None,
      location:         Some("Jakarta".into()),
      organizer:        None,
    }),
  );
  input.tags = tags.iter().map(|t| (*t).to_owned()).collect();
  input
}

fn attachment(name: &str) -> Attachment {
  Attachment {
    file_name:   name.into(),
    file_url:    format!("https://files.example.com/{name}"),
    file_type:   "application/pdf".into(),
    uploaded_at: Utc::now(),
  }
}

// ─── Detail documents ────────────────────────────────────────────────────────

#[tokio::test]
async fn insert_and_get_detail() {
  let s = details().await;
  let student = Uuid::new_v4();

  let detail = s
    .insert_detail(student, competition("Robotics Cup", &["robotics"]))
    .await
    .unwrap();
  assert_eq!(detail.student_id, student);
  assert_eq!(detail.points, 0);

  let fetched = s.get_detail(detail.detail_id, false).await.unwrap();
  assert_eq!(fetched, Some(detail));
}

#[tokio::test]
async fn get_detail_missing_returns_none() {
  let s = details().await;
  assert!(s.get_detail(Uuid::new_v4(), true).await.unwrap().is_none());
}

#[tokio::test]
async fn soft_deleted_detail_only_visible_with_history_flag() {
  let s = details().await;
  let detail = s
    .insert_detail(Uuid::new_v4(), competition("Hackathon", &[]))
    .await
    .unwrap();

  assert!(s.soft_delete(detail.detail_id).await.unwrap());
  assert!(s.get_detail(detail.detail_id, false).await.unwrap().is_none());

  let hidden = s.get_detail(detail.detail_id, true).await.unwrap().unwrap();
  let first_deleted_at = hidden.deleted_at.unwrap();

  // A second soft delete keeps the original timestamp.
  assert!(s.soft_delete(detail.detail_id).await.unwrap());
  let again = s.get_detail(detail.detail_id, true).await.unwrap().unwrap();
  assert_eq!(again.deleted_at, Some(first_deleted_at));

  assert!(!s.soft_delete(Uuid::new_v4()).await.unwrap());
}

#[tokio::test]
async fn update_detail_patches_given_fields_only() {
  let s = details().await;
  let detail = s
    .insert_detail(Uuid::new_v4(), competition("Hackathon", &["code"]))
    .await
    .unwrap();

  let publication = AchievementDetails::Publication(PublicationDetails {
    publication_type:  Some("journal".into()),
    publication_title: Some("On Hackathons".into()),
    authors:           vec!["A. Student".into()],
    publisher:         None,
    issn:              None,
  });
  let patch = DetailPatch {
    description: Some("Won first place".into()),
    details: Some(publication.clone()),
    ..DetailPatch::default()
  };

  let updated = s
    .update_detail(detail.detail_id, patch)
    .await
    .unwrap()
    .unwrap();
  assert_eq!(updated.title, "Hackathon");
  assert_eq!(updated.description, "Won first place");
  assert_eq!(updated.details, publication);
  assert_eq!(updated.tags, ["code"]);
  assert!(updated.updated_at > detail.updated_at);
  assert_eq!(updated.created_at, detail.created_at);
}

#[tokio::test]
async fn writes_skip_deleted_documents() {
  let s = details().await;
  let detail = s
    .insert_detail(Uuid::new_v4(), competition("Hackathon", &[]))
    .await
    .unwrap();
  s.soft_delete(detail.detail_id).await.unwrap();

  let patch = DetailPatch { title: Some("Renamed".into()), ..DetailPatch::default() };
  assert!(s.update_detail(detail.detail_id, patch).await.unwrap().is_none());
  assert!(!s.set_points(detail.detail_id, 10).await.unwrap());
  assert!(
    s.push_attachment(detail.detail_id, attachment("a.pdf"))
      .await
      .unwrap()
      .is_none()
  );
}

#[tokio::test]
async fn set_points_overwrites() {
  let s = details().await;
  let detail = s
    .insert_detail(Uuid::new_v4(), competition("Hackathon", &[]))
    .await
    .unwrap();

  assert!(s.set_points(detail.detail_id, 25).await.unwrap());
  assert!(s.set_points(detail.detail_id, 40).await.unwrap());
  let fetched = s.get_detail(detail.detail_id, false).await.unwrap().unwrap();
  assert_eq!(fetched.points, 40);
}

#[tokio::test]
async fn attachments_push_and_pull() {
  let s = details().await;
  let detail = s
    .insert_detail(Uuid::new_v4(), competition("Hackathon", &[]))
    .await
    .unwrap();

  let cert = attachment("certificate.pdf");
  let photo = attachment("photo.pdf");
  s.push_attachment(detail.detail_id, cert.clone()).await.unwrap();
  let both = s
    .push_attachment(detail.detail_id, photo.clone())
    .await
    .unwrap()
    .unwrap();
  assert_eq!(both.attachments, vec![cert.clone(), photo.clone()]);

  let one = s
    .pull_attachment(detail.detail_id, "certificate.pdf".into())
    .await
    .unwrap()
    .unwrap();
  assert_eq!(one.attachments, vec![photo]);

  let none = s
    .pull_attachment(detail.detail_id, "photo.pdf".into())
    .await
    .unwrap()
    .unwrap();
  assert!(none.attachments.is_empty());
}

#[tokio::test]
async fn find_by_tag_filters_and_orders() {
  let s = details().await;
  let alice = Uuid::new_v4();
  let bob = Uuid::new_v4();

  let first = s
    .insert_detail(alice, competition("Math Cup", &["math", "team"]))
    .await
    .unwrap();
  let second = s
    .insert_detail(alice, competition("Math Open", &["math"]))
    .await
    .unwrap();
  let bobs = s
    .insert_detail(bob, competition("Bob's Math", &["math"]))
    .await
    .unwrap();
  let deleted = s
    .insert_detail(alice, competition("Withdrawn", &["math"]))
    .await
    .unwrap();
  s.insert_detail(alice, competition("Chess", &["chess"]))
    .await
    .unwrap();
  s.soft_delete(deleted.detail_id).await.unwrap();

  let all = s.find_by_tag("math".into(), None, 10).await.unwrap();
  let ids: Vec<Uuid> = all.iter().map(|d| d.detail_id).collect();
  assert_eq!(ids, vec![bobs.detail_id, second.detail_id, first.detail_id]);

  let alices = s
    .find_by_tag("math".into(), Some(vec![alice]), 10)
    .await
    .unwrap();
  assert!(alices.iter().all(|d| d.student_id == alice));
  assert_eq!(alices.len(), 2);

  let limited = s.find_by_tag("math".into(), None, 1).await.unwrap();
  assert_eq!(limited.len(), 1);

  let nobody = s.find_by_tag("math".into(), Some(vec![]), 10).await.unwrap();
  assert!(nobody.is_empty());
}

// ─── Reference rows ──────────────────────────────────────────────────────────

#[tokio::test]
async fn insert_reference_is_draft_and_unique_per_detail() {
  let s = references().await;
  let student = Uuid::new_v4();
  let detail = Uuid::new_v4();

  let reference = s.insert_reference(student, detail).await.unwrap();
  assert_eq!(reference.status, Status::Draft);
  assert_eq!(s.get_reference(reference.reference_id).await.unwrap(), Some(reference.clone()));
  assert_eq!(s.get_reference_by_detail(detail).await.unwrap(), Some(reference));

  let dup = s.insert_reference(student, detail).await;
  assert!(matches!(dup, Err(Error::Database(_))));
}

#[tokio::test]
async fn transition_is_compare_and_swap() {
  let s = references().await;
  let reference = s
    .insert_reference(Uuid::new_v4(), Uuid::new_v4())
    .await
    .unwrap();
  let id = reference.reference_id;

  let submit = StatusChange::Submit { at: Utc::now() };
  let TransitionOutcome::Applied(submitted) =
    s.transition(id, submit.clone()).await.unwrap()
  else {
    panic!("first submit should apply");
  };
  assert_eq!(submitted.status, Status::Submitted);
  assert_eq!(submitted.submitted_at, Some(submit.at()));
  assert_eq!(submitted.updated_at, submit.at());

  assert_eq!(
    s.transition(id, submit).await.unwrap(),
    TransitionOutcome::Stale(Status::Submitted)
  );
  assert_eq!(
    s.transition(Uuid::new_v4(), StatusChange::Delete { at: Utc::now() })
      .await
      .unwrap(),
    TransitionOutcome::Missing
  );
}

#[tokio::test]
async fn transition_records_decisions() {
  let s = references().await;
  let verifier = Uuid::new_v4();

  let a = s.insert_reference(Uuid::new_v4(), Uuid::new_v4()).await.unwrap();
  let b = s.insert_reference(Uuid::new_v4(), Uuid::new_v4()).await.unwrap();
  for id in [a.reference_id, b.reference_id] {
    s.transition(id, StatusChange::Submit { at: Utc::now() }).await.unwrap();
  }

  let verify = StatusChange::Verify { at: Utc::now(), verifier_id: verifier };
  let TransitionOutcome::Applied(verified) =
    s.transition(a.reference_id, verify).await.unwrap()
  else {
    panic!("verify should apply");
  };
  assert_eq!(verified.verified_by, Some(verifier));
  assert!(verified.submitted_at.is_some());
  assert!(verified.rejection_note.is_none());

  let reject = StatusChange::Reject { at: Utc::now(), note: "no proof".into() };
  let TransitionOutcome::Applied(rejected) =
    s.transition(b.reference_id, reject).await.unwrap()
  else {
    panic!("reject should apply");
  };
  assert_eq!(rejected.status, Status::Rejected);
  assert_eq!(rejected.rejection_note.as_deref(), Some("no proof"));
  assert!(rejected.verified_at.is_some());
  assert!(rejected.verified_by.is_none());

  // Terminal rows accept nothing further.
  let stale = s
    .transition(a.reference_id, StatusChange::Submit { at: Utc::now() })
    .await
    .unwrap();
  assert_eq!(stale, TransitionOutcome::Stale(Status::Verified));
}

#[tokio::test]
async fn list_references_orders_and_filters() {
  let s = references().await;
  let alice = Uuid::new_v4();
  let bob = Uuid::new_v4();

  let a1 = s.insert_reference(alice, Uuid::new_v4()).await.unwrap();
  let a2 = s.insert_reference(alice, Uuid::new_v4()).await.unwrap();
  let b1 = s.insert_reference(bob, Uuid::new_v4()).await.unwrap();
  let a3 = s.insert_reference(alice, Uuid::new_v4()).await.unwrap();
  s.transition(a2.reference_id, StatusChange::Submit { at: Utc::now() })
    .await
    .unwrap();
  s.transition(a3.reference_id, StatusChange::Delete { at: Utc::now() })
    .await
    .unwrap();

  let alices = s
    .list_references(ReferenceQuery::for_student(alice))
    .await
    .unwrap();
  let ids: Vec<Uuid> = alices.iter().map(|r| r.reference_id).collect();
  assert_eq!(ids, vec![a2.reference_id, a1.reference_id]);

  let submitted = s
    .list_references(ReferenceQuery {
      status: Some(Status::Submitted),
      ..ReferenceQuery::default()
    })
    .await
    .unwrap();
  assert_eq!(submitted.len(), 1);
  assert_eq!(submitted[0].reference_id, a2.reference_id);

  let deleted = s
    .list_references(ReferenceQuery {
      status: Some(Status::Deleted),
      ..ReferenceQuery::default()
    })
    .await
    .unwrap();
  assert_eq!(deleted[0].reference_id, a3.reference_id);

  let everyone = s.list_references(ReferenceQuery::default()).await.unwrap();
  assert_eq!(everyone.len(), 3);
  assert_eq!(everyone[0].reference_id, b1.reference_id);

  let page = s
    .list_references(ReferenceQuery::default().page(1, 1))
    .await
    .unwrap();
  assert_eq!(page.len(), 1);
  assert_eq!(page[0].reference_id, a2.reference_id);

  let unknown = s
    .list_references(ReferenceQuery::for_student(Uuid::new_v4()))
    .await
    .unwrap();
  assert!(unknown.is_empty());
}

#[tokio::test]
async fn delete_reference_removes_row() {
  let s = references().await;
  let reference = s
    .insert_reference(Uuid::new_v4(), Uuid::new_v4())
    .await
    .unwrap();
  assert!(s.delete_reference(reference.reference_id).await.unwrap());
  assert!(!s.delete_reference(reference.reference_id).await.unwrap());
  assert!(s.get_reference(reference.reference_id).await.unwrap().is_none());
}

// ─── Directory ───────────────────────────────────────────────────────────────

fn lecturer() -> Lecturer {
  Lecturer {
    lecturer_id:     Uuid::new_v4(),
    user_id:         Uuid::new_v4(),
    lecturer_number: "L-001".into(),
    department:      "Informatics".into(),
  }
}

fn student(advisor_id: Option<Uuid>) -> Student {
  Student {
    student_id: Uuid::new_v4(),
    user_id: Uuid::new_v4(),
    student_number: "S-001".into(),
    program_study: "Computer Science".into(),
    academic_year: "2024".into(),
    advisor_id,
  }
}

#[tokio::test]
async fn directory_tracks_advisors() {
  let s = references().await;
  let l1 = lecturer();
  let l2 = lecturer();
  s.upsert_lecturer(&l1).await.unwrap();
  s.upsert_lecturer(&l2).await.unwrap();

  let s1 = student(Some(l1.lecturer_id));
  let s2 = student(None);
  s.upsert_student(&s1).await.unwrap();
  s.upsert_student(&s2).await.unwrap();

  assert!(s.is_advisor_of(l1.lecturer_id, s1.student_id).await.unwrap());
  assert!(!s.is_advisor_of(l2.lecturer_id, s1.student_id).await.unwrap());
  assert!(!s.is_advisor_of(l1.lecturer_id, s2.student_id).await.unwrap());
  assert_eq!(s.advisees_of(l1.lecturer_id).await.unwrap(), vec![s1.student_id]);
  assert!(s.advisees_of(l2.lecturer_id).await.unwrap().is_empty());

  s.assign_advisor(s2.student_id, Some(l1.lecturer_id)).await.unwrap();
  s.assign_advisor(s1.student_id, Some(l2.lecturer_id)).await.unwrap();
  assert_eq!(s.advisees_of(l1.lecturer_id).await.unwrap(), vec![s2.student_id]);
  assert!(s.is_advisor_of(l2.lecturer_id, s1.student_id).await.unwrap());
}

#[tokio::test]
async fn directory_rejects_unknown_ids() {
  let s = references().await;

  let err = s.assign_advisor(Uuid::new_v4(), None).await.unwrap_err();
  assert!(matches!(err, Error::StudentNotFound(_)));

  // The advisor must exist.
  let orphan = student(Some(Uuid::new_v4()));
  assert!(matches!(
    s.upsert_student(&orphan).await,
    Err(Error::Database(_))
  ));
}

#[tokio::test]
async fn upsert_student_replaces_fields() {
  let s = references().await;
  let mut s1 = student(None);
  s.upsert_student(&s1).await.unwrap();

  let l1 = lecturer();
  s.upsert_lecturer(&l1).await.unwrap();
  s1.advisor_id = Some(l1.lecturer_id);
  s1.academic_year = "2025".into();
  s.upsert_student(&s1).await.unwrap();

  assert!(s.is_advisor_of(l1.lecturer_id, s1.student_id).await.unwrap());
}

// ─── End to end through the coordinator ──────────────────────────────────────

struct Campus {
  coordinator: Coordinator<SqliteDetailStore, SqliteReferenceStore, SqliteReferenceStore>,
  details:     SqliteDetailStore,
  s1:          Actor,
  s1_id:       Uuid,
  l1:          Actor,
  l1_id:       Uuid,
  l2:          Actor,
}

async fn campus() -> Campus {
  let details = details().await;
  let references = Arc::new(references().await);

  let l1 = lecturer();
  let l2 = lecturer();
  references.upsert_lecturer(&l1).await.unwrap();
  references.upsert_lecturer(&l2).await.unwrap();
  let s1 = student(Some(l1.lecturer_id));
  references.upsert_student(&s1).await.unwrap();

  let coordinator = Coordinator::new(
    Arc::new(details.clone()),
    Arc::clone(&references),
    references,
  );

  Campus {
    coordinator,
    details,
    s1: Actor::Student { user_id: s1.user_id, student_id: s1.student_id },
    s1_id: s1.student_id,
    l1: Actor::Advisor { user_id: l1.user_id, lecturer_id: l1.lecturer_id },
    l1_id: l1.lecturer_id,
    l2: Actor::Advisor { user_id: l2.user_id, lecturer_id: l2.lecturer_id },
  }
}

#[tokio::test]
async fn olympiad_end_to_end() {
  let c = campus().await;
  let created = c
    .coordinator
    .create(&c.s1, c.s1_id, competition("Olympiad", &["math"]))
    .await
    .unwrap();
  let ref_a = created.reference_id();

  c.coordinator.submit(&c.s1, ref_a).await.unwrap();

  // L2 is not S1's advisor.
  let err = c.coordinator.verify(&c.l2, ref_a, 50).await.unwrap_err();
  assert!(matches!(err, CoreError::Forbidden(_)));

  let verified = c.coordinator.verify(&c.l1, ref_a, 50).await.unwrap();
  assert_eq!(verified.status, Status::Verified);
  assert_eq!(verified.verified_by, Some(c.l1_id));

  let detail = c
    .details
    .get_detail(created.detail_id(), false)
    .await
    .unwrap()
    .unwrap();
  assert_eq!(detail.points, 50);

  let err = c.coordinator.verify(&c.l1, ref_a, 30).await.unwrap_err();
  assert!(matches!(
    err,
    CoreError::InvalidTransition { current: Status::Verified, attempted: Operation::Verify }
  ));
}

#[tokio::test]
async fn rejection_end_to_end() {
  let c = campus().await;
  let created = c
    .coordinator
    .create(&c.s1, c.s1_id, competition("Regional Fair", &[]))
    .await
    .unwrap();
  let ref_b = created.reference_id();

  let err = c.coordinator.reject(&c.l1, ref_b, "too early").await.unwrap_err();
  assert!(matches!(err, CoreError::InvalidTransition { current: Status::Draft, .. }));

  c.coordinator.submit(&c.s1, ref_b).await.unwrap();
  let err = c.coordinator.reject(&c.l1, ref_b, "").await.unwrap_err();
  assert!(matches!(err, CoreError::Validation(_)));

  let rejected = c
    .coordinator
    .reject(&c.l1, ref_b, "insufficient evidence")
    .await
    .unwrap();
  assert_eq!(rejected.rejection_note.as_deref(), Some("insufficient evidence"));
}

#[tokio::test]
async fn delete_end_to_end_keeps_history() {
  let c = campus().await;
  let created = c
    .coordinator
    .create(&c.s1, c.s1_id, competition("Quiz Night", &["quiz"]))
    .await
    .unwrap();

  c.coordinator.delete(&c.s1, created.reference_id()).await.unwrap();

  assert!(
    c.coordinator
      .get_by_student(&c.s1, c.s1_id, 20, 0)
      .await
      .unwrap()
      .is_empty()
  );
  assert!(c.coordinator.find_by_tag(&c.s1, "quiz", 20).await.unwrap().is_empty());
  let history = c
    .coordinator
    .history(&c.l1, created.reference_id())
    .await
    .unwrap();
  assert_eq!(history.reference.status, Status::Deleted);
  assert!(history.detail.unwrap().deleted_at.is_some());
}

#[tokio::test]
async fn concurrent_submits_end_to_end() {
  let c = campus().await;
  let created = c
    .coordinator
    .create(&c.s1, c.s1_id, competition("Debate", &[]))
    .await
    .unwrap();
  let reference_id = created.reference_id();

  let tasks: Vec<_> = (0..4)
    .map(|_| {
      let coordinator = c.coordinator.clone();
      let actor = c.s1;
      tokio::spawn(async move { coordinator.submit(&actor, reference_id).await })
    })
    .collect();

  let mut wins = 0;
  for task in tasks {
    match task.await.unwrap() {
      Ok(_) => wins += 1,
      Err(e) => assert!(matches!(
        e,
        CoreError::InvalidTransition { current: Status::Submitted, .. }
      )),
    }
  }
  assert_eq!(wins, 1);
}
