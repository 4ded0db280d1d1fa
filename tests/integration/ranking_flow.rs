use std::collections::HashSet;
use std::sync::Arc;

use chrono::{NaiveDate, NaiveTime};
use studyhall_analytics_lib::db::store::SqliteStore;
use studyhall_analytics_lib::db::DbPool;
use studyhall_analytics_lib::models::attendance::AttendanceRecord;
use studyhall_analytics_lib::models::badge::{BadgeReport, BadgeType};
use studyhall_analytics_lib::models::settings::EngineSettings;
use studyhall_analytics_lib::models::student::Student;
use studyhall_analytics_lib::ports::memory::{MemoryRecordStore, MemoryStudentRegistry};
use studyhall_analytics_lib::services::badge_ranking_service::BadgeRankingService;
use studyhall_analytics_lib::services::monthly_ranking_service::MonthlyRankingService;
use studyhall_analytics_lib::services::settings_service::SettingsService;
use tempfile::tempdir;

fn date(raw: &str) -> NaiveDate {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").expect("date")
}

fn time(raw: &str) -> NaiveTime {
    NaiveTime::parse_from_str(raw, "%H:%M").expect("time")
}

fn visit(student: &str, day: &str, entry: &str, exit: &str) -> AttendanceRecord {
    AttendanceRecord::completed(student, date(day), time(entry), time(exit))
}

fn settings() -> Arc<SettingsService> {
    Arc::new(SettingsService::new(EngineSettings::default()).expect("settings"))
}

fn badge_ids(report: &BadgeReport, exam: bool, badge: BadgeType) -> Vec<(String, u32)> {
    let cohort = if exam { &report.exam_track } else { &report.general };
    cohort
        .get(&badge)
        .map(|badges| {
            badges
                .iter()
                .map(|badge| (badge.student_id.clone(), badge.rank))
                .collect()
        })
        .unwrap_or_default()
}

#[test]
fn monthly_ties_share_rank_and_widen_top_n() {
    let dir = tempdir().expect("temp dir");
    let pool = DbPool::new(dir.path().join("ranking.sqlite")).expect("db pool");
    let store = Arc::new(SqliteStore::new(pool));

    for student in [
        Student::new("A", "Aki", "regular"),
        Student::new("B", "Ben", "exam"),
        Student::new("C", "Cho", "regular"),
        Student::new("D", "Dev", "regular"),
    ] {
        store.upsert_student(&student).expect("student");
    }
    for record in [
        visit("A", "2025-11-03", "09:00", "12:00"),
        visit("A", "2025-11-20", "13:00", "15:00"),
        visit("B", "2025-11-05", "10:00", "15:00"),
        visit("C", "2025-11-07", "08:00", "12:10"),
        visit("D", "2025-11-30", "18:00", "19:40"),
        // Outside the month.
        visit("D", "2025-10-31", "09:00", "21:00"),
        visit("D", "2025-12-01", "09:00", "21:00"),
    ] {
        store.insert_record(&record).expect("record");
    }

    let service = MonthlyRankingService::new(store.clone(), store, settings());
    let ranking = service.leaderboard("2025-11", 2).expect("ranking");

    assert_eq!(ranking.start_date, date("2025-11-01"));
    assert_eq!(ranking.end_date, date("2025-11-30"));
    assert_eq!(ranking.total_students, 4);

    let rows: Vec<(&str, i64, u32)> = ranking
        .entries
        .iter()
        .map(|entry| (entry.student_id.as_str(), entry.total_minutes, entry.rank))
        .collect();
    assert_eq!(rows, vec![("A", 300, 1), ("B", 300, 1), ("C", 250, 3)]);
    assert_eq!(ranking.entries[0].visit_count, 2);
    assert_eq!(ranking.entries[1].visit_count, 1);
}

#[test]
fn monthly_ranking_skips_withdrawn_and_unknown_students() {
    let registry = Arc::new(MemoryStudentRegistry::new(vec![
        Student::new("A", "Aki", "regular"),
        Student::new("W", "Wes", "Withdrawn"),
    ]));
    let store = Arc::new(MemoryRecordStore::with_data(
        Vec::new(),
        vec![
            visit("A", "2025-11-03", "09:00", "10:00"),
            visit("W", "2025-11-03", "09:00", "20:00"),
            visit("ghost", "2025-11-04", "09:00", "20:00"),
            AttendanceRecord::open("A", date("2025-11-05"), time("09:00")),
        ],
    ));

    let service = MonthlyRankingService::new(store, registry, settings());
    let ranking = service.leaderboard("2025-11", 10).expect("ranking");

    assert_eq!(ranking.entries.len(), 1);
    assert_eq!(ranking.entries[0].student_id, "A");
    assert_eq!(ranking.entries[0].total_minutes, 60);
    assert_eq!(ranking.total_students, 1);
    assert_eq!(ranking.skipped_records, 2);
}

#[test]
fn rising_star_rewards_first_time_heavy_user() {
    let registry = Arc::new(MemoryStudentRegistry::new(vec![
        Student::new("new", "Nia", "regular"),
        Student::new("steady", "Sol", "regular"),
    ]));
    let store = Arc::new(MemoryRecordStore::with_data(
        Vec::new(),
        vec![
            visit("steady", "2025-11-05", "10:00", "11:40"),
            visit("steady", "2025-11-12", "10:00", "12:30"),
            visit("new", "2025-11-13", "14:00", "16:00"),
        ],
    ));

    let service = BadgeRankingService::new(store, registry, settings());
    let report = service
        .weekly_badges(date("2025-11-14"))
        .expect("badges");

    assert_eq!(report.week.start, date("2025-11-10"));
    assert_eq!(report.week.end, date("2025-11-16"));
    assert_eq!(report.previous_week.start, date("2025-11-03"));

    let rising = report
        .general
        .get(&BadgeType::RisingStar)
        .expect("rising star list");
    let scored: Vec<(&str, i64, u32)> = rising
        .iter()
        .map(|badge| (badge.student_id.as_str(), badge.value, badge.rank))
        .collect();
    assert_eq!(scored, vec![("new", 120, 1), ("steady", 50, 2)]);
}

#[test]
fn five_way_tie_fills_one_rank_slot() {
    let mut students: Vec<Student> = (1..=6)
        .map(|n| Student::new(format!("e{n}"), format!("Exam {n}"), "exam"))
        .collect();
    students.push(Student::new("g1", "Gen", "regular"));
    let mut records: Vec<AttendanceRecord> = (1..=5)
        .map(|n| visit(&format!("e{n}"), "2025-11-11", "10:00", "12:00"))
        .collect();
    records.push(visit("e6", "2025-11-11", "10:00", "11:00"));
    records.push(visit("g1", "2025-11-12", "10:00", "11:00"));

    let service = BadgeRankingService::new(
        Arc::new(MemoryRecordStore::with_data(Vec::new(), records)),
        Arc::new(MemoryStudentRegistry::new(students)),
        settings(),
    );
    let report = service.badges_from(date("2025-11-10")).expect("badges");

    let heavy = badge_ids(&report, true, BadgeType::HeavyUser);
    assert_eq!(heavy.len(), 5);
    assert!(heavy.iter().all(|(_, rank)| *rank == 1));
    assert!(!heavy.iter().any(|(id, _)| id == "e6"));

    for badge in BadgeType::ALL {
        let entries = badge_ids(&report, true, badge);
        let unique: HashSet<_> = entries.iter().map(|(id, _)| id.clone()).collect();
        assert_eq!(unique.len(), entries.len());
        assert!(entries.iter().all(|(_, rank)| *rank <= 3));
    }
}

#[test]
fn cohorts_are_scored_independently() {
    let students = vec![
        Student::new("e1", "Eri", "exam"),
        Student::new("e2", "Eli", "EXAM"),
        Student::new("g1", "Gus", "regular"),
        Student::new("g2", "Gia", "regular"),
        Student::new("w1", "Wyn", "withdrawn"),
    ];
    let records = vec![
        visit("e1", "2025-11-10", "06:30", "21:30"),
        visit("e2", "2025-11-11", "08:00", "12:00"),
        visit("g1", "2025-11-12", "07:00", "22:00"),
        visit("g2", "2025-11-13", "05:00", "09:00"),
        visit("w1", "2025-11-14", "04:00", "23:50"),
        visit("ghost", "2025-11-14", "04:00", "23:50"),
    ];

    let service = BadgeRankingService::new(
        Arc::new(MemoryRecordStore::with_data(Vec::new(), records)),
        Arc::new(MemoryStudentRegistry::new(students)),
        settings(),
    );
    let report = service.badges_from(date("2025-11-10")).expect("badges");

    assert_eq!(report.total_exam_students, 2);
    assert_eq!(report.total_general_students, 2);
    assert_eq!(report.skipped_records, 1);

    for badge in BadgeType::ALL {
        let exam: HashSet<String> = badge_ids(&report, true, badge)
            .into_iter()
            .map(|(id, _)| id)
            .collect();
        let general: HashSet<String> = badge_ids(&report, false, badge)
            .into_iter()
            .map(|(id, _)| id)
            .collect();
        assert!(exam.iter().all(|id| id.starts_with('e')));
        assert!(general.iter().all(|id| id.starts_with('g')));
        assert!(exam.is_disjoint(&general));
    }

    // Only in-band sessions compete for EARLY_BIRD; 09:00 and later is out.
    assert_eq!(
        badge_ids(&report, true, BadgeType::EarlyBird),
        vec![("e1".to_string(), 1), ("e2".to_string(), 2)]
    );
    assert_eq!(
        badge_ids(&report, false, BadgeType::EarlyBird),
        vec![("g2".to_string(), 1), ("g1".to_string(), 2)]
    );
    assert_eq!(
        badge_ids(&report, false, BadgeType::NightOwl),
        vec![("g1".to_string(), 1)]
    );
}

#[test]
fn empty_cohort_yields_empty_lists() {
    let service = BadgeRankingService::new(
        Arc::new(MemoryRecordStore::new()),
        Arc::new(MemoryStudentRegistry::new(vec![Student::new(
            "g1", "Gus", "regular",
        )])),
        settings(),
    );
    let report = service.badges_from(date("2025-11-10")).expect("badges");

    assert_eq!(report.total_exam_students, 0);
    assert!(BadgeType::ALL
        .iter()
        .all(|badge| report.exam_track.get(badge).map_or(true, Vec::is_empty)));
}
