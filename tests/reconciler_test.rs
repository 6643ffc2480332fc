// tests/reconciler_test.rs

mod common;

use async_trait::async_trait;
use common::{CoursePages, FakeLms, course_card, dashboard_page, kst};
use dotbugi_core::reconciler::merge_course_data;
use dotbugi_core::store::{keys, load_json};
use dotbugi_core::{
    Activation, AssignItem, CourseData, CourseRef, MemoryStore, Reconciler, RefreshPolicy, Result,
    ScraperError, Storage, Vod, VodAttendanceRecord, VodLectureItem,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// In-memory store whose writes to one chosen key fail.
#[derive(Default)]
struct BrokenKeyStore {
    inner: MemoryStore,
    broken: Mutex<Option<&'static str>>,
}

impl BrokenKeyStore {
    fn break_key(&self, key: &'static str) {
        *self.broken.lock().unwrap() = Some(key);
    }
}

#[async_trait]
impl Storage for BrokenKeyStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        if *self.broken.lock().unwrap() == Some(key) {
            return Err(ScraperError::StorageError(format!("disk full writing {key}")));
        }
        self.inner.set(key, value).await
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.inner.remove(key).await
    }
}

fn course(id: &str, title: &str) -> CourseRef {
    CourseRef {
        course_id: id.to_string(),
        course_title: title.to_string(),
        professor: "교수".to_string(),
    }
}

fn two_course_lms() -> FakeLms {
    FakeLms::new(dashboard_page(&[
        course_card("1", "학부", "Alpha", "김교수"),
        course_card("2", "학부", "Beta", "이교수"),
    ]))
    .with_course("1", CoursePages::simple("Alpha"))
    .with_course("2", CoursePages::simple("Beta"))
}

fn lecture(title: &str, week: u32) -> VodLectureItem {
    VodLectureItem {
        week,
        subject: format!("{}주차", week),
        title: title.to_string(),
        url: format!("https://learn.hansung.ac.kr/mod/vod/view.php?id={}", week),
        range: Some("2024-03-01 00:00:00 ~ 2024-03-31 23:59:59".to_string()),
        length: "10:00".to_string(),
    }
}

fn attendance(title: &str, week: u32, status: &str) -> VodAttendanceRecord {
    VodAttendanceRecord {
        title: title.to_string(),
        is_attendance: status.to_string(),
        weekly_attendance: status.to_string(),
        week,
    }
}

#[test]
fn test_join_requires_same_title_and_week() {
    let data = CourseData {
        vod_lectures: vec![lecture("Review", 1), lecture("Review", 2), lecture("Orphan", 3)],
        vod_attendance: vec![
            attendance("Review", 2, "x"),
            attendance("Review", 1, "o"),
            attendance("Orphan", 4, "o"),
        ],
        ..Default::default()
    };

    let merged = merge_course_data(&[(course("1", "Alpha"), data)], None);

    let joined: Vec<(u32, &str)> = merged
        .vods
        .iter()
        .map(|v| (v.week, v.is_attendance.as_str()))
        .collect();
    assert_eq!(joined, [(1, "o"), (2, "x")]);
    println!("✅ No cross-join between weeks");
}

#[test]
fn test_merge_is_idempotent_on_repeated_input() {
    let alpha = course("1", "Alpha");
    let data = CourseData {
        vod_lectures: vec![lecture("Intro", 1)],
        vod_attendance: vec![attendance("Intro", 1, "o")],
        assigns: vec![
            AssignItem {
                subject: "1주차".to_string(),
                title: "Essay".to_string(),
                url: "https://learn.hansung.ac.kr/mod/assign/view.php?id=1".to_string(),
                is_submit: false,
                due_date: Some("2024-03-20 23:59".to_string()),
            };
            2
        ],
        ..Default::default()
    };

    let once = merge_course_data(&[(alpha.clone(), data.clone())], None);
    let twice = merge_course_data(&[(alpha.clone(), data.clone()), (alpha, data)], None);

    assert_eq!(once.vods.len(), 1);
    assert_eq!(once.assigns.len(), 1, "duplicate rows collapse");
    assert_eq!(once, twice);
}

#[test]
fn test_relevance_filter_at_merge() {
    let data = CourseData {
        vod_lectures: vec![lecture("Current", 1)],
        vod_attendance: vec![attendance("Current", 1, "o")],
        assigns: vec![AssignItem {
            subject: String::new(),
            title: "Expired".to_string(),
            url: "https://learn.hansung.ac.kr/mod/assign/view.php?id=9".to_string(),
            is_submit: true,
            due_date: Some("2024-02-01 00:00".to_string()),
        }],
        ..Default::default()
    };
    let courses = [(course("1", "Alpha"), data)];

    let filtered = merge_course_data(&courses, Some(kst(2024, 3, 15, 12, 0).naive_local()));
    let unfiltered = merge_course_data(&courses, None);

    assert_eq!(filtered.vods.len(), 1);
    assert!(filtered.assigns.is_empty());
    assert_eq!(unfiltered.assigns.len(), 1);
}

#[tokio::test]
async fn test_activation_refreshes_then_loads_from_cache() -> Result<()> {
    let lms = Arc::new(two_course_lms());
    let store = Arc::new(MemoryStore::new());
    let mut reconciler = Reconciler::new(lms.clone(), store.clone(), RefreshPolicy::default());

    let courses = reconciler.enumerate_courses().await?;
    assert_eq!(courses.len(), 2);

    let now = kst(2024, 3, 15, 12, 0);
    let activation = reconciler.activate(&courses, now).await?;
    let Activation::Refreshed(report) = activation else {
        panic!("first activation must refresh");
    };
    assert!(report.is_complete());
    assert_eq!(report.refreshed, 2);

    let state = reconciler.state();
    assert_eq!(state.vods.len(), 2);
    assert_eq!(state.assigns.len(), 2);
    assert_eq!(state.quizzes.len(), 2);
    assert_eq!(state.last_refresh, Some(now.timestamp_millis()));
    assert!(!state.is_error && !state.is_pending);

    let stored_vods: Vec<Vod> = load_json(store.as_ref(), keys::VODS).await?.unwrap_or_default();
    assert_eq!(stored_vods.len(), 2);
    assert_eq!(
        reconciler.last_refresh().await?,
        Some(now.timestamp_millis())
    );

    let fetches = lms.fetches();
    let later = kst(2024, 3, 15, 18, 0);
    let activation = reconciler.activate(&courses, later).await?;
    assert!(matches!(activation, Activation::LoadedFromCache));
    assert_eq!(lms.fetches(), fetches, "fresh cache must not hit the LMS");
    assert_eq!(reconciler.state().vods.len(), 2);

    println!("✅ Refreshed once, then served {} vods from cache", reconciler.state().vods.len());
    Ok(())
}

#[tokio::test]
async fn test_cached_load_drops_expired_items() -> Result<()> {
    let lms = Arc::new(two_course_lms());
    let store = Arc::new(MemoryStore::new());
    let mut reconciler = Reconciler::new(lms, store, RefreshPolicy::default());
    let courses = reconciler.enumerate_courses().await?;

    reconciler.refresh(&courses, kst(2024, 3, 15, 12, 0)).await?;
    // Assignments close on the 20th, quizzes on the 25th.
    reconciler.load_cached(kst(2024, 3, 22, 12, 0).naive_local()).await?;

    let state = reconciler.state();
    assert!(state.assigns.is_empty());
    assert_eq!(state.quizzes.len(), 2);
    assert_eq!(state.vods.len(), 2);
    Ok(())
}

#[tokio::test]
async fn test_failed_course_keeps_previous_records() -> Result<()> {
    let lms = Arc::new(two_course_lms());
    let store = Arc::new(MemoryStore::new());
    let mut reconciler = Reconciler::new(lms.clone(), store.clone(), RefreshPolicy::default());
    let courses = reconciler.enumerate_courses().await?;

    reconciler.refresh(&courses, kst(2024, 3, 15, 12, 0)).await?;

    lms.fail_course("2");
    let report = reconciler.refresh(&courses, kst(2024, 3, 15, 14, 0)).await?;

    assert!(report.committed);
    assert_eq!(report.refreshed, 1);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].course.course_id, "2");
    assert!(report.failures[0].error.is_network());

    let state = reconciler.state();
    assert!(state.is_error);
    assert_eq!(state.last_refresh, None);
    assert_eq!(state.vods.len(), 2, "Beta lecture carried over");
    assert!(state.assigns.iter().any(|a| a.course.course_id == "2"));
    assert_eq!(store.get(keys::LAST_REFRESH).await?, None);

    // Without a timestamp the next activation retries.
    lms.heal_course("2");
    let activation = reconciler.activate(&courses, kst(2024, 3, 15, 14, 5)).await?;
    let Activation::Refreshed(report) = activation else {
        panic!("cleared timestamp must force a refresh");
    };
    assert!(report.is_complete());
    assert!(!reconciler.state().is_error);

    println!("✅ Course failure isolated, retried on next activation");
    Ok(())
}

#[tokio::test]
async fn test_all_courses_failing_commits_nothing() -> Result<()> {
    let lms = Arc::new(two_course_lms());
    let store = Arc::new(MemoryStore::new());
    let mut reconciler = Reconciler::new(lms.clone(), store.clone(), RefreshPolicy::default());
    let courses = reconciler.enumerate_courses().await?;

    reconciler.refresh(&courses, kst(2024, 3, 15, 12, 0)).await?;
    let before = store.get(keys::ASSIGNS).await?;

    lms.fail_course("1");
    lms.fail_course("2");
    let report = reconciler.refresh(&courses, kst(2024, 3, 15, 14, 0)).await?;

    assert!(!report.committed);
    assert_eq!(report.failures.len(), 2);
    assert_eq!(store.get(keys::ASSIGNS).await?, before);
    assert_eq!(store.get(keys::LAST_REFRESH).await?, None);

    let state = reconciler.state();
    assert!(state.is_error);
    assert_eq!(state.assigns.len(), 2, "previous data stays visible");
    Ok(())
}

#[tokio::test]
async fn test_concurrent_courses_are_capped() -> Result<()> {
    let mut lms = FakeLms::new(dashboard_page(&[])).with_latency(Duration::from_millis(30));
    let mut courses = Vec::new();
    for id in 1..=6 {
        let id = id.to_string();
        lms = lms.with_course(&id, CoursePages::simple(&id));
        courses.push(course(&id, &format!("Course {}", id)));
    }
    let lms = Arc::new(lms);

    let policy = RefreshPolicy {
        max_concurrent_courses: 2,
        ..RefreshPolicy::default()
    };
    let mut reconciler = Reconciler::new(lms.clone(), Arc::new(MemoryStore::new()), policy);

    let report = reconciler.refresh(&courses, kst(2024, 3, 15, 12, 0)).await?;

    assert_eq!(report.refreshed, 6);
    assert!(lms.max_in_flight() >= 1);
    assert!(
        lms.max_in_flight() <= 2,
        "{} courses aggregated at once",
        lms.max_in_flight()
    );

    let ids: Vec<&str> = reconciler
        .state()
        .vods
        .iter()
        .map(|v| v.course.course_id.as_str())
        .collect();
    assert_eq!(ids, ["1", "2", "3", "4", "5", "6"], "merged in course order");
    Ok(())
}

#[tokio::test]
async fn test_activation_without_courses_loads_cache() -> Result<()> {
    let lms = Arc::new(two_course_lms());
    let mut reconciler = Reconciler::new(
        lms.clone(),
        Arc::new(MemoryStore::new()),
        RefreshPolicy::default(),
    );

    let activation = reconciler.activate(&[], kst(2024, 3, 15, 12, 0)).await?;

    assert!(matches!(activation, Activation::LoadedFromCache));
    assert_eq!(lms.fetches(), 0);
    assert!(reconciler.state().vods.is_empty());
    assert!(reconciler.stored_courses().await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_failed_write_leaves_stored_collections_intact() -> Result<()> {
    let lms = Arc::new(two_course_lms());
    let store = Arc::new(BrokenKeyStore::default());
    let mut reconciler = Reconciler::new(lms.clone(), store.clone(), RefreshPolicy::default());
    let courses = reconciler.enumerate_courses().await?;
    reconciler.refresh(&courses, kst(2024, 3, 15, 12, 0)).await?;

    let mut before = Vec::new();
    for key in [keys::VODS, keys::ASSIGNS, keys::QUIZZES, keys::COURSES] {
        before.push(store.get(key).await?);
    }

    // Refreshing only Alpha would shrink every collection if it went through.
    store.break_key(keys::ASSIGNS);
    let result = reconciler.refresh(&courses[..1], kst(2024, 3, 15, 14, 0)).await;

    assert!(matches!(result, Err(ScraperError::StorageError(_))));
    let mut after = Vec::new();
    for key in [keys::VODS, keys::ASSIGNS, keys::QUIZZES, keys::COURSES] {
        after.push(store.get(key).await?);
    }
    assert_eq!(after, before, "no collection is left half written");
    assert_eq!(store.get(keys::LAST_REFRESH).await?, None);
    assert!(reconciler.state().is_error);

    let vods: Vec<Vod> = load_json(store.as_ref(), keys::VODS).await?.unwrap_or_default();
    assert_eq!(vods.len(), 2);
    println!("✅ Failed write rolled back, {} lectures kept", vods.len());
    Ok(())
}

#[tokio::test]
async fn test_refresh_without_courses_keeps_stored_data() -> Result<()> {
    let lms = Arc::new(two_course_lms());
    let store = Arc::new(MemoryStore::new());
    let mut reconciler = Reconciler::new(lms.clone(), store.clone(), RefreshPolicy::default());
    let courses = reconciler.enumerate_courses().await?;
    reconciler.refresh(&courses, kst(2024, 3, 15, 12, 0)).await?;

    let stamp = store.get(keys::LAST_REFRESH).await?;
    let assigns = store.get(keys::ASSIGNS).await?;
    let fetches = lms.fetches();

    let report = reconciler.refresh(&[], kst(2024, 3, 15, 14, 0)).await?;

    assert!(!report.committed);
    assert_eq!(report.refreshed, 0);
    assert_eq!(lms.fetches(), fetches);
    assert!(stamp.is_some());
    assert_eq!(store.get(keys::LAST_REFRESH).await?, stamp);
    assert_eq!(store.get(keys::ASSIGNS).await?, assigns);
    assert_eq!(reconciler.stored_courses().await?.len(), 2);

    let state = reconciler.state();
    assert!(!state.is_error);
    assert_eq!(state.vods.len(), 2);
    assert_eq!(state.assigns.len(), 2);
    Ok(())
}

#[tokio::test]
async fn test_unusable_stored_stamp_forces_refresh() -> Result<()> {
    let lms = Arc::new(two_course_lms());
    let store = Arc::new(MemoryStore::new());
    store.set(keys::LAST_REFRESH, &i64::MIN.to_string()).await?;
    let mut reconciler = Reconciler::new(lms.clone(), store.clone(), RefreshPolicy::default());
    let courses = reconciler.enumerate_courses().await?;

    let activation = reconciler.activate(&courses, kst(2024, 3, 15, 12, 0)).await?;
    assert!(matches!(activation, Activation::Refreshed(_)));

    let future = kst(2030, 1, 1, 0, 0).timestamp_millis();
    store.set(keys::LAST_REFRESH, &future.to_string()).await?;
    let activation = reconciler.activate(&courses, kst(2024, 3, 15, 13, 0)).await?;
    assert!(matches!(activation, Activation::Refreshed(_)));
    Ok(())
}
