//! The course-data reconciler: decides when to refetch, aggregates every
//! course, merges and deduplicates the results, and persists them.

use crate::aggregator::request_data;
use crate::client::PageSource;
use crate::error::{Result, ScraperError};
use crate::models::{Assign, CourseData, CourseRef, Quiz, Vod};
use crate::parsers;
use crate::relevance::{is_due_not_past, is_now_in_range};
use crate::store::{Storage, keys, load_json, save_json, set_all};
use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeDelta};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

/// When to refresh and how hard to hit the LMS while doing it.
#[derive(Debug, Clone)]
pub struct RefreshPolicy {
    /// Cached data older than this is refetched on activation.
    pub staleness: TimeDelta,
    /// Courses aggregated at the same time; each one issues four requests.
    pub max_concurrent_courses: usize,
    /// Drop records that are no longer current while merging.
    pub filter_at_merge: bool,
}

impl Default for RefreshPolicy {
    fn default() -> Self {
        Self {
            staleness: TimeDelta::hours(24),
            max_concurrent_courses: 4,
            filter_at_merge: true,
        }
    }
}

impl RefreshPolicy {
    /// A refresh is due when there is no usable timestamp or at least
    /// `staleness` has elapsed since it.
    pub fn is_stale(&self, last_refresh_ms: Option<i64>, now_ms: i64) -> bool {
        match last_refresh_ms {
            None => true,
            // A stamp from the future or one too far back to subtract is
            // treated as unusable.
            Some(last) => match now_ms.checked_sub(last) {
                Some(elapsed) if elapsed >= 0 => elapsed >= self.staleness.num_milliseconds(),
                _ => true,
            },
        }
    }
}

/// The three merged collections.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Collections {
    pub vods: Vec<Vod>,
    pub assigns: Vec<Assign>,
    pub quizzes: Vec<Quiz>,
}

impl Collections {
    /// Keeps lectures whose eligibility window contains `now` and
    /// assignments/quizzes whose deadline has not passed.
    pub fn retain_current(&mut self, now: NaiveDateTime) {
        self.vods.retain(|v| is_now_in_range(v.range.as_deref(), now));
        self.assigns
            .retain(|a| is_due_not_past(a.due_date.as_deref(), now));
        self.quizzes
            .retain(|q| is_due_not_past(q.due_date.as_deref(), now));
    }

    pub fn is_empty(&self) -> bool {
        self.vods.is_empty() && self.assigns.is_empty() && self.quizzes.is_empty()
    }
}

/// Accumulates records for one refresh pass. The first record seen for a
/// composite key wins; later ones with the same key are ignored.
#[derive(Debug, Default)]
pub struct Merger {
    relevant_at: Option<NaiveDateTime>,
    seen_vods: HashSet<String>,
    seen_assigns: HashSet<String>,
    seen_quizzes: HashSet<String>,
    merged: Collections,
}

impl Merger {
    /// A merger that keeps everything.
    pub fn new() -> Self {
        Self::default()
    }

    /// A merger that also drops records not current at `now`.
    pub fn relevant_at(now: NaiveDateTime) -> Self {
        Self::with_relevance(Some(now))
    }

    /// A merger that filters by relevance only when `relevant_at` is set.
    pub fn with_relevance(relevant_at: Option<NaiveDateTime>) -> Self {
        Self {
            relevant_at,
            ..Self::default()
        }
    }

    /// Joins lectures with attendance rows on `(title, week)` and adds the
    /// joined lectures, assignments and quizzes of one course.
    pub fn add_course(&mut self, course: &CourseRef, data: &CourseData) {
        for lecture in &data.vod_lectures {
            for attendance in data
                .vod_attendance
                .iter()
                .filter(|a| a.title == lecture.title && a.week == lecture.week)
            {
                self.add_vod(Vod::join(course, lecture, attendance));
            }
        }
        for item in &data.assigns {
            self.add_assign(Assign::new(course, item.clone()));
        }
        for item in &data.quizzes {
            self.add_quiz(Quiz::new(course, item.clone()));
        }
    }

    /// Returns whether the record was kept.
    pub fn add_vod(&mut self, vod: Vod) -> bool {
        if let Some(now) = self.relevant_at {
            if !is_now_in_range(vod.range.as_deref(), now) {
                return false;
            }
        }
        if !self.seen_vods.insert(vod.key()) {
            return false;
        }
        self.merged.vods.push(vod);
        true
    }

    pub fn add_assign(&mut self, assign: Assign) -> bool {
        if let Some(now) = self.relevant_at {
            if !is_due_not_past(assign.due_date.as_deref(), now) {
                return false;
            }
        }
        if !self.seen_assigns.insert(assign.key()) {
            return false;
        }
        self.merged.assigns.push(assign);
        true
    }

    pub fn add_quiz(&mut self, quiz: Quiz) -> bool {
        if let Some(now) = self.relevant_at {
            if !is_due_not_past(quiz.due_date.as_deref(), now) {
                return false;
            }
        }
        if !self.seen_quizzes.insert(quiz.key()) {
            return false;
        }
        self.merged.quizzes.push(quiz);
        true
    }

    pub fn finish(self) -> Collections {
        self.merged
    }
}

/// Merges per-course aggregation results in the given order.
pub fn merge_course_data(
    results: &[(CourseRef, CourseData)],
    relevant_at: Option<NaiveDateTime>,
) -> Collections {
    merger_for(results, relevant_at).finish()
}

fn merger_for(
    results: &[(CourseRef, CourseData)],
    relevant_at: Option<NaiveDateTime>,
) -> Merger {
    let mut merger = Merger::with_relevance(relevant_at);
    for (course, data) in results {
        merger.add_course(course, data);
    }
    merger
}

/// A course whose aggregation failed during a refresh.
#[derive(Debug)]
pub struct CourseFailure {
    pub course: CourseRef,
    pub error: ScraperError,
}

/// Outcome of one refresh pass.
#[derive(Debug, Default)]
pub struct RefreshReport {
    /// Courses aggregated successfully.
    pub refreshed: usize,
    pub failures: Vec<CourseFailure>,
    /// Malformed entries the parsers dropped across all courses.
    pub skipped: usize,
    /// Whether new collections were written to storage.
    pub committed: bool,
}

impl RefreshReport {
    pub fn is_complete(&self) -> bool {
        self.committed && self.failures.is_empty()
    }
}

/// What an activation did.
#[derive(Debug)]
pub enum Activation {
    Refreshed(RefreshReport),
    LoadedFromCache,
}

/// In-memory view the UI renders from.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcilerState {
    pub vods: Vec<Vod>,
    pub assigns: Vec<Assign>,
    pub quizzes: Vec<Quiz>,
    /// Unix milliseconds of the last complete refresh.
    pub last_refresh: Option<i64>,
    pub is_error: bool,
    pub is_pending: bool,
}

impl ReconcilerState {
    fn replace(&mut self, collections: Collections) {
        self.vods = collections.vods;
        self.assigns = collections.assigns;
        self.quizzes = collections.quizzes;
    }
}

pub struct Reconciler {
    source: Arc<dyn PageSource>,
    store: Arc<dyn Storage>,
    policy: RefreshPolicy,
    state: ReconcilerState,
}

impl Reconciler {
    pub fn new(source: Arc<dyn PageSource>, store: Arc<dyn Storage>, policy: RefreshPolicy) -> Self {
        Self {
            source,
            store,
            policy,
            state: ReconcilerState::default(),
        }
    }

    pub fn state(&self) -> &ReconcilerState {
        &self.state
    }

    pub fn policy(&self) -> &RefreshPolicy {
        &self.policy
    }

    /// Reads the enrolled courses off the dashboard and persists them.
    pub async fn enumerate_courses(&self) -> Result<Vec<CourseRef>> {
        let html = self.source.fetch_dashboard().await?;
        let parsed = parsers::parse_courses_from_html(&html, self.source.base_url())?;
        if !parsed.skipped.is_empty() {
            info!(skipped = parsed.skipped.len(), "incomplete course cards dropped");
        }
        save_json(self.store.as_ref(), keys::COURSES, &parsed.records).await?;
        Ok(parsed.records)
    }

    /// Courses saved by the last enumeration.
    pub async fn stored_courses(&self) -> Result<Vec<CourseRef>> {
        Ok(load_json(self.store.as_ref(), keys::COURSES)
            .await?
            .unwrap_or_default())
    }

    /// Unix milliseconds of the last complete refresh, if one is recorded.
    pub async fn last_refresh(&self) -> Result<Option<i64>> {
        let raw = self.store.get(keys::LAST_REFRESH).await?;
        Ok(raw.as_deref().and_then(parse_timestamp))
    }

    /// Refreshes when the cached data is stale, otherwise loads it.
    pub async fn activate(
        &mut self,
        courses: &[CourseRef],
        now: DateTime<FixedOffset>,
    ) -> Result<Activation> {
        let last = self.last_refresh().await?;
        self.state.last_refresh = last;

        if courses.is_empty() || !self.policy.is_stale(last, now.timestamp_millis()) {
            self.load_cached(now.naive_local()).await?;
            return Ok(Activation::LoadedFromCache);
        }

        info!(courses = courses.len(), last_refresh = ?last, "cached data is stale");
        Ok(Activation::Refreshed(self.refresh(courses, now).await?))
    }

    /// Loads the persisted collections and drops what is no longer current.
    pub async fn load_cached(&mut self, now: NaiveDateTime) -> Result<()> {
        let mut collections = self.load_persisted().await?;
        collections.retain_current(now);
        self.state.replace(collections);
        self.state.last_refresh = self.last_refresh().await?;
        Ok(())
    }

    /// Aggregates every course and replaces the collections.
    ///
    /// Courses are isolated from each other: a failed course keeps its
    /// previously persisted records and the timestamp is cleared so the next
    /// activation retries. Nothing is committed when every course fails.
    pub async fn refresh(
        &mut self,
        courses: &[CourseRef],
        now: DateTime<FixedOffset>,
    ) -> Result<RefreshReport> {
        self.state.is_pending = true;
        self.state.is_error = false;

        let result = self.run_refresh(courses, now).await;
        self.state.is_pending = false;

        match result {
            Ok(report) => {
                self.state.is_error = !report.failures.is_empty();
                Ok(report)
            }
            Err(e) => {
                error!(error = %e, "refresh aborted");
                self.state.is_error = true;
                self.state.last_refresh = None;
                if let Err(clear_error) = self.store.remove(keys::LAST_REFRESH).await {
                    warn!(error = %clear_error, "could not clear the refresh timestamp");
                }
                Err(e)
            }
        }
    }

    async fn run_refresh(
        &mut self,
        courses: &[CourseRef],
        now: DateTime<FixedOffset>,
    ) -> Result<RefreshReport> {
        if courses.is_empty() {
            info!("no courses to refresh, keeping the stored data");
            self.load_cached(now.naive_local()).await?;
            return Ok(RefreshReport::default());
        }

        let started = Instant::now();
        info!(courses = courses.len(), "refresh started");

        let mut report = RefreshReport::default();
        let mut successes = Vec::new();
        for (course, outcome) in self.aggregate_all(courses).await {
            match outcome {
                Ok(data) => {
                    report.skipped += data.skipped;
                    successes.push((course, data));
                }
                Err(error) => {
                    warn!(course_id = %course.course_id, error = %error, "course refresh failed");
                    report.failures.push(CourseFailure { course, error });
                }
            }
        }
        report.refreshed = successes.len();

        if successes.is_empty() {
            warn!("every course failed, keeping the previous data");
            self.store.remove(keys::LAST_REFRESH).await?;
            let mut previous = self.load_persisted().await?;
            previous.retain_current(now.naive_local());
            self.state.replace(previous);
            self.state.last_refresh = None;
            return Ok(report);
        }

        let relevant_at = self.policy.filter_at_merge.then(|| now.naive_local());
        let mut merger = merger_for(&successes, relevant_at);
        if !report.failures.is_empty() {
            let failed: HashSet<&str> = report
                .failures
                .iter()
                .map(|f| f.course.course_id.as_str())
                .collect();
            let previous = self.load_persisted().await?;
            carry_over(&mut merger, previous, &failed);
        }
        let collections = merger.finish();

        let store = self.store.as_ref();
        let entries = [
            (keys::VODS, serde_json::to_string(&collections.vods)?),
            (keys::ASSIGNS, serde_json::to_string(&collections.assigns)?),
            (keys::QUIZZES, serde_json::to_string(&collections.quizzes)?),
            (keys::COURSES, serde_json::to_string(courses)?),
        ];
        set_all(store, &entries).await?;

        if report.failures.is_empty() {
            let stamp = now.timestamp_millis();
            save_json(store, keys::LAST_REFRESH, &stamp).await?;
            self.state.last_refresh = Some(stamp);
        } else {
            store.remove(keys::LAST_REFRESH).await?;
            self.state.last_refresh = None;
        }

        info!(
            vods = collections.vods.len(),
            assigns = collections.assigns.len(),
            quizzes = collections.quizzes.len(),
            failed = report.failures.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "refresh committed"
        );
        self.state.replace(collections);
        report.committed = true;
        Ok(report)
    }

    /// Runs one aggregation per course, at most `max_concurrent_courses` at a
    /// time, and returns the outcomes in course order.
    async fn aggregate_all(&self, courses: &[CourseRef]) -> Vec<(CourseRef, Result<CourseData>)> {
        let semaphore = Arc::new(Semaphore::new(self.policy.max_concurrent_courses.max(1)));
        let mut tasks = JoinSet::new();
        let mut spawned = HashMap::new();

        for (position, course) in courses.iter().cloned().enumerate() {
            let source = Arc::clone(&self.source);
            let semaphore = Arc::clone(&semaphore);
            let course_id = course.course_id.clone();
            let handle = tasks.spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .map_err(|e| ScraperError::TaskFailed(e.to_string()))?;
                request_data(source.as_ref(), &course_id).await
            });
            spawned.insert(handle.id(), (position, course));
        }

        let mut outcomes = Vec::with_capacity(courses.len());
        while let Some(joined) = tasks.join_next_with_id().await {
            let (id, outcome) = match joined {
                Ok((id, outcome)) => (id, outcome),
                Err(join_error) => (
                    join_error.id(),
                    Err(ScraperError::TaskFailed(join_error.to_string())),
                ),
            };
            if let Some((position, course)) = spawned.remove(&id) {
                outcomes.push((position, course, outcome));
            }
        }

        outcomes.sort_by_key(|(position, _, _)| *position);
        outcomes
            .into_iter()
            .map(|(_, course, outcome)| (course, outcome))
            .collect()
    }

    async fn load_persisted(&self) -> Result<Collections> {
        let store = self.store.as_ref();
        Ok(Collections {
            vods: load_json(store, keys::VODS).await?.unwrap_or_default(),
            assigns: load_json(store, keys::ASSIGNS).await?.unwrap_or_default(),
            quizzes: load_json(store, keys::QUIZZES).await?.unwrap_or_default(),
        })
    }
}

/// Re-adds the previously persisted records of courses that failed this pass.
fn carry_over(merger: &mut Merger, previous: Collections, failed: &HashSet<&str>) {
    let mut carried = 0;
    for vod in previous.vods {
        if failed.contains(vod.course.course_id.as_str()) && merger.add_vod(vod) {
            carried += 1;
        }
    }
    for assign in previous.assigns {
        if failed.contains(assign.course.course_id.as_str()) && merger.add_assign(assign) {
            carried += 1;
        }
    }
    for quiz in previous.quizzes {
        if failed.contains(quiz.course.course_id.as_str()) && merger.add_quiz(quiz) {
            carried += 1;
        }
    }
    if carried > 0 {
        info!(carried, "kept previous records of failed courses");
    }
}

/// Accepts the stamp as a JSON number or a quoted decimal string.
fn parse_timestamp(raw: &str) -> Option<i64> {
    let raw = raw.trim().trim_matches('"');
    raw.parse().ok()
}
