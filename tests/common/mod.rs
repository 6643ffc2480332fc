// tests/common/mod.rs
//
// Inline LMS page fixtures and an in-memory page source.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, TimeZone};
use dotbugi_core::{Page, PageSource, Result, ScraperError};
use reqwest::{StatusCode, Url};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

pub const BASE_URL: &str = "https://learn.hansung.ac.kr";

pub fn base_url() -> Url {
    Url::parse(BASE_URL).unwrap()
}

pub fn page_url(path: &str) -> Url {
    base_url().join(path).unwrap()
}

/// A moment in LMS wall-clock time (UTC+9).
pub fn kst(year: i32, month: u32, day: u32, hour: u32, min: u32) -> DateTime<FixedOffset> {
    FixedOffset::east_opt(9 * 3600)
        .unwrap()
        .with_ymd_and_hms(year, month, day, hour, min, 0)
        .unwrap()
}

/// One lecture inside a week block of the course index page.
pub struct Lecture<'a> {
    pub title: &'a str,
    pub href: &'a str,
    pub range: &'a str,
    pub length: &'a str,
}

/// One week block of the course index page.
pub struct Week<'a> {
    pub name: &'a str,
    pub dimmed: bool,
    pub lectures: Vec<Lecture<'a>>,
}

pub fn vod_index_page(weeks: &[Week]) -> String {
    let mut sections = String::new();
    for week in weeks {
        let class = if week.dimmed {
            "section main dimmed"
        } else {
            "section main"
        };
        let mut activities = String::new();
        for lecture in &week.lectures {
            activities.push_str(&format!(
                r#"<li class="activity vod modtype_vod">
                     <div class="activityinstance">
                       <a href="{}"><span class="instancename">{}<span class="accesshide "> 동영상</span></span></a>
                       <span class="text-ubstrap">{}</span>
                       <span class="text-info">, {}</span>
                     </div>
                   </li>"#,
                lecture.href, lecture.title, lecture.range, lecture.length
            ));
        }
        let name = if week.name.is_empty() {
            String::new()
        } else {
            format!(r#"<h3 class="sectionname">{}</h3>"#, week.name)
        };
        sections.push_str(&format!(
            r#"<li class="{}"><div class="content">{}<ul class="section img-text">{}</ul></div></li>"#,
            class, name, activities
        ));
    }
    format!(
        r#"<html><body><div id="region-main"><div><div><div class="total_sections"><div><ul class="topics">{}</ul></div></div></div></div></div></body></html>"#,
        sections
    )
}

/// Attendance report with `rows` already written as `<tr>` markup.
pub fn attendance_page(rows: &str) -> String {
    format!(
        r#"<html><body>
        <table class="user_progress_table">
          <thead><tr><th>주차</th><th>강의 자료</th><th>열람 시간</th><th>출석</th><th>주차 출석</th></tr></thead>
          <tbody>{}</tbody>
        </table>
        </body></html>"#,
        rows
    )
}

/// Assignment index with columns 주제 | 과제 | 종료 일시 | 제출.
/// Each row is `(subject, title, href, due, status)`.
pub fn assign_page(rows: &[(&str, &str, &str, &str, &str)]) -> String {
    let body: String = rows
        .iter()
        .map(|(subject, title, href, due, status)| {
            format!(
                r#"<tr><td class="cell c0">{}</td><td class="cell c1"><a href="{}">{}</a></td><td class="cell c2">{}</td><td class="cell c3">{}</td></tr>"#,
                subject, href, title, due, status
            )
        })
        .collect();
    format!(
        r#"<html><body><table class="generaltable">
          <thead><tr><th class="header c0">주제</th><th class="header c1">과제</th><th class="header c2">종료 일시</th><th class="header c3">제출</th></tr></thead>
          <tbody>{}</tbody>
        </table></body></html>"#,
        body
    )
}

/// Quiz index with columns 주제 | 제목 | 종료 일시.
/// Each row is `(subject, title, href, due)`.
pub fn quiz_page(rows: &[(&str, &str, &str, &str)]) -> String {
    let body: String = rows
        .iter()
        .map(|(subject, title, href, due)| {
            format!(
                r#"<tr><td class="cell c0">{}</td><td class="cell c1"><a href="{}">{}</a></td><td class="cell c2">{}</td></tr>"#,
                subject, href, title, due
            )
        })
        .collect();
    format!(
        r#"<html><body><table class="generaltable">
          <thead><tr><th class="header c0">주제</th><th class="header c1">제목</th><th class="header c2">종료 일시</th></tr></thead>
          <tbody>{}</tbody>
        </table></body></html>"#,
        body
    )
}

/// Dashboard course card. `label` is the course-type badge.
pub fn course_card(id: &str, label: &str, title: &str, professor: &str) -> String {
    format!(
        r#"<div class="course_box">
             <a class="course_link" href="/course/view.php?id={}">
               <div class="course-name">
                 <div class="label"><span class="label-course">{}</span></div>
                 <div class="course-title"><h3>{}</h3><p>{}</p></div>
               </div>
             </a>
           </div>"#,
        id, label, title, professor
    )
}

pub fn dashboard_page(cards: &[String]) -> String {
    format!(
        r#"<html><body><div class="course_lists">{}</div></body></html>"#,
        cards.concat()
    )
}

/// The four pages of one fixture course.
#[derive(Clone, Default)]
pub struct CoursePages {
    pub vod_index: String,
    pub attendance: String,
    pub assigns: String,
    pub quizzes: String,
}

impl CoursePages {
    /// A course with one current lecture, one open assignment and one open
    /// quiz, all titled after `tag`. Dates are around March 2024.
    pub fn simple(tag: &str) -> Self {
        let lecture_title = format!("{} lecture", tag);
        let vod_index = vod_index_page(&[Week {
            name: "1주차",
            dimmed: false,
            lectures: vec![Lecture {
                title: &lecture_title,
                href: "/mod/vod/view.php?id=100",
                range: "2024-03-01 00:00:00 ~ 2024-03-31 23:59:59",
                length: "30:00",
            }],
        }]);
        let attendance = attendance_page(&format!(
            r#"<tr><td>1</td><td>{}</td><td>30:00</td><td>o</td><td>o</td></tr>"#,
            lecture_title
        ));
        let assigns = assign_page(&[(
            "1주차",
            &format!("{} report", tag),
            "view.php?id=200",
            "2024-03-20 23:59",
            "미제출",
        )]);
        let quizzes = quiz_page(&[(
            "1주차",
            &format!("{} quiz", tag),
            "view.php?id=300",
            "2024-03-25 23:59",
        )]);
        Self {
            vod_index,
            attendance,
            assigns,
            quizzes,
        }
    }
}

/// In-memory LMS: serves fixture pages, fails chosen courses, and records how
/// many courses were being aggregated at once.
pub struct FakeLms {
    base_url: Url,
    dashboard: String,
    courses: HashMap<String, CoursePages>,
    failing: Mutex<HashSet<String>>,
    latency: Duration,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    fetches: AtomicUsize,
}

impl FakeLms {
    pub fn new(dashboard: String) -> Self {
        Self {
            base_url: base_url(),
            dashboard,
            courses: HashMap::new(),
            failing: Mutex::new(HashSet::new()),
            latency: Duration::ZERO,
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            fetches: AtomicUsize::new(0),
        }
    }

    pub fn with_course(mut self, id: &str, pages: CoursePages) -> Self {
        self.courses.insert(id.to_string(), pages);
        self
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn fail_course(&self, id: &str) {
        self.failing.lock().unwrap().insert(id.to_string());
    }

    pub fn heal_course(&self, id: &str) {
        self.failing.lock().unwrap().remove(id);
    }

    /// Highest number of attendance pages fetched concurrently, i.e. courses
    /// aggregated at the same time.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PageSource for FakeLms {
    fn base_url(&self) -> &Url {
        &self.base_url
    }

    async fn fetch_page(&self, page: Page, course_id: &str) -> Result<String> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if self.failing.lock().unwrap().contains(course_id) {
            return Err(ScraperError::HttpStatus {
                status: StatusCode::SERVICE_UNAVAILABLE,
                url: self.page_url(page, course_id)?.to_string(),
            });
        }

        if page == Page::VodAttendance {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(self.latency).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
        }

        let pages = self.courses.get(course_id).cloned().unwrap_or_default();
        Ok(match page {
            Page::VodIndex => pages.vod_index,
            Page::VodAttendance => pages.attendance,
            Page::Assignments => pages.assigns,
            Page::Quizzes => pages.quizzes,
        })
    }

    async fn fetch_dashboard(&self) -> Result<String> {
        Ok(self.dashboard.clone())
    }
}
