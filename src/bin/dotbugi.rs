use chrono::Utc;
use dotbugi_core::digest::{summarize_assigns, summarize_quizzes, summarize_vods, time_ago};
use dotbugi_core::{Activation, Config, FileStore, LmsClient, Reconciler, ScraperError};
use serde_json::json;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "dotbugi_core=info,dotbugi=info".to_string()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = Config::from_env()?;
    if config.session_cookie.is_none() {
        return Err(ScraperError::ConfigError(
            "LMS_SESSION_COOKIE is not set; copy the Cookie header of a logged-in browser session"
                .to_string(),
        )
        .into());
    }

    let offset = config.lms_offset()?;
    let client = LmsClient::from_config(&config)?;
    let store = FileStore::new(&config.store_dir);
    let mut reconciler = Reconciler::new(Arc::new(client), Arc::new(store), config.refresh_policy());

    let courses = match reconciler.enumerate_courses().await {
        Ok(courses) => courses,
        Err(e) if e.is_network() => {
            warn!(error = %e, "dashboard unavailable, using the stored course list");
            reconciler.stored_courses().await?
        }
        Err(e) => return Err(e.into()),
    };
    info!(courses = courses.len(), "courses enumerated");

    let now = Utc::now().with_timezone(&offset);
    let report = match reconciler.activate(&courses, now).await? {
        Activation::Refreshed(report) => json!({
            "refreshed": report.refreshed,
            "skipped": report.skipped,
            "committed": report.committed,
            "failures": report
                .failures
                .iter()
                .map(|f| json!({ "courseId": f.course.course_id, "error": f.error.to_string() }))
                .collect::<Vec<_>>(),
        }),
        Activation::LoadedFromCache => json!("cached"),
    };

    let state = reconciler.state();
    let output = json!({
        "activation": report,
        "lastRefreshAgo": state.last_refresh.map(|last| time_ago(last, now.timestamp_millis())),
        "summary": {
            "vods": summarize_vods(&state.vods),
            "assigns": summarize_assigns(&state.assigns),
            "quizzes": summarize_quizzes(&state.quizzes),
        },
        "state": state,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);

    Ok(())
}
