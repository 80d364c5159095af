use chrono::{Duration, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use amend_core::{Comment, CommentKind, MemoryCollaborator, MentionCandidate};
use api_rest::{cors_from_env_value, router, AppState};

/// Amendment the demo thread is attached to.
const DEMO_AMENDMENT: i64 = 1;

fn demo_directory() -> Vec<MentionCandidate> {
    [
        (1, "Joanna Reyes"),
        (2, "Jonah Marsh"),
        (3, "Priya Shah"),
        (4, "Kofi Mensah"),
        (5, "Mia Lindqvist"),
    ]
    .into_iter()
    .map(|(employee_id, name)| MentionCandidate {
        employee_id,
        display_name: name.to_string(),
    })
    .collect()
}

/// Seed a short QA conversation so a fresh server has something to show.
fn seed_demo_thread(api: &MemoryCollaborator) {
    let start = Utc::now() - Duration::hours(3);
    let thread = [
        (1, None, 3, "Priya Shah", CommentKind::Issue, "Export to CSV drops the totals row."),
        (2, Some(1), 1, "Joanna Reyes", CommentKind::Question, "Which build did you test on?"),
        (3, Some(2), 3, "Priya Shah", CommentKind::General, "Build 2.4.1 on staging."),
        (4, Some(1), 2, "Jonah Marsh", CommentKind::Resolution, "Fixed in 2.4.2, ready for retest."),
    ];
    for (i, (id, parent_id, author_id, author_name, kind, body)) in thread.into_iter().enumerate() {
        api.seed_comment(
            DEMO_AMENDMENT,
            Comment {
                id,
                parent_id,
                author_id,
                author_name: author_name.to_string(),
                body_text: body.to_string(),
                kind,
                created_at: start + Duration::minutes(20 * i as i64),
                edited_flag: false,
                reaction_summary: BTreeMap::new(),
            },
        );
    }
}

/// Main entry point for the amendment discussion service
///
/// Serves the collaborator REST API over an in-memory store seeded with a demo employee
/// directory and one example thread.
///
/// # Environment Variables
/// - `AMEND_REST_ADDR`: REST server address (default: "0.0.0.0:3000")
/// - `CORS_ORIGINS`: Comma-separated allowed origins, `*` for any (default: "http://localhost:3000")
///
/// # Returns
/// * `Ok(())` - If the server starts and runs successfully
/// * `Err(anyhow::Error)` - If server startup or runtime fails
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env().add_directive("amend=info".parse()?))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let rest_addr = std::env::var("AMEND_REST_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into());
    let cors = cors_from_env_value(std::env::var("CORS_ORIGINS").ok())?;

    let api = Arc::new(MemoryCollaborator::with_directory(demo_directory()));
    seed_demo_thread(&api);
    tracing::info!(
        "++ Seeded amendment {} with {} comments",
        DEMO_AMENDMENT,
        api.comment_count(DEMO_AMENDMENT)
    );

    tracing::info!("++ Starting amendment discussion REST on {}", rest_addr);

    let app = router(AppState::new(api)).layer(cors);
    let listener = tokio::net::TcpListener::bind(&rest_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
