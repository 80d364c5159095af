use amend_core::config::{
    api_base_url_from_env_value, mention_limit_from_env_value, refresh_interval_from_env_value,
    request_timeout_from_env_value, session_user_from_env_values,
};
use amend_core::constants::{
    ENV_API_URL, ENV_EMPLOYEE_ID, ENV_EMPLOYEE_NAME, ENV_MENTION_LIMIT, ENV_REFRESH_SECS,
    ENV_REQUEST_TIMEOUT_SECS,
};
use amend_core::mention::{detect_mention, MentionField, MentionResolver};
use amend_core::{
    ClientConfig, CommentId, CommentKind, Composer, Discussion, Emoji, EntityId, QaCheck,
    QaOverallResult, QaPanel, QaStatus, ReactionAggregator, ToggleOutcome,
};
use api_client::HttpCollaborator;
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod render;

#[derive(Parser)]
#[command(name = "amend")]
#[command(about = "Amendment QA discussion CLI")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the discussion thread of an amendment
    Thread {
        /// Amendment id
        entity: EntityId,
    },
    /// Post a new top-level comment
    Post {
        /// Amendment id
        entity: EntityId,
        /// Comment text
        body: String,
        /// General, Issue, Resolution or Question
        #[arg(long, default_value = "General")]
        kind: CommentKind,
    },
    /// Reply to a comment
    Reply {
        /// Amendment id
        entity: EntityId,
        /// Comment being replied to
        parent: CommentId,
        /// Reply text
        body: String,
        #[arg(long, default_value = "General")]
        kind: CommentKind,
    },
    /// Change the text of a comment
    Edit {
        /// Amendment id
        entity: EntityId,
        comment: CommentId,
        /// New text
        body: String,
    },
    /// Delete a comment (replies are kept)
    Delete {
        /// Amendment id
        entity: EntityId,
        comment: CommentId,
    },
    /// Toggle a reaction on a comment
    React {
        comment: CommentId,
        /// Glyph or name: thumbs_up, heart, smile, tada, confused, eyes
        emoji: Emoji,
    },
    /// Show the reactions on a comment
    Reactions { comment: CommentId },
    /// Suggest employees for the @mention being typed
    Mention {
        /// Text typed so far
        text: String,
        /// Caret byte offset (defaults to the end of the text)
        #[arg(long)]
        caret: Option<usize>,
    },
    /// Show or change the QA workflow of an amendment
    Qa {
        /// Amendment id
        entity: EntityId,
        #[command(subcommand)]
        action: Option<QaAction>,
    },
    /// Print the thread and keep it refreshed until interrupted
    Watch {
        /// Amendment id
        entity: EntityId,
    },
}

#[derive(Subcommand)]
enum QaAction {
    /// Move to a status: not-started, assigned, in-testing, passed, failed, blocked
    Status { status: QaStatus },
    /// Assign a tester, or clear the assignee when omitted
    Assign { employee: Option<i64> },
    /// Toggle a checklist item: test-plan or release-notes
    Check { item: QaCheck },
    /// Set the tester's notes (empty clears them)
    Notes { notes: String },
    /// Record the overall result: pass, fail, pass-with-observations
    Result { result: Option<QaOverallResult> },
    /// Set the test plan link (empty clears it)
    Link { url: String },
    /// Sign off the QA (empty clears the signature)
    Sign { signature: String },
}

fn load_config() -> anyhow::Result<ClientConfig> {
    let session = session_user_from_env_values(
        std::env::var(ENV_EMPLOYEE_ID).ok(),
        std::env::var(ENV_EMPLOYEE_NAME).ok(),
    )?;
    let api_url = api_base_url_from_env_value(std::env::var(ENV_API_URL).ok())?;
    Ok(ClientConfig::new(api_url, session)?
        .with_refresh_interval(refresh_interval_from_env_value(
            std::env::var(ENV_REFRESH_SECS).ok(),
        )?)
        .with_mention_limit(mention_limit_from_env_value(
            std::env::var(ENV_MENTION_LIMIT).ok(),
        )?)
        .with_request_timeout(request_timeout_from_env_value(
            std::env::var(ENV_REQUEST_TIMEOUT_SECS).ok(),
        )?))
}

/// Load the thread of `entity` so comment-level commands can act on it.
async fn loaded(
    api: &Arc<HttpCollaborator>,
    entity: EntityId,
    config: &ClientConfig,
) -> anyhow::Result<Discussion<HttpCollaborator>> {
    let discussion = Discussion::new(Arc::clone(api), entity, config.clone());
    discussion.reload().await?;
    Ok(discussion)
}

async fn post(
    discussion: &Discussion<HttpCollaborator>,
    mut composer: Composer,
    body: String,
    kind: CommentKind,
) -> anyhow::Result<()> {
    composer.set_draft(body);
    composer.set_kind(kind);
    match discussion.post(&mut composer).await {
        Ok(created) => {
            println!("Posted comment #{}", created.id);
            print!("{}", render::thread(&discussion.thread()?));
        }
        Err(e) => eprintln!("Error posting comment: {}", e.user_message()),
    }
    Ok(())
}

async fn run_qa(panel: QaPanel<HttpCollaborator>, action: QaAction) -> anyhow::Result<()> {
    let result = match action {
        QaAction::Status { status } => panel.set_status(status).await,
        QaAction::Assign { employee } => panel.assign(employee).await,
        QaAction::Check { item } => panel.toggle_check(item).await,
        QaAction::Notes { notes } => panel.set_notes(Some(notes)).await,
        QaAction::Result { result } => panel.set_overall_result(result).await,
        QaAction::Link { url } => panel.set_test_plan_link(Some(url)).await,
        QaAction::Sign { signature } => panel.set_signature(Some(signature)).await,
    };
    match result {
        Ok(state) => print!("{}", render::qa(&state)),
        Err(e) => {
            eprintln!("Error saving QA change: {}", e.user_message());
            print!("{}", render::qa(&panel.current()));
        }
    }
    Ok(())
}

async fn watch(discussion: Discussion<HttpCollaborator>) -> anyhow::Result<()> {
    let mut revisions = discussion.store().subscribe();
    if let Err(e) = discussion.mount().await {
        eprintln!("Error loading comments: {}", e.user_message());
    }

    let mut shown = String::new();
    loop {
        let rendered = render::thread(&discussion.thread()?);
        if rendered != shown {
            println!("--- amendment {} ---", discussion.entity_id());
            print!("{}", rendered);
            shown = rendered;
        }
        tokio::select! {
            changed = revisions.changed() => {
                if changed.is_err() {
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    discussion.unmount();
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("amend_cli=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let Some(command) = cli.command else {
        println!("Use 'amend --help' for commands");
        return Ok(());
    };

    let config = load_config()?;
    let api = Arc::new(HttpCollaborator::new(&config)?);
    tracing::debug!(api = api.base_url(), "using collaborator");

    match command {
        Commands::Thread { entity } => {
            let discussion = loaded(&api, entity, &config).await?;
            print!("{}", render::thread(&discussion.thread()?));
        }
        Commands::Post { entity, body, kind } => {
            let discussion = loaded(&api, entity, &config).await?;
            post(&discussion, Composer::new(), body, kind).await?;
        }
        Commands::Reply {
            entity,
            parent,
            body,
            kind,
        } => {
            let discussion = loaded(&api, entity, &config).await?;
            post(&discussion, Composer::reply_to(parent), body, kind).await?;
        }
        Commands::Edit {
            entity,
            comment,
            body,
        } => {
            let discussion = loaded(&api, entity, &config).await?;
            match discussion.edit(comment, &body).await {
                Ok(updated) => println!("Updated comment #{}", updated.id),
                Err(e) => eprintln!("Error editing comment: {}", e.user_message()),
            }
        }
        Commands::Delete { entity, comment } => {
            let discussion = loaded(&api, entity, &config).await?;
            match discussion.delete(comment).await {
                Ok(()) => println!("Deleted comment #{}", comment),
                Err(e) => eprintln!("Error deleting comment: {}", e.user_message()),
            }
        }
        Commands::React { comment, emoji } => {
            let reactions = ReactionAggregator::new(Arc::clone(&api), config.session().employee_id);
            match reactions.toggle(comment, emoji).await {
                Ok(ToggleOutcome::Applied(state)) => println!("{}", render::reactions(&state)),
                Ok(ToggleOutcome::Ignored) => println!("A reaction change is already in progress"),
                Err(e) => eprintln!("Error updating reaction: {}", e.user_message()),
            }
        }
        Commands::Reactions { comment } => {
            let reactions = ReactionAggregator::new(Arc::clone(&api), config.session().employee_id);
            match reactions.refresh(comment).await {
                Ok(state) => println!("{}", render::reactions(&state)),
                Err(e) => eprintln!("Error loading reactions: {}", e.user_message()),
            }
        }
        Commands::Mention { text, caret } => {
            let caret = caret.unwrap_or(text.len());
            if detect_mention(&text, caret).is_none() {
                println!("No active mention at the caret.");
                return Ok(());
            }
            let resolver = MentionResolver::new(Arc::clone(&api), config.mention_limit());
            let found = resolver
                .on_input(MentionField::Composer, &text, caret)
                .await;
            if found.is_empty() {
                println!("No matching employees.");
            }
            for candidate in found {
                println!("{}\t{}", candidate.employee_id, candidate.display_name);
            }
        }
        Commands::Qa { entity, action } => {
            let panel = QaPanel::load(Arc::clone(&api), entity).await?;
            match action {
                None => print!("{}", render::qa(&panel.current())),
                Some(action) => run_qa(panel, action).await?,
            }
        }
        Commands::Watch { entity } => {
            let discussion = Discussion::new(Arc::clone(&api), entity, config.clone());
            watch(discussion).await?;
        }
    }

    Ok(())
}
