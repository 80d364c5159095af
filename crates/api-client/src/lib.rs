//! # API Client
//!
//! HTTP implementation of [`CollaboratorApi`] over `reqwest`.
//!
//! Each trait method is a single request. Non-2xx responses become [`ApiError::Status`] carrying
//! the `detail` field of the error body (or the raw body when it is not the usual JSON shape);
//! connection failures and timeouts become [`ApiError::Transport`]. Nothing is retried.

#![warn(rust_2018_idioms)]

use amend_core::model::CommentEdit;
use amend_core::{
    ApiError, ApiResult, ClientConfig, CollaboratorApi, Comment, CommentId, CommentsPage,
    EmployeeId, Emoji, EntityId, MentionCandidate, NewComment, QaWorkflowState, Reaction,
    ReactionSummary,
};
use async_trait::async_trait;
use reqwest::{RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;

#[derive(Deserialize)]
struct ErrorBody {
    detail: String,
}

#[derive(Clone, Debug)]
pub struct HttpCollaborator {
    http: reqwest::Client,
    base_url: String,
}

impl HttpCollaborator {
    /// Build a client for the configured base URL and request timeout.
    pub fn new(config: &ClientConfig) -> ApiResult<Self> {
        Self::from_parts(config.api_base_url(), config.request_timeout())
    }

    pub fn from_parts(base_url: impl Into<String>, timeout: Duration) -> ApiResult<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("amend/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout.max(Duration::from_millis(1)))
            .build()
            .map_err(|e| ApiError::Transport(format!("failed to create http client: {}", e)))?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn execute(&self, request: RequestBuilder) -> ApiResult<Response> {
        let resp = request
            .send()
            .await
            .map_err(|e| ApiError::Transport(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            let detail = match serde_json::from_str::<ErrorBody>(&text) {
                Ok(body) => body.detail,
                Err(_) if !text.trim().is_empty() => text,
                Err(_) => status
                    .canonical_reason()
                    .unwrap_or("request failed")
                    .to_string(),
            };
            tracing::debug!(status = status.as_u16(), %detail, "collaborator returned an error");
            return Err(ApiError::Status {
                status: status.as_u16(),
                detail,
            });
        }
        Ok(resp)
    }

    async fn fetch<T: DeserializeOwned>(&self, request: RequestBuilder) -> ApiResult<T> {
        self.execute(request)
            .await?
            .json::<T>()
            .await
            .map_err(|e| ApiError::Decode(e.to_string()))
    }
}

#[async_trait]
impl CollaboratorApi for HttpCollaborator {
    async fn list_comments(&self, entity_id: EntityId) -> ApiResult<Vec<Comment>> {
        let page: CommentsPage = self
            .fetch(self.http.get(self.url(&format!("/entities/{}/comments", entity_id))))
            .await?;
        Ok(page.items)
    }

    async fn create_comment(
        &self,
        entity_id: EntityId,
        comment: &NewComment,
        parent_id: Option<CommentId>,
    ) -> ApiResult<Comment> {
        let mut request = self
            .http
            .post(self.url(&format!("/entities/{}/comments", entity_id)))
            .json(comment);
        if let Some(parent_id) = parent_id {
            request = request.query(&[("parentCommentId", parent_id)]);
        }
        self.fetch(request).await
    }

    async fn update_comment(&self, comment_id: CommentId, body_text: &str) -> ApiResult<Comment> {
        let edit = CommentEdit {
            body_text: body_text.to_string(),
        };
        self.fetch(
            self.http
                .patch(self.url(&format!("/comments/{}", comment_id)))
                .json(&edit),
        )
        .await
    }

    async fn delete_comment(&self, comment_id: CommentId) -> ApiResult<()> {
        self.execute(
            self.http
                .delete(self.url(&format!("/comments/{}", comment_id))),
        )
        .await?;
        Ok(())
    }

    async fn reaction_summary(&self, comment_id: CommentId) -> ApiResult<ReactionSummary> {
        self.fetch(
            self.http
                .get(self.url(&format!("/comments/{}/reactions/summary", comment_id))),
        )
        .await
    }

    async fn list_reactions(&self, comment_id: CommentId) -> ApiResult<Vec<Reaction>> {
        self.fetch(
            self.http
                .get(self.url(&format!("/comments/{}/reactions", comment_id))),
        )
        .await
    }

    async fn toggle_reaction(
        &self,
        comment_id: CommentId,
        employee_id: EmployeeId,
        emoji: Emoji,
    ) -> ApiResult<()> {
        let employee_id = employee_id.to_string();
        self.execute(
            self.http
                .post(self.url(&format!("/comments/{}/reactions", comment_id)))
                .query(&[("emoji", emoji.as_str()), ("employeeId", employee_id.as_str())]),
        )
        .await?;
        Ok(())
    }

    async fn search_directory(
        &self,
        query: &str,
        limit: usize,
    ) -> ApiResult<Vec<MentionCandidate>> {
        let limit = limit.to_string();
        self.fetch(
            self.http
                .get(self.url("/directory/search"))
                .query(&[("q", query), ("limit", limit.as_str())]),
        )
        .await
    }

    async fn get_qa(&self, entity_id: EntityId) -> ApiResult<QaWorkflowState> {
        self.fetch(self.http.get(self.url(&format!("/entities/{}/qa", entity_id))))
            .await
    }

    async fn update_qa(
        &self,
        entity_id: EntityId,
        state: &QaWorkflowState,
    ) -> ApiResult<QaWorkflowState> {
        self.fetch(
            self.http
                .patch(self.url(&format!("/entities/{}/qa", entity_id)))
                .json(state),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use amend_core::reactions::ToggleOutcome;
    use amend_core::{CommentKind, Discussion, MemoryCollaborator, QaStatus, SessionUser};
    use api_rest::{router, AppState};
    use std::sync::Arc;

    async fn serve(memory: Arc<MemoryCollaborator>) -> HttpCollaborator {
        let app = router(AppState::new(memory));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        HttpCollaborator::from_parts(format!("http://{}/", addr), Duration::from_secs(5)).unwrap()
    }

    fn new_comment(body: &str) -> NewComment {
        NewComment {
            author_id: 4,
            body_text: body.to_string(),
            kind: CommentKind::Question,
        }
    }

    #[tokio::test]
    async fn test_comment_lifecycle_over_http() {
        let client = serve(Arc::new(MemoryCollaborator::new())).await;

        let root = client
            .create_comment(10, &new_comment("which browsers were covered?"), None)
            .await
            .unwrap();
        let reply = client
            .create_comment(10, &new_comment("chrome and firefox"), Some(root.id))
            .await
            .unwrap();
        assert_eq!(reply.parent_id, Some(root.id));
        assert_eq!(reply.kind, CommentKind::Question);

        let edited = client.update_comment(reply.id, "chrome, firefox, safari").await.unwrap();
        assert!(edited.edited_flag);

        client.delete_comment(root.id).await.unwrap();
        let listed = client.list_comments(10).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].body_text, "chrome, firefox, safari");
    }

    #[tokio::test]
    async fn test_error_detail_is_surfaced() {
        let client = serve(Arc::new(MemoryCollaborator::new())).await;

        let err = client
            .create_comment(10, &new_comment("   "), None)
            .await
            .unwrap_err();
        assert_eq!(
            err,
            ApiError::Status {
                status: 422,
                detail: "bodyText cannot be empty".into()
            }
        );

        let err = client.delete_comment(999).await.unwrap_err();
        assert_eq!(err.detail(), "comment 999 not found");
    }

    #[tokio::test]
    async fn test_reactions_over_http() {
        let memory = Arc::new(MemoryCollaborator::new());
        let client = serve(Arc::clone(&memory)).await;
        let comment = client
            .create_comment(2, &new_comment("verified"), None)
            .await
            .unwrap();

        client
            .toggle_reaction(comment.id, 4, Emoji::Heart)
            .await
            .unwrap();
        let summary = client.reaction_summary(comment.id).await.unwrap();
        assert_eq!(summary.reactions.get(Emoji::Heart.as_str()), Some(&1));
        let reactions = client.list_reactions(comment.id).await.unwrap();
        assert_eq!(reactions[0].emoji, Emoji::Heart);
        assert_eq!(reactions[0].employee_id, 4);

        client
            .toggle_reaction(comment.id, 4, Emoji::Heart)
            .await
            .unwrap();
        assert!(client.list_reactions(comment.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_directory_and_qa_over_http() {
        let memory = Arc::new(MemoryCollaborator::with_directory(vec![MentionCandidate {
            employee_id: 21,
            display_name: "Mia Lindqvist".into(),
        }]));
        let client = serve(memory).await;

        let found = client.search_directory("lind", 10).await.unwrap();
        assert_eq!(found[0].employee_id, 21);

        let mut qa = client.get_qa(6).await.unwrap();
        assert_eq!(qa.qa_status, QaStatus::NotStarted);
        qa.qa_status = QaStatus::Blocked;
        qa.qa_notes = Some("waiting on test data".into());
        let saved = client.update_qa(6, &qa).await.unwrap();
        assert_eq!(saved, qa);
        assert_eq!(client.get_qa(6).await.unwrap(), qa);
    }

    #[tokio::test]
    async fn test_unreachable_server_is_transport_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client =
            HttpCollaborator::from_parts(format!("http://{}", addr), Duration::from_secs(2))
                .unwrap();
        assert!(matches!(
            client.list_comments(1).await,
            Err(ApiError::Transport(_))
        ));
    }

    #[tokio::test]
    async fn test_discussion_over_http() {
        let client = Arc::new(serve(Arc::new(MemoryCollaborator::new())).await);
        let config = ClientConfig::new(
            client.base_url().to_string(),
            SessionUser::new(4, "Kofi Mensah").unwrap(),
        )
        .unwrap();
        let discussion = Discussion::new(Arc::clone(&client), 33, config);
        discussion.reload().await.unwrap();

        let mut composer = amend_core::composer::Composer::new();
        composer.set_draft("regression found in totals");
        let root = discussion.post(&mut composer).await.unwrap();

        let outcome = discussion
            .toggle_reaction(root.id, Emoji::Eyes)
            .await
            .unwrap();
        match outcome {
            ToggleOutcome::Applied(state) => assert!(state.is_mine(Emoji::Eyes)),
            ToggleOutcome::Ignored => panic!("toggle was ignored"),
        }

        let thread = discussion.thread().unwrap();
        assert_eq!(thread.len(), 1);
        assert_eq!(thread[0].comment.author_name, "Employee 4");
    }
}
