//! The discussion thread of one amendment, as a detail view uses it.
//!
//! [`Discussion`] ties the comment store, reaction aggregator and mention resolver to a session
//! user and client configuration. Mounting loads the thread and starts the periodic refresh;
//! unmounting stops it and turns any still-running completion into a no-op.

use crate::api::CollaboratorApi;
use crate::composer::Composer;
use crate::config::{ClientConfig, SessionUser};
use crate::error::DiscussionResult;
use crate::mention::MentionResolver;
use crate::model::{Comment, CommentId, Emoji, EntityId};
use crate::qa::QaPanel;
use crate::reactions::{ReactionAggregator, ToggleOutcome};
use crate::refresh::RefreshHandle;
use crate::store::CommentStore;
use crate::tree::CommentNode;
use parking_lot::Mutex;
use std::sync::Arc;

pub struct Discussion<A> {
    api: Arc<A>,
    config: ClientConfig,
    store: CommentStore<A>,
    reactions: ReactionAggregator<A>,
    mentions: MentionResolver<A>,
    refresh: Mutex<Option<RefreshHandle>>,
}

impl<A: CollaboratorApi> Discussion<A> {
    pub fn new(api: Arc<A>, entity_id: EntityId, config: ClientConfig) -> Self {
        let store = CommentStore::new(Arc::clone(&api), entity_id);
        let reactions = ReactionAggregator::new(Arc::clone(&api), config.session().employee_id);
        let mentions = MentionResolver::new(Arc::clone(&api), config.mention_limit());
        Self {
            api,
            config,
            store,
            reactions,
            mentions,
            refresh: Mutex::new(None),
        }
    }

    pub fn entity_id(&self) -> EntityId {
        self.store.entity_id()
    }

    pub fn session(&self) -> &SessionUser {
        self.config.session()
    }

    pub fn store(&self) -> &CommentStore<A> {
        &self.store
    }

    pub fn reactions(&self) -> &ReactionAggregator<A> {
        &self.reactions
    }

    pub fn mentions(&self) -> &MentionResolver<A> {
        &self.mentions
    }

    /// Load the thread and start refreshing it on the configured interval.
    ///
    /// The refresh runs even if the first load fails, so a transient outage heals itself.
    /// Mounting again after [`Self::unmount`] starts over with a fresh load; completions from the
    /// earlier mount stay ignored.
    pub async fn mount(&self) -> DiscussionResult<()> {
        self.store.remount();
        self.reactions.attach();

        let store = self.store.clone();
        let reactions = self.reactions.clone();
        let handle = RefreshHandle::spawn(self.config.refresh_interval(), move || {
            let store = store.clone();
            let reactions = reactions.clone();
            async move {
                if !store.is_mounted() {
                    return false;
                }
                match store.load().await {
                    Ok(()) => reactions.invalidate_all(),
                    Err(e) => tracing::debug!(error = %e, "periodic refresh failed"),
                }
                true
            }
        });
        *self.refresh.lock() = Some(handle);

        self.reload().await
    }

    /// Reload the thread and drop cached reaction state.
    pub async fn reload(&self) -> DiscussionResult<()> {
        self.store.load().await?;
        self.reactions.invalidate_all();
        Ok(())
    }

    pub fn unmount(&self) {
        self.store.unmount();
        self.reactions.detach();
        self.mentions.close();
        self.refresh.lock().take();
        tracing::debug!(entity_id = self.entity_id(), "discussion unmounted");
    }

    /// The loaded thread as a reply forest.
    pub fn thread(&self) -> DiscussionResult<Vec<CommentNode>> {
        self.store.forest()
    }

    pub async fn post(&self, composer: &mut Composer) -> DiscussionResult<Comment> {
        composer.submit(&self.store, self.config.session()).await
    }

    pub async fn edit(&self, comment_id: CommentId, body: &str) -> DiscussionResult<Comment> {
        self.store.edit(comment_id, body).await
    }

    pub async fn delete(&self, comment_id: CommentId) -> DiscussionResult<()> {
        self.store.delete(comment_id).await
    }

    pub async fn toggle_reaction(
        &self,
        comment_id: CommentId,
        emoji: Emoji,
    ) -> DiscussionResult<ToggleOutcome> {
        self.reactions.toggle(comment_id, emoji).await
    }

    /// Load the QA panel for the same amendment.
    pub async fn qa_panel(&self) -> DiscussionResult<QaPanel<A>> {
        QaPanel::load(Arc::clone(&self.api), self.entity_id()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryCollaborator;
    use crate::model::{CommentKind, NewComment};
    use crate::qa::QaStatus;
    use crate::testing::FlakyApi;
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    const AMENDMENT: EntityId = 77;

    fn config() -> ClientConfig {
        ClientConfig::new(
            "http://127.0.0.1:3000",
            SessionUser::new(5, "Rui Okafor").unwrap(),
        )
        .unwrap()
        .with_refresh_interval(Duration::from_secs(30))
    }

    async fn post_as(memory: &MemoryCollaborator, author_id: i64, body: &str) -> Comment {
        memory
            .create_comment(
                AMENDMENT,
                &NewComment {
                    author_id,
                    body_text: body.into(),
                    kind: CommentKind::General,
                },
                None,
            )
            .await
            .unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_mount_loads_and_refreshes() {
        let memory = Arc::new(MemoryCollaborator::new());
        post_as(&memory, 9, "first pass failed on Safari").await;
        let api = Arc::new(FlakyApi::new(Arc::clone(&memory)));
        let discussion = Discussion::new(Arc::clone(&api), AMENDMENT, config());

        discussion.mount().await.unwrap();
        assert_eq!(discussion.thread().unwrap().len(), 1);

        post_as(&memory, 9, "second pass ok").await;
        tokio::time::sleep(Duration::from_secs(31)).await;
        tokio::task::yield_now().await;
        assert_eq!(discussion.thread().unwrap().len(), 2);
        assert_eq!(api.list_calls.load(Ordering::SeqCst), 2);

        discussion.unmount();
        tokio::time::sleep(Duration::from_secs(90)).await;
        assert_eq!(api.list_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_mount_after_unmount_loads_and_refreshes() {
        let memory = Arc::new(MemoryCollaborator::new());
        post_as(&memory, 9, "blocked on test data").await;
        let discussion = Discussion::new(Arc::clone(&memory), AMENDMENT, config());

        discussion.mount().await.unwrap();
        discussion.unmount();
        post_as(&memory, 9, "test data loaded").await;

        discussion.mount().await.unwrap();
        assert!(discussion.store().is_mounted());
        assert_eq!(discussion.thread().unwrap().len(), 2);

        post_as(&memory, 9, "retest passed").await;
        tokio::time::sleep(Duration::from_secs(31)).await;
        tokio::task::yield_now().await;
        assert_eq!(discussion.thread().unwrap().len(), 3);
        discussion.unmount();
    }

    #[tokio::test]
    async fn test_toggle_finishing_after_unmount_is_not_cached() {
        let memory = Arc::new(MemoryCollaborator::new());
        let comment = post_as(&memory, 9, "works on my machine").await;
        let api = Arc::new(FlakyApi::new(Arc::clone(&memory)));
        let discussion = Discussion::new(Arc::clone(&api), AMENDMENT, config());
        discussion.reload().await.unwrap();

        let gate = api.hold_next_toggle();
        let pending = {
            let reactions = discussion.reactions().clone();
            tokio::spawn(async move { reactions.toggle(comment.id, Emoji::ThumbsUp).await })
        };
        tokio::task::yield_now().await;

        discussion.unmount();
        gate.notify_one();
        pending.await.unwrap().unwrap();
        assert!(discussion.reactions().get(comment.id).is_none());
    }

    #[tokio::test]
    async fn test_reload_invalidates_reaction_cache() {
        let memory = Arc::new(MemoryCollaborator::new());
        let comment = post_as(&memory, 9, "please verify").await;
        let discussion = Discussion::new(memory, AMENDMENT, config());
        discussion.reload().await.unwrap();

        discussion
            .toggle_reaction(comment.id, Emoji::ThumbsUp)
            .await
            .unwrap();
        assert!(discussion.reactions().get(comment.id).is_some());

        discussion.reload().await.unwrap();
        assert!(discussion.reactions().get(comment.id).is_none());
    }

    #[tokio::test]
    async fn test_post_uses_session_user() {
        let memory = Arc::new(MemoryCollaborator::new());
        let discussion = Discussion::new(Arc::clone(&memory), AMENDMENT, config());
        discussion.reload().await.unwrap();

        let mut composer = Composer::new();
        composer.set_draft("ready for QA");
        let created = discussion.post(&mut composer).await.unwrap();
        assert_eq!(created.author_id, 5);
        assert_eq!(discussion.store().comments().len(), 1);
    }

    #[tokio::test]
    async fn test_qa_panel_for_same_entity() {
        let memory = Arc::new(MemoryCollaborator::new());
        let discussion = Discussion::new(Arc::clone(&memory), AMENDMENT, config());
        let panel = discussion.qa_panel().await.unwrap();
        panel.set_status(QaStatus::InTesting).await.unwrap();

        let stored = memory.get_qa(AMENDMENT).await.unwrap();
        assert_eq!(stored.qa_status, QaStatus::InTesting);
        assert!(stored.qa_started_date.is_some());
    }
}
