//! The flat comment list for one entity.
//!
//! [`CommentStore`] owns the list; everything else reads snapshots through it. Creating a comment
//! reloads the whole thread from the collaborator, editing patches the one comment in place
//! (optimistically, with rollback) and deleting removes just that comment. Replies to a deleted
//! comment stay in the list and surface as roots when the tree is next built.
//!
//! A reload never overwrites a comment whose edit is still in flight. Once the store is unmounted
//! no completion touches its state again, even after it is remounted: every call records the mount
//! epoch it started in and is dropped if that epoch has ended.

use crate::api::CollaboratorApi;
use crate::config::SessionUser;
use crate::error::{DiscussionError, DiscussionResult};
use crate::model::{Comment, CommentBody, CommentId, CommentKind, EntityId, NewComment};
use crate::refresh::RefreshHandle;
use crate::tree::{build_forest, CommentNode};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

#[derive(Debug)]
struct StoreState {
    comments: Vec<Comment>,
    // comment id -> tag of the latest edit issued for it
    pending_edits: HashMap<CommentId, u64>,
    next_edit_tag: u64,
    mounted: bool,
    epoch: u64,
    last_error: Option<String>,
}

impl StoreState {
    fn position(&self, comment_id: CommentId) -> Option<usize> {
        self.comments.iter().position(|c| c.id == comment_id)
    }

    /// Whether a call started in `epoch` may still apply its result.
    fn accepts(&self, epoch: u64) -> bool {
        self.mounted && self.epoch == epoch
    }

    /// Replace the list with `fresh`, keeping the local copy of anything mid-edit.
    fn merge(&mut self, mut fresh: Vec<Comment>) {
        for comment in fresh.iter_mut() {
            if !self.pending_edits.contains_key(&comment.id) {
                continue;
            }
            if let Some(local) = self.comments.iter().find(|c| c.id == comment.id) {
                *comment = local.clone();
            }
        }
        self.comments = fresh;
    }
}

pub struct CommentStore<A> {
    api: Arc<A>,
    entity_id: EntityId,
    state: Arc<Mutex<StoreState>>,
    revision: Arc<watch::Sender<u64>>,
}

impl<A> Clone for CommentStore<A> {
    fn clone(&self) -> Self {
        Self {
            api: Arc::clone(&self.api),
            entity_id: self.entity_id,
            state: Arc::clone(&self.state),
            revision: Arc::clone(&self.revision),
        }
    }
}

impl<A: CollaboratorApi> CommentStore<A> {
    pub fn new(api: Arc<A>, entity_id: EntityId) -> Self {
        let (revision, _) = watch::channel(0);
        Self {
            api,
            entity_id,
            state: Arc::new(Mutex::new(StoreState {
                comments: Vec::new(),
                pending_edits: HashMap::new(),
                next_edit_tag: 0,
                mounted: true,
                epoch: 0,
                last_error: None,
            })),
            revision: Arc::new(revision),
        }
    }

    pub fn entity_id(&self) -> EntityId {
        self.entity_id
    }

    /// Notified with an increasing counter whenever the list changes.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }

    fn changed(&self) {
        self.revision.send_modify(|r| *r += 1);
    }

    // ============================================================================
    // READS
    // ============================================================================

    pub fn comments(&self) -> Vec<Comment> {
        self.state.lock().comments.clone()
    }

    pub fn comment(&self, comment_id: CommentId) -> Option<Comment> {
        let state = self.state.lock();
        state.position(comment_id).map(|i| state.comments[i].clone())
    }

    /// The current list arranged as a reply forest.
    pub fn forest(&self) -> DiscussionResult<Vec<CommentNode>> {
        build_forest(&self.state.lock().comments)
    }

    /// Message from the last failed load, cleared by the next successful one.
    pub fn last_error(&self) -> Option<String> {
        self.state.lock().last_error.clone()
    }

    pub fn has_pending_edit(&self, comment_id: CommentId) -> bool {
        self.state.lock().pending_edits.contains_key(&comment_id)
    }

    pub fn is_mounted(&self) -> bool {
        self.state.lock().mounted
    }

    // ============================================================================
    // MUTATIONS
    // ============================================================================

    /// Fetch the whole thread and replace the local list.
    ///
    /// # Errors
    ///
    /// Returns [`DiscussionError::Load`] when the fetch fails. The existing list is kept and the
    /// failure is recorded for [`Self::last_error`].
    ///
    /// A load that finishes after [`Self::unmount`] is dropped and reports `Ok(())`; call
    /// [`Self::remount`] first to load into a store that was unmounted.
    pub async fn load(&self) -> DiscussionResult<()> {
        let epoch = self.state.lock().epoch;
        let result = self.api.list_comments(self.entity_id).await;

        let mut state = self.state.lock();
        if !state.accepts(epoch) {
            tracing::debug!(entity_id = self.entity_id, "store unmounted, dropping load result");
            return Ok(());
        }
        match result {
            Ok(fresh) => {
                tracing::debug!(
                    entity_id = self.entity_id,
                    count = fresh.len(),
                    "comments loaded"
                );
                state.merge(fresh);
                state.last_error = None;
                drop(state);
                self.changed();
                Ok(())
            }
            Err(e) => {
                tracing::warn!(entity_id = self.entity_id, error = %e, "failed to load comments");
                state.last_error = Some(e.detail().to_string());
                Err(DiscussionError::Load(e))
            }
        }
    }

    /// Post a new comment, or a reply when `parent_id` is set, then reload the thread.
    ///
    /// # Errors
    ///
    /// - [`DiscussionError::EmptyBody`] if `body` is blank; nothing is sent.
    /// - [`DiscussionError::UnknownComment`] if `parent_id` is not in the loaded thread.
    /// - [`DiscussionError::Create`] if the collaborator rejects the comment.
    pub async fn create(
        &self,
        author: &SessionUser,
        body: &str,
        kind: CommentKind,
        parent_id: Option<CommentId>,
    ) -> DiscussionResult<Comment> {
        let body = CommentBody::new(body)?;
        if let Some(parent_id) = parent_id {
            if self.state.lock().position(parent_id).is_none() {
                return Err(DiscussionError::UnknownComment(parent_id));
            }
        }

        let new_comment = NewComment {
            author_id: author.employee_id,
            body_text: body.into_string(),
            kind,
        };
        let created = self
            .api
            .create_comment(self.entity_id, &new_comment, parent_id)
            .await
            .map_err(DiscussionError::Create)?;

        // The comment exists now; a failed reload only leaves the list stale.
        if let Err(e) = self.load().await {
            tracing::warn!(comment_id = created.id, error = %e, "reload after create failed");
        }
        Ok(created)
    }

    /// Change a comment's text.
    ///
    /// The new text is shown straight away. On success the comment is replaced by the
    /// collaborator's copy; on failure the previous copy is put back.
    ///
    /// # Errors
    ///
    /// [`DiscussionError::EmptyBody`], [`DiscussionError::UnknownComment`] or
    /// [`DiscussionError::Edit`].
    pub async fn edit(&self, comment_id: CommentId, body: &str) -> DiscussionResult<Comment> {
        let body = CommentBody::new(body)?;

        let (previous, tag, epoch) = {
            let mut state = self.state.lock();
            let index = state
                .position(comment_id)
                .ok_or(DiscussionError::UnknownComment(comment_id))?;
            let previous = state.comments[index].clone();
            state.comments[index].body_text = body.as_str().to_string();
            state.comments[index].edited_flag = true;
            state.next_edit_tag += 1;
            let tag = state.next_edit_tag;
            state.pending_edits.insert(comment_id, tag);
            (previous, tag, state.epoch)
        };
        self.changed();

        let result = self.api.update_comment(comment_id, body.as_str()).await;

        let mut state = self.state.lock();
        let latest = state.pending_edits.get(&comment_id) == Some(&tag);
        if !state.accepts(epoch) || !latest {
            return result.map_err(DiscussionError::Edit);
        }
        state.pending_edits.remove(&comment_id);

        let index = state.position(comment_id);
        match result {
            Ok(updated) => {
                if let Some(index) = index {
                    state.comments[index] = updated.clone();
                }
                drop(state);
                self.changed();
                Ok(updated)
            }
            Err(e) => {
                tracing::warn!(comment_id, error = %e, "edit failed, restoring previous text");
                if let Some(index) = index {
                    state.comments[index] = previous;
                }
                drop(state);
                self.changed();
                Err(DiscussionError::Edit(e))
            }
        }
    }

    /// Delete a comment once the collaborator confirms it. Replies are left in place.
    ///
    /// # Errors
    ///
    /// [`DiscussionError::UnknownComment`] or [`DiscussionError::Delete`]; the list is unchanged
    /// on error.
    pub async fn delete(&self, comment_id: CommentId) -> DiscussionResult<()> {
        let epoch = {
            let state = self.state.lock();
            if state.position(comment_id).is_none() {
                return Err(DiscussionError::UnknownComment(comment_id));
            }
            state.epoch
        };

        self.api
            .delete_comment(comment_id)
            .await
            .map_err(DiscussionError::Delete)?;

        let mut state = self.state.lock();
        if !state.accepts(epoch) {
            return Ok(());
        }
        if let Some(index) = state.position(comment_id) {
            state.comments.remove(index);
        }
        state.pending_edits.remove(&comment_id);
        drop(state);
        self.changed();
        Ok(())
    }

    // ============================================================================
    // LIFECYCLE
    // ============================================================================

    /// Reload every `interval` until unmounted or the handle is dropped.
    ///
    /// Failed refreshes are recorded like failed loads and the loop carries on.
    pub fn spawn_refresh(&self, interval: Duration) -> RefreshHandle {
        let store = self.clone();
        RefreshHandle::spawn(interval, move || {
            let store = store.clone();
            async move {
                if !store.is_mounted() {
                    return false;
                }
                if let Err(e) = store.load().await {
                    tracing::debug!(error = %e, "periodic refresh failed");
                }
                true
            }
        })
    }

    /// Stop applying results. In-flight calls still complete but change nothing.
    pub fn unmount(&self) {
        let mut state = self.state.lock();
        state.mounted = false;
        state.epoch += 1;
        // Their completions will be dropped, so nothing would ever clear them.
        state.pending_edits.clear();
    }

    /// Accept results again after [`Self::unmount`]. Calls started before the unmount stay dropped.
    pub fn remount(&self) {
        let mut state = self.state.lock();
        if !state.mounted {
            state.mounted = true;
            tracing::debug!(entity_id = self.entity_id, epoch = state.epoch, "store remounted");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryCollaborator;
    use crate::testing::FlakyApi;
    use chrono::Utc;
    use std::collections::BTreeMap;
    use std::sync::atomic::Ordering;

    const ENTITY: EntityId = 40;

    fn author() -> SessionUser {
        SessionUser::new(7, "Dana Whitfield").unwrap()
    }

    fn seed(memory: &MemoryCollaborator, id: CommentId, parent_id: Option<CommentId>) {
        memory.seed_comment(
            ENTITY,
            Comment {
                id,
                parent_id,
                author_id: 7,
                author_name: "Dana Whitfield".into(),
                body_text: format!("comment {}", id),
                kind: CommentKind::General,
                created_at: Utc::now(),
                edited_flag: false,
                reaction_summary: BTreeMap::new(),
            },
        );
    }

    fn flaky_with(ids: &[(CommentId, Option<CommentId>)]) -> (Arc<MemoryCollaborator>, Arc<FlakyApi>) {
        let memory = Arc::new(MemoryCollaborator::new());
        for &(id, parent) in ids {
            seed(&memory, id, parent);
        }
        let api = Arc::new(FlakyApi::new(Arc::clone(&memory)));
        (memory, api)
    }

    #[tokio::test]
    async fn test_load_failure_keeps_existing_list() {
        let (_, api) = flaky_with(&[(1, None), (2, Some(1))]);
        let store = CommentStore::new(Arc::clone(&api), ENTITY);
        store.load().await.unwrap();

        api.fail_next_list("gateway timeout");
        let err = store.load().await.unwrap_err();
        assert!(matches!(err, DiscussionError::Load(_)));
        assert_eq!(store.comments().len(), 2);
        assert_eq!(store.last_error().as_deref(), Some("gateway timeout"));

        store.load().await.unwrap();
        assert_eq!(store.last_error(), None);
    }

    #[tokio::test]
    async fn test_create_reloads_whole_thread() {
        let (memory, api) = flaky_with(&[(1, None)]);
        let store = CommentStore::new(Arc::clone(&api), ENTITY);
        store.load().await.unwrap();

        // Someone else posts in the meantime.
        seed(&memory, 2, None);

        let reply = store
            .create(&author(), "  retested on staging  ", CommentKind::Resolution, Some(1))
            .await
            .unwrap();
        assert_eq!(reply.body_text, "retested on staging");
        assert_eq!(reply.parent_id, Some(1));
        assert_eq!(api.list_calls.load(Ordering::SeqCst), 2);

        let ids: Vec<_> = store.comments().iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![1, 2, reply.id]);
    }

    #[tokio::test]
    async fn test_create_rejects_empty_body_without_calling() {
        let (memory, api) = flaky_with(&[]);
        let store = CommentStore::new(Arc::clone(&api), ENTITY);

        let err = store
            .create(&author(), " \n ", CommentKind::General, None)
            .await
            .unwrap_err();
        assert!(matches!(err, DiscussionError::EmptyBody));
        assert_eq!(memory.comment_count(ENTITY), 0);
        assert_eq!(api.list_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_create_failure_surfaces_detail() {
        let (_, api) = flaky_with(&[]);
        api.fail_next_create("amendment is closed");
        let store = CommentStore::new(Arc::clone(&api), ENTITY);

        let err = store
            .create(&author(), "looks fine", CommentKind::General, None)
            .await
            .unwrap_err();
        assert!(matches!(err, DiscussionError::Create(_)));
        assert_eq!(err.user_message(), "amendment is closed");
    }

    #[tokio::test]
    async fn test_edit_replaces_only_that_comment() {
        let (_, api) = flaky_with(&[(1, None), (2, None)]);
        let store = CommentStore::new(Arc::clone(&api), ENTITY);
        store.load().await.unwrap();

        let updated = store.edit(2, "fixed in build 14").await.unwrap();
        assert!(updated.edited_flag);
        assert_eq!(store.comment(2).unwrap().body_text, "fixed in build 14");
        assert_eq!(store.comment(1).unwrap().body_text, "comment 1");
        assert!(!store.has_pending_edit(2));
        assert_eq!(api.list_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_edit_restores_previous_copy() {
        let (_, api) = flaky_with(&[(1, None)]);
        let store = CommentStore::new(Arc::clone(&api), ENTITY);
        store.load().await.unwrap();
        let before = store.comment(1).unwrap();

        api.fail_next_edit("comment is locked");
        let err = store.edit(1, "new text").await.unwrap_err();
        assert_eq!(err.user_message(), "comment is locked");
        assert_eq!(store.comment(1).unwrap(), before);
        assert!(!store.has_pending_edit(1));
    }

    #[tokio::test]
    async fn test_edit_unknown_comment() {
        let (_, api) = flaky_with(&[]);
        let store = CommentStore::new(api, ENTITY);
        assert!(matches!(
            store.edit(3, "text").await,
            Err(DiscussionError::UnknownComment(3))
        ));
    }

    #[tokio::test]
    async fn test_delete_leaves_replies_as_roots() {
        let (_, api) = flaky_with(&[(1, None), (2, Some(1)), (3, Some(2))]);
        let store = CommentStore::new(Arc::clone(&api), ENTITY);
        store.load().await.unwrap();

        store.delete(1).await.unwrap();
        let forest = store.forest().unwrap();
        assert_eq!(forest.len(), 1);
        assert_eq!(forest[0].id(), 2);
        assert_eq!(forest[0].children[0].id(), 3);
    }

    #[tokio::test]
    async fn test_failed_delete_keeps_list() {
        let (_, api) = flaky_with(&[(1, None)]);
        let store = CommentStore::new(Arc::clone(&api), ENTITY);
        store.load().await.unwrap();

        api.fail_next_delete("forbidden");
        assert!(matches!(store.delete(1).await, Err(DiscussionError::Delete(_))));
        assert_eq!(store.comments().len(), 1);
    }

    #[tokio::test]
    async fn test_reload_keeps_pending_edit() {
        let (memory, api) = flaky_with(&[(1, None)]);
        let store = CommentStore::new(Arc::clone(&api), ENTITY);
        store.load().await.unwrap();

        let gate = api.hold_next_edit();
        let editing = {
            let store = store.clone();
            tokio::spawn(async move { store.edit(1, "local draft").await })
        };
        tokio::task::yield_now().await;
        assert!(store.has_pending_edit(1));

        seed(&memory, 2, None);
        store.load().await.unwrap();
        assert_eq!(store.comment(1).unwrap().body_text, "local draft");
        assert_eq!(store.comments().len(), 2);

        gate.notify_one();
        editing.await.unwrap().unwrap();
        assert_eq!(store.comment(1).unwrap().body_text, "local draft");
        assert!(!store.has_pending_edit(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_periodic_refresh_picks_up_new_comments() {
        let (memory, api) = flaky_with(&[(1, None)]);
        let store = CommentStore::new(Arc::clone(&api), ENTITY);
        store.load().await.unwrap();
        let _refresh = store.spawn_refresh(Duration::from_secs(30));

        seed(&memory, 2, Some(1));
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(store.comments().len(), 1);

        tokio::time::sleep(Duration::from_secs(21)).await;
        tokio::task::yield_now().await;
        assert_eq!(store.comments().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unmount_stops_refresh_and_ignores_results() {
        let (memory, api) = flaky_with(&[(1, None)]);
        let store = CommentStore::new(Arc::clone(&api), ENTITY);
        store.load().await.unwrap();
        let refresh = store.spawn_refresh(Duration::from_secs(30));

        store.unmount();
        seed(&memory, 2, None);
        tokio::time::sleep(Duration::from_secs(31)).await;
        tokio::task::yield_now().await;

        assert!(refresh.is_finished());
        assert_eq!(api.list_calls.load(Ordering::SeqCst), 1);

        store.load().await.unwrap();
        assert_eq!(store.comments().len(), 1);
    }

    #[tokio::test]
    async fn test_remount_loads_again() {
        let (memory, api) = flaky_with(&[(1, None)]);
        let store = CommentStore::new(Arc::clone(&api), ENTITY);
        store.unmount();
        store.load().await.unwrap();
        assert!(store.comments().is_empty());

        store.remount();
        assert!(store.is_mounted());
        seed(&memory, 2, Some(1));
        store.load().await.unwrap();
        assert_eq!(store.comments().len(), 2);
    }

    #[tokio::test]
    async fn test_edit_from_before_remount_is_ignored() {
        let (memory, api) = flaky_with(&[(1, None)]);
        let store = CommentStore::new(Arc::clone(&api), ENTITY);
        store.load().await.unwrap();

        let gate = api.hold_next_edit();
        let editing = {
            let store = store.clone();
            tokio::spawn(async move { store.edit(1, "typed before leaving").await })
        };
        tokio::task::yield_now().await;

        store.unmount();
        assert!(!store.has_pending_edit(1));
        store.remount();
        store.load().await.unwrap();
        assert_eq!(store.comment(1).unwrap().body_text, "comment 1");

        gate.notify_one();
        editing.await.unwrap().unwrap();
        // The server took the edit; the remounted store only sees it on its next load.
        assert_eq!(store.comment(1).unwrap().body_text, "comment 1");
        assert_eq!(
            memory.list_comments(ENTITY).await.unwrap()[0].body_text,
            "typed before leaving"
        );
    }

    #[tokio::test]
    async fn test_stale_edit_completion_is_ignored() {
        // Newer edit fails while an older one is still in flight: roll back to the older text,
        // then ignore the older edit's success.
        let (memory, api) = flaky_with(&[(1, None)]);
        let store = CommentStore::new(Arc::clone(&api), ENTITY);
        store.load().await.unwrap();

        let gate = api.hold_next_edit();
        let older = {
            let store = store.clone();
            tokio::spawn(async move { store.edit(1, "A").await })
        };
        tokio::task::yield_now().await;

        api.fail_next_edit("conflict");
        assert!(matches!(store.edit(1, "B").await, Err(DiscussionError::Edit(_))));
        assert_eq!(store.comment(1).unwrap().body_text, "A");

        gate.notify_one();
        assert_eq!(older.await.unwrap().unwrap().body_text, "A");
        assert_eq!(store.comment(1).unwrap().body_text, "A");
        assert!(!store.has_pending_edit(1));
        assert_eq!(memory.list_comments(ENTITY).await.unwrap()[0].body_text, "A");

        // Newer edit succeeds while an older one is in flight: the older edit's failure must not
        // roll the newer text back.
        let gate = api.hold_next_edit();
        let older = {
            let store = store.clone();
            tokio::spawn(async move { store.edit(1, "C").await })
        };
        tokio::task::yield_now().await;

        assert_eq!(store.edit(1, "D").await.unwrap().body_text, "D");
        assert_eq!(store.comment(1).unwrap().body_text, "D");

        api.fail_next_edit("timed out");
        gate.notify_one();
        assert!(matches!(older.await.unwrap(), Err(DiscussionError::Edit(_))));
        assert_eq!(store.comment(1).unwrap().body_text, "D");
        assert!(!store.has_pending_edit(1));
    }
}
