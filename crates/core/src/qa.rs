//! QA workflow panel.
//!
//! The panel sits next to the discussion thread in an amendment's detail view. Every change the
//! tester makes is applied locally first and persisted through [`Optimistic`], so a failed save
//! puts the panel back exactly as it was.
//!
//! Status transitions carry fixed side effects, computed before the change is shown:
//! - moving to `In Testing` stamps `qa_started_date` if it is unset
//! - moving to `Passed` or `Failed` sets `qa_completed` and stamps `qa_completed_date` if unset

use crate::api::CollaboratorApi;
use crate::error::DiscussionResult;
use crate::model::{EmployeeId, EntityId};
use crate::optimistic::Optimistic;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::watch;
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub enum QaStatus {
    #[default]
    #[serde(rename = "Not Started")]
    NotStarted,
    Assigned,
    #[serde(rename = "In Testing")]
    InTesting,
    Passed,
    Failed,
    Blocked,
}

impl QaStatus {
    pub const ALL: [QaStatus; 6] = [
        QaStatus::NotStarted,
        QaStatus::Assigned,
        QaStatus::InTesting,
        QaStatus::Passed,
        QaStatus::Failed,
        QaStatus::Blocked,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            QaStatus::NotStarted => "Not Started",
            QaStatus::Assigned => "Assigned",
            QaStatus::InTesting => "In Testing",
            QaStatus::Passed => "Passed",
            QaStatus::Failed => "Failed",
            QaStatus::Blocked => "Blocked",
        }
    }

    /// Whether reaching this status finishes the QA pass.
    pub fn is_terminal(self) -> bool {
        matches!(self, QaStatus::Passed | QaStatus::Failed)
    }
}

impl fmt::Display for QaStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QaStatus {
    type Err = String;

    /// Accepts the display form ("In Testing") as well as dashed or underscored variants.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted: String = s
            .trim()
            .chars()
            .map(|c| if c == '-' || c == '_' { ' ' } else { c })
            .collect();
        Self::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(&wanted))
            .ok_or_else(|| format!("unknown QA status: {}", s))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub enum QaOverallResult {
    Pass,
    Fail,
    #[serde(rename = "Pass With Observations")]
    PassWithObservations,
}

impl QaOverallResult {
    pub const ALL: [QaOverallResult; 3] = [
        QaOverallResult::Pass,
        QaOverallResult::Fail,
        QaOverallResult::PassWithObservations,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            QaOverallResult::Pass => "Pass",
            QaOverallResult::Fail => "Fail",
            QaOverallResult::PassWithObservations => "Pass With Observations",
        }
    }
}

impl FromStr for QaOverallResult {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted: String = s
            .trim()
            .chars()
            .map(|c| if c == '-' || c == '_' { ' ' } else { c })
            .collect();
        Self::ALL
            .into_iter()
            .find(|r| r.as_str().eq_ignore_ascii_case(&wanted))
            .ok_or_else(|| format!("unknown QA result: {}", s))
    }
}

/// Checklist items on the QA panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QaCheck {
    TestPlan,
    ReleaseNotes,
}

impl FromStr for QaCheck {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "test-plan" | "plan" => Ok(QaCheck::TestPlan),
            "release-notes" | "release" => Ok(QaCheck::ReleaseNotes),
            other => Err(format!("unknown QA checklist item: {}", other)),
        }
    }
}

/// QA fields of one amendment, persisted as a whole on every change.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct QaWorkflowState {
    pub qa_status: QaStatus,
    pub qa_assigned_id: Option<EmployeeId>,
    pub qa_assigned_date: Option<DateTime<Utc>>,
    pub qa_test_plan_check: bool,
    pub qa_test_release_notes_check: bool,
    pub qa_started_date: Option<DateTime<Utc>>,
    pub qa_completed: bool,
    pub qa_completed_date: Option<DateTime<Utc>>,
    pub qa_overall_result: Option<QaOverallResult>,
    pub qa_signature: Option<String>,
    pub qa_notes: Option<String>,
    pub qa_test_plan_link: Option<String>,
}

fn blank_to_none(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl QaWorkflowState {
    /// The state after moving to `status` at time `now`, with the status side effects applied.
    pub fn with_status(&self, status: QaStatus, now: DateTime<Utc>) -> Self {
        let mut next = self.clone();
        next.qa_status = status;
        match status {
            QaStatus::InTesting => {
                next.qa_started_date.get_or_insert(now);
            }
            QaStatus::Passed | QaStatus::Failed => {
                next.qa_completed = true;
                next.qa_completed_date.get_or_insert(now);
            }
            _ => {}
        }
        next
    }

    /// The state after assigning `assignee`.
    ///
    /// A new assignee stamps the assignment date and moves a not-started pass to `Assigned`;
    /// clearing the assignee clears the date.
    pub fn with_assignee(&self, assignee: Option<EmployeeId>, now: DateTime<Utc>) -> Self {
        let mut next = self.clone();
        match assignee {
            None => {
                next.qa_assigned_id = None;
                next.qa_assigned_date = None;
            }
            Some(id) if self.qa_assigned_id != Some(id) => {
                next.qa_assigned_id = Some(id);
                next.qa_assigned_date = Some(now);
                if next.qa_status == QaStatus::NotStarted {
                    next.qa_status = QaStatus::Assigned;
                }
            }
            Some(_) => {}
        }
        next
    }

    pub fn with_check_toggled(&self, check: QaCheck) -> Self {
        let mut next = self.clone();
        match check {
            QaCheck::TestPlan => next.qa_test_plan_check = !next.qa_test_plan_check,
            QaCheck::ReleaseNotes => {
                next.qa_test_release_notes_check = !next.qa_test_release_notes_check
            }
        }
        next
    }

    pub fn is_checked(&self, check: QaCheck) -> bool {
        match check {
            QaCheck::TestPlan => self.qa_test_plan_check,
            QaCheck::ReleaseNotes => self.qa_test_release_notes_check,
        }
    }
}

/// The QA panel for one amendment.
pub struct QaPanel<A> {
    api: Arc<A>,
    entity_id: EntityId,
    state: Optimistic<QaWorkflowState>,
}

impl<A: CollaboratorApi> QaPanel<A> {
    pub fn new(api: Arc<A>, entity_id: EntityId, initial: QaWorkflowState) -> Self {
        Self {
            api,
            entity_id,
            state: Optimistic::new(initial),
        }
    }

    /// Fetch the current QA state and build a panel around it.
    pub async fn load(api: Arc<A>, entity_id: EntityId) -> DiscussionResult<Self> {
        let initial = api
            .get_qa(entity_id)
            .await
            .map_err(crate::error::DiscussionError::Load)?;
        Ok(Self::new(api, entity_id, initial))
    }

    pub fn entity_id(&self) -> EntityId {
        self.entity_id
    }

    pub fn current(&self) -> QaWorkflowState {
        self.state.current()
    }

    pub fn subscribe(&self) -> watch::Receiver<QaWorkflowState> {
        self.state.subscribe()
    }

    /// Stop applying completions; used when the detail view goes away.
    pub fn unmount(&self) {
        self.state.detach();
    }

    async fn apply<F>(&self, change: F) -> DiscussionResult<QaWorkflowState>
    where
        F: FnOnce(&QaWorkflowState) -> QaWorkflowState,
    {
        let api = Arc::clone(&self.api);
        let entity_id = self.entity_id;
        self.state
            .mutate(change, move |next| async move {
                api.update_qa(entity_id, &next).await
            })
            .await
    }

    pub async fn set_status(&self, status: QaStatus) -> DiscussionResult<QaWorkflowState> {
        let now = Utc::now();
        self.apply(move |s| s.with_status(status, now)).await
    }

    pub async fn assign(&self, assignee: Option<EmployeeId>) -> DiscussionResult<QaWorkflowState> {
        let now = Utc::now();
        self.apply(move |s| s.with_assignee(assignee, now)).await
    }

    pub async fn toggle_check(&self, check: QaCheck) -> DiscussionResult<QaWorkflowState> {
        self.apply(move |s| s.with_check_toggled(check)).await
    }

    pub async fn set_notes(&self, notes: Option<String>) -> DiscussionResult<QaWorkflowState> {
        let notes = blank_to_none(notes);
        self.apply(move |s| QaWorkflowState {
            qa_notes: notes,
            ..s.clone()
        })
        .await
    }

    pub async fn set_overall_result(
        &self,
        result: Option<QaOverallResult>,
    ) -> DiscussionResult<QaWorkflowState> {
        self.apply(move |s| QaWorkflowState {
            qa_overall_result: result,
            ..s.clone()
        })
        .await
    }

    pub async fn set_test_plan_link(
        &self,
        link: Option<String>,
    ) -> DiscussionResult<QaWorkflowState> {
        let link = blank_to_none(link);
        self.apply(move |s| QaWorkflowState {
            qa_test_plan_link: link,
            ..s.clone()
        })
        .await
    }

    pub async fn set_signature(
        &self,
        signature: Option<String>,
    ) -> DiscussionResult<QaWorkflowState> {
        let signature = blank_to_none(signature);
        self.apply(move |s| QaWorkflowState {
            qa_signature: signature,
            ..s.clone()
        })
        .await
    }
}
