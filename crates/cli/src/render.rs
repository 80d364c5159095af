//! Plain-text rendering of threads and QA state for the terminal.

use amend_core::{flatten, Comment, CommentNode, CommentReactions, QaWorkflowState};
use std::collections::BTreeMap;
use std::fmt::Write;

const INDENT: &str = "    ";

fn summary_line(summary: &BTreeMap<String, u32>) -> String {
    summary
        .iter()
        .filter(|(_, count)| **count > 0)
        .map(|(glyph, count)| format!("{} {}", glyph, count))
        .collect::<Vec<_>>()
        .join("  ")
}

fn comment_line(comment: &Comment) -> String {
    let mut line = format!(
        "#{} {} [{}] {}",
        comment.id,
        comment.author_name,
        comment.kind,
        comment.created_at.format("%Y-%m-%d %H:%M")
    );
    if comment.edited_flag {
        line.push_str(" (edited)");
    }
    line
}

/// Render a forest with replies indented under their parents.
pub fn thread(forest: &[CommentNode]) -> String {
    let mut out = String::new();
    for row in flatten(forest) {
        let pad = INDENT.repeat(row.depth);
        let _ = writeln!(out, "{}{}", pad, comment_line(row.comment));
        for text in row.comment.body_text.lines() {
            let _ = writeln!(out, "{}  {}", pad, text);
        }
        let reactions = summary_line(&row.comment.reaction_summary);
        if !reactions.is_empty() {
            let _ = writeln!(out, "{}  {}", pad, reactions);
        }
    }
    if out.is_empty() {
        out.push_str("No comments yet.\n");
    }
    out
}

pub fn reactions(state: &CommentReactions) -> String {
    if state.counts.is_empty() {
        return "No reactions.".to_string();
    }
    state
        .counts
        .iter()
        .map(|(emoji, count)| {
            let mine = if state.is_mine(*emoji) { "*" } else { "" };
            format!("{} {}{}", emoji, count, mine)
        })
        .collect::<Vec<_>>()
        .join("  ")
}

fn or_dash<T: ToString>(value: &Option<T>) -> String {
    value
        .as_ref()
        .map(ToString::to_string)
        .unwrap_or_else(|| "-".to_string())
}

fn check(done: bool) -> &'static str {
    if done {
        "[x]"
    } else {
        "[ ]"
    }
}

pub fn qa(state: &QaWorkflowState) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Status:        {}", state.qa_status);
    let _ = writeln!(out, "Assignee:      {}", or_dash(&state.qa_assigned_id));
    let _ = writeln!(out, "Assigned:      {}", or_dash(&state.qa_assigned_date));
    let _ = writeln!(out, "Started:       {}", or_dash(&state.qa_started_date));
    let _ = writeln!(
        out,
        "Completed:     {} {}",
        check(state.qa_completed),
        or_dash(&state.qa_completed_date)
    );
    let _ = writeln!(out, "Test plan:     {}", check(state.qa_test_plan_check));
    let _ = writeln!(out, "Release notes: {}", check(state.qa_test_release_notes_check));
    let _ = writeln!(
        out,
        "Result:        {}",
        or_dash(&state.qa_overall_result.map(|r| r.as_str()))
    );
    let _ = writeln!(out, "Plan link:     {}", or_dash(&state.qa_test_plan_link));
    let _ = writeln!(out, "Signature:     {}", or_dash(&state.qa_signature));
    let _ = writeln!(out, "Notes:         {}", or_dash(&state.qa_notes));
    out
}
