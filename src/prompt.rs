//! Prompt construction for the two generation phases.
//!
//! Both builders are pure: the same request always renders the same prompt.

use crate::dispatch::GenerateRequest;

/// Diff text longer than this (in characters) is cut before embedding.
pub const MAX_DIFF_CHARS: usize = 4000;

/// Marker appended after the closing fence when the diff was cut.
pub const TRUNCATION_MARKER: &str = "(diff truncated)";

/// Commit types the generator is allowed to use.
pub const COMMIT_TYPES: &[&str] = &[
    "feat", "fix", "docs", "style", "refactor", "perf", "test", "build", "ci", "chore", "revert",
];

/// Render the prompt asking for `candidate_count` subject lines.
pub fn build_subject_prompt(req: &GenerateRequest) -> String {
    let mut prompt = format!(
        "You are a commit message generator. Based on the following git diff, \
         generate {count} commit message suggestions in Conventional Commits format.\n\
         \n\
         Rules:\n\
         - Format: <type>(<scope>): <subject>\n\
         - type must be one of: {types}\n\
         - scope is optional\n\
         - subject must be lowercase, imperative mood, no period at end\n\
         - subject must be concise (under 72 characters)\n\
         - Output ONLY the commit messages, one per line, no numbering, no explanation\n\
         \n",
        count = req.candidate_count,
        types = COMMIT_TYPES.join(", "),
    );

    push_selections(&mut prompt, req);
    push_context(&mut prompt, req);
    prompt
}

/// Render the prompt asking for a body and footer for an already chosen subject.
pub fn build_detail_prompt(req: &GenerateRequest) -> String {
    let mut prompt = String::from(
        "You are a commit message generator. The commit header has already been chosen. \
         Based on the following git diff, write the body and footer for this commit.\n\
         \n\
         Rules:\n\
         - The body explains what changed and why, wrapped at 72 characters\n\
         - The footer holds trailers such as \"BREAKING CHANGE: ...\" or \"Refs: #123\"\n\
         - Either section may be left empty if it adds nothing\n\
         - Output EXACTLY this format and nothing else:\n\
         Body:\n\
         <body text>\n\
         Footer:\n\
         <footer text>\n\
         \n",
    );

    push_selections(&mut prompt, req);
    push_context(&mut prompt, req);
    prompt
}

fn push_selections(prompt: &mut String, req: &GenerateRequest) {
    if let Some(commit_type) = req.commit_type() {
        prompt.push_str(&format!("Commit type is already selected: {commit_type}\n"));
    }
    if let Some(scope) = req.scope() {
        prompt.push_str(&format!("Scope is already selected: {scope}\n"));
    }
    if let Some(subject) = req.subject() {
        prompt.push_str(&format!("Subject is already selected: {subject}\n"));
    }
}

fn push_context(prompt: &mut String, req: &GenerateRequest) {
    if !req.file_summary.trim().is_empty() {
        prompt.push_str(&format!("\nChanged files:\n{}\n", req.file_summary));
    }

    let (diff, truncated) = truncate_diff(&req.diff);
    prompt.push_str(&format!("\nGit diff:\n```\n{diff}\n```"));
    if truncated {
        prompt.push('\n');
        prompt.push_str(TRUNCATION_MARKER);
    }
}

/// Cut `diff` to at most [`MAX_DIFF_CHARS`] characters.
/// Returns the (possibly shortened) text and whether anything was dropped.
pub fn truncate_diff(diff: &str) -> (&str, bool) {
    match diff.char_indices().nth(MAX_DIFF_CHARS) {
        Some((end, _)) => (&diff[..end], true),
        None => (diff, false),
    }
}
