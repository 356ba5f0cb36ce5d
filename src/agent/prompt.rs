//! Prompt assembly.
//!
//! Each builder produces one self-contained prompt string. Context slices
//! (index summary, file excerpts, history) arrive pre-bounded by the caller
//! so prompt size stays flat as the repository grows.

use crate::types::{AgentMemory, ChatEntry, ProjectMetadata, Task};

/// History turns included in a chat prompt.
pub const HISTORY_WINDOW: usize = 10;

/// Per-file excerpt cap for implementation prompts.
pub const FILE_EXCERPT_CHARS: usize = 2000;

/// Prompt asking the model to plan a task backlog.
pub fn plan_prompt(description: &str, framework: &str, existing_context: &str) -> String {
    let mut prompt = String::new();
    prompt.push_str(
        "You are a senior software engineer planning the build-out of a project.\n\n",
    );
    prompt.push_str(&format!("Project description:\n{description}\n\n"));
    prompt.push_str(&format!("Framework: {framework}\n\n"));
    if !existing_context.is_empty() {
        prompt.push_str(&format!("Existing project context:\n{existing_context}\n\n"));
    }
    prompt.push_str(
        "Produce between 8 and 15 concrete development tasks. Respond with STRICT JSON \
         only, no prose, in this shape:\n\
         {\"tasks\": [{\"title\": \"...\", \"description\": \"...\", \
         \"priority\": \"low|medium|high\", \"estimatedTime\": \"...\", \
         \"files\": [\"...\"], \"dependencies\": [], \
         \"acceptanceCriteria\": [\"...\"], \"technicalNotes\": \"...\"}]}\n",
    );
    prompt
}

/// Prompt asking the model to implement one task as concrete file edits.
pub fn implement_prompt(
    task: &Task,
    metadata: Option<&ProjectMetadata>,
    index_summary: &str,
    file_excerpts: &[(String, String)],
    memory: &AgentMemory,
) -> String {
    let mut prompt = String::new();
    prompt.push_str("You are an autonomous coding agent implementing one task.\n\n");

    if let Some(meta) = metadata {
        prompt.push_str(&format!(
            "Project: {} ({})\n{}\n\n",
            meta.name, meta.framework, meta.description
        ));
    }

    prompt.push_str(&format!(
        "Task: {}\nDetails: {}\nPriority: {:?}\n",
        task.title, task.description, task.priority
    ));
    if !task.files.is_empty() {
        prompt.push_str(&format!("Files likely involved: {}\n", task.files.join(", ")));
    }
    if !task.acceptance_criteria.is_empty() {
        prompt.push_str(&format!(
            "Acceptance criteria:\n- {}\n",
            task.acceptance_criteria.join("\n- ")
        ));
    }
    if let Some(notes) = &task.technical_notes {
        prompt.push_str(&format!("Technical notes: {notes}\n"));
    }
    prompt.push('\n');

    if !index_summary.is_empty() {
        prompt.push_str(&format!("Codebase overview:\n{index_summary}\n\n"));
    }
    for (path, content) in file_excerpts {
        let excerpt = truncate(content, FILE_EXCERPT_CHARS);
        prompt.push_str(&format!("--- {path} ---\n{excerpt}\n\n"));
    }
    if let Some(focus) = &memory.current_focus {
        prompt.push_str(&format!("Previous focus: {focus}\n"));
    }
    for entry in recent_history(memory, 4) {
        prompt.push_str(&format!("[{}] {}\n", entry.role, truncate(&entry.content, 300)));
    }

    prompt.push_str(
        "\nRespond with STRICT JSON only:\n\
         {\"files\": [{\"path\": \"...\", \"content\": \"...\", \
         \"operation\": \"create|update|delete\"}], \
         \"message\": \"what was done\", \"commitMessage\": \"...\"}\n",
    );
    prompt
}

/// Prompt for a conversational reply with full project context.
pub fn chat_prompt(
    message: &str,
    metadata: Option<&ProjectMetadata>,
    index_summary: &str,
    memory: &AgentMemory,
    search_context: Option<&str>,
) -> String {
    let mut prompt = String::new();
    prompt.push_str(
        "You are the development agent for this project. Answer the user using the \
         context below. If you need external information or a project file, request a \
         tool with a fenced tool_code block containing one JSON object, e.g.\n\
         ```tool_code\n{\"tool\": \"read_file\", \"args\": {\"path\": \"package.json\"}}\n```\n\
         Available tools: web_search {query}, read_file {path}, validate_json {path}.\n\n",
    );

    if let Some(meta) = metadata {
        prompt.push_str(&format!(
            "Project: {} ({}) — {}. Progress: {}%.\n\n",
            meta.name, meta.framework, meta.description, meta.progress
        ));
    }
    if !index_summary.is_empty() {
        prompt.push_str(&format!("Codebase:\n{index_summary}\n\n"));
    }
    if !memory.learnings.is_empty() {
        let mut learnings: Vec<(&String, &String)> = memory.learnings.iter().collect();
        learnings.sort();
        prompt.push_str("Learnings from past tasks:\n");
        for (task_id, learning) in learnings.iter().take(10) {
            prompt.push_str(&format!("- {task_id}: {learning}\n"));
        }
        prompt.push('\n');
    }
    if !memory.user_preferences.is_empty() {
        let mut prefs: Vec<(&String, &String)> = memory.user_preferences.iter().collect();
        prefs.sort();
        prompt.push_str("User preferences:\n");
        for (key, value) in prefs {
            prompt.push_str(&format!("- {key}: {value}\n"));
        }
        prompt.push('\n');
    }
    if !memory.project_insights.is_empty() {
        prompt.push_str(&format!(
            "Project insights:\n- {}\n\n",
            memory.project_insights.join("\n- ")
        ));
    }
    if let Some(results) = search_context {
        prompt.push_str(&format!("Web search results:\n{results}\n\n"));
    }

    let history = recent_history(memory, HISTORY_WINDOW);
    if !history.is_empty() {
        prompt.push_str("Recent conversation:\n");
        for entry in history {
            prompt.push_str(&format!("[{}] {}\n", entry.role, truncate(&entry.content, 500)));
        }
        prompt.push('\n');
    }

    prompt.push_str(&format!("User: {message}\n"));
    prompt
}

/// Prompt continuing a reply after a tool has run.
pub fn tool_continuation_prompt(original_reply: &str, tool_result: &str) -> String {
    format!(
        "You previously replied:\n{original_reply}\n\n\
         The requested tool has run. Result:\n{tool_result}\n\n\
         Continue your reply for the user, incorporating the result. \
         Do not request another tool.\n"
    )
}

fn recent_history(memory: &AgentMemory, n: usize) -> &[ChatEntry] {
    let history = &memory.conversation_history;
    let start = history.len().saturating_sub(n);
    &history[start..]
}

fn truncate(text: &str, max: usize) -> &str {
    if text.len() <= max {
        return text;
    }
    let mut end = max;
    while end > 0 && !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AgentMemory;

    #[test]
    fn plan_prompt_names_the_framework_and_shape() {
        let prompt = plan_prompt("A todo app", "nextjs", "");
        assert!(prompt.contains("nextjs"));
        assert!(prompt.contains("\"tasks\""));
        assert!(prompt.contains("8 and 15"));
    }

    #[test]
    fn chat_prompt_windows_history() {
        let mut memory = AgentMemory::default();
        for i in 0..30 {
            memory.push_history("user", &format!("m{i}"));
        }
        let prompt = chat_prompt("hello", None, "", &memory, None);
        assert!(!prompt.contains("m19"));
        assert!(prompt.contains("m29"));
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        let s = "héllo wörld";
        let t = truncate(s, 2);
        assert!(s.starts_with(t));
        assert!(t.len() <= 2);
    }
}
