//! Markdown formatting for task lines.
//!
//! Every list formatter returns [`NONE`] for an empty input so a report
//! section is never silently blank.

use crate::report::{AssigneeGroup, TaskLine};

/// Placeholder for empty sections.
pub const NONE: &str = "(none)";

/// Markdown table of tasks.
pub fn task_table(tasks: &[TaskLine]) -> String {
    if tasks.is_empty() {
        return NONE.to_string();
    }

    let mut md = String::new();
    md.push_str("| Key | Title | Priority | Status | Assignee | Updated |\n");
    md.push_str("|-----|-------|----------|--------|----------|---------|\n");
    for t in tasks {
        md.push_str(&format!(
            "| {} | {} | {} | {} | {} | {} |\n",
            escape_cell(&t.key),
            escape_cell(&t.title),
            t.priority.label(),
            escape_cell(t.status_text()),
            escape_cell(&t.assignees_text()),
            t.updated,
        ));
    }
    trim_newline(md)
}

/// Bullet list, one line per task.
pub fn task_list<'a>(tasks: impl IntoIterator<Item = &'a TaskLine>) -> String {
    let lines: Vec<String> = tasks
        .into_iter()
        .map(|t| format!("- {}", summary_line(t)))
        .collect();
    join_or_none(lines)
}

/// Numbered list, one line per task.
pub fn task_numbered(tasks: &[TaskLine]) -> String {
    let lines: Vec<String> = tasks
        .iter()
        .enumerate()
        .map(|(i, t)| format!("{}. {}", i + 1, summary_line(t)))
        .collect();
    join_or_none(lines)
}

/// One section per task with every field and the full description.
pub fn task_details(tasks: &[TaskLine]) -> String {
    if tasks.is_empty() {
        return NONE.to_string();
    }

    let sections: Vec<String> = tasks
        .iter()
        .map(|t| {
            let mut md = format!("### {}: {}\n\n", t.key, single_line(&t.title));
            md.push_str(&format!("- **Status**: {}\n", t.status_text()));
            md.push_str(&format!("- **Priority**: {}\n", t.priority.label()));
            md.push_str(&format!("- **Assignees**: {}\n", t.assignees_text()));
            md.push_str(&format!("- **Updated**: {}\n", t.updated));
            if let Some(ref desc) = t.description {
                md.push('\n');
                md.push_str(desc);
                md.push('\n');
            }
            md
        })
        .collect();
    trim_newline(sections.join("\n"))
}

/// One heading per first assignee with that person's tasks below.
pub fn assignee_sections(groups: &[AssigneeGroup]) -> String {
    if groups.is_empty() {
        return NONE.to_string();
    }

    let sections: Vec<String> = groups
        .iter()
        .map(|g| format!("### {} ({})\n\n{}", g.name, g.tasks.len(), task_list(&g.tasks)))
        .collect();
    sections.join("\n\n")
}

fn summary_line(t: &TaskLine) -> String {
    format!(
        "**{}** {} [{} · {} · {}]",
        t.key,
        single_line(&t.title),
        t.priority.label(),
        t.status_text(),
        t.assignee
    )
}

/// Make text safe inside a table cell.
pub fn escape_cell(s: &str) -> String {
    s.trim()
        .replace('|', "\\|")
        .replace("\r\n", "<br>")
        .replace('\n', "<br>")
}

fn single_line(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn join_or_none(lines: Vec<String>) -> String {
    if lines.is_empty() {
        NONE.to_string()
    } else {
        lines.join("\n")
    }
}

fn trim_newline(mut s: String) -> String {
    while s.ends_with('\n') {
        s.pop();
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Priority, Status};

    fn line(key: &str, title: &str, assignees: &[&str]) -> TaskLine {
        TaskLine {
            id: key.to_lowercase(),
            key: key.to_string(),
            title: title.to_string(),
            description: None,
            status: Status::Todo,
            state_name: None,
            priority: Priority::High,
            assignee: assignees.first().copied().unwrap_or("Unassigned").to_string(),
            assignees: assignees.iter().map(|s| s.to_string()).collect(),
            updated: "2024-03-09".to_string(),
        }
    }

    #[test]
    fn test_empty_inputs_render_none() {
        assert_eq!(task_table(&[]), NONE);
        assert_eq!(task_list(&Vec::<TaskLine>::new()), NONE);
        assert_eq!(task_numbered(&[]), NONE);
        assert_eq!(task_details(&[]), NONE);
        assert_eq!(assignee_sections(&[]), NONE);
    }

    #[test]
    fn test_table_escapes_cells() {
        let md = task_table(&[line("MOB-1", "a | b\nc", &["Ada", "Grace"])]);
        let rows: Vec<&str> = md.lines().collect();
        assert_eq!(rows.len(), 3);
        assert_eq!(
            rows[2],
            "| MOB-1 | a \\| b<br>c | High | Todo | Ada, Grace | 2024-03-09 |"
        );
    }

    #[test]
    fn test_list_and_numbered() {
        let tasks = vec![line("MOB-1", "First", &["Ada"]), line("MOB-2", "Second", &[])];
        assert_eq!(
            task_list(&tasks),
            "- **MOB-1** First [High · Todo · Ada]\n- **MOB-2** Second [High · Todo · Unassigned]"
        );
        assert!(task_numbered(&tasks).starts_with("1. **MOB-1**"));
        assert!(task_numbered(&tasks).contains("\n2. **MOB-2**"));
    }

    #[test]
    fn test_details_include_description_and_all_assignees() {
        let mut t = line("MOB-3", "Ship it", &["Ada", "Grace"]);
        t.description = Some("Line one\nLine two".to_string());
        let md = task_details(&[t]);
        assert!(md.starts_with("### MOB-3: Ship it"));
        assert!(md.contains("- **Assignees**: Ada, Grace"));
        assert!(md.ends_with("Line one\nLine two"));
    }

    #[test]
    fn test_assignee_sections() {
        let groups = vec![AssigneeGroup {
            name: "Ada".to_string(),
            tasks: vec![line("MOB-1", "First", &["Ada"])],
        }];
        assert_eq!(
            assignee_sections(&groups),
            "### Ada (1)\n\n- **MOB-1** First [High · Todo · Ada]"
        );
    }
}
