use tabled::settings::object::Rows;
use tabled::settings::{Color, Modify, Style};
use tabled::{Table, Tabled};
use taskdeck_core::{counts, format_server_date, FilterMode, Task, User, ViewQuery};

#[derive(Tabled)]
struct TaskRow {
    #[tabled(rename = "ID")]
    id: i64,
    #[tabled(rename = "Status")]
    status: &'static str,
    #[tabled(rename = "Title")]
    title: String,
    #[tabled(rename = "Description")]
    description: String,
    #[tabled(rename = "Created")]
    created: String,
}

impl TaskRow {
    fn from_task(task: &Task) -> Self {
        Self {
            id: task.id,
            status: if task.done { "✅ Completed" } else { "🟡 Pending" },
            title: task.title.clone(),
            description: truncate(&task.description, 40),
            created: format_server_date(task.created_at.as_deref()),
        }
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    let first_line = text.lines().next().unwrap_or("");
    if first_line.chars().count() <= max_chars {
        return first_line.to_string();
    }
    let cut: String = first_line.chars().take(max_chars - 1).collect();
    format!("{}…", cut)
}

pub fn show_tasks(user: Option<&User>, tasks: &[Task], query: &ViewQuery) {
    if let Some(user) = user.filter(|u| !u.name.is_empty()) {
        println!("Welcome, {}", user.name);
    }

    let totals = counts(tasks);
    let tabs: Vec<String> = FilterMode::ALL
        .iter()
        .map(|mode| {
            let label = format!("{} ({})", mode.label(), totals.get(*mode));
            if *mode == query.filter {
                format!("\x1b[1;36m[{}]\x1b[0m", label)
            } else {
                label
            }
        })
        .collect();
    println!("{}", tabs.join("  "));

    let visible = query.project(tasks);
    if visible.is_empty() {
        println!("\nNo tasks found.");
        if query.search.trim().is_empty() && query.filter == FilterMode::All {
            println!("Run `taskdeck add <title>` to add a new task.");
        }
        return;
    }

    let rows: Vec<TaskRow> = visible.into_iter().map(TaskRow::from_task).collect();
    let mut table = Table::new(rows);
    table
        .with(Style::rounded())
        .with(Modify::new(Rows::first()).with(Color::FG_CYAN));
    println!("{}", table);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_keeps_first_line() {
        assert_eq!(truncate("short", 40), "short");
        assert_eq!(truncate("line one\nline two", 40), "line one");
        assert_eq!(truncate("abcdefghij", 5), "abcd…");
        assert_eq!(truncate("", 5), "");
    }

    #[test]
    fn test_row_status_labels() {
        let row = TaskRow::from_task(&Task::new(2, "Tarefa 2", true));
        assert_eq!(row.status, "✅ Completed");
        assert_eq!(row.created, "-");
    }
}
