//! Derives the displayed list from the store's collection.
//!
//! Pure functions only: the caller re-runs `project` whenever the collection,
//! the filter or the search text changes.

use serde::{Deserialize, Serialize};

use crate::model::filter::FilterMode;
use crate::model::task::Task;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct ViewQuery {
    pub filter: FilterMode,
    pub search: String,
}

impl ViewQuery {
    pub fn new(filter: FilterMode, search: impl Into<String>) -> Self {
        Self {
            filter,
            search: search.into(),
        }
    }

    pub fn project<'a>(&self, tasks: &'a [Task]) -> Vec<&'a Task> {
        project(tasks, self.filter, &self.search)
    }
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FilterCounts {
    pub all: usize,
    pub pending: usize,
    pub completed: usize,
}

impl FilterCounts {
    pub fn get(&self, mode: FilterMode) -> usize {
        match mode {
            FilterMode::All => self.all,
            FilterMode::Pending => self.pending,
            FilterMode::Completed => self.completed,
        }
    }
}

/// Filters by completion state, then by case-insensitive substring over
/// title and description. Source order is preserved.
pub fn project<'a>(tasks: &'a [Task], filter: FilterMode, search: &str) -> Vec<&'a Task> {
    let needle = search.trim().to_lowercase();

    tasks
        .iter()
        .filter(|task| filter.matches(task.done))
        .filter(|task| needle.is_empty() || matches_search(task, &needle))
        .collect()
}

/// `needle` must already be lowercased.
fn matches_search(task: &Task, needle: &str) -> bool {
    task.title.to_lowercase().contains(needle) || task.description.to_lowercase().contains(needle)
}

pub fn counts(tasks: &[Task]) -> FilterCounts {
    let completed = tasks.iter().filter(|t| t.done).count();
    FilterCounts {
        all: tasks.len(),
        pending: tasks.len() - completed,
        completed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample() -> Vec<Task> {
        vec![
            Task::new(1, "Tarefa 1", false).with_description("Descrição 1"),
            Task::new(2, "Tarefa 2", true).with_description("Descrição 2"),
        ]
    }

    fn ids(view: &[&Task]) -> Vec<i64> {
        view.iter().map(|t| t.id).collect()
    }

    #[test]
    fn test_filter_modes() {
        let tasks = sample();
        assert_eq!(ids(&project(&tasks, FilterMode::Pending, "")), vec![1]);
        assert_eq!(ids(&project(&tasks, FilterMode::Completed, "")), vec![2]);
        assert_eq!(ids(&project(&tasks, FilterMode::All, "")), vec![1, 2]);
    }

    #[test]
    fn test_search_by_title() {
        let tasks = sample();
        assert_eq!(ids(&project(&tasks, FilterMode::All, "Tarefa 1")), vec![1]);
        assert_eq!(ids(&project(&tasks, FilterMode::All, "tarefa")), vec![1, 2]);
    }

    #[test]
    fn test_search_matches_description_case_insensitively() {
        let tasks = sample();
        assert_eq!(ids(&project(&tasks, FilterMode::All, "DESCRIÇÃO 2")), vec![2]);
        assert_eq!(ids(&project(&tasks, FilterMode::Pending, "descrição 2")), Vec::<i64>::new());
    }

    #[test]
    fn test_blank_search_is_no_filter() {
        let tasks = sample();
        assert_eq!(ids(&project(&tasks, FilterMode::All, "   ")), vec![1, 2]);
    }

    #[test]
    fn test_output_is_ordered_subsequence_and_repeatable() {
        let tasks: Vec<Task> = (1..=20)
            .map(|i| {
                Task::new(i, format!("Item {}", i), i % 3 == 0)
                    .with_description(if i % 2 == 0 { "even" } else { "odd" })
            })
            .collect();

        for filter in FilterMode::ALL {
            for search in ["", "even", "ODD", "item 1", "nothing"] {
                let first = ids(&project(&tasks, filter, search));
                let second = ids(&project(&tasks, filter, search));
                assert_eq!(first, second);

                // Strictly increasing positions in the source means an ordered subsequence.
                let positions: Vec<usize> = first
                    .iter()
                    .map(|id| tasks.iter().position(|t| t.id == *id).unwrap())
                    .collect();
                assert!(positions.windows(2).all(|w| w[0] < w[1]));
            }
        }
    }

    #[test]
    fn test_counts() {
        let tasks = sample();
        let c = counts(&tasks);
        assert_eq!(c, FilterCounts { all: 2, pending: 1, completed: 1 });
        assert_eq!(c.get(FilterMode::Completed), 1);
        assert_eq!(counts(&[]), FilterCounts::default());
    }

    #[test]
    fn test_view_query_project() {
        let tasks = sample();
        let query = ViewQuery::new(FilterMode::All, "2");
        assert_eq!(ids(&query.project(&tasks)), vec![2]);
    }
}
