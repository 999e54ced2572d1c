use std::collections::HashMap;

use crate::error::ValidationError;
use crate::model::task::NewTask;

/// Metadata keys understood by `add`.
pub const TASK_KEYS: [&str; 1] = ["description"];

#[derive(Debug, PartialEq)]
pub struct ParsedInput {
    pub title: String,
    /// Values keyed by their full key name.
    pub metadata: HashMap<String, String>,
    pub warnings: Vec<ValidationError>,
}

/// Splits command words into a title and `key:value` metadata.
///
/// A word is metadata only when its key expands to one of `keys`; anything
/// else, such as `https://host` or `bug:crash`, stays part of the text. A
/// metadata value runs until the next recognised key, so
/// `Buy milk desc:two litres please` yields the description `two litres please`.
/// A key given twice keeps its last value.
pub fn parse_args(args: &[String], keys: &[&str]) -> ParsedInput {
    let mut title_parts = Vec::new();
    let mut metadata: HashMap<String, String> = HashMap::new();
    let mut warnings = Vec::new();
    let mut current_key: Option<String> = None;

    for arg in args.iter().flat_map(|a| a.split_whitespace()) {
        if let Some((key, value)) = arg.split_once(':') {
            if !key.is_empty() && key.chars().all(|c| c.is_ascii_alphabetic()) {
                match expand_key(&key.to_lowercase(), keys) {
                    Ok(full) => {
                        metadata.insert(full.clone(), value.to_string());
                        current_key = Some(full);
                        continue;
                    }
                    Err(e @ ValidationError::AmbiguousKey { .. }) => warnings.push(e),
                    Err(_) => {}
                }
            }
        }
        match &current_key {
            Some(key) => {
                let value = metadata.entry(key.clone()).or_default();
                if !value.is_empty() {
                    value.push(' ');
                }
                value.push_str(arg);
            }
            None => title_parts.push(arg),
        }
    }

    ParsedInput {
        title: title_parts.join(" "),
        metadata,
        warnings,
    }
}

pub fn expand_key(key: &str, candidates: &[&str]) -> Result<String, ValidationError> {
    if candidates.contains(&key) {
        return Ok(key.to_string());
    }

    let matches: Vec<String> = candidates
        .iter()
        .filter(|c| !key.is_empty() && c.starts_with(key))
        .map(|c| c.to_string())
        .collect();

    match matches.len() {
        1 => Ok(matches[0].clone()),
        0 => Err(ValidationError::UnknownKey(key.to_string())),
        _ => Err(ValidationError::AmbiguousKey {
            key: key.to_string(),
            matches,
        }),
    }
}

/// Builds a create payload from command words. Ambiguous keys are
/// returned as warnings rather than failing the whole command.
pub fn parse_new_task(args: &[String]) -> (NewTask, Vec<ValidationError>) {
    let mut parsed = parse_args(args, &TASK_KEYS);
    let description = parsed.metadata.remove("description").unwrap_or_default();
    (NewTask::new(parsed.title, description), parsed.warnings)
}
