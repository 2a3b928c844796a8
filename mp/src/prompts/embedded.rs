//! Embedded prompts
//!
//! Compiled into the binary from the .pmt files under `prompts/`.

use tracing::debug;

pub const GOAL_CREATE: &str = include_str!("../../prompts/goal-create.pmt");
pub const GOAL_OPTIMIZE: &str = include_str!("../../prompts/goal-optimize.pmt");
pub const RESPONSE_OPTIMIZE: &str = include_str!("../../prompts/response-optimize.pmt");
pub const DECOMPOSE: &str = include_str!("../../prompts/decompose.pmt");
pub const SELECT_OPTION: &str = include_str!("../../prompts/select-option.pmt");
pub const EXECUTE_TASK: &str = include_str!("../../prompts/execute-task.pmt");
pub const AGGREGATE: &str = include_str!("../../prompts/aggregate.pmt");

/// Names of every embedded template
pub const TEMPLATE_NAMES: [&str; 7] = [
    "goal-create",
    "goal-optimize",
    "response-optimize",
    "decompose",
    "select-option",
    "execute-task",
    "aggregate",
];

/// Get the embedded prompt by name
pub fn get_embedded(name: &str) -> Option<&'static str> {
    debug!(%name, "get_embedded: called");
    match name {
        "goal-create" => Some(GOAL_CREATE),
        "goal-optimize" => Some(GOAL_OPTIMIZE),
        "response-optimize" => Some(RESPONSE_OPTIMIZE),
        "decompose" => Some(DECOMPOSE),
        "select-option" => Some(SELECT_OPTION),
        "execute-task" => Some(EXECUTE_TASK),
        "aggregate" => Some(AGGREGATE),
        _ => {
            debug!("get_embedded: no match found");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_name_resolves() {
        for name in TEMPLATE_NAMES {
            assert!(get_embedded(name).is_some(), "missing template {}", name);
        }
    }

    #[test]
    fn test_decompose_mentions_bounds_and_date() {
        assert!(DECOMPOSE.contains("{{current_date}}"));
        assert!(DECOMPOSE.contains("{{min_tasks}}"));
        assert!(DECOMPOSE.contains("submit_tasks"));
    }

    #[test]
    fn test_select_option_asks_for_number_only() {
        assert!(SELECT_OPTION.contains("option number only"));
    }

    #[test]
    fn test_get_embedded_unknown() {
        assert!(get_embedded("plan").is_none());
    }
}
