//! ToolExecutor - the tool set offered to a task executor

use std::collections::BTreeMap;

use tracing::debug;

use crate::llm::{ToolCall, ToolDefinition};

use super::builtin::{FetchTool, SearchSettings, SearchTool};
use super::{Tool, ToolContext, ToolResult};

/// Named collection of tools with dispatch by tool_use name
pub struct ToolExecutor {
    tools: BTreeMap<String, Box<dyn Tool>>,
}

impl ToolExecutor {
    /// Internet research tools: web search plus page fetch
    pub fn research(search: SearchSettings) -> Self {
        debug!(provider = %search.provider, "ToolExecutor::research: called");
        let fetch_timeout = search.timeout;
        let mut executor = Self::empty();
        executor.add_tool(Box::new(SearchTool::new(search)));
        executor.add_tool(Box::new(FetchTool::new(fetch_timeout)));
        executor
    }

    /// Create an empty executor
    pub fn empty() -> Self {
        Self { tools: BTreeMap::new() }
    }

    /// Add a tool; a tool with the same name is replaced
    pub fn add_tool(&mut self, tool: Box<dyn Tool>) {
        debug!(tool_name = %tool.name(), "ToolExecutor::add_tool: called");
        self.tools.insert(tool.name().to_string(), tool);
    }

    /// Tool definitions for the LLM request, ordered by name
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools
            .values()
            .map(|t| ToolDefinition::new(t.name(), t.description(), t.input_schema()))
            .collect()
    }

    /// Execute a tool call
    pub async fn execute(&self, tool_call: &ToolCall, ctx: &ToolContext) -> ToolResult {
        debug!(tool_name = %tool_call.name, tool_id = %tool_call.id, "ToolExecutor::execute: called");
        match self.tools.get(&tool_call.name) {
            Some(tool) => tool.execute(tool_call.input.clone(), ctx).await,
            None => ToolResult::error(format!("Unknown tool: {}", tool_call.name)),
        }
    }

    /// Execute tool calls in order, pairing each result with its call id
    pub async fn execute_all(&self, tool_calls: &[ToolCall], ctx: &ToolContext) -> Vec<(String, ToolResult)> {
        debug!(count = tool_calls.len(), "ToolExecutor::execute_all: called");
        let mut results = Vec::with_capacity(tool_calls.len());
        for call in tool_calls {
            let result = self.execute(call, ctx).await;
            results.push((call.id.clone(), result));
        }
        results
    }

    pub fn tool_names(&self) -> Vec<&str> {
        self.tools.keys().map(String::as_str).collect()
    }
}
