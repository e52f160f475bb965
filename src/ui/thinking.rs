//! Collapsed presentation of an assistant turn's thinking steps.

use crate::core::message::ThinkingStep;
use crate::ui::markdown::escape_html;
use chrono::{DateTime, Utc};
use std::fmt::Write as _;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepKind {
    UserInput,
    ToolPlanning,
    ToolExecution,
    ToolResult,
    Reasoning,
    FinalResponse,
    Other,
}

impl StepKind {
    pub fn from_wire(kind: &str) -> Self {
        match kind.trim() {
            "user_input" => StepKind::UserInput,
            "tool_planning" => StepKind::ToolPlanning,
            "tool_execution" => StepKind::ToolExecution,
            "tool_result" => StepKind::ToolResult,
            "reasoning" => StepKind::Reasoning,
            "final_response" => StepKind::FinalResponse,
            _ => StepKind::Other,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            StepKind::UserInput => "Input received",
            StepKind::ToolPlanning => "Tool use planned",
            StepKind::ToolExecution => "Tool executed",
            StepKind::ToolResult => "Tool result received",
            StepKind::Reasoning => "Reasoning",
            StepKind::FinalResponse => "Final answer produced",
            StepKind::Other => "Step",
        }
    }

    fn css_class(self) -> &'static str {
        match self {
            StepKind::UserInput => "step-user-input",
            StepKind::ToolPlanning => "step-tool-planning",
            StepKind::ToolExecution => "step-tool-execution",
            StepKind::ToolResult => "step-tool-result",
            StepKind::Reasoning => "step-reasoning",
            StepKind::FinalResponse => "step-final-response",
            StepKind::Other => "step-generic",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DisclosedStep {
    pub kind: StepKind,
    pub title: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    pub duration_ms: Option<u64>,
}

/// Steps in the order the backend reported them, plus their summed duration.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ThinkingDisclosure {
    pub steps: Vec<DisclosedStep>,
    pub total_duration_ms: u64,
}

impl ThinkingDisclosure {
    pub fn from_steps(steps: &[ThinkingStep]) -> Self {
        let steps: Vec<DisclosedStep> = steps
            .iter()
            .map(|step| DisclosedStep {
                kind: StepKind::from_wire(&step.kind),
                title: step.title.clone(),
                content: step.content.clone(),
                timestamp: step.timestamp,
                duration_ms: step.duration_ms,
            })
            .collect();
        let total_duration_ms = steps
            .iter()
            .map(|step| step.duration_ms.unwrap_or(0))
            .fold(0u64, u64::saturating_add);
        Self {
            steps,
            total_duration_ms,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn step_count(&self) -> usize {
        self.steps.len()
    }

    fn headline(&self) -> String {
        let noun = if self.steps.len() == 1 { "step" } else { "steps" };
        format!(
            "Thinking: {} {noun}, {}",
            self.steps.len(),
            format_duration(self.total_duration_ms)
        )
    }

    /// A `<details>` element, closed until the reader opens it. Empty when
    /// there are no steps.
    pub fn to_html(&self) -> String {
        if self.is_empty() {
            return String::new();
        }
        let mut html = String::new();
        let _ = write!(
            html,
            "<details class=\"thinking-steps\"><summary>{}</summary><ol>",
            escape_html(&self.headline())
        );
        for step in &self.steps {
            let _ = write!(
                html,
                "<li class=\"thinking-step {}\"><div class=\"step-header\">\
                 <span class=\"step-kind\">{}</span> <span class=\"step-title\">{}</span>",
                step.kind.css_class(),
                step.kind.label(),
                escape_html(&step.title)
            );
            if let Some(ms) = step.duration_ms {
                let _ = write!(
                    html,
                    " <span class=\"step-duration\">{}</span>",
                    format_duration(ms)
                );
            }
            let _ = write!(
                html,
                "</div><time datetime=\"{}\"></time>",
                step.timestamp.to_rfc3339()
            );
            if !step.content.is_empty() {
                let _ = write!(
                    html,
                    "<pre class=\"step-content\">{}</pre>",
                    escape_html(&step.content)
                );
            }
            html.push_str("</li>");
        }
        html.push_str("</ol></details>");
        html
    }

    /// One collapsed line for the terminal, or `None` without steps.
    pub fn summary_line(&self) -> Option<String> {
        (!self.is_empty()).then(|| format!("▸ {} (/steps to expand)", self.headline()))
    }

    /// Every step with its content, numbered in stored order.
    pub fn expanded_listing(&self) -> String {
        let mut out = String::new();
        for (index, step) in self.steps.iter().enumerate() {
            let _ = write!(out, "{:>3}. {}", index + 1, step.kind.label());
            if !step.title.is_empty() {
                let _ = write!(out, ": {}", step.title);
            }
            if let Some(ms) = step.duration_ms {
                let _ = write!(out, " ({})", format_duration(ms));
            }
            out.push('\n');
            for line in step.content.lines() {
                let _ = writeln!(out, "       {line}");
            }
        }
        out
    }
}

fn format_duration(ms: u64) -> String {
    if ms < 1000 {
        format!("{ms} ms")
    } else {
        format!("{:.1} s", ms as f64 / 1000.0)
    }
}
