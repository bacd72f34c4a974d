//! Notification templates keyed by transition target.

use std::collections::HashMap;

use crewline_core::WorkState;
use serde::{Deserialize, Serialize};

/// Which message a transition produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemplateKind {
    /// Crew put on a unit
    Assigned,
    /// A crew member accepted
    Accepted,
    /// First check-in, or crew started manually
    Started,
    /// Work finished, awaiting confirmation
    Completed,
    /// Manager signed off
    Confirmed,
}

impl TemplateKind {
    /// Template for a transition into `to`, if that target notifies anyone.
    pub fn for_target(to: WorkState) -> Option<Self> {
        match to {
            WorkState::Assigned => Some(Self::Assigned),
            WorkState::Accepted => Some(Self::Accepted),
            WorkState::InProgress => Some(Self::Started),
            WorkState::Completed => Some(Self::Completed),
            WorkState::Confirmed => Some(Self::Confirmed),
            WorkState::Draft | WorkState::Open => None,
        }
    }

    /// Stable name, used in config and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Assigned => "assigned",
            Self::Accepted => "accepted",
            Self::Started => "started",
            Self::Completed => "completed",
            Self::Confirmed => "confirmed",
        }
    }

    fn default_text(&self) -> &'static str {
        match self {
            Self::Assigned => {
                "New cleaning job at {{property}} on {{work_date}} ({{occupants}} guests). Please accept or decline."
            }
            Self::Accepted => "{{actor}} accepted the cleaning at {{property}} on {{work_date}}.",
            Self::Started => "Cleaning started at {{property}} ({{work_date}}). Crew: {{crew}}.",
            Self::Completed => {
                "Cleaning finished at {{property}} ({{work_date}}). Waiting for confirmation."
            }
            Self::Confirmed => {
                "Cleaning at {{property}} on {{work_date}} was confirmed by {{actor}}. Report: {{report}}"
            }
        }
    }
}

/// Values substituted into a template.
#[derive(Debug, Clone, Default)]
pub struct TemplateContext {
    values: HashMap<&'static str, String>,
}

impl TemplateContext {
    /// Create an empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a value.
    pub fn set(mut self, key: &'static str, value: impl Into<String>) -> Self {
        self.values.insert(key, value.into());
        self
    }
}

/// The set of message texts, with configured overrides.
#[derive(Debug, Clone, Default)]
pub struct TemplateSet {
    overrides: HashMap<TemplateKind, String>,
}

impl TemplateSet {
    /// Built-in texts only.
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `overrides` instead of the built-in text for the kinds it names.
    pub fn with_overrides(overrides: HashMap<TemplateKind, String>) -> Self {
        Self { overrides }
    }

    /// Render a template. Unknown placeholders are left in place.
    ///
    /// The template is scanned once; substituted values are never expanded
    /// again, so a report containing `{{property}}` comes out verbatim.
    pub fn render(&self, kind: TemplateKind, context: &TemplateContext) -> String {
        let template = self
            .overrides
            .get(&kind)
            .map(String::as_str)
            .unwrap_or_else(|| kind.default_text());

        let mut out = String::with_capacity(template.len());
        let mut rest = template;
        while let Some(start) = rest.find("{{") {
            out.push_str(&rest[..start]);
            let after = &rest[start + 2..];
            let Some(end) = after.find("}}") else {
                rest = &rest[start..];
                break;
            };
            let key = &after[..end];
            match context.values.get(key) {
                Some(value) => out.push_str(value),
                None => {
                    out.push_str("{{");
                    out.push_str(key);
                    out.push_str("}}");
                }
            }
            rest = &after[end + 2..];
        }
        out.push_str(rest);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context() -> TemplateContext {
        TemplateContext::new()
            .set("property", "Seaside Loft")
            .set("work_date", "2025-07-05")
            .set("occupants", "2")
            .set("actor", "mgr-1")
            .set("report", "all good")
    }

    #[test]
    fn test_target_mapping() {
        assert_eq!(TemplateKind::for_target(WorkState::InProgress), Some(TemplateKind::Started));
        assert_eq!(TemplateKind::for_target(WorkState::Open), None);
        assert_eq!(TemplateKind::for_target(WorkState::Draft), None);
    }

    #[test]
    fn test_default_render() {
        let text = TemplateSet::new().render(TemplateKind::Confirmed, &context());
        assert_eq!(
            text,
            "Cleaning at Seaside Loft on 2025-07-05 was confirmed by mgr-1. Report: all good"
        );
    }

    #[test]
    fn test_override_and_unknown_placeholder() {
        let set = TemplateSet::with_overrides(HashMap::from([(
            TemplateKind::Assigned,
            "Job {{work_date}} {{missing}}".to_string(),
        )]));
        assert_eq!(set.render(TemplateKind::Assigned, &context()), "Job 2025-07-05 {{missing}}");
        // Kinds without override keep the default
        assert!(set.render(TemplateKind::Started, &context()).starts_with("Cleaning started"));
    }

    #[test]
    fn test_values_are_not_expanded_again() {
        let context = context()
            .set("report", "see {{property}} and {{work_date}}")
            .set("actor", "{{report}}");
        let text = TemplateSet::new().render(TemplateKind::Confirmed, &context);
        assert_eq!(
            text,
            "Cleaning at Seaside Loft on 2025-07-05 was confirmed by {{report}}. Report: see {{property}} and {{work_date}}"
        );
    }

    #[test]
    fn test_unterminated_placeholder_is_kept() {
        let set = TemplateSet::with_overrides(HashMap::from([(
            TemplateKind::Accepted,
            "{{actor}} took it {{oops".to_string(),
        )]));
        assert_eq!(set.render(TemplateKind::Accepted, &context()), "mgr-1 took it {{oops");
    }
}
