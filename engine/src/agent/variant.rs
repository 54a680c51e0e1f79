//! Behavior Variants
//!
//! Agents differ only in the fixed framing text wrapped around their prompt.
//! Adding a variant means adding an enum case and its arm in [`framing`].

use std::fmt;
use std::str::FromStr;

use sdk::errors::EngineError;
use serde::{Deserialize, Serialize};

/// Behavior variant of an agent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Variant {
    /// Gathers information, thorough and detailed
    Research,

    /// Turns data into insights
    Analysis,

    /// Carries out instructions directly
    Execution,

    #[default]
    General,
}

impl Variant {
    pub fn as_str(&self) -> &'static str {
        match self {
            Variant::Research => "research",
            Variant::Analysis => "analysis",
            Variant::Execution => "execution",
            Variant::General => "general",
        }
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Variant {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "research" => Ok(Variant::Research),
            "analysis" => Ok(Variant::Analysis),
            "execution" => Ok(Variant::Execution),
            "general" => Ok(Variant::General),
            other => Err(EngineError::Config(format!(
                "unknown agent variant '{}' (expected research, analysis, execution or general)",
                other
            ))),
        }
    }
}

/// Fixed prompt framing for a variant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Framing {
    /// Closing instruction placed after the persona
    pub instructions: &'static str,

    /// Label introducing the invocation input
    pub input_label: &'static str,
}

/// Framing text for a variant
pub fn framing(variant: Variant) -> Framing {
    match variant {
        Variant::Research => Framing {
            instructions: "Use the tools provided to research the request. Be thorough and detailed.",
            input_label: "Question",
        },
        Variant::Analysis => Framing {
            instructions: "Analyze the data provided and produce valuable insights. Be analytical and precise.",
            input_label: "Data to analyze",
        },
        Variant::Execution => Framing {
            instructions: "Carry out the task efficiently and accurately. Be direct.",
            input_label: "Task",
        },
        Variant::General => Framing {
            instructions: "Complete the request using the tools provided where they help.",
            input_label: "Input",
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_variants_have_distinct_labels() {
        let labels: std::collections::HashSet<_> = [
            Variant::Research,
            Variant::Analysis,
            Variant::Execution,
            Variant::General,
        ]
        .iter()
        .map(|v| framing(*v).input_label)
        .collect();
        assert_eq!(labels.len(), 4);
    }

    #[test]
    fn test_parse_variant() {
        assert_eq!("Research".parse::<Variant>().unwrap(), Variant::Research);
        assert_eq!(Variant::default(), Variant::General);
        assert!(matches!(
            "planner".parse::<Variant>(),
            Err(EngineError::Config(_))
        ));
    }
}
