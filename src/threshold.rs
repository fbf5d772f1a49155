//! Threshold rules and severity levels.
//!
//! A [`ThresholdSet`] holds four ordered rule lists. Classification scans
//! them in the fixed order `hard`, `warn`, `enter`, `exit` and stops at the
//! first matching rule. A value satisfying both a `warn` and a `hard` rule is
//! therefore always `hard`.

use crate::{Error, Result};
use serde::Serialize;
use std::fmt;

/// Severity level a cue is classified into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Level {
    /// No rule matched
    #[default]
    None,
    /// Cue should start being shown
    Enter,
    /// Cue is shown with raised urgency
    Warn,
    /// Cue is shown with maximum urgency
    Hard,
    /// Goal for this cue has been reached
    Exit,
}

impl Level {
    /// Fixed scan order for classification
    pub const EVALUATION_ORDER: [Self; 4] = [Self::Hard, Self::Warn, Self::Enter, Self::Exit];

    /// Rank used when picking the worst blocking cue (`Exit` ranks lowest)
    #[must_use]
    pub const fn severity_rank(self) -> u8 {
        match self {
            Self::Hard => 3,
            Self::Warn => 2,
            Self::Enter => 1,
            Self::None | Self::Exit => 0,
        }
    }

    /// Whether a cue at this level asks the user to do something
    #[must_use]
    pub const fn is_active(self) -> bool {
        matches!(self, Self::Enter | Self::Warn | Self::Hard)
    }

    /// Lower-case name as used in configuration files
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Enter => "enter",
            Self::Warn => "warn",
            Self::Hard => "hard",
            Self::Exit => "exit",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single comparison against one or two operands
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ThresholdRule {
    /// `value > a`
    Gt(f64),
    /// `value >= a`
    Ge(f64),
    /// `value < a`
    Lt(f64),
    /// `value <= a`
    Le(f64),
    /// `|value| > a`
    AbsGt(f64),
    /// `|value| >= a`
    AbsGe(f64),
    /// `|value| < a`
    AbsLt(f64),
    /// `|value| <= a`
    AbsLe(f64),
    /// `min(a, b) <= value <= max(a, b)`
    Between(f64, f64),
}

impl ThresholdRule {
    /// Build a rule from its textual operator and operands.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedRule`] for an unknown operator, a missing
    /// operand, or a non-finite operand.
    pub fn parse(op: &str, operands: &[f64]) -> Result<Self> {
        if let Some(bad) = operands.iter().find(|v| !v.is_finite()) {
            return Err(Error::MalformedRule(format!(
                "operator '{op}' has non-finite operand {bad}"
            )));
        }

        let single = || {
            operands.first().copied().ok_or_else(|| {
                Error::MalformedRule(format!("operator '{op}' is missing its operand"))
            })
        };

        let rule = match op.trim() {
            ">" => Self::Gt(single()?),
            ">=" => Self::Ge(single()?),
            "<" => Self::Lt(single()?),
            "<=" => Self::Le(single()?),
            "abs>" => Self::AbsGt(single()?),
            "abs>=" => Self::AbsGe(single()?),
            "abs<" => Self::AbsLt(single()?),
            "abs<=" => Self::AbsLe(single()?),
            "between" => match operands {
                [a, b] => Self::Between(*a, *b),
                _ => {
                    return Err(Error::MalformedRule(format!(
                        "'between' needs exactly two operands, got {}",
                        operands.len()
                    )))
                }
            },
            other => {
                return Err(Error::MalformedRule(format!("unknown operator '{other}'")));
            }
        };

        Ok(rule)
    }

    /// Whether `value` satisfies this rule
    #[must_use]
    pub fn matches(&self, value: f64) -> bool {
        match *self {
            Self::Gt(a) => value > a,
            Self::Ge(a) => value >= a,
            Self::Lt(a) => value < a,
            Self::Le(a) => value <= a,
            Self::AbsGt(a) => value.abs() > a,
            Self::AbsGe(a) => value.abs() >= a,
            Self::AbsLt(a) => value.abs() < a,
            Self::AbsLe(a) => value.abs() <= a,
            Self::Between(a, b) => value >= a.min(b) && value <= a.max(b),
        }
    }

    /// The operand of a single-operand rule
    #[must_use]
    pub fn single_operand(&self) -> Option<f64> {
        match *self {
            Self::Gt(a)
            | Self::Ge(a)
            | Self::Lt(a)
            | Self::Le(a)
            | Self::AbsGt(a)
            | Self::AbsGe(a)
            | Self::AbsLt(a)
            | Self::AbsLe(a) => Some(a),
            Self::Between(..) => None,
        }
    }
}

/// Location of the rule that produced a classification
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RuleMatch {
    /// Level whose list contained the rule
    pub level: Level,
    /// Index of the rule within that list
    pub index: usize,
    /// The rule itself
    pub rule: ThresholdRule,
}

/// Outcome of scanning a [`ThresholdSet`]
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Classification {
    /// Matched level, `None` when nothing matched
    pub level: Level,
    /// Matched rule, if any
    pub matched: Option<RuleMatch>,
    /// Number of rules tested
    pub rules_evaluated: usize,
}

/// Four ordered rule lists, one per severity level
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ThresholdSet {
    /// Rules that start showing the cue
    pub enter: Vec<ThresholdRule>,
    /// Rules that escalate to a warning
    pub warn: Vec<ThresholdRule>,
    /// Rules for the most severe classification
    pub hard: Vec<ThresholdRule>,
    /// Rules that mean the goal is reached
    pub exit: Vec<ThresholdRule>,
}

impl ThresholdSet {
    /// Rules for one level
    #[must_use]
    pub fn rules(&self, level: Level) -> &[ThresholdRule] {
        match level {
            Level::Enter => &self.enter,
            Level::Warn => &self.warn,
            Level::Hard => &self.hard,
            Level::Exit => &self.exit,
            Level::None => &[],
        }
    }

    /// Total number of rules across all levels
    #[must_use]
    pub fn len(&self) -> usize {
        self.enter.len() + self.warn.len() + self.hard.len() + self.exit.len()
    }

    /// Whether the set holds no rules at all
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Classify `value`, scanning `hard`, `warn`, `enter`, `exit` in that order
    #[must_use]
    pub fn classify(&self, value: f64) -> Classification {
        let mut rules_evaluated = 0;

        for level in Level::EVALUATION_ORDER {
            for (index, rule) in self.rules(level).iter().enumerate() {
                rules_evaluated += 1;
                if rule.matches(value) {
                    return Classification {
                        level,
                        matched: Some(RuleMatch {
                            level,
                            index,
                            rule: *rule,
                        }),
                        rules_evaluated,
                    };
                }
            }
        }

        Classification {
            level: Level::None,
            matched: None,
            rules_evaluated,
        }
    }

    /// Magnitude of the first single-operand `hard` rule, used to normalise severity
    #[must_use]
    pub fn hard_threshold_abs(&self) -> Option<f64> {
        self.hard
            .iter()
            .find_map(ThresholdRule::single_operand)
            .map(f64::abs)
    }
}
