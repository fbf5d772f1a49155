//! Configuration management for the cue decision engine.
//!
//! The YAML document is parsed into the serde-facing [`GuidanceConfig`] and
//! then validated once into a [`CueCatalog`]. Every structural problem is
//! reported at load time so that no frame is ever evaluated against a
//! malformed cue.

use crate::{
    anti_jitter::AntiJitterConfig,
    constants::{
        DEFAULT_COOLDOWN_MS, DEFAULT_CUE_PERSIST_FRAMES, DEFAULT_EXIT_STABLE_FRAMES,
        DEFAULT_HARD_STABLE_FRAMES, DEFAULT_MIN_HOLD_MS, DEFAULT_PERSIST_FRAMES,
        SUPPORTED_CONFIG_VERSION,
    },
    cue::CueDefinition,
    mirror::MirrorMap,
    stability::StabilityConfig,
    threshold::{ThresholdRule, ThresholdSet},
    Error, Result,
};
use log::info;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// Guidance configuration document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuidanceConfig {
    /// Declared configuration version
    pub version: String,

    /// Global timing and persistence defaults
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// Metric ids the measurement pipeline provides
    #[serde(default)]
    pub metrics: Vec<String>,

    /// Horizontal-flip behaviour of metrics; built-in map when omitted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mirror: Option<MirrorConfig>,

    /// Ordered cue definitions
    #[serde(default)]
    pub cues: Vec<CueConfig>,

    /// Cue ids that must all reach `exit` for a pose match
    #[serde(default)]
    pub required: Vec<String>,
}

/// Global defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DefaultsConfig {
    /// Consecutive identical inputs before the display cue switches
    pub persist_frames: u32,

    /// Minimum hold time of a displayed cue
    pub min_hold_ms: u64,

    /// Cooldown of a displaced cue
    pub cooldown_ms: u64,

    /// Frames a `hard` reading must repeat
    pub hard_stable_frames: u32,

    /// Frames an `exit` reading must repeat
    pub exit_stable_frames: u32,

    /// Exit persistence for cues that do not set their own
    pub cue_persist_frames: u32,
}

/// Mirror section
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MirrorConfig {
    /// Left/right metric pairs swapped under mirroring
    pub pairs: Vec<[String; 2]>,

    /// Metrics whose sign flips under mirroring
    pub negate: Vec<String>,
}

/// One cue entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CueConfig {
    /// Unique cue id
    pub id: String,

    /// Metric the cue reads
    pub metric: String,

    /// Display priority
    #[serde(default)]
    pub priority: i32,

    /// Mutex group; defaults to the cue id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mutex_group: Option<String>,

    /// Exit persistence override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub persist_frames: Option<u32>,

    /// Match decisions use the untransformed metric
    #[serde(default)]
    pub exit_uses_raw_value: bool,

    /// Threshold sets
    pub thresholds: ThresholdsConfig,
}

/// Threshold sets of one cue
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ThresholdsConfig {
    /// Applied to the error against a reference target
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub with_reference: Option<ThresholdSetConfig>,

    /// Applied to the raw metric
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub no_reference: Option<ThresholdSetConfig>,
}

/// Rule lists of one threshold set
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ThresholdSetConfig {
    /// Rules that start showing the cue
    pub enter: Vec<RuleConfig>,
    /// Rules that escalate to a warning
    pub warn: Vec<RuleConfig>,
    /// Most severe rules
    pub hard: Vec<RuleConfig>,
    /// Goal-reached rules
    pub exit: Vec<RuleConfig>,
}

/// A rule as written in the document: `{ op, value }` or `{ op: between, range }`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleConfig {
    /// Operator (`>`, `>=`, `<`, `<=`, `abs>`, `abs>=`, `abs<`, `abs<=`, `between`)
    pub op: String,

    /// Operand of single-operand operators
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,

    /// Operands of `between`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub range: Option<Vec<f64>>,
}

impl Default for GuidanceConfig {
    fn default() -> Self {
        Self {
            version: SUPPORTED_CONFIG_VERSION.to_string(),
            defaults: DefaultsConfig::default(),
            metrics: Vec::new(),
            mirror: None,
            cues: Vec::new(),
            required: Vec::new(),
        }
    }
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            persist_frames: DEFAULT_PERSIST_FRAMES,
            min_hold_ms: DEFAULT_MIN_HOLD_MS,
            cooldown_ms: DEFAULT_COOLDOWN_MS,
            hard_stable_frames: DEFAULT_HARD_STABLE_FRAMES,
            exit_stable_frames: DEFAULT_EXIT_STABLE_FRAMES,
            cue_persist_frames: DEFAULT_CUE_PERSIST_FRAMES,
        }
    }
}

impl RuleConfig {
    fn to_rule(&self, context: &str) -> Result<ThresholdRule> {
        let operands: Vec<f64> = if self.op.trim() == "between" {
            self.range.clone().unwrap_or_default()
        } else {
            self.value.into_iter().collect()
        };

        ThresholdRule::parse(&self.op, &operands).map_err(|e| match e {
            Error::MalformedRule(msg) => Error::MalformedRule(format!("{context}: {msg}")),
            other => other,
        })
    }
}

impl ThresholdSetConfig {
    fn to_set(&self, context: &str) -> Result<ThresholdSet> {
        let convert = |rules: &[RuleConfig], level: &str| -> Result<Vec<ThresholdRule>> {
            rules
                .iter()
                .enumerate()
                .map(|(i, rule)| rule.to_rule(&format!("{context}.{level}[{i}]")))
                .collect()
        };

        Ok(ThresholdSet {
            enter: convert(&self.enter, "enter")?,
            warn: convert(&self.warn, "warn")?,
            hard: convert(&self.hard, "hard")?,
            exit: convert(&self.exit, "exit")?,
        })
    }
}

/// Validated configuration, ready to build sessions from
#[derive(Debug, Clone)]
pub struct CueCatalog {
    /// Ordered cue definitions
    pub cues: Vec<CueDefinition>,
    /// Required cue ids in document order
    pub required: Vec<String>,
    /// Mirror behaviour of metrics
    pub mirror: MirrorMap,
    /// Display arbitration parameters
    pub anti_jitter: AntiJitterConfig,
    /// Stability requirements
    pub stability: StabilityConfig,
}

impl CueCatalog {
    /// Load and validate a YAML configuration file
    ///
    /// # Errors
    ///
    /// Returns any I/O, parse, or validation error of the document
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        GuidanceConfig::from_file(path)?.into_catalog()
    }

    /// Look up a cue by id
    #[must_use]
    pub fn cue(&self, id: &str) -> Option<&CueDefinition> {
        self.cues.iter().find(|c| c.id == id)
    }

    /// Required cues, in the order they are listed under `required`
    #[must_use]
    pub fn required_cues(&self) -> Vec<CueDefinition> {
        self.required
            .iter()
            .filter_map(|id| self.cue(id).cloned())
            .collect()
    }
}

impl GuidanceConfig {
    /// Load configuration from a YAML file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!("Loading guidance configuration from {}", path.display());
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    /// Parse configuration from YAML text
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not a valid document
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(content)?)
    }

    /// Serialise to YAML text
    ///
    /// # Errors
    ///
    /// Returns an error if serialisation fails
    pub fn to_yaml_string(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Save configuration to a YAML file
    ///
    /// # Errors
    ///
    /// Returns an error if serialisation or writing fails
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        std::fs::write(path, self.to_yaml_string()?)?;
        Ok(())
    }

    /// Validate configuration
    ///
    /// # Errors
    ///
    /// Returns the first problem found, see [`GuidanceConfig::into_catalog`]
    pub fn validate(&self) -> Result<()> {
        self.into_catalog().map(|_| ())
    }

    /// Validate and convert into a [`CueCatalog`]
    ///
    /// # Errors
    ///
    /// * [`Error::VersionMismatch`] when `version` differs from the supported one
    /// * [`Error::UnknownMetric`] when a cue reads an undeclared metric
    /// * [`Error::MalformedRule`] for bad operators or operands
    /// * [`Error::ConfigError`] for every other structural problem
    pub fn into_catalog(&self) -> Result<CueCatalog> {
        if self.version.trim() != SUPPORTED_CONFIG_VERSION {
            return Err(Error::VersionMismatch {
                expected: SUPPORTED_CONFIG_VERSION.to_string(),
                found: self.version.clone(),
            });
        }

        self.validate_defaults()?;

        let metrics: HashSet<&str> = self.metrics.iter().map(String::as_str).collect();
        let mirror = self.build_mirror(&metrics)?;

        let mut seen = HashSet::new();
        let mut cues = Vec::with_capacity(self.cues.len());
        for cue in &self.cues {
            if !seen.insert(cue.id.as_str()) {
                return Err(Error::ConfigError(format!("Duplicate cue id '{}'", cue.id)));
            }
            cues.push(self.build_cue(cue, &metrics)?);
        }

        let mut required_seen = HashSet::new();
        for id in &self.required {
            if !seen.contains(id.as_str()) {
                return Err(Error::ConfigError(format!("Required cue '{id}' is not defined")));
            }
            if !required_seen.insert(id.as_str()) {
                return Err(Error::ConfigError(format!("Required cue '{id}' is listed twice")));
            }
        }

        // Match decisions compare against a target unless the cue reads its raw metric.
        if let Some(cue) = cues.iter().find(|c| {
            required_seen.contains(c.id.as_str())
                && !c.exit_uses_raw_value
                && c.with_reference.as_ref().map_or(true, ThresholdSet::is_empty)
        }) {
            return Err(Error::ConfigError(format!(
                "Required cue '{}' needs with_reference thresholds or exit_uses_raw_value",
                cue.id
            )));
        }

        info!(
            "Loaded {} cues ({} required) for config version {}",
            cues.len(),
            self.required.len(),
            self.version
        );

        Ok(CueCatalog {
            cues,
            required: self.required.clone(),
            mirror,
            anti_jitter: AntiJitterConfig {
                persist_frames: self.defaults.persist_frames,
                min_hold_ms: self.defaults.min_hold_ms,
                cooldown_ms: self.defaults.cooldown_ms,
            },
            stability: StabilityConfig {
                hard_frames: self.defaults.hard_stable_frames,
                exit_frames: self.defaults.exit_stable_frames,
            },
        })
    }

    fn validate_defaults(&self) -> Result<()> {
        let d = &self.defaults;
        if d.persist_frames == 0 {
            return Err(Error::ConfigError("persist_frames must be greater than 0".to_string()));
        }
        if d.hard_stable_frames == 0 || d.exit_stable_frames == 0 {
            return Err(Error::ConfigError(
                "Stable frame counts must be greater than 0".to_string(),
            ));
        }
        if d.cue_persist_frames == 0 {
            return Err(Error::ConfigError(
                "cue_persist_frames must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    fn build_mirror(&self, metrics: &HashSet<&str>) -> Result<MirrorMap> {
        let Some(mirror) = &self.mirror else {
            return Ok(MirrorMap::default());
        };

        let undeclared = mirror
            .pairs
            .iter()
            .flatten()
            .chain(mirror.negate.iter())
            .find(|m| !metrics.contains(m.as_str()));
        if let Some(metric) = undeclared {
            return Err(Error::ConfigError(format!(
                "Mirror section references undefined metric '{metric}'"
            )));
        }
        if let Some([left, _]) = mirror.pairs.iter().find(|[l, r]| l == r) {
            return Err(Error::ConfigError(format!("Metric '{left}' is paired with itself")));
        }

        Ok(MirrorMap::new(
            mirror.pairs.iter().map(|[l, r]| (l.as_str(), r.as_str())),
            mirror.negate.iter().map(String::as_str),
        ))
    }

    fn build_cue(&self, cue: &CueConfig, metrics: &HashSet<&str>) -> Result<CueDefinition> {
        if cue.id.trim().is_empty() {
            return Err(Error::ConfigError("Cue id must not be empty".to_string()));
        }
        if !metrics.contains(cue.metric.as_str()) {
            return Err(Error::UnknownMetric {
                cue: cue.id.clone(),
                metric: cue.metric.clone(),
            });
        }

        let with_reference = cue
            .thresholds
            .with_reference
            .as_ref()
            .map(|set| set.to_set(&format!("{}.with_reference", cue.id)))
            .transpose()?;
        let no_reference = cue
            .thresholds
            .no_reference
            .as_ref()
            .map(|set| set.to_set(&format!("{}.no_reference", cue.id)))
            .transpose()?;

        let has_rules = with_reference.iter().chain(no_reference.iter()).any(|s| !s.is_empty());
        if !has_rules {
            return Err(Error::ConfigError(format!(
                "Cue '{}' defines no threshold rules",
                cue.id
            )));
        }

        let persist_frames = cue.persist_frames.unwrap_or(self.defaults.cue_persist_frames);
        if persist_frames == 0 {
            return Err(Error::ConfigError(format!(
                "Cue '{}' persist_frames must be greater than 0",
                cue.id
            )));
        }

        Ok(CueDefinition {
            id: cue.id.clone(),
            metric: cue.metric.clone(),
            with_reference,
            no_reference,
            priority: cue.priority,
            mutex_group: cue.mutex_group.clone().unwrap_or_else(|| cue.id.clone()),
            persist_frames,
            exit_uses_raw_value: cue.exit_uses_raw_value,
        })
    }
}

/// Example configuration file content
pub const EXAMPLE_CONFIG: &str = r#"# Pose guidance configuration
version: "1"

defaults:
  persist_frames: 3
  min_hold_ms: 1500
  cooldown_ms: 2500
  hard_stable_frames: 2
  exit_stable_frames: 2
  cue_persist_frames: 3

# Metrics supplied by the measurement pipeline
metrics:
  - center_x_offset
  - center_y_offset
  - face_height_ratio
  - head_roll_deg
  - face_luma
  - face_luma_lr_diff
  - left_shoulder_height
  - right_shoulder_height

# Horizontal-flip behaviour
mirror:
  pairs:
    - [left_shoulder_height, right_shoulder_height]
  negate:
    - center_x_offset
    - head_roll_deg
    - face_luma_lr_diff

cues:
  - id: move_left
    metric: center_x_offset
    priority: 3
    mutex_group: horizontal
    thresholds:
      with_reference:
        enter: [{ op: ">", value: 0.05 }]
        warn: [{ op: ">=", value: 0.12 }]
        hard: [{ op: ">=", value: 0.25 }]
        exit: [{ op: "abs<=", value: 0.03 }]
      no_reference:
        enter: [{ op: ">", value: 0.15 }]
        warn: [{ op: ">=", value: 0.25 }]
        hard: [{ op: ">=", value: 0.4 }]
        exit: [{ op: "abs<=", value: 0.1 }]

  - id: move_right
    metric: center_x_offset
    priority: 3
    mutex_group: horizontal
    thresholds:
      with_reference:
        enter: [{ op: "<", value: -0.05 }]
        warn: [{ op: "<=", value: -0.12 }]
        hard: [{ op: "<=", value: -0.25 }]
        exit: [{ op: "abs<=", value: 0.03 }]
      no_reference:
        enter: [{ op: "<", value: -0.15 }]
        warn: [{ op: "<=", value: -0.25 }]
        hard: [{ op: "<=", value: -0.4 }]
        exit: [{ op: "abs<=", value: 0.1 }]

  - id: move_up
    metric: center_y_offset
    priority: 2
    mutex_group: vertical
    thresholds:
      with_reference:
        enter: [{ op: ">", value: 0.06 }]
        hard: [{ op: ">=", value: 0.2 }]
        exit: [{ op: "abs<=", value: 0.04 }]

  - id: step_back
    metric: face_height_ratio
    priority: 4
    mutex_group: distance
    thresholds:
      with_reference:
        enter: [{ op: ">", value: 0.04 }]
        warn: [{ op: ">=", value: 0.08 }]
        hard: [{ op: ">=", value: 0.15 }]
        exit: [{ op: "abs<=", value: 0.02 }]

  - id: step_closer
    metric: face_height_ratio
    priority: 4
    mutex_group: distance
    thresholds:
      with_reference:
        enter: [{ op: "<", value: -0.04 }]
        warn: [{ op: "<=", value: -0.08 }]
        hard: [{ op: "<=", value: -0.15 }]
        exit: [{ op: "abs<=", value: 0.02 }]

  - id: level_head
    metric: head_roll_deg
    priority: 2
    mutex_group: roll
    persist_frames: 2
    thresholds:
      with_reference:
        enter: [{ op: "abs>", value: 4.0 }]
        warn: [{ op: "abs>=", value: 8.0 }]
        hard: [{ op: "abs>=", value: 15.0 }]
        exit: [{ op: "abs<=", value: 3.0 }]

  - id: more_light
    metric: face_luma
    priority: 1
    mutex_group: lighting
    exit_uses_raw_value: true
    thresholds:
      no_reference:
        enter: [{ op: "<", value: 90.0 }]
        warn: [{ op: "<", value: 70.0 }]
        hard: [{ op: "<", value: 45.0 }]
        exit: [{ op: "between", range: [100.0, 220.0] }]

required:
  - move_left
  - move_right
  - step_back
  - step_closer
  - level_head
  - more_light
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::threshold::Level;

    #[test]
    fn test_example_config_loads() {
        let config = GuidanceConfig::from_yaml_str(EXAMPLE_CONFIG).unwrap();
        let catalog = config.into_catalog().unwrap();

        assert_eq!(catalog.cues.len(), 7);
        assert_eq!(catalog.required.len(), 6);
        assert_eq!(catalog.anti_jitter.min_hold_ms, 1500);
        assert_eq!(catalog.stability.exit_frames, 2);

        let level_head = catalog.cue("level_head").unwrap();
        assert_eq!(level_head.persist_frames, 2);
        let step_back = catalog.cue("step_back").unwrap();
        assert_eq!(step_back.persist_frames, 3);
        assert!(catalog.mirror.is_negated("head_roll_deg"));
        assert_eq!(catalog.mirror.partner("right_shoulder_height"), Some("left_shoulder_height"));
    }

    #[test]
    fn test_rules_convert_in_order() {
        let catalog = GuidanceConfig::from_yaml_str(EXAMPLE_CONFIG)
            .unwrap()
            .into_catalog()
            .unwrap();
        let more_light = catalog.cue("more_light").unwrap();
        let set = more_light.no_reference.as_ref().unwrap();
        assert_eq!(set.exit, vec![ThresholdRule::Between(100.0, 220.0)]);
        assert_eq!(set.classify(40.0).level, Level::Hard);
        assert_eq!(set.classify(150.0).level, Level::Exit);
    }

    #[test]
    fn test_defaults_fill_missing_sections() {
        let yaml = r#"
version: "1"
metrics: [distance]
cues:
  - id: closer
    metric: distance
    thresholds:
      no_reference:
        exit: [{ op: "<", value: 1.0 }]
"#;
        let catalog = GuidanceConfig::from_yaml_str(yaml).unwrap().into_catalog().unwrap();
        let cue = catalog.cue("closer").unwrap();
        assert_eq!(cue.mutex_group, "closer");
        assert_eq!(cue.persist_frames, DEFAULT_CUE_PERSIST_FRAMES);
        assert_eq!(catalog.anti_jitter, AntiJitterConfig::default());
        assert_eq!(catalog.mirror, MirrorMap::default());
    }

    #[test]
    fn test_yaml_round_trip_preserves_catalog() {
        let config = GuidanceConfig::from_yaml_str(EXAMPLE_CONFIG).unwrap();
        let text = config.to_yaml_string().unwrap();
        let reparsed = GuidanceConfig::from_yaml_str(&text).unwrap();
        assert_eq!(
            reparsed.into_catalog().unwrap().cues,
            config.into_catalog().unwrap().cues
        );
    }
}
