use crate::error::ConfigError;
use crate::models::config::FieldRule;
use crate::models::detection::ExtractedField;
use regex::Regex;
use std::sync::OnceLock;

enum CompiledRule {
    Capture {
        regex: Regex,
        group: usize,
        digits_only: bool,
    },
    LongestDigits {
        min_len: usize,
    },
}

impl CompiledRule {
    fn compile(index: usize, rule: &FieldRule) -> Result<Self, ConfigError> {
        match rule {
            FieldRule::Capture {
                pattern,
                group,
                digits_only,
            } => {
                let regex = Regex::new(pattern).map_err(|e| ConfigError::InvalidRule {
                    index,
                    reason: e.to_string(),
                })?;
                if *group >= regex.captures_len() {
                    return Err(ConfigError::InvalidRule {
                        index,
                        reason: format!(
                            "group {} out of range, pattern has {} groups",
                            group,
                            regex.captures_len() - 1
                        ),
                    });
                }
                Ok(Self::Capture {
                    regex,
                    group: *group,
                    digits_only: *digits_only,
                })
            }
            FieldRule::LongestDigits { min_len } => Ok(Self::LongestDigits {
                min_len: (*min_len).max(1),
            }),
        }
    }

    fn apply(&self, text: &str) -> Option<String> {
        let value = match self {
            Self::Capture {
                regex,
                group,
                digits_only,
            } => {
                let captured = regex.captures(text)?.get(*group)?.as_str();
                if *digits_only {
                    captured.chars().filter(|c| c.is_ascii_digit()).collect()
                } else {
                    captured.trim().to_string()
                }
            }
            Self::LongestDigits { min_len } => longest_digit_run(text, *min_len)?.to_string(),
        };

        if value.is_empty() {
            None
        } else {
            Some(value)
        }
    }
}

/// Applies ordered extraction rules to raw OCR text
pub struct FieldParser {
    rules: Vec<CompiledRule>,
}

impl FieldParser {
    pub fn new(rules: &[FieldRule]) -> Result<Self, ConfigError> {
        let rules = rules
            .iter()
            .enumerate()
            .map(|(i, rule)| CompiledRule::compile(i, rule))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { rules })
    }

    /// Parser with the default combat power rules
    pub fn combat_power() -> Result<Self, ConfigError> {
        Self::new(&FieldRule::combat_power_defaults())
    }

    /// First rule that yields a non-empty value wins; `value` is `None` when
    /// nothing matched.
    pub fn parse(&self, region_name: &str, raw_text: &str) -> ExtractedField {
        let normalized = normalize_whitespace(raw_text);
        let value = self.rules.iter().find_map(|rule| rule.apply(&normalized));

        ExtractedField {
            region_name: region_name.to_string(),
            raw_text: raw_text.to_string(),
            value,
        }
    }
}

/// Collapse whitespace runs (including newlines) into single spaces
pub fn normalize_whitespace(text: &str) -> String {
    static WHITESPACE: OnceLock<Regex> = OnceLock::new();
    let re = WHITESPACE.get_or_init(|| Regex::new(r"\s+").expect("static regex"));
    re.replace_all(text.trim(), " ").into_owned()
}

/// Longest run of ASCII digits of at least `min_len`; ties go to the first run
pub fn longest_digit_run(text: &str, min_len: usize) -> Option<&str> {
    let mut best: Option<&str> = None;

    for run in text.split(|c: char| !c.is_ascii_digit()) {
        if run.len() < min_len {
            continue;
        }
        if best.map_or(true, |b| run.len() > b.len()) {
            best = Some(run);
        }
    }

    best
}
