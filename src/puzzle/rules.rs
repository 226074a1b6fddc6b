use super::types::Field;
use super::Answers;

/// Measured values are typed by hand; anything closer than this is equal.
pub const DEFAULT_TOLERANCE: f64 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Rule {
    Exact,
    Numeric { tolerance: f64 },
}

impl Rule {
    pub fn matches(&self, given: &str, expected: &str) -> bool {
        match self {
            Rule::Exact => given.trim() == expected.trim(),
            Rule::Numeric { tolerance } => match (parse_decimal(given), parse_decimal(expected)) {
                (Some(given), Some(expected)) => (given - expected).abs() <= *tolerance,
                _ => false,
            },
        }
    }
}

#[derive(Debug, PartialEq)]
pub enum ValidationResult {
    Success,
    /// Error labels of every wrong field, in form order.
    Mismatch(Vec<String>),
}

pub fn validate_answers(fields: &[Field], answers: &Answers) -> ValidationResult {
    let wrong: Vec<String> = fields
        .iter()
        .filter(|field| {
            let given = answers.get(&field.name).map(String::as_str).unwrap_or("");
            !field.rule().matches(given, &field.expected)
        })
        .map(|field| field.error_label.clone())
        .collect();

    if wrong.is_empty() {
        ValidationResult::Success
    } else {
        ValidationResult::Mismatch(wrong)
    }
}

/// Leading decimal number of `raw`, accepting a comma as the decimal
/// separator and ignoring a trailing unit (`"3,75 kg"` is 3.75).
pub fn parse_decimal(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    let end = trimmed
        .char_indices()
        .find(|&(i, c)| {
            let sign = i == 0 && (c == '-' || c == '+');
            !(sign || c.is_ascii_digit() || c == '.' || c == ',')
        })
        .map(|(i, _)| i)
        .unwrap_or(trimmed.len());

    let number = trimmed[..end].replace(',', ".");
    number.parse::<f64>().ok()
}
