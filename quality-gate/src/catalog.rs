//! Text rule catalog
//!
//! The suspicious-token, placeholder, garbled-label, copy-direction and
//! overclaim patterns live here as data. The gate only iterates the catalog,
//! so a different rule set can be swapped in with
//! [`crate::ValidationGate::with_catalog`] without touching control flow.

use crate::codes;
use common::SkewDirection;
use lazy_static::lazy_static;
use regex::Regex;

/// How a text rule finds a match
#[derive(Debug, Clone)]
pub enum Matcher {
    Regex(Regex),
    /// Same character repeated at least `min_len` times in a row; digits and
    /// whitespace never count
    RepeatedRun { min_len: usize },
}

impl Matcher {
    /// First matching fragment, if any
    pub fn find(&self, text: &str) -> Option<String> {
        match self {
            Matcher::Regex(re) => re.find(text).map(|m| m.as_str().trim().to_string()),
            Matcher::RepeatedRun { min_len } => find_repeated_run(text, *min_len),
        }
    }
}

fn counts_toward_run(c: char) -> bool {
    !c.is_ascii_digit() && !c.is_whitespace()
}

fn find_repeated_run(text: &str, min_len: usize) -> Option<String> {
    let mut previous: Option<char> = None;
    let mut run = 0usize;

    for c in text.chars() {
        if Some(c) == previous && counts_toward_run(c) {
            run += 1;
        } else {
            run = 1;
        }
        previous = Some(c);

        if run >= min_len && counts_toward_run(c) {
            return Some(std::iter::repeat(c).take(run).collect());
        }
    }
    None
}

/// One catalog entry producing a finding with `code` on match
#[derive(Debug, Clone)]
pub struct TextRule {
    pub code: String,
    pub label: String,
    pub matcher: Matcher,
}

impl TextRule {
    pub fn regex(code: &str, label: &str, pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            code: code.to_string(),
            label: label.to_string(),
            matcher: Matcher::Regex(Regex::new(pattern)?),
        })
    }

    pub fn repeated_run(code: &str, label: &str, min_len: usize) -> Self {
        Self {
            code: code.to_string(),
            label: label.to_string(),
            matcher: Matcher::RepeatedRun { min_len },
        }
    }
}

/// Phrase that contradicts a given skew direction
#[derive(Debug, Clone)]
pub struct CopyRule {
    pub forbidden_for: SkewDirection,
    pub phrase: String,
    pub pattern: Regex,
}

/// The full set of text patterns the gate evaluates
#[derive(Debug, Clone)]
pub struct RuleCatalog {
    /// Leakage tokens and unfilled template placeholders
    pub suspicious: Vec<TextRule>,
    /// Known label corruption shapes
    pub garbled: Vec<TextRule>,
    /// Dark-pool claims about trade side
    pub overclaim: Vec<TextRule>,
    pub copy_rules: Vec<CopyRule>,
    /// Must capture `long` or `short` in group 1
    pub gamma_claim: Regex,
}

const SUSPICIOUS_PATTERNS: &[(&str, &str, &str)] = &[
    (codes::SUSPICIOUS_TEXT, "NaN", r"\bNaN\b"),
    (codes::SUSPICIOUS_TEXT, "undefined", r"\bundefined\b"),
    (codes::SUSPICIOUS_TEXT, "null", r"\bnull\b"),
    (codes::SUSPICIOUS_TEXT, "Infinity", r"\bInfinity\b"),
    (codes::SUSPICIOUS_TEXT, "[object Object]", r"\[object Object\]"),
    (codes::PLACEHOLDER_TEXT, "UNUSUAL", r"\bUNUSUAL\b"),
    (codes::PLACEHOLDER_TEXT, "UW", r"\bUW\b"),
    (codes::PLACEHOLDER_TEXT, "SWEEP", r"\bSWEEP\b"),
    (codes::PLACEHOLDER_TEXT, "N/A", r"(?:^|[^A-Za-z0-9/])N/A(?:[^A-Za-z0-9/]|$)"),
];

// Capitalised word with two inner capital Ts, e.g. `PostTypeTitle`. SVG
// attribute names start lowercase and never match.
const GARBLED_PATTERNS: &[(&str, &str, &str)] = &[(
    codes::GARBLED_LABEL,
    "mangled camel-case label",
    r"\b[A-Z][a-z]+T[a-z]*T[A-Za-z]*\b",
)];

const OVERCLAIM_PATTERNS: &[(&str, &str, &str)] = &[
    (
        codes::DIRECTION_OVERCLAIM,
        "trade side asserted",
        r"(?i)\b(bought|sold|buyers?|sellers?|buying|selling|dumped|dumping|loaded up)\b",
    ),
    (
        codes::DIRECTION_OVERCLAIM,
        "directional bet asserted",
        r"(?i)\b(bullish|bearish) (bet|wager|position)\b",
    ),
];

const COPY_PATTERNS: &[(SkewDirection, &str, &str)] = &[
    (SkewDirection::Call, "paying up for protection", r"(?i)paying\s+up\s+for\s+protection"),
    (SkewDirection::Call, "downside protection", r"(?i)downside\s+protection"),
    (SkewDirection::Put, "upside speculation", r"(?i)upside\s+speculation"),
];

const GAMMA_CLAIM_PATTERN: &str = r"(?i)\b(long|short)[\s-]+gamma\b";

const REPEATED_RUN_MIN: usize = 5;

lazy_static! {
    static ref STANDARD_CATALOG: RuleCatalog =
        RuleCatalog::build_standard().expect("built-in rule patterns compile");
}

impl RuleCatalog {
    fn build_standard() -> Result<Self, regex::Error> {
        let mut suspicious = compile(SUSPICIOUS_PATTERNS)?;
        suspicious.push(TextRule::repeated_run(
            codes::SUSPICIOUS_TEXT,
            "repeated characters",
            REPEATED_RUN_MIN,
        ));

        let copy_rules = COPY_PATTERNS
            .iter()
            .map(|(direction, phrase, pattern)| -> Result<CopyRule, regex::Error> {
                Ok(CopyRule {
                    forbidden_for: *direction,
                    phrase: phrase.to_string(),
                    pattern: Regex::new(pattern)?,
                })
            })
            .collect::<Result<Vec<_>, regex::Error>>()?;

        Ok(Self {
            suspicious,
            garbled: compile(GARBLED_PATTERNS)?,
            overclaim: compile(OVERCLAIM_PATTERNS)?,
            copy_rules,
            gamma_claim: Regex::new(GAMMA_CLAIM_PATTERN)?,
        })
    }

    /// Copy rules that apply to a skew direction
    pub fn copy_rules_for(&self, direction: SkewDirection) -> impl Iterator<Item = &CopyRule> {
        self.copy_rules.iter().filter(move |r| r.forbidden_for == direction)
    }
}

impl Default for RuleCatalog {
    fn default() -> Self {
        STANDARD_CATALOG.clone()
    }
}

fn compile(defs: &[(&str, &str, &str)]) -> Result<Vec<TextRule>, regex::Error> {
    defs.iter()
        .map(|(code, label, pattern)| TextRule::regex(code, label, pattern))
        .collect()
}
