//! Rule tables that read legal and planning cues from listing text.
//!
//! Each table is an ordered list of rules. The first rule that fires
//! decides the cue; if none fires the table's fallback applies. Patterns
//! come in pairs, with and without Vietnamese diacritics, because listing
//! authors use both. Text is brought to NFC before matching so decomposed
//! input hits the same patterns.

use once_cell::sync::Lazy;
use regex::RegexSet;
use serde::Serialize;
use unicode_normalization::UnicodeNormalization;

/// A discrete cue read from text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Cue {
    /// Text states the risk is absent
    Clear,
    /// Text says nothing conclusive
    Unknown,
    /// Text states a red flag
    Flagged,
}

impl Cue {
    pub fn score(&self) -> f64 {
        match self {
            Self::Clear => 0.0,
            Self::Unknown => 0.5,
            Self::Flagged => 1.0,
        }
    }
}

/// Condition under which a rule fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// Any pattern in the set matches
    AnyMatch,
    /// No pattern in the set matches
    NoMatch,
}

/// One ranked entry of a rule table.
#[derive(Debug)]
pub struct Rule {
    pub name: &'static str,
    pub trigger: Trigger,
    pub cue: Cue,
    patterns: RegexSet,
}

impl Rule {
    fn new(name: &'static str, trigger: Trigger, cue: Cue, patterns: &[&str]) -> Self {
        Self {
            name,
            trigger,
            cue,
            patterns: RegexSet::new(patterns).expect("rule patterns are valid regexes"),
        }
    }

    /// Whether this rule fires on already-lowercased text.
    pub fn fires(&self, lowered: &str) -> bool {
        let matched = self.patterns.is_match(lowered);
        match self.trigger {
            Trigger::AnyMatch => matched,
            Trigger::NoMatch => !matched,
        }
    }
}

/// Outcome of classifying a text, with the rule that decided it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Verdict {
    /// Name of the table that produced this verdict
    pub table: &'static str,
    pub cue: Cue,
    /// `None` when the fallback applied
    pub rule: Option<&'static str>,
}

impl Verdict {
    pub fn score(&self) -> f64 {
        self.cue.score()
    }
}

/// Ordered rules evaluated with early exit.
#[derive(Debug)]
pub struct RuleTable {
    pub name: &'static str,
    rules: Vec<Rule>,
    fallback: Cue,
}

impl RuleTable {
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn classify(&self, text: &str) -> Verdict {
        let lowered = text.nfc().collect::<String>().to_lowercase();
        self.rules
            .iter()
            .find(|rule| rule.fires(&lowered))
            .map(|rule| Verdict {
                table: self.name,
                cue: rule.cue,
                rule: Some(rule.name),
            })
            .unwrap_or(Verdict {
                table: self.name,
                cue: self.fallback,
                rule: None,
            })
    }
}

/// Title-status rules: informal paperwork beats any clear-title mention.
pub static LEGAL_RULES: Lazy<RuleTable> = Lazy::new(|| RuleTable {
    name: "legal",
    rules: vec![
        Rule::new(
            "informal_title",
            Trigger::AnyMatch,
            Cue::Flagged,
            &[
                r"vi\s*bằng",
                r"giấy\s*tay",
                r"giay\s*tay",
                r"sổ\s*chung",
                r"so\s*chung",
                r"chung\s*sổ",
                r"chưa\s*có\s*sổ",
                r"chua\s*co\s*so",
                r"chờ\s*sổ",
                r"cho\s*so",
                r"hđmb",
                r"hợp\s*đồng\s*mua\s*bán",
                r"hop\s*dong\s*mua\s*ban",
                r"ủy\s*quyền",
                r"uỷ\s*quyền",
                r"uy\s*quyen",
                r"góp\s*vốn",
                r"gop\s*von",
                r"giấy\s*viết\s*tay",
                r"giay\s*viet\s*tay",
            ],
        ),
        Rule::new(
            "clear_title",
            Trigger::AnyMatch,
            Cue::Clear,
            &[
                r"sổ\s*hồng",
                r"sổ\s*đỏ",
                r"so\s*hong",
                r"so\s*do",
                r"sổ\s*riêng",
                r"so\s*rieng",
                r"chính\s*chủ",
                r"chinh\s*chu",
                r"pháp\s*lý\s*chuẩn",
                r"phap\s*ly\s*chuan",
                r"hoàn\s*công",
                r"hoan\s*cong",
                r"công\s*chứng",
                r"cong\s*chung",
                r"sang\s*tên",
                r"sang\s*ten",
                r"đăng\s*bộ",
                r"dang\s*bo",
            ],
        ),
    ],
    fallback: Cue::Unknown,
});

/// Planning/dispute rules. A safe statement only counts when a planning
/// keyword is present, so the keyword gate runs first.
pub static PLANNING_RULES: Lazy<RuleTable> = Lazy::new(|| RuleTable {
    name: "planning",
    rules: vec![
        Rule::new(
            "no_planning_keyword",
            Trigger::NoMatch,
            Cue::Unknown,
            &[
                r"quy\s*hoạch",
                r"quy\s*hoach",
                r"lộ\s*giới",
                r"lo\s*gioi",
                r"tranh\s*chấp",
                r"tranh\s*chap",
                r"giải\s*tỏa",
                r"giai\s*toa",
                r"treo",
            ],
        ),
        Rule::new(
            "stated_safe",
            Trigger::AnyMatch,
            Cue::Clear,
            &[
                r"không\s*dính\s*quy\s*hoạch",
                r"khong\s*dinh\s*quy\s*hoach",
                r"không\s*nằm\s*trong\s*quy\s*hoạch",
                r"khong\s*nam\s*trong\s*quy\s*hoach",
                r"không\s*quy\s*hoạch",
                r"khong\s*quy\s*hoach",
                r"không\s*lộ\s*giới",
                r"khong\s*lo\s*gioi",
                r"không\s*tranh\s*chấp",
                r"khong\s*tranh\s*chap",
                r"không\s*bị\s*lộ\s*giới",
                r"khong\s*bi\s*lo\s*gioi",
                r"không\s*bị\s*quy\s*hoạch",
                r"khong\s*bi\s*quy\s*hoach",
                r"có\s*giấy\s*xác\s*nhận\s*quy\s*hoạch",
                r"co\s*giay\s*xac\s*nhan\s*quy\s*hoach",
                r"quy\s*hoạch\s*ổn\s*định",
                r"quy\s*hoach\s*on\s*dinh",
            ],
        ),
        Rule::new(
            "red_flag",
            Trigger::AnyMatch,
            Cue::Flagged,
            &[
                r"dính\s*quy\s*hoạch",
                r"dinh\s*quy\s*hoach",
                r"nằm\s*trong\s*quy\s*hoạch",
                r"nam\s*trong\s*quy\s*hoach",
                r"bị\s*quy\s*hoạch",
                r"bi\s*quy\s*hoach",
                r"quy\s*hoạch\s*treo",
                r"quy\s*hoach\s*treo",
                r"đang\s*tranh\s*chấp",
                r"dang\s*tranh\s*chap",
                r"tranh\s*chấp",
                r"tranh\s*chap",
                r"lộ\s*giới",
                r"lo\s*gioi",
                r"giải\s*tỏa",
                r"giai\s*toa",
            ],
        ),
    ],
    fallback: Cue::Unknown,
});

/// Classify the legal status cue of a listing text.
pub fn classify_legal(text: &str) -> Verdict {
    LEGAL_RULES.classify(text)
}

/// Classify the planning/dispute cue of a listing text.
pub fn classify_planning(text: &str) -> Verdict {
    PLANNING_RULES.classify(text)
}

/// Legal risk in {0, 0.5, 1}.
pub fn legal_risk_score(text: &str) -> f64 {
    classify_legal(text).score()
}

/// Planning/dispute risk in {0, 0.5, 1}.
///
/// - 0.0: explicitly stated safe ("không quy hoạch", "không tranh chấp")
/// - 1.0: explicit red flag ("dính quy hoạch", "đang tranh chấp")
/// - 0.5: no planning keyword, or a keyword with no clear polarity
pub fn planning_risk_score(text: &str) -> f64 {
    classify_planning(text).score()
}
