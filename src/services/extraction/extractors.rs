use std::collections::HashSet;

use chrono::{NaiveDate, NaiveTime, Weekday};
use once_cell::sync::Lazy;
use regex::{Match, Regex};

use super::{email, ExtractionContext, FieldExtractor, FieldValue, Normalized};
use crate::config::SalonConfig;
use crate::models::{BusinessHours, DateToken, Field};

/// Builds the default extractor chain for a salon, in registration order.
pub fn default_extractors(salon: &SalonConfig) -> anyhow::Result<Vec<Box<dyn FieldExtractor>>> {
    Ok(vec![
        Box::new(ServiceExtractor::new(salon)?),
        Box::new(StylistExtractor::new(salon)?),
        Box::new(DateExtractor),
        Box::new(TimeExtractor::new(salon.hours.clone())),
        Box::new(EmailExtractor),
        Box::new(NameExtractor::new(salon)),
    ])
}

// --- Negation ---

const FILLERS: &[&str] = &["a", "an", "the", "with", "for", "from", "at", "on", "by"];
const NEGATORS: &[&str] = &["not", "no", "except", "without", "never"];
const NEGATING_PAIRS: &[&str] = &[
    "instead of",
    "rather than",
    "other than",
    "don't want",
    "dont want",
    "not want",
    "don't need",
    "not need",
];

/// Whether the mention starting at `start` is being ruled out ("Maya, not
/// Riya", "Maya instead of Riya"). Only the current clause is inspected.
fn is_negated(lower: &str, start: usize) -> bool {
    let before = &lower[..start];
    let clause = match before.rfind(|c| matches!(c, ',' | '.' | ';' | '!' | '?')) {
        Some(i) => &before[i + 1..],
        None => before,
    };
    let mut words: Vec<&str> = clause.split_whitespace().collect();
    while words.last().is_some_and(|w| FILLERS.contains(w)) {
        words.pop();
    }
    let Some(last) = words.last() else {
        return false;
    };
    if NEGATORS.contains(last) {
        return true;
    }
    if words.len() >= 2 {
        let pair = format!("{} {}", words[words.len() - 2], last);
        return NEGATING_PAIRS.contains(&pair.as_str());
    }
    false
}

/// A regex match reduced to what candidate selection needs.
#[derive(Debug, Clone, Copy)]
struct Span {
    start: usize,
    end: usize,
}

impl Span {
    fn contains(&self, other: &Span) -> bool {
        self.start <= other.start && other.end <= self.end && (self.end - self.start) > (other.end - other.start)
    }
}

fn whole(c: &regex::Captures<'_>) -> Span {
    c.get(0)
        .map(|m| Span { start: m.start(), end: m.end() })
        .unwrap_or(Span { start: 0, end: 0 })
}

/// The most recent mention wins: greatest end offset, longest on ties.
fn latest<T>(candidates: Vec<(Span, T)>) -> Option<T> {
    candidates
        .into_iter()
        .max_by(|(a, _), (b, _)| a.end.cmp(&b.end).then(b.start.cmp(&a.start)))
        .map(|(_, value)| value)
}

// --- Catalog matching (services, stylists) ---

struct CatalogEntry {
    canonical: String,
    pattern: Regex,
}

/// Matches any phrase of a configured vocabulary as whole words.
pub struct CatalogMatcher {
    entries: Vec<CatalogEntry>,
}

impl CatalogMatcher {
    pub fn new(vocabulary: &[(String, Vec<String>)]) -> anyhow::Result<Self> {
        let mut entries = Vec::with_capacity(vocabulary.len());
        for (canonical, phrases) in vocabulary {
            if phrases.is_empty() {
                continue;
            }
            let mut phrases: Vec<&String> = phrases.iter().collect();
            // Longest first so "spa treatment" wins over "spa" at the same offset.
            phrases.sort_by_key(|p| std::cmp::Reverse(p.len()));
            let alternation = phrases
                .iter()
                .map(|p| {
                    p.split_whitespace()
                        .map(regex::escape)
                        .collect::<Vec<_>>()
                        .join(r"\s+")
                })
                .collect::<Vec<_>>()
                .join("|");
            let pattern = Regex::new(&format!(r"\b(?:{alternation})\b"))?;
            entries.push(CatalogEntry {
                canonical: canonical.clone(),
                pattern,
            });
        }
        Ok(Self { entries })
    }

    /// The canonical name of the latest non-negated mention in `lower`.
    pub fn find(&self, lower: &str) -> Option<String> {
        let mut candidates = Vec::new();
        for entry in &self.entries {
            for m in entry.pattern.find_iter(lower) {
                if !is_negated(lower, m.start()) {
                    let span = Span { start: m.start(), end: m.end() };
                    candidates.push((span, entry.canonical.as_str()));
                }
            }
        }
        latest(candidates).map(str::to_string)
    }
}

pub struct ServiceExtractor {
    catalog: CatalogMatcher,
}

impl ServiceExtractor {
    pub fn new(salon: &SalonConfig) -> anyhow::Result<Self> {
        Ok(Self {
            catalog: CatalogMatcher::new(&salon.service_vocabulary())?,
        })
    }
}

impl FieldExtractor for ServiceExtractor {
    fn name(&self) -> &'static str {
        "service-catalog"
    }

    fn field(&self) -> Field {
        Field::Service
    }

    fn extract(&self, text: &Normalized, _ctx: &ExtractionContext<'_>) -> Option<FieldValue> {
        self.catalog.find(&text.lower).map(FieldValue::Service)
    }
}

pub struct StylistExtractor {
    catalog: CatalogMatcher,
}

impl StylistExtractor {
    pub fn new(salon: &SalonConfig) -> anyhow::Result<Self> {
        Ok(Self {
            catalog: CatalogMatcher::new(&salon.stylist_vocabulary())?,
        })
    }
}

impl FieldExtractor for StylistExtractor {
    fn name(&self) -> &'static str {
        "stylist-roster"
    }

    fn field(&self) -> Field {
        Field::Stylist
    }

    fn extract(&self, text: &Normalized, _ctx: &ExtractionContext<'_>) -> Option<FieldValue> {
        self.catalog.find(&text.lower).map(FieldValue::Stylist)
    }
}

// --- Dates ---

const MONTHS: &str = r"jan(?:uary)?|feb(?:ruary)?|mar(?:ch)?|apr(?:il)?|may|june?|july?|aug(?:ust)?|sep(?:t(?:ember)?)?|oct(?:ober)?|nov(?:ember)?|dec(?:ember)?";

static RELATIVE_DAY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(day\s+after\s+tomorrow|today|tonight|tomorrow|tmrw)\b").unwrap()
});

static WEEKDAY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(monday|tuesday|wednesday|thursday|friday|saturday|sunday)s?\b").unwrap()
});

static ISO_DATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(\d{4})-(\d{1,2})-(\d{1,2})\b").unwrap());

static MONTH_DAY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"\b({MONTHS})\.?\s+(\d{{1,2}})(?:st|nd|rd|th)?\b")).unwrap()
});

static DAY_MONTH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"\b(\d{{1,2}})(?:st|nd|rd|th)?\s+(?:of\s+)?({MONTHS})\b")).unwrap()
});

fn month_number(name: &str) -> Option<u32> {
    let month = match name.get(..3)? {
        "jan" => 1,
        "feb" => 2,
        "mar" => 3,
        "apr" => 4,
        "may" => 5,
        "jun" => 6,
        "jul" => 7,
        "aug" => 8,
        "sep" => 9,
        "oct" => 10,
        "nov" => 11,
        "dec" => 12,
        _ => return None,
    };
    Some(month)
}

fn month_day(month: &str, day: &str) -> Option<DateToken> {
    let month = month_number(month)?;
    let day: u32 = day.parse().ok()?;
    // Leap year, so "february 29" is accepted here and resolved later.
    NaiveDate::from_ymd_opt(2024, month, day)?;
    Some(DateToken::MonthDay { month, day })
}

/// Relative days, weekday names and explicit dates. Tokens are kept
/// unresolved; the scheduler pins them to the calendar.
pub struct DateExtractor;

impl DateExtractor {
    fn candidates(lower: &str) -> Vec<(Span, DateToken)> {
        let mut out = Vec::new();
        let mut push = |start: usize, end: usize, token: Option<DateToken>| {
            if let Some(token) = token {
                if !is_negated(lower, start) {
                    out.push((Span { start, end }, token));
                }
            }
        };

        for c in RELATIVE_DAY.captures_iter(lower) {
            let Some(m) = c.get(0) else { continue };
            let token = match c[1].split_whitespace().next() {
                Some("day") => DateToken::DayAfterTomorrow,
                Some("today") | Some("tonight") => DateToken::Today,
                _ => DateToken::Tomorrow,
            };
            push(m.start(), m.end(), Some(token));
        }
        for c in WEEKDAY.captures_iter(lower) {
            let Some(m) = c.get(0) else { continue };
            push(m.start(), m.end(), c[1].parse::<Weekday>().ok().map(DateToken::Weekday));
        }
        for c in ISO_DATE.captures_iter(lower) {
            let Some(m) = c.get(0) else { continue };
            let date = NaiveDate::parse_from_str(m.as_str(), "%Y-%m-%d").ok();
            push(m.start(), m.end(), date.map(DateToken::On));
        }
        for c in MONTH_DAY.captures_iter(lower) {
            let Some(m) = c.get(0) else { continue };
            push(m.start(), m.end(), month_day(&c[1], &c[2]));
        }
        for c in DAY_MONTH.captures_iter(lower) {
            let Some(m) = c.get(0) else { continue };
            push(m.start(), m.end(), month_day(&c[2], &c[1]));
        }
        out
    }
}

impl FieldExtractor for DateExtractor {
    fn name(&self) -> &'static str {
        "date-tokens"
    }

    fn field(&self) -> Field {
        Field::Date
    }

    fn extract(&self, text: &Normalized, _ctx: &ExtractionContext<'_>) -> Option<FieldValue> {
        latest(Self::candidates(&text.lower)).map(FieldValue::Date)
    }
}

// --- Times ---

const HOUR_WORDS: &str = "one|two|three|four|five|six|seven|eight|nine|ten|eleven|twelve";

static MERIDIEM_TIME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(\d{1,2})(?:[:.](\d{2}))?\s*([ap])\.?\s*m\b\.?").unwrap()
});

static MERIDIEM_WORDS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"\b({HOUR_WORDS})(?:\s+(fifteen|thirty|forty[\s-]five))?\s*([ap])\.?\s*m\b\.?"
    ))
    .unwrap()
});

static OCLOCK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"\b(\d{{1,2}}|{HOUR_WORDS})\s+o(?:'|’)?\s?clock\b")).unwrap()
});

static CLOCK_TIME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b([01]?\d|2[0-3]):([0-5]\d)\b").unwrap());

static AT_HOUR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(?:at|around|by)\s+(\d{1,2})(?:[:.]([0-5]\d))?\b").unwrap());

static NOON: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(noon|midday)\b").unwrap());

fn hour_value(s: &str) -> Option<u32> {
    if let Ok(n) = s.parse::<u32>() {
        return Some(n);
    }
    HOUR_WORDS
        .split('|')
        .position(|w| w == s)
        .map(|i| i as u32 + 1)
}

fn minute_words(s: Option<&str>) -> u32 {
    match s.map(|s| s.split(|c: char| c == ' ' || c == '-').next().unwrap_or("")) {
        Some("fifteen") => 15,
        Some("thirty") => 30,
        Some("forty") => 45,
        _ => 0,
    }
}

/// Clock times ("3 pm", "15:00", "ten thirty am", "noon"). Out-of-hours
/// times are still returned; the completeness gate flags them.
pub struct TimeExtractor {
    hours: BusinessHours,
}

impl TimeExtractor {
    pub fn new(hours: BusinessHours) -> Self {
        Self { hours }
    }

    fn meridiem(hour: u32, minute: u32, marker: &str) -> Option<NaiveTime> {
        if !(1..=12).contains(&hour) {
            return None;
        }
        let hour = match marker {
            "p" => hour % 12 + 12,
            _ => hour % 12,
        };
        NaiveTime::from_hms_opt(hour, minute, 0)
    }

    /// A 12-hour clock reading without am/pm: take whichever half of the day
    /// falls inside business hours.
    fn ambiguous(&self, hour: u32, minute: u32) -> Option<NaiveTime> {
        if hour == 0 || hour > 12 {
            return NaiveTime::from_hms_opt(hour, minute, 0);
        }
        let am = NaiveTime::from_hms_opt(hour % 12, minute, 0)?;
        let pm = NaiveTime::from_hms_opt(hour % 12 + 12, minute, 0)?;
        match (self.hours.is_within(am), self.hours.is_within(pm)) {
            (true, false) => Some(am),
            (false, true) => Some(pm),
            _ if (7..=11).contains(&hour) => Some(am),
            _ => Some(pm),
        }
    }

    fn candidates(&self, lower: &str) -> Vec<(Span, NaiveTime)> {
        let mut out = Vec::new();
        let mut push = |span: Span, time: Option<NaiveTime>| {
            if let Some(time) = time {
                out.push((span, time));
            }
        };

        for c in MERIDIEM_TIME.captures_iter(lower) {
            let hour = c[1].parse().unwrap_or(0);
            let minute = c.get(2).and_then(|m| m.as_str().parse().ok()).unwrap_or(0);
            push(whole(&c), Self::meridiem(hour, minute, &c[3]));
        }
        for c in MERIDIEM_WORDS.captures_iter(lower) {
            let hour = hour_value(&c[1]).unwrap_or(0);
            let minute = minute_words(c.get(2).map(|m| m.as_str()));
            push(whole(&c), Self::meridiem(hour, minute, &c[3]));
        }
        for c in OCLOCK.captures_iter(lower) {
            let time = hour_value(&c[1]).and_then(|h| self.ambiguous(h, 0));
            push(whole(&c), time);
        }
        for c in CLOCK_TIME.captures_iter(lower) {
            let hour: u32 = c[1].parse().unwrap_or(99);
            let minute: u32 = c[2].parse().unwrap_or(0);
            push(whole(&c), self.ambiguous(hour, minute));
        }
        for c in AT_HOUR.captures_iter(lower) {
            let hour: u32 = c[1].parse().unwrap_or(99);
            let minute = c.get(2).and_then(|m| m.as_str().parse().ok()).unwrap_or(0);
            let time = if hour <= 23 { self.ambiguous(hour, minute) } else { None };
            push(whole(&c), time);
        }
        for m in NOON.find_iter(lower) {
            push(Span { start: m.start(), end: m.end() }, NaiveTime::from_hms_opt(12, 0, 0));
        }

        // "3:30" inside "3:30 pm" is not a separate mention.
        let spans: Vec<Span> = out.iter().map(|(s, _)| *s).collect();
        out.retain(|(span, _)| !spans.iter().any(|other| other.contains(span)));
        out.retain(|(span, _)| !is_negated(lower, span.start));
        out
    }
}

impl FieldExtractor for TimeExtractor {
    fn name(&self) -> &'static str {
        "clock-time"
    }

    fn field(&self) -> Field {
        Field::Time
    }

    fn extract(&self, text: &Normalized, _ctx: &ExtractionContext<'_>) -> Option<FieldValue> {
        latest(self.candidates(&text.lower)).map(FieldValue::Time)
    }
}

// --- Email ---

static EMAIL_TOKEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\s@]*@\S*").unwrap());

static LOCAL_WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[a-z0-9._+\-]+$").unwrap());

// Said between an email cue and the address without being part of it.
const EMAIL_FILLER: &[&str] = &["actually", "just", "um", "uh", "it", "its", "it's", "is", "me", "at", "to"];

/// `local@domain` shaped tokens, repaired; the right-most valid one wins.
/// After an email cue, words dictated with spaces before the `@` are joined
/// into the local part.
pub struct EmailExtractor;

impl EmailExtractor {
    /// "my email is shresth 4236@gmail.com": the words between the cue and
    /// the token at `at`, run together.
    fn spelled_prefix(text: &str, at: usize) -> Option<String> {
        let cue = email::EMAIL_CUE.find_iter(&text[..at]).last()?;
        let words: Vec<&str> = text[cue.end()..at]
            .split_whitespace()
            .filter(|w| !EMAIL_FILLER.contains(w))
            .collect();
        if words.is_empty() || words.len() > 3 || !words.iter().all(|w| LOCAL_WORD.is_match(w)) {
            return None;
        }
        Some(words.concat())
    }

    fn candidate(text: &str, token: Match<'_>) -> Option<String> {
        if let Some(prefix) = Self::spelled_prefix(text, token.start()) {
            if let Some(address) = email::repair(&format!("{prefix}{}", token.as_str())) {
                return Some(address);
            }
        }
        // "priya 4236@gmail.com" without a cue: the digits are only the tail.
        let local = token.as_str().split('@').next().unwrap_or_default();
        let follows_word = text[..token.start()]
            .trim_end()
            .ends_with(|c: char| c.is_alphanumeric());
        if !local.is_empty() && local.chars().all(|c| c.is_ascii_digit()) && follows_word {
            return None;
        }
        email::repair(token.as_str())
    }
}

impl FieldExtractor for EmailExtractor {
    fn name(&self) -> &'static str {
        "email-token"
    }

    fn field(&self) -> Field {
        Field::Email
    }

    fn extract(&self, text: &Normalized, _ctx: &ExtractionContext<'_>) -> Option<FieldValue> {
        let tokens: Vec<Match<'_>> = EMAIL_TOKEN.find_iter(&text.lower).collect();
        tokens
            .into_iter()
            .rev()
            .find_map(|token| Self::candidate(&text.lower, token))
            .map(FieldValue::Email)
    }
}

// --- Names ---

static NAME_INTRO: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(my\s+name\s+is|my\s+name's|name's|name\s+is|call\s+me|this\s+is|i\s+am|i'm|i’m|im)\s+(\p{L}[\p{L}'’\-]*)(?:\s+(\p{L}[\p{L}'’\-]*))?",
    )
    .unwrap()
});

// An assistant turn that asks for the customer's name, not one that merely mentions it.
static ASKS_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:your|the|a|what|which)\s+(?:full\s+|first\s+)?name\b[^.!?]*\?").unwrap()
});

const STOP_WORDS: &[&str] = &[
    "a", "an", "the", "and", "or", "but", "so", "just", "also", "here", "there", "not", "no",
    "yes", "yeah", "yep", "ok", "okay", "sure", "fine", "good", "great", "well", "very", "really",
    "still", "back", "free", "available", "ready", "sorry", "glad", "happy", "new", "interested",
    "calling", "looking", "hoping", "wondering", "trying", "going", "planning", "thinking",
    "booking", "actually", "please", "thanks", "thank", "hi", "hello", "hey", "for", "with",
    "about", "from", "to", "in", "on", "at", "it", "is", "was", "be", "me", "my", "you", "your",
    "we", "our", "i", "afraid", "done", "after", "before", "wanting", "want", "would", "like",
    "need", "can", "could", "will", "should", "appointment", "book", "email", "name", "time",
    "date", "am", "pm", "again", "only", "hair", "salon", "perfect", "cool", "awesome",
    "correct", "alright", "right", "exactly", "sounds", "nice", "lovely", "wonderful",
    "excellent", "brilliant", "fantastic", "absolutely", "definitely", "cheers", "nope", "go",
    "ahead", "confirm", "confirmed", "that", "works",
];

const DATE_WORDS: &[&str] = &[
    "today", "tonight", "tomorrow", "monday", "tuesday", "wednesday", "thursday", "friday",
    "saturday", "sunday", "january", "february", "march", "april", "may", "june", "july",
    "august", "september", "october", "november", "december", "noon", "midday", "morning",
    "afternoon", "evening",
];

/// Rejects tokens that are vocabulary rather than a person's name.
#[derive(Debug, Clone)]
pub struct NameFilter {
    rejected: HashSet<String>,
}

impl NameFilter {
    pub fn new(salon: &SalonConfig) -> Self {
        let mut rejected: HashSet<String> = STOP_WORDS
            .iter()
            .chain(DATE_WORDS)
            .map(|w| w.to_string())
            .collect();
        rejected.extend(HOUR_WORDS.split('|').map(str::to_string));
        for (_, phrases) in salon
            .service_vocabulary()
            .into_iter()
            .chain(salon.stylist_vocabulary())
        {
            for phrase in phrases {
                rejected.extend(phrase.split_whitespace().map(str::to_string));
            }
        }
        Self { rejected }
    }

    pub fn accepts(&self, token: &str) -> bool {
        let token = token.trim_matches(|c: char| c == '\'' || c == '’' || c == '-');
        let lower = token.to_lowercase();
        let base = lower
            .strip_suffix("'s")
            .or_else(|| lower.strip_suffix("’s"))
            .unwrap_or(&lower);
        token.chars().count() >= 2
            && token.chars().all(|c| c.is_alphabetic() || c == '\'' || c == '’' || c == '-')
            && !self.rejected.contains(base)
            && !base.ends_with("ing")
    }

    /// A bare one or two word answer ("Priya", "Priya Sharma") as a name.
    pub fn clean(&self, raw: &str) -> Option<String> {
        let raw = raw.trim().trim_end_matches(|c: char| matches!(c, '.' | '!' | ',' | '?'));
        let words: Vec<&str> = raw.split_whitespace().collect();
        if words.is_empty() || words.len() > 2 || !words.iter().all(|w| self.accepts(w)) {
            return None;
        }
        Some(words.iter().map(|w| title_case(w)).collect::<Vec<_>>().join(" "))
    }
}

fn title_case(token: &str) -> String {
    if token.chars().any(char::is_uppercase) {
        return token.to_string();
    }
    let mut chars = token.chars();
    match chars.next() {
        None => String::new(),
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
    }
}

fn starts_upper(token: &str) -> bool {
    token.chars().next().is_some_and(char::is_uppercase)
}

/// "my name is X", "I'm X", "this is X", and a bare answer to a question
/// about the customer's name. Service and stylist words are never names.
pub struct NameExtractor {
    filter: NameFilter,
}

impl NameExtractor {
    pub fn new(salon: &SalonConfig) -> Self {
        Self {
            filter: NameFilter::new(salon),
        }
    }

    fn from_intro(&self, text: &str) -> Option<String> {
        let mut found = None;
        for c in NAME_INTRO.captures_iter(text) {
            let intro = c[1].to_lowercase();
            // "I'm looking for..." is common; only a capitalised word counts there.
            let weak = intro.starts_with('i') || intro.starts_with("this");
            let first = &c[2];
            if !self.filter.accepts(first) || (weak && !starts_upper(first)) {
                continue;
            }
            let mut name = title_case(first.trim_end_matches(['\'', '’', '-']));
            if let Some(second) = c.get(3).map(|m| m.as_str()) {
                if self.filter.accepts(second) && (!weak || starts_upper(second)) {
                    name = format!("{name} {}", title_case(second.trim_end_matches(['\'', '’', '-'])));
                }
            }
            found = Some(name);
        }
        found
    }
}

impl FieldExtractor for NameExtractor {
    fn name(&self) -> &'static str {
        "name-intro"
    }

    fn field(&self) -> Field {
        Field::CustomerName
    }

    fn extract(&self, text: &Normalized, ctx: &ExtractionContext<'_>) -> Option<FieldValue> {
        if let Some(name) = self.from_intro(&text.text) {
            return Some(FieldValue::CustomerName(name));
        }
        let asked = ctx.previous_assistant.is_some_and(|prev| ASKS_NAME.is_match(prev));
        if asked && !ctx.name_known {
            return self.filter.clean(&text.text).map(FieldValue::CustomerName);
        }
        None
    }
}
