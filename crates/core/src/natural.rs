use regex::Regex;
use std::cmp::Ordering;
use std::sync::LazyLock;

static DECIMAL_DIGIT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d$").expect("static regex"));

// Alternates text / number, always starting with a (possibly empty) text run.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct NaturalKey(Vec<Segment>);

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
enum Segment {
    Text(String),
    Number(Digits),
}

// Leading zeros stripped, so the derived Eq matches numeric equality.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Digits(String);

impl Digits {
    fn new(run: &str) -> Self {
        let trimmed = run.trim_start_matches('0');
        Self(trimmed.to_string())
    }
}

impl Ord for Digits {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0
            .len()
            .cmp(&other.0.len())
            .then_with(|| self.0.cmp(&other.0))
    }
}

impl PartialOrd for Digits {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

pub fn natural_key(input: &str) -> NaturalKey {
    let mut segments = Vec::new();
    let mut text = String::new();
    let mut digits = String::new();

    for ch in input.chars() {
        if let Some(value) = decimal_value(ch) {
            if digits.is_empty() {
                segments.push(Segment::Text(std::mem::take(&mut text).to_lowercase()));
            }
            digits.push(char::from(b'0' + value));
        } else {
            if !digits.is_empty() {
                segments.push(Segment::Number(Digits::new(&digits)));
                digits.clear();
            }
            text.push(ch);
        }
    }

    if digits.is_empty() {
        segments.push(Segment::Text(text.to_lowercase()));
    } else {
        segments.push(Segment::Number(Digits::new(&digits)));
        segments.push(Segment::Text(String::new()));
    }

    NaturalKey(segments)
}

pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    natural_key(a).cmp(&natural_key(b))
}

fn is_decimal_digit(ch: char) -> bool {
    ch.is_ascii_digit() || (!ch.is_ascii() && DECIMAL_DIGIT.is_match(ch.encode_utf8(&mut [0; 4])))
}

// Nd digit sets are contiguous 0..=9 blocks, and adjacent blocks start on a zero.
fn decimal_value(ch: char) -> Option<u8> {
    if ch.is_ascii_digit() {
        return Some(ch as u8 - b'0');
    }
    if !is_decimal_digit(ch) {
        return None;
    }
    let mut offset = 0u32;
    let mut code = ch as u32;
    while let Some(prev) = code.checked_sub(1).and_then(char::from_u32) {
        if !is_decimal_digit(prev) {
            break;
        }
        offset += 1;
        code -= 1;
    }
    Some((offset % 10) as u8)
}
