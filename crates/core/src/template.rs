use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, Local};
use regex::{Captures, Regex};
use std::fmt::Write;
use std::sync::LazyLock;
use thiserror::Error;

pub const DEFAULT_TEMPLATE: &str = "{filename}_{date:%Y%m%d}_{num}";
const DEFAULT_DATE_FORMAT: &str = "%Y%m%d";

static NUM_PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{num(?::(.*?))?\}").expect("static regex"));
static DATE_PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{date(?::(.*?))?\}").expect("static regex"));

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TemplateError {
    #[error("連番の書式指定が不正です: {0}")]
    InvalidNumberFormat(String),
    #[error("日付の書式指定が不正です: {0}")]
    InvalidDateFormat(String),
}

pub fn render_template(
    template: &str,
    root_name: &str,
    sequence: i64,
    timestamp: &DateTime<Local>,
) -> Result<String, TemplateError> {
    // root_name is inserted before the {num}/{date} passes, so a base name
    // that itself looks like a placeholder gets expanded by them.
    let with_name = template.replace("{filename}", root_name);
    let with_num = replace_placeholders(&NUM_PLACEHOLDER, &with_name, |spec| match spec {
        Some(spec) => format_number(sequence, spec),
        None => Ok(sequence.to_string()),
    })?;
    replace_placeholders(&DATE_PLACEHOLDER, &with_num, |spec| {
        format_date(timestamp, spec.unwrap_or(DEFAULT_DATE_FORMAT))
    })
}

pub fn validate_template(template: &str) -> Result<(), TemplateError> {
    render_template(template, "", 0, &Local::now()).map(|_| ())
}

fn replace_placeholders<F>(pattern: &Regex, input: &str, mut render: F) -> Result<String, TemplateError>
where
    F: FnMut(Option<&str>) -> Result<String, TemplateError>,
{
    let mut output = String::with_capacity(input.len());
    let mut cursor = 0usize;
    for caps in pattern.captures_iter(input) {
        let Some(whole) = caps.get(0) else {
            continue;
        };
        output.push_str(&input[cursor..whole.start()]);
        output.push_str(&render(format_spec(&caps))?);
        cursor = whole.end();
    }
    output.push_str(&input[cursor..]);
    Ok(output)
}

// `{num:}` carries an empty spec, which behaves like no spec at all.
fn format_spec<'a>(caps: &Captures<'a>) -> Option<&'a str> {
    caps.get(1).map(|m| m.as_str()).filter(|s| !s.is_empty())
}

fn format_date(timestamp: &DateTime<Local>, pattern: &str) -> Result<String, TemplateError> {
    let strftime = microsecond_fraction(pattern);
    let items: Vec<Item<'_>> = StrftimeItems::new(&strftime).collect();
    if items.iter().any(|item| matches!(item, Item::Error)) {
        return Err(TemplateError::InvalidDateFormat(pattern.to_string()));
    }

    let mut out = String::new();
    write!(out, "{}", timestamp.format_with_items(items.iter()))
        .map_err(|_| TemplateError::InvalidDateFormat(pattern.to_string()))?;
    Ok(out)
}

// `%f` is six digits of microseconds in C strftime; chrono's bare `%f` is nanoseconds.
fn microsecond_fraction(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len());
    let mut chars = pattern.chars();
    while let Some(ch) = chars.next() {
        if ch != '%' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('f') => out.push_str("%6f"),
            Some(next) => {
                out.push('%');
                out.push(next);
            }
            None => out.push('%'),
        }
    }
    out
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Align {
    Left,
    Right,
    Center,
    AfterSign,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Sign {
    NegativeOnly,
    Always,
    Space,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Presentation {
    Decimal,
    Radix { radix: u32, uppercase: bool },
    Char,
    Fixed,
    Exponent { uppercase: bool },
    General { uppercase: bool },
    Percent,
}

impl Presentation {
    fn is_float(self) -> bool {
        matches!(
            self,
            Self::Fixed | Self::Exponent { .. } | Self::General { .. } | Self::Percent
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct NumberSpec {
    fill: char,
    align: Align,
    sign: Sign,
    alternate: bool,
    width: usize,
    grouping: Option<char>,
    precision: Option<usize>,
    presentation: Presentation,
}

fn parse_number_spec(spec: &str) -> Result<NumberSpec, TemplateError> {
    let invalid = || TemplateError::InvalidNumberFormat(spec.to_string());
    let chars: Vec<char> = spec.chars().collect();
    let mut i = 0usize;

    let mut fill = None;
    let mut align = None;
    if chars.len() >= 2 && parse_align(chars[1]).is_some() {
        fill = Some(chars[0]);
        align = parse_align(chars[1]);
        i = 2;
    } else if let Some(a) = chars.first().copied().and_then(parse_align) {
        align = Some(a);
        i = 1;
    }

    let mut sign = Sign::NegativeOnly;
    let explicit_sign = matches!(chars.get(i), Some('+' | '-' | ' '));
    match chars.get(i) {
        Some('+') => sign = Sign::Always,
        Some(' ') => sign = Sign::Space,
        _ => {}
    }
    if explicit_sign {
        i += 1;
    }

    let alternate = chars.get(i) == Some(&'#');
    if alternate {
        i += 1;
    }

    let zero = chars.get(i) == Some(&'0');
    if zero {
        i += 1;
    }

    let width = parse_count(&chars, &mut i).ok_or_else(invalid)?.unwrap_or(0);

    let grouping = match chars.get(i) {
        Some(c @ (',' | '_')) => {
            i += 1;
            Some(*c)
        }
        _ => None,
    };

    let precision = if chars.get(i) == Some(&'.') {
        i += 1;
        Some(parse_count(&chars, &mut i).ok_or_else(invalid)?.ok_or_else(invalid)?)
    } else {
        None
    };

    let presentation = match chars.get(i) {
        None | Some('d' | 'n') => Presentation::Decimal,
        Some('x') => Presentation::Radix { radix: 16, uppercase: false },
        Some('X') => Presentation::Radix { radix: 16, uppercase: true },
        Some('o') => Presentation::Radix { radix: 8, uppercase: false },
        Some('b') => Presentation::Radix { radix: 2, uppercase: false },
        Some('c') => Presentation::Char,
        Some('f' | 'F') => Presentation::Fixed,
        Some('e') => Presentation::Exponent { uppercase: false },
        Some('E') => Presentation::Exponent { uppercase: true },
        Some('g') => Presentation::General { uppercase: false },
        Some('G') => Presentation::General { uppercase: true },
        Some('%') => Presentation::Percent,
        Some(_) => return Err(invalid()),
    };
    if chars.get(i).is_some() {
        i += 1;
    }
    if i != chars.len() {
        return Err(invalid());
    }

    if precision.is_some() && !presentation.is_float() {
        return Err(invalid());
    }
    match presentation {
        Presentation::Radix { .. } if grouping == Some(',') => return Err(invalid()),
        Presentation::Decimal if chars.last() == Some(&'n') && grouping.is_some() => {
            return Err(invalid())
        }
        Presentation::Char if explicit_sign || alternate || grouping.is_some() => {
            return Err(invalid())
        }
        _ => {}
    }

    Ok(NumberSpec {
        fill: fill.unwrap_or(if zero { '0' } else { ' ' }),
        align: align.unwrap_or(if zero { Align::AfterSign } else { Align::Right }),
        sign,
        alternate,
        width,
        grouping,
        precision,
        presentation,
    })
}

// None when the digits overflow, Some(None) when there are no digits at all.
fn parse_count(chars: &[char], i: &mut usize) -> Option<Option<usize>> {
    let mut count = None;
    while let Some(d) = chars.get(*i).and_then(|c| c.to_digit(10)) {
        count = Some(
            count
                .unwrap_or(0usize)
                .checked_mul(10)?
                .checked_add(d as usize)?,
        );
        *i += 1;
    }
    Some(count)
}

fn parse_align(ch: char) -> Option<Align> {
    match ch {
        '<' => Some(Align::Left),
        '>' => Some(Align::Right),
        '^' => Some(Align::Center),
        '=' => Some(Align::AfterSign),
        _ => None,
    }
}

fn format_number(value: i64, spec: &str) -> Result<String, TemplateError> {
    let invalid = || TemplateError::InvalidNumberFormat(spec.to_string());
    let spec = parse_number_spec(spec)?;
    let magnitude = value.unsigned_abs();
    // the float presentations go through f64 the same way Python's int does
    let float = magnitude as f64;
    let precision = spec.precision.unwrap_or(6);

    let mut body = match spec.presentation {
        Presentation::Decimal => magnitude.to_string(),
        Presentation::Radix { radix: 16, uppercase: true } => format!("{magnitude:X}"),
        Presentation::Radix { radix: 16, .. } => format!("{magnitude:x}"),
        Presentation::Radix { radix: 8, .. } => format!("{magnitude:o}"),
        Presentation::Radix { .. } => format!("{magnitude:b}"),
        Presentation::Char => u32::try_from(value)
            .ok()
            .and_then(char::from_u32)
            .ok_or_else(invalid)?
            .to_string(),
        Presentation::Fixed => fixed_point(float, precision, spec.alternate),
        Presentation::Percent => {
            format!("{}%", fixed_point(float * 100.0, precision, spec.alternate))
        }
        Presentation::Exponent { uppercase } => {
            exponent(float, precision, spec.alternate, uppercase)
        }
        Presentation::General { uppercase } => {
            general(float, precision, spec.alternate, uppercase)
        }
    };
    if let Some(sep) = spec.grouping {
        body = match spec.presentation {
            Presentation::Radix { .. } => group_digits(&body, sep, 4),
            Presentation::Decimal => group_digits(&body, sep, 3),
            _ => {
                let end = body
                    .find(|c: char| !c.is_ascii_digit())
                    .unwrap_or(body.len());
                format!("{}{}", group_digits(&body[..end], sep, 3), &body[end..])
            }
        };
    }

    let mut prefix = match (value < 0, spec.sign) {
        (true, _) => "-".to_string(),
        (false, Sign::Always) => "+".to_string(),
        (false, Sign::Space) => " ".to_string(),
        (false, Sign::NegativeOnly) => String::new(),
    };
    if spec.alternate {
        prefix.push_str(match spec.presentation {
            Presentation::Radix { radix: 16, uppercase: true } => "0X",
            Presentation::Radix { radix: 16, .. } => "0x",
            Presentation::Radix { radix: 8, .. } => "0o",
            Presentation::Radix { radix: 2, .. } => "0b",
            _ => "",
        });
    }

    let len = prefix.chars().count() + body.chars().count();
    let pad = spec.width.saturating_sub(len);
    let fill = |n: usize| std::iter::repeat(spec.fill).take(n).collect::<String>();

    let out = match spec.align {
        Align::Left => format!("{prefix}{body}{}", fill(pad)),
        Align::Right => format!("{}{prefix}{body}", fill(pad)),
        Align::Center => {
            let left = pad / 2;
            format!("{}{prefix}{body}{}", fill(left), fill(pad - left))
        }
        Align::AfterSign => format!("{prefix}{}{body}", fill(pad)),
    };
    Ok(out)
}

fn fixed_point(x: f64, precision: usize, alternate: bool) -> String {
    let mut out = format!("{x:.precision$}");
    if alternate && precision == 0 {
        out.push('.');
    }
    out
}

fn exponent(x: f64, precision: usize, alternate: bool, uppercase: bool) -> String {
    let raw = format!("{x:.precision$e}");
    let (mantissa, exp) = split_exponent(&raw);
    let mut mantissa = mantissa.to_string();
    if alternate && !mantissa.contains('.') {
        mantissa.push('.');
    }
    join_exponent(&mantissa, exp, uppercase)
}

fn general(x: f64, precision: usize, alternate: bool, uppercase: bool) -> String {
    let significant = precision.max(1);
    let mantissa_digits = significant - 1;
    let raw = format!("{x:.mantissa_digits$e}");
    let (mantissa, exp) = split_exponent(&raw);

    let fits_fixed = exp >= -4 && (exp < 0 || (exp as usize) < significant);
    if fits_fixed {
        let decimals = (significant - 1).saturating_add_signed(-(exp as isize));
        let out = format!("{x:.decimals$}");
        return match (alternate, out.contains('.')) {
            (true, true) => out,
            (true, false) => format!("{out}."),
            (false, _) => strip_fraction_zeros(&out).to_string(),
        };
    }

    let mantissa = match (alternate, mantissa.contains('.')) {
        (true, true) => mantissa.to_string(),
        (true, false) => format!("{mantissa}."),
        (false, _) => strip_fraction_zeros(mantissa).to_string(),
    };
    join_exponent(&mantissa, exp, uppercase)
}

fn split_exponent(raw: &str) -> (&str, i32) {
    match raw.split_once('e') {
        Some((mantissa, exp)) => (mantissa, exp.parse().unwrap_or(0)),
        None => (raw, 0),
    }
}

// Two exponent digits minimum, always signed: 7.0e0 -> 7.0e+00.
fn join_exponent(mantissa: &str, exp: i32, uppercase: bool) -> String {
    let marker = if uppercase { 'E' } else { 'e' };
    let sign = if exp < 0 { '-' } else { '+' };
    format!("{mantissa}{marker}{sign}{:02}", exp.unsigned_abs())
}

fn strip_fraction_zeros(s: &str) -> &str {
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.')
    } else {
        s
    }
}

fn group_digits(digits: &str, sep: char, group: usize) -> String {
    let chars: Vec<char> = digits.chars().collect();
    let mut out = String::with_capacity(chars.len() + chars.len() / group);
    for (i, ch) in chars.iter().enumerate() {
        if i > 0 && (chars.len() - i) % group == 0 {
            out.push(sep);
        }
        out.push(*ch);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn new_year_eve() -> DateTime<Local> {
        Local
            .with_ymd_and_hms(2024, 12, 31, 0, 0, 0)
            .single()
            .expect("unambiguous local time")
    }

    fn render(template: &str, root: &str, seq: i64) -> String {
        render_template(template, root, seq, &new_year_eve()).expect("must render")
    }

    #[test]
    fn literal_template_renders_unchanged() {
        assert_eq!(render("MyProject-final", "photo", 3), "MyProject-final");
    }

    #[test]
    fn filename_and_zero_padded_num() {
        assert_eq!(render("{filename}_{num:03d}", "photo", 7), "photo_007");
    }

    #[test]
    fn plain_num_uses_decimal() {
        assert_eq!(render("{num}-{num}", "x", 12), "12-12");
        assert_eq!(render("{num:}", "x", 5), "5");
    }

    #[test]
    fn date_with_explicit_format() {
        assert_eq!(render("{date:%Y-%m-%d}", "x", 1), "2024-12-31");
    }

    #[test]
    fn date_defaults_to_compact_ymd() {
        assert_eq!(render("{date}_{filename}", "x", 1), "20241231_x");
    }

    #[test]
    fn default_template_combines_all_placeholders() {
        assert_eq!(render(DEFAULT_TEMPLATE, "IMG_0001", 1), "IMG_0001_20241231_1");
    }

    #[test]
    fn malformed_placeholders_are_left_untouched() {
        assert_eq!(render("{num", "x", 1), "{num");
        assert_eq!(render("{numbers}_{dat}", "x", 1), "{numbers}_{dat}");
        assert_eq!(render("}{filename", "x", 1), "}{filename");
    }

    #[test]
    fn filename_is_inserted_before_num_pass() {
        // a base name shaped like a placeholder is expanded by the later pass
        assert_eq!(render("{filename}", "{num}", 4), "4");
        assert_eq!(render("{filename}", "{other}", 4), "{other}");
    }

    #[test]
    fn unknown_number_format_is_an_error() {
        let err = render_template("{num:q}", "x", 1, &new_year_eve()).expect_err("must fail");
        assert_eq!(err, TemplateError::InvalidNumberFormat("q".to_string()));

        for spec in ["{num:.2d}", "{num:.2}", "{num:.f}", "{num:+c}", "{num:,x}", "{num:,n}"] {
            let err = render_template(spec, "x", 65, &new_year_eve()).expect_err(spec);
            assert!(matches!(err, TemplateError::InvalidNumberFormat(_)), "{spec}");
        }
    }

    #[test]
    fn num_accepts_float_presentations() {
        assert_eq!(render("{filename}_{num:.1f}", "x", 7), "x_7.0");
        assert_eq!(render("{num:06.2f}", "x", -7), "-07.00");
        assert_eq!(render("{num:.0%}", "x", 7), "700%");
    }

    #[test]
    fn float_presentation_variants() {
        assert_eq!(format_number(7, "f").unwrap(), "7.000000");
        assert_eq!(format_number(7, "#.0f").unwrap(), "7.");
        assert_eq!(format_number(1234567, ",.2f").unwrap(), "1,234,567.00");
        assert_eq!(format_number(1, "%").unwrap(), "100.000000%");
        assert_eq!(format_number(7, "e").unwrap(), "7.000000e+00");
        assert_eq!(format_number(1234567, ".2E").unwrap(), "1.23E+06");
        assert_eq!(format_number(7, "g").unwrap(), "7");
        assert_eq!(format_number(0, "g").unwrap(), "0");
        assert_eq!(format_number(7, "#g").unwrap(), "7.00000");
        assert_eq!(format_number(100000, "g").unwrap(), "100000");
        assert_eq!(format_number(1000000, "g").unwrap(), "1e+06");
        assert_eq!(format_number(1234567, "G").unwrap(), "1.23457E+06");
        assert_eq!(format_number(1234567, ".3g").unwrap(), "1.23e+06");
    }

    #[test]
    fn char_presentation_uses_code_point() {
        assert_eq!(format_number(65, "c").unwrap(), "A");
        assert_eq!(format_number(0x5199, ">3c").unwrap(), "  写");
        assert!(format_number(-1, "c").is_err());
        assert!(format_number(0x110000, "c").is_err());
    }

    #[test]
    fn date_fraction_is_microseconds() {
        assert_eq!(render("{date:%f}", "x", 1), "000000");
        let later = new_year_eve() + chrono::Duration::microseconds(123_456);
        let rendered = render_template("{date:%H%M%S%f}", "x", 1, &later).expect("must render");
        assert_eq!(rendered, "000000123456");
        assert_eq!(render("{date:%%f}", "x", 1), "%f");
        assert_eq!(render("{date:%.3f}", "x", 1), ".000");
    }

    #[test]
    fn unknown_date_directive_is_an_error() {
        let err = render_template("{date:%Q}", "x", 1, &new_year_eve()).expect_err("must fail");
        assert!(matches!(err, TemplateError::InvalidDateFormat(_)));
    }

    #[test]
    fn number_spec_variants() {
        assert_eq!(format_number(7, "03").unwrap(), "007");
        assert_eq!(format_number(-7, "03d").unwrap(), "-07");
        assert_eq!(format_number(7, "+d").unwrap(), "+7");
        assert_eq!(format_number(7, ">4").unwrap(), "   7");
        assert_eq!(format_number(7, "*<4").unwrap(), "7***");
        assert_eq!(format_number(7, "^5").unwrap(), "  7  ");
        assert_eq!(format_number(255, "04x").unwrap(), "00ff");
        assert_eq!(format_number(255, "#X").unwrap(), "0XFF");
        assert_eq!(format_number(5, "b").unwrap(), "101");
        assert_eq!(format_number(1234567, ",").unwrap(), "1,234,567");
    }

    #[test]
    fn validate_template_reports_bad_specs() {
        assert!(validate_template(DEFAULT_TEMPLATE).is_ok());
        assert!(validate_template("{num:zz}").is_err());
        assert!(validate_template("no placeholders").is_ok());
    }
}
