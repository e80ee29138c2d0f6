//! # Ion Text Reader
//!
//! A `nom` parser for the Ion text encoding: comments, typed nulls, booleans,
//! ints (decimal, hex, binary, `_` separators), floats, decimals, timestamps,
//! identifier/quoted/operator symbols, short and long strings, blobs, clobs,
//! lists, s-expressions, structs, and annotations.
//!
//! Small combinator functions, one per production, composed with `alt` in the
//! order that keeps lexically overlapping forms apart (timestamps before
//! numbers, long strings before quoted symbols, lobs before structs).

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use nom::branch::alt;
use nom::bytes::complete::{tag, tag_no_case, take_until, take_while, take_while1, take_while_m_n};
use nom::character::complete::{char as pchar, digit1, multispace1, one_of, satisfy};
use nom::combinator::{cut, not, opt, recognize};
use nom::error::{ErrorKind, FromExternalError, ParseError as NomParseError};
use nom::multi::{many0, many0_count};
use nom::sequence::{pair, preceded, terminated, tuple};
use nom::IResult;

use crate::decimal::Decimal;
use crate::error::ParseError;
use crate::timestamp::{Timestamp, TimestampParts};
use crate::value::{Data, IonType, Value};

// ─── Error plumbing ─────────────────────────────────────────────────────────

#[derive(Debug)]
struct ReadError<'a> {
    input: &'a str,
    message: String,
}

impl<'a> ReadError<'a> {
    fn new(input: &'a str, message: impl Into<String>) -> Self {
        Self {
            input,
            message: message.into(),
        }
    }
}

impl<'a> NomParseError<&'a str> for ReadError<'a> {
    fn from_error_kind(input: &'a str, kind: ErrorKind) -> Self {
        Self::new(input, format!("unexpected input ({})", kind.description()))
    }

    fn append(_input: &'a str, _kind: ErrorKind, other: Self) -> Self {
        other
    }

    fn or(self, other: Self) -> Self {
        // Report whichever branch got furthest.
        if other.input.len() < self.input.len() {
            other
        } else {
            self
        }
    }
}

impl<'a> FromExternalError<&'a str, String> for ReadError<'a> {
    fn from_external_error(input: &'a str, _kind: ErrorKind, e: String) -> Self {
        Self::new(input, e)
    }
}

type Res<'a, T> = IResult<&'a str, T, ReadError<'a>>;

fn fail<'a, T>(input: &'a str, message: impl Into<String>) -> Res<'a, T> {
    Err(nom::Err::Failure(ReadError::new(input, message)))
}

fn to_parse_error(text: &str, err: ReadError<'_>) -> ParseError {
    let offset = text.len().saturating_sub(err.input.len());
    let consumed = &text[..offset];
    let line = consumed.matches('\n').count() + 1;
    let column = consumed
        .rsplit('\n')
        .next()
        .map(|l| l.chars().count())
        .unwrap_or(0)
        + 1;
    ParseError::Syntax {
        line,
        column,
        message: err.message,
    }
}

// ─── Entry points ───────────────────────────────────────────────────────────

/// Parse every top-level value in `text`.
pub fn parse_all(text: &str) -> Result<Vec<Value>, ParseError> {
    let mut values = Vec::new();
    let mut input = text;
    loop {
        let (rest, ()) = ws(input).map_err(|e| finish(text, e))?;
        if rest.is_empty() {
            return Ok(values);
        }
        let (rest, value) = top_level_value(rest).map_err(|e| finish(text, e))?;
        values.push(value);
        input = rest;
    }
}

/// Parse text holding exactly one top-level value.
pub fn parse_one(text: &str) -> Result<Value, ParseError> {
    let mut values = parse_all(text)?;
    if values.len() != 1 {
        return Err(ParseError::ValueCount {
            found: values.len(),
        });
    }
    Ok(values.remove(0))
}

fn finish(text: &str, err: nom::Err<ReadError<'_>>) -> ParseError {
    match err {
        nom::Err::Error(e) | nom::Err::Failure(e) => to_parse_error(text, e),
        nom::Err::Incomplete(_) => ParseError::Syntax {
            line: 0,
            column: 0,
            message: "incomplete input".into(),
        },
    }
}

/// Top-level values may be bare operator-free symbols, so they go through
/// the same production as container elements.
fn top_level_value(input: &str) -> Res<'_, Value> {
    cut(value)(input)
}

// ─── Whitespace and comments ────────────────────────────────────────────────

fn line_comment(input: &str) -> Res<'_, &str> {
    recognize(pair(tag("//"), take_while(|c: char| c != '\n')))(input)
}

fn block_comment(input: &str) -> Res<'_, &str> {
    recognize(tuple((tag("/*"), take_until("*/"), tag("*/"))))(input)
}

fn ws(input: &str) -> Res<'_, ()> {
    let (rest, _) = many0_count(alt((multispace1, line_comment, block_comment)))(input)?;
    Ok((rest, ()))
}

// ─── Values ─────────────────────────────────────────────────────────────────

fn annotation(input: &str) -> Res<'_, String> {
    terminated(symbol_text, tuple((ws, tag("::"), ws)))(input)
}

fn value(input: &str) -> Res<'_, Value> {
    let (input, annotations) = many0(annotation)(input)?;
    let (input, data) = datum(input)?;
    Ok((input, Value::new(data).with_annotations(annotations)))
}

fn datum(input: &str) -> Res<'_, Data> {
    alt((
        list,
        sexp,
        lob,
        structure,
        long_string_data,
        short_string_data,
        quoted_symbol_data,
        timestamp,
        special_float,
        number,
        identifier_data,
    ))(input)
}

/// Characters that may not directly follow a numeric or timestamp token.
fn stop(input: &str) -> Res<'_, ()> {
    not(satisfy(|c: char| {
        c.is_ascii_alphanumeric() || matches!(c, '_' | '$' | '.' | '\'' | '"')
    }))(input)
}

// ─── Symbols ────────────────────────────────────────────────────────────────

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_' || c == '$'
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '$'
}

fn identifier(input: &str) -> Res<'_, &str> {
    recognize(pair(satisfy(is_ident_start), take_while(is_ident_char)))(input)
}

fn symbol_text(input: &str) -> Res<'_, String> {
    alt((
        |i| identifier(i).map(|(rest, s)| (rest, s.to_string())),
        |i| quoted_text(i, "'"),
    ))(input)
}

fn quoted_symbol_data(input: &str) -> Res<'_, Data> {
    let (rest, text) = quoted_text(input, "'")?;
    Ok((rest, Data::Symbol(text)))
}

fn identifier_data(input: &str) -> Res<'_, Data> {
    let (rest, word) = identifier(input)?;
    let data = match word {
        "true" => Data::Bool(true),
        "false" => Data::Bool(false),
        "nan" => Data::Float(f64::NAN),
        "null" => {
            if let Ok((after, kind)) = preceded(pchar::<_, ReadError>('.'), identifier)(rest) {
                return match IonType::from_name(kind) {
                    Some(t) => Ok((after, Data::Null(t))),
                    None => fail(rest, format!("unknown null type 'null.{kind}'")),
                };
            }
            Data::Null(IonType::Null)
        }
        _ => Data::Symbol(word.to_string()),
    };
    Ok((rest, data))
}

fn operator_symbol(input: &str) -> Res<'_, Value> {
    let (rest, op) = take_while1(|c: char| "!#%&*+-./;<=>?@^`|~".contains(c))(input)?;
    Ok((rest, Value::symbol(op)))
}

// ─── Text ───────────────────────────────────────────────────────────────────

fn hex_escape(input: &str, width: usize) -> Res<'_, Option<char>> {
    let (rest, hex) = take_while_m_n(width, width, |c: char| c.is_ascii_hexdigit())(input)?;
    let code = u32::from_str_radix(hex, 16).unwrap_or(u32::MAX);
    match char::from_u32(code) {
        Some(c) => Ok((rest, Some(c))),
        None => fail(input, format!("invalid code point escape {hex}")),
    }
}

/// Decode one escape (the input starts just after the backslash).
fn escape(input: &str) -> Res<'_, Option<char>> {
    let mut chars = input.chars();
    let Some(c) = chars.next() else {
        return fail(input, "dangling escape");
    };
    let rest = chars.as_str();
    let decoded = match c {
        'n' => '\n',
        't' => '\t',
        'r' => '\r',
        '0' => '\0',
        'a' => '\x07',
        'b' => '\x08',
        'f' => '\x0c',
        'v' => '\x0b',
        '\\' | '"' | '\'' | '/' | '?' => c,
        '\n' => return Ok((rest, None)),
        'x' => return hex_escape(rest, 2),
        'u' => return hex_escape(rest, 4),
        'U' => return hex_escape(rest, 8),
        other => return fail(input, format!("invalid escape '\\{other}'")),
    };
    Ok((rest, Some(decoded)))
}

/// Text between `delim` pairs; single-character delimiters forbid newlines.
fn quoted_text<'a>(input: &'a str, delim: &'static str) -> Res<'a, String> {
    let (mut rest, _) = tag(delim)(input)?;
    let mut out = String::new();
    loop {
        if let Some(after) = rest.strip_prefix(delim) {
            return Ok((after, out));
        }
        let mut chars = rest.chars();
        match chars.next() {
            None => return fail(input, "unterminated text"),
            Some('\\') => {
                let (after, decoded) = escape(chars.as_str())?;
                out.extend(decoded);
                rest = after;
            }
            Some('\n') if delim.len() == 1 => return fail(rest, "newline in quoted text"),
            Some(c) => {
                out.push(c);
                rest = chars.as_str();
            }
        }
    }
}

fn short_string_text(input: &str) -> Res<'_, String> {
    quoted_text(input, "\"")
}

/// One or more adjacent `'''...'''` segments, concatenated.
fn long_string_text(input: &str) -> Res<'_, String> {
    let (mut rest, mut out) = quoted_text(input, "'''")?;
    loop {
        let (after_ws, ()) = ws(rest)?;
        match quoted_text(after_ws, "'''") {
            Ok((after, more)) => {
                out.push_str(&more);
                rest = after;
            }
            Err(nom::Err::Error(_)) => return Ok((rest, out)),
            Err(e) => return Err(e),
        }
    }
}

fn short_string_data(input: &str) -> Res<'_, Data> {
    let (rest, text) = short_string_text(input)?;
    Ok((rest, Data::String(text)))
}

fn long_string_data(input: &str) -> Res<'_, Data> {
    let (rest, text) = long_string_text(input)?;
    Ok((rest, Data::String(text)))
}

// ─── Lobs ───────────────────────────────────────────────────────────────────

fn clob_bytes<'a>(at: &'a str, text: String) -> Result<Vec<u8>, nom::Err<ReadError<'a>>> {
    text.chars()
        .map(|c| u8::try_from(u32::from(c)).ok())
        .collect::<Option<Vec<u8>>>()
        .ok_or_else(|| nom::Err::Failure(ReadError::new(at, "clob text must be 8-bit")))
}

fn lob(input: &str) -> Res<'_, Data> {
    let (body, _) = tag("{{")(input)?;
    let (body, ()) = ws(body)?;
    let (rest, data) = match alt((long_string_text, short_string_text))(body) {
        Ok((rest, text)) => (rest, Data::Clob(clob_bytes(body, text)?)),
        Err(nom::Err::Error(_)) => {
            let (rest, encoded) =
                take_while(|c: char| c.is_ascii_alphanumeric() || "+/= \t\r\n".contains(c))(body)?;
            let compact: String = encoded.chars().filter(|c| !c.is_whitespace()).collect();
            match BASE64.decode(compact.as_bytes()) {
                Ok(bytes) => (rest, Data::Blob(bytes)),
                Err(e) => return fail(body, format!("invalid base64 blob: {e}")),
            }
        }
        Err(e) => return Err(e),
    };
    let (rest, ()) = ws(rest)?;
    let (rest, _) = cut(tag("}}"))(rest)?;
    Ok((rest, data))
}

// ─── Containers ─────────────────────────────────────────────────────────────

/// Items separated by commas (trailing comma allowed) up to `close`.
fn comma_separated<'a, T>(
    mut input: &'a str,
    close: char,
    item: impl Fn(&'a str) -> Res<'a, T>,
) -> Res<'a, Vec<T>> {
    let mut items = Vec::new();
    loop {
        let (rest, ()) = ws(input)?;
        if let Ok((rest, _)) = pchar::<_, ReadError>(close)(rest) {
            return Ok((rest, items));
        }
        let (rest, it) = cut(&item)(rest)?;
        items.push(it);
        let (rest, ()) = ws(rest)?;
        if let Ok((rest, _)) = pchar::<_, ReadError>(',')(rest) {
            input = rest;
            continue;
        }
        return match pchar::<_, ReadError>(close)(rest) {
            Ok((rest, _)) => Ok((rest, items)),
            Err(_) => fail(rest, format!("expected ',' or '{close}'")),
        };
    }
}

fn list(input: &str) -> Res<'_, Data> {
    let (rest, _) = pchar('[')(input)?;
    let (rest, items) = comma_separated(rest, ']', value)?;
    Ok((rest, Data::List(items)))
}

fn sexp(input: &str) -> Res<'_, Data> {
    let (mut input, _) = pchar('(')(input)?;
    let mut items = Vec::new();
    loop {
        let (rest, ()) = ws(input)?;
        if let Ok((rest, _)) = pchar::<_, ReadError>(')')(rest) {
            return Ok((rest, Data::Sexp(items)));
        }
        let (rest, item) = cut(alt((value, operator_symbol)))(rest)?;
        items.push(item);
        input = rest;
    }
}

fn field(input: &str) -> Res<'_, (String, Value)> {
    let (rest, name) = alt((long_string_text, short_string_text, symbol_text))(input)?;
    let (rest, _) = tuple((ws, pchar(':'), ws))(rest)?;
    let (rest, v) = value(rest)?;
    Ok((rest, (name, v)))
}

fn structure(input: &str) -> Res<'_, Data> {
    let (rest, _) = pchar('{')(input)?;
    let (rest, fields) = comma_separated(rest, '}', field)?;
    Ok((rest, Data::Struct(fields)))
}

// ─── Numbers ────────────────────────────────────────────────────────────────

fn digits(input: &str) -> Res<'_, &str> {
    recognize(pair(digit1, take_while(|c: char| c.is_ascii_digit() || c == '_')))(input)
}

fn special_float(input: &str) -> Res<'_, Data> {
    let (rest, text) = alt((tag("+inf"), tag("-inf")))(input)?;
    let (rest, ()) = stop(rest)?;
    let x = if text.starts_with('+') {
        f64::INFINITY
    } else {
        f64::NEG_INFINITY
    };
    Ok((rest, Data::Float(x)))
}

fn number(input: &str) -> Res<'_, Data> {
    let (rest, text) = recognize(pair(
        opt(pchar('-')),
        alt((
            recognize(pair(
                tag_no_case("0x"),
                take_while1(|c: char| c.is_ascii_hexdigit() || c == '_'),
            )),
            recognize(pair(
                tag_no_case("0b"),
                take_while1(|c: char| c == '0' || c == '1' || c == '_'),
            )),
            recognize(tuple((
                digits,
                opt(pair(pchar('.'), opt(digits))),
                opt(tuple((one_of("eEdD"), opt(one_of("+-")), digits))),
            ))),
        )),
    ))(input)?;
    let (rest, ()) = stop(rest)?;
    match number_from_text(text) {
        Ok(data) => Ok((rest, data)),
        Err(message) => fail(input, message),
    }
}

fn number_from_text(text: &str) -> Result<Data, String> {
    let clean: String = text.chars().filter(|c| *c != '_').collect();
    let (negative, body) = match clean.strip_prefix('-') {
        Some(body) => (true, body),
        None => (false, clean.as_str()),
    };
    let radix_body = body
        .strip_prefix("0x")
        .or_else(|| body.strip_prefix("0X"))
        .map(|b| (b, 16))
        .or_else(|| {
            body.strip_prefix("0b")
                .or_else(|| body.strip_prefix("0B"))
                .map(|b| (b, 2))
        });
    if let Some((digits, radix)) = radix_body {
        let magnitude = i128::from_str_radix(digits, radix).map_err(|e| e.to_string())?;
        return signed_int(magnitude, negative, text);
    }
    if body.contains(['e', 'E']) {
        return clean
            .parse::<f64>()
            .map(Data::Float)
            .map_err(|e| format!("invalid float {text}: {e}"));
    }
    if body.contains(['.', 'd', 'D']) {
        return decimal_from_text(body, negative, text).map(Data::Decimal);
    }
    let magnitude: i128 = body.parse().map_err(|_| format!("int {text} out of range"))?;
    signed_int(magnitude, negative, text)
}

fn signed_int(magnitude: i128, negative: bool, text: &str) -> Result<Data, String> {
    let value = if negative { -magnitude } else { magnitude };
    i64::try_from(value)
        .map(Data::Int)
        .map_err(|_| format!("int {text} out of range"))
}

fn decimal_from_text(body: &str, negative: bool, text: &str) -> Result<Decimal, String> {
    let (mantissa, exp) = match body.find(['d', 'D']) {
        Some(pos) => (&body[..pos], &body[pos + 1..]),
        None => (body, "0"),
    };
    let exp: i32 = exp
        .parse()
        .map_err(|_| format!("decimal exponent out of range in {text}"))?;
    let (whole, frac) = mantissa.split_once('.').unwrap_or((mantissa, ""));
    let coefficient: i128 = format!("{whole}{frac}")
        .parse()
        .map_err(|_| format!("decimal {text} out of range"))?;
    let frac_len = i32::try_from(frac.len()).map_err(|_| format!("decimal {text} out of range"))?;
    let coefficient = if negative { -coefficient } else { coefficient };
    let exponent = exp
        .checked_sub(frac_len)
        .ok_or_else(|| format!("decimal exponent out of range in {text}"))?;
    Ok(Decimal::new(coefficient, exponent))
}

// ─── Timestamps ─────────────────────────────────────────────────────────────

fn fixed_digits(input: &str, n: usize) -> Res<'_, u32> {
    let (rest, d) = take_while_m_n(n, n, |c: char| c.is_ascii_digit())(input)?;
    Ok((rest, d.parse().unwrap_or(0)))
}

fn two_digits(input: &str) -> Res<'_, u32> {
    fixed_digits(input, 2)
}

fn offset(input: &str) -> Res<'_, Option<i32>> {
    if let Ok((rest, _)) = pchar::<_, ReadError>('Z')(input) {
        return Ok((rest, Some(0)));
    }
    let (rest, (sign, hours, _, minutes)) =
        tuple((one_of("+-"), two_digits, pchar(':'), two_digits))(input)?;
    let total = i32::try_from(hours * 60 + minutes).unwrap_or(i32::MAX);
    let offset = match (sign, total) {
        ('-', 0) => None,
        ('-', t) => Some(-t),
        (_, t) => Some(t),
    };
    Ok((rest, offset))
}

fn timestamp(input: &str) -> Res<'_, Data> {
    let mut parts = TimestampParts::default();
    let (rest, year) = fixed_digits(input, 4)?;
    parts.year = i32::try_from(year).unwrap_or(0);

    let rest = if let Ok((rest, _)) = pchar::<_, ReadError>('T')(rest) {
        rest
    } else {
        let (rest, month) = preceded(pchar('-'), two_digits)(rest)?;
        parts.month = Some(month);
        if let Ok((rest, _)) = pchar::<_, ReadError>('T')(rest) {
            rest
        } else {
            let (rest, day) = preceded(pchar('-'), two_digits)(rest)?;
            parts.day = Some(day);
            match pchar::<_, ReadError>('T')(rest) {
                Ok((after_t, _)) => match time_of_day(after_t, &mut parts) {
                    Ok(after) => after,
                    Err(_) => after_t,
                },
                Err(_) => rest,
            }
        }
    };
    let (rest, ()) = stop(rest)?;
    match Timestamp::from_parts(parts) {
        Ok(ts) => Ok((rest, Data::Timestamp(ts))),
        Err(e) => fail(input, e.to_string()),
    }
}

/// `hh:mm[:ss[.fff]]<offset>`, filling `parts` on success.
fn time_of_day<'a>(input: &'a str, parts: &mut TimestampParts) -> Result<&'a str, nom::Err<ReadError<'a>>> {
    let (rest, (hour, _, minute)) = tuple((two_digits, pchar(':'), two_digits))(input)?;
    let (rest, seconds) = opt(preceded(
        pchar(':'),
        pair(two_digits, opt(preceded(pchar('.'), digit1))),
    ))(rest)?;
    let (rest, offset_minutes) = offset(rest)?;
    parts.hour_minute = Some((hour, minute));
    if let Some((second, fraction)) = seconds {
        parts.second = Some(second);
        parts.fraction = fraction.unwrap_or("").to_string();
    }
    parts.offset_minutes = offset_minutes;
    Ok(rest)
}
