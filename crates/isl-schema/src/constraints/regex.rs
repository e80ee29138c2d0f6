//! # `regex`
//!
//! ISL patterns are a small ECMA-262 subset: no `(?...)` groups, no
//! lookaround or backreferences, only the escapes listed in [`ESCAPABLE`],
//! and no lazy or possessive quantifiers. Patterns are checked and
//! rewritten into `regex` crate syntax, with the shorthand classes mapped to
//! their ASCII meaning. Matching is unanchored.
//!
//! ISL 1.0 does not allow `\d`, `\s`, or `\w` inside a character class.

use isl_core::{Data, IonType, Value};
use regex::{Regex, RegexBuilder};

use super::applies;
use crate::config::IslVersion;
use crate::error::SchemaError;
use crate::violations::{Validation, Violation, Violations};

/// Characters that may follow `\` outside a character class.
const ESCAPABLE: &[char] = &[
    '.', '^', '$', '|', '?', '*', '+', '\\', '[', ']', '(', ')', '{', '}', 'w', 'W', 'd', 'D', 's', 'S',
];

#[derive(Debug)]
pub(crate) struct Pattern {
    source: String,
    regex: Regex,
}

impl Pattern {
    pub(super) fn parse(arg: &Value, version: IslVersion) -> Result<Self, SchemaError> {
        let source = match arg.data() {
            Data::String(s) if !s.is_empty() => s.clone(),
            _ => {
                return Err(SchemaError::invalid(format!(
                    "Regex must be a non-empty string; but was: {arg}"
                )))
            }
        };
        let mut case_insensitive = false;
        let mut multi_line = false;
        for flag in arg.annotations() {
            match flag.as_str() {
                "i" => case_insensitive = true,
                "m" => multi_line = true,
                _ => return Err(SchemaError::invalid(format!("Unrecognized flags for regex ({arg})"))),
            }
        }
        let translated = Translator::new(&source, version).run()?;
        let regex = RegexBuilder::new(&translated)
            .case_insensitive(case_insensitive)
            .multi_line(multi_line)
            .build()
            .map_err(|e| SchemaError::invalid(format!("Invalid regex '{source}': {e}")))?;
        Ok(Self { source, regex })
    }

    pub(super) fn validate(&self, isl: &Value, value: &Value, sink: &mut Violations) -> Validation {
        if !applies(isl, value, IonType::is_text, sink)? {
            return Ok(());
        }
        let text = value.as_text().unwrap_or_default();
        if self.regex.is_match(text) {
            Ok(())
        } else {
            sink.add(Violation::new(
                isl,
                "regex_mismatch",
                format!("'{text}' doesn't match regex '{}'", self.source),
            ))
        }
    }
}

// ─── Translation ────────────────────────────────────────────────────────────

struct Translator<'a> {
    source: &'a str,
    chars: Vec<char>,
    /// Index of the next unread character.
    pos: usize,
    version: IslVersion,
    out: String,
}

impl<'a> Translator<'a> {
    fn new(source: &'a str, version: IslVersion) -> Self {
        Self {
            source,
            chars: source.chars().collect(),
            pos: 0,
            version,
            out: String::with_capacity(source.len()),
        }
    }

    fn next(&mut self) -> Option<char> {
        let ch = self.chars.get(self.pos).copied();
        self.pos += 1;
        ch
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn error(&self, message: impl std::fmt::Display) -> SchemaError {
        SchemaError::invalid(format!(
            "{message} in regex '{}' at offset {}",
            self.source,
            self.pos.saturating_sub(1)
        ))
    }

    fn run(mut self) -> Result<String, SchemaError> {
        while let Some(ch) = self.next() {
            match ch {
                '[' => self.class()?,
                '(' => {
                    if self.peek() == Some('?') {
                        self.next();
                        return Err(self.error("invalid character '?'"));
                    }
                    self.out.push('(');
                    // A group opener takes no quantifier.
                    continue;
                }
                '\\' => self.escape()?,
                _ => self.out.push(ch),
            }
            self.quantifier()?;
        }
        Ok(self.out)
    }

    fn escape(&mut self) -> Result<(), SchemaError> {
        match self.next() {
            Some('d') => self.out.push_str("[0-9]"),
            Some('D') => self.out.push_str("[^0-9]"),
            Some('w') => self.out.push_str("[0-9A-Za-z_]"),
            Some('W') => self.out.push_str("[^0-9A-Za-z_]"),
            Some('s') => self.out.push_str("[ \\x0C\\n\\r\\t]"),
            Some('S') => self.out.push_str("[^ \\x0C\\n\\r\\t]"),
            Some(c) if ESCAPABLE.contains(&c) => {
                self.out.push('\\');
                self.out.push(c);
            }
            Some(c) => return Err(self.error(format!("invalid escape character '{c}'"))),
            None => return Err(self.error("pattern ends with '\\'")),
        }
        Ok(())
    }

    /// Translate a character class; the opening `[` has been consumed.
    fn class(&mut self) -> Result<(), SchemaError> {
        self.out.push('[');
        let mut previous = None;
        while let Some(ch) = self.next() {
            match ch {
                ']' => {
                    self.out.push(']');
                    return Ok(());
                }
                '[' => return Err(self.error("'[' must be escaped within a character class")),
                '&' if self.peek() == Some('&') => {
                    return Err(self.error("'&&' is not supported in a character class"))
                }
                // Doubled `-` and `~` are set operators in the target syntax.
                '-' | '~' if previous == Some(ch) => {
                    self.out.push('\\');
                    self.out.push(ch);
                }
                '\\' => self.class_escape()?,
                _ => self.out.push(ch),
            }
            previous = Some(ch);
        }
        Err(self.error("character class missing ']'"))
    }

    fn class_escape(&mut self) -> Result<(), SchemaError> {
        let Some(ch) = self.next() else {
            return Err(self.error("character class missing ']'"));
        };
        let shorthand = match ch {
            '[' | ']' | '\\' => {
                self.out.push('\\');
                self.out.push(ch);
                return Ok(());
            }
            'd' => "0-9",
            'D' => "[:^digit:]",
            'w' => "0-9A-Za-z_",
            'W' => "[:^word:]",
            's' => " \\x0C\\n\\r\\t",
            'S' => "[:^space:]",
            _ => return Err(self.error(format!("invalid sequence '\\{ch}' in character class"))),
        };
        if self.version == IslVersion::V1_0 {
            return Err(self.error(format!("invalid sequence '\\{ch}' in character class")));
        }
        self.out.push_str(shorthand);
        Ok(())
    }

    fn quantifier(&mut self) -> Result<(), SchemaError> {
        match self.peek() {
            Some(c @ ('?' | '*' | '+')) => {
                self.next();
                self.out.push(c);
            }
            Some('{') => {
                self.next();
                self.out.push('{');
                let mut found_number = false;
                loop {
                    match self.next() {
                        Some(c @ '0'..='9') => {
                            found_number = true;
                            self.out.push(c);
                        }
                        Some(',') if found_number => self.out.push(','),
                        Some(',') => return Err(self.error("range quantifier is missing lower bound")),
                        Some('}') => {
                            self.out.push('}');
                            break;
                        }
                        Some(c) => return Err(self.error(format!("invalid character '{c}'"))),
                        None => return Err(self.error("range quantifier missing '}'")),
                    }
                }
            }
            _ => return Ok(()),
        }
        match self.peek() {
            Some(c @ ('?' | '+')) => {
                self.next();
                Err(self.error(format!("invalid character '{c}'")))
            }
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use isl_core::parse_one;

    fn translate(pattern: &str, version: IslVersion) -> Result<String, SchemaError> {
        Translator::new(pattern, version).run()
    }

    fn matches(isl: &str, text: &str) -> bool {
        let isl = parse_one(isl).unwrap();
        let pattern = Pattern::parse(&isl, IslVersion::V2_0).unwrap();
        let mut sink = Violations::new();
        pattern.validate(&isl, &Value::string(text), &mut sink).unwrap();
        sink.is_valid()
    }

    #[test]
    fn test_shorthand_classes_are_ascii() {
        assert_eq!(translate(r"\d+", IslVersion::V1_0).unwrap(), "[0-9]+");
        assert_eq!(translate(r"\s", IslVersion::V1_0).unwrap(), r"[ \x0C\n\r\t]");
        assert!(!matches(r#""^\\d$""#, "٣"));
        assert!(matches(r#""^\\d$""#, "3"));
    }

    #[test]
    fn test_matching_is_unanchored() {
        assert!(matches(r#""b+""#, "abbbc"));
        assert!(!matches(r#""^b+$""#, "abbbc"));
    }

    #[test]
    fn test_flags() {
        assert!(matches(r#"i::"^abc$""#, "ABC"));
        assert!(!matches(r#""^abc$""#, "ABC"));
        assert!(matches(r#"m::"^b$""#, "a\nb\nc"));
        assert!(Pattern::parse(&parse_one(r#"x::"a""#).unwrap(), IslVersion::V2_0).is_err());
    }

    #[test]
    fn test_rejected_constructs() {
        for bad in [r"(?i)a", r"\b", r"[[a]]", r"[a&&b]", r"a{,3}", r"a*?", r"a++", r"a{2", r"[abc", r"\p{L}"] {
            assert!(translate(bad, IslVersion::V2_0).is_err(), "{bad}");
        }
    }

    #[test]
    fn test_class_shorthands_depend_on_version() {
        assert!(translate(r"[\d]", IslVersion::V1_0).is_err());
        assert_eq!(translate(r"[\d_]", IslVersion::V2_0).unwrap(), "[0-9_]");
        assert!(matches(r#""^[\\Wa]+$""#, "a!a"));
    }

    #[test]
    fn test_accepted_constructs() {
        for ok in [r"a{2,}", r"a{1,3}b", r"(ab)+", r"[a\]]", r"\.\*", r"a|b"] {
            assert!(translate(ok, IslVersion::V1_0).is_ok(), "{ok}");
        }
    }

    #[test]
    fn test_argument_must_be_non_empty_string() {
        assert!(Pattern::parse(&parse_one(r#""""#).unwrap(), IslVersion::V2_0).is_err());
        assert!(Pattern::parse(&parse_one("abc").unwrap(), IslVersion::V2_0).is_err());
    }

    #[test]
    fn test_violation_message() {
        let isl = parse_one(r#""^a$""#).unwrap();
        let pattern = Pattern::parse(&isl, IslVersion::V2_0).unwrap();
        let mut sink = Violations::new();
        pattern.validate(&isl, &Value::symbol("b"), &mut sink).unwrap();
        assert_eq!(sink.violations()[0].code, "regex_mismatch");
        assert_eq!(sink.violations()[0].message, "'b' doesn't match regex '^a$'");
    }
}
