//! String, Symbol and Regexp.

use std::ops::Range;
use std::rc::Rc;

use bstr::{BString, ByteSlice, ByteVec};
use nodemarshal::{PatternFlags, Symbol};
use num_bigint::BigInt;

use super::{resolve_index, slice_bounds, Call, Dispatch};
use crate::errors::{ErrorKind, Flow, WithNode};
use crate::interpreter::Machine;
use crate::value::{ProcBody, Regexp, Value};

/// Results of string operations above this size are refused.
const MAX_STRING_LEN: usize = 1 << 30;

/// The characters of `bytes`. Invalid UTF-8 sequences are kept as
/// they are, one element each.
fn chars(bytes: &[u8]) -> Vec<&[u8]> {
    bytes.char_indices().map(|(start, end, _)| &bytes[start..end]).collect()
}

fn char_count(bytes: &[u8]) -> usize {
    bytes.chars().count()
}

/// `String#to_i`: the longest integer prefix, or 0.
fn parse_int(bytes: &[u8]) -> BigInt {
    let text = bytes.trim_start();
    let (negative, rest) = match text.first() {
        Some(b'-') => (true, &text[1..]),
        Some(b'+') => (false, &text[1..]),
        _ => (false, text),
    };
    let digits: Vec<u8> = rest
        .iter()
        .take_while(|c| c.is_ascii_digit() || **c == b'_')
        .filter(|c| c.is_ascii_digit())
        .copied()
        .collect();
    let n = BigInt::parse_bytes(&digits, 10).unwrap_or_default();
    if negative {
        -n
    } else {
        n
    }
}

/// `String#to_f`: the longest float prefix, or 0.0.
fn parse_float(bytes: &[u8]) -> f64 {
    let text = bytes.trim_start();
    let mut end = 0;
    let digits = |from: usize| text[from..].iter().take_while(|c| c.is_ascii_digit()).count();

    if matches!(text.first(), Some(b'+' | b'-')) {
        end += 1;
    }
    end += digits(end);
    if text.get(end) == Some(&b'.') && digits(end + 1) > 0 {
        end += 1 + digits(end + 1);
    }
    if matches!(text.get(end), Some(b'e' | b'E')) {
        let sign = usize::from(matches!(text.get(end + 1), Some(b'+' | b'-')));
        let exponent = digits(end + 1 + sign);
        if exponent > 0 {
            end += 1 + sign + exponent;
        }
    }

    text[..end]
        .to_str()
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(0.0)
}

/// Byte ranges of the matches of a String or Regexp pattern.
fn matches(pattern: &Value, haystack: &[u8], call: &Call) -> Result<Vec<Range<usize>>, Flow> {
    match pattern {
        Value::Regexp(re) => Ok(re.ranges(haystack)),
        Value::String(needle) if needle.is_empty() => Ok((0..=haystack.len()).map(|i| i..i).collect()),
        Value::String(needle) => Ok(haystack
            .find_iter(needle.as_slice())
            .map(|start| start..start + needle.len())
            .collect()),
        other => call.fail(ErrorKind::TypeError {
            expected: "Regexp",
            actual: other.type_of(),
        }),
    }
}

/// `sub` and `gsub`, with a replacement string or a block.
fn substitute(m: &mut Machine, bytes: &[u8], call: &Call, global: bool) -> Result<Value, Flow> {
    call.arity(1, 2)?;
    let mut ranges = matches(&call.args[0], bytes, call)?;
    if !global {
        ranges.truncate(1);
    }

    let mut out = Vec::with_capacity(bytes.len());
    let mut last = 0;
    for range in ranges {
        out.extend_from_slice(&bytes[last..range.start]);
        match call.args.get(1) {
            Some(replacement) => out.extend_from_slice(&replacement.to_bytes().with_node(call.at)?),
            None => {
                let block = call.block()?;
                let found = Value::string(&bytes[range.clone()]);
                out.extend_from_slice(&m.call_proc(&block, vec![found], call.at)?.to_s());
            }
        }
        last = range.end;
    }
    out.extend_from_slice(&bytes[last..]);
    Ok(Value::string(out))
}

fn split(bytes: &[u8], call: &Call) -> Result<Value, Flow> {
    call.arity(0, 1)?;
    let mut parts: Vec<BString> = match call.args.first() {
        None | Some(Value::Nil) => bytes.fields().map(BString::from).collect(),
        Some(Value::String(sep)) if sep.as_slice() == b" " => bytes.fields().map(BString::from).collect(),
        Some(Value::String(sep)) if sep.is_empty() => chars(bytes).into_iter().map(BString::from).collect(),
        Some(Value::String(sep)) => bytes.split_str(sep.as_slice()).map(BString::from).collect(),
        Some(pattern) => {
            let mut parts = Vec::new();
            let mut last = 0;
            for range in matches(pattern, bytes, call)? {
                if range.is_empty() {
                    continue;
                }
                parts.push(BString::from(&bytes[last..range.start]));
                last = range.end;
            }
            parts.push(BString::from(&bytes[last..]));
            parts
        }
    };
    while parts.last().is_some_and(|p| p.is_empty()) {
        parts.pop();
    }
    Ok(Value::array(parts.into_iter().map(Value::string).collect()))
}

/// `ljust`, `rjust` and `center`.
fn justify(bytes: &[u8], call: &Call) -> Result<Value, Flow> {
    call.arity(1, 2)?;
    let width = usize::try_from(call.int_arg(0)?).unwrap_or(0);
    let pad = match call.args.get(1) {
        Some(pad) => pad.to_bytes().with_node(call.at)?.as_ref().clone(),
        None => BString::from(" "),
    };
    if pad.is_empty() {
        return call.fail(ErrorKind::Argument("zero width padding".into()));
    }
    let missing = width.saturating_sub(char_count(bytes));
    if missing > MAX_STRING_LEN {
        return call.fail(ErrorKind::Argument("argument too big".into()));
    }

    let padding = |n: usize| -> Vec<u8> { chars(&pad).into_iter().cycle().take(n).flatten().copied().collect() };
    let (left, right) = match call.method() {
        b"ljust" => (0, missing),
        b"rjust" => (missing, 0),
        _ => (missing / 2, missing - missing / 2),
    };
    let mut out = padding(left);
    out.extend_from_slice(bytes);
    out.extend(padding(right));
    Ok(Value::string(out))
}

pub(super) fn string(m: &mut Machine, s: &Rc<BString>, call: &Call) -> Dispatch {
    let bytes = s.as_slice();
    let value = match call.method() {
        b"+" => {
            call.arity(1, 1)?;
            let mut out = s.as_ref().clone();
            out.push_str(call.arg(0).to_bytes().with_node(call.at)?.as_slice());
            Value::string(out)
        }
        b"*" => {
            call.arity(1, 1)?;
            let count = call.int_arg(0)?;
            let Ok(count) = usize::try_from(count) else {
                return call.fail(ErrorKind::Argument("negative argument".into()));
            };
            if bytes.len().saturating_mul(count) > MAX_STRING_LEN {
                return call.fail(ErrorKind::Argument("argument too big".into()));
            }
            Value::string(bytes.repeat(count))
        }
        b"<=>" => {
            call.arity(1, 1)?;
            let ordering = Value::String(s.clone()).compare(&call.arg(0)).with_node(call.at)?;
            ordering.map_or(Value::Nil, |o| Value::int(o as i8))
        }
        b"<" | b"<=" | b">" | b">=" => {
            call.arity(1, 1)?;
            let ordering = m.compare_values(&Value::String(s.clone()), &call.arg(0), call.at)?;
            Value::Bool(match call.method() {
                b"<" => ordering.is_lt(),
                b"<=" => ordering.is_le(),
                b">" => ordering.is_gt(),
                _ => ordering.is_ge(),
            })
        }
        b"=~" => {
            call.arity(1, 1)?;
            match call.arg(0) {
                Value::Regexp(re) => re.find(bytes).map_or(Value::Nil, Value::int),
                other => {
                    return call.fail(ErrorKind::TypeError {
                        expected: "Regexp",
                        actual: other.type_of(),
                    })
                }
            }
        }
        b"match?" => {
            call.arity(1, 1)?;
            Value::Bool(!matches(&call.arg(0), bytes, call)?.is_empty())
        }
        b"length" | b"size" => Value::int(char_count(bytes)),
        b"bytesize" => Value::int(bytes.len()),
        b"empty?" => Value::Bool(bytes.is_empty()),
        b"upcase" => Value::string(bytes.to_uppercase()),
        b"downcase" => Value::string(bytes.to_lowercase()),
        b"capitalize" => {
            let mut out = Vec::with_capacity(bytes.len());
            if let Some((first, rest)) = chars(bytes).split_first() {
                out.extend(first.to_uppercase());
                out.extend(rest.concat().to_lowercase());
            }
            Value::string(out)
        }
        b"swapcase" => {
            let mut out = Vec::with_capacity(bytes.len());
            for c in chars(bytes) {
                if c.to_uppercase() == c {
                    out.extend(c.to_lowercase());
                } else {
                    out.extend(c.to_uppercase());
                }
            }
            Value::string(out)
        }
        b"reverse" => {
            let mut parts = chars(bytes);
            parts.reverse();
            Value::string(parts.concat())
        }
        b"strip" => Value::string(bytes.trim()),
        b"lstrip" => Value::string(bytes.trim_start()),
        b"rstrip" => Value::string(bytes.trim_end()),
        b"chomp" => {
            let trimmed = bytes
                .strip_suffix(b"\r\n")
                .or_else(|| bytes.strip_suffix(b"\n"))
                .or_else(|| bytes.strip_suffix(b"\r"))
                .unwrap_or(bytes);
            Value::string(trimmed)
        }
        b"chop" => {
            let mut parts = chars(bytes);
            parts.pop();
            Value::string(parts.concat())
        }
        b"chars" => Value::array(chars(bytes).into_iter().map(Value::string).collect()),
        b"bytes" => Value::array(bytes.iter().map(|&b| Value::int(b)).collect()),
        b"lines" => Value::array(bytes.lines_with_terminator().map(Value::string).collect()),
        b"each_char" => {
            let block = call.block()?;
            for c in chars(bytes) {
                m.call_proc(&block, vec![Value::string(c)], call.at)?;
            }
            Value::String(s.clone())
        }
        b"split" => split(bytes, call)?,
        b"include?" => {
            call.arity(1, 1)?;
            Value::Bool(bytes.contains_str(call.arg(0).to_bytes().with_node(call.at)?.as_slice()))
        }
        b"start_with?" | b"end_with?" => {
            let start = call.method() == b"start_with?";
            let mut found = false;
            for arg in &call.args {
                let affix = arg.to_bytes().with_node(call.at)?;
                found |= if start {
                    bytes.starts_with_str(affix.as_slice())
                } else {
                    bytes.ends_with_str(affix.as_slice())
                };
            }
            Value::Bool(found)
        }
        b"index" => {
            call.arity(1, 1)?;
            match matches(&call.arg(0), bytes, call)?.first() {
                Some(range) => Value::int(char_count(&bytes[..range.start])),
                None => Value::Nil,
            }
        }
        b"[]" | b"slice" => {
            call.arity(1, 2)?;
            let parts = chars(bytes);
            match (&call.args[0], call.args.len()) {
                (Value::Integer(_) | Value::Float(_), 1) => {
                    match resolve_index(call.int_arg(0)?, parts.len()) {
                        Some(i) => Value::string(parts[i]),
                        None => Value::Nil,
                    }
                }
                (Value::String(_) | Value::Regexp(_), 1) => {
                    match matches(&call.args[0], bytes, call)?.first() {
                        Some(range) => Value::string(&bytes[range.clone()]),
                        None => Value::Nil,
                    }
                }
                _ => match slice_bounds(call, parts.len())? {
                    Some(range) => Value::string(parts[range].concat()),
                    None => Value::Nil,
                },
            }
        }
        b"sub" => substitute(m, bytes, call, false)?,
        b"gsub" => substitute(m, bytes, call, true)?,
        b"scan" => {
            call.arity(1, 1)?;
            let found = matches(&call.args[0], bytes, call)?;
            Value::array(found.into_iter().map(|r| Value::string(&bytes[r])).collect())
        }
        b"ljust" | b"rjust" | b"center" => justify(bytes, call)?,
        b"ord" => match bytes.chars().next() {
            Some(c) => Value::int(c as u32),
            None => return call.fail(ErrorKind::Argument("empty string".into())),
        },
        b"to_s" | b"to_str" => Value::String(s.clone()),
        b"to_sym" | b"intern" => Value::Symbol(Symbol::new(bytes)),
        b"to_i" => Value::Integer(parse_int(bytes)),
        b"to_f" => Value::Float(parse_float(bytes)),
        b"valid_encoding?" => Value::Bool(bytes.to_str().is_ok()),
        _ => return Ok(None),
    };
    Ok(Some(value))
}

pub(super) fn symbol(m: &mut Machine, s: &Symbol, call: &Call) -> Dispatch {
    let value = match call.method() {
        b"to_s" | b"id2name" | b"name" => Value::string(s.as_bytes()),
        b"to_sym" => Value::Symbol(s.clone()),
        b"to_proc" => Value::Proc(m.new_proc(true, ProcBody::Method(s.clone()))),
        b"length" | b"size" => Value::int(char_count(s.as_bytes())),
        b"upcase" => Value::Symbol(Symbol::new(s.as_bytes().to_uppercase())),
        b"downcase" => Value::Symbol(Symbol::new(s.as_bytes().to_lowercase())),
        b"<=>" => {
            call.arity(1, 1)?;
            match call.arg(0) {
                Value::Symbol(other) => Value::int(s.cmp(&other) as i8),
                _ => Value::Nil,
            }
        }
        b"start_with?" | b"end_with?" | b"empty?" => {
            return string(m, &Rc::new(BString::from(s.as_bytes())), call);
        }
        _ => return Ok(None),
    };
    Ok(Some(value))
}

pub(super) fn regexp(re: &Rc<Regexp>, call: &Call) -> Dispatch {
    let value = match call.method() {
        b"=~" | b"match?" | b"===" => {
            call.arity(1, 1)?;
            let haystack = match call.arg(0) {
                Value::String(s) => s,
                Value::Symbol(s) => Rc::new(BString::from(s.as_bytes())),
                Value::Nil if call.method() == b"=~" => return Ok(Some(Value::Nil)),
                _ if call.method() == b"===" => return Ok(Some(Value::Bool(false))),
                other => {
                    return call.fail(ErrorKind::TypeError {
                        expected: "String",
                        actual: other.type_of(),
                    })
                }
            };
            if call.method() == b"=~" {
                re.find(&haystack).map_or(Value::Nil, Value::int)
            } else {
                Value::Bool(re.is_match(&haystack))
            }
        }
        b"source" => Value::string(re.source.clone()),
        b"options" => Value::int(re.flags.bits()),
        b"casefold?" => Value::Bool(re.flags.contains(PatternFlags::IGNORECASE)),
        _ => return Ok(None),
    };
    Ok(Some(value))
}

#[cfg(test)]
mod tests {
    use num_bigint::BigInt;
    use rstest::rstest;

    use super::{chars, parse_float, parse_int};

    #[rstest]
    #[case::plain("42", 42)]
    #[case::trailing("12abc", 12)]
    #[case::signed("  -7", -7)]
    #[case::underscores("1_000", 1000)]
    #[case::garbage("abc", 0)]
    fn to_i(#[case] text: &str, #[case] expected: i64) {
        assert_eq!(BigInt::from(expected), parse_int(text.as_bytes()));
    }

    #[rstest]
    #[case::plain("2.5", 2.5)]
    #[case::exponent("1e3x", 1000.0)]
    #[case::dangling_point("3.", 3.0)]
    #[case::garbage("x1", 0.0)]
    fn to_f(#[case] text: &str, #[case] expected: f64) {
        assert_eq!(expected, parse_float(text.as_bytes()));
    }

    #[test]
    fn chars_keep_invalid_bytes() {
        let expected: Vec<&[u8]> = vec![b"a", b"\xff", b"b", "é".as_bytes()];
        assert_eq!(expected, chars(b"a\xffb\xc3\xa9"));
    }
}
