//! Structured-data preprocessing applied before YAML parsing.
//!
//! Layer documents annotate example values with a parenthetical hint, e.g.
//!
//! ```text
//! name: "Billing" (optional, display name)
//! ```
//!
//! which is not valid YAML. Such lines are rewritten in place into a flow
//! mapping that keeps both parts:
//!
//! ```text
//! name: {value: "Billing", description: "optional, display name"}
//! ```
//!
//! The rewrite never adds or removes lines, so line numbers reported for the
//! preprocessed text still match the original document.

use std::borrow::Cow;

use winnow::{
    ModalResult, Parser as _,
    ascii::{space0, space1},
    combinator::{alt, delimited, opt},
    token::{take_till, take_while},
};

/// A scalar line carrying a trailing parenthetical hint.
#[derive(Debug, PartialEq, Eq)]
struct Annotated<'a> {
    prefix: &'a str,
    value: &'a str,
    hint: &'a str,
}

/// Indentation, optional list marker and optional `key:` before the value.
fn line_prefix<'a>(input: &mut &'a str) -> ModalResult<&'a str> {
    (
        space0,
        opt("- "),
        opt((
            take_while(1.., |c: char| {
                !matches!(c, ':' | '#' | '"' | '\'' | '{' | '[' | '(')
            }),
            ':',
            space1,
        )),
    )
        .take()
        .verify(|prefix: &str| !prefix.trim().is_empty())
        .parse_next(input)
}

/// A double or single quoted scalar, quotes included.
fn quoted_scalar<'a>(input: &mut &'a str) -> ModalResult<&'a str> {
    alt((
        delimited('"', take_till(0.., ['"', '\\']), '"'),
        delimited('\'', take_till(0.., '\''), '\''),
    ))
    .take()
    .parse_next(input)
}

fn annotated_scalar<'a>(input: &mut &'a str) -> ModalResult<Annotated<'a>> {
    let prefix = line_prefix.parse_next(input)?;
    let value = quoted_scalar.parse_next(input)?;
    space1.parse_next(input)?;

    let rest = input.trim_end();
    let hint = rest
        .strip_prefix('(')
        .and_then(|rest| rest.strip_suffix(')'))
        .ok_or_else(|| winnow::error::ErrMode::Backtrack(Default::default()))?;
    *input = &input[input.len()..];

    Ok(Annotated {
        prefix,
        value,
        hint: hint.trim(),
    })
}

fn escape_double_quoted(text: &str) -> String {
    text.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Rewrite every annotated scalar line of `yaml`.
///
/// Returns the input unchanged (borrowed) when nothing needed rewriting.
pub(crate) fn normalize_annotations(yaml: &str) -> Cow<'_, str> {
    let mut output = String::new();
    let mut changed = false;

    for raw_line in yaml.split_inclusive('\n') {
        let content = raw_line.trim_end_matches(['\n', '\r']);
        let ending = &raw_line[content.len()..];

        let mut input = content;
        match annotated_scalar(&mut input) {
            Ok(annotated) if !content.trim_start().starts_with('#') => {
                changed = true;
                output.push_str(annotated.prefix);
                output.push_str("{value: ");
                output.push_str(annotated.value);
                output.push_str(", description: \"");
                output.push_str(&escape_double_quoted(annotated.hint));
                output.push_str("\"}");
                output.push_str(ending);
            }
            _ => output.push_str(raw_line),
        }
    }

    if changed {
        Cow::Owned(output)
    } else {
        Cow::Borrowed(yaml)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rewrites_key_value_hint() {
        let yaml = "id: biz.service.billing\nname: \"Billing\" (optional, display name)\n";
        let normalized = normalize_annotations(yaml);

        assert_eq!(
            normalized,
            "id: biz.service.billing\nname: {value: \"Billing\", description: \"optional, display name\"}\n"
        );
        let value: serde_yaml::Value = serde_yaml::from_str(&normalized).unwrap();
        assert_eq!(value["name"]["value"].as_str(), Some("Billing"));
        assert_eq!(value["name"]["description"].as_str(), Some("optional, display name"));
    }

    #[test]
    fn test_rewrites_list_items_and_keeps_indentation() {
        let yaml = "motivation.supports-goals:\n  - 'motivation.goal.a' (primary goal)\n  - \"motivation.goal.b\"\n";
        let normalized = normalize_annotations(yaml);

        assert_eq!(
            normalized,
            "motivation.supports-goals:\n  - {value: 'motivation.goal.a', description: \"primary goal\"}\n  - \"motivation.goal.b\"\n"
        );
        assert_eq!(normalized.lines().count(), yaml.lines().count());
    }

    #[test]
    fn test_hint_quotes_are_escaped() {
        let normalized = normalize_annotations("kind: \"enum\" (one of \"a\", \"b\")");
        assert_eq!(
            normalized,
            "kind: {value: \"enum\", description: \"one of \\\"a\\\", \\\"b\\\"\"}"
        );
    }

    #[test]
    fn test_leaves_plain_yaml_borrowed() {
        let yaml = "name: \"Payment (card)\"\ntitle: Billing (v2)\n# \"x\" (comment)\n";
        assert!(matches!(normalize_annotations(yaml), Cow::Borrowed(_)));
    }

    #[test]
    fn test_windows_line_endings_preserved() {
        let normalized = normalize_annotations("name: \"x\" (y)\r\nother: 1\r\n");
        assert_eq!(
            normalized,
            "name: {value: \"x\", description: \"y\"}\r\nother: 1\r\n"
        );
    }
}
