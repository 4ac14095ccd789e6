//! Field format checks for link target values.

use winnow::{
    ModalResult, Parser as _,
    combinator::{repeat, separated},
    token::take_while,
};

use ontolink_core::link_type::{LinkFormat, LinkType};

fn hex_group<'a>(count: usize) -> impl FnMut(&mut &'a str) -> ModalResult<&'a str> {
    move |input: &mut &'a str| take_while(count, |c: char| c.is_ascii_hexdigit()).parse_next(input)
}

/// `8-4-4-4-12` hexadecimal groups.
fn uuid(input: &mut &str) -> ModalResult<()> {
    (
        hex_group(8),
        '-',
        hex_group(4),
        '-',
        hex_group(4),
        '-',
        hex_group(4),
        '-',
        hex_group(12),
    )
        .void()
        .parse_next(input)
}

fn kebab_word(input: &mut &str) -> ModalResult<()> {
    take_while(1.., |c: char| c.is_ascii_lowercase() || c.is_ascii_digit())
        .void()
        .parse_next(input)
}

fn kebab_segment(input: &mut &str) -> ModalResult<()> {
    kebab_word.parse_next(input)?;
    repeat(0.., ('-', kebab_word)).parse_next(input)
}

/// Dot-separated kebab-case segments, e.g. `biz.service.order-intake`.
fn identifier(input: &mut &str) -> ModalResult<()> {
    separated(1.., kebab_segment, '.').parse_next(input)
}

pub(crate) fn is_uuid(value: &str) -> bool {
    uuid.parse(value).is_ok()
}

pub(crate) fn is_identifier(value: &str) -> bool {
    identifier.parse(value).is_ok()
}

/// Why `value` does not satisfy the link's format, if it does not.
pub(crate) fn format_violation(link: &LinkType, value: &str) -> Option<String> {
    match link.format()? {
        LinkFormat::Uuid if !is_uuid(value) => Some(format!(
            "`{value}` is not a UUID (expected 8-4-4-4-12 hexadecimal digits)"
        )),
        LinkFormat::Identifier if !is_identifier(value) => Some(format!(
            "`{value}` is not an identifier (expected dot-separated kebab-case segments)"
        )),
        LinkFormat::Enum
            if !link.enum_values().is_empty()
                && !link.enum_values().iter().any(|allowed| allowed == value) =>
        {
            Some(format!(
                "`{value}` is not one of {}",
                link.enum_values().join(", ")
            ))
        }
        _ => None,
    }
}
