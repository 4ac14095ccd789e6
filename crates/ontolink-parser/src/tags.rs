//! Scanner for the XML-like tags embedded in layer documents.
//!
//! Only `<element>`, `<relationship>` and `<property>` tags are recognized
//! (names compare case-insensitively). Every other tag, HTML comments and
//! inline code spans are skipped. A recognized tag that cannot be read yields
//! a `W001` diagnostic and scanning resumes right after its name.

use std::{borrow::Cow, fmt, ops::Range};

use winnow::{
    ModalResult, Parser as _,
    ascii::{multispace0, multispace1, space0},
    combinator::{alt, delimited, preceded, repeat, separated_pair},
    token::{take_till, take_while},
};

use crate::{
    error::{Diagnostic, ErrorCode},
    span::Span,
};

/// The recognized tag names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TagKind {
    Element,
    Relationship,
    Property,
}

impl TagKind {
    fn from_name(name: &str) -> Option<Self> {
        if name.eq_ignore_ascii_case("element") {
            Some(TagKind::Element)
        } else if name.eq_ignore_ascii_case("relationship") {
            Some(TagKind::Relationship)
        } else if name.eq_ignore_ascii_case("property") {
            Some(TagKind::Property)
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TagKind::Element => "element",
            TagKind::Relationship => "relationship",
            TagKind::Property => "property",
        }
    }
}

impl fmt::Display for TagKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether a tag opens, closes, or opens and closes itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TagForm {
    Open,
    SelfClosing,
    Close,
}

/// A recognized tag with its raw attributes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Tag<'a> {
    pub kind: TagKind,
    pub form: TagForm,
    pub attributes: Vec<(&'a str, &'a str)>,
    pub span: Span,
}

impl<'a> Tag<'a> {
    /// Value of attribute `name` with character references decoded.
    ///
    /// Attribute names compare case-insensitively. Blank values count as absent.
    pub fn attribute(&self, name: &str) -> Option<Cow<'a, str>> {
        self.attributes
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| decode_entities(value.trim()))
            .filter(|value| !value.is_empty())
    }
}

/// Decode the five predefined XML character references.
pub(crate) fn decode_entities(text: &str) -> Cow<'_, str> {
    if !text.contains('&') {
        return Cow::Borrowed(text);
    }
    Cow::Owned(
        text.replace("&lt;", "<")
            .replace("&gt;", ">")
            .replace("&quot;", "\"")
            .replace("&apos;", "'")
            .replace("&amp;", "&"),
    )
}

fn name<'a>(input: &mut &'a str) -> ModalResult<&'a str> {
    take_while(1.., |c: char| {
        c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | ':' | '.')
    })
    .parse_next(input)
}

fn quoted_value<'a>(input: &mut &'a str) -> ModalResult<&'a str> {
    alt((
        delimited('"', take_till(0.., '"'), '"'),
        delimited('\'', take_till(0.., '\''), '\''),
    ))
    .parse_next(input)
}

fn attribute<'a>(input: &mut &'a str) -> ModalResult<(&'a str, &'a str)> {
    separated_pair(name, (multispace0, '=', multispace0), quoted_value).parse_next(input)
}

/// Attributes and terminator of an opening tag, after its name.
fn open_tag_rest<'a>(input: &mut &'a str) -> ModalResult<(Vec<(&'a str, &'a str)>, TagForm)> {
    let attributes: Vec<_> = repeat(0.., preceded(multispace1, attribute)).parse_next(input)?;
    multispace0.parse_next(input)?;
    let form = alt((
        "/>".value(TagForm::SelfClosing),
        ">".value(TagForm::Open),
    ))
    .parse_next(input)?;
    Ok((attributes, form))
}

/// Terminator of a closing tag, after its name.
fn close_tag_rest(input: &mut &str) -> ModalResult<()> {
    (space0, '>').void().parse_next(input)
}

/// Lazy iterator over the recognized tags of a document.
///
/// Byte ranges registered as skipped (front matter, YAML fences) are never
/// scanned.
pub(crate) struct TagScanner<'a> {
    source: &'a str,
    position: usize,
    skip: Vec<Range<usize>>,
}

impl<'a> TagScanner<'a> {
    pub fn new(source: &'a str, mut skip: Vec<Range<usize>>) -> Self {
        skip.sort_by_key(|range| range.start);
        Self {
            source,
            position: 0,
            skip,
        }
    }

    fn skipped_range_end(&self, offset: usize) -> Option<usize> {
        self.skip
            .iter()
            .find(|range| range.contains(&offset))
            .map(|range| range.end)
    }

    /// End of the inline code span starting at `start`, if it closes on the same line.
    fn code_span_end(&self, start: usize) -> usize {
        let rest = &self.source[start..];
        let ticks = rest.len() - rest.trim_start_matches('`').len();
        let line_rest = &rest[ticks..];
        let line_rest = &line_rest[..line_rest.find('\n').unwrap_or(line_rest.len())];
        let fence = &rest[..ticks];

        match line_rest.find(fence) {
            Some(close) => start + ticks + close + ticks,
            None => start + ticks,
        }
    }

    /// Try to read a recognized tag at `start` (which holds `<`).
    ///
    /// Returns `None` for tags that are not recognized; the caller moves on.
    fn read_tag(&self, start: usize) -> Option<Result<(Tag<'a>, usize), (Diagnostic, usize)>> {
        let mut input = &self.source[start + 1..];
        let closing = input.starts_with('/');
        if closing {
            input = &input[1..];
        }

        let tag_name = name(&mut input).ok()?;
        let kind = TagKind::from_name(tag_name)?;
        let name_end = self.source.len() - input.len();

        let result = if closing {
            close_tag_rest(&mut input).map(|()| (Vec::new(), TagForm::Close))
        } else {
            open_tag_rest(&mut input)
        };

        match result {
            Ok((attributes, form)) => {
                let end = self.source.len() - input.len();
                let tag = Tag {
                    kind,
                    form,
                    attributes,
                    span: Span::new(start..end),
                };
                Some(Ok((tag, end)))
            }
            Err(_) => {
                let diagnostic = Diagnostic::new(ErrorCode::W001, format!("malformed `<{kind}>` tag"))
                    .with_label(Span::to_line_end(self.source, start), "tag starts here")
                    .with_help(
                        "quote every attribute value and close the tag with `>` or `/>`",
                    );
                Some(Err((diagnostic, name_end)))
            }
        }
    }
}

impl<'a> Iterator for TagScanner<'a> {
    type Item = Result<Tag<'a>, Diagnostic>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let found = self.source.get(self.position..)?.find(['<', '`'])?;
            let start = self.position + found;

            if let Some(end) = self.skipped_range_end(start) {
                self.position = end.max(start + 1);
                continue;
            }

            let rest = &self.source[start..];
            if rest.starts_with('`') {
                self.position = self.code_span_end(start);
                continue;
            }
            if rest.starts_with("<!--") {
                self.position = rest
                    .find("-->")
                    .map_or(self.source.len(), |idx| start + idx + "-->".len());
                continue;
            }

            match self.read_tag(start) {
                None => self.position = start + 1,
                Some(Ok((tag, end))) => {
                    self.position = end;
                    return Some(Ok(tag));
                }
                Some(Err((diagnostic, resume))) => {
                    self.position = resume;
                    return Some(Err(diagnostic));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scan(source: &str) -> Vec<Result<Tag<'_>, Diagnostic>> {
        TagScanner::new(source, Vec::new()).collect()
    }

    #[test]
    fn test_self_closing_relationship() {
        let source = r#"Text <relationship type="Serving" source="a" target="b"/> more"#;
        let tags = scan(source);

        assert_eq!(tags.len(), 1);
        let tag = tags[0].as_ref().unwrap();
        assert_eq!(tag.kind, TagKind::Relationship);
        assert_eq!(tag.form, TagForm::SelfClosing);
        assert_eq!(tag.attribute("type").as_deref(), Some("Serving"));
        assert_eq!(tag.attribute("TARGET").as_deref(), Some("b"));
        assert_eq!(&source[tag.span.start()..tag.span.end()], &source[5..57]);
    }

    #[test]
    fn test_element_open_and_close() {
        let source = "<Element id='biz.actor.customer'\n   type=\"actor\">\n</element >";
        let tags: Vec<_> = scan(source).into_iter().map(Result::unwrap).collect();

        assert_eq!(tags.len(), 2);
        assert_eq!(tags[0].kind, TagKind::Element);
        assert_eq!(tags[0].form, TagForm::Open);
        assert_eq!(tags[0].attribute("id").as_deref(), Some("biz.actor.customer"));
        assert_eq!(tags[1].form, TagForm::Close);
    }

    #[test]
    fn test_unrecognized_tags_are_skipped() {
        let source = "<details><summary>x</summary></details> a < b <br/> <elements/>";
        assert!(scan(source).is_empty());
    }

    #[test]
    fn test_malformed_tag_reports_and_continues() {
        let source = "<relationship type=Serving source=\"a\"/>\n<property key=\"x.y\" value=\"z\"/>";
        let tags = scan(source);

        assert_eq!(tags.len(), 2);
        let diagnostic = tags[0].as_ref().unwrap_err();
        assert_eq!(diagnostic.code(), ErrorCode::W001);
        assert_eq!(diagnostic.primary_span(), Some(Span::new(0..39)));
        assert_eq!(tags[1].as_ref().unwrap().kind, TagKind::Property);
    }

    #[test]
    fn test_unterminated_tag_at_end_of_document() {
        let tags = scan("<relationship type=\"Serving\"");
        assert_eq!(tags.len(), 1);
        assert!(tags[0].is_err());
    }

    #[test]
    fn test_comments_code_spans_and_skip_ranges() {
        let source = "<!-- <relationship type=\"a\"/> -->\nUse `<relationship/>` tags.\n<property key=\"a.b\"/>";
        let tags = scan(source);
        assert_eq!(tags.len(), 1);
        assert_eq!(tags[0].as_ref().unwrap().kind, TagKind::Property);

        let skipped = TagScanner::new(source, vec![0..source.len()]).count();
        assert_eq!(skipped, 0);
    }

    #[test]
    fn test_code_fence_line_does_not_hide_following_tags() {
        let source = "```xml\n<element id=\"a\" type=\"b\"/>\n```\n";
        let tags = scan(source);
        assert_eq!(tags.len(), 1);
        assert_eq!(tags[0].as_ref().unwrap().kind, TagKind::Element);
    }

    #[test]
    fn test_entities_decoded_and_blank_values_absent() {
        let source = r#"<property key="data-model.note" value="a &amp; b" source=" "/>"#;
        let tags = scan(source);
        let tag = tags[0].as_ref().unwrap();

        assert_eq!(tag.attribute("value").as_deref(), Some("a & b"));
        assert_eq!(tag.attribute("source"), None);
    }
}
