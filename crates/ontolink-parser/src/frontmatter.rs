//! YAML front matter detection.
//!
//! Front matter is a `---` delimited block on the very first line of a layer
//! document. It may name the document's layer and declare entities.

use std::ops::Range;

use ontolink_core::layer::layer_from_file_name;

/// A front matter block located in a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct FrontMatter<'a> {
    /// YAML text between the delimiters.
    pub yaml: &'a str,
    /// Byte range of the YAML text.
    pub yaml_range: Range<usize>,
    /// Byte range of the whole block, delimiters included.
    pub block_range: Range<usize>,
}

/// Locate the front matter block of `source`.
///
/// Returns `None` when the first line (ignoring a BOM) is not `---` or the
/// block is never closed or empty.
pub(crate) fn locate_front_matter(source: &str) -> Option<FrontMatter<'_>> {
    let bom_len = if source.starts_with('\u{feff}') {
        '\u{feff}'.len_utf8()
    } else {
        0
    };

    let mut offset = bom_len;
    let mut lines = source[bom_len..].split_inclusive('\n');

    let first = lines.next()?;
    if first.trim_end() != "---" {
        return None;
    }
    offset += first.len();
    let yaml_start = offset;

    for line in lines {
        let trimmed = line.trim_end();
        if trimmed == "---" || trimmed == "..." {
            if offset == yaml_start {
                return None;
            }
            return Some(FrontMatter {
                yaml: &source[yaml_start..offset],
                yaml_range: yaml_start..offset,
                block_range: 0..offset + line.len(),
            });
        }
        offset += line.len();
    }

    None
}

/// Determine the layer id of a document.
///
/// The front matter `layer` key wins; otherwise the id is derived from the
/// file name with [`layer_from_file_name`].
///
/// # Examples
///
/// ```
/// use ontolink_parser::document_layer;
///
/// let source = "---\nlayer: security\n---\n# Security";
/// assert_eq!(document_layer(source, "05-whatever.md").as_deref(), Some("security"));
/// assert_eq!(document_layer("# Business", "02-business-layer.md").as_deref(), Some("business"));
/// ```
pub fn document_layer(source: &str, file_name: &str) -> Option<String> {
    locate_front_matter(source)
        .and_then(|front| serde_yaml::from_str::<serde_yaml::Value>(front.yaml).ok())
        .and_then(|value| {
            value
                .get("layer")
                .and_then(serde_yaml::Value::as_str)
                .map(|layer| layer.trim().to_ascii_lowercase())
        })
        .filter(|layer| !layer.is_empty())
        .or_else(|| layer_from_file_name(file_name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_front_matter() {
        let source = "---\nlayer: business\ntitle: Business\n---\n# Title\nBody";
        let front = locate_front_matter(source).unwrap();

        assert_eq!(front.yaml, "layer: business\ntitle: Business\n");
        assert_eq!(&source[front.block_range.clone()], "---\nlayer: business\ntitle: Business\n---\n");
        assert_eq!(&source[front.yaml_range], front.yaml);
    }

    #[test]
    fn test_front_matter_with_bom() {
        let source = "\u{feff}---\nlayer: ux\n---\n";
        let front = locate_front_matter(source).unwrap();
        assert_eq!(front.yaml, "layer: ux\n");
    }

    #[test]
    fn test_front_matter_dots_terminator() {
        let front = locate_front_matter("---\nlayer: api\n...\n").unwrap();
        assert_eq!(front.yaml, "layer: api\n");
    }

    #[test]
    fn test_no_front_matter() {
        assert!(locate_front_matter("# Title\nBody").is_none());
        assert!(locate_front_matter("---\nlayer: api\n").is_none());
    }

    #[test]
    fn test_empty_front_matter() {
        assert!(locate_front_matter("---\n---\n").is_none());
    }

    #[test]
    fn test_document_layer_falls_back_to_file_name() {
        let source = "---\ntitle: Only a title\n---\n";
        assert_eq!(
            document_layer(source, "04-application-layer.md").as_deref(),
            Some("application")
        );
        assert_eq!(document_layer("", "notes.txt"), None);
    }
}
