//! Cheap textual scans over unexpanded expressions: where the `@(...)` item captures are, and
//! which metadata a piece of text references outside of them.

use crate::errors::{ItemEvalError, ItemEvalResult};
use crate::item::{ItemType, is_reserved_metadata};
use indexmap::IndexSet;
use once_cell::sync::Lazy;
use regex::Regex;
use std::ops::Range;

static ITEM_EXPRESSION_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^\s*(?P<type>[A-Za-z_][A-Za-z0-9_\-]*)\s*(?:->\s*'(?P<transform>[^']*)')?\s*(?:,\s*'(?P<separator>[^']*)')?\s*$",
    )
    .unwrap()
});

pub(crate) static METADATA_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"%\(\s*(?:(?P<qualifier>[A-Za-z_][A-Za-z0-9_\-]*)\s*\.\s*)?(?P<name>[A-Za-z_][A-Za-z0-9_\-]*)\s*\)",
    )
    .unwrap()
});

/// An `@(Type)`, `@(Type, 'sep')` or `@(Type->'transform')` expression found in some text.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ItemExpressionCapture {
    pub item_type: ItemType,
    pub transform: Option<String>,
    pub separator: Option<String>,
    /// The whole `@(...)` text
    pub text: String,
    pub range: Range<usize>,
}

impl ItemExpressionCapture {
    pub fn parse<S: AsRef<str>>(text: S) -> ItemEvalResult<ItemExpressionCapture> {
        let text = text.as_ref();
        match item_captures(text)?.pop() {
            Some(capture) if capture.range == (0..text.len()) => Ok(capture),
            _ => Err(ItemEvalError::InvalidItemExpression {
                text: text.to_string(),
            }
            .into()),
        }
    }
}

// Index of the ')' closing an expression whose body starts at `from`. Quoted text is opaque.
fn find_closing_paren(text: &str, from: usize) -> Option<usize> {
    let mut depth = 0u32;
    let mut in_quote = false;
    for (i, c) in text[from..].char_indices() {
        match c {
            '\'' => in_quote = !in_quote,
            '(' if !in_quote => depth += 1,
            ')' if !in_quote => {
                if depth == 0 {
                    return Some(from + i);
                }
                depth -= 1;
            }
            _ => {}
        }
    }
    None
}

pub fn item_captures<S: AsRef<str>>(text: S) -> ItemEvalResult<Vec<ItemExpressionCapture>> {
    let text = text.as_ref();
    let mut ret = vec![];
    let mut pos = 0;

    while let Some(offset) = text[pos..].find("@(") {
        let start = pos + offset;
        let end = find_closing_paren(text, start + 2).ok_or_else(|| {
            ItemEvalError::UnterminatedExpression {
                text: text.to_string(),
            }
        })?;

        let whole = &text[start..=end];
        let caps = ITEM_EXPRESSION_REGEX
            .captures(&text[start + 2..end])
            .ok_or_else(|| ItemEvalError::InvalidItemExpression {
                text: whole.to_string(),
            })?;

        ret.push(ItemExpressionCapture {
            item_type: ItemType::from(&caps["type"]),
            transform: caps.name("transform").map(|m| m.as_str().to_string()),
            separator: caps.name("separator").map(|m| m.as_str().to_string()),
            text: whole.to_string(),
            range: start..end + 1,
        });
        pos = end + 1;
    }

    Ok(ret)
}

#[derive(Debug, Eq, PartialEq)]
pub enum Segment<'t> {
    Text(&'t str),
    Item(&'t ItemExpressionCapture),
}

/// Interleave the plain text between captures with the captures themselves.
pub fn segments<'t>(text: &'t str, captures: &'t [ItemExpressionCapture]) -> Vec<Segment<'t>> {
    let mut ret = vec![];
    let mut last = 0;
    for capture in captures {
        if capture.range.start > last {
            ret.push(Segment::Text(&text[last..capture.range.start]));
        }
        ret.push(Segment::Item(capture));
        last = capture.range.end;
    }
    if last < text.len() {
        ret.push(Segment::Text(&text[last..]));
    }
    ret
}

#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct MetadataReference {
    pub item_type: Option<ItemType>,
    pub name: String,
}

/// Bare metadata references, split into built-in and custom names.
#[derive(Clone, Debug, Default)]
pub struct MetadataReferences {
    pub builtin: IndexSet<MetadataReference>,
    pub custom: IndexSet<MetadataReference>,
}

impl MetadataReferences {
    pub fn is_empty(&self) -> bool {
        self.builtin.is_empty() && self.custom.is_empty()
    }

    pub fn has_builtin(&self) -> bool {
        !self.builtin.is_empty()
    }

    pub fn has_custom(&self) -> bool {
        !self.custom.is_empty()
    }
}

/// Collect `%(Name)` and `%(Type.Name)` references that appear outside of item captures. Metadata
/// used inside a transform such as `@(A->'%(Filename)')` belongs to the transform and is not bare.
pub fn referenced_metadata<'a, I>(values: I) -> ItemEvalResult<MetadataReferences>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut ret = MetadataReferences::default();

    for value in values {
        let captures = item_captures(value)?;
        for segment in segments(value, &captures) {
            let Segment::Text(text) = segment else {
                continue;
            };

            for caps in METADATA_REGEX.captures_iter(text) {
                let reference = MetadataReference {
                    item_type: caps.name("qualifier").map(|m| ItemType::from(m.as_str())),
                    name: caps["name"].to_string(),
                };

                if is_reserved_metadata(&reference.name) {
                    ret.builtin.insert(reference);
                } else {
                    ret.custom.insert(reference);
                }
            }
        }
    }

    Ok(ret)
}

#[cfg(test)]
mod test {
    use crate::item::ItemType;
    use crate::shredder::{
        ItemExpressionCapture, MetadataReference, Segment, item_captures, referenced_metadata,
        segments,
    };
    use pretty_assertions::assert_eq;

    #[test]
    fn captures() {
        let text = "a;@(Compile);@(Content->'%(Filename).out', ' ');@( None , ',')";
        let captures = item_captures(text).unwrap();
        assert_eq!(captures.len(), 3);

        assert_eq!(captures[0].item_type, ItemType::from("Compile"));
        assert_eq!(captures[0].transform, None);
        assert_eq!(&text[captures[0].range.clone()], "@(Compile)");

        assert_eq!(captures[1].item_type, ItemType::from("Content"));
        assert_eq!(captures[1].transform.as_deref(), Some("%(Filename).out"));
        assert_eq!(captures[1].separator.as_deref(), Some(" "));

        assert_eq!(captures[2].item_type, ItemType::from("None"));
        assert_eq!(captures[2].separator.as_deref(), Some(","));
    }

    #[test]
    fn parse_whole_capture() {
        let capture = ItemExpressionCapture::parse("@(Compile)").unwrap();
        assert_eq!(capture.text, "@(Compile)");
        assert!(ItemExpressionCapture::parse("x@(Compile)").is_err());
    }

    #[test]
    fn malformed_captures() {
        let err = item_captures("@(Compile").unwrap_err();
        assert!(err.to_string().contains("Unterminated"));

        let err = item_captures("@(Com pile)").unwrap_err();
        assert!(err.to_string().contains("Malformed"));
    }

    #[test]
    fn segments_interleave() {
        let text = "x@(A)y";
        let captures = item_captures(text).unwrap();
        let segs = segments(text, &captures);
        assert_eq!(
            segs,
            vec![
                Segment::Text("x"),
                Segment::Item(&captures[0]),
                Segment::Text("y")
            ]
        );
    }

    #[test]
    fn bare_metadata() {
        let refs = referenced_metadata([
            "%(Filename).tlb",
            "'%(Compile.Link)' == ''",
            "@(Other->'%(Culture)')",
            "%3B escaped",
        ])
        .unwrap();

        assert_eq!(
            refs.builtin.iter().collect::<Vec<_>>(),
            vec![&MetadataReference {
                item_type: None,
                name: "Filename".into()
            }]
        );
        assert_eq!(
            refs.custom.iter().collect::<Vec<_>>(),
            vec![&MetadataReference {
                item_type: Some("Compile".into()),
                name: "Link".into()
            }]
        );
    }

    #[test]
    fn no_metadata() {
        let refs = referenced_metadata(["fixed", "$(Configuration)", ""]).unwrap();
        assert!(refs.is_empty());
        assert!(!refs.has_builtin());
        assert!(!refs.has_custom());
    }
}
