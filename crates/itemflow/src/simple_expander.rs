use crate::errors::{ItemEvalError, ItemEvalResult};
use crate::expander::{ExpansionContext, Expander, MetadataScope};
use crate::item::{Item, get_metadata_in};
use crate::shredder::{ItemExpressionCapture, Segment, item_captures, segments};
use itemflow_util::split::replace_all;
use itertools::Itertools;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};

static EXPANSION_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"\$\(\s*(?P<property>[A-Za-z_][A-Za-z0-9_\-]*)\s*\)|%\(\s*(?:(?P<qualifier>[A-Za-z_][A-Za-z0-9_\-]*)\s*\.\s*)?(?P<metadata>[A-Za-z_][A-Za-z0-9_\-]*)\s*\)",
    )
    .unwrap()
});

static UNTERMINATED_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"[$%]\([^)]*$").unwrap());

static COMPARISON_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^'(?P<lhs>[^']*)'\s*(?P<op>==|!=)\s*'(?P<rhs>[^']*)'$").unwrap()
});

/// A small, regex-driven expression engine:
///
/// - `$(Name)` properties (missing properties expand to nothing)
/// - `%(Name)` and `%(Type.Name)` metadata from the active [`MetadataScope`]
/// - `@(Type)`, `@(Type, 'sep')` and `@(Type->'transform')` item lists
/// - conditions built from `'a' == 'b'`, `'a' != 'b'`, `true` and `false`, joined with `and`/`or`
///
/// Expansion is a single pass, so expanded values are never expanded again and `%XX` escapes
/// survive untouched.
#[derive(Clone, Copy, Debug, Default)]
pub struct SimpleExpander;

impl SimpleExpander {
    pub fn new() -> Self {
        SimpleExpander
    }

    fn expand_text(
        &self,
        text: &str,
        ctx: &ExpansionContext,
        properties_only: bool,
    ) -> ItemEvalResult<String> {
        if UNTERMINATED_REGEX.is_match(text) {
            return Err(ItemEvalError::UnterminatedExpression {
                text: text.to_string(),
            }
            .into());
        }

        replace_all(
            &EXPANSION_REGEX,
            text,
            |caps: &Captures| -> ItemEvalResult<String> {
                if let Some(property) = caps.name("property") {
                    return Ok(ctx
                        .properties
                        .iter()
                        .find(|(name, _)| name.eq_ignore_ascii_case(property.as_str()))
                        .map(|(_, value)| value.clone())
                        .unwrap_or_default());
                }

                if properties_only {
                    return Ok(caps[0].to_string());
                }

                let name = &caps["metadata"];
                let qualifier = caps.name("qualifier").map(|m| m.as_str());
                Ok(match ctx.metadata {
                    MetadataScope::None => caps[0].to_string(),
                    MetadataScope::Item(item) => {
                        if qualifier.is_some_and(|q| !q.eq_ignore_ascii_case(item.item_type().as_str())) {
                            String::new()
                        } else {
                            item.metadata_value(name).unwrap_or_default()
                        }
                    }
                    MetadataScope::Table(table) => get_metadata_in(table, name)
                        .map(String::from)
                        .unwrap_or_default(),
                })
            },
        )
    }

    fn evaluate_atom(
        &self,
        atom: &str,
        condition: &str,
        ctx: &ExpansionContext,
    ) -> ItemEvalResult<bool> {
        let atom = atom.trim();
        if let Some(caps) = COMPARISON_REGEX.captures(atom) {
            let lhs = self.expand_to_string(&caps["lhs"], ctx)?;
            let rhs = self.expand_to_string(&caps["rhs"], ctx)?;
            let equal = lhs.eq_ignore_ascii_case(&rhs);
            return Ok(match &caps["op"] {
                "==" => equal,
                _ => !equal,
            });
        }

        let value = match atom.strip_prefix('\'').and_then(|a| a.strip_suffix('\'')) {
            Some(quoted) => self.expand_to_string(quoted, ctx)?,
            None => atom.to_string(),
        };

        if value.eq_ignore_ascii_case("true") {
            Ok(true)
        } else if value.eq_ignore_ascii_case("false") {
            Ok(false)
        } else {
            Err(ItemEvalError::ConditionSyntax {
                condition: condition.to_string(),
            }
            .into())
        }
    }
}

// Split at a whitespace-delimited keyword (case-insensitive) that is not inside quotes.
fn split_keyword<'t>(text: &'t str, keyword: &str) -> Vec<&'t str> {
    let bytes = text.as_bytes();
    let mut ret = vec![];
    let mut in_quote = false;
    let mut last = 0;
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'\'' => in_quote = !in_quote,
            b if !in_quote && b.is_ascii_whitespace() => {
                let rest = &text[i + 1..];
                let is_keyword = rest
                    .get(..keyword.len())
                    .is_some_and(|word| word.eq_ignore_ascii_case(keyword))
                    && rest
                        .as_bytes()
                        .get(keyword.len())
                        .is_some_and(|b| b.is_ascii_whitespace());
                if is_keyword {
                    ret.push(&text[last..i]);
                    last = i + keyword.len() + 2;
                    i = last;
                    continue;
                }
            }
            _ => {}
        }
        i += 1;
    }

    ret.push(&text[last..]);
    ret
}

impl Expander for SimpleExpander {
    fn expand_properties(&self, expression: &str, ctx: &ExpansionContext) -> ItemEvalResult<String> {
        let captures = item_captures(expression)?;
        segments(expression, &captures)
            .into_iter()
            .map(|segment| match segment {
                Segment::Text(text) => self.expand_text(text, ctx, true),
                Segment::Item(capture) => Ok(capture.text.clone()),
            })
            .collect()
    }

    fn expand_to_string(&self, expression: &str, ctx: &ExpansionContext) -> ItemEvalResult<String> {
        let captures = item_captures(expression)?;
        let mut ret = String::with_capacity(expression.len());

        for segment in segments(expression, &captures) {
            match segment {
                Segment::Text(text) => ret.push_str(&self.expand_text(text, ctx, false)?),
                Segment::Item(capture) => {
                    let items = self.expand_capture_to_items(capture, ctx, false)?;
                    let separator = capture.separator.as_deref().unwrap_or(";");
                    ret.push_str(&items.iter().map(Item::identity).join(separator));
                }
            }
        }

        Ok(ret)
    }

    fn expand_capture_to_items(
        &self,
        capture: &ItemExpressionCapture,
        ctx: &ExpansionContext,
        include_null_results: bool,
    ) -> ItemEvalResult<Vec<Item>> {
        let items = ctx.lookup_items(&capture.item_type)?;

        let Some(transform) = &capture.transform else {
            return Ok(items
                .into_iter()
                .filter(|item| include_null_results || !item.identity().is_empty())
                .collect());
        };

        let mut ret = Vec::with_capacity(items.len());
        for item in &items {
            let item_ctx = ctx.with_metadata(MetadataScope::Item(item));
            let value = self.expand_text(transform, &item_ctx, false)?;
            if value.is_empty() && !include_null_results {
                continue;
            }
            ret.push(item.with_identity(value));
        }

        Ok(ret)
    }

    fn evaluate_condition(&self, condition: &str, ctx: &ExpansionContext) -> ItemEvalResult<bool> {
        let trimmed = condition.trim();
        if trimmed.is_empty() {
            return Ok(true);
        }

        for disjunct in split_keyword(trimmed, "or") {
            let mut all = true;
            for conjunct in split_keyword(disjunct, "and") {
                if !self.evaluate_atom(conjunct, condition, ctx)? {
                    all = false;
                    break;
                }
            }
            if all {
                return Ok(true);
            }
        }

        Ok(false)
    }
}
