use itertools::Itertools;
use std::ops::Range;

/// Split an item specification such as `a.cs; @(Other->'%(Filename)'); src/**/*.cs` into the
/// byte ranges of its fragments. Semicolons nested inside `$()`, `@()` or `%()` do not split, and
/// the surrounding whitespace of each fragment is trimmed. Empty fragments are dropped.
pub fn split_item_spec(s: &str) -> Vec<Range<usize>> {
    struct SplitItemSpecInternalItem {
        depth: u32,
        char_pos: usize,
        char: char,
    }

    #[derive(Default)]
    struct SplitItemSpecState {
        previous_char: Option<char>,
        depth: u32,
    }

    let iter = s
        .char_indices()
        // This `scan` tracks how deep we are inside $(), @() or %() expressions
        .scan(
            SplitItemSpecState::default(),
            |state: &mut SplitItemSpecState, (char_pos, char)| {
                match char {
                    '(' if matches!(state.previous_char, Some('$' | '@' | '%')) => {
                        state.depth += 1
                    }
                    '(' if state.depth > 0 => state.depth += 1,
                    ')' => state.depth = state.depth.saturating_sub(1),
                    _ => {}
                }

                state.previous_char = Some(char);

                Some(SplitItemSpecInternalItem {
                    depth: state.depth,
                    char_pos,
                    char,
                })
            },
        )
        // A semicolon outside of any expression is what separates each fragment
        .chunk_by(|item| item.char == ';' && item.depth == 0);

    let mut ret = vec![];
    for (is_separator, group) in &iter {
        if is_separator {
            continue;
        }

        let group = group.collect::<Vec<_>>();
        let (Some(first), Some(last)) = (
            group.iter().find(|item| !item.char.is_whitespace()),
            group.iter().rfind(|item| !item.char.is_whitespace()),
        ) else {
            continue;
        };

        ret.push(first.char_pos..last.char_pos + last.char.len_utf8());
    }
    ret
}
