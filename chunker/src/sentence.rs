/// Characters that end a sentence when followed by whitespace.
const SENTENCE_DELIMITERS: &[char] = &['.', '!', '?'];

/// Split `input` into trimmed, non-empty sentences.
///
/// A delimiter only ends a sentence when the next char is whitespace, so `1.5`, `e.g.x`
/// and `Wait!?` stay intact. Abbreviations followed by a space are still split.
pub(super) fn sentences(input: &str) -> Vec<&str> {
    let mut out = vec![];
    let mut start = 0;
    let mut chars = input.char_indices().peekable();

    while let Some((i, ch)) = chars.next() {
        if !SENTENCE_DELIMITERS.contains(&ch) {
            continue;
        }

        let Some((_, next)) = chars.peek() else {
            break;
        };

        if !next.is_whitespace() {
            continue;
        }

        let end = i + ch.len_utf8();
        push_trimmed(&mut out, &input[start..end]);
        start = end;
    }

    push_trimmed(&mut out, &input[start..]);

    out
}

/// Split `input` on blank lines. Lines containing only whitespace count as blank.
pub(super) fn paragraphs(input: &str) -> Vec<&str> {
    let mut out = vec![];
    let mut start = 0;
    let mut offset = 0;

    for line in input.split_inclusive('\n') {
        if line.trim().is_empty() {
            push_trimmed(&mut out, &input[start..offset]);
            start = offset + line.len();
        }
        offset += line.len();
    }

    push_trimmed(&mut out, &input[start..]);

    out
}

#[inline(always)]
fn push_trimmed<'a>(out: &mut Vec<&'a str>, s: &'a str) {
    let s = s.trim();
    if !s.is_empty() {
        out.push(s);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_delimiter_followed_by_whitespace() {
        let input = "This is a sentence. Is it?  It is!\nAnother one";
        assert_eq!(
            vec!["This is a sentence.", "Is it?", "It is!", "Another one"],
            sentences(input)
        );
    }

    #[test]
    fn keeps_delimiters_inside_words() {
        let input = "Version 1.5 is out at chonk.rs today. Wait!? Ok.";
        assert_eq!(
            vec!["Version 1.5 is out at chonk.rs today.", "Wait!?", "Ok."],
            sentences(input)
        );
    }

    #[test]
    fn no_delimiters_is_one_sentence() {
        assert_eq!(vec!["just words here"], sentences("  just words here "));
        assert!(sentences("   ").is_empty());
    }

    #[test]
    fn splits_paragraphs_on_blank_lines() {
        let input = "First line\nstill first\n\n\nSecond\n   \nThird\r\n\r\nFourth";
        assert_eq!(
            vec!["First line\nstill first", "Second", "Third", "Fourth"],
            paragraphs(input)
        );
    }
}
