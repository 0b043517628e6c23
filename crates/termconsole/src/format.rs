//! `§` formatting codes.
//!
//! Log records may carry section-sign codes (`§c`, `§l`, ...) for color and
//! style. On an ANSI-capable terminal they become escape sequences;
//! otherwise they are stripped.

use std::borrow::Cow;

/// Prefix character of a formatting code.
pub const CODE_PREFIX: char = '§';

/// Escape sequence that resets all attributes.
pub const ANSI_RESET: &str = "\x1b[m";

fn ansi_for(code: char) -> Option<&'static str> {
    let seq = match code.to_ascii_lowercase() {
        '0' => "\x1b[0;30m",
        '1' => "\x1b[0;34m",
        '2' => "\x1b[0;32m",
        '3' => "\x1b[0;36m",
        '4' => "\x1b[0;31m",
        '5' => "\x1b[0;35m",
        '6' => "\x1b[0;33m",
        '7' => "\x1b[0;37m",
        '8' => "\x1b[0;30;1m",
        '9' => "\x1b[0;34;1m",
        'a' => "\x1b[0;32;1m",
        'b' => "\x1b[0;36;1m",
        'c' => "\x1b[0;31;1m",
        'd' => "\x1b[0;35;1m",
        'e' => "\x1b[0;33;1m",
        'f' => "\x1b[0;37;1m",
        'k' => "\x1b[5m",
        'l' => "\x1b[21m",
        'm' => "\x1b[9m",
        'n' => "\x1b[4m",
        'o' => "\x1b[3m",
        'r' => ANSI_RESET,
        _ => return None,
    };
    Some(seq)
}

/// Replaces (`ansi = true`) or strips (`ansi = false`) formatting codes.
///
/// A trailing [`ANSI_RESET`] is appended when any code was replaced,
/// ahead of any trailing line terminator.
/// Unknown codes and a lone trailing `§` are left as they are. Text
/// without `§` is returned borrowed.
///
/// ```
/// use termconsole::format::convert_formatting_codes;
///
/// assert_eq!(convert_formatting_codes("§cfire", false), "fire");
/// assert_eq!(convert_formatting_codes("§cfire", true), "\x1b[0;31;1mfire\x1b[m");
/// ```
#[must_use]
pub fn convert_formatting_codes(text: &str, ansi: bool) -> Cow<'_, str> {
    if !text.contains(CODE_PREFIX) {
        return Cow::Borrowed(text);
    }

    let mut out = String::with_capacity(text.len() + 16);
    let mut replaced = false;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if c != CODE_PREFIX {
            out.push(c);
            continue;
        }
        match chars.peek().copied().and_then(ansi_for) {
            Some(seq) => {
                chars.next();
                if ansi {
                    out.push_str(seq);
                    replaced = true;
                }
            }
            None => out.push(c),
        }
    }

    if replaced {
        // The reset belongs to the record, not to its line break.
        let body = out.trim_end_matches(['\r', '\n']).len();
        out.insert_str(body, ANSI_RESET);
    }
    Cow::Owned(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replaces_colors_and_styles() {
        assert_eq!(
            convert_formatting_codes("abcabc§cHello §9§lWorld!", true),
            "abcabc\x1b[0;31;1mHello \x1b[0;34;1m\x1b[21mWorld!\x1b[m"
        );
    }

    #[test]
    fn strips_without_ansi() {
        assert_eq!(
            convert_formatting_codes("abcabc§cHello §9§lWorld!", false),
            "abcabcHello World!"
        );
    }

    #[test]
    fn codes_are_case_insensitive() {
        assert_eq!(
            convert_formatting_codes("§AOK§R", true),
            "\x1b[0;32;1mOK\x1b[m\x1b[m"
        );
    }

    #[test]
    fn reset_goes_before_trailing_newline() {
        assert_eq!(
            convert_formatting_codes("§cWARN: disk full\n", true),
            "\x1b[0;31;1mWARN: disk full\x1b[m\n"
        );
        assert_eq!(
            convert_formatting_codes("§aok\r\n", true),
            "\x1b[0;32;1mok\x1b[m\r\n"
        );
        assert_eq!(convert_formatting_codes("§aok\n", false), "ok\n");
    }

    #[test]
    fn unknown_and_dangling_codes_untouched() {
        assert_eq!(convert_formatting_codes("50§ off §", true), "50§ off §");
        assert_eq!(convert_formatting_codes("§z", false), "§z");
    }

    #[test]
    fn plain_text_is_borrowed() {
        assert!(matches!(
            convert_formatting_codes("nothing here", true),
            Cow::Borrowed(_)
        ));
    }
}
