use std::borrow::Cow;

use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

const ELLIPSIS: &str = "...";
const ELLIPSIS_WIDTH: usize = 3;

/// Display width of a string in terminal columns (CJK and emoji count as 2).
pub fn display_width(s: &str) -> usize {
    UnicodeWidthStr::width(s)
}

/// Fit a string into `max_width` columns, appending "..." when it had to be cut.
///
/// Widths of 3 or less are too narrow for an ellipsis; the string is simply
/// cut at the last character that fits.
///
/// ```
/// use dramabox::util::fit_to_width;
///
/// assert_eq!(fit_to_width("Short", 10), "Short");
/// assert_eq!(fit_to_width("The CEO's Secret Wife", 12), "The CEO's...");
/// assert_eq!(fit_to_width("Drama", 2), "Dr");
/// ```
pub fn fit_to_width(s: &str, max_width: usize) -> Cow<'_, str> {
    if display_width(s) <= max_width {
        return Cow::Borrowed(s);
    }

    let (budget, suffix) = if max_width <= ELLIPSIS_WIDTH {
        (max_width, "")
    } else {
        (max_width - ELLIPSIS_WIDTH, ELLIPSIS)
    };

    let mut used = 0;
    let mut cut = 0;
    for (idx, c) in s.char_indices() {
        let w = UnicodeWidthChar::width(c).unwrap_or(0);
        if used + w > budget {
            break;
        }
        used += w;
        cut = idx + c.len_utf8();
    }

    Cow::Owned(format!("{}{}", &s[..cut], suffix))
}

/// Remove control characters (including ESC) from backend-provided text
/// before it is written to a terminal. Tabs and newlines are kept.
pub fn sanitize_for_terminal(s: &str) -> Cow<'_, str> {
    let unsafe_char = |c: char| c.is_control() && c != '\t' && c != '\n';
    if !s.chars().any(unsafe_char) {
        return Cow::Borrowed(s);
    }
    Cow::Owned(s.chars().filter(|&c| !unsafe_char(c)).collect())
}
