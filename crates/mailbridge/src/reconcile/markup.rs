use std::sync::LazyLock;

use regex::Regex;

static RE_LINE_BREAK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new("\r\n|[\r\n\u{2028}\u{2029}]").unwrap());

/// Long underscore runs are signature separators in plain-text mail.
static RE_RULE: LazyLock<Regex> = LazyLock::new(|| Regex::new("_{10,}").unwrap());

const BREAK: &str = "<br>";

/// Turns a plain-text body into the destination's HTML description.
///
/// Markup characters are escaped and every line or paragraph separator
/// becomes a single `<br>`, so no raw separator runs reach the destination.
///
/// ```
/// use mailbridge::reconcile::to_markup;
///
/// assert_eq!(to_markup("a < b\r\nc"), "a &lt; b<br>c");
/// ```
pub fn to_markup(body: &str) -> String {
    let escaped = body
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;");
    let broken = RE_LINE_BREAK.replace_all(&escaped, BREAK);
    RE_RULE.replace_all(&broken, BREAK).into_owned()
}
