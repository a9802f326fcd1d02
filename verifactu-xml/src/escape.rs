//! Minimal, spec-exact XML escaping.
//!
//! Deliberately narrower than "full" XML escaping: text nodes escape only
//! `&`, `<`, `>`; attribute values additionally escape `"` and `'` (§4.3
//! Escaping). We don't route this through `quick_xml`'s own escaping helpers
//! because those escape quotes in text nodes too, which would silently
//! diverge from the authority's bit-exact wire format.

pub fn escape_text(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            c => out.push(c),
        }
    }
    out
}

pub fn escape_attr(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn text_escapes_only_amp_lt_gt() {
        assert_eq!(escape_text(r#"A & B <C> "D" 'E'"#), r#"A &amp; B &lt;C&gt; "D" 'E'"#);
    }

    #[test]
    fn attr_escapes_quotes_too() {
        assert_eq!(
            escape_attr(r#"A & B <C> "D" 'E'"#),
            "A &amp; B &lt;C&gt; &quot;D&quot; &apos;E&apos;"
        );
    }
}
