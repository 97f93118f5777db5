//! Helpers for routines: URL pieces and text cleanup.

use unicode_normalization::UnicodeNormalization;
use url::Url;

/// Path of `url`. Inputs that don't parse as absolute URLs are taken as a
/// path with an optional query or fragment.
fn url_path(url: &str) -> String {
    match Url::parse(url) {
        Ok(parsed) => parsed.path().to_string(),
        Err(_) => url.split(['?', '#']).next().unwrap_or_default().to_string(),
    }
}

/// Last segment of the URL path, e.g. `"b.tar.gz"` for
/// `https://host/a/b.tar.gz?x=1`. Empty for the root path.
pub fn url_filename(url: &str) -> String {
    url_path(url)
        .trim_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or_default()
        .to_string()
}

/// Extension of `url_filename`, dot included (`".gz"`), or empty.
/// A leading dot alone (`.hidden`) is not an extension.
pub fn url_fileext(url: &str) -> String {
    let name = url_filename(url);
    match name.rfind('.') {
        Some(index) if name[..index].chars().any(|c| c != '.') => name[index..].to_string(),
        _ => String::new(),
    }
}

/// Resolve `parts` (joined with `/`) against the absolute URL `base`, with
/// the usual relative-reference rules.
pub fn url_join(base: &str, parts: &[&str]) -> Result<String, url::ParseError> {
    let base = Url::parse(base)?;
    Ok(base.join(&parts.join("/"))?.to_string())
}

/// Trim both ends and replace every run of two or more whitespace
/// characters with one space. Single whitespace characters are kept.
pub fn strip_white(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.trim().chars().peekable();
    while let Some(c) = chars.next() {
        if !c.is_whitespace() {
            out.push(c);
            continue;
        }
        if chars.peek().is_some_and(|next| next.is_whitespace()) {
            while chars.next_if(|next| next.is_whitespace()).is_some() {}
            out.push(' ');
        } else {
            out.push(c);
        }
    }
    out
}

/// Slug of `text`: runs of anything but `a-zA-Z0-9` become one dash, no
/// leading or trailing dash. Text is NFKD-decomposed first, so accented
/// letters fold to their base letter; whatever stays non-ASCII is dropped.
pub fn sanitize(text: &str, to_lower: bool) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut dash = false;
    for c in text.nfkd().filter(char::is_ascii) {
        if c.is_ascii_alphanumeric() {
            if dash && !slug.is_empty() {
                slug.push('-');
            }
            dash = false;
            slug.push(if to_lower { c.to_ascii_lowercase() } else { c });
        } else {
            dash = true;
        }
    }
    slug
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("https://example.com/a/b.tar.gz?x=1", "b.tar.gz", ".gz")]
    #[case("https://example.com/files/report.pdf#page=2", "report.pdf", ".pdf")]
    #[case("https://example.com/dir/", "dir", "")]
    #[case("https://example.com/", "", "")]
    #[case("https://example.com/.hidden", ".hidden", "")]
    #[case("images/logo.png", "logo.png", ".png")]
    fn filename_and_extension(#[case] url: &str, #[case] name: &str, #[case] ext: &str) {
        assert_eq!(url_filename(url), name);
        assert_eq!(url_fileext(url), ext);
    }

    #[rstest]
    #[case("https://example.com/a/b", &["c"], "https://example.com/a/c")]
    #[case("https://example.com/a/b", &["c", "d"], "https://example.com/a/c/d")]
    #[case("https://example.com/a/b", &["/root"], "https://example.com/root")]
    #[case("https://example.com/a/", &["?page=2"], "https://example.com/a/?page=2")]
    #[case("https://example.com/a/", &["https://other.org/x"], "https://other.org/x")]
    fn join_resolves_relative_references(
        #[case] base: &str,
        #[case] parts: &[&str],
        #[case] expected: &str,
    ) {
        assert_eq!(url_join(base, parts).unwrap(), expected);
    }

    #[test]
    fn join_needs_an_absolute_base() {
        assert!(url_join("not a url", &["x"]).is_err());
    }

    #[test]
    fn strip_white_collapses_runs() {
        assert_eq!(strip_white("  a \n\t b  c d  "), "a b c d");
        assert_eq!(strip_white("a\tb"), "a\tb");
    }

    #[test]
    fn sanitize_builds_slugs() {
        assert_eq!(sanitize("  Hello, World!  ", true), "hello-world");
        assert_eq!(sanitize("Page #2 / Results", false), "Page-2-Results");
        assert_eq!(sanitize("---", true), "");
    }

    #[rstest]
    #[case("Crème brûlée", true, "creme-brulee")]
    #[case("Ångström Über", false, "Angstrom-Uber")]
    #[case("ﬁle №5", true, "file-no5")]
    #[case("東京 tower", true, "tower")]
    fn sanitize_folds_compatibility_forms_to_ascii(
        #[case] text: &str,
        #[case] to_lower: bool,
        #[case] expected: &str,
    ) {
        assert_eq!(sanitize(text, to_lower), expected);
    }
}
