//! Filename sanitising.
//!
//! Produces lowercase stems made only of letters, digits, single underscores
//! and single hyphens. The extension is only lowercased and any hidden-file
//! dot is kept.
//! Applying it twice gives the same result as applying it once.

const UNNAMED: &str = "unnamed";

/// Sanitise a full filename (`"Beach Sunset!.JPG"` -> `"beach_sunset.jpg"`).
pub fn sanitize_filename(name: &str) -> String {
    if name.is_empty() {
        return String::new();
    }

    let (hidden_prefix, rest) = match name.strip_prefix('.') {
        Some(rest) => (".", rest),
        None => ("", name),
    };
    if rest.is_empty() {
        return hidden_prefix.to_string();
    }

    let (stem, extension) = match rest.rfind('.') {
        // a trailing lone dot belongs to the stem
        Some(idx) if idx + 1 < rest.len() => (&rest[..idx], &rest[idx + 1..]),
        _ => (rest, ""),
    };

    let extension = extension.to_lowercase();

    let mut result = String::with_capacity(name.len());
    result.push_str(hidden_prefix);
    result.push_str(&sanitize_stem(stem));
    if !extension.is_empty() {
        result.push('.');
        result.push_str(&extension);
    }
    result
}

/// Sanitise text that will become a filename stem, such as a model-written
/// description. Dots are treated as punctuation, not an extension separator.
pub fn sanitize_stem(text: &str) -> String {
    let lowered = text.to_lowercase();

    // Whitespace runs become one underscore, other punctuation is dropped.
    let mut cleaned = String::with_capacity(lowered.len());
    let mut in_whitespace = false;
    for c in lowered.chars() {
        if c.is_whitespace() {
            if !in_whitespace {
                cleaned.push('_');
            }
            in_whitespace = true;
            continue;
        }
        in_whitespace = false;
        if c.is_alphanumeric() || c == '_' || c == '-' {
            cleaned.push(c);
        }
    }

    let collapsed = collapse_separators(&cleaned);
    let trimmed = collapsed.trim_matches(|c| c == '_' || c == '-');

    if trimmed.is_empty() {
        UNNAMED.to_string()
    } else {
        trimmed.to_string()
    }
}

/// Collapse each run of `_`/`-`: a pure run keeps its character, a mixed run
/// becomes a single underscore.
fn collapse_separators(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut run: Option<char> = None;

    for c in input.chars() {
        if c == '_' || c == '-' {
            run = match run {
                None => Some(c),
                Some(prev) if prev == c => Some(c),
                Some(_) => Some('_'),
            };
            continue;
        }
        if let Some(sep) = run.take() {
            out.push(sep);
        }
        out.push(c);
    }
    if let Some(sep) = run {
        out.push(sep);
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_whitespace_and_case() {
        assert_eq!(sanitize_filename("hello world.jpg"), "hello_world.jpg");
        assert_eq!(sanitize_filename("hello   world.jpg"), "hello_world.jpg");
        assert_eq!(sanitize_filename("hello \t world.jpg"), "hello_world.jpg");
        assert_eq!(sanitize_filename("My Cool Wallpaper.PNG"), "my_cool_wallpaper.png");
        assert_eq!(sanitize_filename("image.JpEg"), "image.jpeg");
    }

    #[test]
    fn test_separator_runs() {
        assert_eq!(sanitize_filename("too___many___underscores.jpg"), "too_many_underscores.jpg");
        assert_eq!(sanitize_filename("too---many---hyphens.jpg"), "too-many-hyphens.jpg");
        assert_eq!(sanitize_filename("image-with-dashes.jpg"), "image-with-dashes.jpg");
        assert_eq!(sanitize_filename("file_-_name.jpg"), "file_name.jpg");
        assert_eq!(sanitize_filename("a-_-b.jpg"), "a_b.jpg");
        assert_eq!(sanitize_filename("a - b.jpg"), "a_b.jpg");
    }

    #[test]
    fn test_strips_stem_edges() {
        assert_eq!(sanitize_filename("_leading.jpg"), "leading.jpg");
        assert_eq!(sanitize_filename("trailing-.jpg"), "trailing.jpg");
        assert_eq!(sanitize_filename(" leading.jpg"), "leading.jpg");
        assert_eq!(sanitize_filename("trailing .jpg"), "trailing.jpg");
    }

    #[test]
    fn test_punctuation_removed() {
        assert_eq!(sanitize_filename("Hello! World? (2024).jpg"), "hello_world_2024.jpg");
        assert_eq!(sanitize_filename("it's \"quoted\".jpg"), "its_quoted.jpg");
        assert_eq!(sanitize_filename("one, two.jpg"), "one_two.jpg");
        assert_eq!(sanitize_filename("user@home.jpg"), "userhome.jpg");
        assert_eq!(sanitize_filename("file.backup.jpg"), "filebackup.jpg");
    }

    #[test]
    fn test_edge_cases() {
        assert_eq!(sanitize_filename(""), "");
        assert_eq!(sanitize_filename("."), ".");
        assert_eq!(sanitize_filename("   .jpg"), "unnamed.jpg");
        assert_eq!(sanitize_filename("!@#$.jpg"), "unnamed.jpg");
        assert_eq!(sanitize_filename(".hidden"), ".hidden");
        assert_eq!(sanitize_filename(".Hidden File.JPG"), ".hidden_file.jpg");
        assert_eq!(sanitize_filename("README"), "readme");
        assert_eq!(sanitize_filename("a description."), "a_description");
        assert_eq!(sanitize_filename("a description..jpg"), "a_description.jpg");
    }

    #[test]
    fn test_extension_only_lowercased() {
        assert_eq!(sanitize_filename("Archive.Tar Gz"), "archive.tar gz");
        assert_eq!(sanitize_filename("x.!!"), "x.!!");
    }

    #[test]
    fn test_unicode_letters_kept() {
        assert_eq!(sanitize_filename("café.jpg"), "café.jpg");
        assert_eq!(sanitize_filename("schöne tapete.jpg"), "schöne_tapete.jpg");
    }

    #[test]
    fn test_beach_sunset() {
        assert_eq!(sanitize_filename("Beach Sunset!.jpg"), "beach_sunset.jpg");
    }

    #[test]
    fn test_sanitize_stem() {
        assert_eq!(sanitize_stem("Neon cyberpunk city. Night"), "neon_cyberpunk_city_night");
        assert_eq!(sanitize_stem("..."), "unnamed");
    }

    #[test]
    fn test_idempotent_and_clean() {
        let samples = [
            "",
            ".",
            "..",
            "...jpg",
            ".Hidden File.JPG",
            "  --__weird--__ name__--.Tar Gz",
            "a.b.c.d",
            "x.!!",
            "___",
            "Ünïcödé  Wallpaper ( 4K ).WEBP",
            "tab\tand\nnewline.png",
            "- _ -.jpg",
            "trailing.",
        ];

        for sample in samples {
            let once = sanitize_filename(sample);
            assert_eq!(sanitize_filename(&once), once, "not idempotent for {:?}", sample);

            let stem = once
                .trim_start_matches('.')
                .rsplit_once('.')
                .map(|(stem, _)| stem.to_string())
                .unwrap_or_else(|| once.trim_start_matches('.').to_string());
            assert!(!stem.chars().any(char::is_whitespace), "{:?}", once);
            assert!(!stem.contains("__"), "{:?}", once);
            assert!(!stem.contains("--"), "{:?}", once);
            assert!(!stem.starts_with(['_', '-']), "{:?}", once);
            assert!(!stem.ends_with(['_', '-']), "{:?}", once);
        }
    }
}
