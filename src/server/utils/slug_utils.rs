use once_cell::sync::Lazy;
use regex::Regex;

static NON_SLUG_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^a-z0-9\s-]").expect("valid slug regex"));
static WHITESPACE_RUNS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid regex"));
static HYPHEN_RUNS: Lazy<Regex> = Lazy::new(|| Regex::new(r"-{2,}").expect("valid regex"));

/// maps accented letters (turkish first, then the usual latin ones) to plain ascii
fn fold_char(c: char) -> char {
    match c {
        'ç' | 'Ç' => 'c',
        'ğ' | 'Ğ' => 'g',
        'ı' | 'İ' | 'î' | 'Î' | 'í' | 'Í' | 'ì' | 'Ì' | 'ï' | 'Ï' => 'i',
        'ö' | 'Ö' | 'ó' | 'Ó' | 'ò' | 'Ò' | 'ô' | 'Ô' | 'õ' | 'Õ' => 'o',
        'ş' | 'Ş' => 's',
        'ü' | 'Ü' | 'û' | 'Û' | 'ú' | 'Ú' | 'ù' | 'Ù' => 'u',
        'â' | 'Â' | 'á' | 'Á' | 'à' | 'À' | 'ä' | 'Ä' | 'ã' | 'Ã' | 'å' | 'Å' => 'a',
        'é' | 'É' | 'è' | 'È' | 'ê' | 'Ê' | 'ë' | 'Ë' => 'e',
        'ñ' | 'Ñ' => 'n',
        other => other,
    }
}

fn fold_and_lowercase(title: &str) -> String {
    title
        .chars()
        .map(fold_char)
        .flat_map(char::to_lowercase)
        .collect()
}

/// url safe form of a title: `"Taşkafa: Stories of the Street"` -> `"taskafa-stories-of-the-street"`
pub fn slugify(title: &str) -> String {
    let folded = fold_and_lowercase(title);
    let stripped = NON_SLUG_CHARS.replace_all(&folded, "");
    let hyphenated = WHITESPACE_RUNS.replace_all(stripped.trim(), "-");
    let collapsed = HYPHEN_RUNS.replace_all(&hyphenated, "-");

    collapsed.trim_matches('-').to_string()
}

/// comparison form, same folding as `slugify` but only ascii letters and digits survive
pub fn normalize(title: &str) -> String {
    fold_and_lowercase(title)
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .collect()
}
