//! Slug derivation for articles and tags.
//!
//! `slug::slugify` transliterates through `deunicode`, so Turkish headlines
//! such as "Ekonomide Güçlü Büyüme" become `ekonomide-guclu-buyume`.

use slug::slugify;
use thiserror::Error;

const MAX_SUFFIX_ATTEMPTS: usize = 32;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SlugError {
    #[error("slug source text is empty")]
    EmptyInput,
    #[error("failed to derive slug from `{input}`")]
    Unrepresentable { input: String },
    #[error("exhausted attempts to find a unique slug for `{base}`")]
    Exhausted { base: String },
}

pub fn derive_slug(input: &str) -> Result<String, SlugError> {
    if input.trim().is_empty() {
        return Err(SlugError::EmptyInput);
    }

    let candidate = slugify(input);
    if candidate.is_empty() {
        return Err(SlugError::Unrepresentable {
            input: input.to_string(),
        });
    }

    Ok(candidate)
}

/// `base`, then `base-2`, `base-3`, ... up to the attempt limit.
///
/// Callers walk the candidates against their uniqueness check and report
/// [`SlugError::Exhausted`] when none is free.
pub fn slug_candidates(base: &str) -> impl Iterator<Item = String> + '_ {
    std::iter::once(base.to_string()).chain(
        (2..=MAX_SUFFIX_ATTEMPTS + 1).map(move |attempt| format!("{base}-{attempt}")),
    )
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn transliterates_turkish_headlines() {
        assert_eq!(
            derive_slug("Ekonomide Güçlü Büyüme").unwrap(),
            "ekonomide-guclu-buyume"
        );
    }

    #[test]
    fn rejects_blank_input() {
        assert_eq!(derive_slug("   "), Err(SlugError::EmptyInput));
    }

    #[test]
    fn candidates_append_numeric_suffixes() {
        let taken: HashSet<String> = ["secim-sonuclari", "secim-sonuclari-2"]
            .into_iter()
            .map(String::from)
            .collect();

        let base = derive_slug("Seçim Sonuçları").unwrap();
        let slug = slug_candidates(&base).find(|candidate| !taken.contains(candidate));

        assert_eq!(slug.as_deref(), Some("secim-sonuclari-3"));
        assert_eq!(slug_candidates("x").count(), MAX_SUFFIX_ATTEMPTS + 1);
    }
}
