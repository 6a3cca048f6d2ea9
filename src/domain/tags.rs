//! Tag title normalisation and addressing.

use url::Url;

use super::error::DomainError;

pub const TAG_TITLE_MAX_CHARS: usize = 20;

/// Normalise a user-supplied tag title: surrounding whitespace is dropped and
/// the title is lowercased. Titles are compared only in this form.
pub fn normalize_tag_title(raw: &str) -> Result<String, DomainError> {
    let title = raw.trim().to_lowercase();

    if title.is_empty() {
        return Err(DomainError::validation("tag title must not be empty"));
    }

    let length = title.chars().count();
    if length > TAG_TITLE_MAX_CHARS {
        return Err(DomainError::validation(format!(
            "tag title `{title}` is {length} characters long; the limit is {TAG_TITLE_MAX_CHARS}"
        )));
    }

    Ok(title)
}

/// Public path of the tag filter page, with the title percent-encoded as a
/// single path segment.
pub fn tag_path(title: &str) -> String {
    let Ok(mut url) = Url::parse("http://localhost/tag/") else {
        return format!("/tag/{title}");
    };

    if let Ok(mut segments) = url.path_segments_mut() {
        segments.pop_if_empty().push(title);
    }

    url.path().to_string()
}
