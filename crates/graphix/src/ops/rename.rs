//! Filename construction for the `Rename` operation.

use crate::{
    ast::{MetadataKind, RenameTerm},
    error::RunResult,
};

/// Builds the new logical filename from the rename terms.
///
/// Counter terms consume `counter` (decimal, no padding) and increment it.
/// Metadata terms are resolved through `metadata_value`, which may yield
/// nothing (unknown metadata kinds contribute nothing). The current
/// extension is preserved, an empty result falls back to the original base
/// name, and the final string is sanitized for the filesystem.
pub fn build_filename(
    terms: &[RenameTerm],
    current: Option<&str>,
    counter: &mut u64,
    mut metadata_value: impl FnMut(&str, MetadataKind) -> RunResult<Option<String>>,
) -> RunResult<String> {
    let (base, ext) = match current {
        Some(name) if !name.is_empty() => split_extension(name),
        _ => ("image".to_owned(), ".png".to_owned()),
    };
    let mut name = String::new();
    for term in terms {
        match term {
            RenameTerm::Literal(text) => name.push_str(text),
            RenameTerm::Counter => {
                name.push_str(&counter.to_string());
                *counter += 1;
            }
            RenameTerm::Metadata { image, kind } => {
                if let Some(kind) = kind
                    && let Some(text) = metadata_value(image, *kind)?
                {
                    name.push_str(&text);
                }
            }
        }
    }
    if name.is_empty() {
        name = base;
    }
    if !ext.is_empty() && !name.ends_with(&ext) {
        name.push_str(&ext);
    }
    Ok(sanitize(&name))
}

/// Replaces characters invalid on common filesystems with underscores;
/// an effectively empty name becomes `image.png`.
pub fn sanitize(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| {
            if matches!(c, '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*') {
                '_'
            } else {
                c
            }
        })
        .collect();
    if cleaned.trim().is_empty() {
        "image.png".to_owned()
    } else {
        cleaned
    }
}

/// Splits `photo.tar.png` into `("photo.tar", ".png")`. Leading-dot names
/// and extensionless names keep an empty extension.
fn split_extension(name: &str) -> (String, String) {
    match name.rfind('.') {
        Some(pos) if pos > 0 => (name[..pos].to_owned(), name[pos..].to_owned()),
        _ => (name.to_owned(), String::new()),
    }
}
