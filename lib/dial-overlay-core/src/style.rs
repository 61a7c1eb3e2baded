use crate::platform::{ElementId, HostDocument, PlatformResult};
use indexmap::IndexMap;
use std::borrow::Cow;

/// CSS declarations in insertion order. Keys may be written in either `kebab-case` or the
/// `camelCase` form used by JS style objects.
pub type StyleMap = IndexMap<String, String>;

pub fn set_styles<'a, I>(document: &dyn HostDocument, element: ElementId, styles: I) -> PlatformResult<()>
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    for (property, value) in styles {
        document.set_style(element, &css_property_name(property), value)?;
    }
    Ok(())
}

pub fn apply_style_map(
    document: &dyn HostDocument,
    element: ElementId,
    styles: &StyleMap,
) -> PlatformResult<()> {
    set_styles(
        document,
        element,
        styles.iter().map(|(property, value)| (property.as_str(), value.as_str())),
    )
}

/// `zIndex` -> `z-index`. Custom properties and names that are already kebab-case pass through.
pub fn css_property_name(name: &str) -> Cow<'_, str> {
    if name.starts_with("--") || !name.chars().any(|c| c.is_ascii_uppercase()) {
        return Cow::Borrowed(name);
    }

    let mut converted = String::with_capacity(name.len() + 4);
    for c in name.chars() {
        if c.is_ascii_uppercase() {
            converted.push('-');
            converted.push(c.to_ascii_lowercase());
        } else {
            converted.push(c);
        }
    }
    Cow::Owned(converted)
}
