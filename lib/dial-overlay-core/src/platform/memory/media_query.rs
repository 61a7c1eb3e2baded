use crate::platform::Viewport;

/// Evaluates the subset of media queries the overlay layout relies on against a viewport.
///
/// Supported: the `all`/`screen` media types, `orientation`, and the `min-`/`max-` forms of
/// `width` and `height` with `px` (or unitless) values. Clauses are joined with `and`, and a
/// comma separates alternatives. Anything else never matches.
pub fn evaluate(query: &str, viewport: Viewport) -> bool {
    query
        .split(',')
        .any(|alternative| evaluate_alternative(alternative, viewport))
}

fn evaluate_alternative(alternative: &str, viewport: Viewport) -> bool {
    let alternative = alternative.trim();
    if alternative.is_empty() {
        return false;
    }

    alternative
        .split(" and ")
        .map(str::trim)
        .all(|clause| evaluate_clause(clause, viewport))
}

fn evaluate_clause(clause: &str, viewport: Viewport) -> bool {
    let lower = clause.to_ascii_lowercase();
    if lower == "all" || lower == "screen" {
        return true;
    }

    let Some(inner) = lower
        .strip_prefix('(')
        .and_then(|rest| rest.strip_suffix(')'))
    else {
        return false;
    };

    let Some((feature, value)) = inner.split_once(':') else {
        return false;
    };
    let feature = feature.trim();
    let value = value.trim();

    match feature {
        "orientation" => match value {
            "landscape" => viewport.is_landscape(),
            "portrait" => !viewport.is_landscape(),
            _ => false,
        },
        "max-width" => parse_px(value).is_some_and(|px| viewport.width as f64 <= px),
        "min-width" => parse_px(value).is_some_and(|px| viewport.width as f64 >= px),
        "max-height" => parse_px(value).is_some_and(|px| viewport.height as f64 <= px),
        "min-height" => parse_px(value).is_some_and(|px| viewport.height as f64 >= px),
        _ => false,
    }
}

fn parse_px(value: &str) -> Option<f64> {
    value.strip_suffix("px").unwrap_or(value).trim().parse().ok()
}
