use thiserror::Error;

/// Estimates below this many hours are treated as absent.
pub const ESTIMATE_EPSILON: f64 = 0.01;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MetadataError {
    #[error("cannot parse time estimate")]
    BadEstimate,
}

/// Structured fields parsed from a block's inline metadata line.
#[derive(Debug, Default, PartialEq)]
pub struct BlockMetadata {
    pub category: Option<String>,
    pub author: Option<String>,
    pub issue: Option<u64>,
    pub estimate_hours: Option<f64>,
}

/// Parse a human-readable time estimate into hours.
///
/// A trailing `h` (hours) or `m` (minutes) is optional; no suffix means
/// hours. Any other trailing letter is an error. `90m` parses to 1.5.
pub fn parse_estimate(estimate: &str) -> Result<f64, MetadataError> {
    let mut chars = estimate.chars();
    let last = chars.next_back().ok_or(MetadataError::BadEstimate)?;

    let number = if last.is_alphabetic() {
        if last != 'm' && last != 'h' {
            return Err(MetadataError::BadEstimate);
        }
        chars.as_str()
    } else {
        estimate
    };

    let value: f64 = number.parse().map_err(|_| MetadataError::BadEstimate)?;
    if last == 'm' {
        Ok(value / 60.0)
    } else {
        Ok(value)
    }
}

/// Tentatively parse a block line as whitespace-separated `key=value`
/// metadata.
///
/// Returns `None` when the line has no `=` at all or none of the
/// recognized keys (`category`, `author`, `issue`, `estimate`) yields a
/// value — the caller then treats the line as ordinary body text.
/// Estimates below [`ESTIMATE_EPSILON`] do not count.
pub fn parse_metadata_line(line: &str) -> Option<BlockMetadata> {
    if !line.contains('=') {
        return None;
    }

    let mut meta = BlockMetadata::default();
    for pair in line.split_whitespace() {
        let Some((key, value)) = pair.split_once('=') else {
            continue;
        };
        match key {
            "category" if !value.is_empty() => meta.category = Some(value.to_string()),
            "author" if !value.is_empty() => meta.author = Some(value.to_string()),
            "issue" => meta.issue = value.parse().ok().filter(|&n| n > 0),
            "estimate" => {
                meta.estimate_hours = parse_estimate(value)
                    .ok()
                    .filter(|&hours| hours >= ESTIMATE_EPSILON);
            }
            _ => {}
        }
    }

    if meta == BlockMetadata::default() {
        return None;
    }
    Some(meta)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_estimate_hours_suffix() {
        assert_eq!(parse_estimate("2h"), Ok(2.0));
    }

    #[test]
    fn test_parse_estimate_minutes_suffix() {
        assert_eq!(parse_estimate("90m"), Ok(1.5));
        assert_eq!(parse_estimate("30m"), Ok(0.5));
    }

    #[test]
    fn test_parse_estimate_no_suffix_means_hours() {
        assert_eq!(parse_estimate("1.5"), Ok(1.5));
        assert_eq!(parse_estimate("3"), Ok(3.0));
    }

    #[test]
    fn test_parse_estimate_rejects_unknown_suffix() {
        assert_eq!(parse_estimate("2d"), Err(MetadataError::BadEstimate));
        assert_eq!(parse_estimate(""), Err(MetadataError::BadEstimate));
        assert_eq!(parse_estimate("h"), Err(MetadataError::BadEstimate));
        assert_eq!(parse_estimate("abc"), Err(MetadataError::BadEstimate));
    }

    #[test]
    fn test_metadata_line_all_keys() {
        let meta = parse_metadata_line("category=storage author=bob issue=42 estimate=2h").unwrap();
        assert_eq!(meta.category.as_deref(), Some("storage"));
        assert_eq!(meta.author.as_deref(), Some("bob"));
        assert_eq!(meta.issue, Some(42));
        assert_eq!(meta.estimate_hours, Some(2.0));
    }

    #[test]
    fn test_metadata_line_without_equals_is_body() {
        assert_eq!(parse_metadata_line("needs a redesign"), None);
    }

    #[test]
    fn test_metadata_line_without_recognized_keys_is_body() {
        assert_eq!(parse_metadata_line("x=y some=thing"), None);
    }

    #[test]
    fn test_metadata_line_must_yield_a_value() {
        // "estimate" present but unparseable, so nothing counted
        assert_eq!(parse_metadata_line("estimate=soon"), None);
    }

    #[test]
    fn test_metadata_negligible_estimate_does_not_count() {
        assert_eq!(parse_metadata_line("estimate=0m"), None);
        assert_eq!(parse_metadata_line("estimate=0.001"), None);
    }

    #[test]
    fn test_metadata_single_key_counts() {
        let meta = parse_metadata_line("category=storage").unwrap();
        assert_eq!(meta.category.as_deref(), Some("storage"));
        assert_eq!(meta.issue, None);
    }

    #[test]
    fn test_metadata_issue_must_be_positive_integer() {
        assert_eq!(parse_metadata_line("issue=0"), None);
        assert_eq!(parse_metadata_line("issue=abc"), None);
        let meta = parse_metadata_line("issue=7").unwrap();
        assert_eq!(meta.issue, Some(7));
    }
}
