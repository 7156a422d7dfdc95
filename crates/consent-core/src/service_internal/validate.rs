//! Mandatory-argument checks. All failures are InvalidArgument; nothing
//! here touches the store.

use crate::errors::ConsentError;
use std::collections::HashMap;

pub(crate) fn require_non_blank(field: &'static str, value: &str) -> Result<(), ConsentError> {
    if value.trim().is_empty() {
        return Err(ConsentError::invalid_argument(format!(
            "{field} must not be blank"
        )));
    }
    Ok(())
}

pub(crate) fn require_non_empty_map(
    field: &'static str,
    map: &HashMap<String, String>,
) -> Result<(), ConsentError> {
    if map.is_empty() {
        return Err(ConsentError::invalid_argument(format!(
            "{field} must contain at least one entry"
        )));
    }
    for key in map.keys() {
        if key.trim().is_empty() {
            return Err(ConsentError::invalid_argument(format!(
                "{field} keys must not be blank"
            )));
        }
    }
    Ok(())
}

pub(crate) fn require_non_empty_list(field: &'static str, len: usize) -> Result<(), ConsentError> {
    if len == 0 {
        return Err(ConsentError::invalid_argument(format!(
            "{field} must contain at least one entry"
        )));
    }
    Ok(())
}

pub(crate) fn require_known_status(
    status_tags: &[String],
    status: &str,
) -> Result<(), ConsentError> {
    if !status_tags.iter().any(|s| s == status) {
        return Err(ConsentError::invalid_argument(format!(
            "unknown consent status tag: {status}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;

    #[test]
    fn blank_and_whitespace_values_are_rejected() {
        assert!(require_non_blank("consent id", "c1").is_ok());
        assert_eq!(
            require_non_blank("consent id", "").unwrap_err().kind(),
            ErrorKind::InvalidArgument
        );
        assert_eq!(
            require_non_blank("consent id", "   ").unwrap_err().kind(),
            ErrorKind::InvalidArgument
        );
    }

    #[test]
    fn empty_attribute_maps_are_rejected() {
        let empty = HashMap::new();
        assert_eq!(
            require_non_empty_map("attributes", &empty).unwrap_err().kind(),
            ErrorKind::InvalidArgument
        );
        let blank_key = HashMap::from([(" ".to_string(), "v".to_string())]);
        assert!(require_non_empty_map("attributes", &blank_key).is_err());
    }

    #[test]
    fn status_tag_must_be_in_the_configured_set() {
        let tags = vec!["received".to_string(), "active".to_string()];
        assert!(require_known_status(&tags, "active").is_ok());
        assert_eq!(
            require_known_status(&tags, "frozen").unwrap_err().kind(),
            ErrorKind::InvalidArgument
        );
    }
}
