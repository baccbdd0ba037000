use std::collections::HashMap;

use thiserror::Error;

pub const METADATA_USER_ID: &str = "userId";
pub const METADATA_GAME_ID: &str = "gameId";
pub const METADATA_PLAN_ID: &str = "planId";

/// Identifiers stamped onto a checkout session and read back by the webhook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutMetadata {
    /// External (Discord) identity of the purchaser.
    pub discord_id: String,
    pub game_id: i32,
    pub plan_id: i32,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CheckoutMetadataError {
    #[error("metadata field `{0}` is missing")]
    Missing(&'static str),
    #[error("metadata field `{0}` is not a positive integer")]
    NotAnId(&'static str),
}

impl CheckoutMetadata {
    pub fn to_map(&self) -> HashMap<String, String> {
        HashMap::from([
            (METADATA_USER_ID.to_string(), self.discord_id.clone()),
            (METADATA_GAME_ID.to_string(), self.game_id.to_string()),
            (METADATA_PLAN_ID.to_string(), self.plan_id.to_string()),
        ])
    }

    pub fn from_map(metadata: &HashMap<String, String>) -> Result<Self, CheckoutMetadataError> {
        let discord_id = metadata
            .get(METADATA_USER_ID)
            .map(|value| value.trim())
            .filter(|value| !value.is_empty())
            .ok_or(CheckoutMetadataError::Missing(METADATA_USER_ID))?
            .to_string();

        Ok(Self {
            discord_id,
            game_id: parse_id(metadata, METADATA_GAME_ID)?,
            plan_id: parse_id(metadata, METADATA_PLAN_ID)?,
        })
    }
}

fn parse_id(
    metadata: &HashMap<String, String>,
    key: &'static str,
) -> Result<i32, CheckoutMetadataError> {
    let raw = metadata
        .get(key)
        .map(|value| value.trim())
        .filter(|value| !value.is_empty())
        .ok_or(CheckoutMetadataError::Missing(key))?;

    match raw.parse::<i32>() {
        Ok(id) if id > 0 => Ok(id),
        _ => Err(CheckoutMetadataError::NotAnId(key)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn reads_complete_metadata() {
        let parsed = CheckoutMetadata::from_map(&metadata(&[
            ("userId", "U1"),
            ("gameId", "7"),
            ("planId", "3"),
        ]))
        .unwrap();

        assert_eq!(
            parsed,
            CheckoutMetadata {
                discord_id: "U1".to_string(),
                game_id: 7,
                plan_id: 3,
            }
        );
    }

    #[test]
    fn each_missing_field_is_reported() {
        let full = [("userId", "U1"), ("gameId", "7"), ("planId", "3")];
        for skip in 0..full.len() {
            let partial: Vec<_> = full
                .iter()
                .enumerate()
                .filter(|(idx, _)| *idx != skip)
                .map(|(_, pair)| *pair)
                .collect();
            let err = CheckoutMetadata::from_map(&metadata(&partial)).unwrap_err();
            assert_eq!(err, CheckoutMetadataError::Missing(full[skip].0));
        }
    }

    #[test]
    fn blank_user_id_counts_as_missing() {
        let err = CheckoutMetadata::from_map(&metadata(&[
            ("userId", "  "),
            ("gameId", "7"),
            ("planId", "3"),
        ]))
        .unwrap_err();
        assert_eq!(err, CheckoutMetadataError::Missing("userId"));
    }

    #[test]
    fn non_numeric_and_non_positive_ids_are_rejected() {
        let err = CheckoutMetadata::from_map(&metadata(&[
            ("userId", "U1"),
            ("gameId", "seven"),
            ("planId", "3"),
        ]))
        .unwrap_err();
        assert_eq!(err, CheckoutMetadataError::NotAnId("gameId"));

        let err = CheckoutMetadata::from_map(&metadata(&[
            ("userId", "U1"),
            ("gameId", "7"),
            ("planId", "0"),
        ]))
        .unwrap_err();
        assert_eq!(err, CheckoutMetadataError::NotAnId("planId"));
    }

    #[test]
    fn map_uses_wire_keys() {
        let map = CheckoutMetadata {
            discord_id: "U1".to_string(),
            game_id: 7,
            plan_id: 3,
        }
        .to_map();
        assert_eq!(map.get("userId").map(String::as_str), Some("U1"));
        assert_eq!(map.get("gameId").map(String::as_str), Some("7"));
        assert_eq!(map.get("planId").map(String::as_str), Some("3"));
    }
}
