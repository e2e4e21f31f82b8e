//! Backend match → `OutputRecord`.

use std::str::FromStr;

use serde::Deserialize;
use tracing::warn;
use vector_index::RawMatch;

use crate::errors::MapError;
use crate::output_record::{
    Links, Location, OutputRecord, THUMBNAIL_HEIGHT, THUMBNAIL_WIDTH, Urls, WebcamId,
};

/// What to do with a match that cannot be mapped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MappingPolicy {
    /// Fail the whole request.
    #[default]
    Strict,
    /// Drop the match and log a warning.
    SkipMalformed,
}

impl FromStr for MappingPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "strict" => Ok(MappingPolicy::Strict),
            "skip" | "skip_malformed" => Ok(MappingPolicy::SkipMalformed),
            other => Err(format!("unknown mapping policy '{other}' (expected strict|skip)")),
        }
    }
}

/// Stored `webcam` sub-record, limited to the projected fields.
#[derive(Debug, Deserialize)]
struct WebcamEntity {
    webcamid: WebcamId,
    title: String,
    location: EntityLocation,
    player: EntityPlayer,
}

#[derive(Debug, Deserialize)]
struct EntityLocation {
    country: String,
    latitude: f64,
    longitude: f64,
}

#[derive(Debug, Deserialize)]
struct EntityPlayer {
    day: String,
}

#[derive(Debug, Clone)]
pub struct ResultMapper {
    asset_base_url: String,
    policy: MappingPolicy,
}

impl ResultMapper {
    /// `asset_base_url` is used verbatim as the thumbnail URL prefix.
    pub fn new(asset_base_url: impl Into<String>, policy: MappingPolicy) -> Self {
        Self {
            asset_base_url: asset_base_url.into(),
            policy,
        }
    }

    /// Maps one match. Pure: no I/O.
    pub fn map(&self, m: &RawMatch) -> Result<OutputRecord, MapError> {
        if m.entity.is_null() {
            return Err(MapError::MalformedMatch("match has no webcam record".into()));
        }
        let e = WebcamEntity::deserialize(&m.entity)
            .map_err(|err| MapError::MalformedMatch(err.to_string()))?;

        let small = format!("{}{}.jpg", self.asset_base_url, e.webcamid);
        Ok(OutputRecord {
            id: e.webcamid,
            score: m.score,
            created_at: String::new(),
            width: THUMBNAIL_WIDTH,
            height: THUMBNAIL_HEIGHT,
            description: e.title,
            urls: Urls { small },
            links: Links { html: e.player.day },
            location: Location {
                country: e.location.country,
                latitude: e.location.latitude,
                longitude: e.location.longitude,
            },
        })
    }

    /// Maps every match in order, applying the policy to failures.
    pub fn map_all(&self, matches: &[RawMatch]) -> Result<Vec<OutputRecord>, MapError> {
        let mut out = Vec::with_capacity(matches.len());
        for (rank, m) in matches.iter().enumerate() {
            match self.map(m) {
                Ok(r) => out.push(r),
                Err(e) if self.policy == MappingPolicy::SkipMalformed => {
                    warn!(rank, score = m.score, error = %e, "result_mapper: skipping malformed match");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entity(id: serde_json::Value) -> serde_json::Value {
        json!({
            "webcamid": id,
            "title": "Sunset Beach",
            "location": { "country": "Portugal", "latitude": 37.08, "longitude": -8.67 },
            "player": { "day": "https://player.example/day/42" }
        })
    }

    #[test]
    fn maps_all_fields() {
        let mapper = ResultMapper::new("https://img.example.com/", MappingPolicy::Strict);
        let r = mapper.map(&RawMatch::new(0.93, entity(json!(42)))).unwrap();

        assert_eq!(r.id, WebcamId::Number(42.into()));
        assert_eq!(r.score, 0.93);
        assert_eq!(r.created_at, "");
        assert_eq!((r.width, r.height), (200, 112));
        assert_eq!(r.description, "Sunset Beach");
        assert_eq!(r.urls.small, "https://img.example.com/42.jpg");
        assert_eq!(r.links.html, "https://player.example/day/42");
        assert_eq!(r.location.country, "Portugal");
        assert_eq!(r.location.latitude, 37.08);
        assert_eq!(r.location.longitude, -8.67);
    }

    #[test]
    fn base_url_is_not_normalized() {
        let mapper = ResultMapper::new("https://img.example.com/thumbs", MappingPolicy::Strict);
        let r = mapper.map(&RawMatch::new(0.5, entity(json!("cam-9")))).unwrap();
        assert_eq!(r.urls.small, "https://img.example.com/thumbscam-9.jpg");
        assert_eq!(r.id, WebcamId::Text("cam-9".into()));
    }

    #[test]
    fn missing_location_is_malformed() {
        let mapper = ResultMapper::new("https://img.example.com/", MappingPolicy::Strict);
        let mut e = entity(json!(42));
        e.as_object_mut().unwrap().remove("location");
        let err = mapper.map(&RawMatch::new(0.5, e)).unwrap_err();
        let MapError::MalformedMatch(msg) = err;
        assert!(msg.contains("location"), "{msg}");
    }

    #[test]
    fn null_entity_is_malformed() {
        let mapper = ResultMapper::new("https://img.example.com/", MappingPolicy::Strict);
        assert!(mapper.map(&RawMatch::new(0.5, serde_json::Value::Null)).is_err());
    }

    #[test]
    fn wrongly_typed_id_is_malformed() {
        let mapper = ResultMapper::new("https://img.example.com/", MappingPolicy::Strict);
        assert!(mapper.map(&RawMatch::new(0.5, entity(json!([1, 2])))).is_err());
    }

    #[test]
    fn strict_policy_fails_the_batch() {
        let mapper = ResultMapper::new("https://img.example.com/", MappingPolicy::Strict);
        let batch = vec![
            RawMatch::new(0.9, entity(json!(1))),
            RawMatch::new(0.8, json!({ "webcamid": 2 })),
        ];
        assert!(mapper.map_all(&batch).is_err());
    }

    #[test]
    fn skip_policy_drops_bad_matches_and_keeps_order() {
        let mapper = ResultMapper::new("https://img.example.com/", MappingPolicy::SkipMalformed);
        let batch = vec![
            RawMatch::new(0.9, entity(json!(1))),
            RawMatch::new(0.8, json!({ "webcamid": 2 })),
            RawMatch::new(0.7, entity(json!(3))),
        ];
        let out = mapper.map_all(&batch).unwrap();
        let ids: Vec<_> = out.iter().map(|r| r.id.to_string()).collect();
        assert_eq!(ids, vec!["1", "3"]);
    }

    #[test]
    fn policy_parses_from_env_values() {
        assert_eq!("strict".parse::<MappingPolicy>().unwrap(), MappingPolicy::Strict);
        assert_eq!(" SKIP ".parse::<MappingPolicy>().unwrap(), MappingPolicy::SkipMalformed);
        assert!("lenient".parse::<MappingPolicy>().is_err());
    }
}
