//! MongoDB Atlas `$vectorSearch` backend.

use std::{future::Future, pin::Pin};

use futures::TryStreamExt;
use mongodb::{
    Client, Collection,
    bson::{Bson, Document, doc},
    options::ClientOptions,
};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::{AtlasConfig, IndexConfig, MAX_NUM_CANDIDATES};
use crate::count::ResultCount;
use crate::errors::IndexError;
use crate::record::{ENTITY_KEY, PROJECTED_FIELDS, RawMatch};
use crate::{SimilarityIndex, finalize};

/// Pooled Atlas client bound to one collection and vector index.
pub struct AtlasIndex {
    collection: Collection<Document>,
    index: String,
    vector_path: String,
    cfg: IndexConfig,
}

impl AtlasIndex {
    /// Parses the connection string and creates the pooled client.
    ///
    /// The driver connects lazily, so an unreachable cluster surfaces on the
    /// first search as [`IndexError::Unavailable`].
    pub async fn connect(cfg: &IndexConfig, atlas: &AtlasConfig) -> Result<Self, IndexError> {
        cfg.validate()?;

        let mut opts = ClientOptions::parse(&atlas.url)
            .await
            .map_err(|e| IndexError::Config(format!("MONGODB_URL: {e}")))?;
        opts.app_name = Some("webcam-search".into());
        opts.connect_timeout = Some(cfg.timeout);
        opts.server_selection_timeout = Some(cfg.timeout);

        let client = Client::with_options(opts)
            .map_err(|e| IndexError::Config(format!("mongodb client: {e}")))?;
        let collection = client
            .database(&atlas.database)
            .collection::<Document>(&atlas.collection);

        info!(
            database = %atlas.database,
            collection = %atlas.collection,
            index = %atlas.index,
            "atlas_index.connect: ready"
        );

        Ok(Self {
            collection,
            index: atlas.index.clone(),
            vector_path: atlas.vector_path.clone(),
            cfg: cfg.clone(),
        })
    }

    async fn search_inner(
        &self,
        vector: &[f32],
        k: ResultCount,
    ) -> Result<Vec<RawMatch>, IndexError> {
        let pool = self.cfg.candidate_pool(k.get())?;
        let timeout = self.cfg.timeout;
        debug!(k = k.get(), pool, "atlas_index.search: start");

        let pipeline = vector_search_pipeline(&self.index, &self.vector_path, vector, k, pool)?;

        let run = async {
            let cursor = self.collection.aggregate(pipeline, None).await?;
            let docs: Vec<Document> = cursor.try_collect().await?;
            Ok::<_, mongodb::error::Error>(docs)
        };
        let docs = tokio::time::timeout(timeout, run)
            .await
            .map_err(|_| IndexError::Unavailable(format!("atlas search timed out after {timeout:?}")))?
            .map_err(|e| {
                warn!(error = %e, "atlas_index.search: aggregate failed");
                IndexError::Unavailable(format!("atlas aggregate failed: {e}"))
            })?;

        let matches = docs
            .into_iter()
            .map(to_raw_match)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(finalize(matches, k))
    }
}

impl SimilarityIndex for AtlasIndex {
    fn backend(&self) -> &'static str {
        "atlas"
    }

    fn search<'a>(
        &'a self,
        vector: &'a [f32],
        k: ResultCount,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<RawMatch>, IndexError>> + Send + 'a>> {
        Box::pin(self.search_inner(vector, k))
    }
}

/// `$vectorSearch` followed by a `$project` of the score and the webcam fields.
///
/// # Errors
/// [`IndexError::CountTooLarge`] when `k` or `num_candidates` exceed what
/// `$vectorSearch` accepts.
pub fn vector_search_pipeline(
    index: &str,
    path: &str,
    vector: &[f32],
    k: ResultCount,
    num_candidates: usize,
) -> Result<Vec<Document>, IndexError> {
    if k.get() > MAX_NUM_CANDIDATES || num_candidates > MAX_NUM_CANDIDATES {
        return Err(IndexError::CountTooLarge {
            k: k.get().max(num_candidates),
            max: MAX_NUM_CANDIDATES,
        });
    }
    let too_large = |n: usize| IndexError::CountTooLarge {
        k: n,
        max: MAX_NUM_CANDIDATES,
    };
    let num_candidates = i64::try_from(num_candidates).map_err(|_| too_large(num_candidates))?;
    let limit = i64::try_from(k.get()).map_err(|_| too_large(k.get()))?;
    let query_vector: Vec<Bson> = vector.iter().map(|x| Bson::Double(*x as f64)).collect();

    let mut project = doc! { "_id": 0, "score": { "$meta": "vectorSearchScore" } };
    for field in PROJECTED_FIELDS {
        project.insert(field, 1);
    }

    Ok(vec![
        doc! {
            "$vectorSearch": {
                "index": index,
                "path": path,
                "queryVector": query_vector,
                "numCandidates": num_candidates,
                "limit": limit,
            }
        },
        doc! { "$project": project },
    ])
}

fn to_raw_match(mut d: Document) -> Result<RawMatch, IndexError> {
    let score = match d.get("score") {
        Some(Bson::Double(f)) => *f,
        Some(Bson::Int32(i)) => *i as f64,
        Some(Bson::Int64(i)) => *i as f64,
        other => {
            return Err(IndexError::MalformedMatch(format!(
                "atlas returned a match without a numeric score: {other:?}"
            )));
        }
    };
    let entity = d
        .remove(ENTITY_KEY)
        .map(Bson::into_relaxed_extjson)
        .unwrap_or(Value::Null);
    Ok(RawMatch::new(score, entity))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn pipeline_matches_atlas_shape() {
        let k: ResultCount = "3".parse().unwrap();
        let p = vector_search_pipeline("imgembindex", "embedding", &[0.5, -0.25], k, 100).unwrap();
        assert_eq!(p.len(), 2);

        let vs = p[0].get_document("$vectorSearch").unwrap();
        assert_eq!(vs.get_str("index").unwrap(), "imgembindex");
        assert_eq!(vs.get_str("path").unwrap(), "embedding");
        assert_eq!(vs.get_i64("numCandidates").unwrap(), 100);
        assert_eq!(vs.get_i64("limit").unwrap(), 3);
        assert_eq!(vs.get_array("queryVector").unwrap().len(), 2);

        let proj = p[1].get_document("$project").unwrap();
        assert!(proj.contains_key("score"));
        for field in PROJECTED_FIELDS {
            assert_eq!(proj.get_i32(field).unwrap(), 1, "{field}");
        }
    }

    #[test]
    fn converts_projected_document() {
        let d = doc! {
            "score": 0.91,
            "webcam": {
                "webcamid": 1_234_567_890_i64,
                "title": "Harbor",
                "location": { "country": "Norway", "latitude": 60.39, "longitude": 5.32 },
                "player": { "day": "https://player.example/day/1234567890" },
            }
        };
        let m = to_raw_match(d).unwrap();
        assert_eq!(m.score, 0.91);
        assert_eq!(m.entity["webcamid"], json!(1_234_567_890_i64));
        assert_eq!(m.entity["location"]["country"], json!("Norway"));
        assert_eq!(m.entity["player"]["day"], json!("https://player.example/day/1234567890"));
    }

    #[test]
    fn missing_entity_becomes_null() {
        let m = to_raw_match(doc! { "score": 0.5 }).unwrap();
        assert!(m.entity.is_null());
    }

    #[test]
    fn pipeline_refuses_counts_atlas_would_reject() {
        let k = ResultCount::new(MAX_NUM_CANDIDATES + 1).unwrap();
        let err = vector_search_pipeline("i", "embedding", &[0.1], k, MAX_NUM_CANDIDATES).unwrap_err();
        assert!(matches!(err, IndexError::CountTooLarge { .. }));

        let k = ResultCount::new(5).unwrap();
        let err = vector_search_pipeline("i", "embedding", &[0.1], k, usize::MAX).unwrap_err();
        assert!(matches!(err, IndexError::CountTooLarge { .. }));
    }

    #[test]
    fn missing_score_is_a_malformed_match() {
        let err = to_raw_match(doc! { "webcam": {} }).unwrap_err();
        assert!(matches!(err, IndexError::MalformedMatch(_)), "{err}");

        let err = to_raw_match(doc! { "score": "high", "webcam": {} }).unwrap_err();
        assert!(matches!(err, IndexError::MalformedMatch(_)), "{err}");
    }
}
