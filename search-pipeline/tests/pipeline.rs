use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use bytes::Bytes;
use clip_encoder::{EmbeddingVector, EncodeError, Query, QueryEncoder};
use search_pipeline::{MappingPolicy, ResultMapper, SearchError, SearchPipeline};
use serde_json::json;
use vector_index::{IndexError, RawMatch, ResultCount, SimilarityIndex, finalize};

// ── Fakes ───────────────────────────────────────────────────────────────────

#[derive(Default)]
struct FakeEncoder {
    calls: AtomicUsize,
}

impl QueryEncoder for FakeEncoder {
    fn encode<'a>(
        &'a self,
        query: &'a Query,
    ) -> Pin<Box<dyn Future<Output = Result<EmbeddingVector, EncodeError>> + Send + 'a>> {
        Box::pin(async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match query {
                Query::Text(t) if t.trim().is_empty() => {
                    Err(EncodeError::InvalidInput("query text is empty".into()))
                }
                Query::ImageBlob(b) if b.is_empty() => {
                    Err(EncodeError::InvalidInput("image payload is empty".into()))
                }
                Query::ImageUrl(u) if u.contains("404") => {
                    Err(EncodeError::Retrieval("remote returned 404 Not Found".into()))
                }
                _ => Ok(vec![0.1, 0.2, 0.3, 0.4]),
            }
        })
    }
}

struct FakeIndex {
    stored: Vec<RawMatch>,
}

impl SimilarityIndex for FakeIndex {
    fn backend(&self) -> &'static str {
        "fake"
    }

    fn search<'a>(
        &'a self,
        vector: &'a [f32],
        k: ResultCount,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<RawMatch>, IndexError>> + Send + 'a>> {
        Box::pin(async move {
            assert_eq!(vector.len(), 4);
            Ok(finalize(self.stored.clone(), k))
        })
    }
}

struct DownIndex;

impl SimilarityIndex for DownIndex {
    fn backend(&self) -> &'static str {
        "down"
    }

    fn search<'a>(
        &'a self,
        _vector: &'a [f32],
        _k: ResultCount,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<RawMatch>, IndexError>> + Send + 'a>> {
        Box::pin(async {
            Err(IndexError::Unavailable(
                "server selection timeout: 10.1.2.3:27017".into(),
            ))
        })
    }
}

fn webcam(id: u64, title: &str) -> serde_json::Value {
    json!({
        "webcamid": id,
        "title": title,
        "location": { "country": "Italy", "latitude": 43.77, "longitude": 11.25 },
        "player": { "day": format!("https://player.example/day/{id}") }
    })
}

fn corpus() -> Vec<RawMatch> {
    vec![
        RawMatch::new(0.61, webcam(1, "Harbor")),
        RawMatch::new(0.92, webcam(2, "Sunset Beach")),
        RawMatch::new(0.55, webcam(3, "Ski Slope")),
        RawMatch::new(0.88, webcam(4, "Coastline")),
        RawMatch::new(0.70, webcam(5, "Old Town")),
    ]
}

fn pipeline_over(
    index: Arc<dyn SimilarityIndex>,
    policy: MappingPolicy,
) -> (SearchPipeline, Arc<FakeEncoder>) {
    let encoder = Arc::new(FakeEncoder::default());
    let p = SearchPipeline::new(
        encoder.clone(),
        index,
        ResultMapper::new("https://img.example.com/", policy),
    );
    (p, encoder)
}

fn pipeline() -> (SearchPipeline, Arc<FakeEncoder>) {
    pipeline_over(Arc::new(FakeIndex { stored: corpus() }), MappingPolicy::Strict)
}

// ── Tests ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn text_search_returns_k_records_best_first() {
    let (p, _) = pipeline();
    let out = p.search_by_text("sunset beach", "3").await.unwrap();

    assert_eq!(out.len(), 3);
    let ids: Vec<_> = out.iter().map(|r| r.id.to_string()).collect();
    assert_eq!(ids, vec!["2", "4", "5"]);
    assert!(out.windows(2).all(|w| w[0].score >= w[1].score));
    assert_eq!(out[0].urls.small, "https://img.example.com/2.jpg");
    assert_eq!(out[0].description, "Sunset Beach");
}

#[tokio::test]
async fn never_returns_more_than_stored() {
    let (p, _) = pipeline();
    let out = p.search_by_text("harbor", "50").await.unwrap();
    assert_eq!(out.len(), 5);
}

#[tokio::test]
async fn all_modalities_share_the_same_chain() {
    let (p, _) = pipeline();
    let a = p.search_by_text("beach", "2").await.unwrap();
    let b = p
        .search_by_image(Bytes::from_static(b"\x89PNG fake"), "2")
        .await
        .unwrap();
    let c = p
        .search_by_url("https://example.com/cam.jpg", "2")
        .await
        .unwrap();
    assert_eq!(a, b);
    assert_eq!(b, c);
}

#[tokio::test]
async fn bad_counts_fail_before_encoding() {
    let (p, encoder) = pipeline();
    for bad in ["0", "-1", "abc", ""] {
        let err = p.search_by_text("sunset beach", bad).await.unwrap_err();
        assert!(matches!(err, SearchError::InvalidInput(_)), "{bad:?} -> {err}");
        assert_eq!(err.code(), "INVALID_INPUT");
    }
    assert_eq!(encoder.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn encoder_failures_keep_their_kind() {
    let (p, _) = pipeline();

    let err = p.search_by_text("   ", "3").await.unwrap_err();
    assert!(matches!(err, SearchError::InvalidInput(_)));

    let err = p.search_by_image(Bytes::new(), "3").await.unwrap_err();
    assert!(matches!(err, SearchError::InvalidInput(_)));

    let err = p
        .search_by_url("https://example.com/404.jpg", "3")
        .await
        .unwrap_err();
    assert!(matches!(err, SearchError::Retrieval(_)));
    assert_eq!(err.code(), "RETRIEVAL_ERROR");
}

#[tokio::test]
async fn unavailable_backend_fails_every_modality() {
    let (p, _) = pipeline_over(Arc::new(DownIndex), MappingPolicy::Strict);

    let results = [
        p.search_by_text("beach", "3").await,
        p.search_by_image(Bytes::from_static(b"img"), "3").await,
        p.search_by_url("https://example.com/cam.jpg", "3").await,
    ];
    for r in results {
        let err = r.unwrap_err();
        assert!(matches!(err, SearchError::BackendUnavailable(_)));
        assert!(!err.public_message().contains("10.1.2.3"));
    }
}

#[tokio::test]
async fn malformed_match_fails_strict_and_is_skipped_when_allowed() {
    let mut stored = corpus();
    stored.push(RawMatch::new(0.99, json!({ "webcamid": 6, "title": "No location" })));

    let (strict, _) = pipeline_over(
        Arc::new(FakeIndex { stored: stored.clone() }),
        MappingPolicy::Strict,
    );
    let err = strict.search_by_text("beach", "3").await.unwrap_err();
    assert!(matches!(err, SearchError::MalformedMatch(_)));

    let (lenient, _) = pipeline_over(Arc::new(FakeIndex { stored }), MappingPolicy::SkipMalformed);
    let out = lenient.search_by_text("beach", "3").await.unwrap();
    let ids: Vec<_> = out.iter().map(|r| r.id.to_string()).collect();
    assert_eq!(ids, vec!["2", "4"]);
}
