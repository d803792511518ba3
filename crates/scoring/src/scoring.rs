//! Online score computation behind a read-through cache, and interest lookup.

use std::time::Duration;

use tracing::{debug, info};

use crate::requests::OnlineScoreRequest;
use crate::store::{Store, StoreError};

/// How long a computed score stays in the cache.
pub const SCORE_TTL: Duration = Duration::from_secs(60 * 60);

const PHONE_WEIGHT: f64 = 1.5;
const EMAIL_WEIGHT: f64 = 1.5;
const DEMOGRAPHIC_WEIGHT: f64 = 1.5;
const NAME_WEIGHT: f64 = 0.5;

/// `uid:` + md5 of first name, last name, phone, and birthday (`YYYYMMDD`);
/// unset parts contribute empty strings at fixed positions.
pub fn score_key(request: &OnlineScoreRequest) -> String {
    let birthday = request
        .birthday
        .map(|date| date.format("%Y%m%d").to_string())
        .unwrap_or_default();
    let material = [
        request.first_name.as_deref().unwrap_or_default(),
        request.last_name.as_deref().unwrap_or_default(),
        request.phone.as_ref().map(|phone| phone.as_str()).unwrap_or_default(),
        birthday.as_str(),
    ]
    .concat();
    format!("uid:{:x}", md5::compute(material.as_bytes()))
}

pub fn compute_score(request: &OnlineScoreRequest) -> f64 {
    let mut score = 0.0;
    if request.phone.is_some() {
        score += PHONE_WEIGHT;
    }
    if request.email.is_some() {
        score += EMAIL_WEIGHT;
    }
    if request.has_demographic_pair() {
        score += DEMOGRAPHIC_WEIGHT;
    }
    if request.has_name_pair() {
        score += NAME_WEIGHT;
    }
    score
}

/// Returns a cached non-zero score or computes and caches a fresh one.
///
/// A cached `0` is never trusted and always recomputed.
pub async fn get_score(store: &Store, request: &OnlineScoreRequest) -> f64 {
    let key = score_key(request);
    debug!(%key, "derived score cache key");

    let cached = store
        .cache_get(&key)
        .await
        .and_then(|raw| raw.parse::<f64>().ok())
        .filter(|score| *score != 0.0);
    if let Some(score) = cached {
        info!(%key, score, "score served from cache");
        return score;
    }

    let score = compute_score(request);
    info!(%key, score, "score computed");
    store
        .cache_set(&key, &score.to_string(), Some(SCORE_TTL))
        .await;
    score
}

pub fn interests_key(client_id: i64) -> String {
    format!("i:{client_id}")
}

/// Reads the stored interest list for a client, empty when nothing is stored.
pub async fn get_interests(store: &Store, client_id: i64) -> Result<Vec<String>, StoreError> {
    let key = interests_key(client_id);
    match store.get(&key).await? {
        Some(raw) => {
            serde_json::from_str(&raw).map_err(|source| StoreError::Decode { key, source })
        }
        None => Ok(Vec::new()),
    }
}
