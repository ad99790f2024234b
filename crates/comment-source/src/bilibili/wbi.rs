//! WBI request signing.
//!
//! The lazy comment feed requires a `w_rid` signature derived from two rotating
//! keys published by the `nav` endpoint. Keys are cached per client and
//! refreshed after [`KEY_TTL`].

use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use md5::{Digest, Md5};
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::{Result, SourceError};

use super::response::WbiImg;

const KEY_TTL: Duration = Duration::from_secs(2 * 60 * 60);

const MIXIN_KEY_ENC_TAB: [usize; 64] = [
    46, 47, 18, 2, 53, 8, 23, 32, 15, 50, 10, 31, 58, 3, 45, 35, 27, 43, 5, 49, 33, 9, 42, 19, 29,
    28, 14, 39, 12, 38, 41, 13, 37, 48, 7, 16, 24, 55, 40, 61, 26, 17, 0, 1, 60, 51, 30, 4, 22, 25,
    54, 21, 56, 59, 6, 63, 57, 62, 11, 36, 20, 34, 44, 52,
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct WbiKeys {
    pub img_key: String,
    pub sub_key: String,
}

impl WbiKeys {
    pub fn from_img(img: &WbiImg) -> Result<Self> {
        let img_key = key_from_url(&img.img_url)
            .ok_or_else(|| SourceError::InvalidResponse(format!("bad wbi img url {}", img.img_url)))?;
        let sub_key = key_from_url(&img.sub_url)
            .ok_or_else(|| SourceError::InvalidResponse(format!("bad wbi sub url {}", img.sub_url)))?;
        Ok(Self { img_key, sub_key })
    }

    fn mixin_key(&self) -> String {
        let raw = format!("{}{}", self.img_key, self.sub_key);
        let bytes = raw.as_bytes();
        MIXIN_KEY_ENC_TAB
            .iter()
            .take(32)
            .filter_map(|&i| bytes.get(i).map(|&b| b as char))
            .collect()
    }

    /// Build the signed query string for `params` at `timestamp`.
    pub fn sign(&self, params: &[(&str, String)], timestamp: u64) -> String {
        let mut params: Vec<(&str, String)> = params.to_vec();
        params.push(("wts", timestamp.to_string()));
        params.sort_by(|a, b| a.0.cmp(b.0));

        let query = params
            .iter()
            .map(|(k, v)| format!("{}={}", encode_component(k), encode_component(v)))
            .collect::<Vec<_>>()
            .join("&");

        let mut hasher = Md5::new();
        hasher.update(query.as_bytes());
        hasher.update(self.mixin_key().as_bytes());
        format!("{query}&w_rid={:x}", hasher.finalize())
    }
}

/// Percent-encode like the web client does: unreserved characters pass,
/// `!'()*` are dropped, everything else is `%XX`.
fn encode_component(s: &str) -> String {
    let kept: String = s
        .chars()
        .filter(|c| !matches!(c, '!' | '\'' | '(' | ')' | '*'))
        .collect();
    urlencoding::encode(&kept).into_owned()
}

fn key_from_url(url: &str) -> Option<String> {
    let file = url.rsplit_once('/').map(|(_, file)| file)?;
    let (stem, _) = file.rsplit_once('.')?;
    Some(stem.to_string())
}

pub(crate) fn unix_now() -> Result<u64> {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .map_err(|_| SourceError::InvalidResponse("system clock before unix epoch".to_string()))
}

struct CachedKeys {
    keys: WbiKeys,
    fetched_at: Instant,
}

/// Per-client cache of the current WBI key pair.
#[derive(Default)]
pub(crate) struct WbiKeyCache {
    slot: Mutex<Option<CachedKeys>>,
}

impl WbiKeyCache {
    /// Return cached keys or fetch fresh ones with `fetch`.
    ///
    /// The lock is held across the fetch so concurrent callers share a single
    /// refresh.
    pub async fn get_or_refresh<F, Fut>(&self, fetch: F) -> Result<WbiKeys>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<WbiKeys>>,
    {
        let mut slot = self.slot.lock().await;
        if let Some(cached) = slot.as_ref()
            && cached.fetched_at.elapsed() < KEY_TTL
        {
            return Ok(cached.keys.clone());
        }

        let keys = fetch().await?;
        debug!("refreshed wbi keys");
        *slot = Some(CachedKeys {
            keys: keys.clone(),
            fetched_at: Instant::now(),
        });
        Ok(keys)
    }

    /// Drop cached keys so the next request refetches them.
    pub async fn invalidate(&self) {
        self.slot.lock().await.take();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reference_keys() -> WbiKeys {
        WbiKeys {
            img_key: "7cd084941338484aae1ad9425b84077c".to_string(),
            sub_key: "4932caff0ff746eab6f01bf08b70ac45".to_string(),
        }
    }

    #[test]
    fn mixin_key_matches_reference() {
        assert_eq!(reference_keys().mixin_key(), "ea1db124af3c7062474693fa704f4ff8");
    }

    #[test]
    fn signature_matches_reference() {
        let params = [
            ("foo", "114".to_string()),
            ("bar", "514".to_string()),
            ("zab", "1919810".to_string()),
        ];
        assert_eq!(
            reference_keys().sign(&params, 1702204169),
            "bar=514&foo=114&wts=1702204169&zab=1919810&w_rid=8f6f2b5b3d485fe1886cec6a0be8c5d4"
        );
    }

    #[test]
    fn encoding_drops_reserved_punctuation() {
        assert_eq!(encode_component("a b(c)!"), "a%20bc");
        assert_eq!(encode_component(r#"{"offset":""}"#), "%7B%22offset%22%3A%22%22%7D");
    }

    #[test]
    fn key_extraction_from_url() {
        assert_eq!(
            key_from_url("https://i0.hdslb.com/bfs/wbi/7cd084941338484aae1ad9425b84077c.png"),
            Some("7cd084941338484aae1ad9425b84077c".to_string())
        );
        assert_eq!(key_from_url("no-slash"), None);
    }

    #[tokio::test]
    async fn cache_reuses_keys_until_invalidated() {
        let cache = WbiKeyCache::default();
        let first = cache.get_or_refresh(|| async { Ok(reference_keys()) }).await.unwrap();
        let second = cache
            .get_or_refresh(|| async { Err(SourceError::InvalidResponse("unused".into())) })
            .await
            .unwrap();
        assert_eq!(first, second);

        cache.invalidate().await;
        let refetched = cache
            .get_or_refresh(|| async { Err(SourceError::InvalidResponse("refetch".into())) })
            .await;
        assert!(refetched.is_err());
    }
}
