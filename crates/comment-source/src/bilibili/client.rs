use std::sync::{Arc, OnceLock};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{COOKIE, REFERER, USER_AGENT};
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use tracing::{debug, trace, warn};

use crate::credential::Credential;
use crate::error::{Result, SourceError};
use crate::models::{CommentPage, LatestFeed, SubCommentPage, VideoInfo};
use crate::source::{
    CommentSource, CommentsPageRequest, LatestFeedRequest, SubCommentsPageRequest,
};

use super::response::{
    Envelope, NavData, ReplyListData, ReplyPageData, ViewData, into_comments,
};
use super::target::TargetId;
use super::wbi::{WbiKeyCache, WbiKeys, unix_now};

pub const DEFAULT_UA: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/126.0.0.0 Safari/537.36";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Install the rustls crypto provider once per process.
pub fn install_rustls_provider() {
    static PROVIDER_INSTALLED: OnceLock<()> = OnceLock::new();
    PROVIDER_INSTALLED.get_or_init(|| {
        if let Err(e) = rustls::crypto::aws_lc_rs::default_provider().install_default() {
            debug!(existing_provider = ?e, "rustls CryptoProvider already installed");
        }
    });
}

/// HTTP client with the timeouts and compression the comment API expects.
pub fn default_client() -> Client {
    install_rustls_provider();
    Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .gzip(true)
        .deflate(true)
        .build()
        .unwrap_or_else(|error| {
            warn!(error = %error, "Failed to build HTTP client; falling back to reqwest defaults");
            Client::new()
        })
}

/// [`CommentSource`] backed by the public Bilibili web API.
pub struct BilibiliCommentClient {
    client: Client,
    wbi: Arc<WbiKeyCache>,
}

impl BilibiliCommentClient {
    const BASE_URL: &str = "https://www.bilibili.com";
    const VIEW_URL: &str = "https://api.bilibili.com/x/web-interface/view";
    const NAV_URL: &str = "https://api.bilibili.com/x/web-interface/nav";
    const REPLY_URL: &str = "https://api.bilibili.com/x/v2/reply";
    const SUB_REPLY_URL: &str = "https://api.bilibili.com/x/v2/reply/reply";
    const MAIN_REPLY_URL: &str = "https://api.bilibili.com/x/v2/reply/wbi/main";

    /// Comment area type for videos.
    const RESOURCE_TYPE_VIDEO: &str = "1";
    /// Page size of the top-level comment listing.
    const REPLY_PAGE_SIZE: u32 = 20;
    /// `mode` value selecting time ordering on the lazy feed.
    const MODE_BY_TIME: &str = "2";
    const MAIN_WEB_LOCATION: &str = "1315875";

    pub fn new(client: Client) -> Self {
        Self {
            client,
            wbi: Arc::new(WbiKeyCache::default()),
        }
    }

    fn get(&self, credential: &Credential, url: &str) -> RequestBuilder {
        self.client
            .get(url)
            .header(USER_AGENT, DEFAULT_UA)
            .header(REFERER, Self::BASE_URL)
            .header(COOKIE, credential.cookie_header())
    }

    async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Status(status.as_u16()));
        }
        let body = response.bytes().await?;
        let envelope: Envelope<T> = serde_json::from_slice(&body)?;
        envelope.into_data()
    }

    async fn api_get<T: DeserializeOwned>(
        &self,
        credential: &Credential,
        url: &str,
        params: &[(&str, String)],
    ) -> Result<T> {
        trace!(url, ?params, "GET");
        self.send_json(self.get(credential, url).query(params)).await
    }

    async fn wbi_keys(&self, credential: &Credential) -> Result<WbiKeys> {
        self.wbi
            .get_or_refresh(|| async {
                // `nav` answers -101 for anonymous sessions but still carries the keys.
                let response = self.get(credential, Self::NAV_URL).send().await?;
                let status = response.status();
                if !status.is_success() {
                    return Err(SourceError::Status(status.as_u16()));
                }
                let envelope: Envelope<NavData> = serde_json::from_slice(&response.bytes().await?)?;
                let nav = envelope.data.ok_or_else(|| {
                    SourceError::InvalidResponse("nav response carried no wbi keys".to_string())
                })?;
                WbiKeys::from_img(&nav.wbi_img)
            })
            .await
    }

    async fn signed_get<T: DeserializeOwned>(
        &self,
        credential: &Credential,
        url: &str,
        params: &[(&str, String)],
    ) -> Result<T> {
        let keys = self.wbi_keys(credential).await?;
        let query = keys.sign(params, unix_now()?);
        let result = self
            .send_json(self.get(credential, &format!("{url}?{query}")))
            .await;

        // Rejected signatures usually mean the key pair rotated.
        if matches!(result, Err(SourceError::Api { code: -403, .. })) {
            self.wbi.invalidate().await;
        }
        result
    }
}

impl Default for BilibiliCommentClient {
    fn default() -> Self {
        Self::new(default_client())
    }
}

#[async_trait]
impl CommentSource for BilibiliCommentClient {
    fn platform(&self) -> &'static str {
        "bilibili"
    }

    async fn fetch_metadata(&self, credential: &Credential, target: &str) -> Result<VideoInfo> {
        let params = match TargetId::parse(target)? {
            TargetId::Bvid(bvid) => vec![("bvid", bvid)],
            TargetId::Aid(aid) => vec![("aid", aid.to_string())],
        };
        let view: ViewData = self.api_get(credential, Self::VIEW_URL, &params).await?;
        debug!(aid = view.aid, title = %view.title, "resolved video metadata");

        Ok(VideoInfo {
            oid: view.aid,
            bvid: view.bvid,
            title: view.title,
            total_count: view.stat.and_then(|stat| stat.reply),
        })
    }

    async fn fetch_comments_page(
        &self,
        credential: &Credential,
        request: &CommentsPageRequest,
    ) -> Result<CommentPage> {
        let params = [
            ("type", Self::RESOURCE_TYPE_VIDEO.to_string()),
            ("oid", request.oid.to_string()),
            ("sort", request.order.sort_param().to_string()),
            ("pn", request.page.to_string()),
            ("ps", Self::REPLY_PAGE_SIZE.to_string()),
        ];
        let data: ReplyPageData = self.api_get(credential, Self::REPLY_URL, &params).await?;

        Ok(CommentPage {
            total_count: data.page.map(|page| page.count).unwrap_or_default(),
            items: into_comments(data.replies),
        })
    }

    async fn fetch_sub_comments_page(
        &self,
        credential: &Credential,
        request: &SubCommentsPageRequest,
    ) -> Result<SubCommentPage> {
        let params = [
            ("type", Self::RESOURCE_TYPE_VIDEO.to_string()),
            ("oid", request.oid.to_string()),
            ("root", request.root.to_string()),
            ("pn", request.page.to_string()),
            ("ps", request.page_size.to_string()),
        ];
        let data: ReplyListData = self
            .api_get(credential, Self::SUB_REPLY_URL, &params)
            .await?;

        Ok(SubCommentPage {
            items: into_comments(data.replies),
        })
    }

    async fn fetch_latest_feed(
        &self,
        credential: &Credential,
        request: &LatestFeedRequest,
    ) -> Result<LatestFeed> {
        let params = [
            ("oid", request.oid.to_string()),
            ("type", Self::RESOURCE_TYPE_VIDEO.to_string()),
            ("mode", Self::MODE_BY_TIME.to_string()),
            ("pagination_str", r#"{"offset":""}"#.to_string()),
            ("plat", "1".to_string()),
            ("web_location", Self::MAIN_WEB_LOCATION.to_string()),
        ];
        let data: ReplyListData = self
            .signed_get(credential, Self::MAIN_REPLY_URL, &params)
            .await?;

        Ok(LatestFeed {
            items: into_comments(data.replies),
        })
    }
}
