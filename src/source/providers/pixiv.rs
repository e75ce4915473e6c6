//! Pixiv web-ajax providers.
//!
//! - [`PixivDiscoveryProvider`] samples the discovery feed and narrows it with
//!   the tag relaxation filter, since the feed cannot be queried by tag.
//! - [`PixivFollowingProvider`] samples works by artists the configured
//!   account follows. It needs a `PHPSESSID` and the account's `user_id`.
//! - [`PixivByIdProvider`] fetches one page of a known work. It needs a
//!   logged-in `PHPSESSID` and is built per request rather than registered.

use std::sync::Arc;

use async_trait::async_trait;
use pixluna_common::{url_extension, Error, GeneralImageData, ImageMetadata, ImageUrls, Result};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::Deserialize;
use tracing::debug;

use crate::config::Config;
use crate::http::HttpClient;
use crate::source::provider::{AcquisitionRequest, ImageProvider, ProviderContext, ProviderMeta};
use crate::source::tag_filter::{filter_by_tags, parse_tags, CandidateItem};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

pub const PIXIV_URL: &str = "https://www.pixiv.net";
const PIXIV_REFERER: &str = "https://www.pixiv.net/";
const PXIMG_HOST: &str = "i.pximg.net";
const DISCOVERY_LIMIT: u32 = 20;
const FOLLOWING_PAGE_SIZE: usize = 100;
const MAX_FOLLOWING_PAGES: usize = 10;
/// Followed artists scanned per request when matching tags.
const MAX_USERS_CHECKED: usize = 10;
const MAX_TAG_MATCHES: usize = 20;

// ---------------------------------------------------------------------------
// Ajax response types (private)
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct AjaxResponse<T> {
    #[serde(default)]
    error: bool,
    #[serde(default)]
    message: String,
    body: Option<T>,
}

impl<T> AjaxResponse<T> {
    fn into_body(self, what: &str) -> Result<T> {
        match self.body {
            Some(body) if !self.error => Ok(body),
            _ if self.message.is_empty() => Err(Error::upstream(format!("pixiv: no {what}"))),
            _ => Err(Error::upstream(format!("pixiv: {}", self.message))),
        }
    }
}

#[derive(Debug, Deserialize)]
struct DiscoveryBody {
    #[serde(default)]
    illusts: Vec<DiscoveryIllust>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DiscoveryIllust {
    id: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    user_name: String,
    #[serde(default)]
    x_restrict: u8,
    #[serde(default)]
    ai_type: u8,
    #[serde(default)]
    create_date: String,
}

#[derive(Debug, Deserialize)]
struct FollowingBody {
    #[serde(default)]
    users: Vec<FollowedUser>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FollowedUser {
    user_id: String,
}

#[derive(Debug, Deserialize)]
struct ProfileBody {
    /// An object keyed by illust id, or `[]` when the user has no works.
    #[serde(default)]
    illusts: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct PageEntry {
    urls: PageUrls,
}

#[derive(Debug, Deserialize)]
struct PageUrls {
    original: String,
    regular: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IllustDetail {
    id: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    user_name: String,
    #[serde(default)]
    x_restrict: u8,
    #[serde(default)]
    ai_type: u8,
    #[serde(default)]
    create_date: String,
    urls: DetailUrls,
    #[serde(default)]
    tags: DetailTags,
    page_count: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct DetailUrls {
    original: Option<String>,
    regular: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct DetailTags {
    #[serde(default)]
    tags: Vec<DetailTag>,
}

#[derive(Debug, Deserialize)]
struct DetailTag {
    tag: String,
}

// ---------------------------------------------------------------------------
// Shared plumbing
// ---------------------------------------------------------------------------

/// Endpoint, credentials and host rewriting shared by both providers.
#[derive(Clone)]
struct PixivApi {
    endpoint: String,
    config: Arc<Config>,
    http: HttpClient,
}

impl PixivApi {
    fn new(ctx: &ProviderContext) -> Self {
        Self {
            endpoint: PIXIV_URL.to_string(),
            config: Arc::clone(&ctx.config),
            http: ctx.http.clone(),
        }
    }

    fn headers(&self) -> Vec<(&'static str, String)> {
        let mut headers = vec![("referer", PIXIV_REFERER.to_string())];
        let sessid = self.config.pixiv.php_sessid.trim();
        if !sessid.is_empty() {
            headers.push(("cookie", format!("PHPSESSID={sessid}")));
        }
        headers
    }

    async fn get<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
        what: &str,
    ) -> Result<T> {
        let url = format!("{}{}", self.endpoint, path);
        let resp: AjaxResponse<T> = self.http.get_json(&url, query, &self.headers()).await?;
        resp.into_body(what)
    }

    /// Swap `i.pximg.net` for the configured reverse proxy host.
    fn rewrite(&self, url: &str) -> String {
        let base = self.config.base_url.trim();
        if base.is_empty() {
            url.to_string()
        } else {
            url.replace(PXIMG_HOST, base)
        }
    }

    async fn illust_detail(&self, pid: &str) -> Result<IllustDetail> {
        self.get(&format!("/ajax/illust/{pid}"), &[], "illust detail")
            .await
    }

    fn require_session(&self) -> Result<()> {
        if self.config.pixiv.php_sessid.trim().is_empty() {
            return Err(Error::upstream("pixiv: php_sessid is not configured"));
        }
        Ok(())
    }

    /// Metadata for `detail`, downloading from `original` (before host rewrite).
    fn detail_metadata(&self, detail: IllustDetail, original: &str) -> ImageMetadata {
        let urls = ImageUrls {
            original: self.rewrite(original),
            regular: None,
        };
        let tags: Vec<String> = detail.tags.tags.into_iter().map(|t| t.tag).collect();

        let raw = GeneralImageData {
            id: detail.id,
            title: detail.title,
            author: detail.user_name,
            r18: detail.x_restrict > 0,
            tags,
            extension: url_extension(&urls.original),
            ai_type: detail.ai_type,
            upload_date: parse_timestamp(&detail.create_date),
            urls: urls.clone(),
        };
        ImageMetadata {
            url: urls.original.clone(),
            urls,
            raw,
        }
    }
}

fn parse_timestamp(s: &str) -> i64 {
    chrono::DateTime::parse_from_rfc3339(s)
        .map(|d| d.timestamp_millis())
        .unwrap_or(0)
}

fn is_restricted(x_restrict: u8, tags: &[String]) -> bool {
    x_restrict > 0 || tags.iter().any(|t| t.eq_ignore_ascii_case("r-18"))
}

/// Replace the `_p<k>` page marker of a Pixiv image URL with `_p<page>`.
fn page_url(url: &str, page: u32) -> Option<String> {
    let idx = url.rfind("_p")?;
    let (head, tail) = url.split_at(idx);
    let digits = tail[2..].bytes().take_while(u8::is_ascii_digit).count();
    if digits == 0 {
        return None;
    }
    Some(format!("{head}_p{page}{}", &tail[2 + digits..]))
}

// ---------------------------------------------------------------------------
// Discovery
// ---------------------------------------------------------------------------

pub struct PixivDiscoveryProvider {
    api: PixivApi,
}

impl PixivDiscoveryProvider {
    pub fn new(ctx: &ProviderContext) -> Self {
        Self {
            api: PixivApi::new(ctx),
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.api.endpoint = endpoint.into();
        self
    }
}

#[async_trait]
impl ImageProvider for PixivDiscoveryProvider {
    fn meta(&self) -> ProviderMeta {
        ProviderMeta {
            name: "pdiscovery",
            referer: Some(PIXIV_REFERER),
        }
    }

    fn configure(&mut self, config: Arc<Config>) {
        self.api.config = config;
    }

    /// Pick one discovery illust matching the request's tags.
    ///
    /// Restricted illusts are dropped unless `request.adult` is set. That flag
    /// is drawn per job from `is_r18` and `r18_probability`, so with
    /// `is_r18 = true` a job still excludes R-18 work whenever its draw misses.
    async fn fetch_metadata(&self, request: &AcquisitionRequest) -> Result<ImageMetadata> {
        let mode = if request.adult { "r18" } else { "all" };
        let query = [
            ("mode", mode.to_string()),
            ("limit", DISCOVERY_LIMIT.to_string()),
        ];
        let body: DiscoveryBody = self
            .api
            .get("/ajax/illust/discovery", &query, "discovery results")
            .await?;

        let candidates: Vec<CandidateItem<DiscoveryIllust>> = body
            .illusts
            .into_iter()
            .map(|illust| CandidateItem {
                id: illust.id.clone(),
                title: illust.title.clone(),
                tags: illust.tags.clone(),
                restricted: is_restricted(illust.x_restrict, &illust.tags),
                payload: illust,
            })
            .filter(|c| request.adult || !c.restricted)
            .filter(|c| !(request.exclude_ai && c.payload.ai_type >= 2))
            .collect();

        let matched = filter_by_tags(candidates, request.tag.as_deref());
        let chosen = matched
            .choose(&mut rand::thread_rng())
            .ok_or_else(|| Error::upstream("pixiv: discovery returned no eligible illusts"))?;
        let illust = &chosen.payload;
        debug!(id = %illust.id, candidates = matched.len(), "Picked discovery illust");

        let pages: Vec<PageEntry> = self
            .api
            .get(&format!("/ajax/illust/{}/pages", illust.id), &[], "pages")
            .await?;
        let first = pages
            .into_iter()
            .next()
            .ok_or_else(|| Error::upstream(format!("pixiv: illust {} has no pages", illust.id)))?;

        let original = self.api.rewrite(&first.urls.original);
        let regular = first
            .urls
            .regular
            .as_deref()
            .or(Some(illust.url.as_str()))
            .filter(|u| !u.is_empty())
            .map(|u| self.api.rewrite(u));
        let urls = ImageUrls { original, regular };

        let raw = GeneralImageData {
            id: illust.id.clone(),
            title: illust.title.clone(),
            author: illust.user_name.clone(),
            r18: illust.x_restrict > 0,
            tags: illust.tags.clone(),
            extension: url_extension(&urls.original),
            ai_type: illust.ai_type,
            upload_date: parse_timestamp(&illust.create_date),
            urls: urls.clone(),
        };

        Ok(ImageMetadata {
            url: urls.original.clone(),
            urls,
            raw,
        })
    }
}

// ---------------------------------------------------------------------------
// Following
// ---------------------------------------------------------------------------

/// Works by artists the configured account follows.
pub struct PixivFollowingProvider {
    api: PixivApi,
}

impl PixivFollowingProvider {
    pub fn new(ctx: &ProviderContext) -> Self {
        Self {
            api: PixivApi::new(ctx),
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.api.endpoint = endpoint.into();
        self
    }

    async fn followed_users(&self, user_id: &str) -> Result<Vec<String>> {
        let path = format!("/ajax/user/{user_id}/following");
        let mut users = Vec::new();
        for page in 0..MAX_FOLLOWING_PAGES {
            let query = [
                ("offset", (page * FOLLOWING_PAGE_SIZE).to_string()),
                ("limit", FOLLOWING_PAGE_SIZE.to_string()),
                ("rest", "show".to_string()),
            ];
            let body: FollowingBody = self.api.get(&path, &query, "following list").await?;
            let fetched = body.users.len();
            users.extend(body.users.into_iter().map(|u| u.user_id));
            if fetched < FOLLOWING_PAGE_SIZE {
                break;
            }
        }
        Ok(users)
    }

    async fn illust_ids(&self, user_id: &str) -> Result<Vec<String>> {
        let body: ProfileBody = self
            .api
            .get(&format!("/ajax/user/{user_id}/profile/all"), &[], "user profile")
            .await?;
        Ok(body
            .illusts
            .as_object()
            .map(|illusts| illusts.keys().cloned().collect())
            .unwrap_or_default())
    }

    fn permitted(detail: &IllustDetail, request: &AcquisitionRequest) -> bool {
        let tags: Vec<String> = detail.tags.tags.iter().map(|t| t.tag.clone()).collect();
        (request.adult || !is_restricted(detail.x_restrict, &tags))
            && !(request.exclude_ai && detail.ai_type >= 2)
    }

    /// Eligible detail for a random work of one random followed artist.
    async fn pick_untagged(
        &self,
        users: &[String],
        request: &AcquisitionRequest,
    ) -> Result<IllustDetail> {
        let user = users
            .choose(&mut rand::thread_rng())
            .ok_or_else(|| Error::upstream("pixiv: not following anyone"))?;
        let mut ids = self.illust_ids(user).await?;
        ids.shuffle(&mut rand::thread_rng());

        for id in &ids {
            match self.api.illust_detail(id).await {
                Ok(detail) if Self::permitted(&detail, request) => return Ok(detail),
                Ok(_) => continue,
                Err(e) => debug!(id = %id, error = %e, "Skipping followed illust"),
            }
        }
        Err(Error::upstream(format!(
            "pixiv: no eligible illust from followed user {user}"
        )))
    }

    /// Scan up to [`MAX_USERS_CHECKED`] followed artists for works carrying
    /// every token, then pick one at random.
    async fn pick_tagged(
        &self,
        mut users: Vec<String>,
        tokens: &[String],
        request: &AcquisitionRequest,
    ) -> Result<IllustDetail> {
        users.shuffle(&mut rand::thread_rng());
        let mut matched: Vec<CandidateItem<IllustDetail>> = Vec::new();

        'users: for user in users.iter().take(MAX_USERS_CHECKED) {
            let ids = match self.illust_ids(user).await {
                Ok(ids) => ids,
                Err(e) => {
                    debug!(user = %user, error = %e, "Skipping followed user");
                    continue;
                }
            };
            for id in ids {
                let Ok(detail) = self.api.illust_detail(&id).await else {
                    continue;
                };
                if !Self::permitted(&detail, request) {
                    continue;
                }
                let candidate = CandidateItem {
                    id,
                    title: detail.title.clone(),
                    tags: detail.tags.tags.iter().map(|t| t.tag.clone()).collect(),
                    restricted: detail.x_restrict > 0,
                    payload: detail,
                };
                if candidate.matches_all(tokens) {
                    matched.push(candidate);
                    if matched.len() >= MAX_TAG_MATCHES {
                        break 'users;
                    }
                }
            }
        }

        if matched.is_empty() {
            return Err(Error::upstream(format!(
                "pixiv: no followed illust matches tags {}",
                tokens.join(", ")
            )));
        }
        let index = rand::thread_rng().gen_range(0..matched.len());
        Ok(matched.swap_remove(index).payload)
    }
}

#[async_trait]
impl ImageProvider for PixivFollowingProvider {
    fn meta(&self) -> ProviderMeta {
        ProviderMeta {
            name: "pfollowing",
            referer: Some(PIXIV_REFERER),
        }
    }

    fn configure(&mut self, config: Arc<Config>) {
        self.api.config = config;
    }

    /// Without tags, a random work of a random followed artist. With tags,
    /// a random work carrying all of them. There is no relaxation here.
    ///
    /// As with discovery, restricted works are admitted only when the job's
    /// `request.adult` draw came up, not whenever `is_r18` is set.
    async fn fetch_metadata(&self, request: &AcquisitionRequest) -> Result<ImageMetadata> {
        self.api.require_session()?;
        let user_id = self.api.config.pixiv.user_id.trim().to_string();
        if user_id.is_empty() {
            return Err(Error::upstream("pixiv: user_id is not configured"));
        }

        let users = self.followed_users(&user_id).await?;
        if users.is_empty() {
            return Err(Error::upstream("pixiv: not following anyone"));
        }

        let tokens = request.tag.as_deref().map(parse_tags).unwrap_or_default();
        let detail = if tokens.is_empty() {
            self.pick_untagged(&users, request).await?
        } else {
            self.pick_tagged(users, &tokens, request).await?
        };

        let original = detail
            .urls
            .original
            .clone()
            .ok_or_else(|| Error::upstream(format!("pixiv: illust {} has no image url", detail.id)))?;
        debug!(id = %detail.id, followed = true, "Picked followed illust");
        Ok(self.api.detail_metadata(detail, &original))
    }
}

// ---------------------------------------------------------------------------
// Fetch by id
// ---------------------------------------------------------------------------

/// One page of a specific Pixiv work.
pub struct PixivByIdProvider {
    api: PixivApi,
    pid: String,
    page: u32,
}

impl PixivByIdProvider {
    pub fn new(ctx: &ProviderContext, pid: impl Into<String>, page: u32) -> Self {
        Self {
            api: PixivApi::new(ctx),
            pid: pid.into(),
            page,
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.api.endpoint = endpoint.into();
        self
    }

    /// Same work, different page.
    pub fn for_page(&self, page: u32) -> Self {
        Self {
            api: self.api.clone(),
            pid: self.pid.clone(),
            page,
        }
    }

    /// Number of pages in the work.
    pub async fn page_count(&self) -> Result<u32> {
        self.api.require_session()?;
        let detail = self.api.illust_detail(&self.pid).await?;
        Ok(detail.page_count.unwrap_or(1).max(1))
    }
}

#[async_trait]
impl ImageProvider for PixivByIdProvider {
    fn meta(&self) -> ProviderMeta {
        ProviderMeta {
            name: "pixiv",
            referer: Some(PIXIV_REFERER),
        }
    }

    fn configure(&mut self, config: Arc<Config>) {
        self.api.config = config;
    }

    async fn fetch_metadata(&self, _request: &AcquisitionRequest) -> Result<ImageMetadata> {
        self.api.require_session()?;
        let detail = self.api.illust_detail(&self.pid).await?;

        let page_count = detail.page_count.unwrap_or(1).max(1);
        if self.page >= page_count {
            return Err(Error::PageOutOfRange {
                page: self.page,
                page_count,
            });
        }

        // Logged-out sessions get a detail body with null URLs.
        let source = detail
            .urls
            .original
            .as_deref()
            .or(detail.urls.regular.as_deref())
            .ok_or_else(|| Error::upstream(format!("pixiv: illust {} has no image url", self.pid)))?;
        let paged = page_url(source, self.page)
            .ok_or_else(|| Error::upstream(format!("pixiv: unexpected image url {source}")))?;

        debug!(pid = %self.pid, page = self.page, page_count, "Fetched pixiv page metadata");
        Ok(self.api.detail_metadata(detail, &paged))
    }
}
