use image::DynamicImage;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::io::Cursor;
use std::time::Duration;

use super::error::CatalogError;
use super::settings::ImageQuality;
use crate::config::ApiConfig;

const INCLUDES: &str = "includes[]=cover_art&includes[]=author&includes[]=artist";
const NO_DESCRIPTION: &str = "No description available";
const UNKNOWN: &str = "Unknown";

/// A catalog entry normalized from one `/manga` record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComicRecord {
    pub id: String,
    pub title: String,
    pub description: String,
    pub status: String,
    pub year: Option<u32>,
    pub tags: Vec<String>,
    pub original_language: String,
    pub demographic: Option<String>,
    pub cover_url: Option<String>,
    pub author: String,
    pub artist: String,
    /// Last published chapter number as reported by the API
    pub chapter_count: Option<String>,
    /// Content rating (`safe`, `suggestive`, ...)
    pub rating: String,
}

/// Page files served by an at-home node for one chapter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChapterPageSet {
    pub base_url: String,
    pub hash: String,
    pub pages: Vec<String>,
    pub data_saver_pages: Vec<String>,
}

impl ChapterPageSet {
    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    /// URL of a 1-based page, `None` when out of range.
    pub fn page_url(&self, page: usize, quality: ImageQuality) -> Option<String> {
        let index = page.checked_sub(1)?;
        let (segment, files) = match quality {
            ImageQuality::High => ("data", &self.pages),
            ImageQuality::DataSaver => ("data-saver", &self.data_saver_pages),
        };
        // Some nodes omit compressed files; fall back to the originals.
        let (segment, file) = match files.get(index) {
            Some(file) => (segment, file),
            None => ("data", self.pages.get(index)?),
        };
        Some(format!("{}/{}/{}/{}", self.base_url, segment, self.hash, file))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChapterSummary {
    pub id: String,
    pub chapter: String,
    pub title: String,
    pub volume: Option<String>,
    pub pages: usize,
    pub publish_at: Option<String>,
}

/// The three origin-language shelves shown on the home screen.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Shelves {
    pub manga: Vec<ComicRecord>,
    pub manhwa: Vec<ComicRecord>,
    pub manhua: Vec<ComicRecord>,
}

#[derive(Debug, Deserialize)]
struct MangaData {
    id: String,
    attributes: MangaAttributes,
    #[serde(default)]
    relationships: Vec<Relationship>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MangaAttributes {
    title: Localized,
    #[serde(default)]
    description: Localized,
    status: Option<String>,
    year: Option<u32>,
    #[serde(default)]
    tags: Vec<Tag>,
    original_language: Option<String>,
    publication_demographic: Option<String>,
    last_chapter: Option<String>,
    content_rating: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Tag {
    attributes: TagAttributes,
}

#[derive(Debug, Deserialize)]
struct TagAttributes {
    #[serde(default)]
    name: Localized,
}

#[derive(Debug, Deserialize)]
struct Relationship {
    #[serde(rename = "type")]
    rel_type: String,
    attributes: Option<RelationshipAttributes>,
}

#[derive(Debug, Deserialize)]
struct RelationshipAttributes {
    name: Option<String>,
    #[serde(rename = "fileName")]
    file_name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AtHomeResponse {
    base_url: String,
    chapter: AtHomeChapter,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AtHomeChapter {
    hash: String,
    data: Vec<String>,
    #[serde(default)]
    data_saver: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ChapterFeed {
    data: Vec<ChapterData>,
}

#[derive(Debug, Deserialize)]
struct ChapterData {
    id: String,
    attributes: ChapterAttributes,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChapterAttributes {
    chapter: Option<String>,
    title: Option<String>,
    volume: Option<String>,
    #[serde(default)]
    pages: usize,
    publish_at: Option<String>,
}

/// Language-keyed strings in the order the API sent them.
#[derive(Debug, Default)]
struct Localized(Vec<(String, String)>);

impl Localized {
    fn get(&self, lang: &str) -> Option<&String> {
        self.0.iter().find(|(l, _)| l == lang).map(|(_, text)| text)
    }

    fn first(&self) -> Option<&String> {
        self.0.first().map(|(_, text)| text)
    }
}

impl<'de> Deserialize<'de> for Localized {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        // MangaDex serializes an empty localized string as `[]` instead of `{}`.
        let value = Option::<Value>::deserialize(deserializer)?;
        Ok(match value {
            Some(Value::Object(map)) => Localized(
                map.into_iter()
                    .filter_map(|(lang, text)| text.as_str().map(|t| (lang, t.to_string())))
                    .collect(),
            ),
            _ => Localized::default(),
        })
    }
}

fn relationship_name(relationships: &[Relationship], rel_type: &str) -> String {
    relationships
        .iter()
        .find(|r| r.rel_type == rel_type)
        .and_then(|r| r.attributes.as_ref())
        .and_then(|a| a.name.clone())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| UNKNOWN.to_string())
}

fn normalize(raw: MangaData, uploads_url: &str) -> Result<ComicRecord, CatalogError> {
    let attrs = raw.attributes;

    let title = attrs
        .title
        .get("en")
        .or_else(|| attrs.title.get("ja"))
        .or_else(|| attrs.title.first())
        .cloned()
        .ok_or_else(|| CatalogError::DataShape(format!("manga {} has no title", raw.id)))?;

    let description = attrs
        .description
        .get("en")
        .or_else(|| attrs.description.get("id"))
        .filter(|d| !d.is_empty())
        .cloned()
        .unwrap_or_else(|| NO_DESCRIPTION.to_string());

    let cover_url = raw
        .relationships
        .iter()
        .find(|r| r.rel_type == "cover_art")
        .and_then(|r| r.attributes.as_ref())
        .and_then(|a| a.file_name.as_deref())
        .map(|file| format!("{}/covers/{}/{}", uploads_url, raw.id, file));
    if cover_url.is_none() {
        log::debug!("manga {} has no cover_art relationship", raw.id);
    }

    let tags = attrs
        .tags
        .into_iter()
        .filter_map(|tag| {
            let name = tag.attributes.name;
            name.get("en").or_else(|| name.first()).cloned()
        })
        .collect();

    Ok(ComicRecord {
        author: relationship_name(&raw.relationships, "author"),
        artist: relationship_name(&raw.relationships, "artist"),
        id: raw.id,
        title,
        description,
        status: attrs.status.unwrap_or_else(|| UNKNOWN.to_string()),
        year: attrs.year,
        tags,
        original_language: attrs.original_language.unwrap_or_default(),
        demographic: attrs.publication_demographic,
        cover_url,
        chapter_count: attrs.last_chapter,
        rating: attrs.content_rating.unwrap_or_else(|| UNKNOWN.to_string()),
    })
}

fn parse_manga(value: Value, uploads_url: &str) -> Result<ComicRecord, CatalogError> {
    let raw: MangaData =
        serde_json::from_value(value).map_err(|e| CatalogError::DataShape(e.to_string()))?;
    normalize(raw, uploads_url)
}

/// Parses a `/manga` listing. Malformed entries are skipped; a body without a
/// `data` array is rejected.
fn parse_manga_list(body: Value, uploads_url: &str) -> Result<Vec<ComicRecord>, CatalogError> {
    let Value::Object(mut body) = body else {
        return Err(CatalogError::DataShape("response is not an object".into()));
    };
    let Some(Value::Array(items)) = body.remove("data") else {
        return Err(CatalogError::DataShape("response has no data array".into()));
    };

    Ok(items
        .into_iter()
        .filter_map(|item| match parse_manga(item, uploads_url) {
            Ok(record) => Some(record),
            Err(e) => {
                log::warn!("Skipping catalog entry: {}", e);
                None
            }
        })
        .collect())
}

fn parse_manga_detail(mut body: Value, uploads_url: &str) -> Result<ComicRecord, CatalogError> {
    match body.get_mut("data").map(Value::take) {
        Some(data) if data.is_object() => parse_manga(data, uploads_url),
        _ => Err(CatalogError::DataShape("response has no data object".into())),
    }
}

fn parse_chapter_pages(body: Value) -> Result<ChapterPageSet, CatalogError> {
    let response: AtHomeResponse =
        serde_json::from_value(body).map_err(|e| CatalogError::DataShape(e.to_string()))?;
    Ok(ChapterPageSet {
        base_url: response.base_url,
        hash: response.chapter.hash,
        pages: response.chapter.data,
        data_saver_pages: response.chapter.data_saver,
    })
}

fn parse_chapter_feed(body: Value) -> Result<Vec<ChapterSummary>, CatalogError> {
    let feed: ChapterFeed =
        serde_json::from_value(body).map_err(|e| CatalogError::DataShape(e.to_string()))?;
    Ok(feed
        .data
        .into_iter()
        .filter(|c| c.attributes.pages > 0)
        .map(|c| ChapterSummary {
            id: c.id,
            chapter: c.attributes.chapter.unwrap_or_else(|| "0".to_string()),
            title: c.attributes.title.unwrap_or_else(|| "No Title".to_string()),
            volume: c.attributes.volume,
            pages: c.attributes.pages,
            publish_at: c.attributes.publish_at,
        })
        .collect())
}

fn decode_image(bytes: &[u8]) -> Result<DynamicImage, CatalogError> {
    Ok(image::ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| CatalogError::DataShape(format!("unreadable image: {}", e)))?
        .decode()?)
}

fn is_retryable_status(status: reqwest::StatusCode) -> bool {
    matches!(status.as_u16(), 429 | 500 | 502 | 503 | 504)
}

#[derive(Clone)]
pub struct MangaDexClient {
    client: reqwest::Client,
    config: ApiConfig,
}

impl MangaDexClient {
    pub fn new(config: ApiConfig) -> Result<Self, CatalogError> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(config.request_timeout())
            .build()?;
        Ok(Self { client, config })
    }

    fn retry_delay(&self, attempt: usize) -> Duration {
        let factor = 2u64.saturating_pow(attempt as u32);
        Duration::from_millis(
            self.config
                .initial_retry_delay_ms
                .saturating_mul(factor)
                .min(self.config.max_retry_delay_ms),
        )
    }

    async fn send(&self, url: &str) -> Result<reqwest::Response, CatalogError> {
        let mut attempt = 0;
        loop {
            match self.client.get(url).send().await {
                Ok(response) if response.status().is_success() => return Ok(response),
                Ok(response) => {
                    let status = response.status();
                    if !is_retryable_status(status) || attempt >= self.config.max_retries {
                        return Err(CatalogError::Status(status));
                    }
                    log::warn!("GET {} returned {}, retrying", url, status);
                }
                Err(e) => {
                    if attempt >= self.config.max_retries {
                        return Err(e.into());
                    }
                    log::warn!("GET {} failed: {}, retrying", url, e);
                }
            }
            tokio::time::sleep(self.retry_delay(attempt)).await;
            attempt += 1;
        }
    }

    async fn get_json(&self, url: &str) -> Result<Value, CatalogError> {
        log::debug!("GET {}", url);
        let body = self.send(url).await?.bytes().await?;
        serde_json::from_slice(&body)
            .map_err(|e| CatalogError::DataShape(format!("body is not JSON: {}", e)))
    }

    fn list_url(&self, limit: u32, filter: &str, order: &str) -> String {
        format!(
            "{}/manga?limit={}{}&availableTranslatedLanguage[]={}&order[{}]=desc&{}",
            self.config.base_url,
            limit,
            filter,
            urlencoding::encode(&self.config.translated_language),
            order,
            INCLUDES
        )
    }

    async fn fetch_list(&self, url: &str, what: &str) -> Option<Vec<ComicRecord>> {
        let result = match self.get_json(url).await {
            Ok(body) => parse_manga_list(body, &self.config.uploads_url),
            Err(e) => Err(e),
        };
        match result {
            Ok(records) => Some(records),
            Err(e) => {
                log::error!("Error fetching {}: {}", what, e);
                None
            }
        }
    }

    /// Latest-updated titles for a publication demographic (`shounen`, `seinen`, ...).
    pub async fn fetch_by_demographic(&self, demographic: &str, limit: u32) -> Option<Vec<ComicRecord>> {
        let filter = format!("&publicationDemographic[]={}", urlencoding::encode(demographic));
        let url = self.list_url(limit, &filter, "latestUploadedChapter");
        self.fetch_list(&url, demographic).await
    }

    /// Latest-updated titles originally published in `lang` (`ja`, `ko`, `zh`).
    pub async fn fetch_by_origin_language(&self, lang: &str, limit: u32) -> Option<Vec<ComicRecord>> {
        let filter = format!("&originalLanguage[]={}", urlencoding::encode(lang));
        let url = self.list_url(limit, &filter, "latestUploadedChapter");
        self.fetch_list(&url, &format!("{} comics", lang)).await
    }

    pub async fn search(&self, query: &str, limit: u32) -> Option<Vec<ComicRecord>> {
        let filter = format!("&title={}", urlencoding::encode(query));
        let url = self.list_url(limit, &filter, "relevance");
        self.fetch_list(&url, "search results").await
    }

    pub async fn fetch_popular(&self, limit: u32) -> Vec<ComicRecord> {
        let url = self.list_url(limit, "", "followedCount");
        self.fetch_list(&url, "popular manga").await.unwrap_or_default()
    }

    /// Manga, manhwa and manhua shelves. A failed bucket comes back empty.
    pub async fn fetch_all_comics(&self, limit: u32) -> Shelves {
        log::info!("Fetching manga, manhwa and manhua shelves");
        let (manga, manhwa, manhua) = futures::join!(
            self.fetch_by_origin_language("ja", limit),
            self.fetch_by_origin_language("ko", limit),
            self.fetch_by_origin_language("zh", limit),
        );
        Shelves {
            manga: manga.unwrap_or_default(),
            manhwa: manhwa.unwrap_or_default(),
            manhua: manhua.unwrap_or_default(),
        }
    }

    pub async fn fetch_details(&self, manga_id: &str) -> Option<ComicRecord> {
        let url = format!(
            "{}/manga/{}?{}",
            self.config.base_url,
            urlencoding::encode(manga_id),
            INCLUDES
        );
        let result = match self.get_json(&url).await {
            Ok(body) => parse_manga_detail(body, &self.config.uploads_url),
            Err(e) => Err(e),
        };
        result
            .map_err(|e| log::error!("Error fetching manga details for {}: {}", manga_id, e))
            .ok()
    }

    pub async fn fetch_chapter_pages(&self, chapter_id: &str) -> Option<ChapterPageSet> {
        let url = format!(
            "{}/at-home/server/{}",
            self.config.base_url,
            urlencoding::encode(chapter_id)
        );
        let result = match self.get_json(&url).await {
            Ok(body) => parse_chapter_pages(body),
            Err(e) => Err(e),
        };
        result
            .map_err(|e| log::error!("Error fetching chapter data for {}: {}", chapter_id, e))
            .ok()
    }

    pub async fn fetch_chapters(&self, manga_id: &str, limit: u32) -> Vec<ChapterSummary> {
        let url = format!(
            "{}/manga/{}/feed?translatedLanguage[]={}&order[chapter]=desc&limit={}",
            self.config.base_url,
            urlencoding::encode(manga_id),
            urlencoding::encode(&self.config.translated_language),
            limit
        );
        let result = match self.get_json(&url).await {
            Ok(body) => parse_chapter_feed(body),
            Err(e) => Err(e),
        };
        result
            .map_err(|e| log::error!("Error fetching chapters for {}: {}", manga_id, e))
            .unwrap_or_default()
    }

    pub async fn fetch_image(&self, url: &str) -> Option<DynamicImage> {
        let result = match self.send(url).await {
            Ok(response) => match response.bytes().await {
                Ok(bytes) => decode_image(&bytes),
                Err(e) => Err(e.into()),
            },
            Err(e) => Err(e),
        };
        result
            .map_err(|e| log::error!("Error loading image {}: {}", url, e))
            .ok()
    }

    pub async fn fetch_cover(&self, cover_url: &str) -> Option<DynamicImage> {
        // 256px thumbnails keep the shelves responsive
        self.fetch_image(&format!("{}.256.jpg", cover_url)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    const UPLOADS: &str = "https://uploads.mangadex.org";

    fn sample_manga() -> Value {
        json!({
            "id": "m-1",
            "type": "manga",
            "attributes": {
                "title": {"ja-ro": "Sono Bisque", "en": "My Dress-Up Darling"},
                "description": {"id": "Deskripsi", "en": "A story about cosplay."},
                "status": "ongoing",
                "year": 2018,
                "originalLanguage": "ja",
                "publicationDemographic": "seinen",
                "lastChapter": "112",
                "contentRating": "suggestive",
                "tags": [
                    {"id": "t1", "attributes": {"name": {"en": "Romance"}}},
                    {"id": "t2", "attributes": {"name": {"en": "Comedy"}}}
                ]
            },
            "relationships": [
                {"id": "a1", "type": "author", "attributes": {"name": "Fukuda Shinichi"}},
                {"id": "c1", "type": "cover_art", "attributes": {"fileName": "cover.jpg"}}
            ]
        })
    }

    #[test]
    fn normalizes_full_record() {
        let record = parse_manga(sample_manga(), UPLOADS).unwrap();
        assert_eq!(record.title, "My Dress-Up Darling");
        assert_eq!(record.description, "A story about cosplay.");
        assert_eq!(record.year, Some(2018));
        assert_eq!(record.tags, vec!["Romance", "Comedy"]);
        assert_eq!(record.demographic.as_deref(), Some("seinen"));
        assert_eq!(
            record.cover_url.as_deref(),
            Some("https://uploads.mangadex.org/covers/m-1/cover.jpg")
        );
        assert_eq!(record.author, "Fukuda Shinichi");
        assert_eq!(record.artist, "Unknown");
        assert_eq!(record.chapter_count.as_deref(), Some("112"));
        assert_eq!(record.rating, "suggestive");
    }

    #[test]
    fn title_and_description_fallbacks() {
        let mut raw = sample_manga();
        raw["attributes"]["title"] = json!({"ko": "나 혼자만 레벨업", "ja": "俺だけレベルアップな件"});
        raw["attributes"]["description"] = json!({"id": "Deskripsi"});
        let record = parse_manga(raw, UPLOADS).unwrap();
        assert_eq!(record.title, "俺だけレベルアップな件");
        assert_eq!(record.description, "Deskripsi");

        let mut raw = sample_manga();
        raw["attributes"]["title"] = json!({"ko": "나 혼자만 레벨업"});
        raw["attributes"]["description"] = json!([]);
        let record = parse_manga(raw, UPLOADS).unwrap();
        assert_eq!(record.title, "나 혼자만 레벨업");
        assert_eq!(record.description, NO_DESCRIPTION);
    }

    #[test]
    fn first_available_title_follows_document_order() {
        let mut raw = sample_manga();
        raw["attributes"]["title"] = json!({
            "ko": "전지적 독자 시점",
            "ko-ro": "Jeonjijeok Dokja Sijeom",
            "zh": "全知读者视角",
            "fr": "Omniscient Reader"
        });
        raw["attributes"]["tags"] = json!([
            {"id": "t1", "attributes": {"name": {"ko": "액션", "fr": "Action", "de": "Aktion"}}}
        ]);

        for _ in 0..16 {
            let record = parse_manga(raw.clone(), UPLOADS).unwrap();
            assert_eq!(record.title, "전지적 독자 시점");
            assert_eq!(record.tags, vec!["액션"]);
        }

        // the same record through a listing body
        let body = json!({"data": [raw]});
        let records = parse_manga_list(body, UPLOADS).unwrap();
        assert_eq!(records[0].title, "전지적 독자 시점");
    }

    #[test]
    fn missing_cover_is_none() {
        let mut raw = sample_manga();
        raw["relationships"] = json!([]);
        let record = parse_manga(raw, UPLOADS).unwrap();
        assert_eq!(record.cover_url, None);
        assert_eq!(record.author, "Unknown");
    }

    #[test]
    fn empty_title_is_data_shape_failure() {
        let mut raw = sample_manga();
        raw["attributes"]["title"] = json!({});
        assert!(matches!(parse_manga(raw, UPLOADS), Err(CatalogError::DataShape(_))));

        let mut raw = sample_manga();
        raw.as_object_mut().unwrap().remove("attributes");
        assert!(matches!(parse_manga(raw, UPLOADS), Err(CatalogError::DataShape(_))));
    }

    #[test]
    fn list_skips_malformed_entries() {
        let body = json!({"result": "ok", "data": [sample_manga(), {"id": "broken"}]});
        let records = parse_manga_list(body, UPLOADS).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, "m-1");

        let body = json!({"result": "error", "errors": []});
        assert!(parse_manga_list(body, UPLOADS).is_err());
    }

    #[test]
    fn page_urls_follow_quality() {
        let set = parse_chapter_pages(json!({
            "result": "ok",
            "baseUrl": "https://node.example",
            "chapter": {"hash": "abc", "data": ["1.png", "2.png"], "dataSaver": ["1.jpg"]}
        }))
        .unwrap();

        assert_eq!(set.len(), 2);
        assert_eq!(
            set.page_url(1, ImageQuality::High).as_deref(),
            Some("https://node.example/data/abc/1.png")
        );
        assert_eq!(
            set.page_url(1, ImageQuality::DataSaver).as_deref(),
            Some("https://node.example/data-saver/abc/1.jpg")
        );
        assert_eq!(
            set.page_url(2, ImageQuality::DataSaver).as_deref(),
            Some("https://node.example/data/abc/2.png")
        );
        assert_eq!(set.page_url(0, ImageQuality::High), None);
        assert_eq!(set.page_url(3, ImageQuality::High), None);
    }

    #[test]
    fn chapter_feed_drops_empty_chapters() {
        let chapters = parse_chapter_feed(json!({
            "data": [
                {"id": "c2", "attributes": {"chapter": "2", "title": null, "volume": "1", "pages": 20, "publishAt": "2024-01-02T00:00:00+00:00"}},
                {"id": "c-ext", "attributes": {"chapter": "1.5", "title": "Extra", "volume": null, "pages": 0}}
            ]
        }))
        .unwrap();
        assert_eq!(chapters.len(), 1);
        assert_eq!(chapters[0].title, "No Title");
        assert_eq!(chapters[0].pages, 20);
    }

    struct StubServer {
        base_url: String,
        hits: Arc<AtomicUsize>,
    }

    /// Serves the same status and body to every request.
    fn spawn_stub(status: u16, body: &'static str) -> StubServer {
        let server = tiny_http::Server::http("127.0.0.1:0").expect("start stub server");
        let base_url = format!("http://{}", server.server_addr());
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();

        thread::spawn(move || {
            for request in server.incoming_requests() {
                counter.fetch_add(1, Ordering::SeqCst);
                let header = tiny_http::Header::from_bytes("Content-Type", "application/json").unwrap();
                let _ = request.respond(
                    tiny_http::Response::from_string(body)
                        .with_status_code(status)
                        .with_header(header),
                );
            }
        });

        StubServer { base_url, hits }
    }

    fn client_for(stub: &StubServer) -> MangaDexClient {
        MangaDexClient::new(ApiConfig {
            base_url: stub.base_url.clone(),
            max_retries: 1,
            initial_retry_delay_ms: 1,
            max_retry_delay_ms: 2,
            ..ApiConfig::default()
        })
        .unwrap()
    }

    #[tokio::test]
    async fn server_error_becomes_none_after_retry() {
        let stub = spawn_stub(500, r#"{"result":"error"}"#);
        let client = client_for(&stub);

        assert!(client.search("one piece", 10).await.is_none());
        assert!(client.fetch_popular(10).await.is_empty());
        // one retry per call
        assert_eq!(stub.hits.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn not_found_is_not_retried() {
        let stub = spawn_stub(404, r#"{"result":"error"}"#);
        let client = client_for(&stub);

        assert!(client.fetch_details("missing").await.is_none());
        assert!(client.fetch_chapter_pages("missing").await.is_none());
        assert_eq!(stub.hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn malformed_body_becomes_empty() {
        let stub = spawn_stub(200, r#"{"result":"ok"}"#);
        let client = client_for(&stub);

        assert!(client.fetch_by_demographic("shounen", 5).await.is_none());
        assert_eq!(client.fetch_all_comics(5).await, Shelves::default());
        assert!(client.fetch_chapters("m-1", 10).await.is_empty());
    }

    #[tokio::test]
    async fn non_json_success_body_is_a_shape_error() {
        let stub = spawn_stub(200, "<html>maintenance</html>");
        let client = client_for(&stub);

        let url = format!("{}/manga", stub.base_url);
        let err = client.get_json(&url).await.unwrap_err();
        assert!(matches!(err, CatalogError::DataShape(_)), "{err:?}");
        // a bad body is not retried like a transport failure
        assert_eq!(stub.hits.load(Ordering::SeqCst), 1);
        assert!(client.fetch_by_demographic("seinen", 5).await.is_none());
    }

    #[tokio::test]
    async fn demographic_listing_is_normalized() {
        let stub = spawn_stub(
            200,
            r#"{"result":"ok","data":[{"id":"m-3","attributes":{"title":{"ja-ro":"Vagabond"},"status":"completed","tags":[]},"relationships":[]}]}"#,
        );
        let client = client_for(&stub);

        let records = client.fetch_by_demographic("seinen", 5).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].title, "Vagabond");
        assert_eq!(records[0].cover_url, None);
    }

    #[tokio::test]
    async fn successful_listing_is_normalized() {
        let stub = spawn_stub(
            200,
            r#"{"result":"ok","data":[{"id":"m-9","attributes":{"title":{"en":"Blue Lock"},"description":{},"status":"ongoing","tags":[]},"relationships":[{"type":"cover_art","attributes":{"fileName":"bl.png"}}]}]}"#,
        );
        let client = client_for(&stub);

        let records = client.fetch_by_origin_language("ja", 5).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].title, "Blue Lock");
        assert_eq!(
            records[0].cover_url.as_deref(),
            Some("https://uploads.mangadex.org/covers/m-9/bl.png")
        );
    }

    #[test]
    fn list_url_carries_filters() {
        let client = MangaDexClient::new(ApiConfig::default()).unwrap();
        let url = client.list_url(10, "&title=solo%20leveling", "relevance");
        assert_eq!(
            url,
            "https://api.mangadex.org/manga?limit=10&title=solo%20leveling&availableTranslatedLanguage[]=id&order[relevance]=desc&includes[]=cover_art&includes[]=author&includes[]=artist"
        );
    }
}
