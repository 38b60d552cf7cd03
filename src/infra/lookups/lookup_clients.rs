use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Client, StatusCode};
use serde::Deserialize;

use crate::core::lookups::{
    Comic, ComicProvider, JokeProvider, LookupError, WikiAnswer, WikiProvider,
};

fn api_err(e: impl std::fmt::Display) -> LookupError {
    LookupError::Api(e.to_string())
}

/// Shared HTTP client with the bot's user agent.
fn build_client() -> Result<Client, LookupError> {
    let mut headers = HeaderMap::new();
    headers.insert("User-Agent", HeaderValue::from_static("NanoBot/0.3"));

    Client::builder()
        .default_headers(headers)
        .timeout(std::time::Duration::from_secs(10))
        .build()
        .map_err(api_err)
}

// ============================================================================
// xkcd
// ============================================================================

#[derive(Debug, Deserialize)]
struct ApiComic {
    num: u32,
    #[serde(default)]
    safe_title: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    img: Option<String>,
    #[serde(default)]
    alt: Option<String>,
}

impl From<ApiComic> for Comic {
    fn from(api: ApiComic) -> Self {
        Comic {
            num: api.num,
            title: api
                .safe_title
                .or(api.title)
                .unwrap_or_else(|| format!("xkcd {}", api.num)),
            img: api.img.unwrap_or_default(),
            alt: api.alt.unwrap_or_default(),
        }
    }
}

pub struct XkcdClient {
    client: Client,
    base_url: String,
}

impl XkcdClient {
    pub fn new() -> Result<Self, LookupError> {
        Ok(Self {
            client: build_client()?,
            base_url: "https://xkcd.com".to_string(),
        })
    }

    async fn fetch(&self, url: &str) -> Result<Comic, LookupError> {
        let resp = self.client.get(url).send().await.map_err(api_err)?;

        if resp.status() == StatusCode::NOT_FOUND {
            return Err(LookupError::NotFound);
        }
        if !resp.status().is_success() {
            return Err(LookupError::Api(format!("xkcd returned {}", resp.status())));
        }

        let comic: ApiComic = resp.json().await.map_err(api_err)?;
        Ok(comic.into())
    }
}

#[async_trait]
impl ComicProvider for XkcdClient {
    async fn latest(&self) -> Result<Comic, LookupError> {
        self.fetch(&format!("{}/info.0.json", self.base_url)).await
    }

    async fn by_number(&self, num: u32) -> Result<Comic, LookupError> {
        self.fetch(&format!("{}/{}/info.0.json", self.base_url, num))
            .await
    }
}

// ============================================================================
// Chuck Norris jokes
// ============================================================================

pub struct ChuckNorrisClient {
    client: Client,
    url: String,
}

impl ChuckNorrisClient {
    pub fn new() -> Result<Self, LookupError> {
        Ok(Self {
            client: build_client()?,
            url: "https://api.chucknorris.io/jokes/random".to_string(),
        })
    }
}

#[async_trait]
impl JokeProvider for ChuckNorrisClient {
    async fn random_joke(&self) -> Result<String, LookupError> {
        let resp = self.client.get(&self.url).send().await.map_err(api_err)?;

        if !resp.status().is_success() {
            return Err(LookupError::Api(format!(
                "joke API returned {}",
                resp.status()
            )));
        }

        let json: serde_json::Value = resp.json().await.map_err(api_err)?;
        json["value"]
            .as_str()
            .map(str::to_string)
            .ok_or(LookupError::NotFound)
    }
}

// ============================================================================
// Wikipedia
// ============================================================================

#[derive(Debug, Deserialize)]
struct ApiSummary {
    #[serde(rename = "type", default)]
    kind: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    extract: Option<String>,
}

fn summary_to_answer(term: &str, api: ApiSummary) -> WikiAnswer {
    if api.kind.as_deref() == Some("disambiguation") {
        return WikiAnswer::Ambiguous;
    }
    match api.extract.filter(|e| !e.trim().is_empty()) {
        Some(extract) => WikiAnswer::Summary {
            title: api.title.unwrap_or_else(|| term.to_string()),
            extract,
        },
        None => WikiAnswer::NotFound,
    }
}

pub struct WikipediaClient {
    client: Client,
    base_url: String,
}

impl WikipediaClient {
    pub fn new() -> Result<Self, LookupError> {
        Ok(Self {
            client: build_client()?,
            base_url: "https://en.wikipedia.org/api/rest_v1/page/summary".to_string(),
        })
    }
}

#[async_trait]
impl WikiProvider for WikipediaClient {
    async fn summary(&self, term: &str) -> Result<WikiAnswer, LookupError> {
        let title = term.trim().replace(' ', "_");
        let mut url = reqwest::Url::parse(&self.base_url).map_err(api_err)?;
        url.path_segments_mut()
            .map_err(|_| LookupError::Api("invalid base url".to_string()))?
            .push(&title);

        let resp = self
            .client
            .get(url)
            .query(&[("redirect", "true")])
            .send()
            .await
            .map_err(api_err)?;

        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(WikiAnswer::NotFound);
        }
        if !resp.status().is_success() {
            return Err(LookupError::Api(format!(
                "Wikipedia returned {}",
                resp.status()
            )));
        }

        let api: ApiSummary = resp.json().await.map_err(api_err)?;
        Ok(summary_to_answer(term, api))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_comic_from_api() {
        let api: ApiComic = serde_json::from_str(
            r#"{"num": 353, "safe_title": "Python", "title": "Python", "img": "https://imgs.xkcd.com/comics/python.png", "alt": "I wrote 20 short programs"}"#,
        )
        .unwrap();
        let comic: Comic = api.into();

        assert_eq!(comic.num, 353);
        assert_eq!(comic.title, "Python");
        assert_eq!(comic.link(), "https://xkcd.com/353");
    }

    #[test]
    fn test_summary_mapping() {
        let ambiguous: ApiSummary =
            serde_json::from_str(r#"{"type": "disambiguation", "title": "Mercury"}"#).unwrap();
        assert_eq!(summary_to_answer("mercury", ambiguous), WikiAnswer::Ambiguous);

        let standard: ApiSummary = serde_json::from_str(
            r#"{"type": "standard", "title": "Rust (programming language)", "extract": "Rust is a language."}"#,
        )
        .unwrap();
        assert_eq!(
            summary_to_answer("rust", standard),
            WikiAnswer::Summary {
                title: "Rust (programming language)".to_string(),
                extract: "Rust is a language.".to_string(),
            }
        );

        let empty: ApiSummary = serde_json::from_str(r#"{"type": "standard"}"#).unwrap();
        assert_eq!(summary_to_answer("x", empty), WikiAnswer::NotFound);
    }
}
