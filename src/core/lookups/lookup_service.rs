use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use thiserror::Error;
use tokio::sync::RwLock;

/// How often the number of the newest comic is refreshed.
pub const XKCD_REFRESH_INTERVAL: Duration = Duration::from_secs(6 * 60 * 60);

/// Errors raised by the third-party lookups.
#[derive(Debug, Error)]
pub enum LookupError {
    #[error("Lookup API error: {0}")]
    Api(String),
    #[error("Nothing found")]
    NotFound,
}

/// A single xkcd comic.
#[derive(Debug, Clone, PartialEq)]
pub struct Comic {
    pub num: u32,
    pub title: String,
    pub img: String,
    pub alt: String,
}

impl Comic {
    pub fn link(&self) -> String {
        format!("https://xkcd.com/{}", self.num)
    }
}

/// Short encyclopedia summary of a term.
#[derive(Debug, Clone, PartialEq)]
pub enum WikiAnswer {
    Summary { title: String, extract: String },
    /// The term has several meanings
    Ambiguous,
    NotFound,
}

#[async_trait]
pub trait ComicProvider: Send + Sync {
    async fn latest(&self) -> Result<Comic, LookupError>;
    async fn by_number(&self, num: u32) -> Result<Comic, LookupError>;
}

#[async_trait]
pub trait JokeProvider: Send + Sync {
    async fn random_joke(&self) -> Result<String, LookupError>;
}

#[async_trait]
pub trait WikiProvider: Send + Sync {
    async fn summary(&self, term: &str) -> Result<WikiAnswer, LookupError>;
}

/// xkcd lookups with an in-memory cache of every comic fetched so far.
pub struct XkcdService {
    provider: Arc<dyn ComicProvider>,
    cache: RwLock<HashMap<u32, Comic>>,
    /// Number of the newest comic, 0 until the first refresh
    last_num: AtomicU32,
}

impl XkcdService {
    pub fn new(provider: Arc<dyn ComicProvider>) -> Self {
        Self {
            provider,
            cache: RwLock::new(HashMap::new()),
            last_num: AtomicU32::new(0),
        }
    }

    async fn remember(&self, comic: &Comic) {
        self.cache
            .write()
            .await
            .entry(comic.num)
            .or_insert_with(|| comic.clone());
    }

    /// Fetch the newest comic and remember its number.
    pub async fn refresh_latest(&self) -> Result<u32, LookupError> {
        let comic = self.provider.latest().await?;
        self.last_num.store(comic.num, Ordering::Relaxed);
        self.remember(&comic).await;
        tracing::debug!(num = comic.num, "Updated latest xkcd number");
        Ok(comic.num)
    }

    pub fn last_num(&self) -> u32 {
        self.last_num.load(Ordering::Relaxed)
    }

    pub async fn get_latest(&self) -> Result<Comic, LookupError> {
        let last = self.last_num();
        if last != 0 {
            if let Some(comic) = self.cache.read().await.get(&last) {
                return Ok(comic.clone());
            }
        }
        let num = self.refresh_latest().await?;
        self.get_by_number(num).await
    }

    pub async fn get_by_number(&self, num: u32) -> Result<Comic, LookupError> {
        if let Some(comic) = self.cache.read().await.get(&num) {
            return Ok(comic.clone());
        }

        let last = self.last_num();
        if num == 0 || (last != 0 && num > last) {
            return Err(LookupError::NotFound);
        }

        let comic = self.provider.by_number(num).await?;
        self.remember(&comic).await;
        Ok(comic)
    }

    pub async fn get_random(&self) -> Result<Comic, LookupError> {
        let mut last = self.last_num();
        if last == 0 {
            last = self.refresh_latest().await?;
        }
        let num = rand::thread_rng().gen_range(1..=last);
        self.get_by_number(num).await
    }

    pub async fn cached(&self) -> usize {
        self.cache.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    /// Serves comics 1..=latest and counts how often it was called.
    struct FakeComics {
        latest: u32,
        calls: AtomicUsize,
    }

    fn comic(num: u32) -> Comic {
        Comic {
            num,
            title: format!("Comic {}", num),
            img: format!("https://imgs.xkcd.com/{}.png", num),
            alt: "alt".to_string(),
        }
    }

    #[async_trait]
    impl ComicProvider for FakeComics {
        async fn latest(&self) -> Result<Comic, LookupError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(comic(self.latest))
        }

        async fn by_number(&self, num: u32) -> Result<Comic, LookupError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if num > self.latest {
                return Err(LookupError::NotFound);
            }
            Ok(comic(num))
        }
    }

    fn service(latest: u32) -> (Arc<FakeComics>, XkcdService) {
        let provider = Arc::new(FakeComics {
            latest,
            calls: AtomicUsize::new(0),
        });
        (provider.clone(), XkcdService::new(provider))
    }

    #[tokio::test]
    async fn test_latest_is_cached() {
        let (provider, service) = service(100);

        assert_eq!(service.get_latest().await.unwrap().num, 100);
        assert_eq!(service.get_latest().await.unwrap().num, 100);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
        assert_eq!(service.last_num(), 100);
    }

    #[tokio::test]
    async fn test_by_number_uses_cache() {
        let (provider, service) = service(100);
        service.refresh_latest().await.unwrap();

        let first = service.get_by_number(42).await.unwrap();
        let second = service.get_by_number(42).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first.link(), "https://xkcd.com/42");
        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
        assert_eq!(service.cached().await, 2);
    }

    #[tokio::test]
    async fn test_out_of_range_numbers() {
        let (_provider, service) = service(100);
        service.refresh_latest().await.unwrap();

        assert!(matches!(
            service.get_by_number(0).await,
            Err(LookupError::NotFound)
        ));
        assert!(matches!(
            service.get_by_number(101).await,
            Err(LookupError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_random_in_range() {
        let (_provider, service) = service(5);
        for _ in 0..10 {
            let comic = service.get_random().await.unwrap();
            assert!((1..=5).contains(&comic.num));
        }
    }
}
