//! Stream resolution: page body and player script in, signed streams out

use crate::core::video_info::{ResolvedStream, VideoInfo};
use crate::error::{CipherStage, TubemapError};
use crate::platform::cipher::CipherProgram;
use crate::platform::client::{Fetcher, HttpClientConfig, HttpFetcher};
use crate::platform::extractor::{parse_player_config, DEFAULT_CONFIG_MARKER};
use crate::platform::formats::{lookup_format, sort_streams};
use crate::platform::stream_map::{parse_stream_map, RawStreamEntry, StreamMap};
use crate::utils::cache::PlayerCache;
use crate::utils::url::{
    append_signature, extract_video_id, has_signature, itag_from_url, normalize_player_url,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Resolver configuration
#[derive(Debug, Clone)]
pub struct ResolverOptions {
    /// Literal preceding the player config object in the page
    pub marker: String,
    /// HTTP settings for the default fetcher
    pub http: HttpClientConfig,
    /// How long a compiled player script stays cached
    pub player_cache_ttl: Duration,
    /// Maximum number of cached player scripts
    pub player_cache_capacity: u64,
}

impl Default for ResolverOptions {
    fn default() -> Self {
        Self {
            marker: DEFAULT_CONFIG_MARKER.to_string(),
            http: HttpClientConfig::default(),
            player_cache_ttl: Duration::from_secs(600), // 10 minutes
            player_cache_capacity: 16,
        }
    }
}

/// Where the cipher program for unsigned streams comes from
enum ProgramSource<'a> {
    /// Player script body, compiled on first use
    Script(&'a str, Option<CipherProgram>),
    /// Program compiled earlier
    Compiled(&'a CipherProgram),
    /// No player script was loaded
    Unavailable,
}

impl ProgramSource<'_> {
    fn program(&mut self) -> Result<&CipherProgram, TubemapError> {
        match self {
            ProgramSource::Compiled(program) => Ok(*program),
            ProgramSource::Script(script, compiled) => {
                let program = match compiled.take() {
                    Some(program) => program,
                    None => CipherProgram::from_player_js(script)?,
                };
                Ok(compiled.insert(program))
            }
            ProgramSource::Unavailable => Err(TubemapError::cipher(
                CipherStage::Locator,
                "no player script loaded",
            )),
        }
    }
}

/// Format identifier of an entry: its `itag` field, else the URL's `itag=`
fn entry_itag(entry: &RawStreamEntry) -> Option<u32> {
    entry
        .itag
        .as_deref()
        .and_then(|itag| itag.trim().parse().ok())
        .or_else(|| entry.url.as_deref().and_then(itag_from_url))
}

/// Check whether any stream worth resolving still needs its signature
fn needs_cipher(map: &StreamMap) -> bool {
    map.entries().iter().any(|entry| {
        entry_itag(entry).and_then(lookup_format).is_some()
            && entry.url.as_deref().is_some_and(|url| !has_signature(url))
    })
}

fn resolve_entry(
    index: usize,
    entry: RawStreamEntry,
    source: &mut ProgramSource<'_>,
) -> Result<Option<ResolvedStream>, TubemapError> {
    let Some(itag) = entry_itag(&entry) else {
        debug!("Skipping stream {} without a format identifier", index);
        return Ok(None);
    };
    let Some(descriptor) = lookup_format(itag) else {
        debug!("Skipping stream {} with unknown itag {}", index, itag);
        return Ok(None);
    };

    let url = entry.url.ok_or_else(|| {
        TubemapError::Decode(format!("stream {} (itag {}) has no url", index, itag))
    })?;
    let url = if has_signature(&url) {
        url
    } else {
        let scrambled = entry.s.as_deref().ok_or_else(|| {
            TubemapError::Decode(format!(
                "stream {} (itag {}) is unsigned and has no scrambled signature",
                index, itag
            ))
        })?;
        let signature = source.program()?.apply(scrambled);
        append_signature(&url, &signature)
    };

    Ok(Some(ResolvedStream {
        itag,
        url,
        quality: entry.quality,
        fallback_host: entry.fallback_host,
        mime_type: entry.mime_type,
        descriptor: *descriptor,
    }))
}

fn resolve_stream_map(
    map: &StreamMap,
    source: &mut ProgramSource<'_>,
) -> Result<Vec<ResolvedStream>, TubemapError> {
    let mut streams = Vec::with_capacity(map.len());
    for (index, entry) in map.entries().into_iter().enumerate() {
        if let Some(stream) = resolve_entry(index, entry, source)? {
            streams.push(stream);
        }
    }
    sort_streams(&mut streams);

    debug!("Resolved {} of {} streams", streams.len(), map.len());
    Ok(streams)
}

/// Resolve a watch page body into signed streams, best first.
///
/// `player_script` is only compiled when some stream needs deciphering,
/// and then only once.
pub fn resolve(page_body: &str, player_script: &str) -> Result<Vec<ResolvedStream>, TubemapError> {
    resolve_with_marker(page_body, player_script, DEFAULT_CONFIG_MARKER)
}

/// [`resolve`] with a custom config marker
pub fn resolve_with_marker(
    page_body: &str,
    player_script: &str,
    marker: &str,
) -> Result<Vec<ResolvedStream>, TubemapError> {
    let config = parse_player_config(page_body, marker)?;
    let map = parse_stream_map(config.stream_map()?)?;
    resolve_stream_map(&map, &mut ProgramSource::Script(player_script, None))
}

/// Resolver fetching pages itself and caching compiled player scripts
pub struct Resolver {
    options: ResolverOptions,
    fetcher: Arc<dyn Fetcher>,
    players: PlayerCache,
}

impl Resolver {
    /// Create a resolver with default options and HTTP fetcher
    pub fn new() -> Result<Self, TubemapError> {
        Self::with_options(ResolverOptions::default())
    }

    /// Create a resolver using the HTTP fetcher configured by `options`
    pub fn with_options(options: ResolverOptions) -> Result<Self, TubemapError> {
        let fetcher = HttpFetcher::with_config(options.http.clone())?;
        Ok(Self::with_fetcher(options, Arc::new(fetcher)))
    }

    /// Create a resolver over any fetcher
    pub fn with_fetcher(options: ResolverOptions, fetcher: Arc<dyn Fetcher>) -> Self {
        let players =
            PlayerCache::with_capacity(options.player_cache_ttl, options.player_cache_capacity);
        Self {
            options,
            fetcher,
            players,
        }
    }

    /// Set the config marker
    pub fn with_marker(mut self, marker: impl Into<String>) -> Self {
        self.options.marker = marker.into();
        self
    }

    /// Replace the player cache with an empty one of the given limits
    pub fn with_player_cache(mut self, ttl: Duration, capacity: u64) -> Self {
        self.options.player_cache_ttl = ttl;
        self.options.player_cache_capacity = capacity;
        self.players = PlayerCache::with_capacity(ttl, capacity);
        self
    }

    pub fn options(&self) -> &ResolverOptions {
        &self.options
    }

    pub fn player_cache(&self) -> &PlayerCache {
        &self.players
    }

    /// Resolve already fetched bodies using this resolver's marker
    pub fn resolve(
        &self,
        page_body: &str,
        player_script: &str,
    ) -> Result<Vec<ResolvedStream>, TubemapError> {
        resolve_with_marker(page_body, player_script, &self.options.marker)
    }

    /// Fetch a watch page and resolve its streams.
    ///
    /// The player script is fetched and compiled only if a stream needs
    /// deciphering, at most once per script URL across concurrent calls.
    pub async fn resolve_url(&self, video_url: &str) -> Result<VideoInfo, TubemapError> {
        let video_id = match extract_video_id(video_url) {
            Ok(id) => Some(id),
            Err(e) => {
                warn!("No video ID in {}: {}", video_url, e);
                None
            }
        };
        info!("Resolving streams for {}", video_url);

        let page = self.fetcher.fetch(video_url).await?;
        let config = parse_player_config(&page, &self.options.marker)?;
        let map = parse_stream_map(config.stream_map()?)?;
        let player_url = normalize_player_url(config.player_js()?, video_url)?;

        let streams = if needs_cipher(&map) {
            let program = self.load_program(&player_url).await?;
            resolve_stream_map(&map, &mut ProgramSource::Compiled(&program))?
        } else {
            resolve_stream_map(&map, &mut ProgramSource::Unavailable)?
        };
        info!("Resolved {} streams", streams.len());

        let mut info = VideoInfo::new(streams).with_player_url(player_url);
        if let Some(id) = video_id {
            info = info.with_id(id);
        }
        if let Some(title) = config.args.title {
            info = info.with_title(title);
        }
        Ok(info)
    }

    async fn load_program(&self, player_url: &str) -> Result<Arc<CipherProgram>, TubemapError> {
        let fetcher = self.fetcher.clone();
        let url = player_url.to_string();
        self.players
            .get_or_load(player_url, async move {
                let script = fetcher.fetch(&url).await?;
                let program = CipherProgram::from_player_js(&script)?;
                debug!("Compiled player script {} ({} bytes)", url, script.len());
                Ok(program)
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::stream_map::encode_stream_map;
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::Mutex;

    const PLAYER_JS: &str = r#"var Xy={Ab:function(a){a.reverse()},Cd:function(a,b){a.splice(0,b)},Ef:function(a,b){var c=a[0];a[0]=a[b%a.length];a[b%a.length]=c}};
var Qr=function(a){a=a.split("");Xy.Ab(a,12);Xy.Ef(a,3);Xy.Cd(a,2);return a.join("")};
g.dispatch=function(c){var f=c.sig||Qr(c.s)};"#;

    fn entry(itag: &str, url: &str, s: Option<&str>) -> RawStreamEntry {
        RawStreamEntry {
            itag: Some(itag.to_string()),
            url: Some(url.to_string()),
            quality: Some("medium".to_string()),
            fallback_host: Some("tc.example.com".to_string()),
            s: s.map(str::to_string),
            mime_type: Some("video/mp4".to_string()),
        }
    }

    fn page(entries: &[RawStreamEntry], player_js: &str) -> String {
        let config = json!({
            "args": {
                "title": "Test clip",
                "url_encoded_fmt_stream_map": encode_stream_map(entries),
            },
            "assets": { "js": player_js },
        });
        format!(
            "<html><script>var meta = {{\"a\":1}};ytplayer.config = {};ytplayer.load();</script></html>",
            config
        )
    }

    fn two_streams() -> Vec<RawStreamEntry> {
        vec![
            entry("18", "https://r1.example.com/videoplayback?id=1&signature=SIGNED", None),
            entry("22", "https://r2.example.com/videoplayback?id=2", Some("abcdefghij")),
        ]
    }

    #[test]
    fn test_resolve_end_to_end() {
        let streams = resolve(&page(&two_streams(), "/player.js"), PLAYER_JS).unwrap();

        assert_eq!(streams.len(), 2);
        assert_eq!(streams[0].itag, 22);
        assert_eq!(
            streams[0].url,
            "https://r2.example.com/videoplayback?id=2&signature=hjfedcba"
        );
        assert_eq!(streams[0].resolution(), "720p");
        assert_eq!(streams[1].itag, 18);
        assert_eq!(
            streams[1].url,
            "https://r1.example.com/videoplayback?id=1&signature=SIGNED"
        );
        assert_eq!(streams[1].fallback_host.as_deref(), Some("tc.example.com"));
    }

    #[test]
    fn test_unknown_itag_is_skipped() {
        let mut entries = two_streams();
        entries.push(entry("137", "https://r3.example.com/videoplayback?id=3", Some("zz")));

        let streams = resolve(&page(&entries, "/p.js"), PLAYER_JS).unwrap();
        assert_eq!(streams.iter().map(|s| s.itag).collect::<Vec<_>>(), vec![22, 18]);

        let only_unknown = vec![entry("999", "https://h/v?signature=x", None)];
        assert!(resolve(&page(&only_unknown, "/p.js"), PLAYER_JS).unwrap().is_empty());
    }

    #[test]
    fn test_signed_streams_skip_player_script() {
        let entries = vec![entry("43", "https://h/v?id=1&signature=ok", None)];
        let streams = resolve(&page(&entries, "/p.js"), "").unwrap();
        assert_eq!(streams.len(), 1);
        assert_eq!(streams[0].url, "https://h/v?id=1&signature=ok");
    }

    #[test]
    fn test_itag_taken_from_url() {
        let mut raw = entry("", "https://h/v?itag=45&signature=ok", None);
        raw.itag = None;
        let streams = resolve(&page(&[raw], "/p.js"), "").unwrap();
        assert_eq!(streams[0].itag, 45);
    }

    #[test]
    fn test_stream_without_identifier_is_skipped() {
        let mut bare = entry("", "https://r3.example.com/videoplayback?id=3&signature=ok", None);
        bare.itag = None;
        let mut ambiguous = entry("", "https://h/v?itag=18&itag=22&signature=ok", None);
        ambiguous.itag = Some("abc".to_string());
        let entries = vec![
            entry("18", "https://r1.example.com/videoplayback?id=1&signature=SIGNED", None),
            bare,
            ambiguous,
        ];

        let streams = resolve(&page(&entries, "/p.js"), "").unwrap();
        assert_eq!(streams.len(), 1);
        assert_eq!(streams[0].itag, 18);
    }

    #[test]
    fn test_cipher_locator_failure() {
        let err = resolve(&page(&two_streams(), "/p.js"), "var nothing=1;").unwrap_err();
        assert_eq!(err.cipher_stage(), Some(CipherStage::Locator));
        assert!(err.is_upstream_change());
    }

    #[test]
    fn test_unsigned_without_scrambled_signature() {
        let entries = vec![entry("22", "https://h/v?id=1", None)];
        let err = resolve(&page(&entries, "/p.js"), PLAYER_JS).unwrap_err();
        assert!(matches!(err, TubemapError::Decode(_)));
    }

    #[test]
    fn test_extraction_failure() {
        let err = resolve("<html>no config here</html>", PLAYER_JS).unwrap_err();
        assert!(matches!(err, TubemapError::Extraction(_)));
    }

    #[test]
    fn test_custom_marker() {
        let body = page(&two_streams(), "/p.js").replace("ytplayer.config = ", "window.cfg=");
        let streams = resolve_with_marker(&body, PLAYER_JS, "window.cfg=").unwrap();
        assert_eq!(streams.len(), 2);
    }

    /// Serves fixed bodies and counts requests per URL
    struct MockFetcher {
        bodies: HashMap<String, String>,
        hits: Mutex<HashMap<String, usize>>,
    }

    impl MockFetcher {
        fn new(bodies: &[(&str, String)]) -> Self {
            Self {
                bodies: bodies
                    .iter()
                    .map(|(url, body)| (url.to_string(), body.clone()))
                    .collect(),
                hits: Mutex::new(HashMap::new()),
            }
        }

        fn hits(&self, url: &str) -> usize {
            self.hits.lock().unwrap().get(url).copied().unwrap_or(0)
        }
    }

    #[async_trait]
    impl Fetcher for MockFetcher {
        async fn fetch(&self, url: &str) -> Result<String, TubemapError> {
            *self.hits.lock().unwrap().entry(url.to_string()).or_insert(0) += 1;
            tokio::time::sleep(Duration::from_millis(10)).await;
            self.bodies
                .get(url)
                .cloned()
                .ok_or_else(|| TubemapError::HttpStatus {
                    url: url.to_string(),
                    status: 404,
                })
        }
    }

    const WATCH_URL: &str = "https://www.youtube.com/watch?v=abc123";
    const PLAYER_URL: &str = "https://s.ytimg.com/yts/jsbin/player.js";

    fn mock_resolver() -> (Resolver, Arc<MockFetcher>) {
        let fetcher = Arc::new(MockFetcher::new(&[
            (WATCH_URL, page(&two_streams(), "//s.ytimg.com/yts/jsbin/player.js")),
            (PLAYER_URL, PLAYER_JS.to_string()),
        ]));
        let resolver = Resolver::with_fetcher(ResolverOptions::default(), fetcher.clone());
        (resolver, fetcher)
    }

    #[tokio::test]
    async fn test_resolve_url() {
        let (resolver, fetcher) = mock_resolver();

        let info = resolver.resolve_url(WATCH_URL).await.unwrap();
        assert_eq!(info.id.as_deref(), Some("abc123"));
        assert_eq!(info.title.as_deref(), Some("Test clip"));
        assert_eq!(info.player_url.as_deref(), Some(PLAYER_URL));
        assert_eq!(info.itags(), vec![22, 18]);
        assert_eq!(info.filename("mp4"), "Test clip.mp4");

        resolver.resolve_url(WATCH_URL).await.unwrap();
        assert_eq!(fetcher.hits(WATCH_URL), 2);
        assert_eq!(fetcher.hits(PLAYER_URL), 1);
    }

    #[tokio::test]
    async fn test_concurrent_requests_share_player() {
        let (resolver, fetcher) = mock_resolver();

        let results =
            futures::future::join_all((0..5).map(|_| resolver.resolve_url(WATCH_URL))).await;
        for result in results {
            assert_eq!(result.unwrap().itags(), vec![22, 18]);
        }
        assert_eq!(fetcher.hits(PLAYER_URL), 1);
    }

    #[tokio::test]
    async fn test_expired_player_is_refetched() {
        let (resolver, fetcher) = mock_resolver();
        let resolver = resolver.with_player_cache(Duration::from_millis(50), 4);
        assert_eq!(resolver.options().player_cache_capacity, 4);

        resolver.resolve_url(WATCH_URL).await.unwrap();
        tokio::time::sleep(Duration::from_millis(120)).await;
        resolver.resolve_url(WATCH_URL).await.unwrap();
        assert_eq!(fetcher.hits(PLAYER_URL), 2);
    }

    #[tokio::test]
    async fn test_resolve_url_reports_cipher_error() {
        let fetcher = Arc::new(MockFetcher::new(&[
            (WATCH_URL, page(&two_streams(), "//s.ytimg.com/yts/jsbin/player.js")),
            (PLAYER_URL, "var nothing=1;".to_string()),
        ]));
        let resolver = Resolver::with_fetcher(ResolverOptions::default(), fetcher.clone());

        for _ in 0..2 {
            let err = resolver.resolve_url(WATCH_URL).await.unwrap_err();
            assert!(matches!(
                err,
                TubemapError::Cipher {
                    stage: CipherStage::Locator,
                    ..
                }
            ));
        }
        // failed compiles are retried on the next request
        assert_eq!(fetcher.hits(PLAYER_URL), 2);
    }

    #[tokio::test]
    async fn test_player_not_fetched_when_all_signed() {
        let entries = vec![entry("18", "https://h/v?signature=ok", None)];
        let fetcher = Arc::new(MockFetcher::new(&[(WATCH_URL, page(&entries, "/p.js"))]));
        let resolver = Resolver::with_fetcher(ResolverOptions::default(), fetcher.clone());

        let info = resolver.resolve_url(WATCH_URL).await.unwrap();
        assert_eq!(info.itags(), vec![18]);
        assert_eq!(fetcher.hits("https://www.youtube.com/p.js"), 0);
    }

    #[tokio::test]
    async fn test_fetch_errors_propagate() {
        let fetcher = Arc::new(MockFetcher::new(&[]));
        let resolver = Resolver::with_fetcher(ResolverOptions::default(), fetcher);

        let err = resolver.resolve_url(WATCH_URL).await.unwrap_err();
        assert!(matches!(err, TubemapError::HttpStatus { status: 404, .. }));
    }

    #[tokio::test]
    async fn test_resolve_url_over_http() {
        let mut server = mockito::Server::new_async().await;
        let body = page(&two_streams(), "/player.js");
        let page_mock = server
            .mock("GET", mockito::Matcher::Regex(r"^/watch".to_string()))
            .with_status(200)
            .with_body(body)
            .create_async()
            .await;
        let player_mock = server
            .mock("GET", "/player.js")
            .with_status(200)
            .with_body(PLAYER_JS)
            .expect(1)
            .create_async()
            .await;

        let resolver = Resolver::new().unwrap();
        let watch_url = format!("{}/watch?v=xyz", server.url());
        let info = resolver.resolve_url(&watch_url).await.unwrap();

        assert_eq!(info.id.as_deref(), Some("xyz"));
        assert_eq!(
            info.best().map(|s| s.url.as_str()),
            Some("https://r2.example.com/videoplayback?id=2&signature=hjfedcba")
        );
        let cached = resolver
            .player_cache()
            .get(&format!("{}/player.js", server.url()))
            .await;
        assert_eq!(cached.map(|p| p.ops().len()), Some(3));

        page_mock.assert_async().await;
        player_mock.assert_async().await;
    }
}
