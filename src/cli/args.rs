//! Command line argument parsing

use crate::core::ResolverOptions;
use crate::platform::client::HttpClientConfig;
use crate::platform::extractor::DEFAULT_CONFIG_MARKER;
use crate::platform::formats::StreamQuery;
use clap::Parser;
use std::time::Duration;

/// tubemap - resolve a watch page into direct, signed stream URLs
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Watch page URL
    pub url: String,

    /// Only streams with this extension (e.g., 'mp4', 'webm')
    #[arg(short, long, value_name = "EXT")]
    pub extension: Option<String>,

    /// Only streams with this resolution (e.g., '720p')
    #[arg(short, long, value_name = "RES")]
    pub resolution: Option<String>,

    /// Only streams with this video profile (e.g., 'High', 'Baseline')
    #[arg(short, long, value_name = "PROFILE")]
    pub profile: Option<String>,

    /// Print the URL of the single matching stream and exit
    #[arg(short = 'g', long)]
    pub print_url: bool,

    /// Print the resolved video as JSON
    #[arg(long)]
    pub json: bool,

    /// HTTP timeout (e.g., 30s, 1m)
    #[arg(long, value_name = "DURATION", default_value = "30s")]
    pub timeout: humantime::Duration,

    /// Override User-Agent header
    #[arg(long, value_name = "USER_AGENT")]
    pub user_agent: Option<String>,

    /// Proxy URL (http/https/socks)
    #[arg(long, value_name = "URL")]
    pub proxy: Option<String>,

    /// Literal preceding the player config in the page
    #[arg(long, value_name = "MARKER", default_value = DEFAULT_CONFIG_MARKER)]
    pub marker: String,

    /// Verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Quiet output (only errors)
    #[arg(short, long)]
    pub quiet: bool,
}

impl Args {
    /// Get HTTP timeout as Duration
    pub fn timeout_duration(&self) -> Duration {
        self.timeout.into()
    }

    /// Stream query built from the filter flags
    pub fn query(&self) -> StreamQuery {
        let mut query = StreamQuery::new();
        if let Some(extension) = &self.extension {
            query = query.with_extension(extension);
        }
        if let Some(resolution) = &self.resolution {
            query = query.with_resolution(resolution);
        }
        if let Some(profile) = &self.profile {
            query = query.with_profile(profile);
        }
        query
    }

    /// Check if any filter flag was given
    pub fn has_filters(&self) -> bool {
        self.extension.is_some() || self.resolution.is_some() || self.profile.is_some()
    }

    /// Resolver options from the HTTP and marker flags
    pub fn resolver_options(&self) -> ResolverOptions {
        ResolverOptions {
            marker: self.marker.clone(),
            http: HttpClientConfig {
                timeout: self.timeout_duration(),
                user_agent: self.user_agent.clone(),
                proxy_url: self.proxy.clone(),
            },
            ..Default::default()
        }
    }

    /// Get output verbosity level
    pub fn verbosity_level(&self) -> VerbosityLevel {
        if self.quiet {
            VerbosityLevel::Quiet
        } else if self.verbose {
            VerbosityLevel::Verbose
        } else {
            VerbosityLevel::Normal
        }
    }
}

/// Output verbosity level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerbosityLevel {
    /// Quiet (only errors)
    Quiet,
    /// Normal
    Normal,
    /// Verbose (debug info)
    Verbose,
}

impl Default for Args {
    fn default() -> Self {
        Self {
            url: String::new(),
            extension: None,
            resolution: None,
            profile: None,
            print_url: false,
            json: false,
            timeout: humantime::Duration::from(Duration::from_secs(30)),
            user_agent: None,
            proxy: None,
            marker: DEFAULT_CONFIG_MARKER.to_string(),
            verbose: false,
            quiet: false,
        }
    }
}
