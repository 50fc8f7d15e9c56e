use std::process;

use clap::{Args, Parser, Subcommand, ValueEnum};
use futures::stream::{FuturesUnordered, StreamExt};
use log::LevelFilter;
use tmscout::retry::RetryPolicy;
use tmscout::returnees::{DEFAULT_CLUB_CONCURRENCY, find_league, leagues};
use tmscout::scraper::WebScraper;
use tmscout::types::{DEFAULT_BRACKETS, MarketValueBracket, TransferListing};
use tmscout::utils::{FeedFilter, FeedStats};

#[derive(Parser)]
#[command(name = "tmscout")]
#[command(about = "A transfermarkt.com player scout", long_about = None)]
struct Cli {
    #[arg(
        short = 'l',
        long = "log-level",
        value_enum,
        default_value = "info",
        global = true,
        help = "Set the logging level"
    )]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, ValueEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Off => LevelFilter::Off,
            LogLevel::Error => LevelFilter::Error,
            LogLevel::Warn => LevelFilter::Warn,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Debug => LevelFilter::Debug,
            LogLevel::Trace => LevelFilter::Trace,
        }
    }
}

#[derive(Debug, Clone, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Args)]
struct FeedArgs {
    #[arg(long, help = "Only keep players at this position (long name or code)")]
    position: Option<String>,

    #[arg(
        long,
        help = "Maximum number of results to return",
        value_parser = clap::value_parser!(u16).range(1..)
    )]
    limit: Option<u16>,

    #[arg(
        long,
        help = "Number of results to skip from the beginning"
    )]
    offset: Option<u16>,

    #[arg(
        short = 'o',
        long = "output",
        value_enum,
        default_value = "text",
        help = "Output format"
    )]
    format: OutputFormat,
}

impl FeedArgs {
    fn filter(&self) -> FeedFilter {
        FeedFilter {
            position: self.position.clone(),
            limit: self.limit.map(usize::from),
            offset: self.offset.map(usize::from),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Search players by name
    Search {
        #[arg(help = "Free-text player query")]
        query: String,

        #[arg(long, help = "Resolve full profiles for the first N hits")]
        resolve: Option<usize>,

        #[arg(
            short = 'o',
            long = "output",
            value_enum,
            default_value = "text",
            help = "Output format"
        )]
        format: OutputFormat,
    },
    /// Re-read the market attributes of a player profile
    Refresh {
        #[arg(help = "Profile URL of the player")]
        url: String,

        #[arg(
            short = 'o',
            long = "output",
            value_enum,
            default_value = "text",
            help = "Output format"
        )]
        format: OutputFormat,
    },
    /// List players recently released to "Without Club"
    Releases {
        #[arg(
            long = "bracket",
            value_name = "MIN-MAX",
            value_parser = parse_bracket,
            help = "Market value bracket in euros, repeatable. Defaults to the standard brackets"
        )]
        brackets: Vec<MarketValueBracket>,

        #[arg(long, default_value_t = 3, help = "Attempts per bracket")]
        max_retries: u32,

        #[command(flatten)]
        feed: FeedArgs,
    },
    /// List loan returnees of every club in a league
    Returnees {
        #[arg(
            long,
            conflicts_with = "url",
            required_unless_present = "url",
            help = "League name fragment or competition code, e.g. NL1"
        )]
        league: Option<String>,

        #[arg(long, help = "League overview URL")]
        url: Option<String>,

        #[arg(long, default_value_t = DEFAULT_CLUB_CONCURRENCY, help = "Club pages fetched in parallel")]
        concurrency: usize,

        #[command(flatten)]
        feed: FeedArgs,
    },
    /// List the leagues known to the returnee scan
    Leagues {
        #[arg(
            short = 'o',
            long = "output",
            value_enum,
            default_value = "text",
            help = "Output format"
        )]
        format: OutputFormat,
    },
}

fn parse_bracket(s: &str) -> Result<MarketValueBracket, String> {
    let (min, max) = s
        .split_once('-')
        .ok_or_else(|| format!("Expected MIN-MAX, got '{s}'"))?;
    let min = min
        .trim()
        .parse::<u64>()
        .map_err(|e| format!("Invalid minimum '{min}': {e}"))?;
    let max = max
        .trim()
        .parse::<u64>()
        .map_err(|e| format!("Invalid maximum '{max}': {e}"))?;
    if min > max {
        return Err(format!("Minimum ({min}) cannot exceed maximum ({max})"));
    }
    Ok(MarketValueBracket::new(min, max))
}

fn serialize_json<T: serde::Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => {
            log::error!("Error serializing to JSON: {}", e);
            process::exit(1);
        }
    }
}

fn print_feed(listings: &[TransferListing], format: &OutputFormat) {
    match format {
        OutputFormat::Json => serialize_json(&listings),
        OutputFormat::Text => {
            if listings.is_empty() {
                println!("No players to display.");
            } else {
                for (i, listing) in listings.iter().enumerate() {
                    println!("{:>3}. {}", i + 1, listing);
                }
                print!("{}", FeedStats::from_listings(listings));
            }
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    env_logger::Builder::new()
        .filter_level(cli.log_level.clone().into())
        .init();

    let scraper = WebScraper::new().unwrap_or_else(|e| {
        log::error!("Error creating scraper: {}", e);
        process::exit(1);
    });

    match cli.command {
        Commands::Search {
            query,
            resolve,
            format,
        } => {
            let candidates = scraper.search(&query).await.unwrap_or_else(|e| {
                log::error!("Error searching for '{}': {}", query, e);
                process::exit(1);
            });

            match resolve {
                Some(n) if n > 0 => {
                    let mut futures: FuturesUnordered<_> = candidates
                        .iter()
                        .take(n)
                        .enumerate()
                        .map(|(i, candidate)| {
                            let scraper = &scraper;
                            async move { (i, scraper.resolve_full_profile(candidate).await) }
                        })
                        .collect();

                    let mut players = Vec::new();
                    while let Some((i, result)) = futures.next().await {
                        match result {
                            Ok(player) => players.push((i, player)),
                            Err(e) => log::warn!("Failed to resolve {}: {}", candidates[i], e),
                        }
                    }
                    players.sort_by_key(|(i, _)| *i);
                    let players: Vec<_> = players.into_iter().map(|(_, p)| p).collect();

                    match format {
                        OutputFormat::Json => serialize_json(&players),
                        OutputFormat::Text => {
                            for player in &players {
                                println!("{}\n", player);
                            }
                        }
                    }
                }
                _ => match format {
                    OutputFormat::Json => serialize_json(&candidates),
                    OutputFormat::Text => {
                        if candidates.is_empty() {
                            println!("No players found for '{}'.", query);
                        }
                        for (i, candidate) in candidates.iter().enumerate() {
                            println!("{:>3}. {}", i + 1, candidate);
                            println!("     {}", candidate.profile_url);
                        }
                    }
                },
            }
        }

        Commands::Refresh { url, format } => {
            let refreshed = scraper.refresh_player(&url).await.unwrap_or_else(|e| {
                log::error!("Error refreshing {}: {}", url, e);
                process::exit(1);
            });

            match format {
                OutputFormat::Json => serialize_json(&refreshed),
                OutputFormat::Text => println!("{}", refreshed),
            }
        }

        Commands::Releases {
            brackets,
            max_retries,
            feed,
        } => {
            let filter = feed.filter().validate().unwrap_or_else(|e| {
                log::error!("Invalid args: {e}");
                process::exit(1);
            });
            let brackets = if brackets.is_empty() {
                DEFAULT_BRACKETS.to_vec()
            } else {
                brackets
            };

            let scraper = scraper.with_retry(RetryPolicy::default().with_max_attempts(max_retries));
            let sweep = scraper.sweep_releases(&brackets).await;

            for failure in &sweep.failures {
                log::warn!("Bracket {} failed: {}", failure.bracket, failure.cause);
            }
            if sweep.listings.is_empty() && !sweep.failures.is_empty() {
                log::error!("Every bracket failed");
                process::exit(1);
            }

            print_feed(&filter.apply(sweep.listings), &feed.format);
        }

        Commands::Returnees {
            league,
            url,
            concurrency,
            feed,
        } => {
            let filter = feed.filter().validate().unwrap_or_else(|e| {
                log::error!("Invalid args: {e}");
                process::exit(1);
            });

            let league_url = match (league, url) {
                (_, Some(url)) => url,
                (Some(query), None) => match find_league(&query) {
                    Some(league) => {
                        log::info!("Using league {} ({})", league.name, league.code());
                        league.url
                    }
                    None => {
                        log::error!("Unknown league '{}'. Run `tmscout leagues` for the list", query);
                        process::exit(1);
                    }
                },
                (None, None) => {
                    log::error!("Either --league or --url is required");
                    process::exit(1);
                }
            };

            let scraper = scraper.with_club_concurrency(concurrency);
            let returnees = scraper
                .fetch_returnee_feed(&league_url)
                .await
                .unwrap_or_else(|e| {
                    log::error!("Error collecting returnees from {}: {}", league_url, e);
                    process::exit(1);
                });

            print_feed(&filter.apply(returnees), &feed.format);
        }

        Commands::Leagues { format } => {
            let leagues = leagues();
            match format {
                OutputFormat::Json => serialize_json(&leagues),
                OutputFormat::Text => {
                    for league in &leagues {
                        println!("{:<6} {}", league.code(), league.name);
                    }
                }
            }
        }
    }
}
