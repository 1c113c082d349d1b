use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use tokio::sync::mpsc;

use dramabox::access::{PlayDecision, ReferralProgress, UpsellOption};
use dramabox::api::{ApiClient, HomeTab, LibraryEntry, SettingsUpdate};
use dramabox::app::{run_until_settled, App, AppEvent, DramaState, PlayOutcome, SearchView};
use dramabox::catalog::{CatalogItem, UNKNOWN_TITLE};
use dramabox::config::Config;
use dramabox::pager::{StreamKind, StreamStatus};
use dramabox::session::{LaunchContext, Session};
use dramabox::util::{
    fit_to_width, sanitize_for_terminal, validate_media_url, MAX_SEARCH_QUERY_LENGTH,
};

/// Column budget for titles in list output.
const TITLE_WIDTH: usize = 48;

#[derive(Parser, Debug)]
#[command(
    name = "dramabox",
    version,
    about = "Browse and play short dramas from a DramaBox-style backend"
)]
struct Args {
    /// Config file (default: ~/.config/dramabox/config.toml)
    #[arg(long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Print machine-readable JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    /// Host initData string (overrides DRAMABOX_INIT_DATA)
    #[arg(long, value_name = "QUERY", global = true)]
    init_data: Option<String>,

    /// Host start parameter, e.g. ref_12345
    #[arg(long, value_name = "PARAM", global = true)]
    start_param: Option<String>,

    /// Launch URL whose query may carry a start parameter
    #[arg(long, value_name = "URL", global = true)]
    launch_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List a home tab (foryou, latest, trending, dubindo)
    Feed {
        #[arg(long, default_value = "foryou")]
        tab: HomeTab,
        /// Number of pages to load
        #[arg(long, default_value_t = 1)]
        pages: u32,
    },
    /// Search the catalog
    Search {
        query: String,
        #[arg(long, default_value_t = 1)]
        pages: u32,
    },
    /// Show popular searches
    Suggestions,
    /// Show a drama and its episodes
    Detail {
        book_id: String,
    },
    /// Show a random drama
    Random,
    /// Resolve an episode for playback (0-based index)
    Play {
        book_id: String,
        episode: usize,
        /// Hand the video URL to the system player
        #[arg(long)]
        open: bool,
    },
    /// List, add or remove favorites
    Favorites {
        #[arg(long, value_name = "BOOK_ID", conflicts_with = "remove")]
        add: Option<String>,
        #[arg(long, value_name = "BOOK_ID")]
        remove: Option<String>,
    },
    /// Show or clear watch history
    History {
        #[arg(long)]
        clear: bool,
    },
    /// Show the profile, role and entitlements
    Profile,
    /// Show or change settings
    Settings {
        #[arg(long, value_parser = ["id", "en"])]
        language: Option<String>,
        #[arg(long)]
        notifications: Option<bool>,
    },
    /// Show the referral link and reward progress
    Referral,
    /// Report an issue
    Report {
        #[arg(long = "type", value_name = "TYPE")]
        issue_type: String,
        #[arg(long)]
        description: String,
    },
}

fn load_config(path: Option<&PathBuf>) -> Result<Config> {
    let path = match path {
        Some(p) => p.clone(),
        None => Config::default_path().context("Failed to locate config file")?,
    };
    Config::load(&path).with_context(|| format!("Failed to load config from {}", path.display()))
}

fn launch_context(args: &Args) -> Result<LaunchContext> {
    let mut launch = match &args.init_data {
        Some(init_data) => LaunchContext::from_init_data(init_data)?,
        None => LaunchContext::from_env().context("Invalid launch context in environment")?,
    };
    if let Some(param) = &args.start_param {
        launch = launch.with_start_param(param.clone());
    }
    if let Some(url) = &args.launch_url {
        launch = launch.with_launch_url(url)?;
    }
    Ok(launch)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_cards(items: &[CatalogItem]) {
    for (i, item) in items.iter().enumerate() {
        let title = sanitize_for_terminal(&item.title);
        println!(
            "{:>4}  {:<width$}  {}",
            i + 1,
            fit_to_width(&title, TITLE_WIDTH),
            item.id,
            width = TITLE_WIDTH
        );
    }
}

fn print_entries(entries: &[LibraryEntry]) {
    for entry in entries {
        let card = entry.as_card();
        let title = sanitize_for_terminal(&card.title);
        match entry.episode_number {
            Some(ep) => println!("{}  {}  (Ep {ep})", card.id, fit_to_width(&title, TITLE_WIDTH)),
            None => println!("{}  {}", card.id, fit_to_width(&title, TITLE_WIDTH)),
        }
    }
}

fn print_stream_status(status: &StreamStatus) {
    match status {
        StreamStatus::Empty => println!("Nothing found."),
        StreamStatus::Failed(e) => eprintln!("Failed to load: {e}"),
        StreamStatus::Exhausted => println!("-- end of list --"),
        _ => {}
    }
}

#[derive(Serialize)]
struct StreamReport<'a> {
    query: Option<String>,
    page_state: &'a dramabox::pager::PageState,
    status: &'a StreamStatus,
    items: &'a [CatalogItem],
}

/// Load `pages` pages of `stream`, one at a time.
async fn load_pages(
    app: &mut App,
    stream: StreamKind,
    pages: u32,
    event_tx: &mpsc::Sender<AppEvent>,
    event_rx: &mut mpsc::Receiver<AppEvent>,
) -> bool {
    if !run_until_settled(app, event_tx, event_rx).await {
        return false;
    }
    for _ in 1..pages {
        if !app.load_more(stream, event_tx) {
            break;
        }
        if !run_until_settled(app, event_tx, event_rx).await {
            return false;
        }
    }
    true
}

fn report_stream(app: &App, stream: StreamKind, json: bool) -> Result<()> {
    let pager = app.pager(stream);
    if json {
        return print_json(&StreamReport {
            query: pager.active_query().map(ToString::to_string),
            page_state: pager.state(),
            status: pager.status(),
            items: pager.items(),
        });
    }
    print_cards(pager.items());
    print_stream_status(pager.status());
    Ok(())
}

/// Open a drama by id and wait for it.
async fn open_and_wait(
    app: &mut App,
    book_id: &str,
    event_tx: &mpsc::Sender<AppEvent>,
    event_rx: &mut mpsc::Receiver<AppEvent>,
) -> Result<()> {
    let card = CatalogItem {
        id: book_id.to_string(),
        title: UNKNOWN_TITLE.to_string(),
        cover_url: String::new(),
    };
    app.open_drama(card, event_tx);
    run_until_settled(app, event_tx, event_rx).await;
    match &app.drama {
        DramaState::Loaded(_) => Ok(()),
        DramaState::Failed { error } => anyhow::bail!("Failed to load drama {book_id}: {error}"),
        other => anyhow::bail!("Drama {book_id} not loaded ({other:?})"),
    }
}

fn print_drama(app: &App, json: bool) -> Result<()> {
    let Some(bundle) = app.current_drama() else {
        anyhow::bail!("No drama loaded");
    };
    if json {
        return print_json(bundle);
    }

    let detail = &bundle.detail;
    println!("{} [{}]", sanitize_for_terminal(&detail.title), detail.id);
    if !detail.tags.is_empty() {
        println!("Tags: {}", detail.tags.join(", "));
    }
    println!();
    println!("{}", sanitize_for_terminal(&detail.synopsis));
    println!();

    let entitlements = app.session.entitlements();
    for episode in &bundle.episodes {
        let decision =
            app.session
                .play_decision(episode.index, app.config.free_episode_limit);
        let marker = match (decision, &episode.video_url) {
            (PlayDecision::Denied { .. }, _) => "locked",
            (PlayDecision::Allowed, None) => "unavailable",
            (PlayDecision::Allowed, Some(_)) => "",
        };
        println!("{:>4}  Ep {:<8} {}", episode.index, episode.display_number, marker);
    }
    if !entitlements.has_full_access() && bundle.episodes.len() > app.config.free_episode_limit {
        println!();
        println!(
            "Episodes from {} on need VIP or referral access.",
            app.config.free_episode_limit
        );
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing for debug logging
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = load_config(args.config.as_ref())?;
    let launch = launch_context(&args)?;

    let client = ApiClient::new(&config).context("Failed to create API client")?;
    let session = Session::bootstrap(&client, &launch, &config).await;
    if let Some(outcome) = session.referral_outcome() {
        eprintln!("{}", outcome.message());
    }

    let json = args.json;
    let mut app = App::new(client.clone(), config, session);
    let (event_tx, mut event_rx) = mpsc::channel::<AppEvent>(32);

    match args.command {
        Command::Feed { tab, pages } => {
            app.select_tab(tab, &event_tx);
            if !load_pages(&mut app, StreamKind::Home, pages, &event_tx, &mut event_rx).await {
                return Ok(());
            }
            report_stream(&app, StreamKind::Home, json)?;
        }
        Command::Search { query, pages } => {
            if query.trim().chars().count() > MAX_SEARCH_QUERY_LENGTH {
                anyhow::bail!("Search query too long (max {MAX_SEARCH_QUERY_LENGTH} chars)");
            }
            app.submit_search(&query, &event_tx);
            if app.search_view != SearchView::Results {
                anyhow::bail!(
                    "Search query must be at least {} characters",
                    app.config.min_search_chars
                );
            }
            if !load_pages(&mut app, StreamKind::Search, pages, &event_tx, &mut event_rx).await {
                return Ok(());
            }
            report_stream(&app, StreamKind::Search, json)?;
        }
        Command::Suggestions => {
            let keywords = client
                .popular_searches()
                .await
                .context("Failed to load popular searches")?;
            if json {
                print_json(&keywords)?;
            } else {
                for keyword in keywords {
                    println!("{}", sanitize_for_terminal(&keyword));
                }
            }
        }
        Command::Detail { book_id } => {
            open_and_wait(&mut app, &book_id, &event_tx, &mut event_rx).await?;
            print_drama(&app, json)?;
        }
        Command::Random => {
            app.open_random(&event_tx);
            run_until_settled(&mut app, &event_tx, &mut event_rx).await;
            match &app.drama {
                DramaState::NothingFound => anyhow::bail!("Failed to get random drama"),
                DramaState::Failed { error } => anyhow::bail!("Failed to get random drama: {error}"),
                _ => print_drama(&app, json)?,
            }
        }
        Command::Play {
            book_id,
            episode,
            open,
        } => {
            open_and_wait(&mut app, &book_id, &event_tx, &mut event_rx).await?;
            let outcome = app.play_episode(episode);
            if json {
                print_json(&outcome)?;
            }
            match outcome {
                PlayOutcome::Ready { episode, url } => {
                    if !json {
                        println!("Ep {}: {url}", episode.display_number);
                    }
                    if open {
                        let url = validate_media_url(&url).context("Refusing to open video URL")?;
                        open::that(url.as_str()).context("Failed to launch video player")?;
                    }
                }
                PlayOutcome::Denied { options, .. } if !json => {
                    println!("This episode is locked.");
                    for option in options {
                        match option {
                            UpsellOption::Upgrade => {
                                println!("  - Upgrade to VIP")
                            }
                            UpsellOption::InviteFriends => {
                                match app.session.referral_link(&app.config.bot_username) {
                                    Some(link) => println!("  - Invite friends: {link}"),
                                    None => println!(
                                        "  - Invite friends: open the app from @{} to get your invite link",
                                        app.config.bot_username.trim_start_matches('@')
                                    ),
                                }
                            }
                        }
                    }
                }
                PlayOutcome::Unavailable { .. } if !json => println!("Video not available."),
                PlayOutcome::NoSuchEpisode { episode_index } if !json => {
                    anyhow::bail!("Episode {episode_index} does not exist")
                }
                _ => {}
            }
            app.finish_pending_writes(app.config.request_timeout()).await;
        }
        Command::Favorites { add, remove } => {
            let user_id = app.session.user_id();
            if let Some(book_id) = add {
                open_and_wait(&mut app, &book_id, &event_tx, &mut event_rx).await?;
                let card = app
                    .current_drama()
                    .map(|b| b.detail.as_card())
                    .context("Drama not loaded")?;
                client.add_favorite(user_id, &card).await?;
                println!("Added to favorites");
            } else if let Some(book_id) = remove {
                client.remove_favorite(user_id, &book_id).await?;
                println!("Removed from favorites");
            } else {
                let entries = client.favorites(user_id).await?;
                if json {
                    print_json(&entries)?;
                } else if entries.is_empty() {
                    println!("No favorites yet");
                } else {
                    print_entries(&entries);
                }
            }
        }
        Command::History { clear } => {
            let user_id = app.session.user_id();
            if clear {
                client.clear_history(user_id).await?;
                println!("Watch history cleared");
            } else {
                let entries = client.history(user_id).await?;
                if json {
                    print_json(&entries)?;
                } else if entries.is_empty() {
                    println!("No watch history yet");
                } else {
                    print_entries(&entries);
                }
            }
        }
        Command::Profile => {
            let user_id = app.session.user_id();
            match client.user_profile(user_id).await {
                Ok(Some(profile)) => app.session.apply_profile(profile),
                Ok(None) => {}
                Err(e) => tracing::warn!(error = %e, "Failed to refresh profile"),
            }
            if let Err(e) = app.session.refresh_entitlements(&client).await {
                tracing::warn!(error = %e, "Failed to refresh entitlements");
            }
            if json {
                print_json(&app.session)?;
            } else {
                let session = &app.session;
                println!("{}", sanitize_for_terminal(&session.identity().display_name()));
                println!("ID: {}", session.user_id());
                println!("Role: {:?}", session.role());
                if let Some(profile) = session.profile() {
                    println!("Membership: {}", profile.membership_label());
                    println!("Points: {}", profile.points);
                    println!("Commission: {:.2}", profile.commission);
                    println!("Referrals: {}", profile.referral_count);
                }
                let ent = session.entitlements();
                println!(
                    "Access: admin={} vip={} referral={}",
                    ent.is_admin, ent.has_active_membership, ent.has_referral_access
                );
                if let Some(expires) = ent.referral_access_expires_at {
                    println!("Referral access until: {}", expires.format("%Y-%m-%d %H:%M UTC"));
                }
            }
        }
        Command::Settings {
            language,
            notifications,
        } => {
            let user_id = app.session.user_id();
            let update = SettingsUpdate {
                language,
                notifications_enabled: notifications,
            };
            if !update.is_empty() {
                client.update_settings(user_id, &update).await?;
                println!("Settings saved");
            }
            let settings = client.settings(user_id).await?;
            if json {
                print_json(&settings)?;
            } else {
                println!("Language: {}", settings.language);
                println!("Notifications: {}", settings.notifications_enabled);
                println!(
                    "Membership: {}",
                    settings.membership.as_deref().unwrap_or("Free")
                );
            }
        }
        Command::Referral => {
            let session = &app.session;
            let Some(link) = session.referral_link(&app.config.bot_username) else {
                anyhow::bail!("Referral links need a signed-in user");
            };
            let count = session.profile().map(|p| p.referral_count()).unwrap_or(0);
            let progress = ReferralProgress::from_count(count);
            if json {
                print_json(&serde_json::json!({ "link": link, "progress": progress }))?;
            } else {
                println!("Your link: {link}");
                println!("Referrals: {count}");
                for tier in [progress.short, progress.long] {
                    println!(
                        "  {}: {}/{} ({} to go)",
                        tier.tier.label, tier.progress, tier.tier.referrals, tier.remaining
                    );
                }
            }
        }
        Command::Report {
            issue_type,
            description,
        } => {
            if issue_type.trim().is_empty() || description.trim().is_empty() {
                anyhow::bail!("Both --type and --description are required");
            }
            client
                .submit_report(app.session.user_id(), &issue_type, &description)
                .await
                .context("Failed to send report")?;
            println!("Report sent successfully!");
        }
    }

    Ok(())
}
