mod api;
mod config;
mod dismiss;
mod error;
mod events;
mod forum;
mod ledger;
mod models;
mod reminders;
mod session;
mod store;
mod tracking;
mod upload;
mod urgency;

use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use config::HubConfig;
use dismiss::{APPLICATION_TOAST_TIMEOUT, AutoDismiss};
use error::WriteOutcome;
use events::{EventBus, NotificationBar, NotificationId};
use forum::{NewPost, PostUpdate};
use ledger::PrivacyDecision;
use models::{ApplicationStatus, OpportunityType, filter_by_type};
use reminders::{ReminderAggregator, ReminderPopup};
use session::Session;
use tracking::Tracker;
use upload::UploadKind;
use urgency::deadline_label;

#[derive(Parser)]
#[command(name = "herhub")]
#[command(about = "HerConnect hub client - opportunities, reminders and community forum")]
struct Cli {
    /// Backend base URL
    #[arg(long, global = true, env = "HERHUB_API_URL", default_value = api::DEFAULT_API_URL)]
    api_url: String,

    /// Directory holding the local store
    #[arg(long, global = true, env = "HERHUB_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Keep popup suppression flags separate for each logged-in user
    #[arg(long, global = true, env = "HERHUB_SCOPE_FLAGS")]
    scope_flags: bool,

    /// Use a throwaway in-memory store
    #[arg(long, global = true)]
    ephemeral: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the local store
    Init,

    /// Log in and remember the session
    Login {
        #[arg(short, long)]
        email: String,

        #[arg(short, long)]
        password: String,
    },

    /// Create an account and log in
    Register {
        #[arg(short, long)]
        name: String,

        #[arg(short, long)]
        email: String,

        #[arg(short, long)]
        password: String,
    },

    /// Forget the stored session
    Logout,

    /// Show the logged-in user
    Whoami,

    /// Set or show the preferred language
    Lang {
        /// Language code, e.g. en, fr, sw
        code: Option<String>,
    },

    /// List opportunities
    Opportunities {
        /// Filter by type (scholarship, internship, job, fellowship, mentorship)
        #[arg(short = 't', long = "type")]
        kind: Option<String>,
    },

    /// Open an opportunity's application page
    Visit {
        /// Opportunity ID
        id: String,
    },

    /// Answer the "did you apply?" prompt for an opportunity
    Interest {
        /// Opportunity ID
        id: String,

        /// Also get a reminder before the deadline
        #[arg(long)]
        remind: bool,

        /// Did not apply
        #[arg(long, conflicts_with = "remind")]
        decline: bool,
    },

    /// List tracked applications
    Tracked,

    /// Change a tracked application's status
    Status {
        /// Opportunity ID
        id: String,

        /// applied, under_review, interview, accepted, rejected
        status: String,
    },

    /// Show upcoming deadline reminders
    Reminders,

    /// Work through reminders interactively, marking them complete
    Popup,

    /// Mark a reminder complete
    Complete {
        /// Opportunity ID
        id: String,
    },

    /// Show application updates
    Notifications {
        /// Keep each toast on screen until it times out
        #[arg(long)]
        wait: bool,
    },

    /// Answer the pending-applications banner
    Pending {
        /// Whether the pending applications were completed
        #[arg(long)]
        completed: bool,
    },

    /// Privacy policy consent
    Privacy {
        #[command(subcommand)]
        command: PrivacyCommands,
    },

    /// Community forum
    Forum {
        #[command(subcommand)]
        command: ForumCommands,
    },

    /// Upload a file to the media host
    Upload {
        /// profile-image, resume or forum-media
        kind: String,

        /// Path to the file
        file: PathBuf,
    },
}

#[derive(Subcommand)]
enum PrivacyCommands {
    /// Accept the privacy policy
    Accept,

    /// Reject the privacy policy
    Reject,

    /// Show the current decision
    Status,
}

#[derive(Subcommand)]
enum ForumCommands {
    /// List posts
    List,

    /// Show a post with its comments
    Show {
        /// Post ID
        id: String,
    },

    /// Write a new post
    Post {
        title: String,
        content: String,
    },

    /// Edit one of your posts
    Edit {
        /// Post ID
        id: String,

        #[arg(long)]
        title: Option<String>,

        #[arg(long)]
        content: Option<String>,
    },

    /// Delete a post
    Delete {
        /// Post ID
        id: String,
    },

    /// Comment on a post
    Comment {
        /// Post ID
        post_id: String,
        content: String,
    },

    /// Delete a comment
    Uncomment {
        /// Post ID
        post_id: String,

        /// Comment ID
        comment_id: String,
    },
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "herhub=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let config = HubConfig {
        api_url: cli.api_url,
        data_dir: cli.data_dir,
        scope_flags_per_user: cli.scope_flags,
        ephemeral: cli.ephemeral,
    };

    let owned_store = config.open_store()?;
    let store = &*owned_store;
    let session = Session::new(store);
    let user = session.current_user()?;
    let client = config.client(store)?;
    let ledger = config.ledger(store, user.as_ref());

    match cli.command {
        Commands::Init => {
            match &config.data_dir {
                Some(dir) => println!("Store ready in {}", dir.display()),
                None => println!("Store ready."),
            }
        }

        Commands::Login { email, password } => {
            session.login(&client, &email, &password).await?;
            match session.current_user()? {
                Some(user) => println!("Logged in as {}.", user.display_name()),
                None => println!("Logged in, but the session token could not be read."),
            }
        }

        Commands::Register { name, email, password } => {
            session.register(&client, &name, &email, &password).await?;
            println!("Welcome, {}!", name);
        }

        Commands::Logout => {
            session.logout()?;
            println!("Logged out.");
        }

        Commands::Whoami => match user {
            Some(user) => {
                println!("{} ({})", user.display_name(), user.id);
                if let Some(email) = &user.email {
                    println!("Email: {}", email);
                }
                println!("Session expires: {}", user.expires_at.format("%Y-%m-%d %H:%M UTC"));
            }
            None => println!("Not logged in."),
        },

        Commands::Lang { code } => match code {
            Some(code) => {
                session.set_language(&code)?;
                println!("Language set to {}.", code);
            }
            None => println!("{}", session.language()?.unwrap_or_else(|| "en".to_string())),
        },

        Commands::Opportunities { kind } => {
            let kind = match kind {
                Some(k) => Some(OpportunityType::parse(&k).ok_or_else(|| anyhow!("Unknown opportunity type '{}'", k))?),
                None => None,
            };
            let all = client.list_opportunities().await.unwrap_or_else(|e| {
                if e.is_unauthorized() {
                    eprintln!("Not logged in. Run `herhub login` first.");
                }
                tracing::warn!(error = %e, "Failed to fetch opportunities");
                Vec::new()
            });
            let opportunities = filter_by_type(&all, kind);

            if opportunities.is_empty() {
                println!("No opportunities found.");
            } else {
                println!("{:<26} {:<12} {:<30} {:<20} {:>12}", "ID", "TYPE", "TITLE", "ORGANIZATION", "DEADLINE");
                println!("{}", "-".repeat(104));
                for opp in &opportunities {
                    println!(
                        "{:<26} {:<12} {:<30} {:<20} {:>12}",
                        truncate(&opp.id, 24),
                        opp.kind.label(),
                        truncate(&opp.title, 28),
                        truncate(opp.organization.as_deref().unwrap_or(""), 18),
                        opp.deadline.format("%Y-%m-%d")
                    );
                }
            }

            let tracker = Tracker::new(&client, &ledger);
            let tracked = tracker.tracked_applications().await;
            for opp in tracker.due_interest_prompts(&all, &tracked)? {
                println!("\nYou visited \"{}\". Did you apply?", opp.title);
                println!("  herhub interest {} [--remind]   |   herhub interest {} --decline", opp.id, opp.id);
                ledger.mark_modal_shown(&opp.id)?;
            }
        }

        Commands::Visit { id } => {
            let tracker = Tracker::new(&client, &ledger);
            tracker.visit(&id)?;
            let link = client
                .list_opportunities()
                .await
                .ok()
                .and_then(|opps| opps.into_iter().find(|o| o.id == id))
                .and_then(|o| o.application_link);
            match link {
                Some(link) => println!("Apply here: {}", link),
                None => println!("Marked #{} as visited.", id),
            }
        }

        Commands::Interest { id, remind, decline } => {
            let tracker = Tracker::new(&client, &ledger);
            if decline {
                tracker.decline_interest(&id)?;
                println!("Okay, we won't ask about #{} again.", id);
            } else {
                let opportunity = client
                    .list_opportunities()
                    .await?
                    .into_iter()
                    .find(|o| o.id == id)
                    .ok_or_else(|| anyhow!("Opportunity #{} not found", id))?;
                let result = tracker.confirm_interest(&opportunity, remind).await?;
                report("Tracking", &result.tracked);
                if let Some(reminder) = &result.reminder {
                    report("Deadline reminder", reminder);
                }
                println!("Now tracking \"{}\".", opportunity.title);
            }
        }

        Commands::Tracked => {
            let tracker = Tracker::new(&client, &ledger);
            let apps = tracker.tracked_applications().await;
            if apps.is_empty() {
                println!("No tracked applications.");
            } else {
                let today = chrono::Local::now().date_naive();
                println!("{:<26} {:<14} {:<30} {:>16}", "ID", "STATUS", "TITLE", "DEADLINE");
                println!("{}", "-".repeat(89));
                for app in apps {
                    println!(
                        "{:<26} {:<14} {:<30} {:>16}",
                        truncate(&app.opportunity_id, 24),
                        app.status.as_str(),
                        truncate(&app.title, 28),
                        deadline_label(urgency::days_remaining(app.deadline, today))
                    );
                }
            }
        }

        Commands::Status { id, status } => {
            let status = ApplicationStatus::parse(&status)
                .ok_or_else(|| anyhow!("Unknown status '{}'. Use applied, under_review, interview, accepted or rejected", status))?;
            Tracker::new(&client, &ledger)
                .update_status(&id, status)
                .await
                .with_context(|| format!("Failed to update #{}", id))?;
            println!("#{} is now {}.", id, status.as_str());
        }

        Commands::Reminders => {
            let mut aggregator = ReminderAggregator::new(client.clone());
            let reminders = aggregator.fetch_reminders().await;
            if reminders.is_empty() {
                println!("No reminders.");
            } else {
                println!("{:<26} {:<30} {:<20} {:>16}", "ID", "TITLE", "ORGANIZATION", "DUE");
                println!("{}", "-".repeat(95));
                for r in &reminders {
                    let marker = if r.is_urgent && !r.is_expired() { "!" } else { " " };
                    println!(
                        "{:<26} {:<30} {:<20} {:>15}{}",
                        truncate(r.id(), 24),
                        truncate(&r.opportunity.title, 28),
                        truncate(r.opportunity.organization.as_deref().unwrap_or(""), 18),
                        r.label(),
                        marker
                    );
                }
            }
        }

        Commands::Popup => {
            let mut aggregator = ReminderAggregator::new(client.clone());
            let Some(mut popup) = ReminderPopup::open(aggregator.fetch_reminders().await) else {
                println!("Nothing due. Enjoy your day!");
                return Ok(());
            };
            print_popup(&popup);
            println!("Enter an ID to mark it complete, or 'q' to close.");

            let mut lines = BufReader::new(tokio::io::stdin()).lines();
            while popup.is_open() {
                let line = tokio::select! {
                    _ = popup.closed() => None,
                    line = lines.next_line() => line?,
                };
                let Some(line) = line else { break };
                let input = line.trim();
                if input == "q" {
                    popup.dismiss();
                    break;
                }
                if input.is_empty() {
                    continue;
                }
                if !popup.visible().iter().any(|r| r.id() == input) {
                    println!("No reminder with ID {}.", input);
                    continue;
                }
                let outcome = aggregator.complete(&mut popup, input).await;
                if let WriteOutcome::Failed(msg) = &outcome {
                    eprintln!("Could not sync completion: {}", msg);
                }
                if let Some(delay) = popup.closes_in() {
                    println!("All done! Closing in {}s.", delay.as_secs_f32());
                } else {
                    print_popup(&popup);
                }
            }
        }

        Commands::Complete { id } => {
            let outcome = WriteOutcome::from_result("mark_completed", client.mark_completed(&id).await);
            report("Completion", &outcome);
        }

        Commands::Notifications { wait } => {
            let aggregator = ReminderAggregator::new(client.clone());
            let updates = aggregator.application_updates().await;
            if updates.is_empty() {
                println!("No application updates.");
            }
            for update in &updates {
                let toast = AutoDismiss::start(APPLICATION_TOAST_TIMEOUT);
                let marker = if update.read { " " } else { "*" };
                match update.created_at {
                    Some(at) => println!("{} [{}] {}", marker, at.format("%Y-%m-%d"), update.message),
                    None => println!("{} {}", marker, update.message),
                }
                aggregator.mark_sent(update).await;
                if wait {
                    toast.dismissed().await;
                }
            }
        }

        Commands::Pending { completed } => {
            let bus = EventBus::new();
            let mut receiver = bus.subscribe();
            let mut bar = NotificationBar::new();
            bar.show(NotificationId::PendingOpportunities);
            if ledger.privacy_decision()? == PrivacyDecision::Pending {
                bar.show(NotificationId::PrivacyPolicy);
            }

            let outcome = tracking::complete_pending(&client, &bus, completed).await;
            bar.drain(&mut receiver);
            report("Pending applications", &outcome);
            if !bar.is_showing(NotificationId::PendingOpportunities) {
                println!("Pending-applications reminder cleared.");
            }
            if bar.active().any(|id| *id == NotificationId::PrivacyPolicy) {
                println!("Reminder: review the privacy policy with `herhub privacy accept|reject`.");
            }
        }

        Commands::Privacy { command } => match command {
            PrivacyCommands::Accept => {
                ledger.accept_privacy_policy()?;
                println!("Privacy policy accepted.");
            }
            PrivacyCommands::Reject => {
                ledger.reject_privacy_policy()?;
                println!("Privacy policy rejected.");
            }
            PrivacyCommands::Status => match ledger.privacy_decision()? {
                PrivacyDecision::Accepted => println!("Accepted."),
                PrivacyDecision::Rejected => println!("Rejected."),
                PrivacyDecision::Pending => println!("No decision yet. Run `herhub privacy accept` or `herhub privacy reject`."),
            },
        },

        Commands::Forum { command } => match command {
            ForumCommands::List => {
                let posts = client.list_posts().await?;
                if posts.is_empty() {
                    println!("No posts yet.");
                } else {
                    println!("{:<26} {:<40} {:<18} {:>8}", "ID", "TITLE", "AUTHOR", "COMMENTS");
                    println!("{}", "-".repeat(95));
                    for post in posts {
                        println!(
                            "{:<26} {:<40} {:<18} {:>8}",
                            truncate(&post.id, 24),
                            truncate(&post.title, 38),
                            truncate(post.author.as_ref().map(|a| a.display()).unwrap_or(""), 16),
                            post.comments.len()
                        );
                    }
                }
            }

            ForumCommands::Show { id } => {
                let post = client.get_post(&id).await?;
                println!("{}", post.title);
                if let Some(author) = &post.author {
                    println!("by {}", author.display());
                }
                if let Some(created) = post.created_at {
                    println!("{}", created.format("%Y-%m-%d %H:%M"));
                }
                println!("\n{}", post.content);
                if !post.comments.is_empty() {
                    println!("\nComments ({}):", post.comments.len());
                    for comment in &post.comments {
                        let author = comment.author.as_ref().map(|a| a.display()).unwrap_or("anonymous");
                        println!("  [{}] {}: {}", comment.id, author, comment.content);
                    }
                }
            }

            ForumCommands::Post { title, content } => {
                let post = client
                    .create_post(&NewPost {
                        title: &title,
                        content: &content,
                    })
                    .await?;
                println!("Posted #{}", post.id);
            }

            ForumCommands::Edit { id, title, content } => {
                if title.is_none() && content.is_none() {
                    println!("Nothing to change. Use --title and/or --content.");
                } else {
                    client
                        .update_post(
                            &id,
                            &PostUpdate {
                                title: title.as_deref(),
                                content: content.as_deref(),
                            },
                        )
                        .await?;
                    println!("Updated #{}", id);
                }
            }

            ForumCommands::Delete { id } => {
                client.delete_post(&id).await?;
                println!("Deleted #{}", id);
            }

            ForumCommands::Comment { post_id, content } => {
                let comment = client.add_comment(&post_id, &content).await?;
                println!("Comment #{} added to #{}", comment.id, post_id);
            }

            ForumCommands::Uncomment { post_id, comment_id } => {
                client.delete_comment(&post_id, &comment_id).await?;
                println!("Deleted comment #{}", comment_id);
            }
        },

        Commands::Upload { kind, file } => {
            let kind = UploadKind::parse(&kind)
                .ok_or_else(|| anyhow!("Unknown upload kind '{}'. Use profile-image, resume or forum-media", kind))?;
            let url = client.upload_file(kind, &file).await?;
            println!("{}", url);
        }
    }

    Ok(())
}

fn print_popup(popup: &ReminderPopup) {
    let urgent = popup.urgent().len();
    println!("\nUpcoming deadlines ({} urgent):", urgent);
    for r in popup.visible() {
        let marker = if r.is_urgent { "!" } else { " " };
        println!("{} {:<26} {:<30} {}", marker, truncate(r.id(), 24), truncate(&r.opportunity.title, 28), r.label());
    }
}

fn report(what: &str, outcome: &WriteOutcome) {
    match outcome {
        WriteOutcome::Applied => println!("{}: saved.", what),
        WriteOutcome::Failed(msg) => eprintln!("{}: not saved ({}).", what, msg),
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("Women in Engineering Scholarship", 12), "Women in ...");
        assert_eq!(truncate("Bourse d'études à Montréal", 10), "Bourse ...");
    }

    #[test]
    fn test_cli_parses_global_flags_anywhere() {
        let cli = Cli::try_parse_from(["herhub", "reminders", "--ephemeral", "--api-url", "http://hub.test"]).unwrap();
        assert!(cli.ephemeral);
        assert_eq!(cli.api_url, "http://hub.test");
        assert!(matches!(cli.command, Commands::Reminders));
    }

    #[test]
    fn test_interest_remind_conflicts_with_decline() {
        assert!(Cli::try_parse_from(["herhub", "interest", "o1", "--remind", "--decline"]).is_err());
        let cli = Cli::try_parse_from(["herhub", "interest", "o1", "--remind"]).unwrap();
        assert!(matches!(cli.command, Commands::Interest { remind: true, decline: false, .. }));
    }
}
