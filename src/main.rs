mod cms;
mod comments;
mod config;
mod error;
mod form;
mod http;
mod loader;
mod model;
mod watcher;

use std::time::Duration;

use clap::{Parser, Subcommand};
use indicatif::ProgressBar;
use tokio::sync::mpsc;

use cms::{BlogFeedSource, CmsCommentStore, ListQuery, MicrocmsClient};
use comments::CommentSync;
use config::Config;
use form::CommentForm;
use loader::{FeedLoader, LoadOutcome};
use model::{Category, Comment, Page, Post};
use watcher::ScrollWatcher;

/// Number of posts fetched per page. Fixed for a session.
const PER_PAGE: usize = 4;

/// A reader for microCMS-backed blogs
#[derive(Parser)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List posts, loading pages incrementally until the feed runs out
    List {
        /// Only list posts in this category
        #[arg(short, long)]
        category: Option<String>,
    },
    /// Show one post with its comments
    Show {
        /// The post id
        id: String,
    },
    /// Post a comment on a post
    Comment {
        /// The post id
        id: String,
        /// Your name
        #[arg(short, long)]
        name: String,
        /// The comment text
        #[arg(short, long)]
        message: String,
    },
    /// List all categories
    Categories,
}

fn format_post(post: &Post) -> String {
    format!(
        "{}  {} ({})  [{}]",
        post.published_at.format("%Y-%m-%d"),
        post.title,
        post.category.name,
        post.id
    )
}

fn format_comment(comment: &Comment) -> String {
    format!(
        "{}  {}  [{}]\n  {}",
        comment.posted_at.format("%Y-%m-%d %H:%M"),
        comment.name,
        comment.id,
        comment.content
    )
}

/// Removes HTML tags from a post body and collapses the leftover blank
/// lines, so rich-text bodies stay readable in a terminal.
fn strip_tags(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut in_tag = false;
    for c in html.chars() {
        match c {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => out.push(c),
            _ => {}
        }
    }
    out.lines()
        .map(str::trim_end)
        .filter(|line| !line.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn spinner(message: &'static str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_message(message);
    pb.enable_steady_tick(Duration::from_millis(120));
    pb
}

fn read_client(config: &Config) -> anyhow::Result<MicrocmsClient> {
    Ok(MicrocmsClient::new(
        http::http_client()?,
        config.base_url(),
        config.api_key.clone(),
    ))
}

async fn cmd_list(config: &Config, category: Option<String>) -> anyhow::Result<()> {
    let source = BlogFeedSource::new(read_client(config)?, category);
    let loader = FeedLoader::new(source, PER_PAGE);

    let pb = spinner("loading posts");
    if loader.load_initial().await == LoadOutcome::Failed {
        pb.finish_and_clear();
        anyhow::bail!("failed to load posts");
    }

    if !loader.is_exhausted() {
        // The terminal renders the whole list at once, so the sentinel is
        // permanently visible: pump triggers until the watcher disarms.
        let (tx, rx) = mpsc::channel(1);
        let watch = tokio::spawn(ScrollWatcher::new(loader.clone(), rx).watch());
        let pump = tokio::spawn(async move { while tx.send(()).await.is_ok() {} });
        watch.await?;
        pump.await?;
    }
    loader.detach();
    pb.finish_and_clear();

    let posts = loader.items();
    println!("{} posts", loader.total_count().unwrap_or(0));
    println!();
    for post in &posts {
        println!("{}", format_post(post));
        if let Some(excerpt) = &post.excerpt {
            println!("  {}", excerpt);
        }
    }
    if !loader.is_exhausted() {
        eprintln!(
            "loaded {} of {} posts; run the command again to retry",
            loader.cursor(),
            loader.total_count().unwrap_or(0)
        );
    }
    Ok(())
}

async fn cmd_show(config: &Config, id: &str) -> anyhow::Result<()> {
    let client = read_client(config)?;
    let pb = spinner("loading post");

    let post: Post = client.get("blog", id).await?;
    let sync = CommentSync::new(CmsCommentStore::read_only(client.clone()), id);
    sync.refresh().await?;
    pb.finish_and_clear();

    println!("{}", post.title);
    print!("{}", post.published_at.format("%Y-%m-%d %H:%M"));
    if let Some(updated) = post.updated_at
        && updated != post.published_at
    {
        print!(" (updated {})", updated.format("%Y-%m-%d %H:%M"));
    }
    println!("  [{}]", post.category.name);
    if let Some(eyecatch) = &post.eyecatch {
        println!("{}", eyecatch.url);
    }
    if let Some(body) = &post.body {
        println!();
        println!("{}", strip_tags(body));
    }

    println!();
    let comments = sync.comments();
    if comments.is_empty() {
        println!("No comments yet.");
    } else {
        println!("Comments ({}):", comments.len());
        for comment in &comments {
            println!("{}", format_comment(comment));
        }
    }
    sync.detach();
    Ok(())
}

async fn cmd_comment(config: &Config, id: &str, name: &str, message: &str) -> anyhow::Result<()> {
    let read = read_client(config)?;
    let write = MicrocmsClient::new(
        http::http_client()?,
        config.base_url(),
        config.write_api_key()?,
    );
    let sync = CommentSync::new(CmsCommentStore::new(read, write), id);

    let mut form = CommentForm::new(name, message);
    let pb = spinner("posting comment");
    let result = form.submit(&sync).await;
    pb.finish_and_clear();
    result?;

    println!("Comment posted.");
    println!();
    for comment in sync.comments() {
        println!("{}", format_comment(&comment));
    }
    sync.detach();
    Ok(())
}

async fn cmd_categories(config: &Config) -> anyhow::Result<()> {
    let client = read_client(config)?;
    let query = ListQuery {
        offset: 0,
        limit: 100,
        ..Default::default()
    };
    let page: Page<Category> = client.list("categories", &query).await?;
    for category in &page.contents {
        println!("{}  {}", category.id, category.name);
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "warn".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(filter.as_str())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = Config::from_env()?;

    match args.command {
        Command::List { category } => cmd_list(&config, category).await,
        Command::Show { ref id } => cmd_show(&config, id).await,
        Command::Comment {
            ref id,
            ref name,
            ref message,
        } => cmd_comment(&config, id, name, message).await,
        Command::Categories => cmd_categories(&config).await,
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use chrono::Utc;

    use super::*;
    use crate::model::Eyecatch;

    fn post(title: &str, date: (i32, u32, u32), category: &str) -> Post {
        Post {
            id: "p1".to_string(),
            title: title.to_string(),
            published_at: Utc
                .with_ymd_and_hms(date.0, date.1, date.2, 9, 30, 0)
                .unwrap(),
            category: Category {
                id: "c1".to_string(),
                name: category.to_string(),
            },
            eyecatch: Some(Eyecatch {
                url: "https://img.example/p1.png".to_string(),
            }),
            excerpt: None,
            body: None,
            updated_at: None,
        }
    }

    #[test]
    fn test_format_post() {
        let p = post("Hello", (2024, 1, 15), "News");
        assert_eq!(format_post(&p), "2024-01-15  Hello (News)  [p1]");
    }

    #[test]
    fn test_format_comment() {
        let c = Comment {
            id: "c1".to_string(),
            name: "Alice".to_string(),
            content: "hello".to_string(),
            posted_at: Utc.with_ymd_and_hms(2024, 1, 15, 12, 5, 0).unwrap(),
            parent_id: "p1".to_string(),
        };
        assert_eq!(format_comment(&c), "2024-01-15 12:05  Alice  [c1]\n  hello");
    }

    #[test]
    fn test_strip_tags_removes_markup() {
        let html = "<h2>Heading</h2>\n<p>First <strong>bold</strong> line.</p>";
        assert_eq!(strip_tags(html), "Heading\nFirst bold line.");
    }

    #[test]
    fn test_strip_tags_drops_blank_lines() {
        let html = "<p>one</p>\n\n\n<p>two</p>\n";
        assert_eq!(strip_tags(html), "one\ntwo");
    }

    #[test]
    fn test_strip_tags_plain_text_unchanged() {
        assert_eq!(strip_tags("no markup here"), "no markup here");
    }
}
