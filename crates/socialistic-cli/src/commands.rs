//! Command handlers. Each one runs against an already restored session.

use std::io::{self, BufRead, Write};

use anyhow::{bail, Context, Result};
use tracing::{debug, warn};

use socialistic_core::api::ApiError;
use socialistic_core::cache::CacheManager;
use socialistic_core::feed::{Feed, FeedSource};
use socialistic_core::models::{LoginCredentials, NewPost, ProgrammingLanguage, RegisterData, User, UserPatch};
use socialistic_core::profile::ProfileView;
use socialistic_core::{ApiClient, Config, SessionManager};

use crate::output;
use crate::Command;

const PASSWORD_ENV: &str = "SOCIALISTIC_PASSWORD";

pub async fn run(command: Command, session: &SessionManager, config: &Config) -> Result<()> {
    match command {
        Command::Login { email } => login(session, config, email).await,
        Command::Register {
            username,
            email,
            full_name,
        } => register(session, username, email, full_name).await,
        Command::Logout => logout(session, config).await,
        Command::Whoami => {
            let user = require_user(session)?;
            println!("{}", output::user_line(&user));
            if !user.email.is_empty() {
                println!("{}", user.email);
            }
            Ok(())
        }
        Command::Feed { page } => feed(session.api(), config, page).await,
        Command::Post {
            content,
            code_file,
            language,
        } => {
            require_user(session)?;
            let mut post = NewPost::new(content);
            if let Some(path) = code_file {
                let code = std::fs::read_to_string(&path)
                    .with_context(|| format!("Failed to read code file {}", path.display()))?;
                post = post.with_code(code);
            }
            if let Some(name) = language {
                let lang = resolve_language(session.api(), config, &name).await?;
                post = post.with_language(lang.id);
            }
            let created = session.api().create_post(&post).await?;
            println!("{}", output::post(&created));
            Ok(())
        }
        Command::Like { post_id } => {
            require_user(session)?;
            session.api().like_post(post_id).await?;
            println!("Liked post {}", post_id);
            Ok(())
        }
        Command::Unlike { post_id } => {
            require_user(session)?;
            session.api().unlike_post(post_id).await?;
            println!("Removed like from post {}", post_id);
            Ok(())
        }
        Command::Profile { user_id } => {
            let view = ProfileView::load(session, user_id).await?;
            println!("{}", output::profile(&view));
            Ok(())
        }
        Command::Follow { user_id } => set_following(session, user_id, true).await,
        Command::Unfollow { user_id } => set_following(session, user_id, false).await,
        Command::EditProfile {
            full_name,
            bio,
            github,
            stackoverflow,
        } => {
            let patch = UserPatch {
                full_name,
                bio,
                github_profile: github,
                stackoverflow_profile: stackoverflow,
                ..Default::default()
            };
            edit_profile(session, &patch).await
        }
        Command::Languages => {
            let languages = languages(session.api(), config).await?;
            println!("{}", output::languages(&languages));
            Ok(())
        }
        Command::Followers { user_id } => {
            let page = session.api().followers(user_id).await?;
            print_users(&page.results, "No followers yet.");
            Ok(())
        }
        Command::Following { user_id } => {
            let page = session.api().following(user_id).await?;
            print_users(&page.results, "Not following anyone yet.");
            Ok(())
        }
    }
}

fn require_user(session: &SessionManager) -> Result<User> {
    match session.current_user() {
        Some(user) => Ok(user),
        None => bail!("Not signed in. Run `socialistic login` first."),
    }
}

fn cache_for(config: &Config) -> Result<CacheManager> {
    CacheManager::new(config.cache_dir()?)
}

fn print_users(users: &[User], empty: &str) {
    if users.is_empty() {
        println!("{}", empty);
    }
    for user in users {
        println!("{}", output::user_line(user));
    }
}

// ===== Prompts =====

fn prompt_line(label: &str) -> Result<String> {
    eprint!("{}", label);
    io::stderr().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    let line = line.trim().to_string();
    if line.is_empty() {
        bail!("{} is required", label.trim_end_matches([':', ' ']));
    }
    Ok(line)
}

fn password_from_env_or_prompt(label: &str) -> Result<String> {
    if let Ok(password) = std::env::var(PASSWORD_ENV) {
        if !password.is_empty() {
            return Ok(password);
        }
    }
    Ok(rpassword::prompt_password(label)?)
}

// ===== Auth =====

async fn login(session: &SessionManager, config: &Config, email: Option<String>) -> Result<()> {
    let email = match email.or_else(|| config.last_email.clone()) {
        Some(email) => email,
        None => prompt_line("Email: ")?,
    };
    let password = password_from_env_or_prompt("Password: ")?;

    let user = session.login(&LoginCredentials::new(email.clone(), password)).await?;
    remember_email(email);
    println!("Signed in as {}", output::user_line(&user));
    Ok(())
}

async fn register(
    session: &SessionManager,
    username: String,
    email: String,
    full_name: Option<String>,
) -> Result<()> {
    let password = password_from_env_or_prompt("Password: ")?;
    if std::env::var(PASSWORD_ENV).is_err() {
        let confirm = rpassword::prompt_password("Confirm password: ")?;
        if confirm != password {
            bail!("Passwords do not match");
        }
    }

    let data = RegisterData {
        username,
        email: email.clone(),
        password,
        full_name,
    };
    let user = session.register(&data).await?;
    remember_email(email);
    println!("Welcome, {}", output::user_line(&user));
    Ok(())
}

/// Store the email for the next login. Only the file is touched, so
/// environment and command-line overrides are not persisted.
fn remember_email(email: String) {
    let result = Config::load().and_then(|mut stored| {
        if stored.last_email.as_deref() == Some(email.as_str()) {
            return Ok(());
        }
        stored.last_email = Some(email);
        stored.save()
    });
    if let Err(e) = result {
        warn!(error = %e, "Failed to save config");
    }
}

async fn logout(session: &SessionManager, config: &Config) -> Result<()> {
    if !session.is_authenticated() {
        println!("Not signed in.");
        return Ok(());
    }

    let remote = session.logout().await;

    if let Err(e) = cache_for(config).and_then(|cache| cache.clear()) {
        warn!(error = %e, "Failed to clear cache");
    }

    match remote {
        Ok(()) => println!("Signed out."),
        // Local credentials are gone either way
        Err(e) => eprintln!("Signed out locally; the server did not confirm: {}", e.payload()),
    }
    Ok(())
}

// ===== Feed =====

async fn feed(api: &ApiClient, config: &Config, page: u32) -> Result<()> {
    let cache = cache_for(config).ok();

    let data = match api.posts(page).await {
        Ok(data) => data,
        Err(ApiError::Network(e)) if page == 1 => {
            let cached = cache.as_ref().and_then(|c| c.load_feed().ok().flatten());
            let Some(cached) = cached else {
                return Err(ApiError::Network(e).into());
            };
            eprintln!("Offline, showing feed from {}", cached.age_display());
            cached.data
        }
        Err(e) => return Err(e.into()),
    };

    if page == 1 {
        if let Some(ref cache) = cache {
            if let Err(e) = cache.save_feed(&data) {
                debug!(error = %e, "Failed to cache feed");
            }
        }
    }

    let feed = Feed::from_page(FeedSource::All, page, data);
    println!("{}", output::posts(feed.posts()));
    if feed.has_more() {
        println!("\nMore: socialistic feed --page {}", page + 1);
    }
    Ok(())
}

// ===== Languages =====

/// Fresh cached catalog, else fetched from the server and cached.
async fn languages(api: &ApiClient, config: &Config) -> Result<Vec<ProgrammingLanguage>> {
    let cache = cache_for(config).ok();
    if let Some(languages) = cache.as_ref().and_then(|c| c.fresh_languages()) {
        return Ok(languages);
    }

    let languages = api.programming_languages().await?;
    if let Some(ref cache) = cache {
        if let Err(e) = cache.save_languages(&languages) {
            debug!(error = %e, "Failed to cache languages");
        }
    }
    Ok(languages)
}

async fn resolve_language(api: &ApiClient, config: &Config, name: &str) -> Result<ProgrammingLanguage> {
    let languages = languages(api, config).await?;
    match find_language(&languages, name) {
        Some(lang) => Ok(lang.clone()),
        None => {
            let known: Vec<&str> = languages.iter().map(|l| l.name.as_str()).collect();
            bail!("Unknown language '{}'. Known: {}", name, known.join(", "))
        }
    }
}

fn find_language<'a>(languages: &'a [ProgrammingLanguage], name: &str) -> Option<&'a ProgrammingLanguage> {
    let name = name.trim();
    languages.iter().find(|l| l.name.eq_ignore_ascii_case(name))
}

// ===== Profile =====

async fn set_following(session: &SessionManager, user_id: i64, follow: bool) -> Result<()> {
    require_user(session)?;
    let mut view = ProfileView::load(session, user_id).await?;
    if view.is_own_profile {
        bail!("You cannot follow yourself");
    }

    let name = output::user_line(&view.user);
    if view.user.is_followed() == follow {
        println!("{} {}", if follow { "Already following" } else { "Not following" }, name);
        return Ok(());
    }

    view.toggle_follow(session).await?;
    println!(
        "{} {} ({} followers)",
        if follow { "Now following" } else { "Unfollowed" },
        name,
        view.user.followers_count
    );
    Ok(())
}

async fn edit_profile(session: &SessionManager, patch: &UserPatch) -> Result<()> {
    let me = require_user(session)?;
    if patch.is_empty() {
        bail!("Nothing to change. See `socialistic edit-profile --help`.");
    }

    let mut view = ProfileView::load(session, me.id).await?;
    view.save(session, patch).await?;
    println!("{}", output::profile(&view));
    Ok(())
}
