mod fixtures;

use anyhow::{Context, Result};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use propgraph_common::{Config, GraphError, NodeSpec};
use propgraph_graph::{GraphClient, GraphRepository};

use fixtures::{movie_by_title, user_by_name, MOVIES, RATED, RATINGS, USERS};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("propgraph=info".parse()?))
        .init();

    let config = Config::from_env()?;
    config.log_redacted();

    let client = GraphClient::connect(&config).await?;
    let repo = GraphRepository::new(client);

    let outcome = match std::env::args().nth(1).as_deref() {
        Some("--find") => {
            let name = std::env::args()
                .nth(2)
                .context("--find requires a user name")?;
            report(&repo, &name).await
        }
        Some(other) => Err(anyhow::anyhow!("unknown argument {other}; expected --find <name>")),
        None => seed(&repo).await,
    };

    repo.close().await;
    outcome
}

async fn seed(repo: &GraphRepository) -> Result<()> {
    info!("Seeding movie ratings...");

    for user in USERS {
        let node = repo.create_node(&user.spec()).await?;
        info!(id = node.id, name = user.name, "Created user");
    }
    for movie in MOVIES {
        let node = repo.create_node(&movie.spec()).await?;
        info!(id = node.id, title = movie.title, "Created movie");
    }

    let mut written = 0;
    for rating in RATINGS {
        match repo
            .create_relationship(
                &rating.user_matcher(),
                RATED,
                &rating.properties(),
                &rating.movie_matcher(),
            )
            .await
        {
            Ok(_) => written += 1,
            Err(e @ (GraphError::NodeNotFound { .. } | GraphError::AmbiguousMatch { .. })) => {
                warn!(user = rating.user, movie = rating.movie, error = %e, "Skipped rating");
            }
            Err(e) => return Err(e.into()),
        }
    }

    let (first, second) = repo
        .create_linked_pair(
            &NodeSpec::new("Person").with("name", "Ann"),
            "KNOWS",
            &NodeSpec::new("Person").with("name", "Ben"),
        )
        .await?;

    info!(
        users = USERS.len(),
        movies = MOVIES.len(),
        ratings = written,
        pair = %format!("{} -> {}", first.id, second.id),
        "Seed complete"
    );
    Ok(())
}

async fn report(repo: &GraphRepository, name: &str) -> Result<()> {
    let users = repo.find_node_by_property(fixtures::USER, "name", name).await?;
    if users.is_empty() {
        println!("No user named {name}");
        return Ok(());
    }
    for user in &users {
        println!("{}", serde_json::to_string_pretty(user)?);
    }

    let who = user_by_name(name);
    for movie in MOVIES {
        match repo
            .find_relationship_rating(&who, &movie_by_title(movie.title))
            .await
        {
            Ok(Some(rating)) => println!("{:<28} {rating}", movie.title),
            Ok(None) => {}
            Err(e @ GraphError::AmbiguousMatch { .. }) => {
                warn!(movie = movie.title, error = %e, "Rating is ambiguous");
            }
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}
