use std::{env, sync::Arc, thread};

use colored::Colorize;
use log::{error, info};
use thiserror::Error;

use mixtape_server::{run_server, SocialSystem};
use mixtape_social::{DatabaseError, HttpControlPlane, HttpMediaStorage, PgDatabase, Social};

mod logging;

#[derive(Debug, Error)]
enum SetupError {
    #[error("Missing environment variable {0}")]
    MissingEnv(&'static str),

    #[error("Could not initialize database: {0}")]
    Database(DatabaseError),
}

impl SetupError {
    fn hint(&self) -> String {
        match self {
            SetupError::MissingEnv(_) => {
                "Set the variable in the environment before starting the server.".to_string()
            }
            SetupError::Database(_) => {
                "This is a database error. Make sure the Postgres instance is reachable at DATABASE_URL, then try again."
                    .to_string()
            }
        }
    }
}

fn required_env(name: &'static str) -> Result<String, SetupError> {
    env::var(name).map_err(|_| SetupError::MissingEnv(name))
}

async fn setup() -> Result<Arc<SocialSystem>, SetupError> {
    let media = HttpMediaStorage::new(
        required_env("MIXTAPE_MEDIA_API")?,
        required_env("MIXTAPE_MEDIA_KEY")?,
    );

    let control_plane = HttpControlPlane::new(
        required_env("MIXTAPE_STREAM_API")?,
        required_env("MIXTAPE_STREAM_KEY")?,
        required_env("MIXTAPE_STREAM_WEBHOOK_SECRET")?,
    );

    info!("Connecting to database...");

    let database = PgDatabase::new(&required_env("DATABASE_URL")?)
        .await
        .map_err(SetupError::Database)?;

    Ok(Arc::new(Social::new(database, media, control_plane)))
}

#[tokio::main]
async fn main() {
    logging::init_logger();

    match setup().await {
        Ok(social) => {
            info!("Initialized successfully.");

            let events = social.events();
            thread::spawn(move || {
                while let Ok(event) = events.recv() {
                    info!("{:?}", event);
                }
            });

            run_server(social).await
        }
        Err(error) => {
            error!(
                "{} Read the error below to troubleshoot the issue.",
                "Mixtape failed to start!".bold().red()
            );
            error!("{}", error);
            error!("{}", format!("Hint: {}", error.hint()).dimmed().italic());
        }
    }
}
