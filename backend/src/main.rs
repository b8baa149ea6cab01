mod app;
mod config;
mod dispatch;
mod error;
mod ingest;
mod job_controller;
mod services;
mod state;
mod surfaces;
mod template;
mod validation;

use crate::app::AppState;
use crate::config::Config;
use crate::dispatch::link::{BrowserOpener, LinkOpener, LogOpener};
use crate::job_controller::state::{RunsState, UPDATE_CHANNEL_CAPACITY};
use actix_web::{web, App, HttpServer};
use env_logger::Env;
use log::{info, warn};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tokio::sync::mpsc;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::init_from_env(Env::default().default_filter_or("info"));
    let config = Config::from_env();
    let url = config.server_url();

    if config.open_ui {
        let url = url.clone();
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(500));
            if let Err(e) = webbrowser::open(&url) {
                warn!("Could not open {}: {}", url, e);
            }
        });
    }

    // Run registry fed by the dispatcher
    let (tx, rx) = mpsc::channel(UPDATE_CHANNEL_CAPACITY);
    let runs = RunsState::new(tx);
    let updater_state = runs.clone();
    tokio::spawn(async move {
        job_controller::state::start_run_updater(updater_state, rx).await;
    });

    let opener: Arc<dyn LinkOpener> = if config.dry_run {
        info!("Dry run: links are logged, not opened");
        Arc::new(LogOpener)
    } else {
        Arc::new(BrowserOpener)
    };

    let host = config.host.clone();
    let port = config.port;
    let app_state = AppState::new(config, opener, runs);

    info!("Server running at {}", url);

    HttpServer::new(move || {
        App::new()
            .app_data(web::JsonConfig::default().limit(10 * 1024 * 1024)) // 10 MB
            .app_data(web::Data::new(app_state.clone()))
            .configure(app::configure)
    })
        .bind((host, port))?
        .run()
        .await
}
