// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! svcpanel shell.
//!
//! Reads bus messages as JSON lines on stdin, keeps the panel set in sync,
//! and prints the final panel list as JSON once stdin closes. An optional
//! first argument names a directory snapshot file to seed the bus with.

use std::error::Error;
use std::sync::Arc;
use svcpanel::adapters::AdapterTable;
use svcpanel::config::{AppConfig, ConfigManager, LayoutConfig};
use svcpanel::transport::{parse_snapshot, LocalBus};
use svcpanel::Session;
use svcpanel_ipc::Message;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_stream::wrappers::LinesStream;
use tokio_stream::StreamExt;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // Logs go to stderr; stdout carries the panel listing
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env().add_directive("svcpanel=debug".parse()?))
        .init();

    info!("Starting svcpanel");

    let config_manager = ConfigManager::new()?;
    let config = config_manager.load_config().unwrap_or_else(|e| {
        warn!("Failed to load config, using defaults: {}", e);
        AppConfig::default()
    });
    let layout = config_manager.load_layout().unwrap_or_else(|e| {
        warn!("Failed to load layout: {}", e);
        LayoutConfig::default()
    });

    let (bus, events) = LocalBus::new(config.general.runtime_name.clone());
    if let Some(path) = std::env::args().nth(1) {
        let json = std::fs::read_to_string(&path)?;
        let services = parse_snapshot(&json)?;
        info!("Seeding {} services from {}", services.len(), path);
        for service in services {
            bus.seed(service);
        }
    }

    let loader = AdapterTable::from_config(&config.modules);
    info!("Panel modules: {:?}", loader.types());

    let mut session = Session::new(Arc::new(bus.clone()), Arc::new(loader), &config, layout)
        .with_config_manager(config_manager);
    session.start();

    // Feed stdin into the bus until EOF
    let input = bus.clone();
    let reader_task = tokio::spawn(async move {
        let mut lines = LinesStream::new(BufReader::new(tokio::io::stdin()).lines());
        while let Some(line) = lines.next().await {
            let line = match line {
                Ok(line) => line,
                Err(e) => {
                    error!("Failed to read stdin: {}", e);
                    break;
                }
            };
            if line.trim().is_empty() {
                continue;
            }
            match Message::from_json(&line) {
                Ok(msg) => input.deliver(msg),
                Err(e) => warn!("Skipping input line: {}", e),
            }
        }
        input.shutdown();
    });

    session.run(events).await;
    session.drain_loads().await;
    if let Err(e) = reader_task.await {
        error!("Input task failed: {}", e);
    }

    if let Err(e) = session.save_layout() {
        error!("Failed to save layout: {}", e);
    }

    println!("{}", serde_json::to_string_pretty(&session.panel_summaries())?);
    info!("svcpanel stopped");
    Ok(())
}
