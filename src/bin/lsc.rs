//! `lsc` — list the volume inventory of a libstor server.
//!
//! ```text
//! lsc <config.json> [--attachments <mask>]
//! ```
//!
//! Prints the service/volume inventory and exits 0.  Any error is printed
//! as `lsc: error: <message>` and the process exits 1; the session handle
//! is released on every exit path, including after a failed query.

use std::path::PathBuf;
use std::process;

use clap::Parser;

use libstor::client::Client;
use libstor::error::StorError;
use libstor::types::{AttachmentFlags, ServiceVolumeMap};

#[derive(Parser, Debug)]
#[command(name = "lsc", about = "libstor inventory client")]
struct Args {
    /// Path to the JSON client configuration.
    config: Option<PathBuf>,

    /// Attachment capability mask passed to the volumes query.
    #[arg(short, long, default_value_t = 0)]
    attachments: u16,
}

fn program_name() -> String {
    std::env::args().next().unwrap_or_else(|| "lsc".to_owned())
}

fn fatal(err: &StorError) -> ! {
    eprintln!("{}: error: {err}", program_name());
    process::exit(1);
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let args = Args::parse();
    let Some(config) = args.config else {
        eprintln!(
            "usage: {} <config.json> [--attachments <mask>]",
            program_name()
        );
        process::exit(1);
    };

    let mut client = match Client::new(&config).await {
        Ok(client) => client,
        Err(e) => fatal(&e),
    };

    match client.volumes(AttachmentFlags(args.attachments)).await {
        Ok(map) => {
            print_inventory(&map);
            if let Err(e) = client.close().await {
                fatal(&e);
            }
        }
        Err(e) => {
            // release the session before reporting the failure
            let _ = client.close().await;
            fatal(&e);
        }
    }
}

fn print_inventory(map: &ServiceVolumeMap) {
    for (service, volumes) in map.iter() {
        println!("{service}");
        for (id, volume) in volumes.iter() {
            println!("  {id}");
            println!("    name:   {}", volume.name);
            println!("    size:   {}", volume.size);
            println!("    iops:   {}", volume.iops);
            println!("    type:   {}", volume.volume_type);
            println!("    status: {}", volume.status);
            if !volume.availability_zone.is_empty() {
                println!("    zone:   {}", volume.availability_zone);
            }
            if !volume.network_name.is_empty() {
                println!("    net:    {}", volume.network_name);
            }
            for a in &volume.attachments {
                println!(
                    "    attachment: instance={} device={} mount={} status={}",
                    a.instance_id, a.device_name, a.mount_point, a.status
                );
            }
        }
    }
}
