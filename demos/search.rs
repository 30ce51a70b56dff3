use anyhow::Result;
use chrono::{TimeZone, Utc};
use scihub::{Client, Footprint, Platform, SearchCriteria, SpatialRelation, TransferOutcome};
use std::path::Path;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    // Example program that calls the library API.
    // Configure authentication via SCIHUB_CREDENTIALS=user:password or a `.scihubrc` file.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let client = Client::from_env()?;

    let criteria = SearchCriteria::new(Utc.with_ymd_and_hms(2022, 1, 1, 0, 0, 0).unwrap())
        .with_end(Utc.with_ymd_and_hms(2022, 3, 1, 0, 0, 0).unwrap())
        .with_platform(Platform::Sentinel2)
        .with_product_type("S2MSI2A")
        .with_product_type("S2MS2Ap")
        .with_footprint(Footprint::new(
            "POLYGON((35.8207689450001 50.518113703,37.3657427630001 50.4703606300001,37.2773703820001 49.485620291,35.763545148 49.531744406,35.8207689450001 50.518113703))",
            SpatialRelation::Intersects,
        ));

    let result = client.search(&criteria)?;
    println!("Total found {} items", result.records.len());

    for record in &result.records {
        let online = match client.is_online(&record.id) {
            Ok(online) => online,
            Err(e) => {
                eprintln!("{}: {}", record.id, e);
                continue;
            }
        };
        println!(
            "[{}] online={} begin={}",
            record.filename,
            online,
            record
                .begin_position
                .map(|t| t.to_rfc3339())
                .unwrap_or_default()
        );
        if !online {
            continue;
        }

        match client.download(&record.id, Path::new("/tmp")) {
            Ok(TransferOutcome::Downloaded(file)) => {
                println!("Downloaded to {}", file.path.display())
            }
            Ok(TransferOutcome::ArchivePending { id }) => {
                println!("{} went offline; retrieval from the archive was triggered", id)
            }
            Err(e) => eprintln!("{}: {}", record.id, e),
        }
    }

    Ok(())
}
