//! # Merge Logs Example
//!
//! Merges three in-memory logs into one time-ordered stream, stops halfway,
//! and resumes from the position persisted to a JSON file.
//!
//! Run with `cargo run --example merge_logs`. The engine's run start and
//! finish are logged at info level.

use chrono::{TimeZone, Utc};
use futures::StreamExt;
use logweave::{
  BoxError, ComposedReader, EntryReader, FilePositionStore, LogEntry, LogSource, MergeConfig,
  PositionTracker, SeverityLevel, SourceId, TrackingConsumer, VecReader,
};
use std::sync::Arc;

fn log(service: &str, lines: &[(i64, &str)]) -> Arc<dyn EntryReader> {
  let entries = lines
    .iter()
    .map(|(millis, message)| {
      let mut entry = LogEntry::new(format!("[{}] {}", service, message))
        .with_timestamp(Utc.timestamp_millis_opt(1_700_000_000_000 + millis).unwrap());
      entry.put("service", service);
      entry
    })
    .collect();
  Arc::new(
    VecReader::new(entries)
      .with_severities(vec![SeverityLevel::new("INFO", 2), SeverityLevel::new("ERROR", 4)]),
  )
}

fn cluster() -> ComposedReader {
  ComposedReader::new(vec![
    LogSource::new(
      SourceId::new(1),
      "/var/log/api.log",
      log("api", &[(0, "listening"), (120, "GET /users"), (480, "GET /orders")]),
    ),
    LogSource::new(
      SourceId::new(2),
      "/var/log/db.log",
      log("db", &[(50, "ready"), (130, "query users 3ms"), (490, "query orders 41ms")]),
    ),
    LogSource::new(
      SourceId::new(3),
      "/var/log/worker.log",
      log("worker", &[(10, "polling"), (300, "job 17 done"), (900, "idle")]),
    ),
  ])
  .with_config(MergeConfig::default().with_name("cluster"))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
  tracing_subscriber::fmt::init();

  let dir = std::env::temp_dir().join("logweave-demo");
  let store = FilePositionStore::new(dir.join("checkpoints.json"))?;
  let tracker = Arc::new(PositionTracker::new(Arc::new(store), "cluster"));
  tracker.reset()?;

  let reader = cluster();
  println!("severities: {:?}", reader.supported_severities());

  println!("--- first run: stop after four entries");
  let mut handled = 0;
  let consumer = TrackingConsumer::new(
    move |entry: LogEntry| -> Result<bool, BoxError> {
      handled += 1;
      println!("{:>4} {}", entry.timestamp_millis() % 10_000, entry.raw_content);
      Ok(handled < 4)
    },
    Arc::clone(&tracker),
  );
  reader.merge_read(&tracker.resume_offset(&reader)?, consumer).await?;

  let resume = tracker.resume_offset(&reader)?;
  println!("--- stored position: {}", resume);

  println!("--- second run: resume from the stored position");
  let mut rest = reader.merge_stream(resume);
  while let Some(entry) = rest.next().await {
    let entry = entry?;
    println!("{:>4} {}", entry.timestamp_millis() % 10_000, entry.raw_content);
  }

  Ok(())
}

