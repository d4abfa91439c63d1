use anyhow::Result;
use std::env;
use std::path::{Path, PathBuf};

use sales_collection::{
    EntrySession, SqliteGateway, SubmissionController, SubmitOutcome,
};

const DEFAULT_DB: &str = "collections.db";

fn main() -> Result<()> {
    let args: Vec<String> = env::args().collect();

    match args.get(1).map(String::as_str) {
        Some("submit") => {
            let entry_path = match args.get(2) {
                Some(path) => PathBuf::from(path),
                None => {
                    eprintln!("Usage: sales-collection submit <entry.json> [db]");
                    std::process::exit(2);
                }
            };
            run_submit(&entry_path, db_path(args.get(3)))?;
        }
        Some("records") => run_records(db_path(args.get(2)))?,
        Some("stats") => run_stats(db_path(args.get(2)))?,
        _ => print_usage(),
    }

    Ok(())
}

fn db_path(arg: Option<&String>) -> PathBuf {
    arg.map(PathBuf::from).unwrap_or_else(|| PathBuf::from(DEFAULT_DB))
}

fn print_usage() {
    println!("Daily Sales Collection v{}", sales_collection::VERSION);
    println!();
    println!("Usage:");
    println!("  sales-collection submit <entry.json> [db]   Validate and submit an entry");
    println!("  sales-collection records [db]               List stored records");
    println!("  sales-collection stats [db]                 Store totals by category and route");
}

fn run_submit(entry_path: &Path, db: PathBuf) -> Result<()> {
    println!("📋 Daily Sales Entry Submission");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let session = EntrySession::from_json_file(entry_path)?;
    println!("✓ Loaded entry for {} / {}", session.executive_id, session.route_name);
    println!("  Ref: {}", session.token);

    let mut controller = SubmissionController::resume(
        session,
        sales_collection::ReferenceData::builtin(),
        sales_collection::ControllerConfig::default(),
    );

    let report = controller.report();
    println!("  {}", report.summary());

    let mut gateway = SqliteGateway::open(&db)?;

    match controller.submit(&mut gateway) {
        SubmitOutcome::Saved { token, records } => {
            println!("\n✅ Saved {} records under token {}", records, token);
        }
        SubmitOutcome::Invalid(errors) => {
            eprintln!("\n❌ Entry is not submittable:");
            for error in &errors {
                eprintln!("   - {}", error);
            }
            std::process::exit(1);
        }
        SubmitOutcome::Failed(error) if error.is_duplicate() => {
            eprintln!("\n⚠️  {}", error);
            eprintln!("   This entry was likely already saved. Check the store before");
            eprintln!("   resubmitting; a confirmed duplicate needs a fresh entry.");
            std::process::exit(1);
        }
        SubmitOutcome::Failed(error) => {
            eprintln!("\n❌ Store rejected the batch: {}", error);
            eprintln!("   The entry file is unchanged; retry with the same command.");
            std::process::exit(1);
        }
        SubmitOutcome::AlreadyInFlight => {
            eprintln!("\n⚠️  A submission is already in progress for this session.");
            std::process::exit(1);
        }
    }

    Ok(())
}

fn run_records(db: PathBuf) -> Result<()> {
    let gateway = open_existing(&db)?;
    let records = gateway.all_records()?;

    println!("📊 {} stored records", records.len());
    for record in &records {
        println!(
            "  {}  {:<22} shop {:>6}  {:>10.2}  [{}]",
            record.date, record.route_name, record.shop_id, record.amount, record.deposit_type
        );
    }

    Ok(())
}

fn run_stats(db: PathBuf) -> Result<()> {
    let gateway = open_existing(&db)?;
    let stats = gateway.stats()?;

    println!("📊 Store totals");
    println!("━━━━━━━━━━━━━━━");
    println!("  Submissions:          {}", stats.submissions);
    println!("  Records:              {}", stats.records);
    println!("  Total amount:         {:.2}", stats.total_amount);
    println!("  Previous collection:  {:.2}", stats.previous_collection);
    println!("  Cheque:               {:.2}", stats.cheque);
    println!("  Cash not deposited:   {:.2}", stats.cash_not_deposited);

    if !stats.by_route.is_empty() {
        println!("\n  By route:");
        for route in &stats.by_route {
            println!(
                "    {:<28} {:>4} records  {:>12.2}",
                route.route_name, route.record_count, route.total_amount
            );
        }
    }

    Ok(())
}

fn open_existing(db: &Path) -> Result<SqliteGateway> {
    if !db.exists() {
        eprintln!("❌ Database not found at {:?}", db);
        eprintln!("   Submit an entry first: sales-collection submit <entry.json>");
        std::process::exit(1);
    }
    SqliteGateway::open(db)
}
