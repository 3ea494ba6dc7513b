//! Daily bank reconciliation example

use reconciliation_core::utils::format_amount;
use reconciliation_core::{
    AutoConfirm, MemorySink, RawRecord, ReconciliationSession, Role, User, Workspace,
};
use chrono::NaiveDate;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "reconciliation_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().without_time())
        .init();

    println!("🏦 Reconciliation Core - Daily Reconciliation Example\n");

    let admin = User::new("ana".to_string(), "Ana Admin".to_string(), Role::Admin);
    let sink = MemorySink::new();
    let mut session = ReconciliationSession::new(Workspace::new(admin), sink.clone());

    session
        .add_user(User::new(
            "rita".to_string(),
            "Rita Reconciler".to_string(),
            Role::Reconciler,
        ))
        .await?;

    // 1. Import the day's feeds
    println!("📥 Importing feeds...");
    let date = NaiveDate::from_ymd_opt(2024, 7, 3).ok_or("invalid date")?;
    let ledger = vec![
        RawRecord::new("INV-101", "2024-06-28", "Invoice 101 - Acme", "1200.00"),
        RawRecord::new("INV-102", "2024-07-01", "Invoice 102 - Globex", "100.00"),
        RawRecord::new("INV-103", "2024-07-02", "Invoice 103 - Initech", "500.00"),
    ];
    let bank = vec![
        RawRecord::new("BNK-9001", "2024-06-28", "ACME CORP", "1200.00").with_reference("INV-101"),
        RawRecord::new("BNK-9002", "2024-07-01", "GLOBEX LTD", "95.00"),
        RawRecord::new("BNK-9003", "2024-07-03", "INITECH", "485.00"),
        RawRecord::new("BNK-9004", "not a date", "UNKNOWN", "12.00"),
    ];
    let report = session.import_feeds(date, &ledger, &bank).await?;
    println!(
        "  ✓ {} ledger rows, {} bank rows, {} skipped\n",
        report.imported_left, report.imported_right, report.skipped
    );

    // 2. Match as the reconciler
    println!("🔗 Matching transactions...");
    session.switch_operator("rita")?;
    for (left, right, comment) in [
        ("INV-101", "BNK-9001", ""),
        ("INV-102", "BNK-9002", "Bank charge"),
        ("INV-103", "BNK-9003", "Short payment, chasing customer"),
    ] {
        let group = session
            .create_match(&[left.to_string()], &[right.to_string()], comment)
            .await?;
        println!(
            "  ✓ {} ↔ {}: difference {} ({})",
            left,
            right,
            format_amount(&group.difference),
            group.status
        );
    }
    println!();

    // 3. Sign off what needs approval
    println!(
        "✅ Approving adjustments above {}...",
        format_amount(session.workspace().engine().approval_threshold())
    );
    session.switch_operator("ana")?;
    let pending: Vec<String> = session
        .workspace()
        .pending_approvals()
        .iter()
        .map(|m| m.id.clone())
        .collect();
    let approved = session.batch_approve(&pending).await?;
    println!("  ✓ {} adjustment(s) approved\n", approved);

    // 4. Close June and snapshot the day
    println!("🔒 Closing the period...");
    session
        .set_locked_date(NaiveDate::from_ymd_opt(2024, 6, 30))
        .await?;
    let snapshot = session.save_snapshot("End of day 2024-07-03").await?;
    println!("  ✓ Period locked through 2024-06-30, snapshot {}\n", snapshot.id);

    // 5. A mistaken change, rolled back through the snapshot
    let last_match = session
        .workspace()
        .matches()
        .last()
        .map(|m| m.id.clone())
        .ok_or("no matches")?;
    session.unmatch(&last_match).await?;
    session.restore_snapshot(&snapshot.id, &AutoConfirm).await?;

    let summary = session.workspace().summary();
    println!("📊 Summary");
    println!("  Matches:            {}", summary.match_count);
    println!("  Pending approvals:  {}", summary.pending_approvals);
    println!("  Write-off eligible: {}", summary.write_off_eligible);
    println!("  Matched value:      {}", format_amount(&summary.matched_value));
    println!(
        "  Unmatched:          {} left / {} right",
        summary.unmatched_left, summary.unmatched_right
    );
    println!();

    println!("📜 Audit trail");
    for entry in session.workspace().audit_log() {
        println!(
            "  {} {:<22} {:<16} {}",
            entry.timestamp.format("%H:%M:%S"),
            entry.action.as_str(),
            entry.user_name,
            entry.details
        );
    }

    println!("\n💾 {} state writes persisted", sink.write_count());
    Ok(())
}
