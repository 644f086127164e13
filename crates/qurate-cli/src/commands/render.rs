//! Shared terminal rendering for records, clusters, and ledger entries.

use qurate_core::model::{AuditEntry, Cluster, DocumentChange, QaRecord};

/// Truncate `text` to at most `width` characters, flattening newlines and
/// appending an ellipsis when something was cut. Counts characters, not
/// bytes, so multi-byte questions do not split mid-glyph.
#[must_use]
pub fn truncate(text: &str, width: usize) -> String {
    let flat = text.replace('\n', " ");
    if flat.chars().count() <= width {
        flat
    } else {
        let mut cut: String = flat.chars().take(width.saturating_sub(1)).collect();
        cut.push('…');
        cut
    }
}

/// One-line summary used by list and search output.
#[must_use]
pub fn record_line(record: &QaRecord) -> String {
    format!(
        "{:<36}  {:<12}  {}",
        record.id,
        record.category.as_deref().unwrap_or("-"),
        truncate(&record.question, 56)
    )
}

/// Full detail block for `show`.
pub fn print_record(record: &QaRecord) {
    println!("Id:            {}", record.id);
    println!("Question:      {}", record.question);
    println!("Answer:        {}", record.answer);
    println!("Category:      {}", record.category.as_deref().unwrap_or("-"));
    println!(
        "Source file:   {}",
        record.source_file.as_deref().unwrap_or("-")
    );
    match record.document_date {
        Some(date) => println!("Document date: {date}"),
        None => println!("Document date: -"),
    }
    println!(
        "Uploaded:      {}",
        record.upload_timestamp.format("%Y-%m-%d %H:%M:%S UTC")
    );
    println!("Version:       {}", record.version);
    match &record.embedding {
        Some(vector) => println!("Embedding:     {} dimension(s)", vector.len()),
        None => println!("Embedding:     none"),
    }
}

/// Cluster block used by scan, apply, and merge previews.
pub fn print_cluster(number: usize, cluster: &Cluster) {
    let threshold = match cluster.threshold {
        Some(t) => format!(", threshold {t:.2}"),
        None => String::new(),
    };
    println!(
        "\nCluster {number} ({}, {} member(s){threshold})",
        cluster.method,
        cluster.len()
    );
    for member in &cluster.members {
        let date = member
            .document_date
            .map_or_else(|| "-".to_string(), |d| d.to_string());
        println!(
            "  {}  v{}  {}  {}",
            member.id,
            member.version,
            date,
            truncate(&member.question, 48)
        );
        println!("      {}", truncate(&member.answer, 64));
    }
    if let Some(score) = cluster.min_edge_score() {
        println!("  weakest pair score: {score:.4}");
    }
}

/// One-line ledger entry for `audit list`.
#[must_use]
pub fn entry_line(entry: &AuditEntry) -> String {
    format!(
        "{}  {:<6}  {:>3} doc(s)  {}",
        entry.performed_at.format("%Y-%m-%d %H:%M:%S"),
        entry.kind.as_str(),
        entry.documents.len(),
        entry.operation_id
    )
}

/// What happened to one document inside an entry.
#[must_use]
pub fn change_summary(change: &DocumentChange) -> String {
    match (&change.before, &change.after) {
        (Some(_), None) => "deleted".to_string(),
        (None, Some(_)) => "inserted".to_string(),
        (Some(before), Some(after)) if before == after => "unchanged".to_string(),
        (Some(before), Some(after)) => {
            format!("updated (v{} to v{})", before.version, after.version)
        }
        (None, None) => "already absent".to_string(),
    }
}
