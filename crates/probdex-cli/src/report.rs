//! Terminal presentation of pipeline progress and results.

use probdex_runtime::{CorpusReport, PipelineEvent, ProblemMatches, SearchReport};

const RULE_WIDTH: usize = 60;

pub fn print_event(event: &PipelineEvent) {
    match event {
        PipelineEvent::StoreReset { db_path } => println!("Reset {}", db_path),
        PipelineEvent::Catalogued { rows } if *rows > 0 => {
            println!("Catalogued {} new skeleton rows", rows)
        }
        PipelineEvent::DocumentStarted {
            document,
            index,
            total,
            skipped_pages,
        } => {
            if *skipped_pages > 0 {
                println!(
                    "[{}/{}] {} ({} pages already analyzed)",
                    index, total, document, skipped_pages
                );
            } else {
                println!("[{}/{}] {}", index, total, document);
            }
        }
        PipelineEvent::DocumentFinished(doc) => {
            if doc.failed_pages.is_empty() {
                println!("  {}: {} problems", doc.outcome, doc.problems);
            } else {
                println!(
                    "  {}: {} problems, failed pages {:?}",
                    doc.outcome, doc.problems, doc.failed_pages
                );
            }
        }
        PipelineEvent::Synced(sync) => println!(
            "Synced corpus: {} stored, {} without ID, {} failed",
            sync.stored, sync.skipped_no_id, sync.failed
        ),
        _ => {}
    }
}

pub fn print_corpus(report: &CorpusReport) {
    println!("{}", "=".repeat(RULE_WIDTH));
    println!(
        "Documents: {}  Merged: {} updated, {} inserted, {} skipped",
        report.documents.len(),
        report.merge.updated,
        report.merge.inserted,
        report.merge.skipped
    );
    println!("Corpus rows stored: {}", report.sync.stored);
    if report.cancelled {
        println!("Run cancelled; rerun to resume.");
    }
    println!("{}", "=".repeat(RULE_WIDTH));
}

pub fn print_search(report: &SearchReport) {
    println!(
        "{}: {} problems extracted ({})",
        report.document,
        report.matches.len(),
        report.extraction.outcome
    );
    for matches in &report.matches {
        print_matches(matches);
    }
}

fn print_matches(matches: &ProblemMatches) {
    let problem = &matches.problem;
    println!(
        "\n[Query] {} > {} (#{})",
        problem.subject_name, problem.unit_name, problem.number
    );

    let Some(best) = matches.best() else {
        if matches.candidates == 0 {
            println!("  No corpus problems in unit {}.", problem.unit_name);
        } else {
            println!("  No similar problems.");
        }
        return;
    };

    if best.is_exact_match() {
        println!("  Exact match found: problem {}", best.id());
    }
    println!("{}", "=".repeat(RULE_WIDTH));
    println!("Best match: {}%", best.score);
    println!("{}", "-".repeat(RULE_WIDTH));
    println!("  Source:     {}", best.candidate.source_text);
    println!(
        "  Image:      {}",
        best.candidate.image_path.as_deref().unwrap_or("")
    );
    println!(
        "  Difficulty: query {} vs match {}",
        difficulty_label(problem.difficulty()),
        difficulty_label(best.candidate.difficulty)
    );
    println!(
        "  Breakdown:  concepts {} / logic {} / pattern {} / difficulty {}",
        best.details.concept, best.details.logic, best.details.pattern, best.details.difficulty
    );

    let runners_up = matches.runners_up();
    if !runners_up.is_empty() {
        println!("{}", "-".repeat(RULE_WIDTH));
        println!("Also similar (top {}):", runners_up.len());
        for (i, runner) in runners_up.iter().enumerate() {
            println!("  {}. [{}%] {}", i + 1, runner.score, runner.candidate.source_text);
        }
    }
    println!("{}", "=".repeat(RULE_WIDTH));
}

fn difficulty_label(level: Option<u8>) -> String {
    level.map(|d| d.to_string()).unwrap_or_else(|| "?".into())
}
