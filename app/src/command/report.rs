//! Console reports for a batch run.

use std::collections::HashSet;

use labace_core::{Comparison, NoteOutcome, Playbook, PlaybookSnapshotSummary, ResolvedLab};

const WIDE: usize = 70;
const NARROW: usize = 60;

fn rule(width: usize) -> String {
    "=".repeat(width)
}

pub fn note_header(note_id: &str) -> String {
    format!("\n{}\nPROCESSING NOTE {note_id}\n{}", rule(NARROW), rule(NARROW))
}

pub fn note_summary(outcome: &NoteOutcome, playbook: &Playbook, has_ground_truth: bool) -> String {
    let mut lines = vec![format!(
        "  ✓ Extracted {} lab values",
        outcome.extraction.labs.len()
    )];
    lines.push(format!(
        "  ✓ Identified {} unique labs",
        outcome.most_recent.most_recent_labs.len()
    ));
    let ambiguous = outcome.most_recent.ambiguous_cases.len();
    if ambiguous > 0 {
        lines.push(format!("  ⚠ {ambiguous} ambiguous cases flagged"));
    }
    lines.push(format!(
        "  ✓ Learned {} new patterns",
        outcome.reflection.learned_patterns.len()
    ));
    let missed = outcome.reflection.extraction_quality.labs_missed.len();
    if has_ground_truth && missed > 0 {
        lines.push(format!("  ⚠ Missed {missed} labs compared to ground truth"));
    }

    let (extraction, validation, formatting) = playbook.counts();
    lines.push(String::new());
    lines.push("Playbook now contains:".to_string());
    lines.push(format!("  - {extraction} extraction strategies"));
    lines.push(format!("  - {validation} validation strategies"));
    lines.push(format!("  - {formatting} formatting patterns"));
    lines.join("\n")
}

pub fn evolution(snapshots: &[PlaybookSnapshotSummary], playbook: &Playbook) -> String {
    let mut out = format!("\n{}\nPLAYBOOK EVOLUTION\n{}\n", rule(NARROW), rule(NARROW));
    for snapshot in snapshots {
        out.push_str(&format!(
            "\nAfter Note {}:\n  Extraction strategies: {}\n  Validation strategies: {}\n  Formatting patterns: {}\n",
            snapshot.note_id,
            snapshot.extraction_strategies,
            snapshot.validation_strategies,
            snapshot.formatting_patterns
        ));
    }
    out.push_str(&format!(
        "\n{}\nFINAL PLAYBOOK\n{}\n{playbook}",
        rule(NARROW),
        rule(NARROW)
    ));
    out
}

fn lab_line(lab: &ResolvedLab) -> String {
    format!("  ✓ {} - {} {} - {}", lab.name, lab.value, lab.unit, lab.date)
}

/// Side-by-side view of the empty and learned playbook runs.
pub fn comparison_table(comparison: &Comparison) -> String {
    let empty = &comparison.empty_playbook;
    let learned = &comparison.learned_playbook;
    let learned_names: HashSet<String> = learned.most_recent.lab_names().into_iter().collect();
    let both: HashSet<String> = empty
        .most_recent
        .lab_names()
        .into_iter()
        .filter(|name| learned_names.contains(name))
        .collect();

    let mut lines = vec![
        String::new(),
        rule(WIDE),
        "SIDE-BY-SIDE COMPARISON".to_string(),
        rule(WIDE),
        String::new(),
        format!("{:<35} | {:<35}", "Empty Playbook", "Learned Playbook"),
        format!("{} | {}", "-".repeat(35), "-".repeat(35)),
        format!(
            "{:<35} | {:<35}",
            format!("Found: {} labs", empty.labs_found),
            format!("Found: {} labs", learned.labs_found)
        ),
        String::new(),
        "FOUND BY BOTH:".to_string(),
    ];
    lines.extend(
        empty
            .most_recent
            .most_recent_labs
            .iter()
            .filter(|lab| both.contains(&lab.name.to_lowercase()))
            .map(lab_line),
    );

    lines.push(String::new());
    lines.push("ONLY FOUND WITH LEARNED PLAYBOOK:".to_string());
    lines.extend(
        learned
            .most_recent
            .most_recent_labs
            .iter()
            .filter(|lab| !both.contains(&lab.name.to_lowercase()))
            .map(lab_line),
    );

    lines.push(String::new());
    lines.push(rule(WIDE));
    lines.push(format!(
        "IMPROVEMENT: +{} labs caught",
        comparison.improvement
    ));
    if let Some(recall) = &comparison.recall {
        lines.push(format!(
            "RECALL: {:.0}% -> {:.0}% ({:+.0} points)",
            recall.empty * 100.0,
            recall.learned * 100.0,
            recall.improvement * 100.0
        ));
    }
    lines.push(rule(WIDE));
    lines.join("\n")
}
