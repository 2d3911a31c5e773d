use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

use crate::assembly::{
    build_hash, estimated_total_time, phase_step_ids, relevant_steps, relevant_troubleshooting,
    total_steps, AssemblyCatalog, AssemblyPhase,
};
use crate::compat::{check_compatibility, compatibility_status};
use crate::config::{CostDatabase, Currency};
use crate::data::{
    BuildEstimate, ChoiceUpdate, Choices, CompatibilityStatus, CompatibilityWarning, Feature,
    Severity,
};
use crate::estimate::build_estimate;
use crate::export::{export_json, export_text};
use crate::progress::ProgressTracker;
use crate::storage::{Settings, Storage};
use crate::store::{ChoiceStore, Confirmation};

/// Everything a command needs: persisted state plus the static tables.
pub struct AppContext<'a> {
    pub storage: &'a dyn Storage,
    pub prices: CostDatabase,
    pub catalog: AssemblyCatalog,
}

impl<'a> AppContext<'a> {
    pub fn new(
        storage: &'a dyn Storage,
        prices_path: Option<&Path>,
        catalog_path: Option<&Path>,
    ) -> Result<Self> {
        let prices = match prices_path {
            Some(path) => CostDatabase::load(path)?,
            None => CostDatabase::default(),
        };
        let catalog = match catalog_path {
            Some(path) => AssemblyCatalog::load(path)?,
            None => AssemblyCatalog::builtin()?,
        };
        Ok(Self {
            storage,
            prices,
            catalog,
        })
    }

    fn currency(&self) -> Currency {
        self.storage.load_settings().currency
    }

    /// Progress for the live build; a stale saved record is deleted.
    fn load_progress(&self, choices: &Choices) -> Result<ProgressTracker> {
        let live_hash = build_hash(choices);
        let record = self.storage.load_progress();
        let stale = record
            .as_ref()
            .filter(|r| !ProgressTracker::is_current(r, &live_hash));
        if let Some(stale) = stale {
            tracing::debug!(
                stored = %stale.build_hash,
                live = %live_hash,
                "Clearing stale progress"
            );
            self.storage.clear_progress()?;
        }
        Ok(ProgressTracker::restore(record, &live_hash))
    }
}

/// Show current choices and their status
pub fn show(ctx: &AppContext) -> Result<()> {
    let store = ChoiceStore::open(ctx.storage);
    println!("{}", render_choices(store.choices()));

    let warnings = check_compatibility(store.choices());
    println!();
    println!("Compatibility: {}", status_label(compatibility_status(&warnings)));
    if store.is_complete() {
        println!("Build: complete (assembly guide available)");
    } else {
        println!("Build: incomplete");
    }
    Ok(())
}

/// Set a single choice, refusing updates that introduce errors unless forced
pub fn set_choice(ctx: &AppContext, field: &str, value: &str, force: bool) -> Result<()> {
    let update = ChoiceUpdate::parse(field, value)?;
    let mut store = ChoiceStore::open(ctx.storage);

    match store.confirm(update, force)? {
        Confirmation::Applied(warnings) => {
            tracing::info!(field = %field, value = %value, "Choice updated");
            println!("Set {} = {}", field, value);
            print_warnings(&warnings);
        }
        Confirmation::Blocked(warnings) => {
            print_warnings(&warnings);
            anyhow::bail!(
                "Not applied: {} = {} conflicts with your build (use --force to apply anyway)",
                field,
                value
            );
        }
    }
    Ok(())
}

pub fn set_feature(ctx: &AppContext, name: &str, enabled: bool) -> Result<()> {
    let feature: Feature = name.parse()?;
    let mut store = ChoiceStore::open(ctx.storage);
    store.set_feature(feature, enabled)?;

    tracing::info!(feature = %feature, enabled, "Feature updated");
    println!(
        "{} {}",
        feature.label(),
        if enabled { "enabled" } else { "disabled" }
    );
    print_warnings(&check_compatibility(store.choices()));
    Ok(())
}

pub fn reset(ctx: &AppContext) -> Result<()> {
    let mut store = ChoiceStore::open(ctx.storage);
    store.reset()?;
    ctx.storage.clear_progress()?;
    println!("All choices and assembly progress reset.");
    Ok(())
}

/// List compatibility findings
pub fn check(ctx: &AppContext) -> Result<()> {
    let store = ChoiceStore::open(ctx.storage);
    let warnings = check_compatibility(store.choices());

    if warnings.is_empty() {
        println!("No compatibility issues found.");
    } else {
        print_warnings(&warnings);
    }
    println!("Status: {}", status_label(compatibility_status(&warnings)));
    Ok(())
}

/// Print cost, complexity and build time
pub fn estimate(ctx: &AppContext) -> Result<()> {
    let store = ChoiceStore::open(ctx.storage);
    let estimate = build_estimate(store.choices(), &ctx.prices);
    println!("{}", render_estimate(&estimate, ctx.currency()));
    Ok(())
}

/// Print the personalized assembly guide
pub fn guide(ctx: &AppContext) -> Result<()> {
    let store = ChoiceStore::open(ctx.storage);
    if !store.is_complete() {
        anyhow::bail!(
            "Finish the core decisions first (build method, layout, controller, switches, connectivity, firmware)"
        );
    }

    let phases = relevant_steps(store.choices(), &ctx.catalog.phases);
    let tracker = ctx.load_progress(store.choices())?;
    tracing::info!(phases = phases.len(), steps = total_steps(&phases), "Rendering guide");

    println!("{}", render_guide(&phases, &tracker));

    let issues = relevant_troubleshooting(&ctx.catalog, &phases);
    if !issues.is_empty() {
        println!("TROUBLESHOOTING");
        for issue in issues {
            println!("  {}", issue.symptom);
            for solution in &issue.solutions {
                println!("    - {}", solution);
            }
        }
    }
    Ok(())
}

pub fn progress_show(ctx: &AppContext) -> Result<()> {
    let store = ChoiceStore::open(ctx.storage);
    let phases = relevant_steps(store.choices(), &ctx.catalog.phases);
    let tracker = ctx.load_progress(store.choices())?;
    let total = total_steps(&phases);

    println!(
        "Overall: {}/{} steps ({}%)",
        tracker.completed_count(),
        total,
        tracker.overall_progress(total)
    );
    for phase in &phases {
        let ids = phase_step_ids(&phases, &phase.id);
        let marker = if tracker.is_phase_complete(&ids) { "done" } else { "" };
        println!(
            "  {:<20} {:>3}% {}",
            phase.title,
            tracker.phase_progress(&ids),
            marker
        );
    }

    let done: Vec<&str> = tracker.completed_steps().collect();
    if !done.is_empty() {
        println!("Completed: {}", done.join(", "));
    }
    tracing::debug!(build_hash = %tracker.build_hash(), "Progress for build");
    Ok(())
}

pub fn progress_toggle(ctx: &AppContext, step_id: &str) -> Result<()> {
    let mut tracker = tracker_for_step(ctx, step_id)?;
    let done = tracker.toggle_step(step_id);
    ctx.storage.save_progress(&tracker.to_record())?;

    tracing::info!(step = %step_id, done, "Toggled step");
    println!(
        "{} marked {}",
        step_id,
        if done { "complete" } else { "incomplete" }
    );
    Ok(())
}

/// Set a step's completion explicitly; repeating is harmless.
pub fn progress_set(ctx: &AppContext, step_id: &str, done: bool) -> Result<()> {
    let mut tracker = tracker_for_step(ctx, step_id)?;
    if done {
        tracker.mark_complete(step_id);
    } else {
        tracker.mark_incomplete(step_id);
    }
    ctx.storage.save_progress(&tracker.to_record())?;

    println!(
        "{} marked {}",
        step_id,
        if done { "complete" } else { "incomplete" }
    );
    Ok(())
}

fn tracker_for_step(ctx: &AppContext, step_id: &str) -> Result<ProgressTracker> {
    let store = ChoiceStore::open(ctx.storage);
    let phases = relevant_steps(store.choices(), &ctx.catalog.phases);
    let in_plan = phases
        .iter()
        .flat_map(|p| p.steps.iter())
        .any(|s| s.id == step_id);
    if !in_plan {
        anyhow::bail!("Step {} is not part of this build plan", step_id);
    }
    ctx.load_progress(store.choices())
}

pub fn progress_reset(ctx: &AppContext) -> Result<()> {
    let store = ChoiceStore::open(ctx.storage);
    let mut tracker = ctx.load_progress(store.choices())?;
    tracker.reset();
    ctx.storage.clear_progress()?;
    println!("Assembly progress cleared.");
    Ok(())
}

/// Export the build plan as json or text
pub fn export(ctx: &AppContext, format: &str, output: Option<&str>) -> Result<()> {
    let store = ChoiceStore::open(ctx.storage);
    let estimate = build_estimate(store.choices(), &ctx.prices);
    let currency = ctx.currency();
    let now = chrono::Utc::now();

    let rendered = match format {
        "json" => export_json(store.choices(), &estimate, currency, now)?,
        "text" | "txt" => export_text(store.choices(), &estimate, currency, now),
        _ => anyhow::bail!("Unknown export format: {} (supported: json, text)", format),
    };

    match output {
        Some(path) => {
            fs::write(path, &rendered).with_context(|| format!("Failed to write {}", path))?;
            tracing::info!(path = %path, format = %format, "Exported build plan");
            println!("Exported to: {}", path);
        }
        None => println!("{}", rendered),
    }
    Ok(())
}

pub fn set_currency(ctx: &AppContext, code: &str) -> Result<()> {
    let currency: Currency = code.parse()?;
    ctx.storage.save_settings(&Settings { currency })?;
    println!("Currency set to {}", currency);
    Ok(())
}

fn status_label(status: CompatibilityStatus) -> &'static str {
    match status {
        CompatibilityStatus::Ok => "ok",
        CompatibilityStatus::Warnings => "warnings",
        CompatibilityStatus::Errors => "errors",
    }
}

fn render_choices(choices: &Choices) -> String {
    fn row(label: &str, value: Option<String>) -> String {
        format!("{:<16} {}", label, value.unwrap_or_else(|| "-".to_string()))
    }

    let features: Vec<_> = choices.features.enabled().map(|f| f.label()).collect();
    let features = (!features.is_empty()).then(|| features.join(", "));

    let lines = vec![
        row("Build method", choices.build_method.map(|v| v.label())),
        row("Layout", choices.layout.form_factor.map(|v| v.label())),
        row("Key count", Some(choices.layout.key_count.to_string())),
        row("Controller", choices.controller.map(|v| v.label())),
        row("Switches", choices.switch_type.map(|v| v.label())),
        row("Connectivity", choices.connectivity.map(|v| v.label())),
        row("Firmware", choices.firmware.map(|v| v.label())),
        row("Keycaps", choices.keycaps.clone()),
        row("Features", features),
    ];
    lines.join("\n")
}

fn render_warnings(warnings: &[CompatibilityWarning]) -> Vec<String> {
    warnings
        .iter()
        .map(|warning| {
            let tag = match warning.severity {
                Severity::Error => "ERROR",
                Severity::Warning => "WARN",
                Severity::Info => "INFO",
            };
            format!("[{}] {}", tag, warning.message)
        })
        .collect()
}

fn print_warnings(warnings: &[CompatibilityWarning]) {
    for line in render_warnings(warnings) {
        println!("{}", line);
    }
}

fn render_estimate(estimate: &BuildEstimate, currency: Currency) -> String {
    let mut lines: Vec<String> = Vec::new();
    lines.push(format!("{:<16} {:>12} {:>12}", "ITEM", "TOTAL", "PER HALF"));
    lines.push("-".repeat(42));

    let totals = estimate.cost.breakdown.entries();
    let halves = estimate.cost.per_half.entries();
    for ((label, amount), (_, half)) in totals.into_iter().zip(halves) {
        if amount > 0.0 {
            lines.push(format!(
                "{:<16} {:>12} {:>12}",
                label,
                currency.format(amount),
                currency.format(half)
            ));
        }
    }
    lines.push("-".repeat(42));
    lines.push(format!(
        "{:<16} {:>12}",
        "Total",
        currency.format(estimate.cost.total)
    ));
    lines.push(String::new());
    lines.push(format!("Complexity: {}/10", estimate.complexity));
    lines.push(format!("Build time: {} hours", estimate.build_time_hours));
    lines.join("\n")
}

fn render_guide(phases: &[AssemblyPhase], tracker: &ProgressTracker) -> String {
    let total = total_steps(phases);
    let mut lines: Vec<String> = Vec::new();
    lines.push(format!(
        "Assembly guide: {} phases, {} steps ({}% done)",
        phases.len(),
        total,
        tracker.overall_progress(total)
    ));
    lines.push(format!("Estimated time: {}", estimated_total_time(phases)));

    for phase in phases {
        let ids = phase_step_ids(phases, &phase.id);
        lines.push(String::new());
        lines.push(format!(
            "== {}. {} ({}) [{}%]",
            phase.order,
            phase.title,
            phase.estimated_time,
            tracker.phase_progress(&ids)
        ));

        for step in &phase.steps {
            let mark = if tracker.is_complete(&step.id) { "x" } else { " " };
            lines.push(format!("[{}] {} ({})", mark, step.title, step.id));
            lines.extend(step.content.lines().map(|line| format!("    {}", line)));
            lines.extend(step.warnings.iter().map(|w| format!("    ! {}", w)));
            lines.extend(step.tips.iter().map(|t| format!("    * {}", t)));
        }
    }
    lines.push(String::new());
    lines.join("\n")
}
