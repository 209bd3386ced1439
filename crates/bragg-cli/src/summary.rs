use std::path::Path;

use bragg_core::breed::BreedMode;
use bragg_core::pipeline::{GenerationConfig, PrepReport, TerminationReport};
use console::Style;

use crate::commands::run::RunFile;

struct Styles {
    title: Style,
    header: Style,
    label: Style,
    value: Style,
    method: Style,
    disabled: Style,
    path: Style,
    warning: Style,
    error: Style,
}

impl Styles {
    fn new() -> Self {
        Self {
            title: Style::new().cyan().bold(),
            header: Style::new().cyan().bold(),
            label: Style::new().dim(),
            value: Style::new().bold().white(),
            method: Style::new().green(),
            disabled: Style::new().dim().yellow(),
            path: Style::new().underlined(),
            warning: Style::new().yellow(),
            error: Style::new().red().bold(),
        }
    }
}

fn rule(s: &Styles, width: usize) {
    println!("  {}", s.title.apply_to("\u{2550}".repeat(width)));
}

pub fn print_run_summary(
    file: &RunFile,
    config: &GenerationConfig,
    shapes: &[(usize, usize, usize)],
) {
    let s = Styles::new();

    println!();
    println!("  {}", s.title.apply_to("Bragg Reconstruction"));
    rule(&s, 20);
    println!();

    for (i, (path, shape)) in file.data.iter().zip(shapes).enumerate() {
        let label = if i == 0 { "Data" } else { "" };
        println!(
            "  {:<14}{}  {}x{}x{}",
            s.label.apply_to(label),
            s.path.apply_to(path.display()),
            shape.0,
            shape.1,
            shape.2
        );
    }
    println!(
        "  {:<14}{}",
        s.label.apply_to("Output"),
        s.path.apply_to(file.output.display())
    );
    println!(
        "  {:<14}{}",
        s.label.apply_to("Solver"),
        s.method.apply_to(file.solver.program.display())
    );
    let devices = if config.device_ids.is_empty() {
        s.disabled.apply_to("none (cpu)".to_string())
    } else {
        s.method.apply_to(
            config
                .device_ids
                .iter()
                .map(|d| d.to_string())
                .collect::<Vec<_>>()
                .join(", "),
        )
    };
    println!("  {:<14}{}", s.label.apply_to("Devices"), devices);
    if let Some(dir) = &config.continuation_dir {
        println!(
            "  {:<14}{}",
            s.label.apply_to("Continue"),
            s.path.apply_to(dir.display())
        );
    }
    println!();

    println!("  {}", s.header.apply_to("Generations"));
    println!(
        "    {:<12}{}",
        s.label.apply_to("Count"),
        s.value.apply_to(config.generations)
    );
    println!(
        "    {:<12}{}",
        s.label.apply_to("Population"),
        s.value.apply_to(config.samples)
    );
    if config.low_resolution_generations() > 0 {
        let sigmas: Vec<String> = config
            .low_resolution_sigmas
            .iter()
            .map(|v| format!("{v:.2}"))
            .collect();
        println!(
            "    {:<12}{}",
            s.label.apply_to("Low res"),
            s.value.apply_to(sigmas.join(" "))
        );
    } else {
        println!(
            "    {:<12}{}",
            s.label.apply_to("Low res"),
            s.disabled.apply_to("disabled")
        );
    }
    println!();

    println!(
        "    {:<5}{:<14}{:<18}{:>6}{:>10}",
        s.label.apply_to("Gen"),
        s.label.apply_to("Metric"),
        s.label.apply_to("Breed"),
        s.label.apply_to("Cull"),
        s.label.apply_to("Support")
    );
    for g in 0..config.generations {
        let mode = config.breed_modes[g];
        let breed = if mode == BreedMode::None || g + 1 == config.generations {
            s.disabled.apply_to(BreedMode::None.to_string())
        } else {
            s.method.apply_to(mode.to_string())
        };
        println!(
            "    {:<5}{:<14}{:<18}{:>6}{:>10}",
            g,
            config.metrics[g].to_string(),
            breed,
            config.culling[g],
            format!(
                "{:.2}/{:.1}",
                config.support_thresholds[g], config.support_sigmas[g]
            )
        );
    }
    for warning in &config.warnings {
        println!("  {}", s.warning.apply_to(format!("warning: {warning}")));
    }
    println!();
}

pub fn print_termination(report: &TerminationReport, output: &Path) {
    let s = Styles::new();

    println!();
    println!("  {}", s.title.apply_to("Reconstruction finished"));
    rule(&s, 23);
    if !report.dataset.is_empty() {
        println!(
            "  {:<14}{}",
            s.label.apply_to("Data set"),
            s.value.apply_to(&report.dataset)
        );
    }
    println!(
        "  {:<14}{}",
        s.label.apply_to("Generations"),
        s.value.apply_to(report.generations_completed)
    );
    println!(
        "  {:<14}{}",
        s.label.apply_to("Metric"),
        s.method.apply_to(report.metric)
    );
    println!();
    println!(
        "    {:<6}{:<6}{:>14}",
        s.label.apply_to("Rank"),
        s.label.apply_to("Slot"),
        s.label.apply_to("Score")
    );
    for (rank, entry) in report.final_ranking.iter().enumerate() {
        let score = format!("{:.6e}", entry.score);
        let score = if rank == 0 {
            s.value.apply_to(score)
        } else {
            Style::new().apply_to(score)
        };
        println!("    {:<6}{:<6}{:>14}", rank, entry.slot, score);
    }
    println!();
    println!(
        "  {:<14}{}",
        s.label.apply_to("Best result"),
        s.path.apply_to(
            output
                .join(format!("g_{}", report.final_generation))
                .join(&report.dataset)
                .join("0")
                .display()
        )
    );
    println!();
}

pub fn print_warnings(warnings: &[String]) {
    let s = Styles::new();
    for warning in warnings {
        println!("  {}", s.warning.apply_to(format!("warning: {warning}")));
    }
}

pub fn print_prep_report(report: &PrepReport) {
    let s = Styles::new();

    println!();
    println!("  {}", s.title.apply_to("Scan Preparation"));
    rule(&s, 16);
    for outcome in &report.outcomes {
        let range = format!("{}-{}", outcome.range[0], outcome.range[1]);
        match &outcome.result {
            Ok(prepared) => println!(
                "  {:<12}{} {}x{}x{} from {} scan(s) -> {}",
                s.label.apply_to(range),
                s.method.apply_to("ok"),
                prepared.shape.0,
                prepared.shape.1,
                prepared.shape.2,
                prepared.scans.len(),
                s.path.apply_to(prepared.path.display())
            ),
            Err(e) => println!(
                "  {:<12}{} {}",
                s.label.apply_to(range),
                s.error.apply_to("failed"),
                e
            ),
        }
    }
    for warning in &report.warnings {
        println!("  {}", s.warning.apply_to(format!("warning: {warning}")));
    }
    println!();
}
