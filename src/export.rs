use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::Currency;
use crate::data::{BuildEstimate, BuildMethod, Choices, CostBreakdown, Firmware, FormFactor};

const RULE_WIDTH: usize = 60;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EstimateSummary<'a> {
    breakdown: &'a CostBreakdown,
    total: f64,
    complexity: u8,
    build_time_hours: f64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct BuildPlanExport<'a> {
    choices: &'a Choices,
    estimate: EstimateSummary<'a>,
    currency: Currency,
    exported_at: DateTime<Utc>,
}

/// Machine-readable build plan.
pub fn export_json(
    choices: &Choices,
    estimate: &BuildEstimate,
    currency: Currency,
    exported_at: DateTime<Utc>,
) -> Result<String> {
    let plan = BuildPlanExport {
        choices,
        estimate: EstimateSummary {
            breakdown: &estimate.cost.breakdown,
            total: estimate.cost.total,
            complexity: estimate.complexity,
            build_time_hours: estimate.build_time_hours,
        },
        currency,
        exported_at,
    };
    Ok(serde_json::to_string_pretty(&plan)?)
}

/// Human-readable build plan with cost breakdown and checklist.
pub fn export_text(
    choices: &Choices,
    estimate: &BuildEstimate,
    currency: Currency,
    generated_at: DateTime<Utc>,
) -> String {
    let heavy = "=".repeat(RULE_WIDTH);
    let light = "-".repeat(RULE_WIDTH);
    let mut lines: Vec<String> = Vec::new();

    lines.push(heavy.clone());
    lines.push("SPLIT KEYBOARD BUILD PLAN".into());
    lines.push(heavy.clone());
    lines.push(String::new());
    lines.push(format!(
        "Generated: {}",
        generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    lines.push(format!("Currency: {}", currency));
    lines.push(String::new());

    lines.push("BUILD SUMMARY".into());
    lines.push(light.clone());
    lines.push(format!(
        "Total Estimated Cost: {}",
        currency.format(estimate.cost.total)
    ));
    lines.push(format!("Complexity Score: {}/10", estimate.complexity));
    lines.push(format!(
        "Estimated Build Time: {} hours",
        estimate.build_time_hours
    ));
    lines.push(String::new());

    lines.push("CORE DECISIONS".into());
    lines.push(light.clone());
    if let Some(method) = choices.build_method {
        lines.push(format!("Build Method: {}", method.label()));
    }
    if let Some(form) = choices.layout.form_factor {
        lines.push(format!("Layout: {}", form.label()));
        lines.push(format!("  Key Count: {} keys", choices.layout.key_count));
    }
    if let Some(controller) = choices.controller {
        lines.push(format!("Controller: {}", controller.label()));
    }
    if let Some(switch) = choices.switch_type {
        lines.push(format!("Switches: {}", switch.label()));
    }
    if let Some(connectivity) = choices.connectivity {
        lines.push(format!("Connectivity: {}", connectivity.label()));
    }
    if let Some(firmware) = choices.firmware {
        lines.push(format!("Firmware: {}", firmware.label()));
    }
    lines.push(String::new());

    let enabled: Vec<_> = choices.features.enabled().collect();
    if !enabled.is_empty() {
        lines.push("FEATURES".into());
        lines.push(light.clone());
        for feature in enabled {
            lines.push(format!("  ✓ {}", feature.label()));
        }
        lines.push(String::new());
    }

    lines.push("COST BREAKDOWN".into());
    lines.push(light.clone());
    for (label, amount) in estimate.cost.breakdown.entries() {
        if amount > 0.0 {
            lines.push(format!("  {:<20} {}", label, currency.format(amount)));
        }
    }
    lines.push(format!("  {}", "-".repeat(30)));
    lines.push(format!(
        "  {:<20} {}",
        "TOTAL",
        currency.format(estimate.cost.total)
    ));
    lines.push(String::new());

    lines.push("BUILD CHECKLIST".into());
    lines.push(light);
    lines.extend(checklist(choices).into_iter().map(|item| format!("□ {}", item)));
    lines.push(String::new());

    lines.push(heavy.clone());
    lines.push("Built with splitkb".into());
    lines.push(heavy);

    lines.join("\n")
}

fn checklist(choices: &Choices) -> Vec<&'static str> {
    let mut items = vec!["Order all components", "Gather required tools"];

    if choices.build_method == Some(BuildMethod::CustomPcb) {
        items.extend([
            "Design PCB in KiCad",
            "Export Gerber files",
            "Order PCB from manufacturer (2-4 week lead time)",
        ]);
    }
    if choices.layout.form_factor == Some(FormFactor::Ergonomic3d) {
        items.push("3D print case (or order from service)");
    }

    items.push("Solder components");

    match choices.firmware {
        Some(Firmware::Qmk) => {
            items.extend(["Set up QMK build environment", "Compile and flash firmware"])
        }
        Some(Firmware::Vial) => items.extend(["Download Vial configurator", "Flash Vial firmware"]),
        Some(Firmware::Kmk) => {
            items.extend(["Install CircuitPython on RP2040", "Copy KMK files to board"])
        }
        Some(Firmware::Zmk) => items.extend([
            "Set up ZMK GitHub repository",
            "Configure keymap",
            "Download and flash firmware",
        ]),
        None => {}
    }

    items.extend([
        "Test all keys",
        "Install keycaps",
        "Enjoy your custom keyboard!",
    ]);
    items
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CostDatabase;
    use crate::data::{Connectivity, Controller, Features, Layout, SwitchType};
    use crate::estimate::build_estimate;
    use chrono::TimeZone;

    fn fixed_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 14, 9, 30, 0).unwrap()
    }

    fn sample_choices() -> Choices {
        Choices {
            build_method: Some(BuildMethod::CustomPcb),
            layout: Layout {
                form_factor: Some(FormFactor::Ergonomic3d),
                key_count: 42,
            },
            controller: Some(Controller::NiceNano),
            switch_type: Some(SwitchType::ChocV1),
            features: Features {
                hotswap: true,
                oled: true,
                ..Features::default()
            },
            connectivity: Some(Connectivity::Wireless),
            firmware: Some(Firmware::Zmk),
            keycaps: None,
        }
    }

    #[test]
    fn test_json_export_shape() {
        let choices = sample_choices();
        let estimate = build_estimate(&choices, &CostDatabase::default());
        let json = export_json(&choices, &estimate, Currency::NPR, fixed_time()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["choices"]["buildMethod"], "custom-pcb");
        assert_eq!(value["currency"], "NPR");
        assert_eq!(value["estimate"]["complexity"], estimate.complexity);
        // 40 + 20 + 1 (oled) + 3 (zmk)
        assert_eq!(value["estimate"]["buildTimeHours"], 64.0);
        assert!(value["estimate"]["breakdown"]["shipping"].is_number());
        assert!(value["exportedAt"]
            .as_str()
            .unwrap()
            .starts_with("2026-03-14T09:30:00"));
    }

    #[test]
    fn test_text_export_sections() {
        let choices = sample_choices();
        let estimate = build_estimate(&choices, &CostDatabase::default());
        let text = export_text(&choices, &estimate, Currency::USD, fixed_time());

        assert!(text.starts_with(&"=".repeat(60)));
        assert!(text.contains("Generated: 2026-03-14 09:30:00 UTC"));
        assert!(text.contains("Build Method: Custom Pcb"));
        assert!(text.contains("Layout: Ergonomic 3d"));
        assert!(text.contains("  Key Count: 42 keys"));
        assert!(text.contains("  ✓ Hotswap"));
        assert!(text.contains("  ✓ Oled"));
        assert!(text.contains("□ Design PCB in KiCad"));
        assert!(text.contains("□ 3D print case (or order from service)"));
        assert!(text.contains("□ Set up ZMK GitHub repository"));
        assert!(!text.contains("QMK"));
        assert!(text.contains(&format!(
            "  {:<20} {}",
            "TOTAL",
            Currency::USD.format(estimate.cost.total)
        )));
    }

    #[test]
    fn test_text_export_skips_empty_sections() {
        let choices = Choices::default();
        let estimate = build_estimate(&choices, &CostDatabase::default());
        let text = export_text(&choices, &estimate, Currency::USD, fixed_time());

        assert!(!text.contains("FEATURES"));
        assert!(!text.contains("Controllers"));
        assert!(text.contains(&format!("  {:<20} $0.00", "TOTAL")));
        assert!(text.contains("□ Solder components"));
    }
}
