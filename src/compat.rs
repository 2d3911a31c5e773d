use crate::data::{
    BuildMethod, ChoiceField, Choices, CompatibilityStatus, CompatibilityWarning, Connectivity,
    Controller, Firmware, FormFactor, Severity, SwitchType,
};

/// Usable GPIO on ATmega32U4 boards (Pro Micro, Elite-C).
const AVR_USABLE_PINS: u32 = 12;

/// A named compatibility check. Each fires at most one finding.
struct Rule {
    name: &'static str,
    check: fn(&Choices) -> Option<CompatibilityWarning>,
}

/// Evaluated in order; every rule runs, none short-circuits another.
const RULES: &[Rule] = &[
    Rule {
        name: "zmk-needs-nice-nano",
        check: zmk_needs_nice_nano,
    },
    Rule {
        name: "qmk-vial-on-nice-nano",
        check: qmk_vial_on_nice_nano,
    },
    Rule {
        name: "kmk-needs-rp2040",
        check: kmk_needs_rp2040,
    },
    Rule {
        name: "wireless-needs-nice-nano",
        check: wireless_needs_nice_nano,
    },
    Rule {
        name: "wireless-needs-zmk",
        check: wireless_needs_zmk,
    },
    Rule {
        name: "avr-pin-budget",
        check: avr_pin_budget,
    },
    Rule {
        name: "trackball-without-custom-pcb",
        check: trackball_without_custom_pcb,
    },
    Rule {
        name: "trackball-on-pro-micro",
        check: trackball_on_pro_micro,
    },
    Rule {
        name: "ergonomic-3d-pcb-kit-case",
        check: ergonomic_3d_pcb_kit_case,
    },
    Rule {
        name: "choc-v1-ergonomic-3d-case",
        check: choc_v1_ergonomic_3d_case,
    },
    Rule {
        name: "hotswap-handwired",
        check: hotswap_handwired,
    },
    Rule {
        name: "rgb-pro-micro-key-count",
        check: rgb_pro_micro_key_count,
    },
];

/// Evaluate every compatibility rule against a snapshot.
pub fn check_compatibility(choices: &Choices) -> Vec<CompatibilityWarning> {
    RULES
        .iter()
        .filter_map(|rule| {
            let finding = (rule.check)(choices)?;
            tracing::debug!(
                rule = rule.name,
                severity = ?finding.severity,
                "Compatibility rule fired"
            );
            Some(finding)
        })
        .collect()
}

/// Reduce findings to the most severe status present.
pub fn compatibility_status(warnings: &[CompatibilityWarning]) -> CompatibilityStatus {
    match warnings.iter().map(|w| w.severity).max() {
        Some(Severity::Error) => CompatibilityStatus::Errors,
        Some(Severity::Warning) => CompatibilityStatus::Warnings,
        Some(Severity::Info) | None => CompatibilityStatus::Ok,
    }
}

pub fn has_errors(warnings: &[CompatibilityWarning]) -> bool {
    compatibility_status(warnings) == CompatibilityStatus::Errors
}

/// Rough pin count for one half: a near-square matrix plus feature overhead.
pub fn estimate_pin_requirements(choices: &Choices) -> u32 {
    let half = f64::from(choices.layout.key_count) / 2.0;
    let mut pins = 0;

    if half > 0.0 {
        let rows = half.sqrt().ceil();
        let cols = (half / rows).ceil();
        pins += (rows + cols) as u32;
    }

    let features = &choices.features;
    if features.rgb {
        pins += 1; // WS2812 data line
    }
    if features.oled {
        pins += 2; // I2C
    }
    if features.encoder {
        pins += 3;
    }
    if features.trackball {
        pins += 6; // SPI + motion + reset
    }
    pins
}

fn zmk_needs_nice_nano(c: &Choices) -> Option<CompatibilityWarning> {
    (c.firmware == Some(Firmware::Zmk) && c.controller != Some(Controller::NiceNano)).then(|| {
        CompatibilityWarning::new(
            Severity::Error,
            "ZMK firmware requires a nice!nano controller. QMK, Vial and KMK do not run on nice!nano.",
            &[ChoiceField::Firmware, ChoiceField::Controller],
        )
    })
}

fn qmk_vial_on_nice_nano(c: &Choices) -> Option<CompatibilityWarning> {
    let qmk_family = matches!(c.firmware, Some(Firmware::Qmk | Firmware::Vial));
    (qmk_family && c.controller == Some(Controller::NiceNano)).then(|| {
        CompatibilityWarning::new(
            Severity::Error,
            "QMK and Vial do not support nice!nano. Use ZMK firmware for wireless builds.",
            &[ChoiceField::Firmware, ChoiceField::Controller],
        )
    })
}

fn kmk_needs_rp2040(c: &Choices) -> Option<CompatibilityWarning> {
    (c.firmware == Some(Firmware::Kmk) && c.controller != Some(Controller::Rp2040)).then(|| {
        CompatibilityWarning::new(
            Severity::Error,
            "KMK firmware requires an RP2040-based controller (CircuitPython). Use QMK or Vial on ATmega32U4 boards.",
            &[ChoiceField::Firmware, ChoiceField::Controller],
        )
    })
}

fn wireless_needs_nice_nano(c: &Choices) -> Option<CompatibilityWarning> {
    (c.connectivity == Some(Connectivity::Wireless) && c.controller != Some(Controller::NiceNano))
        .then(|| {
            CompatibilityWarning::new(
                Severity::Error,
                "Wireless connectivity requires a nice!nano controller running ZMK firmware.",
                &[ChoiceField::Connectivity, ChoiceField::Controller],
            )
        })
}

fn wireless_needs_zmk(c: &Choices) -> Option<CompatibilityWarning> {
    (c.connectivity == Some(Connectivity::Wireless) && c.firmware != Some(Firmware::Zmk)).then(
        || {
            CompatibilityWarning::new(
                Severity::Error,
                "Wireless builds require ZMK firmware. QMK, Vial and KMK do not support wireless splits.",
                &[ChoiceField::Connectivity, ChoiceField::Firmware],
            )
        },
    )
}

fn avr_pin_budget(c: &Choices) -> Option<CompatibilityWarning> {
    if !matches!(c.controller, Some(Controller::ProMicro | Controller::EliteC)) {
        return None;
    }
    let pins = estimate_pin_requirements(c);
    (pins > AVR_USABLE_PINS).then(|| {
        CompatibilityWarning::new(
            Severity::Warning,
            format!(
                "Your build needs approximately {} pins, but Pro Micro/Elite-C only have {} usable pins. Consider an RP2040-based controller.",
                pins, AVR_USABLE_PINS
            ),
            &[ChoiceField::Controller, ChoiceField::Features],
        )
    })
}

fn trackball_without_custom_pcb(c: &Choices) -> Option<CompatibilityWarning> {
    (c.features.trackball && c.build_method != Some(BuildMethod::CustomPcb)).then(|| {
        CompatibilityWarning::new(
            Severity::Warning,
            "Trackball integration is very hard without a custom PCB. A custom PCB is strongly recommended.",
            &[ChoiceField::Features, ChoiceField::BuildMethod],
        )
    })
}

fn trackball_on_pro_micro(c: &Choices) -> Option<CompatibilityWarning> {
    (c.features.trackball && c.controller == Some(Controller::ProMicro)).then(|| {
        CompatibilityWarning::new(
            Severity::Warning,
            "A trackball sensor needs 6 pins for SPI. A Pro Micro may not have enough left for a full matrix.",
            &[ChoiceField::Features, ChoiceField::Controller],
        )
    })
}

fn ergonomic_3d_pcb_kit_case(c: &Choices) -> Option<CompatibilityWarning> {
    (c.layout.form_factor == Some(FormFactor::Ergonomic3d)
        && c.build_method == Some(BuildMethod::PcbKit))
    .then(|| {
        CompatibilityWarning::new(
            Severity::Info,
            "Ergonomic 3D layouts usually need a custom 3D printed case. PCB kits may not ship a compatible one.",
            &[ChoiceField::Layout, ChoiceField::BuildMethod],
        )
    })
}

fn choc_v1_ergonomic_3d_case(c: &Choices) -> Option<CompatibilityWarning> {
    (c.switch_type == Some(SwitchType::ChocV1)
        && c.layout.form_factor == Some(FormFactor::Ergonomic3d))
    .then(|| {
        CompatibilityWarning::new(
            Severity::Info,
            "Choc v1 switches suit 3D printed cases but the lower profile needs careful case design.",
            &[ChoiceField::SwitchType, ChoiceField::Layout],
        )
    })
}

fn hotswap_handwired(c: &Choices) -> Option<CompatibilityWarning> {
    (c.features.hotswap && c.build_method == Some(BuildMethod::Handwired)).then(|| {
        CompatibilityWarning::new(
            Severity::Warning,
            "Hot-swap sockets are awkward to integrate into a handwired build. Consider a PCB-based build.",
            &[ChoiceField::Features, ChoiceField::BuildMethod],
        )
    })
}

fn rgb_pro_micro_key_count(c: &Choices) -> Option<CompatibilityWarning> {
    (c.features.rgb && c.controller == Some(Controller::ProMicro) && c.layout.key_count > 40).then(
        || {
            CompatibilityWarning::new(
                Severity::Warning,
                "Per-key RGB on more than 40 keys is tedious to wire and can cause power issues. Consider underglow instead.",
                &[ChoiceField::Features, ChoiceField::Controller],
            )
        },
    )
}
