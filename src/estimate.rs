use crate::config::CostDatabase;
use crate::data::{
    BuildEstimate, BuildMethod, Choices, Connectivity, CostBreakdown, CostEstimate, Firmware,
    FormFactor,
};

/// Itemized parts cost for a snapshot. Unset choices contribute nothing.
pub fn calculate_cost(choices: &Choices, db: &CostDatabase) -> CostEstimate {
    let mut breakdown = CostBreakdown::default();
    let key_count = f64::from(choices.layout.key_count);

    // One controller per half
    if let Some(controller) = choices.controller {
        breakdown.controller = db.controller_price(controller) * 2.0;
    }

    if let Some(switch) = choices.switch_type {
        breakdown.switches = key_count * db.switch_price(switch);
        if choices.features.hotswap {
            breakdown.features += key_count * db.features.hotswap_socket;
        }
        breakdown.keycaps = db.keycap_price(switch);
    }

    let extras = &db.build_method_extras;
    match choices.build_method {
        Some(BuildMethod::Handwired) => {
            breakdown.hardware =
                extras.handwired.wire + extras.handwired.diodes + extras.handwired.hardware;
        }
        Some(BuildMethod::CustomPcb) => {
            breakdown.pcb = extras.custom_pcb.pcb;
            breakdown.hardware = extras.custom_pcb.diodes + extras.custom_pcb.hardware;
        }
        Some(BuildMethod::PcbKit) => {
            breakdown.pcb = extras.pcb_kit.kit;
            breakdown.case = extras.pcb_kit.case;
        }
        Some(BuildMethod::CompleteKit) => {
            breakdown.pcb = extras.complete_kit.keyboard;
        }
        None => {}
    }

    if choices.layout.form_factor == Some(FormFactor::Ergonomic3d) {
        breakdown.case += db.case.print_3d_diy;
    }

    let features = &choices.features;
    if features.rgb {
        breakdown.features += key_count * db.features.rgb_led;
    }
    if features.oled {
        breakdown.features += db.features.oled_display * 2.0;
    }
    if features.encoder {
        breakdown.features += db.features.encoder * 2.0;
    }
    if features.trackball {
        breakdown.features += db.features.trackball_pmw3360;
    }

    breakdown.connectivity = match choices.connectivity {
        Some(Connectivity::Trrs) => db.connectivity.trrs_cable + db.connectivity.trrs_jack * 2.0,
        Some(Connectivity::Wireless) => {
            db.connectivity.battery_lipo * 2.0 + db.connectivity.power_switch * 2.0
        }
        None => 0.0,
    };

    breakdown.shipping = match choices.build_method {
        Some(BuildMethod::CustomPcb) => db.shipping.international_pcb,
        Some(BuildMethod::CompleteKit) => db.shipping.domestic,
        Some(BuildMethod::Handwired | BuildMethod::PcbKit) => db.shipping.international_parts,
        None => 0.0,
    };

    CostEstimate {
        breakdown,
        total: breakdown.total(),
        per_half: breakdown.halved(),
    }
}

/// Build difficulty on a 1-10 scale.
pub fn calculate_complexity(choices: &Choices) -> u8 {
    let mut score: f64 = 0.0;

    score += match choices.build_method {
        Some(BuildMethod::Handwired) => 4.0,
        Some(BuildMethod::CustomPcb) => 5.0,
        Some(BuildMethod::PcbKit) => 2.0,
        Some(BuildMethod::CompleteKit) => 1.0,
        None => 0.0,
    };

    score += match choices.layout.form_factor {
        Some(FormFactor::Ergonomic3d) => 5.0,
        Some(FormFactor::FlatSplay) => 3.0,
        Some(FormFactor::StandardSplit) => 2.0,
        None => 0.0,
    };

    let features = &choices.features;
    if features.hotswap {
        score += 0.5;
    }
    if features.rgb {
        score += 2.0;
    }
    if features.oled {
        score += 1.5;
    }
    if features.encoder {
        score += 1.5;
    }
    if features.trackball {
        score += 4.0;
    }
    if features.wireless {
        score += 3.0;
    }

    score += match choices.firmware {
        Some(Firmware::Qmk) => 3.0,
        Some(Firmware::Vial) => 1.0,
        Some(Firmware::Kmk) => 2.0,
        Some(Firmware::Zmk) => 4.0,
        None => 0.0,
    };

    let normalized = (score / 2.0).round();
    normalized.clamp(1.0, 10.0) as u8
}

/// Estimated hands-on hours, unrounded.
pub fn estimate_build_time(choices: &Choices) -> f64 {
    let mut hours = 0.0;

    hours += match choices.build_method {
        Some(BuildMethod::Handwired) => 15.0,
        Some(BuildMethod::CustomPcb) => 40.0,
        Some(BuildMethod::PcbKit) => 5.0,
        Some(BuildMethod::CompleteKit) => 1.0,
        None => 0.0,
    };

    hours += match choices.layout.form_factor {
        Some(FormFactor::Ergonomic3d) => 20.0,
        Some(FormFactor::FlatSplay) => 10.0,
        Some(FormFactor::StandardSplit) => 5.0,
        None => 0.0,
    };

    let features = &choices.features;
    if features.rgb {
        hours += 3.0;
    }
    if features.oled {
        hours += 1.0;
    }
    if features.encoder {
        hours += 1.0;
    }
    if features.trackball {
        hours += 8.0;
    }
    if features.wireless {
        hours += 5.0;
    }

    hours += match choices.firmware {
        Some(Firmware::Qmk) => 2.0,
        Some(Firmware::Vial) => 1.0,
        Some(Firmware::Kmk) => 2.0,
        Some(Firmware::Zmk) => 3.0,
        None => 0.0,
    };

    hours
}

/// Cost, complexity and build time from one snapshot.
pub fn build_estimate(choices: &Choices, db: &CostDatabase) -> BuildEstimate {
    BuildEstimate {
        cost: calculate_cost(choices, db),
        complexity: calculate_complexity(choices),
        build_time_hours: estimate_build_time(choices),
    }
}
