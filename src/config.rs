use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::data::{Controller, SwitchType};

/// Per-controller unit price (one half).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct ControllerPrices {
    pub pro_micro: f64,
    pub elite_c: f64,
    pub nice_nano: f64,
    pub rp2040: f64,
}

impl Default for ControllerPrices {
    fn default() -> Self {
        Self {
            pro_micro: 8.0,
            elite_c: 18.0,
            nice_nano: 25.0,
            rp2040: 6.0,
        }
    }
}

/// Mid-range per-switch price.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct SwitchPrices {
    pub mx: f64,
    pub choc_v1: f64,
    pub choc_v2: f64,
}

impl Default for SwitchPrices {
    fn default() -> Self {
        Self {
            mx: 0.35,
            choc_v1: 0.60,
            choc_v2: 0.65,
        }
    }
}

/// Flat keycap set price, keyed by switch stem.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct KeycapPrices {
    pub mx_midrange: f64,
    pub choc_v1: f64,
    pub choc_v2: f64,
}

impl Default for KeycapPrices {
    fn default() -> Self {
        Self {
            mx_midrange: 45.0,
            choc_v1: 40.0,
            choc_v2: 50.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct FeaturePrices {
    pub hotswap_socket: f64,
    pub rgb_led: f64,
    pub oled_display: f64,
    pub encoder: f64,
    pub trackball_pmw3360: f64,
}

impl Default for FeaturePrices {
    fn default() -> Self {
        Self {
            hotswap_socket: 0.15,
            rgb_led: 0.12,
            oled_display: 6.0,
            encoder: 2.5,
            trackball_pmw3360: 45.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HandwiredExtras {
    pub wire: f64,
    pub diodes: f64,
    pub hardware: f64,
}

impl Default for HandwiredExtras {
    fn default() -> Self {
        Self {
            wire: 8.0,
            diodes: 3.0,
            hardware: 10.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CustomPcbExtras {
    pub pcb: f64,
    pub diodes: f64,
    pub hardware: f64,
}

impl Default for CustomPcbExtras {
    fn default() -> Self {
        Self {
            pcb: 30.0,
            diodes: 3.0,
            hardware: 12.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PcbKitExtras {
    pub kit: f64,
    pub case: f64,
}

impl Default for PcbKitExtras {
    fn default() -> Self {
        Self {
            kit: 60.0,
            case: 25.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CompleteKitExtras {
    pub keyboard: f64,
}

impl Default for CompleteKitExtras {
    fn default() -> Self {
        Self { keyboard: 180.0 }
    }
}

/// Fixed-cost bundles per build method.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct BuildMethodExtras {
    pub handwired: HandwiredExtras,
    pub custom_pcb: CustomPcbExtras,
    pub pcb_kit: PcbKitExtras,
    pub complete_kit: CompleteKitExtras,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CasePrices {
    #[serde(rename = "3d-print-diy")]
    pub print_3d_diy: f64,
}

impl Default for CasePrices {
    fn default() -> Self {
        Self { print_3d_diy: 20.0 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct ConnectivityPrices {
    pub trrs_cable: f64,
    pub trrs_jack: f64,
    pub battery_lipo: f64,
    pub power_switch: f64,
}

impl Default for ConnectivityPrices {
    fn default() -> Self {
        Self {
            trrs_cable: 6.0,
            trrs_jack: 1.0,
            battery_lipo: 8.0,
            power_switch: 1.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct ShippingRates {
    pub international_pcb: f64,
    pub international_parts: f64,
    pub domestic: f64,
}

impl Default for ShippingRates {
    fn default() -> Self {
        Self {
            international_pcb: 25.0,
            international_parts: 15.0,
            domestic: 8.0,
        }
    }
}

/// Static price tables the estimator reads. Every table may be overridden
/// from a JSON file; missing entries keep their built-in value.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CostDatabase {
    pub controllers: ControllerPrices,
    pub switches: SwitchPrices,
    pub keycaps: KeycapPrices,
    pub features: FeaturePrices,
    pub build_method_extras: BuildMethodExtras,
    pub case: CasePrices,
    pub connectivity: ConnectivityPrices,
    pub shipping: ShippingRates,
}

impl CostDatabase {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read price table: {:?}", path))?;
        let db: CostDatabase = serde_json::from_str(&content)
            .with_context(|| format!("Invalid price table: {:?}", path))?;
        Ok(db)
    }

    pub fn controller_price(&self, controller: Controller) -> f64 {
        match controller {
            Controller::ProMicro => self.controllers.pro_micro,
            Controller::EliteC => self.controllers.elite_c,
            Controller::NiceNano => self.controllers.nice_nano,
            Controller::Rp2040 => self.controllers.rp2040,
        }
    }

    pub fn switch_price(&self, switch: SwitchType) -> f64 {
        match switch {
            SwitchType::Mx => self.switches.mx,
            SwitchType::ChocV1 => self.switches.choc_v1,
            SwitchType::ChocV2 => self.switches.choc_v2,
        }
    }

    pub fn keycap_price(&self, switch: SwitchType) -> f64 {
        match switch {
            SwitchType::Mx => self.keycaps.mx_midrange,
            SwitchType::ChocV1 => self.keycaps.choc_v1,
            SwitchType::ChocV2 => self.keycaps.choc_v2,
        }
    }
}

/// Display currency. Amounts are always computed in USD.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Currency {
    #[default]
    USD,
    NPR,
}

impl Currency {
    pub fn rate(&self) -> f64 {
        match self {
            Currency::USD => 1.0,
            Currency::NPR => 133.5,
        }
    }

    pub fn convert(&self, amount: f64) -> f64 {
        amount * self.rate()
    }

    /// Convert a USD amount and render it with symbol and grouping.
    pub fn format(&self, amount: f64) -> String {
        let converted = self.convert(amount);
        match self {
            Currency::USD => format!("${}", group_thousands(converted, 2)),
            Currency::NPR => format!("Rs {}", group_thousands(converted, 0)),
        }
    }
}

impl std::fmt::Display for Currency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Currency::USD => f.write_str("USD"),
            Currency::NPR => f.write_str("NPR"),
        }
    }
}

impl std::str::FromStr for Currency {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_uppercase().as_str() {
            "USD" => Ok(Currency::USD),
            "NPR" => Ok(Currency::NPR),
            _ => anyhow::bail!("Unknown currency: {} (supported: USD, NPR)", s),
        }
    }
}

fn group_thousands(amount: f64, decimals: usize) -> String {
    let formatted = format!("{:.*}", decimals, amount.abs());
    let (int_part, frac_part) = match formatted.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (formatted.as_str(), None),
    };

    let mut grouped = String::new();
    for (idx, ch) in int_part.chars().enumerate() {
        if idx > 0 && (int_part.len() - idx) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    let sign = if amount < 0.0 && formatted.chars().any(|c| c != '0' && c != '.') {
        "-"
    } else {
        ""
    };
    match frac_part {
        Some(frac) => format!("{}{}.{}", sign, grouped, frac),
        None => format!("{}{}", sign, grouped),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_prices_present() {
        let db = CostDatabase::default();
        assert_eq!(db.controller_price(Controller::NiceNano), 25.0);
        assert_eq!(db.keycap_price(SwitchType::Mx), 45.0);
        assert_eq!(db.build_method_extras.complete_kit.keyboard, 180.0);
        assert_eq!(db.case.print_3d_diy, 20.0);
    }

    #[test]
    fn test_partial_override_keeps_defaults() {
        let json = r#"{
            "controllers": { "nice-nano": 30.0 },
            "case": { "3d-print-diy": 35.0 },
            "buildMethodExtras": { "pcb-kit": { "kit": 70.0 } }
        }"#;
        let db: CostDatabase = serde_json::from_str(json).unwrap();
        assert_eq!(db.controllers.nice_nano, 30.0);
        assert_eq!(db.controllers.pro_micro, 8.0);
        assert_eq!(db.case.print_3d_diy, 35.0);
        assert_eq!(db.build_method_extras.pcb_kit.kit, 70.0);
        assert_eq!(db.build_method_extras.pcb_kit.case, 25.0);
    }

    #[test]
    fn test_load_from_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("prices.json");
        std::fs::write(&path, r#"{"shipping":{"domestic":4.5}}"#).unwrap();

        let db = CostDatabase::load(&path).unwrap();
        assert_eq!(db.shipping.domestic, 4.5);
        assert_eq!(db.shipping.international_pcb, 25.0);
    }

    #[test]
    fn test_load_invalid_file_errors() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("prices.json");
        std::fs::write(&path, "not json").unwrap();
        assert!(CostDatabase::load(&path).is_err());
    }

    #[test]
    fn test_currency_format() {
        assert_eq!(Currency::USD.format(1234.5), "$1,234.50");
        assert_eq!(Currency::USD.format(0.0), "$0.00");
        assert_eq!(Currency::USD.format(999.999), "$1,000.00");
        assert_eq!(Currency::NPR.format(10.0), "Rs 1,335");
    }

    #[test]
    fn test_currency_parse() {
        assert_eq!("npr".parse::<Currency>().unwrap(), Currency::NPR);
        assert_eq!("USD".parse::<Currency>().unwrap(), Currency::USD);
        assert!("EUR".parse::<Currency>().is_err());
    }
}
