use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Declares a closed choice enum serialized by its kebab-case id.
macro_rules! id_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $id:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(
                #[serde(rename = $id)]
                $variant,
            )+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $id,)+
                }
            }

            pub fn label(&self) -> String {
                title_case(self.as_str())
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = anyhow::Error;

            fn from_str(s: &str) -> Result<Self> {
                match s {
                    $($id => Ok($name::$variant),)+
                    _ => anyhow::bail!(
                        "Unknown {} '{}' (expected one of: {})",
                        stringify!($name),
                        s,
                        Self::ALL.iter().map(|v| v.as_str()).collect::<Vec<_>>().join(", ")
                    ),
                }
            }
        }
    };
}

id_enum!(BuildMethod {
    Handwired => "handwired",
    CustomPcb => "custom-pcb",
    PcbKit => "pcb-kit",
    CompleteKit => "complete-kit",
});

id_enum!(FormFactor {
    StandardSplit => "standard-split",
    FlatSplay => "flat-splay",
    Ergonomic3d => "ergonomic-3d",
});

id_enum!(Controller {
    ProMicro => "pro-micro",
    EliteC => "elite-c",
    NiceNano => "nice-nano",
    Rp2040 => "rp2040",
});

id_enum!(SwitchType {
    Mx => "mx",
    ChocV1 => "choc-v1",
    ChocV2 => "choc-v2",
});

id_enum!(Connectivity {
    Trrs => "trrs",
    Wireless => "wireless",
});

id_enum!(Firmware {
    Qmk => "qmk",
    Vial => "vial",
    Kmk => "kmk",
    Zmk => "zmk",
});

id_enum!(
    /// Independent boolean build features.
    Feature {
        Hotswap => "hotswap",
        Rgb => "rgb",
        Oled => "oled",
        Encoder => "encoder",
        Trackball => "trackball",
        Wireless => "wireless",
    }
);

/// `custom-pcb` -> `Custom Pcb`
pub fn title_case(id: &str) -> String {
    id.split('-')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

pub const DEFAULT_KEY_COUNT: u32 = 60;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Layout {
    pub form_factor: Option<FormFactor>,
    /// Total keys across both halves.
    #[serde(deserialize_with = "positive_key_count")]
    pub key_count: u32,
}

fn positive_key_count<'de, D>(deserializer: D) -> std::result::Result<u32, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let count = u32::deserialize(deserializer)?;
    if count == 0 {
        return Err(serde::de::Error::custom("keyCount must be a positive integer"));
    }
    Ok(count)
}

impl Default for Layout {
    fn default() -> Self {
        Self {
            form_factor: None,
            key_count: DEFAULT_KEY_COUNT,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Features {
    pub hotswap: bool,
    pub rgb: bool,
    pub oled: bool,
    pub encoder: bool,
    pub trackball: bool,
    pub wireless: bool,
}

impl Features {
    pub fn get(&self, feature: Feature) -> bool {
        match feature {
            Feature::Hotswap => self.hotswap,
            Feature::Rgb => self.rgb,
            Feature::Oled => self.oled,
            Feature::Encoder => self.encoder,
            Feature::Trackball => self.trackball,
            Feature::Wireless => self.wireless,
        }
    }

    pub fn set(&mut self, feature: Feature, value: bool) {
        let flag = match feature {
            Feature::Hotswap => &mut self.hotswap,
            Feature::Rgb => &mut self.rgb,
            Feature::Oled => &mut self.oled,
            Feature::Encoder => &mut self.encoder,
            Feature::Trackball => &mut self.trackball,
            Feature::Wireless => &mut self.wireless,
        };
        *flag = value;
    }

    pub fn enabled(&self) -> impl Iterator<Item = Feature> + '_ {
        Feature::ALL.iter().copied().filter(|f| self.get(*f))
    }
}

/// The user's current build configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Choices {
    pub build_method: Option<BuildMethod>,
    pub layout: Layout,
    pub controller: Option<Controller>,
    pub switch_type: Option<SwitchType>,
    pub features: Features,
    pub connectivity: Option<Connectivity>,
    pub firmware: Option<Firmware>,
    pub keycaps: Option<String>,
}

impl Choices {
    /// Core decisions are all made; features and keycaps are optional.
    pub fn is_complete(&self) -> bool {
        self.build_method.is_some()
            && self.layout.form_factor.is_some()
            && self.controller.is_some()
            && self.switch_type.is_some()
            && self.connectivity.is_some()
            && self.firmware.is_some()
    }

    pub fn apply(&mut self, update: ChoiceUpdate) -> Result<()> {
        match update {
            ChoiceUpdate::BuildMethod(v) => self.build_method = v,
            ChoiceUpdate::FormFactor(v) => self.layout.form_factor = v,
            ChoiceUpdate::KeyCount(n) => {
                if n == 0 {
                    anyhow::bail!("Key count must be a positive integer");
                }
                self.layout.key_count = n;
            }
            ChoiceUpdate::Controller(v) => self.controller = v,
            ChoiceUpdate::SwitchType(v) => self.switch_type = v,
            ChoiceUpdate::Connectivity(v) => self.connectivity = v,
            ChoiceUpdate::Firmware(v) => self.firmware = v,
            ChoiceUpdate::Keycaps(v) => self.keycaps = v,
        }
        Ok(())
    }

    /// Copy of these choices with `update` applied.
    pub fn with(&self, update: ChoiceUpdate) -> Result<Choices> {
        let mut next = self.clone();
        next.apply(update)?;
        Ok(next)
    }
}

/// A single field update on [`Choices`]; `None` unsets the field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChoiceUpdate {
    BuildMethod(Option<BuildMethod>),
    FormFactor(Option<FormFactor>),
    KeyCount(u32),
    Controller(Option<Controller>),
    SwitchType(Option<SwitchType>),
    Connectivity(Option<Connectivity>),
    Firmware(Option<Firmware>),
    Keycaps(Option<String>),
}

impl ChoiceUpdate {
    /// Parse a CLI field/value pair. The value `none` unsets the field.
    pub fn parse(field: &str, value: &str) -> Result<Self> {
        fn opt<T: std::str::FromStr<Err = anyhow::Error>>(value: &str) -> Result<Option<T>> {
            if value == "none" {
                Ok(None)
            } else {
                value.parse().map(Some)
            }
        }

        let update = match field {
            "build-method" | "buildMethod" => ChoiceUpdate::BuildMethod(opt(value)?),
            "form-factor" | "layout" | "layout.formFactor" => {
                ChoiceUpdate::FormFactor(opt(value)?)
            }
            "key-count" | "layout.keyCount" => {
                let n: u32 = value
                    .parse()
                    .map_err(|_| anyhow::anyhow!("Invalid key count: {}", value))?;
                ChoiceUpdate::KeyCount(n)
            }
            "controller" => ChoiceUpdate::Controller(opt(value)?),
            "switch" | "switch-type" | "switchType" => ChoiceUpdate::SwitchType(opt(value)?),
            "connectivity" => ChoiceUpdate::Connectivity(opt(value)?),
            "firmware" => ChoiceUpdate::Firmware(opt(value)?),
            "keycaps" => ChoiceUpdate::Keycaps(if value == "none" {
                None
            } else {
                Some(value.to_string())
            }),
            _ => anyhow::bail!(
                "Unknown field: {} (supported: build-method, form-factor, key-count, controller, switch, connectivity, firmware, keycaps)",
                field
            ),
        };
        Ok(update)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

/// Choice fields a compatibility finding refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ChoiceField {
    BuildMethod,
    Layout,
    Controller,
    SwitchType,
    Features,
    Connectivity,
    Firmware,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompatibilityWarning {
    pub severity: Severity,
    pub message: String,
    pub affected_choices: Vec<ChoiceField>,
}

impl CompatibilityWarning {
    pub fn new(severity: Severity, message: impl Into<String>, affected: &[ChoiceField]) -> Self {
        Self {
            severity,
            message: message.into(),
            affected_choices: affected.to_vec(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompatibilityStatus {
    Ok,
    Warnings,
    Errors,
}

/// Cost buckets in the base currency (USD).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CostBreakdown {
    pub controller: f64,
    pub switches: f64,
    pub keycaps: f64,
    pub pcb: f64,
    pub case: f64,
    pub hardware: f64,
    pub features: f64,
    pub connectivity: f64,
    pub shipping: f64,
    pub tools: f64,
}

impl CostBreakdown {
    /// Report label and amount for every bucket, in display order.
    pub fn entries(&self) -> [(&'static str, f64); 10] {
        [
            ("Controllers", self.controller),
            ("Switches", self.switches),
            ("Keycaps", self.keycaps),
            ("PCB", self.pcb),
            ("Case", self.case),
            ("Hardware", self.hardware),
            ("Features", self.features),
            ("Connectivity", self.connectivity),
            ("Shipping", self.shipping),
            ("Tools", self.tools),
        ]
    }

    pub fn total(&self) -> f64 {
        self.entries().iter().map(|(_, amount)| amount).sum()
    }

    /// Every bucket divided by two, shipping included.
    pub fn halved(&self) -> CostBreakdown {
        CostBreakdown {
            controller: self.controller / 2.0,
            switches: self.switches / 2.0,
            keycaps: self.keycaps / 2.0,
            pcb: self.pcb / 2.0,
            case: self.case / 2.0,
            hardware: self.hardware / 2.0,
            features: self.features / 2.0,
            connectivity: self.connectivity / 2.0,
            shipping: self.shipping / 2.0,
            tools: self.tools / 2.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CostEstimate {
    pub breakdown: CostBreakdown,
    pub total: f64,
    pub per_half: CostBreakdown,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildEstimate {
    pub cost: CostEstimate,
    pub complexity: u8,
    pub build_time_hours: f64,
}
