//! Packaging symbol sets
//!
//! Submissions carry two multi-value fields: general packaging symbols
//! (`labels`) and recycling symbols (`recycling_symbol`). Internally each is an
//! ordered set of enumerated ids; the comma-joined text form only exists at
//! the storage boundary.
//!
//! Round-trip law: `SymbolSet::parse(&set.serialize()) == set` for any set
//! built from known ids.

use serde::de::Deserializer;
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use std::fmt;

/// An enumerated symbol with a stable id, a display label and a storage token
pub trait Symbol: Copy + Eq + fmt::Debug + 'static {
    const ALL: &'static [Self];

    fn id(self) -> &'static str;
    fn label(self) -> &'static str;
    fn storage(self) -> &'static str;

    /// Case-insensitive match against storage token, label or id
    fn find(token: &str) -> Option<Self> {
        let wanted = normalize(token);
        Self::ALL.iter().copied().find(|s| {
            normalize(s.storage()) == wanted || normalize(s.label()) == wanted || normalize(s.id()) == wanted
        })
    }
}

fn normalize(value: &str) -> String {
    value.trim().to_lowercase()
}

macro_rules! symbol_enum {
    (
        $(#[$meta:meta])*
        $name:ident {
            $($variant:ident => ($id:literal, $label:literal, $storage:literal),)+
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $($variant,)+
        }

        impl Symbol for $name {
            const ALL: &'static [Self] = &[$($name::$variant,)+];

            fn id(self) -> &'static str {
                match self {
                    $($name::$variant => $id,)+
                }
            }

            fn label(self) -> &'static str {
                match self {
                    $($name::$variant => $label,)+
                }
            }

            fn storage(self) -> &'static str {
                match self {
                    $($name::$variant => $storage,)+
                }
            }
        }
    };
}

symbol_enum! {
    /// General packaging symbols (stored in `labels`)
    GeneralSymbol {
        SingleUse => ("single_use", "Do not reuse / single use only", "Single Use"),
        ConsultInstructions => ("consult_instructions", "Consult instructions", "Consult Instructions"),
        Caution => ("caution", "Caution", "Caution"),
        DoNotResterilise => ("do_not_resterilise", "Do not resterilise", "Do Not Resterilise"),
        NonSterile => ("non_sterile", "Non-sterile", "Non Sterile"),
        DamagedPackage => ("damaged_package", "Do not use if package is damaged", "Damaged Package"),
        Sterile => ("sterile", "Sterile", "Sterile"),
        SterileAseptic => ("sterile_aseptic", "Sterilised using aseptic processing techniques", "Sterile A"),
        SterileEo => ("sterile_eo", "Sterilised using ethylene oxide", "Sterile EO"),
        SterileR => ("sterile_r", "Sterilised using irradiation", "Sterile R"),
        KeepAwaySunlight => ("keep_away_sunlight", "Keep away from sunlight", "Keep Away From Sunlight"),
        KeepDry => ("keep_dry", "Keep dry", "Keep Dry"),
        TemperatureLimit => ("temperature_limit", "Temperature limit", "Temperature Limit"),
        NonPyrogenic => ("non_pyrogenic", "Non-pyrogenic", "Non Pyrogenic"),
        MedicalDevice => ("medical_device", "Medical device", "Medical Device"),
        PrescriptionOnly => ("prescription_only", "Prescription only", "Prescription Only"),
        ContainsLatex => ("contains_latex", "Contains latex", "Contains LATEX"),
        NoLatex => ("no_latex", "Does not contain latex", "No LATEX"),
        NoPhthalates => ("no_phthalates", "Does not contain DEHP", "No PHT DEHP"),
        Ce => ("ce", "CE marking", "CE"),
    }
}

symbol_enum! {
    /// Recycling symbols (stored in `recycling_symbol`)
    RecyclingSymbol {
        RecycleGeneral => ("recycle_general", "General Recycling Symbol", "Recyclable"),
        Pet01 => ("pet_01", "01 PET(E)", "01 PET"),
        Hdpe02 => ("hdpe_02", "02 HDPE", "02 HDPE"),
        Pvc03 => ("pvc_03", "03 PVC", "03 PVC"),
        Ldpe04 => ("ldpe_04", "04 LDPE", "04 LDPE"),
        Pp05 => ("pp_05", "05 PP", "05 PP"),
        Ps06 => ("ps_06", "06 PS", "06 PS"),
        Other07 => ("other_07", "07 Other Plastics", "07 Other Plastics"),
        Pap20 => ("pap_20", "20 PAP (Cardboard)", "20 PAP"),
        Pap21 => ("pap_21", "21 PAP (Paperboard)", "21 PAP"),
        Pap22 => ("pap_22", "22 PAP (Paper)", "22 PAP"),
        Other => ("other", "Other", "Other"),
    }
}

/// Ordered, duplicate-free set of symbols
///
/// Tokens that match no known symbol are kept verbatim in `unrecognized` so a
/// parse/serialize cycle never drops stored data.
#[derive(Clone, PartialEq, Eq)]
pub struct SymbolSet<S> {
    known: Vec<S>,
    unrecognized: Vec<String>,
}

pub type GeneralSymbols = SymbolSet<GeneralSymbol>;
pub type RecyclingSymbols = SymbolSet<RecyclingSymbol>;

impl<S: Symbol> SymbolSet<S> {
    pub fn new() -> Self {
        Self {
            known: Vec::new(),
            unrecognized: Vec::new(),
        }
    }

    /// Insert at the end; returns false if already present
    pub fn insert(&mut self, symbol: S) -> bool {
        if self.known.contains(&symbol) {
            return false;
        }
        self.known.push(symbol);
        true
    }

    pub fn contains(&self, symbol: S) -> bool {
        self.known.contains(&symbol)
    }

    pub fn iter(&self) -> impl Iterator<Item = S> + '_ {
        self.known.iter().copied()
    }

    pub fn unrecognized(&self) -> &[String] {
        &self.unrecognized
    }

    pub fn len(&self) -> usize {
        self.known.len() + self.unrecognized.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn push_token(&mut self, raw: &str) {
        let token = raw.trim();
        if token.is_empty() {
            return;
        }
        match S::find(token) {
            Some(symbol) => {
                self.insert(symbol);
            }
            None => {
                let wanted = normalize(token);
                if !self.unrecognized.iter().any(|u| normalize(u) == wanted) {
                    self.unrecognized.push(token.to_string());
                }
            }
        }
    }

    /// Parse the stored comma-joined form
    pub fn parse(stored: &str) -> Self {
        let mut set = Self::new();
        for token in stored.split(',') {
            set.push_token(token);
        }
        set
    }

    /// Parse a nullable column
    pub fn from_column(stored: Option<&str>) -> Self {
        stored.map(Self::parse).unwrap_or_default()
    }

    /// Storage tokens joined with ", "; unrecognized tokens follow known ones
    pub fn serialize(&self) -> String {
        self.known
            .iter()
            .map(|s| s.storage())
            .chain(self.unrecognized.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Storage form for a nullable column; empty sets are stored as NULL
    pub fn to_column(&self) -> Option<String> {
        if self.is_empty() {
            None
        } else {
            Some(self.serialize())
        }
    }
}

impl<S: Symbol> Default for SymbolSet<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: Symbol> fmt::Debug for SymbolSet<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SymbolSet")
            .field("known", &self.known)
            .field("unrecognized", &self.unrecognized)
            .finish()
    }
}

impl<S: Symbol> FromIterator<S> for SymbolSet<S> {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut set = Self::new();
        for symbol in iter {
            set.insert(symbol);
        }
        set
    }
}

/// JSON form is an array of ids (unrecognized tokens verbatim)
impl<S: Symbol> Serialize for SymbolSet<S> {
    fn serialize<Ser: Serializer>(&self, serializer: Ser) -> Result<Ser::Ok, Ser::Error> {
        serializer.collect_seq(
            self.known
                .iter()
                .map(|s| s.id())
                .chain(self.unrecognized.iter().map(String::as_str)),
        )
    }
}

impl<'de, S: Symbol> Deserialize<'de> for SymbolSet<S> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let tokens = Vec::<String>::deserialize(deserializer)?;
        let mut set = Self::new();
        for token in &tokens {
            set.push_token(token);
        }
        Ok(set)
    }
}
