use std::collections::{BTreeMap, HashSet};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{Instrument, SourceClass, Symbol, ValidationError};

/// Identifiers requested from one source class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "source", content = "symbols", rename_all = "lowercase")]
pub enum SymbolGroup {
    Equity(Vec<Symbol>),
    Crypto(Vec<Symbol>),
}

impl SymbolGroup {
    pub fn new(class: SourceClass, symbols: Vec<Symbol>) -> Self {
        match class {
            SourceClass::Equity => Self::Equity(symbols),
            SourceClass::Crypto => Self::Crypto(symbols),
        }
    }

    pub const fn class(&self) -> SourceClass {
        match self {
            Self::Equity(_) => SourceClass::Equity,
            Self::Crypto(_) => SourceClass::Crypto,
        }
    }

    pub fn symbols(&self) -> &[Symbol] {
        match self {
            Self::Equity(symbols) | Self::Crypto(symbols) => symbols,
        }
    }
}

/// Validated symbol request, grouped by source class.
///
/// Built once at the system boundary. Groups keep the order in which classes
/// were first named; identifiers keep their order and are de-duplicated within a
/// class. At least one identifier must be present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    try_from = "BTreeMap<String, Option<Vec<String>>>",
    into = "BTreeMap<String, Option<Vec<String>>>"
)]
pub struct SymbolSpec {
    groups: Vec<SymbolGroup>,
}

impl SymbolSpec {
    pub fn new(groups: Vec<SymbolGroup>) -> Result<Self, ValidationError> {
        let mut merged: Vec<(SourceClass, Vec<Symbol>)> = Vec::new();
        let mut seen = HashSet::new();

        for group in groups {
            let class = group.class();
            let slot = match merged.iter().position(|(existing, _)| *existing == class) {
                Some(index) => index,
                None => {
                    merged.push((class, Vec::new()));
                    merged.len() - 1
                }
            };

            for symbol in group.symbols() {
                if seen.insert((class, symbol.clone())) {
                    merged[slot].1.push(symbol.clone());
                }
            }
        }

        let groups = merged
            .into_iter()
            .filter(|(_, symbols)| !symbols.is_empty())
            .map(|(class, symbols)| SymbolGroup::new(class, symbols))
            .collect::<Vec<_>>();

        if groups.is_empty() {
            return Err(ValidationError::EmptySymbolSpec);
        }

        Ok(Self { groups })
    }

    /// Validates a loosely-typed `source class -> identifiers` mapping.
    pub fn from_entries<I, K, V, S>(entries: I) -> Result<Self, ValidationError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let groups = entries
            .into_iter()
            .map(|(class, symbols)| {
                let class = SourceClass::from_str(class.as_ref())?;
                let symbols = symbols
                    .into_iter()
                    .map(|raw| Symbol::parse(raw.as_ref()))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(SymbolGroup::new(class, symbols))
            })
            .collect::<Result<Vec<_>, ValidationError>>()?;

        Self::new(groups)
    }

    pub fn groups(&self) -> &[SymbolGroup] {
        &self.groups
    }

    /// Flattened `(symbol, class)` pairs in request order.
    pub fn instruments(&self) -> Vec<Instrument> {
        self.groups
            .iter()
            .flat_map(|group| {
                group
                    .symbols()
                    .iter()
                    .map(move |symbol| Instrument::new(symbol.clone(), group.class()))
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.groups.iter().map(|group| group.symbols().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl TryFrom<BTreeMap<String, Option<Vec<String>>>> for SymbolSpec {
    type Error = ValidationError;

    fn try_from(value: BTreeMap<String, Option<Vec<String>>>) -> Result<Self, Self::Error> {
        Self::from_entries(
            value
                .into_iter()
                .map(|(class, symbols)| (class, symbols.unwrap_or_default())),
        )
    }
}

impl From<SymbolSpec> for BTreeMap<String, Option<Vec<String>>> {
    fn from(value: SymbolSpec) -> Self {
        value
            .groups
            .into_iter()
            .map(|group| {
                let symbols: Vec<String> =
                    group.symbols().iter().map(ToString::to_string).collect();
                (group.class().as_str().to_owned(), Some(symbols))
            })
            .collect()
    }
}
