use super::native::NativeEvent;
use super::preset::{Preset, PresetDefinition};
use super::{Derivation, Event};

/// Descriptive information about an event, see [`Library::event_info`][crate::Library::event_info].
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EventInfo {
    pub event_code: u32,
    /// Category bits of the event.
    pub event_type: u32,
    pub symbol: String,
    pub short_descr: String,
    pub long_descr: String,
    /// One of `NOT_DERIVED`, `DERIVED_ADD`, `DERIVED_SUB` or `DERIVED_POSTFIX`.
    pub derived: String,
    /// Postfix expression, empty unless `derived` is `DERIVED_POSTFIX`.
    pub postfix: String,
    /// Constituent native codes for presets, register programming values for natives.
    pub code: Vec<u32>,
    /// Names matching `code`.
    pub name: Vec<String>,
    pub note: String,
}

impl EventInfo {
    /// Number of entries in `code` and `name`.
    pub fn count(&self) -> usize {
        self.code.len()
    }

    pub(crate) fn from_preset(
        preset: &Preset,
        def: Option<&PresetDefinition>,
        native_name: impl Fn(Event) -> String,
    ) -> Self {
        let (derived, postfix, code, name, note) = match def {
            Some(def) => (
                def.derivation.as_str(),
                def.derivation
                    .postfix()
                    .map(|note| note.to_string())
                    .unwrap_or_default(),
                def.natives.iter().map(|native| native.code()).collect(),
                def.natives.iter().map(|native| native_name(*native)).collect(),
                def.note.clone().unwrap_or_default(),
            ),
            None => (
                Derivation::NotDerived.as_str(),
                String::new(),
                vec![],
                vec![],
                String::new(),
            ),
        };

        Self {
            event_code: preset.event.code(),
            event_type: preset.categories().bits(),
            symbol: preset.symbol.to_string(),
            short_descr: preset.short_descr.to_string(),
            long_descr: preset.long_descr.to_string(),
            derived: derived.to_string(),
            postfix,
            code,
            name,
            note,
        }
    }

    pub(crate) fn from_native(event: Event, native: &NativeEvent) -> Self {
        Self {
            event_code: event.code(),
            event_type: native.categories.bits(),
            symbol: native.name.clone(),
            short_descr: native.short_descr.clone(),
            long_descr: native.long_descr.clone(),
            derived: Derivation::NotDerived.as_str().to_string(),
            postfix: String::new(),
            code: native.registers.iter().map(|(code, _)| *code).collect(),
            name: native.registers.iter().map(|(_, name)| name.clone()).collect(),
            note: native.note.clone().unwrap_or_default(),
        }
    }
}
