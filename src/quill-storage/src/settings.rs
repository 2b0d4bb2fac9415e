//! Instruction overrides shared by every project.
//!
//! Each override lives under its own key. An empty value means "use the
//! server default", which is also what a reset stores.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::kv::KeyValueStore;

pub const STYLE_INSTRUCTIONS_KEY: &str = "styleInstructions";
pub const SYSTEM_INSTRUCTIONS_KEY: &str = "systemInstructions";
pub const TECHNICAL_INSTRUCTIONS_KEY: &str = "technicalInstructions";

/// Which override block a setting refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstructionKind {
    Style,
    System,
    Technical,
}

impl InstructionKind {
    pub const ALL: [Self; 3] = [Self::Style, Self::System, Self::Technical];

    pub fn key(self) -> &'static str {
        match self {
            Self::Style => STYLE_INSTRUCTIONS_KEY,
            Self::System => SYSTEM_INSTRUCTIONS_KEY,
            Self::Technical => TECHNICAL_INSTRUCTIONS_KEY,
        }
    }
}

impl std::fmt::Display for InstructionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Style => "style",
            Self::System => "system",
            Self::Technical => "technical",
        })
    }
}

/// The three instruction overrides.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstructionSettings {
    pub style: Option<String>,
    pub system: Option<String>,
    pub technical: Option<String>,
}

impl InstructionSettings {
    /// Read the overrides; blank values are treated as absent.
    pub fn load(kv: &dyn KeyValueStore) -> Result<Self> {
        let read = |kind: InstructionKind| -> Result<Option<String>> {
            Ok(kv
                .get(kind.key())?
                .filter(|value| !value.trim().is_empty()))
        };
        Ok(Self {
            style: read(InstructionKind::Style)?,
            system: read(InstructionKind::System)?,
            technical: read(InstructionKind::Technical)?,
        })
    }

    /// Write all three overrides.
    pub fn save(&self, kv: &dyn KeyValueStore) -> Result<()> {
        for kind in InstructionKind::ALL {
            kv.set(kind.key(), self.get(kind).unwrap_or_default())?;
        }
        Ok(())
    }

    pub fn get(&self, kind: InstructionKind) -> Option<&str> {
        match kind {
            InstructionKind::Style => self.style.as_deref(),
            InstructionKind::System => self.system.as_deref(),
            InstructionKind::Technical => self.technical.as_deref(),
        }
    }

    /// Set one override; a blank value resets it.
    pub fn set(&mut self, kind: InstructionKind, value: impl Into<String>) {
        let value = value.into();
        let value = (!value.trim().is_empty()).then_some(value);
        match kind {
            InstructionKind::Style => self.style = value,
            InstructionKind::System => self.system = value,
            InstructionKind::Technical => self.technical = value,
        }
    }

    pub fn reset(&mut self, kind: InstructionKind) {
        self.set(kind, String::new());
    }

    pub fn reset_all(&mut self) {
        *self = Self::default();
    }
}
