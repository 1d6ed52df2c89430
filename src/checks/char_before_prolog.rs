use crate::error::Result;

use super::{Check, CheckContext};

/// Reports content placed before the XML declaration.
#[derive(Debug, Default)]
pub struct CharBeforePrologCheck;

impl CharBeforePrologCheck {
    /// Rule key.
    pub const KEY: &'static str = "CharBeforePrologCheck";
}

impl Check for CharBeforePrologCheck {
    fn rule_key(&self) -> &'static str {
        Self::KEY
    }

    fn scan_file(&mut self, context: &mut CheckContext<'_>) -> Result<()> {
        if !context.source().has_preamble() {
            return Ok(());
        }
        if let Some(prolog) = context.file().prolog() {
            context.report(prolog.range(), "Remove all characters located before \"<?xml\".");
        }
        Ok(())
    }
}
