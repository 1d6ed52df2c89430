use crate::error::Result;

use super::{Check, CheckContext};

/// Reports files whose last line has no terminator.
#[derive(Debug, Default)]
pub struct NewlineAtEndOfFileCheck;

impl NewlineAtEndOfFileCheck {
    /// Rule key.
    pub const KEY: &'static str = "NewlineAtEndOfFileCheck";
}

impl Check for NewlineAtEndOfFileCheck {
    fn rule_key(&self) -> &'static str {
        Self::KEY
    }

    fn scan_file(&mut self, context: &mut CheckContext<'_>) -> Result<()> {
        let content = context.source().content();
        if !content.is_empty() && !content.ends_with('\n') && !content.ends_with('\r') {
            context.report_file("Add a new line at the end of this file.");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::file::XmlFile;

    fn count(text: &str) -> usize {
        let file = XmlFile::from_text("eof.xml", text).unwrap();
        let settings = Settings::default();
        let mut context = CheckContext::new(&file, &settings, NewlineAtEndOfFileCheck::KEY);
        NewlineAtEndOfFileCheck.scan_file(&mut context).unwrap();
        context.issues().len()
    }

    #[test]
    fn test_last_line() {
        assert_eq!(count("<r/>"), 1);
        assert_eq!(count("<r/>\n"), 0);
        assert_eq!(count("<r/>\r\n"), 0);
        assert_eq!(count("<r/>\r"), 0);
    }
}
