use super::{column_list, map_text_columns};
use crate::error::PipelineResult;
use crate::logger::Logger;
use crate::pipeline::{PipelineContext, Step, StepOutcome};
use once_cell::sync::Lazy;
use regex::Regex;

static LINE_BREAK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)<br\s*/?>").expect("line break pattern is valid"));

static TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").expect("tag pattern is valid"));

/// Step that strips HTML markup from text columns
///
/// Line breaks (`<br>`, `<br/>`, `<br />`) become a full stop so sentence
/// boundaries survive; every other tag is removed.
pub struct RemoveHtmlTagsStep {
    columns: Vec<String>,
}

impl RemoveHtmlTagsStep {
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: column_list(columns),
        }
    }
}

pub(crate) fn strip_html(text: &str) -> String {
    let text = LINE_BREAK.replace_all(text, ".");
    TAG.replace_all(&text, "").into_owned()
}

impl Step for RemoveHtmlTagsStep {
    fn run(&self, context: &mut PipelineContext, log: &Logger) -> PipelineResult<StepOutcome> {
        let rows = map_text_columns(context, self.name(), &self.columns, strip_html)?;
        log.debug(
            "steps::remove_html_tags",
            &format!("Stripped HTML from {} rows", rows),
        );
        Ok(StepOutcome::Continue)
    }

    fn name(&self) -> &str {
        "remove_html_tags"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::steps::test_support::{text_context, texts};

    #[test]
    fn test_strip_html() {
        assert_eq!(strip_html("Great<br/>Would buy"), "Great.Would buy");
        assert_eq!(strip_html("a<BR>b<br />c"), "a.b.c");
        assert_eq!(strip_html("<p>Nice <b>fit</b></p>"), "Nice fit");
        assert_eq!(strip_html("3 < 4"), "3 < 4");
    }

    #[test]
    fn test_step_rewrites_column() {
        let mut context = text_context(&["<i>soft</i> fabric<br>"]);
        RemoveHtmlTagsStep::new(["text"])
            .run(&mut context, &Logger::new())
            .unwrap();
        assert_eq!(texts(&context, "text"), vec!["soft fabric."]);
    }
}
