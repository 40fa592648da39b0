/// Body and footer produced by the second generation phase.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Detail {
    pub body: String,
    pub footer: String,
}

impl Detail {
    pub fn is_empty(&self) -> bool {
        self.body.is_empty() && self.footer.is_empty()
    }
}

const BODY_LABEL: &str = "Body:";
const FOOTER_LABEL: &str = "Footer:";

enum Section {
    Preamble,
    Body,
    Footer,
}

/// Split labelled `Body:` / `Footer:` output into its two sections.
///
/// Labels are case-sensitive and must sit on a line of their own. Text before
/// the first label belongs to neither section. A missing section is empty.
pub fn parse_detail_output(output: &str) -> Detail {
    let mut body: Vec<&str> = Vec::new();
    let mut footer: Vec<&str> = Vec::new();
    let mut section = Section::Preamble;

    for line in output.lines() {
        match line.trim() {
            BODY_LABEL => section = Section::Body,
            FOOTER_LABEL => section = Section::Footer,
            _ => match section {
                Section::Preamble => {}
                Section::Body => body.push(line),
                Section::Footer => footer.push(line),
            },
        }
    }

    Detail {
        body: body.join("\n").trim().to_string(),
        footer: footer.join("\n").trim().to_string(),
    }
}
